use super::modules::ModuleRegistry;
use super::pause_registry::PauseRegistry;
use super::record_audit;
use super::router::PaymentRouter;
use crate::domain::actor::{Actor, Capability};
use crate::domain::amount::{Address, AmountUnit};
use crate::domain::audit::{AuditAction, AuditRecord, AuditResource};
use crate::domain::clock::ClockRef;
use crate::domain::pause::PauseScope;
use crate::domain::ports::AuditSinkRef;
use crate::domain::receipt::PaymentReceipt;
use crate::error::{EngineError, Result};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info};

/// A payment outside the disbursement workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendPayment {
    pub token_address: String,
    pub to: String,
    pub amount: String,
    pub unit: AmountUnit,
    pub decimals: Option<u8>,
    /// Registered payment module the transfer is made for. Its MODULE pause
    /// applies and its decimals are used when `decimals` is not given.
    pub module_id: Option<String>,
}

/// Direct treasury payments, subject to the same routing and circuit breaker
/// as disbursements but without the request/execute approval.
pub struct PaymentService {
    pauses: Arc<PauseRegistry>,
    router: Arc<PaymentRouter>,
    modules: Arc<ModuleRegistry>,
    audit: AuditSinkRef,
    clock: ClockRef,
}

impl PaymentService {
    pub fn new(
        pauses: Arc<PauseRegistry>,
        router: Arc<PaymentRouter>,
        modules: Arc<ModuleRegistry>,
        audit: AuditSinkRef,
        clock: ClockRef,
    ) -> Self {
        Self {
            pauses,
            router,
            modules,
            audit,
            clock,
        }
    }

    pub async fn send_payment(&self, payment: SendPayment, actor: &Actor) -> Result<PaymentReceipt> {
        actor.authorize(Capability::SendPayment)?;

        let token = Address::parse(&payment.token_address)?;
        let to = Address::parse(&payment.to)?;

        let module = match payment.module_id.as_deref() {
            Some(module_id) => {
                let module = self.modules.get_module(module_id).await?;
                actor.authorize_tenant(&module.tenant_id)?;
                Some(module)
            }
            None => None,
        };
        let decimals = payment
            .decimals
            .or(module.as_ref().and_then(|m| m.token_decimals));

        if self.pauses.is_paused(PauseScope::Global, None).await {
            return Err(EngineError::PausedError(
                "Payments are currently paused system-wide".to_string(),
            ));
        }
        if self.pauses.is_paused(PauseScope::Token, Some(token.as_str())).await {
            return Err(EngineError::PausedError(format!(
                "Payments of token {token} are currently paused"
            )));
        }
        if let Some(module) = &module
            && self
                .pauses
                .is_paused(PauseScope::Module, Some(&module.module_id))
                .await
        {
            return Err(EngineError::PausedError(format!(
                "Payment module {} is currently paused",
                module.module_id
            )));
        }

        let routed = self
            .router
            .route_with_unit(&token, &to, &payment.amount, payment.unit, decimals)
            .await;

        match routed {
            Ok(receipt) => {
                info!(tx_hash = %receipt.tx_hash, %token, %to, "payment sent");
                record_audit(
                    &self.audit,
                    AuditRecord::new(
                        AuditAction::PaymentSent,
                        AuditResource::Router,
                        json!({
                            "tx_hash": receipt.tx_hash,
                            "token_address": token,
                            "from": receipt.from,
                            "to": receipt.to,
                            "amount": receipt.amount,
                            "source": receipt.source,
                            "module_id": payment.module_id,
                            "block_number": receipt.block_number,
                        }),
                        self.clock.now(),
                    )
                    .by(actor)
                    .for_tenant(actor.tenant_id.clone()),
                )
                .await;
                Ok(receipt)
            }
            Err(err) => {
                error!(%token, %to, error = %err, "payment failed");
                record_audit(
                    &self.audit,
                    AuditRecord::new(
                        AuditAction::Error,
                        AuditResource::Router,
                        json!({
                            "error": err.to_string(),
                            "token_address": token,
                            "to": to,
                            "amount": payment.amount,
                            "module_id": payment.module_id,
                        }),
                        self.clock.now(),
                    )
                    .by(actor)
                    .for_tenant(actor.tenant_id.clone()),
                )
                .await;
                Err(err)
            }
        }
    }

    pub async fn balance_of(&self, token_address: &str, owner: &str) -> Result<u128> {
        let token = Address::parse(token_address)?;
        let owner = Address::parse(owner)?;
        self.router.balance_of(&token, &owner).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::domain::actor::Role;
    use crate::domain::clock::SystemClock;
    use crate::domain::module::ModuleDraft;
    use crate::domain::receipt::FundingSource;
    use crate::infrastructure::in_memory::{
        InMemoryAuditSink, InMemoryModuleStore, InMemoryPauseStore,
    };
    use crate::infrastructure::simulated_ledger::SimulatedTokenLedger;

    const TOKEN: &str = "0x0101010101010101010101010101010101010101";
    const TREASURY: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const RECIPIENT: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn service(treasury_balance: u128) -> (PaymentService, Arc<PauseRegistry>, InMemoryAuditSink) {
        service_with_decimals(treasury_balance, 6)
    }

    fn service_with_decimals(
        treasury_balance: u128,
        decimals: u8,
    ) -> (PaymentService, Arc<PauseRegistry>, InMemoryAuditSink) {
        let config = EngineConfig::default();
        let audit = InMemoryAuditSink::new();
        let ledger = SimulatedTokenLedger::new();
        ledger.register_token(
            &Address::parse(TOKEN).unwrap(),
            decimals,
            &Address::parse(TREASURY).unwrap(),
            treasury_balance,
        );
        let pauses = Arc::new(PauseRegistry::new(
            Box::new(InMemoryPauseStore::new()),
            Arc::new(audit.clone()),
            Arc::new(SystemClock),
            &config,
        ));
        let router = Arc::new(PaymentRouter::new(Arc::new(ledger), &config));
        let modules = Arc::new(ModuleRegistry::new(
            Box::new(InMemoryModuleStore::new()),
            router.clone(),
            Arc::new(audit.clone()),
            Arc::new(SystemClock),
        ));
        let service = PaymentService::new(
            pauses.clone(),
            router,
            modules,
            Arc::new(audit.clone()),
            Arc::new(SystemClock),
        );
        (service, pauses, audit)
    }

    async fn enable(service: &PaymentService, module_id: &str, decimals: Option<u8>) {
        service
            .modules
            .enable_module(
                ModuleDraft {
                    module_id: Some(module_id.to_string()),
                    tenant_id: "t1".to_string(),
                    token_address: TOKEN.to_string(),
                    token_decimals: decimals,
                },
                &admin(),
            )
            .await
            .unwrap();
    }

    fn payment(amount: &str, module_id: Option<&str>) -> SendPayment {
        SendPayment {
            token_address: TOKEN.to_string(),
            to: RECIPIENT.to_string(),
            amount: amount.to_string(),
            unit: AmountUnit::Inferred,
            decimals: None,
            module_id: module_id.map(str::to_string),
        }
    }

    fn treasury() -> Actor {
        Actor::new("treasury-1", "t1", [Role::Treasury])
    }

    fn admin() -> Actor {
        Actor::new("admin-1", "t1", [Role::Admin])
    }

    #[tokio::test]
    async fn test_send_payment_and_audit() {
        let (service, _, audit) = service(5_000_000);
        enable(&service, "mod-1", None).await;
        let receipt = service
            .send_payment(payment("2.5", Some("mod-1")), &treasury())
            .await
            .unwrap();

        assert_eq!(receipt.amount.units(), 2_500_000);
        assert_eq!(receipt.source, FundingSource::Transfer);
        assert_eq!(service.balance_of(TOKEN, RECIPIENT).await.unwrap(), 2_500_000);

        let records = audit.records().await;
        assert_eq!(records.len(), 2);
        assert_eq!(records[1].action, AuditAction::PaymentSent);
        assert_eq!(records[1].payload["module_id"], "mod-1");
    }

    #[tokio::test]
    async fn test_module_pause_blocks_only_that_module() {
        let (service, pauses, _) = service(5_000_000);
        enable(&service, "mod-1", None).await;
        enable(&service, "mod-2", None).await;
        pauses
            .set_pause(PauseScope::Module, Some("mod-1"), true, "review", &admin())
            .await
            .unwrap();

        let blocked = service
            .send_payment(payment("1", Some("mod-1")), &treasury())
            .await;
        assert!(matches!(blocked, Err(EngineError::PausedError(_))));

        assert!(
            service
                .send_payment(payment("1", Some("mod-2")), &treasury())
                .await
                .is_ok()
        );
        assert!(service.send_payment(payment("1", None), &treasury()).await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_module_is_rejected_before_routing() {
        let (service, _, audit) = service(5_000_000);
        let result = service
            .send_payment(payment("1", Some("no-such-module")), &treasury())
            .await;

        assert!(matches!(
            result,
            Err(EngineError::NotFoundError { kind: "Payment module", ref id }) if id == "no-such-module"
        ));
        assert_eq!(service.balance_of(TOKEN, RECIPIENT).await.unwrap(), 0);
        assert!(audit.records().await.is_empty());
    }

    #[tokio::test]
    async fn test_module_decimals_scale_the_amount() {
        let (service, _, _) = service_with_decimals(10_000, 18);
        enable(&service, "cents", Some(2)).await;

        let receipt = service
            .send_payment(payment("1.25", Some("cents")), &treasury())
            .await
            .unwrap();
        assert_eq!(receipt.amount.units(), 125);

        let mut explicit = payment("1.25", Some("cents"));
        explicit.decimals = Some(3);
        let receipt = service.send_payment(explicit, &treasury()).await.unwrap();
        assert_eq!(receipt.amount.units(), 1_250);
    }

    #[tokio::test]
    async fn test_module_of_other_tenant_is_off_limits() {
        let (service, _, _) = service(5_000_000);
        enable(&service, "mod-1", None).await;

        let outsider = Actor::new("treasury-2", "t2", [Role::Treasury]);
        let result = service
            .send_payment(payment("1", Some("mod-1")), &outsider)
            .await;
        assert!(matches!(result, Err(EngineError::AuthorizationError { .. })));
    }

    #[tokio::test]
    async fn test_send_requires_treasury_capability() {
        let (service, _, _) = service(5_000_000);
        let program = Actor::new("p1", "t1", [Role::Program]);
        let result = service.send_payment(payment("1", None), &program).await;
        assert!(matches!(result, Err(EngineError::AuthorizationError { .. })));
    }

    #[tokio::test]
    async fn test_failed_send_is_audited_as_error() {
        let (service, _, audit) = service(0);
        let mut p = payment("1", None);
        p.to = "0x123".to_string();
        assert!(matches!(
            service.send_payment(p, &treasury()).await,
            Err(EngineError::ValidationError(_))
        ));
        assert!(audit.records().await.is_empty());

        let mut unknown_token = payment("1", None);
        unknown_token.token_address = format!("0x{}", "02".repeat(20));
        assert!(matches!(
            service.send_payment(unknown_token, &treasury()).await,
            Err(EngineError::RoutingError(_))
        ));
        let records = audit.records().await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].action, AuditAction::Error);
    }
}
