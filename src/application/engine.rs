use super::disbursement::DisbursementWorkflow;
use super::modules::ModuleRegistry;
use super::pause_registry::PauseRegistry;
use super::payments::PaymentService;
use super::router::PaymentRouter;
use crate::config::EngineConfig;
use crate::domain::clock::{ClockRef, SystemClock};
use crate::domain::ports::{
    AuditSinkRef, DisbursementStoreBox, ModuleStoreBox, PauseStoreBox, TokenLedgerRef,
};
use crate::error::Result;
use std::sync::Arc;
use tracing::info;

/// The main entry point of the payment control engine.
///
/// `PaymentEngine` owns the storage backends and the ledger client and shares
/// one [`PauseRegistry`] and one [`PaymentRouter`] between the disbursement
/// workflow and the direct payment path, so a pause or a per-token routing
/// lock applies to both.
pub struct PaymentEngine {
    pauses: Arc<PauseRegistry>,
    router: Arc<PaymentRouter>,
    modules: Arc<ModuleRegistry>,
    disbursements: DisbursementWorkflow,
    payments: PaymentService,
}

impl PaymentEngine {
    /// Creates a new `PaymentEngine` on the system clock.
    ///
    /// # Arguments
    ///
    /// * `pause_store` - Persistence for pause rows.
    /// * `disbursement_store` - Persistence for disbursement requests.
    /// * `module_store` - Persistence for payment modules.
    /// * `audit` - Destination of the audit trail.
    /// * `ledger` - Client of the token ledger payments settle on.
    /// * `config` - Engine settings.
    pub fn new(
        pause_store: PauseStoreBox,
        disbursement_store: DisbursementStoreBox,
        module_store: ModuleStoreBox,
        audit: AuditSinkRef,
        ledger: TokenLedgerRef,
        config: &EngineConfig,
    ) -> Self {
        Self::with_clock(
            pause_store,
            disbursement_store,
            module_store,
            audit,
            ledger,
            config,
            Arc::new(SystemClock),
        )
    }

    /// Same as [`PaymentEngine::new`] with an explicit time source.
    pub fn with_clock(
        pause_store: PauseStoreBox,
        disbursement_store: DisbursementStoreBox,
        module_store: ModuleStoreBox,
        audit: AuditSinkRef,
        ledger: TokenLedgerRef,
        config: &EngineConfig,
        clock: ClockRef,
    ) -> Self {
        let pauses = Arc::new(PauseRegistry::new(
            pause_store,
            audit.clone(),
            clock.clone(),
            config,
        ));
        let router = Arc::new(PaymentRouter::new(ledger, config));
        let modules = Arc::new(ModuleRegistry::new(
            module_store,
            router.clone(),
            audit.clone(),
            clock.clone(),
        ));
        let disbursements = DisbursementWorkflow::new(
            disbursement_store,
            pauses.clone(),
            router.clone(),
            audit.clone(),
            clock.clone(),
        );
        let payments = PaymentService::new(
            pauses.clone(),
            router.clone(),
            modules.clone(),
            audit,
            clock,
        );
        Self {
            pauses,
            router,
            modules,
            disbursements,
            payments,
        }
    }

    /// Loads persisted pause state. Until this succeeds, reads follow the
    /// configured pause read policy.
    pub async fn start(&self) -> Result<()> {
        self.pauses.load().await?;
        info!("payment engine started");
        Ok(())
    }

    pub fn pauses(&self) -> &PauseRegistry {
        &self.pauses
    }

    pub fn router(&self) -> &PaymentRouter {
        &self.router
    }

    pub fn modules(&self) -> &ModuleRegistry {
        &self.modules
    }

    pub fn disbursements(&self) -> &DisbursementWorkflow {
        &self.disbursements
    }

    pub fn payments(&self) -> &PaymentService {
        &self.payments
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::actor::{Actor, Role};
    use crate::domain::amount::{Address, AmountUnit};
    use crate::domain::audit::AuditAction;
    use crate::domain::disbursement::{DisbursementDraft, DisbursementStatus};
    use crate::domain::pause::{PauseKey, PauseScope, PauseState};
    use crate::domain::ports::PauseStore;
    use crate::error::EngineError;
    use crate::infrastructure::in_memory::{
        InMemoryAuditSink, InMemoryDisbursementStore, InMemoryModuleStore, InMemoryPauseStore,
    };
    use crate::infrastructure::simulated_ledger::SimulatedTokenLedger;
    use crate::application::payments::SendPayment;
    use chrono::Utc;

    const TOKEN: &str = "0x0101010101010101010101010101010101010101";
    const TREASURY: &str = "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";
    const RECIPIENT: &str = "0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb";

    fn engine_with(pause_store: InMemoryPauseStore) -> (PaymentEngine, InMemoryAuditSink) {
        let audit = InMemoryAuditSink::new();
        let ledger = SimulatedTokenLedger::new();
        ledger.register_token(
            &Address::parse(TOKEN).unwrap(),
            18,
            &Address::parse(TREASURY).unwrap(),
            1_000,
        );
        let engine = PaymentEngine::new(
            Box::new(pause_store),
            Box::new(InMemoryDisbursementStore::new()),
            Box::new(InMemoryModuleStore::new()),
            Arc::new(audit.clone()),
            Arc::new(ledger),
            &EngineConfig::default(),
        );
        (engine, audit)
    }

    fn draft(amount: &str) -> DisbursementDraft {
        DisbursementDraft {
            tenant_id: "t1".to_string(),
            amount: amount.to_string(),
            token_address: TOKEN.to_string(),
            recipient_address: RECIPIENT.to_string(),
            reason: "grant".to_string(),
        }
    }

    #[tokio::test]
    async fn test_request_then_execute() {
        let (engine, audit) = engine_with(InMemoryPauseStore::new());
        engine.start().await.unwrap();

        let program = Actor::new("p1", "t1", [Role::Program]);
        let treasury = Actor::new("tr1", "t1", [Role::Treasury]);

        let request = engine
            .disbursements()
            .request_disbursement(draft("100"), &program)
            .await
            .unwrap();
        let executed = engine
            .disbursements()
            .execute_disbursement(request.id, &treasury)
            .await
            .unwrap();

        assert_eq!(executed.status, DisbursementStatus::Executed);
        assert_eq!(
            engine
                .payments()
                .balance_of(TOKEN, RECIPIENT)
                .await
                .unwrap(),
            100
        );

        let actions: Vec<AuditAction> = audit.records().await.iter().map(|r| r.action).collect();
        assert_eq!(
            actions,
            vec![
                AuditAction::DisbursementRequest,
                AuditAction::DisbursementExecute
            ]
        );
    }

    #[tokio::test]
    async fn test_start_loads_persisted_pauses() {
        let store = InMemoryPauseStore::new();
        store
            .upsert(PauseState {
                scope: PauseScope::Global,
                target_id: PauseKey::global().target_id,
                is_paused: true,
                reason: "incident".to_string(),
                set_by: "ops".to_string(),
                updated_at: Utc::now(),
            })
            .await
            .unwrap();

        let (engine, _) = engine_with(store);
        engine.start().await.unwrap();

        let treasury = Actor::new("tr1", "t1", [Role::Treasury]);
        let result = engine
            .payments()
            .send_payment(
                SendPayment {
                    token_address: TOKEN.to_string(),
                    to: RECIPIENT.to_string(),
                    amount: "1".to_string(),
                    unit: AmountUnit::SmallestUnit,
                    decimals: None,
                    module_id: None,
                },
                &treasury,
            )
            .await;
        assert!(matches!(result, Err(EngineError::PausedError(_))));
        assert!(engine.pauses().is_paused(PauseScope::Token, Some(TOKEN)).await);
    }

    #[tokio::test]
    async fn test_pause_applies_to_both_paths() {
        let (engine, _) = engine_with(InMemoryPauseStore::new());
        engine.start().await.unwrap();

        let admin = Actor::new("admin", "t1", [Role::Admin]);
        engine
            .pauses()
            .set_pause(PauseScope::Token, Some(TOKEN), true, "depeg", &admin)
            .await
            .unwrap();

        assert!(matches!(
            engine
                .disbursements()
                .request_disbursement(draft("1"), &admin)
                .await,
            Err(EngineError::PausedError(_))
        ));
        assert_eq!(engine.router().default_decimals(), 18);
    }
}
