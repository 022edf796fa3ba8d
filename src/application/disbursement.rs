use super::pause_registry::PauseRegistry;
use super::record_audit;
use super::router::PaymentRouter;
use crate::domain::actor::{Actor, Capability};
use crate::domain::amount::{Address, AmountUnit, TokenAmount};
use crate::domain::audit::{AuditAction, AuditRecord, AuditResource};
use crate::domain::clock::ClockRef;
use crate::domain::disbursement::{
    DisbursementDraft, DisbursementRequest, DisbursementStatus, Transition, TransitionOutcome,
};
use crate::domain::pause::PauseScope;
use crate::domain::ports::{AuditSinkRef, DisbursementStoreBox};
use crate::error::{EngineError, Result};
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Two-role approval flow in front of the [`PaymentRouter`].
///
/// A PROGRAM (or admin) actor files a request, a TREASURY (or admin) actor
/// executes it. Execution claims the request by moving it to PROCESSING through
/// a conditional store update before any funds move, so two concurrent executes
/// of the same request cannot both reach the router.
pub struct DisbursementWorkflow {
    store: DisbursementStoreBox,
    pauses: Arc<PauseRegistry>,
    router: Arc<PaymentRouter>,
    audit: AuditSinkRef,
    clock: ClockRef,
}

impl DisbursementWorkflow {
    pub fn new(
        store: DisbursementStoreBox,
        pauses: Arc<PauseRegistry>,
        router: Arc<PaymentRouter>,
        audit: AuditSinkRef,
        clock: ClockRef,
    ) -> Self {
        Self {
            store,
            pauses,
            router,
            audit,
            clock,
        }
    }

    /// Files a new PENDING request. The only way requests are created.
    pub async fn request_disbursement(
        &self,
        draft: DisbursementDraft,
        actor: &Actor,
    ) -> Result<DisbursementRequest> {
        actor.authorize(Capability::RequestDisbursement)?;
        actor.authorize_tenant(&draft.tenant_id)?;

        let token_address = Address::parse(&draft.token_address)?;
        let recipient_address = Address::parse(&draft.recipient_address)?;

        self.ensure_not_paused(&token_address).await?;

        let token_decimals = self.router.token_decimals(&token_address).await;
        TokenAmount::parse(
            &draft.amount,
            AmountUnit::Inferred,
            token_decimals.unwrap_or(self.router.default_decimals()),
        )?;

        let request = DisbursementRequest::pending(
            draft.tenant_id,
            draft.amount.trim().to_string(),
            token_address,
            recipient_address,
            draft.reason,
            actor.id.clone(),
            token_decimals,
            self.clock.now(),
        );
        self.store.insert(request.clone()).await?;

        info!(
            request_id = %request.id,
            tenant = %request.tenant_id,
            amount = %request.amount,
            token = %request.token_address,
            "disbursement requested"
        );
        record_audit(
            &self.audit,
            AuditRecord::new(
                AuditAction::DisbursementRequest,
                AuditResource::Program,
                serde_json::to_value(&request).unwrap_or_default(),
                request.created_at,
            )
            .by(actor)
            .for_tenant(request.tenant_id.clone()),
        )
        .await;

        Ok(request)
    }

    /// Executes a PENDING or APPROVED request through the router.
    ///
    /// Routing failures mark the request FAILED and are returned to the caller.
    /// A finality timeout leaves it PROCESSING, because the payment may still land.
    pub async fn execute_disbursement(
        &self,
        request_id: Uuid,
        actor: &Actor,
    ) -> Result<DisbursementRequest> {
        actor.authorize(Capability::ExecuteDisbursement)?;

        let request = self
            .store
            .get(request_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Disbursement request", request_id.to_string()))?;
        actor.authorize_tenant(&request.tenant_id)?;

        if !request.status.is_executable() {
            return Err(EngineError::InvalidStateError {
                id: request_id.to_string(),
                action: "execute",
                status: request.status,
            });
        }

        // Pause state may have changed since the request was filed.
        self.ensure_not_paused(&request.token_address).await?;

        let claimed = self
            .claim(
                request_id,
                &DisbursementStatus::EXECUTABLE,
                Transition::to(DisbursementStatus::Processing, self.clock.now()),
            )
            .await?;
        info!(%request_id, executor = %actor.id, "disbursement claimed for execution");

        let routed = self
            .router
            .route(
                &claimed.token_address,
                &claimed.recipient_address,
                &claimed.amount,
                claimed.token_decimals,
            )
            .await;

        match routed {
            Ok(receipt) => {
                let stored = self
                    .claim(
                        request_id,
                        &[DisbursementStatus::Processing],
                        Transition::executed(&actor.id, &receipt.tx_hash, self.clock.now()),
                    )
                    .await;

                record_audit(
                    &self.audit,
                    AuditRecord::new(
                        AuditAction::DisbursementExecute,
                        AuditResource::Treasury,
                        json!({
                            "request_id": request_id,
                            "tx_hash": receipt.tx_hash,
                            "block_number": receipt.block_number,
                            "source": receipt.source,
                            "amount": receipt.amount,
                        }),
                        self.clock.now(),
                    )
                    .by(actor)
                    .for_tenant(claimed.tenant_id.clone()),
                )
                .await;

                match stored {
                    Ok(executed) => {
                        info!(%request_id, tx_hash = %receipt.tx_hash, "disbursement executed");
                        Ok(executed)
                    }
                    Err(e) => {
                        error!(
                            %request_id,
                            tx_hash = %receipt.tx_hash,
                            error = %e,
                            "payment is final but the request could not be marked EXECUTED"
                        );
                        Err(e)
                    }
                }
            }
            Err(err) if err.is_finality_timeout() => {
                warn!(%request_id, error = %err, "finality wait timed out, request left PROCESSING");
                record_audit(
                    &self.audit,
                    AuditRecord::new(
                        AuditAction::Error,
                        AuditResource::Treasury,
                        json!({
                            "request_id": request_id,
                            "action": "DISBURSEMENT_EXECUTE",
                            "status": DisbursementStatus::Processing,
                            "error": err.to_string(),
                        }),
                        self.clock.now(),
                    )
                    .by(actor)
                    .for_tenant(claimed.tenant_id.clone()),
                )
                .await;
                Err(err)
            }
            Err(err) => {
                error!(%request_id, error = %err, "disbursement execution failed");
                if let Err(e) = self
                    .claim(
                        request_id,
                        &[DisbursementStatus::Processing],
                        Transition::failed(err.to_string(), self.clock.now()),
                    )
                    .await
                {
                    error!(%request_id, error = %e, "could not mark request FAILED");
                }

                record_audit(
                    &self.audit,
                    AuditRecord::new(
                        AuditAction::DisbursementFailed,
                        AuditResource::Treasury,
                        json!({
                            "request_id": request_id,
                            "action": "DISBURSEMENT_EXECUTE",
                            "error": err.to_string(),
                        }),
                        self.clock.now(),
                    )
                    .by(actor)
                    .for_tenant(claimed.tenant_id.clone()),
                )
                .await;
                Err(err)
            }
        }
    }

    /// Requests of one tenant, oldest first, optionally filtered by status.
    pub async fn list_requests(
        &self,
        tenant_id: &str,
        status: Option<DisbursementStatus>,
    ) -> Result<Vec<DisbursementRequest>> {
        self.store.list(tenant_id, status).await
    }

    pub async fn get_request(&self, request_id: Uuid) -> Result<DisbursementRequest> {
        self.store
            .get(request_id)
            .await?
            .ok_or_else(|| EngineError::not_found("Disbursement request", request_id.to_string()))
    }

    async fn ensure_not_paused(&self, token: &Address) -> Result<()> {
        if self.pauses.is_paused(PauseScope::Global, None).await {
            return Err(EngineError::PausedError(
                "Disbursements are currently paused system-wide".to_string(),
            ));
        }
        if self.pauses.is_paused(PauseScope::Token, Some(token.as_str())).await {
            return Err(EngineError::PausedError(format!(
                "Disbursements of token {token} are currently paused"
            )));
        }
        Ok(())
    }

    async fn claim(
        &self,
        request_id: Uuid,
        expected: &[DisbursementStatus],
        transition: Transition,
    ) -> Result<DisbursementRequest> {
        match self.store.transition(request_id, expected, transition).await? {
            TransitionOutcome::Applied(request) => Ok(request),
            TransitionOutcome::Conflict(status) => Err(EngineError::InvalidStateError {
                id: request_id.to_string(),
                action: "execute",
                status,
            }),
        }
    }
}
