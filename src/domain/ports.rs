use super::amount::{Address, TokenAmount};
use super::audit::AuditRecord;
use super::disbursement::{DisbursementRequest, DisbursementStatus, Transition, TransitionOutcome};
use super::module::PaymentModule;
use super::pause::{PauseKey, PauseState};
use super::receipt::{PaymentReceipt, PendingTransaction};
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

/// Durable storage of circuit-breaker rows.
#[async_trait]
pub trait PauseStore: Send + Sync {
    /// Inserts or replaces the row for `state.key()`.
    async fn upsert(&self, state: PauseState) -> Result<()>;
    async fn get(&self, key: &PauseKey) -> Result<Option<PauseState>>;
    /// Every row with `is_paused == true`.
    async fn active(&self) -> Result<Vec<PauseState>>;
}

/// Durable storage of disbursement requests.
#[async_trait]
pub trait DisbursementStore: Send + Sync {
    /// Stores a new request. Fails if the id already exists.
    async fn insert(&self, request: DisbursementRequest) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<DisbursementRequest>>;
    async fn list(
        &self,
        tenant_id: &str,
        status: Option<DisbursementStatus>,
    ) -> Result<Vec<DisbursementRequest>>;
    /// Applies `transition` only if the stored status is one of `expected`.
    ///
    /// Check and write happen atomically with respect to other callers of this
    /// method on the same store. Unknown ids fail with `NotFoundError`.
    async fn transition(
        &self,
        id: Uuid,
        expected: &[DisbursementStatus],
        transition: Transition,
    ) -> Result<TransitionOutcome>;
}

/// Durable storage of payment modules.
#[async_trait]
pub trait ModuleStore: Send + Sync {
    /// Stores a new module. Fails if the id already exists.
    async fn insert(&self, module: PaymentModule) -> Result<()>;
    async fn get(&self, module_id: &str) -> Result<Option<PaymentModule>>;
    async fn list_by_tenant(&self, tenant_id: &str) -> Result<Vec<PaymentModule>>;
}

/// Append-only audit trail.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn append(&self, record: AuditRecord) -> Result<()>;
}

/// A token contract reachable through the treasury signer.
#[async_trait]
pub trait TokenLedger: Send + Sync {
    async fn decimals(&self, token: &Address) -> std::result::Result<u8, LedgerError>;
    async fn treasury(&self, token: &Address) -> std::result::Result<Address, LedgerError>;
    async fn balance_of(
        &self,
        token: &Address,
        owner: &Address,
    ) -> std::result::Result<u128, LedgerError>;
    async fn transfer(
        &self,
        token: &Address,
        to: &Address,
        amount: TokenAmount,
    ) -> std::result::Result<PendingTransaction, LedgerError>;
    async fn mint(
        &self,
        token: &Address,
        to: &Address,
        amount: TokenAmount,
    ) -> std::result::Result<PendingTransaction, LedgerError>;
    /// Suspends until the transaction is final.
    async fn wait_for_finality(
        &self,
        pending: PendingTransaction,
    ) -> std::result::Result<PaymentReceipt, LedgerError>;
}

pub type PauseStoreBox = Box<dyn PauseStore>;
pub type DisbursementStoreBox = Box<dyn DisbursementStore>;
pub type ModuleStoreBox = Box<dyn ModuleStore>;
pub type AuditSinkRef = Arc<dyn AuditSink>;
pub type TokenLedgerRef = Arc<dyn TokenLedger>;
