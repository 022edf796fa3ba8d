use crate::domain::audit::AuditRecord;
use crate::domain::disbursement::{
    DisbursementRequest, DisbursementStatus, Transition, TransitionOutcome,
};
use crate::domain::module::PaymentModule;
use crate::domain::pause::{PauseKey, PauseState};
use crate::domain::ports::{AuditSink, DisbursementStore, ModuleStore, PauseStore};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// A thread-safe in-memory store for pause rows.
///
/// Uses `Arc<RwLock<HashMap<PauseKey, PauseState>>>`; clones share the same rows,
/// which lets tests play "another process" writing behind a registry's back.
#[derive(Default, Clone)]
pub struct InMemoryPauseStore {
    rows: Arc<RwLock<HashMap<PauseKey, PauseState>>>,
}

impl InMemoryPauseStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PauseStore for InMemoryPauseStore {
    async fn upsert(&self, state: PauseState) -> Result<()> {
        let mut rows = self.rows.write().await;
        rows.insert(state.key(), state);
        Ok(())
    }

    async fn get(&self, key: &PauseKey) -> Result<Option<PauseState>> {
        let rows = self.rows.read().await;
        Ok(rows.get(key).cloned())
    }

    async fn active(&self) -> Result<Vec<PauseState>> {
        let rows = self.rows.read().await;
        let mut active: Vec<PauseState> = rows.values().filter(|r| r.is_paused).cloned().collect();
        active.sort_by_key(|row| row.key());
        Ok(active)
    }
}

/// A thread-safe in-memory store for disbursement requests.
///
/// Conditional transitions hold the write lock across check and update, which
/// makes them atomic for every clone of the store.
#[derive(Default, Clone)]
pub struct InMemoryDisbursementStore {
    requests: Arc<RwLock<HashMap<Uuid, DisbursementRequest>>>,
}

impl InMemoryDisbursementStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.requests.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.requests.read().await.is_empty()
    }
}

#[async_trait]
impl DisbursementStore for InMemoryDisbursementStore {
    async fn insert(&self, request: DisbursementRequest) -> Result<()> {
        let mut requests = self.requests.write().await;
        if requests.contains_key(&request.id) {
            return Err(EngineError::storage(format!(
                "disbursement request {} already exists",
                request.id
            )));
        }
        requests.insert(request.id, request);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<DisbursementRequest>> {
        let requests = self.requests.read().await;
        Ok(requests.get(&id).cloned())
    }

    async fn list(
        &self,
        tenant_id: &str,
        status: Option<DisbursementStatus>,
    ) -> Result<Vec<DisbursementRequest>> {
        let requests = self.requests.read().await;
        let mut matching: Vec<DisbursementRequest> = requests
            .values()
            .filter(|r| r.tenant_id == tenant_id)
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect();
        matching.sort_by_key(|r| (r.created_at, r.id));
        Ok(matching)
    }

    async fn transition(
        &self,
        id: Uuid,
        expected: &[DisbursementStatus],
        transition: Transition,
    ) -> Result<TransitionOutcome> {
        let mut requests = self.requests.write().await;
        let request = requests
            .get_mut(&id)
            .ok_or_else(|| EngineError::not_found("disbursement request", id.to_string()))?;

        if !expected.contains(&request.status) {
            return Ok(TransitionOutcome::Conflict(request.status));
        }

        let mut updated = request.clone();
        updated.apply(&transition)?;
        *request = updated.clone();
        Ok(TransitionOutcome::Applied(updated))
    }
}

/// Payment modules keyed by id.
#[derive(Default, Clone)]
pub struct InMemoryModuleStore {
    modules: Arc<RwLock<HashMap<String, PaymentModule>>>,
}

impl InMemoryModuleStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ModuleStore for InMemoryModuleStore {
    async fn insert(&self, module: PaymentModule) -> Result<()> {
        let mut modules = self.modules.write().await;
        if modules.contains_key(&module.module_id) {
            return Err(EngineError::storage(format!(
                "payment module {} already exists",
                module.module_id
            )));
        }
        modules.insert(module.module_id.clone(), module);
        Ok(())
    }

    async fn get(&self, module_id: &str) -> Result<Option<PaymentModule>> {
        Ok(self.modules.read().await.get(module_id).cloned())
    }

    async fn list_by_tenant(&self, tenant_id: &str) -> Result<Vec<PaymentModule>> {
        let modules = self.modules.read().await;
        let mut matching: Vec<PaymentModule> = modules
            .values()
            .filter(|m| m.tenant_id == tenant_id)
            .cloned()
            .collect();
        matching.sort_by(|a, b| (a.created_at, &a.module_id).cmp(&(b.created_at, &b.module_id)));
        Ok(matching)
    }
}

/// Keeps audit records in memory, in append order.
#[derive(Default, Clone)]
pub struct InMemoryAuditSink {
    records: Arc<RwLock<Vec<AuditRecord>>>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<AuditRecord> {
        self.records.read().await.clone()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn append(&self, record: AuditRecord) -> Result<()> {
        self.records.write().await.push(record);
        Ok(())
    }
}
