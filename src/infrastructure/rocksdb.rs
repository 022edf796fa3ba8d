use crate::domain::audit::AuditRecord;
use crate::domain::disbursement::{
    DisbursementRequest, DisbursementStatus, Transition, TransitionOutcome,
};
use crate::domain::module::PaymentModule;
use crate::domain::pause::{PauseKey, PauseState};
use crate::domain::ports::{AuditSink, DisbursementStore, ModuleStore, PauseStore};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Column Family for pause rows, keyed by `SCOPE:target`.
pub const CF_PAUSES: &str = "pauses";
/// Column Family for disbursement requests, keyed by request id bytes.
pub const CF_DISBURSEMENTS: &str = "disbursements";
/// Column Family for payment modules, keyed by module id.
pub const CF_MODULES: &str = "modules";
/// Column Family for the audit trail, keyed by a big-endian sequence number.
pub const CF_AUDIT: &str = "audit";

/// A persistent store implementation using RocksDB.
///
/// Handles pause rows, disbursement requests, payment modules and audit records using separate
/// Column Families. Values are JSON.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
/// Conditional transitions and audit appends are serialized through a
/// process-local lock; the database must not be shared between processes.
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    write_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_PAUSES, CF_DISBURSEMENTS, CF_MODULES, CF_AUDIT]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| EngineError::storage(format!("{name} column family not found")))
    }

    fn put<T: Serialize>(&self, cf: &str, key: &[u8], value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;
        self.db.put_cf(&self.cf(cf)?, key, bytes)?;
        Ok(())
    }

    fn read<T: DeserializeOwned>(&self, cf: &str, key: &[u8]) -> Result<Option<T>> {
        match self.db.get_pinned_cf(&self.cf(cf)?, key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf: &str) -> Result<Vec<T>> {
        let handle = self.cf(cf)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(handle, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(serde_json::from_slice(&value)?);
        }
        Ok(values)
    }

    fn next_audit_seq(&self) -> Result<u64> {
        let handle = self.cf(CF_AUDIT)?;
        match self.db.iterator_cf(handle, IteratorMode::End).next() {
            Some(item) => {
                let (key, _) = item?;
                let bytes: [u8; 8] = key[..]
                    .try_into()
                    .map_err(|_| EngineError::storage("malformed audit key"))?;
                Ok(u64::from_be_bytes(bytes) + 1)
            }
            None => Ok(0),
        }
    }

    /// Every audit record, oldest first.
    pub fn audit_records(&self) -> Result<Vec<AuditRecord>> {
        self.scan(CF_AUDIT)
    }

    /// Every disbursement request of every tenant, oldest first.
    pub fn all_requests(&self) -> Result<Vec<DisbursementRequest>> {
        let mut requests: Vec<DisbursementRequest> = self.scan(CF_DISBURSEMENTS)?;
        requests.sort_by_key(|r| (r.created_at, r.id));
        Ok(requests)
    }
}

fn pause_key_bytes(key: &PauseKey) -> Vec<u8> {
    key.to_string().into_bytes()
}

#[async_trait]
impl PauseStore for RocksDBStore {
    async fn upsert(&self, state: PauseState) -> Result<()> {
        self.put(CF_PAUSES, &pause_key_bytes(&state.key()), &state)
    }

    async fn get(&self, key: &PauseKey) -> Result<Option<PauseState>> {
        self.read(CF_PAUSES, &pause_key_bytes(key))
    }

    async fn active(&self) -> Result<Vec<PauseState>> {
        let rows: Vec<PauseState> = self.scan(CF_PAUSES)?;
        Ok(rows.into_iter().filter(|row| row.is_paused).collect())
    }
}

#[async_trait]
impl DisbursementStore for RocksDBStore {
    async fn insert(&self, request: DisbursementRequest) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = request.id.as_bytes();
        if self.db.get_pinned_cf(&self.cf(CF_DISBURSEMENTS)?, key)?.is_some() {
            return Err(EngineError::storage(format!(
                "disbursement request {} already exists",
                request.id
            )));
        }
        self.put(CF_DISBURSEMENTS, key, &request)
    }

    async fn get(&self, id: Uuid) -> Result<Option<DisbursementRequest>> {
        self.read(CF_DISBURSEMENTS, id.as_bytes())
    }

    async fn list(
        &self,
        tenant_id: &str,
        status: Option<DisbursementStatus>,
    ) -> Result<Vec<DisbursementRequest>> {
        Ok(self
            .all_requests()?
            .into_iter()
            .filter(|r| r.tenant_id == tenant_id)
            .filter(|r| status.is_none_or(|s| r.status == s))
            .collect())
    }

    async fn transition(
        &self,
        id: Uuid,
        expected: &[DisbursementStatus],
        transition: Transition,
    ) -> Result<TransitionOutcome> {
        let _guard = self.write_lock.lock().await;
        let mut request: DisbursementRequest = self
            .read(CF_DISBURSEMENTS, id.as_bytes())?
            .ok_or_else(|| EngineError::not_found("disbursement request", id.to_string()))?;

        if !expected.contains(&request.status) {
            return Ok(TransitionOutcome::Conflict(request.status));
        }

        request.apply(&transition)?;
        self.put(CF_DISBURSEMENTS, id.as_bytes(), &request)?;
        Ok(TransitionOutcome::Applied(request))
    }
}

#[async_trait]
impl ModuleStore for RocksDBStore {
    async fn insert(&self, module: PaymentModule) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let key = module.module_id.as_bytes();
        if self.db.get_pinned_cf(&self.cf(CF_MODULES)?, key)?.is_some() {
            return Err(EngineError::storage(format!(
                "payment module {} already exists",
                module.module_id
            )));
        }
        self.put(CF_MODULES, key, &module)
    }

    async fn get(&self, module_id: &str) -> Result<Option<PaymentModule>> {
        self.read(CF_MODULES, module_id.as_bytes())
    }

    async fn list_by_tenant(&self, tenant_id: &str) -> Result<Vec<PaymentModule>> {
        let mut modules: Vec<PaymentModule> = self
            .scan::<PaymentModule>(CF_MODULES)?
            .into_iter()
            .filter(|m| m.tenant_id == tenant_id)
            .collect();
        modules.sort_by(|a, b| (a.created_at, &a.module_id).cmp(&(b.created_at, &b.module_id)));
        Ok(modules)
    }
}

#[async_trait]
impl AuditSink for RocksDBStore {
    async fn append(&self, record: AuditRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        let seq = self.next_audit_seq()?;
        self.put(CF_AUDIT, &seq.to_be_bytes(), &record)
    }
}
