use crate::domain::audit::AuditRecord;
use crate::domain::ports::AuditSink;
use crate::error::Result;
use async_trait::async_trait;
use tracing::info;

/// Emits each audit record as a structured `tracing` event under the
/// `payroute::audit` target, for deployments that ship logs as the audit trail.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingAuditSink;

#[async_trait]
impl AuditSink for TracingAuditSink {
    async fn append(&self, record: AuditRecord) -> Result<()> {
        info!(
            target: "payroute::audit",
            id = %record.id,
            action = %record.action,
            resource = ?record.resource,
            actor = record.actor_id.as_deref().unwrap_or("-"),
            tenant = record.tenant_id.as_deref().unwrap_or("-"),
            payload = %record.payload,
            recorded_at = %record.recorded_at,
        );
        Ok(())
    }
}

/// Forwards every record to each inner sink in order. The first failure is
/// returned after all sinks have been tried.
pub struct FanOutAuditSink {
    sinks: Vec<crate::domain::ports::AuditSinkRef>,
}

impl FanOutAuditSink {
    pub fn new(sinks: Vec<crate::domain::ports::AuditSinkRef>) -> Self {
        Self { sinks }
    }
}

#[async_trait]
impl AuditSink for FanOutAuditSink {
    async fn append(&self, record: AuditRecord) -> Result<()> {
        let mut first_error = None;
        for sink in &self.sinks {
            if let Err(e) = sink.append(record.clone()).await {
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}
