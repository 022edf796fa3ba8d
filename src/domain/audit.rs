use crate::domain::actor::Actor;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditAction {
    DisbursementRequest,
    DisbursementExecute,
    DisbursementFailed,
    PauseSet,
    ModuleEnable,
    PaymentSent,
    Error,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AuditAction::DisbursementRequest => "DISBURSEMENT_REQUEST",
            AuditAction::DisbursementExecute => "DISBURSEMENT_EXECUTE",
            AuditAction::DisbursementFailed => "DISBURSEMENT_FAILED",
            AuditAction::PauseSet => "PAUSE_SET",
            AuditAction::ModuleEnable => "MODULE_ENABLE",
            AuditAction::PaymentSent => "PAYMENT_SENT",
            AuditAction::Error => "ERROR",
        };
        f.write_str(s)
    }
}

/// Subsystem an audit record is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum AuditResource {
    Program,
    Treasury,
    Admin,
    Router,
    Module,
    PauseRegistry,
}

/// One append-only audit entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub id: Uuid,
    pub action: AuditAction,
    pub resource: AuditResource,
    pub actor_id: Option<String>,
    pub tenant_id: Option<String>,
    pub payload: Value,
    pub recorded_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(
        action: AuditAction,
        resource: AuditResource,
        payload: Value,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            action,
            resource,
            actor_id: None,
            tenant_id: None,
            payload,
            recorded_at,
        }
    }

    pub fn by(mut self, actor: &Actor) -> Self {
        self.actor_id = Some(actor.id.clone());
        self
    }

    pub fn for_tenant(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }
}
