use crate::domain::amount::Address;
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DisbursementStatus {
    Pending,
    Approved,
    Processing,
    Executed,
    Failed,
}

impl DisbursementStatus {
    /// States from which `execute` may claim the request.
    pub const EXECUTABLE: [DisbursementStatus; 2] =
        [DisbursementStatus::Pending, DisbursementStatus::Approved];

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Executed | Self::Failed)
    }

    pub fn is_executable(self) -> bool {
        Self::EXECUTABLE.contains(&self)
    }

    /// Edges of the request lifecycle. Nothing leads back to PENDING.
    pub fn can_transition_to(self, next: DisbursementStatus) -> bool {
        use DisbursementStatus::*;
        matches!(
            (self, next),
            (Pending, Approved)
                | (Pending, Processing)
                | (Approved, Processing)
                | (Approved, Executed)
                | (Approved, Failed)
                | (Processing, Executed)
                | (Processing, Failed)
        )
    }
}

impl fmt::Display for DisbursementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Pending => "PENDING",
            Self::Approved => "APPROVED",
            Self::Processing => "PROCESSING",
            Self::Executed => "EXECUTED",
            Self::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

impl FromStr for DisbursementStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(Self::Pending),
            "APPROVED" => Ok(Self::Approved),
            "PROCESSING" => Ok(Self::Processing),
            "EXECUTED" => Ok(Self::Executed),
            "FAILED" => Ok(Self::Failed),
            other => Err(EngineError::ValidationError(format!(
                "unknown disbursement status '{other}'"
            ))),
        }
    }
}

/// Caller input for a new disbursement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisbursementDraft {
    pub tenant_id: String,
    pub amount: String,
    pub token_address: String,
    pub recipient_address: String,
    pub reason: String,
}

/// A disbursement owned by the workflow. Rows are never deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisbursementRequest {
    pub id: Uuid,
    pub tenant_id: String,
    /// The amount literal as submitted; interpreted by the router at execution.
    pub amount: String,
    pub token_address: Address,
    pub recipient_address: Address,
    pub reason: String,
    pub requested_by: String,
    pub status: DisbursementStatus,
    pub executed_by: Option<String>,
    pub blockchain_tx_hash: Option<String>,
    /// Token decimals captured when the request was created.
    pub token_decimals: Option<u8>,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DisbursementRequest {
    #[allow(clippy::too_many_arguments)]
    pub fn pending(
        tenant_id: String,
        amount: String,
        token_address: Address,
        recipient_address: Address,
        reason: String,
        requested_by: String,
        token_decimals: Option<u8>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            amount,
            token_address,
            recipient_address,
            reason,
            requested_by,
            status: DisbursementStatus::Pending,
            executed_by: None,
            blockchain_tx_hash: None,
            token_decimals,
            failure_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies a status change, refusing edges the lifecycle does not have.
    pub fn apply(&mut self, transition: &Transition) -> Result<()> {
        if !self.status.can_transition_to(transition.to) {
            return Err(EngineError::InvalidStateError {
                id: self.id.to_string(),
                action: "transition",
                status: self.status,
            });
        }

        self.status = transition.to;
        if let Some(executed_by) = &transition.executed_by {
            self.executed_by = Some(executed_by.clone());
        }
        if let Some(tx_hash) = &transition.tx_hash {
            self.blockchain_tx_hash = Some(tx_hash.clone());
        }
        if let Some(reason) = &transition.failure_reason {
            self.failure_reason = Some(reason.clone());
        }
        self.updated_at = transition.at;
        Ok(())
    }
}

/// A status change plus the fields it carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub to: DisbursementStatus,
    pub executed_by: Option<String>,
    pub tx_hash: Option<String>,
    pub failure_reason: Option<String>,
    pub at: DateTime<Utc>,
}

impl Transition {
    pub fn to(status: DisbursementStatus, at: DateTime<Utc>) -> Self {
        Self {
            to: status,
            executed_by: None,
            tx_hash: None,
            failure_reason: None,
            at,
        }
    }

    pub fn executed(executed_by: &str, tx_hash: &str, at: DateTime<Utc>) -> Self {
        Self {
            executed_by: Some(executed_by.to_string()),
            tx_hash: Some(tx_hash.to_string()),
            ..Self::to(DisbursementStatus::Executed, at)
        }
    }

    pub fn failed(reason: impl Into<String>, at: DateTime<Utc>) -> Self {
        Self {
            failure_reason: Some(reason.into()),
            ..Self::to(DisbursementStatus::Failed, at)
        }
    }
}

/// Result of a conditional status update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransitionOutcome {
    Applied(DisbursementRequest),
    /// The stored status was not one of the expected ones; nothing was written.
    Conflict(DisbursementStatus),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> DisbursementRequest {
        DisbursementRequest::pending(
            "t1".to_string(),
            "100".to_string(),
            Address::parse("0x1111111111111111111111111111111111111111").unwrap(),
            Address::parse("0x2222222222222222222222222222222222222222").unwrap(),
            "grant".to_string(),
            "p1".to_string(),
            Some(18),
            Utc::now(),
        )
    }

    #[test]
    fn test_no_edge_back_to_pending() {
        use DisbursementStatus::*;
        for from in [Pending, Approved, Processing, Executed, Failed] {
            assert!(!from.can_transition_to(Pending), "{from} -> PENDING");
        }
    }

    #[test]
    fn test_terminal_states_have_no_exits() {
        use DisbursementStatus::*;
        for from in [Executed, Failed] {
            for to in [Pending, Approved, Processing, Executed, Failed] {
                assert!(!from.can_transition_to(to));
            }
        }
    }

    #[test]
    fn test_execute_path() {
        let mut req = request();
        let now = Utc::now();
        req.apply(&Transition::to(DisbursementStatus::Processing, now))
            .unwrap();
        req.apply(&Transition::executed("tr1", "0xhash", now)).unwrap();

        assert_eq!(req.status, DisbursementStatus::Executed);
        assert_eq!(req.executed_by.as_deref(), Some("tr1"));
        assert_eq!(req.blockchain_tx_hash.as_deref(), Some("0xhash"));
    }

    #[test]
    fn test_pending_cannot_fail_directly() {
        let mut req = request();
        let result = req.apply(&Transition::failed("boom", Utc::now()));
        assert!(matches!(
            result,
            Err(EngineError::InvalidStateError { .. })
        ));
        assert_eq!(req.status, DisbursementStatus::Pending);
    }

    #[test]
    fn test_status_roundtrip_text() {
        assert_eq!(
            "executed".parse::<DisbursementStatus>().unwrap(),
            DisbursementStatus::Executed
        );
        assert_eq!(DisbursementStatus::Processing.to_string(), "PROCESSING");
    }
}
