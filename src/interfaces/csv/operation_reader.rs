use crate::application::payments::SendPayment;
use crate::domain::actor::{Actor, Role};
use crate::domain::amount::AmountUnit;
use crate::domain::disbursement::DisbursementDraft;
use crate::domain::module::ModuleDraft;
use crate::domain::pause::PauseScope;
use crate::error::{EngineError, Result};
use serde::Deserialize;
use std::io::Read;

/// One row of an operations file, as written.
#[derive(Debug, Clone, Default, Deserialize)]
struct OperationRecord {
    op: String,
    actor: String,
    #[serde(default)]
    roles: String,
    #[serde(default)]
    tenant: String,
    #[serde(default)]
    reference: Option<String>,
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    recipient: Option<String>,
    #[serde(default)]
    amount: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

/// An engine call decoded from an operations file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// File a disbursement; `reference` names it for later `execute` rows.
    Request {
        actor: Actor,
        reference: Option<String>,
        draft: DisbursementDraft,
    },
    /// Execute the request previously filed under `reference`.
    Execute { actor: Actor, reference: String },
    SetPause {
        actor: Actor,
        scope: PauseScope,
        target: Option<String>,
        paused: bool,
        reason: String,
    },
    /// Attach a payments module, named by the `target` column, to `token`.
    EnableModule { actor: Actor, draft: ModuleDraft },
    Send { actor: Actor, payment: SendPayment },
}

impl Operation {
    pub fn actor(&self) -> &Actor {
        match self {
            Operation::Request { actor, .. }
            | Operation::Execute { actor, .. }
            | Operation::SetPause { actor, .. }
            | Operation::EnableModule { actor, .. }
            | Operation::Send { actor, .. } => actor,
        }
    }
}

fn required(field: Option<String>, name: &str, op: &str) -> Result<String> {
    field
        .filter(|value| !value.is_empty())
        .ok_or_else(|| EngineError::ValidationError(format!("'{op}' requires a {name}")))
}

fn non_empty(field: Option<String>) -> Option<String> {
    field.filter(|value| !value.is_empty())
}

impl TryFrom<OperationRecord> for Operation {
    type Error = EngineError;

    fn try_from(record: OperationRecord) -> Result<Self> {
        if record.actor.is_empty() {
            return Err(EngineError::ValidationError(
                "every operation needs an actor".to_string(),
            ));
        }
        let roles = record
            .roles
            .split('|')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::parse::<Role>)
            .collect::<Result<Vec<_>>>()?;
        let actor = Actor::new(record.actor, record.tenant.clone(), roles);

        let op = record.op.to_ascii_lowercase();
        match op.as_str() {
            "request" => Ok(Operation::Request {
                draft: DisbursementDraft {
                    tenant_id: record.tenant,
                    amount: required(record.amount, "amount", &op)?,
                    token_address: required(record.token, "token", &op)?,
                    recipient_address: required(record.recipient, "recipient", &op)?,
                    reason: record.reason.unwrap_or_default(),
                },
                reference: non_empty(record.reference),
                actor,
            }),
            "execute" => Ok(Operation::Execute {
                reference: required(record.reference, "reference", &op)?,
                actor,
            }),
            "pause" | "unpause" => Ok(Operation::SetPause {
                scope: required(record.scope, "scope", &op)?.parse()?,
                target: non_empty(record.target),
                paused: op == "pause",
                reason: record.reason.unwrap_or_default(),
                actor,
            }),
            "enable" => Ok(Operation::EnableModule {
                draft: ModuleDraft {
                    module_id: non_empty(record.target),
                    token_address: required(record.token, "token", &op)?,
                    tenant_id: record.tenant,
                    token_decimals: None,
                },
                actor,
            }),
            "send" => Ok(Operation::Send {
                payment: SendPayment {
                    token_address: required(record.token, "token", &op)?,
                    to: required(record.recipient, "recipient", &op)?,
                    amount: required(record.amount, "amount", &op)?,
                    unit: AmountUnit::Inferred,
                    decimals: None,
                    module_id: non_empty(record.target),
                },
                actor,
            }),
            other => Err(EngineError::ValidationError(format!(
                "unknown operation '{other}'"
            ))),
        }
    }
}

/// Reads engine operations from a CSV source.
///
/// Columns: `op, actor, roles, tenant, reference, token, recipient, amount,
/// scope, target, reason`. Roles are `|`-separated. Trailing columns a row does
/// not need may be omitted. `target` carries the module id of `enable` and
/// `send` rows.
pub struct OperationReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> OperationReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily decodes operations; a bad row yields an error and reading continues.
    pub fn operations(self) -> impl Iterator<Item = Result<Operation>> {
        self.reader
            .into_deserialize::<OperationRecord>()
            .map(|result| result.map_err(EngineError::from).and_then(Operation::try_from))
    }
}
