//! Application layer containing the engine's business logic.
//!
//! Components are built leaf-first: the [`pause_registry::PauseRegistry`] guards
//! money movement, the [`router::PaymentRouter`] decides how a payment is funded,
//! [`modules::ModuleRegistry`] knows which payment modules exist, and
//! [`disbursement::DisbursementWorkflow`] and [`payments::PaymentService`]
//! expose the gated operations. [`engine::PaymentEngine`] wires them together.

pub mod disbursement;
pub mod engine;
pub mod modules;
pub mod pause_registry;
pub mod payments;
pub mod router;

use crate::domain::audit::AuditRecord;
use crate::domain::ports::AuditSinkRef;
use tracing::error;

/// Appends to the audit trail. A failed append is logged and never changes the
/// outcome of the operation being audited.
pub(crate) async fn record_audit(sink: &AuditSinkRef, record: AuditRecord) {
    let action = record.action;
    if let Err(e) = sink.append(record).await {
        error!(%action, error = %e, "failed to append audit record");
    }
}
