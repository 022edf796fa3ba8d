use crate::domain::amount::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A tenant's payments configuration, bound to an existing token contract.
///
/// Its `module_id` is the target of MODULE-scope pauses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentModule {
    pub module_id: String,
    pub tenant_id: String,
    pub token_address: Address,
    /// Decimals payments through this module are scaled with. `None` defers to
    /// the token itself at routing time.
    pub token_decimals: Option<u8>,
    pub enabled_by: String,
    pub created_at: DateTime<Utc>,
}

/// Caller input for attaching a payments module to a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleDraft {
    /// Chosen id; a fresh UUID is assigned when absent.
    pub module_id: Option<String>,
    pub tenant_id: String,
    pub token_address: String,
    pub token_decimals: Option<u8>,
}
