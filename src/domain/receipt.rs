use crate::domain::amount::{Address, TokenAmount};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which ledger mutation funded a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum FundingSource {
    Transfer,
    Mint,
}

impl fmt::Display for FundingSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FundingSource::Transfer => f.write_str("TRANSFER"),
            FundingSource::Mint => f.write_str("MINT"),
        }
    }
}

/// A submitted but not yet final ledger mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingTransaction {
    pub tx_hash: String,
    pub source: FundingSource,
    pub from: Address,
    pub to: Address,
    pub amount: TokenAmount,
}

/// Outcome of a finalized payment. The caller persists it; the router does not.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub tx_hash: String,
    pub from: Address,
    pub to: Address,
    pub amount: TokenAmount,
    pub block_number: u64,
    pub source: FundingSource,
}
