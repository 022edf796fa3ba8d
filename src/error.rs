use crate::domain::disbursement::DisbursementStatus;
use std::time::Duration;
use thiserror::Error;

/// Failures reported by a token ledger collaborator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("execution reverted: {0}")]
    Reverted(String),
    #[error("insufficient balance: have {available}, need {requested}")]
    InsufficientBalance { available: u128, requested: u128 },
    #[error("caller is not authorized to mint {token}")]
    MintUnauthorized { token: String },
    #[error("unknown token {0}")]
    UnknownToken(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("transaction {tx_hash} not final after {timeout:?}")]
    FinalityTimeout { tx_hash: String, timeout: Duration },
}

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("{kind} not found: {id}")]
    NotFoundError { kind: &'static str, id: String },
    #[error("Paused: {0}")]
    PausedError(String),
    #[error("Actor {actor} is not allowed to {capability}")]
    AuthorizationError { actor: String, capability: String },
    #[error("Cannot {action} request {id} in {status} status")]
    InvalidStateError {
        id: String,
        action: &'static str,
        status: DisbursementStatus,
    },
    #[error("Routing error: {0}")]
    RoutingError(#[from] LedgerError),
    #[error("Storage error: {0}")]
    StorageError(#[source] Box<dyn std::error::Error + Send + Sync>),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl EngineError {
    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageError(Box::new(std::io::Error::other(message.into())))
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        Self::NotFoundError {
            kind,
            id: id.into(),
        }
    }

    /// True when the ledger gave up waiting for finality. The mutation may still land.
    pub fn is_finality_timeout(&self) -> bool {
        matches!(
            self,
            Self::RoutingError(LedgerError::FinalityTimeout { .. })
        )
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::StorageError(Box::new(err))
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for EngineError {
    fn from(err: rocksdb::Error) -> Self {
        Self::StorageError(Box::new(err))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
