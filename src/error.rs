use crate::domain::advance::AdvanceStatus;
use rust_decimal::Decimal;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, AdvanceError>;

#[derive(Error, Debug)]
pub enum AdvanceError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition {
        from: AdvanceStatus,
        to: AdvanceStatus,
    },
    #[error("Requested {requested} exceeds available advance of {available}")]
    EligibilityExceeded {
        requested: Decimal,
        available: Decimal,
    },
    #[error("Requested {requested} exceeds approved balance of {available}")]
    InsufficientApprovedBalance {
        requested: Decimal,
        available: Decimal,
    },
    #[error("Advance requests are suspended")]
    SuspensionActive,
    #[error("Payment network error: {0}")]
    Network(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    Storage(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}
