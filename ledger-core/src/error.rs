//! Error types for the ledger

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Result type for ledger operations
pub type Result<T> = std::result::Result<T, Error>;

/// Ledger errors
#[derive(Error, Debug)]
pub enum Error {
    /// Operation amount was zero or negative
    #[error("Invalid amount: {0} (must be positive)")]
    InvalidAmount(Decimal),

    /// Interest rate was negative
    #[error("Invalid interest rate: {0} (must be >= 0)")]
    InvalidRate(Decimal),

    /// Withdrawal exceeds the current balance
    #[error("Insufficient funds: requested {requested}, available {available}")]
    InsufficientFunds {
        /// Amount the caller tried to withdraw
        requested: Decimal,
        /// Balance at the time of the attempt
        available: Decimal,
    },

    /// Account ID did not resolve
    #[error("Account not found: {0}")]
    AccountNotFound(Uuid),

    /// Login identifier already registered
    #[error("Email already registered: {0}")]
    EmailTaken(String),

    /// Administrator accounts cannot be deleted
    #[error("Cannot delete administrator account: {0}")]
    AdminUndeletable(Uuid),

    /// Storage error (RocksDB)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    /// Concurrency error (actor mailbox closed, etc.)
    #[error("Concurrency error: {0}")]
    Concurrency(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rocksdb::Error> for Error {
    fn from(err: rocksdb::Error) -> Self {
        Error::Storage(err.to_string())
    }
}

impl Error {
    /// Whether this error is a pre-mutation rejection (no side effects).
    /// Validation-class errors are always raised before any write.
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::InvalidAmount(_)
                | Error::InvalidRate(_)
                | Error::InsufficientFunds { .. }
                | Error::AccountNotFound(_)
                | Error::EmailTaken(_)
                | Error::AdminUndeletable(_)
        )
    }
}
