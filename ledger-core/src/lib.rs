//! DemoBank Ledger Core
//!
//! Account ledger with deposits, withdrawals, and scheduled interest.
//!
//! # Architecture
//!
//! - **Single Writer**: All mutations drain through one actor task, so an
//!   interactive withdrawal never interleaves with a batch job on the same
//!   account
//! - **Atomic Commits**: Each operation writes its account, transaction, and
//!   index entries in one RocksDB `WriteBatch`
//! - **Two-Phase Interest**: A daily job accrues uncommitted entries without
//!   touching balances; a monthly job sweeps them into one balance credit
//!
//! # Invariants
//!
//! - Every committed operation leaves a transaction whose `balance_after`
//!   equals the account balance at commit time
//! - A rejected operation leaves no trace in the store
//! - Daily accrual never changes a balance; only the monthly credit does

#![forbid(unsafe_code)]
#![warn(missing_docs, rust_2018_idioms, unused_qualifications)]

pub mod actor;
pub mod config;
pub mod error;
pub mod interest;
pub mod ledger;
pub mod metrics;
pub mod scheduler;
pub mod storage;
pub mod types;

// Re-exports
pub use config::Config;
pub use error::{Error, Result};
pub use ledger::{AccountSummary, AccrualSummary, BatchError, CreditSummary, Ledger, LedgerStats};
pub use scheduler::Scheduler;
pub use storage::Storage;
pub use types::{
    Account, InterestEntry, NewAccount, OperationKind, Role, Transaction, TransactionKind,
};
