//! Core types for the ledger
//!
//! All types are designed for:
//! - Deterministic serialization (bincode)
//! - Memory safety (no unsafe code)
//! - Exact arithmetic (Decimal for money)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Settings key for the annual interest rate applied to new accounts.
pub const SETTING_DEFAULT_INTEREST_RATE: &str = "default_interest_rate";

/// Account role
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum Role {
    /// Regular customer account
    Standard = 1,
    /// Administrator account (cannot be deleted)
    Administrator = 2,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Standard => write!(f, "standard"),
            Role::Administrator => write!(f, "administrator"),
        }
    }
}

/// A customer account
///
/// The balance changes only through an account operation (deposit/withdraw)
/// or a monthly interest credit; the rate only through the admin rate
/// operation. Both invariants are enforced by routing all mutations through
/// the single-writer actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique account ID
    pub id: Uuid,

    /// Display name
    pub name: String,

    /// Login identifier (unique across accounts)
    pub email: String,

    /// Credential hash (opaque to the core; hashing lives in the auth layer)
    pub password_hash: String,

    /// Current balance (exact decimal)
    pub balance: Decimal,

    /// Annual interest rate in percent (>= 0)
    pub interest_rate: Decimal,

    /// Account role
    pub role: Role,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Whether this account holds the administrator role
    pub fn is_admin(&self) -> bool {
        self.role == Role::Administrator
    }
}

/// Parameters for registering a new account
#[derive(Debug, Clone)]
pub struct NewAccount {
    /// Display name
    pub name: String,
    /// Login identifier
    pub email: String,
    /// Credential hash supplied by the auth layer
    pub password_hash: String,
    /// Role (defaults to `Standard` for self-registration)
    pub role: Role,
    /// Annual rate override; `None` uses the default-rate setting in effect
    /// at registration time
    pub rate_override: Option<Decimal>,
}

impl NewAccount {
    /// Standard self-registration: rate comes from the default-rate setting.
    pub fn standard(
        name: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            role: Role::Standard,
            rate_override: None,
        }
    }
}

/// Interactive operation kind (closed set; `interest` transactions are
/// produced only by the crediting engine, never requested by callers)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum OperationKind {
    /// Credit the account
    Deposit = 1,
    /// Debit the account
    Withdraw = 2,
}

impl OperationKind {
    /// Transaction kind recorded for this operation
    pub fn transaction_kind(&self) -> TransactionKind {
        match self {
            OperationKind::Deposit => TransactionKind::Deposit,
            OperationKind::Withdraw => TransactionKind::Withdraw,
        }
    }

    /// Signed transaction amount: positive for credits, negative for debits
    pub fn signed_amount(&self, amount: Decimal) -> Decimal {
        match self {
            OperationKind::Deposit => amount,
            OperationKind::Withdraw => -amount,
        }
    }

    /// Description used when the caller supplies none
    pub fn default_description(&self) -> &'static str {
        match self {
            OperationKind::Deposit => "Deposit transaction",
            OperationKind::Withdraw => "Withdraw transaction",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Deposit => write!(f, "deposit"),
            OperationKind::Withdraw => write!(f, "withdraw"),
        }
    }
}

/// Transaction kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum TransactionKind {
    /// Customer or admin deposit
    Deposit = 1,
    /// Customer or admin withdrawal
    Withdraw = 2,
    /// Monthly interest credit
    Interest = 3,
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransactionKind::Deposit => write!(f, "deposit"),
            TransactionKind::Withdraw => write!(f, "withdraw"),
            TransactionKind::Interest => write!(f, "interest"),
        }
    }
}

/// Immutable ledger entry recording one balance mutation
///
/// Created once at the moment the mutation commits; never updated, deleted
/// only via cascading account deletion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique transaction ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Owning account
    pub account_id: Uuid,

    /// Signed amount: positive = credit, negative = debit
    pub amount: Decimal,

    /// Kind of mutation
    pub kind: TransactionKind,

    /// Free-text description
    pub description: String,

    /// Application timestamp
    pub timestamp: DateTime<Utc>,

    /// Balance immediately after this transaction was applied.
    /// A point-in-time snapshot, never recomputed later.
    pub balance_after: Decimal,
}

/// Record of one interest computation
///
/// Daily accruals (`committed = false`) are informational until swept into a
/// monthly credit (`committed = true`); the monthly entry coincides with a
/// `Transaction` of kind `Interest`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterestEntry {
    /// Unique entry ID (UUIDv7 for time-ordering)
    pub id: Uuid,

    /// Owning account
    pub account_id: Uuid,

    /// Computed interest amount
    pub amount: Decimal,

    /// Balance the interest was computed against
    pub balance_used: Decimal,

    /// Annual rate in percent used for the computation
    pub rate_used: Decimal,

    /// False = daily accrual, not yet credited; true = monthly credit,
    /// committed to the balance
    pub committed: bool,

    /// ID of the monthly credit entry that swept this daily accrual.
    /// `None` until swept; the crediting engine only sums unswept entries,
    /// which makes re-running a credit inside the lookback window a no-op.
    #[serde(default)]
    pub credited_by: Option<Uuid>,

    /// Computation timestamp
    pub timestamp: DateTime<Utc>,
}

impl InterestEntry {
    /// Whether this daily accrual has already been folded into a monthly
    /// credit
    pub fn is_swept(&self) -> bool {
        self.credited_by.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signed_amounts() {
        let amount = Decimal::new(12345, 2); // 123.45
        assert_eq!(OperationKind::Deposit.signed_amount(amount), amount);
        assert_eq!(OperationKind::Withdraw.signed_amount(amount), -amount);
    }

    #[test]
    fn test_operation_transaction_kind() {
        assert_eq!(
            OperationKind::Deposit.transaction_kind(),
            TransactionKind::Deposit
        );
        assert_eq!(
            OperationKind::Withdraw.transaction_kind(),
            TransactionKind::Withdraw
        );
    }

    #[test]
    fn test_default_descriptions() {
        assert_eq!(
            OperationKind::Deposit.default_description(),
            "Deposit transaction"
        );
        assert_eq!(
            OperationKind::Withdraw.default_description(),
            "Withdraw transaction"
        );
    }

    #[test]
    fn test_entry_sweep_flag() {
        let entry = InterestEntry {
            id: Uuid::now_v7(),
            account_id: Uuid::now_v7(),
            amount: Decimal::new(1370, 4),
            balance_used: Decimal::from(1000),
            rate_used: Decimal::new(50, 1),
            committed: false,
            credited_by: None,
            timestamp: Utc::now(),
        };
        assert!(!entry.is_swept());

        let swept = InterestEntry {
            credited_by: Some(Uuid::now_v7()),
            ..entry
        };
        assert!(swept.is_swept());
    }
}
