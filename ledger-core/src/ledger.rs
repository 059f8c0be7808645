//! Main ledger orchestration layer
//!
//! This module ties together storage, the single-writer actor, and the
//! interest engines into a high-level API for the request-serving and
//! scheduler layers.
//!
//! # Example
//!
//! ```no_run
//! use ledger_core::{Config, Ledger, NewAccount, OperationKind};
//! use rust_decimal::Decimal;
//!
//! #[tokio::main]
//! async fn main() -> ledger_core::Result<()> {
//!     let config = Config::default();
//!     let ledger = Ledger::open(config).await?;
//!
//!     let account = ledger
//!         .register_account(NewAccount::standard("Alice", "alice@example.com", "hash"))
//!         .await?;
//!     let (account, _tx) = ledger
//!         .perform_operation(account.id, Decimal::from(100), OperationKind::Deposit, None)
//!         .await?;
//!     assert_eq!(account.balance, Decimal::from(100));
//!
//!     Ok(())
//! }
//! ```

use crate::{
    actor::{spawn_ledger_actor, LedgerHandle},
    interest,
    metrics::Metrics,
    types::{
        Account, InterestEntry, NewAccount, OperationKind, Role, Transaction,
        SETTING_DEFAULT_INTEREST_RATE,
    },
    Config, Error, Result, Storage,
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Recent transactions returned in an account summary
const SUMMARY_TRANSACTION_LIMIT: usize = 5;

/// Interest entries returned in an account summary
const SUMMARY_INTEREST_LIMIT: usize = 10;

/// One account's failure inside a batch job
#[derive(Debug, Clone)]
pub struct BatchError {
    /// Account whose step failed
    pub account_id: Uuid,
    /// Rendered error
    pub message: String,
}

/// Result of one daily accrual run
#[derive(Debug, Clone, Default)]
pub struct AccrualSummary {
    /// Accounts for which an accrual entry was appended
    pub accounts_processed: usize,
    /// Per-account failures (the run itself always completes)
    pub errors: Vec<BatchError>,
}

/// Result of one monthly credit run
#[derive(Debug, Clone, Default)]
pub struct CreditSummary {
    /// Accounts whose balance was credited
    pub accounts_credited: usize,
    /// Sum credited across all accounts
    pub total_credited: Decimal,
    /// Per-account failures (the run itself always completes)
    pub errors: Vec<BatchError>,
}

/// Dashboard view of one account
#[derive(Debug, Clone)]
pub struct AccountSummary {
    /// The account
    pub account: Account,
    /// Interest one day at the current balance and rate would accrue
    pub daily_interest: Decimal,
    /// Projected interest over a 30-day month
    pub projected_monthly_interest: Decimal,
    /// Most recent transactions, newest first
    pub recent_transactions: Vec<Transaction>,
    /// Most recent interest entries, newest first
    pub interest_history: Vec<InterestEntry>,
}

/// Aggregate statistics over standard accounts
#[derive(Debug, Clone)]
pub struct LedgerStats {
    /// Number of standard accounts
    pub total_accounts: usize,
    /// Sum of standard-account balances
    pub total_balance: Decimal,
    /// Mean annual rate across standard accounts (zero when none)
    pub average_rate: Decimal,
    /// Committed monthly interest over the past 30 days, all accounts
    pub monthly_interest_paid: Decimal,
}

/// Main ledger interface
pub struct Ledger {
    /// Actor handle for mutations
    handle: LedgerHandle,

    /// Direct storage access (for reads)
    storage: Arc<Storage>,

    /// Metrics collector
    metrics: Metrics,

    /// Configuration
    config: Config,
}

impl Ledger {
    /// Open ledger with configuration
    pub async fn open(config: Config) -> Result<Self> {
        let storage = Arc::new(Storage::open(&config)?);
        let metrics = Metrics::new()
            .map_err(|e| Error::Config(format!("Failed to create metrics: {}", e)))?;

        let handle = spawn_ledger_actor(
            storage.clone(),
            metrics.clone(),
            config.default_interest_rate,
        );

        Ok(Self {
            handle,
            storage,
            metrics,
            config,
        })
    }

    /// Metrics collector (for exposition by the serving layer)
    pub fn metrics(&self) -> &Metrics {
        &self.metrics
    }

    /// Configuration this ledger was opened with
    pub fn config(&self) -> &Config {
        &self.config
    }

    // Mutations (serialized through the actor)

    /// Register a new account. The rate is the default-rate setting in
    /// effect right now; later changes to the setting do not apply
    /// retroactively.
    pub async fn register_account(&self, new: NewAccount) -> Result<Account> {
        self.handle.register_account(new).await
    }

    /// Apply a deposit or withdrawal and record its transaction.
    ///
    /// Fails with `InvalidAmount` for non-positive amounts,
    /// `AccountNotFound` for unknown accounts, and `InsufficientFunds` when
    /// a withdrawal exceeds the balance; none of these leave any trace in
    /// the store.
    pub async fn perform_operation(
        &self,
        account_id: Uuid,
        amount: Decimal,
        kind: OperationKind,
        description: Option<String>,
    ) -> Result<(Account, Transaction)> {
        self.handle
            .perform_operation(account_id, amount, kind, description)
            .await
    }

    /// Set one account's annual rate (admin operation)
    pub async fn set_account_rate(&self, account_id: Uuid, rate: Decimal) -> Result<Account> {
        self.handle.set_account_rate(account_id, rate).await
    }

    /// Set the default rate applied to future registrations (admin
    /// operation)
    pub async fn set_default_rate(&self, rate: Decimal) -> Result<()> {
        self.handle.set_default_rate(rate).await
    }

    /// Delete an account and its transactions and interest entries.
    /// Administrator accounts are refused.
    pub async fn delete_account(&self, account_id: Uuid) -> Result<()> {
        self.handle.delete_account(account_id).await
    }

    // Reads (straight to storage)

    /// Get account by ID
    pub fn account(&self, account_id: Uuid) -> Result<Account> {
        self.storage.get_account(account_id)
    }

    /// Get account by login identifier
    pub fn account_by_email(&self, email: &str) -> Result<Option<Account>> {
        match self.storage.account_id_by_email(email)? {
            Some(id) => Ok(Some(self.storage.get_account(id)?)),
            None => Ok(None),
        }
    }

    /// All accounts (admin listing)
    pub fn all_accounts(&self) -> Result<Vec<Account>> {
        self.storage.all_accounts()
    }

    /// Transactions for an account, newest first
    pub fn transactions(&self, account_id: Uuid, limit: usize) -> Result<Vec<Transaction>> {
        self.storage.transactions_for_account(account_id, limit)
    }

    /// Interest entries for an account, newest first
    pub fn interest_history(&self, account_id: Uuid, limit: usize) -> Result<Vec<InterestEntry>> {
        self.storage.interest_history(account_id, limit)
    }

    /// Default rate currently applied at registration
    pub fn default_rate(&self) -> Result<Decimal> {
        Ok(self
            .storage
            .get_setting(SETTING_DEFAULT_INTEREST_RATE)?
            .unwrap_or(self.config.default_interest_rate))
    }

    /// Dashboard view of one account
    pub fn account_summary(&self, account_id: Uuid) -> Result<AccountSummary> {
        let account = self.storage.get_account(account_id)?;
        let daily_interest = interest::daily_amount(account.balance, account.interest_rate);
        let projected_monthly_interest =
            interest::projected_monthly(account.balance, account.interest_rate);
        let recent_transactions = self
            .storage
            .transactions_for_account(account_id, SUMMARY_TRANSACTION_LIMIT)?;
        let interest_history = self
            .storage
            .interest_history(account_id, SUMMARY_INTEREST_LIMIT)?;

        Ok(AccountSummary {
            account,
            daily_interest,
            projected_monthly_interest,
            recent_transactions,
            interest_history,
        })
    }

    /// Aggregate statistics over standard accounts (admin dashboard)
    pub fn stats(&self, now: DateTime<Utc>) -> Result<LedgerStats> {
        let accounts = self.storage.all_accounts()?;
        self.metrics.set_accounts(accounts.len() as i64);

        let standard: Vec<&Account> =
            accounts.iter().filter(|a| a.role == Role::Standard).collect();

        let total_balance: Decimal = standard.iter().map(|a| a.balance).sum();
        let average_rate = if standard.is_empty() {
            Decimal::ZERO
        } else {
            let rate_sum: Decimal = standard.iter().map(|a| a.interest_rate).sum();
            rate_sum / Decimal::from(standard.len())
        };
        let monthly_interest_paid = self
            .storage
            .committed_interest_since(now - Duration::days(30))?;

        Ok(LedgerStats {
            total_accounts: standard.len(),
            total_balance,
            average_rate,
            monthly_interest_paid,
        })
    }

    // Batch jobs

    /// Daily accrual over every account with a positive balance.
    ///
    /// Appends one uncommitted interest entry per account and never touches
    /// balances. Not idempotent: running twice for the same day
    /// double-accrues; exactly-once-per-day is the scheduler's contract.
    pub async fn run_daily_accrual(&self, now: DateTime<Utc>) -> Result<AccrualSummary> {
        let ids: Vec<Uuid> = self
            .storage
            .accounts_with_positive_balance()?
            .iter()
            .map(|a| a.id)
            .collect();

        tracing::info!(accounts = ids.len(), "Daily accrual starting");
        let summary = self.accrue_account_ids(ids, now).await;
        tracing::info!(
            processed = summary.accounts_processed,
            errors = summary.errors.len(),
            "Daily accrual completed"
        );

        Ok(summary)
    }

    /// Accrue a fixed set of accounts, isolating per-account failures.
    async fn accrue_account_ids(&self, ids: Vec<Uuid>, now: DateTime<Utc>) -> AccrualSummary {
        let mut summary = AccrualSummary::default();

        for account_id in ids {
            match self.handle.record_accrual(account_id, now).await {
                Ok(Some(_)) => summary.accounts_processed += 1,
                Ok(None) => {
                    // Drained between selection and this step; nothing to do
                    tracing::debug!(account_id = %account_id, "Accrual skipped, balance no longer positive");
                }
                Err(e) => {
                    tracing::warn!(account_id = %account_id, error = %e, "Accrual step failed");
                    self.metrics.record_batch_error();
                    summary.errors.push(BatchError {
                        account_id,
                        message: e.to_string(),
                    });
                }
            }
        }

        summary
    }

    /// Monthly credit over every account.
    ///
    /// Sweeps each account's unswept daily entries inside the lookback
    /// window into one balance credit, one committed interest entry, and
    /// one `interest` transaction. Accounts with nothing to sweep are
    /// skipped. Swept entries are stamped, so a re-run inside the window is
    /// a no-op.
    pub async fn run_monthly_credit(
        &self,
        now: DateTime<Utc>,
        lookback_days: i64,
    ) -> Result<CreditSummary> {
        let ids: Vec<Uuid> = self.storage.all_accounts()?.iter().map(|a| a.id).collect();

        tracing::info!(accounts = ids.len(), lookback_days, "Monthly credit starting");
        let summary = self.credit_account_ids(ids, now, lookback_days).await;
        tracing::info!(
            credited = summary.accounts_credited,
            total = %summary.total_credited,
            errors = summary.errors.len(),
            "Monthly credit completed"
        );

        Ok(summary)
    }

    /// Credit a fixed set of accounts, isolating per-account failures.
    async fn credit_account_ids(
        &self,
        ids: Vec<Uuid>,
        now: DateTime<Utc>,
        lookback_days: i64,
    ) -> CreditSummary {
        let mut summary = CreditSummary::default();

        for account_id in ids {
            match self
                .handle
                .credit_interest(account_id, now, lookback_days)
                .await
            {
                Ok(Some((_, _, entry))) => {
                    summary.accounts_credited += 1;
                    summary.total_credited += entry.amount;
                }
                Ok(None) => {} // Nothing accrued in the window
                Err(e) => {
                    tracing::warn!(account_id = %account_id, error = %e, "Credit step failed");
                    self.metrics.record_batch_error();
                    summary.errors.push(BatchError {
                        account_id,
                        message: e.to_string(),
                    });
                }
            }
        }

        summary
    }

    /// Shutdown ledger
    pub async fn shutdown(&self) -> Result<()> {
        self.handle.shutdown().await
    }
}
