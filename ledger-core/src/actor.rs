//! Actor-based concurrency for the ledger
//!
//! Every balance-affecting mutation goes through one actor task, which is
//! the per-account serialization contract made explicit: a customer
//! withdrawal can never interleave with the nightly accrual or the monthly
//! credit on the same account, because both are messages drained from the
//! same mailbox. Interactive calls and the batch jobs share this single
//! code path. Reads bypass the actor and hit storage directly.
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │   Request handlers        Scheduler (batch jobs)      │
//! └─────────────┬────────────────────────┬───────────────┘
//!               │                        │
//!               ▼                        ▼
//! ┌──────────────────────────────────────────────────────┐
//! │               LedgerHandle (Clone)                    │
//! │         Sends messages to actor mailbox              │
//! └─────────────────────┬────────────────────────────────┘
//!                       │ mpsc::channel (bounded)
//!                       ▼
//! ┌──────────────────────────────────────────────────────┐
//! │              LedgerActor (Single Task)                │
//! │   validate -> mutate -> Storage WriteBatch commit     │
//! └───────────────────────────────────────────────────────┘
//! ```

use crate::{
    interest,
    metrics::Metrics,
    types::{
        Account, InterestEntry, NewAccount, OperationKind, Transaction, TransactionKind,
        SETTING_DEFAULT_INTEREST_RATE,
    },
    Error, Result, Storage,
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

/// Description recorded on monthly interest credit transactions
pub const MONTHLY_CREDIT_DESCRIPTION: &str = "Monthly interest credit";

/// Message sent to the ledger actor
pub enum LedgerMessage {
    /// Apply a deposit or withdrawal
    PerformOperation {
        account_id: Uuid,
        amount: Decimal,
        kind: OperationKind,
        description: Option<String>,
        response: oneshot::Sender<Result<(Account, Transaction)>>,
    },

    /// Register a new account
    RegisterAccount {
        new: NewAccount,
        response: oneshot::Sender<Result<Account>>,
    },

    /// Set one account's annual rate
    SetAccountRate {
        account_id: Uuid,
        rate: Decimal,
        response: oneshot::Sender<Result<Account>>,
    },

    /// Set the default rate applied at registration
    SetDefaultRate {
        rate: Decimal,
        response: oneshot::Sender<Result<()>>,
    },

    /// Append one daily accrual entry for an account
    RecordAccrual {
        account_id: Uuid,
        now: DateTime<Utc>,
        response: oneshot::Sender<Result<Option<InterestEntry>>>,
    },

    /// Sweep an account's daily entries into a monthly credit
    CreditInterest {
        account_id: Uuid,
        now: DateTime<Utc>,
        lookback_days: i64,
        response: oneshot::Sender<Result<Option<(Account, Transaction, InterestEntry)>>>,
    },

    /// Delete an account with cascade
    DeleteAccount {
        account_id: Uuid,
        response: oneshot::Sender<Result<()>>,
    },

    /// Shutdown actor
    Shutdown,
}

/// Actor that processes ledger messages
pub struct LedgerActor {
    /// Storage backend
    storage: Arc<Storage>,

    /// Mailbox for incoming messages
    mailbox: mpsc::Receiver<LedgerMessage>,

    /// Metrics collector
    metrics: Metrics,

    /// Rate used at registration when the default-rate setting is unset
    fallback_default_rate: Decimal,
}

impl LedgerActor {
    /// Create new actor
    pub fn new(
        storage: Arc<Storage>,
        mailbox: mpsc::Receiver<LedgerMessage>,
        metrics: Metrics,
        fallback_default_rate: Decimal,
    ) -> Self {
        Self {
            storage,
            mailbox,
            metrics,
            fallback_default_rate,
        }
    }

    /// Run the actor event loop. Messages are drained one at a time, so an
    /// in-flight mutation always completes before shutdown is observed.
    pub async fn run(mut self) {
        while let Some(msg) = self.mailbox.recv().await {
            match msg {
                LedgerMessage::Shutdown => break,
                _ => self.handle_message(msg),
            }
        }
        tracing::debug!("Ledger actor stopped");
    }

    /// Handle a single message
    fn handle_message(&mut self, msg: LedgerMessage) {
        match msg {
            LedgerMessage::PerformOperation {
                account_id,
                amount,
                kind,
                description,
                response,
            } => {
                let started = std::time::Instant::now();
                let result = self.perform_operation(account_id, amount, kind, description);
                if result.is_ok() {
                    self.metrics.record_operation(started.elapsed().as_secs_f64());
                }
                let _ = response.send(result);
            }

            LedgerMessage::RegisterAccount { new, response } => {
                let _ = response.send(self.register_account(new));
            }

            LedgerMessage::SetAccountRate {
                account_id,
                rate,
                response,
            } => {
                let _ = response.send(self.set_account_rate(account_id, rate));
            }

            LedgerMessage::SetDefaultRate { rate, response } => {
                let _ = response.send(self.set_default_rate(rate));
            }

            LedgerMessage::RecordAccrual {
                account_id,
                now,
                response,
            } => {
                let result = self.record_accrual(account_id, now);
                if let Ok(Some(_)) = result {
                    self.metrics.record_accrual();
                }
                let _ = response.send(result);
            }

            LedgerMessage::CreditInterest {
                account_id,
                now,
                lookback_days,
                response,
            } => {
                let result = self.credit_interest(account_id, now, lookback_days);
                if let Ok(Some((_, _, ref entry))) = result {
                    self.metrics.record_credit(entry.amount);
                }
                let _ = response.send(result);
            }

            LedgerMessage::DeleteAccount {
                account_id,
                response,
            } => {
                let _ = response.send(self.delete_account(account_id));
            }

            LedgerMessage::Shutdown => {
                // Handled in main loop
            }
        }
    }

    /// Apply a deposit or withdrawal. Validation precedes every write;
    /// balance update and transaction record commit as one batch.
    fn perform_operation(
        &self,
        account_id: Uuid,
        amount: Decimal,
        kind: OperationKind,
        description: Option<String>,
    ) -> Result<(Account, Transaction)> {
        if amount <= Decimal::ZERO {
            return Err(Error::InvalidAmount(amount));
        }

        let mut account = self.storage.get_account(account_id)?;

        if kind == OperationKind::Withdraw && amount > account.balance {
            return Err(Error::InsufficientFunds {
                requested: amount,
                available: account.balance,
            });
        }

        account.balance += kind.signed_amount(amount);

        let transaction = Transaction {
            id: Uuid::now_v7(),
            account_id,
            amount: kind.signed_amount(amount),
            kind: kind.transaction_kind(),
            description: description.unwrap_or_else(|| kind.default_description().to_string()),
            timestamp: Utc::now(),
            balance_after: account.balance,
        };

        self.storage.commit_operation(&account, &transaction)?;

        tracing::info!(
            account_id = %account_id,
            kind = %kind,
            amount = %amount,
            balance = %account.balance,
            "Operation applied"
        );

        Ok((account, transaction))
    }

    /// Register an account. The default rate is read from settings at call
    /// time, so later default-rate changes never apply retroactively.
    fn register_account(&self, new: NewAccount) -> Result<Account> {
        if self.storage.account_id_by_email(&new.email)?.is_some() {
            return Err(Error::EmailTaken(new.email));
        }

        let rate = match new.rate_override {
            Some(rate) => rate,
            None => self
                .storage
                .get_setting(SETTING_DEFAULT_INTEREST_RATE)?
                .unwrap_or(self.fallback_default_rate),
        };
        if rate < Decimal::ZERO {
            return Err(Error::InvalidRate(rate));
        }

        let account = Account {
            id: Uuid::now_v7(),
            name: new.name,
            email: new.email,
            password_hash: new.password_hash,
            balance: Decimal::ZERO,
            interest_rate: rate,
            role: new.role,
            created_at: Utc::now(),
        };

        self.storage.create_account(&account)?;

        tracing::info!(
            account_id = %account.id,
            role = %account.role,
            rate = %account.interest_rate,
            "Account registered"
        );

        Ok(account)
    }

    fn set_account_rate(&self, account_id: Uuid, rate: Decimal) -> Result<Account> {
        if rate < Decimal::ZERO {
            return Err(Error::InvalidRate(rate));
        }

        let mut account = self.storage.get_account(account_id)?;
        account.interest_rate = rate;
        self.storage.put_account(&account)?;

        tracing::info!(account_id = %account_id, rate = %rate, "Account rate updated");

        Ok(account)
    }

    fn set_default_rate(&self, rate: Decimal) -> Result<()> {
        if rate < Decimal::ZERO {
            return Err(Error::InvalidRate(rate));
        }
        self.storage.put_setting(SETTING_DEFAULT_INTEREST_RATE, rate)?;
        tracing::info!(rate = %rate, "Default interest rate updated");
        Ok(())
    }

    /// Append one daily accrual entry. Never touches the balance. Returns
    /// `None` when the balance is no longer positive (the account may have
    /// been drained between batch selection and this step).
    fn record_accrual(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<InterestEntry>> {
        let account = self.storage.get_account(account_id)?;

        if account.balance <= Decimal::ZERO {
            return Ok(None);
        }

        let entry = InterestEntry {
            id: Uuid::now_v7(),
            account_id,
            amount: interest::daily_amount(account.balance, account.interest_rate),
            balance_used: account.balance,
            rate_used: account.interest_rate,
            committed: false,
            credited_by: None,
            timestamp: now,
        };

        self.storage.append_interest_entry(&entry)?;

        tracing::debug!(
            account_id = %account_id,
            amount = %entry.amount,
            balance_used = %entry.balance_used,
            "Daily interest accrued"
        );

        Ok(Some(entry))
    }

    /// Sum the account's unswept daily entries inside the lookback window
    /// and credit the total. Swept entries are stamped with the credit
    /// entry's ID in the same write batch, so re-running inside the window
    /// finds nothing to sum and returns `None`.
    fn credit_interest(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
        lookback_days: i64,
    ) -> Result<Option<(Account, Transaction, InterestEntry)>> {
        let mut account = self.storage.get_account(account_id)?;

        let from = now - Duration::days(lookback_days);
        let mut entries = self
            .storage
            .uncommitted_interest_between(account_id, from, now)?;

        let total: Decimal = entries.iter().map(|e| e.amount).sum();
        let total = interest::round_credit(total);
        if total <= Decimal::ZERO {
            return Ok(None);
        }

        let balance_before = account.balance;
        account.balance += total;

        let credit_id = Uuid::now_v7();
        for entry in &mut entries {
            entry.credited_by = Some(credit_id);
        }

        let credit_entry = InterestEntry {
            id: credit_id,
            account_id,
            amount: total,
            balance_used: balance_before,
            rate_used: account.interest_rate,
            committed: true,
            credited_by: None,
            timestamp: now,
        };

        let transaction = Transaction {
            id: Uuid::now_v7(),
            account_id,
            amount: total,
            kind: TransactionKind::Interest,
            description: MONTHLY_CREDIT_DESCRIPTION.to_string(),
            timestamp: now,
            balance_after: account.balance,
        };

        self.storage
            .commit_interest_credit(&account, &transaction, &credit_entry, &entries)?;

        tracing::info!(
            account_id = %account_id,
            amount = %total,
            swept = entries.len(),
            balance = %account.balance,
            "Monthly interest credited"
        );

        Ok(Some((account, transaction, credit_entry)))
    }

    fn delete_account(&self, account_id: Uuid) -> Result<()> {
        let account = self.storage.get_account(account_id)?;
        if account.is_admin() {
            return Err(Error::AdminUndeletable(account_id));
        }
        self.storage.delete_account_cascade(&account)
    }
}

/// Handle for sending messages to the actor
#[derive(Clone)]
pub struct LedgerHandle {
    sender: mpsc::Sender<LedgerMessage>,
}

impl LedgerHandle {
    /// Create new handle
    pub fn new(sender: mpsc::Sender<LedgerMessage>) -> Self {
        Self { sender }
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T>>) -> LedgerMessage,
    ) -> Result<T> {
        let (tx, rx) = oneshot::channel();
        self.sender
            .send(build(tx))
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        rx.await
            .map_err(|_| Error::Concurrency("Response channel closed".to_string()))?
    }

    /// Apply a deposit or withdrawal
    pub async fn perform_operation(
        &self,
        account_id: Uuid,
        amount: Decimal,
        kind: OperationKind,
        description: Option<String>,
    ) -> Result<(Account, Transaction)> {
        self.request(|response| LedgerMessage::PerformOperation {
            account_id,
            amount,
            kind,
            description,
            response,
        })
        .await
    }

    /// Register a new account
    pub async fn register_account(&self, new: NewAccount) -> Result<Account> {
        self.request(|response| LedgerMessage::RegisterAccount { new, response })
            .await
    }

    /// Set one account's annual rate
    pub async fn set_account_rate(&self, account_id: Uuid, rate: Decimal) -> Result<Account> {
        self.request(|response| LedgerMessage::SetAccountRate {
            account_id,
            rate,
            response,
        })
        .await
    }

    /// Set the default rate applied at registration
    pub async fn set_default_rate(&self, rate: Decimal) -> Result<()> {
        self.request(|response| LedgerMessage::SetDefaultRate { rate, response })
            .await
    }

    /// Append one daily accrual entry
    pub async fn record_accrual(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<InterestEntry>> {
        self.request(|response| LedgerMessage::RecordAccrual {
            account_id,
            now,
            response,
        })
        .await
    }

    /// Sweep an account's daily entries into a monthly credit
    pub async fn credit_interest(
        &self,
        account_id: Uuid,
        now: DateTime<Utc>,
        lookback_days: i64,
    ) -> Result<Option<(Account, Transaction, InterestEntry)>> {
        self.request(|response| LedgerMessage::CreditInterest {
            account_id,
            now,
            lookback_days,
            response,
        })
        .await
    }

    /// Delete an account with cascade
    pub async fn delete_account(&self, account_id: Uuid) -> Result<()> {
        self.request(|response| LedgerMessage::DeleteAccount {
            account_id,
            response,
        })
        .await
    }

    /// Shutdown actor
    pub async fn shutdown(&self) -> Result<()> {
        self.sender
            .send(LedgerMessage::Shutdown)
            .await
            .map_err(|_| Error::Concurrency("Actor mailbox closed".to_string()))?;
        Ok(())
    }
}

/// Spawn the ledger actor
pub fn spawn_ledger_actor(
    storage: Arc<Storage>,
    metrics: Metrics,
    fallback_default_rate: Decimal,
) -> LedgerHandle {
    let (tx, rx) = mpsc::channel(256); // Bounded channel for backpressure
    let actor = LedgerActor::new(storage, rx, metrics, fallback_default_rate);

    tokio::spawn(async move {
        actor.run().await;
    });

    LedgerHandle::new(tx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Config;
    use crate::types::Role;

    fn spawn_test_actor() -> (LedgerHandle, tempfile::TempDir) {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.data_dir = temp_dir.path().to_path_buf();

        let storage = Arc::new(Storage::open(&config).unwrap());
        let handle = spawn_ledger_actor(
            storage,
            Metrics::new().unwrap(),
            config.default_interest_rate,
        );
        (handle, temp_dir)
    }

    #[tokio::test]
    async fn test_register_and_operate() {
        let (handle, _temp) = spawn_test_actor();

        let account = handle
            .register_account(NewAccount::standard("Alice", "alice@example.com", "hash"))
            .await
            .unwrap();
        assert_eq!(account.balance, Decimal::ZERO);
        assert_eq!(account.interest_rate, Decimal::new(35, 1)); // fallback default
        assert_eq!(account.role, Role::Standard);

        let (account, tx) = handle
            .perform_operation(account.id, Decimal::from(200), OperationKind::Deposit, None)
            .await
            .unwrap();
        assert_eq!(account.balance, Decimal::from(200));
        assert_eq!(tx.amount, Decimal::from(200));
        assert_eq!(tx.balance_after, account.balance);
        assert_eq!(tx.description, "Deposit transaction");

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_duplicate_email_rejected() {
        let (handle, _temp) = spawn_test_actor();

        handle
            .register_account(NewAccount::standard("Alice", "alice@example.com", "hash"))
            .await
            .unwrap();
        let err = handle
            .register_account(NewAccount::standard("Alice Again", "alice@example.com", "hash"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::EmailTaken(_)));

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_withdraw_insufficient_funds_leaves_balance() {
        let (handle, _temp) = spawn_test_actor();

        let account = handle
            .register_account(NewAccount::standard("Bob", "bob@example.com", "hash"))
            .await
            .unwrap();
        handle
            .perform_operation(account.id, Decimal::from(100), OperationKind::Deposit, None)
            .await
            .unwrap();

        let err = handle
            .perform_operation(account.id, Decimal::from(150), OperationKind::Withdraw, None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientFunds { .. }));

        // Exactly the balance is withdrawable
        let (account, _) = handle
            .perform_operation(account.id, Decimal::from(100), OperationKind::Withdraw, None)
            .await
            .unwrap();
        assert_eq!(account.balance, Decimal::ZERO);

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_non_positive_amounts_rejected() {
        let (handle, _temp) = spawn_test_actor();

        let account = handle
            .register_account(NewAccount::standard("Carol", "carol@example.com", "hash"))
            .await
            .unwrap();

        for amount in [Decimal::ZERO, Decimal::from(-10)] {
            let err = handle
                .perform_operation(account.id, amount, OperationKind::Deposit, None)
                .await
                .unwrap_err();
            assert!(matches!(err, Error::InvalidAmount(_)));
        }

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_accrual_skips_non_positive_balance() {
        let (handle, _temp) = spawn_test_actor();

        let account = handle
            .register_account(NewAccount::standard("Dave", "dave@example.com", "hash"))
            .await
            .unwrap();

        let accrued = handle.record_accrual(account.id, Utc::now()).await.unwrap();
        assert!(accrued.is_none());

        handle
            .perform_operation(account.id, Decimal::from(1000), OperationKind::Deposit, None)
            .await
            .unwrap();
        let accrued = handle.record_accrual(account.id, Utc::now()).await.unwrap();
        assert!(accrued.is_some());

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_admin_account_not_deletable() {
        let (handle, _temp) = spawn_test_actor();

        let admin = handle
            .register_account(NewAccount {
                name: "Admin".to_string(),
                email: "admin@example.com".to_string(),
                password_hash: "hash".to_string(),
                role: Role::Administrator,
                rate_override: Some(Decimal::new(50, 1)),
            })
            .await
            .unwrap();

        let err = handle.delete_account(admin.id).await.unwrap_err();
        assert!(matches!(err, Error::AdminUndeletable(_)));

        handle.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_negative_rate_rejected() {
        let (handle, _temp) = spawn_test_actor();

        let account = handle
            .register_account(NewAccount::standard("Eve", "eve@example.com", "hash"))
            .await
            .unwrap();

        let err = handle
            .set_account_rate(account.id, Decimal::from(-1))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidRate(_)));

        let err = handle.set_default_rate(Decimal::from(-1)).await.unwrap_err();
        assert!(matches!(err, Error::InvalidRate(_)));

        handle.shutdown().await.unwrap();
    }
}
