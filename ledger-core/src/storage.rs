//! Storage layer using RocksDB
//!
//! # Column Families
//!
//! - `accounts` - Account records (key: account_id)
//! - `transactions` - Append-only transaction log (key: transaction_id)
//! - `interest` - Append-only interest entries (key: entry_id)
//! - `settings` - Global settings (key: setting name)
//! - `indices` - Secondary indices for per-account and email lookups
//!
//! Balance updates commit in the same `WriteBatch` as the records they
//! produce, so a crash can never leave a balance without its transaction or
//! the other way around.

use crate::{
    error::{Error, Result},
    types::{Account, InterestEntry, Transaction},
    Config,
};
use chrono::{DateTime, Utc};
use rocksdb::{BoundColumnFamily, ColumnFamilyDescriptor, IteratorMode, Options, WriteBatch, DB};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

/// Column family names
const CF_ACCOUNTS: &str = "accounts";
const CF_TRANSACTIONS: &str = "transactions";
const CF_INTEREST: &str = "interest";
const CF_SETTINGS: &str = "settings";
const CF_INDICES: &str = "indices";

/// Index key tags
const IDX_TRANSACTION: u8 = b't';
const IDX_INTEREST: u8 = b'i';
const IDX_EMAIL: u8 = b'e';

/// Storage wrapper for RocksDB
pub struct Storage {
    db: Arc<DB>,
}

impl Storage {
    /// Open or create database
    pub fn open(config: &Config) -> Result<Self> {
        let path = &config.data_dir;

        std::fs::create_dir_all(path)?;

        let mut db_opts = Options::default();
        db_opts.create_if_missing(true);
        db_opts.create_missing_column_families(true);
        db_opts.set_write_buffer_size(config.rocksdb.write_buffer_size_mb * 1024 * 1024);
        db_opts.set_max_write_buffer_number(config.rocksdb.max_write_buffer_number);
        db_opts.set_max_background_jobs(config.rocksdb.max_background_jobs);

        let cf_descriptors = vec![
            ColumnFamilyDescriptor::new(CF_ACCOUNTS, Self::cf_options_accounts()),
            ColumnFamilyDescriptor::new(CF_TRANSACTIONS, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_INTEREST, Self::cf_options_records()),
            ColumnFamilyDescriptor::new(CF_SETTINGS, Self::cf_options_accounts()),
            ColumnFamilyDescriptor::new(CF_INDICES, Self::cf_options_indices()),
        ];

        let db = DB::open_cf_descriptors(&db_opts, path, cf_descriptors)?;

        tracing::info!("Opened RocksDB at {:?}", path);

        Ok(Self { db: Arc::new(db) })
    }

    // Column family options

    fn cf_options_accounts() -> Options {
        let mut opts = Options::default();
        // Hot read path, favor speed
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        opts
    }

    fn cf_options_records() -> Options {
        let mut opts = Options::default();
        // Append-only history, favor ratio
        opts.set_compression_type(rocksdb::DBCompressionType::Zstd);
        opts
    }

    fn cf_options_indices() -> Options {
        let mut opts = Options::default();
        opts.set_compression_type(rocksdb::DBCompressionType::Lz4);
        let mut block_opts = rocksdb::BlockBasedOptions::default();
        block_opts.set_bloom_filter(10.0, false); // 10 bits per key
        opts.set_block_based_table_factory(&block_opts);
        opts
    }

    // Helper: get column family handle

    fn cf_handle(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| Error::Storage(format!("Column family {} not found", name)))
    }

    // Index key helpers

    fn account_scoped_key(tag: u8, account_id: &Uuid, record_id: Option<Uuid>) -> Vec<u8> {
        let mut key = vec![tag];
        key.extend_from_slice(account_id.as_bytes());
        if let Some(rid) = record_id {
            key.extend_from_slice(rid.as_bytes());
        }
        key
    }

    fn email_index_key(email: &str) -> Vec<u8> {
        let mut key = vec![IDX_EMAIL];
        key.extend_from_slice(email.as_bytes());
        key
    }

    /// Collect record IDs from an account-scoped index prefix, oldest first
    /// (UUIDv7 keys sort chronologically).
    fn scan_account_index(&self, tag: u8, account_id: &Uuid) -> Result<Vec<Uuid>> {
        let cf = self.cf_handle(CF_INDICES)?;
        let prefix = Self::account_scoped_key(tag, account_id, None);

        let mut ids = Vec::new();
        let iter = self.db.prefix_iterator_cf(&cf, &prefix);
        for item in iter {
            let (key, _) = item?;
            // prefix_iterator seeks but does not bound; stop past the prefix
            if !key.starts_with(&prefix) {
                break;
            }
            if key.len() == prefix.len() + 16 {
                let rid: [u8; 16] = key[prefix.len()..]
                    .try_into()
                    .map_err(|_| Error::Storage("Malformed index key".to_string()))?;
                ids.push(Uuid::from_bytes(rid));
            }
        }

        Ok(ids)
    }

    // Account operations

    /// Get account by ID
    pub fn get_account(&self, id: Uuid) -> Result<Account> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        let value = self
            .db
            .get_cf(&cf, id.as_bytes())?
            .ok_or(Error::AccountNotFound(id))?;
        let account: Account = bincode::deserialize(&value)?;
        Ok(account)
    }

    /// Look up an account ID by login identifier
    pub fn account_id_by_email(&self, email: &str) -> Result<Option<Uuid>> {
        let cf = self.cf_handle(CF_INDICES)?;
        let value = self.db.get_cf(&cf, Self::email_index_key(email))?;
        match value {
            Some(bytes) => {
                let raw: [u8; 16] = bytes
                    .as_slice()
                    .try_into()
                    .map_err(|_| Error::Storage("Malformed email index".to_string()))?;
                Ok(Some(Uuid::from_bytes(raw)))
            }
            None => Ok(None),
        }
    }

    /// All accounts
    pub fn all_accounts(&self) -> Result<Vec<Account>> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        let mut accounts = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item?;
            accounts.push(bincode::deserialize(&value)?);
        }
        Ok(accounts)
    }

    /// Accounts with a strictly positive balance (daily accrual selection)
    pub fn accounts_with_positive_balance(&self) -> Result<Vec<Account>> {
        let mut accounts = self.all_accounts()?;
        accounts.retain(|a| a.balance > Decimal::ZERO);
        Ok(accounts)
    }

    /// Create a new account together with its email index entry (atomic).
    /// Email uniqueness is checked by the caller under the single writer.
    pub fn create_account(&self, account: &Account) -> Result<()> {
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_accounts, account.id.as_bytes(), bincode::serialize(account)?);
        batch.put_cf(
            &cf_indices,
            Self::email_index_key(&account.email),
            account.id.as_bytes(),
        );
        self.db.write(batch)?;

        tracing::debug!(account_id = %account.id, role = %account.role, "Account created");

        Ok(())
    }

    /// Persist a non-balance account update (rate changes)
    pub fn put_account(&self, account: &Account) -> Result<()> {
        let cf = self.cf_handle(CF_ACCOUNTS)?;
        self.db
            .put_cf(&cf, account.id.as_bytes(), bincode::serialize(account)?)?;
        Ok(())
    }

    // Ledger commits (atomic)

    /// Commit a deposit/withdraw: balance update + transaction record in one
    /// write batch
    pub fn commit_operation(&self, account: &Account, transaction: &Transaction) -> Result<()> {
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        let cf_transactions = self.cf_handle(CF_TRANSACTIONS)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_accounts, account.id.as_bytes(), bincode::serialize(account)?);
        batch.put_cf(
            &cf_transactions,
            transaction.id.as_bytes(),
            bincode::serialize(transaction)?,
        );
        batch.put_cf(
            &cf_indices,
            Self::account_scoped_key(IDX_TRANSACTION, &account.id, Some(transaction.id)),
            &[],
        );
        self.db.write(batch)?;

        tracing::debug!(
            account_id = %account.id,
            transaction_id = %transaction.id,
            kind = %transaction.kind,
            amount = %transaction.amount,
            balance = %transaction.balance_after,
            "Operation committed"
        );

        Ok(())
    }

    /// Append an uncommitted daily interest entry (accrual never touches the
    /// balance)
    pub fn append_interest_entry(&self, entry: &InterestEntry) -> Result<()> {
        let cf_interest = self.cf_handle(CF_INTEREST)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_interest, entry.id.as_bytes(), bincode::serialize(entry)?);
        batch.put_cf(
            &cf_indices,
            Self::account_scoped_key(IDX_INTEREST, &entry.account_id, Some(entry.id)),
            &[],
        );
        self.db.write(batch)?;

        Ok(())
    }

    /// Commit a monthly interest credit: balance update, interest
    /// transaction, committed entry, and the sweep stamps on the summed
    /// daily entries, all in one write batch.
    pub fn commit_interest_credit(
        &self,
        account: &Account,
        transaction: &Transaction,
        credit_entry: &InterestEntry,
        swept_entries: &[InterestEntry],
    ) -> Result<()> {
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        let cf_transactions = self.cf_handle(CF_TRANSACTIONS)?;
        let cf_interest = self.cf_handle(CF_INTEREST)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(&cf_accounts, account.id.as_bytes(), bincode::serialize(account)?);
        batch.put_cf(
            &cf_transactions,
            transaction.id.as_bytes(),
            bincode::serialize(transaction)?,
        );
        batch.put_cf(
            &cf_indices,
            Self::account_scoped_key(IDX_TRANSACTION, &account.id, Some(transaction.id)),
            &[],
        );
        batch.put_cf(
            &cf_interest,
            credit_entry.id.as_bytes(),
            bincode::serialize(credit_entry)?,
        );
        batch.put_cf(
            &cf_indices,
            Self::account_scoped_key(IDX_INTEREST, &account.id, Some(credit_entry.id)),
            &[],
        );
        for entry in swept_entries {
            // Same key, stamped value; the index entry already exists
            batch.put_cf(&cf_interest, entry.id.as_bytes(), bincode::serialize(entry)?);
        }
        self.db.write(batch)?;

        tracing::debug!(
            account_id = %account.id,
            credit_entry_id = %credit_entry.id,
            amount = %credit_entry.amount,
            swept = swept_entries.len(),
            "Interest credit committed"
        );

        Ok(())
    }

    // History queries

    fn get_transaction(&self, id: Uuid) -> Result<Transaction> {
        let cf = self.cf_handle(CF_TRANSACTIONS)?;
        let value = self
            .db
            .get_cf(&cf, id.as_bytes())?
            .ok_or_else(|| Error::Storage(format!("Transaction {} missing for index entry", id)))?;
        Ok(bincode::deserialize(&value)?)
    }

    fn get_interest_entry(&self, id: Uuid) -> Result<InterestEntry> {
        let cf = self.cf_handle(CF_INTEREST)?;
        let value = self
            .db
            .get_cf(&cf, id.as_bytes())?
            .ok_or_else(|| Error::Storage(format!("Interest entry {} missing for index entry", id)))?;
        Ok(bincode::deserialize(&value)?)
    }

    /// Transactions for an account, newest first, up to `limit`
    pub fn transactions_for_account(&self, account_id: Uuid, limit: usize) -> Result<Vec<Transaction>> {
        let ids = self.scan_account_index(IDX_TRANSACTION, &account_id)?;
        ids.iter()
            .rev()
            .take(limit)
            .map(|id| self.get_transaction(*id))
            .collect()
    }

    /// Interest entries for an account, newest first, up to `limit`
    pub fn interest_history(&self, account_id: Uuid, limit: usize) -> Result<Vec<InterestEntry>> {
        let ids = self.scan_account_index(IDX_INTEREST, &account_id)?;
        ids.iter()
            .rev()
            .take(limit)
            .map(|id| self.get_interest_entry(*id))
            .collect()
    }

    /// Daily accrual entries for an account that have not been swept into a
    /// monthly credit, with timestamps inside `[from, to]`
    pub fn uncommitted_interest_between(
        &self,
        account_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<InterestEntry>> {
        let ids = self.scan_account_index(IDX_INTEREST, &account_id)?;
        let mut entries = Vec::new();
        for id in ids {
            let entry = self.get_interest_entry(id)?;
            if !entry.committed
                && !entry.is_swept()
                && entry.timestamp >= from
                && entry.timestamp <= to
            {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Total committed (monthly) interest credited on or after `cutoff`,
    /// across all accounts
    pub fn committed_interest_since(&self, cutoff: DateTime<Utc>) -> Result<Decimal> {
        let cf = self.cf_handle(CF_INTEREST)?;
        let mut total = Decimal::ZERO;
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (_, value) = item?;
            let entry: InterestEntry = bincode::deserialize(&value)?;
            if entry.committed && entry.timestamp >= cutoff {
                total += entry.amount;
            }
        }
        Ok(total)
    }

    // Settings

    /// Get a setting value, `None` when unset
    pub fn get_setting(&self, key: &str) -> Result<Option<Decimal>> {
        let cf = self.cf_handle(CF_SETTINGS)?;
        match self.db.get_cf(&cf, key.as_bytes())? {
            Some(value) => Ok(Some(bincode::deserialize(&value)?)),
            None => Ok(None),
        }
    }

    /// Put a setting value
    pub fn put_setting(&self, key: &str, value: Decimal) -> Result<()> {
        let cf = self.cf_handle(CF_SETTINGS)?;
        self.db.put_cf(&cf, key.as_bytes(), bincode::serialize(&value)?)?;
        Ok(())
    }

    // Deletion

    /// Delete an account and exactly its own transactions, interest entries,
    /// and index keys, in one write batch.
    pub fn delete_account_cascade(&self, account: &Account) -> Result<()> {
        let cf_accounts = self.cf_handle(CF_ACCOUNTS)?;
        let cf_transactions = self.cf_handle(CF_TRANSACTIONS)?;
        let cf_interest = self.cf_handle(CF_INTEREST)?;
        let cf_indices = self.cf_handle(CF_INDICES)?;

        let tx_ids = self.scan_account_index(IDX_TRANSACTION, &account.id)?;
        let entry_ids = self.scan_account_index(IDX_INTEREST, &account.id)?;

        let mut batch = WriteBatch::default();
        batch.delete_cf(&cf_accounts, account.id.as_bytes());
        batch.delete_cf(&cf_indices, Self::email_index_key(&account.email));
        for id in &tx_ids {
            batch.delete_cf(&cf_transactions, id.as_bytes());
            batch.delete_cf(
                &cf_indices,
                Self::account_scoped_key(IDX_TRANSACTION, &account.id, Some(*id)),
            );
        }
        for id in &entry_ids {
            batch.delete_cf(&cf_interest, id.as_bytes());
            batch.delete_cf(
                &cf_indices,
                Self::account_scoped_key(IDX_INTEREST, &account.id, Some(*id)),
            );
        }
        self.db.write(batch)?;

        tracing::info!(
            account_id = %account.id,
            transactions = tx_ids.len(),
            interest_entries = entry_ids.len(),
            "Account deleted with cascade"
        );

        Ok(())
    }
}
