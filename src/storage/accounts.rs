// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Embedded account store backed by redb (pure Rust, ACID).
//!
//! ## Table Layout
//!
//! - `accounts`: composite key `user_id|chain` → serialized [`Account`]
//!
//! The composite key doubles as the uniqueness constraint on
//! (user_id, chain): an insert that finds an existing ACTIVE row keeps the
//! existing record and reports it back, so concurrent provisioning runs
//! converge on one account per chain instead of failing or duplicating.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::chains::Chain;
use crate::custody::CustodyAccount;

/// Primary table: `user_id|chain` → serialized Account (JSON bytes).
const ACCOUNTS: TableDefinition<&str, &[u8]> = TableDefinition::new("accounts");

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb error: {0}")]
    Redb(#[from] redb::Error),

    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// Account Record
// =============================================================================

/// Account lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    /// Account is live; at most one per (user, chain).
    Active,
    /// Account was revoked; kept for audit, excluded from reads.
    Revoked,
}

/// A durable per-chain account record, owned exclusively by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Account {
    /// Owning user.
    pub user_id: String,
    /// Chain this account lives on.
    pub chain: Chain,
    /// On-chain address controlled by the custody provider.
    pub address: String,
    /// Provider-side wallet identifier.
    pub custody_wallet_id: String,
    /// Provider-side account identifier.
    pub custody_account_id: String,
    /// Provider address-format enum value.
    pub address_format: String,
    /// Lifecycle status.
    pub status: AccountStatus,
    /// When this record was first persisted.
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// Build the durable record for a freshly created custody account.
    pub fn from_custody(user_id: &str, custody: CustodyAccount) -> Self {
        Self {
            user_id: user_id.to_string(),
            chain: custody.chain,
            address: custody.address,
            custody_wallet_id: custody.custody_wallet_id,
            custody_account_id: custody.custody_account_id,
            address_format: custody.address_format,
            status: AccountStatus::Active,
            created_at: Utc::now(),
        }
    }
}

// =============================================================================
// Store Port
// =============================================================================

/// Durable, idempotent persistence boundary for account records.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// All ACTIVE accounts for a user. No side effects.
    async fn active_accounts(&self, user_id: &str) -> StoreResult<Vec<Account>>;

    /// Batched idempotent upsert keyed on (user_id, chain).
    ///
    /// Per record: an existing ACTIVE row wins and is returned in place of
    /// the new one (conflict resolved to success); otherwise the new
    /// record is inserted and returned. The whole batch commits in one
    /// transaction.
    async fn upsert_accounts(&self, user_id: &str, accounts: Vec<Account>)
        -> StoreResult<Vec<Account>>;

    /// Cheap liveness probe for the health aggregator.
    async fn ping(&self) -> StoreResult<()>;
}

// =============================================================================
// Index Key Helpers
// =============================================================================

/// Composite key for the accounts table: `user_id|chain`.
fn make_key(user_id: &str, chain: Chain) -> String {
    format!("{user_id}|{chain}")
}

/// Lower bound for a range scan over all of a user's accounts.
fn make_prefix(user_id: &str) -> String {
    format!("{user_id}|")
}

/// Upper bound for the range scan (`|` + 0x7F sorts past every chain name).
fn make_prefix_end(user_id: &str) -> String {
    format!("{user_id}|\u{7f}")
}

// =============================================================================
// AccountDatabase
// =============================================================================

/// Embedded ACID account database.
pub struct AccountDatabase {
    db: Database,
}

impl AccountDatabase {
    /// Open (or create) the database at the given path.
    pub fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok();
        }
        let db = Database::create(path)?;

        // Pre-create the table so later read transactions don't fail
        let write_txn = db.begin_write()?;
        {
            let _ = write_txn.open_table(ACCOUNTS)?;
        }
        write_txn.commit()?;

        Ok(Self { db })
    }

    fn read_active(&self, user_id: &str) -> StoreResult<Vec<Account>> {
        let read_txn = self.db.begin_read()?;
        let table = read_txn.open_table(ACCOUNTS)?;

        let start = make_prefix(user_id);
        let end = make_prefix_end(user_id);

        let mut accounts = Vec::new();
        for entry in table.range(start.as_str()..end.as_str())? {
            let (_, value) = entry?;
            let account: Account = serde_json::from_slice(value.value())?;
            if account.status == AccountStatus::Active {
                accounts.push(account);
            }
        }
        Ok(accounts)
    }

    fn write_batch(&self, user_id: &str, accounts: Vec<Account>) -> StoreResult<Vec<Account>> {
        let write_txn = self.db.begin_write()?;
        let mut durable = Vec::with_capacity(accounts.len());
        {
            let mut table = write_txn.open_table(ACCOUNTS)?;
            for account in accounts {
                let key = make_key(user_id, account.chain);

                let existing: Option<Account> = match table.get(key.as_str())? {
                    Some(value) => Some(serde_json::from_slice(value.value())?),
                    None => None,
                };

                match existing {
                    // Another caller won the race between our read and this
                    // write; their record is the durable truth.
                    Some(current) if current.status == AccountStatus::Active => {
                        durable.push(current);
                    }
                    _ => {
                        let json = serde_json::to_vec(&account)?;
                        table.insert(key.as_str(), json.as_slice())?;
                        durable.push(account);
                    }
                }
            }
        }
        write_txn.commit()?;
        Ok(durable)
    }
}

#[async_trait]
impl AccountStore for AccountDatabase {
    async fn active_accounts(&self, user_id: &str) -> StoreResult<Vec<Account>> {
        self.read_active(user_id)
    }

    async fn upsert_accounts(
        &self,
        user_id: &str,
        accounts: Vec<Account>,
    ) -> StoreResult<Vec<Account>> {
        self.write_batch(user_id, accounts)
    }

    async fn ping(&self) -> StoreResult<()> {
        let read_txn = self.db.begin_read()?;
        let _ = read_txn.open_table(ACCOUNTS)?;
        Ok(())
    }
}
