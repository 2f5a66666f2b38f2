// Rust guideline compliant 2026-03-07

//! SQLite adapter for the `WalletStore` port.
//!
//! Persists wallets and the transfer history to a SQLite file via `sqlx`.
//! Each transfer runs inside one database transaction: both balance updates
//! and the history row commit together or not at all, with an explicit
//! rollback on every business-rule failure path. Lock contention surfaces as
//! a retryable `Persistence` error after the busy timeout rather than
//! blocking indefinitely.
//!
//! # Dependency note
//!
//! `sqlx` is a hard dependency (no feature flag). This is intentional for a
//! proof-of-concept binary where build-complexity trade-offs favour
//! simplicity over optional compilation.

use chrono::{DateTime, SecondsFormat, Utc};
use domain::{LedgerError, TransferEvent, UserId, Wallet, WalletId, WalletStore};
use std::time::Duration;

/// Map any `sqlx` error to the retryable persistence variant.
fn persist(e: sqlx::Error) -> LedgerError {
    LedgerError::Persistence { reason: e.to_string() }
}

/// Fixed-width RFC3339 encoding so lexicographic order matches time order.
fn encode_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_ts(raw: &str) -> Result<DateTime<Utc>, LedgerError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| LedgerError::Persistence { reason: format!("bad timestamp {raw:?}: {e}") })
}

/// `WalletStore` adapter backed by a SQLite database file via `sqlx`.
///
/// Connects to (or creates) a SQLite file and ensures the `wallets` and
/// `transfers` tables exist. The `CHECK (balance >= 0)` constraint is a
/// backstop; insufficient funds are rejected before any update runs.
#[derive(Debug, Clone)]
pub struct SqliteWalletStore {
    pool: sqlx::SqlitePool,
}

impl SqliteWalletStore {
    /// Open or create a SQLite database and initialize the schema.
    ///
    /// Passes `create_if_missing(true)` so the database file is created on
    /// first run without manual setup, and a 5 s busy timeout so a held write
    /// lock fails the transfer with a retryable error instead of hanging.
    ///
    /// # Errors
    ///
    /// Returns `sqlx::Error` when the connection or schema creation fails.
    #[must_use]
    pub async fn new(db_url: &str) -> Result<Self, sqlx::Error> {
        let opts = db_url
            .parse::<sqlx::sqlite::SqliteConnectOptions>()?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = sqlx::SqlitePool::connect_with(opts).await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS wallets (
                id       INTEGER PRIMARY KEY AUTOINCREMENT,
                owner_id INTEGER NOT NULL,
                balance  INTEGER NOT NULL CHECK (balance >= 0)
            )",
        )
        .execute(&pool)
        .await?;
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS transfers (
                id        TEXT    PRIMARY KEY,
                from_user INTEGER NOT NULL,
                to_user   INTEGER NOT NULL,
                amount    INTEGER NOT NULL,
                timestamp TEXT    NOT NULL
            )",
        )
        .execute(&pool)
        .await?;
        Ok(Self { pool })
    }

    async fn fetch_wallet(&self, wallet: WalletId) -> Result<Option<Wallet>, LedgerError> {
        let row: Option<(i64, i64, i64)> =
            sqlx::query_as("SELECT id, owner_id, balance FROM wallets WHERE id = ?")
                .bind(wallet)
                .fetch_optional(&self.pool)
                .await
                .map_err(persist)?;
        Ok(row.map(|(id, owner_id, balance)| Wallet { id, owner_id, balance }))
    }
}

impl WalletStore for SqliteWalletStore {
    async fn create(&self, owner: UserId, initial_balance: i64) -> Result<Wallet, LedgerError> {
        let result = sqlx::query("INSERT INTO wallets (owner_id, balance) VALUES (?, ?)")
            .bind(owner)
            .bind(initial_balance)
            .execute(&self.pool)
            .await
            .map_err(persist)?;
        Ok(Wallet { id: result.last_insert_rowid(), owner_id: owner, balance: initial_balance })
    }

    async fn get(&self, wallet: WalletId) -> Result<Wallet, LedgerError> {
        self.fetch_wallet(wallet)
            .await?
            .ok_or(LedgerError::WalletNotFound { wallet })
    }

    async fn get_by_owner(&self, owner: UserId) -> Result<Wallet, LedgerError> {
        let row: Option<(i64, i64, i64)> =
            sqlx::query_as("SELECT id, owner_id, balance FROM wallets WHERE owner_id = ?")
                .bind(owner)
                .fetch_optional(&self.pool)
                .await
                .map_err(persist)?;
        row.map(|(id, owner_id, balance)| Wallet { id, owner_id, balance })
            .ok_or(LedgerError::UserNotFound { user: owner })
    }

    async fn top_up(&self, wallet: WalletId, amount: i64) -> Result<Wallet, LedgerError> {
        let result = sqlx::query("UPDATE wallets SET balance = balance + ? WHERE id = ?")
            .bind(amount)
            .bind(wallet)
            .execute(&self.pool)
            .await
            .map_err(persist)?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::WalletNotFound { wallet });
        }
        self.get(wallet).await
    }

    /// Debit, credit, and history row inside one transaction.
    ///
    /// Business-rule failures roll back explicitly; `sqlx` error paths roll
    /// back when the transaction guard drops.
    async fn transfer(
        &self,
        from: WalletId,
        to: WalletId,
        amount: i64,
    ) -> Result<(Wallet, TransferEvent), LedgerError> {
        let mut tx = self.pool.begin().await.map_err(persist)?;

        let source: Option<(i64, i64, i64)> =
            sqlx::query_as("SELECT id, owner_id, balance FROM wallets WHERE id = ?")
                .bind(from)
                .fetch_optional(&mut *tx)
                .await
                .map_err(persist)?;
        let dest: Option<(i64, i64, i64)> =
            sqlx::query_as("SELECT id, owner_id, balance FROM wallets WHERE id = ?")
                .bind(to)
                .fetch_optional(&mut *tx)
                .await
                .map_err(persist)?;

        let Some((_, from_owner, from_balance)) = source else {
            rollback(tx).await;
            return Err(LedgerError::WalletNotFound { wallet: from });
        };
        let Some((_, to_owner, _)) = dest else {
            rollback(tx).await;
            return Err(LedgerError::WalletNotFound { wallet: to });
        };
        if from_balance < amount {
            rollback(tx).await;
            return Err(LedgerError::InsufficientFunds {
                wallet: from,
                balance: from_balance,
                amount,
            });
        }

        sqlx::query("UPDATE wallets SET balance = balance - ? WHERE id = ?")
            .bind(amount)
            .bind(from)
            .execute(&mut *tx)
            .await
            .map_err(persist)?;
        sqlx::query("UPDATE wallets SET balance = balance + ? WHERE id = ?")
            .bind(amount)
            .bind(to)
            .execute(&mut *tx)
            .await
            .map_err(persist)?;

        let event = TransferEvent {
            id: uuid::Uuid::new_v4(),
            from_user: from_owner,
            to_user: to_owner,
            amount,
            timestamp: Utc::now(),
        };
        sqlx::query(
            "INSERT INTO transfers (id, from_user, to_user, amount, timestamp)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(event.id.to_string())
        .bind(event.from_user)
        .bind(event.to_user)
        .bind(event.amount)
        .bind(encode_ts(&event.timestamp))
        .execute(&mut *tx)
        .await
        .map_err(persist)?;

        tx.commit().await.map_err(persist)?;

        let updated = Wallet { id: from, owner_id: from_owner, balance: from_balance - amount };
        Ok((updated, event))
    }

    async fn history(
        &self,
        wallet: WalletId,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<TransferEvent>, LedgerError> {
        let owner = self.get(wallet).await?.owner_id;
        let rows: Vec<(String, i64, i64, i64, String)> = match range {
            Some((from, to)) => {
                sqlx::query_as(
                    "SELECT id, from_user, to_user, amount, timestamp FROM transfers
                     WHERE (from_user = ? OR to_user = ?)
                       AND timestamp >= ? AND timestamp <= ?
                     ORDER BY timestamp",
                )
                .bind(owner)
                .bind(owner)
                .bind(encode_ts(&from))
                .bind(encode_ts(&to))
                .fetch_all(&self.pool)
                .await
            }
            None => {
                sqlx::query_as(
                    "SELECT id, from_user, to_user, amount, timestamp FROM transfers
                     WHERE from_user = ? OR to_user = ?
                     ORDER BY timestamp",
                )
                .bind(owner)
                .bind(owner)
                .fetch_all(&self.pool)
                .await
            }
        }
        .map_err(persist)?;

        rows.into_iter()
            .map(|(id, from_user, to_user, amount, timestamp)| {
                let id = uuid::Uuid::parse_str(&id)
                    .map_err(|e| LedgerError::Persistence { reason: format!("bad event id: {e}") })?;
                Ok(TransferEvent {
                    id,
                    from_user,
                    to_user,
                    amount,
                    timestamp: decode_ts(&timestamp)?,
                })
            })
            .collect()
    }
}

/// Explicit rollback on business-rule failure paths; a failed rollback is
/// logged, not propagated, so the original error reaches the caller.
async fn rollback(tx: sqlx::Transaction<'_, sqlx::Sqlite>) {
    if let Err(e) = tx.rollback().await {
        tracing::warn!(error = %e, "sqlite.rollback.failed");
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
