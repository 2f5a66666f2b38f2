// Rust guideline compliant 2026-03-07

//! In-memory adapter for the `WalletStore` port.
//!
//! The default demo backend and the test seam for everything that touches the
//! ledger. A single mutex spans each whole read-modify-write, so concurrent
//! transfers serialize and the non-negative-balance invariant holds with no
//! partial update ever observable.

use chrono::{DateTime, Utc};
use domain::{LedgerError, TransferEvent, UserId, Wallet, WalletId, WalletStore};
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Heap state: wallets by id plus the append-only transfer history.
#[derive(Debug, Default)]
struct Inner {
    wallets: HashMap<WalletId, Wallet>,
    history: Vec<TransferEvent>,
    next_id: WalletId,
}

/// `WalletStore` adapter backed by a mutex-guarded map.
///
/// `transfer` performs every check before the first mutation, all under one
/// lock acquisition, which makes the debit/credit pair atomic and serialized
/// against all other wallet operations.
// #[allow] not #[expect]: dead_code fires in the transfer_pipeline_sqlite
// binary but NOT in transfer_pipeline, so #[expect] would generate an
// unfulfilled-expectation warning in one of the two binaries.
#[allow(dead_code, reason = "used by transfer_pipeline; dead in transfer_pipeline_sqlite")]
#[derive(Debug, Default)]
pub struct InMemoryWalletStore {
    inner: Mutex<Inner>,
}

impl InMemoryWalletStore {
    /// Create an empty store.
    // See struct-level allow(dead_code) comment above.
    #[allow(dead_code, reason = "used by transfer_pipeline; dead in transfer_pipeline_sqlite")]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl WalletStore for InMemoryWalletStore {
    async fn create(&self, owner: UserId, initial_balance: i64) -> Result<Wallet, LedgerError> {
        let mut inner = self.inner.lock().await;
        inner.next_id += 1;
        let wallet = Wallet { id: inner.next_id, owner_id: owner, balance: initial_balance };
        inner.wallets.insert(wallet.id, wallet.clone());
        Ok(wallet)
    }

    async fn get(&self, wallet: WalletId) -> Result<Wallet, LedgerError> {
        let inner = self.inner.lock().await;
        inner
            .wallets
            .get(&wallet)
            .cloned()
            .ok_or(LedgerError::WalletNotFound { wallet })
    }

    async fn get_by_owner(&self, owner: UserId) -> Result<Wallet, LedgerError> {
        let inner = self.inner.lock().await;
        inner
            .wallets
            .values()
            .find(|w| w.owner_id == owner)
            .cloned()
            .ok_or(LedgerError::UserNotFound { user: owner })
    }

    async fn top_up(&self, wallet: WalletId, amount: i64) -> Result<Wallet, LedgerError> {
        let mut inner = self.inner.lock().await;
        let entry = inner
            .wallets
            .get_mut(&wallet)
            .ok_or(LedgerError::WalletNotFound { wallet })?;
        entry.balance += amount;
        Ok(entry.clone())
    }

    /// Atomic debit/credit: all checks precede any mutation, and the lock
    /// spans the whole operation.
    async fn transfer(
        &self,
        from: WalletId,
        to: WalletId,
        amount: i64,
    ) -> Result<(Wallet, TransferEvent), LedgerError> {
        let mut inner = self.inner.lock().await;

        let source = inner
            .wallets
            .get(&from)
            .cloned()
            .ok_or(LedgerError::WalletNotFound { wallet: from })?;
        let dest = inner
            .wallets
            .get(&to)
            .cloned()
            .ok_or(LedgerError::WalletNotFound { wallet: to })?;
        if source.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                wallet: from,
                balance: source.balance,
                amount,
            });
        }

        let event = TransferEvent {
            id: uuid::Uuid::new_v4(),
            from_user: source.owner_id,
            to_user: dest.owner_id,
            amount,
            timestamp: Utc::now(),
        };

        if let Some(w) = inner.wallets.get_mut(&from) {
            w.balance -= amount;
        }
        if let Some(w) = inner.wallets.get_mut(&to) {
            w.balance += amount;
        }
        inner.history.push(event.clone());

        let updated = inner
            .wallets
            .get(&from)
            .cloned()
            .ok_or(LedgerError::WalletNotFound { wallet: from })?;
        Ok((updated, event))
    }

    async fn history(
        &self,
        wallet: WalletId,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<TransferEvent>, LedgerError> {
        let inner = self.inner.lock().await;
        let owner = inner
            .wallets
            .get(&wallet)
            .map(|w| w.owner_id)
            .ok_or(LedgerError::WalletNotFound { wallet })?;
        Ok(inner
            .history
            .iter()
            .filter(|e| e.from_user == owner || e.to_user == owner)
            .filter(|e| range.is_none_or(|(from, to)| e.timestamp >= from && e.timestamp <= to))
            .cloned()
            .collect())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
