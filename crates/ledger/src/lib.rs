// Rust guideline compliant 2026-03-02

//! Ledger service -- the synchronous, consistency-critical write path over a
//! `WalletStore` port.
//!
//! Entry points: [`Ledger::transfer`], [`Ledger::top_up`]. Validation happens
//! here; atomic execution and serialization of concurrent transfers are the
//! store's contract. The ledger is the source of truth: nothing downstream of
//! it (fraud screening, notifications) may roll a committed transfer back.

use domain::{LedgerError, TransferEvent, Wallet, WalletId, WalletStore};

/// Validates transfer and top-up requests and delegates atomic execution to a
/// [`WalletStore`] adapter.
///
/// Generic over the store port for zero-cost static dispatch. Holds no
/// concrete adapter reference -- the dependency is injected per call.
#[derive(Debug)]
pub struct Ledger;

impl Ledger {
    /// Create a new ledger service.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Move `amount` from `from` to `to` as one atomic debit/credit pair.
    ///
    /// Returns the updated source wallet (the caller only needs confirmation
    /// that the balance was deducted) and the recorded transfer event.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidAmount`] when `amount <= 0`,
    /// [`LedgerError::SelfTransfer`] when both sides name the same wallet,
    /// and otherwise whatever the store surfaces: `WalletNotFound`,
    /// `InsufficientFunds`, or retryable `Persistence`.
    pub async fn transfer<S: WalletStore>(
        &self,
        store: &S,
        from: WalletId,
        to: WalletId,
        amount: i64,
    ) -> Result<(Wallet, TransferEvent), LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount { amount });
        }
        if from == to {
            return Err(LedgerError::SelfTransfer { wallet: from });
        }
        let (wallet, event) = store.transfer(from, to, amount).await?;
        tracing::debug!(
            event_id = %event.id,
            from_wallet = from,
            to_wallet = to,
            amount,
            "ledger.transfer.accepted"
        );
        Ok((wallet, event))
    }

    /// Credit `amount` to `wallet` and return the updated wallet.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::InvalidAmount`] when `amount <= 0`, or the
    /// store's `WalletNotFound` / `Persistence` errors.
    pub async fn top_up<S: WalletStore>(
        &self,
        store: &S,
        wallet: WalletId,
        amount: i64,
    ) -> Result<Wallet, LedgerError> {
        if amount <= 0 {
            return Err(LedgerError::InvalidAmount { amount });
        }
        let updated = store.top_up(wallet, amount).await?;
        tracing::debug!(wallet, amount, balance = updated.balance, "ledger.top_up.applied");
        Ok(updated)
    }
}

impl Default for Ledger {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
