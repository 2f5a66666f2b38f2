// Rust guideline compliant 2026-03-07

//! Synchronous gateways over the transfer pipeline.
//!
//! [`TransferGateway`] is the write path: resolve owners to wallets, execute
//! the ledger transfer (retrying transient persistence failures with backoff),
//! then publish the event keyed by the payer. [`Queries`] is the read path:
//! wallet lookup, notification feed, transfer history.
//!
//! The ledger is the source of truth. A publish failure after the ledger
//! commit never fails the transfer; after bounded retries the outcome carries
//! `published = false` and the loss is logged at error level.

use chrono::{DateTime, Utc};
use domain::{
    EventPublisher, LedgerError, Notification, NotificationStore, PublishError, TransferEvent,
    TransferRequest, UserId, Wallet, WalletId, WalletStore,
};
use ledger::Ledger;
use std::time::Duration;

// ---------------------------------------------------------------------------
// GatewayError
// ---------------------------------------------------------------------------

/// Errors surfaced by the transfer gateway.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The supplied configuration is invalid.
    #[error("invalid gateway configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
    /// The ledger rejected or failed the transfer.
    #[error("transfer failed: {0}")]
    Ledger(#[from] LedgerError),
}

// ---------------------------------------------------------------------------
// GatewayConfig + builder
// ---------------------------------------------------------------------------

/// Runtime configuration for a [`TransferGateway`].
///
/// Construct via [`GatewayConfig::builder`].
#[derive(Debug)]
pub struct GatewayConfig {
    /// Total attempts for the ledger call when it fails with a retryable
    /// persistence error (at least 1).
    pub persistence_attempts: u32,
    /// Total attempts for publishing the event (at least 1).
    pub publish_attempts: u32,
    /// Delay between retry attempts.
    pub retry_backoff: Duration,
}

/// Builder for [`GatewayConfig`].
///
/// Obtain via [`GatewayConfig::builder`]; finalize with [`build`](Self::build).
#[derive(Debug)]
pub struct GatewayConfigBuilder {
    persistence_attempts: u32,
    publish_attempts: u32,
    retry_backoff: Duration,
}

impl GatewayConfig {
    /// Create a builder.
    ///
    /// Default values: `persistence_attempts = 3`, `publish_attempts = 3`,
    /// `retry_backoff = 50 ms`.
    #[must_use]
    pub fn builder() -> GatewayConfigBuilder {
        GatewayConfigBuilder {
            persistence_attempts: 3,
            publish_attempts: 3,
            // Short backoff: the synchronous caller is waiting.
            retry_backoff: Duration::from_millis(50),
        }
    }
}

impl GatewayConfigBuilder {
    /// Override the total ledger attempts on retryable persistence failure.
    #[must_use]
    pub fn persistence_attempts(mut self, attempts: u32) -> Self {
        self.persistence_attempts = attempts;
        self
    }

    /// Override the total publish attempts.
    #[must_use]
    pub fn publish_attempts(mut self, attempts: u32) -> Self {
        self.publish_attempts = attempts;
        self
    }

    /// Override the delay between retry attempts.
    #[must_use]
    pub fn retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::InvalidConfig`] when either attempt count is
    /// zero.
    #[must_use = "the Result must be checked; use ? or unwrap"]
    pub fn build(self) -> Result<GatewayConfig, GatewayError> {
        if self.persistence_attempts == 0 || self.publish_attempts == 0 {
            return Err(GatewayError::InvalidConfig {
                reason: "attempt counts must be >= 1".to_owned(),
            });
        }
        Ok(GatewayConfig {
            persistence_attempts: self.persistence_attempts,
            publish_attempts: self.publish_attempts,
            retry_backoff: self.retry_backoff,
        })
    }
}

// ---------------------------------------------------------------------------
// TransferGateway
// ---------------------------------------------------------------------------

/// Result of an accepted transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferOutcome {
    /// The updated source wallet (confirmation the balance was deducted).
    pub source_wallet: Wallet,
    /// The recorded transfer event.
    pub event: TransferEvent,
    /// Whether the event reached the log. `false` marks the documented
    /// at-least-once gap: the transfer is financially valid but downstream
    /// consumers never see it.
    pub published: bool,
}

/// The synchronous write path: ledger transfer, then publish-after-commit.
///
/// Generic over the store and publisher ports for zero-cost static dispatch.
/// Holds no concrete adapter references -- dependencies are injected per call.
#[derive(Debug)]
pub struct TransferGateway {
    config: GatewayConfig,
    ledger: Ledger,
}

impl TransferGateway {
    /// Create a new gateway from `config`.
    #[must_use]
    pub fn new(config: GatewayConfig) -> Self {
        Self { config, ledger: Ledger::new() }
    }

    /// Submit a transfer: resolve wallets, execute on the ledger, publish.
    ///
    /// Validation failures surface immediately without retry. Retryable
    /// persistence failures are retried `persistence_attempts` times with
    /// backoff before surfacing. Publishing waits for the log's append
    /// acknowledgment; transient publish failures are retried
    /// `publish_attempts` times, after which the transfer is still reported
    /// successful with `published = false`.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Ledger`] for validation, lookup, business-rule,
    /// and exhausted persistence failures. A publish failure alone is never an
    /// error.
    pub async fn submit<S, P>(
        &self,
        store: &S,
        publisher: &P,
        request: TransferRequest,
    ) -> Result<TransferOutcome, GatewayError>
    where
        S: WalletStore,
        P: EventPublisher,
    {
        if request.amount <= 0 {
            return Err(LedgerError::InvalidAmount { amount: request.amount }.into());
        }

        let from_wallet = store.get_by_owner(request.from_owner).await?;
        let to_wallet = store.get_by_owner(request.to_owner).await?;

        let (source_wallet, event) = self
            .transfer_with_retry(store, from_wallet.id, to_wallet.id, request.amount)
            .await?;

        let published = self.publish_with_retry(publisher, &event).await;

        Ok(TransferOutcome { source_wallet, event, published })
    }

    /// Ledger call with bounded retry on retryable persistence failures.
    async fn transfer_with_retry<S: WalletStore>(
        &self,
        store: &S,
        from: WalletId,
        to: WalletId,
        amount: i64,
    ) -> Result<(Wallet, TransferEvent), GatewayError> {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.ledger.transfer(store, from, to, amount).await {
                Ok(result) => return Ok(result),
                Err(LedgerError::Persistence { reason })
                    if attempt < self.config.persistence_attempts =>
                {
                    tracing::warn!(attempt, reason, "gateway.transfer.retrying");
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Publish with bounded retry on transient failures; returns whether the
    /// event reached the log.
    async fn publish_with_retry<P: EventPublisher>(
        &self,
        publisher: &P,
        event: &TransferEvent,
    ) -> bool {
        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match publisher.publish(event.from_user, event).await {
                Ok(offset) => {
                    tracing::debug!(event_id = %event.id, offset, "gateway.event.published");
                    return true;
                }
                Err(PublishError::Unavailable { reason })
                    if attempt < self.config.publish_attempts =>
                {
                    tracing::warn!(attempt, reason, "gateway.publish.retrying");
                    tokio::time::sleep(self.config.retry_backoff).await;
                }
                Err(e) => {
                    // The ledger commit stands; only the downstream fan-out is
                    // lost. Surfaced via the outcome flag.
                    tracing::error!(
                        event_id = %event.id,
                        error = %e,
                        "gateway.event.lost: transfer committed but publish failed"
                    );
                    return false;
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// The synchronous read path over the ledger and the notification store.
#[derive(Debug)]
pub struct Queries;

impl Queries {
    /// Create a new query gateway.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// The wallet owned by `user`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UserNotFound`] when the user has no wallet.
    pub async fn wallet<S: WalletStore>(
        &self,
        store: &S,
        user: UserId,
    ) -> Result<Wallet, LedgerError> {
        store.get_by_owner(user).await
    }

    /// All notifications for `user` in arrival order.
    ///
    /// An empty feed is an ordinary response, never an error.
    pub fn notifications<N: NotificationStore>(&self, store: &N, user: UserId) -> Vec<Notification> {
        store.for_user(user)
    }

    /// Transfers involving `wallet`, ordered by timestamp, optionally limited
    /// to an inclusive `[from, to]` range.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::WalletNotFound`] or [`LedgerError::Persistence`].
    pub async fn transfer_history<S: WalletStore>(
        &self,
        store: &S,
        wallet: WalletId,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<TransferEvent>, LedgerError> {
        store.history(wallet, range).await
    }
}

impl Default for Queries {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::{GatewayConfig, GatewayError, Queries, TransferGateway};
    use chrono::{DateTime, Utc};
    use domain::{
        EventPublisher, LedgerError, PublishError, TransferEvent, TransferRequest, UserId,
        Wallet, WalletId, WalletStore,
    };
    use std::cell::{Cell, RefCell};
    use std::collections::HashMap;
    use std::time::Duration;

    // ------------------------------------------------------------------
    // Test helpers
    // ------------------------------------------------------------------

    fn make_gateway() -> TransferGateway {
        TransferGateway::new(
            GatewayConfig::builder()
                .retry_backoff(Duration::ZERO)
                .build()
                .unwrap(),
        )
    }

    /// In-memory store: wallet per owner, real balance arithmetic, optional
    /// injected persistence failures.
    struct MemStore {
        wallets: RefCell<HashMap<WalletId, Wallet>>,
        history: RefCell<Vec<TransferEvent>>,
        fail_times: Cell<u32>,
        transfer_calls: Cell<u32>,
    }

    impl MemStore {
        fn new(balances: &[(UserId, i64)]) -> Self {
            let wallets = balances
                .iter()
                .enumerate()
                .map(|(i, &(owner, balance))| {
                    let id = i as WalletId + 1;
                    (id, Wallet { id, owner_id: owner, balance })
                })
                .collect();
            Self {
                wallets: RefCell::new(wallets),
                history: RefCell::new(vec![]),
                fail_times: Cell::new(0),
                transfer_calls: Cell::new(0),
            }
        }

        fn failing_times(balances: &[(UserId, i64)], times: u32) -> Self {
            let store = Self::new(balances);
            store.fail_times.set(times);
            store
        }

        fn balance_of(&self, owner: UserId) -> i64 {
            self.wallets
                .borrow()
                .values()
                .find(|w| w.owner_id == owner)
                .map(|w| w.balance)
                .unwrap_or_default()
        }
    }

    impl WalletStore for MemStore {
        async fn create(&self, owner: UserId, initial_balance: i64) -> Result<Wallet, LedgerError> {
            let mut wallets = self.wallets.borrow_mut();
            let id = wallets.len() as WalletId + 1;
            let wallet = Wallet { id, owner_id: owner, balance: initial_balance };
            wallets.insert(id, wallet.clone());
            Ok(wallet)
        }

        async fn get(&self, wallet: WalletId) -> Result<Wallet, LedgerError> {
            self.wallets
                .borrow()
                .get(&wallet)
                .cloned()
                .ok_or(LedgerError::WalletNotFound { wallet })
        }

        async fn get_by_owner(&self, owner: UserId) -> Result<Wallet, LedgerError> {
            self.wallets
                .borrow()
                .values()
                .find(|w| w.owner_id == owner)
                .cloned()
                .ok_or(LedgerError::UserNotFound { user: owner })
        }

        async fn top_up(&self, wallet: WalletId, amount: i64) -> Result<Wallet, LedgerError> {
            let mut wallets = self.wallets.borrow_mut();
            let entry = wallets
                .get_mut(&wallet)
                .ok_or(LedgerError::WalletNotFound { wallet })?;
            entry.balance += amount;
            Ok(entry.clone())
        }

        async fn transfer(
            &self,
            from: WalletId,
            to: WalletId,
            amount: i64,
        ) -> Result<(Wallet, TransferEvent), LedgerError> {
            self.transfer_calls.set(self.transfer_calls.get() + 1);
            if self.fail_times.get() > 0 {
                self.fail_times.set(self.fail_times.get() - 1);
                return Err(LedgerError::Persistence { reason: "mock outage".to_owned() });
            }
            let mut wallets = self.wallets.borrow_mut();
            let source = wallets
                .get(&from)
                .cloned()
                .ok_or(LedgerError::WalletNotFound { wallet: from })?;
            let dest = wallets
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
            if let Some(w) = wallets.get_mut(&from) {
                w.balance -= amount;
            }
            if let Some(w) = wallets.get_mut(&to) {
                w.balance += amount;
            }
            self.history.borrow_mut().push(event.clone());
            let updated = wallets[&from].clone();
            Ok((updated, event))
        }

        async fn history(
            &self,
            wallet: WalletId,
            range: Option<(DateTime<Utc>, DateTime<Utc>)>,
        ) -> Result<Vec<TransferEvent>, LedgerError> {
            let owner = self.get(wallet).await?.owner_id;
            Ok(self
                .history
                .borrow()
                .iter()
                .filter(|e| e.from_user == owner || e.to_user == owner)
                .filter(|e| {
                    range.is_none_or(|(from, to)| e.timestamp >= from && e.timestamp <= to)
                })
                .cloned()
                .collect())
        }
    }

    /// Mock publisher: captures publishes, optionally failing the first `n`
    /// attempts or failing every attempt with a fixed error.
    struct MockPublisher {
        published: RefCell<Vec<(UserId, TransferEvent)>>,
        attempts: Cell<u32>,
        fail_first: u32,
        fail_always: Option<PublishError>,
    }

    impl MockPublisher {
        fn new() -> Self {
            Self {
                published: RefCell::new(vec![]),
                attempts: Cell::new(0),
                fail_first: 0,
                fail_always: None,
            }
        }

        fn unavailable_first(times: u32) -> Self {
            Self { fail_first: times, ..Self::new() }
        }

        fn always_failing(error: PublishError) -> Self {
            Self { fail_always: Some(error), ..Self::new() }
        }
    }

    impl EventPublisher for MockPublisher {
        async fn publish(
            &self,
            key: UserId,
            event: &TransferEvent,
        ) -> Result<u64, PublishError> {
            let attempt = self.attempts.get() + 1;
            self.attempts.set(attempt);
            if let Some(e) = &self.fail_always {
                return Err(e.clone());
            }
            if attempt <= self.fail_first {
                return Err(PublishError::Unavailable { reason: "mock outage".to_owned() });
            }
            self.published.borrow_mut().push((key, event.clone()));
            Ok(0)
        }
    }

    fn request(from: UserId, to: UserId, amount: i64) -> TransferRequest {
        TransferRequest { from_owner: from, to_owner: to, amount }
    }

    // ------------------------------------------------------------------
    // Config validation
    // ------------------------------------------------------------------

    #[test]
    fn config_rejects_zero_attempts() {
        let result = GatewayConfig::builder().publish_attempts(0).build();
        assert!(matches!(result, Err(GatewayError::InvalidConfig { .. })));
        let result = GatewayConfig::builder().persistence_attempts(0).build();
        assert!(matches!(result, Err(GatewayError::InvalidConfig { .. })));
    }

    // ------------------------------------------------------------------
    // submit
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn accepted_transfer_moves_funds_and_publishes() {
        let gateway = make_gateway();
        let store = MemStore::new(&[(1, 100), (2, 50)]);
        let publisher = MockPublisher::new();

        let outcome = gateway.submit(&store, &publisher, request(1, 2, 30)).await.unwrap();

        assert_eq!(outcome.source_wallet.balance, 70);
        assert!(outcome.published);
        assert_eq!(outcome.event.from_user, 1);
        assert_eq!(outcome.event.to_user, 2);
        assert_eq!(outcome.event.amount, 30);
        assert_eq!(store.balance_of(1), 70);
        assert_eq!(store.balance_of(2), 80);

        let published = publisher.published.borrow();
        assert_eq!(published.len(), 1);
        assert_eq!(published[0].0, 1, "event keyed by the payer");
        assert_eq!(published[0].1, outcome.event);
    }

    #[tokio::test]
    async fn invalid_amount_rejected_before_any_lookup() {
        let gateway = make_gateway();
        let store = MemStore::new(&[(1, 100), (2, 50)]);
        let publisher = MockPublisher::new();

        let result = gateway.submit(&store, &publisher, request(1, 2, 0)).await;

        assert!(matches!(
            result,
            Err(GatewayError::Ledger(LedgerError::InvalidAmount { amount: 0 }))
        ));
        assert_eq!(publisher.attempts.get(), 0);
    }

    #[tokio::test]
    async fn unknown_payer_surfaces_not_found() {
        let gateway = make_gateway();
        let store = MemStore::new(&[(2, 50)]);
        let publisher = MockPublisher::new();

        let result = gateway.submit(&store, &publisher, request(1, 2, 30)).await;

        assert!(matches!(
            result,
            Err(GatewayError::Ledger(LedgerError::UserNotFound { user: 1 }))
        ));
        assert_eq!(publisher.attempts.get(), 0);
    }

    #[tokio::test]
    async fn insufficient_funds_changes_nothing_and_publishes_nothing() {
        let gateway = make_gateway();
        let store = MemStore::new(&[(1, 100), (2, 50)]);
        let publisher = MockPublisher::new();

        let result = gateway.submit(&store, &publisher, request(1, 2, 200)).await;

        assert!(matches!(
            result,
            Err(GatewayError::Ledger(LedgerError::InsufficientFunds { .. }))
        ));
        assert_eq!(store.balance_of(1), 100, "no balance change");
        assert_eq!(store.balance_of(2), 50);
        assert_eq!(publisher.attempts.get(), 0, "no event published");
    }

    #[tokio::test]
    async fn self_transfer_rejected() {
        let gateway = make_gateway();
        let store = MemStore::new(&[(1, 100)]);
        let publisher = MockPublisher::new();

        let result = gateway.submit(&store, &publisher, request(1, 1, 30)).await;

        assert!(matches!(
            result,
            Err(GatewayError::Ledger(LedgerError::SelfTransfer { .. }))
        ));
    }

    #[tokio::test]
    async fn transient_persistence_failure_is_retried() {
        let gateway = make_gateway();
        let store = MemStore::failing_times(&[(1, 100), (2, 50)], 2);
        let publisher = MockPublisher::new();

        let outcome = gateway.submit(&store, &publisher, request(1, 2, 30)).await.unwrap();

        assert_eq!(store.transfer_calls.get(), 3, "two failures then success");
        assert_eq!(outcome.source_wallet.balance, 70);
    }

    #[tokio::test]
    async fn exhausted_persistence_retries_surface() {
        let gateway = make_gateway();
        let store = MemStore::failing_times(&[(1, 100), (2, 50)], 10);
        let publisher = MockPublisher::new();

        let result = gateway.submit(&store, &publisher, request(1, 2, 30)).await;

        assert!(matches!(
            result,
            Err(GatewayError::Ledger(LedgerError::Persistence { .. }))
        ));
        assert_eq!(store.transfer_calls.get(), 3, "bounded by persistence_attempts");
        assert_eq!(publisher.attempts.get(), 0);
    }

    #[tokio::test]
    async fn publish_outage_retried_then_succeeds() {
        let gateway = make_gateway();
        let store = MemStore::new(&[(1, 100), (2, 50)]);
        let publisher = MockPublisher::unavailable_first(2);

        let outcome = gateway.submit(&store, &publisher, request(1, 2, 30)).await.unwrap();

        assert!(outcome.published);
        assert_eq!(publisher.attempts.get(), 3);
    }

    #[tokio::test]
    async fn exhausted_publish_retries_keep_transfer_valid() {
        let gateway = make_gateway();
        let store = MemStore::new(&[(1, 100), (2, 50)]);
        let publisher = MockPublisher::always_failing(PublishError::Unavailable {
            reason: "down".to_owned(),
        });

        let outcome = gateway.submit(&store, &publisher, request(1, 2, 30)).await.unwrap();

        assert!(!outcome.published, "loss is flagged, not an error");
        assert_eq!(store.balance_of(1), 70, "ledger commit stands");
        assert_eq!(publisher.attempts.get(), 3);
    }

    #[tokio::test]
    async fn closed_log_is_not_retried() {
        let gateway = make_gateway();
        let store = MemStore::new(&[(1, 100), (2, 50)]);
        let publisher = MockPublisher::always_failing(PublishError::Closed);

        let outcome = gateway.submit(&store, &publisher, request(1, 2, 30)).await.unwrap();

        assert!(!outcome.published);
        assert_eq!(publisher.attempts.get(), 1, "Closed is terminal, not transient");
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn wallet_query_resolves_by_owner() {
        let queries = Queries::new();
        let store = MemStore::new(&[(1, 100)]);

        let wallet = queries.wallet(&store, 1).await.unwrap();
        assert_eq!(wallet.owner_id, 1);
        assert_eq!(wallet.balance, 100);

        let missing = queries.wallet(&store, 9).await;
        assert!(matches!(missing, Err(LedgerError::UserNotFound { user: 9 })));
    }

    #[tokio::test]
    async fn history_query_filters_by_range() {
        let gateway = make_gateway();
        let queries = Queries::new();
        let store = MemStore::new(&[(1, 100), (2, 50)]);
        let publisher = MockPublisher::new();

        gateway.submit(&store, &publisher, request(1, 2, 10)).await.unwrap();
        gateway.submit(&store, &publisher, request(1, 2, 20)).await.unwrap();

        let wallet = queries.wallet(&store, 1).await.unwrap();
        let all = queries.transfer_history(&store, wallet.id, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let future = Utc::now() + chrono::Duration::hours(1);
        let far_future = future + chrono::Duration::hours(1);
        let none = queries
            .transfer_history(&store, wallet.id, Some((future, far_future)))
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
