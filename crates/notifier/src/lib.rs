// Rust guideline compliant 2026-03-05

//! Notification consumer -- the second consumer group, downstream of the
//! fraud screen -- and the concurrent per-user notification store it feeds.
//!
//! For each clean transfer event: append an audit line (best-effort), insert
//! a notification under the recipient's key, commit the offset. Entry points:
//! [`Notifier::notify_once`], [`Notifier::run`]. Configuration via
//! [`NotifierConfig::builder`]. The store is [`SharedNotificationStore`]:
//! many readers, one writer, idempotent by event id.

use domain::{
    AuditError, AuditSink, EventStream, FetchError, Notification, NotificationStore,
    TransferEvent, UserId,
};
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

// ---------------------------------------------------------------------------
// SharedNotificationStore
// ---------------------------------------------------------------------------

/// Feeds plus the set of already-delivered event ids.
#[derive(Debug, Default)]
struct Feeds {
    by_user: HashMap<UserId, Vec<Notification>>,
    delivered: HashSet<uuid::Uuid>,
}

/// Concurrent per-user notification feeds behind a read/write lock.
///
/// Readers (the query path) never block each other; the single consumer
/// thread takes the write lock per insert. A reader can never observe a
/// partially-appended feed. Entries accumulate without expiry -- callers page
/// or reset externally.
///
/// Replays are absorbed here: the event id set makes `add` idempotent, so
/// at-least-once redelivery from the log never duplicates a feed entry.
#[derive(Debug, Default)]
pub struct SharedNotificationStore {
    inner: RwLock<Feeds>,
}

impl SharedNotificationStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of notifications across all users.
    #[must_use]
    pub fn len(&self) -> usize {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.by_user.values().map(Vec::len).sum()
    }

    /// Whether no notification has been delivered yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NotificationStore for SharedNotificationStore {
    fn add(&self, recipient: UserId, event: TransferEvent) -> bool {
        // A poisoned lock only means another thread panicked mid-operation;
        // the map itself is still structurally sound, so keep serving.
        let mut inner = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if !inner.delivered.insert(event.id) {
            return false;
        }
        inner
            .by_user
            .entry(recipient)
            .or_default()
            .push(Notification { recipient, event });
        true
    }

    fn for_user(&self, user: UserId) -> Vec<Notification> {
        let inner = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        inner.by_user.get(&user).cloned().unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// NotifierError
// ---------------------------------------------------------------------------

/// Errors that can occur during notification consumption.
#[derive(Debug, thiserror::Error)]
pub enum NotifierError {
    /// The supplied configuration is invalid.
    #[error("invalid notifier configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
    /// A fetch or commit on the source subscription failed.
    #[error("source error: {0}")]
    Fetch(FetchError),
}

// ---------------------------------------------------------------------------
// NotifierConfig + builder
// ---------------------------------------------------------------------------

/// Runtime configuration for a [`Notifier`].
///
/// Construct via [`NotifierConfig::builder`].
#[derive(Debug)]
pub struct NotifierConfig {
    /// Maximum number of records fetched per batch (range: `[1, batch_max]`).
    pub batch_max: usize,
    /// Delay between successive batch iterations.
    pub poll_interval: Duration,
    /// Delay before retrying after the source reports `Unavailable`.
    pub retry_backoff: Duration,
    /// Optional upper bound on the number of batches. `None` means run until
    /// the log closes.
    pub iterations: Option<u64>,
}

/// Builder for [`NotifierConfig`].
///
/// Obtain via [`NotifierConfig::builder`]; finalize with [`build`](Self::build).
#[derive(Debug)]
pub struct NotifierConfigBuilder {
    batch_max: usize,
    poll_interval: Duration,
    retry_backoff: Duration,
    iterations: Option<u64>,
}

impl NotifierConfig {
    /// Create a builder. `batch_max` is the only required parameter.
    ///
    /// Default values: `poll_interval = 25 ms`, `retry_backoff = 500 ms`,
    /// `iterations = None`.
    #[must_use]
    pub fn builder(batch_max: usize) -> NotifierConfigBuilder {
        NotifierConfigBuilder {
            batch_max,
            // Matches the screen cadence so the clean topic never backs up.
            poll_interval: Duration::from_millis(25),
            retry_backoff: Duration::from_millis(500),
            iterations: None,
        }
    }
}

impl NotifierConfigBuilder {
    /// Override the inter-batch delay.
    #[must_use]
    pub fn poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Override the backoff applied when the source is unavailable.
    #[must_use]
    pub fn retry_backoff(mut self, retry_backoff: Duration) -> Self {
        self.retry_backoff = retry_backoff;
        self
    }

    /// Set a finite batch count. Without this the notifier runs until the log
    /// signals `Closed`.
    #[must_use]
    pub fn iterations(mut self, n: u64) -> Self {
        self.iterations = Some(n);
        self
    }

    /// Validate and build the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError::InvalidConfig`] when `batch_max` is zero.
    #[must_use = "the Result must be checked; use ? or unwrap"]
    pub fn build(self) -> Result<NotifierConfig, NotifierError> {
        if self.batch_max == 0 {
            return Err(NotifierError::InvalidConfig {
                reason: "batch_max must be >= 1".to_owned(),
            });
        }
        Ok(NotifierConfig {
            batch_max: self.batch_max,
            poll_interval: self.poll_interval,
            retry_backoff: self.retry_backoff,
            iterations: self.iterations,
        })
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Reads clean transfer events, audits them, and delivers notifications to
/// the recipient's feed.
///
/// Generic over the source, audit, and store ports for zero-cost static
/// dispatch. Holds no concrete adapter references -- dependencies are
/// injected per call.
#[derive(Debug)]
pub struct Notifier {
    config: NotifierConfig,
}

impl Notifier {
    /// Create a new notifier from `config`.
    #[must_use]
    pub fn new(config: NotifierConfig) -> Self {
        Self { config }
    }

    /// Process one batch: fetch, audit, deliver, commit.
    ///
    /// Per record: decode (malformed payloads are logged, skipped, and still
    /// covered by the commit), append the audit line (best-effort: a failure
    /// is collected and the notification is delivered anyway), then insert
    /// under `to_user`. Duplicate event ids are absorbed by the store.
    /// Returns collected audit failures in `Ok(vec)`; hard errors propagate
    /// as `Err`.
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError::Fetch`] on source failure (including `Closed`).
    pub async fn notify_once<S, A, N>(
        &self,
        source: &S,
        audit: &A,
        store: &N,
    ) -> Result<Vec<AuditError>, NotifierError>
    where
        S: EventStream,
        A: AuditSink,
        N: NotificationStore,
    {
        let batch = source
            .fetch(self.config.batch_max)
            .await
            .map_err(NotifierError::Fetch)?;

        tracing::debug!(size = batch.len(), "notifier.batch.fetched");

        let mut audit_errors: Vec<AuditError> = vec![];
        let mut last_offset = None;
        for record in &batch {
            last_offset = Some(record.offset);
            let event = match TransferEvent::from_bytes(&record.payload) {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(
                        offset = record.offset,
                        key = record.key,
                        error = %e,
                        "notifier.skip.malformed"
                    );
                    continue;
                }
            };

            // Audit first, then deliver; audit durability is best-effort and
            // never gates the notification.
            if let Err(e) = audit.append(&event).await {
                audit_errors.push(e);
            }

            if store.add(event.to_user, event.clone()) {
                tracing::debug!(
                    event_id = %event.id,
                    recipient = event.to_user,
                    amount = event.amount,
                    "notifier.delivered"
                );
            } else {
                tracing::debug!(event_id = %event.id, "notifier.duplicate.skipped");
            }
        }

        if let Some(offset) = last_offset {
            source.commit(offset).await.map_err(NotifierError::Fetch)?;
        }

        Ok(audit_errors)
    }

    /// Run the delivery loop until stopped.
    ///
    /// Calls [`notify_once`](Self::notify_once) repeatedly, sleeping
    /// `poll_interval` between batches. Stops cleanly when:
    /// - the source signals [`FetchError::Closed`] (returns `Ok(())`), or
    /// - `config.iterations` batches have been processed (returns `Ok(())`).
    ///
    /// An unavailable source is retried indefinitely after `retry_backoff`.
    /// Audit failures are logged as warnings but do not abort the loop.
    ///
    /// # Errors
    ///
    /// Returns [`NotifierError`] for any hard error; `Closed` and
    /// `Unavailable` are handled internally.
    pub async fn run<S, A, N>(
        &self,
        source: &S,
        audit: &A,
        store: &N,
    ) -> Result<(), NotifierError>
    where
        S: EventStream,
        A: AuditSink,
        N: NotificationStore,
    {
        let mut count = 0u64;
        loop {
            match self.notify_once(source, audit, store).await {
                Ok(audit_errs) => {
                    for e in &audit_errs {
                        tracing::warn!(error = %e, "notifier.audit.failed");
                    }
                }
                Err(NotifierError::Fetch(FetchError::Closed)) => {
                    tracing::info!(iterations = count, "notifier.run.stopped: log closed");
                    return Ok(());
                }
                Err(NotifierError::Fetch(FetchError::Unavailable { reason })) => {
                    tracing::warn!(reason, "notifier.fetch.unavailable: backing off");
                    tokio::time::sleep(self.config.retry_backoff).await;
                    continue;
                }
                Err(e) => return Err(e),
            }

            count += 1;
            tracing::debug!(iteration = count, "notifier.batch.processed");

            if let Some(max) = self.config.iterations
                && count >= max
            {
                tracing::info!("notifier.run.stopped: iteration limit reached");
                return Ok(());
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::{Notifier, NotifierConfig, NotifierError, SharedNotificationStore};
    use domain::{
        AuditError, AuditSink, EventStream, FetchError, NotificationStore as _, Record,
        TransferEvent,
    };
    use std::cell::{Cell, RefCell};
    use std::sync::Arc;
    use std::time::Duration;

    // ------------------------------------------------------------------
    // Test helpers
    // ------------------------------------------------------------------

    fn make_event(to: i64, amount: i64) -> TransferEvent {
        TransferEvent {
            id: uuid::Uuid::new_v4(),
            from_user: 1,
            to_user: to,
            amount,
            timestamp: chrono::Utc::now(),
        }
    }

    fn make_record(offset: u64, event: &TransferEvent) -> Record {
        Record {
            offset,
            key: event.from_user,
            payload: event.to_bytes().unwrap(),
        }
    }

    fn make_notifier(batch_max: usize) -> Notifier {
        Notifier::new(
            NotifierConfig::builder(batch_max)
                .poll_interval(Duration::ZERO)
                .retry_backoff(Duration::ZERO)
                .build()
                .unwrap(),
        )
    }

    /// Pre-loaded stream; signals `Closed` when drained.
    struct MockStream {
        records: RefCell<Vec<Record>>,
        committed: Cell<u64>,
    }

    impl MockStream {
        fn new(records: Vec<Record>) -> Self {
            Self { records: RefCell::new(records), committed: Cell::new(0) }
        }
    }

    impl EventStream for MockStream {
        async fn fetch(&self, max: usize) -> Result<Vec<Record>, FetchError> {
            let committed = self.committed.get();
            let pending: Vec<Record> = self
                .records
                .borrow()
                .iter()
                .filter(|r| r.offset >= committed)
                .take(max)
                .cloned()
                .collect();
            if pending.is_empty() {
                return Err(FetchError::Closed);
            }
            Ok(pending)
        }

        async fn commit(&self, offset: u64) -> Result<(), FetchError> {
            if offset + 1 > self.committed.get() {
                self.committed.set(offset + 1);
            }
            Ok(())
        }
    }

    struct MockAudit {
        lines: RefCell<Vec<TransferEvent>>,
        always_fail: bool,
    }

    impl MockAudit {
        fn new() -> Self {
            Self { lines: RefCell::new(vec![]), always_fail: false }
        }

        fn always_failing() -> Self {
            Self { lines: RefCell::new(vec![]), always_fail: true }
        }
    }

    impl AuditSink for MockAudit {
        async fn append(&self, event: &TransferEvent) -> Result<(), AuditError> {
            if self.always_fail {
                return Err(AuditError::WriteFailed { reason: "disk full".to_owned() });
            }
            self.lines.borrow_mut().push(event.clone());
            Ok(())
        }
    }

    // ------------------------------------------------------------------
    // SharedNotificationStore
    // ------------------------------------------------------------------

    #[test]
    fn feed_preserves_insertion_order() {
        let store = SharedNotificationStore::new();
        let first = make_event(2, 10);
        let second = make_event(2, 20);

        assert!(store.add(2, first.clone()));
        assert!(store.add(2, second.clone()));

        let feed = store.for_user(2);
        assert_eq!(feed.len(), 2);
        assert_eq!(feed[0].event, first);
        assert_eq!(feed[1].event, second);
        assert_eq!(feed[0].recipient, 2);
    }

    #[test]
    fn unknown_user_gets_empty_feed_not_error() {
        let store = SharedNotificationStore::new();
        assert!(store.for_user(42).is_empty());
        assert!(store.is_empty());
    }

    #[test]
    fn duplicate_event_id_is_absorbed() {
        let store = SharedNotificationStore::new();
        let event = make_event(2, 10);

        assert!(store.add(2, event.clone()));
        assert!(!store.add(2, event.clone()), "replay must report already-delivered");

        assert_eq!(store.for_user(2).len(), 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn feeds_are_isolated_per_user() {
        let store = SharedNotificationStore::new();
        store.add(2, make_event(2, 10));
        store.add(3, make_event(3, 20));

        assert_eq!(store.for_user(2).len(), 1);
        assert_eq!(store.for_user(3).len(), 1);
        assert_eq!(store.for_user(2)[0].event.amount, 10);
    }

    #[test]
    fn concurrent_readers_and_writer() {
        let store = Arc::new(SharedNotificationStore::new());
        let writer = {
            let store = Arc::clone(&store);
            std::thread::spawn(move || {
                for i in 0..100 {
                    store.add(7, make_event(7, i));
                }
            })
        };
        let readers: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    // Feeds must always read consistently, whatever the
                    // interleaving with the writer.
                    for _ in 0..100 {
                        let feed = store.for_user(7);
                        for (i, n) in feed.iter().enumerate() {
                            assert_eq!(n.event.amount, i as i64);
                        }
                    }
                })
            })
            .collect();

        writer.join().unwrap();
        for r in readers {
            r.join().unwrap();
        }
        assert_eq!(store.for_user(7).len(), 100);
    }

    // ------------------------------------------------------------------
    // NotifierConfig validation
    // ------------------------------------------------------------------

    #[test]
    fn config_rejects_zero_batch_max() {
        let result = NotifierConfig::builder(0).build();
        assert!(matches!(result, Err(NotifierError::InvalidConfig { .. })));
    }

    // ------------------------------------------------------------------
    // notify_once
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn delivers_to_recipient_and_audits() {
        let notifier = make_notifier(10);
        let event = make_event(2, 30);
        let source = MockStream::new(vec![make_record(0, &event)]);
        let audit = MockAudit::new();
        let store = SharedNotificationStore::new();

        notifier.notify_once(&source, &audit, &store).await.unwrap();

        assert_eq!(audit.lines.borrow().len(), 1);
        let feed = store.for_user(2);
        assert_eq!(feed.len(), 1);
        assert_eq!(feed[0].event, event);
        assert_eq!(source.committed.get(), 1);
    }

    #[tokio::test]
    async fn audit_failure_still_delivers() {
        let notifier = make_notifier(10);
        let event = make_event(2, 30);
        let source = MockStream::new(vec![make_record(0, &event)]);
        let audit = MockAudit::always_failing();
        let store = SharedNotificationStore::new();

        let audit_errors = notifier.notify_once(&source, &audit, &store).await.unwrap();

        assert_eq!(audit_errors.len(), 1, "audit failure surfaced best-effort");
        assert_eq!(store.for_user(2).len(), 1, "notification delivered regardless");
        assert_eq!(source.committed.get(), 1);
    }

    #[tokio::test]
    async fn malformed_payload_skipped_and_committed() {
        let notifier = make_notifier(10);
        let event = make_event(2, 30);
        let source = MockStream::new(vec![
            Record { offset: 0, key: 1, payload: b"garbage".to_vec() },
            make_record(1, &event),
        ]);
        let audit = MockAudit::new();
        let store = SharedNotificationStore::new();

        let result = notifier.notify_once(&source, &audit, &store).await;

        assert!(result.is_ok(), "malformed payloads must not kill the loop: {result:?}");
        assert_eq!(store.for_user(2).len(), 1);
        assert_eq!(source.committed.get(), 2, "malformed record still marked processed");
    }

    #[tokio::test]
    async fn redelivered_batch_does_not_duplicate_feed() {
        let notifier = make_notifier(10);
        let event = make_event(2, 30);
        let source = MockStream::new(vec![make_record(0, &event)]);
        let audit = MockAudit::new();
        let store = SharedNotificationStore::new();

        // First delivery processed but "crashed" before commit: rewind the
        // cursor and deliver again.
        notifier.notify_once(&source, &audit, &store).await.unwrap();
        source.committed.set(0);
        notifier.notify_once(&source, &audit, &store).await.unwrap();

        assert_eq!(store.for_user(2).len(), 1, "at-least-once replay must not duplicate");
    }

    // ------------------------------------------------------------------
    // run loop
    // ------------------------------------------------------------------

    #[tokio::test]
    async fn run_drains_everything_then_stops() {
        let notifier = make_notifier(2);
        let events: Vec<TransferEvent> = (0..5).map(|i| make_event(2, i * 10)).collect();
        let records = events
            .iter()
            .enumerate()
            .map(|(i, e)| make_record(i as u64, e))
            .collect();
        let source = MockStream::new(records);
        let audit = MockAudit::new();
        let store = SharedNotificationStore::new();

        let result = notifier.run(&source, &audit, &store).await;

        assert!(result.is_ok(), "Closed must terminate cleanly: {result:?}");
        assert_eq!(store.for_user(2).len(), 5);
        assert_eq!(audit.lines.borrow().len(), 5);
    }

    #[tokio::test]
    async fn run_honors_iteration_limit() {
        let notifier = Notifier::new(
            NotifierConfig::builder(1)
                .iterations(3)
                .poll_interval(Duration::ZERO)
                .build()
                .unwrap(),
        );
        let records = (0..10)
            .map(|i| make_record(i, &make_event(2, 5)))
            .collect();
        let source = MockStream::new(records);
        let audit = MockAudit::new();
        let store = SharedNotificationStore::new();

        notifier.run(&source, &audit, &store).await.unwrap();

        assert_eq!(store.for_user(2).len(), 3, "exactly 3 batches of 1");
    }
}
