// Rust guideline compliant 2026-03-05

//! In-process transfer event log -- ordered, partitioned, append-only, with
//! independent consumer groups and commit-based acknowledgment.
//!
//! [`EventLog`] implements the `domain::EventPublisher` port; cursors obtained
//! via [`EventLog::subscribe`] implement `domain::EventStream`. Records are
//! routed by key, so all events from the same payer share a partition and are
//! delivered in publish order. Each `(group, partition)` pair owns a committed
//! offset; a record stays visible to a group until that group commits past it,
//! and is never removed for the benefit of other groups (late-joining groups
//! replay from offset zero).

use domain::{EventPublisher, EventStream, FetchError, PublishError, Record, TransferEvent, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;

/// Poll cadence for an empty, open partition.
///
/// Fetchers sleep this long between checks instead of busy-yielding; the
/// pipeline's publish rates are far below this resolution.
const FETCH_POLL: Duration = Duration::from_millis(5);

// ---------------------------------------------------------------------------
// Inner state
// ---------------------------------------------------------------------------

/// One appended record. The payload is opaque to the log.
#[derive(Debug)]
struct StoredRecord {
    key: UserId,
    payload: Vec<u8>,
}

/// Heap state shared by all handles of one log.
#[derive(Debug)]
struct Inner {
    /// Append-only record vectors; a record's offset is its index.
    partitions: Vec<Mutex<Vec<StoredRecord>>>,
    /// Committed offsets per `(group, partition)`.
    cursors: Mutex<HashMap<(String, usize), u64>>,
    closed: AtomicBool,
}

// ---------------------------------------------------------------------------
// EventLog
// ---------------------------------------------------------------------------

/// A partitioned, in-process event log shared across tasks via cheap clones.
///
/// Locks are only held for the duration of a single append or copy-out; they
/// are never held across an await point other than their own acquisition.
#[derive(Debug, Clone)]
pub struct EventLog {
    inner: Arc<Inner>,
}

impl EventLog {
    /// Create an open log with `partitions` partitions (at least one).
    #[must_use]
    pub fn new(partitions: usize) -> Self {
        let count = partitions.max(1);
        Self {
            inner: Arc::new(Inner {
                partitions: (0..count).map(|_| Mutex::new(Vec::new())).collect(),
                cursors: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Number of partitions.
    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.inner.partitions.len()
    }

    /// The partition all records under `key` are routed to.
    #[must_use]
    pub fn partition_for(&self, key: UserId) -> usize {
        // rem_euclid is non-negative and below the partition count, so both
        // conversions are infallible in practice.
        let count = i64::try_from(self.inner.partitions.len()).unwrap_or(i64::MAX);
        usize::try_from(key.rem_euclid(count)).unwrap_or(0)
    }

    /// Signal end-of-data. Idempotent: safe to call multiple times.
    ///
    /// Fetchers drain remaining records before observing `Closed`; committed
    /// cursors are retained.
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
    }

    /// Whether [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    /// Append an already-encoded payload under `key`.
    ///
    /// The log does not inspect payloads; consumers are responsible for
    /// tolerating malformed bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Closed`] after shutdown.
    pub async fn append_raw(&self, key: UserId, payload: Vec<u8>) -> Result<u64, PublishError> {
        if self.is_closed() {
            return Err(PublishError::Closed);
        }
        let partition = self.partition_for(key);
        let mut records = self.inner.partitions[partition].lock().await;
        records.push(StoredRecord { key, payload });
        let offset = u64::try_from(records.len() - 1).unwrap_or(u64::MAX);
        tracing::trace!(key, partition, offset, "broker.append");
        Ok(offset)
    }

    /// Open a cursor for `group` into `partition`.
    ///
    /// A group seen for the first time starts at offset zero and replays the
    /// partition's full history.
    #[must_use]
    pub fn subscribe(&self, group: &str, partition: usize) -> Subscription {
        Subscription {
            log: self.clone(),
            group: group.to_owned(),
            partition: partition.min(self.inner.partitions.len() - 1),
        }
    }
}

impl EventPublisher for EventLog {
    /// Encode `event` and append it under `key`, returning the offset.
    ///
    /// The append itself is the durability acknowledgment: once this returns
    /// `Ok`, the record is queued for every group.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Codec`] if encoding fails or
    /// [`PublishError::Closed`] after shutdown.
    async fn publish(&self, key: UserId, event: &TransferEvent) -> Result<u64, PublishError> {
        let payload = event
            .to_bytes()
            .map_err(|e| PublishError::Codec { reason: e.to_string() })?;
        self.append_raw(key, payload).await
    }
}

// ---------------------------------------------------------------------------
// Subscription
// ---------------------------------------------------------------------------

/// One consumer group's cursor into one partition of an [`EventLog`].
///
/// Cloneable; all clones share the group's committed offset through the log.
#[derive(Debug, Clone)]
pub struct Subscription {
    log: EventLog,
    group: String,
    partition: usize,
}

impl Subscription {
    /// The group's committed offset for this partition.
    async fn committed(&self) -> u64 {
        let cursors = self.log.inner.cursors.lock().await;
        cursors
            .get(&(self.group.clone(), self.partition))
            .copied()
            .unwrap_or(0)
    }
}

impl EventStream for Subscription {
    /// Copy out up to `max` records starting at the committed offset.
    ///
    /// Sleeps while the partition holds nothing past the cursor and the log
    /// is open. Records are copied, not removed: an uncommitted fetch is
    /// redelivered on the next call (at-least-once).
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Closed`] when the log is closed and this cursor
    /// has drained the partition.
    async fn fetch(&self, max: usize) -> Result<Vec<Record>, FetchError> {
        if max == 0 {
            return Ok(vec![]);
        }
        loop {
            let committed = self.committed().await;
            {
                let records = self.log.inner.partitions[self.partition].lock().await;
                let available = u64::try_from(records.len()).unwrap_or(u64::MAX);
                if committed < available {
                    let start = usize::try_from(committed).unwrap_or(usize::MAX);
                    let end = records.len().min(start.saturating_add(max));
                    let batch = records[start..end]
                        .iter()
                        .zip(committed..)
                        .map(|(r, offset)| Record {
                            offset,
                            key: r.key,
                            payload: r.payload.clone(),
                        })
                        .collect();
                    return Ok(batch);
                }
            } // partition lock dropped before sleeping

            if self.log.is_closed() {
                return Err(FetchError::Closed);
            }
            tokio::time::sleep(FETCH_POLL).await;
        }
    }

    /// Advance the committed offset to `offset + 1`.
    ///
    /// Monotonic: once committed, a position is never redelivered to this
    /// group; commits at or below the cursor are no-ops.
    async fn commit(&self, offset: u64) -> Result<(), FetchError> {
        let mut cursors = self.log.inner.cursors.lock().await;
        let cursor = cursors
            .entry((self.group.clone(), self.partition))
            .or_insert(0);
        let next = offset.saturating_add(1);
        if next > *cursor {
            *cursor = next;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
