// Rust guideline compliant 2026-03-02

//! Shared domain types for the funds-transfer pipeline.
//!
//! Defines `Wallet`, `TransferRequest`, `TransferEvent`, `Notification`, the
//! error taxonomy, and the hexagonal port traits: `WalletStore`,
//! `EventPublisher`, `EventStream`, `NotificationStore`, `AuditSink`, and
//! `AlertSink`. All pipeline crates depend on this crate; no other workspace
//! crate is imported here.

use chrono::{DateTime, Utc};

/// Identifier of a user (wallet owner).
pub type UserId = i64;

/// Identifier of a wallet.
pub type WalletId = i64;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

/// A wallet holding a non-negative balance in whole currency units.
///
/// Owned exclusively by the ledger store; mutated only inside a transfer or
/// top-up operation.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct Wallet {
    /// Unique wallet identifier, assigned by the store.
    pub id: WalletId,
    /// Owning user.
    pub owner_id: UserId,
    /// Current balance. Invariant: `balance >= 0`.
    pub balance: i64,
}

/// An ephemeral transfer request, created per submit call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferRequest {
    /// Paying user.
    pub from_owner: UserId,
    /// Receiving user.
    pub to_owner: UserId,
    /// Amount in whole currency units; must be strictly positive.
    pub amount: i64,
}

/// The durable record of an accepted ledger transfer. Immutable once created.
///
/// `id` is assigned when the ledger accepts the transfer and serves as the
/// idempotency key for downstream consumers; the event log additionally
/// assigns per-partition offsets.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TransferEvent {
    /// Idempotency key.
    pub id: uuid::Uuid,
    /// Paying user.
    pub from_user: UserId,
    /// Receiving user.
    pub to_user: UserId,
    /// Transferred amount in whole currency units.
    pub amount: i64,
    /// When the ledger accepted the transfer.
    pub timestamp: DateTime<Utc>,
}

impl TransferEvent {
    /// Serialize to the JSON wire encoding carried on the event log.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails.
    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }

    /// Decode from the wire encoding.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` for malformed payloads; consumers skip and
    /// log these rather than crash.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }
}

/// Outcome of screening a transfer amount against the fraud threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FraudVerdict {
    /// At or below the threshold.
    Clean,
    /// Strictly above the threshold.
    Suspicious,
}

/// A per-user projection of a clean transfer event.
///
/// Ordered by arrival in the notification store (insertion order, not
/// necessarily chronological across partitions).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    /// The user whose feed holds this entry.
    pub recipient: UserId,
    /// The underlying transfer event.
    pub event: TransferEvent,
}

/// One record fetched from the event log.
///
/// The payload is opaque bytes; consumers decode and must tolerate malformed
/// content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Offset within the record's partition.
    pub offset: u64,
    /// Partition key the record was published under (the paying user).
    pub key: UserId,
    /// Encoded `TransferEvent`.
    pub payload: Vec<u8>,
}

// ---------------------------------------------------------------------------
// Error taxonomy
// ---------------------------------------------------------------------------

/// Errors from the ledger store and its operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    /// Amount was zero or negative. Not retried; surfaced to the caller.
    #[error("invalid amount: {amount}")]
    InvalidAmount {
        /// The rejected amount.
        amount: i64,
    },
    /// Source and destination wallet are the same.
    #[error("cannot transfer from wallet {wallet} to itself")]
    SelfTransfer {
        /// The wallet named on both sides.
        wallet: WalletId,
    },
    /// No wallet with the given id.
    #[error("wallet not found: {wallet}")]
    WalletNotFound {
        /// The missing wallet id.
        wallet: WalletId,
    },
    /// No wallet owned by the given user.
    #[error("no wallet for user {user}")]
    UserNotFound {
        /// The user without a wallet.
        user: UserId,
    },
    /// The source wallet cannot cover the amount. Business rule; not retried.
    #[error("insufficient funds: wallet {wallet} holds {balance}, needs {amount}")]
    InsufficientFunds {
        /// Source wallet.
        wallet: WalletId,
        /// Balance at the time of the attempt.
        balance: i64,
        /// Requested amount.
        amount: i64,
    },
    /// Transient storage failure. Retryable with backoff at the gateway.
    #[error("persistence failure: {reason}")]
    Persistence {
        /// Human-readable description.
        reason: String,
    },
}

/// Errors from publishing to the event log.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    /// The log has been closed; no further appends are accepted.
    #[error("event log closed")]
    Closed,
    /// Transient broker failure. Retryable with backoff.
    #[error("event log unavailable: {reason}")]
    Unavailable {
        /// Human-readable description.
        reason: String,
    },
    /// The event could not be encoded for the wire.
    #[error("payload encoding failed: {reason}")]
    Codec {
        /// Human-readable description.
        reason: String,
    },
}

/// Errors from fetching or committing on an event-log subscription.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FetchError {
    /// The log is closed and the subscription has drained all records.
    #[error("event log closed")]
    Closed,
    /// Transient broker failure. Consumer loops retry indefinitely with
    /// backoff rather than crash.
    #[error("event log unavailable: {reason}")]
    Unavailable {
        /// Human-readable description.
        reason: String,
    },
}

/// Errors from the audit sink. Audit durability is best-effort: consumers log
/// these and continue.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuditError {
    /// The audit line could not be written.
    #[error("audit write failed: {reason}")]
    WriteFailed {
        /// Human-readable description.
        reason: String,
    },
}

/// Errors from the alert sink.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AlertError {
    /// The alert could not be delivered.
    #[error("alert delivery failed: {reason}")]
    DeliveryFailed {
        /// Human-readable description.
        reason: String,
    },
}

// ---------------------------------------------------------------------------
// Hexagonal ports
// ---------------------------------------------------------------------------

/// Hexagonal port: wallet persistence with atomic transfer execution.
///
/// Implementations live outside the domain and service crates (e.g. in the
/// binary crate). The ledger service depends exclusively on this trait --
/// never on a concrete adapter. Concurrent transfers touching the same wallet
/// must serialize so the balance invariant is never violated.
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait WalletStore {
    /// Create a wallet for `owner` with the given starting balance.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Persistence`] on storage failure.
    async fn create(&self, owner: UserId, initial_balance: i64) -> Result<Wallet, LedgerError>;

    /// Look up a wallet by id.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::WalletNotFound`] when absent.
    async fn get(&self, wallet: WalletId) -> Result<Wallet, LedgerError>;

    /// Look up the wallet owned by `owner`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::UserNotFound`] when the user has no wallet.
    async fn get_by_owner(&self, owner: UserId) -> Result<Wallet, LedgerError>;

    /// Credit `amount` to `wallet` and return the updated wallet.
    ///
    /// Callers validate `amount > 0` before invoking.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::WalletNotFound`] or [`LedgerError::Persistence`].
    async fn top_up(&self, wallet: WalletId, amount: i64) -> Result<Wallet, LedgerError>;

    /// Execute an atomic debit/credit pair and record the transfer.
    ///
    /// Either both balance changes and the history record are persisted, or
    /// none are; no partial update is ever observable. Returns the updated
    /// source wallet and the transfer event recorded for it.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::WalletNotFound`] if either wallet is absent,
    /// [`LedgerError::InsufficientFunds`] if the source cannot cover the
    /// amount, or [`LedgerError::Persistence`] on storage failure (in which
    /// case no change was applied).
    async fn transfer(
        &self,
        from: WalletId,
        to: WalletId,
        amount: i64,
    ) -> Result<(Wallet, TransferEvent), LedgerError>;

    /// Transfers involving `wallet`, ordered by timestamp, optionally limited
    /// to an inclusive `[from, to]` range.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::WalletNotFound`] or [`LedgerError::Persistence`].
    async fn history(
        &self,
        wallet: WalletId,
        range: Option<(DateTime<Utc>, DateTime<Utc>)>,
    ) -> Result<Vec<TransferEvent>, LedgerError>;
}

/// Hexagonal port: the append side of an event log.
///
/// `publish` resolves only after the log has durably accepted the record, so
/// callers never report success for an event that was never queued.
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait EventPublisher {
    /// Append `event` under `key` and return the assigned offset.
    ///
    /// Records sharing a key land on the same partition, preserving per-key
    /// publish order for consumers.
    ///
    /// # Errors
    ///
    /// Returns [`PublishError::Closed`] after shutdown,
    /// [`PublishError::Unavailable`] on transient failure, or
    /// [`PublishError::Codec`] if the event cannot be encoded.
    async fn publish(&self, key: UserId, event: &TransferEvent) -> Result<u64, PublishError>;
}

/// Hexagonal port: one consumer group's cursor into one log partition.
///
/// Delivery is at-least-once: `fetch` returns records starting at the group's
/// committed offset, so anything fetched but not committed is redelivered on
/// the next call.
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait EventStream {
    /// Fetch up to `max` records from the committed cursor.
    ///
    /// Returns between 1 and `max` records when data is available; blocks
    /// while the partition is empty and the log is open.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Closed`] once the log is closed and this cursor
    /// has drained it, or [`FetchError::Unavailable`] on transient failure.
    async fn fetch(&self, max: usize) -> Result<Vec<Record>, FetchError>;

    /// Mark all records up to and including `offset` as processed.
    ///
    /// Commits are monotonic; committing below the current cursor is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::Unavailable`] on transient failure.
    async fn commit(&self, offset: u64) -> Result<(), FetchError>;
}

/// Port for the concurrent per-user notification store.
///
/// Implementations allow many simultaneous readers; writers are serialized.
/// Methods are synchronous: the production store is an in-process map behind
/// a read/write lock.
pub trait NotificationStore {
    /// Append a notification to `recipient`'s feed.
    ///
    /// Returns `false` when the event was already delivered (at-least-once
    /// replay); the feed is left unchanged in that case.
    fn add(&self, recipient: UserId, event: TransferEvent) -> bool;

    /// All notifications for `user` in insertion order. Empty when the user
    /// has none; never an error.
    fn for_user(&self, user: UserId) -> Vec<Notification>;
}

/// Hexagonal port: durable, append-only, human-inspectable audit trail.
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait AuditSink {
    /// Append one audit line for `event`.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::WriteFailed`] when the line cannot be written.
    async fn append(&self, event: &TransferEvent) -> Result<(), AuditError>;
}

/// Hexagonal port: per-event fraud alert delivery (best-effort).
#[expect(
    async_fn_in_trait,
    reason = "no dyn dispatch needed; internal workspace only"
)]
pub trait AlertSink {
    /// Raise an alert for a suspicious transfer event.
    ///
    /// # Errors
    ///
    /// Returns [`AlertError::DeliveryFailed`] when the alert cannot be
    /// delivered.
    async fn raise(&self, event: &TransferEvent) -> Result<(), AlertError>;
}
