// Rust guideline compliant 2026-03-05

//! Fraud screen -- the first consumer group on the transfer event log.
//!
//! Reads raw transfer events, classifies each against a threshold policy,
//! alerts on suspicious ones (which are consumed and dropped, never requeued:
//! detection, not reversal), and forwards clean events to a downstream topic
//! for the notification consumer. Entry points: [`FraudScreen::screen_once`],
//! [`FraudScreen::run`]. Configuration via [`ScreenConfig::builder`].

use domain::{
    AlertError, AlertSink, EventPublisher, EventStream, FetchError, FraudVerdict, PublishError,
    TransferEvent,
};
use std::time::Duration;

/// Policy threshold in whole currency units: strictly above is suspicious.
pub const DEFAULT_FRAUD_THRESHOLD: i64 = 1_000_000;

// ---------------------------------------------------------------------------
// FraudPolicy
// ---------------------------------------------------------------------------

/// Threshold classification of transfer amounts.
///
/// A pure function of the amount: `suspicious` iff `amount > threshold`.
/// An amount of exactly the threshold is clean.
#[derive(Debug, Clone, Copy)]
pub struct FraudPolicy {
    threshold: i64,
}

impl FraudPolicy {
    /// Create a policy with the given threshold.
    #[must_use]
    pub fn new(threshold: i64) -> Self {
        Self { threshold }
    }

    /// Classify a transfer amount.
    #[must_use]
    pub fn classify(&self, amount: i64) -> FraudVerdict {
        if amount > self.threshold {
            FraudVerdict::Suspicious
        } else {
            FraudVerdict::Clean
        }
    }
}

impl Default for FraudPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_FRAUD_THRESHOLD)
    }
}

// ---------------------------------------------------------------------------
// ScreenError
// ---------------------------------------------------------------------------

/// Errors that can occur while screening.
#[derive(Debug, thiserror::Error)]
pub enum ScreenError {
    /// The supplied configuration is invalid.
    #[error("invalid screen configuration: {reason}")]
    InvalidConfig {
        /// Human-readable description of the problem.
        reason: String,
    },
    /// A fetch or commit on the source subscription failed.
    #[error("source error: {0}")]
    Fetch(FetchError),
    /// Forwarding a clean event downstream failed.
    #[error("downstream publish error: {0}")]
    Forward(PublishError),
}

// ---------------------------------------------------------------------------
// ScreenConfig + builder
// ---------------------------------------------------------------------------

/// Runtime configuration for a [`FraudScreen`].
///
/// Construct via [`ScreenConfig::builder`].
#[derive(Debug)]
pub struct ScreenConfig {
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

/// Builder for [`ScreenConfig`].
///
/// Obtain via [`ScreenConfig::builder`]; finalize with [`build`](Self::build).
#[derive(Debug)]
pub struct ScreenConfigBuilder {
    batch_max: usize,
    poll_interval: Duration,
    retry_backoff: Duration,
    iterations: Option<u64>,
}

impl ScreenConfig {
    /// Create a builder. `batch_max` is the only required parameter.
    ///
    /// Default values: `poll_interval = 25 ms`, `retry_backoff = 500 ms`,
    /// `iterations = None`.
    #[must_use]
    pub fn builder(batch_max: usize) -> ScreenConfigBuilder {
        ScreenConfigBuilder {
            batch_max,
            // 25 ms keeps screening latency low without starving other tasks.
            poll_interval: Duration::from_millis(25),
            retry_backoff: Duration::from_millis(500),
            iterations: None,
        }
    }
}

impl ScreenConfigBuilder {
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

    /// Set a finite batch count. Without this the screen runs until the log
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
    /// Returns [`ScreenError::InvalidConfig`] when `batch_max` is zero.
    #[must_use = "the Result must be checked; use ? or unwrap"]
    pub fn build(self) -> Result<ScreenConfig, ScreenError> {
        if self.batch_max == 0 {
            return Err(ScreenError::InvalidConfig {
                reason: "batch_max must be >= 1".to_owned(),
            });
        }
        Ok(ScreenConfig {
            batch_max: self.batch_max,
            poll_interval: self.poll_interval,
            retry_backoff: self.retry_backoff,
            iterations: self.iterations,
        })
    }
}

// ---------------------------------------------------------------------------
// FraudScreen
// ---------------------------------------------------------------------------

/// Reads batches from an `EventStream`, classifies with [`FraudPolicy`],
/// alerts and drops suspicious events, and forwards clean events downstream.
///
/// Generic over the three hexagonal ports for zero-cost static dispatch.
/// Holds no concrete adapter references -- dependencies are injected per call.
#[derive(Debug)]
pub struct FraudScreen {
    config: ScreenConfig,
    policy: FraudPolicy,
}

impl FraudScreen {
    /// Create a new screen from `config` and `policy`.
    #[must_use]
    pub fn new(config: ScreenConfig, policy: FraudPolicy) -> Self {
        Self { config, policy }
    }

    /// Process one batch: fetch, classify, alert/drop or forward, commit.
    ///
    /// Suspicious events are alerted best-effort and dropped; the offset is
    /// still committed (they are consumed, not requeued -- the ledger transfer
    /// is never reversed). Malformed payloads are logged, skipped, and also
    /// covered by the commit. Returns collected alert failures in `Ok(vec)`;
    /// hard errors propagate as `Err`.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenError::Fetch`] on source failure (including `Closed`)
    /// or [`ScreenError::Forward`] on downstream publish failure.
    pub async fn screen_once<S, A, P>(
        &self,
        source: &S,
        alerts: &A,
        downstream: &P,
    ) -> Result<Vec<AlertError>, ScreenError>
    where
        S: EventStream,
        A: AlertSink,
        P: EventPublisher,
    {
        let batch = source
            .fetch(self.config.batch_max)
            .await
            .map_err(ScreenError::Fetch)?;

        tracing::debug!(size = batch.len(), "screen.batch.fetched");

        let mut alert_errors: Vec<AlertError> = vec![];
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
                        "screen.skip.malformed"
                    );
                    continue;
                }
            };

            match self.policy.classify(event.amount) {
                FraudVerdict::Suspicious => {
                    tracing::warn!(
                        event_id = %event.id,
                        from_user = event.from_user,
                        to_user = event.to_user,
                        amount = event.amount,
                        "screen.suspicious"
                    );
                    // Best-effort alerting: collect failures, keep screening.
                    if let Err(e) = alerts.raise(&event).await {
                        alert_errors.push(e);
                    }
                }
                FraudVerdict::Clean => {
                    downstream
                        .publish(event.from_user, &event)
                        .await
                        .map_err(ScreenError::Forward)?;
                }
            }
        }

        if let Some(offset) = last_offset {
            source.commit(offset).await.map_err(ScreenError::Fetch)?;
        }

        Ok(alert_errors)
    }

    /// Run the screening loop until stopped.
    ///
    /// Calls [`screen_once`](Self::screen_once) repeatedly, sleeping
    /// `poll_interval` between batches. Stops cleanly when:
    /// - the source signals [`FetchError::Closed`] (returns `Ok(())`), or
    /// - `config.iterations` batches have been processed (returns `Ok(())`).
    ///
    /// An unavailable source is retried indefinitely after `retry_backoff`.
    /// Alert failures within a batch are logged as warnings but do not abort
    /// the loop.
    ///
    /// # Errors
    ///
    /// Returns [`ScreenError::Forward`] if a downstream publish fails.
    pub async fn run<S, A, P>(
        &self,
        source: &S,
        alerts: &A,
        downstream: &P,
    ) -> Result<(), ScreenError>
    where
        S: EventStream,
        A: AlertSink,
        P: EventPublisher,
    {
        let mut count = 0u64;
        loop {
            match self.screen_once(source, alerts, downstream).await {
                Ok(alert_errs) => {
                    for e in &alert_errs {
                        tracing::warn!(error = %e, "screen.alert.failed");
                    }
                }
                Err(ScreenError::Fetch(FetchError::Closed)) => {
                    tracing::info!(iterations = count, "screen.run.stopped: log closed");
                    return Ok(());
                }
                Err(ScreenError::Fetch(FetchError::Unavailable { reason })) => {
                    tracing::warn!(reason, "screen.fetch.unavailable: backing off");
                    tokio::time::sleep(self.config.retry_backoff).await;
                    continue;
                }
                Err(e) => return Err(e),
            }

            count += 1;
            tracing::debug!(iteration = count, "screen.batch.processed");

            if let Some(max) = self.config.iterations
                && count >= max
            {
                tracing::info!("screen.run.stopped: iteration limit reached");
                return Ok(());
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
