// Rust guideline compliant 2026-03-07

//! Demo adapter for the `AlertSink` port.
//!
//! Logs suspicious-transfer alerts via `tracing::warn!` and always returns
//! `Ok(())`. `AlertError::DeliveryFailed` is unreachable in this demo adapter.

use domain::{AlertError, AlertSink, TransferEvent};

/// `AlertSink` adapter that emits a warning log for each suspicious transfer.
///
/// Always returns `Ok(())`; use a custom implementation for real alerting.
#[derive(Debug)]
pub struct LogAlert;

impl LogAlert {
    /// Create a new log alert adapter.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for LogAlert {
    fn default() -> Self {
        Self::new()
    }
}

impl AlertSink for LogAlert {
    async fn raise(&self, event: &TransferEvent) -> Result<(), AlertError> {
        tracing::warn!(
            event_id = %event.id,
            from_user = event.from_user,
            to_user = event.to_user,
            amount = event.amount,
            "log_alert.suspicious_transfer"
        );
        Ok(())
    }
}
