// Rust guideline compliant 2026-03-07

//! File adapter for the `AuditSink` port.
//!
//! Appends one line per clean transfer event to an ordered, human-inspectable
//! log file: `from_user,to_user,amount,RFC3339-timestamp`. Durability is
//! best-effort per the notifier's contract -- a failed append is surfaced as
//! an error for the caller to log, never retried here.

use domain::{AuditError, AuditSink, TransferEvent};
use std::path::Path;
use tokio::fs::{File, OpenOptions};
use tokio::io::AsyncWriteExt as _;
use tokio::sync::Mutex;

/// `AuditSink` adapter backed by an append-only file.
///
/// The file handle is mutex-guarded so concurrent notifier partitions append
/// whole lines without interleaving. Each append is flushed immediately: the
/// audit trail is for replay and debugging, so freshness beats throughput.
#[derive(Debug)]
pub struct FileAuditLog {
    file: Mutex<File>,
}

impl FileAuditLog {
    /// Open `path` for appending, creating it on first use.
    ///
    /// # Errors
    ///
    /// Returns `std::io::Error` when the file cannot be opened or created.
    pub async fn create(path: impl AsRef<Path>) -> std::io::Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self { file: Mutex::new(file) })
    }
}

impl AuditSink for FileAuditLog {
    /// Append one audit line and flush.
    ///
    /// # Errors
    ///
    /// Returns [`AuditError::WriteFailed`] on any I/O failure.
    async fn append(&self, event: &TransferEvent) -> Result<(), AuditError> {
        let line = format!(
            "{},{},{},{}\n",
            event.from_user,
            event.to_user,
            event.amount,
            event.timestamp.to_rfc3339()
        );
        let mut file = self.file.lock().await;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| AuditError::WriteFailed { reason: e.to_string() })?;
        file.flush()
            .await
            .map_err(|e| AuditError::WriteFailed { reason: e.to_string() })?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::FileAuditLog;
    use domain::{AuditSink as _, TransferEvent};
    use std::path::PathBuf;

    fn temp_path() -> PathBuf {
        std::env::temp_dir().join(format!("audit-{}.log", uuid::Uuid::new_v4()))
    }

    fn make_event(from: i64, to: i64, amount: i64) -> TransferEvent {
        TransferEvent {
            id: uuid::Uuid::new_v4(),
            from_user: from,
            to_user: to,
            amount,
            timestamp: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn appends_one_line_per_event() {
        let path = temp_path();
        let audit = FileAuditLog::create(&path).await.unwrap();

        audit.append(&make_event(1, 2, 30)).await.unwrap();
        audit.append(&make_event(3, 4, 500)).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("1,2,30,"));
        assert!(lines[1].starts_with("3,4,500,"));

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn line_carries_rfc3339_timestamp() {
        let path = temp_path();
        let audit = FileAuditLog::create(&path).await.unwrap();
        let event = make_event(1, 2, 30);

        audit.append(&event).await.unwrap();

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let timestamp_field = contents.trim_end().splitn(4, ',').nth(3).unwrap().to_owned();
        let parsed = chrono::DateTime::parse_from_rfc3339(&timestamp_field).unwrap();
        assert_eq!(parsed.with_timezone(&chrono::Utc), event.timestamp);

        tokio::fs::remove_file(&path).await.unwrap();
    }

    #[tokio::test]
    async fn reopening_appends_rather_than_truncates() {
        let path = temp_path();
        {
            let audit = FileAuditLog::create(&path).await.unwrap();
            audit.append(&make_event(1, 2, 10)).await.unwrap();
        }
        {
            let audit = FileAuditLog::create(&path).await.unwrap();
            audit.append(&make_event(1, 2, 20)).await.unwrap();
        }

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        assert_eq!(contents.lines().count(), 2);

        tokio::fs::remove_file(&path).await.unwrap();
    }
}
