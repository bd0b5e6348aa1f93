//! Append-only audit log
//!
//! One JSON line per terminated operation session. Recording failures are
//! logged and never block lock release or the client response.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::warn;

use crate::errors::ConsoleError;
use crate::filesys::file::File;

/// One audit record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Account that initiated the operation
    pub actor: String,

    /// Action name (e.g. "package_install", "stack_deploy")
    pub action: String,

    /// Operation targets joined with spaces
    pub target: String,

    /// Whether the operation succeeded
    pub success: bool,

    /// Outcome detail (terminal message, or "cancelled")
    pub detail: String,

    /// Record timestamp
    pub timestamp: DateTime<Utc>,
}

/// File-backed append-only audit recorder
pub struct AuditRecorder {
    log_file: File,
    write_lock: Mutex<()>,
}

impl AuditRecorder {
    /// Create a recorder appending to the given file
    pub fn new(log_file: File) -> Self {
        Self {
            log_file,
            write_lock: Mutex::new(()),
        }
    }

    /// Append one entry. Failures are logged, never returned.
    pub async fn record(&self, entry: AuditEntry) {
        let line = match serde_json::to_string(&entry) {
            Ok(line) => line,
            Err(e) => {
                warn!("Failed to serialize audit entry: {}", e);
                return;
            }
        };

        let _guard = self.write_lock.lock().await;
        if let Err(e) = self.log_file.append_line(&line).await {
            warn!(
                "Failed to append audit entry for {} {}: {}",
                entry.actor, entry.action, e
            );
        }
    }

    /// The most recent `limit` entries, newest last
    pub async fn recent(&self, limit: usize) -> Result<Vec<AuditEntry>, ConsoleError> {
        if !self.log_file.exists().await {
            return Ok(Vec::new());
        }

        let contents = self.log_file.read_string().await?;
        let mut entries: Vec<AuditEntry> = contents
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();

        if entries.len() > limit {
            entries.drain(..entries.len() - limit);
        }
        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(action: &str, success: bool) -> AuditEntry {
        AuditEntry {
            actor: "operator".to_string(),
            action: action.to_string(),
            target: "nginx".to_string(),
            success,
            detail: "done".to_string(),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn records_are_appended_and_read_back() {
        let dir = std::env::temp_dir().join(format!("bosun-audit-{}", uuid::Uuid::new_v4()));
        let recorder = AuditRecorder::new(File::new(dir.join("audit.log")));

        recorder.record(entry("package_install", true)).await;
        recorder.record(entry("stack_deploy", false)).await;

        let entries = recorder.recent(10).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "package_install");
        assert!(!entries[1].success);

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn recent_trims_to_limit() {
        let dir = std::env::temp_dir().join(format!("bosun-audit-{}", uuid::Uuid::new_v4()));
        let recorder = AuditRecorder::new(File::new(dir.join("audit.log")));

        for i in 0..5 {
            recorder.record(entry(&format!("action_{}", i), true)).await;
        }

        let entries = recorder.recent(2).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].action, "action_3");
        assert_eq!(entries[1].action, "action_4");

        tokio::fs::remove_dir_all(&dir).await.ok();
    }

    #[tokio::test]
    async fn missing_log_reads_empty() {
        let recorder = AuditRecorder::new(File::new("/nonexistent/bosun/audit.log"));
        assert!(recorder.recent(10).await.unwrap().is_empty());
    }
}
