//! Append-only JSONL file store.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

use super::{Result, Store};
use crate::event::AcknowledgmentEvent;
use crate::observability::metrics::{self, DiscardReason};

/// Stores one JSON event per line.
///
/// Records are re-validated on read; a line that fails validation is
/// skipped with a warning and the rest of the file is still returned.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Creates a store backed by `path`. The file is created on first append.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Backing file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait::async_trait]
impl Store for FileStore {
    async fn list_events_since(&self, since: DateTime<Utc>) -> Result<Vec<AcknowledgmentEvent>> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut events = Vec::new();
        let mut malformed = 0;
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<AcknowledgmentEvent>(line) {
                Ok(event) if event.created_at() >= since => events.push(event),
                Ok(_) => {}
                Err(e) => {
                    malformed += 1;
                    warn!(path = %self.path.display(), line = index + 1, error = %e, "skipping malformed stored event");
                }
            }
        }
        metrics::record_discarded(DiscardReason::Malformed, malformed);
        Ok(events)
    }

    async fn append_event(&self, event: AcknowledgmentEvent) -> Result<()> {
        let mut line = serde_json::to_string(&event)?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}
