//! Bounded in-memory relay log.
//!
//! [`LogSink`] keeps the most recent [`MAX_LOG_ENTRIES`] entries in insertion
//! order, mirrors every entry to `tracing`, and republishes it on a
//! `tokio::sync::broadcast` channel so live followers (SSE) can tail the log.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tokio::sync::broadcast;

/// Maximum number of entries retained in the ring buffer.
pub const MAX_LOG_ENTRIES: usize = 100;

/// Broadcast channel buffer for live followers.
const BROADCAST_CAPACITY: usize = 256;

// ---------------------------------------------------------------------------
// LogEntry
// ---------------------------------------------------------------------------

/// One immutable operator-facing log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub message: String,
    pub is_error: bool,
}

impl LogEntry {
    fn new(message: String, is_error: bool) -> Self {
        Self {
            timestamp: Utc::now(),
            message,
            is_error,
        }
    }
}

// ---------------------------------------------------------------------------
// LogSink
// ---------------------------------------------------------------------------

/// Append-only FIFO log shared by HTTP handlers and process monitors.
pub struct LogSink {
    entries: RwLock<VecDeque<LogEntry>>,
    tx: broadcast::Sender<LogEntry>,
}

impl LogSink {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            entries: RwLock::new(VecDeque::with_capacity(MAX_LOG_ENTRIES + 1)),
            tx,
        }
    }

    /// Append an entry, evicting the oldest once the buffer exceeds capacity.
    pub fn append(&self, message: impl Into<String>, is_error: bool) {
        let entry = LogEntry::new(message.into(), is_error);

        if entry.is_error {
            tracing::error!(target: "streamrelay::log", "{}", entry.message);
        } else {
            tracing::info!(target: "streamrelay::log", "{}", entry.message);
        }

        {
            let mut entries = self.entries.write();
            entries.push_back(entry.clone());
            while entries.len() > MAX_LOG_ENTRIES {
                entries.pop_front();
            }
        }

        // Ignore send errors (no followers).
        let _ = self.tx.send(entry);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.append(message, false);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.append(message, true);
    }

    /// The last `n` entries, oldest first.
    pub fn recent(&self, n: usize) -> Vec<LogEntry> {
        let entries = self.entries.read();
        let skip = entries.len().saturating_sub(n);
        entries.iter().skip(skip).cloned().collect()
    }

    /// The full buffer, oldest first.
    pub fn all(&self) -> Vec<LogEntry> {
        self.entries.read().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Follow entries appended after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.tx.subscribe()
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::new()
    }
}
