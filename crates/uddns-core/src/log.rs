//! Structured event log sink
//!
//! The engine reports to a [`LogSink`] rather than to a global logger. Each
//! entry carries the same numeric code used by [`crate::Error::code`].

use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// Severity of a log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

/// One event log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Numeric code (0 for untagged trace entries)
    pub code: u16,
    /// Human-readable message
    pub message: String,
    /// Severity
    pub severity: Severity,
    /// When the entry was created
    pub timestamp: DateTime<Utc>,
}

impl LogEntry {
    /// Create an entry stamped with the current time
    pub fn new(code: u16, message: impl Into<String>, severity: Severity) -> Self {
        Self {
            code,
            message: message.into(),
            severity,
            timestamp: Utc::now(),
        }
    }

    /// Untagged debug trace entry
    pub fn debug(message: impl Into<String>) -> Self {
        Self::new(0, message, Severity::Debug)
    }

    /// Informational entry
    pub fn info(code: u16, message: impl Into<String>) -> Self {
        Self::new(code, message, Severity::Info)
    }

    /// Warning entry
    pub fn warning(code: u16, message: impl Into<String>) -> Self {
        Self::new(code, message, Severity::Warning)
    }

    /// Error entry
    pub fn error(code: u16, message: impl Into<String>) -> Self {
        Self::new(code, message, Severity::Error)
    }
}

/// Destination for event log entries
///
/// Sinks may be shared with other subsystems, so implementations must be
/// safe for concurrent writers. Recording must never block the caller.
pub trait LogSink: Send + Sync {
    /// Record one entry
    fn record(&self, entry: LogEntry);
}

/// Forwards entries to `tracing` at the matching level
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl LogSink for TracingSink {
    fn record(&self, entry: LogEntry) {
        let LogEntry {
            code,
            message,
            severity,
            ..
        } = entry;
        match severity {
            Severity::Debug => debug!(code, "{}", message),
            Severity::Info => info!(code, "{}", message),
            Severity::Warning => warn!(code, "{}", message),
            Severity::Error => error!(code, "{}", message),
        }
    }
}

/// Pushes entries into a bounded channel for an external consumer
///
/// When the consumer falls behind, entries are dropped with a warning
/// instead of growing memory without bound.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::Sender<LogEntry>,
}

impl ChannelSink {
    /// Create a sink and the receiver that drains it
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<LogEntry>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl LogSink for ChannelSink {
    fn record(&self, entry: LogEntry) {
        if let Err(e) = self.tx.try_send(entry) {
            match e {
                mpsc::error::TrySendError::Full(entry) => {
                    warn!(code = entry.code, "Log channel full, dropping entry");
                }
                mpsc::error::TrySendError::Closed(_) => {
                    debug!("Log channel closed, dropping entry");
                }
            }
        }
    }
}
