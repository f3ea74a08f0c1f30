//! Run log.
//!
//! Every [`crate::InsightPipeline`] owns a [`RunLog`]. Progress lines and
//! data-quality notes (rows an inner join dropped, customers without
//! coordinates) are published on a broadcast channel and echoed to stderr.
//! `run_all` subscribes before the first analysis and stores what it read
//! in the report, so the dashboard shows the same warnings as the terminal.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast::{self, error::TryRecvError};

/// Entries buffered per subscriber before the oldest are lost.
pub const RUN_LOG_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    fn marker(&self) -> &'static str {
        match self {
            Self::Info => " ",
            Self::Success => "✓",
            Self::Warning => "⚠️",
            Self::Error => "❌",
        }
    }
}

/// One line of the run log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    pub severity: Severity,
    pub message: String,
    /// Nesting under the previous headline; 0 for analysis headlines.
    #[serde(default)]
    pub depth: u8,
}

/// Publisher side of a pipeline's log.
pub struct RunLog {
    sender: broadcast::Sender<LogEntry>,
}

impl RunLog {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(RUN_LOG_CAPACITY);
        Self { sender }
    }

    /// Echo an entry to stderr and hand it to every reader.
    pub fn record(&self, severity: Severity, depth: u8, message: impl Into<String>) {
        let entry = LogEntry {
            severity,
            message: message.into(),
            depth,
        };
        eprintln!(
            "{}   {} {}",
            "   ".repeat(entry.depth as usize),
            entry.severity.marker(),
            entry.message
        );
        // no readers: terminal echo only
        let _ = self.sender.send(entry);
    }

    pub fn info(&self, message: impl Into<String>) {
        self.record(Severity::Info, 0, message);
    }

    pub fn success(&self, message: impl Into<String>) {
        self.record(Severity::Success, 0, message);
    }

    pub fn warning(&self, message: impl Into<String>) {
        self.record(Severity::Warning, 1, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.record(Severity::Error, 0, message);
    }

    /// Informational detail under the current headline.
    pub fn note(&self, message: impl Into<String>) {
        self.record(Severity::Info, 1, message);
    }

    /// Start reading; only entries recorded from now on are seen.
    pub fn subscribe(&self) -> RunLogReader {
        RunLogReader {
            receiver: self.sender.subscribe(),
        }
    }
}

impl Default for RunLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader side of a [`RunLog`].
pub struct RunLogReader {
    receiver: broadcast::Receiver<LogEntry>,
}

impl RunLogReader {
    /// Everything recorded since the last drain, oldest first.
    ///
    /// When the reader fell behind, the lost entries are replaced by a
    /// single warning saying how many were lost.
    pub fn drain(&mut self) -> Vec<LogEntry> {
        let mut entries = Vec::new();
        loop {
            match self.receiver.try_recv() {
                Ok(entry) => entries.push(entry),
                Err(TryRecvError::Lagged(lost)) => entries.push(LogEntry {
                    severity: Severity::Warning,
                    message: format!("{} log entries lost", lost),
                    depth: 0,
                }),
                Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
            }
        }
        entries
    }
}
