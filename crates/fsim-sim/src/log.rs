//! Circular message buffer shared between the worker and its observers.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{error, info, warn};

/// Number of entries kept before the writer wraps around.
pub const LOG_CAPACITY: usize = 500;

/// Severity (display colour) of a log entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogSeverity {
    #[default]
    Info,
    Warning,
    Error,
}

#[derive(Clone, Debug, Default)]
struct LogEntry {
    severity: LogSeverity,
    text: String,
}

/// Fixed-capacity log with independent read and write cursors.
///
/// Every written message is also emitted through `tracing`. When the writer
/// laps the reader the oldest unread entries are lost and the reader skips
/// forward to the oldest retained entry.
#[derive(Debug)]
pub struct SimulatorLog {
    entries: Vec<LogEntry>,
    read_pos: usize,
    write_pos: usize,
}

/// Log handle shared by the scheduler and run observers.
pub type SharedLog = Arc<Mutex<SimulatorLog>>;

impl Default for SimulatorLog {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatorLog {
    pub fn new() -> Self {
        Self {
            entries: vec![LogEntry::default(); LOG_CAPACITY],
            read_pos: 0,
            write_pos: 0,
        }
    }

    pub fn shared() -> SharedLog {
        Arc::new(Mutex::new(Self::new()))
    }

    pub fn clear(&mut self) {
        for entry in &mut self.entries {
            *entry = LogEntry::default();
        }
        self.read_pos = 0;
        self.write_pos = 0;
    }

    fn write(&mut self, text: String, severity: LogSeverity) {
        let i = self.write_pos % LOG_CAPACITY;
        self.entries[i] = LogEntry { severity, text };
        self.write_pos += 1;
    }

    pub fn write_info(&mut self, text: impl Into<String>) {
        let text = text.into();
        info!(target: "fsim::log", "{text}");
        self.write(text, LogSeverity::Info);
    }

    pub fn write_warning(&mut self, text: impl Into<String>) {
        let text = text.into();
        warn!(target: "fsim::log", "{text}");
        self.write(format!("Warning! {text}"), LogSeverity::Warning);
    }

    pub fn write_error(&mut self, text: impl Into<String>) {
        let text = text.into();
        error!(target: "fsim::log", "{text}");
        self.write(format!("Error! {text}"), LogSeverity::Error);
    }

    fn oldest_retained(&self) -> usize {
        self.write_pos.saturating_sub(LOG_CAPACITY)
    }

    /// Next unread entry, or `None` at the end of the log.
    pub fn read(&mut self) -> Option<String> {
        self.read_pos = self.read_pos.max(self.oldest_retained());
        if self.end_of_log() {
            return None;
        }
        let text = self.entries[self.read_pos % LOG_CAPACITY].text.clone();
        self.read_pos += 1;
        Some(text)
    }

    /// Severity of the entry the next `read` returns.
    pub fn read_severity(&self) -> LogSeverity {
        let pos = self.read_pos.max(self.oldest_retained());
        if pos == self.write_pos {
            return LogSeverity::Info;
        }
        self.entries[pos % LOG_CAPACITY].severity
    }

    pub fn end_of_log(&self) -> bool {
        self.read_pos >= self.write_pos
    }

    /// All retained entries, oldest first, one per line.
    pub fn full_log(&self) -> String {
        (self.oldest_retained()..self.write_pos)
            .map(|i| self.entries[i % LOG_CAPACITY].text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Number of messages written since the last clear.
    pub fn written(&self) -> usize {
        self.write_pos
    }
}
