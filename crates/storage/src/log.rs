//! Observability log stream.
//!
//! An append-only sequence of `{timestamp, agent, type, message}` records.
//! Writing is best effort: the driver only ever talks to a
//! `FallbackLogSink`, which never returns an error.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use crate::error::LogSinkError;

/// Category of a log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogKind {
    Startup,
    Decision,
    Negotiation,
    Transaction,
    Charity,
    GridBuy,
    GridSell,
    Idle,
    Warning,
    Error,
    Reset,
}

impl LogKind {
    pub const ALL: [LogKind; 11] = [
        LogKind::Startup,
        LogKind::Decision,
        LogKind::Negotiation,
        LogKind::Transaction,
        LogKind::Charity,
        LogKind::GridBuy,
        LogKind::GridSell,
        LogKind::Idle,
        LogKind::Warning,
        LogKind::Error,
        LogKind::Reset,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            LogKind::Startup => "startup",
            LogKind::Decision => "decision",
            LogKind::Negotiation => "negotiation",
            LogKind::Transaction => "transaction",
            LogKind::Charity => "charity",
            LogKind::GridBuy => "grid_buy",
            LogKind::GridSell => "grid_sell",
            LogKind::Idle => "idle",
            LogKind::Warning => "warning",
            LogKind::Error => "error",
            LogKind::Reset => "reset",
        }
    }
}

impl fmt::Display for LogKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LogKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown log kind: {s}"))
    }
}

/// One entry of the log stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRecord {
    pub timestamp: String,
    pub agent: String,
    #[serde(rename = "type")]
    pub kind: LogKind,
    pub message: String,
}

impl LogRecord {
    /// Record stamped with the local wall-clock time.
    pub fn now(agent: impl Into<String>, kind: LogKind, message: impl Into<String>) -> Self {
        Self {
            timestamp: chrono::Local::now().format("%H:%M:%S").to_string(),
            agent: agent.into(),
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} ({}): {}",
            self.timestamp, self.agent, self.kind, self.message
        )
    }
}

/// Destination for log records.
pub trait LogSink: Send + Sync {
    fn append(&self, record: &LogRecord) -> Result<(), LogSinkError>;
}

impl<S: LogSink + ?Sized> LogSink for Arc<S> {
    fn append(&self, record: &LogRecord) -> Result<(), LogSinkError> {
        self.as_ref().append(record)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Console
// ─────────────────────────────────────────────────────────────────────────────

/// Emits records through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleLogSink;

impl LogSink for ConsoleLogSink {
    fn append(&self, record: &LogRecord) -> Result<(), LogSinkError> {
        let LogRecord {
            agent,
            kind,
            message,
            ..
        } = record;
        match kind {
            LogKind::Warning => warn!(target: "echo_grid::log", %agent, %kind, "{message}"),
            LogKind::Error => error!(target: "echo_grid::log", %agent, %kind, "{message}"),
            _ => info!(target: "echo_grid::log", %agent, %kind, "{message}"),
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Memory
// ─────────────────────────────────────────────────────────────────────────────

/// Bounded in-memory ring of the most recent records.
#[derive(Debug)]
pub struct MemoryLogSink {
    capacity: usize,
    records: Mutex<VecDeque<LogRecord>>,
}

impl MemoryLogSink {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: Mutex::new(VecDeque::with_capacity(capacity.min(1024))),
        }
    }

    /// Snapshot of stored records, oldest first.
    pub fn records(&self) -> Vec<LogRecord> {
        self.records.lock().iter().cloned().collect()
    }

    /// Stored records of one kind, oldest first.
    pub fn of_kind(&self, kind: LogKind) -> Vec<LogRecord> {
        self.records
            .lock()
            .iter()
            .filter(|r| r.kind == kind)
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }
}

impl Default for MemoryLogSink {
    fn default() -> Self {
        Self::new(1_000)
    }
}

impl LogSink for MemoryLogSink {
    fn append(&self, record: &LogRecord) -> Result<(), LogSinkError> {
        let mut records = self.records.lock();
        if records.len() == self.capacity {
            records.pop_front();
        }
        records.push_back(record.clone());
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Fan-out and fallback
// ─────────────────────────────────────────────────────────────────────────────

/// Writes every record to each inner sink, stopping at the first failure.
#[derive(Default)]
pub struct TeeLogSink {
    sinks: Vec<Box<dyn LogSink>>,
}

impl TeeLogSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, sink: impl LogSink + 'static) -> Self {
        self.sinks.push(Box::new(sink));
        self
    }
}

impl LogSink for TeeLogSink {
    fn append(&self, record: &LogRecord) -> Result<(), LogSinkError> {
        self.sinks.iter().try_for_each(|s| s.append(record))
    }
}

/// Best-effort wrapper: a failed append is written to stderr and dropped.
pub struct FallbackLogSink {
    primary: Box<dyn LogSink>,
}

impl FallbackLogSink {
    pub fn new(primary: impl LogSink + 'static) -> Self {
        Self {
            primary: Box::new(primary),
        }
    }

    /// Append `record`, never failing.
    pub fn log(&self, record: LogRecord) {
        if let Err(e) = self.primary.append(&record) {
            eprintln!("[LogSink] Failed to write log ({e}): {record}");
        }
    }

    /// Build a record stamped now and append it.
    pub fn emit(&self, agent: &str, kind: LogKind, message: impl Into<String>) {
        self.log(LogRecord::now(agent, kind, message));
    }
}

impl fmt::Debug for FallbackLogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FallbackLogSink").finish_non_exhaustive()
    }
}
