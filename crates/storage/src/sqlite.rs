//! SQLite-backed log sink.

use std::path::Path;

use parking_lot::Mutex;
use rusqlite::Connection;

use crate::error::LogSinkError;
use crate::log::{LogKind, LogRecord, LogSink};

/// Initialize the log table.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    // Append-only log stream
    conn.execute(
        "CREATE TABLE IF NOT EXISTS logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp TEXT NOT NULL,
            agent TEXT NOT NULL,
            type TEXT NOT NULL,
            message TEXT NOT NULL,
            created_at INTEGER DEFAULT (strftime('%s', 'now'))
        )",
        [],
    )?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_logs_type ON logs(type)", [])?;

    Ok(())
}

/// Log sink persisting to a `logs` table.
pub struct SqliteLogSink {
    conn: Mutex<Connection>,
}

impl SqliteLogSink {
    /// Open (or create) the database at `path`; `:memory:` for in-memory.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LogSinkError> {
        let path = path.as_ref();
        let conn = if path.as_os_str() == ":memory:" {
            Connection::open_in_memory()?
        } else {
            Connection::open(path)?
        };
        init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn in_memory() -> Result<Self, LogSinkError> {
        Self::open(":memory:")
    }

    /// Most recent `limit` records, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<LogRecord>, LogSinkError> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(
            "SELECT timestamp, agent, type, message FROM logs ORDER BY id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map([i64::try_from(limit).unwrap_or(i64::MAX)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;

        let mut records = Vec::new();
        for row in rows {
            let (timestamp, agent, kind, message) = row?;
            // Rows written by other tools may carry unknown types.
            let Ok(kind) = kind.parse::<LogKind>() else {
                continue;
            };
            records.push(LogRecord {
                timestamp,
                agent,
                kind,
                message,
            });
        }
        Ok(records)
    }

    /// Number of stored records of `kind`.
    pub fn count(&self, kind: LogKind) -> Result<u64, LogSinkError> {
        let conn = self.conn.lock();
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM logs WHERE type = ?1",
            [kind.as_str()],
            |row| row.get(0),
        )?;
        Ok(u64::try_from(n).unwrap_or(0))
    }
}

impl LogSink for SqliteLogSink {
    fn append(&self, record: &LogRecord) -> Result<(), LogSinkError> {
        let conn = self.conn.lock();
        conn.execute(
            "INSERT INTO logs (timestamp, agent, type, message) VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![
                record.timestamp,
                record.agent,
                record.kind.as_str(),
                record.message,
            ],
        )?;
        Ok(())
    }
}

impl std::fmt::Debug for SqliteLogSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLogSink").finish_non_exhaustive()
    }
}
