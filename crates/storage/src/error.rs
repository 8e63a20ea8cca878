use thiserror::Error;

/// World-state store failures.
#[derive(Error, Debug)]
pub enum StoreError {
    /// The stored tree does not deserialize into a world snapshot.
    #[error("world state is corrupt: {0}")]
    Corrupt(String),

    #[error("invalid store path {path:?}: {reason}")]
    InvalidPath { path: String, reason: &'static str },

    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("store JSON failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Log sink failures. Only surfaced by sinks themselves; the fallback
/// wrapper swallows them.
#[derive(Error, Debug)]
pub enum LogSinkError {
    #[error("sqlite log sink failed: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("log sink unavailable: {0}")]
    Unavailable(String),
}
