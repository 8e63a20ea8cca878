//! Storage layer for the Echo-Grid micro-market.
//!
//! Two separate concerns live here:
//! - The world-state store: a path-addressable tree holding grid,
//!   households, market, community, clock and controls. `MemoryStore` for
//!   tests and single-process runs, `JsonFileStore` for a file other
//!   processes can watch.
//! - The log stream: append-only observability records behind `LogSink`,
//!   with SQLite, console and in-memory sinks. `FallbackLogSink` makes
//!   writes best effort.
//!
//! Nothing in this crate knows about settlement rules.

mod error;
mod log;
mod sqlite;
mod store;
mod tree;

pub use error::{LogSinkError, StoreError};
pub use log::{
    ConsoleLogSink, FallbackLogSink, LogKind, LogRecord, LogSink, MemoryLogSink, TeeLogSink,
};
pub use sqlite::{SqliteLogSink, init_schema};
pub use store::{JsonFileStore, MemoryStore, REQUIRED_KEYS, WorldStore};
