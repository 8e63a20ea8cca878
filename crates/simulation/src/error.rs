use std::path::PathBuf;

use thiserror::Error;

/// Replay dataset failures. All of them are fatal before the first step.
#[derive(Error, Debug)]
pub enum DatasetError {
    #[error("dataset not found at {path}")]
    NotFound {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dataset at {0} has no rows")]
    Empty(PathBuf),

    #[error("dataset row {row}: {reason}")]
    InvalidRow { row: usize, reason: String },

    #[error("dataset parse failed: {0}")]
    Csv(#[from] csv::Error),
}

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error(transparent)]
    Config(#[from] sim_core::EngineConfigError),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("replay mode needs a dataset feed")]
    MissingFeed,

    #[error(transparent)]
    Store(#[from] storage::StoreError),
}
