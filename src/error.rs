use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Structural failures that end a run. Per-line and render problems are
/// logged where they happen and never reach this type.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("invalid run configuration: {0}")]
    Config(String),

    #[error("failed to read input {path}: {source}")]
    Input {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write checkpoint {path}: {source}")]
    Checkpoint {
        path: PathBuf,
        #[source]
        source: CheckpointError,
    },

    #[error("layout failed after {completed} iterations: {cause:#}")]
    Layout { completed: u64, cause: anyhow::Error },

    #[error("community detection failed: {0:#}")]
    Community(anyhow::Error),
}

#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error(transparent)]
    Io(#[from] io::Error),

    #[error(transparent)]
    Csv(#[from] csv::Error),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
