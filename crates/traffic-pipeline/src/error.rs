use std::{num::ParseIntError, path::PathBuf};

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid configuration: {parameter} must be at least 1 (got {value})")]
    InvalidConfiguration { parameter: &'static str, value: usize },

    #[error("source unavailable: {}", path.display())]
    SourceUnavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to spawn worker thread")]
    Spawn(#[source] std::io::Error),

    #[error("{role} worker #{index} panicked")]
    WorkerPanicked { role: WorkerRole, index: usize },

    #[error("pipeline cancelled after claiming {lines_claimed} lines")]
    Cancelled { lines_claimed: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerRole {
    Producer,
    Consumer,
}

impl std::fmt::Display for WorkerRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkerRole::Producer => f.write_str("producer"),
            WorkerRole::Consumer => f.write_str("consumer"),
        }
    }
}

/// Reasons a single input line is not a valid record.
///
/// These never abort a pipeline run, the offending line is skipped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseRecordError {
    #[error("expected 4 whitespace separated fields, found {0}")]
    FieldCount(usize),
    #[error("invalid timestamp: {0}")]
    Timestamp(#[from] chrono::ParseError),
    #[error("invalid key: {0}")]
    Key(#[source] ParseIntError),
    #[error("invalid quantity: {0}")]
    Quantity(#[source] ParseIntError),
}
