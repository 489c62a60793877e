use std::path::PathBuf;

use thiserror::Error;

/// Errors produced by the pipeline. Every variant is fatal to the run: the
/// caller reports the error and exits non-zero, there is no retry policy.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to read '{path}': {source}")]
    ReadData {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A data row could not be parsed into a record. Row numbers are 1-based
    /// and count data rows only; a header row is not counted.
    #[error("malformed row {row}: {source}")]
    MalformedRow {
        row: usize,
        #[source]
        source: csv::Error,
    },

    #[error("row {row} has {found} columns, expected {expected}")]
    ColumnCount {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("training requires at least one record")]
    InsufficientData,

    #[error("no records to predict on")]
    EmptyInput,

    #[error("failed to write model to '{path}': {source}")]
    SaveModel {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read model from '{path}': {source}")]
    LoadModel {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("model file '{path}' is not valid: {source}")]
    ModelFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("model was trained on {expected} features, records provide {found}")]
    FeatureWidth { expected: usize, found: usize },
}
