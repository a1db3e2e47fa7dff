//! Error types for the pipeline stages.

use ath_db::DbError;
use std::path::PathBuf;
use thiserror::Error;

/// The dataset could not be read into the required schema.
///
/// The `Display` text is stored verbatim as the sample's `parsing_error`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParsingError {
    #[error("Unable to read dataset: {0}")]
    Unreadable(String),

    #[error("Missing required column '{0}'")]
    MissingColumn(&'static str),

    #[error("Malformed CSV at line {line}: {message}")]
    Csv { line: u64, message: String },

    #[error("Missing value for required column '{column}' at line {line}")]
    MissingValue { line: u64, column: &'static str },

    #[error("Invalid value '{value}' for column '{column}' at line {line}: expected {expected}")]
    InvalidValue {
        line: u64,
        column: &'static str,
        value: String,
        expected: &'static str,
    },
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StatisticsError {
    #[error("Dataset has no rows")]
    EmptyDataset,

    #[error("Dataset has no dates")]
    NoDates,
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to parse chart SVG: {0}")]
    Svg(String),

    #[error("Chart has invalid size {width}x{height}")]
    InvalidSize { width: u32, height: u32 },

    #[error("Failed to encode PNG: {0}")]
    Png(String),
}

#[derive(Debug, Error)]
pub enum BlobError {
    #[error("Object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    #[error("Invalid object key: '{0}'")]
    InvalidKey(String),

    #[error("Blob store I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that abort a pipeline run.
///
/// Parse failures are not here: they are an expected outcome and end the
/// sample in `failed` instead.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Bad sample: {0}")]
    BadSample(String),

    #[error(transparent)]
    Db(#[from] DbError),

    #[error("Statistics failed: {0}")]
    Statistics(#[from] StatisticsError),

    #[error("Rendering failed: {0}")]
    Render(#[from] RenderError),

    #[error("Publishing failed: {0}")]
    Blob(#[from] BlobError),

    #[error("Pipeline task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}
