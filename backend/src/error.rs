//! Error types for the shopsight insight pipeline.
//!
//! The hierarchy mirrors the pipeline stages:
//!
//! - [`TableError`] - Format errors on in-memory tables (missing columns,
//!   join keys absent from one side, ragged rows, out-of-domain values)
//! - [`CacheError`] - Failures loading a dataset into the table cache
//! - [`ConfigError`] - Invalid environment configuration
//! - [`PipelineError`] - Top-level orchestration errors
//!
//! Statistical edge cases (too few pairs for a correlation, fewer groups than
//! requested for a ranking) are not errors; they are modeled as explicit
//! result variants in [`crate::transform::metrics`] and
//! [`crate::transform::aggregate`].
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use thiserror::Error;

use crate::parser::CsvError;

// =============================================================================
// Table (format) Errors
// =============================================================================

/// Side of a join, used to point at the table missing a key column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinSide {
    Left,
    Right,
}

impl std::fmt::Display for JoinSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JoinSide::Left => write!(f, "left"),
            JoinSide::Right => write!(f, "right"),
        }
    }
}

/// Format errors raised by table operations.
#[derive(Debug, Error, PartialEq)]
pub enum TableError {
    /// A column required by the operation is absent.
    #[error("Dataset '{dataset}' has no column '{column}'")]
    MissingColumn { dataset: String, column: String },

    /// A declared join key is absent from one side of the join.
    #[error("Join key '{column}' missing from {side} table '{dataset}'")]
    JoinKeyMissing {
        dataset: String,
        side: JoinSide,
        column: String,
    },

    /// A row does not have one cell per column.
    #[error("Dataset '{dataset}' row {row}: expected {expected} cells, found {found}")]
    RowArity {
        dataset: String,
        row: usize,
        expected: usize,
        found: usize,
    },

    /// Two columns share a name (after normalization, or in a derived table).
    #[error("Dataset '{dataset}' has duplicate column '{column}'")]
    DuplicateColumn { dataset: String, column: String },

    /// A cell holds a value outside its column's domain.
    #[error("Dataset '{dataset}' row {row}, column '{column}' (value '{value}'): {message}")]
    InvalidValue {
        dataset: String,
        column: String,
        row: usize,
        value: String,
        message: String,
    },
}

// =============================================================================
// Cache Errors
// =============================================================================

/// Errors while loading a dataset through the table cache.
#[derive(Debug, Error)]
pub enum CacheError {
    /// Failed to read the source file.
    #[error("Failed to read dataset '{dataset}': {source}")]
    Io {
        dataset: String,
        #[source]
        source: std::io::Error,
    },

    /// The source file is not valid delimited text.
    #[error("Malformed dataset '{dataset}': {source}")]
    Csv {
        dataset: String,
        #[source]
        source: CsvError,
    },

    /// The source has no entry for this dataset.
    #[error("Dataset not found: {0}")]
    NotFound(String),

    /// The parsed rows do not form a well-formed table.
    #[error("Invalid table: {0}")]
    Table(#[from] TableError),
}

// =============================================================================
// Config Errors
// =============================================================================

/// Errors reading configuration from the environment.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    /// A variable is set but does not parse.
    #[error("Invalid value for {key}: '{value}' ({message})")]
    InvalidValue {
        key: String,
        value: String,
        message: String,
    },
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline orchestration errors.
///
/// This is the error type returned by [`crate::InsightPipeline`] analyses
/// and by the `run` command. A format error aborts the analysis it occurred
/// in; the caller reports it rather than rendering a partial chart.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Table format error.
    #[error("Table error: {0}")]
    Table(#[from] TableError),

    /// Dataset loading error.
    #[error("Load error: {0}")]
    Cache(#[from] CacheError),

    /// Configuration error.
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Failed to write the report.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The report was written but some analyses failed.
    #[error("{} of 6 analyses failed: {}", .0.len(), .0.join(", "))]
    AnalysesFailed(Vec<String>),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for table operations.
pub type TableResult<T> = Result<T, TableError>;

/// Result type for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;
