//! Error types for calonorm.

use thiserror::Error;

/// calonorm error type.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// CSV writing error.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// A source identifier did not follow the expected token convention.
    ///
    /// Fatal: a wrongly derived group key would silently corrupt the
    /// per-group statistics, so parsing failures always surface.
    #[error("malformed source identifier '{name}': {reason}")]
    MalformedIdentifier {
        /// The identifier that failed to parse.
        name: String,
        /// What was missing or unparseable.
        reason: String,
    },

    /// A source could not be opened at all. Aborts the batch.
    #[error("source unavailable: {0}")]
    SourceUnavailable(String),

    /// The expected event table is absent from an otherwise readable source.
    ///
    /// Recoverable during emission: the source is skipped with a warning.
    /// The field is `source_name` rather than `source` because thiserror
    /// reserves that name for the error cause.
    #[error("table '{table}' missing in source '{source_name}'")]
    TableMissing {
        /// Source identifier.
        source_name: String,
        /// Name of the missing table.
        table: String,
    },

    /// Statistics lookup miss during normalization.
    ///
    /// Indicates an inconsistency between the aggregation and emission
    /// passes; must never occur in a correct run.
    #[error("no statistics for group '{group}', feature '{feature}'")]
    UnknownGroupOrFeature {
        /// Group key of the failed lookup.
        group: String,
        /// Feature name of the failed lookup.
        feature: String,
    },

    /// A persisted statistics file could not be parsed.
    #[error("statistics file format error: {0}")]
    StatsFormat(String),

    /// Validation error (inconsistent columns, empty configuration, ...).
    #[error("validation error: {0}")]
    Validation(String),
}

/// Result type alias.
pub type Result<T> = std::result::Result<T, Error>;
