use thiserror::Error;

/// Core error type shared across onepager crates.
#[derive(Debug, Error)]
pub enum Error {
    /// Filesystem failure while reading a record source or template tree.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    /// The record source could not be parsed as delimited text.
    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
    /// The record source parsed but cannot be used.
    #[error("invalid record source: {0}")]
    InvalidRecordSource(String),
    /// A user mapping rule is malformed.
    #[error("invalid mapping: {0}")]
    Mapping(#[from] MappingError),
}

/// Malformed user mapping rules, rejected at resolution time.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MappingError {
    #[error("mapping rule for tag '{tag}' has an empty source key")]
    EmptySourceKey { tag: String },
    #[error("mapping rule for source '{source_key}' has an empty placeholder tag")]
    EmptyPlaceholderTag { source_key: String },
}

/// Convenience alias for results returned by onepager crates.
pub type Result<T> = std::result::Result<T, Error>;
