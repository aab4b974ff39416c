use onepager_core::MappingError;
use thiserror::Error;

/// Configuration errors detected before any job runs.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("missing required path: {0}")]
    MissingPath(&'static str),
    #[error("no primary record source loaded")]
    NoRecords,
    #[error("none of the selected languages [{requested}] has templates (available: [{available}])")]
    NoLanguages { requested: String, available: String },
    #[error("no jobs planned (check languages, templates and row filters)")]
    NoJobs,
    #[error(transparent)]
    Mapping(#[from] MappingError),
    #[error(transparent)]
    Core(#[from] onepager_core::Error),
}

/// Result type for planning operations.
pub type Result<T> = std::result::Result<T, PlanError>;
