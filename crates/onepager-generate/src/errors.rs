use std::path::PathBuf;

use onepager_plan::PlanError;
use thiserror::Error;

/// Errors that stop a run before any job executes.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error("invalid templates root: no language folder with templates under {0}")]
    NoTemplates(PathBuf),
    #[error("run already in progress: {run_id}")]
    RunInProgress { run_id: String },
    #[error("invalid date format: {0}")]
    InvalidDateFormat(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("run thread panicked: {0}")]
    Panicked(String),
}
