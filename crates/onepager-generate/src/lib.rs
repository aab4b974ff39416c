//! Execution engine for onepager runs.
//!
//! Consumes a [`GenerationRequest`](onepager_plan::GenerationRequest), plans
//! it against the templates found on disk, renders every job through a
//! [`Renderer`] and streams ordered progress back to the caller.

pub mod context;
pub mod engine;
pub mod errors;
pub mod guard;
pub mod model;
pub mod progress;
pub mod renderer;

pub use context::{RunTokens, SubstitutionContext, build_context};
pub use engine::{GenerationEngine, RunHandle, RunSession, execute_jobs};
pub use errors::GenerationError;
pub use guard::{RunGuard, RunPermit, RunState};
pub use model::{
    Execution, GenerateOptions, GenerationReport, GenerationResult, JobFailure, JobOutcome,
    JobStatus, RunStats,
};
pub use progress::{ProgressEvent, ProgressSink, ProgressTracker, ReorderBuffer, RunEvent};
pub use renderer::pptx::PptxRenderer;
pub use renderer::{RenderError, Renderer};
