//! Generation requests and the job planner.
//!
//! A [`GenerationConfig`] names the inputs of a run; preparing it loads the
//! record sources and resolves the mapping into a [`GenerationRequest`],
//! which [`plan_jobs`] expands into an ordered list of [`GenerationJob`]s.

pub mod errors;
pub mod filters;
pub mod model;
pub mod naming;
pub mod planner;
pub mod schema;

pub use errors::{PlanError, Result};
pub use model::{GenerationConfig, GenerationJob, GenerationRequest, JobPlan, PlanOptions};
pub use planner::plan_jobs;
pub use schema::config_json_schema;
