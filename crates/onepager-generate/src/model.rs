use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Options for the generation engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerateOptions {
    /// Maximum number of jobs rendered concurrently.
    pub workers: usize,
    /// `strftime` pattern for the `@date` token.
    pub date_format: String,
    /// Prefix of the timestamped run directory.
    pub run_dir_prefix: String,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            date_format: "%d/%m/%Y".to_string(),
            run_dir_prefix: "OnePagerGeneratedAt_".to_string(),
        }
    }
}

/// Available parallelism, between 1 and 8.
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(1)
        .clamp(1, 8)
}

/// Terminal summary of a run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RunStats {
    pub total_files: u64,
    pub total_time_secs: f64,
    pub success_count: u64,
    pub error_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum JobStatus {
    Success { output: PathBuf },
    Failure { reason: String },
}

/// Result of one job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobOutcome {
    pub index: usize,
    pub language: String,
    pub template: String,
    pub destination: PathBuf,
    #[serde(flatten)]
    pub status: JobStatus,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self.status, JobStatus::Success { .. })
    }
}

/// Everything `execute_jobs` observed, outcomes in plan order.
#[derive(Debug, Clone)]
pub struct Execution {
    pub stats: RunStats,
    pub outcomes: Vec<JobOutcome>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobFailure {
    pub index: usize,
    pub language: String,
    pub template: String,
    pub destination: PathBuf,
    pub reason: String,
}

/// Report written to `generation_report.json` in the run directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationReport {
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub stats: RunStats,
    pub languages: Vec<String>,
    pub missing_languages: Vec<String>,
    pub filtered_jobs: usize,
    pub failures: Vec<JobFailure>,
}

impl GenerationReport {
    pub fn record_failures(&mut self, outcomes: &[JobOutcome]) {
        for outcome in outcomes {
            if let JobStatus::Failure { reason } = &outcome.status {
                self.failures.push(JobFailure {
                    index: outcome.index,
                    language: outcome.language.clone(),
                    template: outcome.template.clone(),
                    destination: outcome.destination.clone(),
                    reason: reason.clone(),
                });
            }
        }
    }
}

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub run_dir: PathBuf,
    pub stats: RunStats,
    pub report: GenerationReport,
    pub outcomes: Vec<JobOutcome>,
}
