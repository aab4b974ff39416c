use std::any::Any;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, mpsc};
use std::thread;

use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local, Utc};
use rayon::prelude::*;
use serde::Serialize;
use tracing::{debug, info, warn};

use onepager_core::{EffectiveMapping, ResolvedRule, scan_templates};
use onepager_plan::{GenerationJob, GenerationRequest, JobPlan, plan_jobs};

use crate::context::{RunTokens, build_context};
use crate::errors::GenerationError;
use crate::guard::{RunGuard, RunPermit, RunState};
use crate::model::{
    Execution, GenerateOptions, GenerationReport, GenerationResult, JobOutcome, JobStatus,
};
use crate::progress::{ProgressEvent, ProgressSink, ProgressTracker, ReorderBuffer, RunEvent};
use crate::renderer::Renderer;

/// Entry point for generating presentations from a request.
#[derive(Debug)]
pub struct GenerationEngine<R> {
    options: GenerateOptions,
    renderer: Arc<R>,
    guard: Arc<RunGuard>,
}

impl<R: Renderer + 'static> GenerationEngine<R> {
    pub fn new(options: GenerateOptions, renderer: R) -> Self {
        Self::with_guard(options, renderer, RunGuard::new())
    }

    /// Build an engine that shares `guard` with other engines.
    pub fn with_guard(options: GenerateOptions, renderer: R, guard: Arc<RunGuard>) -> Self {
        Self {
            options,
            renderer: Arc::new(renderer),
            guard,
        }
    }

    pub fn state(&self) -> RunState {
        self.guard.state()
    }

    /// Validate and plan `request`, then claim the run slot.
    ///
    /// Every configuration problem is reported here, before the engine
    /// enters `Running` and before anything is written.
    pub fn begin(&self, request: GenerationRequest) -> Result<RunSession<R>, GenerationError> {
        validate_date_format(&self.options.date_format)?;

        let templates = scan_templates(&request.template_root, self.renderer.template_extension());
        if templates.is_empty() {
            return Err(GenerationError::NoTemplates(request.template_root.clone()));
        }
        let plan = plan_jobs(&request, &templates)?;

        let run_id = uuid::Uuid::new_v4().to_string();
        let permit = self.guard.try_start(&run_id)?;

        let started_at = Utc::now();
        let local_start: DateTime<Local> = started_at.into();
        let run_dir = allocate_run_dir(
            &request.output_root,
            &self.options.run_dir_prefix,
            &local_start,
            &run_id,
        )?;

        let tokens = RunTokens {
            date: local_start.format(&self.options.date_format).to_string(),
            join_key: request.options.join_key.clone(),
        };

        let config = RunConfig {
            run_id: &run_id,
            started_at: started_at.to_rfc3339(),
            template_root: &request.template_root,
            output_root: &request.output_root,
            languages: &plan.languages,
            missing_languages: &plan.missing_languages,
            jobs: plan.len(),
            filtered_jobs: plan.filtered,
            workers: self.options.workers,
            records: request.records.len(),
            previous_year_records: request.previous_year.as_ref().map(|set| set.len()),
            mapping: request.mapping.rules(),
        };
        write_json(&run_dir.join("run_config.json"), &config)?;

        info!(
            run_id = %run_id,
            run_dir = %run_dir.display(),
            jobs = plan.len(),
            workers = self.options.workers,
            "generation started"
        );

        Ok(RunSession {
            run_id,
            started_at,
            run_dir,
            plan,
            mapping: request.mapping,
            tokens,
            renderer: Arc::clone(&self.renderer),
            workers: self.options.workers,
            _permit: permit,
        })
    }

    /// Plan and execute `request` on the calling thread.
    pub fn run<S: ProgressSink>(
        &self,
        request: GenerationRequest,
        sink: &mut S,
    ) -> Result<GenerationResult, GenerationError> {
        Ok(self.begin(request)?.run(sink))
    }

    /// Plan `request` and execute it on a background thread.
    pub fn spawn(&self, request: GenerationRequest) -> Result<RunHandle, GenerationError> {
        Ok(self.begin(request)?.spawn())
    }
}

/// A planned run holding the run slot. Dropping it without running frees
/// the slot.
#[derive(Debug)]
pub struct RunSession<R> {
    run_id: String,
    started_at: DateTime<Utc>,
    run_dir: PathBuf,
    plan: JobPlan,
    mapping: EffectiveMapping,
    tokens: RunTokens,
    renderer: Arc<R>,
    workers: usize,
    _permit: RunPermit,
}

impl<R: Renderer + 'static> RunSession<R> {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn plan(&self) -> &JobPlan {
        &self.plan
    }

    /// Execute every planned job, reporting progress to `sink`.
    ///
    /// Always completes: job failures are counted, never raised.
    pub fn run<S: ProgressSink>(self, sink: &mut S) -> GenerationResult {
        let execution = execute_jobs(
            &self.plan.jobs,
            &self.mapping,
            &self.tokens,
            self.renderer.as_ref(),
            &self.run_dir,
            self.workers,
            sink,
        );

        let mut report = GenerationReport {
            run_id: self.run_id.clone(),
            started_at: self.started_at.to_rfc3339(),
            finished_at: Utc::now().to_rfc3339(),
            stats: execution.stats,
            languages: self.plan.languages.clone(),
            missing_languages: self.plan.missing_languages.clone(),
            filtered_jobs: self.plan.filtered,
            failures: Vec::new(),
        };
        report.record_failures(&execution.outcomes);

        let report_path = self.run_dir.join("generation_report.json");
        if let Err(err) = write_json(&report_path, &report) {
            warn!(run_id = %self.run_id, error = %err, "failed to write generation report");
        }

        info!(
            run_id = %self.run_id,
            total_files = execution.stats.total_files,
            success_count = execution.stats.success_count,
            error_count = execution.stats.error_count,
            total_time_secs = execution.stats.total_time_secs,
            "generation completed"
        );

        GenerationResult {
            run_dir: self.run_dir.clone(),
            stats: execution.stats,
            report,
            outcomes: execution.outcomes,
        }
    }

    /// Execute on a background thread. Events arrive on the handle in plan
    /// order, followed by a single `RunEvent::Completed`.
    pub fn spawn(self) -> RunHandle {
        let (sender, events) = mpsc::channel();
        let run_id = self.run_id.clone();
        let run_dir = self.run_dir.clone();

        let join = thread::spawn(move || {
            let progress = sender.clone();
            let mut sink = move |event: ProgressEvent| {
                progress.send(RunEvent::Progress(event)).ok();
            };
            let result = self.run(&mut sink);
            sender.send(RunEvent::Completed(result.stats)).ok();
            result
        });

        RunHandle {
            run_id,
            run_dir,
            events,
            join,
        }
    }
}

/// Caller side of a spawned run.
#[derive(Debug)]
pub struct RunHandle {
    run_id: String,
    run_dir: PathBuf,
    events: mpsc::Receiver<RunEvent>,
    join: thread::JoinHandle<GenerationResult>,
}

impl RunHandle {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    /// Block for the next event; `None` once the run thread is gone.
    pub fn next_event(&self) -> Option<RunEvent> {
        self.events.recv().ok()
    }

    /// Next event if one is already queued.
    pub fn try_next_event(&self) -> Option<RunEvent> {
        self.events.try_recv().ok()
    }

    /// Wait for the run to finish.
    pub fn wait(self) -> Result<GenerationResult, GenerationError> {
        self.join
            .join()
            .map_err(|panic| GenerationError::Panicked(panic_message(panic)))
    }
}

/// Render `jobs` on a pool of `workers` threads and report outcomes to
/// `sink` in slice order.
pub fn execute_jobs<R, S>(
    jobs: &[GenerationJob],
    mapping: &EffectiveMapping,
    tokens: &RunTokens,
    renderer: &R,
    output_root: &Path,
    workers: usize,
    sink: &mut S,
) -> Execution
where
    R: Renderer + ?Sized,
    S: ProgressSink,
{
    let mut tracker = ProgressTracker::new(jobs.len());
    let mut outcomes = Vec::with_capacity(jobs.len());
    let mut release = |outcome: JobOutcome| {
        sink.on_progress(tracker.record(&outcome));
        outcomes.push(outcome);
    };

    let workers = workers.clamp(1, jobs.len().max(1));
    match rayon::ThreadPoolBuilder::new().num_threads(workers).build() {
        Ok(pool) => {
            let (sender, receiver) = mpsc::channel::<(usize, JobOutcome)>();
            pool.in_place_scope(|scope| {
                scope.spawn(move |_| {
                    jobs.par_iter().enumerate().for_each_with(
                        sender,
                        |sender, (position, job)| {
                            let outcome = run_job(job, mapping, tokens, renderer, output_root);
                            sender.send((position, outcome)).ok();
                        },
                    );
                });

                let mut buffer = ReorderBuffer::new();
                for (position, outcome) in receiver {
                    buffer.insert(position, outcome);
                    while let Some(outcome) = buffer.pop_ready() {
                        release(outcome);
                    }
                }
            });
        }
        Err(err) => {
            warn!(error = %err, "thread pool unavailable, rendering sequentially");
            for job in jobs {
                release(run_job(job, mapping, tokens, renderer, output_root));
            }
        }
    }

    Execution {
        stats: tracker.finish(),
        outcomes,
    }
}

fn run_job<R: Renderer + ?Sized>(
    job: &GenerationJob,
    mapping: &EffectiveMapping,
    tokens: &RunTokens,
    renderer: &R,
    output_root: &Path,
) -> JobOutcome {
    let context = build_context(job, mapping, tokens);
    let destination = output_root.join(&job.destination);

    let rendered = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        renderer.render(&job.template, &context, &destination)
    }));

    let status = match rendered {
        Ok(Ok(())) => {
            debug!(job = job.index, destination = %destination.display(), "job rendered");
            JobStatus::Success {
                output: destination,
            }
        }
        Ok(Err(err)) => {
            warn!(
                job = job.index,
                language = %job.language,
                template = %job.template.display(),
                error = %err,
                "job failed"
            );
            JobStatus::Failure {
                reason: err.to_string(),
            }
        }
        Err(panic) => {
            let reason = format!("renderer panicked: {}", panic_message(panic));
            warn!(job = job.index, error = %reason, "job failed");
            JobStatus::Failure { reason }
        }
    };

    JobOutcome {
        index: job.index,
        language: job.language.clone(),
        template: job.template_name(),
        destination: job.destination.clone(),
        status,
    }
}

#[derive(Serialize)]
struct RunConfig<'a> {
    run_id: &'a str,
    started_at: String,
    template_root: &'a Path,
    output_root: &'a Path,
    languages: &'a [String],
    missing_languages: &'a [String],
    jobs: usize,
    filtered_jobs: usize,
    workers: usize,
    records: usize,
    previous_year_records: Option<usize>,
    mapping: &'a [ResolvedRule],
}

/// Create the timestamped run directory. A directory already claimed in
/// the same second gets a short run-id suffix.
fn allocate_run_dir(
    output_root: &Path,
    prefix: &str,
    started: &DateTime<Local>,
    run_id: &str,
) -> std::io::Result<PathBuf> {
    fs::create_dir_all(output_root)?;
    let name = format!("{prefix}{}", started.format("%Y-%m-%d_%H-%M-%S"));
    let candidate = output_root.join(&name);
    match fs::create_dir(&candidate) {
        Ok(()) => return Ok(candidate),
        Err(err) if err.kind() == ErrorKind::AlreadyExists => {}
        Err(err) => return Err(err),
    }
    let short_id: String = run_id.chars().take(8).collect();
    let suffixed = output_root.join(format!("{name}_{short_id}"));
    fs::create_dir(&suffixed)?;
    Ok(suffixed)
}

fn validate_date_format(format: &str) -> Result<(), GenerationError> {
    if StrftimeItems::new(format).any(|item| matches!(item, Item::Error)) {
        return Err(GenerationError::InvalidDateFormat(format.to_string()));
    }
    Ok(())
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), GenerationError> {
    fs::write(path, serde_json::to_vec_pretty(value)?)?;
    Ok(())
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "panic during generation".to_string()
    }
}
