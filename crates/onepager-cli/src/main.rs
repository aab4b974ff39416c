mod config;
mod registry;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use config::{ConfigError, ConfigFile, load_config, merge_rules, parse_mapping_flag};
use onepager_core::{
    Error as CoreError, MappingRule, ProbeField, ProbeStatus, ProbeTracker, RuleOrigin,
    TEMPLATE_EXTENSION, available_languages, default_rules, load_record_set, probe_record_source,
    probe_templates, resolve, scan_templates,
};
use onepager_generate::{
    GenerateOptions, GenerationEngine, GenerationError, PptxRenderer, ProgressEvent,
    model::default_workers,
};
use onepager_plan::{
    GenerationConfig, GenerationRequest, PlanError, PlanOptions, config_json_schema,
};
use registry::{RunLog, init_logging};
use thiserror::Error;

#[derive(Debug, Error)]
enum CliError {
    #[error("registry error: {0}")]
    Registry(#[from] registry::RegistryError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("core error: {0}")]
    Core(#[from] CoreError),
    #[error(transparent)]
    Plan(#[from] PlanError),
    #[error(transparent)]
    Generation(#[from] GenerationError),
    #[error("json serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{failed} of {total} files failed to generate")]
    JobsFailed { failed: u64, total: u64 },
}

#[derive(Parser, Debug)]
#[command(name = "onepager", version, about = "Batch one-pager generation from CSV and PPTX templates")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate one file per (language, template, record).
    Generate(GenerateArgs),
    /// List the languages and templates found under a templates root.
    Scan(ScanArgs),
    /// Check that record sources and the templates root are usable.
    Validate(ValidateArgs),
    /// Print the effective column-to-placeholder mapping.
    Mappings(MappingsArgs),
    /// Print the JSON schema of a generation config.
    Schema,
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Current-year record source (CSV).
    #[arg(long, value_name = "CSV")]
    records: Option<PathBuf>,
    /// Previous-year record source (CSV).
    #[arg(long, value_name = "CSV")]
    previous_year: Option<PathBuf>,
    /// TOML settings file.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Extra mapping rule, `SOURCE=TAG`. Repeatable; later rules win.
    #[arg(long = "map", value_name = "SOURCE=TAG", value_parser = parse_mapping_flag)]
    mappings: Vec<MappingRule>,
    /// Column joining current and previous-year records.
    #[arg(long)]
    join_key: Option<String>,
}

#[derive(Args, Debug)]
struct GenerateArgs {
    #[command(flatten)]
    source: SourceArgs,
    /// Templates root holding one folder per language.
    #[arg(long, value_name = "DIR")]
    templates: PathBuf,
    /// Directory receiving the timestamped run folder.
    #[arg(long, value_name = "DIR")]
    output: PathBuf,
    /// Language to generate. Repeatable; defaults to every language found.
    #[arg(long = "language", value_name = "CODE")]
    languages: Vec<String>,
    /// Maximum concurrent renders.
    #[arg(long)]
    workers: Option<usize>,
    /// Apply the audience and language row filters.
    #[arg(long, default_value_t = false)]
    apply_row_filters: bool,
    /// strftime pattern for the @date token.
    #[arg(long)]
    date_format: Option<String>,
}

#[derive(Args, Debug)]
struct ScanArgs {
    /// Templates root holding one folder per language.
    #[arg(long, value_name = "DIR")]
    templates: PathBuf,
}

#[derive(Args, Debug)]
struct ValidateArgs {
    #[arg(long, value_name = "CSV")]
    records: Option<PathBuf>,
    #[arg(long, value_name = "CSV")]
    previous_year: Option<PathBuf>,
    #[arg(long, value_name = "DIR")]
    templates: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct MappingsArgs {
    #[command(flatten)]
    source: SourceArgs,
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    let cli = Cli::parse();
    let log = init_logging()?;

    match cli.command {
        Command::Generate(args) => run_generate(args, log).await,
        Command::Scan(args) => run_scan(args),
        Command::Validate(args) => run_validate(args).await,
        Command::Mappings(args) => run_mappings(args),
        Command::Schema => run_schema(),
    }
}

async fn run_generate(args: GenerateArgs, log: RunLog) -> Result<(), CliError> {
    let GenerateArgs {
        source,
        templates,
        output,
        languages,
        workers,
        apply_row_filters,
        date_format,
    } = args;
    let file = load_optional_config(source.config.as_deref())?;

    let languages = if !languages.is_empty() {
        languages
    } else if !file.languages.is_empty() {
        file.languages.clone()
    } else {
        available_languages(&templates, TEMPLATE_EXTENSION)
    };

    let config = GenerationConfig {
        standard_csv: source.records,
        prev_year_csv: source.previous_year,
        template_dir: templates,
        output_dir: output,
        languages,
        mappings: merge_rules(&file.mappings, &source.mappings),
        options: PlanOptions {
            join_key: source
                .join_key
                .or(file.join_key)
                .unwrap_or_else(|| PlanOptions::default().join_key),
            apply_row_filters: apply_row_filters || file.apply_row_filters.unwrap_or(false),
        },
    };

    let workers = workers.or(file.workers).unwrap_or_else(default_workers);
    if workers == 0 {
        return Err(CliError::InvalidConfig("workers must be at least 1".to_string()));
    }
    let defaults = GenerateOptions::default();
    let options = GenerateOptions {
        workers,
        date_format: date_format.or(file.date_format).unwrap_or(defaults.date_format),
        run_dir_prefix: defaults.run_dir_prefix,
    };

    let request = GenerationRequest::from_config(&config, &default_rules())?;
    let engine = GenerationEngine::new(options, PptxRenderer::new());
    let session = engine.begin(request)?;
    log.attach(&session.run_dir().join("logs.ndjson"))?;

    tracing::info!(
        event = "run_started",
        run_id = %session.run_id(),
        jobs = session.plan().len(),
        languages = ?session.plan().languages
    );
    for language in &session.plan().missing_languages {
        tracing::warn!(event = "language_skipped", language = %language, "no templates for language");
    }

    let result = tokio::task::spawn_blocking(move || {
        session.run(&mut |event: ProgressEvent| {
            println!("{:>5.1}% {}", event.percent, event.message);
        })
    })
    .await?;

    println!(
        "{} generated, {} failed, {} total in {:.1}s -> {}",
        result.stats.success_count,
        result.stats.error_count,
        result.stats.total_files,
        result.stats.total_time_secs,
        result.run_dir.display()
    );
    tracing::info!(event = "run_finished", run_dir = %result.run_dir.display());

    if result.stats.error_count > 0 {
        return Err(CliError::JobsFailed {
            failed: result.stats.error_count,
            total: result.stats.total_files,
        });
    }
    Ok(())
}

fn run_scan(args: ScanArgs) -> Result<(), CliError> {
    let set = scan_templates(&args.templates, TEMPLATE_EXTENSION);
    if set.is_empty() {
        return Err(GenerationError::NoTemplates(args.templates).into());
    }

    for language in set.languages() {
        let templates = set.templates(&language).unwrap_or_default();
        println!("{language} ({} templates)", templates.len());
        for template in templates {
            let name = template
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            println!("  {name}");
        }
    }
    tracing::info!(
        event = "templates_scanned",
        languages = set.languages().len(),
        templates = set.template_count()
    );
    Ok(())
}

async fn run_validate(args: ValidateArgs) -> Result<(), CliError> {
    let tracker = Arc::new(ProbeTracker::new());
    let mut probes = Vec::new();

    for (field, path) in [
        (ProbeField::StandardRecords, args.records),
        (ProbeField::PreviousYearRecords, args.previous_year),
    ] {
        let Some(path) = path else {
            tracker.reset(field);
            continue;
        };
        let token = tracker.begin(field);
        let tracker = Arc::clone(&tracker);
        probes.push(tokio::task::spawn_blocking(move || {
            let valid = probe_record_source(&path);
            tracker.complete(token, valid);
        }));
    }

    if let Some(root) = args.templates {
        let token = tracker.begin(ProbeField::Templates);
        let tracker = Arc::clone(&tracker);
        probes.push(tokio::task::spawn_blocking(move || {
            let status = probe_templates(&root, TEMPLATE_EXTENSION);
            tracker.complete(token, status == ProbeStatus::Valid);
        }));
    } else {
        tracker.reset(ProbeField::Templates);
    }

    for probe in probes {
        probe.await?;
    }

    let statuses = [
        ProbeField::StandardRecords,
        ProbeField::PreviousYearRecords,
        ProbeField::Templates,
    ]
    .map(|field| (field, tracker.status(field)));
    println!("{}", serde_json::to_string_pretty(&statuses)?);

    if statuses
        .iter()
        .any(|(_, status)| *status == ProbeStatus::Invalid)
    {
        return Err(CliError::InvalidConfig("one or more inputs are invalid".to_string()));
    }
    Ok(())
}

fn run_mappings(args: MappingsArgs) -> Result<(), CliError> {
    let source = args.source;
    let file = load_optional_config(source.config.as_deref())?;
    let records = match &source.records {
        Some(path) => load_record_set(path)?,
        None => return Err(PlanError::MissingPath("records").into()),
    };

    let rules = merge_rules(&file.mappings, &source.mappings);
    let mut mapping = resolve(&default_rules(), &rules, &records.columns).map_err(PlanError::from)?;
    if let Some(path) = &source.previous_year {
        mapping.extend_previous_year(&load_record_set(path)?.columns);
    }

    for rule in mapping.rules() {
        let origin = match rule.origin {
            RuleOrigin::Default => "default",
            RuleOrigin::User => "user",
            RuleOrigin::Fallback => "column",
        };
        println!("{:<8} {} -> {}", origin, rule.source, rule.tag);
    }
    Ok(())
}

fn run_schema() -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(&config_json_schema())?);
    Ok(())
}

fn load_optional_config(path: Option<&Path>) -> Result<ConfigFile, CliError> {
    match path {
        Some(path) => Ok(load_config(path)?),
        None => Ok(ConfigFile::default()),
    }
}
