use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use onepager_core::{
    EffectiveMapping, MappingRule, Record, RecordSet, load_record_set, resolve,
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::errors::{PlanError, Result};
use crate::naming::CLIENT_COLUMN;

/// Caller-supplied inputs of a generation run.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct GenerationConfig {
    /// Current-year record source.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standard_csv: Option<PathBuf>,
    /// Previous-year record source, correlated on `options.join_key`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev_year_csv: Option<PathBuf>,
    /// Root holding one folder of templates per language.
    pub template_dir: PathBuf,
    /// Directory receiving the timestamped run folder.
    pub output_dir: PathBuf,
    /// Selected language codes, in generation order.
    #[serde(default)]
    pub languages: Vec<String>,
    /// User rules applied over the built-in defaults, in order.
    #[serde(default)]
    pub mappings: Vec<MappingRule>,
    #[serde(default)]
    pub options: PlanOptions,
}

/// Planner knobs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(default)]
pub struct PlanOptions {
    /// Column correlating current and previous-year records.
    pub join_key: String,
    /// Apply the audience and language row filters.
    pub apply_row_filters: bool,
}

impl Default for PlanOptions {
    fn default() -> Self {
        Self {
            join_key: CLIENT_COLUMN.to_string(),
            apply_row_filters: false,
        }
    }
}

/// A fully loaded run configuration. Immutable once built.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub records: RecordSet,
    pub previous_year: Option<RecordSet>,
    pub template_root: PathBuf,
    pub output_root: PathBuf,
    pub languages: Vec<String>,
    pub mapping: EffectiveMapping,
    pub options: PlanOptions,
}

impl GenerationRequest {
    /// Load the record sources named by `config` and resolve its mapping
    /// against `defaults`.
    pub fn from_config(config: &GenerationConfig, defaults: &[MappingRule]) -> Result<Self> {
        require_path(&config.template_dir, "template_dir")?;
        require_path(&config.output_dir, "output_dir")?;

        let records = match &config.standard_csv {
            Some(path) => load_record_set(path)?,
            None => return Err(PlanError::NoRecords),
        };
        let previous_year = config
            .prev_year_csv
            .as_deref()
            .map(load_record_set)
            .transpose()?;

        Self::new(
            records,
            previous_year,
            config.template_dir.clone(),
            config.output_dir.clone(),
            &config.languages,
            defaults,
            &config.mappings,
            config.options.clone(),
        )
    }

    /// Build a request from record sets already in memory.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        records: RecordSet,
        previous_year: Option<RecordSet>,
        template_root: PathBuf,
        output_root: PathBuf,
        languages: &[String],
        defaults: &[MappingRule],
        user_rules: &[MappingRule],
        options: PlanOptions,
    ) -> Result<Self> {
        let mut mapping = resolve(defaults, user_rules, &records.columns)?;
        if let Some(previous) = &previous_year {
            mapping.extend_previous_year(&previous.columns);
        }

        Ok(Self {
            records,
            previous_year,
            template_root,
            output_root,
            languages: normalize_languages(languages),
            mapping,
            options,
        })
    }
}

/// One unit of work: render `template` for `record` in `language`.
#[derive(Debug, Clone)]
pub struct GenerationJob {
    /// Position in plan order; progress is reported in this order.
    pub index: usize,
    pub language: String,
    pub template: PathBuf,
    pub record: Arc<Record>,
    pub previous_year: Option<Arc<Record>>,
    /// Output path relative to the run directory, unique within the plan.
    pub destination: PathBuf,
}

impl GenerationJob {
    pub fn template_name(&self) -> String {
        file_label(self.template.file_name())
    }

    pub fn template_stem(&self) -> String {
        file_label(self.template.file_stem())
    }
}

/// Ordered job list for one run.
#[derive(Debug, Clone, Default)]
pub struct JobPlan {
    pub jobs: Vec<GenerationJob>,
    /// Selected languages that produced at least one job candidate.
    pub languages: Vec<String>,
    /// Selected languages with no templates under the root.
    pub missing_languages: Vec<String>,
    /// Job candidates dropped by the row filters.
    pub filtered: usize,
}

impl JobPlan {
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

fn require_path(path: &Path, name: &'static str) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(PlanError::MissingPath(name));
    }
    Ok(())
}

/// Upper-case, trim and de-duplicate while keeping the first occurrence.
fn normalize_languages(languages: &[String]) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(languages.len());
    for language in languages {
        let code = language.trim().to_uppercase();
        if !code.is_empty() && !normalized.contains(&code) {
            normalized.push(code);
        }
    }
    normalized
}

fn file_label(name: Option<&OsStr>) -> String {
    name.map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
