use std::collections::HashMap;
use std::sync::Arc;

use onepager_core::{Record, TemplateSet};
use tracing::{debug, info};

use crate::errors::{PlanError, Result};
use crate::filters;
use crate::model::{GenerationJob, GenerationRequest, JobPlan};
use crate::naming::{DestinationAllocator, destination_for};

/// Expand `request` into an ordered job list.
///
/// Order is selected-language order, then template discovery order, then
/// record row order. Selected languages missing from `templates` contribute
/// no jobs; the plan only fails when nothing at all is left to run.
pub fn plan_jobs(request: &GenerationRequest, templates: &TemplateSet) -> Result<JobPlan> {
    if request.records.is_empty() {
        return Err(PlanError::NoRecords);
    }

    let mut plan = JobPlan::default();
    for language in &request.languages {
        if templates.contains(language) {
            plan.languages.push(language.clone());
        } else {
            plan.missing_languages.push(language.clone());
        }
    }

    if plan.languages.is_empty() {
        return Err(PlanError::NoLanguages {
            requested: request.languages.join(", "),
            available: templates.languages().join(", "),
        });
    }

    let records: Vec<Arc<Record>> = request
        .records
        .rows
        .iter()
        .cloned()
        .map(Arc::new)
        .collect();
    let previous_year = PreviousYearIndex::new(request);
    let mut allocator = DestinationAllocator::new();

    for language in &plan.languages {
        let language_templates = templates.templates(language).unwrap_or_default();
        for template in language_templates {
            let template_name = template
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();

            for record in &records {
                if request.options.apply_row_filters
                    && !filters::accepts(&template_name, language, record)
                {
                    plan.filtered += 1;
                    continue;
                }

                let destination = allocator.allocate(destination_for(language, template, record));
                plan.jobs.push(GenerationJob {
                    index: plan.jobs.len(),
                    language: language.clone(),
                    template: template.clone(),
                    record: Arc::clone(record),
                    previous_year: previous_year.lookup(record, &request.options.join_key),
                    destination,
                });
            }
        }

        debug!(
            language = %language,
            templates = language_templates.len(),
            "language planned"
        );
    }

    if plan.jobs.is_empty() {
        return Err(PlanError::NoJobs);
    }

    info!(
        jobs = plan.jobs.len(),
        languages = %plan.languages.join(","),
        missing_languages = %plan.missing_languages.join(","),
        filtered = plan.filtered,
        "generation planned"
    );

    Ok(plan)
}

struct PreviousYearIndex {
    rows: Vec<Arc<Record>>,
    by_key: HashMap<String, usize>,
}

impl PreviousYearIndex {
    fn new(request: &GenerationRequest) -> Self {
        match &request.previous_year {
            Some(previous) => Self {
                rows: previous.rows.iter().cloned().map(Arc::new).collect(),
                by_key: previous.index_by(&request.options.join_key),
            },
            None => Self {
                rows: Vec::new(),
                by_key: HashMap::new(),
            },
        }
    }

    fn lookup(&self, record: &Record, join_key: &str) -> Option<Arc<Record>> {
        let key = record.get(join_key)?;
        let position = self.by_key.get(key)?;
        self.rows.get(*position).cloned()
    }
}
