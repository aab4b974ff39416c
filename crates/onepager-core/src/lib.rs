//! Core contracts and helpers for onepager.
//!
//! This crate defines the record-set model, template discovery, the
//! column-to-placeholder mapping rules, and the validation probes shared by
//! the planner, the generation engine and the CLI.

pub mod error;
pub mod mapping;
pub mod probe;
pub mod records;
pub mod templates;

pub use error::{Error, MappingError, Result};
pub use mapping::{
    EffectiveMapping, MappingRule, PREVIOUS_YEAR_PREFIX, ReservedToken, ResolvedRule, RuleOrigin,
    default_rules, fallback_tag, previous_year_tag, resolve,
};
pub use probe::{ProbeField, ProbeStatus, ProbeToken, ProbeTracker, probe_record_source, probe_templates};
pub use records::{Record, RecordSet, clean_value, load_record_set, preview_record_set};
pub use templates::{TEMPLATE_EXTENSION, TemplateSet, available_languages, scan_templates};
