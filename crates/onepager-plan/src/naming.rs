//! Destination naming for generated files.
//!
//! Layout: `<LANG>/<client>_<org id>/<date>_<org id>_<client>_<template stem>.<ext>`,
//! relative to the run directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use onepager_core::Record;

pub const CLIENT_COLUMN: &str = "Nom du client";
pub const ORG_ID_COLUMN: &str = "Org ID";
pub const DATE_COLUMN: &str = "JJ/MM/AAAA";

const UNKNOWN_CLIENT: &str = "Unknown";
const UNKNOWN_ORG_ID: &str = "000";
const UNKNOWN_DATE: &str = "00-00-0000";

/// Strip characters that are not allowed in Windows file names.
pub fn sanitize_component(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '\\' | '/' | '*' | '?' | ':' | '"' | '<' | '>' | '|'))
        .collect::<String>()
        .trim()
        .to_string()
}

fn field_or(record: &Record, column: &str, fallback: &str) -> String {
    record
        .get(column)
        .map(|value| sanitize_component(value))
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

fn date_component(record: &Record) -> String {
    record
        .get(DATE_COLUMN)
        .map(|value| sanitize_component(&value.replace('/', "-")))
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| UNKNOWN_DATE.to_string())
}

/// Relative destination for `template` rendered with `record`.
pub fn destination_for(language: &str, template: &Path, record: &Record) -> PathBuf {
    let client = field_or(record, CLIENT_COLUMN, UNKNOWN_CLIENT);
    let org_id = field_or(record, ORG_ID_COLUMN, UNKNOWN_ORG_ID);
    let date = date_component(record);
    let stem = template
        .file_stem()
        .map(|stem| sanitize_component(&stem.to_string_lossy()))
        .unwrap_or_default();
    let extension = template
        .extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .unwrap_or_default();

    let mut file_name = format!("{date}_{org_id}_{client}_{stem}");
    if !extension.is_empty() {
        file_name.push('.');
        file_name.push_str(&extension);
    }

    PathBuf::from(sanitize_component(language))
        .join(format!("{client}_{org_id}"))
        .join(file_name)
}

/// Hands out destinations that are unique within one plan.
#[derive(Debug, Default)]
pub struct DestinationAllocator {
    taken: HashSet<PathBuf>,
}

impl DestinationAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return `candidate`, or `candidate` with `_<n>` appended to its stem
    /// when an earlier job already claimed it.
    pub fn allocate(&mut self, candidate: PathBuf) -> PathBuf {
        if self.taken.insert(candidate.clone()) {
            return candidate;
        }

        let stem = candidate
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let extension = candidate
            .extension()
            .map(|ext| ext.to_string_lossy().into_owned());

        let mut suffix = 2;
        loop {
            let name = match &extension {
                Some(ext) => format!("{stem}_{suffix}.{ext}"),
                None => format!("{stem}_{suffix}"),
            };
            let next = candidate.with_file_name(name);
            if self.taken.insert(next.clone()) {
                return next;
            }
            suffix += 1;
        }
    }
}
