use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Extension of the slide templates the default renderer understands.
pub const TEMPLATE_EXTENSION: &str = "pptx";

/// Prefix Office uses for lock files next to an open document.
const LOCK_FILE_PREFIX: &str = "~$";

/// Template files discovered under a templates root, grouped by language.
///
/// Language codes are upper-case and unique. Languages without any template
/// are never present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TemplateSet {
    languages: BTreeMap<String, Vec<PathBuf>>,
}

impl TemplateSet {
    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
    }

    /// Language codes in discovery order.
    pub fn languages(&self) -> Vec<String> {
        self.languages.keys().cloned().collect()
    }

    pub fn contains(&self, language: &str) -> bool {
        self.languages.contains_key(&language.to_uppercase())
    }

    /// Templates for `language` in discovery order.
    pub fn templates(&self, language: &str) -> Option<&[PathBuf]> {
        self.languages
            .get(&language.to_uppercase())
            .map(Vec::as_slice)
    }

    pub fn template_count(&self) -> usize {
        self.languages.values().map(Vec::len).sum()
    }

    fn insert(&mut self, language: String, templates: Vec<PathBuf>) {
        if !templates.is_empty() {
            self.languages.entry(language).or_default().extend(templates);
        }
    }
}

/// Discover language folders and their templates under `root`.
///
/// Every immediate subdirectory is a language code. A missing root or an
/// unreadable entry yields fewer languages rather than an error; callers
/// treat an empty result as an invalid templates root.
pub fn scan_templates(root: &Path, extension: &str) -> TemplateSet {
    let mut set = TemplateSet::default();

    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::debug!(root = %root.display(), error = %err, "templates root unreadable");
            return set;
        }
    };

    let mut language_dirs: Vec<(String, PathBuf)> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|kind| kind.is_dir()).unwrap_or(false))
        .filter_map(|entry| {
            let name = entry.file_name().to_str()?.trim().to_uppercase();
            (!name.is_empty()).then(|| (name, entry.path()))
        })
        .collect();
    language_dirs.sort();

    for (language, dir) in language_dirs {
        let templates = list_templates(&dir, extension);
        tracing::debug!(
            language = %language,
            templates = templates.len(),
            "language folder scanned"
        );
        set.insert(language, templates);
    }

    set
}

/// Upper-case language codes with at least one template under `root`.
pub fn available_languages(root: &Path, extension: &str) -> Vec<String> {
    scan_templates(root, extension).languages()
}

fn list_templates(dir: &Path, extension: &str) -> Vec<PathBuf> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };

    let mut templates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|kind| kind.is_file()).unwrap_or(false))
        .map(|entry| entry.path())
        .filter(|path| is_template(path, extension))
        .collect();
    templates.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    templates
}

fn is_template(path: &Path, extension: &str) -> bool {
    let matches_extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case(extension));
    let is_lock_file = path
        .file_name()
        .and_then(|name| name.to_str())
        .is_some_and(|name| name.starts_with(LOCK_FILE_PREFIX));
    matches_extension && !is_lock_file
}
