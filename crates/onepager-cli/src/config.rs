use std::path::Path;

use onepager_core::MappingRule;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Optional settings file. Every field can be overridden on the command
/// line; `mappings` are applied before `--map` flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub languages: Vec<String>,
    pub workers: Option<usize>,
    pub join_key: Option<String>,
    pub apply_row_filters: Option<bool>,
    pub date_format: Option<String>,
    pub mappings: Vec<MappingRule>,
}

impl ConfigFile {
    pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }
}

pub fn load_config(path: &Path) -> Result<ConfigFile, ConfigError> {
    let label = path.display().to_string();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: label.clone(),
        source,
    })?;
    ConfigFile::parse(&content).map_err(|source| ConfigError::Parse {
        path: label,
        source,
    })
}

/// `--map` value of the form `source=tag`. Splits on the first `=`, so the
/// tag may itself contain one.
pub fn parse_mapping_flag(raw: &str) -> Result<MappingRule, String> {
    let (source, tag) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected SOURCE=TAG, got `{raw}`"))?;
    let source = source.trim();
    let tag = tag.trim();
    if source.is_empty() || tag.is_empty() {
        return Err(format!("source and tag must both be non-empty in `{raw}`"));
    }
    Ok(MappingRule::new(source, tag))
}

/// File rules first, then flag rules, so flags win on equal sources.
pub fn merge_rules(file: &[MappingRule], flags: &[MappingRule]) -> Vec<MappingRule> {
    file.iter().chain(flags).cloned().collect()
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn parses_full_config() {
        let config = ConfigFile::parse(
            r#"
languages = ["FR", "en"]
workers = 3
join_key = "Client"
apply_row_filters = true
date_format = "%Y-%m-%d"

[[mappings]]
source = "Score"
tag = "<<SCORE>>"

[[mappings]]
source = "@date"
tag = "<<TODAY>>"
"#,
        )
        .expect("parse");

        assert_eq!(config.languages, vec!["FR", "en"]);
        assert_eq!(config.workers, Some(3));
        assert_eq!(config.join_key.as_deref(), Some("Client"));
        assert_eq!(config.apply_row_filters, Some(true));
        assert_eq!(config.date_format.as_deref(), Some("%Y-%m-%d"));
        assert_eq!(
            config.mappings,
            vec![
                MappingRule::new("Score", "<<SCORE>>"),
                MappingRule::new("@date", "<<TODAY>>"),
            ]
        );
    }

    #[test]
    fn empty_config_uses_defaults() {
        assert_eq!(ConfigFile::parse("").expect("parse"), ConfigFile::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(ConfigFile::parse("threads = 4").is_err());
    }

    #[test]
    fn load_reports_path_on_parse_error() {
        let mut path = std::env::temp_dir();
        path.push(format!("onepager_config_{}.toml", uuid::Uuid::new_v4()));
        fs::write(&path, "workers = \"many\"").expect("write config");

        let err = load_config(&path).expect_err("invalid config");
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains(&path.display().to_string()));

        fs::remove_file(&path).ok();
    }

    #[test]
    fn mapping_flag_splits_on_first_equals() {
        assert_eq!(
            parse_mapping_flag("Score=<<SCORE>>"),
            Ok(MappingRule::new("Score", "<<SCORE>>"))
        );
        assert_eq!(
            parse_mapping_flag("a=b=c"),
            Ok(MappingRule::new("a", "b=c"))
        );
        assert!(parse_mapping_flag("no-separator").is_err());
        assert!(parse_mapping_flag("=<<TAG>>").is_err());
    }

    #[test]
    fn flag_rules_follow_file_rules() {
        let file = vec![MappingRule::new("Score", "<<FILE>>")];
        let flags = vec![MappingRule::new("Score", "<<FLAG>>")];
        let merged = merge_rules(&file, &flags);
        assert_eq!(merged.last(), Some(&MappingRule::new("Score", "<<FLAG>>")));
    }
}
