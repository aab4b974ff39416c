//! Column-to-placeholder mapping rules.
//!
//! Rules form an ordered association list keyed by source. Applying a rule
//! whose source already exists replaces the earlier rule in place, so the
//! last write wins while the original position is kept.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::MappingError;

/// Source-key prefix addressing a column of the previous-year record.
pub const PREVIOUS_YEAR_PREFIX: &str = "previous_year.";

/// A single `source -> tag` rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MappingRule {
    /// Column name, `previous_year.<column>`, or a reserved `@token`.
    pub source: String,
    /// Exact text searched for inside a template.
    pub tag: String,
}

impl MappingRule {
    pub fn new(source: impl Into<String>, tag: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            tag: tag.into(),
        }
    }
}

/// Tokens resolved by the engine rather than read from a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReservedToken {
    /// Run date, formatted once at run start.
    Date,
    /// Value of the join-key column of the record.
    Client,
    /// Language code of the job.
    Language,
    /// File stem of the job's template.
    Template,
}

impl ReservedToken {
    pub const ALL: [ReservedToken; 4] = [
        ReservedToken::Date,
        ReservedToken::Client,
        ReservedToken::Language,
        ReservedToken::Template,
    ];

    pub fn parse(source: &str) -> Option<Self> {
        match source {
            "@date" => Some(Self::Date),
            "@client" => Some(Self::Client),
            "@language" => Some(Self::Language),
            "@template" => Some(Self::Template),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Date => "@date",
            Self::Client => "@client",
            Self::Language => "@language",
            Self::Template => "@template",
        }
    }
}

/// Where a resolved rule came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOrigin {
    Default,
    User,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedRule {
    pub source: String,
    pub tag: String,
    pub origin: RuleOrigin,
}

/// The rule set used for one generation run.
///
/// Every known column has a rule, so lookups for schema columns never fail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EffectiveMapping {
    rules: Vec<ResolvedRule>,
}

impl EffectiveMapping {
    pub fn rules(&self) -> &[ResolvedRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn tag_for(&self, source: &str) -> Option<&str> {
        self.rules
            .iter()
            .find(|rule| rule.source == source)
            .map(|rule| rule.tag.as_str())
    }

    pub fn contains_source(&self, source: &str) -> bool {
        self.rules.iter().any(|rule| rule.source == source)
    }

    /// Add fallback rules for previous-year columns not mapped explicitly.
    pub fn extend_previous_year(&mut self, columns: &[String]) {
        for column in columns {
            let source = format!("{PREVIOUS_YEAR_PREFIX}{column}");
            if !self.contains_source(&source) {
                self.rules.push(ResolvedRule {
                    source,
                    tag: previous_year_tag(column),
                    origin: RuleOrigin::Fallback,
                });
            }
        }
    }

    fn upsert(&mut self, source: &str, tag: &str, origin: RuleOrigin) {
        match self.rules.iter_mut().find(|rule| rule.source == source) {
            Some(rule) => {
                rule.tag = tag.to_string();
                rule.origin = origin;
            }
            None => self.rules.push(ResolvedRule {
                source: source.to_string(),
                tag: tag.to_string(),
                origin,
            }),
        }
    }
}

/// Built-in rules for the legacy one-pager templates.
pub fn default_rules() -> Vec<MappingRule> {
    vec![
        MappingRule::new("JJ/MM/AAAA", "<<[JJ/MM/AAAA]>>"),
        MappingRule::new("Nom du client", "<<NOM CLIENT>>"),
        MappingRule::new("#reviewsFlopPOI1", "<<#reviewsFlopPOINotes1>>"),
        MappingRule::new("#reviewsFlopPOI2", "<<#reviewsFlopPOINotes2>>"),
        MappingRule::new("#reviewsTopPOI1", "<<#reviewsTopPOINotes1>>"),
        MappingRule::new("#reviewsTopPOI2", "<<#reviewsTopPOINotes2>>"),
        MappingRule::new(ReservedToken::Date.as_str(), "<<DATE>>"),
    ]
}

/// Implicit tag for a column without an explicit rule.
pub fn fallback_tag(column: &str) -> String {
    format!("<<{column}>>")
}

/// Implicit tag for a previous-year column without an explicit rule.
pub fn previous_year_tag(column: &str) -> String {
    format!("<<PY {column}>>")
}

/// Merge `defaults` with `user` rules and add fallbacks for `schema`.
///
/// User rules replace defaults with the same source; among user rules the
/// last one wins. Any schema column left unmapped gets [`fallback_tag`].
pub fn resolve(
    defaults: &[MappingRule],
    user: &[MappingRule],
    schema: &[String],
) -> Result<EffectiveMapping, MappingError> {
    for rule in user {
        if rule.source.is_empty() {
            return Err(MappingError::EmptySourceKey {
                tag: rule.tag.clone(),
            });
        }
        if rule.tag.is_empty() {
            return Err(MappingError::EmptyPlaceholderTag {
                source_key: rule.source.clone(),
            });
        }
    }

    let mut mapping = EffectiveMapping::default();
    for rule in defaults {
        mapping.upsert(&rule.source, &rule.tag, RuleOrigin::Default);
    }
    for rule in user {
        mapping.upsert(&rule.source, &rule.tag, RuleOrigin::User);
    }
    for column in schema {
        if !mapping.contains_source(column) {
            mapping.upsert(column, &fallback_tag(column), RuleOrigin::Fallback);
        }
    }

    Ok(mapping)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema(columns: &[&str]) -> Vec<String> {
        columns.iter().map(|column| column.to_string()).collect()
    }

    #[test]
    fn every_schema_column_is_mapped() {
        let columns = schema(&["Nom du client", "JJ/MM/AAAA", "Score", "Org ID"]);
        let mapping = resolve(&default_rules(), &[], &columns).expect("resolve");

        for column in &columns {
            assert!(mapping.contains_source(column), "missing {column}");
        }
        assert_eq!(mapping.tag_for("Score"), Some("<<Score>>"));
        assert_eq!(mapping.tag_for("Nom du client"), Some("<<NOM CLIENT>>"));
    }

    #[test]
    fn user_rule_overrides_default_in_place() {
        let user = vec![MappingRule::new("Nom du client", "<<CLIENT>>")];
        let mapping = resolve(&default_rules(), &user, &[]).expect("resolve");

        let position = mapping
            .rules()
            .iter()
            .position(|rule| rule.source == "Nom du client")
            .expect("rule present");
        assert_eq!(position, 1);
        assert_eq!(mapping.rules()[position].tag, "<<CLIENT>>");
        assert_eq!(mapping.rules()[position].origin, RuleOrigin::User);
    }

    #[test]
    fn last_user_rule_wins() {
        let user = vec![
            MappingRule::new("Score", "<<A>>"),
            MappingRule::new("Score", "<<B>>"),
        ];
        let mapping = resolve(&[], &user, &schema(&["Score"])).expect("resolve");
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.tag_for("Score"), Some("<<B>>"));
    }

    #[test]
    fn explicit_rule_suppresses_fallback() {
        let user = vec![MappingRule::new("ScoreVal", "<<MY_SCORE_TAG>>")];
        let mapping = resolve(&[], &user, &schema(&["ScoreVal"])).expect("resolve");
        assert_eq!(mapping.len(), 1);
        assert_eq!(mapping.tag_for("ScoreVal"), Some("<<MY_SCORE_TAG>>"));
    }

    #[test]
    fn empty_user_rules_are_rejected() {
        let err = resolve(&[], &[MappingRule::new("", "<<X>>")], &[]).unwrap_err();
        assert_eq!(
            err,
            MappingError::EmptySourceKey {
                tag: "<<X>>".to_string()
            }
        );

        let err = resolve(&[], &[MappingRule::new("Score", "")], &[]).unwrap_err();
        assert_eq!(
            err,
            MappingError::EmptyPlaceholderTag {
                source_key: "Score".to_string()
            }
        );
    }

    #[test]
    fn previous_year_columns_get_prefixed_fallbacks() {
        let user = vec![MappingRule::new("previous_year.Score", "<<LAST SCORE>>")];
        let mut mapping = resolve(&[], &user, &schema(&["Score"])).expect("resolve");
        mapping.extend_previous_year(&schema(&["Score", "Visits"]));

        assert_eq!(mapping.tag_for("previous_year.Score"), Some("<<LAST SCORE>>"));
        assert_eq!(mapping.tag_for("previous_year.Visits"), Some("<<PY Visits>>"));
    }

    #[test]
    fn reserved_tokens_round_trip() {
        for token in ReservedToken::ALL {
            assert_eq!(ReservedToken::parse(token.as_str()), Some(token));
        }
        assert_eq!(ReservedToken::parse("date"), None);
    }
}
