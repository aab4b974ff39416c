use onepager_core::{EffectiveMapping, PREVIOUS_YEAR_PREFIX, ReservedToken, RuleOrigin};
use onepager_plan::GenerationJob;

/// Values fixed once per run and shared by every job.
#[derive(Debug, Clone)]
pub struct RunTokens {
    /// Formatted run date for `@date`.
    pub date: String,
    /// Column read for `@client`.
    pub join_key: String,
}

/// Placeholder tag to replacement value, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubstitutionContext {
    entries: Vec<(String, String)>,
}

impl SubstitutionContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the value for `tag`, replacing any earlier value.
    pub fn insert(&mut self, tag: impl Into<String>, value: impl Into<String>) {
        let tag = tag.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(existing, _)| *existing == tag) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((tag, value)),
        }
    }

    fn insert_if_absent(&mut self, tag: String, value: &str) {
        if self.get(&tag).is_none() {
            self.entries.push((tag, value.to_string()));
        }
    }

    pub fn get(&self, tag: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == tag)
            .map(|(_, value)| value.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(tag, value)| (tag.as_str(), value.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Resolve every rule of `mapping` against `job`.
///
/// Rules whose source has no value for this job (a column absent from the
/// record, no previous-year match) are left out, so their tags stay in the
/// output untouched. Fallback tags also get an upper-case alias unless an
/// explicit rule already claims it.
pub fn build_context(
    job: &GenerationJob,
    mapping: &EffectiveMapping,
    tokens: &RunTokens,
) -> SubstitutionContext {
    let mut context = SubstitutionContext::new();
    let mut aliases = Vec::new();

    for rule in mapping.rules() {
        let value = if let Some(token) = ReservedToken::parse(&rule.source) {
            reserved_value(token, job, tokens)
        } else if let Some(column) = rule.source.strip_prefix(PREVIOUS_YEAR_PREFIX) {
            job.previous_year
                .as_ref()
                .and_then(|record| record.get(column))
                .cloned()
        } else {
            job.record.get(&rule.source).cloned()
        };

        let Some(value) = value else {
            continue;
        };

        if rule.origin == RuleOrigin::Fallback {
            let alias = rule.tag.to_uppercase();
            if alias != rule.tag {
                aliases.push((alias, value.clone()));
            }
        }
        context.insert(rule.tag.clone(), value);
    }

    for (alias, value) in aliases {
        context.insert_if_absent(alias, &value);
    }

    context
}

fn reserved_value(token: ReservedToken, job: &GenerationJob, tokens: &RunTokens) -> Option<String> {
    match token {
        ReservedToken::Date => Some(tokens.date.clone()),
        ReservedToken::Client => job.record.get(&tokens.join_key).cloned(),
        ReservedToken::Language => Some(job.language.clone()),
        ReservedToken::Template => Some(job.template_stem()),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Arc;

    use onepager_core::{MappingRule, Record, default_rules, resolve};

    use super::*;

    fn job(record: Record, previous_year: Option<Record>) -> GenerationJob {
        GenerationJob {
            index: 0,
            language: "FR".to_string(),
            template: PathBuf::from("/templates/FR/OnePager.pptx"),
            record: Arc::new(record),
            previous_year: previous_year.map(Arc::new),
            destination: PathBuf::from("FR/out.pptx"),
        }
    }

    fn record(pairs: &[(&str, &str)]) -> Record {
        pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect()
    }

    fn tokens() -> RunTokens {
        RunTokens {
            date: "17/10/2026".to_string(),
            join_key: "Nom du client".to_string(),
        }
    }

    #[test]
    fn default_rules_map_client_and_date() {
        let columns = vec!["Nom du client".to_string(), "JJ/MM/AAAA".to_string()];
        let mapping = resolve(&default_rules(), &[], &columns).expect("resolve");
        let job = job(
            record(&[("Nom du client", "Acme"), ("JJ/MM/AAAA", "01/01/2026")]),
            None,
        );

        let context = build_context(&job, &mapping, &tokens());

        assert_eq!(context.get("<<NOM CLIENT>>"), Some("Acme"));
        assert_eq!(context.get("<<[JJ/MM/AAAA]>>"), Some("01/01/2026"));
        assert_eq!(context.get("<<DATE>>"), Some("17/10/2026"));
        assert_eq!(context.get("<<#reviewsTopPOINotes1>>"), None);
    }

    #[test]
    fn fallback_tags_get_upper_case_alias() {
        let columns = vec!["Score".to_string(), "CODE".to_string()];
        let mapping = resolve(&[], &[], &columns).expect("resolve");
        let job = job(record(&[("Score", "9"), ("CODE", "X1")]), None);

        let context = build_context(&job, &mapping, &tokens());

        assert_eq!(context.get("<<Score>>"), Some("9"));
        assert_eq!(context.get("<<SCORE>>"), Some("9"));
        assert_eq!(context.get("<<CODE>>"), Some("X1"));
        assert_eq!(context.len(), 3);
    }

    #[test]
    fn explicit_tag_wins_over_alias() {
        let columns = vec!["Score".to_string(), "Other".to_string()];
        let user = vec![MappingRule::new("Other", "<<SCORE>>")];
        let mapping = resolve(&[], &user, &columns).expect("resolve");
        let job = job(record(&[("Score", "9"), ("Other", "explicit")]), None);

        let context = build_context(&job, &mapping, &tokens());

        assert_eq!(context.get("<<SCORE>>"), Some("explicit"));
    }

    #[test]
    fn reserved_and_previous_year_sources_resolve() {
        let columns = vec!["Nom du client".to_string(), "Score".to_string()];
        let user = vec![
            MappingRule::new("@client", "<<CLIENT>>"),
            MappingRule::new("@language", "<<LANG>>"),
            MappingRule::new("@template", "<<TEMPLATE>>"),
        ];
        let mut mapping = resolve(&[], &user, &columns).expect("resolve");
        mapping.extend_previous_year(&["Score".to_string()]);

        let current = record(&[("Nom du client", "Acme"), ("Score", "9")]);
        let previous = record(&[("Nom du client", "Acme"), ("Score", "5")]);
        let with_previous = build_context(&job(current.clone(), Some(previous)), &mapping, &tokens());

        assert_eq!(with_previous.get("<<CLIENT>>"), Some("Acme"));
        assert_eq!(with_previous.get("<<LANG>>"), Some("FR"));
        assert_eq!(with_previous.get("<<TEMPLATE>>"), Some("OnePager"));
        assert_eq!(with_previous.get("<<PY Score>>"), Some("5"));

        let without_previous = build_context(&job(current, None), &mapping, &tokens());
        assert_eq!(without_previous.get("<<PY Score>>"), None);
    }
}
