//! Row eligibility filters for audience-specific templates.

use onepager_core::Record;

pub const AUDIENCE_COLUMN: &str = "PM only or PM-RM";
pub const LANGUAGE_COLUMN: &str = "Language";

const SKIP_ROW: &str = "Do not generate OP";
const PM_RM: &str = "PM-RM";
const PM_ONLY: &str = "PM only";

/// Whether `record` should be rendered with `template_name` in `language`.
pub fn accepts(template_name: &str, language: &str, record: &Record) -> bool {
    audience_matches(template_name, record) && language_matches(language, record)
}

fn audience_matches(template_name: &str, record: &Record) -> bool {
    let Some(audience) = record.get(AUDIENCE_COLUMN) else {
        return true;
    };
    if audience == SKIP_ROW {
        return false;
    }

    let is_pm_rm = template_name.contains("PM_RM");
    let is_pm_only = template_name.contains("_PM_") && !is_pm_rm;
    if is_pm_rm {
        audience == PM_RM
    } else if is_pm_only {
        audience == PM_ONLY
    } else {
        true
    }
}

fn language_matches(language: &str, record: &Record) -> bool {
    match record.get(LANGUAGE_COLUMN) {
        Some(value) if !value.is_empty() => {
            value.contains(language) || value.contains(language_name(language))
        }
        _ => true,
    }
}

fn language_name(code: &str) -> &str {
    match code {
        "FR" => "French",
        "EN" => "English",
        "DE" => "German",
        "IT" => "Italian",
        "ES" => "Spanish",
        other => other,
    }
}
