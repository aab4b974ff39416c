use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// One row of a record source, keyed by column name.
pub type Record = BTreeMap<String, String>;

/// Ordered column names plus ordered rows, one row per client.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    pub columns: Vec<String>,
    pub rows: Vec<Record>,
}

impl RecordSet {
    pub fn new(columns: Vec<String>, rows: Vec<Record>) -> Self {
        Self { columns, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|column| column == name)
    }

    /// Index rows by the value of `key`. The first row wins on duplicates and
    /// rows with an empty or missing key are left out.
    pub fn index_by(&self, key: &str) -> HashMap<String, usize> {
        let mut index = HashMap::new();
        for (position, row) in self.rows.iter().enumerate() {
            if let Some(value) = row.get(key).filter(|value| !value.is_empty()) {
                index.entry(value.clone()).or_insert(position);
            }
        }
        index
    }
}

/// Normalize a raw cell value.
///
/// Blank and "not available" markers collapse to an empty string; integral
/// numbers such as `10.0` are printed without their fractional part.
pub fn clean_value(raw: &str) -> String {
    let value = raw.trim();
    let lower = value.to_lowercase();
    if matches!(
        lower.as_str(),
        "" | "#n/a" | "null" | "none" | "nan" | "n.a" | "na"
    ) {
        return String::new();
    }

    if value.parse::<i64>().is_ok() {
        return value.to_string();
    }
    if let Some((integer, fraction)) = value.split_once('.') {
        if !fraction.is_empty() && fraction.bytes().all(|digit| digit == b'0') {
            if let Ok(number) = integer.parse::<i64>() {
                return number.to_string();
            }
        }
    }
    if let Ok(number) = value.parse::<f64>() {
        if number.is_finite() && number.fract() == 0.0 && number.abs() < i64::MAX as f64 {
            return (number as i64).to_string();
        }
    }

    value.to_string()
}

/// Load every row of a delimited record source.
pub fn load_record_set(path: &Path) -> Result<RecordSet> {
    read_record_set(path, None)
}

/// Load at most `limit` rows of a delimited record source.
pub fn preview_record_set(path: &Path, limit: usize) -> Result<RecordSet> {
    read_record_set(path, Some(limit))
}

fn read_record_set(path: &Path, limit: Option<usize>) -> Result<RecordSet> {
    let delimiter = detect_delimiter(path)?;
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .flexible(false)
        .from_path(path)?;

    let columns: Vec<String> = reader
        .headers()?
        .iter()
        .map(|header| header.trim().to_string())
        .collect();
    if columns.iter().all(|column| column.is_empty()) {
        return Err(Error::InvalidRecordSource(format!(
            "no header row in {}",
            path.display()
        )));
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        if limit.is_some_and(|limit| rows.len() >= limit) {
            break;
        }
        let record = result?;
        let row: Record = columns
            .iter()
            .zip(record.iter())
            .map(|(column, field)| (column.clone(), clean_value(field)))
            .collect();
        rows.push(row);
    }

    tracing::debug!(
        path = %path.display(),
        columns = columns.len(),
        rows = rows.len(),
        delimiter = %(delimiter as char),
        "record source loaded"
    );

    Ok(RecordSet { columns, rows })
}

/// Semicolon when the header line contains one, comma otherwise.
fn detect_delimiter(path: &Path) -> Result<u8> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut first_line = String::new();
    reader.read_line(&mut first_line)?;
    Ok(if first_line.contains(';') { b';' } else { b',' })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_value_collapses_integral_numbers() {
        assert_eq!(clean_value("10"), "10");
        assert_eq!(clean_value("10.0"), "10");
        assert_eq!(clean_value("42.000000"), "42");
        assert_eq!(clean_value("  10.0  "), "10");
        assert_eq!(clean_value("1e3"), "1000");
    }

    #[test]
    fn clean_value_keeps_long_integers_exact() {
        assert_eq!(clean_value("12345678901234567"), "12345678901234567");
        assert_eq!(clean_value("12345678901234567.00"), "12345678901234567");
        assert_eq!(clean_value("0042"), "0042");
    }

    #[test]
    fn clean_value_keeps_fractions_and_text() {
        assert_eq!(clean_value("10.5"), "10.5");
        assert_eq!(clean_value("0.001"), "0.001");
        assert_eq!(clean_value("123 Street"), "123 Street");
        assert_eq!(clean_value("01/01/2026"), "01/01/2026");
    }

    #[test]
    fn clean_value_blanks_missing_markers() {
        for marker in ["", "nan", "NaN", "#N/A", "NULL", "None", "n.a", "NA", "  nan  "] {
            assert_eq!(clean_value(marker), "", "marker {marker:?}");
        }
    }

    #[test]
    fn index_by_keeps_first_occurrence() {
        let row = |name: &str, score: &str| {
            Record::from([
                ("client".to_string(), name.to_string()),
                ("score".to_string(), score.to_string()),
            ])
        };
        let set = RecordSet::new(
            vec!["client".to_string(), "score".to_string()],
            vec![row("Acme", "1"), row("Globex", "2"), row("Acme", "3"), row("", "4")],
        );

        let index = set.index_by("client");
        assert_eq!(index.len(), 2);
        assert_eq!(index.get("Acme"), Some(&0));
        assert_eq!(index.get("Globex"), Some(&1));
    }
}
