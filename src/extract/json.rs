//! JSON extractor
//!
//! Selects records with a dot path (or JSONPath when wildcards are used) and
//! reads each field relative to its record.

use super::types::{EntitySelector, Extractor};
use crate::error::{Error, Result};
use crate::fetch::Document;
use crate::types::Row;
use serde_json::Value;
use tracing::debug;

/// Extracts rows from JSON documents
#[derive(Debug, Clone)]
pub struct JsonExtractor {
    /// Turn empty strings into missing values
    empty_as_null: bool,
}

impl Default for JsonExtractor {
    fn default() -> Self {
        Self {
            empty_as_null: true,
        }
    }
}

impl JsonExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep empty strings as values instead of treating them as missing
    #[must_use]
    pub fn keep_empty_strings(mut self) -> Self {
        self.empty_as_null = false;
        self
    }

    fn row(&self, record: &Value, selector: &EntitySelector) -> Result<Row> {
        selector
            .fields
            .iter()
            .map(|field| Ok(field_value(record, &field.path)?.and_then(|v| self.cell(&v))))
            .collect()
    }

    fn cell(&self, value: &Value) -> Option<String> {
        let text = match value {
            Value::Null => return None,
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            other => other.to_string(),
        };
        if self.empty_as_null && text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

impl Extractor for JsonExtractor {
    fn extract(&self, document: &Document, selectors: &[EntitySelector]) -> Result<Vec<Vec<Row>>> {
        let value: Value = serde_json::from_str(&document.content).map_err(|e| {
            Error::extract(format!("Failed to parse JSON from {}: {e}", document.url))
        })?;

        let mut out = Vec::with_capacity(selectors.len());
        for selector in selectors {
            let records = select_records(&value, selector.record_path.as_deref())?;
            let rows = records
                .iter()
                .map(|record| self.row(record, selector))
                .collect::<Result<Vec<_>>>()?;

            debug!(
                entity = %selector.name,
                url = %document.url,
                rows = rows.len(),
                "Extracted rows"
            );
            out.push(rows);
        }
        Ok(out)
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn uses_jsonpath(path: &str) -> bool {
    (path.contains('*') || path.contains("..")) && !path.contains("[-")
}

/// Records selected by `path`; the whole document when no path is given
fn select_records(value: &Value, path: Option<&str>) -> Result<Vec<Value>> {
    match path {
        Some(path) if uses_jsonpath(path) => extract_with_jsonpath(value, path),
        Some(path) => match extract_simple_path(value, path) {
            Some(Value::Array(arr)) => Ok(arr),
            Some(Value::Null) | None => Ok(vec![]),
            Some(v) => Ok(vec![v]),
        },
        None => match value {
            Value::Array(arr) => Ok(arr.clone()),
            _ => Ok(vec![value.clone()]),
        },
    }
}

/// Value of a field relative to its record. `.` or an empty path is the record itself.
fn field_value(record: &Value, path: &str) -> Result<Option<Value>> {
    if path.is_empty() || path == "." || path == "$" {
        return Ok(Some(record.clone()));
    }
    if uses_jsonpath(path) {
        return Ok(extract_with_jsonpath(record, path)?.into_iter().next());
    }
    Ok(extract_simple_path(record, path))
}

/// Extract a value using simple dot-notation path
fn extract_simple_path(value: &Value, path: &str) -> Option<Value> {
    let path = path.strip_prefix("$.").unwrap_or(path);

    let mut current = value;
    for part in path.split('.') {
        // "items[0]", "items[-1]" or "[2]"
        if let Some(bracket_pos) = part.find('[') {
            let name = &part[..bracket_pos];
            let index_str = part[bracket_pos + 1..].strip_suffix(']')?;

            if !name.is_empty() {
                current = current.get(name)?;
            }

            let index = index_str.parse::<i64>().ok()?;
            let Value::Array(arr) = current else {
                return None;
            };
            #[allow(
                clippy::cast_possible_truncation,
                clippy::cast_sign_loss,
                clippy::cast_possible_wrap
            )]
            let idx = if index < 0 {
                let from_end = arr.len() as i64 + index;
                if from_end < 0 {
                    return None;
                }
                from_end as usize
            } else {
                index as usize
            };
            current = arr.get(idx)?;
        } else {
            current = current.get(part)?;
        }
    }

    Some(current.clone())
}

/// Extract values using jsonpath-rust
fn extract_with_jsonpath(value: &Value, path: &str) -> Result<Vec<Value>> {
    use jsonpath_rust::JsonPath;

    let path = if path.starts_with('$') {
        path.to_string()
    } else {
        format!("$.{path}")
    };

    let jp = JsonPath::try_from(path.as_str()).map_err(|e| Error::JsonPath {
        message: format!("Invalid JSONPath '{path}': {e}"),
    })?;

    match jp.find(value) {
        Value::Array(arr) => Ok(arr),
        Value::Null => Ok(vec![]),
        other => Ok(vec![other]),
    }
}
