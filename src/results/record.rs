//! Record type
//!
//! A row together with the headers it was extracted with.

use crate::types::Row;
use std::collections::BTreeMap;
use std::sync::Arc;

/// One extracted row with named access to its values
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    headers: Arc<[String]>,
    values: Row,
}

impl Record {
    /// Create a record. Callers guarantee `values.len() == headers.len()`.
    pub(crate) fn new(headers: Arc<[String]>, values: Row) -> Self {
        Self { headers, values }
    }

    /// Field names, in row order
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Raw values, in header order
    pub fn values(&self) -> &[Option<String>] {
        &self.values
    }

    /// Value of the first field with the given name
    pub fn get(&self, field: &str) -> Option<&str> {
        self.headers
            .iter()
            .position(|h| h == field)
            .and_then(|i| self.values.get(i))
            .and_then(Option::as_deref)
    }

    /// Value at a position
    pub fn get_index(&self, index: usize) -> Option<&str> {
        self.values.get(index).and_then(|v| v.as_deref())
    }

    /// Number of values
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the record has no values
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Field name to value map, skipping missing values
    pub fn to_map(&self) -> BTreeMap<String, String> {
        self.headers
            .iter()
            .zip(&self.values)
            .filter_map(|(h, v)| v.as_ref().map(|v| (h.clone(), v.clone())))
            .collect()
    }

    /// Consume the record, returning its values
    pub fn into_values(self) -> Row {
        self.values
    }
}
