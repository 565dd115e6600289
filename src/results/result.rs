//! Per-entity result
//!
//! Holds the headers, rows and linked data extracted for one entity.

use super::join;
use super::nesting::NestedRow;
use super::record::Record;
use super::results::Results;
use crate::error::{Error, Result};
use crate::types::{EmptyJoin, Row};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Rows extracted for one entity
///
/// Every row holds exactly `headers().len()` values. Rows are only ever
/// appended; a row and its linked data are published together.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityResult {
    entity_name: String,
    headers: Arc<[String]>,
    rows: Vec<Row>,
    /// Child results produced by following links on a row
    linked_field_data: BTreeMap<usize, Results>,
    /// Child results attached by `link`
    linked_entity_data: BTreeMap<usize, Results>,
}

impl EntityResult {
    /// Create an empty result with the given headers
    pub fn new(entity_name: impl Into<String>, headers: Vec<String>) -> Self {
        Self {
            entity_name: entity_name.into(),
            headers: headers.into(),
            rows: Vec::new(),
            linked_field_data: BTreeMap::new(),
            linked_entity_data: BTreeMap::new(),
        }
    }

    /// Create a result from existing rows
    pub fn with_rows(
        entity_name: impl Into<String>,
        headers: Vec<String>,
        rows: Vec<Row>,
    ) -> Result<Self> {
        let mut result = Self::new(entity_name, headers);
        for row in rows {
            result.push_row(row)?;
        }
        Ok(result)
    }

    /// Name of the entity these rows belong to
    pub fn entity_name(&self) -> &str {
        &self.entity_name
    }

    /// Field names, in row order
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    pub(crate) fn shared_headers(&self) -> Arc<[String]> {
        Arc::clone(&self.headers)
    }

    /// All rows, in extraction order
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Row at an index
    pub fn row(&self, index: usize) -> Option<&Row> {
        self.rows.get(index)
    }

    /// Row at an index as a record
    pub fn record(&self, index: usize) -> Option<Record> {
        self.rows
            .get(index)
            .map(|row| Record::new(self.shared_headers(), row.clone()))
    }

    /// Iterate rows as records
    pub fn records(&self) -> impl Iterator<Item = Record> + '_ {
        self.rows
            .iter()
            .map(|row| Record::new(self.shared_headers(), row.clone()))
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether there are no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a field in the headers
    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == field)
    }

    /// Values of one field across all rows
    pub fn column(&self, field: &str) -> Result<Vec<Option<&str>>> {
        let index = self
            .field_index(field)
            .ok_or_else(|| Error::unknown_field(&self.entity_name, field))?;
        Ok(self.rows.iter().map(|row| row[index].as_deref()).collect())
    }

    /// Append a row, returning its index
    pub fn push_row(&mut self, row: Row) -> Result<usize> {
        self.check_width(&row)?;
        self.rows.push(row);
        Ok(self.rows.len() - 1)
    }

    /// Append the output of nesting one parent row
    ///
    /// Either every row is appended or none is. The child results are
    /// attached once, to the first row of the group.
    pub fn push_nested(&mut self, nested: NestedRow) -> Result<()> {
        for row in &nested.rows {
            self.check_width(row)?;
        }

        let NestedRow { rows, linked } = nested;
        let first = self.rows.len();
        let count = rows.len();
        self.rows.extend(rows);
        if count > 0 && !linked.is_empty() {
            self.linked_field_data.insert(first, linked);
        }
        Ok(())
    }

    /// Child results produced by following links on a row
    pub fn linked_field_data(&self, row: usize) -> Option<&Results> {
        self.linked_field_data.get(&row)
    }

    /// Child results attached to a row by `link`
    pub fn linked_entity_data(&self, row: usize) -> Option<&Results> {
        self.linked_entity_data.get(&row)
    }

    pub(crate) fn attach_linked_entity(
        &mut self,
        row: usize,
        name: &str,
        result: EntityResult,
    ) -> Result<()> {
        self.linked_entity_data
            .entry(row)
            .or_default()
            .put(name, result)?;
        Ok(())
    }

    /// Append all rows of another result with the same headers
    pub fn append(&mut self, other: EntityResult) -> Result<()> {
        if self.headers != other.headers {
            return Err(Error::config(format!(
                "Cannot append rows of '{}' to '{}': headers differ",
                other.entity_name, self.entity_name
            )));
        }

        let offset = self.rows.len();
        self.rows.extend(other.rows);
        self.linked_field_data.extend(
            other
                .linked_field_data
                .into_iter()
                .map(|(i, r)| (i + offset, r)),
        );
        self.linked_entity_data.extend(
            other
                .linked_entity_data
                .into_iter()
                .map(|(i, r)| (i + offset, r)),
        );
        Ok(())
    }

    /// Join rows of `other` into a new result
    ///
    /// Rows match when the values of `fields` are equal on both sides. When
    /// `fields` is empty every field name the two results share is used.
    /// A master row matching several rows produces one output row per
    /// match; a master row matching none is handled by `policy`.
    pub fn join(
        &self,
        other: &EntityResult,
        fields: &[&str],
        policy: EmptyJoin,
    ) -> Result<EntityResult> {
        join::join(self, other, fields, policy)
    }

    /// Link matching rows of `other` to each row of this result
    ///
    /// Matched rows become available through `linked_entity_data`.
    pub fn link(&mut self, other: &EntityResult, fields: &[&str]) -> Result<()> {
        join::link(self, other, fields)
    }

    /// Consume the result, returning its rows
    pub fn into_rows(self) -> Vec<Row> {
        self.rows
    }

    fn check_width(&self, row: &Row) -> Result<()> {
        if row.len() == self.headers.len() {
            Ok(())
        } else {
            Err(Error::RowWidth {
                entity: self.entity_name.clone(),
                expected: self.headers.len(),
                actual: row.len(),
            })
        }
    }
}
