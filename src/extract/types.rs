//! Extractor types and traits
//!
//! Defines the extraction and filtering abstractions.

use crate::entity::FieldDefinition;
use crate::error::Result;
use crate::fetch::Document;
use crate::results::Record;
use crate::types::Row;
use regex::Regex;
use url::Url;

/// What to extract for one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySelector {
    /// Entity name
    pub name: String,
    /// Path selecting the entity's records; the whole document when absent
    pub record_path: Option<String>,
    /// Fields read from each record, in column order
    pub fields: Vec<FieldDefinition>,
}

/// Trait for turning a document into rows
pub trait Extractor: Send + Sync {
    /// Extract rows for every selector
    ///
    /// Returns one row list per selector, in selector order. Every row holds
    /// one value per selector field.
    fn extract(&self, document: &Document, selectors: &[EntitySelector]) -> Result<Vec<Vec<Row>>>;
}

// ============================================================================
// Record Filters
// ============================================================================

/// Where a record being filtered came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterContext {
    /// Entity the record belongs to
    pub entity: String,
    /// Document the record was extracted from
    pub url: Url,
    /// Page number of the top-level document, starting at 1
    pub page_number: u32,
    /// 0 for top-level entities, +1 per followed link
    pub depth: usize,
}

/// Trait for discarding records before they are nested or followed
pub trait RecordFilter: Send + Sync {
    /// Whether the record is kept
    fn accept(&self, record: &Record, context: &FilterContext) -> bool;
}

impl<F> RecordFilter for F
where
    F: Fn(&Record, &FilterContext) -> bool + Send + Sync,
{
    fn accept(&self, record: &Record, context: &FilterContext) -> bool {
        self(record, context)
    }
}

/// Keeps records that have a value for every listed field
#[derive(Debug, Clone)]
pub struct RequiredFields {
    fields: Vec<String>,
}

impl RequiredFields {
    pub fn new<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
        }
    }
}

impl RecordFilter for RequiredFields {
    fn accept(&self, record: &Record, _context: &FilterContext) -> bool {
        self.fields
            .iter()
            .all(|f| record.get(f).is_some_and(|v| !v.trim().is_empty()))
    }
}

/// Keeps records whose field value matches a regular expression
#[derive(Debug, Clone)]
pub struct FieldMatches {
    field: String,
    pattern: Regex,
}

impl FieldMatches {
    pub fn new(field: impl Into<String>, pattern: &str) -> Result<Self> {
        let pattern = Regex::new(pattern).map_err(|e| {
            crate::error::Error::invalid_value("filter.pattern", e.to_string())
        })?;
        Ok(Self {
            field: field.into(),
            pattern,
        })
    }
}

impl RecordFilter for FieldMatches {
    fn accept(&self, record: &Record, _context: &FilterContext) -> bool {
        record
            .get(&self.field)
            .is_some_and(|v| self.pattern.is_match(v))
    }
}
