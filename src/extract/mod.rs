//! Extract module
//!
//! Turns fetched documents into raw rows per entity, and filters records
//! before they are nested or followed.
//!
//! # Example
//!
//! ```rust,ignore
//! let extractor = JsonExtractor::new();
//! let rows = extractor.extract(&document, &[entity.selector()])?;
//! ```

mod json;
mod types;

pub use json::JsonExtractor;
pub use types::{
    EntitySelector, Extractor, FieldMatches, FilterContext, RecordFilter, RequiredFields,
};
