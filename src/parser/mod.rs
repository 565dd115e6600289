//! Parser module
//!
//! `EntityParser` walks the pages of an input, extracts every declared
//! entity, follows links, nests child rows and publishes the result either
//! to streaming processors (`parse`) or into a `Results` store
//! (`parse_all`).
//!
//! # Example
//!
//! ```rust,ignore
//! let parser = EntityParser::new(&graph, settings, fetcher, Arc::new(JsonExtractor::new()))?;
//! let results = parser.parse_all(Request::parse("https://example.com/stations")?).await?;
//! let stations = results.get("station")?;
//! ```

mod engine;
mod types;

pub use engine::EntityParser;
pub use types::{
    EntityRecords, ErrorAction, ErrorHandler, ParseStats, ParserSettings, Processors,
    RowProcessor,
};
