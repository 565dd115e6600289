// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::ref_option)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # entity-harvest
//!
//! Extracts declared entities from paginated documents, follows the links
//! found in their fields and nests the rows of the linked documents into
//! their parents.
//!
//! ## Features
//!
//! - **Entity graphs**: entities with fields, record paths, filters and
//!   followers, nested to any depth
//! - **Nesting**: `join`, `replace_join`, `link` and `replace_link`
//! - **Pagination**: next page links or tokens, page numbers, page size,
//!   follow limits and URL testing
//! - **Link following**: bounded worker pool, per-host request spacing,
//!   adaptive throttling, per-follower error policy
//! - **Results**: case-insensitive store with joins and links across
//!   entities
//! - **Output**: JSON, Arrow RecordBatches and Parquet
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use entity_harvest::{load_definition, EntityParser, JsonExtractor, Request};
//! use entity_harvest::http::HttpFetcher;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> entity_harvest::Result<()> {
//!     let def = load_definition("stations.yaml")?;
//!     let parser = EntityParser::new(
//!         &def.entity_graph()?,
//!         def.parser_settings(),
//!         Arc::new(HttpFetcher::with_config(def.http_config())?),
//!         Arc::new(JsonExtractor::new()),
//!     )?;
//!
//!     let results = parser.parse_all(Request::parse("https://example.com/stations")?).await?;
//!     for record in results.get("station")?.records() {
//!         println!("{:?}", record.to_map());
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         EntityParser                            │
//! │   parse(request, processors) → ParseStats                       │
//! │   parse_all(request) → Results                                  │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌──────────┬───────────┬───────┴───────┬───────────┬─────────────┐
//! │  Fetch   │  Extract  │   Paginate    │  Follow   │   Results   │
//! ├──────────┼───────────┼───────────────┼───────────┼─────────────┤
//! │ HTTP     │ JSON path │ Next page     │ Pool      │ Nesting     │
//! │ File     │ JSONPath  │ Page number   │ Host gap  │ Join / Link │
//! │ Memory   │ Filters   │ Page size     │ Throttle  │ Output      │
//! └──────────┴───────────┴───────────────┴───────────┴─────────────┘
//! ```

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types
pub mod error;

/// Common types and type aliases
pub mod types;

/// Entity, field and follower declarations
pub mod entity;

/// Row extraction from fetched documents
pub mod extract;

/// Requests, documents and fetchers
pub mod fetch;

/// Link following, worker pool and throttling
pub mod follow;

/// HTTP fetcher with retry and rate limiting
pub mod http;

/// Pagination state machine
pub mod pagination;

/// Parse loop and row processors
pub mod parser;

/// Result store, nesting and joins
pub mod results;

/// File name patterns for downloads
pub mod template;

/// YAML loader for parser definitions
pub mod loader;

/// Arrow/Parquet and JSON output
pub mod output;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

// Re-export commonly used types
pub use entity::{EntityDefinition, EntityGraph, FollowerDefinition};
pub use extract::JsonExtractor;
pub use fetch::{Document, Fetcher, Request};
pub use loader::{load_definition, load_definition_from_str, ParserDefinition};
pub use parser::{EntityParser, ParseStats, ParserSettings, Processors};
pub use results::{EntityResult, Record, Results};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");
