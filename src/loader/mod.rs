//! YAML Loader module
//!
//! Parse parser definitions from YAML files.
//!
//! # Overview
//!
//! The loader module provides:
//! - `ParserDefinition` - Declarative entities, followers and settings
//! - Conversion into `EntityGraph`, `ParserSettings` and `HttpFetcherConfig`
//! - YAML parsing with validation
//!
//! # Example
//!
//! ```yaml
//! name: fuel-stations
//! settings:
//!   nesting: join
//! paginator:
//!   fields:
//!     - { name: next_page, path: links.next }
//! entities:
//!   - name: Station
//!     record_path: stations
//!     fields: [id, name, { name: fuel_url, path: links.fuel }]
//!     followers:
//!       - link_field: fuel_url
//!         entities:
//!           - name: Fuel
//!             record_path: fuels
//!             fields: [kind, price]
//! ```

mod parser;
mod types;

pub use parser::{load_definition, load_definition_from_str};
pub use types::{
    DownloadDefinition, EntityDef, FieldDef, FilterDef, FollowerDef, HttpDefinition,
    PaginatorDefinition, ParserDefinition, SettingsDefinition,
};

#[cfg(test)]
mod tests;
