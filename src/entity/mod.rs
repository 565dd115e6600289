//! Entity module
//!
//! Declares the entities a parser extracts and the links followed from them.
//!
//! # Example
//!
//! ```rust
//! use entity_harvest::entity::{EntityDefinition, EntityGraph, FollowerDefinition, ResolvedOptions};
//! use entity_harvest::types::Nesting;
//!
//! let mut graph = EntityGraph::new();
//! graph.add_entity(
//!     EntityDefinition::new("Station")
//!         .with_record_path("stations")
//!         .with_field("name", "name")
//!         .with_field("fuel_url", "links.fuel")
//!         .with_follower(
//!             FollowerDefinition::new("fuel_url")
//!                 .with_nesting(Nesting::ReplaceJoin)
//!                 .with_entity(
//!                     EntityDefinition::new("Fuel")
//!                         .with_record_path("prices")
//!                         .with_field("kind", "kind")
//!                         .with_field("price", "price"),
//!                 ),
//!         ),
//! );
//!
//! let resolved = graph.resolve(&ResolvedOptions::default()).unwrap();
//! assert_eq!(resolved[0].output_headers(), ["name", "kind", "price"]);
//! ```

mod graph;
mod types;

pub use graph::{describe, EntityGraph, ResolvedEntity, ResolvedFollower};
pub use types::{EntityDefinition, FieldDefinition, FollowerDefinition, ResolvedOptions};
