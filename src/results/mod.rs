//! Results module
//!
//! Stores extracted rows per entity and reconciles related entities.
//!
//! # Overview
//!
//! - `Results` - case-insensitive, insertion-ordered map of entity name to result
//! - `EntityResult` - headers, rows and per-row linked data of one entity
//! - `Record` - a row viewed together with its headers
//! - `NestingLayout` - attaches followed child rows to a parent row
//!
//! Joins and links between independently extracted entities match rows on
//! the values of fields the two entities have in common.

mod join;
mod nesting;
mod record;
mod result;
#[allow(clippy::module_inception)]
mod results;

pub use nesting::{ChildLayout, FollowerLayout, NestedRow, NestingLayout};
pub use record::Record;
pub use result::EntityResult;
pub use results::{normalize, Results};
