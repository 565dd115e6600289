//! Common types used throughout entity-harvest
//!
//! This module contains shared type definitions, type aliases,
//! and utility types used across multiple modules.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Type Aliases
// ============================================================================

/// A single extracted row. `None` marks a missing value.
pub type Row = Vec<Option<String>>;

/// Ordered string key-value map (request params, cookies, page fields)
pub type StringMap = BTreeMap<String, String>;

// ============================================================================
// Nesting
// ============================================================================

/// How rows obtained by following a link are attached to the parent row
///
/// Given parent row `[a, b, c]` where `b` is the link field, and child rows
/// `[t, u]` and `[x, y]`:
///
/// | Nesting       | Parent output                      |
/// |---------------|------------------------------------|
/// | `Join`        | `[a, b, c, t, u]`, `[a, b, c, x, y]` |
/// | `ReplaceJoin` | `[a, c, t, u]`, `[a, c, x, y]`     |
/// | `Link`        | `[a, b, c]`                        |
/// | `ReplaceLink` | `[a, c]`                           |
///
/// Child rows stay reachable through `EntityResult::linked_field_data` in
/// every mode. When a parent expands to several joined rows the children
/// are attached to the first of them only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Nesting {
    Join,
    ReplaceJoin,
    #[default]
    Link,
    ReplaceLink,
}

impl Nesting {
    /// Whether the link field is removed from the parent row
    pub fn replaces(self) -> bool {
        matches!(self, Self::ReplaceJoin | Self::ReplaceLink)
    }

    /// Whether child values are joined into the parent row
    pub fn joins(self) -> bool {
        matches!(self, Self::Join | Self::ReplaceJoin)
    }

    /// Whether child rows are only linked to the parent row
    pub fn links(self) -> bool {
        matches!(self, Self::Link | Self::ReplaceLink)
    }
}

// ============================================================================
// Empty Join Policy
// ============================================================================

/// What a join does with a parent row whose child result has no rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyJoin {
    /// Keep the parent row, child fields are null
    #[default]
    KeepParent,
    /// Drop the parent row
    DropParent,
}

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff for retries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}
