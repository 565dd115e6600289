//! Entity definition types
//!
//! Mutable declarations of entities, their fields and the links followed
//! from them. Declarations are turned into immutable `ResolvedEntity`
//! values by `EntityGraph::resolve` before parsing.

use super::graph::EntityGraph;
use crate::extract::RecordFilter;
use crate::types::{Nesting, StringMap};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

// ============================================================================
// Field Definition
// ============================================================================

/// A named field and where to find its value within a record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDefinition {
    /// Column name
    pub name: String,
    /// Path of the value, relative to the record
    pub path: String,
}

impl FieldDefinition {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }

    /// Field whose path equals its name
    pub fn named(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            path: name.clone(),
            name,
        }
    }
}

// ============================================================================
// Entity Definition
// ============================================================================

/// Declaration of one entity
#[derive(Clone, Default)]
pub struct EntityDefinition {
    pub(super) name: String,
    pub(super) record_path: Option<String>,
    pub(super) fields: Vec<FieldDefinition>,
    pub(super) nesting: Option<Nesting>,
    pub(super) ignore_following_errors: Option<bool>,
    pub(super) followers: Vec<FollowerDefinition>,
    pub(super) filters: Vec<Arc<dyn RecordFilter>>,
}

impl EntityDefinition {
    /// Create an entity with no fields
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Entity name as declared
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared fields, in column order
    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn followers(&self) -> &[FollowerDefinition] {
        &self.followers
    }

    /// Set the path selecting this entity's records in a document
    #[must_use]
    pub fn with_record_path(mut self, path: impl Into<String>) -> Self {
        self.record_path = Some(path.into());
        self
    }

    /// Add a field
    #[must_use]
    pub fn with_field(mut self, name: impl Into<String>, path: impl Into<String>) -> Self {
        self.fields.push(FieldDefinition::new(name, path));
        self
    }

    /// Override the nesting of this entity's followers
    #[must_use]
    pub fn with_nesting(mut self, nesting: Nesting) -> Self {
        self.nesting = Some(nesting);
        self
    }

    /// Override whether failures following links are ignored
    #[must_use]
    pub fn with_ignore_following_errors(mut self, ignore: bool) -> Self {
        self.ignore_following_errors = Some(ignore);
        self
    }

    /// Add a follower
    #[must_use]
    pub fn with_follower(mut self, follower: FollowerDefinition) -> Self {
        self.followers.push(follower);
        self
    }

    /// Add a record filter
    #[must_use]
    pub fn with_filter(mut self, filter: impl RecordFilter + 'static) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    pub fn set_record_path(&mut self, path: impl Into<String>) -> &mut Self {
        self.record_path = Some(path.into());
        self
    }

    pub fn add_field(&mut self, name: impl Into<String>, path: impl Into<String>) -> &mut Self {
        self.fields.push(FieldDefinition::new(name, path));
        self
    }

    pub fn set_nesting(&mut self, nesting: Nesting) -> &mut Self {
        self.nesting = Some(nesting);
        self
    }

    pub fn set_ignore_following_errors(&mut self, ignore: bool) -> &mut Self {
        self.ignore_following_errors = Some(ignore);
        self
    }

    pub fn add_filter(&mut self, filter: Arc<dyn RecordFilter>) -> &mut Self {
        self.filters.push(filter);
        self
    }

    /// Follow the links found in `link_field`, returning the new follower
    pub fn follow(&mut self, link_field: impl Into<String>) -> &mut FollowerDefinition {
        self.followers.push(FollowerDefinition::new(link_field));
        let last = self.followers.len() - 1;
        &mut self.followers[last]
    }
}

impl fmt::Debug for EntityDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityDefinition")
            .field("name", &self.name)
            .field("record_path", &self.record_path)
            .field("fields", &self.fields)
            .field("nesting", &self.nesting)
            .field("ignore_following_errors", &self.ignore_following_errors)
            .field("followers", &self.followers)
            .field("filters", &self.filters.len())
            .finish()
    }
}

// ============================================================================
// Follower Definition
// ============================================================================

/// Entities extracted from the documents a link field points to
#[derive(Debug, Clone, Default)]
pub struct FollowerDefinition {
    pub(super) link_field: String,
    pub(super) base_url: Option<String>,
    pub(super) params: StringMap,
    pub(super) nesting: Option<Nesting>,
    pub(super) ignore_following_errors: Option<bool>,
    pub(super) entities: EntityGraph,
}

impl FollowerDefinition {
    pub fn new(link_field: impl Into<String>) -> Self {
        Self {
            link_field: link_field.into(),
            ..Default::default()
        }
    }

    /// Field of the parent row holding the link
    pub fn link_field(&self) -> &str {
        &self.link_field
    }

    /// Entities extracted from followed documents
    pub fn entities(&self) -> &EntityGraph {
        &self.entities
    }

    pub fn entities_mut(&mut self) -> &mut EntityGraph {
        &mut self.entities
    }

    /// Resolve links against this URL instead of the parent document's
    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Add a query parameter to every followed request
    #[must_use]
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_nesting(mut self, nesting: Nesting) -> Self {
        self.nesting = Some(nesting);
        self
    }

    #[must_use]
    pub fn with_ignore_following_errors(mut self, ignore: bool) -> Self {
        self.ignore_following_errors = Some(ignore);
        self
    }

    /// Add an entity extracted from followed documents
    #[must_use]
    pub fn with_entity(mut self, entity: EntityDefinition) -> Self {
        self.entities.add_entity(entity);
        self
    }

    pub fn set_base_url(&mut self, url: impl Into<String>) -> &mut Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn add_param(&mut self, name: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn set_nesting(&mut self, nesting: Nesting) -> &mut Self {
        self.nesting = Some(nesting);
        self
    }

    pub fn set_ignore_following_errors(&mut self, ignore: bool) -> &mut Self {
        self.ignore_following_errors = Some(ignore);
        self
    }

    /// Create or get an entity extracted from followed documents
    pub fn configure_entity(&mut self, name: &str) -> &mut EntityDefinition {
        self.entities.configure_entity(name)
    }
}

// ============================================================================
// Resolved Options
// ============================================================================

/// Options after applying every override layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedOptions {
    pub nesting: Nesting,
    pub ignore_following_errors: bool,
}

impl Default for ResolvedOptions {
    fn default() -> Self {
        Self {
            nesting: Nesting::default(),
            ignore_following_errors: true,
        }
    }
}

impl ResolvedOptions {
    /// Apply local overrides on top of these options
    pub fn overridden(self, nesting: Option<Nesting>, ignore: Option<bool>) -> Self {
        Self {
            nesting: nesting.unwrap_or(self.nesting),
            ignore_following_errors: ignore.unwrap_or(self.ignore_following_errors),
        }
    }
}
