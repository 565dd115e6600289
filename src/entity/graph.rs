//! Entity graph and resolution
//!
//! `EntityGraph` holds the declared entities of one level (the top level of
//! a parser, or the entities of one follower). `resolve` validates the whole
//! tree and fixes every option along the chain
//! local -> enclosing follower -> owning entity -> parser.

use super::types::{EntityDefinition, FieldDefinition, ResolvedOptions};
use crate::error::{Error, Result};
use crate::extract::{EntitySelector, RecordFilter};
use crate::results::{normalize, FollowerLayout, NestingLayout};
use crate::types::StringMap;
use std::collections::HashSet;
use std::fmt::{self, Write as _};
use std::sync::Arc;
use url::Url;

// ============================================================================
// Entity Graph
// ============================================================================

/// Entities declared at one level, in declaration order
#[derive(Debug, Clone, Default)]
pub struct EntityGraph {
    entities: Vec<EntityDefinition>,
}

impl EntityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity, replacing any entity with the same name
    pub fn add_entity(&mut self, entity: EntityDefinition) -> &mut Self {
        let key = entity.name.trim().to_lowercase();
        if let Some(existing) = self
            .entities
            .iter_mut()
            .find(|e| e.name.trim().to_lowercase() == key)
        {
            *existing = entity;
        } else {
            self.entities.push(entity);
        }
        self
    }

    /// Get an entity by name, creating it when absent
    pub fn configure_entity(&mut self, name: &str) -> &mut EntityDefinition {
        let key = name.trim().to_lowercase();
        let index = match self
            .entities
            .iter()
            .position(|e| e.name.trim().to_lowercase() == key)
        {
            Some(index) => index,
            None => {
                self.entities.push(EntityDefinition::new(name.trim()));
                self.entities.len() - 1
            }
        };
        &mut self.entities[index]
    }

    /// Entity by name, ignoring case
    pub fn entity(&self, name: &str) -> Option<&EntityDefinition> {
        let key = name.trim().to_lowercase();
        self.entities
            .iter()
            .find(|e| e.name.trim().to_lowercase() == key)
    }

    /// Remove an entity together with its followers
    pub fn remove_entity(&mut self, name: &str) -> Option<EntityDefinition> {
        let key = name.trim().to_lowercase();
        let index = self
            .entities
            .iter()
            .position(|e| e.name.trim().to_lowercase() == key)?;
        Some(self.entities.remove(index))
    }

    /// Declared entity names
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn entities(&self) -> &[EntityDefinition] {
        &self.entities
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Validate the tree and resolve every entity against `inherited`
    pub fn resolve(&self, inherited: &ResolvedOptions) -> Result<Vec<ResolvedEntity>> {
        if self.entities.is_empty() {
            return Err(Error::config("No entities defined"));
        }

        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(self.entities.len());
        for entity in &self.entities {
            let key = normalize(&entity.name)?;
            if !seen.insert(key) {
                return Err(Error::config(format!(
                    "Duplicate entity name '{}'",
                    entity.name
                )));
            }
            resolved.push(resolve_entity(entity, inherited)?);
        }
        Ok(resolved)
    }
}

fn resolve_entity(entity: &EntityDefinition, inherited: &ResolvedOptions) -> Result<ResolvedEntity> {
    if entity.fields.is_empty() {
        return Err(Error::config(format!(
            "Entity '{}' has no fields",
            entity.name
        )));
    }

    let mut names = HashSet::new();
    for field in &entity.fields {
        if field.name.trim().is_empty() {
            return Err(Error::invalid_value(
                format!("{}.fields", entity.name),
                "field name must not be blank",
            ));
        }
        if !names.insert(field.name.as_str()) {
            return Err(Error::config(format!(
                "Duplicate field '{}' in entity '{}'",
                field.name, entity.name
            )));
        }
    }

    let headers: Vec<String> = entity.fields.iter().map(|f| f.name.clone()).collect();
    let options = inherited.overridden(entity.nesting, entity.ignore_following_errors);

    let mut followers = Vec::with_capacity(entity.followers.len());
    for follower in &entity.followers {
        let link_index = headers
            .iter()
            .position(|h| *h == follower.link_field)
            .ok_or_else(|| Error::unknown_field(&entity.name, &follower.link_field))?;

        let base_url = follower
            .base_url
            .as_deref()
            .map(Url::parse)
            .transpose()?;

        let follower_options =
            options.overridden(follower.nesting, follower.ignore_following_errors);
        let entities = follower.entities.resolve(&follower_options).map_err(|e| {
            Error::config(format!(
                "Follower of '{}.{}': {e}",
                entity.name, follower.link_field
            ))
        })?;

        followers.push(ResolvedFollower {
            link_field: follower.link_field.clone(),
            link_index,
            base_url,
            params: follower.params.clone(),
            options: follower_options,
            entities,
        });
    }

    let layout = NestingLayout::new(
        &headers,
        followers.iter().map(ResolvedFollower::layout).collect(),
    );

    Ok(ResolvedEntity {
        name: entity.name.clone(),
        record_path: entity.record_path.clone(),
        fields: entity.fields.clone(),
        headers: headers.into(),
        options,
        followers,
        filters: entity.filters.clone(),
        layout,
    })
}

// ============================================================================
// Resolved Entities
// ============================================================================

/// An entity with every option fixed, ready for parsing
#[derive(Clone)]
pub struct ResolvedEntity {
    pub name: String,
    pub record_path: Option<String>,
    pub fields: Vec<FieldDefinition>,
    /// Headers of the extracted rows, before nesting
    pub headers: Arc<[String]>,
    pub options: ResolvedOptions,
    pub followers: Vec<ResolvedFollower>,
    pub filters: Vec<Arc<dyn RecordFilter>>,
    pub layout: NestingLayout,
}

impl ResolvedEntity {
    /// What the extractor needs to find this entity's rows
    pub fn selector(&self) -> EntitySelector {
        EntitySelector {
            name: self.name.clone(),
            record_path: self.record_path.clone(),
            fields: self.fields.clone(),
        }
    }

    /// Headers of the published rows
    pub fn output_headers(&self) -> &[String] {
        self.layout.headers()
    }

    pub fn has_followers(&self) -> bool {
        !self.followers.is_empty()
    }
}

impl fmt::Debug for ResolvedEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedEntity")
            .field("name", &self.name)
            .field("record_path", &self.record_path)
            .field("headers", &self.headers)
            .field("options", &self.options)
            .field("followers", &self.followers)
            .field("filters", &self.filters.len())
            .finish()
    }
}

/// A follower with every option fixed
#[derive(Debug, Clone)]
pub struct ResolvedFollower {
    pub link_field: String,
    /// Position of the link field in the parent's extracted row
    pub link_index: usize,
    pub base_url: Option<Url>,
    pub params: StringMap,
    pub options: ResolvedOptions,
    pub entities: Vec<ResolvedEntity>,
}

impl ResolvedFollower {
    /// Selectors of the entities extracted from followed documents
    pub fn selectors(&self) -> Vec<EntitySelector> {
        self.entities.iter().map(ResolvedEntity::selector).collect()
    }

    fn layout(&self) -> FollowerLayout {
        self.entities.iter().fold(
            FollowerLayout::new(self.link_index, self.options.nesting),
            |layout, child| layout.with_child(&child.name, child.output_headers().to_vec()),
        )
    }
}

// ============================================================================
// Description
// ============================================================================

/// Human readable tree of resolved entities
pub fn describe(entities: &[ResolvedEntity]) -> String {
    let mut out = String::new();
    for entity in entities {
        describe_entity(&mut out, entity, 0);
    }
    out
}

fn describe_entity(out: &mut String, entity: &ResolvedEntity, depth: usize) {
    let indent = "  ".repeat(depth);
    let _ = writeln!(
        out,
        "{indent}{} [{}]",
        entity.name,
        entity.output_headers().join(", ")
    );
    for follower in &entity.followers {
        let _ = writeln!(
            out,
            "{indent}  -> {} ({:?}, ignore errors: {})",
            follower.link_field, follower.options.nesting, follower.options.ignore_following_errors
        );
        for child in &follower.entities {
            describe_entity(out, child, depth + 2);
        }
    }
}
