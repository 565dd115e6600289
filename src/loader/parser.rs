//! YAML parser for parser definitions
//!
//! Parses and validates definition files.

use crate::entity::{EntityGraph, ResolvedOptions};
use crate::error::{Error, Result};
use crate::fetch::DownloadStore;
use crate::loader::types::{EntityDef, ParserDefinition};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Load a parser definition from a YAML file
///
/// # Examples
///
/// ```ignore
/// let def = load_definition("./stations.yaml")?;
/// let graph = def.entity_graph()?;
/// ```
pub fn load_definition(path: impl AsRef<Path>) -> Result<ParserDefinition> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::FileNotFound {
                path: path.display().to_string(),
            }
        } else {
            Error::config(format!(
                "Failed to read definition file '{}': {e}",
                path.display()
            ))
        }
    })?;
    load_definition_from_str(&content)
}

/// Load a parser definition from a YAML string
pub fn load_definition_from_str(yaml: &str) -> Result<ParserDefinition> {
    let def: ParserDefinition = serde_yaml::from_str(yaml)?;

    validate_definition(&def)?;
    Ok(def)
}

/// Validate a parser definition
///
/// Names must be non-blank and unique per level, link fields must exist and
/// every setting must be in range. The entity graph is resolved once so
/// that the definition is known to be runnable.
fn validate_definition(def: &ParserDefinition) -> Result<()> {
    if def.name.trim().is_empty() {
        return Err(Error::config("Definition name cannot be empty"));
    }
    if def.entities.is_empty() {
        return Err(Error::config("Definition must have at least one entity"));
    }

    validate_entities(&def.entities, "")?;

    let settings = def.parser_settings();
    settings.validate()?;
    if let Some(downloads) = &settings.downloads {
        DownloadStore::new(downloads.clone())?;
    }

    let graph: EntityGraph = def.entity_graph()?;
    graph.resolve(&ResolvedOptions {
        nesting: settings.nesting,
        ignore_following_errors: settings.ignore_following_errors,
    })?;
    Ok(())
}

fn validate_entities(entities: &[EntityDef], scope: &str) -> Result<()> {
    let mut names = HashSet::new();
    for entity in entities {
        let name = entity.name.trim();
        if name.is_empty() {
            return Err(Error::config(format!("{scope}entity name cannot be empty")));
        }
        if !names.insert(name.to_lowercase()) {
            return Err(Error::config(format!(
                "{scope}duplicate entity name '{name}'"
            )));
        }
        if entity.fields.is_empty() {
            return Err(Error::config(format!(
                "{scope}entity '{name}' must have at least one field"
            )));
        }

        for follower in &entity.followers {
            if !entity.fields.iter().any(|f| f.name() == follower.link_field) {
                return Err(Error::unknown_field(name, &follower.link_field));
            }
            if follower.entities.is_empty() {
                return Err(Error::config(format!(
                    "{scope}follower '{name}.{}' must have at least one entity",
                    follower.link_field
                )));
            }
            let scope = format!("{scope}{name}.{}: ", follower.link_field);
            validate_entities(&follower.entities, &scope)?;
        }
    }
    Ok(())
}
