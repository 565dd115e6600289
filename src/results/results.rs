//! Entity name keyed result store
//!
//! Lookups ignore case and surrounding whitespace; enumeration returns the
//! names as they were stored, in insertion order.

use super::result::EntityResult;
use crate::error::{Error, Result};
use crate::types::EmptyJoin;

/// Normalize an entity name for lookups (trimmed, lower-cased)
pub fn normalize(name: &str) -> Result<String> {
    let key = name.trim();
    if key.is_empty() {
        return Err(Error::invalid_value("entity name", "must not be blank"));
    }
    Ok(key.to_lowercase())
}

#[derive(Debug, Clone, PartialEq)]
struct Slot {
    key: String,
    name: String,
    result: EntityResult,
}

/// Results of a parse, keyed by entity name
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Results {
    slots: Vec<Slot>,
}

impl Results {
    /// Create an empty collection
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a result, replacing any entry under the same normalized name
    ///
    /// A replaced entry keeps its position and takes the new display name.
    pub fn put(
        &mut self,
        name: impl Into<String>,
        result: EntityResult,
    ) -> Result<Option<EntityResult>> {
        let name = name.into();
        let key = normalize(&name)?;

        if let Some(slot) = self.slots.iter_mut().find(|s| s.key == key) {
            slot.name = name;
            return Ok(Some(std::mem::replace(&mut slot.result, result)));
        }

        self.slots.push(Slot { key, name, result });
        Ok(None)
    }

    /// Look up a result by entity name
    pub fn get(&self, name: &str) -> Result<&EntityResult> {
        let index = self.position(name)?;
        Ok(&self.slots[index].result)
    }

    /// Look up a result by entity name for modification
    pub fn get_mut(&mut self, name: &str) -> Result<&mut EntityResult> {
        let index = self.position(name)?;
        Ok(&mut self.slots[index].result)
    }

    /// Remove a result by entity name
    pub fn remove(&mut self, name: &str) -> Result<EntityResult> {
        let index = self.position(name)?;
        Ok(self.slots.remove(index).result)
    }

    /// Whether a result exists under the given name
    pub fn contains(&self, name: &str) -> bool {
        normalize(name).is_ok_and(|key| self.slots.iter().any(|s| s.key == key))
    }

    /// Entity names as stored, in insertion order
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|s| s.name.as_str())
    }

    /// Results in insertion order
    pub fn values(&self) -> impl Iterator<Item = &EntityResult> {
        self.slots.iter().map(|s| &s.result)
    }

    /// Name and result pairs in insertion order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &EntityResult)> {
        self.slots.iter().map(|s| (s.name.as_str(), &s.result))
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether no entity is stored
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Remove every entry
    pub fn clear(&mut self) {
        self.slots.clear();
    }

    /// Fold another collection into this one
    ///
    /// Rows of entities present in both are appended; new entities are added.
    pub fn merge(&mut self, other: Results) -> Result<()> {
        for slot in other.slots {
            if let Some(existing) = self.slots.iter_mut().find(|s| s.key == slot.key) {
                existing.result.append(slot.result)?;
            } else {
                self.slots.push(slot);
            }
        }
        Ok(())
    }

    /// Join `linked` entities into `master`, matching on common field names
    pub fn join(&self, master: &str, linked: &[&str]) -> Result<EntityResult> {
        self.join_on(master, linked, &[], EmptyJoin::default())
    }

    /// Join `linked` entities into `master` on explicit fields
    ///
    /// Each linked entity is joined in turn to the output of the previous
    /// join, producing the cartesian product of all matches.
    pub fn join_on(
        &self,
        master: &str,
        linked: &[&str],
        fields: &[&str],
        policy: EmptyJoin,
    ) -> Result<EntityResult> {
        if linked.is_empty() {
            return Err(Error::config(format!(
                "No entity given to join with '{master}'"
            )));
        }

        let mut out = self.get(master)?.clone();
        for name in linked {
            out = out.join(self.get(name)?, fields, policy)?;
        }
        Ok(out)
    }

    /// Link rows of `linked` entities to rows of `master`, matching on common field names
    pub fn link(&mut self, master: &str, linked: &[&str]) -> Result<()> {
        self.link_on(master, linked, &[])
    }

    /// Link rows of `linked` entities to rows of `master` on explicit fields
    pub fn link_on(&mut self, master: &str, linked: &[&str], fields: &[&str]) -> Result<()> {
        if linked.is_empty() {
            return Err(Error::config(format!(
                "No entity given to link with '{master}'"
            )));
        }

        self.position(master)?;
        let children = linked
            .iter()
            .map(|name| self.get(name).cloned())
            .collect::<Result<Vec<_>>>()?;

        let target = self.get_mut(master)?;
        for child in &children {
            target.link(child, fields)?;
        }
        Ok(())
    }

    fn position(&self, name: &str) -> Result<usize> {
        if self.slots.is_empty() {
            return Err(Error::EmptyResults {
                name: name.to_string(),
            });
        }

        let key = normalize(name)?;
        self.slots
            .iter()
            .position(|s| s.key == key)
            .ok_or_else(|| Error::EntityNotFound {
                name: name.to_string(),
                available: self.keys().map(str::to_string).collect(),
            })
    }
}

impl IntoIterator for Results {
    type Item = (String, EntityResult);
    type IntoIter = std::vec::IntoIter<(String, EntityResult)>;

    fn into_iter(self) -> Self::IntoIter {
        self.slots
            .into_iter()
            .map(|s| (s.name, s.result))
            .collect::<Vec<_>>()
            .into_iter()
    }
}
