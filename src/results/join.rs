//! Field-matching join and link between two entity results

use super::result::EntityResult;
use crate::error::{Error, Result};
use crate::types::{EmptyJoin, Row};
use std::collections::HashMap;
use tracing::debug;

/// Matching fields resolved to positions on both sides
struct Matching {
    master: Vec<usize>,
    other: Vec<usize>,
}

impl Matching {
    fn resolve(master: &EntityResult, other: &EntityResult, fields: &[&str]) -> Result<Self> {
        if fields.is_empty() {
            let (master_idx, other_idx): (Vec<_>, Vec<_>) = master
                .headers()
                .iter()
                .enumerate()
                .filter_map(|(i, h)| other.field_index(h).map(|j| (i, j)))
                .unzip();

            if master_idx.is_empty() {
                return Err(Error::NoCommonFields {
                    master: master.entity_name().to_string(),
                    other: other.entity_name().to_string(),
                });
            }
            return Ok(Self {
                master: master_idx,
                other: other_idx,
            });
        }

        let mut matching = Self {
            master: Vec::with_capacity(fields.len()),
            other: Vec::with_capacity(fields.len()),
        };
        for field in fields {
            let i = master
                .field_index(field)
                .ok_or_else(|| Error::unknown_field(master.entity_name(), *field))?;
            let j = other
                .field_index(field)
                .ok_or_else(|| Error::unknown_field(other.entity_name(), *field))?;
            matching.master.push(i);
            matching.other.push(j);
        }
        Ok(matching)
    }
}

/// Key of a row on the matching fields. Rows with a missing value never match.
fn key<'a>(row: &'a Row, indices: &[usize]) -> Option<Vec<&'a str>> {
    indices.iter().map(|&i| row[i].as_deref()).collect()
}

/// Positions of `other` rows grouped by key, in row order
fn index<'a>(other: &'a EntityResult, indices: &[usize]) -> HashMap<Vec<&'a str>, Vec<usize>> {
    let mut map: HashMap<Vec<&str>, Vec<usize>> = HashMap::new();
    for (pos, row) in other.rows().iter().enumerate() {
        if let Some(k) = key(row, indices) {
            map.entry(k).or_default().push(pos);
        }
    }
    map
}

pub(super) fn join(
    master: &EntityResult,
    other: &EntityResult,
    fields: &[&str],
    policy: EmptyJoin,
) -> Result<EntityResult> {
    let matching = Matching::resolve(master, other, fields)?;
    let lookup = index(other, &matching.other);

    let carried: Vec<usize> = (0..other.headers().len())
        .filter(|i| !matching.other.contains(i))
        .collect();

    let mut headers = master.headers().to_vec();
    headers.extend(carried.iter().map(|&i| other.headers()[i].clone()));

    let mut out = EntityResult::new(master.entity_name(), headers);
    for row in master.rows() {
        let matches = key(row, &matching.master).and_then(|k| lookup.get(&k));

        match matches {
            Some(positions) => {
                for &pos in positions {
                    let child = &other.rows()[pos];
                    let mut joined = row.clone();
                    joined.extend(carried.iter().map(|&i| child[i].clone()));
                    out.push_row(joined)?;
                }
            }
            None if policy == EmptyJoin::KeepParent => {
                let mut joined = row.clone();
                joined.resize(row.len() + carried.len(), None);
                out.push_row(joined)?;
            }
            None => {}
        }
    }

    debug!(
        master = master.entity_name(),
        other = other.entity_name(),
        rows = out.len(),
        "Joined entity results"
    );
    Ok(out)
}

pub(super) fn link(master: &mut EntityResult, other: &EntityResult, fields: &[&str]) -> Result<()> {
    let matching = Matching::resolve(master, other, fields)?;
    let lookup = index(other, &matching.other);

    let mut attachments = Vec::new();
    for (row_index, row) in master.rows().iter().enumerate() {
        let Some(positions) = key(row, &matching.master).and_then(|k| lookup.get(&k)) else {
            continue;
        };
        let rows = positions.iter().map(|&p| other.rows()[p].clone()).collect();
        attachments.push((
            row_index,
            EntityResult::with_rows(other.entity_name(), other.headers().to_vec(), rows)?,
        ));
    }

    debug!(
        master = master.entity_name(),
        other = other.entity_name(),
        linked_rows = attachments.len(),
        "Linked entity results"
    );

    for (row_index, child) in attachments {
        master.attach_linked_entity(row_index, other.entity_name(), child)?;
    }
    Ok(())
}
