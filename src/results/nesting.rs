//! Attaching followed child results to parent rows
//!
//! A `NestingLayout` is computed once per entity from its headers and the
//! nesting policy of each of its followers. It fixes the output headers and
//! turns one parent row plus the child results fetched for it into the rows
//! that get published.

use super::results::Results;
use crate::types::{EmptyJoin, Nesting, Row};
use tracing::warn;

/// Child entity reached through a follower
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChildLayout {
    /// Entity name as declared
    pub name: String,
    /// Child entity headers
    pub headers: Vec<String>,
}

/// Shape of one follower as seen from the parent row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FollowerLayout {
    /// Position of the link field in the parent headers
    pub link_index: usize,
    /// How the child rows are attached
    pub nesting: Nesting,
    /// Entities extracted from the followed document, in declaration order
    pub children: Vec<ChildLayout>,
}

impl FollowerLayout {
    pub fn new(link_index: usize, nesting: Nesting) -> Self {
        Self {
            link_index,
            nesting,
            children: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_child(mut self, name: impl Into<String>, headers: Vec<String>) -> Self {
        self.children.push(ChildLayout {
            name: name.into(),
            headers,
        });
        self
    }
}

/// Rows produced from one parent row, plus the child results behind them
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NestedRow {
    pub rows: Vec<Row>,
    pub linked: Results,
}

/// Output shape of an entity with followers
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestingLayout {
    headers: Vec<String>,
    kept: Vec<usize>,
    followers: Vec<FollowerLayout>,
}

impl NestingLayout {
    /// Compute the layout for `parent_headers` and its followers
    ///
    /// Link fields of replacing followers are removed; child headers of
    /// joining followers are appended in follower then child order.
    pub fn new(parent_headers: &[String], followers: Vec<FollowerLayout>) -> Self {
        let kept: Vec<usize> = (0..parent_headers.len())
            .filter(|i| {
                !followers
                    .iter()
                    .any(|f| f.link_index == *i && f.nesting.replaces())
            })
            .collect();

        let mut headers: Vec<String> = kept.iter().map(|&i| parent_headers[i].clone()).collect();
        for follower in followers.iter().filter(|f| f.nesting.joins()) {
            for child in &follower.children {
                headers.extend(child.headers.iter().cloned());
            }
        }

        Self {
            headers,
            kept,
            followers,
        }
    }

    /// Layout of an entity without followers
    pub fn identity(parent_headers: &[String]) -> Self {
        Self::new(parent_headers, Vec::new())
    }

    /// Headers of the published rows
    pub fn headers(&self) -> &[String] {
        &self.headers
    }

    /// Width of the published rows
    pub fn width(&self) -> usize {
        self.headers.len()
    }

    pub fn followers(&self) -> &[FollowerLayout] {
        &self.followers
    }

    /// Nest the child results of one parent row
    ///
    /// `children[i]` holds what follower `i` produced, or `None` when the
    /// row had no link value or following it failed and was ignored. Such
    /// rows keep the parent with null-filled child fields. An entity present
    /// but without rows is handled by `empty`.
    pub fn nest(&self, parent: &Row, children: &[Option<Results>], empty: EmptyJoin) -> NestedRow {
        let base: Row = self.kept.iter().map(|&i| parent[i].clone()).collect();
        let mut rows = vec![base];

        for (follower, followed) in self.followers.iter().zip(children) {
            if !follower.nesting.joins() {
                continue;
            }
            for child in &follower.children {
                let nulls = || vec![vec![None; child.headers.len()]];
                let child_rows = match followed {
                    None => nulls(),
                    Some(results) => match results.get(&child.name) {
                        Ok(result) if !result.is_empty() => result.rows().to_vec(),
                        _ if empty == EmptyJoin::KeepParent => nulls(),
                        _ => {
                            rows.clear();
                            break;
                        }
                    },
                };
                rows = product(rows, &child_rows);
            }
        }

        let mut linked = Results::new();
        for followed in children.iter().flatten() {
            if let Err(e) = linked.merge(followed.clone()) {
                warn!(error = %e, "Followers produced incompatible results for the same entity");
            }
        }

        NestedRow { rows, linked }
    }
}

/// Every row of `left` extended by every row of `right`, left-major
fn product(left: Vec<Row>, right: &[Row]) -> Vec<Row> {
    let mut out = Vec::with_capacity(left.len() * right.len());
    for l in &left {
        for r in right {
            let mut row = Vec::with_capacity(l.len() + r.len());
            row.extend_from_slice(l);
            row.extend_from_slice(r);
            out.push(row);
        }
    }
    out
}
