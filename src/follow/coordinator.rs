//! Link coordinator
//!
//! Follows the link fields of extracted rows. Every row's links are followed
//! concurrently with the other rows of the same page; fetches are bounded by
//! the worker pool and spaced per host by the rate limiter. A row is only
//! nested once all of its links are done.

use super::pool::WorkerPool;
use super::types::{FollowCounters, LinkTask, Origin, ThrottleHook};
use crate::entity::{ResolvedEntity, ResolvedFollower};
use crate::error::{Error, Result};
use crate::extract::{Extractor, FilterContext};
use crate::fetch::{Document, DownloadStore, Fetcher, Request};
use crate::http::HostRateLimiter;
use crate::results::{EntityResult, NestedRow, Record, Results};
use crate::types::{EmptyJoin, Row};
use futures::future::{join_all, BoxFuture};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, warn};

/// Follows links and nests their results into parent rows
pub struct LinkCoordinator {
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    pool: WorkerPool,
    limiter: HostRateLimiter,
    throttle: Option<Arc<dyn ThrottleHook>>,
    empty_join: EmptyJoin,
    downloads: Option<Arc<DownloadStore>>,
    links_followed: AtomicU64,
    link_errors: AtomicU64,
}

impl LinkCoordinator {
    pub fn new(
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
        pool: WorkerPool,
        limiter: HostRateLimiter,
    ) -> Self {
        Self {
            fetcher,
            extractor,
            pool,
            limiter,
            throttle: None,
            empty_join: EmptyJoin::default(),
            downloads: None,
            links_followed: AtomicU64::new(0),
            link_errors: AtomicU64::new(0),
        }
    }

    #[must_use]
    pub fn with_throttle_hook(mut self, hook: Arc<dyn ThrottleHook>) -> Self {
        self.throttle = Some(hook);
        self
    }

    #[must_use]
    pub fn with_empty_join(mut self, empty_join: EmptyJoin) -> Self {
        self.empty_join = empty_join;
        self
    }

    /// Save every followed document
    #[must_use]
    pub fn with_downloads(mut self, store: Arc<DownloadStore>) -> Self {
        self.downloads = Some(store);
        self
    }

    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    pub fn limiter(&self) -> &HostRateLimiter {
        &self.limiter
    }

    pub fn downloads(&self) -> Option<&DownloadStore> {
        self.downloads.as_deref()
    }

    /// Totals since the coordinator was created
    pub fn counters(&self) -> FollowCounters {
        FollowCounters {
            links_followed: self.links_followed.load(Ordering::Relaxed),
            link_errors: self.link_errors.load(Ordering::Relaxed),
        }
    }

    // ========================================================================
    // Fetching
    // ========================================================================

    /// Fetch a document once its host has a free slot
    pub async fn fetch(&self, request: &Request) -> Result<Document> {
        let host = request.host_key();
        self.limiter.wait(&host).await;

        let result = self.fetcher.fetch(request).await;
        if let Some(hook) = &self.throttle {
            let status = match &result {
                Ok(document) => Some(document.status),
                Err(e) => e.status(),
            };
            if let Some(status) = status {
                hook.on_response(&host, status, &self.limiter);
            }
        }
        result
    }

    /// Probe a document once its host has a free slot
    pub async fn probe(&self, request: &Request) -> Result<bool> {
        self.limiter.wait(&request.host_key()).await;
        self.fetcher.probe(request).await
    }

    // ========================================================================
    // Filtering and Nesting
    // ========================================================================

    /// Drop the rows rejected by any of the entity's filters
    ///
    /// Rows whose width does not match the entity are passed through
    /// unfiltered so that `nest_rows` reports them.
    pub fn filter(
        &self,
        entity: &ResolvedEntity,
        rows: Vec<Row>,
        origin: &Origin,
        depth: usize,
    ) -> Vec<Row> {
        if entity.filters.is_empty() {
            return rows;
        }

        let context = FilterContext {
            entity: entity.name.clone(),
            url: origin.url.clone(),
            page_number: origin.page_number,
            depth,
        };

        let before = rows.len();
        let kept: Vec<Row> = rows
            .into_iter()
            .map(|row| Record::new(entity.headers.clone(), row))
            .filter(|record| {
                record.len() != entity.headers.len()
                    || entity.filters.iter().all(|f| f.accept(record, &context))
            })
            .map(Record::into_values)
            .collect();

        if kept.len() < before {
            debug!(
                entity = %entity.name,
                dropped = before - kept.len(),
                "Filtered records"
            );
        }
        kept
    }

    /// Follow the links of every row and nest what they produce
    ///
    /// Returns one outcome per input row, in input order. A row whose width
    /// differs from the entity headers fails with `Error::RowWidth`.
    pub async fn nest_rows(
        &self,
        entity: &ResolvedEntity,
        rows: Vec<Row>,
        origin: &Origin,
        depth: usize,
    ) -> Vec<Result<NestedRow>> {
        if !entity.has_followers() {
            return rows
                .iter()
                .map(|row| {
                    check_width(entity, row)?;
                    Ok(entity.layout.nest(row, &[], self.empty_join))
                })
                .collect();
        }

        join_all(
            rows.iter()
                .map(|row| self.nest_row(entity, row, origin, depth)),
        )
        .await
    }

    async fn nest_row(
        &self,
        entity: &ResolvedEntity,
        row: &Row,
        origin: &Origin,
        depth: usize,
    ) -> Result<NestedRow> {
        check_width(entity, row)?;
        let outcomes = join_all(
            entity
                .followers
                .iter()
                .map(|follower| self.follow(follower, row, origin, depth)),
        )
        .await;

        let children = outcomes.into_iter().collect::<Result<Vec<_>>>()?;
        Ok(entity.layout.nest(row, &children, self.empty_join))
    }

    /// Follow one link of a row
    ///
    /// `Ok(None)` when the row has no link value or following it failed and
    /// errors are ignored.
    async fn follow(
        &self,
        follower: &ResolvedFollower,
        row: &Row,
        origin: &Origin,
        depth: usize,
    ) -> Result<Option<Results>> {
        let Some(value) = row
            .get(follower.link_index)
            .and_then(Option::as_deref)
            .map(str::trim)
            .filter(|v| !v.is_empty())
        else {
            return Ok(None);
        };

        let outcome = match LinkTask::new(follower, value, origin) {
            Ok(task) => self.follow_link(task, follower, depth).await,
            Err(e) => Err(e),
        };

        match outcome {
            Ok(results) => Ok(Some(results)),
            Err(e) => {
                self.link_errors.fetch_add(1, Ordering::Relaxed);
                if follower.options.ignore_following_errors {
                    warn!(
                        link_field = %follower.link_field,
                        link = %value,
                        error = %e,
                        "Ignoring error while following link"
                    );
                    Ok(None)
                } else {
                    Err(Error::link(value, e))
                }
            }
        }
    }

    /// Fetch, extract and recursively nest the entities of a linked document
    fn follow_link<'a>(
        &'a self,
        task: LinkTask,
        follower: &'a ResolvedFollower,
        depth: usize,
    ) -> BoxFuture<'a, Result<Results>> {
        Box::pin(async move {
            let selectors = follower.selectors();
            let (document, extracted) = self
                .pool
                .run(async {
                    let document = self.fetch(&task.request).await?;
                    let extracted = self.extractor.extract(&document, &selectors)?;
                    Ok::<_, Error>((document, extracted))
                })
                .await??;

            self.links_followed.fetch_add(1, Ordering::Relaxed);
            debug!(
                link_field = %task.link_field,
                url = %document.url,
                depth = depth + 1,
                "Followed link"
            );

            let saved_as = match &self.downloads {
                Some(store) => Some(
                    store
                        .save_follower(&document, task.page_number, task.parent_saved_as.as_deref())
                        .await?,
                ),
                None => None,
            };

            let mut origin = Origin::of(&document, &task.request, task.page_number);
            origin.saved_as = saved_as;

            let mut results = Results::new();
            for (child, rows) in follower.entities.iter().zip(extracted) {
                let rows = self.filter(child, rows, &origin, depth + 1);
                let mut result = EntityResult::new(&child.name, child.output_headers().to_vec());
                for nested in self.nest_rows(child, rows, &origin, depth + 1).await {
                    result.push_nested(nested?)?;
                }
                results.put(&child.name, result)?;
            }
            Ok(results)
        })
    }
}

fn check_width(entity: &ResolvedEntity, row: &Row) -> Result<()> {
    if row.len() == entity.headers.len() {
        Ok(())
    } else {
        Err(Error::RowWidth {
            entity: entity.name.clone(),
            expected: entity.headers.len(),
            actual: row.len(),
        })
    }
}

impl std::fmt::Debug for LinkCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkCoordinator")
            .field("pool", &self.pool)
            .field("limiter", &self.limiter)
            .field("empty_join", &self.empty_join)
            .field("counters", &self.counters())
            .finish_non_exhaustive()
    }
}
