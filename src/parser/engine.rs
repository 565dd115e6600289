//! Parse loop
//!
//! Pages are processed one at a time: fetch, extract, filter, follow links,
//! nest, publish, then compute the next page. Published rows go either to
//! streaming processors or into a `Results` store.

use super::types::{EntityRecords, ErrorAction, ParseStats, ParserSettings, Processors};
use crate::entity::{describe, EntityGraph, ResolvedEntity, ResolvedOptions};
use crate::error::{Error, Result};
use crate::extract::{EntitySelector, Extractor};
use crate::fetch::{DownloadStore, Fetcher, Request};
use crate::follow::{LinkCoordinator, Origin, ThrottleHook, WorkerPool};
use crate::http::HostRateLimiter;
use crate::pagination::{NextPageHandler, PaginationContext, Paginator, StopHandle};
use crate::results::{EntityResult, NestedRow, Record, Results};
use crate::types::{Row, StringMap};
use futures::future::join_all;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Name of the selector reading paginator fields
const PAGINATOR_SELECTOR: &str = "paginator";

// ============================================================================
// Sinks
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Stop,
}

/// Destination of the rows produced by a parse
trait RowSink: Send {
    fn started(&mut self, _entities: &[ResolvedEntity]) -> Result<()> {
        Ok(())
    }

    fn accept(
        &mut self,
        entity: &ResolvedEntity,
        headers: &Arc<[String]>,
        outcome: Result<NestedRow>,
        stats: &mut ParseStats,
    ) -> Result<Flow>;

    fn ended(&mut self, _entities: &[ResolvedEntity]) {}
}

/// Pushes rows to processors and errors to the error handler
struct StreamSink<'a> {
    processors: &'a mut Processors,
}

impl StreamSink<'_> {
    fn on_error(&mut self, entity: &str, error: Error, stats: &mut ParseStats) -> Result<Flow> {
        stats.errors += 1;
        match self.processors.handle_error(entity, &error) {
            None => Err(error),
            Some(ErrorAction::Continue) => {
                warn!(entity = %entity, error = %error, "Skipping failed row");
                Ok(Flow::Continue)
            }
            Some(ErrorAction::Stop) => {
                warn!(entity = %entity, error = %error, "Stopping parse after error");
                Ok(Flow::Stop)
            }
        }
    }
}

impl RowSink for StreamSink<'_> {
    fn started(&mut self, entities: &[ResolvedEntity]) -> Result<()> {
        for entity in entities {
            if let Some(processor) = self.processors.processor_mut(&entity.name) {
                processor.process_started(&entity.name);
            }
        }
        Ok(())
    }

    fn accept(
        &mut self,
        entity: &ResolvedEntity,
        headers: &Arc<[String]>,
        outcome: Result<NestedRow>,
        stats: &mut ParseStats,
    ) -> Result<Flow> {
        let nested = match outcome {
            Ok(nested) => nested,
            Err(e) => return self.on_error(&entity.name, e, stats),
        };

        let NestedRow { rows, linked } = nested;
        for row in rows {
            stats.rows += 1;
            let Some(processor) = self.processors.processor_mut(&entity.name) else {
                continue;
            };
            if let Err(e) = processor.process_row(Record::new(headers.clone(), row), &linked) {
                if self.on_error(&entity.name, e, stats)? == Flow::Stop {
                    return Ok(Flow::Stop);
                }
            }
        }
        Ok(Flow::Continue)
    }

    fn ended(&mut self, entities: &[ResolvedEntity]) {
        for entity in entities {
            if let Some(processor) = self.processors.processor_mut(&entity.name) {
                processor.process_ended(&entity.name);
            }
        }
    }
}

/// Accumulates rows into a `Results` store, failing on the first error
#[derive(Default)]
struct CollectSink {
    results: Results,
}

impl RowSink for CollectSink {
    fn started(&mut self, entities: &[ResolvedEntity]) -> Result<()> {
        for entity in entities {
            self.results.put(
                &entity.name,
                EntityResult::new(&entity.name, entity.output_headers().to_vec()),
            )?;
        }
        Ok(())
    }

    fn accept(
        &mut self,
        entity: &ResolvedEntity,
        _headers: &Arc<[String]>,
        outcome: Result<NestedRow>,
        stats: &mut ParseStats,
    ) -> Result<Flow> {
        let nested = outcome?;
        let count = nested.rows.len() as u64;
        self.results.get_mut(&entity.name)?.push_nested(nested)?;
        stats.rows += count;
        Ok(Flow::Continue)
    }
}

// ============================================================================
// Entity Parser
// ============================================================================

/// Parses entities from paginated documents and their links
pub struct EntityParser {
    entities: Vec<ResolvedEntity>,
    settings: ParserSettings,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    pool: WorkerPool,
    limiter: HostRateLimiter,
    throttle: Option<Arc<dyn ThrottleHook>>,
    downloads: Option<Arc<DownloadStore>>,
    next_page_handler: Option<Arc<dyn NextPageHandler>>,
    stop: StopHandle,
    context: Mutex<Option<PaginationContext>>,
}

impl EntityParser {
    /// Resolve `graph` against `settings` and create a parser
    pub fn new(
        graph: &EntityGraph,
        settings: ParserSettings,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
    ) -> Result<Self> {
        settings.validate()?;

        let entities = graph.resolve(&ResolvedOptions {
            nesting: settings.nesting,
            ignore_following_errors: settings.ignore_following_errors,
        })?;

        let pool = settings
            .download_threads
            .map_or_else(WorkerPool::with_default_size, WorkerPool::new);
        let limiter = HostRateLimiter::new(settings.remote_interval);
        let downloads = settings
            .downloads
            .clone()
            .map(DownloadStore::new)
            .transpose()?
            .map(Arc::new);

        Ok(Self {
            entities,
            settings,
            fetcher,
            extractor,
            pool,
            limiter,
            throttle: None,
            downloads,
            next_page_handler: None,
            stop: StopHandle::new(),
            context: Mutex::new(None),
        })
    }

    /// Share a worker pool with other parsers
    #[must_use]
    pub fn with_worker_pool(mut self, pool: WorkerPool) -> Self {
        self.pool = pool;
        self
    }

    /// Share a host rate limiter with other parsers
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: HostRateLimiter) -> Self {
        self.limiter = limiter;
        self
    }

    #[must_use]
    pub fn with_throttle_hook(mut self, hook: impl ThrottleHook + 'static) -> Self {
        self.throttle = Some(Arc::new(hook));
        self
    }

    /// Called before every next page is fetched
    #[must_use]
    pub fn with_next_page_handler(mut self, handler: impl NextPageHandler + 'static) -> Self {
        self.next_page_handler = Some(Arc::new(handler));
        self
    }

    pub fn entities(&self) -> &[ResolvedEntity] {
        &self.entities
    }

    pub fn settings(&self) -> &ParserSettings {
        &self.settings
    }

    pub fn rate_limiter(&self) -> &HostRateLimiter {
        &self.limiter
    }

    /// Tree of the resolved entities and their followers
    pub fn describe(&self) -> String {
        describe(&self.entities)
    }

    /// Pagination state of the current or last parse
    pub fn pagination_context(&self) -> Option<PaginationContext> {
        self.context
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Stop before the next page is fetched
    pub fn stop_pagination(&self) {
        self.stop.stop();
    }

    // ========================================================================
    // Parsing
    // ========================================================================

    /// Parse, handing every row to its entity's processor
    pub async fn parse(&self, request: Request, processors: &mut Processors) -> Result<ParseStats> {
        let mut sink = StreamSink { processors };
        self.run(request, &mut sink).await
    }

    /// Parse everything into a result store
    pub async fn parse_all(&self, request: Request) -> Result<Results> {
        let mut sink = CollectSink::default();
        self.run(request, &mut sink).await?;
        Ok(sink.results)
    }

    /// Parse everything into records per entity, in declaration order
    pub async fn parse_all_records(&self, request: Request) -> Result<Vec<EntityRecords>> {
        let results = self.parse_all(request).await?;
        Ok(results
            .iter()
            .map(|(name, result)| EntityRecords {
                entity: name.to_string(),
                headers: result.headers().to_vec(),
                records: result.records().collect(),
            })
            .collect())
    }

    fn coordinator(&self) -> LinkCoordinator {
        let mut coordinator = LinkCoordinator::new(
            self.fetcher.clone(),
            self.extractor.clone(),
            self.pool.clone(),
            self.limiter.clone(),
        )
        .with_empty_join(self.settings.empty_join);
        if let Some(hook) = &self.throttle {
            coordinator = coordinator.with_throttle_hook(hook.clone());
        }
        if let Some(store) = &self.downloads {
            coordinator = coordinator.with_downloads(store.clone());
        }
        coordinator
    }

    fn selectors(&self, paginator: &Paginator) -> Vec<EntitySelector> {
        let mut selectors: Vec<EntitySelector> =
            self.entities.iter().map(ResolvedEntity::selector).collect();
        if !paginator.settings().fields.is_empty() {
            selectors.push(EntitySelector {
                name: PAGINATOR_SELECTOR.to_string(),
                record_path: None,
                fields: paginator.settings().fields.clone(),
            });
        }
        selectors
    }

    fn publish_context(&self, paginator: &Paginator) {
        *self.context.lock().unwrap_or_else(PoisonError::into_inner) = Some(paginator.context());
    }

    async fn run(&self, request: Request, sink: &mut (dyn RowSink + '_)) -> Result<ParseStats> {
        let start = Instant::now();
        self.stop.reset();

        let coordinator = self.coordinator();
        let mut paginator = Paginator::with_stop_handle(
            self.settings.paginator.clone().unwrap_or_default(),
            self.stop.clone(),
        );
        let selectors = self.selectors(&paginator);
        let headers: Vec<Arc<[String]>> = self
            .entities
            .iter()
            .map(|e| Arc::from(e.output_headers()))
            .collect();

        let mut request = paginator.first_request(request);
        let mut stats = ParseStats::default();

        info!(
            url = %request.full_url(),
            entities = self.entities.len(),
            "Starting parse"
        );
        sink.started(&self.entities)?;

        'pages: loop {
            paginator.begin_page();
            self.publish_context(&paginator);
            let page_number = paginator.state().current_page_number;

            let document = coordinator.fetch(&request).await?;
            stats.pages += 1;
            debug!(page = page_number, url = %document.url, "Fetched page");

            let saved_as = match &self.downloads {
                Some(store) => Some(store.save_page(&document, page_number).await?),
                None => None,
            };
            let origin = Origin::of(&document, &request, page_number).with_saved_as(saved_as);

            let mut extracted = self.extractor.extract(&document, &selectors)?;
            let page_fields = if selectors.len() > self.entities.len() {
                page_fields(&selectors[self.entities.len()], extracted.pop())
            } else {
                StringMap::new()
            };

            let mut record_count = 0;
            let mut pending = Vec::with_capacity(self.entities.len());
            for (entity, rows) in self.entities.iter().zip(extracted) {
                record_count = record_count.max(rows.len());
                pending.push((entity, coordinator.filter(entity, rows, &origin, 0)));
            }

            // Links of every entity on the page are followed together; rows
            // are still published in entity order.
            let nested = join_all(
                pending
                    .into_iter()
                    .map(|(entity, rows)| coordinator.nest_rows(entity, rows, &origin, 0)),
            )
            .await;

            for ((entity, outcomes), headers) in self.entities.iter().zip(nested).zip(&headers) {
                for outcome in outcomes {
                    if sink.accept(entity, headers, outcome, &mut stats)? == Flow::Stop {
                        self.stop.stop();
                        paginator.finish();
                        break 'pages;
                    }
                }
            }

            let Some(next) = paginator.compute_next(&page_fields, &document.url, record_count)
            else {
                break;
            };

            let mut next_request = paginator.next_request(&next, &request);
            next_request
                .cookies
                .extend(document.cookies.iter().map(|(k, v)| (k.clone(), v.clone())));

            if let Some(handler) = &self.next_page_handler {
                handler.prepare(&paginator.context(), &mut next_request);
            }
            if self.stop.is_stopped() {
                debug!("Pagination stopped before the next page");
                paginator.finish();
                break;
            }

            if paginator.settings().url_testing {
                match coordinator.probe(&next_request).await {
                    Ok(true) => {}
                    Ok(false) => {
                        debug!(url = %next_request.full_url(), "Next page not available");
                        paginator.finish();
                        break;
                    }
                    Err(e) => {
                        warn!(url = %next_request.full_url(), error = %e, "Probing next page failed");
                        paginator.finish();
                        break;
                    }
                }
            }

            self.publish_context(&paginator);
            request = next_request;
        }

        self.publish_context(&paginator);
        sink.ended(&self.entities);

        let counters = coordinator.counters();
        stats.links_followed = counters.links_followed;
        stats.link_errors = counters.link_errors;
        #[allow(clippy::cast_possible_truncation)]
        let duration_ms = start.elapsed().as_millis() as u64;
        stats.duration_ms = duration_ms;

        info!(
            pages = stats.pages,
            rows = stats.rows,
            links = stats.links_followed,
            link_errors = stats.link_errors,
            duration_ms = stats.duration_ms,
            "Parse finished"
        );
        Ok(stats)
    }
}

impl std::fmt::Debug for EntityParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityParser")
            .field("entities", &self.entities)
            .field("settings", &self.settings)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}

/// Named values read from the first paginator record
fn page_fields(selector: &EntitySelector, rows: Option<Vec<Row>>) -> StringMap {
    let Some(row) = rows.and_then(|rows| rows.into_iter().next()) else {
        return StringMap::new();
    };
    selector
        .fields
        .iter()
        .zip(row)
        .filter_map(|(field, value)| value.map(|v| (field.name.clone(), v)))
        .collect()
}
