//! Tests for follow module

use super::*;
use crate::entity::{
    EntityDefinition, EntityGraph, FollowerDefinition, ResolvedEntity, ResolvedOptions,
};
use crate::error::Error;
use crate::extract::{FilterContext, JsonExtractor, RequiredFields};
use crate::fetch::{Fetcher, MemoryFetcher};
use crate::http::HostRateLimiter;
use crate::results::{NestedRow, Record};
use crate::types::{EmptyJoin, Nesting, Row, StringMap};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

const FUEL_1: &str = r#"{"fuels": [{"kind": "diesel", "price": 1.5}, {"kind": "petrol", "price": 1.7}]}"#;
const FUEL_2: &str = r#"{"fuels": [{"kind": "lpg", "price": 0.9}]}"#;
const FUEL_3: &str = r#"{"fuels": []}"#;

fn row(values: &[Option<&str>]) -> Row {
    values.iter().map(|v| v.map(str::to_string)).collect()
}

fn station_rows() -> Vec<Row> {
    vec![
        row(&[Some("1"), Some("Central"), Some("/fuel/1")]),
        row(&[Some("2"), Some("North"), Some("/fuel/2")]),
    ]
}

fn fuel() -> EntityDefinition {
    EntityDefinition::new("Fuel")
        .with_record_path("fuels")
        .with_field("kind", "kind")
        .with_field("price", "price")
}

fn station(follower: FollowerDefinition) -> Vec<ResolvedEntity> {
    let mut graph = EntityGraph::new();
    graph.add_entity(
        EntityDefinition::new("Station")
            .with_field("id", "id")
            .with_field("name", "name")
            .with_field("fuel_url", "fuel")
            .with_follower(follower),
    );
    graph.resolve(&ResolvedOptions::default()).unwrap()
}

fn fuel_follower(nesting: Nesting, ignore: bool) -> FollowerDefinition {
    FollowerDefinition::new("fuel_url")
        .with_nesting(nesting)
        .with_ignore_following_errors(ignore)
        .with_entity(fuel())
}

fn fixtures() -> MemoryFetcher {
    MemoryFetcher::new()
        .with_page("http://stations.test/fuel/1", FUEL_1)
        .with_page("http://stations.test/fuel/2", FUEL_2)
        .with_page("http://stations.test/fuel/3", FUEL_3)
}

fn origin() -> Origin {
    Origin {
        url: Url::parse("http://stations.test/list").unwrap(),
        cookies: StringMap::new(),
        page_number: 1,
        saved_as: None,
    }
}

fn coordinator(fetcher: Arc<MemoryFetcher>, interval: Duration) -> LinkCoordinator {
    LinkCoordinator::new(
        fetcher,
        Arc::new(JsonExtractor::new()),
        WorkerPool::new(4),
        HostRateLimiter::new(interval),
    )
}

fn rows_of(outcomes: Vec<crate::error::Result<NestedRow>>) -> Vec<Row> {
    outcomes
        .into_iter()
        .flat_map(|nested| nested.unwrap().rows)
        .collect()
}

// ============================================================================
// Nesting Through Links
// ============================================================================

#[tokio::test]
async fn test_join_multiplies_parent_rows() {
    let entities = station(fuel_follower(Nesting::Join, true));
    let coordinator = coordinator(Arc::new(fixtures()), Duration::ZERO);

    let outcomes = coordinator
        .nest_rows(&entities[0], station_rows(), &origin(), 0)
        .await;
    let rows = rows_of(outcomes);

    assert_eq!(
        entities[0].output_headers(),
        ["id", "name", "fuel_url", "kind", "price"]
    );
    assert_eq!(
        rows,
        vec![
            row(&[Some("1"), Some("Central"), Some("/fuel/1"), Some("diesel"), Some("1.5")]),
            row(&[Some("1"), Some("Central"), Some("/fuel/1"), Some("petrol"), Some("1.7")]),
            row(&[Some("2"), Some("North"), Some("/fuel/2"), Some("lpg"), Some("0.9")]),
        ]
    );
    assert_eq!(coordinator.counters().links_followed, 2);
}

#[tokio::test]
async fn test_replace_join_drops_link_field() {
    let entities = station(fuel_follower(Nesting::ReplaceJoin, true));
    let coordinator = coordinator(Arc::new(fixtures()), Duration::ZERO);

    let rows = rows_of(
        coordinator
            .nest_rows(&entities[0], station_rows(), &origin(), 0)
            .await,
    );
    assert_eq!(entities[0].output_headers(), ["id", "name", "kind", "price"]);
    assert_eq!(rows[2], row(&[Some("2"), Some("North"), Some("lpg"), Some("0.9")]));
}

#[tokio::test]
async fn test_link_keeps_rows_and_attaches_children() {
    let entities = station(fuel_follower(Nesting::Link, true));
    let coordinator = coordinator(Arc::new(fixtures()), Duration::ZERO);

    let outcomes = coordinator
        .nest_rows(&entities[0], station_rows(), &origin(), 0)
        .await;
    let nested: Vec<NestedRow> = outcomes.into_iter().map(Result::unwrap).collect();

    assert_eq!(nested[0].rows, vec![station_rows()[0].clone()]);
    assert_eq!(nested[0].linked.get("fuel").unwrap().len(), 2);
    assert_eq!(nested[1].linked.get("FUEL").unwrap().len(), 1);
}

#[tokio::test]
async fn test_empty_child_follows_empty_join_policy() {
    let entities = station(fuel_follower(Nesting::Join, true));
    let rows = vec![row(&[Some("3"), Some("East"), Some("/fuel/3")])];

    let keep = coordinator(Arc::new(fixtures()), Duration::ZERO);
    let kept = rows_of(keep.nest_rows(&entities[0], rows.clone(), &origin(), 0).await);
    assert_eq!(kept, vec![row(&[Some("3"), Some("East"), Some("/fuel/3"), None, None])]);

    let drop = coordinator(Arc::new(fixtures()), Duration::ZERO)
        .with_empty_join(EmptyJoin::DropParent);
    let dropped = rows_of(drop.nest_rows(&entities[0], rows, &origin(), 0).await);
    assert!(dropped.is_empty());
}

#[tokio::test]
async fn test_missing_link_value_keeps_parent() {
    let entities = station(fuel_follower(Nesting::Join, true));
    let fetcher = Arc::new(fixtures());
    let coordinator = coordinator(fetcher.clone(), Duration::ZERO)
        .with_empty_join(EmptyJoin::DropParent);

    let rows = vec![row(&[Some("4"), Some("West"), None]), row(&[Some("5"), None, Some("  ")])];
    let out = rows_of(coordinator.nest_rows(&entities[0], rows, &origin(), 0).await);

    assert_eq!(out.len(), 2);
    assert_eq!(out[0], row(&[Some("4"), Some("West"), None, None, None]));
    assert!(fetcher.fetched_urls().is_empty());
}

// ============================================================================
// Error Policy
// ============================================================================

#[tokio::test]
async fn test_ignored_link_error_keeps_parent() {
    let entities = station(fuel_follower(Nesting::Join, true));
    let fetcher = Arc::new(fixtures().with_failure("http://stations.test/fuel/2"));
    let coordinator = coordinator(fetcher, Duration::ZERO);

    let rows = rows_of(
        coordinator
            .nest_rows(&entities[0], station_rows(), &origin(), 0)
            .await,
    );
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[2], row(&[Some("2"), Some("North"), Some("/fuel/2"), None, None]));

    let counters = coordinator.counters();
    assert_eq!(counters.links_followed, 1);
    assert_eq!(counters.link_errors, 1);
}

#[tokio::test]
async fn test_link_error_fails_only_that_row() {
    let entities = station(fuel_follower(Nesting::Join, false));
    let fetcher = Arc::new(fixtures().with_failure("http://stations.test/fuel/2"));
    let coordinator = coordinator(fetcher, Duration::ZERO);

    let outcomes = coordinator
        .nest_rows(&entities[0], station_rows(), &origin(), 0)
        .await;

    assert_eq!(outcomes[0].as_ref().unwrap().rows.len(), 2);
    match &outcomes[1] {
        Err(Error::Link { url, source }) => {
            assert_eq!(url, "/fuel/2");
            assert_eq!(source.status(), Some(500));
        }
        other => panic!("expected link error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_unparseable_link_follows_error_policy() {
    let entities = station(
        fuel_follower(Nesting::Join, false).with_base_url("http://stations.test/"),
    );
    let coordinator = coordinator(Arc::new(fixtures()), Duration::ZERO);

    let rows = vec![row(&[Some("9"), Some("Bad"), Some("http://[broken")])];
    let outcomes = coordinator.nest_rows(&entities[0], rows, &origin(), 0).await;
    assert!(matches!(outcomes[0], Err(Error::Link { .. })));
}

// ============================================================================
// Recursion and Filters
// ============================================================================

#[tokio::test]
async fn test_nested_followers() {
    let supplier = EntityDefinition::new("Supplier").with_field("supplier", "name");
    let fuel_with_supplier = EntityDefinition::new("Fuel")
        .with_record_path("fuels")
        .with_field("kind", "kind")
        .with_field("supplier_url", "supplier")
        .with_follower(
            FollowerDefinition::new("supplier_url")
                .with_nesting(Nesting::ReplaceJoin)
                .with_entity(supplier),
        );
    let entities = station(
        FollowerDefinition::new("fuel_url")
            .with_nesting(Nesting::Join)
            .with_entity(fuel_with_supplier),
    );

    let fetcher = Arc::new(
        MemoryFetcher::new()
            .with_page(
                "http://stations.test/fuel/1",
                r#"{"fuels": [{"kind": "diesel", "supplier": "/suppliers/7"}]}"#,
            )
            .with_page("http://stations.test/suppliers/7", r#"{"name": "Acme"}"#),
    );
    let coordinator = coordinator(fetcher, Duration::ZERO);

    let rows = vec![station_rows()[0].clone()];
    let out = rows_of(coordinator.nest_rows(&entities[0], rows, &origin(), 0).await);

    assert_eq!(
        entities[0].output_headers(),
        ["id", "name", "fuel_url", "kind", "supplier"]
    );
    assert_eq!(
        out,
        vec![row(&[Some("1"), Some("Central"), Some("/fuel/1"), Some("diesel"), Some("Acme")])]
    );
    assert_eq!(coordinator.counters().links_followed, 2);
}

#[tokio::test]
async fn test_filters_apply_to_followed_entities() {
    let cheap = |record: &Record, ctx: &FilterContext| {
        ctx.depth == 1
            && record
                .get("price")
                .and_then(|p| p.parse::<f64>().ok())
                .is_some_and(|p| p < 1.6)
    };
    let entities = station(
        FollowerDefinition::new("fuel_url")
            .with_nesting(Nesting::Join)
            .with_entity(fuel().with_filter(cheap)),
    );
    let coordinator = coordinator(Arc::new(fixtures()), Duration::ZERO);

    let rows = rows_of(
        coordinator
            .nest_rows(&entities[0], station_rows(), &origin(), 0)
            .await,
    );
    let kinds: Vec<_> = rows.iter().map(|r| r[3].clone()).collect();
    assert_eq!(kinds, vec![Some("diesel".to_string()), Some("lpg".to_string())]);
}

#[test]
fn test_filter_top_level_rows() {
    let mut graph = EntityGraph::new();
    graph.add_entity(
        EntityDefinition::new("Station")
            .with_field("id", "id")
            .with_field("name", "name")
            .with_filter(RequiredFields::new(["name"])),
    );
    let entities = graph.resolve(&ResolvedOptions::default()).unwrap();
    let coordinator = coordinator(Arc::new(MemoryFetcher::new()), Duration::ZERO);

    let kept = coordinator.filter(
        &entities[0],
        vec![row(&[Some("1"), Some("A")]), row(&[Some("2"), None])],
        &origin(),
        0,
    );
    assert_eq!(kept, vec![row(&[Some("1"), Some("A")])]);
}

// ============================================================================
// Concurrency and Rate Limiting
// ============================================================================

#[tokio::test]
async fn test_pool_bounds_concurrent_fetches() {
    let entities = station(fuel_follower(Nesting::Link, true));
    let mut fetcher = MemoryFetcher::new().with_delay(Duration::from_millis(20));
    let mut rows = Vec::new();
    for i in 0..8 {
        let url = format!("http://stations.test/fuel/{i}");
        fetcher = fetcher.with_page(&url, FUEL_2);
        rows.push(row(&[Some("1"), Some("s"), Some(url.as_str())]));
    }
    let fetcher = Arc::new(fetcher);

    let coordinator = LinkCoordinator::new(
        fetcher.clone(),
        Arc::new(JsonExtractor::new()),
        WorkerPool::new(2),
        HostRateLimiter::new(Duration::ZERO),
    );
    let outcomes = coordinator.nest_rows(&entities[0], rows, &origin(), 0).await;

    assert!(outcomes.iter().all(Result::is_ok));
    assert_eq!(fetcher.fetched_urls().len(), 8);
    assert_eq!(fetcher.max_in_flight(), 2);
}

#[tokio::test]
async fn test_same_host_requests_are_spaced() {
    let interval = Duration::from_millis(25);
    let entities = station(fuel_follower(Nesting::Link, true));
    let fetcher = Arc::new(fixtures());
    let coordinator = coordinator(fetcher.clone(), interval);

    let rows = vec![
        row(&[Some("1"), None, Some("/fuel/1")]),
        row(&[Some("2"), None, Some("/fuel/2")]),
        row(&[Some("3"), None, Some("/fuel/3")]),
    ];
    coordinator.nest_rows(&entities[0], rows, &origin(), 0).await;

    let mut starts: Vec<Instant> = fetcher.fetch_log().iter().map(|r| r.started).collect();
    starts.sort();
    assert_eq!(starts.len(), 3);
    // allow for the time between reserving a slot and entering the fetcher
    let slack = Duration::from_millis(1);
    for pair in starts.windows(2) {
        assert!(pair[1] - pair[0] + slack >= interval, "gap {:?}", pair[1] - pair[0]);
    }
}

#[tokio::test]
async fn test_different_hosts_are_not_spaced() {
    let interval = Duration::from_millis(300);
    let entities = station(fuel_follower(Nesting::Link, true));
    let fetcher = Arc::new(
        MemoryFetcher::new()
            .with_page("http://a.test/fuel", FUEL_1)
            .with_page("http://b.test/fuel", FUEL_2)
            .with_page("http://c.test/fuel", FUEL_3),
    );
    let coordinator = coordinator(fetcher.clone(), interval);

    let rows = vec![
        row(&[Some("1"), None, Some("http://a.test/fuel")]),
        row(&[Some("2"), None, Some("http://b.test/fuel")]),
        row(&[Some("3"), None, Some("http://c.test/fuel")]),
    ];
    let start = Instant::now();
    coordinator.nest_rows(&entities[0], rows, &origin(), 0).await;

    assert_eq!(fetcher.fetched_urls().len(), 3);
    assert!(start.elapsed() < interval);
}

#[tokio::test]
async fn test_throttle_hook_sees_statuses() {
    let entities = station(fuel_follower(Nesting::Link, true));
    let fetcher = Arc::new(fixtures().with_failure("http://stations.test/fuel/2"));
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let sink = seen.clone();
    let hook = move |host: &str, status: u16, _: &HostRateLimiter| {
        sink.lock().unwrap().push((host.to_string(), status));
    };

    let coordinator = coordinator(fetcher, Duration::ZERO).with_throttle_hook(Arc::new(hook));
    coordinator
        .nest_rows(&entities[0], station_rows(), &origin(), 0)
        .await;

    let mut seen = seen.lock().unwrap().clone();
    seen.sort();
    assert_eq!(
        seen,
        vec![
            ("stations.test".to_string(), 200),
            ("stations.test".to_string(), 500)
        ]
    );
}

#[test]
fn test_adaptive_throttle() {
    let limiter = HostRateLimiter::new(Duration::from_millis(15));
    let throttle = AdaptiveThrottle::new(
        Duration::from_millis(100),
        Duration::from_millis(15),
        Duration::from_millis(150),
    );

    throttle.on_response("h", 429, &limiter);
    assert_eq!(limiter.host_interval("h"), Duration::from_millis(115));
    throttle.on_response("h", 429, &limiter);
    assert_eq!(limiter.host_interval("h"), Duration::from_millis(150));

    throttle.on_response("h", 200, &limiter);
    assert_eq!(limiter.host_interval("h"), Duration::from_millis(125));
    for _ in 0..10 {
        throttle.on_response("h", 200, &limiter);
    }
    assert_eq!(limiter.host_interval("h"), Duration::from_millis(15));

    throttle.on_response("h", 404, &limiter);
    assert_eq!(limiter.host_interval("h"), Duration::from_millis(15));
}

#[test]
fn test_adaptive_throttle_only_slows_the_throttled_host() {
    let limiter = HostRateLimiter::new(Duration::from_millis(15));
    let throttle = AdaptiveThrottle::default();

    throttle.on_response("busy.test", 429, &limiter);
    throttle.on_response("busy.test", 429, &limiter);

    assert_eq!(limiter.host_interval("busy.test"), Duration::from_millis(215));
    assert_eq!(limiter.host_interval("quiet.test"), Duration::from_millis(15));
    assert_eq!(limiter.interval(), Duration::from_millis(15));
}

// ============================================================================
// Link Tasks and Pool
// ============================================================================

#[test]
fn test_link_task_resolution() {
    let entities = station(
        fuel_follower(Nesting::Link, true)
            .with_base_url("https://api.test/v1/")
            .with_param("lang", "en"),
    );
    let follower = &entities[0].followers[0];

    let mut origin = origin();
    origin.cookies.insert("session".into(), "abc".into());
    origin.page_number = 3;

    let task = LinkTask::new(follower, " fuel/1 ", &origin).unwrap();
    assert_eq!(task.request.url.as_str(), "https://api.test/v1/fuel/1");
    assert_eq!(task.request.params.get("lang"), Some(&"en".to_string()));
    assert_eq!(task.request.cookies.get("session"), Some(&"abc".to_string()));
    assert_eq!(task.host, "api.test");
    assert_eq!(task.page_number, 3);

    let absolute = LinkTask::new(follower, "http://other.test:8080/x", &origin).unwrap();
    assert_eq!(absolute.host, "other.test:8080");
}

#[tokio::test]
async fn test_origin_merges_document_cookies() {
    let mut sent = StringMap::new();
    sent.insert("a".into(), "1".into());
    sent.insert("b".into(), "1".into());
    let mut set = StringMap::new();
    set.insert("b".into(), "2".into());

    let fetcher = MemoryFetcher::new().with_page_cookies("http://stations.test/list", "{}", set);
    let request = crate::fetch::Request::new(Url::parse("http://stations.test/list").unwrap())
        .with_cookies(sent);
    let document = fetcher.fetch(&request).await.unwrap();

    let origin = Origin::of(&document, &request, 2);
    assert_eq!(origin.cookies.get("a"), Some(&"1".to_string()));
    assert_eq!(origin.cookies.get("b"), Some(&"2".to_string()));
    assert_eq!(origin.page_number, 2);
}

#[tokio::test]
async fn test_worker_pool() {
    assert_eq!(WorkerPool::new(0).size(), 1);
    assert_eq!(WorkerPool::new(64).size(), MAX_POOL_SIZE);
    let default = WorkerPool::with_default_size();
    assert!(default.size() >= 4 && default.size() <= MAX_POOL_SIZE);

    let pool = WorkerPool::new(2);
    assert_eq!(pool.run(async { 7 }).await.unwrap(), 7);
    assert_eq!(pool.available(), 2);

    pool.close();
    assert!(matches!(pool.run(async {}).await, Err(Error::PoolClosed)));
}
