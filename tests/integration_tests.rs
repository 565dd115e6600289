//! Integration tests using mock HTTP server
//!
//! Tests the full end-to-end flow: YAML definition → HTTP requests →
//! extraction, link following and nesting → JSON/Parquet output

use entity_harvest::fetch::FileFetcher;
use entity_harvest::http::HttpFetcher;
use entity_harvest::output::{results_to_json, write_results_to_parquet};
use entity_harvest::{
    load_definition_from_str, EntityParser, Error, Fetcher, JsonExtractor, ParserDefinition,
    Request, Results,
};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const STATIONS: &str = r#"
name: fuel-stations
settings:
  nesting: join
  remote_interval_ms: 1
http:
  max_retries: 1
  initial_backoff_ms: 1
entities:
  - name: Station
    record_path: stations
    fields:
      - id
      - name
      - { name: fuel_url, path: links.fuel }
    followers:
      - link_field: fuel_url
        entities:
          - name: Fuel
            record_path: fuels
            fields: [kind, price]
"#;

async fn mount_stations(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/stations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "stations": [
                {"id": 1, "name": "Central", "links": {"fuel": "/fuel/1"}},
                {"id": 2, "name": "North", "links": {"fuel": "/fuel/2"}}
            ]
        })))
        .mount(server)
        .await;

    Mock::given(method("GET"))
        .and(path("/fuel/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "fuels": [{"kind": "diesel", "price": 1.5}, {"kind": "petrol", "price": 1.7}]
        })))
        .mount(server)
        .await;
}

fn http_parser(def: &ParserDefinition) -> EntityParser {
    EntityParser::new(
        &def.entity_graph().unwrap(),
        def.parser_settings(),
        Arc::new(HttpFetcher::with_config(def.http_config()).unwrap()),
        Arc::new(JsonExtractor::new()),
    )
    .unwrap()
}

async fn run(def: &ParserDefinition, url: &str) -> entity_harvest::Result<Results> {
    http_parser(def).parse_all(Request::parse(url)?).await
}

// ============================================================================
// Link Following
// ============================================================================

#[tokio::test]
async fn test_join_follows_links_over_http() {
    let server = MockServer::start().await;
    mount_stations(&server).await;
    Mock::given(method("GET"))
        .and(path("/fuel/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "fuels": [{"kind": "lpg", "price": 0.9}]
        })))
        .mount(&server)
        .await;

    let def = load_definition_from_str(STATIONS).unwrap();
    let results = run(&def, &format!("{}/stations", server.uri())).await.unwrap();

    let stations = results.get("station").unwrap();
    assert_eq!(
        stations.headers(),
        ["id", "name", "fuel_url", "kind", "price"]
    );
    assert_eq!(
        stations.column("kind").unwrap(),
        vec![Some("diesel"), Some("petrol"), Some("lpg")]
    );
    assert_eq!(
        stations.column("price").unwrap(),
        vec![Some("1.5"), Some("1.7"), Some("0.9")]
    );
}

#[tokio::test]
async fn test_failed_link_is_ignored_by_default() {
    let server = MockServer::start().await;
    mount_stations(&server).await;
    Mock::given(method("GET"))
        .and(path("/fuel/2"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let def = load_definition_from_str(STATIONS).unwrap();
    let results = run(&def, &format!("{}/stations", server.uri())).await.unwrap();

    let stations = results.get("Station").unwrap();
    assert_eq!(stations.len(), 3);
    assert_eq!(stations.record(2).unwrap().get("name"), Some("North"));
    assert_eq!(stations.record(2).unwrap().get("kind"), None);
}

#[tokio::test]
async fn test_failed_link_fails_parse_when_not_ignored() {
    let server = MockServer::start().await;
    mount_stations(&server).await;
    Mock::given(method("GET"))
        .and(path("/fuel/2"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let yaml = STATIONS.replace("  nesting: join", "  nesting: join\n  ignore_following_errors: false");
    let def = load_definition_from_str(&yaml).unwrap();
    let err = run(&def, &format!("{}/stations", server.uri()))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Link { .. }));
    assert_eq!(err.status(), Some(404));
}

#[tokio::test]
async fn test_link_nesting_to_json() {
    let server = MockServer::start().await;
    mount_stations(&server).await;
    Mock::given(method("GET"))
        .and(path("/fuel/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"fuels": []})))
        .mount(&server)
        .await;

    let yaml = STATIONS.replace("nesting: join", "nesting: replace_link");
    let def = load_definition_from_str(&yaml).unwrap();
    let results = run(&def, &format!("{}/stations", server.uri())).await.unwrap();

    assert_eq!(
        results_to_json(&results),
        json!({
            "Station": [
                {
                    "id": "1",
                    "name": "Central",
                    "_linked": {"Fuel": [
                        {"kind": "diesel", "price": "1.5"},
                        {"kind": "petrol", "price": "1.7"}
                    ]}
                },
                {"id": "2", "name": "North", "_linked": {"Fuel": []}}
            ]
        })
    );
}

#[tokio::test]
async fn test_cookies_are_passed_to_followed_links() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/stations"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("set-cookie", "session=abc; Path=/")
                .set_body_json(json!({
                    "stations": [{"id": 1, "name": "Central", "links": {"fuel": "/fuel/1"}}]
                })),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/fuel/1"))
        .and(header("cookie", "session=abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "fuels": [{"kind": "diesel", "price": 1.5}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let def = load_definition_from_str(STATIONS).unwrap();
    let results = run(&def, &format!("{}/stations", server.uri())).await.unwrap();
    assert_eq!(
        results.get("station").unwrap().column("kind").unwrap(),
        vec![Some("diesel")]
    );
}

// ============================================================================
// Pagination
// ============================================================================

#[tokio::test]
async fn test_next_page_links() {
    let server = MockServer::start().await;
    for page in 1..=3 {
        let next = if page < 3 {
            json!(format!("/items?page={}", page + 1))
        } else {
            json!(null)
        };
        Mock::given(method("GET"))
            .and(path("/items"))
            .and(query_param("page", page.to_string()))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "items": [{"id": format!("{page}-a")}, {"id": format!("{page}-b")}],
                "paging": {"next": next}
            })))
            .expect(1)
            .mount(&server)
            .await;
    }

    let yaml = r#"
name: items
settings:
  remote_interval_ms: 1
paginator:
  fields:
    - { name: next_page, path: paging.next }
entities:
  - name: Item
    record_path: items
    fields: [id]
"#;
    let def = load_definition_from_str(yaml).unwrap();
    let results = run(&def, &format!("{}/items?page=1", server.uri())).await.unwrap();

    assert_eq!(
        results.get("item").unwrap().column("id").unwrap(),
        vec![Some("1-a"), Some("1-b"), Some("2-a"), Some("2-b"), Some("3-a"), Some("3-b")]
    );
}

#[tokio::test]
async fn test_page_numbers_with_page_size() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(query_param("p", "1"))
        .and(query_param("size", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "a"}, {"id": "b"}]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(query_param("p", "2"))
        .and(query_param("size", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": "c"}]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let yaml = r#"
name: items
settings:
  remote_interval_ms: 1
paginator:
  page_param: p
  page_size: 2
  page_size_param: size
entities:
  - name: Item
    record_path: items
    fields: [id]
"#;
    let def = load_definition_from_str(yaml).unwrap();
    let results = run(&def, &format!("{}/items", server.uri())).await.unwrap();
    assert_eq!(results.get("item").unwrap().len(), 3);
}

// ============================================================================
// Output and Downloads
// ============================================================================

#[tokio::test]
async fn test_results_to_parquet() {
    let server = MockServer::start().await;
    mount_stations(&server).await;
    Mock::given(method("GET"))
        .and(path("/fuel/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"fuels": []})))
        .mount(&server)
        .await;

    let def = load_definition_from_str(STATIONS).unwrap();
    let results = run(&def, &format!("{}/stations", server.uri())).await.unwrap();

    let dir = tempfile::tempdir().unwrap();
    let paths = write_results_to_parquet(dir.path(), &results, None).unwrap();
    assert_eq!(paths, vec![dir.path().join("Station.parquet")]);
    assert!(paths[0].metadata().unwrap().len() > 0);
}

#[tokio::test]
async fn test_downloaded_pages_can_be_parsed_again() {
    let server = MockServer::start().await;
    mount_stations(&server).await;
    Mock::given(method("GET"))
        .and(path("/fuel/2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"fuels": []})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let yaml = format!(
        "{STATIONS}downloads:\n  dir: {}\n  extension: json\n",
        dir.path().display()
    );
    let def = load_definition_from_str(&yaml).unwrap();
    run(&def, &format!("{}/stations", server.uri())).await.unwrap();

    let page = dir.path().join("file_1.json");
    assert!(page.exists());
    assert!(dir.path().join("file_1").is_dir());

    let offline = load_definition_from_str(
        r#"
name: offline
entities:
  - name: Station
    record_path: stations
    fields: [id, name]
"#,
    )
    .unwrap();
    let fetcher: Arc<dyn Fetcher> = Arc::new(FileFetcher::new());
    let parser = EntityParser::new(
        &offline.entity_graph().unwrap(),
        offline.parser_settings(),
        fetcher,
        Arc::new(JsonExtractor::new()),
    )
    .unwrap();

    let results = parser
        .parse_all(Request::parse(page.to_str().unwrap()).unwrap())
        .await
        .unwrap();
    assert_eq!(
        results.get("station").unwrap().column("name").unwrap(),
        vec![Some("Central"), Some("North")]
    );
}
