//! Tests for YAML loader module

use super::*;
use crate::entity::ResolvedOptions;
use crate::error::Error;
use crate::extract::FilterContext;
use crate::results::Record;
use crate::types::{BackoffType, EmptyJoin, Nesting};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

const STATIONS: &str = r#"
name: fuel-stations
entities:
  - name: Station
    record_path: stations
    fields:
      - id
      - name
      - { name: fuel_url, path: links.fuel }
    followers:
      - link_field: fuel_url
        nesting: join
        entities:
          - name: Fuel
            record_path: fuels
            fields: [kind, price]
"#;

// ============================================================================
// Basic Loading Tests
// ============================================================================

#[test]
fn test_load_minimal_definition() {
    let def = load_definition_from_str(STATIONS).unwrap();
    assert_eq!(def.name, "fuel-stations");
    assert_eq!(def.entities.len(), 1);
    assert_eq!(def.entities[0].name, "Station");
    assert_eq!(def.entities[0].record_path.as_deref(), Some("stations"));
    assert_eq!(
        def.entities[0].fields[2],
        FieldDef::Mapped {
            name: "fuel_url".into(),
            path: "links.fuel".into()
        }
    );
    assert!(def.paginator.is_none());
    assert!(def.downloads.is_none());
}

#[test]
fn test_entity_graph_from_definition() {
    let def = load_definition_from_str(STATIONS).unwrap();
    let graph = def.entity_graph().unwrap();

    let station = graph.entity("station").unwrap();
    assert_eq!(station.fields()[0].path, "id");
    assert_eq!(station.fields()[2].path, "links.fuel");
    assert_eq!(station.followers()[0].link_field(), "fuel_url");
    assert_eq!(station.followers()[0].entities().entity_names(), vec!["Fuel"]);

    let resolved = graph.resolve(&ResolvedOptions::default()).unwrap();
    assert_eq!(
        resolved[0].output_headers(),
        ["id", "name", "fuel_url", "kind", "price"]
    );
}

#[test]
fn test_default_settings() {
    let def = load_definition_from_str(STATIONS).unwrap();
    let settings = def.parser_settings();
    assert_eq!(settings.nesting, Nesting::Link);
    assert!(settings.ignore_following_errors);
    assert_eq!(settings.remote_interval, Duration::from_millis(15));
    assert_eq!(settings.empty_join, EmptyJoin::KeepParent);
    assert!(settings.download_threads.is_none());

    let http = def.http_config();
    assert_eq!(http.timeout, Duration::from_secs(30));
    assert_eq!(http.max_retries, 3);
    assert_eq!(http.backoff_type, BackoffType::Exponential);
    assert!(http.rate_limit.is_none());
    assert!(http.user_agent.starts_with("entity-harvest/"));
}

#[test]
fn test_full_definition() {
    let yaml = r#"
name: listings
settings:
  nesting: replace_join
  ignore_following_errors: false
  download_threads: 8
  remote_interval_ms: 250
  empty_join: drop_parent
http:
  timeout_secs: 5
  max_retries: 1
  backoff: linear
  initial_backoff_ms: 50
  rate_limit_rps: 20
  user_agent: harvest-test
  headers:
    Accept: application/json
paginator:
  fields:
    - { name: next_page, path: paging.next }
    - { name: total, path: paging.total }
  follow_count: 10
  url_testing: true
  page_size: 50
  page_size_param: per_page
downloads:
  dir: /tmp/harvest
  extension: json
  batch_id: run-1
entities:
  - name: Item
    fields: [id]
"#;

    let def = load_definition_from_str(yaml).unwrap();
    let settings = def.parser_settings();
    assert_eq!(settings.nesting, Nesting::ReplaceJoin);
    assert!(!settings.ignore_following_errors);
    assert_eq!(settings.download_threads, Some(8));
    assert_eq!(settings.remote_interval, Duration::from_millis(250));
    assert_eq!(settings.empty_join, EmptyJoin::DropParent);

    let paginator = settings.paginator.unwrap();
    assert_eq!(paginator.fields.len(), 2);
    assert!(paginator.reads("next_page"));
    assert_eq!(paginator.follow_count, 10);
    assert!(paginator.url_testing);
    assert_eq!(paginator.ideal_page_size, Some(50));
    assert_eq!(paginator.page_size_param.as_deref(), Some("per_page"));

    let downloads = settings.downloads.unwrap();
    assert_eq!(downloads.dir.to_str(), Some("/tmp/harvest"));
    assert_eq!(downloads.file_name_pattern, "file_{page}");
    assert_eq!(downloads.extension.as_deref(), Some("json"));
    assert!(downloads.overwrite);

    let http = def.http_config();
    assert_eq!(http.timeout, Duration::from_secs(5));
    assert_eq!(http.backoff_type, BackoffType::Linear);
    assert_eq!(http.initial_backoff, Duration::from_millis(50));
    assert_eq!(http.rate_limit.unwrap().requests_per_second, 20);
    assert_eq!(http.user_agent, "harvest-test");
    assert_eq!(
        http.default_headers.get("Accept").map(String::as_str),
        Some("application/json")
    );
}

#[test]
fn test_follower_overrides() {
    let yaml = r#"
name: nested
entities:
  - name: Station
    fields: [id, link]
    nesting: join
    followers:
      - link_field: link
        base_url: https://api.example.com/v1/
        params: { lang: en }
        ignore_following_errors: false
        entities:
          - name: Detail
            fields: [value]
"#;

    let def = load_definition_from_str(yaml).unwrap();
    let resolved = def
        .entity_graph()
        .unwrap()
        .resolve(&ResolvedOptions::default())
        .unwrap();
    let follower = &resolved[0].followers[0];
    assert_eq!(follower.options.nesting, Nesting::Join);
    assert!(!follower.options.ignore_following_errors);
    assert_eq!(
        follower.base_url,
        Some(Url::parse("https://api.example.com/v1/").unwrap())
    );
    assert_eq!(follower.params.get("lang").map(String::as_str), Some("en"));
}

#[test]
fn test_filters() {
    let yaml = r#"
name: filtered
entities:
  - name: Item
    fields: [id, kind]
    filters:
      - require: [id]
      - field: kind
        matches: "^(diesel|lpg)$"
"#;

    let def = load_definition_from_str(yaml).unwrap();
    let resolved = def
        .entity_graph()
        .unwrap()
        .resolve(&ResolvedOptions::default())
        .unwrap();
    let item = &resolved[0];
    assert_eq!(item.filters.len(), 2);

    let context = FilterContext {
        entity: "Item".into(),
        url: Url::parse("http://fuel.test/").unwrap(),
        page_number: 1,
        depth: 0,
    };
    let record = |id: Option<&str>, kind: &str| {
        Record::new(
            Arc::clone(&item.headers),
            vec![id.map(str::to_string), Some(kind.to_string())],
        )
    };
    let kept = |r: &Record| item.filters.iter().all(|f| f.accept(r, &context));

    assert!(kept(&record(Some("1"), "diesel")));
    assert!(!kept(&record(None, "diesel")));
    assert!(!kept(&record(Some("2"), "petrol")));
}

// ============================================================================
// Validation Tests
// ============================================================================

#[test]
fn test_reject_empty_name() {
    let yaml = r#"
name: ""
entities:
  - name: Item
    fields: [id]
"#;
    assert!(load_definition_from_str(yaml).is_err());
}

#[test]
fn test_reject_no_entities() {
    let yaml = r#"
name: empty
entities: []
"#;
    let err = load_definition_from_str(yaml).unwrap_err();
    assert!(err.to_string().contains("at least one entity"));
}

#[test]
fn test_reject_duplicate_entity_names() {
    let yaml = r#"
name: dupes
entities:
  - name: Item
    fields: [id]
  - name: ITEM
    fields: [id]
"#;
    let err = load_definition_from_str(yaml).unwrap_err();
    assert!(err.to_string().contains("duplicate entity name"));
}

#[test]
fn test_same_name_allowed_at_different_levels() {
    let yaml = r#"
name: levels
entities:
  - name: Item
    fields: [id, link]
    followers:
      - link_field: link
        entities:
          - name: Item
            fields: [id]
"#;
    assert!(load_definition_from_str(yaml).is_ok());
}

#[test]
fn test_reject_unknown_link_field() {
    let yaml = r#"
name: broken
entities:
  - name: Station
    fields: [id]
    followers:
      - link_field: fuel_url
        entities:
          - name: Fuel
            fields: [kind]
"#;
    let err = load_definition_from_str(yaml).unwrap_err();
    assert!(matches!(err, Error::UnknownField { ref field, .. } if field == "fuel_url"));
}

#[test]
fn test_reject_nested_duplicate() {
    let yaml = r#"
name: broken
entities:
  - name: Station
    fields: [id, link]
    followers:
      - link_field: link
        entities:
          - name: Fuel
            fields: [kind]
          - name: fuel
            fields: [kind]
"#;
    let err = load_definition_from_str(yaml).unwrap_err();
    assert!(err.to_string().contains("Station.link"));
}

#[test]
fn test_reject_invalid_download_threads() {
    let yaml = r#"
name: threads
settings:
  download_threads: 0
entities:
  - name: Item
    fields: [id]
"#;
    let err = load_definition_from_str(yaml).unwrap_err();
    assert!(matches!(err, Error::InvalidConfigValue { .. }));
}

#[test]
fn test_reject_parent_in_page_pattern() {
    let yaml = r#"
name: downloads
downloads:
  dir: out
  file_name_pattern: "{parent}/page_{page}"
entities:
  - name: Item
    fields: [id]
"#;
    assert!(load_definition_from_str(yaml).is_err());
}

#[test]
fn test_reject_invalid_filter_pattern() {
    let yaml = r#"
name: filters
entities:
  - name: Item
    fields: [kind]
    filters:
      - field: kind
        matches: "(unclosed"
"#;
    assert!(load_definition_from_str(yaml).is_err());
}

#[test]
fn test_invalid_yaml() {
    let err = load_definition_from_str("name: [unclosed").unwrap_err();
    assert!(matches!(err, Error::YamlParse(_)));
}

// ============================================================================
// File Loading Tests
// ============================================================================

#[test]
fn test_load_definition_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("stations.yaml");
    std::fs::write(&path, STATIONS).unwrap();

    let def = load_definition(&path).unwrap();
    assert_eq!(def.name, "fuel-stations");
}

#[test]
fn test_load_missing_file() {
    let err = load_definition("/nonexistent/definition.yaml").unwrap_err();
    assert!(matches!(err, Error::FileNotFound { .. }));
}
