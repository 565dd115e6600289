//! Tests for fetch module

use super::*;
use crate::error::Error;
use crate::types::StringMap;
use chrono::TimeZone;
use std::time::Duration;
use tempfile::tempdir;
use url::Url;

// ============================================================================
// Request Tests
// ============================================================================

#[test]
fn test_request_parse_url_and_path() {
    let request = Request::parse("https://example.com/stations?page=1").unwrap();
    assert_eq!(request.url.host_str(), Some("example.com"));
    assert!(!request.is_file());

    let dir = tempdir().unwrap();
    let path = dir.path().join("page.json");
    let request = Request::parse(path.to_str().unwrap()).unwrap();
    assert!(request.is_file());
    assert_eq!(request.url.to_file_path().unwrap(), path);
}

#[test]
fn test_request_full_url_and_host_key() {
    let request = Request::new(Url::parse("http://localhost:8080/a?x=1").unwrap())
        .with_param("page", "2")
        .with_header("Accept", "application/json");

    assert_eq!(
        request.full_url().as_str(),
        "http://localhost:8080/a?x=1&page=2"
    );
    assert_eq!(request.host_key(), "localhost:8080");

    let file = Request::new(Url::parse("file:///tmp/a.json").unwrap());
    assert_eq!(file.host_key(), "file");
}

// ============================================================================
// Fetcher Tests
// ============================================================================

#[tokio::test]
async fn test_file_fetcher() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("page.json");
    std::fs::write(&path, r#"{"ok": true}"#).unwrap();

    let fetcher = FileFetcher::new();
    let request = Request::new(Url::from_file_path(&path).unwrap());
    let document = fetcher.fetch(&request).await.unwrap();
    assert_eq!(document.content, r#"{"ok": true}"#);
    assert_eq!(document.status, 200);
    assert!(fetcher.probe(&request).await.unwrap());

    let missing = Request::new(Url::from_file_path(dir.path().join("nope.json")).unwrap());
    assert!(matches!(
        fetcher.fetch(&missing).await,
        Err(Error::FileNotFound { .. })
    ));
    assert!(!fetcher.probe(&missing).await.unwrap());

    let http = Request::parse("http://example.com").unwrap();
    assert!(fetcher.fetch(&http).await.is_err());
}

#[tokio::test]
async fn test_memory_fetcher() {
    let mut cookies = StringMap::new();
    cookies.insert("session".to_string(), "abc".to_string());

    let fetcher = MemoryFetcher::new()
        .with_page_cookies("http://example.com/a", "A", cookies.clone())
        .with_page("http://example.com/b?page=2", "B")
        .with_failure("http://example.com/c");

    let a = fetcher.fetch(&Request::parse("http://example.com/a").unwrap()).await.unwrap();
    assert_eq!(a.content, "A");
    assert_eq!(a.cookies, cookies);

    let b = Request::parse("http://example.com/b").unwrap().with_param("page", "2");
    assert_eq!(fetcher.fetch(&b).await.unwrap().content, "B");

    let c = Request::parse("http://example.com/c").unwrap();
    assert_eq!(fetcher.fetch(&c).await.unwrap_err().status(), Some(500));
    assert!(!fetcher.probe(&c).await.unwrap());

    assert_eq!(
        fetcher.fetched_urls(),
        vec![
            "http://example.com/a",
            "http://example.com/b?page=2",
            "http://example.com/c"
        ]
    );
}

#[tokio::test]
async fn test_memory_fetcher_tracks_concurrency() {
    let fetcher = std::sync::Arc::new(
        MemoryFetcher::new()
            .with_page("http://example.com/a", "A")
            .with_delay(Duration::from_millis(20)),
    );
    let request = Request::parse("http://example.com/a").unwrap();

    let (a, b) = tokio::join!(fetcher.fetch(&request), fetcher.fetch(&request));
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(fetcher.max_in_flight(), 2);
}

// ============================================================================
// Download Tests
// ============================================================================

#[tokio::test]
async fn test_download_store_pages_and_followers() {
    let dir = tempdir().unwrap();
    let settings = DownloadSettings::new(dir.path())
        .with_file_name_pattern("{batch}/page_{page, 2}")
        .with_extension("json")
        .with_batch_id("run1");
    let store = DownloadStore::new(settings).unwrap();

    let page = Document::new(Url::parse("http://example.com/stations").unwrap(), "[]");
    let saved = store.save_page(&page, 3).await.unwrap();
    assert_eq!(saved, dir.path().join("run1/page_03.json"));
    assert_eq!(std::fs::read_to_string(&saved).unwrap(), "[]");

    let fuel = Document::new(Url::parse("http://example.com/fuel/1").unwrap(), "{}");
    let first = store.save_follower(&fuel, 3, Some(&saved)).await.unwrap();
    let second = store.save_follower(&fuel, 3, Some(&saved)).await.unwrap();
    assert_eq!(first, dir.path().join("run1/page_03/file_1.json"));
    assert_eq!(second, dir.path().join("run1/page_03/file_2.json"));
    assert!(second.exists());
}

#[tokio::test]
async fn test_download_store_no_overwrite() {
    let dir = tempdir().unwrap();
    let date = chrono::Local.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let settings = DownloadSettings::new(dir.path())
        .with_file_name_pattern("{date, %Y%m%d}")
        .with_parse_date(date)
        .with_overwrite(false);
    let store = DownloadStore::new(settings).unwrap();

    let url = Url::parse("http://example.com/").unwrap();
    let path = store.save_page(&Document::new(url.clone(), "first"), 1).await.unwrap();
    store.save_page(&Document::new(url, "second"), 2).await.unwrap();

    assert_eq!(path, dir.path().join("20240301"));
    assert_eq!(std::fs::read_to_string(path).unwrap(), "first");
}

#[test]
fn test_download_store_rejects_parent_in_page_pattern() {
    let settings = DownloadSettings::new("out").with_file_name_pattern("{parent}/x");
    assert!(DownloadStore::new(settings).is_err());
}
