//! Loader types
//!
//! Declarative parser definition types for YAML parsing.

use crate::entity::{EntityDefinition, EntityGraph, FieldDefinition, FollowerDefinition};
use crate::error::Result;
use crate::extract::{FieldMatches, RequiredFields};
use crate::fetch::DownloadSettings;
use crate::http::{HttpFetcherConfig, RateLimiterConfig, DEFAULT_REMOTE_INTERVAL};
use crate::pagination::PaginatorSettings;
use crate::parser::ParserSettings;
use crate::types::{BackoffType, EmptyJoin, Nesting, StringMap};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

// ============================================================================
// Parser Definition
// ============================================================================

/// Top-level parser definition
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ParserDefinition {
    /// Definition name
    pub name: String,
    /// Defaults for followers and link fetching
    #[serde(default)]
    pub settings: SettingsDefinition,
    /// HTTP client configuration
    #[serde(default)]
    pub http: HttpDefinition,
    /// Pagination, if inputs span several pages
    #[serde(default)]
    pub paginator: Option<PaginatorDefinition>,
    /// Save every fetched document
    #[serde(default)]
    pub downloads: Option<DownloadDefinition>,
    /// Top-level entities
    pub entities: Vec<EntityDef>,
}

impl ParserDefinition {
    /// Build the entity graph
    pub fn entity_graph(&self) -> Result<EntityGraph> {
        let mut graph = EntityGraph::new();
        for entity in &self.entities {
            graph.add_entity(entity.to_definition()?);
        }
        Ok(graph)
    }

    /// Parser settings, including pagination and downloads
    pub fn parser_settings(&self) -> ParserSettings {
        let s = &self.settings;
        let mut settings = ParserSettings::new()
            .with_nesting(s.nesting)
            .with_ignore_following_errors(s.ignore_following_errors)
            .with_remote_interval(Duration::from_millis(s.remote_interval_ms))
            .with_empty_join(s.empty_join);
        if let Some(threads) = s.download_threads {
            settings = settings.with_download_threads(threads);
        }
        if let Some(paginator) = &self.paginator {
            settings = settings.with_paginator(paginator.to_settings());
        }
        if let Some(downloads) = &self.downloads {
            settings = settings.with_downloads(downloads.to_settings());
        }
        settings
    }

    /// HTTP fetcher configuration
    pub fn http_config(&self) -> HttpFetcherConfig {
        let http = &self.http;
        let defaults = HttpFetcherConfig::default();
        HttpFetcherConfig {
            timeout: Duration::from_secs(http.timeout_secs),
            max_retries: http.max_retries,
            initial_backoff: Duration::from_millis(http.initial_backoff_ms),
            max_backoff: Duration::from_millis(http.max_backoff_ms),
            backoff_type: http.backoff,
            rate_limit: http
                .rate_limit_rps
                .map(|rps| RateLimiterConfig::new(rps, http.burst.unwrap_or(rps))),
            default_headers: http.headers.clone(),
            user_agent: http.user_agent.clone().unwrap_or(defaults.user_agent),
        }
    }
}

// ============================================================================
// Settings Definition
// ============================================================================

/// Parser-wide defaults
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct SettingsDefinition {
    pub nesting: Nesting,
    pub ignore_following_errors: bool,
    pub download_threads: Option<usize>,
    /// Minimum milliseconds between two requests to the same host
    pub remote_interval_ms: u64,
    pub empty_join: EmptyJoin,
}

impl Default for SettingsDefinition {
    fn default() -> Self {
        let settings = ParserSettings::default();
        Self {
            nesting: settings.nesting,
            ignore_following_errors: settings.ignore_following_errors,
            download_threads: settings.download_threads,
            remote_interval_ms: DEFAULT_REMOTE_INTERVAL.as_millis() as u64,
            empty_join: settings.empty_join,
        }
    }
}

// ============================================================================
// HTTP Definition
// ============================================================================

/// HTTP client configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HttpDefinition {
    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    #[serde(default = "default_retries")]
    pub max_retries: u32,
    #[serde(default)]
    pub backoff: BackoffType,
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
    /// Throughput cap across all hosts (requests per second)
    #[serde(default)]
    pub rate_limit_rps: Option<u32>,
    #[serde(default)]
    pub burst: Option<u32>,
    #[serde(default)]
    pub user_agent: Option<String>,
    /// Headers sent with every request
    #[serde(default)]
    pub headers: StringMap,
}

impl Default for HttpDefinition {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            max_retries: default_retries(),
            backoff: BackoffType::default(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
            rate_limit_rps: None,
            burst: None,
            user_agent: None,
            headers: StringMap::new(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

fn default_retries() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    100
}

fn default_max_backoff() -> u64 {
    60_000
}

// ============================================================================
// Paginator Definition
// ============================================================================

/// Pagination configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PaginatorDefinition {
    /// Values read from every page; `next_page`, `next_page_number`,
    /// `current_page` and `current_page_number` drive pagination
    #[serde(default)]
    pub fields: Vec<FieldDef>,
    /// Maximum pages visited, 0 for no limit
    #[serde(default)]
    pub follow_count: u32,
    #[serde(default)]
    pub url_testing: bool,
    #[serde(default)]
    pub page_param: Option<String>,
    #[serde(default = "default_start_page")]
    pub start_page: u32,
    #[serde(default)]
    pub page_size: Option<u32>,
    #[serde(default)]
    pub page_size_param: Option<String>,
}

fn default_start_page() -> u32 {
    1
}

impl PaginatorDefinition {
    pub fn to_settings(&self) -> PaginatorSettings {
        PaginatorSettings {
            fields: self.fields.iter().map(FieldDef::to_field).collect(),
            follow_count: self.follow_count,
            url_testing: self.url_testing,
            page_param: self.page_param.clone(),
            start_page: self.start_page,
            ideal_page_size: self.page_size,
            page_size_param: self.page_size_param.clone(),
        }
    }
}

// ============================================================================
// Download Definition
// ============================================================================

/// Where fetched documents are saved
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DownloadDefinition {
    pub dir: PathBuf,
    #[serde(default)]
    pub file_name_pattern: Option<String>,
    #[serde(default)]
    pub follower_pattern: Option<String>,
    #[serde(default)]
    pub extension: Option<String>,
    #[serde(default = "default_overwrite")]
    pub overwrite: bool,
    #[serde(default)]
    pub batch_id: Option<String>,
}

fn default_overwrite() -> bool {
    true
}

impl DownloadDefinition {
    pub fn to_settings(&self) -> DownloadSettings {
        let defaults = DownloadSettings::default();
        DownloadSettings {
            dir: self.dir.clone(),
            file_name_pattern: self
                .file_name_pattern
                .clone()
                .unwrap_or(defaults.file_name_pattern),
            follower_pattern: self
                .follower_pattern
                .clone()
                .unwrap_or(defaults.follower_pattern),
            extension: self.extension.clone(),
            overwrite: self.overwrite,
            batch_id: self.batch_id.clone(),
            parse_date: None,
        }
    }
}

// ============================================================================
// Entity Definition
// ============================================================================

/// A field, either `name` (path equals name) or `{name, path}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldDef {
    Named(String),
    Mapped { name: String, path: String },
}

impl FieldDef {
    pub fn name(&self) -> &str {
        match self {
            Self::Named(name) | Self::Mapped { name, .. } => name,
        }
    }

    pub fn to_field(&self) -> FieldDefinition {
        match self {
            Self::Named(name) => FieldDefinition::named(name.clone()),
            Self::Mapped { name, path } => FieldDefinition::new(name.clone(), path.clone()),
        }
    }
}

/// Record filter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterDef {
    /// Keep records with a value for every listed field
    Require { require: Vec<String> },
    /// Keep records whose field matches a regular expression
    Matches { field: String, matches: String },
}

/// Entity declaration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EntityDef {
    pub name: String,
    /// Path of the record array; the document root when absent
    #[serde(default)]
    pub record_path: Option<String>,
    pub fields: Vec<FieldDef>,
    #[serde(default)]
    pub nesting: Option<Nesting>,
    #[serde(default)]
    pub ignore_following_errors: Option<bool>,
    #[serde(default)]
    pub filters: Vec<FilterDef>,
    #[serde(default)]
    pub followers: Vec<FollowerDef>,
}

impl EntityDef {
    pub fn to_definition(&self) -> Result<EntityDefinition> {
        let mut entity = EntityDefinition::new(self.name.clone());
        if let Some(path) = &self.record_path {
            entity.set_record_path(path.clone());
        }
        for field in &self.fields {
            let field = field.to_field();
            entity.add_field(field.name, field.path);
        }
        if let Some(nesting) = self.nesting {
            entity.set_nesting(nesting);
        }
        if let Some(ignore) = self.ignore_following_errors {
            entity.set_ignore_following_errors(ignore);
        }
        for filter in &self.filters {
            entity = match filter {
                FilterDef::Require { require } => {
                    entity.with_filter(RequiredFields::new(require.iter().cloned()))
                }
                FilterDef::Matches { field, matches } => {
                    entity.with_filter(FieldMatches::new(field.clone(), matches)?)
                }
            };
        }
        for follower in &self.followers {
            entity = entity.with_follower(follower.to_definition()?);
        }
        Ok(entity)
    }
}

/// A link followed from an entity field
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FollowerDef {
    pub link_field: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub params: StringMap,
    #[serde(default)]
    pub nesting: Option<Nesting>,
    #[serde(default)]
    pub ignore_following_errors: Option<bool>,
    pub entities: Vec<EntityDef>,
}

impl FollowerDef {
    pub fn to_definition(&self) -> Result<FollowerDefinition> {
        let mut follower = FollowerDefinition::new(self.link_field.clone());
        if let Some(base_url) = &self.base_url {
            follower.set_base_url(base_url.clone());
        }
        for (name, value) in &self.params {
            follower.add_param(name.clone(), value.clone());
        }
        if let Some(nesting) = self.nesting {
            follower.set_nesting(nesting);
        }
        if let Some(ignore) = self.ignore_following_errors {
            follower.set_ignore_following_errors(ignore);
        }
        for entity in &self.entities {
            follower = follower.with_entity(entity.to_definition()?);
        }
        Ok(follower)
    }
}
