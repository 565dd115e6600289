//! File name patterns for downloaded documents
//!
//! Handles `{token}` and `{token, option}` substitution in download paths.
//!
//! | Token              | Value                                             |
//! |--------------------|---------------------------------------------------|
//! | `{page, pad}`      | page number, optionally zero padded               |
//! | `{entry, pad}`     | number of followed documents saved so far         |
//! | `{date, mask}`     | current date as a strftime mask, epoch millis without one |
//! | `{$name}`          | query parameter `name` of the document URL        |
//! | `{url}`            | URL path, each segment a directory                |
//! | `{url, flat}`      | URL path segments joined by `_`, lower-cased      |
//! | `{url, last}`      | last URL path segment                             |
//! | `{url, N}`         | URL path segment `N` (0-based), lower-cased       |
//! | `{parent}`         | file name of the parent document, no extension    |
//! | `{batch}`          | batch id                                          |

use crate::error::{Error, Result};
use chrono::format::{Item, StrftimeItems};
use chrono::{DateTime, Local};
use regex::Regex;
use std::fmt::Write as _;
use std::sync::LazyLock;
use url::Url;

/// Regex for matching pattern tokens: {name} or {name, option}
static TOKEN_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{\s*(\$?[a-zA-Z_][a-zA-Z0-9_]*)\s*(?:,\s*([^}]*?)\s*)?\}").unwrap()
});

/// Values available to a pattern
#[derive(Debug, Clone, Default)]
pub struct PatternContext {
    pub page: Option<u32>,
    pub entry: Option<u32>,
    pub url: Option<Url>,
    pub parent: Option<String>,
    pub batch: Option<String>,
    /// Date rendered by `{date}`; now when absent
    pub date: Option<DateTime<Local>>,
}

impl PatternContext {
    /// Create a new empty context
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_page(&mut self, page: u32) -> &mut Self {
        self.page = Some(page);
        self
    }

    pub fn set_entry(&mut self, entry: u32) -> &mut Self {
        self.entry = Some(entry);
        self
    }

    pub fn set_url(&mut self, url: Url) -> &mut Self {
        self.url = Some(url);
        self
    }

    pub fn set_parent(&mut self, parent: impl Into<String>) -> &mut Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn set_batch(&mut self, batch: impl Into<String>) -> &mut Self {
        self.batch = Some(batch.into());
        self
    }

    pub fn set_date(&mut self, date: DateTime<Local>) -> &mut Self {
        self.date = Some(date);
        self
    }
}

/// A validated file name pattern
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileNamePattern {
    source: String,
}

impl FileNamePattern {
    /// Parse and validate a pattern
    pub fn new(pattern: impl Into<String>) -> Result<Self> {
        let source = pattern.into();
        for cap in TOKEN_REGEX.captures_iter(&source) {
            let name = &cap[1];
            let option = cap.get(2).map(|m| m.as_str());
            validate_token(name, option)?;
        }
        Ok(Self { source })
    }

    /// The pattern as written
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Whether the pattern uses a token
    pub fn uses(&self, token: &str) -> bool {
        TOKEN_REGEX
            .captures_iter(&self.source)
            .any(|cap| &cap[1] == token)
    }

    /// Render the pattern with the given context
    pub fn render(&self, ctx: &PatternContext) -> Result<String> {
        let mut out = String::with_capacity(self.source.len());
        let mut last = 0;

        for cap in TOKEN_REGEX.captures_iter(&self.source) {
            let Some(whole) = cap.get(0) else { continue };
            out.push_str(&self.source[last..whole.start()]);
            out.push_str(&render_token(&cap[1], cap.get(2).map(|m| m.as_str()), ctx)?);
            last = whole.end();
        }
        out.push_str(&self.source[last..]);
        Ok(out)
    }
}

fn validate_token(name: &str, option: Option<&str>) -> Result<()> {
    match (name, option) {
        ("page" | "entry", Some(pad)) => pad
            .parse::<usize>()
            .map(|_| ())
            .map_err(|_| Error::template(format!("Invalid padding '{pad}' for {{{name}}}"))),
        ("date", Some(mask)) => {
            if StrftimeItems::new(mask).any(|item| matches!(item, Item::Error)) {
                Err(Error::template(format!("Invalid date mask '{mask}'")))
            } else {
                Ok(())
            }
        }
        ("url", Some(option)) => {
            if matches!(option, "flat" | "last") || option.parse::<usize>().is_ok() {
                Ok(())
            } else {
                Err(Error::template(format!("Invalid url option '{option}'")))
            }
        }
        ("page" | "entry" | "date" | "url" | "parent" | "batch", None) => Ok(()),
        (query, None) if query.starts_with('$') => Ok(()),
        _ => Err(Error::template(format!("Unknown token {{{name}}}"))),
    }
}

fn render_token(name: &str, option: Option<&str>, ctx: &PatternContext) -> Result<String> {
    match name {
        "page" => pad(ctx.page, option, name),
        "entry" => pad(ctx.entry, option, name),
        "date" => {
            let date = ctx.date.unwrap_or_else(Local::now);
            match option {
                None => Ok(date.timestamp_millis().to_string()),
                Some(mask) => {
                    let mut out = String::new();
                    write!(out, "{}", date.format_with_items(StrftimeItems::new(mask)))
                        .map_err(|_| Error::template(format!("Invalid date mask '{mask}'")))?;
                    Ok(out)
                }
            }
        }
        "parent" => ctx.parent.clone().ok_or_else(|| Error::undefined_var(name)),
        "batch" => ctx.batch.clone().ok_or_else(|| Error::undefined_var(name)),
        "url" => {
            let url = ctx.url.as_ref().ok_or_else(|| Error::undefined_var(name))?;
            let segments: Vec<&str> = url
                .path_segments()
                .map(|s| s.filter(|s| !s.is_empty()).collect())
                .unwrap_or_default();

            let value = match option {
                None => segments.join("/"),
                Some("flat") => segments.join("_").to_lowercase(),
                Some("last") => segments.last().map(|s| s.to_string()).unwrap_or_default(),
                Some(index) => index
                    .parse::<usize>()
                    .ok()
                    .and_then(|i| segments.get(i))
                    .map(|s| s.to_lowercase())
                    .ok_or_else(|| Error::undefined_var(format!("url, {index}")))?,
            };
            if value.is_empty() {
                Err(Error::undefined_var(name))
            } else {
                Ok(value)
            }
        }
        query => {
            let key = query.trim_start_matches('$');
            ctx.url
                .as_ref()
                .and_then(|url| {
                    url.query_pairs()
                        .find(|(k, _)| k == key)
                        .map(|(_, v)| v.into_owned())
                })
                .ok_or_else(|| Error::undefined_var(query))
        }
    }
}

fn pad(value: Option<u32>, width: Option<&str>, name: &str) -> Result<String> {
    let value = value.ok_or_else(|| Error::undefined_var(name))?;
    let width = width.and_then(|w| w.parse::<usize>().ok()).unwrap_or(0);
    Ok(format!("{value:0width$}"))
}
