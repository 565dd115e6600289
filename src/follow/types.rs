//! Link following types
//!
//! Defines where followed links come from, the task describing one link and
//! the throttle hooks that react to response statuses.

use crate::entity::ResolvedFollower;
use crate::error::Result;
use crate::fetch::{Document, Request};
use crate::http::HostRateLimiter;
use crate::types::StringMap;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;
use url::Url;

// ============================================================================
// Origin
// ============================================================================

/// The document a row was extracted from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Origin {
    /// Base for relative links
    pub url: Url,
    /// Cookies sent along when following links
    pub cookies: StringMap,
    /// Page number of the top-level document
    pub page_number: u32,
    /// Where the document was saved, if downloads are enabled
    pub saved_as: Option<PathBuf>,
}

impl Origin {
    /// Origin of a fetched document
    ///
    /// Cookies are those sent with `request` updated by those the document set.
    pub fn of(document: &Document, request: &Request, page_number: u32) -> Self {
        let mut cookies = request.cookies.clone();
        cookies.extend(document.cookies.iter().map(|(k, v)| (k.clone(), v.clone())));
        Self {
            url: document.url.clone(),
            cookies,
            page_number,
            saved_as: None,
        }
    }

    #[must_use]
    pub fn with_saved_as(mut self, path: Option<PathBuf>) -> Self {
        self.saved_as = path;
        self
    }
}

// ============================================================================
// Link Task
// ============================================================================

/// Fetch and extract the document referenced by one link value
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkTask {
    /// Link field the value was read from
    pub link_field: String,
    /// Request for the linked document
    pub request: Request,
    /// Rate limiter key
    pub host: String,
    /// Page number inherited from the origin
    pub page_number: u32,
    /// Where the origin document was saved
    pub parent_saved_as: Option<PathBuf>,
}

impl LinkTask {
    /// Resolve `value` against the follower base URL or the origin URL
    pub fn new(follower: &ResolvedFollower, value: &str, origin: &Origin) -> Result<Self> {
        let base = follower.base_url.as_ref().unwrap_or(&origin.url);
        let url = base.join(value.trim())?;

        let mut request = Request::new(url).with_cookies(origin.cookies.clone());
        request.params.extend(
            follower
                .params
                .iter()
                .map(|(k, v)| (k.clone(), v.clone())),
        );

        Ok(Self {
            link_field: follower.link_field.clone(),
            host: request.host_key(),
            request,
            page_number: origin.page_number,
            parent_saved_as: origin.saved_as.clone(),
        })
    }
}

// ============================================================================
// Throttle Hooks
// ============================================================================

/// Sees the status of every response and may adjust the host limiter
pub trait ThrottleHook: Send + Sync {
    fn on_response(&self, host: &str, status: u16, limiter: &HostRateLimiter);
}

impl<F> ThrottleHook for F
where
    F: Fn(&str, u16, &HostRateLimiter) + Send + Sync,
{
    fn on_response(&self, host: &str, status: u16, limiter: &HostRateLimiter) {
        self(host, status, limiter);
    }
}

/// Slows a host down on HTTP 429 and speeds it back up on success
///
/// Only the host that answered is affected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdaptiveThrottle {
    /// Added to the interval on every 429
    pub step: Duration,
    /// Interval never goes below this
    pub floor: Duration,
    /// Interval never goes above this
    pub ceiling: Duration,
}

impl Default for AdaptiveThrottle {
    fn default() -> Self {
        Self {
            step: Duration::from_millis(100),
            floor: Duration::from_millis(15),
            ceiling: Duration::from_secs(5),
        }
    }
}

impl AdaptiveThrottle {
    pub fn new(step: Duration, floor: Duration, ceiling: Duration) -> Self {
        Self {
            step,
            floor,
            ceiling,
        }
    }
}

impl ThrottleHook for AdaptiveThrottle {
    fn on_response(&self, host: &str, status: u16, limiter: &HostRateLimiter) {
        let interval = limiter.host_interval(host);
        if status == 429 {
            if interval < self.ceiling {
                let raised = limiter.increase_host_wait_time(host, self.step);
                if raised > self.ceiling {
                    limiter.set_host_interval(host, self.ceiling);
                }
                warn!(
                    host = %host,
                    interval = ?raised.min(self.ceiling),
                    "Throttled, slowing down"
                );
            }
        } else if (200..300).contains(&status) && interval > self.floor {
            let lowered = limiter.decrease_host_wait_time(host, self.step / 4);
            if lowered < self.floor {
                limiter.set_host_interval(host, self.floor);
            }
        }
    }
}

// ============================================================================
// Counters
// ============================================================================

/// Link following totals
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FollowCounters {
    /// Links fetched and extracted
    pub links_followed: u64,
    /// Links that failed, ignored or not
    pub link_errors: u64,
}
