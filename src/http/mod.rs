//! HTTP module
//!
//! Provides the reqwest-backed `Fetcher` and the rate limiters shared by
//! pages and followed links.
//!
//! # Features
//!
//! - **Automatic Retries**: Configurable retry logic with backoff
//! - **Throughput Cap**: Token bucket rate limiter using governor
//! - **Per-host Spacing**: Minimum interval between requests to one host
//! - **Cookies**: Sent from the request, collected from `Set-Cookie`

mod client;
mod rate_limit;

pub use client::{HttpFetcher, HttpFetcherConfig, HttpFetcherConfigBuilder};
pub use rate_limit::{HostRateLimiter, RateLimiter, RateLimiterConfig, DEFAULT_REMOTE_INTERVAL};
