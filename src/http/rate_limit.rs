//! Rate limiting implementation
//!
//! `RateLimiter` caps overall throughput with a governor token bucket.
//! `HostRateLimiter` spaces consecutive requests to the same host by a
//! minimum interval that can be adjusted while requests are in flight.

use governor::clock::DefaultClock;
use governor::middleware::NoOpMiddleware;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter as Governor};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

/// Default interval between two requests to the same host
pub const DEFAULT_REMOTE_INTERVAL: Duration = Duration::from_millis(15);

/// Configuration for rate limiting
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimiterConfig {
    /// Maximum number of requests per second
    pub requests_per_second: u32,
    /// Burst size (max tokens in bucket)
    pub burst_size: u32,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            requests_per_second: 10,
            burst_size: 10,
        }
    }
}

impl RateLimiterConfig {
    /// Create a new rate limiter config
    pub fn new(requests_per_second: u32, burst_size: u32) -> Self {
        Self {
            requests_per_second,
            burst_size,
        }
    }
}

/// Token bucket rate limiter
#[derive(Clone)]
pub struct RateLimiter {
    limiter: Arc<Governor<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>>,
}

impl RateLimiter {
    /// Create a new rate limiter with the given config
    pub fn new(config: &RateLimiterConfig) -> Self {
        let quota =
            Quota::per_second(NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN))
                .allow_burst(NonZeroU32::new(config.burst_size).unwrap_or(NonZeroU32::MIN));

        Self {
            limiter: Arc::new(Governor::direct(quota)),
        }
    }

    /// Wait until a request can be made
    pub async fn wait(&self) {
        self.limiter.until_ready().await;
    }
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(&RateLimiterConfig::default())
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter").finish()
    }
}

// ============================================================================
// Per-host Limiter
// ============================================================================

#[derive(Debug)]
struct HostSlot {
    /// Earliest instant the next request may start
    next: Instant,
    /// Interval of this host when it differs from the shared one
    interval: Option<Duration>,
}

#[derive(Debug)]
struct HostState {
    interval: Duration,
    hosts: HashMap<String, HostSlot>,
}

impl HostState {
    fn host_interval(&self, host: &str) -> Duration {
        self.hosts
            .get(host)
            .and_then(|slot| slot.interval)
            .unwrap_or(self.interval)
    }

    fn slot(&mut self, host: &str) -> &mut HostSlot {
        self.hosts.entry(host.to_string()).or_insert_with(|| HostSlot {
            next: Instant::now(),
            interval: None,
        })
    }
}

/// Minimum spacing between requests to the same host
///
/// Every host shares one interval unless it was given its own through the
/// `*_host_*` methods. Waiters reserve their slot under the lock and sleep
/// outside it, so requests to different hosts never wait on each other.
/// Clones share state.
#[derive(Debug, Clone)]
pub struct HostRateLimiter {
    state: Arc<Mutex<HostState>>,
}

impl HostRateLimiter {
    pub fn new(interval: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(HostState {
                interval,
                hosts: HashMap::new(),
            })),
        }
    }

    /// Shared interval
    pub fn interval(&self) -> Duration {
        self.lock().interval
    }

    /// Replace the shared interval
    pub fn set_interval(&self, interval: Duration) {
        self.lock().interval = interval;
    }

    /// Lengthen the shared interval by `amount`, returning the new interval
    pub fn increase_wait_time(&self, amount: Duration) -> Duration {
        let mut state = self.lock();
        state.interval = state.interval.saturating_add(amount);
        debug!(interval = ?state.interval, "Increased host interval");
        state.interval
    }

    /// Shorten the shared interval by `amount`, never below zero
    pub fn decrease_wait_time(&self, amount: Duration) -> Duration {
        let mut state = self.lock();
        state.interval = state.interval.saturating_sub(amount);
        debug!(interval = ?state.interval, "Decreased host interval");
        state.interval
    }

    /// Interval applied to `host`
    pub fn host_interval(&self, host: &str) -> Duration {
        self.lock().host_interval(host)
    }

    /// Give `host` its own interval
    pub fn set_host_interval(&self, host: &str, interval: Duration) {
        self.lock().slot(host).interval = Some(interval);
    }

    /// Lengthen the interval of `host` by `amount`, returning the new interval
    pub fn increase_host_wait_time(&self, host: &str, amount: Duration) -> Duration {
        let mut state = self.lock();
        let interval = state.host_interval(host).saturating_add(amount);
        state.slot(host).interval = Some(interval);
        debug!(host = %host, interval = ?interval, "Increased host interval");
        interval
    }

    /// Shorten the interval of `host` by `amount`
    ///
    /// Once it is back at or below the shared interval the host follows the
    /// shared interval again.
    pub fn decrease_host_wait_time(&self, host: &str, amount: Duration) -> Duration {
        let mut state = self.lock();
        let shared = state.interval;
        let lowered = state.host_interval(host).saturating_sub(amount);
        let interval = if lowered <= shared {
            state.slot(host).interval = None;
            shared
        } else {
            state.slot(host).interval = Some(lowered);
            lowered
        };
        debug!(host = %host, interval = ?interval, "Decreased host interval");
        interval
    }

    /// Wait for the next free slot of `host`
    pub async fn wait(&self, host: &str) {
        let slot = self.reserve(host);
        if slot > Instant::now() {
            tokio::time::sleep_until(slot).await;
        }
    }

    fn reserve(&self, host: &str) -> Instant {
        let now = Instant::now();
        let mut state = self.lock();
        // hosts whose slot has passed and that keep no interval of their own
        // carry no state
        state
            .hosts
            .retain(|_, slot| slot.next > now || slot.interval.is_some());

        let interval = state.host_interval(host);
        let entry = state.slot(host);
        let start = entry.next.max(now);
        entry.next = start + interval;
        start
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HostState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for HostRateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_REMOTE_INTERVAL)
    }
}
