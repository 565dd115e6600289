//! Link following module
//!
//! Follows the link fields declared by entity followers, extracts the
//! entities of the linked documents and nests them into the parent rows.
//!
//! # Overview
//!
//! - `WorkerPool` - bounded concurrency for fetch and extract
//! - `LinkCoordinator` - follows links per row, recursively
//! - `ThrottleHook` / `AdaptiveThrottle` - react to response statuses

mod coordinator;
mod pool;
mod types;

pub use coordinator::LinkCoordinator;
pub use pool::{WorkerPool, MAX_POOL_SIZE};
pub use types::{AdaptiveThrottle, FollowCounters, LinkTask, Origin, ThrottleHook};

#[cfg(test)]
mod tests;
