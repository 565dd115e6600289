//! Bounded worker pool
//!
//! A semaphore shared by every follower of a parser. Callers wanting an
//! isolated pool construct their own.

use crate::error::{Error, Result};
use std::future::Future;
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Largest accepted pool size
pub const MAX_POOL_SIZE: usize = 16;

/// Limits how many link fetches run at once
#[derive(Debug, Clone)]
pub struct WorkerPool {
    semaphore: Arc<Semaphore>,
    size: usize,
}

impl WorkerPool {
    /// Pool running at most `size` tasks at once, clamped to `1..=16`
    pub fn new(size: usize) -> Self {
        let size = size.clamp(1, MAX_POOL_SIZE);
        Self {
            semaphore: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// One worker per available core, at least 4
    pub fn with_default_size() -> Self {
        let cores = std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get);
        Self::new(cores.max(4))
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Free workers right now
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Run `task` once a worker is free
    pub async fn run<F, T>(&self, task: F) -> Result<T>
    where
        F: Future<Output = T>,
    {
        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| Error::PoolClosed)?;
        Ok(task.await)
    }

    /// Refuse further tasks
    pub fn close(&self) {
        self.semaphore.close();
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::with_default_size()
    }
}
