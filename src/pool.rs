//! Bounded worker pool shared by the walker and the resolution engine

use std::num::NonZeroUsize;

use tracing::{debug, warn};

/// A rayon thread pool that can be resized between phases.
///
/// `workers == 0` sizes the pool to the available parallelism. If the pool
/// cannot be built, work falls back to rayon's global pool.
pub struct WorkerPool {
    pool: Option<rayon::ThreadPool>,
    threads: usize,
}

impl WorkerPool {
    pub fn new(workers: usize) -> Self {
        let threads = effective_threads(workers);
        Self {
            pool: build(threads),
            threads,
        }
    }

    /// Rebuild the pool with a different worker count. No-op if unchanged.
    pub fn resize(&mut self, workers: usize) {
        let threads = effective_threads(workers);
        if threads == self.threads && self.pool.is_some() {
            return;
        }
        debug!(from = self.threads, to = threads, "resizing worker pool");
        self.pool = build(threads);
        self.threads = threads;
    }

    pub fn threads(&self) -> usize {
        self.threads
    }

    /// Run `op` inside the pool; parallel iterators inside use its workers.
    pub fn install<R, OP>(&self, op: OP) -> R
    where
        OP: FnOnce() -> R + Send,
        R: Send,
    {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Open a scope on the pool. Returns once every task spawned in the
    /// scope, transitively, has finished.
    pub fn scope<'scope, R, OP>(&self, op: OP) -> R
    where
        OP: FnOnce(&rayon::Scope<'scope>) -> R + Send,
        R: Send,
    {
        match &self.pool {
            Some(pool) => pool.scope(op),
            None => rayon::scope(op),
        }
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new(0)
    }
}

fn effective_threads(workers: usize) -> usize {
    if workers == 0 {
        std::thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1)
    } else {
        workers
    }
}

fn build(threads: usize) -> Option<rayon::ThreadPool> {
    match rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .thread_name(|i| format!("lsg-worker-{i}"))
        .build()
    {
        Ok(pool) => Some(pool),
        Err(e) => {
            warn!(error = %e, "failed to build worker pool, using the global pool");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn test_explicit_size() {
        let pool = WorkerPool::new(3);
        assert_eq!(pool.threads(), 3);
        assert_eq!(pool.install(rayon::current_num_threads), 3);
    }

    #[test]
    fn test_auto_size_is_positive() {
        assert!(WorkerPool::new(0).threads() >= 1);
    }

    #[test]
    fn test_resize() {
        let mut pool = WorkerPool::new(1);
        pool.resize(2);
        assert_eq!(pool.threads(), 2);
        assert_eq!(pool.install(rayon::current_num_threads), 2);
    }

    #[test]
    fn test_scope_waits_for_nested_tasks() {
        let pool = WorkerPool::new(2);
        let total = AtomicUsize::new(0);
        let counter = &total;
        pool.scope(|s| {
            for _ in 0..4 {
                s.spawn(move |s| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    s.spawn(move |_| {
                        counter.fetch_add(1, Ordering::SeqCst);
                    });
                });
            }
        });
        assert_eq!(total.load(Ordering::SeqCst), 8);
    }
}
