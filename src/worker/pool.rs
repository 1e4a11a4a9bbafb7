//! Worker pool — round-robin, liveness-aware selection.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};

use crate::worker::worker::Worker;

/// Ordered, append-only registry of workers.
///
/// A worker's id is its registration index, stable for the process
/// lifetime. The round-robin cursor is an atomic: under concurrent load
/// the distribution may skip or repeat an index, which is acceptable —
/// approximate spreading is the goal, not exact fairness. Selection also
/// ignores in-flight load on a worker; a live-but-saturated worker can
/// still be picked.
pub struct WorkerPool {
    workers: RwLock<Vec<Arc<Worker>>>,
    cursor: AtomicUsize,
}

impl WorkerPool {
    pub fn new() -> Self {
        Self {
            workers: RwLock::new(Vec::new()),
            cursor: AtomicUsize::new(0),
        }
    }

    /// Append a worker, returning its id.
    pub fn register(&self, worker: Arc<Worker>) -> usize {
        let mut workers = self.workers.write().expect("worker registry poisoned");
        let id = workers.len();
        worker.set_id(id);
        workers.push(worker);
        tracing::debug!(worker = id, "Added worker to the pool");
        id
    }

    /// Select the next worker round-robin.
    ///
    /// With `require_live`, dead workers are skipped by a bounded linear
    /// probe: at most one pass over the registry, `None` once the probe
    /// wraps back without finding a running worker.
    pub fn select(&self, require_live: bool) -> Option<Arc<Worker>> {
        let workers = self.workers.read().expect("worker registry poisoned");
        if workers.is_empty() {
            return None;
        }
        let len = workers.len();
        let start = self.cursor.fetch_add(1, Ordering::Relaxed) % len;

        if !require_live {
            let worker = Arc::clone(&workers[start]);
            tracing::trace!(worker = worker.id(), "Assigned worker to task");
            return Some(worker);
        }

        for probe in 0..len {
            let index = (start + probe) % len;
            let worker = &workers[index];
            if worker.is_running() {
                if probe > 0 {
                    tracing::warn!(
                        skipped = probe,
                        worker = worker.id(),
                        "Skipped dead workers during selection"
                    );
                    // Continue the rotation from just past the hit.
                    self.cursor.store(index + 1, Ordering::Relaxed);
                }
                return Some(Arc::clone(worker));
            }
        }

        tracing::error!("No running workers available");
        None
    }

    /// Snapshot of all registered workers, in registration order.
    pub fn workers(&self) -> Vec<Arc<Worker>> {
        self.workers
            .read()
            .expect("worker registry poisoned")
            .clone()
    }

    pub fn len(&self) -> usize {
        self.workers.read().expect("worker registry poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for WorkerPool {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::SecretString;

    fn unstarted_worker(token: &str) -> Arc<Worker> {
        Arc::new(Worker::new(SecretString::from(token.to_string())))
    }

    #[test]
    fn register_assigns_sequential_ids() {
        let pool = WorkerPool::new();
        for expected in 0..4 {
            let id = pool.register(unstarted_worker("worker-token-0000"));
            assert_eq!(id, expected);
        }
        assert_eq!(pool.len(), 4);
    }

    #[test]
    fn empty_pool_selects_nothing() {
        let pool = WorkerPool::new();
        assert!(pool.select(false).is_none());
        assert!(pool.select(true).is_none());
    }

    #[test]
    fn round_robin_without_liveness_check() {
        let pool = WorkerPool::new();
        for _ in 0..3 {
            pool.register(unstarted_worker("worker-token-0000"));
        }
        // Unstarted workers are not running, but require_live=false hands
        // them out anyway, one full rotation per three selections.
        let first: Vec<usize> = (0..3)
            .map(|_| pool.select(false).unwrap().id())
            .collect();
        assert_eq!(first, vec![0, 1, 2]);
        let second: Vec<usize> = (0..3)
            .map(|_| pool.select(false).unwrap().id())
            .collect();
        assert_eq!(second, vec![0, 1, 2]);
    }

    #[test]
    fn all_dead_probe_is_bounded() {
        let pool = WorkerPool::new();
        for _ in 0..5 {
            pool.register(unstarted_worker("worker-token-0000"));
        }
        // Must return rather than loop; one pass over five dead workers.
        assert!(pool.select(true).is_none());
        assert!(pool.select(true).is_none());
    }
}
