//! Offload gateway — dispatch capability calls to pooled workers, with
//! automatic fallback to the primary session.
//!
//! Exactly one of the worker path and the fallback path executes the
//! underlying operation per call; callers only ever see a definite
//! outcome, never which path produced it. The cross-thread wait on a
//! worker's task happens inside a blocking helper so the caller's own
//! runtime is never parked.

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::{Error, PlatformError, WorkerError};
use crate::platform::Session;
use crate::worker::pool::WorkerPool;
use crate::worker::worker::TaskTimeout;

/// Whether a capability can safely run twice.
///
/// Failures where the worker-side task may already have executed
/// (task error, bounded timeout) trigger fallback only for idempotent
/// capabilities; a side-effecting one surfaces the failure instead of
/// risking a duplicate mutation. Failures where the task never started
/// (no worker, worker not running, submission failure) fall back for
/// everyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Idempotency {
    Idempotent,
    SideEffecting,
}

/// Per-call dispatch options.
#[derive(Debug, Clone, Copy)]
pub struct DispatchOptions {
    pub timeout: TaskTimeout,
    pub idempotency: Idempotency,
}

impl DispatchOptions {
    pub fn idempotent(timeout: TaskTimeout) -> Self {
        Self {
            timeout,
            idempotency: Idempotency::Idempotent,
        }
    }

    pub fn side_effecting(timeout: TaskTimeout) -> Self {
        Self {
            timeout,
            idempotency: Idempotency::SideEffecting,
        }
    }
}

impl Default for DispatchOptions {
    fn default() -> Self {
        Self::side_effecting(TaskTimeout::DEFAULT)
    }
}

/// A capability call: takes the session to run against and returns the
/// operation future. Invoked at most once per execution path.
pub trait Capability<T>:
    Fn(Arc<dyn Session>) -> BoxFuture<'static, Result<T, PlatformError>> + Send + Sync + 'static
{
}

impl<T, F> Capability<T> for F where
    F: Fn(Arc<dyn Session>) -> BoxFuture<'static, Result<T, PlatformError>>
        + Send
        + Sync
        + 'static
{
}

/// How the worker path resolved.
enum OffloadOutcome<T> {
    /// The worker served the call. `None` means a fire-and-forget
    /// detachment with no value to hand back.
    Served(Option<T>),
    /// Worker-side failure that must not be retried on the fallback.
    Surfaced(WorkerError),
    /// Offloading did not happen or is safe to retry; run the fallback.
    FallBack,
}

/// Wraps capability calls with dispatch-to-worker-then-fallback
/// behavior.
pub struct Offloader {
    pool: Arc<WorkerPool>,
    fallback: Arc<dyn Session>,
}

impl Offloader {
    pub fn new(pool: Arc<WorkerPool>, fallback: Arc<dyn Session>) -> Self {
        Self { pool, fallback }
    }

    /// The session of last resort.
    pub fn fallback(&self) -> &Arc<dyn Session> {
        &self.fallback
    }

    /// Command variant: run the capability somewhere, report success.
    ///
    /// A fallback-path failure is terminal and reported as `false`.
    pub async fn invoke<F>(&self, opts: DispatchOptions, op: F) -> bool
    where
        F: Capability<()> + Clone,
    {
        match self.offload(opts, op.clone()).await {
            OffloadOutcome::Served(_) => true,
            OffloadOutcome::Surfaced(e) => {
                tracing::error!(error = %e, "Worker-side failure on side-effecting capability, not retrying");
                false
            }
            OffloadOutcome::FallBack => match op(Arc::clone(&self.fallback)).await {
                Ok(()) => true,
                Err(e) => {
                    tracing::error!(error = %e, "Fallback execution failed");
                    false
                }
            },
        }
    }

    /// Query variant: run the capability somewhere, return its value.
    ///
    /// A fire-and-forget query has no value to return, so it falls
    /// through to the fallback read.
    pub async fn fetch<T, F>(&self, opts: DispatchOptions, op: F) -> Result<T, Error>
    where
        T: Send + 'static,
        F: Capability<T> + Clone,
    {
        match self.offload(opts, op.clone()).await {
            OffloadOutcome::Served(Some(value)) => Ok(value),
            OffloadOutcome::Served(None) | OffloadOutcome::FallBack => {
                op(Arc::clone(&self.fallback)).await.map_err(Error::from)
            }
            OffloadOutcome::Surfaced(e) => Err(Error::Worker(e)),
        }
    }

    /// Try the worker path: select, then submit from a blocking helper.
    ///
    /// Liveness is not pre-filtered at selection; a dead worker is
    /// discovered through its not-running guard and handled like any
    /// other pre-dispatch failure.
    async fn offload<T, F>(&self, opts: DispatchOptions, op: F) -> OffloadOutcome<T>
    where
        T: Send + 'static,
        F: Capability<T>,
    {
        let Some(worker) = self.pool.select(false) else {
            let e = WorkerError::NoWorkerAvailable;
            tracing::warn!(error = %e, "Falling back to primary session");
            return OffloadOutcome::FallBack;
        };
        let id = worker.id();
        let timeout = opts.timeout;

        let outcome = tokio::task::spawn_blocking(move || {
            worker.run_query(Box::new(move |session| op(session)), timeout)
        })
        .await;

        match outcome {
            Ok(Ok(value)) => OffloadOutcome::Served(value),
            Ok(Err(e)) => {
                if e.task_may_have_run() && opts.idempotency == Idempotency::SideEffecting {
                    return OffloadOutcome::Surfaced(e);
                }
                tracing::warn!(worker = id, error = %e, "Offloading to worker failed, falling back");
                OffloadOutcome::FallBack
            }
            Err(e) => {
                tracing::warn!(worker = id, error = %e, "Offload helper thread failed, falling back");
                OffloadOutcome::FallBack
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn default_options_are_conservative() {
        let opts = DispatchOptions::default();
        assert_eq!(opts.idempotency, Idempotency::SideEffecting);
        assert_eq!(opts.timeout, TaskTimeout::Bounded(Duration::from_secs(10)));
    }

    #[test]
    fn pre_dispatch_failures_always_fall_back() {
        assert!(!WorkerError::NotRunning { id: 0 }.task_may_have_run());
        assert!(!WorkerError::NoWorkerAvailable.task_may_have_run());
        assert!(
            WorkerError::Timeout {
                id: 0,
                limit: Duration::from_secs(1)
            }
            .task_may_have_run()
        );
    }
}
