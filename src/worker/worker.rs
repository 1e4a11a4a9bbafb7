//! Worker — a thread-owned platform session with cross-thread task
//! submission.
//!
//! Each worker runs its session on a dedicated OS thread driving a
//! current-thread tokio runtime. Callers living on other runtimes submit
//! capability futures through the worker's runtime handle and wait on a
//! bounded channel according to the task's timeout policy. A bounded
//! wait that elapses detaches the caller; the task itself keeps running
//! on the worker's loop.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock, mpsc};
use std::thread;
use std::time::Duration;

use futures::future::BoxFuture;
use secrecy::{ExposeSecret, SecretString};

use crate::error::{PlatformError, WorkerError};
use crate::platform::{Connector, Session};
use crate::worker::pool::WorkerPool;

/// Cadence of the status line advertising the performed-task count.
const STATUS_INTERVAL: Duration = Duration::from_secs(10);

/// How long a caller waits for a task dispatched to a worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskTimeout {
    /// Block until the task resolves.
    Unbounded,
    /// Return as soon as the task is scheduled; its result is discarded,
    /// successes and failures alike.
    FireAndForget,
    /// Block up to the given duration, then detach. The task is not
    /// cancelled.
    Bounded(Duration),
}

impl TaskTimeout {
    /// Conservative default for commands with side effects that should
    /// not hang the caller indefinitely.
    pub const DEFAULT: TaskTimeout = TaskTimeout::Bounded(Duration::from_secs(10));
}

/// A capability future factory: given the session to run against,
/// produces the operation future. Scheduled on exactly one execution
/// context per call.
pub type TaskFn<T> =
    Box<dyn FnOnce(Arc<dyn Session>) -> BoxFuture<'static, Result<T, PlatformError>> + Send>;

/// Handle into the worker's own runtime, set once the session connects.
struct Remote {
    handle: tokio::runtime::Handle,
    session: Arc<dyn Session>,
}

/// One pooled platform connection plus liveness and usage bookkeeping.
pub struct Worker {
    /// Registration index in the pool; stable for the process lifetime.
    id: OnceLock<usize>,
    credential: SecretString,
    /// Masked credential suffix for log lines.
    label: String,
    started: AtomicBool,
    running: AtomicBool,
    tasks_performed: Arc<AtomicU64>,
    remote: OnceLock<Remote>,
}

impl Worker {
    pub fn new(credential: SecretString) -> Self {
        let label = mask_credential(credential.expose_secret());
        Self {
            id: OnceLock::new(),
            credential,
            label,
            started: AtomicBool::new(false),
            running: AtomicBool::new(false),
            tasks_performed: Arc::new(AtomicU64::new(0)),
            remote: OnceLock::new(),
        }
    }

    /// Registration index, or `usize::MAX` before the worker has been
    /// registered with a pool.
    pub fn id(&self) -> usize {
        self.id.get().copied().unwrap_or(usize::MAX)
    }

    pub(crate) fn set_id(&self, id: usize) {
        let _ = self.id.set(id);
    }

    /// Whether the session is connected. Once a worker goes down it
    /// stays down; there is no reconnect in this design.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Tasks counted against this worker: fire-and-forget dispatches at
    /// submission, everything else when the task reaches a terminal
    /// state on the worker's loop.
    pub fn tasks_performed(&self) -> u64 {
        self.tasks_performed.load(Ordering::Relaxed)
    }

    /// Masked credential suffix, safe to log.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Register with the pool and spawn the dedicated session thread.
    ///
    /// Idempotent: a worker that already owns a thread is not restarted,
    /// and its registration is not repeated.
    pub fn start(self: &Arc<Self>, pool: &WorkerPool, connector: Arc<dyn Connector>) {
        if self.id.get().is_none() {
            pool.register(Arc::clone(self));
        }
        let id = self.id();

        if self.started.swap(true, Ordering::SeqCst) {
            tracing::debug!(worker = id, "Worker already started");
            return;
        }

        let worker = Arc::clone(self);
        let spawned = thread::Builder::new()
            .name(format!("worker-{id}"))
            .spawn(move || worker.drive(connector));
        match spawned {
            Ok(_) => {
                tracing::info!(worker = id, credential = %self.label, "Worker started");
            }
            Err(e) => {
                self.started.store(false, Ordering::SeqCst);
                tracing::error!(worker = id, error = %e, "Failed to spawn worker thread");
            }
        }
    }

    /// Thread body: connect, mark live, drive the session loop until
    /// disconnect.
    fn drive(self: Arc<Self>, connector: Arc<dyn Connector>) {
        let id = self.id();
        let runtime = match tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
        {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!(worker = id, error = %e, "Failed to build worker runtime");
                return;
            }
        };

        let session = match runtime.block_on(connector.connect(&self.credential)) {
            Ok(session) => session,
            Err(e) => {
                tracing::error!(worker = id, credential = %self.label, error = %e, "Worker failed to connect");
                return;
            }
        };

        let _ = self.remote.set(Remote {
            handle: runtime.handle().clone(),
            session: Arc::clone(&session),
        });
        self.running.store(true, Ordering::SeqCst);
        tracing::info!(worker = id, "Worker connected");

        // Advertise the performed-task count alongside the keepalive.
        let counter = Arc::clone(&self.tasks_performed);
        let status_session = Arc::clone(&session);
        runtime.spawn(async move {
            let mut tick = tokio::time::interval(STATUS_INTERVAL);
            tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tick.tick().await;
                let line = format!(
                    "worker-{id} | tasks performed: {}",
                    counter.load(Ordering::Relaxed)
                );
                if let Err(e) = status_session.set_status(&line).await {
                    tracing::debug!(worker = id, error = %e, "Status update failed");
                }
            }
        });

        match runtime.block_on(session.run()) {
            Ok(()) => tracing::info!(worker = id, "Worker session closed"),
            Err(e) => tracing::error!(worker = id, error = %e, "Worker connection lost"),
        }
        self.running.store(false, Ordering::SeqCst);
    }

    /// Schedule a task onto this worker's loop and wait per `timeout`.
    ///
    /// Callable from any thread except the worker's own. `Ok(None)`
    /// means the task was detached fire-and-forget style; the caller
    /// gets no result and no failure signal even if the task later
    /// fails.
    fn submit<T>(&self, task: TaskFn<T>, timeout: TaskTimeout) -> Result<Option<T>, WorkerError>
    where
        T: Send + 'static,
    {
        let id = self.id();
        if !self.is_running() {
            tracing::error!(worker = id, "Worker is not running, cannot execute task");
            return Err(WorkerError::NotRunning { id });
        }
        let remote = self.remote.get().ok_or(WorkerError::NotRunning { id })?;

        let (tx, rx) = mpsc::sync_channel::<Result<T, PlatformError>>(1);
        let future = task(Arc::clone(&remote.session));
        // Fire-and-forget counts at dispatch; attached modes count when
        // the task reaches a terminal state on the worker's loop, even
        // if the caller has detached by then (bounded timeout).
        let count_on_completion = !matches!(timeout, TaskTimeout::FireAndForget);
        let counter = Arc::clone(&self.tasks_performed);
        remote.handle.spawn(async move {
            let outcome = future.await;
            if count_on_completion {
                counter.fetch_add(1, Ordering::Relaxed);
            }
            // A detached caller has dropped the receiver; nothing to do.
            let _ = tx.send(outcome);
        });
        tracing::debug!(worker = id, "Task scheduled on worker loop");

        match timeout {
            TaskTimeout::FireAndForget => {
                self.tasks_performed.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
            TaskTimeout::Unbounded => match rx.recv() {
                Ok(Ok(value)) => Ok(Some(value)),
                Ok(Err(source)) => Err(WorkerError::TaskFailed { id, source }),
                Err(_) => Err(WorkerError::SubmissionFailed {
                    id,
                    reason: "worker loop dropped the task".to_string(),
                }),
            },
            TaskTimeout::Bounded(limit) => match rx.recv_timeout(limit) {
                Ok(Ok(value)) => Ok(Some(value)),
                Ok(Err(source)) => Err(WorkerError::TaskFailed { id, source }),
                Err(mpsc::RecvTimeoutError::Timeout) => {
                    tracing::error!(worker = id, ?limit, "Task timed out, detaching");
                    Err(WorkerError::Timeout { id, limit })
                }
                Err(mpsc::RecvTimeoutError::Disconnected) => Err(WorkerError::SubmissionFailed {
                    id,
                    reason: "worker loop dropped the task".to_string(),
                }),
            },
        }
    }

    /// Command-style submission: success or failure, no value.
    pub fn run_task(
        &self,
        task: TaskFn<()>,
        timeout: TaskTimeout,
    ) -> Result<(), WorkerError> {
        self.submit(task, timeout).map(|_| ())
    }

    /// Query-style submission: the task's value, or `None` when the
    /// caller detached fire-and-forget style.
    pub fn run_query<T>(
        &self,
        task: TaskFn<T>,
        timeout: TaskTimeout,
    ) -> Result<Option<T>, WorkerError>
    where
        T: Send + 'static,
    {
        self.submit(task, timeout)
    }
}

impl fmt::Display for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.id.get() {
            Some(id) => write!(f, "Worker#{id}: ")?,
            None => write!(f, "Worker#?: ")?,
        }
        write!(
            f,
            "credential={}, running={}",
            self.label,
            self.is_running()
        )
    }
}

fn mask_credential(raw: &str) -> String {
    let tail: String = raw
        .chars()
        .rev()
        .take(5)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    format!("...{tail}")
}

/// Start one worker per credential, registering each with the pool.
///
/// Startups are staggered to avoid a connection storm against the
/// platform. Returns the workers in credential order, which is also
/// their id order.
pub async fn start_workers(
    pool: &Arc<WorkerPool>,
    connector: &Arc<dyn Connector>,
    credentials: Vec<SecretString>,
    stagger: Duration,
) -> Vec<Arc<Worker>> {
    let mut workers = Vec::with_capacity(credentials.len());
    for credential in credentials {
        let worker = Arc::new(Worker::new(credential));
        worker.start(pool, Arc::clone(connector));
        workers.push(worker);
        tokio::time::sleep(stagger).await;
    }
    tracing::info!(count = workers.len(), "All workers started");
    workers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn credential_is_masked_for_logging() {
        let worker = Worker::new(SecretString::from("worker-token-12345".to_string()));
        assert_eq!(worker.label(), "...12345");
    }

    #[test]
    fn short_credentials_do_not_panic() {
        assert_eq!(mask_credential("abc"), "...abc");
        assert_eq!(mask_credential(""), "...");
    }

    #[test]
    fn unstarted_worker_rejects_tasks() {
        let worker = Worker::new(SecretString::from("worker-token-12345".to_string()));
        let result = worker.run_task(
            Box::new(|_session| Box::pin(async { Ok::<(), PlatformError>(()) })),
            TaskTimeout::DEFAULT,
        );
        assert!(matches!(result, Err(WorkerError::NotRunning { .. })));
        assert_eq!(worker.tasks_performed(), 0);
    }

    #[test]
    fn default_timeout_is_bounded() {
        assert_eq!(
            TaskTimeout::DEFAULT,
            TaskTimeout::Bounded(Duration::from_secs(10))
        );
    }

    #[test]
    fn display_shows_masked_credential() {
        let worker = Worker::new(SecretString::from("worker-token-12345".to_string()));
        let shown = worker.to_string();
        assert!(shown.contains("...12345"));
        assert!(!shown.contains("worker-token"));
    }
}
