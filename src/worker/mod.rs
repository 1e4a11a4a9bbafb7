//! Worker system — pooled platform sessions with round-robin dispatch.
//!
//! Core components:
//! - `worker` — one session per dedicated thread, with liveness and
//!   performed-task bookkeeping and timeout-aware task submission
//! - `pool` — append-only round-robin scheduler over registered workers

pub mod pool;
pub mod worker;

pub use pool::WorkerPool;
pub use worker::{start_workers, TaskFn, TaskTimeout, Worker};
