//! deputy — spreads privileged platform operations across a pool of
//! worker connections, with automatic fallback to the primary session.

pub mod config;
pub mod error;
pub mod offload;
pub mod ops;
pub mod platform;
pub mod worker;
