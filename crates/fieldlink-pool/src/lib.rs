//! Bounded task pool for polling many devices at once.
//!
//! Submit closures, cap how many run concurrently, get a callback per task,
//! and block until the batch drains.

pub mod config;
pub mod error;
pub mod pool;

pub use config::{PoolConfig, DEFAULT_POOL_SIZE};
pub use error::{Result, TaskError};
pub use pool::{CompletedTask, PoolStats, TaskDone, TaskPool};
