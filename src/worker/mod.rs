//! Bounded worker pool for connection, session and vote tasks

pub mod pool;

pub use pool::{PoolConfig, PoolStats, TaskHandle, WorkerPool};
