//! Worker pool implementation
//!
//! Every task is a tokio task, but only `max_workers` of them may run at once:
//! a task must hold a semaphore permit before its future is polled. Tasks that
//! cannot get a permit wait in line, and at most `max_queued` may wait. A
//! submission past that bound is rejected with `GameError::Scheduling` so the
//! caller can retry instead of growing the queue without limit.

use crate::error::{GameError, GameResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Sizing for the worker pool
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PoolConfig {
    /// Maximum number of tasks executing at once
    pub max_workers: usize,
    /// Maximum number of tasks waiting for a free worker
    pub max_queued: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: 256,
            max_queued: 1024,
        }
    }
}

/// Point-in-time pool statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PoolStats {
    pub capacity: usize,
    pub max_queued: usize,
    pub running: usize,
    pub queued: usize,
    pub submitted: u64,
    pub rejected: u64,
}

impl PoolStats {
    /// Fraction of the wait queue in use (0.0 to 1.0)
    pub fn queue_utilization(&self) -> f64 {
        if self.max_queued == 0 {
            return 0.0;
        }
        self.queued as f64 / self.max_queued as f64
    }
}

struct PoolInner {
    slots: Arc<Semaphore>,
    config: PoolConfig,
    running: AtomicUsize,
    queued: AtomicUsize,
    submitted: AtomicU64,
    rejected: AtomicU64,
    closed: AtomicBool,
}

/// Which pool counter a slot occupies
#[derive(Clone, Copy)]
enum Slot {
    Queued,
    Running,
}

/// Holds one unit of a pool counter and gives it back when dropped. The guard
/// lives inside the task's future, so aborting the task releases it too.
struct SlotGuard {
    inner: Arc<PoolInner>,
    slot: Slot,
}

impl SlotGuard {
    fn counter(&self) -> &AtomicUsize {
        match self.slot {
            Slot::Queued => &self.inner.queued,
            Slot::Running => &self.inner.running,
        }
    }

    fn enter(inner: Arc<PoolInner>, slot: Slot) -> Self {
        let guard = Self { inner, slot };
        guard.counter().fetch_add(1, Ordering::SeqCst);
        guard
    }

    /// Take over a unit the submitter already counted
    fn adopt(inner: Arc<PoolInner>, slot: Slot) -> Self {
        Self { inner, slot }
    }
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.counter().fetch_sub(1, Ordering::SeqCst);
    }
}

/// Bounded pool of execution slots
#[derive(Clone)]
pub struct WorkerPool {
    inner: Arc<PoolInner>,
}

impl WorkerPool {
    /// Create a pool; zero sizes are raised to one worker and no queue
    pub fn new(config: PoolConfig) -> Self {
        let config = PoolConfig {
            max_workers: config.max_workers.max(1),
            max_queued: config.max_queued,
        };

        Self {
            inner: Arc::new(PoolInner {
                slots: Arc::new(Semaphore::new(config.max_workers)),
                config,
                running: AtomicUsize::new(0),
                queued: AtomicUsize::new(0),
                submitted: AtomicU64::new(0),
                rejected: AtomicU64::new(0),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Submit a task. It starts immediately if a worker is free, otherwise it
    /// waits in line. Fails with `GameError::Scheduling` when the line is full
    /// or the pool is closed.
    pub fn submit<F, T>(&self, label: &str, future: F) -> GameResult<TaskHandle<T>>
    where
        F: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let inner = &self.inner;
        if inner.closed.load(Ordering::SeqCst) {
            inner.rejected.fetch_add(1, Ordering::Relaxed);
            return Err(GameError::Scheduling {
                reason: format!("worker pool closed, rejected '{}'", label),
            });
        }

        let permit = match inner.slots.clone().try_acquire_owned() {
            Ok(permit) => Ok(permit),
            Err(_) => {
                let waiting = inner.queued.fetch_add(1, Ordering::SeqCst);
                if waiting >= inner.config.max_queued {
                    inner.queued.fetch_sub(1, Ordering::SeqCst);
                    inner.rejected.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        "Worker pool saturated - rejecting '{}' (running: {}, queued: {})",
                        label,
                        inner.running.load(Ordering::SeqCst),
                        waiting
                    );
                    return Err(GameError::Scheduling {
                        reason: format!(
                            "worker pool saturated ({} running, {} queued)",
                            inner.config.max_workers, inner.config.max_queued
                        ),
                    });
                }
                debug!("No free worker for '{}', queued behind {} tasks", label, waiting);
                Err(SlotGuard::adopt(inner.clone(), Slot::Queued))
            }
        };

        inner.submitted.fetch_add(1, Ordering::Relaxed);
        let task_inner = inner.clone();
        let handle = tokio::spawn(async move {
            let _permit = match permit {
                Ok(permit) => permit,
                Err(waiting) => {
                    let acquired = task_inner.slots.clone().acquire_owned().await;
                    drop(waiting);
                    match acquired {
                        Ok(permit) => permit,
                        // Semaphore closed while waiting
                        Err(_) => return None,
                    }
                }
            };

            let _running = SlotGuard::enter(task_inner, Slot::Running);
            Some(future.await)
        });

        Ok(TaskHandle {
            label: label.to_string(),
            handle,
        })
    }

    /// Stop accepting work; tasks still waiting for a worker are dropped
    pub fn close(&self) {
        self.inner.closed.store(true, Ordering::SeqCst);
        self.inner.slots.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> PoolStats {
        let inner = &self.inner;
        PoolStats {
            capacity: inner.config.max_workers,
            max_queued: inner.config.max_queued,
            running: inner.running.load(Ordering::SeqCst),
            queued: inner.queued.load(Ordering::SeqCst),
            submitted: inner.submitted.load(Ordering::Relaxed),
            rejected: inner.rejected.load(Ordering::Relaxed),
        }
    }
}

/// Handle to a submitted task.
///
/// Awaiting the handle yields the task's output. Dropping it detaches the task;
/// `cancel` aborts it whether it is still queued or already running.
pub struct TaskHandle<T> {
    label: String,
    handle: JoinHandle<Option<T>>,
}

impl<T> fmt::Debug for TaskHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskHandle")
            .field("label", &self.label)
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

impl<T> TaskHandle<T> {
    /// Abort the task. Any future it was awaiting is dropped.
    pub fn cancel(&self) {
        if !self.handle.is_finished() {
            debug!("Cancelling task '{}'", self.label);
        }
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the task's output
    pub async fn join(self) -> GameResult<T> {
        self.await
    }
}

impl<T> Future for TaskHandle<T> {
    type Output = GameResult<T>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let this = self.get_mut();
        let result = Pin::new(&mut this.handle).poll(cx);
        result.map(|result| match result {
            Ok(Some(output)) => Ok(output),
            Ok(None) => Err(GameError::Scheduling {
                reason: format!("worker pool closed before '{}' started", this.label),
            }),
            Err(e) if e.is_cancelled() => Err(GameError::Cancelled),
            Err(e) => Err(GameError::InternalError {
                message: format!("task '{}' panicked: {}", this.label, e),
            }),
        })
    }
}
