//! Matchmaker: FIFO pairing of waiting players
//!
//! `enqueue` appends under the queue lock and wakes the pairing loop through a
//! `Notify`. The loop drains every available pair, hands each to a
//! `MatchHandler`, and parks until the next wakeup. If a pair cannot be
//! dispatched it goes back to the head of the queue and is retried later.

use crate::error::{GameError, GameResult};
use crate::matchmaking::queue::{MatchQueue, Membership};
use crate::metrics::MetricsCollector;
use crate::player::PlayerHandle;
use crate::types::PlayerId;
use async_trait::async_trait;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Message shown to a player entering the queue
pub const WAITING_NOTICE: &str = "\nWaiting to be matched...";

/// Receives every pair the matchmaker forms
#[async_trait]
pub trait MatchHandler: Send + Sync {
    /// Start a session for two freshly paired players. Both are already in the
    /// active set. An error puts them back at the head of the queue.
    async fn on_match(&self, first: PlayerHandle, second: PlayerHandle) -> GameResult<()>;
}

/// Statistics about matchmaker operations
#[derive(Debug, Clone, Default)]
pub struct MatchmakerStats {
    /// Total number of successful enqueues
    pub players_queued: u64,
    /// Total number of pairs formed
    pub pairs_made: u64,
    /// Total number of pairs that could not be dispatched
    pub dispatch_failures: u64,
    /// Players currently waiting
    pub players_waiting: usize,
    /// Players currently bound to a session
    pub players_active: usize,
}

/// Consistent view of both collections taken under one lock
#[derive(Debug, Clone, Default)]
pub struct MatchmakerSnapshot {
    pub waiting: Vec<PlayerId>,
    pub active: Vec<PlayerId>,
}

/// The matchmaker
#[derive(Clone)]
pub struct Matchmaker {
    /// Waiting queue and active set behind a single lock
    queue: Arc<Mutex<MatchQueue>>,
    /// Signalled whenever a player is queued
    wakeup: Arc<Notify>,
    /// Delay before retrying a pair that failed to dispatch
    retry_delay: Duration,
    players_queued: Arc<AtomicU64>,
    pairs_made: Arc<AtomicU64>,
    dispatch_failures: Arc<AtomicU64>,
    metrics_collector: Arc<MetricsCollector>,
}

impl Matchmaker {
    /// Create a matchmaker with its own metrics collector
    pub fn new(retry_delay: Duration) -> Self {
        let metrics_collector = Arc::new(MetricsCollector::new().unwrap_or_else(|_| {
            warn!("Failed to create metrics collector, using default");
            MetricsCollector::default()
        }));

        Self::with_metrics(retry_delay, metrics_collector)
    }

    /// Create a matchmaker reporting to a shared metrics collector
    pub fn with_metrics(retry_delay: Duration, metrics_collector: Arc<MetricsCollector>) -> Self {
        Self {
            queue: Arc::new(Mutex::new(MatchQueue::new())),
            wakeup: Arc::new(Notify::new()),
            retry_delay,
            players_queued: Arc::new(AtomicU64::new(0)),
            pairs_made: Arc::new(AtomicU64::new(0)),
            dispatch_failures: Arc::new(AtomicU64::new(0)),
            metrics_collector,
        }
    }

    fn lock_queue(&self) -> GameResult<std::sync::MutexGuard<'_, MatchQueue>> {
        self.queue.lock().map_err(|_| GameError::InternalError {
            message: "Failed to acquire matchmaking queue lock".to_string(),
        })
    }

    /// Add a player to the tail of the waiting queue and wake the pairing loop.
    /// Returns the player's position in line (1-based).
    pub async fn enqueue(&self, player: PlayerHandle) -> GameResult<usize> {
        if self.lock_queue()?.membership(player.id()) != Membership::Absent {
            return Err(GameError::AlreadyQueued {
                player_id: player.id(),
            });
        }

        // A player who cannot receive the notice will not survive a session
        player.send(WAITING_NOTICE).await?;

        let (position, waiting) = {
            let mut queue = self.lock_queue()?;
            let position = queue.push(player.clone())?;
            (position, queue.waiting_len())
        };

        self.players_queued.fetch_add(1, Ordering::Relaxed);
        self.metrics_collector.record_player_queued();
        self.metrics_collector.set_players_waiting(waiting);
        info!(
            "Player '{}' ({}) queued at position {}",
            player.name(),
            player.id(),
            position
        );

        self.wakeup.notify_one();
        Ok(position)
    }

    /// Pop the two oldest waiting players into the active set, if two are waiting
    pub fn try_pair(&self) -> Option<(PlayerHandle, PlayerHandle)> {
        let (pair, waiting) = match self.lock_queue() {
            Ok(mut queue) => {
                let pair = queue.pop_pair();
                (pair, queue.waiting_len())
            }
            Err(e) => {
                error!("Pairing attempt failed: {}", e);
                return None;
            }
        };

        let (first, second) = pair?;
        self.pairs_made.fetch_add(1, Ordering::Relaxed);
        self.metrics_collector.record_match_made();
        self.metrics_collector.set_players_waiting(waiting);
        info!(
            "Paired '{}' ({}) with '{}' ({}) - {} still waiting",
            first.name(),
            first.id(),
            second.name(),
            second.id(),
            waiting
        );
        Some((first, second))
    }

    /// Pairing loop. Runs until `shutdown` is cancelled.
    pub async fn run(&self, handler: Arc<dyn MatchHandler>, shutdown: CancellationToken) {
        info!("Matchmaker pairing loop started");

        loop {
            let mut dispatch_failed = false;

            while let Some((first, second)) = self.try_pair() {
                if let Err(e) = handler.on_match(first.clone(), second.clone()).await {
                    self.dispatch_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(
                        "Failed to start session for {} and {}: {} - returning both to the queue",
                        first.id(),
                        second.id(),
                        e
                    );
                    self.requeue(first, second);
                    dispatch_failed = true;
                    break;
                }
            }

            if dispatch_failed {
                tokio::select! {
                    _ = tokio::time::sleep(self.retry_delay) => continue,
                    _ = shutdown.cancelled() => break,
                }
            }

            tokio::select! {
                _ = self.wakeup.notified() => {
                    debug!("Matchmaker woken by enqueue");
                }
                _ = shutdown.cancelled() => break,
            }
        }

        info!("Matchmaker pairing loop stopped");
    }

    /// Put a pair back at the head of the queue
    fn requeue(&self, first: PlayerHandle, second: PlayerHandle) {
        match self.lock_queue() {
            Ok(mut queue) => {
                queue.restore_pair(first, second);
                self.metrics_collector.set_players_waiting(queue.waiting_len());
            }
            Err(e) => error!("Could not requeue pair: {}", e),
        }
    }

    /// Remove a player from the active set after its session ended
    pub fn release(&self, player_id: PlayerId) -> bool {
        match self.lock_queue() {
            Ok(mut queue) => queue.release(player_id),
            Err(e) => {
                error!("Could not release player {}: {}", player_id, e);
                false
            }
        }
    }

    /// Remove a waiting player (left before being matched)
    pub fn withdraw(&self, player_id: PlayerId) -> Option<PlayerHandle> {
        let mut queue = self.lock_queue().ok()?;
        let removed = queue.withdraw(player_id);
        if removed.is_some() {
            self.metrics_collector.set_players_waiting(queue.waiting_len());
            info!("Player {} withdrawn from the waiting queue", player_id);
        }
        removed
    }

    /// Token cancelled when a waiting player is paired, or `None` if the player
    /// is not waiting (already paired, withdrawn or never queued)
    pub fn match_signal(&self, player_id: PlayerId) -> Option<CancellationToken> {
        self.lock_queue().ok()?.match_signal(player_id)
    }

    pub fn membership(&self, player_id: PlayerId) -> Membership {
        self.lock_queue()
            .map(|queue| queue.membership(player_id))
            .unwrap_or(Membership::Absent)
    }

    /// Both collections as seen at one instant
    pub fn snapshot(&self) -> MatchmakerSnapshot {
        self.lock_queue()
            .map(|queue| MatchmakerSnapshot {
                waiting: queue.waiting_ids(),
                active: queue.active_ids(),
            })
            .unwrap_or_default()
    }

    pub fn stats(&self) -> MatchmakerStats {
        let (players_waiting, players_active) = self
            .lock_queue()
            .map(|queue| (queue.waiting_len(), queue.active_len()))
            .unwrap_or((0, 0));

        MatchmakerStats {
            players_queued: self.players_queued.load(Ordering::Relaxed),
            pairs_made: self.pairs_made.load(Ordering::Relaxed),
            dispatch_failures: self.dispatch_failures.load(Ordering::Relaxed),
            players_waiting,
            players_active,
        }
    }
}
