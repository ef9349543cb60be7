//! Between-round vote collection
//!
//! Each player gets a vote task on the worker pool. The collector waits for
//! both answers until a shared deadline. Tasks still pending at the deadline
//! are aborted, which drops their in-flight receive so the channel stays usable.

use crate::error::GameError;
use crate::player::PlayerHandle;
use crate::types::{parse_vote, Decision};
use crate::worker::{TaskHandle, WorkerPool};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Result of one vote between rounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoteOutcome {
    /// Decisions in the order the players were passed to `collect`. A player
    /// whose vote was still pending when the outcome was settled is `TimedOut`.
    pub decisions: [Decision; 2],
    /// True iff both players chose to continue
    pub continue_play: bool,
    /// True if a vote task could not be scheduled or was dropped by the pool
    pub scheduling_failed: bool,
}

impl VoteOutcome {
    fn settle(decisions: [Decision; 2], scheduling_failed: bool) -> Self {
        Self {
            decisions,
            continue_play: !scheduling_failed && decisions.iter().all(|d| d.wants_to_continue()),
            scheduling_failed,
        }
    }
}

/// The vote prompt, naming the deadline in whole seconds
pub fn vote_prompt(deadline: Duration) -> String {
    format!(
        "\n(Y)es, (N)o | {} sec. to decide\nEnter your decision: ",
        deadline.as_secs()
    )
}

/// Collects simultaneous yes/no decisions under a deadline
#[derive(Clone)]
pub struct DecisionCollector {
    pool: WorkerPool,
    deadline: Duration,
}

impl DecisionCollector {
    pub fn new(pool: WorkerPool, deadline: Duration) -> Self {
        Self { pool, deadline }
    }

    pub fn deadline(&self) -> Duration {
        self.deadline
    }

    /// Ask both players whether to keep playing.
    ///
    /// Resolves as soon as both have answered, either declines, or the deadline
    /// passes. Every vote task is finished or aborted before this returns.
    pub async fn collect(&self, first: &PlayerHandle, second: &PlayerHandle) -> VoteOutcome {
        let deadline = Instant::now() + self.deadline;
        let prompt = vote_prompt(self.deadline);
        let mut decisions = [Decision::TimedOut; 2];

        let mut slots: [Option<TaskHandle<Decision>>; 2] = [None, None];
        for (index, player) in [first, second].into_iter().enumerate() {
            let label = format!("vote:{}", player.id());
            match self
                .pool
                .submit(&label, ask_player(player.clone(), prompt.clone()))
            {
                Ok(handle) => slots[index] = Some(handle),
                Err(e) => {
                    warn!(
                        "Could not schedule vote for player {}: {} - ending session",
                        player.id(),
                        e
                    );
                    cancel_all(&mut slots).await;
                    return VoteOutcome::settle(decisions, true);
                }
            }
        }

        let [mut first_slot, mut second_slot] = slots;
        let sleep = tokio::time::sleep_until(deadline);
        tokio::pin!(sleep);
        let mut scheduling_failed = false;

        while first_slot.is_some() || second_slot.is_some() {
            let (index, result) = tokio::select! {
                result = wait_slot(&mut first_slot), if first_slot.is_some() => (0, result),
                result = wait_slot(&mut second_slot), if second_slot.is_some() => (1, result),
                _ = &mut sleep => {
                    info!(
                        "Vote deadline of {:?} passed - {} vote(s) outstanding",
                        self.deadline,
                        first_slot.is_some() as usize + second_slot.is_some() as usize
                    );
                    break;
                }
            };

            if index == 0 {
                first_slot = None;
            } else {
                second_slot = None;
            }

            match result {
                Ok(decision) => {
                    debug!("Vote {} resolved as {}", index, decision.as_str());
                    decisions[index] = decision;
                    if decision == Decision::Decline {
                        break;
                    }
                }
                Err(GameError::Scheduling { reason }) => {
                    warn!("Vote task {} never started: {}", index, reason);
                    scheduling_failed = true;
                    break;
                }
                Err(e) => {
                    warn!("Vote task {} failed: {}", index, e);
                }
            }
        }

        let mut remaining = [first_slot, second_slot];
        cancel_all(&mut remaining).await;

        VoteOutcome::settle(decisions, scheduling_failed)
    }
}

/// Await a slot that is known to hold a handle
async fn wait_slot(slot: &mut Option<TaskHandle<Decision>>) -> Result<Decision, GameError> {
    match slot {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

/// Abort every outstanding task and wait until each is torn down
async fn cancel_all(slots: &mut [Option<TaskHandle<Decision>>]) {
    for slot in slots.iter_mut() {
        if let Some(handle) = slot.take() {
            handle.cancel();
            let _ = handle.await;
        }
    }
}

/// Prompt one player until a valid vote or a read failure
async fn ask_player(player: PlayerHandle, prompt: String) -> Decision {
    loop {
        player.send_best_effort(&prompt).await;
        match player.receive().await {
            Ok(input) => match parse_vote(&input) {
                Some(true) => return Decision::Continue,
                Some(false) => return Decision::Decline,
                None => debug!("Invalid vote '{}' from player {}", input, player.id()),
            },
            Err(e) => {
                info!("Player {} disconnected during vote: {}", player.id(), e);
                return Decision::Disconnected;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::{memory_pair, MemoryClient};
    use crate::player::Player;
    use crate::worker::PoolConfig;
    use std::sync::Arc;

    fn create_test_player(name: &str) -> (PlayerHandle, MemoryClient) {
        let (channel, client) = memory_pair(name);
        (Player::new(name, Arc::new(channel)), client)
    }

    fn collector(deadline_secs: u64) -> (DecisionCollector, WorkerPool) {
        let pool = WorkerPool::new(PoolConfig::default());
        (
            DecisionCollector::new(pool.clone(), Duration::from_secs(deadline_secs)),
            pool,
        )
    }

    #[test]
    fn test_vote_prompt_names_deadline() {
        assert_eq!(
            vote_prompt(Duration::from_secs(15)),
            "\n(Y)es, (N)o | 15 sec. to decide\nEnter your decision: "
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_both_continue() {
        let (collector, _pool) = collector(15);
        let (a, mut client_a) = create_test_player("a");
        let (b, mut client_b) = create_test_player("b");

        let voters = tokio::spawn(async move {
            client_a.reply("y").await.unwrap();
            client_b.reply("Yes").await.unwrap();
            (client_a, client_b)
        });

        let outcome = collector.collect(&a, &b).await;
        assert_eq!(outcome.decisions, [Decision::Continue, Decision::Continue]);
        assert!(outcome.continue_play);
        assert!(!outcome.scheduling_failed);
        voters.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_silent_player_times_out_at_deadline() {
        let (collector, pool) = collector(15);
        let (a, mut client_a) = create_test_player("a");
        let (b, mut client_b) = create_test_player("b");

        let voter = tokio::spawn(async move {
            client_a.until_prompt().await.unwrap();
            tokio::time::sleep(Duration::from_secs(2)).await;
            client_a.send("y");
            client_a
        });

        let started = Instant::now();
        let outcome = collector.collect(&a, &b).await;
        let elapsed = started.elapsed();

        assert!(elapsed >= Duration::from_secs(15));
        assert!(elapsed < Duration::from_secs(16));
        assert_eq!(outcome.decisions, [Decision::Continue, Decision::TimedOut]);
        assert!(!outcome.continue_play);

        // The silent player's task is gone and its channel is free again
        assert_eq!(pool.stats().running, 0);
        client_b.until_prompt().await.unwrap();
        client_b.send("late");
        assert_eq!(b.receive().await.unwrap(), "late");
        voter.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_decline_resolves_immediately() {
        let (collector, pool) = collector(15);
        let (a, mut client_a) = create_test_player("a");
        let (b, _client_b) = create_test_player("b");

        let voter = tokio::spawn(async move {
            client_a.reply("N").await.unwrap();
            client_a
        });

        let started = Instant::now();
        let outcome = collector.collect(&a, &b).await;

        assert!(started.elapsed() < Duration::from_secs(1));
        assert_eq!(outcome.decisions[0], Decision::Decline);
        assert!(!outcome.continue_play);
        assert_eq!(pool.stats().running, 0);
        voter.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_vote_is_reprompted() {
        let (collector, _pool) = collector(15);
        let (a, mut client_a) = create_test_player("a");
        let (b, mut client_b) = create_test_player("b");

        let voters = tokio::spawn(async move {
            client_a.reply("maybe").await.unwrap();
            client_a.reply("").await.unwrap();
            client_a.reply("y").await.unwrap();
            client_b.reply("y").await.unwrap();
            (client_a, client_b)
        });

        let outcome = collector.collect(&a, &b).await;
        assert!(outcome.continue_play);
        voters.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_disconnect_does_not_affect_other_vote() {
        let (collector, _pool) = collector(15);
        let (a, mut client_a) = create_test_player("a");
        let (b, mut client_b) = create_test_player("b");
        client_a.disconnect();

        let voter = tokio::spawn(async move {
            client_b.reply("y").await.unwrap();
            client_b
        });

        let outcome = collector.collect(&a, &b).await;
        assert_eq!(outcome.decisions, [Decision::Disconnected, Decision::Continue]);
        assert!(!outcome.continue_play);
        voter.await.unwrap();
    }

    #[tokio::test]
    async fn test_saturated_pool_ends_vote() {
        let pool = WorkerPool::new(PoolConfig {
            max_workers: 1,
            max_queued: 0,
        });
        let blocker = pool
            .submit("blocker", std::future::pending::<()>())
            .unwrap();
        let collector = DecisionCollector::new(pool.clone(), Duration::from_secs(15));
        let (a, _client_a) = create_test_player("a");
        let (b, _client_b) = create_test_player("b");

        let outcome = collector.collect(&a, &b).await;
        assert!(outcome.scheduling_failed);
        assert!(!outcome.continue_play);
        blocker.cancel();
    }
}
