//! Waiting queue and active set
//!
//! Both collections live in one struct so a single lock covers every
//! transition between them. A player is never in both at once.

use crate::error::{GameError, GameResult};
use crate::player::PlayerHandle;
use crate::types::PlayerId;
use std::collections::{HashSet, VecDeque};
use tokio_util::sync::CancellationToken;

/// Queue entry that preserves arrival order
#[derive(Debug, Clone)]
struct QueueEntry {
    player: PlayerHandle,
    /// Cancelled when the player leaves the queue for a session
    matched: CancellationToken,
}

impl QueueEntry {
    fn new(player: PlayerHandle) -> Self {
        Self {
            player,
            matched: CancellationToken::new(),
        }
    }
}

/// Location of a player inside the matchmaker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Membership {
    Waiting,
    Active,
    Absent,
}

/// FIFO waiting queue plus the set of players bound to a running session
#[derive(Debug, Default)]
pub struct MatchQueue {
    waiting: VecDeque<QueueEntry>,
    active: HashSet<PlayerId>,
}

impl MatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Where a player currently is
    pub fn membership(&self, player_id: PlayerId) -> Membership {
        if self.active.contains(&player_id) {
            Membership::Active
        } else if self.waiting.iter().any(|e| e.player.id() == player_id) {
            Membership::Waiting
        } else {
            Membership::Absent
        }
    }

    /// Append a player to the tail of the waiting queue
    pub fn push(&mut self, player: PlayerHandle) -> GameResult<usize> {
        if self.membership(player.id()) != Membership::Absent {
            return Err(GameError::AlreadyQueued {
                player_id: player.id(),
            });
        }

        self.waiting.push_back(QueueEntry::new(player));
        Ok(self.waiting.len())
    }

    /// Token cancelled once the waiting player is paired. `None` if the player
    /// is not waiting.
    pub fn match_signal(&self, player_id: PlayerId) -> Option<CancellationToken> {
        self.waiting
            .iter()
            .find(|e| e.player.id() == player_id)
            .map(|e| e.matched.clone())
    }

    /// Pop the two oldest waiting players and mark them active
    pub fn pop_pair(&mut self) -> Option<(PlayerHandle, PlayerHandle)> {
        if self.waiting.len() < 2 {
            return None;
        }

        let first = self.waiting.pop_front()?;
        let second = self.waiting.pop_front()?;
        first.matched.cancel();
        second.matched.cancel();
        self.active.insert(first.player.id());
        self.active.insert(second.player.id());
        Some((first.player, second.player))
    }

    /// Undo a pairing that could not be started: both players go back to
    /// the head of the queue in their original order.
    pub fn restore_pair(&mut self, first: PlayerHandle, second: PlayerHandle) {
        self.active.remove(&first.id());
        self.active.remove(&second.id());

        self.waiting.push_front(QueueEntry::new(second));
        self.waiting.push_front(QueueEntry::new(first));
    }

    /// Remove a player from the active set
    pub fn release(&mut self, player_id: PlayerId) -> bool {
        self.active.remove(&player_id)
    }

    /// Remove a player from the waiting queue
    pub fn withdraw(&mut self, player_id: PlayerId) -> Option<PlayerHandle> {
        let index = self
            .waiting
            .iter()
            .position(|e| e.player.id() == player_id)?;
        self.waiting.remove(index).map(|e| e.player)
    }

    pub fn waiting_len(&self) -> usize {
        self.waiting.len()
    }

    pub fn active_len(&self) -> usize {
        self.active.len()
    }

    /// Waiting player ids, oldest first
    pub fn waiting_ids(&self) -> Vec<PlayerId> {
        self.waiting.iter().map(|e| e.player.id()).collect()
    }

    pub fn active_ids(&self) -> Vec<PlayerId> {
        self.active.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::memory_pair;
    use crate::player::Player;
    use std::sync::Arc;

    fn create_test_player(name: &str) -> PlayerHandle {
        let (channel, _client) = memory_pair(name);
        Player::new(name, Arc::new(channel))
    }

    #[test]
    fn test_pairs_oldest_first() {
        let mut queue = MatchQueue::new();
        let players: Vec<_> = (1..=4)
            .map(|i| create_test_player(&format!("p{}", i)))
            .collect();
        for player in &players {
            queue.push(player.clone()).unwrap();
        }

        let (a, b) = queue.pop_pair().unwrap();
        assert_eq!((a.id(), b.id()), (players[0].id(), players[1].id()));
        let (c, d) = queue.pop_pair().unwrap();
        assert_eq!((c.id(), d.id()), (players[2].id(), players[3].id()));
        assert!(queue.pop_pair().is_none());
        assert_eq!(queue.active_len(), 4);
    }

    #[test]
    fn test_single_player_is_not_paired() {
        let mut queue = MatchQueue::new();
        queue.push(create_test_player("alone")).unwrap();

        assert!(queue.pop_pair().is_none());
        assert_eq!(queue.waiting_len(), 1);
        assert_eq!(queue.active_len(), 0);
    }

    #[test]
    fn test_membership_is_exclusive() {
        let mut queue = MatchQueue::new();
        let a = create_test_player("a");
        let b = create_test_player("b");
        queue.push(a.clone()).unwrap();
        assert_eq!(queue.membership(a.id()), Membership::Waiting);

        // Cannot queue twice
        assert!(queue.push(a.clone()).is_err());

        queue.push(b.clone()).unwrap();
        queue.pop_pair().unwrap();
        assert_eq!(queue.membership(a.id()), Membership::Active);

        // Cannot queue while active
        assert!(queue.push(a.clone()).is_err());

        assert!(queue.release(a.id()));
        assert_eq!(queue.membership(a.id()), Membership::Absent);
        assert!(queue.push(a).is_ok());
    }

    #[test]
    fn test_restore_pair_keeps_order_at_head() {
        let mut queue = MatchQueue::new();
        let a = create_test_player("a");
        let b = create_test_player("b");
        let c = create_test_player("c");
        queue.push(a.clone()).unwrap();
        queue.push(b.clone()).unwrap();

        let (first, second) = queue.pop_pair().unwrap();
        queue.push(c.clone()).unwrap();
        queue.restore_pair(first, second);

        assert_eq!(queue.waiting_ids(), vec![a.id(), b.id(), c.id()]);
        assert_eq!(queue.active_len(), 0);
    }

    #[test]
    fn test_match_signal_fires_on_pairing() {
        let mut queue = MatchQueue::new();
        let a = create_test_player("a");
        let b = create_test_player("b");
        queue.push(a.clone()).unwrap();

        let signal = queue.match_signal(a.id()).unwrap();
        assert!(!signal.is_cancelled());
        assert!(queue.match_signal(b.id()).is_none());

        queue.push(b.clone()).unwrap();
        queue.pop_pair().unwrap();
        assert!(signal.is_cancelled());
        assert!(queue.match_signal(a.id()).is_none());
    }

    #[test]
    fn test_withdraw_waiting_player() {
        let mut queue = MatchQueue::new();
        let a = create_test_player("a");
        queue.push(a.clone()).unwrap();

        assert!(queue.withdraw(a.id()).is_some());
        assert!(queue.withdraw(a.id()).is_none());
        assert_eq!(queue.waiting_len(), 0);
    }
}
