//! Registry of connected players

use super::PlayerHandle;
use crate::error::{GameError, GameResult};
use crate::types::PlayerId;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tracing::info;

/// Snapshot of registry counters
#[derive(Debug, Clone, Default)]
pub struct RegistryStats {
    /// Players currently connected
    pub connected: usize,
    /// Players registered since start
    pub total_registered: u64,
    /// Players removed since start
    pub total_removed: u64,
}

/// Tracks every player that finished login and has not yet left
#[derive(Default)]
pub struct PlayerRegistry {
    players: RwLock<HashMap<PlayerId, PlayerHandle>>,
    total_registered: AtomicU64,
    total_removed: AtomicU64,
}

impl PlayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a player
    pub fn add(&self, player: PlayerHandle) -> GameResult<()> {
        let mut players = self
            .players
            .write()
            .map_err(|_| GameError::InternalError {
                message: "Failed to acquire registry lock".to_string(),
            })?;

        if players.contains_key(&player.id()) {
            return Err(GameError::InternalError {
                message: format!("Player {} registered twice", player.id()),
            });
        }

        info!(
            "Player '{}' ({}) registered from {} - connected: {}",
            player.name(),
            player.id(),
            player.peer(),
            players.len() + 1
        );
        players.insert(player.id(), player);
        self.total_registered.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Remove a player, returning it if it was registered
    pub fn remove(&self, player_id: PlayerId) -> GameResult<Option<PlayerHandle>> {
        let mut players = self
            .players
            .write()
            .map_err(|_| GameError::InternalError {
                message: "Failed to acquire registry lock".to_string(),
            })?;

        let removed = players.remove(&player_id);
        if let Some(player) = &removed {
            self.total_removed.fetch_add(1, Ordering::Relaxed);
            info!(
                "Player '{}' ({}) removed - connected: {}",
                player.name(),
                player_id,
                players.len()
            );
        }
        Ok(removed)
    }

    pub fn get(&self, player_id: PlayerId) -> Option<PlayerHandle> {
        self.players
            .read()
            .ok()
            .and_then(|players| players.get(&player_id).cloned())
    }

    pub fn contains(&self, player_id: PlayerId) -> bool {
        self.get(player_id).is_some()
    }

    pub fn len(&self) -> usize {
        self.players.read().map(|players| players.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> RegistryStats {
        RegistryStats {
            connected: self.len(),
            total_registered: self.total_registered.load(Ordering::Relaxed),
            total_removed: self.total_removed.load(Ordering::Relaxed),
        }
    }
}
