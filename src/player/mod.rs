//! Connected players and the player registry
//!
//! A `Player` is identified by its connection-scoped `PlayerId`; the display
//! name is mutable and never used for identity.

pub mod registry;

pub use registry::{PlayerRegistry, RegistryStats};

use crate::channel::PlayerChannel;
use crate::error::{GameError, GameResult};
use crate::types::PlayerId;
use crate::utils::{current_timestamp, generate_player_id, is_blank};
use chrono::{DateTime, Utc};
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

/// Shared handle to a connected player
pub type PlayerHandle = Arc<Player>;

/// A connected player and its channel
pub struct Player {
    id: PlayerId,
    name: RwLock<String>,
    channel: Arc<dyn PlayerChannel>,
    connected_at: DateTime<Utc>,
}

impl std::fmt::Debug for Player {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Player")
            .field("id", &self.id)
            .field("name", &self.name())
            .field("peer", &self.channel.peer())
            .finish()
    }
}

impl Player {
    /// Create a player for a freshly accepted channel
    pub fn new(name: impl Into<String>, channel: Arc<dyn PlayerChannel>) -> PlayerHandle {
        Arc::new(Self {
            id: generate_player_id(),
            name: RwLock::new(name.into()),
            channel,
            connected_at: current_timestamp(),
        })
    }

    pub fn id(&self) -> PlayerId {
        self.id
    }

    /// Current display name
    pub fn name(&self) -> String {
        self.name
            .read()
            .map(|name| name.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }

    /// Change the display name
    pub fn set_name(&self, name: impl Into<String>) {
        let name = name.into();
        match self.name.write() {
            Ok(mut current) => *current = name,
            Err(poisoned) => *poisoned.into_inner() = name,
        }
    }

    pub fn connected_at(&self) -> DateTime<Utc> {
        self.connected_at
    }

    /// Peer description of the underlying channel
    pub fn peer(&self) -> String {
        self.channel.peer()
    }

    /// Send a message; failures surface as `GameError::Transport`
    pub async fn send(&self, message: &str) -> GameResult<()> {
        self.channel
            .send(message)
            .await
            .map_err(|e| GameError::transport(self.id, e.to_string()))
    }

    /// Send a message, logging instead of propagating failure.
    /// Returns whether the message was delivered to the channel.
    pub async fn send_best_effort(&self, message: &str) -> bool {
        match self.send(message).await {
            Ok(()) => true,
            Err(e) => {
                warn!("Send to player '{}' ({}) failed: {}", self.name(), self.id, e);
                false
            }
        }
    }

    /// Wait for the next message
    pub async fn receive(&self) -> GameResult<String> {
        self.channel
            .receive()
            .await
            .map_err(|e| GameError::transport(self.id, e.to_string()))
    }

    /// Prompt until a non-blank reply arrives. Blank input is re-prompted
    /// indefinitely; a transport failure ends the wait.
    pub async fn prompt_non_empty(&self, prompt: &str) -> GameResult<String> {
        loop {
            self.send_best_effort(prompt).await;
            let input = self.receive().await?;
            if !is_blank(&input) {
                return Ok(input.trim().to_string());
            }
            debug!("Blank input from player {}, re-prompting", self.id);
        }
    }

    /// Close the underlying channel
    pub async fn disconnect(&self) {
        self.channel.close().await;
    }
}
