//! Error types for the game server
//!
//! Service plumbing uses anyhow; the session core works with the typed
//! `GameError` so it can tell a dead channel from a saturated worker pool.

use crate::types::PlayerId;

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Result type alias for the typed game error
pub type GameResult<T> = std::result::Result<T, GameError>;

/// Custom error types for specific game server scenarios
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Transport failure for player {player}: {message}")]
    Transport { player: PlayerId, message: String },

    #[error("Protocol violation: {reason}")]
    ProtocolViolation { reason: String },

    #[error("Timed out waiting for {what}")]
    Timeout { what: String },

    #[error("Scheduling rejected: {reason}")]
    Scheduling { reason: String },

    #[error("Task was cancelled before completion")]
    Cancelled,

    #[error("Player already queued or in a session: {player_id}")]
    AlreadyQueued { player_id: PlayerId },

    #[error("Player not found: {player_id}")]
    PlayerNotFound { player_id: PlayerId },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl GameError {
    /// Build a transport error for a player
    pub fn transport(player: PlayerId, message: impl Into<String>) -> Self {
        Self::Transport {
            player,
            message: message.into(),
        }
    }

    /// Whether the caller may retry the operation later
    pub fn is_retryable(&self) -> bool {
        matches!(self, GameError::Scheduling { .. })
    }

    /// Whether this error means a player's channel is gone
    pub fn is_transport(&self) -> bool {
        matches!(self, GameError::Transport { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::generate_player_id;

    #[test]
    fn test_error_classification() {
        let scheduling = GameError::Scheduling {
            reason: "pool saturated".to_string(),
        };
        assert!(scheduling.is_retryable());
        assert!(!scheduling.is_transport());

        let transport = GameError::transport(generate_player_id(), "connection reset");
        assert!(transport.is_transport());
        assert!(!transport.is_retryable());

        assert!(!GameError::Cancelled.is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = GameError::Timeout {
            what: "continue vote".to_string(),
        };
        assert_eq!(err.to_string(), "Timed out waiting for continue vote");
    }
}
