//! Utility functions for the game server

use crate::types::{PlayerId, SessionId};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique player ID
pub fn generate_player_id() -> PlayerId {
    Uuid::new_v4()
}

/// Generate a new unique session ID
pub fn generate_session_id() -> SessionId {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Whether a message is a prompt that expects exactly one reply
pub fn is_prompt(message: &str) -> bool {
    message.ends_with(": ")
}

/// Whether user input carries any content
pub fn is_blank(input: &str) -> bool {
    input.trim().is_empty()
}
