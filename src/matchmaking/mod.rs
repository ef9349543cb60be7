//! Matchmaking for the game server
//!
//! This module holds the FIFO waiting queue, the set of players bound to a
//! running session, and the pairing loop that turns the two oldest waiting
//! players into a new session.

pub mod matchmaker;
pub mod queue;

// Re-export commonly used types
pub use matchmaker::{
    MatchHandler, Matchmaker, MatchmakerSnapshot, MatchmakerStats, WAITING_NOTICE,
};
pub use queue::{MatchQueue, Membership};
