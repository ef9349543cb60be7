//! Twenty Questions - matchmaking game server
//!
//! Players connect over TCP, log in with a username and are paired first come,
//! first served. Each pair plays rounds of Twenty Questions with randomly
//! assigned roles until one of them declines another round.

pub mod channel;
pub mod config;
pub mod decision;
pub mod error;
pub mod lobby;
pub mod matchmaking;
pub mod metrics;
pub mod player;
pub mod server;
pub mod service;
pub mod session;
pub mod types;
pub mod utils;
pub mod worker;

// Re-export commonly used types and traits
pub use error::{GameError, GameResult, Result};
pub use types::*;

// Re-export key components
pub use channel::PlayerChannel;
pub use lobby::Lobby;
pub use matchmaking::{MatchHandler, Matchmaker};
pub use player::{Player, PlayerHandle, PlayerRegistry};
pub use session::{GameSession, SessionContext};
pub use worker::WorkerPool;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
