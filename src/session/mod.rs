//! Game sessions
//!
//! Protocol state machine for one matched pair, the per-round role map and
//! the text sent to players.

pub mod game;
pub mod messages;
pub mod roles;
pub mod state;

pub use game::{GameSession, SessionContext, SessionExit, SessionSummary};
pub use roles::{RandomRoleAssigner, RoleAssigner, RoleMap, SeededRoleAssigner};
pub use state::{RoundRecord, SessionState};
