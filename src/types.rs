//! Common types used throughout the game server

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a connected player (never the display name)
pub type PlayerId = Uuid;

/// Unique identifier for a game session
pub type SessionId = Uuid;

/// Role a player holds for the duration of one round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    GameMaster,
    Guesser,
}

impl Role {
    /// The role held by the other player
    pub fn opposite(self) -> Self {
        match self {
            Role::GameMaster => Role::Guesser,
            Role::Guesser => Role::GameMaster,
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::GameMaster => write!(f, "Game Master"),
            Role::Guesser => write!(f, "Guesser"),
        }
    }
}

/// Game Master's reply to a question
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Answer {
    Yes,
    No,
    Maybe,
    Correct,
}

impl Answer {
    pub const ALL: [Answer; 4] = [Answer::Yes, Answer::No, Answer::Maybe, Answer::Correct];

    /// Map a single answer code, case-insensitively
    pub fn from_char(c: char) -> Option<Self> {
        match c.to_ascii_lowercase() {
            'y' => Some(Answer::Yes),
            'n' => Some(Answer::No),
            'm' => Some(Answer::Maybe),
            'c' => Some(Answer::Correct),
            _ => None,
        }
    }

    /// Canonical lowercase code for this answer
    pub fn to_char(self) -> char {
        match self {
            Answer::Yes => 'y',
            Answer::No => 'n',
            Answer::Maybe => 'm',
            Answer::Correct => 'c',
        }
    }

    /// Parse a whole input message. Exactly one non-blank character is accepted.
    pub fn parse(input: &str) -> Option<Self> {
        single_char(input).and_then(Self::from_char)
    }
}

impl std::fmt::Display for Answer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Answer::Yes => write!(f, "YES"),
            Answer::No => write!(f, "NO"),
            Answer::Maybe => write!(f, "MAYBE"),
            Answer::Correct => write!(f, "CORRECT"),
        }
    }
}

/// Parse a continue-playing vote: `y` or `n`, case-insensitive, first character
pub fn parse_vote(input: &str) -> Option<bool> {
    match input.trim().chars().next()?.to_ascii_lowercase() {
        'y' => Some(true),
        'n' => Some(false),
        _ => None,
    }
}

fn single_char(input: &str) -> Option<char> {
    let mut chars = input.trim().chars();
    let first = chars.next()?;
    match chars.next() {
        None => Some(first),
        Some(_) => None,
    }
}

/// One player's resolved continue-playing vote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    Continue,
    Decline,
    TimedOut,
    Disconnected,
}

impl Decision {
    pub fn wants_to_continue(self) -> bool {
        matches!(self, Decision::Continue)
    }

    /// Label used for logs and metrics
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Continue => "continue",
            Decision::Decline => "decline",
            Decision::TimedOut => "timed_out",
            Decision::Disconnected => "disconnected",
        }
    }
}

/// Why a session stopped
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionEndReason {
    /// At least one player voted no
    Declined,
    /// At least one vote did not arrive before the deadline
    VoteTimedOut,
    /// A player's channel failed
    Disconnected { player_id: PlayerId },
    /// The vote could not be scheduled
    SchedulingFailed,
    /// A round failed for a reason other than a dead channel
    Aborted,
}

impl SessionEndReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionEndReason::Declined => "declined",
            SessionEndReason::VoteTimedOut => "vote_timed_out",
            SessionEndReason::Disconnected { .. } => "disconnected",
            SessionEndReason::SchedulingFailed => "scheduling_failed",
            SessionEndReason::Aborted => "aborted",
        }
    }
}
