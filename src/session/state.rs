//! Game session state machine

use crate::error::{GameError, GameResult};
use crate::types::{PlayerId, Role};
use serde::{Deserialize, Serialize};

/// Phases a session moves through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    /// Players are introduced to each other (once per session)
    Intro,
    /// Coin flip picks the Game Master for the round
    RoleAssign,
    /// Game Master chooses the secret subject
    SubjectSelect,
    /// Guesser asks questions, Game Master answers
    QaLoop,
    /// Winner and subject are announced
    RoundResolution,
    /// Both players decide whether to play another round
    Vote,
    /// Session is over (terminal state)
    Terminated,
}

impl SessionState {
    /// Whether moving from `self` to `next` is a legal step
    pub fn can_transition_to(self, next: SessionState) -> bool {
        use SessionState::*;

        // Any live state may end the session
        if next == Terminated {
            return self != Terminated;
        }

        matches!(
            (self, next),
            (Intro, RoleAssign)
                | (RoleAssign, SubjectSelect)
                | (SubjectSelect, QaLoop)
                | (QaLoop, RoundResolution)
                | (RoundResolution, Vote)
                | (Vote, RoleAssign)
        )
    }

    /// Validate and perform a transition
    pub fn advance(&mut self, next: SessionState) -> GameResult<()> {
        if !self.can_transition_to(next) {
            return Err(GameError::InternalError {
                message: format!("Illegal session transition {:?} -> {:?}", self, next),
            });
        }
        *self = next;
        Ok(())
    }

    pub fn is_terminal(self) -> bool {
        self == SessionState::Terminated
    }
}

/// Result of one completed round
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoundRecord {
    /// 1-based round number within the session
    pub number: u32,
    pub game_master: PlayerId,
    pub guesser: PlayerId,
    pub subject: String,
    /// Questions asked, never more than the session limit
    pub questions_asked: u32,
    /// Role that won the round
    pub winner: Role,
}

impl RoundRecord {
    /// Id of the winning player
    pub fn winner_id(&self) -> PlayerId {
        match self.winner {
            Role::GameMaster => self.game_master,
            Role::Guesser => self.guesser,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_cycle_transitions() {
        let mut state = SessionState::Intro;
        for next in [
            SessionState::RoleAssign,
            SessionState::SubjectSelect,
            SessionState::QaLoop,
            SessionState::RoundResolution,
            SessionState::Vote,
            SessionState::RoleAssign,
        ] {
            state.advance(next).unwrap();
        }
        assert_eq!(state, SessionState::RoleAssign);
    }

    #[test]
    fn test_illegal_transitions_rejected() {
        let mut state = SessionState::Intro;
        assert!(state.advance(SessionState::QaLoop).is_err());
        assert_eq!(state, SessionState::Intro);

        assert!(!SessionState::Vote.can_transition_to(SessionState::QaLoop));
        assert!(!SessionState::QaLoop.can_transition_to(SessionState::SubjectSelect));
    }

    #[test]
    fn test_terminated_is_final() {
        let mut state = SessionState::QaLoop;
        state.advance(SessionState::Terminated).unwrap();
        assert!(state.is_terminal());
        assert!(state.advance(SessionState::Terminated).is_err());
        assert!(state.advance(SessionState::RoleAssign).is_err());
    }
}
