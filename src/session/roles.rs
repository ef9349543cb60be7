//! Per-round role assignment
//!
//! Messages inside a round are addressed by `Role`, never by comparing
//! player identities, so the role map is the only place that ties a role to
//! a player.

use crate::player::PlayerHandle;
use crate::types::{PlayerId, Role};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;

/// Source of the per-round coin flip
pub trait RoleAssigner: Send + Sync {
    /// True if the first player of the pair becomes the Game Master
    fn first_is_game_master(&self) -> bool;
}

/// Fair coin backed by the thread-local RNG
#[derive(Debug, Default, Clone, Copy)]
pub struct RandomRoleAssigner;

impl RoleAssigner for RandomRoleAssigner {
    fn first_is_game_master(&self) -> bool {
        rand::thread_rng().gen_bool(0.5)
    }
}

/// Fair coin with a reproducible sequence
#[derive(Debug)]
pub struct SeededRoleAssigner {
    rng: Mutex<StdRng>,
}

impl SeededRoleAssigner {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl RoleAssigner for SeededRoleAssigner {
    fn first_is_game_master(&self) -> bool {
        match self.rng.lock() {
            Ok(mut rng) => rng.gen_bool(0.5),
            Err(poisoned) => poisoned.into_inner().gen_bool(0.5),
        }
    }
}

/// Which player holds which role for the current round
#[derive(Debug, Clone)]
pub struct RoleMap {
    game_master: PlayerHandle,
    guesser: PlayerHandle,
}

impl RoleMap {
    /// Assign roles for a pair
    pub fn assign(first: &PlayerHandle, second: &PlayerHandle, first_is_game_master: bool) -> Self {
        let (game_master, guesser) = if first_is_game_master {
            (first.clone(), second.clone())
        } else {
            (second.clone(), first.clone())
        };
        Self {
            game_master,
            guesser,
        }
    }

    /// Flip the coin and assign roles
    pub fn draw(first: &PlayerHandle, second: &PlayerHandle, assigner: &dyn RoleAssigner) -> Self {
        Self::assign(first, second, assigner.first_is_game_master())
    }

    /// The player holding `role`
    pub fn player(&self, role: Role) -> &PlayerHandle {
        match role {
            Role::GameMaster => &self.game_master,
            Role::Guesser => &self.guesser,
        }
    }

    /// Role of a player, if it belongs to this pair
    pub fn role_of(&self, player_id: PlayerId) -> Option<Role> {
        if self.game_master.id() == player_id {
            Some(Role::GameMaster)
        } else if self.guesser.id() == player_id {
            Some(Role::Guesser)
        } else {
            None
        }
    }
}
