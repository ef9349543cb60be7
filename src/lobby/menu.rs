//! Main menu text and choice parsing

use serde::{Deserialize, Serialize};

pub const MAIN_MENU: &str = "\n1. Play Game\n2. Change Username\n3. Exit\n";
pub const MENU_PROMPT: &str = "Enter your decision: ";
pub const RENAME_PROMPT: &str = "\nEnter new username: ";
pub const GOODBYE: &str = "\nGoodbye!";

/// Entry picked from the main menu
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuChoice {
    Play,
    ChangeUsername,
    Exit,
}

impl MenuChoice {
    /// Parse a menu number. Anything other than 1, 2 or 3 is rejected.
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().parse::<u32>().ok()? {
            1 => Some(MenuChoice::Play),
            2 => Some(MenuChoice::ChangeUsername),
            3 => Some(MenuChoice::Exit),
            _ => None,
        }
    }
}
