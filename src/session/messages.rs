//! Text sent to players during a session

use crate::types::{Answer, Role, SessionEndReason};

pub const SUBJECT_PROMPT: &str = "\nEnter the subject for this round: ";
pub const ANSWER_PROMPT: &str = "(Y)es, (N)o, (M)aybe, (C)orrect\nEnter your answer: ";
pub const INVALID_ANSWER: &str = "\nInvalid answer. Use y, n, m or c.";
pub const PLAY_AGAIN: &str = "\nPlay another round?";

pub fn matched(opponent: &str) -> String {
    format!("\nYou have been matched with {}!", opponent)
}

/// Role announcement for the player holding `role`
pub fn role_announcement(round: u32, role: Role, opponent: &str) -> String {
    match role {
        Role::GameMaster => format!(
            "\n--- Round {} ---\nYou are the {}. Think of a subject for {} to guess.",
            round, role, opponent
        ),
        Role::Guesser => format!(
            "\n--- Round {} ---\nYou are the {}. {} is choosing a subject...",
            round, role, opponent
        ),
    }
}

pub fn subject_chosen(max_questions: u32) -> String {
    format!(
        "\nThe subject has been chosen. You have {} questions.",
        max_questions
    )
}

pub fn awaiting_question(guesser: &str) -> String {
    format!("\nWaiting for {} to ask a question...", guesser)
}

pub fn question_prompt(number: u32, max_questions: u32) -> String {
    format!("\nQuestion {}/{}: ", number, max_questions)
}

pub fn question_relay(number: u32, question: &str) -> String {
    format!("\nQuestion {}: {}", number, question)
}

pub fn answer_relay(answer: Answer) -> String {
    format!("Answer: {}", answer)
}

pub fn round_result(round: u32, winner: &str, winner_role: Role, subject: &str) -> String {
    format!(
        "\n{} ({}) wins round {}! The subject was: {}",
        winner, winner_role, round, subject
    )
}

/// Farewell for a player leaving a session
pub fn session_over(reason: &SessionEndReason) -> &'static str {
    match reason {
        SessionEndReason::Declined => {
            "\nA player chose not to continue. Returning to the main menu."
        }
        SessionEndReason::VoteTimedOut => {
            "\nNo decision within the time limit. Returning to the main menu."
        }
        SessionEndReason::Disconnected { .. } => {
            "\nYour opponent disconnected. Returning to the main menu."
        }
        SessionEndReason::SchedulingFailed => {
            "\nThe server is too busy to continue. Returning to the main menu."
        }
        SessionEndReason::Aborted => "\nThe game was interrupted. Returning to the main menu.",
    }
}
