//! Timeout-bound play-again decisions

pub mod collector;

pub use collector::{vote_prompt, DecisionCollector, VoteOutcome};
