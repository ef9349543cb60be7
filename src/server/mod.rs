//! Network entry point for game clients

pub mod listener;

pub use listener::GameListener;
