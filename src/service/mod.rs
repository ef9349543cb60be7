//! Service layer for the game server
//!
//! Application state, component wiring and health reporting for the
//! production binary.

pub mod app;
pub mod health;

pub use app::{AppState, ServiceError};
pub use health::{HealthCheck, HealthStatus, ServiceMonitor};
