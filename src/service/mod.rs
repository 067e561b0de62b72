//! Service orchestration
//!
//! Production wiring: application state, command dispatch, and health
//! check logic.

pub mod app;
pub mod health;

pub use app::{AppState, ArcadeCommandHandler, ServiceError};
pub use health::{HealthCheck, HealthStatus};
