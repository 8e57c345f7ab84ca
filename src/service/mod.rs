//! Service layer for the ladder coordinator
//!
//! This module contains the application state, health checks, the console
//! chat adapter and background task management.

pub mod app;
pub mod console;
pub mod health;

pub use app::{AppState, ServiceContext, ServiceError};
pub use console::ConsoleTransport;
pub use health::{HealthCheck, HealthStatus};
