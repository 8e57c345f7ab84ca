//! Error types for the ladder coordinator
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application. `LadderError` carries the failure categories that
//! command handlers translate into user-facing replies.

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Reply shown to users for any persistence failure
pub const STORE_FAILURE_REPLY: &str = "Database error. Contact admin.";

/// Custom error types for specific ladder scenarios
#[derive(Debug, thiserror::Error)]
pub enum LadderError {
    #[error("Player store {operation} failed: {message}")]
    Store { operation: String, message: String },

    #[error("Player store {operation} timed out after {timeout_ms}ms")]
    StoreTimeout { operation: String, timeout_ms: u64 },

    #[error("Invalid command: {reason}")]
    Validation { reason: String },

    #[error("Invalid state: {reason}")]
    State { reason: String },

    #[error("Queue invariant violated: {reason}")]
    ConcurrencyViolation { reason: String },

    #[error("Rating calculation failed: {reason}")]
    Rating { reason: String },

    #[error("Invalid match result: {reason}")]
    InvalidResult { reason: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Internal service error: {message}")]
    Internal { message: String },
}

impl LadderError {
    /// Build a store error from any displayable cause
    pub fn store(operation: &str, cause: impl std::fmt::Display) -> Self {
        LadderError::Store {
            operation: operation.to_string(),
            message: cause.to_string(),
        }
    }

    /// Whether this error originated in the player store
    pub fn is_store_error(&self) -> bool {
        matches!(
            self,
            LadderError::Store { .. } | LadderError::StoreTimeout { .. }
        )
    }

    /// Text that is safe to show to the player who issued the command.
    ///
    /// Store failures never expose their cause; validation failures are
    /// reported inline.
    pub fn user_message(&self) -> String {
        match self {
            LadderError::Store { .. } | LadderError::StoreTimeout { .. } => {
                STORE_FAILURE_REPLY.to_string()
            }
            LadderError::Validation { reason } => reason.clone(),
            _ => "Something went wrong. Contact admin.".to_string(),
        }
    }
}

/// Map any error to the reply shown to the command's originator
pub fn user_message(error: &anyhow::Error) -> String {
    match error.downcast_ref::<LadderError>() {
        Some(ladder_error) => ladder_error.user_message(),
        None => "Something went wrong. Contact admin.".to_string(),
    }
}
