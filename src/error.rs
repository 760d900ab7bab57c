//! Error types for forum lifecycle operations.

use thiserror::Error;

/// Result type alias for forumkit operations.
pub type Result<T> = std::result::Result<T, ForumError>;

/// Main error type for forumkit operations.
///
/// `NotFound` and `InvalidTransition` are permanent and should be surfaced to
/// the caller as-is. `LockTimeout` is the only retryable kind.
#[derive(Error, Debug)]
pub enum ForumError {
    /// A referenced forum, topic or reply does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// The requested transition is not legal from the node's current state
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),

    /// Advisory subtree lock could not be acquired in time
    #[error("Lock timeout: {0}")]
    LockTimeout(String),

    /// Underlying storage read or write failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid input or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ForumError {
    /// Creates a new not-found error.
    pub fn not_found<T: ToString>(msg: T) -> Self {
        Self::NotFound(msg.to_string())
    }

    /// Creates a new invalid transition error.
    pub fn invalid_transition<T: ToString>(msg: T) -> Self {
        Self::InvalidTransition(msg.to_string())
    }

    /// Creates a new lock timeout error.
    pub fn lock_timeout<T: ToString>(msg: T) -> Self {
        Self::LockTimeout(msg.to_string())
    }

    /// Creates a new storage error.
    pub fn storage<T: ToString>(msg: T) -> Self {
        Self::Storage(msg.to_string())
    }

    /// Creates a new serialization error.
    pub fn serialization<T: ToString>(msg: T) -> Self {
        Self::Serialization(msg.to_string())
    }

    /// Creates a new invalid input error.
    pub fn invalid_input<T: ToString>(msg: T) -> Self {
        Self::InvalidInput(msg.to_string())
    }

    /// Creates a new configuration error.
    pub fn config<T: ToString>(msg: T) -> Self {
        Self::Config(msg.to_string())
    }

    /// Returns true if the caller may retry the operation with backoff.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::LockTimeout(_))
    }

    /// Returns true for failures that will recur on retry without a change
    /// in the request.
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            Self::NotFound(_) | Self::InvalidTransition(_) | Self::InvalidInput(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(ForumError::lock_timeout("busy").is_retryable());
        assert!(!ForumError::not_found("topic 3").is_retryable());
        assert!(!ForumError::storage("disk").is_retryable());
    }

    #[test]
    fn test_permanent_classification() {
        assert!(ForumError::not_found("x").is_permanent());
        assert!(ForumError::invalid_transition("x").is_permanent());
        assert!(!ForumError::lock_timeout("x").is_permanent());
        assert!(!ForumError::storage("x").is_permanent());
    }

    #[test]
    fn test_display_messages() {
        let err = ForumError::not_found("topic 7");
        assert_eq!(err.to_string(), "Not found: topic 7");
        let err = ForumError::invalid_transition("topic 7 is not trashed");
        assert_eq!(err.to_string(), "Invalid transition: topic 7 is not trashed");
    }
}
