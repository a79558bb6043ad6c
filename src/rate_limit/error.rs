//! Error types for rate limit operations

use std::fmt;

use crate::storage::StorageError;

/// Errors that can occur while checking or recording an attempt
///
/// A denied attempt is not an error; see [`super::Decision::Denied`].
#[derive(Debug)]
pub enum RateLimitError {
    /// The action string does not name a known action
    InvalidAction(String),

    /// The subject is empty or malformed
    InvalidSubject(String),

    /// The window store could not be read or written
    Storage(StorageError),
}

impl RateLimitError {
    /// Whether the error was caused by the caller's input
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            RateLimitError::InvalidAction(_) | RateLimitError::InvalidSubject(_)
        )
    }
}

impl fmt::Display for RateLimitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RateLimitError::InvalidAction(action) => write!(f, "unknown action: {}", action),
            RateLimitError::InvalidSubject(msg) => write!(f, "invalid subject: {}", msg),
            RateLimitError::Storage(err) => write!(f, "rate limit store unavailable: {}", err),
        }
    }
}

impl std::error::Error for RateLimitError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RateLimitError::Storage(err) => Some(err),
            _ => None,
        }
    }
}

impl From<StorageError> for RateLimitError {
    fn from(err: StorageError) -> Self {
        RateLimitError::Storage(err)
    }
}
