//! Unified error system for Pitboss core
//!
//! A single error type covers every operation in the workspace. Each variant
//! carries a stable wire code so the middleware boundary can map failures to
//! `{code, message}` without leaking store internals to callers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable wire codes surfaced at the middleware boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCode {
    /// No resolvable identity; recoverable by re-authenticating
    Unauthorized,
    /// Identity resolved but lacks rights; never retried automatically
    Forbidden,
    /// Resolved tenant/role does not match the entity being touched
    ContextMismatch,
    /// A privileged operation's row-count or precondition check failed
    PreconditionFailed,
    /// Invalid input or configuration
    Invalid,
    /// Uniqueness or concurrent-modification conflict
    Conflict,
    /// Storage operation failed
    Store,
    /// Internal system error
    Internal,
}

impl ErrorCode {
    /// The stable string form used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::Unauthorized => "UNAUTHORIZED",
            ErrorCode::Forbidden => "FORBIDDEN",
            ErrorCode::ContextMismatch => "CONTEXT_MISMATCH",
            ErrorCode::PreconditionFailed => "PRECONDITION_FAILED",
            ErrorCode::Invalid => "INVALID",
            ErrorCode::Conflict => "CONFLICT",
            ErrorCode::Store => "STORE",
            ErrorCode::Internal => "INTERNAL",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Unified error type for all Pitboss operations
#[derive(Debug, Clone, Serialize, Deserialize, thiserror::Error)]
pub enum PitError {
    /// No resolvable identity
    #[error("Unauthorized: {message}")]
    Unauthorized {
        /// Why the identity could not be resolved
        message: String,
    },

    /// Identity resolved but lacks rights
    #[error("Forbidden: {message}")]
    Forbidden {
        /// Why the resolved identity was rejected
        message: String,
    },

    /// Resolved context does not match the entity being touched
    #[error("Context mismatch: {message}")]
    ContextMismatch {
        /// What mismatched
        message: String,
    },

    /// Row-count or precondition verification failed
    #[error("Precondition failed: {message}")]
    PreconditionFailed {
        /// Which precondition failed
        message: String,
    },

    /// Invalid input or configuration
    #[error("Invalid: {message}")]
    Invalid {
        /// What was invalid
        message: String,
    },

    /// Uniqueness or concurrent-modification conflict
    #[error("Conflict: {message}")]
    Conflict {
        /// What conflicted
        message: String,
    },

    /// Storage operation failed
    #[error("Storage error: {message}")]
    Store {
        /// What the store reported
        message: String,
    },

    /// Internal system error
    #[error("Internal error: {message}")]
    Internal {
        /// What went wrong
        message: String,
    },
}

impl PitError {
    /// Create an unauthorized error
    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::Unauthorized {
            message: message.into(),
        }
    }

    /// Create a forbidden error
    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden {
            message: message.into(),
        }
    }

    /// Create a context mismatch error
    pub fn context_mismatch(message: impl Into<String>) -> Self {
        Self::ContextMismatch {
            message: message.into(),
        }
    }

    /// Create a precondition failed error
    pub fn precondition_failed(message: impl Into<String>) -> Self {
        Self::PreconditionFailed {
            message: message.into(),
        }
    }

    /// Create an invalid input error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create a storage error
    pub fn store(message: impl Into<String>) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// The stable wire code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            PitError::Unauthorized { .. } => ErrorCode::Unauthorized,
            PitError::Forbidden { .. } => ErrorCode::Forbidden,
            PitError::ContextMismatch { .. } => ErrorCode::ContextMismatch,
            PitError::PreconditionFailed { .. } => ErrorCode::PreconditionFailed,
            PitError::Invalid { .. } => ErrorCode::Invalid,
            PitError::Conflict { .. } => ErrorCode::Conflict,
            PitError::Store { .. } => ErrorCode::Store,
            PitError::Internal { .. } => ErrorCode::Internal,
        }
    }

    /// The human-readable message without the variant prefix
    pub fn message(&self) -> &str {
        match self {
            PitError::Unauthorized { message }
            | PitError::Forbidden { message }
            | PitError::ContextMismatch { message }
            | PitError::PreconditionFailed { message }
            | PitError::Invalid { message }
            | PitError::Conflict { message }
            | PitError::Store { message }
            | PitError::Internal { message } => message,
        }
    }
}

impl From<serde_json::Error> for PitError {
    fn from(err: serde_json::Error) -> Self {
        Self::invalid(err.to_string())
    }
}

/// Standard Result type for Pitboss operations
pub type Result<T> = std::result::Result<T, PitError>;
