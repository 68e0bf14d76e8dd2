//! Error types for frame-bridge.
//!
//! This module defines all error types used throughout the crate.
//!
//! # Usage
//!
//! All fallible operations return [`Result<T>`] which uses [`Error`]:
//!
//! ```ignore
//! use frame_bridge::{FrameContext, Result};
//!
//! fn open_settings(session: &Session) -> Result<()> {
//!     session.ensure_initialized(&[FrameContext::Content])?;
//!     session.send("settings.open", vec![]);
//!     Ok(())
//! }
//! ```
//!
//! # Error Categories
//!
//! | Category | Variants |
//! |----------|----------|
//! | Usage | [`Error::NotInitialized`], [`Error::WrongContext`] |
//! | Configuration | [`Error::Config`], [`Error::InvalidArgument`] |
//! | Async | [`Error::Timeout`], [`Error::ChannelClosed`], [`Error::AuthenticationFailed`] |
//! | External | [`Error::Json`], [`Error::Url`], [`Error::Regex`] |
//!
//! Unauthorized inbound messages are not errors. They are dropped before
//! they reach application code.

// ============================================================================
// Imports
// ============================================================================

use std::result::Result as StdResult;

use thiserror::Error;
use tokio::sync::oneshot::error::RecvError;

// ============================================================================
// Result Alias
// ============================================================================

/// Result type alias using crate [`enum@Error`].
///
/// All fallible operations in this crate return this type.
pub type Result<T> = StdResult<T, Error>;

// ============================================================================
// Error Enum
// ============================================================================

/// Main error type for the crate.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Usage Errors
    // ========================================================================
    /// A protocol-dependent call was made before `initialize`.
    ///
    /// Always returned synchronously; indicates a programming error.
    #[error("The library has not yet been initialized")]
    NotInitialized,

    /// A call was made outside its allowed frame contexts.
    #[error("This call is not allowed in the '{context}' context")]
    WrongContext {
        /// The frame context the session is currently in.
        context: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration error.
    ///
    /// Returned when session options are invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the configuration error.
        message: String,
    },

    /// Invalid argument passed to an operation.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Description of the invalid argument.
        message: String,
    },

    // ========================================================================
    // Async Errors
    // ========================================================================
    /// Awaited reply did not arrive in time.
    #[error("Timeout after {timeout_ms}ms: {operation}")]
    Timeout {
        /// Description of the operation that timed out.
        operation: String,
        /// Milliseconds waited before timeout.
        timeout_ms: u64,
    },

    /// Authentication flow finished with a failure reason.
    #[error("Authentication failed: {reason}")]
    AuthenticationFailed {
        /// Reason reported by the popup, the host, or the controller.
        reason: String,
    },

    /// Reply channel dropped, typically because the session was torn down.
    #[error("Channel closed")]
    ChannelClosed(#[from] RecvError),

    // ========================================================================
    // External Errors
    // ========================================================================
    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// URL parse error.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Origin pattern failed to compile.
    #[error("Origin pattern error: {0}")]
    Regex(#[from] regex::Error),
}

// ============================================================================
// Error Constructors
// ============================================================================

impl Error {
    /// Creates a wrong-context error.
    #[inline]
    pub fn wrong_context(context: impl Into<String>) -> Self {
        Self::WrongContext {
            context: context.into(),
        }
    }

    /// Creates a configuration error.
    #[inline]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates an invalid argument error.
    #[inline]
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates a timeout error.
    #[inline]
    pub fn timeout(operation: impl Into<String>, timeout_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            timeout_ms,
        }
    }

    /// Creates an authentication failure error.
    #[inline]
    pub fn authentication_failed(reason: impl Into<String>) -> Self {
        Self::AuthenticationFailed {
            reason: reason.into(),
        }
    }
}

// ============================================================================
// Error Predicates
// ============================================================================

impl Error {
    /// Returns `true` if this is a usage error.
    ///
    /// Usage errors are raised synchronously and indicate misuse that
    /// should be caught during development.
    #[inline]
    #[must_use]
    pub fn is_usage_error(&self) -> bool {
        matches!(self, Self::NotInitialized | Self::WrongContext { .. })
    }

    /// Returns `true` if this is a timeout error.
    #[inline]
    #[must_use]
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Returns `true` if this is a configuration error.
    #[inline]
    #[must_use]
    pub fn is_config_error(&self) -> bool {
        matches!(
            self,
            Self::Config { .. } | Self::InvalidArgument { .. } | Self::Regex(_)
        )
    }

    /// Returns `true` if the operation may succeed on retry.
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Timeout { .. } | Self::AuthenticationFailed { .. }
        )
    }
}

// ============================================================================
// Tests
// ============================================================================
