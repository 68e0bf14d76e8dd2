//! Session configuration.
//!
//! Provides [`SessionOptions`] and the fluent [`SessionBuilder`] that
//! validates them before a [`Session`] is created.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use frame_bridge::Session;
//!
//! let session = Session::builder()
//!     .additional_origin("https://partner.example.org")
//!     .auth_poll_interval(Duration::from_millis(250))
//!     .build(env)?;
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::platform::HostEnvironment;
use crate::protocol::{DEFAULT_PROTOCOL_VERSION, is_version};
use crate::transport::{DEFAULT_VALID_ORIGINS, OriginValidator};

use super::core::Session;

// ============================================================================
// Constants
// ============================================================================

/// Host that triggers the legacy desktop-mail redirect.
pub const DEFAULT_LEGACY_CONNECTOR_HOST: &str = "outlook.office.com";

/// Query marker that triggers the legacy desktop-mail redirect.
pub const DEFAULT_LEGACY_QUERY_MARKER: &str = "client_type=Win32_Outlook";

/// Interval between popup liveness checks.
pub const DEFAULT_AUTH_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Interval between outbound-queue checks before the popup closes itself.
pub const DEFAULT_QUEUE_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Grace period before the popup closes itself.
pub const DEFAULT_POPUP_CLOSE_DELAY: Duration = Duration::from_millis(200);

// ============================================================================
// LegacyConnector
// ============================================================================

/// Callback URL shape that gets a top-level redirect instead of a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegacyConnector {
    /// Host of the callback URL, compared case-insensitively.
    pub host: String,
    /// Substring that must appear in the callback URL's query.
    pub query_marker: String,
}

impl Default for LegacyConnector {
    fn default() -> Self {
        Self {
            host: DEFAULT_LEGACY_CONNECTOR_HOST.to_string(),
            query_marker: DEFAULT_LEGACY_QUERY_MARKER.to_string(),
        }
    }
}

// ============================================================================
// SessionOptions
// ============================================================================

/// Validated session configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOptions {
    /// Version sent in the handshake.
    pub protocol_version: String,

    /// Trusted host patterns.
    pub valid_origins: Vec<String>,

    /// Extra trusted host patterns, appended to `valid_origins`.
    pub additional_origins: Vec<String>,

    /// Legacy redirect trigger.
    pub legacy_connector: LegacyConnector,

    /// Popup liveness check interval.
    pub auth_poll_interval: Duration,

    /// Outbound-queue check interval before popup close.
    pub queue_poll_interval: Duration,

    /// Delay before the popup closes itself.
    pub popup_close_delay: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            protocol_version: DEFAULT_PROTOCOL_VERSION.to_string(),
            valid_origins: DEFAULT_VALID_ORIGINS.iter().map(|s| (*s).to_string()).collect(),
            additional_origins: Vec::new(),
            legacy_connector: LegacyConnector::default(),
            auth_poll_interval: DEFAULT_AUTH_POLL_INTERVAL,
            queue_poll_interval: DEFAULT_QUEUE_POLL_INTERVAL,
            popup_close_delay: DEFAULT_POPUP_CLOSE_DELAY,
        }
    }
}

impl SessionOptions {
    /// Checks option values.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the protocol version is not a
    /// dot-separated numeric version or a polling interval is zero.
    pub fn validate(&self) -> Result<()> {
        if !is_version(&self.protocol_version) {
            return Err(Error::config(format!(
                "Protocol version must be dot-separated integers, got '{}'",
                self.protocol_version
            )));
        }

        if self.auth_poll_interval.is_zero() {
            return Err(Error::config("Authentication poll interval must be non-zero"));
        }

        if self.queue_poll_interval.is_zero() {
            return Err(Error::config("Queue poll interval must be non-zero"));
        }

        if self.legacy_connector.host.trim().is_empty() {
            return Err(Error::config("Legacy connector host must not be empty"));
        }

        Ok(())
    }

    /// Compiles the origin validator for a page at `own_origin`.
    ///
    /// `explicit_origins` are the origins passed to `initialize`.
    pub(crate) fn origin_validator(
        &self,
        own_origin: &str,
        explicit_origins: &[&str],
    ) -> Result<OriginValidator> {
        let patterns = self
            .valid_origins
            .iter()
            .chain(&self.additional_origins)
            .map(String::as_str)
            .chain(explicit_origins.iter().copied());

        OriginValidator::new(own_origin, patterns)
    }
}

// ============================================================================
// SessionBuilder
// ============================================================================

/// Builder for a [`Session`].
///
/// Use [`Session::builder()`] to create one.
#[derive(Debug, Default, Clone)]
pub struct SessionBuilder {
    options: SessionOptions,
}

impl SessionBuilder {
    /// Creates a builder with default options.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the version announced in the handshake.
    #[inline]
    #[must_use]
    pub fn protocol_version(mut self, version: impl Into<String>) -> Self {
        self.options.protocol_version = version.into();
        self
    }

    /// Replaces the trusted host patterns.
    #[must_use]
    pub fn valid_origins<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options.valid_origins = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Adds one trusted host pattern. A leading `https://` is allowed.
    #[inline]
    #[must_use]
    pub fn additional_origin(mut self, pattern: impl Into<String>) -> Self {
        self.options.additional_origins.push(pattern.into());
        self
    }

    /// Adds several trusted host patterns.
    #[must_use]
    pub fn additional_origins<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.options
            .additional_origins
            .extend(patterns.into_iter().map(Into::into));
        self
    }

    /// Sets the legacy redirect trigger.
    #[inline]
    #[must_use]
    pub fn legacy_connector(mut self, host: impl Into<String>, query_marker: impl Into<String>) -> Self {
        self.options.legacy_connector = LegacyConnector {
            host: host.into(),
            query_marker: query_marker.into(),
        };
        self
    }

    /// Sets the popup liveness check interval.
    #[inline]
    #[must_use]
    pub fn auth_poll_interval(mut self, interval: Duration) -> Self {
        self.options.auth_poll_interval = interval;
        self
    }

    /// Sets the outbound-queue check interval used before popup close.
    #[inline]
    #[must_use]
    pub fn queue_poll_interval(mut self, interval: Duration) -> Self {
        self.options.queue_poll_interval = interval;
        self
    }

    /// Sets the delay before the popup closes itself.
    #[inline]
    #[must_use]
    pub fn popup_close_delay(mut self, delay: Duration) -> Self {
        self.options.popup_close_delay = delay;
        self
    }

    /// Returns the options collected so far.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Validates the options and creates a session for `env`.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if an option is invalid
    /// - [`Error::Regex`] if the origin patterns fail to compile
    pub fn build(self, env: Arc<dyn HostEnvironment>) -> Result<Session> {
        self.options.validate()?;
        let validator = self.options.origin_validator(&env.origin(), &[])?;

        Ok(Session::from_parts(env, self.options, validator))
    }
}

// ============================================================================
// Tests
// ============================================================================
