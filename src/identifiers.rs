//! Type-safe identifiers.
//!
//! Newtype wrappers prevent mixing request IDs, window handles and session
//! IDs at compile time.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// RequestId
// ============================================================================

/// Correlates a request with its responses.
///
/// Serialized as a bare JSON number. Allocated from a per-session counter
/// that starts at zero and only ever grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RequestId(u64);

impl RequestId {
    /// The first ID handed out by a fresh session.
    pub const FIRST: Self = Self(0);

    /// Creates a request ID from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Returns the following ID.
    #[inline]
    #[must_use]
    pub(crate) const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// WindowId
// ============================================================================

/// Opaque identity of a browser window handle.
///
/// Two [`BrowserWindow`](crate::platform::BrowserWindow) handles refer to
/// the same window iff their IDs are equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WindowId(u64);

impl WindowId {
    /// Creates a window ID from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Returns the raw value.
    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window-{}", self.0)
    }
}

// ============================================================================
// SessionId
// ============================================================================

/// Identifies a [`Session`](crate::Session) instance in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    /// Generates a new random session ID.
    #[inline]
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4())
    }

    /// Returns the underlying UUID.
    #[inline]
    #[must_use]
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_is_monotonic() {
        let first = RequestId::FIRST;
        let second = first.next();
        assert_eq!(first.as_u64(), 0);
        assert_eq!(second.as_u64(), 1);
        assert!(second > first);
    }

    #[test]
    fn test_request_id_serializes_as_number() {
        let json = serde_json::to_string(&RequestId::new(42)).expect("serialize");
        assert_eq!(json, "42");

        let id: RequestId = serde_json::from_str("7").expect("deserialize");
        assert_eq!(id, RequestId::new(7));
    }

    #[test]
    fn test_request_id_rejects_negative() {
        assert!(serde_json::from_str::<RequestId>("-1").is_err());
    }

    #[test]
    fn test_window_id_display() {
        assert_eq!(WindowId::new(3).to_string(), "window-3");
    }

    #[test]
    fn test_session_ids_are_unique() {
        assert_ne!(SessionId::generate(), SessionId::generate());
    }
}
