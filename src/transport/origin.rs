//! Origin validation for inbound messages.
//!
//! An inbound message is processed only if its reported origin is the
//! page's own origin or an `https` origin whose host matches the allow-list.
//!
//! # Pattern Rules
//!
//! | Pattern | Matches | Does not match |
//! |---------|---------|----------------|
//! | `teams.example.com` | `https://teams.example.com` | `https://x.teams.example.com` |
//! | `*.example.com` | `https://sub.example.com` | `https://b.c.example.com`, `https://example.com` |
//! | `local.example.com:8080` | `https://local.example.com:8080` | `https://local.example.com` |
//!
//! A `*` stands for exactly one DNS label, so a wildcard pattern only
//! matches hosts with the same label count. All patterns compile into one
//! case-insensitive regular expression.

// ============================================================================
// Imports
// ============================================================================

use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::error::Result;

// ============================================================================
// Constants
// ============================================================================

/// Host patterns trusted by default.
pub const DEFAULT_VALID_ORIGINS: &[&str] = &[
    "teams.microsoft.com",
    "teams.microsoft.us",
    "gov.teams.microsoft.us",
    "dod.teams.microsoft.us",
    "int.teams.microsoft.com",
    "teams.live.com",
    "devspaces.skype.com",
    "ssauth.skype.com",
    "local.teams.live.com",
    "local.teams.live.com:8080",
    "local.teams.office.com",
    "local.teams.office.com:8080",
    "outlook.office.com",
    "outlook-sdf.office.com",
    "outlook.office365.com",
    "outlook-sdf.office365.com",
    "outlook.live.com",
    "outlook-sdf.live.com",
    "*.teams.microsoft.com",
    "*.www.office.com",
    "www.office.com",
    "word.office.com",
    "excel.office.com",
    "powerpoint.office.com",
    "www.officeppe.com",
    "*.www.microsoft365.com",
    "www.microsoft365.com",
];

/// The only scheme accepted from foreign origins.
const SECURE_SCHEME_PREFIX: &str = "https://";

/// Regex fragment standing in for a `*` label.
const WILDCARD_LABEL: &str = "[^/.]+";

// ============================================================================
// OriginValidator
// ============================================================================

/// Decides whether an inbound message's origin is an authorized peer.
#[derive(Debug, Clone)]
pub struct OriginValidator {
    /// Origin of the current page; always authorized.
    own_origin: String,
    /// Compiled allow-list. `None` if no patterns were supplied.
    matcher: Option<Regex>,
}

impl OriginValidator {
    /// Compiles a validator from host patterns.
    ///
    /// Patterns may carry a leading `https://`, which is stripped. Blank
    /// patterns are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Regex`](crate::Error::Regex) if the combined
    /// pattern fails to compile.
    pub fn new<I, S>(own_origin: impl Into<String>, patterns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let alternatives: Vec<String> = patterns
            .into_iter()
            .filter_map(|pattern| normalize_pattern(pattern.as_ref()))
            .map(|host| host_pattern_to_regex(&host))
            .collect();

        let matcher = if alternatives.is_empty() {
            None
        } else {
            let source = format!("^https://(?:{})$", alternatives.join("|"));
            Some(RegexBuilder::new(&source).case_insensitive(true).build()?)
        };

        debug!(patterns = alternatives.len(), "Origin validator compiled");

        Ok(Self {
            own_origin: own_origin.into(),
            matcher,
        })
    }

    /// Returns `true` if messages from `origin` may be processed.
    #[must_use]
    pub fn is_authorized(&self, origin: &str) -> bool {
        if origin.is_empty() {
            return false;
        }

        if origin == self.own_origin {
            return true;
        }

        if !has_secure_scheme(origin) {
            return false;
        }

        self.matcher
            .as_ref()
            .is_some_and(|matcher| matcher.is_match(origin))
    }

    /// Returns the page origin this validator always accepts.
    #[inline]
    #[must_use]
    pub fn own_origin(&self) -> &str {
        &self.own_origin
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn has_secure_scheme(origin: &str) -> bool {
    origin
        .get(..SECURE_SCHEME_PREFIX.len())
        .is_some_and(|scheme| scheme.eq_ignore_ascii_case(SECURE_SCHEME_PREFIX))
}

/// Strips scheme and trailing slash; `None` for blank patterns.
fn normalize_pattern(pattern: &str) -> Option<String> {
    let trimmed = pattern.trim();
    let host = if has_secure_scheme(trimmed) {
        &trimmed[SECURE_SCHEME_PREFIX.len()..]
    } else {
        trimmed
    };
    let host = host.trim_end_matches('/');

    if host.is_empty() {
        None
    } else {
        Some(host.to_ascii_lowercase())
    }
}

/// Converts a host pattern into a regex fragment, one label at a time.
fn host_pattern_to_regex(host: &str) -> String {
    host.split('.')
        .map(|label| {
            label
                .split('*')
                .map(regex::escape)
                .collect::<Vec<_>>()
                .join(WILDCARD_LABEL)
        })
        .collect::<Vec<_>>()
        .join("[.]")
}

// ============================================================================
// Tests
// ============================================================================
