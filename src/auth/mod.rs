//! Authentication popup controller.
//!
//! Runs an identity-provider sign-in in a separate top-level window and
//! relays the outcome back to the app.
//!
//! # Flow
//!
//! ```text
//! App (opener)                         Popup
//! ────────────                         ─────
//! authenticate()
//!   ├─ open window ──────────────────► loads provider, then callback page
//!   ├─ ping every 100 ms ────────────►
//!   │                ◄──────────────── initialize (answered locally)
//!   │                ◄──────────────── authentication.authenticate.success
//!   └─ completion(Ok(result))          closes itself once drained
//! ```
//!
//! Hosts that open sign-in windows themselves (desktop and mobile clients)
//! receive a single `authentication.authenticate` request instead.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `popup` | Opener side: window, liveness monitor, completion |
//! | `notify` | Popup side: report the outcome and close |

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use tokio::task::JoinHandle;

use crate::platform::WindowRef;
use crate::protocol::FrameContext;

// ============================================================================
// Submodules
// ============================================================================

/// Popup side of the flow.
pub mod notify;

/// Opener side of the flow.
pub mod popup;

// ============================================================================
// Re-exports
// ============================================================================

pub use popup::PopupBounds;

// ============================================================================
// Constants
// ============================================================================

/// Request sent to hosts that open sign-in windows natively.
pub const AUTHENTICATE_ACTION: &str = "authentication.authenticate";

/// Action the popup sends on success.
pub const AUTHENTICATE_SUCCESS_ACTION: &str = "authentication.authenticate.success";

/// Action the popup sends on failure.
pub const AUTHENTICATE_FAILURE_ACTION: &str = "authentication.authenticate.failure";

/// Liveness ping posted to the popup.
pub const PING_ACTION: &str = "ping";

/// Popup navigation query answered by the opener.
pub const NAVIGATE_CROSS_DOMAIN_ACTION: &str = "navigateCrossDomain";

/// Placeholder in the sign-in URL replaced with the redirect method.
pub const REDIRECT_METHOD_PLACEHOLDER: &str = "{oauthRedirectMethod}";

/// Redirect method substituted on the browser path.
pub const WEB_REDIRECT_METHOD: &str = "web";

/// Contexts allowed to start a sign-in.
pub const AUTHENTICATE_CONTEXTS: &[FrameContext] = &[
    FrameContext::Content,
    FrameContext::SidePanel,
    FrameContext::Settings,
    FrameContext::Remove,
    FrameContext::Task,
    FrameContext::Stage,
    FrameContext::MeetingStage,
];

// ============================================================================
// AuthFailure
// ============================================================================

/// Reason a sign-in did not succeed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthFailure(String);

impl AuthFailure {
    /// The popup was closed before reporting.
    pub const CANCELLED_BY_USER: &'static str = "CancelledByUser";

    /// The platform refused to open the popup.
    pub const FAILED_TO_OPEN_WINDOW: &'static str = "FailedToOpenWindow";

    /// Creates a failure with a free-form reason.
    #[inline]
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self(reason.into())
    }

    /// Failure for a popup closed before reporting.
    #[inline]
    #[must_use]
    pub fn cancelled_by_user() -> Self {
        Self::new(Self::CANCELLED_BY_USER)
    }

    /// Failure for a blocked popup.
    #[inline]
    #[must_use]
    pub fn failed_to_open_window() -> Self {
        Self::new(Self::FAILED_TO_OPEN_WINDOW)
    }

    /// Returns the reason string.
    #[inline]
    #[must_use]
    pub fn reason(&self) -> &str {
        &self.0
    }

    /// Consumes the failure, returning the reason string.
    #[inline]
    #[must_use]
    pub fn into_reason(self) -> String {
        self.0
    }

    /// Returns `true` if the user closed the popup.
    #[inline]
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0 == Self::CANCELLED_BY_USER
    }
}

impl fmt::Display for AuthFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// AuthenticateParameters
// ============================================================================

/// Sign-in request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticateParameters {
    /// Sign-in start page. Relative URLs resolve against the current page.
    pub url: String,
    /// Requested popup width in pixels.
    pub width: Option<u32>,
    /// Requested popup height in pixels.
    pub height: Option<u32>,
    /// Ask native hosts to use the system browser.
    pub is_external: bool,
}

impl AuthenticateParameters {
    /// Creates parameters for `url` with default size.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            width: None,
            height: None,
            is_external: false,
        }
    }

    /// Sets the requested width.
    #[inline]
    #[must_use]
    pub fn width(mut self, width: u32) -> Self {
        self.width = Some(width);
        self
    }

    /// Sets the requested height.
    #[inline]
    #[must_use]
    pub fn height(mut self, height: u32) -> Self {
        self.height = Some(height);
        self
    }

    /// Sets the external-browser flag.
    #[inline]
    #[must_use]
    pub fn external(mut self, is_external: bool) -> Self {
        self.is_external = is_external;
        self
    }
}

// ============================================================================
// AuthState
// ============================================================================

/// How a sign-in flow ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthOutcome {
    /// The popup reported success.
    Success,
    /// The popup reported failure, or could not be opened.
    Failure,
    /// The popup closed without reporting, or a newer flow replaced it.
    Cancelled,
}

/// Opener-side flow state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthState {
    /// No flow has started.
    #[default]
    Idle,
    /// The popup is being opened.
    WindowOpening,
    /// The popup is open and polled for liveness.
    Monitoring,
    /// The last flow finished.
    Terminal(AuthOutcome),
}

impl AuthState {
    /// Returns `true` while a popup may be open.
    #[inline]
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Self::WindowOpening | Self::Monitoring)
    }
}

// ============================================================================
// AuthFlow
// ============================================================================

/// Sign-in completion callback.
pub type AuthCompletion = Box<dyn FnOnce(Result<String, AuthFailure>) + Send>;

/// Opener-side flow bookkeeping, owned by the session state.
#[derive(Default)]
pub(crate) struct AuthFlow {
    pub(crate) state: AuthState,
    pub(crate) popup: Option<WindowRef>,
    pub(crate) completion: Option<AuthCompletion>,
    pub(crate) monitor: Option<JoinHandle<()>>,
}

impl AuthFlow {
    /// Stops the liveness monitor and closes the popup.
    ///
    /// Returns the completion, which the caller invokes once the session
    /// lock is released.
    pub(crate) fn stop(&mut self) -> Option<AuthCompletion> {
        if let Some(monitor) = self.monitor.take() {
            monitor.abort();
        }
        if let Some(popup) = self.popup.take() {
            popup.close();
        }
        self.completion.take()
    }
}

impl fmt::Debug for AuthFlow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthFlow")
            .field("state", &self.state)
            .field("popup", &self.popup.as_ref().map(|w| w.id()))
            .field("has_completion", &self.completion.is_some())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_constants() {
        assert!(AuthFailure::cancelled_by_user().is_cancelled());
        assert_eq!(AuthFailure::failed_to_open_window().reason(), "FailedToOpenWindow");
        assert_eq!(AuthFailure::new("InvalidGrant").to_string(), "InvalidGrant");
    }

    #[test]
    fn test_parameters_builder() {
        let params = AuthenticateParameters::new("/auth/start")
            .width(100)
            .height(200)
            .external(true);

        assert_eq!(params.width, Some(100));
        assert_eq!(params.height, Some(200));
        assert!(params.is_external);
    }

    #[test]
    fn test_state_activity() {
        assert!(!AuthState::Idle.is_active());
        assert!(AuthState::WindowOpening.is_active());
        assert!(AuthState::Monitoring.is_active());
        assert!(!AuthState::Terminal(AuthOutcome::Success).is_active());
    }
}
