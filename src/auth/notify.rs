//! Popup side of the authentication flow.
//!
//! The sign-in callback page reports the outcome to its opener and closes
//! itself once the report has left the outbound queue. Callback URLs
//! pointing at the legacy desktop-mail connector are redirected to instead,
//! with the outcome encoded in the URL fragment.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use serde_json::Value;
use tokio::runtime::Handle;
use tokio::time::{interval, sleep};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::FrameContext;
use crate::session::{LegacyConnector, Session};
use crate::transport::PeerRole;

use super::{AUTHENTICATE_FAILURE_ACTION, AUTHENTICATE_SUCCESS_ACTION, AuthOutcome};

// ============================================================================
// Session - Popup Notifications
// ============================================================================

impl Session {
    /// Reports a successful sign-in to the opener.
    ///
    /// If `callback_url` points at the legacy connector, the page redirects
    /// there instead of messaging the opener.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] before `initialize`
    /// - [`Error::WrongContext`] outside the authentication context
    /// - [`Error::InvalidArgument`] or [`Error::Url`] for an unusable
    ///   `callback_url`
    pub fn notify_success(&self, result: &str, callback_url: Option<&str>) -> Result<()> {
        self.notify_outcome(AuthOutcome::Success, result, callback_url)
    }

    /// Reports a failed sign-in to the opener.
    ///
    /// # Errors
    ///
    /// Same as [`notify_success`](Self::notify_success).
    pub fn notify_failure(&self, reason: &str, callback_url: Option<&str>) -> Result<()> {
        self.notify_outcome(AuthOutcome::Failure, reason, callback_url)
    }

    fn notify_outcome(&self, outcome: AuthOutcome, value: &str, callback_url: Option<&str>) -> Result<()> {
        self.ensure_initialized(&[FrameContext::Authentication])?;

        if let Some(callback_url) = callback_url
            && let Some(target) = legacy_redirect(
                &self.inner.env.href(),
                callback_url,
                &self.inner.options.legacy_connector,
                outcome,
                value,
            )?
        {
            info!(target = %target, "Redirecting to legacy connector");
            self.inner.env.navigate(&target);
            return Ok(());
        }

        let action = match outcome {
            AuthOutcome::Success => AUTHENTICATE_SUCCESS_ACTION,
            AuthOutcome::Failure | AuthOutcome::Cancelled => AUTHENTICATE_FAILURE_ACTION,
        };
        self.send(action, vec![Value::String(value.to_string())]);
        self.close_when_drained();

        Ok(())
    }

    /// Closes the current window once nothing is queued for the opener.
    fn close_when_drained(&self) {
        let Ok(runtime) = Handle::try_current() else {
            warn!("No tokio runtime, authentication window left open");
            return;
        };

        let inner = self.inner.clone();
        let poll: Duration = inner.options.queue_poll_interval;
        let delay: Duration = inner.options.popup_close_delay;

        runtime.spawn(async move {
            let mut ticker = interval(poll);
            loop {
                ticker.tick().await;
                if inner.state.lock().queues.is_empty(PeerRole::Parent) {
                    break;
                }
            }

            sleep(delay).await;
            debug!("Closing authentication window");
            inner.env.current_window().close();
        });
    }
}

// ============================================================================
// Legacy Redirect
// ============================================================================

/// Returns the redirect target if `callback_url` addresses the legacy
/// connector on a different host than the current page.
fn legacy_redirect(
    href: &str,
    callback_url: &str,
    connector: &LegacyConnector,
    outcome: AuthOutcome,
    value: &str,
) -> Result<Option<String>> {
    let decoded = urlencoding::decode(callback_url)
        .map_err(|e| Error::invalid_argument(format!("Callback URL is not valid UTF-8: {e}")))?;
    let page = Url::parse(href)?;
    let target = page.join(&decoded)?;

    let Some(target_host) = host_with_port(&target) else {
        return Ok(None);
    };

    let is_connector = target_host.eq_ignore_ascii_case(&connector.host);
    let is_foreign = host_with_port(&page).is_none_or(|page_host| !page_host.eq_ignore_ascii_case(&target_host));
    let has_marker = target
        .query()
        .is_some_and(|query| query.contains(connector.query_marker.as_str()));

    if !(is_connector && is_foreign && has_marker) {
        return Ok(None);
    }

    let (key, marker) = match outcome {
        AuthOutcome::Success => ("result", "authSuccess"),
        AuthOutcome::Failure | AuthOutcome::Cancelled => ("reason", "authFailure"),
    };

    let mut url = target.to_string();
    if !value.is_empty() {
        let encoded = urlencoding::encode(value);
        url = append_fragment_param(&url, &format!("{key}={encoded}"));
    }
    Ok(Some(append_fragment_param(&url, marker)))
}

/// Appends `&param` to the URL fragment, creating one if needed.
fn append_fragment_param(url: &str, param: &str) -> String {
    if url.contains('#') {
        format!("{url}&{param}")
    } else {
        format!("{url}#&{param}")
    }
}

fn host_with_port(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = "https://app.example.com/auth/end";

    fn connector() -> LegacyConnector {
        LegacyConnector::default()
    }

    #[test]
    fn test_legacy_success_redirect() {
        let callback = "https%3A%2F%2Foutlook.office.com%2Fconnector%3Fclient_type%3DWin32_Outlook";
        let target = legacy_redirect(PAGE, callback, &connector(), AuthOutcome::Success, "token")
            .expect("valid")
            .expect("redirect");

        assert_eq!(
            target,
            "https://outlook.office.com/connector?client_type=Win32_Outlook#&result=token&authSuccess"
        );
    }

    #[test]
    fn test_legacy_failure_redirect_keeps_existing_fragment() {
        let callback = "https://outlook.office.com/c?client_type=Win32_Outlook#state=1";
        let target = legacy_redirect(PAGE, callback, &connector(), AuthOutcome::Failure, "denied")
            .expect("valid")
            .expect("redirect");

        assert_eq!(
            target,
            "https://outlook.office.com/c?client_type=Win32_Outlook#state=1&reason=denied&authFailure"
        );
    }

    #[test]
    fn test_empty_value_only_adds_marker() {
        let callback = "https://outlook.office.com/c?client_type=Win32_Outlook";
        let target = legacy_redirect(PAGE, callback, &connector(), AuthOutcome::Success, "")
            .expect("valid")
            .expect("redirect");

        assert!(target.ends_with("#&authSuccess"));
    }

    #[test]
    fn test_no_redirect_without_marker() {
        let callback = "https://outlook.office.com/c?client_type=Web";
        let target = legacy_redirect(PAGE, callback, &connector(), AuthOutcome::Success, "x").expect("valid");
        assert_eq!(target, None);
    }

    #[test]
    fn test_no_redirect_for_other_host() {
        let callback = "https://mail.example.com/c?client_type=Win32_Outlook";
        let target = legacy_redirect(PAGE, callback, &connector(), AuthOutcome::Success, "x").expect("valid");
        assert_eq!(target, None);
    }

    #[test]
    fn test_no_redirect_on_same_host() {
        let page = "https://outlook.office.com/auth/end";
        let callback = "https://outlook.office.com/c?client_type=Win32_Outlook";
        let target = legacy_redirect(page, callback, &connector(), AuthOutcome::Success, "x").expect("valid");
        assert_eq!(target, None);
    }

    #[test]
    fn test_value_is_percent_encoded() {
        let callback = "https://outlook.office.com/c?client_type=Win32_Outlook";
        let target = legacy_redirect(PAGE, callback, &connector(), AuthOutcome::Success, "a b&c")
            .expect("valid")
            .expect("redirect");

        assert!(target.contains("#&result=a%20b%26c&authSuccess"));
    }

    #[test]
    fn test_append_fragment_param() {
        assert_eq!(append_fragment_param("https://x/", "a"), "https://x/#&a");
        assert_eq!(append_fragment_param("https://x/#s", "a"), "https://x/#s&a");
    }
}
