//! Opener side of the authentication flow.
//!
//! Opens the sign-in popup, binds it as the child peer, pings it until it
//! reports back or closes, and hands the outcome to the caller's
//! completion exactly once.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Weak;
use std::time::Duration;

use serde_json::{Value, json};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::time::interval;
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::platform::{WindowGeometry, WindowRef, same_window};
use crate::protocol::{HANDSHAKE_ACTION, Message, Request};
use crate::session::core::{SessionInner, SessionState};
use crate::session::{Handler, HandlerReply, Session};
use crate::transport::{PeerRole, ResponseCallback};

use super::{
    AUTHENTICATE_ACTION, AUTHENTICATE_CONTEXTS, AuthCompletion, AuthFailure, AuthOutcome,
    AuthState, AuthenticateParameters, NAVIGATE_CROSS_DOMAIN_ACTION, PING_ACTION,
    REDIRECT_METHOD_PLACEHOLDER, WEB_REDIRECT_METHOD,
};

// ============================================================================
// Constants
// ============================================================================

/// Popup width when none is requested.
const DEFAULT_POPUP_WIDTH: i32 = 600;

/// Popup height when none is requested.
const DEFAULT_POPUP_HEIGHT: i32 = 400;

/// Horizontal space left free around the popup.
const HORIZONTAL_MARGIN: i32 = 400;

/// Vertical space left free around the popup.
const VERTICAL_MARGIN: i32 = 200;

/// Window name for the popup.
const POPUP_TARGET: &str = "_blank";

/// Frame context the popup is told it runs in.
const POPUP_FRAME_CONTEXT: &str = "authentication";

// ============================================================================
// PopupBounds
// ============================================================================

/// Size and position of the sign-in popup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PopupBounds {
    /// Left edge in screen pixels.
    pub left: i32,
    /// Top edge in screen pixels.
    pub top: i32,
    /// Width in pixels.
    pub width: i32,
    /// Height in pixels.
    pub height: i32,
}

impl PopupBounds {
    /// Sizes the popup to fit inside the opener and centers it there.
    ///
    /// Requested sizes are capped at the opener's outer size minus a fixed
    /// margin and floored at zero.
    #[must_use]
    pub fn centered(geometry: WindowGeometry, width: Option<u32>, height: Option<u32>) -> Self {
        let requested_width = width.filter(|w| *w > 0).map_or(DEFAULT_POPUP_WIDTH, saturate);
        let requested_height = height.filter(|h| *h > 0).map_or(DEFAULT_POPUP_HEIGHT, saturate);

        let width = requested_width
            .min(geometry.outer_width.saturating_sub(HORIZONTAL_MARGIN))
            .max(0);
        let height = requested_height
            .min(geometry.outer_height.saturating_sub(VERTICAL_MARGIN))
            .max(0);

        let left = geometry.screen_left + geometry.outer_width / 2 - width / 2;
        let top = geometry.screen_top + geometry.outer_height / 2 - height / 2;

        Self {
            left,
            top,
            width,
            height,
        }
    }

    /// Returns the `window.open` features string.
    #[must_use]
    pub fn features(&self) -> String {
        format!(
            "toolbar=no, location=yes, status=no, menubar=no, scrollbars=yes, top={}, left={}, width={}, height={}",
            self.top, self.left, self.width, self.height
        )
    }
}

fn saturate(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

// ============================================================================
// Session - Authentication
// ============================================================================

impl Session {
    /// Starts a sign-in flow.
    ///
    /// `completion` receives the popup's result or an [`AuthFailure`]
    /// exactly once. Hosts that open sign-in windows natively receive a
    /// single `authentication.authenticate` request instead of a popup.
    /// Starting a flow while another popup is open cancels the old one.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] before `initialize`
    /// - [`Error::WrongContext`] outside content-like contexts
    /// - [`Error::Url`] if the URL cannot be resolved against the page
    /// - [`Error::Config`] if a popup is needed outside a tokio runtime
    pub fn authenticate<F>(&self, params: AuthenticateParameters, completion: F) -> Result<()>
    where
        F: FnOnce(std::result::Result<String, AuthFailure>) + Send + 'static,
    {
        self.ensure_initialized(AUTHENTICATE_CONTEXTS)?;

        let href = self.inner.env.href();
        let native = self
            .host_client_type()
            .is_some_and(|client| client.manages_popups_natively());

        if native {
            let url = resolve_url(&href, &params.url)?;
            self.authenticate_natively(&params, url.as_str(), Box::new(completion));
            return Ok(());
        }

        let runtime = Handle::try_current()
            .map_err(|_| Error::config("Authentication popups require a tokio runtime"))?;

        let url = resolve_url(
            &href,
            &params
                .url
                .replace(REDIRECT_METHOD_PLACEHOLDER, WEB_REDIRECT_METHOD),
        )?;

        if let Some(stale) = self.finish_authentication(AuthOutcome::Cancelled, None) {
            debug!("Cancelling previous authentication flow");
            stale(Err(AuthFailure::cancelled_by_user()));
        }

        self.inner.state.lock().auth.state = AuthState::WindowOpening;

        let bounds = PopupBounds::centered(self.inner.env.geometry(), params.width, params.height);
        let Some(popup) = self
            .inner
            .env
            .open_window(url.as_str(), POPUP_TARGET, &bounds.features())
        else {
            warn!(url = %url, "Authentication window could not be opened");
            self.inner.state.lock().auth.state = AuthState::Terminal(AuthOutcome::Failure);
            completion(Err(AuthFailure::failed_to_open_window()));
            return Ok(());
        };

        info!(url = %url, window = %popup.id(), width = bounds.width, height = bounds.height, "Authentication window opened");

        {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;

            let client_type = state
                .host_client_type()
                .map_or_else(|| Value::Null, |client| Value::String(client.as_str().to_string()));
            install_popup_handlers(state, client_type);

            state.peers.bind(PeerRole::Child, popup.clone(), None);
            state.queues.clear(PeerRole::Child);
            state.auth.popup = Some(popup.clone());
            state.auth.completion = Some(Box::new(completion));
            state.auth.state = AuthState::Monitoring;
        }

        let monitor = runtime.spawn(monitor_popup(
            self.downgrade(),
            popup.clone(),
            self.inner.options.auth_poll_interval,
        ));

        // The flow may already have finished on another thread.
        let mut state = self.inner.state.lock();
        let current = state.auth.state.is_active()
            && state
                .auth
                .popup
                .as_ref()
                .is_some_and(|tracked| same_window(tracked, &popup));
        if current {
            state.auth.monitor = Some(monitor);
        } else {
            monitor.abort();
        }

        Ok(())
    }

    /// Starts a sign-in flow and waits for its result.
    ///
    /// # Errors
    ///
    /// - Any error [`authenticate`](Self::authenticate) returns
    /// - [`Error::AuthenticationFailed`] with the failure reason
    /// - [`Error::ChannelClosed`] if the session is torn down first
    pub async fn authenticate_async(&self, params: AuthenticateParameters) -> Result<String> {
        let (tx, rx) = oneshot::channel();
        self.authenticate(params, move |result| {
            let _ = tx.send(result);
        })?;

        rx.await?
            .map_err(|failure| Error::authentication_failed(failure.into_reason()))
    }

    fn authenticate_natively(&self, params: &AuthenticateParameters, url: &str, completion: AuthCompletion) {
        let mut completion = Some(completion);
        let on_reply: ResponseCallback = Box::new(move |args, _is_partial| {
            if let Some(completion) = completion.take() {
                completion(native_outcome(&args));
            }
        });

        let args = vec![
            json!(url),
            json!(params.width),
            json!(params.height),
            json!(params.is_external),
        ];

        debug!(url, "Delegating authentication to host");
        let mut state = self.inner.state.lock();
        self.inner
            .send_request(&mut state, PeerRole::Parent, AUTHENTICATE_ACTION, args, Some(on_reply), None);
    }

    /// Handles `authentication.authenticate.success` from the popup.
    pub(crate) fn handle_auth_success(&self, args: &[Value]) {
        let result = first_arg_string(args);
        if let Some(completion) = self.finish_authentication(AuthOutcome::Success, None) {
            info!("Authentication succeeded");
            completion(Ok(result));
        }
    }

    /// Handles `authentication.authenticate.failure` from the popup.
    pub(crate) fn handle_auth_failure(&self, args: &[Value]) {
        let reason = first_arg_string(args);
        if let Some(completion) = self.finish_authentication(AuthOutcome::Failure, None) {
            info!(reason = %reason, "Authentication failed");
            completion(Err(AuthFailure::new(reason)));
        }
    }

    /// Tears down an active flow and returns its completion.
    ///
    /// With `only_popup` set, nothing happens unless that window is the
    /// flow's popup. Returns `None` if no flow was active.
    pub(crate) fn finish_authentication(
        &self,
        outcome: AuthOutcome,
        only_popup: Option<&WindowRef>,
    ) -> Option<AuthCompletion> {
        let mut guard = self.inner.state.lock();
        let state = &mut *guard;

        if !state.auth.state.is_active() {
            return None;
        }

        if let Some(expected) = only_popup
            && !state
                .auth
                .popup
                .as_ref()
                .is_some_and(|popup| same_window(popup, expected))
        {
            return None;
        }

        if let Some(popup) = state.auth.popup.as_ref()
            && state.peers.is_bound_to(PeerRole::Child, popup)
        {
            state.peers.unbind(PeerRole::Child);
            state.queues.clear(PeerRole::Child);
        }

        let completion = state.auth.stop();
        remove_popup_handlers(state);
        state.auth.state = AuthState::Terminal(outcome);

        debug!(outcome = ?outcome, "Authentication flow finished");
        completion
    }
}

// ============================================================================
// Liveness Monitor
// ============================================================================

/// Pings the popup until it closes or the task is aborted.
async fn monitor_popup(session: Weak<SessionInner>, popup: WindowRef, period: Duration) {
    let ping = Message::from(Request::new(PING_ACTION, vec![])).to_value();
    let mut ticker = interval(period);
    ticker.tick().await;

    loop {
        ticker.tick().await;

        let Some(inner) = session.upgrade() else {
            return;
        };

        if popup.is_closed() {
            let session = Session::from_inner(inner);
            if let Some(completion) = session.finish_authentication(AuthOutcome::Cancelled, Some(&popup)) {
                info!("Authentication window closed by user");
                completion(Err(AuthFailure::cancelled_by_user()));
            }
            return;
        }

        popup.post_message(&ping, "*");
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// Child-only handlers answering the popup's own handshake.
fn install_popup_handlers(state: &mut SessionState, client_type: Value) {
    state.handlers.insert_child(
        HANDSHAKE_ACTION,
        Handler::new(move |_| {
            Some(HandlerReply::Values(vec![
                Value::String(POPUP_FRAME_CONTEXT.to_string()),
                client_type.clone(),
            ]))
        }),
    );
    state.handlers.insert_child(
        NAVIGATE_CROSS_DOMAIN_ACTION,
        Handler::new(|_| Some(HandlerReply::from(false))),
    );
}

fn remove_popup_handlers(state: &mut SessionState) {
    state.handlers.remove_child(HANDSHAKE_ACTION);
    state.handlers.remove_child(NAVIGATE_CROSS_DOMAIN_ACTION);
}

/// Resolves `url` against the page address.
fn resolve_url(href: &str, url: &str) -> Result<Url> {
    Ok(Url::parse(href)?.join(url)?)
}

/// Reads `[success, payload]` from a native host reply.
fn native_outcome(args: &[Value]) -> std::result::Result<String, AuthFailure> {
    let success = args.first().and_then(Value::as_bool).unwrap_or(false);
    let payload = args.get(1).map(value_to_string).unwrap_or_default();

    if success {
        Ok(payload)
    } else {
        Err(AuthFailure::new(payload))
    }
}

fn first_arg_string(args: &[Value]) -> String {
    args.first().map(value_to_string).unwrap_or_default()
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

// ============================================================================
// Tests
// ============================================================================
