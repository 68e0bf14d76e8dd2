//! Session handle and shared state.
//!
//! A [`Session`] owns everything the protocol tracks for one page: peer
//! bindings, outbound queues, outstanding requests, handlers and the
//! authentication flow. Handles are cheap to clone and share one state.
//!
//! # Locking
//!
//! All state sits behind a single mutex. Messages are posted while it is
//! held, so a queue flush can never interleave with a newer send. Reply
//! callbacks, handlers and completion listeners always run after it is
//! released and may call back into the session.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::Stream;
use futures_util::stream;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tracing::{debug, info, trace, warn};

use crate::auth::{AUTHENTICATE_FAILURE_ACTION, AUTHENTICATE_SUCCESS_ACTION, AuthFlow, AuthState};
use crate::error::{Error, Result};
use crate::identifiers::{RequestId, SessionId};
use crate::platform::HostEnvironment;
use crate::protocol::{FrameContext, HANDSHAKE_ACTION, HostClientType, HostContext, Message, Request};
use crate::transport::{OriginValidator, OutboundQueues, PeerRole, Peers, PendingCalls, ResponseCallback};

use super::builder::{SessionBuilder, SessionOptions};
use super::handlers::{Handler, HandlerRegistry, HandlerReply};

// ============================================================================
// Types
// ============================================================================

/// Listener fired once the handshake completes.
type ReadyListener = Box<dyn FnOnce(HostContext) + Send>;

// ============================================================================
// Lifecycle
// ============================================================================

/// Handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Lifecycle {
    /// `initialize` has not been called.
    #[default]
    Uninitialized,
    /// The handshake was sent; no reply yet.
    Initializing,
    /// The handshake reply arrived.
    Ready,
}

// ============================================================================
// Reply
// ============================================================================

/// One reply delivered through [`Session::call_stream`].
#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Reply arguments.
    pub args: Vec<Value>,
    /// `true` if more replies follow.
    pub is_partial: bool,
}

// ============================================================================
// SessionState
// ============================================================================

/// Mutable protocol state.
pub(crate) struct SessionState {
    pub(crate) lifecycle: Lifecycle,
    pub(crate) host_context: Option<HostContext>,
    pub(crate) validator: OriginValidator,
    pub(crate) listening: bool,
    pub(crate) frameless: bool,
    pub(crate) peers: Peers,
    pub(crate) queues: OutboundQueues,
    pub(crate) pending: PendingCalls,
    /// Never reset, so IDs stay unique across re-initialization.
    pub(crate) next_id: RequestId,
    pub(crate) ready_listeners: Vec<ReadyListener>,
    pub(crate) handlers: HandlerRegistry,
    pub(crate) auth: AuthFlow,
}

impl SessionState {
    fn new(validator: OriginValidator) -> Self {
        Self {
            lifecycle: Lifecycle::Uninitialized,
            host_context: None,
            validator,
            listening: false,
            frameless: false,
            peers: Peers::default(),
            queues: OutboundQueues::default(),
            pending: PendingCalls::default(),
            next_id: RequestId::FIRST,
            ready_listeners: Vec::new(),
            handlers: HandlerRegistry::default(),
            auth: AuthFlow::default(),
        }
    }

    /// Hands out the next request ID.
    pub(crate) fn allocate_id(&mut self) -> RequestId {
        let id = self.next_id;
        self.next_id = id.next();
        id
    }

    pub(crate) fn frame_context(&self) -> Option<&FrameContext> {
        self.host_context
            .as_ref()
            .and_then(|context| context.frame_context.as_ref())
    }

    pub(crate) fn host_client_type(&self) -> Option<&HostClientType> {
        self.host_context
            .as_ref()
            .and_then(|context| context.host_client_type.as_ref())
    }
}

// ============================================================================
// SessionInner
// ============================================================================

/// Shared session internals.
pub(crate) struct SessionInner {
    pub(crate) id: SessionId,
    pub(crate) env: Arc<dyn HostEnvironment>,
    pub(crate) options: SessionOptions,
    /// Validator built from the options alone; restored on teardown.
    pub(crate) base_validator: OriginValidator,
    pub(crate) state: Mutex<SessionState>,
}

// ============================================================================
// Session
// ============================================================================

/// Protocol endpoint for the current page.
///
/// # Example
///
/// ```ignore
/// let session = Session::builder().build(env)?;
///
/// session.initialize(&[], |context| {
///     tracing::info!(frame_context = ?context.frame_context, "Ready");
/// })?;
///
/// let reply = session.call("getContext", vec![]).await?;
/// ```
#[derive(Clone)]
pub struct Session {
    pub(crate) inner: Arc<SessionInner>,
}

// ============================================================================
// Session - Display
// ============================================================================

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("lifecycle", &state.lifecycle)
            .field("frameless", &state.frameless)
            .field("pending", &state.pending.len())
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Session - Constructors
// ============================================================================

impl Session {
    /// Creates a builder for configuring a session.
    #[inline]
    #[must_use]
    pub fn builder() -> SessionBuilder {
        SessionBuilder::new()
    }

    /// Creates a session with default options.
    ///
    /// # Errors
    ///
    /// Returns an error if the default origin list fails to compile.
    pub fn new(env: Arc<dyn HostEnvironment>) -> Result<Self> {
        SessionBuilder::new().build(env)
    }

    /// Assembles a session from validated parts.
    pub(crate) fn from_parts(
        env: Arc<dyn HostEnvironment>,
        options: SessionOptions,
        validator: OriginValidator,
    ) -> Self {
        let id = SessionId::generate();
        debug!(session_id = %id, origin = %validator.own_origin(), "Session created");

        Self {
            inner: Arc::new(SessionInner {
                id,
                env,
                options,
                base_validator: validator.clone(),
                state: Mutex::new(SessionState::new(validator)),
            }),
        }
    }

    /// Rebuilds a handle from shared internals.
    #[inline]
    pub(crate) fn from_inner(inner: Arc<SessionInner>) -> Self {
        Self { inner }
    }

    /// Returns a weak reference for callbacks that must not keep the
    /// session alive.
    #[inline]
    pub(crate) fn downgrade(&self) -> Weak<SessionInner> {
        Arc::downgrade(&self.inner)
    }
}

// ============================================================================
// Session - Accessors
// ============================================================================

impl Session {
    /// Returns the session ID.
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    /// Returns the session options.
    #[inline]
    #[must_use]
    pub fn options(&self) -> &SessionOptions {
        &self.inner.options
    }

    /// Returns the handshake progress.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.inner.state.lock().lifecycle
    }

    /// Returns `true` once the handshake reply has arrived.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.lifecycle() == Lifecycle::Ready
    }

    /// Returns `true` if the page has neither a parent frame nor an opener.
    #[must_use]
    pub fn is_frameless(&self) -> bool {
        self.inner.state.lock().frameless
    }

    /// Returns everything learned from the handshake reply.
    #[must_use]
    pub fn host_context(&self) -> Option<HostContext> {
        self.inner.state.lock().host_context.clone()
    }

    /// Returns the frame context reported by the host.
    #[must_use]
    pub fn frame_context(&self) -> Option<FrameContext> {
        self.inner.state.lock().frame_context().cloned()
    }

    /// Returns the host client type reported by the host.
    #[must_use]
    pub fn host_client_type(&self) -> Option<HostClientType> {
        self.inner.state.lock().host_client_type().cloned()
    }

    /// Returns the opener-side authentication state.
    #[must_use]
    pub fn auth_state(&self) -> AuthState {
        self.inner.state.lock().auth.state
    }

    /// Number of requests still awaiting a final reply.
    #[must_use]
    pub fn pending_requests(&self) -> usize {
        self.inner.state.lock().pending.len()
    }

    /// Number of messages waiting for `role`'s origin.
    #[must_use]
    pub fn queued_messages(&self, role: PeerRole) -> usize {
        self.inner.state.lock().queues.len(role)
    }

    /// Returns the origin learned for `role`, if any.
    #[must_use]
    pub fn peer_origin(&self, role: PeerRole) -> Option<String> {
        self.inner
            .state
            .lock()
            .peers
            .get(role)
            .and_then(|peer| peer.origin().map(str::to_owned))
    }
}

// ============================================================================
// Session - Lifecycle
// ============================================================================

impl Session {
    /// Starts the handshake.
    ///
    /// `explicit_origins` extend the trusted origin list and turn on message
    /// listening even without a parent. `on_complete` fires with the
    /// handshake result. Repeated calls send nothing and join the same
    /// completion, or fire at once if it already happened.
    ///
    /// # Errors
    ///
    /// Returns an error if `explicit_origins` fail to compile.
    pub fn initialize<F>(&self, explicit_origins: &[&str], on_complete: F) -> Result<()>
    where
        F: FnOnce(HostContext) + Send + 'static,
    {
        let mut guard = self.inner.state.lock();
        let lifecycle = guard.lifecycle;

        match lifecycle {
            Lifecycle::Ready => {
                let context = guard.host_context.clone();
                drop(guard);
                if let Some(context) = context {
                    on_complete(context);
                }
                return Ok(());
            }
            Lifecycle::Initializing => {
                guard.ready_listeners.push(Box::new(on_complete));
                return Ok(());
            }
            Lifecycle::Uninitialized => {}
        }

        let env = &self.inner.env;
        let state = &mut *guard;

        if !explicit_origins.is_empty() {
            state.validator = self
                .inner
                .options
                .origin_validator(&env.origin(), explicit_origins)?;
        }

        let parent = env.parent().or_else(|| env.opener());
        state.frameless = parent.is_none();
        if let Some(parent) = parent {
            state.peers.bind(PeerRole::Parent, parent, None);
        }
        state.listening = !state.frameless || !explicit_origins.is_empty();
        state.lifecycle = Lifecycle::Initializing;
        state.ready_listeners.push(Box::new(on_complete));

        self.register_framework_handlers(&mut state.handlers);

        let weak = self.downgrade();
        let on_reply: ResponseCallback = Box::new(move |args, _is_partial| {
            if let Some(inner) = weak.upgrade() {
                Session::from_inner(inner).complete_handshake(&args);
            }
        });

        let version = Value::String(self.inner.options.protocol_version.clone());
        self.inner.send_request(
            state,
            PeerRole::Parent,
            HANDSHAKE_ACTION,
            vec![version],
            Some(on_reply),
            Some("*"),
        );

        let listening = state.listening;
        let frameless = state.frameless;
        drop(guard);

        if listening {
            self.inner.env.set_message_listener(true);
        }

        info!(session_id = %self.inner.id, frameless, listening, "Handshake sent");
        Ok(())
    }

    /// Starts the handshake and waits for its result.
    ///
    /// # Errors
    ///
    /// - Any error [`initialize`](Self::initialize) returns
    /// - [`Error::ChannelClosed`] if the session is torn down first
    pub async fn initialize_async(&self, explicit_origins: &[&str]) -> Result<HostContext> {
        let (tx, rx) = oneshot::channel();
        self.initialize(explicit_origins, move |context| {
            let _ = tx.send(context);
        })?;
        Ok(rx.await?)
    }

    /// Checks that the handshake has started and the frame context allows
    /// the call.
    ///
    /// An empty `allowed` slice accepts any context. The context check is
    /// skipped while the handshake reply is outstanding.
    ///
    /// # Errors
    ///
    /// - [`Error::NotInitialized`] if `initialize` was never called
    /// - [`Error::WrongContext`] if the known frame context is not allowed
    pub fn ensure_initialized(&self, allowed: &[FrameContext]) -> Result<()> {
        let state = self.inner.state.lock();

        if state.lifecycle == Lifecycle::Uninitialized {
            return Err(Error::NotInitialized);
        }

        if !allowed.is_empty()
            && let Some(context) = state.frame_context()
            && !allowed.contains(context)
        {
            return Err(Error::wrong_context(context.as_str()));
        }

        Ok(())
    }

    /// Tears the session down.
    ///
    /// Stops authentication polling, closes an open popup, detaches the
    /// message listener and forgets peers, queues, outstanding requests,
    /// handlers and the handshake result. Request IDs keep counting.
    /// Awaiting futures resolve with [`Error::ChannelClosed`].
    pub fn uninitialize(&self) {
        let (was_listening, dropped) = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;

            let completion = state.auth.stop();
            let next_id = state.next_id;
            let was_listening = state.listening;

            let previous = std::mem::replace(
                state,
                SessionState::new(self.inner.base_validator.clone()),
            );
            state.next_id = next_id;

            (was_listening, (previous, completion))
        };

        if was_listening {
            self.inner.env.set_message_listener(false);
        }

        // Callbacks are dropped outside the lock.
        drop(dropped);

        info!(session_id = %self.inner.id, "Session torn down");
    }

    /// Records the handshake reply and fires completion listeners.
    fn complete_handshake(&self, args: &[Value]) {
        let context = HostContext::from_handshake(args);

        let listeners = {
            let mut state = self.inner.state.lock();
            if state.lifecycle != Lifecycle::Initializing {
                trace!("Handshake reply after teardown ignored");
                return;
            }
            state.host_context = Some(context.clone());
            state.lifecycle = Lifecycle::Ready;
            std::mem::take(&mut state.ready_listeners)
        };

        info!(
            session_id = %self.inner.id,
            frame_context = ?context.frame_context,
            host_client_type = ?context.host_client_type,
            version = %context.client_supported_version,
            "Session initialized"
        );

        for listener in listeners {
            listener(context.clone());
        }
    }

    fn register_framework_handlers(&self, handlers: &mut HandlerRegistry) {
        let weak = self.downgrade();
        handlers.insert(
            AUTHENTICATE_SUCCESS_ACTION,
            Handler::new(move |args| {
                if let Some(inner) = weak.upgrade() {
                    Session::from_inner(inner).handle_auth_success(args);
                }
                None
            }),
        );

        let weak = self.downgrade();
        handlers.insert(
            AUTHENTICATE_FAILURE_ACTION,
            Handler::new(move |args| {
                if let Some(inner) = weak.upgrade() {
                    Session::from_inner(inner).handle_auth_failure(args);
                }
                None
            }),
        );
    }
}

// ============================================================================
// Session - Messaging
// ============================================================================

impl Session {
    /// Sends a fire-and-forget request to the parent.
    pub fn send(&self, func: &str, args: Vec<Value>) {
        let mut state = self.inner.state.lock();
        self.inner
            .send_request(&mut state, PeerRole::Parent, func, args, None, None);
    }

    /// Sends a request to the parent; `callback` receives every reply.
    ///
    /// The callback gets `(args, is_partial)` and is dropped after the
    /// final reply.
    pub fn send_with_callback<F>(&self, func: &str, args: Vec<Value>, callback: F) -> RequestId
    where
        F: FnMut(Vec<Value>, bool) + Send + 'static,
    {
        self.send_with_callback_to(PeerRole::Parent, func, args, Box::new(callback))
    }

    /// Sends a fire-and-forget request to the child window.
    pub fn send_to_child(&self, func: &str, args: Vec<Value>) {
        let mut state = self.inner.state.lock();
        self.inner
            .send_request(&mut state, PeerRole::Child, func, args, None, None);
    }

    /// Sends a request to the child window; `callback` receives every reply.
    pub fn send_to_child_with_callback<F>(&self, func: &str, args: Vec<Value>, callback: F) -> RequestId
    where
        F: FnMut(Vec<Value>, bool) + Send + 'static,
    {
        self.send_with_callback_to(PeerRole::Child, func, args, Box::new(callback))
    }

    /// Sends a request to the parent and waits for the final reply.
    ///
    /// Partial replies are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ChannelClosed`] if the session is torn down first.
    pub async fn call(&self, func: &str, args: Vec<Value>) -> Result<Vec<Value>> {
        let (_, rx) = self.call_inner(func, args);
        Ok(rx.await?)
    }

    /// Like [`call`](Self::call), giving up after `limit`.
    ///
    /// On expiry the outstanding entry is dropped, so a late reply is
    /// ignored.
    ///
    /// # Errors
    ///
    /// - [`Error::Timeout`] if no final reply arrives within `limit`
    /// - [`Error::ChannelClosed`] if the session is torn down first
    pub async fn call_with_timeout(
        &self,
        func: &str,
        args: Vec<Value>,
        limit: Duration,
    ) -> Result<Vec<Value>> {
        let (id, rx) = self.call_inner(func, args);

        match timeout(limit, rx).await {
            Ok(reply) => Ok(reply?),
            Err(_) => {
                self.inner.state.lock().pending.remove(id);
                let timeout_ms = u64::try_from(limit.as_millis()).unwrap_or(u64::MAX);
                warn!(request_id = %id, func, timeout_ms, "Request timed out");
                Err(Error::timeout(func, timeout_ms))
            }
        }
    }

    /// Sends a request to the parent and streams every reply.
    ///
    /// The stream ends after the final (non-partial) reply, or when the
    /// session is torn down.
    pub fn call_stream(&self, func: &str, args: Vec<Value>) -> impl Stream<Item = Reply> + Send + 'static {
        let (tx, rx) = mpsc::unbounded_channel();
        self.send_with_callback(func, args, move |args, is_partial| {
            let _ = tx.send(Reply { args, is_partial });
        });

        stream::unfold((rx, false), |(mut rx, finished)| async move {
            if finished {
                return None;
            }
            let reply = rx.recv().await?;
            let finished = !reply.is_partial;
            Some((reply, (rx, finished)))
        })
    }

    /// Registers a handler reachable from either peer. Last one wins.
    pub fn register_handler(&self, name: impl Into<String>, handler: Handler) {
        let name = name.into();
        trace!(func = %name, "Handler registered");
        self.inner.state.lock().handlers.insert(name, handler);
    }

    /// Registers a closure handler accepting any arguments.
    pub fn on<F>(&self, name: impl Into<String>, func: F)
    where
        F: Fn(&[Value]) -> Option<HandlerReply> + Send + Sync + 'static,
    {
        self.register_handler(name, Handler::new(func));
    }

    /// Removes a handler. Returns `true` if one was registered.
    pub fn remove_handler(&self, name: &str) -> bool {
        self.inner.state.lock().handlers.remove(name).is_some()
    }

    fn send_with_callback_to(
        &self,
        target: PeerRole,
        func: &str,
        args: Vec<Value>,
        callback: ResponseCallback,
    ) -> RequestId {
        let mut state = self.inner.state.lock();
        let id = state.next_id;
        self.inner
            .send_request(&mut state, target, func, args, Some(callback), None)
            .unwrap_or(id)
    }

    fn call_inner(&self, func: &str, args: Vec<Value>) -> (RequestId, oneshot::Receiver<Vec<Value>>) {
        let (tx, rx) = oneshot::channel();
        let mut tx = Some(tx);
        let id = self.send_with_callback(func, args, move |args, is_partial| {
            if !is_partial
                && let Some(tx) = tx.take()
            {
                let _ = tx.send(args);
            }
        });
        (id, rx)
    }
}

// ============================================================================
// SessionInner - Outbound
// ============================================================================

impl SessionInner {
    /// Builds a request, registers its callback and routes it to `target`.
    ///
    /// Returns the allocated ID when a callback was supplied.
    pub(crate) fn send_request(
        &self,
        state: &mut SessionState,
        target: PeerRole,
        func: &str,
        args: Vec<Value>,
        callback: Option<ResponseCallback>,
        origin_override: Option<&str>,
    ) -> Option<RequestId> {
        let (request, id) = match callback {
            Some(callback) => {
                let id = state.allocate_id();
                state.pending.insert(id, target, func, callback);
                (Request::with_id(id, func, args), Some(id))
            }
            None => (Request::new(func, args), None),
        };

        trace!(request_id = ?id, target = %target, func, "Sending request");
        self.post_or_enqueue(state, target, request.into(), origin_override);
        id
    }

    /// Posts `message` to `target` if its origin is known, else queues it.
    ///
    /// `origin_override` posts to a window whose origin is still unknown.
    /// Frameless parent traffic goes to the native bridge instead.
    pub(crate) fn post_or_enqueue(
        &self,
        state: &mut SessionState,
        target: PeerRole,
        message: Message,
        origin_override: Option<&str>,
    ) {
        if state.frameless && target == PeerRole::Parent {
            self.post_native(&message);
            return;
        }

        let Some(peer) = state.peers.get(target) else {
            if state.peers.was_closed(target) {
                debug!(target = %target, "Peer window closed, message dropped");
            } else if target == PeerRole::Child {
                debug!("No child window bound, message dropped");
            } else {
                state.queues.push(target, message);
            }
            return;
        };

        if peer.is_closed() {
            debug!(target = %target, "Peer window closed, message dropped");
            return;
        }

        let window = peer.window().clone();
        let known_origin = peer.origin().map(str::to_owned);

        if known_origin.is_some() {
            self.flush(state, target);
        }

        match origin_override.or(known_origin.as_deref()) {
            Some(target_origin) => window.post_message(&message.to_value(), target_origin),
            None => state.queues.push(target, message),
        }
    }

    /// Posts every queued message for `role`, oldest first.
    ///
    /// No-op while the peer's origin is unknown or its window is closed.
    pub(crate) fn flush(&self, state: &mut SessionState, role: PeerRole) {
        if state.queues.is_empty(role) {
            return;
        }

        let Some(peer) = state.peers.get(role) else {
            return;
        };
        if peer.is_closed() {
            return;
        }
        let Some(origin) = peer.origin().map(str::to_owned) else {
            return;
        };
        let window = peer.window().clone();

        let messages = state.queues.drain(role);
        debug!(role = %role, count = messages.len(), origin = %origin, "Flushing queued messages");

        for message in messages {
            window.post_message(&message.to_value(), &origin);
        }
    }

    fn post_native(&self, message: &Message) {
        let Some(bridge) = self.env.native_bridge() else {
            warn!("No native bridge available, message dropped");
            return;
        };

        match serde_json::to_string(&message.to_value()) {
            Ok(payload) => bridge.post(&payload),
            Err(e) => warn!(error = %e, "Failed to serialize message for native bridge"),
        }
    }
}
