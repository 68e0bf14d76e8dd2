//! Inbound message dispatch.
//!
//! Every inbound message passes the same pipeline:
//!
//! 1. Parse; drop anything that is neither a request nor a response.
//! 2. Drop echoes of our own window and unauthorized origins.
//! 3. Update the peer slots and flush queues that became sendable.
//! 4. Route by shape and sender:
//!
//! | Shape | From parent | From child |
//! |-------|-------------|------------|
//! | Response | resolve pending call | resolve pending call |
//! | Request | run handler, ignore result | run handler and reply, else forward to parent |
//!
//! Routing decisions are made under the session lock; the resulting
//! callback or handler runs after it is released.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace};

use crate::identifiers::RequestId;
use crate::platform::{MessageEvent, WindowRef, same_window};
use crate::protocol::{Message, Request, Response};
use crate::transport::pending::{self, SharedCallback};
use crate::transport::{PeerRole, ResponseCallback};

use super::core::{Lifecycle, Session, SessionInner, SessionState};
use super::handlers::Handler;

// ============================================================================
// Deferred
// ============================================================================

/// Work left to do once the session lock is released.
enum Deferred {
    /// Nothing to run.
    Done,
    /// Deliver a reply to a pending callback.
    Reply {
        callback: SharedCallback,
        args: Vec<Value>,
        is_partial: bool,
    },
    /// Run a handler, answering the child if `reply_to` is set.
    Invoke {
        func: String,
        handler: Handler,
        args: Vec<Value>,
        reply_to: Option<RequestId>,
    },
}

impl Deferred {
    fn run(self, session: &Session) {
        match self {
            Self::Done => {}
            Self::Reply {
                callback,
                args,
                is_partial,
            } => pending::invoke(&callback, args, is_partial),
            Self::Invoke {
                func,
                handler,
                args,
                reply_to,
            } => {
                let reply = handler.invoke(&func, &args);
                if let (Some(id), Some(reply)) = (reply_to, reply) {
                    let response = Response::new(id, reply.into_args());
                    let mut state = session.inner.state.lock();
                    session
                        .inner
                        .post_or_enqueue(&mut state, PeerRole::Child, response.into(), None);
                }
            }
        }
    }
}

// ============================================================================
// Session - Inbound
// ============================================================================

impl Session {
    /// Handles a platform `message` event.
    ///
    /// Bind this to the window's `message` listener. Malformed,
    /// unauthorized and echoed messages are dropped silently.
    pub fn process_message(&self, event: MessageEvent) {
        let Some(source) = event.source else {
            trace!("Message without source window dropped");
            return;
        };

        let Some(message) = Message::parse(&event.data) else {
            trace!(origin = %event.origin, "Malformed message dropped");
            return;
        };

        if same_window(&source, &self.inner.env.current_window()) {
            trace!("Echoed message dropped");
            return;
        }

        let deferred = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;

            if !state.listening {
                trace!("Not listening, message dropped");
                return;
            }

            if !state.validator.is_authorized(&event.origin) {
                debug!(origin = %event.origin, "Message from unauthorized origin dropped");
                return;
            }

            let frameless = state.frameless;
            state.peers.observe(&source, &event.origin, frameless);

            for role in state.peers.prune_closed() {
                state.queues.clear(role);
            }

            let Some(role) = state.peers.role_of(&source) else {
                debug!(window = %source.id(), origin = %event.origin, "Message from unknown window dropped");
                return;
            };

            for peer in PeerRole::ALL {
                self.inner.flush(state, peer);
            }

            self.inner.route(state, role, message)
        };

        deferred.run(self);
    }

    /// Handles a serialized message from the native bridge.
    ///
    /// Only meaningful in frameless mode, where the native host takes the
    /// parent's place.
    pub fn receive_native_message(&self, payload: &str) {
        let message = match Message::parse_str(payload) {
            Ok(Some(message)) => message,
            Ok(None) => {
                trace!("Malformed native message dropped");
                return;
            }
            Err(e) => {
                debug!(error = %e, "Unparseable native message dropped");
                return;
            }
        };

        let deferred = {
            let mut guard = self.inner.state.lock();
            let state = &mut *guard;

            if !state.frameless || state.lifecycle == Lifecycle::Uninitialized {
                debug!("Native message outside frameless mode dropped");
                return;
            }

            self.inner.route(state, PeerRole::Parent, message)
        };

        deferred.run(self);
    }
}

// ============================================================================
// SessionInner - Routing
// ============================================================================

impl SessionInner {
    /// Decides what an authorized message from `from` triggers.
    fn route(self: &Arc<Self>, state: &mut SessionState, from: PeerRole, message: Message) -> Deferred {
        match message {
            Message::Response(response) => {
                let Some(callback) = state.pending.resolve(response.id, from, response.is_partial) else {
                    trace!(request_id = %response.id, from = %from, "Reply without pending request dropped");
                    return Deferred::Done;
                };
                Deferred::Reply {
                    callback,
                    args: response.args,
                    is_partial: response.is_partial,
                }
            }
            Message::Request(request) => self.route_request(state, from, request),
        }
    }

    fn route_request(self: &Arc<Self>, state: &mut SessionState, from: PeerRole, request: Request) -> Deferred {
        let Request { id, func, args } = request;

        if let Some(handler) = state.handlers.lookup(&func, from) {
            let reply_to = match from {
                PeerRole::Child => id,
                PeerRole::Parent => None,
            };
            return Deferred::Invoke {
                func,
                handler,
                args,
                reply_to,
            };
        }

        match from {
            PeerRole::Parent => {
                trace!(func = %func, "No handler for parent request");
            }
            PeerRole::Child => {
                debug!(func = %func, child_request_id = ?id, "Forwarding child request to parent");
                let child = state.peers.get(PeerRole::Child).map(|peer| peer.window().clone());
                let relay = id.map(|child_id| self.relay_to_child(child_id, child));
                self.send_request(state, PeerRole::Parent, &func, args, relay, None);
            }
        }

        Deferred::Done
    }

    /// Callback that passes the parent's replies back to the child under
    /// the child's own request ID.
    ///
    /// Replies are dropped once `child` no longer holds the child slot.
    fn relay_to_child(self: &Arc<Self>, child_id: RequestId, child: Option<WindowRef>) -> ResponseCallback {
        let weak = Arc::downgrade(self);
        Box::new(move |args, is_partial| {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            let mut state = inner.state.lock();
            if let Some(child) = &child
                && !state.peers.is_bound_to(PeerRole::Child, child)
            {
                debug!(child_request_id = %child_id, "Requesting child is gone, reply dropped");
                return;
            }
            let response = Response::with_partial(child_id, args, is_partial);
            inner.post_or_enqueue(&mut state, PeerRole::Child, response.into(), None);
        })
    }
}
