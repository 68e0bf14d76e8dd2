//! Outstanding request table.
//!
//! Maps each request ID to the callback awaiting its reply. A final reply
//! removes the entry; a partial reply leaves it in place so later replies
//! under the same ID still reach the callback.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tracing::{trace, warn};

use super::peers::PeerRole;
use crate::identifiers::RequestId;

// ============================================================================
// Types
// ============================================================================

/// Reply callback: `(args, is_partial)`.
///
/// Invoked once per reply. Never invoked while session state is locked.
pub type ResponseCallback = Box<dyn FnMut(Vec<Value>, bool) + Send>;

/// Callback shared between the table and an in-flight invocation.
pub type SharedCallback = Arc<Mutex<ResponseCallback>>;

// ============================================================================
// PendingCall
// ============================================================================

struct PendingCall {
    /// Peer the request was sent to. Replies from elsewhere are ignored.
    target: PeerRole,
    func: String,
    callback: SharedCallback,
}

// ============================================================================
// PendingCalls
// ============================================================================

/// Callbacks awaiting replies, keyed by request ID.
#[derive(Default)]
pub struct PendingCalls {
    calls: FxHashMap<RequestId, PendingCall>,
}

impl PendingCalls {
    /// Registers `callback` for replies to `id` from `target`.
    pub fn insert(
        &mut self,
        id: RequestId,
        target: PeerRole,
        func: impl Into<String>,
        callback: ResponseCallback,
    ) {
        let func = func.into();
        trace!(request_id = %id, target = %target, func = %func, "Awaiting reply");
        self.calls.insert(
            id,
            PendingCall {
                target,
                func,
                callback: Arc::new(Mutex::new(callback)),
            },
        );
    }

    /// Looks up the callback for a reply to `id` arriving from `from`.
    ///
    /// A non-partial reply removes the entry. Returns `None` if nothing is
    /// waiting or the reply came from the wrong peer.
    pub fn resolve(&mut self, id: RequestId, from: PeerRole, is_partial: bool) -> Option<SharedCallback> {
        let call = self.calls.get(&id)?;

        if call.target != from {
            warn!(
                request_id = %id,
                expected = %call.target,
                actual = %from,
                "Reply from unexpected peer ignored"
            );
            return None;
        }

        if is_partial {
            return Some(Arc::clone(&call.callback));
        }

        self.calls.remove(&id).map(|call| {
            trace!(request_id = %id, func = %call.func, "Request settled");
            call.callback
        })
    }

    /// Forgets the callback for `id`. Returns `true` if one was registered.
    pub fn remove(&mut self, id: RequestId) -> bool {
        self.calls.remove(&id).is_some()
    }

    /// Returns `true` if a callback is registered for `id`.
    #[inline]
    #[must_use]
    pub fn contains(&self, id: RequestId) -> bool {
        self.calls.contains_key(&id)
    }

    /// Number of outstanding requests.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.calls.len()
    }

    /// Returns `true` if nothing is outstanding.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

impl fmt::Debug for PendingCalls {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingCalls")
            .field("len", &self.calls.len())
            .finish()
    }
}

/// Invokes a shared callback.
pub(crate) fn invoke(callback: &SharedCallback, args: Vec<Value>, is_partial: bool) {
    let mut guard = callback.lock();
    let callback: &mut ResponseCallback = &mut guard;
    callback(args, is_partial);
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn recorder() -> (ResponseCallback, Arc<Mutex<Vec<(Vec<Value>, bool)>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        let callback: ResponseCallback = Box::new(move |args, partial| {
            sink.lock().push((args, partial));
        });
        (callback, seen)
    }

    #[test]
    fn test_final_reply_removes_entry() {
        let mut pending = PendingCalls::default();
        let (callback, seen) = recorder();
        pending.insert(RequestId::new(0), PeerRole::Parent, "getContext", callback);

        let shared = pending
            .resolve(RequestId::new(0), PeerRole::Parent, false)
            .expect("callback registered");
        invoke(&shared, vec![json!(1)], false);

        assert!(pending.is_empty());
        assert_eq!(seen.lock().as_slice(), &[(vec![json!(1)], false)]);
        assert!(pending.resolve(RequestId::new(0), PeerRole::Parent, false).is_none());
    }

    #[test]
    fn test_partial_reply_keeps_entry() {
        let mut pending = PendingCalls::default();
        let (callback, seen) = recorder();
        pending.insert(RequestId::new(4), PeerRole::Parent, "stream", callback);

        for (value, partial) in [(1, true), (2, true), (3, false)] {
            let shared = pending
                .resolve(RequestId::new(4), PeerRole::Parent, partial)
                .expect("callback registered");
            invoke(&shared, vec![json!(value)], partial);
        }

        assert!(!pending.contains(RequestId::new(4)));
        assert_eq!(seen.lock().len(), 3);
    }

    #[test]
    fn test_reply_from_wrong_peer_is_ignored() {
        let mut pending = PendingCalls::default();
        let (callback, _seen) = recorder();
        pending.insert(RequestId::new(1), PeerRole::Child, "ping", callback);

        assert!(pending.resolve(RequestId::new(1), PeerRole::Parent, false).is_none());
        assert!(pending.contains(RequestId::new(1)));
    }

    #[test]
    fn test_remove() {
        let mut pending = PendingCalls::default();
        let (callback, _seen) = recorder();
        pending.insert(RequestId::new(2), PeerRole::Parent, "x", callback);

        assert!(pending.remove(RequestId::new(2)));
        assert!(!pending.remove(RequestId::new(2)));
    }
}
