//! Window relationship tracking.
//!
//! At load time only the parent's window handle is structurally knowable;
//! its origin is learned from the first authorized inbound message. Child
//! windows (popups, nested frames) are discovered the same way.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

use tracing::debug;

use crate::platform::{WindowRef, same_window};

// ============================================================================
// PeerRole
// ============================================================================

/// Which peer slot a window occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PeerRole {
    /// Embedding host (or opener).
    Parent,
    /// Nested popup or frame opened by the app.
    Child,
}

impl PeerRole {
    /// Both roles, parent first.
    pub const ALL: [Self; 2] = [Self::Parent, Self::Child];

    fn index(self) -> usize {
        match self {
            Self::Parent => 0,
            Self::Child => 1,
        }
    }
}

impl fmt::Display for PeerRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parent => f.write_str("parent"),
            Self::Child => f.write_str("child"),
        }
    }
}

// ============================================================================
// Peer
// ============================================================================

/// A bound peer window and its origin, once known.
#[derive(Clone)]
pub struct Peer {
    window: WindowRef,
    origin: Option<String>,
}

impl Peer {
    /// Creates a peer binding.
    #[inline]
    #[must_use]
    pub fn new(window: WindowRef, origin: Option<String>) -> Self {
        Self { window, origin }
    }

    /// The peer's window handle.
    #[inline]
    #[must_use]
    pub fn window(&self) -> &WindowRef {
        &self.window
    }

    /// The peer's origin, if learned.
    #[inline]
    #[must_use]
    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    /// Returns `true` if the peer's window has closed.
    #[inline]
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.window.is_closed()
    }
}

impl fmt::Debug for Peer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Peer")
            .field("window", &self.window.id())
            .field("origin", &self.origin)
            .finish()
    }
}

// ============================================================================
// Peers
// ============================================================================

/// The two peer slots.
///
/// A slot whose window was found closed stays marked until another window
/// binds it, so traffic meant for the closed window is never handed to its
/// successor.
#[derive(Debug, Default)]
pub struct Peers {
    parent: Option<Peer>,
    child: Option<Peer>,
    closed: [bool; 2],
}

impl Peers {
    /// Returns the peer bound to `role`.
    #[inline]
    #[must_use]
    pub fn get(&self, role: PeerRole) -> Option<&Peer> {
        match role {
            PeerRole::Parent => self.parent.as_ref(),
            PeerRole::Child => self.child.as_ref(),
        }
    }

    /// Binds `role` to `window`, replacing any previous binding.
    pub fn bind(&mut self, role: PeerRole, window: WindowRef, origin: Option<String>) {
        debug!(role = %role, window = %window.id(), origin = ?origin, "Peer bound");
        *self.slot_mut(role) = Some(Peer::new(window, origin));
        self.closed[role.index()] = false;
    }

    /// Returns `true` if `role` lost its window to closure and has not been
    /// rebound since.
    #[inline]
    #[must_use]
    pub fn was_closed(&self, role: PeerRole) -> bool {
        self.closed[role.index()]
    }

    /// Clears `role`, returning the previous binding.
    pub fn unbind(&mut self, role: PeerRole) -> Option<Peer> {
        self.slot_mut(role).take()
    }

    /// Returns `true` if `role` is bound to `window`.
    #[must_use]
    pub fn is_bound_to(&self, role: PeerRole, window: &WindowRef) -> bool {
        self.get(role)
            .is_some_and(|peer| same_window(peer.window(), window))
    }

    /// Returns the role `window` occupies, if any.
    #[must_use]
    pub fn role_of(&self, window: &WindowRef) -> Option<PeerRole> {
        PeerRole::ALL
            .into_iter()
            .find(|role| self.is_bound_to(*role, window))
    }

    /// Binds or refreshes a slot from an authorized inbound message.
    ///
    /// The parent slot is only taken if it is free, closed, or already held
    /// by `source`; otherwise the same rule is applied to the child slot.
    /// In frameless mode the message is always attributed to the child.
    /// Returns the role updated, or `None` if both slots belong to other
    /// live windows.
    pub fn observe(&mut self, source: &WindowRef, origin: &str, frameless: bool) -> Option<PeerRole> {
        let roles: &[PeerRole] = if frameless {
            &[PeerRole::Child]
        } else {
            &PeerRole::ALL
        };

        let role = roles
            .iter()
            .copied()
            .find(|role| self.slot_accepts(*role, source))?;

        let slot = self.slot_mut(role);
        match slot {
            Some(peer) if same_window(&peer.window, source) => {
                if peer.origin.as_deref() != Some(origin) {
                    debug!(role = %role, origin, "Peer origin learned");
                    peer.origin = Some(origin.to_string());
                }
            }
            _ => {
                debug!(role = %role, window = %source.id(), origin, "Peer bound from message");
                *slot = Some(Peer::new(source.clone(), Some(origin.to_string())));
                self.closed[role.index()] = false;
            }
        }

        Some(role)
    }

    /// Clears and marks slots whose window has closed, returning the roles
    /// cleared.
    pub fn prune_closed(&mut self) -> Vec<PeerRole> {
        let mut cleared = Vec::new();
        for role in PeerRole::ALL {
            let slot = self.slot_mut(role);
            if slot.as_ref().is_some_and(Peer::is_closed) {
                debug!(role = %role, "Peer window closed");
                *slot = None;
                self.closed[role.index()] = true;
                cleared.push(role);
            }
        }
        cleared
    }

    fn slot_accepts(&self, role: PeerRole, source: &WindowRef) -> bool {
        match self.get(role) {
            None => true,
            Some(peer) => peer.is_closed() || same_window(peer.window(), source),
        }
    }

    fn slot_mut(&mut self, role: PeerRole) -> &mut Option<Peer> {
        match role {
            PeerRole::Parent => &mut self.parent,
            PeerRole::Child => &mut self.child,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    use serde_json::Value;

    use crate::identifiers::WindowId;
    use crate::platform::BrowserWindow;

    struct StubWindow {
        id: WindowId,
        closed: AtomicBool,
    }

    impl BrowserWindow for StubWindow {
        fn id(&self) -> WindowId {
            self.id
        }
        fn post_message(&self, _message: &Value, _target_origin: &str) {}
        fn is_closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
        fn close(&self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    fn window(id: u64) -> WindowRef {
        Arc::new(StubWindow {
            id: WindowId::new(id),
            closed: AtomicBool::new(false),
        })
    }

    #[test]
    fn test_first_message_binds_parent() {
        let mut peers = Peers::default();
        let host = window(1);

        assert_eq!(peers.observe(&host, "https://host", false), Some(PeerRole::Parent));
        assert_eq!(peers.get(PeerRole::Parent).and_then(Peer::origin), Some("https://host"));
    }

    #[test]
    fn test_known_parent_learns_origin() {
        let mut peers = Peers::default();
        let host = window(1);
        peers.bind(PeerRole::Parent, host.clone(), None);

        assert_eq!(peers.observe(&host, "https://host", false), Some(PeerRole::Parent));
        assert_eq!(peers.get(PeerRole::Parent).and_then(Peer::origin), Some("https://host"));
    }

    #[test]
    fn test_other_window_becomes_child() {
        let mut peers = Peers::default();
        let host = window(1);
        let popup = window(2);
        peers.bind(PeerRole::Parent, host, Some("https://host".into()));

        assert_eq!(peers.observe(&popup, "https://app", false), Some(PeerRole::Child));
        assert_eq!(peers.role_of(&popup), Some(PeerRole::Child));
    }

    #[test]
    fn test_third_window_is_ignored() {
        let mut peers = Peers::default();
        peers.bind(PeerRole::Parent, window(1), Some("https://host".into()));
        peers.bind(PeerRole::Child, window(2), Some("https://app".into()));

        let stranger = window(3);
        assert_eq!(peers.observe(&stranger, "https://app", false), None);
        assert_eq!(peers.role_of(&stranger), None);
    }

    #[test]
    fn test_closed_parent_is_replaced() {
        let mut peers = Peers::default();
        let old = window(1);
        peers.bind(PeerRole::Parent, old.clone(), Some("https://host".into()));
        old.close();

        let new = window(4);
        assert_eq!(peers.observe(&new, "https://host", false), Some(PeerRole::Parent));
        assert!(peers.is_bound_to(PeerRole::Parent, &new));
    }

    #[test]
    fn test_frameless_always_child() {
        let mut peers = Peers::default();
        let popup = window(2);

        assert_eq!(peers.observe(&popup, "https://app", true), Some(PeerRole::Child));
        assert!(peers.get(PeerRole::Parent).is_none());
    }

    #[test]
    fn test_prune_closed() {
        let mut peers = Peers::default();
        let popup = window(2);
        peers.bind(PeerRole::Parent, window(1), None);
        peers.bind(PeerRole::Child, popup.clone(), None);
        popup.close();

        assert_eq!(peers.prune_closed(), vec![PeerRole::Child]);
        assert!(peers.get(PeerRole::Child).is_none());
        assert!(peers.get(PeerRole::Parent).is_some());
        assert!(peers.was_closed(PeerRole::Child));
        assert!(!peers.was_closed(PeerRole::Parent));
    }

    #[test]
    fn test_closed_mark_cleared_by_new_window() {
        let mut peers = Peers::default();
        let popup = window(2);
        peers.bind(PeerRole::Parent, window(1), Some("https://host".into()));
        peers.bind(PeerRole::Child, popup.clone(), None);
        popup.close();
        peers.prune_closed();

        assert_eq!(peers.observe(&window(5), "https://app", false), Some(PeerRole::Child));
        assert!(!peers.was_closed(PeerRole::Child));
    }

    #[test]
    fn test_unbind_does_not_mark_closed() {
        let mut peers = Peers::default();
        peers.bind(PeerRole::Child, window(2), None);
        peers.unbind(PeerRole::Child);

        assert!(!peers.was_closed(PeerRole::Child));
    }
}
