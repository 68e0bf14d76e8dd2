//! Outbound message queues.
//!
//! A message addressed to a peer whose origin is not yet known is held
//! back, because posting with a `*` target origin could leak it to an
//! unintended document. Each peer role has its own FIFO; queues drain in
//! order once the origin is learned.

// ============================================================================
// Imports
// ============================================================================

use std::collections::VecDeque;

use tracing::trace;

use super::peers::PeerRole;
use crate::protocol::Message;

// ============================================================================
// OutboundQueues
// ============================================================================

/// Per-role FIFO of messages waiting for a peer origin.
#[derive(Debug, Default)]
pub struct OutboundQueues {
    parent: VecDeque<Message>,
    child: VecDeque<Message>,
}

impl OutboundQueues {
    /// Appends a message to the queue for `role`.
    pub fn push(&mut self, role: PeerRole, message: Message) {
        let queue = self.queue_mut(role);
        queue.push_back(message);
        trace!(role = %role, depth = queue.len(), "Message queued");
    }

    /// Removes and returns every queued message for `role`, oldest first.
    pub fn drain(&mut self, role: PeerRole) -> Vec<Message> {
        self.queue_mut(role).drain(..).collect()
    }

    /// Drops every queued message for `role`.
    pub fn clear(&mut self, role: PeerRole) {
        self.queue_mut(role).clear();
    }

    /// Number of messages waiting for `role`.
    #[inline]
    #[must_use]
    pub fn len(&self, role: PeerRole) -> usize {
        self.queue(role).len()
    }

    /// Returns `true` if nothing is waiting for `role`.
    #[inline]
    #[must_use]
    pub fn is_empty(&self, role: PeerRole) -> bool {
        self.queue(role).is_empty()
    }

    fn queue(&self, role: PeerRole) -> &VecDeque<Message> {
        match role {
            PeerRole::Parent => &self.parent,
            PeerRole::Child => &self.child,
        }
    }

    fn queue_mut(&mut self, role: PeerRole) -> &mut VecDeque<Message> {
        match role {
            PeerRole::Parent => &mut self.parent,
            PeerRole::Child => &mut self.child,
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
