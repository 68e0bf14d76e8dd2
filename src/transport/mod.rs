//! Cross-window transport layer.
//!
//! This module holds the building blocks the session uses to move
//! messages between the current window and its peers.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐                              ┌─────────────────┐
//! │  Host (parent)  │        postMessage           │  App (Session)  │
//! │                 │◄────────────────────────────►│                 │
//! │  or native      │    origin-checked, queued    │  PendingCalls   │
//! │  bridge         │    until origin known        │  OutboundQueues │
//! └─────────────────┘                              └────────┬────────┘
//!                                                           │ postMessage
//!                                                  ┌────────▼────────┐
//!                                                  │  Popup (child)  │
//!                                                  └─────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `origin` | Allow-list matching for inbound origins |
//! | `peers` | Parent and child window slots |
//! | `pending` | Reply callbacks keyed by request ID |
//! | `queue` | Per-peer FIFO of messages awaiting an origin |

// ============================================================================
// Submodules
// ============================================================================

/// Inbound origin validation.
pub mod origin;

/// Peer window tracking.
pub mod peers;

/// Outstanding request table.
pub mod pending;

/// Outbound queues.
pub mod queue;

// ============================================================================
// Re-exports
// ============================================================================

pub use origin::{DEFAULT_VALID_ORIGINS, OriginValidator};
pub use peers::{Peer, PeerRole, Peers};
pub use pending::{PendingCalls, ResponseCallback, SharedCallback};
pub use queue::OutboundQueues;
