//! Protocol session.
//!
//! A [`Session`] is the app's endpoint of the protocol: it performs the
//! handshake, correlates requests with replies, queues traffic until peer
//! origins are known and dispatches inbound requests to handlers.
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──initialize()──► Initializing ──handshake reply──► Ready
//!       ▲                                                             │
//!       └──────────────────────── uninitialize() ─────────────────────┘
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `builder` | [`SessionBuilder`] and [`SessionOptions`] |
//! | `core` | [`Session`] handle, lifecycle and outbound messaging |
//! | `dispatch` | Inbound routing |
//! | `handlers` | [`Handler`] and [`HandlerRegistry`] |

// ============================================================================
// Submodules
// ============================================================================

/// Configuration and builder.
pub mod builder;

/// Session handle and outbound messaging.
pub mod core;

/// Inbound routing.
mod dispatch;

/// Request handlers.
pub mod handlers;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::{LegacyConnector, SessionBuilder, SessionOptions};
pub use core::{Lifecycle, Reply, Session};
pub use handlers::{Arity, Handler, HandlerRegistry, HandlerReply};
