//! Wire protocol types.
//!
//! This module defines the message format exchanged with the host window
//! (parent) and with nested windows the app opens (child).
//!
//! # Protocol Overview
//!
//! | Message Type | Shape | Purpose |
//! |--------------|-------|---------|
//! | `Request` | `{ id?, func, args? }` | Action call or fire-and-forget event |
//! | `Response` | `{ id, args?, isPartialResponse? }` | Reply, possibly one of several |
//!
//! The first request is always the `initialize` handshake; its reply
//! carries the [`HostContext`].
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `context` | Frame context and host client type enums |
//! | `handshake` | Handshake reply parsing and version helpers |
//! | `message` | Request and Response types |

// ============================================================================
// Submodules
// ============================================================================

/// Frame contexts and host client types.
pub mod context;

/// Handshake reply parsing.
pub mod handshake;

/// Request and Response message types.
pub mod message;

// ============================================================================
// Re-exports
// ============================================================================

pub use context::{FrameContext, HostClientType};
pub use handshake::{
    CapabilityManifest, DEFAULT_PROTOCOL_VERSION, HANDSHAKE_ACTION, HostContext, is_version,
};
pub use message::{Message, Request, Response};
