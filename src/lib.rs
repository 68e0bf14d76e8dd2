//! Frame Bridge - Secure messaging between an embedded app and its host.
//!
//! This library implements the protocol an app running inside a sandboxed
//! iframe (or a frameless native webview) uses to talk to the application
//! that embeds it, across an untrusted origin boundary.
//!
//! # Architecture
//!
//! The protocol runs over the browser's cross-document messaging channel:
//!
//! - **Parent**: the embedding host frame, the opener window, or the native
//!   bridge in frameless mode
//! - **App**: the page owning the [`Session`]
//! - **Child**: a window the app opened, such as the sign-in popup
//!
//! Key design principles:
//!
//! - Inbound messages are accepted only from allow-listed `https` origins
//! - Nothing is posted with a wildcard target origin once the peer is known;
//!   messages queue until the origin is learned
//! - Requests carry numeric IDs; replies may be partial and stream
//! - The browser is abstracted behind [`HostEnvironment`] and
//!   [`BrowserWindow`], so the core runs and tests without a DOM
//!
//! # Quick Start
//!
//! ```ignore
//! use frame_bridge::{AuthenticateParameters, Result, Session};
//!
//! async fn start(env: std::sync::Arc<dyn frame_bridge::HostEnvironment>) -> Result<()> {
//!     let session = Session::builder()
//!         .additional_origin("https://partner.example.org")
//!         .build(env)?;
//!
//!     let context = session.initialize_async(&[]).await?;
//!     tracing::info!(frame_context = ?context.frame_context, "Connected");
//!
//!     let token = session
//!         .authenticate_async(AuthenticateParameters::new("/auth/start").width(500))
//!         .await?;
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`auth`] | Sign-in popup controller |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`platform`] | Browser abstraction traits |
//! | [`protocol`] | Wire message types and handshake parsing |
//! | [`session`] | [`Session`] handle, configuration and dispatch |
//! | [`transport`] | Origin checks, peers, queues, pending calls |

// ============================================================================
// Modules
// ============================================================================

/// Sign-in popup controller.
///
/// Extends [`Session`] with `authenticate` on the opener side and
/// `notify_success` / `notify_failure` on the popup side.
pub mod auth;

/// Error types and result aliases.
///
/// All fallible operations return [`Result<T>`] which uses [`Error`].
pub mod error;

/// Type-safe identifiers.
pub mod identifiers;

/// Browser abstraction.
///
/// Embedders implement these traits over the real DOM.
pub mod platform;

/// Wire protocol message types.
pub mod protocol;

/// Protocol session.
pub mod session;

/// Cross-window transport building blocks.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Authentication types
pub use auth::{
    AuthFailure, AuthOutcome, AuthState, AuthenticateParameters, PopupBounds,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{RequestId, SessionId, WindowId};

// Platform traits
pub use platform::{
    BrowserWindow, HostEnvironment, MessageEvent, NativeBridge, WindowGeometry, WindowRef,
};

// Protocol types
pub use protocol::{
    CapabilityManifest, FrameContext, HostClientType, HostContext, Message, Request, Response,
};

// Session types
pub use session::{
    Arity, Handler, HandlerReply, LegacyConnector, Lifecycle, Reply, Session, SessionBuilder,
    SessionOptions,
};

// Transport types
pub use transport::{DEFAULT_VALID_ORIGINS, OriginValidator, PeerRole};
