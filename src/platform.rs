//! Browser platform abstraction.
//!
//! The protocol never touches a DOM directly. Embedders implement
//! [`HostEnvironment`] for the current page and [`BrowserWindow`] for each
//! foreign window handle (embedding frame, opener, popup), then feed
//! inbound `message` events to
//! [`Session::process_message`](crate::Session::process_message).
//!
//! # Delivery Contract
//!
//! [`BrowserWindow::post_message`] must behave like `window.postMessage`:
//! delivery happens on a later event-loop turn. Implementations must never
//! call back into the session from inside `post_message`.
//!
//! # Example
//!
//! ```ignore
//! struct Frame { id: WindowId, handle: web_sys::Window }
//!
//! impl BrowserWindow for Frame {
//!     fn id(&self) -> WindowId { self.id }
//!     fn post_message(&self, message: &Value, target_origin: &str) {
//!         let data = serde_wasm_bindgen::to_value(message).unwrap_or_default();
//!         let _ = self.handle.post_message(&data, target_origin);
//!     }
//!     fn is_closed(&self) -> bool { self.handle.closed().unwrap_or(true) }
//!     fn close(&self) { let _ = self.handle.close(); }
//! }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::identifiers::WindowId;

// ============================================================================
// Types
// ============================================================================

/// Shared handle to a foreign window.
pub type WindowRef = Arc<dyn BrowserWindow>;

// ============================================================================
// BrowserWindow
// ============================================================================

/// A window the session can post messages to.
pub trait BrowserWindow: Send + Sync {
    /// Stable identity of the underlying window.
    fn id(&self) -> WindowId;

    /// Posts `message` to the window, restricted to `target_origin`.
    fn post_message(&self, message: &Value, target_origin: &str);

    /// Returns `true` once the window has been closed.
    fn is_closed(&self) -> bool;

    /// Closes the window.
    fn close(&self);
}

/// Returns `true` if both handles refer to the same window.
#[inline]
#[must_use]
pub fn same_window(a: &WindowRef, b: &WindowRef) -> bool {
    a.id() == b.id()
}

// ============================================================================
// NativeBridge
// ============================================================================

/// Native transport injected by a non-browser host (`framelessPostMessage`).
///
/// String in, nothing out.
pub trait NativeBridge: Send + Sync {
    /// Hands a serialized message to the native host.
    fn post(&self, payload: &str);
}

// ============================================================================
// WindowGeometry
// ============================================================================

/// Outer size and screen position of the current window, in CSS pixels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WindowGeometry {
    /// `window.outerWidth`.
    pub outer_width: i32,
    /// `window.outerHeight`.
    pub outer_height: i32,
    /// `window.screenLeft` (or `screenX`).
    pub screen_left: i32,
    /// `window.screenTop` (or `screenY`).
    pub screen_top: i32,
}

// ============================================================================
// HostEnvironment
// ============================================================================

/// The page the session runs in.
pub trait HostEnvironment: Send + Sync {
    /// Handle to the current window. Used to discard echoed messages.
    fn current_window(&self) -> WindowRef;

    /// `window.location.origin`.
    fn origin(&self) -> String;

    /// `window.location.href`. Base for resolving relative URLs.
    fn href(&self) -> String;

    /// The embedding frame, if the current window is a sub-frame.
    fn parent(&self) -> Option<WindowRef>;

    /// The window that opened this one, if any.
    fn opener(&self) -> Option<WindowRef>;

    /// Current window geometry.
    fn geometry(&self) -> WindowGeometry;

    /// Opens a new top-level window. `None` if the platform blocked it.
    fn open_window(&self, url: &str, target: &str, features: &str) -> Option<WindowRef>;

    /// Performs a full top-level navigation (`location.assign`).
    fn navigate(&self, url: &str);

    /// The injected native bridge, present in frameless hosts.
    fn native_bridge(&self) -> Option<Arc<dyn NativeBridge>> {
        None
    }

    /// Attaches or detaches the platform `message` listener.
    fn set_message_listener(&self, _enabled: bool) {}
}

// ============================================================================
// MessageEvent
// ============================================================================

/// An inbound cross-document message.
#[derive(Clone)]
pub struct MessageEvent {
    /// Window that posted the message (`event.source`).
    pub source: Option<WindowRef>,
    /// Origin reported by the platform (`event.origin`).
    pub origin: String,
    /// Payload (`event.data`).
    pub data: Value,
}

impl MessageEvent {
    /// Creates a message event from a known source window.
    #[inline]
    #[must_use]
    pub fn new(source: WindowRef, origin: impl Into<String>, data: Value) -> Self {
        Self {
            source: Some(source),
            origin: origin.into(),
            data,
        }
    }
}

impl fmt::Debug for MessageEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageEvent")
            .field("source", &self.source.as_ref().map(|w| w.id()))
            .field("origin", &self.origin)
            .field("data", &self.data)
            .finish()
    }
}
