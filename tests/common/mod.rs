//! Fake browser shared by the scenario tests.
//!
//! Posting never delivers anything; tests inspect what was posted and feed
//! replies back through `Session::process_message`.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use frame_bridge::{
    BrowserWindow, HostEnvironment, MessageEvent, NativeBridge, Session, WindowGeometry, WindowId,
    WindowRef,
};
use parking_lot::Mutex;
use serde_json::Value;

pub const APP_ORIGIN: &str = "https://app.contoso.com";
pub const APP_HREF: &str = "https://app.contoso.com/tabs/home";
pub const HOST_ORIGIN: &str = "https://teams.microsoft.com";

static NEXT_WINDOW_ID: AtomicU64 = AtomicU64::new(1);

// ============================================================================
// Logging
// ============================================================================

/// Installs a test subscriber honoring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// ============================================================================
// FakeWindow
// ============================================================================

/// A window that records what is posted to it.
pub struct FakeWindow {
    id: WindowId,
    closed: AtomicBool,
    posted: Mutex<Vec<(Value, String)>>,
}

impl FakeWindow {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            id: WindowId::new(NEXT_WINDOW_ID.fetch_add(1, Ordering::SeqCst)),
            closed: AtomicBool::new(false),
            posted: Mutex::new(Vec::new()),
        })
    }

    /// Everything posted so far, with target origins.
    pub fn posted(&self) -> Vec<(Value, String)> {
        self.posted.lock().clone()
    }

    /// Payloads posted so far.
    pub fn messages(&self) -> Vec<Value> {
        self.posted.lock().iter().map(|(m, _)| m.clone()).collect()
    }

    /// Payloads posted so far, excluding liveness pings.
    pub fn messages_without_pings(&self) -> Vec<Value> {
        self.messages()
            .into_iter()
            .filter(|m| m.get("func").and_then(Value::as_str) != Some("ping"))
            .collect()
    }

    pub fn clear(&self) {
        self.posted.lock().clear();
    }
}

impl BrowserWindow for FakeWindow {
    fn id(&self) -> WindowId {
        self.id
    }

    fn post_message(&self, message: &Value, target_origin: &str) {
        self.posted
            .lock()
            .push((message.clone(), target_origin.to_string()));
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// RecordingBridge
// ============================================================================

/// Native bridge that records serialized payloads.
#[derive(Default)]
pub struct RecordingBridge {
    payloads: Mutex<Vec<String>>,
}

impl RecordingBridge {
    pub fn payloads(&self) -> Vec<String> {
        self.payloads.lock().clone()
    }

    pub fn messages(&self) -> Vec<Value> {
        self.payloads
            .lock()
            .iter()
            .filter_map(|p| serde_json::from_str(p).ok())
            .collect()
    }
}

impl NativeBridge for RecordingBridge {
    fn post(&self, payload: &str) {
        self.payloads.lock().push(payload.to_string());
    }
}

// ============================================================================
// FakeEnvironment
// ============================================================================

/// The page the session runs in.
pub struct FakeEnvironment {
    pub current: Arc<FakeWindow>,
    pub parent: Option<Arc<FakeWindow>>,
    pub opener: Option<Arc<FakeWindow>>,
    pub origin: String,
    pub href: String,
    pub geometry: WindowGeometry,
    pub bridge: Option<Arc<RecordingBridge>>,
    /// Window returned by the next `open_window`; `None` simulates a blocker.
    pub popup: Mutex<Option<Arc<FakeWindow>>>,
    pub opened: Mutex<Vec<(String, String, String)>>,
    pub navigations: Mutex<Vec<String>>,
    pub listening: AtomicBool,
}

impl FakeEnvironment {
    fn base() -> Self {
        Self {
            current: FakeWindow::new(),
            parent: None,
            opener: None,
            origin: APP_ORIGIN.to_string(),
            href: APP_HREF.to_string(),
            geometry: WindowGeometry {
                outer_width: 1600,
                outer_height: 1000,
                screen_left: 0,
                screen_top: 0,
            },
            bridge: None,
            popup: Mutex::new(None),
            opened: Mutex::new(Vec::new()),
            navigations: Mutex::new(Vec::new()),
            listening: AtomicBool::new(false),
        }
    }

    /// A page embedded in a host frame.
    pub fn framed() -> Arc<Self> {
        Arc::new(Self {
            parent: Some(FakeWindow::new()),
            ..Self::base()
        })
    }

    /// A top-level popup opened by `opener`.
    pub fn popup_of(opener: Arc<FakeWindow>, origin: &str, href: &str) -> Arc<Self> {
        Arc::new(Self {
            opener: Some(opener),
            origin: origin.to_string(),
            href: href.to_string(),
            ..Self::base()
        })
    }

    /// A page with neither parent nor opener, optionally with a bridge.
    pub fn frameless(bridge: Option<Arc<RecordingBridge>>) -> Arc<Self> {
        Arc::new(Self {
            bridge,
            ..Self::base()
        })
    }

    pub fn host(&self) -> Arc<FakeWindow> {
        self.parent
            .clone()
            .or_else(|| self.opener.clone())
            .expect("environment has a parent")
    }

    pub fn set_popup(&self, popup: Option<Arc<FakeWindow>>) {
        *self.popup.lock() = popup;
    }

    pub fn opened(&self) -> Vec<(String, String, String)> {
        self.opened.lock().clone()
    }

    pub fn navigations(&self) -> Vec<String> {
        self.navigations.lock().clone()
    }

    pub fn is_listening(&self) -> bool {
        self.listening.load(Ordering::SeqCst)
    }
}

impl HostEnvironment for FakeEnvironment {
    fn current_window(&self) -> WindowRef {
        self.current.clone()
    }

    fn origin(&self) -> String {
        self.origin.clone()
    }

    fn href(&self) -> String {
        self.href.clone()
    }

    fn parent(&self) -> Option<WindowRef> {
        self.parent.clone().map(|w| w as WindowRef)
    }

    fn opener(&self) -> Option<WindowRef> {
        self.opener.clone().map(|w| w as WindowRef)
    }

    fn geometry(&self) -> WindowGeometry {
        self.geometry
    }

    fn open_window(&self, url: &str, target: &str, features: &str) -> Option<WindowRef> {
        self.opened
            .lock()
            .push((url.to_string(), target.to_string(), features.to_string()));
        self.popup.lock().clone().map(|w| w as WindowRef)
    }

    fn navigate(&self, url: &str) {
        self.navigations.lock().push(url.to_string());
    }

    fn native_bridge(&self) -> Option<Arc<dyn NativeBridge>> {
        self.bridge.clone().map(|b| b as Arc<dyn NativeBridge>)
    }

    fn set_message_listener(&self, enabled: bool) {
        self.listening.store(enabled, Ordering::SeqCst);
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Creates a session with default options.
pub fn session(env: &Arc<FakeEnvironment>) -> Session {
    init_tracing();
    Session::new(env.clone()).expect("default options are valid")
}

/// Delivers `data` from `source` at `origin`.
pub fn deliver(session: &Session, source: &Arc<FakeWindow>, origin: &str, data: Value) {
    session.process_message(MessageEvent::new(source.clone(), origin, data));
}

/// Request ID of the `index`-th message posted to `window`.
pub fn request_id(window: &FakeWindow, index: usize) -> u64 {
    window.messages()[index]["id"]
        .as_u64()
        .expect("message has a numeric id")
}

/// Answers the handshake so the session reaches `Ready` in `context`.
pub fn complete_handshake(session: &Session, env: &FakeEnvironment, context: &str, client: &str) {
    let host = env.host();
    let id = host
        .messages()
        .iter()
        .find(|m| m["func"] == "initialize")
        .and_then(|m| m["id"].as_u64())
        .expect("handshake was sent");
    deliver(
        session,
        &host,
        HOST_ORIGIN,
        serde_json::json!({ "id": id, "args": [context, client] }),
    );
}
