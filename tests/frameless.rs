//! Frameless mode: the native bridge takes the parent's place.

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use frame_bridge::{AuthenticateParameters, FrameContext, HostClientType, Lifecycle};
use parking_lot::Mutex;
use serde_json::json;

use common::{FakeEnvironment, RecordingBridge};

#[test]
fn test_handshake_goes_to_native_bridge() {
    let bridge = Arc::new(RecordingBridge::default());
    let env = FakeEnvironment::frameless(Some(bridge.clone()));
    let session = common::session(&env);

    session.initialize(&[], |_| {}).expect("initialize");

    assert!(session.is_frameless());
    assert_eq!(bridge.payloads().len(), 1);
    assert_eq!(
        bridge.messages(),
        vec![json!({ "id": 0, "func": "initialize", "args": ["2.0.1"] })]
    );
    assert!(!env.is_listening());
}

#[test]
fn test_explicit_origins_enable_listening() {
    let env = FakeEnvironment::frameless(Some(Arc::new(RecordingBridge::default())));
    let session = common::session(&env);

    session
        .initialize(&["https://partner.example.org"], |_| {})
        .expect("initialize");

    assert!(env.is_listening());
}

#[test]
fn test_native_reply_completes_handshake() {
    let bridge = Arc::new(RecordingBridge::default());
    let env = FakeEnvironment::frameless(Some(bridge.clone()));
    let session = common::session(&env);
    let context = Arc::new(Mutex::new(None));

    let sink = Arc::clone(&context);
    session
        .initialize(&[], move |c| *sink.lock() = Some(c))
        .expect("initialize");
    session.receive_native_message(r#"{"id":0,"args":["content","android"]}"#);

    assert_eq!(session.lifecycle(), Lifecycle::Ready);
    let context = context.lock().clone().expect("completion fired");
    assert_eq!(context.frame_context, Some(FrameContext::Content));
    assert_eq!(context.host_client_type, Some(HostClientType::Android));
}

#[test]
fn test_messages_go_straight_to_bridge() {
    let bridge = Arc::new(RecordingBridge::default());
    let env = FakeEnvironment::frameless(Some(bridge.clone()));
    let session = common::session(&env);
    session.initialize(&[], |_| {}).expect("initialize");

    session.send("app.loaded", vec![json!({ "ready": true })]);

    assert_eq!(
        bridge.messages()[1],
        json!({ "func": "app.loaded", "args": [{ "ready": true }] })
    );
    assert_eq!(session.queued_messages(frame_bridge::PeerRole::Parent), 0);
}

#[test]
fn test_missing_bridge_drops_messages() {
    let env = FakeEnvironment::frameless(None);
    let session = common::session(&env);

    session.initialize(&[], |_| {}).expect("initialize");
    session.send("app.loaded", vec![]);

    assert_eq!(session.lifecycle(), Lifecycle::Initializing);
    assert_eq!(session.queued_messages(frame_bridge::PeerRole::Parent), 0);
}

#[test]
fn test_native_messages_ignored_before_initialize() {
    let env = FakeEnvironment::frameless(Some(Arc::new(RecordingBridge::default())));
    let session = common::session(&env);
    let calls = Arc::new(AtomicUsize::new(0));

    let sink = Arc::clone(&calls);
    session.on("themeChange", move |_| {
        sink.fetch_add(1, Ordering::SeqCst);
        None
    });
    session.receive_native_message(r#"{"func":"themeChange","args":["dark"]}"#);

    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_native_request_runs_handler() {
    let env = FakeEnvironment::frameless(Some(Arc::new(RecordingBridge::default())));
    let session = common::session(&env);
    session.initialize(&[], |_| {}).expect("initialize");
    let calls = Arc::new(AtomicUsize::new(0));

    let sink = Arc::clone(&calls);
    session.on("themeChange", move |args| {
        assert_eq!(args, [json!("dark")]);
        sink.fetch_add(1, Ordering::SeqCst);
        None
    });

    session.receive_native_message("not json");
    session.receive_native_message(r#"{"unrelated":true}"#);
    session.receive_native_message(r#"{"func":"themeChange","args":["dark"]}"#);

    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_native_authentication_round_trip() -> anyhow::Result<()> {
    let bridge = Arc::new(RecordingBridge::default());
    let env = FakeEnvironment::frameless(Some(bridge.clone()));
    let session = common::session(&env);
    session.initialize(&[], |_| {})?;
    session.receive_native_message(r#"{"id":0,"args":["content","ios"]}"#);

    let outcome = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&outcome);
    session
        .authenticate(AuthenticateParameters::new("/auth/start").width(400), move |result| {
            *sink.lock() = Some(result);
        })?;

    let request = bridge.messages()[1].clone();
    assert_eq!(request["func"], "authentication.authenticate");
    assert_eq!(request["args"][0], "https://app.contoso.com/auth/start");
    assert_eq!(request["args"][1], 400);

    let id = request["id"]
        .as_u64()
        .ok_or_else(|| anyhow::anyhow!("request has no id"))?;
    session.receive_native_message(&format!(r#"{{"id":{id},"args":[true,"native-token"]}}"#));

    assert_eq!(outcome.lock().clone(), Some(Ok("native-token".to_string())));
    assert!(env.opened().is_empty());
    Ok(())
}
