//! Chat relay integration tests over real WebSocket connections.
//!
//! Each test binds the router to an ephemeral port and talks to it with
//! tokio-tungstenite clients.

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use inkwell_core::config::RelayScope;
use inkwell_core::InkwellConfig;
use inkwell_server::http::{serve, HttpState};
use inkwell_server::subsystems::relay::spawn_relay;
use serde_json::{json, Value};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Start relay + HTTP server; returns the base ws url and the shutdown sender.
async fn start_server(scope: RelayScope) -> (String, broadcast::Sender<()>) {
    let (shutdown_tx, _) = broadcast::channel(1);
    let mut config = InkwellConfig::default();
    config.relay.scope = scope;

    let (relay, _task) = spawn_relay(&config.relay, shutdown_tx.subscribe());
    let state = HttpState {
        config,
        relay,
        assistant: None,
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = shutdown_tx.subscribe();
    tokio::spawn(async move {
        serve(listener, state, shutdown).await.unwrap();
    });

    (format!("ws://{}/chat", addr), shutdown_tx)
}

async fn connect(url: &str) -> Client {
    let (ws, _) = connect_async(url).await.unwrap();
    ws
}

/// Next JSON text frame, failing the test after a second of silence.
async fn next_frame(ws: &mut Client) -> Value {
    loop {
        let msg = tokio::time::timeout(Duration::from_secs(1), ws.next())
            .await
            .expect("timed out waiting for frame")
            .expect("stream ended")
            .unwrap();
        if let Message::Text(text) = msg {
            return serde_json::from_str(&text).unwrap();
        }
    }
}

/// Assert nothing arrives within a short window.
async fn assert_silent(ws: &mut Client) {
    let result = tokio::time::timeout(Duration::from_millis(200), ws.next()).await;
    assert!(result.is_err(), "expected no frame, got {:?}", result);
}

async fn send(ws: &mut Client, body: Value) {
    ws.send(Message::Text(body.to_string())).await.unwrap();
}

// ===========================================================================
// TEST 1: Greeting on connect
// ===========================================================================
#[tokio::test]
async fn test_greeting_on_connect() {
    let (url, _shutdown) = start_server(RelayScope::Global).await;
    let mut a = connect(&url).await;

    let frame = next_frame(&mut a).await;
    assert_eq!(frame["type"], "system");
    assert_eq!(frame["message"], "Connected to collaboration chat");
    assert!(frame["timestamp"].is_string());
}

// ===========================================================================
// TEST 2: Both clients receive a message, sender included
// ===========================================================================
#[tokio::test]
async fn test_broadcast_reaches_all_clients() {
    let (url, _shutdown) = start_server(RelayScope::Global).await;
    let mut a = connect(&url).await;
    let mut b = connect(&url).await;
    next_frame(&mut a).await;
    next_frame(&mut b).await;

    send(&mut a, json!({ "message": "hi", "user": "ana", "collaborationId": "c1" })).await;

    for ws in [&mut a, &mut b] {
        let frame = next_frame(ws).await;
        assert_eq!(frame["type"], "message");
        assert_eq!(frame["user"], "ana");
        assert_eq!(frame["message"], "hi");
        assert_eq!(frame["collaborationId"], "c1");
    }
}

// ===========================================================================
// TEST 3: Malformed payload gets exactly one error frame
// ===========================================================================
#[tokio::test]
async fn test_malformed_payload_answered_to_sender_only() {
    let (url, _shutdown) = start_server(RelayScope::Global).await;
    let mut a = connect(&url).await;
    let mut b = connect(&url).await;
    next_frame(&mut a).await;
    next_frame(&mut b).await;

    a.send(Message::Text("{{ nope".to_string())).await.unwrap();

    let frame = next_frame(&mut a).await;
    assert_eq!(frame["type"], "error");
    assert_eq!(frame["message"], "Failed to process message");
    assert_silent(&mut a).await;
    assert_silent(&mut b).await;

    // The connection survives.
    send(&mut a, json!({ "message": "after error" })).await;
    assert_eq!(next_frame(&mut b).await["user"], "Anonymous");
}

// ===========================================================================
// TEST 4: A closed client is dropped from the broadcast set
// ===========================================================================
#[tokio::test]
async fn test_closed_client_is_forgotten() {
    let (url, _shutdown) = start_server(RelayScope::Global).await;
    let mut a = connect(&url).await;
    let mut b = connect(&url).await;
    next_frame(&mut a).await;
    next_frame(&mut b).await;

    b.close(None).await.unwrap();
    drop(b);

    send(&mut a, json!({ "message": "anyone there?" })).await;
    assert_eq!(next_frame(&mut a).await["message"], "anyone there?");
}

// ===========================================================================
// TEST 5: Room scope keeps messages inside the room
// ===========================================================================
#[tokio::test]
async fn test_room_scope_over_websocket() {
    let (url, _shutdown) = start_server(RelayScope::Room).await;
    let mut a = connect(&format!("{}?collaborationId=r1", url)).await;
    let mut b = connect(&format!("{}?collaborationId=r1", url)).await;
    let mut c = connect(&format!("{}?collaborationId=r2", url)).await;
    for ws in [&mut a, &mut b, &mut c] {
        next_frame(ws).await;
    }

    send(&mut a, json!({ "message": "r1 only", "collaborationId": "r1" })).await;

    assert_eq!(next_frame(&mut a).await["message"], "r1 only");
    assert_eq!(next_frame(&mut b).await["message"], "r1 only");
    assert_silent(&mut c).await;
}
