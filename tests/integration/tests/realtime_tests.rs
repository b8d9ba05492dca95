//! Realtime client integration tests
//!
//! Drive the connection manager over real WebSocket sockets against a
//! loopback server.
//!
//! Run with: cargo test -p integration-tests --test realtime_tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use integration_tests::{channel_listener, connect_open, next_event, wait_until, TestServer};
use serde_json::json;
use spark_common::RealtimeConfig;
use spark_realtime::{ConnectionManager, ConnectionState};
use tokio::net::TcpListener;

// ============================================================================
// Connect
// ============================================================================

#[tokio::test]
async fn test_connect_passes_subject_in_query() {
    let mut server = TestServer::start().await.unwrap();
    let manager = ConnectionManager::with_websocket(server.config()).unwrap();

    let socket = connect_open(&mut server, &manager, "alice").await.unwrap();

    assert_eq!(socket.url.path(), "/ws");
    assert_eq!(socket.query_param("userID").as_deref(), Some("alice"));
    assert_eq!(manager.state(), ConnectionState::Open);
    manager.disconnect();
}

#[tokio::test]
async fn test_subject_is_percent_encoded() {
    let mut server = TestServer::start().await.unwrap();
    let manager = ConnectionManager::with_websocket(server.config()).unwrap();

    let socket = connect_open(&mut server, &manager, "a b&c").await.unwrap();

    assert_eq!(socket.query_param("userID").as_deref(), Some("a b&c"));
    manager.disconnect();
}

// ============================================================================
// Inbound and outbound frames
// ============================================================================

#[tokio::test]
async fn test_inbound_events_reach_listener_in_order() {
    let mut server = TestServer::start().await.unwrap();
    let manager = ConnectionManager::with_websocket(server.config()).unwrap();
    let (listener, mut events) = channel_listener();
    manager.add_listener(listener);

    let mut socket = connect_open(&mut server, &manager, "alice").await.unwrap();

    socket
        .send_json(&json!({"type": "message", "chat_id": "c1", "content": "hi"}))
        .await
        .unwrap();
    socket.send_text("{not json").await.unwrap();
    socket
        .send_json(&json!({"type": "typing", "chat_id": "c1", "user_id": "bob"}))
        .await
        .unwrap();

    let first = next_event(&mut events).await.unwrap();
    let second = next_event(&mut events).await.unwrap();
    assert_eq!(first["type"], "message");
    assert_eq!(second["type"], "typing");
    assert!(manager.is_connected());
    manager.disconnect();
}

#[tokio::test]
async fn test_outbound_actions_use_wire_envelope() {
    let mut server = TestServer::start().await.unwrap();
    let manager = ConnectionManager::with_websocket(server.config()).unwrap();
    let mut socket = connect_open(&mut server, &manager, "alice").await.unwrap();

    assert!(manager.send_message("c1", "hello"));
    assert!(manager.send_typing("c1", true));
    assert!(manager.subscribe("c2"));

    assert_eq!(
        socket.recv_json().await.unwrap(),
        Some(json!({"action": "message", "chat_id": "c1", "content": "hello"}))
    );
    assert_eq!(
        socket.recv_json().await.unwrap(),
        Some(json!({"action": "typing", "chat_id": "c1", "is_typing": true}))
    );
    assert_eq!(
        socket.recv_json().await.unwrap(),
        Some(json!({"action": "subscribe", "chat_id": "c2"}))
    );
    manager.disconnect();
}

#[tokio::test]
async fn test_heartbeat_is_sent_periodically() {
    let mut server = TestServer::start().await.unwrap();
    let config = RealtimeConfig {
        heartbeat_interval_ms: 100,
        ..server.config()
    };
    let manager = ConnectionManager::with_websocket(config).unwrap();
    let mut socket = connect_open(&mut server, &manager, "alice").await.unwrap();

    let heartbeat = json!({"action": "heartbeat", "is_online": true});
    assert_eq!(socket.recv_json().await.unwrap(), Some(heartbeat.clone()));
    assert_eq!(socket.recv_json().await.unwrap(), Some(heartbeat));
    manager.disconnect();
}

// ============================================================================
// Reconnect and disconnect
// ============================================================================

#[tokio::test]
async fn test_reconnects_after_server_close() {
    let mut server = TestServer::start().await.unwrap();
    let manager = ConnectionManager::with_websocket(server.config()).unwrap();
    let (listener, mut events) = channel_listener();
    manager.add_listener(listener);

    let socket = connect_open(&mut server, &manager, "alice").await.unwrap();
    socket.close().await.unwrap();

    wait_until(|| manager.state() == ConnectionState::ReconnectPending)
        .await
        .unwrap();
    assert!(!manager.send_message("c1", "dropped"));

    let mut socket = server.accept().await.unwrap();
    assert_eq!(socket.query_param("userID").as_deref(), Some("alice"));
    wait_until(|| manager.is_connected()).await.unwrap();

    socket
        .send_json(&json!({"type": "presence", "user_id": "bob"}))
        .await
        .unwrap();
    assert_eq!(next_event(&mut events).await.unwrap()["type"], "presence");
    manager.disconnect();
}

#[tokio::test]
async fn test_disconnect_closes_socket_without_reconnect() {
    let mut server = TestServer::start().await.unwrap();
    let manager = ConnectionManager::with_websocket(server.config()).unwrap();
    let mut socket = connect_open(&mut server, &manager, "alice").await.unwrap();

    manager.disconnect();
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert_eq!(socket.recv_json().await.unwrap(), None);

    let reconnect_window = Duration::from_millis(server.config().reconnect_delay_ms * 3);
    assert!(server.try_accept(reconnect_window).await.is_none());
    assert!(!manager.send_message("c1", "late"));
}

#[tokio::test]
async fn test_shutdown_sends_close_frame() {
    let mut server = TestServer::start().await.unwrap();
    let manager = ConnectionManager::with_websocket(server.config()).unwrap();
    let mut socket = connect_open(&mut server, &manager, "alice").await.unwrap();

    assert!(manager.shutdown(Duration::from_secs(2)).await);
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    assert!(socket.closed_cleanly().await.unwrap());
}

#[tokio::test]
async fn test_failed_handshakes_keep_retrying() {
    // Accepts TCP and hangs up before the WebSocket handshake.
    let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();
    let attempts = Arc::new(AtomicUsize::new(0));
    let counter = attempts.clone();
    let refuser = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });

    let config = RealtimeConfig {
        reconnect_delay_ms: 50,
        ..RealtimeConfig::new(format!("ws://{addr}/ws"))
    };
    let manager = ConnectionManager::with_websocket(config).unwrap();
    manager.connect("alice");

    wait_until(|| attempts.load(Ordering::SeqCst) >= 3).await.unwrap();
    assert!(!manager.is_connected());
    assert_eq!(manager.subject_id().as_deref(), Some("alice"));

    manager.disconnect();
    assert_eq!(manager.state(), ConnectionState::Disconnected);
    let settled = attempts.load(Ordering::SeqCst);
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(attempts.load(Ordering::SeqCst) <= settled + 1);
    refuser.abort();
}
