//! Integration tests for WebSocket connection and messaging.

mod helpers;

use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::json;

use chatrelay_core::config::AppConfig;
use tokio_tungstenite::tungstenite::Message;

use helpers::{TestApp, expect_no_message, recv_json, send_text};

#[tokio::test]
async fn test_three_clients_then_one_disconnects() {
    let app = TestApp::spawn().await;
    let mut a = app.connect().await;
    let mut b = app.connect().await;
    let mut c = app.connect().await;
    app.wait_for_connections(3).await;

    let before = now_ms();
    send_text(&mut a, r#"{"user":"Bob","text":"hi"}"#).await;

    for client in [&mut a, &mut b, &mut c] {
        let msg = recv_json(client).await;
        assert_eq!(msg["user"], "Bob");
        assert_eq!(msg["text"], "hi");
        assert!(msg["ts"].as_i64().unwrap() >= before);
        assert!(msg.get("type").is_none());
    }

    b.close(None).await.expect("close");
    app.wait_for_connections(2).await;

    send_text(&mut a, r#"{"user":"Bob","text":"still here?"}"#).await;
    assert_eq!(recv_json(&mut a).await["text"], "still here?");
    assert_eq!(recv_json(&mut c).await["text"], "still here?");
}

#[tokio::test]
async fn test_join_broadcast_has_no_text() {
    let app = TestApp::spawn().await;
    let mut a = app.connect().await;
    let mut b = app.connect().await;
    app.wait_for_connections(2).await;

    send_text(&mut a, r#"{"type":"join","user":"Alice","ts":123}"#).await;

    for client in [&mut a, &mut b] {
        let msg = recv_json(client).await;
        let ts = msg["ts"].as_i64().unwrap();
        assert_ne!(ts, 123);
        assert_eq!(msg, json!({"type": "join", "user": "Alice", "ts": ts}));
    }

    let names: Vec<String> = {
        let mut names = Vec::new();
        for handle in app.state.realtime.registry.snapshot() {
            names.push(handle.display_name().await);
        }
        names
    };
    assert!(names.contains(&"Alice".to_string()));
}

#[tokio::test]
async fn test_malformed_frame_relayed_and_sender_stays_connected() {
    let app = TestApp::spawn().await;
    let mut a = app.connect().await;
    let mut b = app.connect().await;
    app.wait_for_connections(2).await;

    send_text(&mut a, "hello").await;
    for client in [&mut a, &mut b] {
        let msg = recv_json(client).await;
        assert_eq!(msg["user"], "unknown");
        assert_eq!(msg["text"], "hello");
    }

    send_text(&mut a, r#"{"user":"A","text":"after"}"#).await;
    assert_eq!(recv_json(&mut b).await["text"], "after");
    assert_eq!(app.state.realtime.registry.len(), 2);
}

#[tokio::test]
async fn test_client_timestamp_is_replaced() {
    let app = TestApp::spawn().await;
    let mut a = app.connect().await;
    app.wait_for_connections(1).await;

    send_text(&mut a, r#"{"user":"A","text":"x","ts":1}"#).await;
    let msg = recv_json(&mut a).await;
    assert!(msg["ts"].as_i64().unwrap() > 1);
}

#[tokio::test]
async fn test_binary_frame_is_decoded_like_text() {
    let app = TestApp::spawn().await;
    let mut a = app.connect().await;
    app.wait_for_connections(1).await;

    a.send(Message::binary(br#"{"user":"Bin","text":"ary"}"#.to_vec()))
        .await
        .expect("send");
    let msg = recv_json(&mut a).await;
    assert_eq!(msg["user"], "Bin");
    assert_eq!(msg["text"], "ary");
}

#[tokio::test]
async fn test_disconnected_client_receives_nothing_more() {
    let app = TestApp::spawn().await;
    let mut a = app.connect().await;
    let b = app.connect().await;
    app.wait_for_connections(2).await;

    drop(b);
    app.wait_for_connections(1).await;

    send_text(&mut a, r#"{"user":"A","text":"solo"}"#).await;
    assert_eq!(recv_json(&mut a).await["text"], "solo");
    expect_no_message(&mut a, Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_large_chat_frame_is_relayed() {
    let app = TestApp::spawn().await;
    let mut a = app.connect().await;
    let mut b = app.connect().await;
    app.wait_for_connections(2).await;

    let text = "x".repeat(70_000);
    let frame = json!({"user": "A", "text": text}).to_string();
    send_text(&mut a, &frame).await;

    let msg = recv_json(&mut b).await;
    assert_eq!(msg["text"].as_str().map(str::len), Some(70_000));
    assert_eq!(recv_json(&mut a).await["user"], "A");
    assert_eq!(app.state.realtime.registry.len(), 2);
}

#[tokio::test]
async fn test_idle_client_receives_keepalive_ping() {
    let mut config = AppConfig::default();
    config.realtime.ping_interval_seconds = 1;
    let app = TestApp::spawn_with(config).await;
    let mut a = app.connect().await;
    app.wait_for_connections(1).await;

    let pinged = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match a.next().await {
                Some(Ok(Message::Ping(_))) => return true,
                Some(Ok(_)) => continue,
                _ => return false,
            }
        }
    })
    .await;
    assert!(matches!(pinged, Ok(true)), "no keepalive ping within 5s");
    assert_eq!(app.state.realtime.registry.len(), 1);
}

#[tokio::test]
async fn test_shutdown_closes_clients() {
    let mut app = TestApp::spawn().await;
    let mut a = app.connect().await;
    app.wait_for_connections(1).await;

    app.shutdown();

    let closed = tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match a.next().await {
                Some(Ok(Message::Close(_))) | None | Some(Err(_)) => break,
                Some(Ok(_)) => continue,
            }
        }
    })
    .await;
    assert!(closed.is_ok(), "client was not closed on shutdown");
    app.wait_for_connections(0).await;
}

fn now_ms() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .expect("clock after epoch")
        .as_millis() as i64
}
