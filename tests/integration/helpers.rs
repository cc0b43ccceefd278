//! Shared test helpers for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};

use chatrelay_api::AppState;
use chatrelay_core::config::AppConfig;

/// A connected test client.
pub type WsClient = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// How long a test waits for an expected frame.
const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// A relay server bound to an ephemeral local port.
pub struct TestApp {
    /// Bound address
    pub addr: SocketAddr,
    /// State shared with the running server
    pub state: AppState,
    /// Fires the server's shutdown signal
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl TestApp {
    /// Start a server with default configuration
    pub async fn spawn() -> Self {
        let mut config = AppConfig::default();
        config.realtime.close_grace_ms = 200;
        Self::spawn_with(config).await
    }

    /// Start a server with the given configuration
    pub async fn spawn_with(config: AppConfig) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind test listener");
        let addr = listener.local_addr().expect("Failed to read local addr");

        let state = AppState::new(config);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let server_state = state.clone();
        tokio::spawn(async move {
            chatrelay_api::serve(listener, server_state, async move {
                let _ = shutdown_rx.await;
            })
            .await
            .expect("Server failed");
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Open a WebSocket connection to the relay root path
    pub async fn connect(&self) -> WsClient {
        let (ws, _) = connect_async(format!("ws://{}/", self.addr))
            .await
            .expect("Failed to connect");
        ws
    }

    /// Wait until the registry holds exactly `count` connections
    pub async fn wait_for_connections(&self, count: usize) {
        let registry = self.state.realtime.registry.clone();
        tokio::time::timeout(RECV_TIMEOUT, async {
            while registry.len() != count {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| {
            panic!(
                "Expected {count} connections, registry has {}",
                registry.len()
            )
        });
    }

    /// Trigger graceful shutdown
    pub fn shutdown(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Send a text frame
pub async fn send_text(ws: &mut WsClient, text: &str) {
    ws.send(Message::text(text.to_string()))
        .await
        .expect("Failed to send frame");
}

/// Receive the next text frame as JSON, skipping control frames
pub async fn recv_json(ws: &mut WsClient) -> Value {
    let next = tokio::time::timeout(RECV_TIMEOUT, async {
        loop {
            match ws.next().await {
                Some(Ok(Message::Text(text))) => {
                    return serde_json::from_str::<Value>(text.as_str())
                        .expect("Server sent invalid JSON");
                }
                Some(Ok(Message::Ping(_) | Message::Pong(_))) => continue,
                other => panic!("Expected a text frame, got {other:?}"),
            }
        }
    })
    .await;
    next.expect("Timed out waiting for a frame")
}

/// Assert that no text frame arrives within `window`
pub async fn expect_no_message(ws: &mut WsClient, window: Duration) {
    if let Ok(Some(Ok(Message::Text(text)))) = tokio::time::timeout(window, ws.next()).await {
        panic!("Unexpected frame: {}", text.as_str());
    }
}
