//! WebSocket upgrade handler and per-connection session loop.
//!
//! Each accepted socket gets two tasks: the receive loop below, which hands
//! frames to the broadcaster in arrival order, and an outbound writer that
//! drains the connection's queue to the socket and sends keepalive pings.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use futures::{Sink, SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info, warn};

use chatrelay_realtime::connection::{ConnectionHandle, ConnectionId};
use chatrelay_realtime::message::Frame;
use chatrelay_realtime::server::RealtimeEngine;

use crate::state::AppState;

/// GET / and GET /ws: WebSocket upgrade
pub async fn ws_upgrade(State(state): State<AppState>, ws: WebSocketUpgrade) -> Response {
    if state.realtime.is_shutting_down() {
        return StatusCode::SERVICE_UNAVAILABLE.into_response();
    }

    let max_frame_bytes = state.realtime.config.max_frame_bytes;
    ws.max_message_size(max_frame_bytes)
        .max_frame_size(max_frame_bytes)
        .on_upgrade(move |socket| handle_ws_connection(state.realtime, socket))
}

/// Handles an established WebSocket connection until it closes.
async fn handle_ws_connection(engine: Arc<RealtimeEngine>, socket: WebSocket) {
    let (ws_tx, mut ws_rx) = socket.split();

    let (handle, outbound_rx) = engine.registry.register();
    let conn_id = handle.id;

    let mut outbound_task = tokio::spawn(forward_outbound(
        engine.clone(),
        handle.clone(),
        outbound_rx,
        ws_tx,
    ));
    let mut writer_finished = false;
    let mut shutdown = engine.shutdown_receiver();

    // Registered after `close_all` already ran.
    if engine.is_shutting_down() {
        engine.registry.begin_close(&conn_id);
    }

    loop {
        tokio::select! {
            incoming = ws_rx.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    engine.broadcaster.handle_inbound(&conn_id, text.as_bytes()).await;
                }
                Some(Ok(Message::Binary(data))) => {
                    engine.broadcaster.handle_inbound(&conn_id, &data).await;
                }
                Some(Ok(Message::Close(_))) | None => break,
                // Pings are answered by axum; pongs only prove liveness.
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    warn!(conn_id = %conn_id, error = %e, "WebSocket error");
                    break;
                }
            },
            _ = &mut outbound_task => {
                writer_finished = true;
                break;
            }
            _ = shutdown.changed() => break,
        }
    }

    let user = handle.display_name().await;
    debug!(
        conn_id = %conn_id,
        user = %user,
        "Session closing"
    );
    engine.registry.begin_close(&conn_id);

    if !writer_finished {
        await_writer(&mut outbound_task, engine.config.close_grace(), &conn_id).await;
    }

    engine.registry.deregister(&conn_id);
}

/// Waits up to `grace` for the writer to flush and exit, aborting it
/// otherwise. Returns true when the writer finished on its own.
async fn await_writer(
    writer: &mut JoinHandle<()>,
    grace: Duration,
    conn_id: &ConnectionId,
) -> bool {
    if tokio::time::timeout(grace, &mut *writer).await.is_ok() {
        return true;
    }
    debug!(conn_id = %conn_id, "Outbound flush timed out, discarding queue");
    writer.abort();
    false
}

/// Drains a connection's outbound queue to the socket in enqueue order.
///
/// Once the connection leaves `Active`, frames already queued are flushed
/// and the sink is closed. A failed write deregisters immediately.
async fn forward_outbound<S>(
    engine: Arc<RealtimeEngine>,
    handle: Arc<ConnectionHandle>,
    mut outbound_rx: mpsc::Receiver<Frame>,
    mut ws_tx: S,
) where
    S: Sink<Message> + Unpin,
{
    let conn_id = handle.id;
    let mut state = handle.watch_state();
    let mut ping = engine.config.ping_interval().map(|period| {
        let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    });

    loop {
        if !handle.is_active() {
            break;
        }
        tokio::select! {
            biased;
            frame = outbound_rx.recv() => {
                let Some(frame) = frame else { break };
                if ws_tx.send(Message::Text(frame)).await.is_err() {
                    info!(conn_id = %conn_id, "Send failed, dropping connection");
                    engine.registry.deregister(&conn_id);
                    return;
                }
            }
            changed = state.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = next_ping(&mut ping) => {
                if ws_tx.send(Message::Ping(Bytes::new())).await.is_err() {
                    info!(conn_id = %conn_id, "Ping failed, dropping connection");
                    engine.registry.deregister(&conn_id);
                    return;
                }
            }
        }
    }

    // No new frames after this point; flush what was queued before closing.
    outbound_rx.close();
    while let Some(frame) = outbound_rx.recv().await {
        if ws_tx.send(Message::Text(frame)).await.is_err() {
            return;
        }
    }
    let _ = ws_tx.close().await;
}

async fn next_ping(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::Mutex;

    use chatrelay_core::config::RealtimeConfig;
    use chatrelay_realtime::connection::ConnectionState;

    type Sent = Arc<Mutex<Vec<Message>>>;

    /// Records every message; fails each write when `fail` is set.
    fn recording_sink(
        sent: Sent,
        fail: bool,
    ) -> impl Sink<Message, Error = io::Error> + Unpin + Send + 'static {
        Box::pin(futures::sink::unfold(sent, move |sent, msg: Message| async move {
            sent.lock().unwrap().push(msg);
            if fail {
                Err(io::Error::from(io::ErrorKind::BrokenPipe))
            } else {
                Ok(sent)
            }
        }))
    }

    /// Accepts the first write and never completes it.
    fn stalled_sink() -> impl Sink<Message, Error = io::Error> + Unpin + Send + 'static {
        Box::pin(futures::sink::unfold((), |(), _msg: Message| {
            std::future::pending::<io::Result<()>>()
        }))
    }

    fn engine(ping_interval_seconds: u64) -> Arc<RealtimeEngine> {
        Arc::new(RealtimeEngine::new(RealtimeConfig {
            ping_interval_seconds,
            ..RealtimeConfig::default()
        }))
    }

    fn texts(sent: &Sent) -> Vec<String> {
        sent.lock()
            .unwrap()
            .iter()
            .filter_map(|msg| match msg {
                Message::Text(text) => Some(text.to_string()),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn test_failed_write_deregisters_immediately() {
        let engine = engine(0);
        let (handle, outbound_rx) = engine.registry.register();
        engine.broadcaster.deliver("hello".into());
        let sent = Sent::default();

        forward_outbound(
            engine.clone(),
            handle.clone(),
            outbound_rx,
            recording_sink(sent.clone(), true),
        )
        .await;

        assert!(engine.registry.is_empty());
        assert_eq!(handle.state(), ConnectionState::Closed);
        assert_eq!(texts(&sent), vec!["hello"]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_ping_deregisters() {
        let engine = engine(1);
        let (handle, outbound_rx) = engine.registry.register();
        let sent = Sent::default();

        forward_outbound(
            engine.clone(),
            handle.clone(),
            outbound_rx,
            recording_sink(sent.clone(), true),
        )
        .await;

        assert!(engine.registry.is_empty());
        assert_eq!(handle.state(), ConnectionState::Closed);
        assert!(matches!(
            sent.lock().unwrap().as_slice(),
            [Message::Ping(_)]
        ));
    }

    #[tokio::test]
    async fn test_closing_writer_flushes_queue_in_order() {
        let engine = engine(0);
        let (handle, outbound_rx) = engine.registry.register();
        engine.broadcaster.deliver("a".into());
        engine.broadcaster.deliver("b".into());
        engine.registry.begin_close(&handle.id);
        let sent = Sent::default();

        let mut writer = tokio::spawn(forward_outbound(
            engine.clone(),
            handle.clone(),
            outbound_rx,
            recording_sink(sent.clone(), false),
        ));

        assert!(await_writer(&mut writer, Duration::from_secs(5), &handle.id).await);
        assert_eq!(texts(&sent), vec!["a", "b"]);
        // Removal is left to the session.
        assert_eq!(engine.registry.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stalled_flush_is_aborted_after_grace() {
        let engine = engine(0);
        let (handle, outbound_rx) = engine.registry.register();
        engine.broadcaster.deliver("stuck".into());

        let mut writer = tokio::spawn(forward_outbound(
            engine.clone(),
            handle.clone(),
            outbound_rx,
            stalled_sink(),
        ));
        engine.registry.begin_close(&handle.id);

        let flushed = await_writer(&mut writer, Duration::from_millis(200), &handle.id).await;

        assert!(!flushed);
        assert!(writer.await.is_err_and(|e| e.is_cancelled()));
    }
}
