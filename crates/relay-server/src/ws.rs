//! WebSocket endpoint: upgrade, per-connection read/write loops.
//!
//! Each connection gets an outbound mpsc channel. The pipeline writes
//! frames into it; the writer task serializes them onto the socket. The
//! read loop feeds raw text payloads to the pipeline's ingress half. A
//! socket write failure is a transport failure — the pipeline shuts down
//! and both loops exit.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use futures::{SinkExt, StreamExt};
use metrics::counter;
use relay_core::frames::OutboundFrame;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::state::AppState;

/// Outbound frame buffer per connection. Streaming stays responsive while
/// the pipeline never runs unboundedly ahead of a slow socket.
const OUTBOUND_BUFFER: usize = 64;

/// `GET /ws/chat/{session_id}` — upgrade and run the session connection.
pub async fn chat_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, session_id, state))
}

#[instrument(skip(socket, state), fields(session_id, conn_id = tracing::field::Empty))]
async fn handle_socket(socket: WebSocket, session_id: String, state: AppState) {
    let conn_id = format!("conn_{}", Uuid::now_v7());
    tracing::Span::current().record("conn_id", conn_id.as_str());
    counter!("ws_connections_total").increment(1);
    info!("websocket connected");

    let (outbound_tx, mut outbound_rx) = mpsc::channel::<OutboundFrame>(OUTBOUND_BUFFER);
    let pipeline = match state.table.connect(&session_id, outbound_tx).await {
        Ok(pipeline) => pipeline,
        Err(e) => {
            error!(error = %e, "failed to attach session");
            let mut socket = socket;
            let _ = socket.send(Message::Close(None)).await;
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();

    // Writer: outbound frames → socket. Exits on pipeline teardown or a
    // failed socket write (which itself triggers teardown).
    let writer_pipeline = Arc::clone(&pipeline);
    let writer = tokio::spawn(async move {
        loop {
            let frame = tokio::select! {
                () = writer_pipeline.cancelled() => break,
                frame = outbound_rx.recv() => match frame {
                    Some(frame) => frame,
                    None => break,
                },
            };
            let json = match serde_json::to_string(&frame) {
                Ok(json) => json,
                Err(e) => {
                    warn!(error = %e, "failed to serialize outbound frame");
                    continue;
                }
            };
            if sink.send(Message::Text(json.into())).await.is_err() {
                debug!("socket write failed, shutting session down");
                writer_pipeline.shutdown();
                break;
            }
        }
        let _ = sink.close().await;
    });

    // Reader: socket → pipeline ingress. Exits on close, socket error, or
    // pipeline teardown (takeover, transport failure).
    loop {
        let msg = tokio::select! {
            () = pipeline.cancelled() => break,
            msg = stream.next() => match msg {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => {
                    debug!(error = %e, "socket read failed");
                    break;
                }
                None => break,
            },
        };
        match msg {
            Message::Text(text) => {
                if let Err(e) = pipeline.submit(&text).await {
                    debug!(error = %e, "stopping read loop");
                    break;
                }
            }
            Message::Close(_) => break,
            // Pings are answered by axum; binary and pong frames carry
            // nothing for the pipeline.
            _ => {}
        }
    }

    state.table.disconnect(&pipeline);
    counter!("ws_disconnections_total").increment(1);
    let _ = writer.await;
    info!("websocket disconnected");
}
