//! Per-viewer handler: attach to the hub, pump frames out, route input in.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::hub::Hub;
use crate::protocol::ClientFrame;

/// Handle a single viewer WebSocket until either side closes it.
pub async fn handle_viewer(
    socket: WebSocket,
    addr: SocketAddr,
    hub: Arc<Hub>,
    shutdown: CancellationToken,
) {
    let (mut sink, mut stream) = socket.split();

    // 1. Register; the queue already holds the catch-up frames.
    let (viewer_id, mut rx) = hub.attach().await;
    tracing::info!(peer = %addr, viewer = %viewer_id, "Viewer connected");

    // 2. Keystrokes are forwarded by their own task, in arrival order, so
    //    slow multiplexer calls never stall outbound frames.
    let (input_tx, mut input_rx) = mpsc::unbounded_channel::<(String, String)>();
    let input_hub = hub.clone();
    let input_task = tokio::spawn(async move {
        while let Some((session, text)) = input_rx.recv().await {
            input_hub.route_input(&session, &text).await;
        }
    });

    // 3. Forwarding loop.
    loop {
        tokio::select! {
            _ = shutdown.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                break;
            }

            // Hub frames → this viewer's WebSocket
            Some(frame) = rx.recv() => {
                if let Err(e) = sink.send(Message::Text(frame.into())).await {
                    tracing::debug!(viewer = %viewer_id, error = %e, "Frame send failed");
                }
            }

            // Viewer frames → multiplexer
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => match ClientFrame::parse(text.as_str()) {
                        Some(ClientFrame::Input { id, content }) => {
                            let _ = input_tx.send((id, content));
                        }
                        None => {
                            tracing::debug!(viewer = %viewer_id, "Ignoring malformed frame");
                        }
                    },
                    Some(Ok(Message::Ping(data))) => {
                        let _ = sink.send(Message::Pong(data)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(peer = %addr, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    // 4. Cleanup: leave the registry before the socket is dropped.
    hub.detach(&viewer_id).await;
    drop(input_tx);
    let _ = input_task.await;

    tracing::info!(peer = %addr, viewer = %viewer_id, "Viewer disconnected");
}
