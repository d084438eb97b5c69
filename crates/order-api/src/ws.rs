//! WebSocket streaming of a session's view models

use axum::extract::ws::{Message, WebSocket};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use order_tracker::{TrackingSession, TrackingViewModel};
use std::fmt::Display;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, error, info, warn};

/// Forward every view model of `session` to the socket
pub async fn stream_session(socket: WebSocket, session: Arc<TrackingSession>) {
    let order = session.order_number().clone();
    let (mut sender, mut receiver) = socket.split();
    info!(order = %order, "WebSocket client connected");

    forward_views(&mut sender, &mut receiver, &session).await;

    info!(order = %order, "WebSocket client disconnected");
}

/// Send the current view, then every published one.
///
/// Ends after a terminal view, when the session is stopped or when the
/// client goes away.
async fn forward_views<S, R>(sender: &mut S, receiver: &mut R, session: &TrackingSession)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
    R: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    let order = session.order_number().clone();

    // Subscribe before reading the current view so nothing is missed in between
    let mut views = session.subscribe();
    let stopped = session.stop_signal();

    if let Some(view) = session.view_model() {
        let terminal = view.is_terminal();
        if send_view(sender, &view).await.is_err() || terminal {
            let _ = sender.send(Message::Close(None)).await;
            return;
        }
    }

    loop {
        tokio::select! {
            _ = stopped.cancelled() => {
                debug!(order = %order, "Session stopped, closing stream");
                let _ = sender.send(Message::Close(None)).await;
                break;
            }
            result = views.recv() => {
                match result {
                    Ok(view) => {
                        if let Err(e) = send_view(sender, &view).await {
                            error!(order = %order, error = %e, "Failed to send view model");
                            break;
                        }
                        if view.is_terminal() {
                            debug!(order = %order, "Terminal view sent, closing stream");
                            let _ = sender.send(Message::Close(None)).await;
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(order = %order, skipped = n, "WebSocket client lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(Message::Text(text))) => {
                        debug!(order = %order, message = %text.as_str(), "Ignoring client message");
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        warn!(order = %order, error = %e, "WebSocket receive error");
                        break;
                    }
                }
            }
        }
    }
}

async fn send_view<S>(sender: &mut S, view: &TrackingViewModel) -> anyhow::Result<()>
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    let json = serde_json::to_string(view)?;
    sender
        .send(Message::Text(json.into()))
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    Ok(())
}

// ============================================================================
// TESTS
// ============================================================================
