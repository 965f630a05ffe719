//! # Observer WebSocket
//!
//! `GET /api/v1/research/:id/ws` attaches the socket to the progress relay.
//! Relay messages go out as JSON text frames; `ping` frames get a `pong`.
//! After `keepalive_interval` without traffic a keepalive frame is sent.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, State,
    },
    response::Response,
};
use futures::{stream::SplitSink, SinkExt, StreamExt};
use scout_core::relay::ObserverMessage;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

use super::{ApiError, SharedState};

pub async fn observe(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
    Path(task_id): Path<String>,
) -> Result<Response, ApiError> {
    if state.coordinator.get_status(&task_id).await.is_none() {
        return Err(ApiError::NotFound(format!("task {} not found", task_id)));
    }
    Ok(ws.on_upgrade(move |socket| handle_socket(socket, state, task_id)))
}

async fn send(sink: &mut SplitSink<WebSocket, Message>, message: &ObserverMessage) -> Result<(), axum::Error> {
    sink.send(Message::Text(message.to_json())).await
}

async fn handle_socket(socket: WebSocket, state: SharedState, task_id: String) {
    let mut observer = state.relay.attach(&task_id);
    let observer_id = observer.id;
    tracing::info!(task_id = %task_id, observer = observer_id, "observer connected");

    let (mut sink, mut stream) = socket.split();
    let period = state.relay.config().keepalive_interval();
    let mut keepalive = interval_at(Instant::now() + period, period);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            message = observer.recv() => match message {
                Some(message) => {
                    if send(&mut sink, &message).await.is_err() {
                        break;
                    }
                    keepalive.reset();
                }
                // Relay let go: task finished or upstream gave up
                None => break,
            },
            frame = stream.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    if let Some(reply) = state.relay.handle_client_message(&task_id, observer_id, &text) {
                        if send(&mut sink, &reply).await.is_err() {
                            break;
                        }
                    }
                }
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                Some(Ok(_)) => {}
            },
            _ = keepalive.tick() => {
                if send(&mut sink, &ObserverMessage::keepalive(&task_id)).await.is_err() {
                    break;
                }
            }
        }
    }

    state.relay.detach(&task_id, observer_id);
    let _ = sink.close().await;
    tracing::info!(task_id = %task_id, observer = observer_id, "observer disconnected");
}
