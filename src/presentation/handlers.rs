// HTTP request handlers
use crate::infrastructure::chunked_frames::stream_from_receiver;
use crate::infrastructure::http_response::{accepts_brotli, json_list_response};
use crate::presentation::app_state::AppState;
use axum::{
    extract::{
        Path, Query, State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

#[derive(Deserialize)]
pub struct ReplayQuery {
    pub interval_ms: Option<u64>,
}

/// Selection command sent by live clients
#[derive(Debug, Deserialize)]
pub struct SelectCommand {
    pub select: Option<String>,
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// List the vehicles available for replay
pub async fn list_vehicles(headers: HeaderMap, State(state): State<Arc<AppState>>) -> Response {
    let compress = accepts_brotli(&headers);

    match state.vehicle_service.list_vehicles().await {
        Ok(vehicles) => match json_list_response(vehicles, compress).await {
            Ok(response) => response,
            Err(status) => status.into_response(),
        },
        Err(e) => {
            tracing::warn!("Error fetching vehicles: {}", e);
            (StatusCode::SERVICE_UNAVAILABLE, e.to_string()).into_response()
        }
    }
}

/// Replay one vehicle as a chunked frame stream
pub async fn stream_replay(
    Path(id): Path<String>,
    Query(query): Query<ReplayQuery>,
    headers: HeaderMap,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    let compress = accepts_brotli(&headers);
    let interval = query.interval_ms.map(Duration::from_millis);

    let rx = state.streaming_service.stream_replay(&id, interval);
    stream_from_receiver(rx, compress).await
}

/// Live dashboard driven by the client's vehicle selection
pub async fn live_dashboard(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| live_socket(socket, state))
}

async fn live_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut outgoing, mut incoming) = socket.split();
    let (selection_tx, selection_rx) = watch::channel(None);
    let mut frames = state.streaming_service.live_session(selection_rx);

    let forward = async {
        while let Some(msg) = frames.recv().await {
            let text = match serde_json::to_string(&msg) {
                Ok(text) => text,
                Err(e) => {
                    tracing::warn!("Dropping {} frame: {}", msg.kind(), e);
                    continue;
                }
            };
            if outgoing.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    };

    let listen = async {
        while let Some(Ok(message)) = incoming.next().await {
            match message {
                Message::Text(text) => match serde_json::from_str::<SelectCommand>(&text) {
                    Ok(command) => {
                        tracing::debug!("Live selection: {:?}", command.select);
                        selection_tx.send_replace(command.select);
                    }
                    Err(e) => tracing::warn!("Ignoring malformed command: {}", e),
                },
                Message::Close(_) => break,
                _ => {}
            }
        }
    };

    // Either side closing ends the session; dropping the selection sender
    // stops the replay loop.
    tokio::select! {
        _ = forward => {}
        _ = listen => {}
    }
}
