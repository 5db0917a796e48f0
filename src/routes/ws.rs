// WebSocket handlers: streaming poll, one message per device as it answers, then "done"

use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{Duration, timeout};

use super::AppState;
use crate::hub::{DeviceGroup, HubServices};
use crate::models::StreamEvent;

pub(super) const WS_SEND_TIMEOUT: Duration = Duration::from_secs(10);

pub(super) async fn ws_sockets(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    upgrade(ws, state.services, DeviceGroup::Sockets)
}

pub(super) async fn ws_lights(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
) -> impl IntoResponse {
    upgrade(ws, state.services, DeviceGroup::Lights)
}

fn upgrade(
    ws: WebSocketUpgrade,
    services: Arc<HubServices>,
    group: DeviceGroup,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| async move {
        if let Err(e) = stream_poll(socket, services, group).await {
            tracing::info!("{} stream error: {}", group.as_str(), e);
        }
    })
}

async fn stream_poll(
    mut socket: WebSocket,
    services: Arc<HubServices>,
    group: DeviceGroup,
) -> anyhow::Result<()> {
    tracing::info!("Client connected to {} stream", group.as_str());
    let devices = services.devices(group).len();
    let (tx, mut rx) = mpsc::channel::<StreamEvent>(devices.max(1) + 1);

    let poller = services.clone();
    let poll = tokio::spawn(async move {
        poller
            .poller
            .poll_streaming(poller.devices(group), tx)
            .await;
    });

    while let Some(event) = rx.recv().await {
        let json = serde_json::to_string(&event)?;
        let r = timeout(WS_SEND_TIMEOUT, socket.send(Message::Text(json.into()))).await;
        if r.is_err() || r.unwrap_or(Ok(())).is_err() {
            break;
        }
    }
    drop(rx);
    if let Err(e) = poll.await {
        tracing::warn!(error = %e, group = group.as_str(), "streaming poll task failed");
    }
    let _ = socket.send(Message::Close(None)).await;
    Ok(())
}
