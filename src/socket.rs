use crate::error::PollError;
use crate::ingress::Role;
use crate::protocol::{ServerMessage, request_id};
use crate::sse::PollEvent;
use crate::startup::AppState;
use axum::{
    extract::{
        Extension, Query,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures::stream::SplitSink;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::error::RecvError;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

#[derive(Debug, Deserialize)]
pub struct SocketParams {
    pub admin_token: Option<String>,
}

pub async fn socket_handler(
    ws: WebSocketUpgrade,
    Extension(app_state): Extension<AppState>,
    Query(params): Query<SocketParams>,
) -> impl IntoResponse {
    let role = app_state
        .reset_policy
        .role_for(params.admin_token.as_deref());
    ws.on_upgrade(move |socket| {
        let connection_id = Uuid::new_v4();
        handle_socket(socket, app_state, role)
            .instrument(info_span!("socket", %connection_id, ?role))
    })
}

async fn send_frame(
    sender: &mut SplitSink<WebSocket, Message>,
    frame: &ServerMessage,
) -> Result<(), PollError> {
    let text =
        serde_json::to_string(frame).map_err(|e| PollError::TransportUnavailable(e.to_string()))?;
    sender
        .send(Message::Text(text))
        .await
        .map_err(|e| PollError::TransportUnavailable(e.to_string()))
}

async fn handle_socket(socket: WebSocket, app_state: AppState, role: Role) {
    let ingress = app_state.ingress;
    let (mut sender, mut receiver) = socket.split();

    let (current, mut rx) = ingress.subscribe().await;
    info!("socket connected");
    if let Err(e) = send_frame(&mut sender, &ServerMessage::TallyUpdate(current)).await {
        warn!("connect-time push failed: {e}");
        return;
    }

    loop {
        let outgoing = tokio::select! {
            event = rx.recv() => match event {
                Ok(PollEvent::TallyUpdate(tally)) => ServerMessage::TallyUpdate(tally),
                Ok(PollEvent::CooldownClear) => ServerMessage::CooldownClear {},
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "socket observer lagged, resynchronising");
                    let (current, fresh) = ingress.subscribe().await;
                    rx = fresh;
                    ServerMessage::TallyUpdate(current)
                }
                Err(RecvError::Closed) => break,
            },
            frame = receiver.next() => match frame {
                Some(Ok(Message::Text(text))) => {
                    let id = request_id(&text);
                    match ingress.handle_raw(text.as_bytes(), role).await {
                        Ok(tally) => ServerMessage::Accepted { id, tally },
                        Err(e) => ServerMessage::rejected(id, &e),
                    }
                }
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => continue,
                Some(Err(e)) => {
                    warn!("socket read failed: {e}");
                    break;
                }
            },
        };

        if let Err(e) = send_frame(&mut sender, &outgoing).await {
            warn!("dropping socket: {e}");
            break;
        }
    }

    debug!("socket closed");
}
