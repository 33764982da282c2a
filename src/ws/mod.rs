pub mod handlers;
mod host;
mod player;
pub mod session;
mod spy;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::IntoResponse,
};
use futures::{
    sink::SinkExt,
    stream::{SplitSink, StreamExt},
};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::protocol::{ClientMessage, ServerMessage, PROTOCOL_VERSION};
use crate::state::AppState;
use crate::types::{Room, RoomId};
use session::Session;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    tracing::debug!("WebSocket connection request");
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

type Sender = SplitSink<WebSocket, Message>;

async fn send(sender: &mut Sender, msg: &ServerMessage) -> bool {
    match serde_json::to_string(msg) {
        Ok(json) => sender.send(Message::Text(json.into())).await.is_ok(),
        Err(e) => {
            tracing::error!("Failed to serialize server message: {}", e);
            true
        }
    }
}

/// Render a snapshot for this socket's player
fn snapshot_for(room: &Room, session: Option<&Session>) -> ServerMessage {
    let viewer = session.map(|s| s.player_id.as_str());
    ServerMessage::Room {
        room: Box::new(room.view_for(viewer, chrono::Utc::now())),
    }
}

/// Handle individual WebSocket connection
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (mut sender, mut receiver) = socket.split();

    let welcome = ServerMessage::Welcome {
        protocol: PROTOCOL_VERSION.to_string(),
        server_now: chrono::Utc::now().to_rfc3339(),
        heartbeat_interval_ms: state.config.heartbeat_interval.as_millis() as u64,
    };
    if !send(&mut sender, &welcome).await {
        tracing::error!("Failed to send welcome message");
        return;
    }

    let mut session: Option<Session> = None;
    let mut subscribed_to: Option<RoomId> = None;
    let mut room_rx: Option<broadcast::Receiver<Arc<Room>>> = None;

    loop {
        tokio::select! {
            // Snapshots of the bound room
            update = async {
                match &mut room_rx {
                    Some(rx) => rx.recv().await,
                    None => std::future::pending::<Result<Arc<Room>, RecvError>>().await,
                }
            } => {
                let room = match update {
                    Ok(room) => room,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::debug!(skipped, "Snapshot receiver lagged, resyncing");
                        let current = match subscribed_to.as_deref() {
                            Some(room_id) => state.get_room(room_id).await,
                            None => None,
                        };
                        match current {
                            Some(room) => Arc::new(room),
                            None => continue,
                        }
                    }
                    Err(RecvError::Closed) => {
                        // Room was deleted
                        room_rx = None;
                        subscribed_to = None;
                        continue;
                    }
                };

                let still_seated = session
                    .as_ref()
                    .is_some_and(|s| room.players.contains_key(&s.player_id));
                if !send(&mut sender, &snapshot_for(&room, session.as_ref())).await {
                    break;
                }
                if !still_seated && session.is_some() {
                    tracing::info!(room_id = %room.id, "Session player removed from room");
                    session = None;
                    room_rx = None;
                    subscribed_to = None;
                    let notice = ServerMessage::Error {
                        code: "REMOVED".to_string(),
                        msg: "You are no longer in this room".to_string(),
                    };
                    if !send(&mut sender, &notice).await {
                        break;
                    }
                }
            }

            // Handle client messages
            ws_msg = receiver.next() => {
                match ws_msg {
                    Some(Ok(Message::Text(text))) => {
                        tracing::debug!("Received message: {}", text);

                        let reply = match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                handlers::handle_message(client_msg, &mut session, &state).await
                            }
                            Err(e) => {
                                tracing::warn!("Failed to parse client message: {}", e);
                                Some(ServerMessage::Error {
                                    code: "PARSE_ERROR".to_string(),
                                    msg: format!("Invalid message format: {}", e),
                                })
                            }
                        };
                        if let Some(reply) = reply {
                            if !send(&mut sender, &reply).await {
                                tracing::error!("Failed to send response");
                                break;
                            }
                        }

                        // Follow the session into a newly joined room
                        let bound_room = session.as_ref().map(|s| s.room_id.clone());
                        if bound_room != subscribed_to {
                            room_rx = None;
                            subscribed_to = None;
                            if let Some(room_id) = bound_room {
                                if let Some(handle) = state.room_handle(&room_id).await {
                                    room_rx = Some(handle.subscribe());
                                    subscribed_to = Some(room_id.clone());
                                }
                                if let Some(room) = state.get_room(&room_id).await {
                                    if !send(&mut sender, &snapshot_for(&room, session.as_ref())).await {
                                        break;
                                    }
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) => {
                        tracing::info!("WebSocket closed");
                        break;
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sender.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        tracing::error!("WebSocket error: {}", e);
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    // Disconnects are left to the liveness sweeper so a refresh can re-attach
    match session {
        Some(s) => tracing::info!(room_id = %s.room_id, player_id = %s.player_id, "WebSocket connection closed"),
        None => tracing::info!("WebSocket connection closed"),
    }
}
