//! Player message handlers
//!
//! Joining and leaving a room plus the word-game actions of a seated player.

use crate::protocol::ServerMessage;
use crate::state::{AppState, JoinRequest};
use crate::types::PlayerId;
use std::sync::Arc;

use super::session::Session;

pub async fn handle_join(
    state: &Arc<AppState>,
    session: &mut Option<Session>,
    request: JoinRequest,
) -> Option<ServerMessage> {
    tracing::info!(room_id = %request.room_id, name = %request.name, "Join request");
    match state.join_room(request).await {
        Ok(joined) => {
            *session = Some(Session {
                room_id: joined.room_id.clone(),
                player_id: joined.player_id.clone(),
                token: joined.token.clone(),
            });
            Some(ServerMessage::Joined {
                room_id: joined.room_id,
                player_id: joined.player_id,
                token: joined.token,
                is_host: joined.is_host,
                rejoined: joined.rejoined,
            })
        }
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_leave(
    state: &Arc<AppState>,
    session: &mut Option<Session>,
) -> Option<ServerMessage> {
    let Some(bound) = session.take() else {
        return Some(ServerMessage::ack("leave"));
    };
    tracing::info!(room_id = %bound.room_id, player_id = %bound.player_id, "Player leaving");
    match state.leave_room(&bound.room_id, &bound.player_id).await {
        Ok(()) => Some(ServerMessage::ack("leave")),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_submit_word(
    state: &Arc<AppState>,
    session: &Session,
    word: String,
) -> Option<ServerMessage> {
    match state
        .submit_word(&session.room_id, &session.player_id, &word)
        .await
    {
        Ok(_) => Some(ServerMessage::ack("submit_word")),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_guess(
    state: &Arc<AppState>,
    session: &Session,
    target_id: PlayerId,
    value: String,
) -> Option<ServerMessage> {
    match state
        .submit_guess(&session.room_id, &session.player_id, &target_id, &value)
        .await
    {
        Ok(outcome) => Some(ServerMessage::GuessResult { outcome }),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_skip_turn(state: &Arc<AppState>, session: &Session) -> Option<ServerMessage> {
    match state.skip_turn(&session.room_id, &session.player_id).await {
        Ok(()) => Some(ServerMessage::ack("skip_turn")),
        Err(e) => Some(e.into()),
    }
}
