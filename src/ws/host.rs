//! Host-only command handlers
//!
//! The room transaction rejects these with `NOT_HOST` when the session player
//! does not hold the host seat.

use crate::protocol::ServerMessage;
use crate::state::{AppState, SettingsUpdate, StartOutcome};
use crate::types::{PlayerId, StartOptions};
use std::sync::Arc;

use super::session::Session;

fn start_reply(action: &str, outcome: StartOutcome) -> ServerMessage {
    match outcome {
        StartOutcome::Started => ServerMessage::ack(action),
        // The warning itself reaches everyone through the room snapshot
        StartOutcome::NeedsMorePlayers(_) => ServerMessage::ack("team_warning"),
    }
}

pub async fn handle_update_settings(
    state: &Arc<AppState>,
    session: &Session,
    settings: SettingsUpdate,
) -> Option<ServerMessage> {
    tracing::info!(room_id = %session.room_id, ?settings, "Host updating settings");
    match state
        .update_settings(&session.room_id, &session.player_id, settings)
        .await
    {
        Ok(()) => Some(ServerMessage::ack("update_settings")),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_start_game(
    state: &Arc<AppState>,
    session: &Session,
    options: StartOptions,
) -> Option<ServerMessage> {
    tracing::info!(room_id = %session.room_id, ?options, "Host starting game");
    match state
        .start_game(&session.room_id, &session.player_id, options)
        .await
    {
        Ok(outcome) => Some(start_reply("start_game", outcome)),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_rematch(state: &Arc<AppState>, session: &Session) -> Option<ServerMessage> {
    tracing::info!(room_id = %session.room_id, "Host requested rematch");
    match state.rematch(&session.room_id, &session.player_id).await {
        Ok(outcome) => Some(start_reply("rematch", outcome)),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_kick(
    state: &Arc<AppState>,
    session: &Session,
    target_id: PlayerId,
) -> Option<ServerMessage> {
    tracing::info!(room_id = %session.room_id, target_id = %target_id, "Host kicking player");
    match state
        .kick_player(&session.room_id, &session.player_id, &target_id)
        .await
    {
        Ok(()) => Some(ServerMessage::ack("kick_player")),
        Err(e) => Some(e.into()),
    }
}
