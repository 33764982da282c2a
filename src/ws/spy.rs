//! Spy sub-mode handlers

use crate::protocol::ServerMessage;
use crate::state::AppState;
use crate::types::PlayerId;
use std::sync::Arc;

use super::session::Session;

pub async fn handle_start(
    state: &Arc<AppState>,
    session: &Session,
    rounds: Option<u32>,
    timer_seconds: Option<u32>,
) -> Option<ServerMessage> {
    tracing::info!(room_id = %session.room_id, ?rounds, ?timer_seconds, "Host starting word spy");
    match state
        .start_word_spy(&session.room_id, &session.player_id, rounds, timer_seconds)
        .await
    {
        Ok(()) => Some(ServerMessage::ack("start_word_spy")),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_ready(
    state: &Arc<AppState>,
    session: &Session,
    ready: bool,
) -> Option<ServerMessage> {
    match state
        .spy_ready(&session.room_id, &session.player_id, ready)
        .await
    {
        Ok(_) => Some(ServerMessage::ack("spy_ready")),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_begin_round(
    state: &Arc<AppState>,
    session: &Session,
    force: bool,
) -> Option<ServerMessage> {
    match state
        .spy_begin_round(&session.room_id, &session.player_id, force)
        .await
    {
        Ok(()) => Some(ServerMessage::ack("spy_begin_round")),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_end_playing(state: &Arc<AppState>, session: &Session) -> Option<ServerMessage> {
    match state
        .spy_end_playing(&session.room_id, &session.player_id)
        .await
    {
        Ok(()) => Some(ServerMessage::ack("spy_end_playing")),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_vote(
    state: &Arc<AppState>,
    session: &Session,
    suspect_id: PlayerId,
) -> Option<ServerMessage> {
    match state
        .spy_vote(&session.room_id, &session.player_id, &suspect_id)
        .await
    {
        Ok(outcome) => Some(ServerMessage::SpyTally {
            tally: outcome.tally,
            resolution: outcome.resolution,
        }),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_guess(
    state: &Arc<AppState>,
    session: &Session,
    guess: String,
) -> Option<ServerMessage> {
    match state
        .spy_guess(&session.room_id, &session.player_id, &guess)
        .await
    {
        Ok(outcome) => Some(ServerMessage::SpyGuessResult { outcome }),
        Err(e) => Some(e.into()),
    }
}

pub async fn handle_next_round(state: &Arc<AppState>, session: &Session) -> Option<ServerMessage> {
    match state
        .spy_next_round(&session.room_id, &session.player_id)
        .await
    {
        Ok(_) => Some(ServerMessage::ack("spy_next_round")),
        Err(e) => Some(e.into()),
    }
}
