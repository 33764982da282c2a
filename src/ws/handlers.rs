//! WebSocket message dispatch
//!
//! Entry point for every client message. Session binding is checked here;
//! host and phase rules are enforced by the room transactions themselves.

use crate::error::GameError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::state::{AppState, JoinRequest};
use std::sync::Arc;

use super::session::Session;
use super::{host, player, spy};

/// Return early with `NOT_JOINED` unless the socket is bound to a room
macro_rules! require_session {
    ($session:expr) => {
        match $session.as_ref() {
            Some(session) => session.clone(),
            None => return Some(GameError::NotJoined.into()),
        }
    };
}

/// Handle one client message and return the direct reply, if any.
///
/// `session` is updated in place by `join` and `leave`.
pub async fn handle_message(
    msg: ClientMessage,
    session: &mut Option<Session>,
    state: &Arc<AppState>,
) -> Option<ServerMessage> {
    if let Some(bound) = session.as_ref() {
        if !matches!(msg, ClientMessage::Join { .. } | ClientMessage::Leave) {
            if let Err(e) = state.touch(&bound.room_id, &bound.player_id).await {
                tracing::debug!(
                    room_id = %bound.room_id,
                    player_id = %bound.player_id,
                    "Heartbeat refresh failed: {}",
                    e
                );
            }
        }
    }

    match msg {
        // Connection messages
        ClientMessage::Join {
            room_id,
            name,
            account_id,
            device_id,
            password,
        } => {
            let request = JoinRequest {
                room_id,
                name,
                account_id,
                device_id,
                password,
            };
            player::handle_join(state, session, request).await
        }

        ClientMessage::Heartbeat => {
            require_session!(session);
            Some(ServerMessage::ack("heartbeat"))
        }

        ClientMessage::Leave => player::handle_leave(state, session).await,

        // Host commands
        ClientMessage::UpdateSettings { settings } => {
            let s = require_session!(session);
            host::handle_update_settings(state, &s, settings).await
        }

        ClientMessage::StartGame { options } => {
            let s = require_session!(session);
            host::handle_start_game(state, &s, options).await
        }

        ClientMessage::Rematch => {
            let s = require_session!(session);
            host::handle_rematch(state, &s).await
        }

        ClientMessage::KickPlayer { player_id } => {
            let s = require_session!(session);
            host::handle_kick(state, &s, player_id).await
        }

        // Word game
        ClientMessage::SubmitWord { word } => {
            let s = require_session!(session);
            player::handle_submit_word(state, &s, word).await
        }

        ClientMessage::Guess { target_id, value } => {
            let s = require_session!(session);
            player::handle_guess(state, &s, target_id, value).await
        }

        ClientMessage::SkipTurn => {
            let s = require_session!(session);
            player::handle_skip_turn(state, &s).await
        }

        // Spy mode
        ClientMessage::StartWordSpy {
            rounds,
            timer_seconds,
        } => {
            let s = require_session!(session);
            spy::handle_start(state, &s, rounds, timer_seconds).await
        }

        ClientMessage::SpyReady { ready } => {
            let s = require_session!(session);
            spy::handle_ready(state, &s, ready).await
        }

        ClientMessage::SpyBeginRound { force } => {
            let s = require_session!(session);
            spy::handle_begin_round(state, &s, force).await
        }

        ClientMessage::SpyEndPlaying => {
            let s = require_session!(session);
            spy::handle_end_playing(state, &s).await
        }

        ClientMessage::SpyVote { suspect_id } => {
            let s = require_session!(session);
            spy::handle_vote(state, &s, suspect_id).await
        }

        ClientMessage::SpyGuess { guess } => {
            let s = require_session!(session);
            spy::handle_guess(state, &s, guess).await
        }

        ClientMessage::SpyNextRound => {
            let s = require_session!(session);
            spy::handle_next_round(state, &s).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Phase;

    fn join(room: &str, name: &str, device: &str) -> ClientMessage {
        ClientMessage::Join {
            room_id: room.to_string(),
            name: name.to_string(),
            account_id: None,
            device_id: Some(device.to_string()),
            password: None,
        }
    }

    #[tokio::test]
    async fn test_messages_before_join_are_rejected() {
        let state = Arc::new(AppState::new());
        let mut session = None;

        let reply = handle_message(ClientMessage::SkipTurn, &mut session, &state).await;
        assert!(matches!(reply, Some(ServerMessage::Error { ref code, .. }) if code == "NOT_JOINED"));

        let reply = handle_message(ClientMessage::Heartbeat, &mut session, &state).await;
        assert!(matches!(reply, Some(ServerMessage::Error { ref code, .. }) if code == "NOT_JOINED"));
    }

    #[tokio::test]
    async fn test_join_binds_session() {
        let state = Arc::new(AppState::new());
        let mut session = None;

        let reply = handle_message(join("R1", "alice", "p1"), &mut session, &state).await;
        let Some(ServerMessage::Joined {
            player_id,
            is_host,
            token,
            ..
        }) = reply
        else {
            panic!("expected joined, got {reply:?}");
        };
        assert_eq!(player_id, "p1");
        assert!(is_host);

        let bound = session.clone().unwrap();
        assert_eq!(bound.room_id, "R1");
        assert_eq!(bound.player_id, "p1");
        assert_eq!(bound.token, token);
        assert_eq!(state.tokens.verify(&token).unwrap().player_id, "p1");
    }

    #[tokio::test]
    async fn test_wrong_password_leaves_session_unbound() {
        let state = Arc::new(AppState::new());
        let mut host = None;
        handle_message(join("R1", "alice", "p1"), &mut host, &state).await;
        state
            .update_settings(
                "R1",
                "p1",
                crate::state::SettingsUpdate {
                    password: Some("pw".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        let mut session = None;
        let reply = handle_message(join("R1", "bob", "p2"), &mut session, &state).await;
        assert!(matches!(reply, Some(ServerMessage::Error { ref code, .. }) if code == "WRONG_PASSWORD"));
        assert!(session.is_none());
    }

    #[tokio::test]
    async fn test_non_host_start_is_rejected() {
        let state = Arc::new(AppState::new());
        let mut alice = None;
        let mut bob = None;
        handle_message(join("R1", "alice", "p1"), &mut alice, &state).await;
        handle_message(join("R1", "bob", "p2"), &mut bob, &state).await;

        let reply = handle_message(
            ClientMessage::StartGame {
                options: Default::default(),
            },
            &mut bob,
            &state,
        )
        .await;
        assert!(matches!(reply, Some(ServerMessage::Error { ref code, .. }) if code == "NOT_HOST"));
        assert_eq!(state.get_room("R1").await.unwrap().phase, Phase::Lobby);
    }

    #[tokio::test]
    async fn test_leave_clears_session() {
        let state = Arc::new(AppState::new());
        let mut alice = None;
        let mut bob = None;
        handle_message(join("R1", "alice", "p1"), &mut alice, &state).await;
        handle_message(join("R1", "bob", "p2"), &mut bob, &state).await;

        let reply = handle_message(ClientMessage::Leave, &mut bob, &state).await;
        assert!(matches!(reply, Some(ServerMessage::Ack { .. })));
        assert!(bob.is_none());
        assert!(!state.get_room("R1").await.unwrap().players.contains_key("p2"));
    }
}
