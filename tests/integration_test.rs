use std::sync::Arc;
use wordmoney::protocol::{ClientMessage, ServerMessage};
use wordmoney::state::AppState;
use wordmoney::types::{GameMode, Phase, StartOptions, TimeoutKind, WordSpyState};
use wordmoney::ws::handlers::handle_message;
use wordmoney::ws::session::Session;

type Seat = Option<Session>;

async fn join(state: &Arc<AppState>, room: &str, name: &str, device: &str) -> Seat {
    let mut seat = None;
    let reply = handle_message(
        ClientMessage::Join {
            room_id: room.to_string(),
            name: name.to_string(),
            account_id: None,
            device_id: Some(device.to_string()),
            password: None,
        },
        &mut seat,
        state,
    )
    .await;
    assert!(
        matches!(reply, Some(ServerMessage::Joined { .. })),
        "join failed: {reply:?}"
    );
    seat
}

async fn send(state: &Arc<AppState>, seat: &mut Seat, msg: ClientMessage) -> ServerMessage {
    handle_message(msg, seat, state)
        .await
        .expect("every message gets a reply")
}

fn assert_ack(reply: &ServerMessage) {
    assert!(matches!(reply, ServerMessage::Ack { .. }), "expected ack, got {reply:?}");
}

fn assert_error(reply: &ServerMessage, expected: &str) {
    match reply {
        ServerMessage::Error { code, .. } => assert_eq!(code, expected),
        other => panic!("expected error {expected}, got {other:?}"),
    }
}

fn start(starter_bonus: bool, game_mode: Option<GameMode>) -> ClientMessage {
    ClientMessage::StartGame {
        options: StartOptions {
            starter_bonus,
            game_mode,
            ..StartOptions::default()
        },
    }
}

fn submit(word: &str) -> ClientMessage {
    ClientMessage::SubmitWord {
        word: word.to_string(),
    }
}

fn guess(target: &str, value: &str) -> ClientMessage {
    ClientMessage::Guess {
        target_id: target.to_string(),
        value: value.to_string(),
    }
}

/// Two-player game in room R1: alice (cat) against bob (dog)
#[tokio::test]
async fn test_two_player_game_flow() {
    let state = Arc::new(AppState::new());
    let mut alice = join(&state, "R1", "alice", "p1").await;
    let mut bob = join(&state, "R1", "bob", "p2").await;

    assert_ack(&send(&state, &mut alice, start(false, None)).await);
    let room = state.get_room("R1").await.unwrap();
    assert_eq!(room.phase, Phase::Submit);
    assert!(!room.open);

    // Off-theme words fail, animals pass
    assert_error(&send(&state, &mut alice, submit("table")).await, "INVALID_WORD");
    assert_ack(&send(&state, &mut alice, submit("Cat ")).await);
    assert_ack(&send(&state, &mut bob, submit("dog")).await);

    let room = state.get_room("R1").await.unwrap();
    assert_eq!(room.phase, Phase::Playing);
    assert_eq!(room.turn_order, vec!["p1", "p2"]);
    assert_eq!(room.players["p1"].wordmoney, Some(3));

    // Out of turn
    assert_error(&send(&state, &mut bob, guess("p1", "c")).await, "NOT_YOUR_TURN");

    let ServerMessage::GuessResult { outcome } = send(&state, &mut alice, guess("p2", "o")).await
    else {
        panic!("expected guess result");
    };
    assert!(outcome.correct);
    assert_eq!(outcome.count, 1);
    assert_eq!(outcome.next_turn.as_deref(), Some("p2"));

    let ServerMessage::GuessResult { outcome } = send(&state, &mut bob, guess("p1", "z")).await
    else {
        panic!("expected guess result");
    };
    assert!(!outcome.correct);

    // Alice already knows "o" is in bob's word
    assert_error(&send(&state, &mut alice, guess("p2", "o")).await, "ALREADY_GUESSED");

    let ServerMessage::GuessResult { outcome } = send(&state, &mut alice, guess("p2", "dog")).await
    else {
        panic!("expected guess result");
    };
    assert!(outcome.eliminated);
    assert!(outcome.game_over);

    let room = state.get_room("R1").await.unwrap();
    assert_eq!(room.phase, Phase::Ended);
    assert_eq!(room.winner_id.as_deref(), Some("p1"));
    // 2 starting + 1 turn bonus + 2 letter + 5 word
    assert_eq!(room.players["p1"].wordmoney, Some(10));
    assert_eq!(room.players["p2"].wordmoney, Some(2));
    assert_eq!(room.players["p2"].revealed.len(), 3);

    // Once ended every word is public
    let view = room.view_for(Some("p2"), chrono::Utc::now());
    let alice_view = view.players.iter().find(|p| p.id == "p1").unwrap();
    assert_eq!(alice_view.word.as_deref(), Some("cat"));

    // Rematch runs the same options again
    assert_error(&send(&state, &mut bob, ClientMessage::Rematch).await, "NOT_HOST");
    assert_ack(&send(&state, &mut alice, ClientMessage::Rematch).await);
    let room = state.get_room("R1").await.unwrap();
    assert_eq!(room.phase, Phase::Submit);
    assert_eq!(room.winner_id, None);
    assert_eq!(room.players["p1"].wordmoney, Some(2));
    assert!(room.players.values().all(|p| !p.has_word));
}

#[tokio::test]
async fn test_host_kicks_turn_holder() {
    let state = Arc::new(AppState::new());
    let mut alice = join(&state, "R1", "alice", "p1").await;
    let mut bob = join(&state, "R1", "bob", "p2").await;
    let mut carol = join(&state, "R1", "carol", "p3").await;

    assert_ack(&send(&state, &mut alice, start(false, None)).await);
    assert_ack(&send(&state, &mut alice, submit("cat")).await);
    assert_ack(&send(&state, &mut bob, submit("dog")).await);
    assert_ack(&send(&state, &mut carol, submit("cow")).await);

    // Pass the turn to bob with a miss
    send(&state, &mut alice, guess("p2", "z")).await;
    let room = state.get_room("R1").await.unwrap();
    assert_eq!(room.current_turn_player().map(String::as_str), Some("p2"));

    assert_error(
        &send(
            &state,
            &mut carol,
            ClientMessage::KickPlayer {
                player_id: "p2".to_string(),
            },
        )
        .await,
        "NOT_HOST",
    );
    assert_ack(
        &send(
            &state,
            &mut alice,
            ClientMessage::KickPlayer {
                player_id: "p2".to_string(),
            },
        )
        .await,
    );

    let room = state.get_room("R1").await.unwrap();
    assert!(!room.players.contains_key("p2"));
    assert_eq!(room.turn_order, vec!["p1", "p3"]);
    assert_eq!(room.current_turn_player().map(String::as_str), Some("p3"));
    assert!(room
        .timeouts
        .iter()
        .any(|t| t.kind == TimeoutKind::HostKick && t.player_id == "p2"));
    assert!(room.timeouts.iter().any(|t| t.kind == TimeoutKind::TurnSkipped
        && t.next_player_id.as_deref() == Some("p3")));

    // The kicked session is refused from now on
    assert_error(&send(&state, &mut bob, guess("p1", "c")).await, "NOT_YOUR_TURN");

    let ServerMessage::GuessResult { outcome } = send(&state, &mut carol, guess("p1", "c")).await
    else {
        panic!("expected guess result");
    };
    assert!(outcome.correct);
    assert_eq!(outcome.next_turn.as_deref(), Some("p1"));
}

#[tokio::test]
async fn test_host_leaving_passes_host_seat() {
    let state = Arc::new(AppState::new());
    let mut alice = join(&state, "R1", "alice", "p1").await;
    let mut bob = join(&state, "R1", "bob", "p2").await;
    let _carol = join(&state, "R1", "carol", "p3").await;

    assert_ack(&send(&state, &mut alice, ClientMessage::Leave).await);
    assert!(alice.is_none());

    let room = state.get_room("R1").await.unwrap();
    assert_eq!(room.host_id.as_deref(), Some("p2"));
    assert!(!room.players.contains_key("p1"));

    // The new host can start
    assert_ack(&send(&state, &mut bob, start(false, None)).await);
}

#[tokio::test]
async fn test_team_game_is_balanced_and_alternates() {
    let state = Arc::new(AppState::new());
    let names = ["ann", "ben", "cid", "dot", "eve"];
    let words = ["cat", "dog", "cow", "bat", "bee"];
    let mut seats = Vec::new();
    for (i, name) in names.iter().enumerate() {
        seats.push(join(&state, "R1", name, &format!("p{}", i + 1)).await);
    }

    assert_ack(
        &send(
            &state,
            &mut seats[0],
            start(false, Some(GameMode::LastTeamStanding)),
        )
        .await,
    );

    let room = state.get_room("R1").await.unwrap();
    let teams = room.teams.clone().expect("teams assigned");
    let sizes: Vec<usize> = teams.values().map(|t| t.initial_count).collect();
    assert_eq!(sizes.iter().sum::<usize>(), 5);
    assert!(sizes.contains(&3) && sizes.contains(&2));
    // 3 x 2 against 2 x 2 + one compensated head
    assert!(teams.values().all(|t| t.wordmoney == 6));
    assert!(room.players.values().all(|p| p.wordmoney.is_none()));

    for (seat, word) in seats.iter_mut().zip(words) {
        assert_ack(&send(&state, seat, submit(word)).await);
    }

    let room = state.get_room("R1").await.unwrap();
    assert_eq!(room.phase, Phase::Playing);
    let order_teams: Vec<String> = room
        .turn_order
        .iter()
        .map(|id| room.players[id].team.clone().unwrap())
        .collect();
    // Strict alternation while both teams still have players to place
    for pair in order_teams[..4].windows(2) {
        assert_ne!(pair[0], pair[1], "teams should alternate: {order_teams:?}");
    }

    // Credits from any member land in the team wallet
    let first = room.turn_order[0].clone();
    let first_team = room.players[&first].team.clone().unwrap();
    assert_eq!(room.teams.as_ref().unwrap()[&first_team].wordmoney, 7);
}

#[tokio::test]
async fn test_team_mode_needs_four_players() {
    let state = Arc::new(AppState::new());
    let mut alice = join(&state, "R1", "alice", "p1").await;
    let _bob = join(&state, "R1", "bob", "p2").await;
    let _carol = join(&state, "R1", "carol", "p3").await;

    let reply = send(&state, &mut alice, start(false, Some(GameMode::LastTeamStanding))).await;
    assert_ack(&reply);
    let room = state.get_room("R1").await.unwrap();
    assert_eq!(room.phase, Phase::Lobby);
    assert!(room.warning.is_some());

    // A fourth player clears the way
    let _dan = join(&state, "R1", "dan", "p4").await;
    assert_ack(&send(&state, &mut alice, start(false, Some(GameMode::LastTeamStanding))).await);
    let room = state.get_room("R1").await.unwrap();
    assert_eq!(room.phase, Phase::Submit);
    assert!(room.warning.is_none());
}

/// Three players in spy mode; returns (seats by id order, spy index)
async fn spy_room(state: &Arc<AppState>) -> (Vec<Seat>, usize) {
    let mut seats = vec![
        join(state, "R1", "alice", "p1").await,
        join(state, "R1", "bob", "p2").await,
        join(state, "R1", "carol", "p3").await,
    ];
    assert_ack(
        &send(
            state,
            &mut seats[0],
            ClientMessage::StartWordSpy {
                rounds: Some(1),
                timer_seconds: Some(60),
            },
        )
        .await,
    );
    let room = state.get_room("R1").await.unwrap();
    assert_eq!(room.phase, Phase::WordspyWait);
    let spy_id = room.word_spy.as_ref().unwrap().spy_id.clone();
    let spy = ["p1", "p2", "p3"].iter().position(|id| *id == spy_id).unwrap();

    for (i, seat) in seats.iter_mut().enumerate() {
        if i != spy {
            assert_ack(&send(state, seat, ClientMessage::SpyReady { ready: true }).await);
        }
    }
    let room = state.get_room("R1").await.unwrap();
    assert_eq!(room.phase, Phase::WordspyPlaying);

    assert_ack(&send(state, &mut seats[0], ClientMessage::SpyEndPlaying).await);
    (seats, spy)
}

fn id(i: usize) -> String {
    format!("p{}", i + 1)
}

#[tokio::test]
async fn test_spy_unmasked_then_guesses_word() {
    let state = Arc::new(AppState::new());
    let (mut seats, spy) = spy_room(&state).await;
    let others: Vec<usize> = (0..3).filter(|i| *i != spy).collect();
    let before = state.get_room("R1").await.unwrap();

    let reply = send(
        &state,
        &mut seats[others[0]],
        ClientMessage::SpyVote { suspect_id: id(spy) },
    )
    .await;
    assert!(matches!(reply, ServerMessage::SpyTally { .. }));
    let reply = send(
        &state,
        &mut seats[others[1]],
        ClientMessage::SpyVote { suspect_id: id(spy) },
    )
    .await;
    let ServerMessage::SpyTally { tally, .. } = reply else {
        panic!("expected tally");
    };
    assert_eq!(tally.majority_pick.as_deref(), Some(id(spy).as_str()));

    let room = state.get_room("R1").await.unwrap();
    assert_eq!(room.phase, Phase::WordspySpyguess);
    for voter in &others {
        assert_eq!(
            room.players[&id(*voter)].wordmoney,
            before.players[&id(*voter)].wordmoney.map(|m| m + 4)
        );
    }

    // Only the spy may guess, and only at the right length
    let word = room.word_spy.as_ref().unwrap().word.clone();
    assert_error(
        &send(
            &state,
            &mut seats[others[0]],
            ClientMessage::SpyGuess { guess: word.clone() },
        )
        .await,
        "NOT_SPY",
    );
    assert_error(
        &send(
            &state,
            &mut seats[spy],
            ClientMessage::SpyGuess {
                guess: format!("{word}x"),
            },
        )
        .await,
        "WRONG_LENGTH",
    );

    let ServerMessage::SpyGuessResult { outcome } =
        send(&state, &mut seats[spy], ClientMessage::SpyGuess { guess: word }).await
    else {
        panic!("expected spy guess result");
    };
    assert!(outcome.correct);
    assert_eq!(outcome.attempt, 1);
    assert_eq!(outcome.reward, 5);
    assert_eq!(outcome.state, WordSpyState::SpyWon);

    let room = state.get_room("R1").await.unwrap();
    assert_eq!(room.phase, Phase::WordspyReveal);
    assert_eq!(
        room.players[&id(spy)].wordmoney,
        before.players[&id(spy)].wordmoney.map(|m| m + 5)
    );

    // Last round: advancing ends the session
    assert_ack(&send(&state, &mut seats[0], ClientMessage::SpyNextRound).await);
    let room = state.get_room("R1").await.unwrap();
    assert_eq!(room.phase, Phase::Ended);
}

#[tokio::test]
async fn test_spy_escapes_wrong_majority() {
    let state = Arc::new(AppState::new());
    let (mut seats, spy) = spy_room(&state).await;
    let others: Vec<usize> = (0..3).filter(|i| *i != spy).collect();
    let (loyal, framed) = (others[0], others[1]);
    let before = state.get_room("R1").await.unwrap();

    // The framed player suspects the spy, everyone else points at them
    send(
        &state,
        &mut seats[framed],
        ClientMessage::SpyVote { suspect_id: id(spy) },
    )
    .await;
    send(
        &state,
        &mut seats[loyal],
        ClientMessage::SpyVote {
            suspect_id: id(framed),
        },
    )
    .await;
    let ServerMessage::SpyTally { resolution, .. } = send(
        &state,
        &mut seats[spy],
        ClientMessage::SpyVote {
            suspect_id: id(framed),
        },
    )
    .await
    else {
        panic!("expected tally");
    };
    assert_eq!(resolution, wordmoney::state::VoteResolution::SpyEscaped);

    let room = state.get_room("R1").await.unwrap();
    let session = room.word_spy.as_ref().unwrap();
    assert_eq!(session.state, WordSpyState::SpyWonByWrongGuess);
    let money = |r: &wordmoney::types::Room, i: usize| r.players[&id(i)].wordmoney.unwrap_or(0);
    assert_eq!(money(&room, spy), money(&before, spy) + 5);
    assert_eq!(money(&room, framed), money(&before, framed) + 3);
    assert_eq!(money(&room, loyal), money(&before, loyal));
}

#[tokio::test]
async fn test_snapshots_are_redacted_per_viewer() {
    let state = Arc::new(AppState::new());
    let mut alice = join(&state, "R1", "alice", "p1").await;
    let mut bob = join(&state, "R1", "bob", "p2").await;
    let handle = state.room_handle("R1").await.unwrap();
    let mut rx = handle.subscribe();

    send(&state, &mut alice, start(false, None)).await;
    send(&state, &mut alice, submit("cat")).await;
    send(&state, &mut bob, submit("dog")).await;

    let mut latest = rx.recv().await.unwrap();
    while let Ok(next) = rx.try_recv() {
        latest = next;
    }
    assert_eq!(latest.phase, Phase::Playing);

    let now = chrono::Utc::now();
    let bob_view = latest.view_for(Some("p2"), now);
    let alice_seen_by_bob = bob_view.players.iter().find(|p| p.id == "p1").unwrap();
    assert_eq!(alice_seen_by_bob.word, None);
    assert_eq!(alice_seen_by_bob.word_length, Some(3));
    let bob_self = bob_view.players.iter().find(|p| p.id == "p2").unwrap();
    assert_eq!(bob_self.word.as_deref(), Some("dog"));
    assert!(bob_self.private.is_some());

    let json = serde_json::to_string(&ServerMessage::Room {
        room: Box::new(bob_view),
    })
    .unwrap();
    assert!(!json.contains("\"cat\""));
}

#[tokio::test]
async fn test_rejoin_keeps_record() {
    let state = Arc::new(AppState::new());
    let mut alice = join(&state, "R1", "alice", "p1").await;
    let mut bob = join(&state, "R1", "bob", "p2").await;
    send(&state, &mut alice, start(false, None)).await;
    send(&state, &mut alice, submit("cat")).await;

    // A refresh re-attaches to the same record even though the room is closed
    let mut again = None;
    let reply = handle_message(
        ClientMessage::Join {
            room_id: "R1".to_string(),
            name: String::new(),
            account_id: None,
            device_id: Some("p1".to_string()),
            password: None,
        },
        &mut again,
        &state,
    )
    .await;
    let Some(ServerMessage::Joined {
        rejoined, is_host, ..
    }) = reply
    else {
        panic!("expected joined, got {reply:?}");
    };
    assert!(rejoined);
    assert!(is_host);

    let room = state.get_room("R1").await.unwrap();
    assert_eq!(room.players["p1"].name, "alice");
    assert_eq!(room.players["p1"].word.as_deref(), Some("cat"));

    // Strangers cannot join a game in progress
    let mut stranger = None;
    let reply = handle_message(
        ClientMessage::Join {
            room_id: "R1".to_string(),
            name: "mallory".to_string(),
            account_id: None,
            device_id: Some("p9".to_string()),
            password: None,
        },
        &mut stranger,
        &state,
    )
    .await;
    assert!(matches!(reply, Some(ServerMessage::Error { ref code, .. }) if code == "ROOM_CLOSED"));
    assert_ack(&send(&state, &mut bob, submit("dog")).await);
}
