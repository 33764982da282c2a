use chrono::{DateTime, Utc};

use crate::protocol::{PlayerView, PrivateView, RoomView, WordSpyView, TIMEOUTS_IN_VIEW};
use crate::types::*;

impl Room {
    /// Render the snapshot one player is allowed to see. `None` is an
    /// outside observer with no private access.
    pub fn view_for(&self, viewer: Option<&str>, now: DateTime<Utc>) -> RoomView {
        let viewer_player = viewer.and_then(|id| self.players.get(id));
        let viewer_is_host = viewer.is_some_and(|id| self.is_host(id));
        let votes_public = self.word_spy.as_ref().is_some_and(|s| s.state.is_revealed());

        let players = self
            .players_in_join_order()
            .into_iter()
            .map(|p| {
                let own = viewer == Some(p.id.as_str());
                let word_visible = own || p.eliminated || self.phase == Phase::Ended;
                PlayerView {
                    id: p.id.clone(),
                    name: p.name.clone(),
                    color: p.color.clone(),
                    is_host: self.is_host(&p.id),
                    has_word: p.has_word,
                    word_length: p.word.as_ref().map(|w| w.chars().count()),
                    word: if word_visible { p.word.clone() } else { None },
                    wordmoney: p.wordmoney,
                    revealed: p.revealed.clone(),
                    guessed_by: p.guessed_by.clone(),
                    eliminated: p.eliminated,
                    team: p.team.clone(),
                    last_seen: p.last_seen,
                    stale: p.stale,
                    present: p.present,
                    frozen: p.frozen,
                    starter_bonus_awarded: p.starter_bonus_awarded,
                    word_spy_ready: p.word_spy_ready,
                    word_spy_voted: p.word_spy_vote.is_some(),
                    word_spy_vote: if votes_public || own {
                        p.word_spy_vote.clone()
                    } else {
                        None
                    },
                    word_spy_guesses: p.word_spy_guesses.clone(),
                    private: own.then(|| PrivateView::from(p)),
                }
            })
            .collect();

        let word_spy = self.word_spy.as_ref().map(|session| {
            let is_spy = viewer == Some(session.spy_id.as_str());
            let revealed = session.state.is_revealed();
            let unmasked = revealed || session.state == WordSpyState::SpyGuess;
            WordSpyView {
                word: if revealed || !is_spy {
                    Some(session.word.clone())
                } else {
                    None
                },
                word_length: session.word.chars().count(),
                spy_id: if unmasked || is_spy {
                    Some(session.spy_id.clone())
                } else {
                    None
                },
                is_spy,
                timer_seconds: session.timer_seconds,
                rounds_remaining: session.rounds_remaining,
                current_round: session.current_round,
                state: session.state,
                playing_started_at: session.playing_started_at,
                voting_started_at: session.voting_started_at,
                last_tally: session.last_tally.clone(),
                last_reveal: session.last_reveal.clone(),
                revealed: session.revealed.clone(),
                reveal_sequence: session.reveal_sequence.clone(),
                last_round_summary: session.last_round_summary.clone(),
                round_results: session.round_results.clone(),
            }
        });

        let skip = self.timeouts.len().saturating_sub(TIMEOUTS_IN_VIEW);

        RoomView {
            id: self.id.clone(),
            version: self.version,
            server_now: now,
            viewer_id: viewer_player.map(|p| p.id.clone()),
            host_id: self.host_id.clone(),
            phase: self.phase,
            open: self.open,
            has_password: self.password.is_some(),
            password: if viewer_is_host {
                self.password.clone()
            } else {
                None
            },
            players,
            teams: self.teams.clone(),
            turn_order: self.turn_order.clone(),
            current_turn_index: self.current_turn_index,
            current_turn_player: self.current_turn_player().cloned(),
            current_turn_started_at: self.current_turn_started_at,
            timed: self.timed,
            turn_timeout_seconds: self.turn_timeout_seconds,
            game_mode: self.game_mode,
            starting_money: self.starting_money,
            starter_bonus: self.starter_bonus.clone(),
            secret_word_theme: self.secret_word_theme.clone(),
            word_spy,
            ghost_challenge: if viewer_player.is_some_and(|p| p.eliminated) {
                self.ghost_challenge.clone()
            } else {
                None
            },
            timeouts: self.timeouts[skip..].to_vec(),
            winner_id: self.winner_id.clone(),
            winner_team: self.winner_team.clone(),
            warning: self.warning.clone(),
        }
    }
}
