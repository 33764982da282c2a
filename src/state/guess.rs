use chrono::{DateTime, Utc};
use serde::Serialize;

use super::AppState;
use crate::error::{GameError, GameResult};
use crate::types::*;

/// Result of one processed guess, as reported back to the guesser
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuessOutcome {
    pub target_id: PlayerId,
    #[serde(rename = "type")]
    pub kind: GuessKind,
    pub value: String,
    pub correct: bool,
    /// Occurrences of a correct letter in the target word
    pub count: usize,
    pub reward: u32,
    pub eliminated: bool,
    pub next_turn: Option<PlayerId>,
    pub game_over: bool,
}

struct ParsedGuess {
    kind: GuessKind,
    value: String,
}

fn parse_guess(raw: &str) -> GameResult<ParsedGuess> {
    let value = raw.trim().to_lowercase();
    if value.is_empty() {
        return Err(GameError::Malformed("empty guess".to_string()));
    }
    if !value.chars().all(|c| c.is_ascii_lowercase()) {
        return Err(GameError::Malformed("guesses may only contain letters a-z".to_string()));
    }
    let kind = if value.chars().count() == 1 {
        GuessKind::Letter
    } else {
        GuessKind::Word
    };
    Ok(ParsedGuess { kind, value })
}

fn push_unique<T: PartialEq>(list: &mut Vec<T>, item: T) {
    if !list.contains(&item) {
        list.push(item);
    }
}

impl Room {
    /// Preconditions, in order; any failure leaves the room untouched
    fn validate_guess(&self, from: &str, target: &str, raw: &str) -> GameResult<ParsedGuess> {
        self.require_phase(&[Phase::Playing])?;
        if self.current_turn_player().map(String::as_str) != Some(from) {
            return Err(GameError::NotYourTurn);
        }
        if from == target {
            return Err(GameError::SelfGuess);
        }
        if !self.players.contains_key(from) {
            return Err(GameError::PlayerNotFound);
        }
        let target_player = self.players.get(target).ok_or(GameError::PlayerNotFound)?;
        if target_player.word.is_none() {
            return Err(GameError::NoWord);
        }
        if target_player.eliminated {
            return Err(GameError::Eliminated);
        }
        parse_guess(raw)
    }

    /// Whether this exact letter or word was already resolved for the
    /// guesser/target pair, from public reveals or the guesser's own history
    pub fn already_guessed(&self, from: &str, target: &str, raw: &str) -> bool {
        let (Some(guesser), Some(target_player), Ok(guess)) = (
            self.players.get(from),
            self.players.get(target),
            parse_guess(raw),
        ) else {
            return false;
        };

        match guess.kind {
            GuessKind::Letter => {
                let Some(letter) = guess.value.chars().next() else {
                    return false;
                };
                target_player.revealed.contains(&letter)
                    || guesser
                        .private_wrong
                        .get(target)
                        .is_some_and(|l| l.contains(&letter))
                    || guesser
                        .private_power_reveals
                        .get(target)
                        .is_some_and(|l| l.contains(&letter))
                    || guesser.private_hits.get(target).is_some_and(|hits| {
                        hits.iter()
                            .any(|h| matches!(h, PrivateHit::Letter { letter: l, .. } if *l == letter))
                    })
            }
            GuessKind::Word => {
                guesser
                    .private_wrong_words
                    .get(target)
                    .is_some_and(|w| w.contains(&guess.value))
                    || guesser.private_hits.get(target).is_some_and(|hits| {
                        hits.iter()
                            .any(|h| matches!(h, PrivateHit::Word { word, .. } if *word == guess.value))
                    })
            }
        }
    }

    /// Resolve a guess and pass the turn. Repeated letters and words are
    /// absorbed idempotently: they land in the wrong lists and pay nothing.
    pub fn resolve_guess(
        &mut self,
        from: &str,
        target: &str,
        raw: &str,
        now: DateTime<Utc>,
    ) -> GameResult<GuessOutcome> {
        let guess = self.validate_guess(from, target, raw)?;

        self.queue.push(GuessRequest {
            from: from.to_string(),
            target: target.to_string(),
            kind: guess.kind,
            value: guess.value.clone(),
            ts: now,
        });

        let mut outcome = GuessOutcome {
            target_id: target.to_string(),
            kind: guess.kind,
            value: guess.value.clone(),
            correct: false,
            count: 0,
            reward: 0,
            eliminated: false,
            next_turn: None,
            game_over: false,
        };

        match guess.kind {
            GuessKind::Letter => self.apply_letter_guess(from, target, &guess.value, now, &mut outcome),
            GuessKind::Word => self.apply_word_guess(from, target, &guess.value, now, &mut outcome),
        }

        if outcome.reward > 0 {
            self.credit(from, outcome.reward);
        }
        if let Some(guesser) = self.players.get_mut(from) {
            guesser.last_seen = now;
        }

        if outcome.eliminated && self.check_winner() {
            outcome.game_over = true;
        } else {
            self.advance_turn(now);
            outcome.next_turn = self.current_turn_player().cloned();
        }

        tracing::info!(
            room_id = %self.id,
            from,
            target,
            kind = ?outcome.kind,
            correct = outcome.correct,
            eliminated = outcome.eliminated,
            "Guess resolved"
        );
        Ok(outcome)
    }

    fn apply_letter_guess(
        &mut self,
        from: &str,
        target: &str,
        value: &str,
        now: DateTime<Utc>,
        outcome: &mut GuessOutcome,
    ) {
        let Some(letter) = value.chars().next() else {
            return;
        };
        let Some(target_player) = self.players.get_mut(target) else {
            return;
        };
        let count = target_player
            .word
            .as_deref()
            .map_or(0, |w| w.chars().filter(|c| *c == letter).count());
        let fresh = count > 0 && !target_player.revealed.contains(&letter);

        if fresh {
            target_player.revealed.push(letter);
            push_unique(
                target_player.guessed_by.entry(letter.to_string()).or_default(),
                from.to_string(),
            );
            outcome.correct = true;
            outcome.count = count;
            outcome.reward = LETTER_REWARD;
        }

        let Some(guesser) = self.players.get_mut(from) else {
            return;
        };
        if fresh {
            guesser
                .private_hits
                .entry(target.to_string())
                .or_default()
                .push(PrivateHit::Letter { letter, count, ts: now });
        } else {
            push_unique(guesser.private_wrong.entry(target.to_string()).or_default(), letter);
        }
    }

    fn apply_word_guess(
        &mut self,
        from: &str,
        target: &str,
        value: &str,
        now: DateTime<Utc>,
        outcome: &mut GuessOutcome,
    ) {
        let Some(target_player) = self.players.get_mut(target) else {
            return;
        };
        let matched = target_player.word.as_deref() == Some(value);

        if matched {
            for letter in value.chars() {
                push_unique(&mut target_player.revealed, letter);
            }
            target_player.eliminated = true;
            push_unique(
                target_player.guessed_by.entry(WORD_GUESS_KEY.to_string()).or_default(),
                from.to_string(),
            );
            outcome.correct = true;
            outcome.eliminated = true;
            outcome.reward = WORD_REWARD;
        }

        if let Some(guesser) = self.players.get_mut(from) {
            if matched {
                guesser
                    .private_hits
                    .entry(target.to_string())
                    .or_default()
                    .push(PrivateHit::Word {
                        word: value.to_string(),
                        ts: now,
                    });
            } else {
                push_unique(
                    guesser.private_wrong_words.entry(target.to_string()).or_default(),
                    value.to_string(),
                );
            }
        }

        if matched {
            self.remove_from_turn_order(target);
        }
    }

    /// Full guess path: preconditions, duplicate short-circuit, resolution
    pub fn guess(
        &mut self,
        from: &str,
        target: &str,
        raw: &str,
        now: DateTime<Utc>,
    ) -> GameResult<GuessOutcome> {
        self.validate_guess(from, target, raw)?;
        if self.already_guessed(from, target, raw) {
            return Err(GameError::AlreadyGuessed);
        }
        self.resolve_guess(from, target, raw, now)
    }
}

impl AppState {
    pub async fn submit_guess(
        &self,
        room_id: &str,
        from: &str,
        target: &str,
        value: &str,
    ) -> GameResult<GuessOutcome> {
        let result = self
            .with_room(room_id, |room| room.guess(from, target, value, Utc::now()))
            .await;
        if let Err(e) = &result {
            tracing::info!(room_id, from, target, code = e.code(), "Guess rejected");
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{now, playing_room};
    use std::collections::BTreeMap;

    #[test]
    fn test_letter_hit() {
        let mut room = playing_room(&[("p1", "cat"), ("p2", "dog")]);
        let outcome = room.resolve_guess("p1", "p2", "o", now()).unwrap();

        assert!(outcome.correct);
        assert_eq!(outcome.count, 1);
        assert_eq!(room.players["p2"].revealed, vec!['o']);
        assert_eq!(room.players["p2"].guessed_by["o"], vec!["p1"]);
        assert_eq!(room.players["p1"].wordmoney, Some(4));
        assert_eq!(room.current_turn_player().unwrap(), "p2");
        assert_eq!(room.queue.len(), 1);
    }

    #[test]
    fn test_letter_miss_is_private() {
        let mut room = playing_room(&[("p1", "cat"), ("p2", "dog")]);
        let outcome = room.resolve_guess("p1", "p2", "z", now()).unwrap();

        assert!(!outcome.correct);
        assert_eq!(room.players["p1"].private_wrong["p2"], vec!['z']);
        assert!(room.players["p2"].revealed.is_empty());
        assert_eq!(room.players["p1"].wordmoney, Some(2));
        assert_eq!(room.current_turn_player().unwrap(), "p2");
    }

    #[test]
    fn test_repeated_letter() {
        let mut room = playing_room(&[("p1", "cat"), ("p2", "dodo")]);
        let outcome = room.resolve_guess("p1", "p2", "O", now()).unwrap();
        assert_eq!(outcome.count, 2);
        assert_eq!(outcome.value, "o");
    }

    #[test]
    fn test_already_revealed_letter_pays_nothing() {
        let mut room = playing_room(&[("p1", "cat"), ("p2", "dog"), ("p3", "cow")]);
        room.resolve_guess("p1", "p2", "o", now()).unwrap();
        let outcome = room.resolve_guess("p2", "p3", "w", now()).unwrap();
        assert!(outcome.correct);

        // p3 guesses the already-public 'o' on p2
        let outcome = room.resolve_guess("p3", "p2", "o", now()).unwrap();
        assert!(!outcome.correct);
        assert_eq!(room.players["p2"].revealed, vec!['o']);
        assert_eq!(room.players["p3"].private_wrong["p2"], vec!['o']);
        assert_eq!(room.players["p3"].wordmoney, Some(2));
    }

    #[test]
    fn test_word_guess_eliminates_and_ends_game() {
        let mut room = playing_room(&[("p1", "cat"), ("p2", "dog")]);
        let outcome = room.resolve_guess("p1", "p2", "DOG", now()).unwrap();

        assert!(outcome.eliminated);
        assert!(outcome.game_over);
        assert!(room.players["p2"].eliminated);
        assert_eq!(room.players["p2"].revealed, vec!['d', 'o', 'g']);
        assert_eq!(room.players["p2"].guessed_by[WORD_GUESS_KEY], vec!["p1"]);
        assert_eq!(room.players["p1"].wordmoney, Some(7));
        assert_eq!(room.phase, Phase::Ended);
        assert_eq!(room.winner_id.as_deref(), Some("p1"));
    }

    #[test]
    fn test_elimination_before_current_keeps_rotation() {
        let mut room = playing_room(&[("a", "ant"), ("b", "bee"), ("c", "cow"), ("d", "dog")]);
        room.current_turn_index = 2; // c

        room.resolve_guess("c", "a", "ant", now()).unwrap();
        assert_eq!(room.turn_order, vec!["b", "c", "d"]);
        assert_eq!(room.current_turn_player().unwrap(), "d");
        room.advance_turn(now());
        assert_eq!(room.current_turn_player().unwrap(), "b");
    }

    #[test]
    fn test_elimination_after_current() {
        let mut room = playing_room(&[("a", "ant"), ("b", "bee"), ("c", "cow")]);
        room.resolve_guess("a", "b", "bee", now()).unwrap();
        assert_eq!(room.turn_order, vec!["a", "c"]);
        assert_eq!(room.current_turn_player().unwrap(), "c");
    }

    #[test]
    fn test_wrong_word_recorded_once() {
        let mut room = playing_room(&[("p1", "cat"), ("p2", "dog")]);
        room.resolve_guess("p1", "p2", "dig", now()).unwrap();
        room.skip_turn("p2", now()).unwrap();
        room.resolve_guess("p1", "p2", "dig", now()).unwrap();
        assert_eq!(room.players["p1"].private_wrong_words["p2"], vec!["dig"]);
    }

    #[test]
    fn test_precondition_order() {
        let mut room = playing_room(&[("p1", "cat"), ("p2", "dog")]);

        // Not your turn outranks self-guess
        assert_eq!(room.resolve_guess("p2", "p2", "a", now()), Err(GameError::NotYourTurn));
        assert_eq!(room.resolve_guess("p1", "p1", "a", now()), Err(GameError::SelfGuess));
        assert_eq!(
            room.resolve_guess("p1", "ghost", "a", now()),
            Err(GameError::PlayerNotFound)
        );

        room.players.get_mut("p2").unwrap().word = None;
        assert_eq!(room.resolve_guess("p1", "p2", "a", now()), Err(GameError::NoWord));

        room.phase = Phase::WordspyPlaying;
        assert_eq!(
            room.resolve_guess("p1", "p2", "a", now()),
            Err(GameError::BadPhase(Phase::WordspyPlaying))
        );
        assert!(room.queue.is_empty());
    }

    #[test]
    fn test_rejection_leaves_room_unchanged() {
        let mut room = playing_room(&[("p1", "cat"), ("p2", "dog")]);
        let before = serde_json::to_value(&room).unwrap();
        let _ = room.resolve_guess("p2", "p1", "c", now());
        let _ = room.resolve_guess("p1", "p2", "", now());
        let _ = room.resolve_guess("p1", "p2", "d0g", now());
        assert_eq!(serde_json::to_value(&room).unwrap(), before);
    }

    #[test]
    fn test_duplicate_short_circuit() {
        let mut room = playing_room(&[("p1", "cat"), ("p2", "dog")]);
        room.resolve_guess("p1", "p2", "z", now()).unwrap();
        room.skip_turn("p2", now()).unwrap();

        assert!(room.already_guessed("p1", "p2", "z"));
        assert_eq!(room.guess("p1", "p2", "Z", now()), Err(GameError::AlreadyGuessed));
        // Turn did not pass
        assert_eq!(room.current_turn_player().unwrap(), "p1");
        assert!(room.guess("p1", "p2", "o", now()).is_ok());
    }

    #[test]
    fn test_duplicate_check_sees_power_reveals_and_public_letters() {
        let mut room = playing_room(&[("p1", "cat"), ("p2", "dog")]);
        room.players
            .get_mut("p1")
            .unwrap()
            .private_power_reveals
            .insert("p2".to_string(), vec!['g']);
        room.players.get_mut("p2").unwrap().revealed.push('d');

        assert!(room.already_guessed("p1", "p2", "g"));
        assert!(room.already_guessed("p1", "p2", "d"));
        assert!(!room.already_guessed("p1", "p2", "o"));
        assert!(!room.already_guessed("p1", "p2", "dog"));
    }

    #[test]
    fn test_team_credit_goes_to_team_wallet() {
        let mut room = playing_room(&[("a", "ant"), ("b", "bee"), ("c", "cow"), ("d", "dog")]);
        room.game_mode = GameMode::LastTeamStanding;
        let mut teams = BTreeMap::new();
        teams.insert("red".to_string(), Team { wordmoney: 4, initial_count: 2, compensation_applied: false });
        teams.insert("blue".to_string(), Team { wordmoney: 4, initial_count: 2, compensation_applied: false });
        room.teams = Some(teams);
        for (id, team) in [("a", "red"), ("b", "blue"), ("c", "red"), ("d", "blue")] {
            let p = room.players.get_mut(id).unwrap();
            p.team = Some(team.to_string());
            p.wordmoney = None;
        }

        room.resolve_guess("a", "b", "b", now()).unwrap();
        assert_eq!(room.teams.as_ref().unwrap()["red"].wordmoney, 6);

        // Eliminating both blue players ends the game for red
        room.current_turn_index = room.turn_order.iter().position(|id| id == "c").unwrap();
        room.resolve_guess("c", "b", "bee", now()).unwrap();
        room.current_turn_index = room.turn_order.iter().position(|id| id == "a").unwrap();
        let outcome = room.resolve_guess("a", "d", "dog", now()).unwrap();
        assert!(outcome.game_over);
        assert_eq!(room.winner_team.as_deref(), Some("red"));
        assert_eq!(room.last_turn_team.as_deref(), Some("red"));
    }

    #[tokio::test]
    async fn test_concurrent_retries_pay_once() {
        let state = AppState::new();
        let room = playing_room(&[("p1", "cat"), ("p2", "dog"), ("p3", "cow")]);
        let handle = crate::state::RoomHandle::new(room);
        state
            .rooms
            .write()
            .await
            .insert("R1".to_string(), std::sync::Arc::new(handle));

        let (a, b, c, d) = tokio::join!(
            state.submit_guess("R1", "p1", "p2", "o"),
            state.submit_guess("R1", "p1", "p2", "o"),
            state.submit_guess("R1", "p1", "p2", "O"),
            state.submit_guess("R1", "p1", "p2", "o"),
        );
        let results = [a, b, c, d];
        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert!(results
            .iter()
            .filter_map(|r| r.as_ref().err())
            .all(|e| *e == GameError::NotYourTurn));

        let room = state.get_room("R1").await.unwrap();
        assert_eq!(room.players["p2"].revealed, vec!['o']);
        assert_eq!(room.players["p2"].guessed_by["o"], vec!["p1"]);
        assert_eq!(room.players["p1"].wordmoney, Some(4));

        // Once the turn comes back around the retry is a no-op
        state.skip_turn("R1", "p2").await.unwrap();
        state.skip_turn("R1", "p3").await.unwrap();
        assert_eq!(
            state.submit_guess("R1", "p1", "p2", "o").await,
            Err(GameError::AlreadyGuessed)
        );
        let room = state.get_room("R1").await.unwrap();
        assert_eq!(room.players["p2"].revealed, vec!['o']);
        assert_eq!(room.players["p1"].wordmoney, Some(4));
    }
}
