//! Spy sub-mode: one hidden spy per round, everyone else knows the word.
//!
//! Round flow is `waiting -> playing -> voting -> (spyGuess) -> reveal`, then
//! the host either draws the next round or ends the session.

use chrono::{DateTime, Duration, Utc};
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

use super::AppState;
use crate::error::{GameError, GameResult};
use crate::types::*;
use crate::words::ThemeRegistry;

pub const MIN_SPY_PLAYERS: usize = 3;
pub const MAX_SPY_GUESSES: usize = 3;
pub const DEFAULT_SPY_ROUNDS: u32 = 3;
pub const DEFAULT_SPY_TIMER_SECONDS: u32 = 120;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum VoteResolution {
    /// No suspect has a majority yet
    Pending,
    /// Majority named the spy, who now gets to guess the word
    SpyUnmasked,
    /// Majority named an innocent player; the spy wins the round
    SpyEscaped,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteOutcome {
    pub tally: SpyTally,
    pub resolution: VoteResolution,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpyGuessOutcome {
    pub attempt: usize,
    pub letters: Vec<char>,
    pub correct: bool,
    pub reward: u32,
    pub guesses_left: usize,
    pub state: WordSpyState,
}

/// Letters of `guess` that also occur in `word`, each occurrence consumed once
pub(crate) fn letter_intersection(guess: &str, word: &str) -> Vec<char> {
    let mut pool: HashMap<char, usize> = HashMap::new();
    for c in word.chars() {
        *pool.entry(c).or_default() += 1;
    }
    guess
        .chars()
        .filter(|c| match pool.get_mut(c) {
            Some(n) if *n > 0 => {
                *n -= 1;
                true
            }
            _ => false,
        })
        .collect()
}

impl Room {
    fn spy_session(&self) -> GameResult<&WordSpySession> {
        self.word_spy.as_ref().ok_or(GameError::BadPhase(self.phase))
    }

    fn spy_session_mut(&mut self) -> GameResult<&mut WordSpySession> {
        let phase = self.phase;
        self.word_spy.as_mut().ok_or(GameError::BadPhase(phase))
    }

    /// Enter spy mode from `lobby`/`ended`
    pub fn start_word_spy<R: Rng + ?Sized>(
        &mut self,
        host_id: &str,
        rounds: u32,
        timer_seconds: u32,
        themes: &ThemeRegistry,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> GameResult<()> {
        self.require_host(host_id, "start word spy")?;
        if !self.phase.can_start() {
            return Err(GameError::BadPhase(self.phase));
        }
        self.drop_departed_players();
        if self.players.len() < MIN_SPY_PLAYERS {
            return Err(GameError::NotEnoughPlayers(MIN_SPY_PLAYERS));
        }

        self.winner_id = None;
        self.winner_team = None;
        self.teams = None;
        self.warning = None;
        self.turn_order.clear();
        self.current_turn_started_at = None;
        let starting_money = self.starting_money;
        for player in self.players.values_mut() {
            player.reset_for_game(starting_money);
        }

        self.word_spy = Some(WordSpySession {
            word: String::new(),
            spy_id: String::new(),
            timer_seconds: timer_seconds.clamp(15, 900),
            rounds_remaining: rounds.clamp(1, 10),
            current_round: 1,
            state: WordSpyState::Waiting,
            started_at: now,
            playing_started_at: None,
            voting_started_at: None,
            last_tally: None,
            last_reveal: None,
            revealed: BTreeMap::new(),
            reveal_sequence: Vec::new(),
            last_round_summary: None,
            round_results: Vec::new(),
        });
        self.draw_spy_round(themes, rng, now)?;
        self.open = false;
        self.transition(Phase::WordspyWait)?;
        tracing::info!(room_id = %self.id, players = self.players.len(), "Word spy started");
        Ok(())
    }

    /// Fresh word and spy; per-player ready/vote/guess state cleared
    fn draw_spy_round<R: Rng + ?Sized>(
        &mut self,
        themes: &ThemeRegistry,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> GameResult<()> {
        let theme = self
            .secret_word_theme
            .enabled
            .then_some(self.secret_word_theme.kind);
        let word = themes.random_word(theme, rng);
        let candidates: Vec<PlayerId> = self
            .players_in_join_order()
            .iter()
            .filter(|p| p.present)
            .map(|p| p.id.clone())
            .collect();
        let spy_id = candidates
            .choose(rng)
            .cloned()
            .ok_or(GameError::NotEnoughPlayers(MIN_SPY_PLAYERS))?;

        for player in self.players.values_mut() {
            player.reset_word_spy();
        }
        let session = self.spy_session_mut()?;
        session.word = word;
        session.spy_id = spy_id;
        session.state = WordSpyState::Waiting;
        session.started_at = now;
        session.playing_started_at = None;
        session.voting_started_at = None;
        session.last_tally = None;
        session.last_reveal = None;
        session.revealed.clear();
        session.reveal_sequence.clear();
        Ok(())
    }

    fn all_non_spies_ready(&self) -> bool {
        let Some(session) = &self.word_spy else {
            return false;
        };
        self.players
            .values()
            .filter(|p| p.present && p.id != session.spy_id)
            .all(|p| p.word_spy_ready)
    }

    fn start_spy_playing(&mut self, now: DateTime<Utc>) -> GameResult<()> {
        let session = self.spy_session_mut()?;
        session.state = WordSpyState::Playing;
        session.playing_started_at = Some(now);
        self.transition(Phase::WordspyPlaying)
    }

    fn start_spy_voting(&mut self, now: DateTime<Utc>) -> GameResult<()> {
        let session = self.spy_session_mut()?;
        session.state = WordSpyState::Voting;
        session.voting_started_at = Some(now);
        self.transition(Phase::WordspyVoting)
    }

    /// Mark a player ready. Returns true when this started the round.
    pub fn set_spy_ready(&mut self, player_id: &str, ready: bool, now: DateTime<Utc>) -> GameResult<bool> {
        self.require_phase(&[Phase::WordspyWait])?;
        let player = self
            .players
            .get_mut(player_id)
            .ok_or(GameError::PlayerNotFound)?;
        player.word_spy_ready = ready;
        player.last_seen = now;

        if ready && self.all_non_spies_ready() {
            self.start_spy_playing(now)?;
            tracing::info!(room_id = %self.id, "Everyone ready, spy round playing");
            return Ok(true);
        }
        Ok(false)
    }

    /// Host starts the round; `force` skips the readiness check
    pub fn begin_spy_round(&mut self, host_id: &str, force: bool, now: DateTime<Utc>) -> GameResult<()> {
        self.require_host(host_id, "start the round")?;
        self.require_phase(&[Phase::WordspyWait])?;
        if !force && !self.all_non_spies_ready() {
            return Err(GameError::NotReady);
        }
        self.start_spy_playing(now)
    }

    /// Host ends discussion early and opens voting
    pub fn end_spy_playing(&mut self, host_id: &str, now: DateTime<Utc>) -> GameResult<()> {
        self.require_host(host_id, "end the round")?;
        self.require_phase(&[Phase::WordspyPlaying])?;
        self.start_spy_voting(now)
    }

    /// Open voting once the playing timer has run out. Returns true if it did.
    pub(crate) fn expire_spy_timer(&mut self, now: DateTime<Utc>) -> bool {
        if self.phase != Phase::WordspyPlaying {
            return false;
        }
        let expired = self.word_spy.as_ref().is_some_and(|s| {
            s.playing_started_at.is_some_and(|started| {
                now.signed_duration_since(started) > Duration::seconds(i64::from(s.timer_seconds))
            })
        });
        if !expired {
            return false;
        }
        match self.start_spy_voting(now) {
            Ok(()) => {
                tracing::info!(room_id = %self.id, "Spy timer expired, voting");
                true
            }
            Err(e) => {
                tracing::warn!(room_id = %self.id, "Could not open voting: {}", e);
                false
            }
        }
    }

    fn tally_votes(&self) -> SpyTally {
        let mut counts: BTreeMap<PlayerId, usize> = BTreeMap::new();
        for player in self.players.values() {
            if let Some(suspect) = &player.word_spy_vote {
                if self.players.contains_key(suspect) {
                    *counts.entry(suspect.clone()).or_default() += 1;
                }
            }
        }
        let votes_cast = counts.values().sum();
        let majority_needed = self.players.len() / 2 + 1;
        let majority_pick = counts
            .iter()
            .find(|(_, count)| **count >= majority_needed)
            .map(|(id, _)| id.clone());
        SpyTally {
            counts,
            votes_cast,
            majority_needed,
            majority_pick,
        }
    }

    fn voters_for(&self, suspect: &str) -> Vec<PlayerId> {
        let mut voters: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| p.word_spy_vote.as_deref() == Some(suspect))
            .map(|p| p.id.clone())
            .collect();
        voters.sort();
        voters
    }

    fn award(&mut self, player_id: &str, amount: u32, reason: AwardReason, now: DateTime<Utc>) -> Option<AwardEntry> {
        self.credit(player_id, amount)?;
        let round = self.word_spy.as_ref().map_or(0, |s| s.current_round);
        Some(AwardEntry {
            round,
            player_id: player_id.to_string(),
            amount,
            reason,
            ts: now,
        })
    }

    /// Apply the current votes. Pays out and transitions once a majority exists.
    fn evaluate_votes(&mut self, now: DateTime<Utc>) -> GameResult<VoteOutcome> {
        let tally = self.tally_votes();
        let spy_id = self.spy_session()?.spy_id.clone();
        self.spy_session_mut()?.last_tally = Some(tally.clone());

        let Some(pick) = tally.majority_pick.clone() else {
            return Ok(VoteOutcome {
                tally,
                resolution: VoteResolution::Pending,
            });
        };

        if pick == spy_id {
            let awards: Vec<AwardEntry> = self
                .voters_for(&spy_id)
                .iter()
                .filter_map(|voter| self.award(voter, SPY_CORRECT_VOTE_REWARD, AwardReason::CorrectVote, now))
                .collect();
            let session = self.spy_session_mut()?;
            session.round_results.extend(awards);
            session.state = WordSpyState::SpyGuess;
            self.transition(Phase::WordspySpyguess)?;
            tracing::info!(room_id = %self.id, spy_id = %spy_id, "Spy unmasked");
            return Ok(VoteOutcome {
                tally,
                resolution: VoteResolution::SpyUnmasked,
            });
        }

        let mut awards: Vec<AwardEntry> = self
            .award(&spy_id, SPY_ESCAPE_REWARD, AwardReason::SpyEscaped, now)
            .into_iter()
            .collect();
        for voter in self.voters_for(&spy_id) {
            awards.extend(self.award(&voter, SPY_MINORITY_VOTE_REWARD, AwardReason::MinorityVote, now));
        }
        self.finish_spy_round(WordSpyState::SpyWonByWrongGuess, awards, now)?;
        tracing::info!(room_id = %self.id, spy_id = %spy_id, wrong_pick = %pick, "Spy escaped");
        Ok(VoteOutcome {
            tally,
            resolution: VoteResolution::SpyEscaped,
        })
    }

    fn finish_spy_round(
        &mut self,
        outcome: WordSpyState,
        awards: Vec<AwardEntry>,
        now: DateTime<Utc>,
    ) -> GameResult<()> {
        let session = self.spy_session_mut()?;
        session.round_results.extend(awards);
        let round = session.current_round;
        session.last_round_summary = Some(RoundSummary {
            round,
            spy_id: session.spy_id.clone(),
            word: session.word.clone(),
            outcome,
            majority_pick: session.last_tally.as_ref().and_then(|t| t.majority_pick.clone()),
            awards: session
                .round_results
                .iter()
                .filter(|a| a.round == round)
                .cloned()
                .collect(),
        });
        session.state = outcome;
        self.transition(Phase::WordspyReveal)?;
        tracing::debug!(room_id = %self.id, round, outcome = ?outcome, ts = %now, "Spy round finished");
        Ok(())
    }

    /// Cast or change a vote
    pub fn spy_vote(&mut self, voter: &str, suspect: &str, now: DateTime<Utc>) -> GameResult<VoteOutcome> {
        self.require_phase(&[Phase::WordspyVoting])?;
        if !self.players.contains_key(suspect) {
            return Err(GameError::PlayerNotFound);
        }
        if voter == suspect {
            return Err(GameError::Malformed("cannot vote for yourself".to_string()));
        }
        let player = self.players.get_mut(voter).ok_or(GameError::PlayerNotFound)?;
        player.word_spy_vote = Some(suspect.to_string());
        player.last_seen = now;
        self.evaluate_votes(now)
    }

    /// The unmasked spy's attempt at the secret word
    pub fn spy_guess(&mut self, player_id: &str, raw: &str, now: DateTime<Utc>) -> GameResult<SpyGuessOutcome> {
        self.require_phase(&[Phase::WordspySpyguess])?;
        let session = self.spy_session()?;
        if session.spy_id != player_id {
            return Err(GameError::NotSpy);
        }
        let word = session.word.clone();

        let guess = raw.trim().to_lowercase();
        if guess.is_empty() || !guess.chars().all(|c| c.is_ascii_lowercase()) {
            return Err(GameError::Malformed("guesses may only contain letters a-z".to_string()));
        }
        let word_len = word.chars().count();
        if guess.chars().count() != word_len {
            return Err(GameError::WrongLength(word_len));
        }
        let spy = self.players.get_mut(player_id).ok_or(GameError::PlayerNotFound)?;
        if spy.word_spy_guesses.len() >= MAX_SPY_GUESSES {
            return Err(GameError::NoGuessesLeft);
        }
        spy.word_spy_guesses.push(guess.clone());
        spy.last_seen = now;
        let attempt = spy.word_spy_guesses.len();

        let letters = letter_intersection(&guess, &word);
        let correct = guess == word;
        let reveal = SpyReveal {
            attempt,
            guess,
            letters: letters.clone(),
            correct,
            ts: now,
        };

        let session = self.spy_session_mut()?;
        let mut seen: BTreeMap<String, usize> = BTreeMap::new();
        for letter in &letters {
            *seen.entry(letter.to_string()).or_default() += 1;
        }
        for (letter, count) in seen {
            let known = session.revealed.entry(letter).or_default();
            *known = (*known).max(count);
        }
        session.last_reveal = Some(reveal.clone());
        session.reveal_sequence.push(reveal);

        let mut reward = 0;
        if correct {
            reward = SPY_GUESS_REWARDS[attempt - 1];
            let awards: Vec<AwardEntry> = self
                .award(player_id, reward, AwardReason::SpyGuessedWord, now)
                .into_iter()
                .collect();
            self.finish_spy_round(WordSpyState::SpyWon, awards, now)?;
        } else if attempt >= MAX_SPY_GUESSES {
            self.finish_spy_round(WordSpyState::SpyFailed, Vec::new(), now)?;
        }

        let state = self.spy_session()?.state;
        tracing::info!(room_id = %self.id, attempt, correct, "Spy guessed");
        Ok(SpyGuessOutcome {
            attempt,
            letters,
            correct,
            reward,
            guesses_left: MAX_SPY_GUESSES - attempt,
            state,
        })
    }

    /// Host moves past a revealed round. Returns false when the session ended.
    pub fn next_spy_round<R: Rng + ?Sized>(
        &mut self,
        host_id: &str,
        themes: &ThemeRegistry,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> GameResult<bool> {
        self.require_host(host_id, "advance the round")?;
        self.require_phase(&[Phase::WordspyReveal])?;

        let session = self.spy_session_mut()?;
        session.rounds_remaining = session.rounds_remaining.saturating_sub(1);
        if session.rounds_remaining == 0 {
            session.state = WordSpyState::Ended;
            self.transition(Phase::Ended)?;
            tracing::info!(room_id = %self.id, "Word spy finished");
            return Ok(false);
        }
        session.current_round += 1;
        self.draw_spy_round(themes, rng, now)?;
        self.transition(Phase::WordspyWait)?;
        Ok(true)
    }

    /// Repair the round after a player left or was removed
    pub(crate) fn on_spy_player_gone(&mut self, player_id: &str, now: DateTime<Utc>) {
        let Some(session) = &self.word_spy else {
            return;
        };
        if session.state.is_revealed() || !self.phase.is_word_spy() {
            return;
        }

        if session.spy_id == player_id {
            tracing::info!(room_id = %self.id, player_id, "Spy left, round over");
            if let Err(e) = self.finish_spy_round(WordSpyState::Ended, Vec::new(), now) {
                tracing::warn!(room_id = %self.id, "Could not close spy round: {}", e);
            }
            return;
        }

        for player in self.players.values_mut() {
            if player.word_spy_vote.as_deref() == Some(player_id) {
                player.word_spy_vote = None;
            }
        }
        let result = match self.phase {
            Phase::WordspyWait if self.all_non_spies_ready() => self.start_spy_playing(now),
            Phase::WordspyVoting => self.evaluate_votes(now).map(|_| ()),
            _ => Ok(()),
        };
        if let Err(e) = result {
            tracing::warn!(room_id = %self.id, "Could not repair spy round: {}", e);
        }
    }
}

impl AppState {
    pub async fn start_word_spy(
        &self,
        room_id: &str,
        host_id: &str,
        rounds: Option<u32>,
        timer_seconds: Option<u32>,
    ) -> GameResult<()> {
        let themes = self.themes.clone();
        self.with_room(room_id, |room| {
            room.start_word_spy(
                host_id,
                rounds.unwrap_or(DEFAULT_SPY_ROUNDS),
                timer_seconds.unwrap_or(DEFAULT_SPY_TIMER_SECONDS),
                &themes,
                &mut rand::rng(),
                Utc::now(),
            )
        })
        .await
    }

    pub async fn spy_ready(&self, room_id: &str, player_id: &str, ready: bool) -> GameResult<bool> {
        self.with_room(room_id, |room| room.set_spy_ready(player_id, ready, Utc::now()))
            .await
    }

    pub async fn spy_begin_round(&self, room_id: &str, host_id: &str, force: bool) -> GameResult<()> {
        self.with_room(room_id, |room| room.begin_spy_round(host_id, force, Utc::now()))
            .await
    }

    pub async fn spy_end_playing(&self, room_id: &str, host_id: &str) -> GameResult<()> {
        self.with_room(room_id, |room| room.end_spy_playing(host_id, Utc::now()))
            .await
    }

    pub async fn spy_vote(&self, room_id: &str, voter: &str, suspect: &str) -> GameResult<VoteOutcome> {
        self.with_room(room_id, |room| room.spy_vote(voter, suspect, Utc::now()))
            .await
    }

    pub async fn spy_guess(&self, room_id: &str, player_id: &str, guess: &str) -> GameResult<SpyGuessOutcome> {
        self.with_room(room_id, |room| room.spy_guess(player_id, guess, Utc::now()))
            .await
    }

    pub async fn spy_next_round(&self, room_id: &str, host_id: &str) -> GameResult<bool> {
        let themes = self.themes.clone();
        self.with_room(room_id, |room| {
            room.next_spy_round(host_id, &themes, &mut rand::rng(), Utc::now())
        })
        .await
    }
}
