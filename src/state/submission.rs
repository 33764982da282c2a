use chrono::{DateTime, Utc};
use rand::Rng;

use super::AppState;
use crate::error::{GameError, GameResult};
use crate::types::*;
use crate::words::ThemeRegistry;

pub const MIN_WORD_LEN: usize = 2;
pub const MAX_WORD_LEN: usize = 20;

/// Lowercase and trim a secret word, rejecting anything outside a-z
pub(crate) fn normalize_word(raw: &str) -> GameResult<String> {
    let word = raw.trim().to_lowercase();
    if !word.chars().all(|c| c.is_ascii_lowercase()) {
        return Err(GameError::Malformed("words may only contain letters a-z".to_string()));
    }
    let len = word.chars().count();
    if !(MIN_WORD_LEN..=MAX_WORD_LEN).contains(&len) {
        return Err(GameError::Malformed(format!(
            "words must be {}-{} letters",
            MIN_WORD_LEN, MAX_WORD_LEN
        )));
    }
    Ok(word)
}

impl Room {
    /// Store a player's secret word. Returns true when this submission
    /// completed the set and the room moved to `playing`.
    pub fn submit_word(
        &mut self,
        player_id: &str,
        raw: &str,
        themes: &ThemeRegistry,
        now: DateTime<Utc>,
    ) -> GameResult<bool> {
        self.require_phase(&[Phase::Submit])?;
        if !self.players.contains_key(player_id) {
            return Err(GameError::PlayerNotFound);
        }
        let word = normalize_word(raw)?;

        if self.secret_word_theme.enabled {
            let theme = self.secret_word_theme.kind;
            let validator = themes
                .get(theme)
                .ok_or_else(|| GameError::ThemeUnavailable(theme.as_str().to_string()))?;
            if !validator.is_valid(&word) {
                return Err(GameError::InvalidWord {
                    word,
                    theme: theme.as_str().to_string(),
                });
            }
        }

        let bonus_letter = self.starter_bonus.active_letter();
        let earns_bonus = match (self.players.get_mut(player_id), bonus_letter) {
            (Some(player), letter) => {
                let earns = letter.is_some_and(|l| word.contains(l)) && !player.starter_bonus_awarded;
                if earns {
                    player.starter_bonus_awarded = true;
                }
                player.word = Some(word);
                player.has_word = true;
                player.last_seen = now;
                earns
            }
            (None, _) => return Err(GameError::PlayerNotFound),
        };
        if earns_bonus {
            self.credit(player_id, STARTER_BONUS_REWARD);
            tracing::info!(room_id = %self.id, player_id, "Starter bonus awarded");
        }

        tracing::debug!(room_id = %self.id, player_id, "Word submitted");
        self.maybe_begin_playing(now)
    }

    /// Advance to `playing` once every player has a word
    pub(crate) fn maybe_begin_playing(&mut self, now: DateTime<Utc>) -> GameResult<bool> {
        if self.phase != Phase::Submit
            || self.players.is_empty()
            || !self.players.values().all(|p| p.has_word)
        {
            return Ok(false);
        }
        self.begin_playing(now)?;
        Ok(true)
    }

    fn begin_playing(&mut self, now: DateTime<Utc>) -> GameResult<()> {
        self.turn_order = self.build_turn_order();
        self.transition(Phase::Playing)?;
        self.current_turn_index = 0;
        self.current_turn_started_at = Some(now);

        if self.game_mode != GameMode::Money {
            if let Some(letter) = self.starter_bonus.active_letter() {
                for player in self.players.values_mut() {
                    let holds = player.word.as_deref().is_some_and(|w| w.contains(letter));
                    if holds && !player.revealed.contains(&letter) {
                        player.revealed.push(letter);
                    }
                }
                self.starter_bonus.applied = true;
            }
        }

        if let Some(first) = self.turn_order.first().cloned() {
            self.credit(&first, TURN_START_BONUS);
        }

        tracing::info!(
            room_id = %self.id,
            turn_order = ?self.turn_order,
            "All words in, playing"
        );
        Ok(())
    }

    /// Pick a re-entry challenge word unless one is already set
    pub(crate) fn seed_ghost_challenge<R: Rng + ?Sized>(&mut self, themes: &ThemeRegistry, rng: &mut R) {
        if self.ghost_challenge.is_none() {
            let theme = self
                .secret_word_theme
                .enabled
                .then_some(self.secret_word_theme.kind);
            self.ghost_challenge = Some(themes.random_word(theme, rng));
        }
    }
}

impl AppState {
    /// Returns true when the submission started the game
    pub async fn submit_word(&self, room_id: &str, player_id: &str, word: &str) -> GameResult<bool> {
        let themes = self.themes.clone();
        self.with_room(room_id, |room| {
            room.submit_word(player_id, word, &themes, Utc::now())
        })
        .await
    }
}
