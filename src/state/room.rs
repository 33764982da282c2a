use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use super::teams::MIN_TEAM_PLAYERS;
use super::AppState;
use super::RoomHandle;
use crate::error::{GameError, GameResult};
use crate::types::*;
use std::sync::Arc;

const MAX_ROOM_ID_CHARS: usize = 64;
const MIN_PLAYERS: usize = 2;

/// Who is joining which room
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct JoinRequest {
    pub room_id: RoomId,
    #[serde(default)]
    pub name: String,
    /// Authenticated account id; exempt from TTL eviction
    #[serde(default)]
    pub account_id: Option<String>,
    /// Anonymous per-device id persisted client-side for reconnection
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl JoinRequest {
    pub fn anonymous(room_id: &str, name: &str, device_id: &str) -> Self {
        Self {
            room_id: room_id.to_string(),
            name: name.to_string(),
            device_id: Some(device_id.to_string()),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct JoinOutcome {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    pub token: String,
    pub is_host: bool,
    pub rejoined: bool,
}

/// Lobby settings the host may change between games
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsUpdate {
    pub game_mode: Option<GameMode>,
    pub secret_word_theme: Option<SecretWordTheme>,
    /// `Some("")` clears the password
    pub password: Option<String>,
    pub timed: Option<bool>,
    pub turn_timeout_seconds: Option<u32>,
    pub starting_money: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum StartOutcome {
    Started,
    /// Team mode needs more players; a room-visible warning was set
    NeedsMorePlayers(usize),
}

fn normalize_name(raw: &str) -> String {
    let name: String = raw.trim().chars().take(MAX_NAME_CHARS).collect();
    if !name.is_empty() {
        return name;
    }
    petname::petname(2, " ")
        .map(|generated| generated.chars().take(MAX_NAME_CHARS).collect())
        .unwrap_or_else(|| "player".to_string())
}

/// Deterministic palette slot for an id
fn hashed_color(id: &str) -> &'static str {
    let digest = Sha256::digest(id.as_bytes());
    COLOR_PALETTE[digest[0] as usize % COLOR_PALETTE.len()]
}

impl Room {
    /// Add a new entrant with a fresh wallet and a palette color
    pub(crate) fn add_player(
        &mut self,
        id: PlayerId,
        name: String,
        authenticated: bool,
        now: DateTime<Utc>,
    ) -> &Player {
        let color = COLOR_PALETTE
            .iter()
            .find(|c| !self.players.values().any(|p| p.color == **c))
            .copied()
            .unwrap_or_else(|| hashed_color(&id))
            .to_string();
        let seq = self.next_join_seq;
        self.next_join_seq += 1;
        let player = Player::new(
            id.clone(),
            normalize_name(&name),
            color,
            seq,
            self.starting_money,
            authenticated,
            now,
        );
        self.players.entry(id).or_insert(player)
    }

    pub(crate) fn all_players_idle(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.players
            .values()
            .all(|p| now.signed_duration_since(p.last_seen) > threshold)
    }

    /// Throw away the previous session, keeping only the room identity
    pub(crate) fn reset_to_lobby(&mut self, now: DateTime<Utc>) {
        tracing::info!(room_id = %self.id, "Resetting idle room to lobby");
        let mut fresh = Room::new(self.id.clone(), self.starting_money, now);
        fresh.version = self.version;
        fresh.next_join_seq = self.next_join_seq;
        *self = fresh;
    }

    /// Create-or-join. Returns the player id and whether it was a rejoin.
    pub fn join(
        &mut self,
        request: &JoinRequest,
        idle_reset_after: Duration,
        now: DateTime<Utc>,
    ) -> GameResult<(PlayerId, bool)> {
        let account_id = request
            .account_id
            .clone()
            .filter(|id| !id.trim().is_empty());
        let authenticated = account_id.is_some();
        let player_id = account_id
            .or_else(|| request.device_id.clone().filter(|id| !id.trim().is_empty()))
            .unwrap_or_else(|| ulid::Ulid::new().to_string());

        if let Some(player) = self.players.get_mut(&player_id) {
            player.last_seen = now;
            player.stale = false;
            player.present = true;
            player.left_at = None;
            if !request.name.trim().is_empty() {
                player.name = normalize_name(&request.name);
            }
            tracing::info!(room_id = %self.id, player_id = %player_id, "Player rejoined");
            return Ok((player_id, true));
        }

        if !self.open {
            if self.all_players_idle(now, idle_reset_after) {
                self.reset_to_lobby(now);
            } else {
                return Err(GameError::RoomClosed);
            }
        }

        if let Some(password) = &self.password {
            if request.password.as_deref() != Some(password.as_str()) {
                return Err(GameError::WrongPassword);
            }
        }

        self.add_player(player_id.clone(), request.name.clone(), authenticated, now);
        let host_present = self
            .host_id
            .as_ref()
            .is_some_and(|id| self.players.contains_key(id));
        if !host_present {
            self.host_id = Some(player_id.clone());
        }
        self.refresh_team_warning();

        tracing::info!(
            room_id = %self.id,
            player_id = %player_id,
            players = self.players.len(),
            "Player joined"
        );
        Ok((player_id, false))
    }

    /// Clear the team-mode warning once it no longer applies
    fn refresh_team_warning(&mut self) {
        if self.warning.is_some()
            && (self.game_mode != GameMode::LastTeamStanding
                || self.players.len() >= MIN_TEAM_PLAYERS)
        {
            self.warning = None;
        }
    }

    /// Players who already left the finished game do not carry over
    pub(crate) fn drop_departed_players(&mut self) {
        self.players.retain(|_, p| p.present);
    }

    /// Leave voluntarily. Hosts leaving an unfinished game are removed and
    /// succeeded; in the lobby and during word submission everyone is
    /// removed, so the remaining submissions can complete. Otherwise the
    /// record is kept with `present=false` so a refresh can re-attach.
    pub fn leave(&mut self, player_id: &str, now: DateTime<Utc>) -> GameResult<()> {
        if !self.players.contains_key(player_id) {
            return Err(GameError::PlayerNotFound);
        }

        let hard_remove = matches!(self.phase, Phase::Lobby | Phase::Submit)
            || (self.is_host(player_id) && self.phase != Phase::Ended);
        if hard_remove {
            self.remove_player(player_id, now);
            return Ok(());
        }

        if let Some(player) = self.players.get_mut(player_id) {
            player.present = false;
            player.left_at = Some(now);
        }
        tracing::info!(room_id = %self.id, player_id, "Player left");
        self.on_player_inactive(player_id, now);
        if self.phase.is_word_spy() {
            self.on_spy_player_gone(player_id, now);
        }
        Ok(())
    }

    /// Explicit host-kick
    pub fn kick(&mut self, host_id: &str, target_id: &str, now: DateTime<Utc>) -> GameResult<()> {
        self.require_host(host_id, "kick players")?;
        if self.phase == Phase::Ended {
            return Err(GameError::BadPhase(self.phase));
        }
        if host_id == target_id {
            return Err(GameError::Malformed("cannot kick yourself".to_string()));
        }
        if !self.players.contains_key(target_id) {
            return Err(GameError::PlayerNotFound);
        }
        self.timeouts.push(TimeoutEntry {
            player_id: target_id.to_string(),
            kind: TimeoutKind::HostKick,
            ts: now,
            next_player_id: None,
        });
        self.remove_player(target_id, now);
        Ok(())
    }

    pub fn update_settings(&mut self, host_id: &str, update: SettingsUpdate) -> GameResult<()> {
        self.require_host(host_id, "change settings")?;
        self.require_phase(&[Phase::Lobby, Phase::Ended])?;

        if let Some(mode) = update.game_mode {
            if mode != self.game_mode {
                self.game_mode = mode;
                self.warning = None;
            }
        }
        if let Some(theme) = update.secret_word_theme {
            self.secret_word_theme = theme;
        }
        if let Some(password) = update.password {
            self.password = (!password.is_empty()).then_some(password);
        }
        if let Some(timed) = update.timed {
            self.timed = timed;
        }
        if let Some(seconds) = update.turn_timeout_seconds {
            self.turn_timeout_seconds = seconds.max(5);
        }
        if let Some(money) = update.starting_money {
            self.starting_money = money;
        }
        self.refresh_team_warning();
        Ok(())
    }

    /// Start a game (or rematch) from `lobby`/`ended`
    pub fn start_game<R: Rng + ?Sized>(
        &mut self,
        host_id: &str,
        options: StartOptions,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> GameResult<StartOutcome> {
        self.require_host(host_id, "start the game")?;
        if !self.phase.can_start() {
            return Err(GameError::BadPhase(self.phase));
        }

        self.drop_departed_players();
        if self.players.len() < MIN_PLAYERS {
            return Err(GameError::NotEnoughPlayers(MIN_PLAYERS));
        }

        if let Some(mode) = options.game_mode {
            self.game_mode = mode;
        }
        if self.game_mode == GameMode::LastTeamStanding && self.players.len() < MIN_TEAM_PLAYERS {
            self.warning = Some(format!(
                "Team mode needs at least {} players",
                MIN_TEAM_PLAYERS
            ));
            tracing::info!(room_id = %self.id, players = self.players.len(), "Team start blocked");
            return Ok(StartOutcome::NeedsMorePlayers(MIN_TEAM_PLAYERS));
        }

        self.winner_id = None;
        self.winner_team = None;
        self.teams = None;
        self.warning = None;
        self.word_spy = None;
        self.turn_order.clear();
        self.current_turn_index = 0;
        self.current_turn_started_at = None;
        let starting_money = self.starting_money;
        for player in self.players.values_mut() {
            player.reset_for_game(starting_money);
        }
        if let Some(host) = self.players.get_mut(host_id) {
            host.last_seen = now;
        }

        self.timed = options.timed;
        self.turn_timeout_seconds = options.turn_timeout_seconds.max(5);

        self.starter_bonus = StarterBonus {
            enabled: options.starter_bonus,
            ..StarterBonus::default()
        };
        if options.starter_bonus {
            let letter = rng.random_range(b'a'..=b'z') as char;
            self.starter_bonus.value = Some(letter);
            self.starter_bonus.description =
                format!("Words containing '{}' earn +{}", letter, STARTER_BONUS_REWARD);
        }

        if self.game_mode == GameMode::LastTeamStanding {
            self.assign_teams(options.starter_bonus, rng);
        }

        self.open = false;
        self.transition(Phase::Submit)?;
        self.last_start = Some(options);
        tracing::info!(
            room_id = %self.id,
            mode = ?self.game_mode,
            players = self.players.len(),
            starter_letter = ?self.starter_bonus.value,
            "Game started"
        );
        Ok(StartOutcome::Started)
    }

    /// Re-enter `submit` from `ended` with the previous options
    pub fn rematch<R: Rng + ?Sized>(
        &mut self,
        host_id: &str,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> GameResult<StartOutcome> {
        self.require_phase(&[Phase::Ended])?;
        let options = self.last_start.clone().unwrap_or_default();
        self.start_game(host_id, options, rng, now)
    }
}

impl AppState {
    /// Join (or create) a room and issue the player's bearer token
    pub async fn join_room(&self, request: JoinRequest) -> GameResult<JoinOutcome> {
        let room_id = request.room_id.trim().to_string();
        if room_id.is_empty() || room_id.chars().count() > MAX_ROOM_ID_CHARS {
            return Err(GameError::Malformed("invalid room id".to_string()));
        }
        let idle_reset = Duration::from_std(self.config.idle_reset_after)
            .unwrap_or_else(|_| Duration::minutes(10));

        // A room deleted between lookup and lock is recreated on the second pass
        for _ in 0..2 {
            {
                let mut rooms = self.rooms.write().await;
                rooms.entry(room_id.clone()).or_insert_with(|| {
                    tracing::info!(room_id = %room_id, "Creating room");
                    Arc::new(RoomHandle::new(Room::new(
                        room_id.clone(),
                        self.config.starting_money,
                        Utc::now(),
                    )))
                });
            }

            let result = self
                .with_room(&room_id, |room| {
                    let (player_id, rejoined) = room.join(&request, idle_reset, Utc::now())?;
                    Ok((player_id.clone(), room.is_host(&player_id), rejoined))
                })
                .await;

            match result {
                Ok((player_id, is_host, rejoined)) => {
                    return Ok(JoinOutcome {
                        token: self.tokens.issue(&room_id, &player_id),
                        room_id,
                        player_id,
                        is_host,
                        rejoined,
                    })
                }
                Err(GameError::RoomNotFound) => continue,
                Err(e) => return Err(e),
            }
        }
        Err(GameError::RoomNotFound)
    }

    pub async fn leave_room(&self, room_id: &str, player_id: &str) -> GameResult<()> {
        self.with_room(room_id, |room| room.leave(player_id, Utc::now()))
            .await
    }

    pub async fn kick_player(&self, room_id: &str, host_id: &str, target_id: &str) -> GameResult<()> {
        self.with_room(room_id, |room| room.kick(host_id, target_id, Utc::now()))
            .await
    }

    pub async fn update_settings(
        &self,
        room_id: &str,
        host_id: &str,
        update: SettingsUpdate,
    ) -> GameResult<()> {
        self.with_room(room_id, |room| room.update_settings(host_id, update))
            .await
    }

    pub async fn start_game(
        &self,
        room_id: &str,
        host_id: &str,
        options: StartOptions,
    ) -> GameResult<StartOutcome> {
        let themes = self.themes.clone();
        self.with_room(room_id, |room| {
            let mut rng = rand::rng();
            let outcome = room.start_game(host_id, options, &mut rng, Utc::now())?;
            if outcome == StartOutcome::Started {
                room.seed_ghost_challenge(&themes, &mut rng);
            }
            Ok(outcome)
        })
        .await
    }

    pub async fn rematch(&self, room_id: &str, host_id: &str) -> GameResult<StartOutcome> {
        let themes = self.themes.clone();
        self.with_room(room_id, |room| {
            let mut rng = rand::rng();
            let outcome = room.rematch(host_id, &mut rng, Utc::now())?;
            if outcome == StartOutcome::Started {
                room.seed_ghost_challenge(&themes, &mut rng);
            }
            Ok(outcome)
        })
        .await
    }
}
