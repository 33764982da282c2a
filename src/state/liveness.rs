use chrono::{DateTime, Duration, Utc};

use super::AppState;
use crate::config::GameConfig;
use crate::error::{GameError, GameResult};
use crate::types::*;

/// Convert a configured interval, saturating absurd values
pub(crate) fn to_chrono(duration: std::time::Duration) -> Duration {
    Duration::from_std(duration).unwrap_or_else(|_| Duration::days(365))
}

/// Heartbeat thresholds applied by the sweeper
#[derive(Debug, Clone, Copy)]
pub struct LivenessPolicy {
    pub stale_after: Duration,
    pub kick_after: Duration,
}

impl LivenessPolicy {
    pub fn from_config(config: &GameConfig) -> Self {
        Self {
            stale_after: to_chrono(config.stale_after),
            kick_after: to_chrono(config.kick_after),
        }
    }
}

/// What one sweep changed in a room
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SweepReport {
    pub marked_stale: Vec<PlayerId>,
    pub kicked: Vec<PlayerId>,
    pub turn_passed_to: Option<PlayerId>,
    pub turn_timed_out: bool,
    pub spy_timer_expired: bool,
}

impl SweepReport {
    pub fn changed(&self) -> bool {
        !self.marked_stale.is_empty()
            || !self.kicked.is_empty()
            || self.turn_passed_to.is_some()
            || self.turn_timed_out
            || self.spy_timer_expired
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EvictionReport {
    pub evicted: Vec<PlayerId>,
    pub room_deleted: bool,
}

impl Room {
    pub fn heartbeat(&mut self, player_id: &str, now: DateTime<Utc>) -> GameResult<()> {
        let player = self
            .players
            .get_mut(player_id)
            .ok_or(GameError::PlayerNotFound)?;
        player.last_seen = now;
        if player.stale {
            player.stale = false;
            tracing::debug!(room_id = %self.id, player_id, "Player fresh again");
        }
        Ok(())
    }

    fn audit(&mut self, player_id: &str, kind: TimeoutKind, next: Option<PlayerId>, now: DateTime<Utc>) {
        self.timeouts.push(TimeoutEntry {
            player_id: player_id.to_string(),
            kind,
            ts: now,
            next_player_id: next,
        });
    }

    /// Delete a player record and repair everything that pointed at it:
    /// host succession, turn rotation, win check, submit completion and the
    /// spy round. Returns false when the player was not in the room.
    pub(crate) fn remove_player(&mut self, player_id: &str, now: DateTime<Utc>) -> bool {
        let held_turn = self.current_turn_player().map(String::as_str) == Some(player_id);
        if self.players.remove(player_id).is_none() {
            return false;
        }
        tracing::info!(room_id = %self.id, player_id, phase = ?self.phase, "Player removed");

        if self.is_host(player_id) {
            self.host_id = self.players_in_join_order().first().map(|p| p.id.clone());
            tracing::info!(room_id = %self.id, new_host = ?self.host_id, "Host succession");
        }

        match self.phase {
            Phase::Playing => {
                if let Some(removed_at) = self.remove_from_turn_order(player_id) {
                    if held_turn && !self.turn_order.is_empty() {
                        let start = removed_at % self.turn_order.len();
                        match self.grant_turn_to_next_active(start, now) {
                            Some(next) => {
                                self.audit(player_id, TimeoutKind::TurnSkipped, Some(next), now)
                            }
                            None => {
                                self.current_turn_index = start;
                                self.current_turn_started_at = Some(now);
                            }
                        }
                    }
                }
                self.check_winner();
            }
            Phase::Submit => match self.maybe_begin_playing(now) {
                Ok(true) => {
                    self.check_winner();
                }
                Ok(false) => {}
                Err(e) => {
                    tracing::warn!(room_id = %self.id, "Could not start playing after removal: {}", e);
                }
            },
            phase if phase.is_word_spy() => self.on_spy_player_gone(player_id, now),
            _ => {}
        }
        true
    }

    /// The player stopped being active without being removed. If they held
    /// the turn it goes to the next active player.
    pub(crate) fn on_player_inactive(&mut self, player_id: &str, now: DateTime<Utc>) -> Option<PlayerId> {
        if self.current_turn_player().map(String::as_str) != Some(player_id) {
            return None;
        }
        let from = self.current_turn_index + 1;
        let next = self.grant_turn_to_next_active(from, now)?;
        if next == player_id {
            return None;
        }
        self.audit(player_id, TimeoutKind::TurnSkipped, Some(next.clone()), now);
        tracing::info!(room_id = %self.id, player_id, next = %next, "Turn passed from inactive player");
        Some(next)
    }

    /// Apply heartbeat thresholds, turn deadlines and the spy playing timer
    pub fn sweep(&mut self, policy: &LivenessPolicy, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();
        // Ended rooms keep their records so a refresh can re-attach
        let kick_enabled = self.phase != Phase::Ended;

        for player in self.players.values_mut() {
            let idle = now.signed_duration_since(player.last_seen);
            if kick_enabled && idle > policy.kick_after {
                report.kicked.push(player.id.clone());
            } else if idle > policy.stale_after && !player.stale {
                player.stale = true;
                report.marked_stale.push(player.id.clone());
            }
        }
        report.kicked.sort();
        report.marked_stale.sort();

        for id in report.marked_stale.clone() {
            self.audit(&id, TimeoutKind::Stale, None, now);
            tracing::debug!(room_id = %self.id, player_id = %id, "Player stale");
        }
        for id in report.kicked.clone() {
            self.audit(&id, TimeoutKind::Kicked, None, now);
            self.remove_player(&id, now);
        }

        if let Some(holder) = self.current_turn_player().cloned() {
            let active = self.players.get(&holder).is_some_and(|p| p.is_active());
            if !active {
                report.turn_passed_to = self.on_player_inactive(&holder, now);
            } else if self.timed {
                let deadline = Duration::seconds(i64::from(self.turn_timeout_seconds));
                let expired = self
                    .current_turn_started_at
                    .is_some_and(|started| now.signed_duration_since(started) > deadline);
                if expired {
                    self.advance_turn(now);
                    let next = self.current_turn_player().cloned();
                    self.audit(&holder, TimeoutKind::TurnTimeout, next, now);
                    tracing::info!(room_id = %self.id, player_id = %holder, "Turn timed out");
                    report.turn_timed_out = true;
                }
            }
        }

        report.spy_timer_expired = self.expire_spy_timer(now);
        report
    }

    /// Remove anonymous players idle for longer than `ttl`. A finished room
    /// whose players have all been idle longer than `ended_cap` is emptied
    /// regardless of authentication.
    pub fn evict_expired(
        &mut self,
        ttl: Duration,
        ended_cap: Duration,
        now: DateTime<Utc>,
    ) -> EvictionReport {
        let abandoned = self.phase == Phase::Ended && self.all_players_idle(now, ended_cap);
        if abandoned {
            tracing::info!(room_id = %self.id, "Finished room abandoned");
        }
        let mut evicted: Vec<PlayerId> = self
            .players
            .values()
            .filter(|p| {
                abandoned || (!p.authenticated && now.signed_duration_since(p.last_seen) > ttl)
            })
            .map(|p| p.id.clone())
            .collect();
        evicted.sort();

        for id in &evicted {
            self.audit(id, TimeoutKind::Evicted, None, now);
            self.remove_player(id, now);
        }
        EvictionReport {
            room_deleted: !evicted.is_empty() && self.players.is_empty(),
            evicted,
        }
    }
}

impl AppState {
    pub async fn heartbeat(&self, room_id: &str, player_id: &str) -> GameResult<()> {
        self.with_room(room_id, |room| room.heartbeat(player_id, Utc::now()))
            .await
    }

    /// Refresh a player's heartbeat from socket traffic. A fresh player is
    /// updated in place without a version bump or snapshot; a stale one goes
    /// through a full commit so everyone sees them come back.
    pub async fn touch(&self, room_id: &str, player_id: &str) -> GameResult<()> {
        let handle = self
            .room_handle(room_id)
            .await
            .ok_or(GameError::RoomNotFound)?;
        {
            let mut room = handle.room.lock().await;
            if handle.is_removed() {
                return Err(GameError::RoomNotFound);
            }
            let player = room
                .players
                .get_mut(player_id)
                .ok_or(GameError::PlayerNotFound)?;
            if !player.stale {
                player.last_seen = Utc::now();
                return Ok(());
            }
        }
        self.heartbeat(room_id, player_id).await
    }

    /// One liveness pass over every room. Only rooms that changed are committed.
    pub async fn sweep_all(&self) -> Vec<(RoomId, SweepReport)> {
        let policy = LivenessPolicy::from_config(&self.config);
        let mut reports = Vec::new();
        for room_id in self.room_ids().await {
            let result = self
                .with_room_when(&room_id, |room| {
                    let report = room.sweep(&policy, Utc::now());
                    let changed = report.changed();
                    Ok((report, changed))
                })
                .await;
            match result {
                Ok(report) if report.changed() => reports.push((room_id, report)),
                Ok(_) | Err(GameError::RoomNotFound) => {}
                Err(e) => tracing::warn!(room_id = %room_id, "Sweep failed: {}", e),
            }
        }
        reports
    }

    /// TTL eviction over every room; rooms left empty are deleted
    pub async fn evict_all(&self) -> Vec<(RoomId, EvictionReport)> {
        let ttl = to_chrono(self.config.evict_ttl);
        let ended_cap = to_chrono(self.config.ended_room_ttl);
        let mut reports = Vec::new();
        for room_id in self.room_ids().await {
            let result = self
                .with_room_when(&room_id, |room| {
                    let report = room.evict_expired(ttl, ended_cap, Utc::now());
                    let changed = !report.evicted.is_empty();
                    Ok((report, changed))
                })
                .await;
            match result {
                Ok(report) if !report.evicted.is_empty() => reports.push((room_id, report)),
                Ok(_) | Err(GameError::RoomNotFound) => {}
                Err(e) => tracing::warn!(room_id = %room_id, "Eviction failed: {}", e),
            }
        }
        reports
    }
}
