use chrono::{DateTime, Utc};
use std::collections::VecDeque;

use super::AppState;
use crate::error::{GameError, GameResult};
use crate::types::*;

impl Room {
    /// Build the rotation for a new game.
    ///
    /// Non-team modes use join order. `lastTeamStanding` interleaves teams,
    /// starting with a team other than the one that held the last turn of the
    /// previous game and always popping from the next non-empty team in
    /// rotation; unteamed players go last.
    pub(crate) fn build_turn_order(&self) -> Vec<PlayerId> {
        let players: Vec<&Player> = self
            .players_in_join_order()
            .into_iter()
            .filter(|p| !p.eliminated)
            .collect();

        if self.game_mode != GameMode::LastTeamStanding {
            return players.iter().map(|p| p.id.clone()).collect();
        }

        let mut queues: Vec<(TeamName, VecDeque<PlayerId>)> = Vec::new();
        let mut unteamed = Vec::new();
        for player in &players {
            match &player.team {
                Some(team) => match queues.iter_mut().find(|(name, _)| name == team) {
                    Some((_, queue)) => queue.push_back(player.id.clone()),
                    None => queues.push((team.clone(), VecDeque::from([player.id.clone()]))),
                },
                None => unteamed.push(player.id.clone()),
            }
        }
        queues.sort_by(|a, b| a.0.cmp(&b.0));

        if let Some(last) = &self.last_turn_team {
            if let Some(pos) = queues.iter().position(|(name, _)| name == last) {
                let n = queues.len();
                if n > 1 {
                    queues.rotate_left((pos + 1) % n);
                }
            }
        }

        let total: usize = queues.iter().map(|(_, q)| q.len()).sum();
        let mut order = Vec::with_capacity(total + unteamed.len());
        let mut next = 0;
        while order.len() < total {
            for offset in 0..queues.len() {
                let idx = (next + offset) % queues.len();
                if let Some(id) = queues[idx].1.pop_front() {
                    order.push(id);
                    next = idx + 1;
                    break;
                }
            }
        }
        order.extend(unteamed);
        order
    }

    /// Pass the turn to the next player in rotation, consuming one freeze
    /// from any frozen player that gets skipped. When everyone else is frozen
    /// the turn moves on normally and no freeze is consumed.
    pub(crate) fn advance_turn(&mut self, now: DateTime<Utc>) {
        let len = self.turn_order.len();
        if len == 0 {
            self.current_turn_index = 0;
            return;
        }

        let current = self.current_turn_index;
        let mut next = (current + 1) % len;
        let all_others_frozen = self
            .turn_order
            .iter()
            .enumerate()
            .filter(|(idx, _)| *idx != current % len)
            .all(|(_, id)| self.players.get(id).is_some_and(|p| p.frozen));
        if all_others_frozen {
            self.current_turn_index = next;
            self.current_turn_started_at = Some(now);
            return;
        }

        for _ in 0..len {
            let id = &self.turn_order[next];
            match self.players.get_mut(id) {
                Some(player) if player.frozen => {
                    player.frozen = false;
                    player.frozen_until_turn_index = None;
                    tracing::debug!(room_id = %self.id, player_id = %id, "Skipped frozen player");
                    next = (next + 1) % len;
                }
                _ => break,
            }
        }

        self.current_turn_index = next;
        self.current_turn_started_at = Some(now);
    }

    /// Drop a player from the rotation. When the removed slot was at or before
    /// the current index the index moves back so that a following
    /// `advance_turn` lands on the player who would have been next.
    /// Returns the removed index.
    pub(crate) fn remove_from_turn_order(&mut self, player_id: &str) -> Option<usize> {
        let removed = self.turn_order.iter().position(|id| id == player_id)?;
        self.turn_order.remove(removed);
        if removed <= self.current_turn_index {
            self.current_turn_index = self.current_turn_index.saturating_sub(1);
        }
        if self.current_turn_index >= self.turn_order.len() {
            self.current_turn_index = 0;
        }
        Some(removed)
    }

    /// Hand the turn to the next active player after `from`, scanning forward
    /// cyclically. Returns the new turn holder.
    pub(crate) fn grant_turn_to_next_active(
        &mut self,
        from: usize,
        now: DateTime<Utc>,
    ) -> Option<PlayerId> {
        let len = self.turn_order.len();
        if len == 0 {
            return None;
        }
        for offset in 0..len {
            let idx = (from + offset) % len;
            let id = &self.turn_order[idx];
            if self.players.get(id).is_some_and(|p| p.is_active()) {
                self.current_turn_index = idx;
                self.current_turn_started_at = Some(now);
                return Some(id.clone());
            }
        }
        None
    }

    /// Voluntarily end one's own turn
    pub fn skip_turn(&mut self, player_id: &str, now: DateTime<Utc>) -> GameResult<()> {
        self.require_phase(&[Phase::Playing])?;
        if self.current_turn_player().map(String::as_str) != Some(player_id) {
            return Err(GameError::NotYourTurn);
        }
        self.advance_turn(now);
        tracing::info!(room_id = %self.id, player_id, "Turn skipped");
        Ok(())
    }

    /// End the game if the win condition for the mode is met.
    /// Returns true when the room moved to `ended`.
    pub(crate) fn check_winner(&mut self) -> bool {
        if self.phase != Phase::Playing {
            return false;
        }

        let finished = match self.game_mode {
            GameMode::LastTeamStanding if self.teams.is_some() => {
                let alive = self.surviving_teams();
                if alive.len() <= 1 {
                    self.winner_team = alive.into_iter().next();
                    true
                } else {
                    false
                }
            }
            _ => {
                let alive: Vec<&Player> =
                    self.players.values().filter(|p| !p.eliminated).collect();
                if alive.len() <= 1 {
                    self.winner_id = alive.first().map(|p| p.id.clone());
                    true
                } else {
                    false
                }
            }
        };

        if finished {
            self.last_turn_team = self
                .current_turn_player()
                .and_then(|id| self.players.get(id))
                .and_then(|p| p.team.clone());
            self.phase = Phase::Ended;
            tracing::info!(
                room_id = %self.id,
                winner_id = ?self.winner_id,
                winner_team = ?self.winner_team,
                "Game ended"
            );
        }
        finished
    }
}

impl AppState {
    pub async fn skip_turn(&self, room_id: &str, player_id: &str) -> GameResult<()> {
        self.with_room(room_id, |room| room.skip_turn(player_id, Utc::now()))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::{now, playing_room, room_with};

    fn set_team(room: &mut Room, id: &str, team: &str) {
        room.players.get_mut(id).unwrap().team = Some(team.to_string());
    }

    #[test]
    fn test_join_order_for_single_player_modes() {
        let room = room_with(&["p1", "p2", "p3"]);
        assert_eq!(room.build_turn_order(), vec!["p1", "p2", "p3"]);
    }

    #[test]
    fn test_teams_alternate() {
        let mut room = room_with(&["p1", "p2", "p3", "p4"]);
        room.game_mode = GameMode::LastTeamStanding;
        set_team(&mut room, "p1", "blue");
        set_team(&mut room, "p3", "blue");
        set_team(&mut room, "p2", "red");
        set_team(&mut room, "p4", "red");

        let order = room.build_turn_order();
        assert_eq!(order.len(), 4);
        for pair in order.windows(2) {
            let a = room.players[&pair[0]].team.clone();
            let b = room.players[&pair[1]].team.clone();
            assert_ne!(a, b, "same team back to back in {order:?}");
        }
    }

    #[test]
    fn test_start_team_differs_from_last_turn_team() {
        let mut room = room_with(&["p1", "p2", "p3", "p4"]);
        room.game_mode = GameMode::LastTeamStanding;
        set_team(&mut room, "p1", "blue");
        set_team(&mut room, "p3", "blue");
        set_team(&mut room, "p2", "red");
        set_team(&mut room, "p4", "red");

        room.last_turn_team = Some("blue".to_string());
        let order = room.build_turn_order();
        assert_eq!(room.players[&order[0]].team.as_deref(), Some("red"));

        room.last_turn_team = Some("red".to_string());
        let order = room.build_turn_order();
        assert_eq!(room.players[&order[0]].team.as_deref(), Some("blue"));
    }

    #[test]
    fn test_uneven_teams_maximize_alternation() {
        let mut room = room_with(&["a1", "a2", "a3", "b1", "b2", "x"]);
        room.game_mode = GameMode::LastTeamStanding;
        for id in ["a1", "a2", "a3"] {
            set_team(&mut room, id, "blue");
        }
        for id in ["b1", "b2"] {
            set_team(&mut room, id, "red");
        }

        let order = room.build_turn_order();
        assert_eq!(order, vec!["a1", "b1", "a2", "b2", "a3", "x"]);
    }

    #[test]
    fn test_advance_wraps() {
        let mut room = playing_room(&[("p1", "cat"), ("p2", "dog")]);
        room.advance_turn(now());
        assert_eq!(room.current_turn_player().unwrap(), "p2");
        room.advance_turn(now());
        assert_eq!(room.current_turn_player().unwrap(), "p1");
    }

    #[test]
    fn test_advance_skips_frozen_once() {
        let mut room = playing_room(&[("p1", "cat"), ("p2", "dog"), ("p3", "cow")]);
        room.players.get_mut("p2").unwrap().frozen = true;

        room.advance_turn(now());
        assert_eq!(room.current_turn_player().unwrap(), "p3");
        assert!(!room.players["p2"].frozen);

        room.advance_turn(now());
        room.advance_turn(now());
        assert_eq!(room.current_turn_player().unwrap(), "p2");
    }

    #[test]
    fn test_advance_keeps_freezes_when_everyone_else_is_frozen() {
        let mut room = playing_room(&[("p1", "cat"), ("p2", "dog"), ("p3", "cow")]);
        room.players.get_mut("p2").unwrap().frozen = true;
        room.players.get_mut("p3").unwrap().frozen = true;

        room.advance_turn(now());
        assert_eq!(room.current_turn_player().unwrap(), "p2");
        assert!(room.players["p2"].frozen);
        assert!(room.players["p3"].frozen);
    }

    #[test]
    fn test_remove_before_current_keeps_next_player() {
        let mut room = playing_room(&[("a", "x"), ("b", "x"), ("c", "x"), ("d", "x")]);
        room.current_turn_index = 2; // c
        room.remove_from_turn_order("a");
        assert_eq!(room.current_turn_player().unwrap(), "c");
        room.advance_turn(now());
        assert_eq!(room.current_turn_player().unwrap(), "d");
    }

    #[test]
    fn test_remove_after_current_keeps_index() {
        let mut room = playing_room(&[("a", "x"), ("b", "x"), ("c", "x"), ("d", "x")]);
        room.remove_from_turn_order("c");
        assert_eq!(room.current_turn_index, 0);
        room.advance_turn(now());
        assert_eq!(room.current_turn_player().unwrap(), "b");
        room.advance_turn(now());
        assert_eq!(room.current_turn_player().unwrap(), "d");
    }

    #[test]
    fn test_skip_turn_requires_turn() {
        let mut room = playing_room(&[("p1", "cat"), ("p2", "dog")]);
        assert_eq!(room.skip_turn("p2", now()), Err(GameError::NotYourTurn));
        assert!(room.skip_turn("p1", now()).is_ok());
        assert_eq!(room.current_turn_player().unwrap(), "p2");
    }

    #[test]
    fn test_winner_last_one_standing() {
        let mut room = playing_room(&[("p1", "cat"), ("p2", "dog")]);
        assert!(!room.check_winner());
        room.players.get_mut("p1").unwrap().eliminated = true;
        assert!(room.check_winner());
        assert_eq!(room.phase, Phase::Ended);
        assert_eq!(room.winner_id.as_deref(), Some("p2"));
    }

    #[test]
    fn test_grant_turn_skips_inactive() {
        let mut room = playing_room(&[("p1", "cat"), ("p2", "dog"), ("p3", "cow")]);
        room.players.get_mut("p2").unwrap().stale = true;
        let holder = room.grant_turn_to_next_active(1, now());
        assert_eq!(holder.as_deref(), Some("p3"));
        assert_eq!(room.current_turn_index, 2);
    }
}
