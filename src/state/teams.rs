use rand::seq::SliceRandom;
use rand::Rng;
use std::collections::BTreeMap;

use crate::types::*;

/// Minimum players for `lastTeamStanding`
pub const MIN_TEAM_PLAYERS: usize = 4;

impl Room {
    /// Split players into two teams by shuffling then alternating, seed each
    /// wallet with `team size x starting money`, and compensate smaller teams
    /// so wallets open balanced.
    pub(crate) fn assign_teams<R: Rng + ?Sized>(&mut self, starter_bonus_active: bool, rng: &mut R) {
        let mut ids: Vec<PlayerId> = self
            .players_in_join_order()
            .iter()
            .map(|p| p.id.clone())
            .collect();
        ids.shuffle(rng);

        let mut teams: BTreeMap<TeamName, Team> = TEAM_NAMES
            .iter()
            .map(|name| (name.to_string(), Team::default()))
            .collect();

        for (i, id) in ids.iter().enumerate() {
            let team_name = TEAM_NAMES[i % TEAM_NAMES.len()].to_string();
            if let Some(player) = self.players.get_mut(id) {
                player.team = Some(team_name.clone());
                player.wordmoney = None;
            }
            if let Some(team) = teams.get_mut(&team_name) {
                team.initial_count += 1;
            }
        }

        let largest = teams.values().map(|t| t.initial_count).max().unwrap_or(0);
        let per_head = self.starting_money
            + if starter_bonus_active {
                STARTER_BONUS_REWARD
            } else {
                0
            };
        for (name, team) in teams.iter_mut() {
            team.wordmoney = team.initial_count as u32 * self.starting_money;
            let missing = largest - team.initial_count;
            if missing > 0 {
                team.wordmoney += missing as u32 * per_head;
                team.compensation_applied = true;
                tracing::info!(
                    room_id = %self.id,
                    team = %name,
                    compensation = missing as u32 * per_head,
                    "Compensated smaller team"
                );
            }
        }

        self.teams = Some(teams);
    }

    /// Teams that still have at least one un-eliminated member
    pub(crate) fn surviving_teams(&self) -> Vec<TeamName> {
        let mut alive: Vec<TeamName> = self
            .players
            .values()
            .filter(|p| !p.eliminated)
            .filter_map(|p| p.team.clone())
            .collect();
        alive.sort();
        alive.dedup();
        alive
    }
}
