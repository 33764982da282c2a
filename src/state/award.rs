use crate::types::*;

impl Room {
    /// Credit a player, routing to the team wallet when the player's money
    /// lives there. Returns the wallet balance after the credit.
    ///
    /// Callers run inside the room transaction, so concurrent credits to the
    /// same wallet are serialized by the room lock.
    pub fn credit(&mut self, player_id: &str, amount: u32) -> Option<u32> {
        let team = self.players.get(player_id)?.team.clone();

        if self.game_mode == GameMode::LastTeamStanding {
            if let Some(team_name) = team {
                if let Some(team) = self
                    .teams
                    .as_mut()
                    .and_then(|teams| teams.get_mut(&team_name))
                {
                    team.wordmoney = team.wordmoney.saturating_add(amount);
                    return Some(team.wordmoney);
                }
            }
        }

        let player = self.players.get_mut(player_id)?;
        let balance = player.wordmoney.unwrap_or(0).saturating_add(amount);
        player.wordmoney = Some(balance);
        Some(balance)
    }

    /// Balance of the wallet a player's credits go to
    pub fn balance_of(&self, player_id: &str) -> Option<u32> {
        let player = self.players.get(player_id)?;
        if self.game_mode == GameMode::LastTeamStanding {
            if let Some(team) = player
                .team
                .as_ref()
                .and_then(|name| self.teams.as_ref()?.get(name))
            {
                return Some(team.wordmoney);
            }
        }
        Some(player.wordmoney.unwrap_or(0))
    }
}
