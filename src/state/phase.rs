use crate::error::{GameError, GameResult};
use crate::types::*;

/// Check if a phase transition is valid
pub(crate) fn is_valid_phase_transition(from: Phase, to: Phase) -> bool {
    use Phase::*;

    match (from, to) {
        // Word game
        (Lobby, Submit) => true,
        (Ended, Submit) => true, // rematch
        (Submit, Playing) => true,
        (Playing, Ended) => true,

        // Spy sub-mode
        (Lobby, WordspyWait) | (Ended, WordspyWait) => true,
        (WordspyWait, WordspyPlaying) => true,
        (WordspyPlaying, WordspyVoting) => true,
        (WordspyVoting, WordspySpyguess) => true,
        (WordspyReveal, WordspyWait) => true,
        (WordspyReveal, Ended) => true,
        // Voting and spy guesses end in reveal; the spy leaving ends any round early
        (WordspyWait | WordspyPlaying | WordspyVoting | WordspySpyguess, WordspyReveal) => true,

        // Idle-room reset
        (_, Lobby) => true,

        _ => false,
    }
}

impl Room {
    /// Move to a new phase, rejecting transitions the state machine does not allow
    pub fn transition(&mut self, to: Phase) -> GameResult<()> {
        if self.phase == to {
            return Ok(());
        }
        if !is_valid_phase_transition(self.phase, to) {
            return Err(GameError::BadPhase(self.phase));
        }
        tracing::info!(room_id = %self.id, from = ?self.phase, to = ?to, "Phase transition");
        self.phase = to;
        Ok(())
    }

    pub(crate) fn require_phase(&self, allowed: &[Phase]) -> GameResult<()> {
        if allowed.contains(&self.phase) {
            Ok(())
        } else {
            Err(GameError::BadPhase(self.phase))
        }
    }

    pub(crate) fn require_host(&self, player_id: &str, action: &'static str) -> GameResult<()> {
        if self.is_host(player_id) {
            Ok(())
        } else {
            Err(GameError::NotHost(action))
        }
    }
}
