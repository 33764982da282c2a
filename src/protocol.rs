use crate::error::GameError;
use crate::state::{GuessOutcome, SettingsUpdate, SpyGuessOutcome, VoteResolution};
use crate::types::*;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

pub const PROTOCOL_VERSION: &str = "1.0";

/// Audit entries included in a snapshot
pub const TIMEOUTS_IN_VIEW: usize = 20;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ClientMessage {
    Join {
        room_id: RoomId,
        #[serde(default)]
        name: String,
        #[serde(default)]
        account_id: Option<String>,
        #[serde(default)]
        device_id: Option<String>,
        #[serde(default)]
        password: Option<String>,
    },
    Heartbeat,
    Leave,
    // Host-only messages
    UpdateSettings {
        settings: SettingsUpdate,
    },
    StartGame {
        #[serde(default)]
        options: StartOptions,
    },
    Rematch,
    KickPlayer {
        player_id: PlayerId,
    },
    // Word game
    SubmitWord {
        word: String,
    },
    Guess {
        target_id: PlayerId,
        value: String,
    },
    SkipTurn,
    // Spy mode
    StartWordSpy {
        #[serde(default)]
        rounds: Option<u32>,
        #[serde(default)]
        timer_seconds: Option<u32>,
    },
    SpyReady {
        #[serde(default = "default_ready")]
        ready: bool,
    },
    SpyBeginRound {
        #[serde(default)]
        force: bool,
    },
    SpyEndPlaying,
    SpyVote {
        suspect_id: PlayerId,
    },
    SpyGuess {
        guess: String,
    },
    SpyNextRound,
}

fn default_ready() -> bool {
    true
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "t", rename_all = "snake_case")]
pub enum ServerMessage {
    Welcome {
        protocol: String,
        server_now: String,
        heartbeat_interval_ms: u64,
    },
    Joined {
        room_id: RoomId,
        player_id: PlayerId,
        token: String,
        is_host: bool,
        rejoined: bool,
    },
    /// Snapshot rendered for the receiving player
    Room {
        room: Box<RoomView>,
    },
    GuessResult {
        outcome: GuessOutcome,
    },
    SpyTally {
        tally: SpyTally,
        resolution: VoteResolution,
    },
    SpyGuessResult {
        outcome: SpyGuessOutcome,
    },
    Ack {
        action: String,
    },
    Error {
        code: String,
        msg: String,
    },
}

impl ServerMessage {
    pub fn ack(action: &str) -> Self {
        ServerMessage::Ack {
            action: action.to_string(),
        }
    }
}

impl From<GameError> for ServerMessage {
    fn from(err: GameError) -> Self {
        ServerMessage::Error {
            code: err.code().to_string(),
            msg: err.to_string(),
        }
    }
}

/// The viewer's own private guess history, keyed by target player
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PrivateView {
    pub private_wrong: HashMap<PlayerId, Vec<char>>,
    pub private_wrong_words: HashMap<PlayerId, Vec<String>>,
    pub private_hits: HashMap<PlayerId, Vec<PrivateHit>>,
    pub private_power_reveals: HashMap<PlayerId, Vec<char>>,
}

impl From<&Player> for PrivateView {
    fn from(p: &Player) -> Self {
        Self {
            private_wrong: p.private_wrong.clone(),
            private_wrong_words: p.private_wrong_words.clone(),
            private_hits: p.private_hits.clone(),
            private_power_reveals: p.private_power_reveals.clone(),
        }
    }
}

/// Public player info; `word` and `private` are only filled where the viewer may see them
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PlayerView {
    pub id: PlayerId,
    pub name: String,
    pub color: String,
    pub is_host: bool,
    pub has_word: bool,
    pub word_length: Option<usize>,
    pub word: Option<String>,
    pub wordmoney: Option<u32>,
    pub revealed: Vec<char>,
    pub guessed_by: BTreeMap<String, Vec<PlayerId>>,
    pub eliminated: bool,
    pub team: Option<TeamName>,
    pub last_seen: DateTime<Utc>,
    pub stale: bool,
    pub present: bool,
    pub frozen: bool,
    pub starter_bonus_awarded: bool,
    pub word_spy_ready: bool,
    pub word_spy_voted: bool,
    /// Only after the round is revealed
    pub word_spy_vote: Option<PlayerId>,
    pub word_spy_guesses: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub private: Option<PrivateView>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WordSpyView {
    /// Hidden from the spy until the round is revealed
    pub word: Option<String>,
    pub word_length: usize,
    /// Hidden from everyone but the spy until unmasked or revealed
    pub spy_id: Option<PlayerId>,
    pub is_spy: bool,
    pub timer_seconds: u32,
    pub rounds_remaining: u32,
    pub current_round: u32,
    pub state: WordSpyState,
    pub playing_started_at: Option<DateTime<Utc>>,
    pub voting_started_at: Option<DateTime<Utc>>,
    pub last_tally: Option<SpyTally>,
    pub last_reveal: Option<SpyReveal>,
    pub revealed: BTreeMap<String, usize>,
    pub reveal_sequence: Vec<SpyReveal>,
    pub last_round_summary: Option<RoundSummary>,
    pub round_results: Vec<AwardEntry>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoomView {
    pub id: RoomId,
    pub version: u64,
    pub server_now: DateTime<Utc>,
    pub viewer_id: Option<PlayerId>,
    pub host_id: Option<PlayerId>,
    pub phase: Phase,
    pub open: bool,
    pub has_password: bool,
    /// Only sent to the host
    pub password: Option<String>,
    /// Join order
    pub players: Vec<PlayerView>,
    pub teams: Option<BTreeMap<TeamName, Team>>,
    pub turn_order: Vec<PlayerId>,
    pub current_turn_index: usize,
    pub current_turn_player: Option<PlayerId>,
    pub current_turn_started_at: Option<DateTime<Utc>>,
    pub timed: bool,
    pub turn_timeout_seconds: u32,
    pub game_mode: GameMode,
    pub starting_money: u32,
    pub starter_bonus: StarterBonus,
    pub secret_word_theme: SecretWordTheme,
    pub word_spy: Option<WordSpyView>,
    /// Only sent to eliminated viewers
    pub ghost_challenge: Option<String>,
    pub timeouts: Vec<TimeoutEntry>,
    pub winner_id: Option<PlayerId>,
    pub winner_team: Option<TeamName>,
    pub warning: Option<String>,
}
