use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Opaque ID types for type safety
pub type RoomId = String;
pub type PlayerId = String;
pub type TeamName = String;

/// Display names are truncated to this many characters
pub const MAX_NAME_CHARS: usize = 14;

/// Key under `guessed_by` that records full-word guessers
pub const WORD_GUESS_KEY: &str = "__word";

/// Rewards
pub const LETTER_REWARD: u32 = 2;
pub const WORD_REWARD: u32 = 5;
pub const TURN_START_BONUS: u32 = 1;
pub const STARTER_BONUS_REWARD: u32 = 10;
pub const SPY_CORRECT_VOTE_REWARD: u32 = 4;
pub const SPY_ESCAPE_REWARD: u32 = 5;
pub const SPY_MINORITY_VOTE_REWARD: u32 = 3;
/// Spy payout by attempt number (1st, 2nd, 3rd)
pub const SPY_GUESS_REWARDS: [u32; 3] = [5, 3, 2];

/// Team names used by `lastTeamStanding`, in rotation order
pub const TEAM_NAMES: [&str; 2] = ["red", "blue"];

/// Fixed avatar palette
pub const COLOR_PALETTE: &[&str] = &[
    "#e6194b", "#3cb44b", "#ffe119", "#4363d8", "#f58231", "#911eb4", "#46f0f0", "#f032e6",
    "#bcf60c", "#fabebe", "#008080", "#e6beff", "#9a6324", "#800000", "#aaffc3", "#000075",
];

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Lobby,
    Submit,
    Playing,
    Ended,
    WordspyWait,
    WordspyPlaying,
    WordspyVoting,
    WordspySpyguess,
    WordspyReveal,
}

impl Phase {
    pub fn is_word_spy(&self) -> bool {
        matches!(
            self,
            Phase::WordspyWait
                | Phase::WordspyPlaying
                | Phase::WordspyVoting
                | Phase::WordspySpyguess
                | Phase::WordspyReveal
        )
    }

    /// Phases from which the host may start a fresh game
    pub fn can_start(&self) -> bool {
        matches!(self, Phase::Lobby | Phase::Ended)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum GameMode {
    #[default]
    LastOneStanding,
    LastTeamStanding,
    /// Legacy mode: no team wallets, no starter-bonus reveal
    Money,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Animals,
    Colours,
    Elements,
    Countries,
    Occupations,
    Instruments,
}

impl Theme {
    pub const ALL: [Theme; 6] = [
        Theme::Animals,
        Theme::Colours,
        Theme::Elements,
        Theme::Countries,
        Theme::Occupations,
        Theme::Instruments,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Animals => "animals",
            Theme::Colours => "colours",
            Theme::Elements => "elements",
            Theme::Countries => "countries",
            Theme::Occupations => "occupations",
            Theme::Instruments => "instruments",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SecretWordTheme {
    pub enabled: bool,
    #[serde(rename = "type")]
    pub kind: Theme,
}

impl Default for SecretWordTheme {
    fn default() -> Self {
        Self {
            enabled: true,
            kind: Theme::Animals,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum StarterBonusKind {
    #[default]
    Contains,
}

/// Per-game rule rewarding words that contain a randomly drawn letter
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StarterBonus {
    pub enabled: bool,
    #[serde(rename = "type")]
    pub kind: StarterBonusKind,
    pub value: Option<char>,
    pub description: String,
    /// Set once the letter has been publicly revealed at game start
    pub applied: bool,
}

impl Default for StarterBonus {
    fn default() -> Self {
        Self {
            enabled: true,
            kind: StarterBonusKind::Contains,
            value: None,
            description: String::new(),
            applied: false,
        }
    }
}

impl StarterBonus {
    /// The active letter, if the rule is enabled and drawn
    pub fn active_letter(&self) -> Option<char> {
        if self.enabled {
            self.value
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct Team {
    pub wordmoney: u32,
    pub initial_count: usize,
    pub compensation_applied: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TimeoutKind {
    Stale,
    Kicked,
    HostKick,
    Evicted,
    TurnSkipped,
    TurnTimeout,
}

/// Append-only audit entry for liveness-driven changes
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TimeoutEntry {
    pub player_id: PlayerId,
    pub kind: TimeoutKind,
    pub ts: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_player_id: Option<PlayerId>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum GuessKind {
    Letter,
    Word,
}

/// A processed guess, kept in the room's audit queue
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GuessRequest {
    pub from: PlayerId,
    pub target: PlayerId,
    #[serde(rename = "type")]
    pub kind: GuessKind,
    pub value: String,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PrivateHit {
    Letter {
        letter: char,
        count: usize,
        ts: DateTime<Utc>,
    },
    Word {
        word: String,
        ts: DateTime<Utc>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub word: Option<String>,
    pub has_word: bool,
    /// None while the player's money lives on a team wallet
    pub wordmoney: Option<u32>,
    pub revealed: Vec<char>,
    pub guessed_by: BTreeMap<String, Vec<PlayerId>>,
    pub eliminated: bool,
    pub team: Option<TeamName>,
    pub color: String,
    pub last_seen: DateTime<Utc>,
    pub stale: bool,
    pub present: bool,
    pub left_at: Option<DateTime<Utc>>,
    /// Joined with an account id; exempt from TTL eviction
    pub authenticated: bool,
    pub join_seq: u64,
    pub frozen: bool,
    pub frozen_until_turn_index: Option<usize>,
    /// Keyed by target player id
    pub private_wrong: HashMap<PlayerId, Vec<char>>,
    pub private_wrong_words: HashMap<PlayerId, Vec<String>>,
    pub private_hits: HashMap<PlayerId, Vec<PrivateHit>>,
    pub private_power_reveals: HashMap<PlayerId, Vec<char>>,
    pub starter_bonus_awarded: bool,
    pub word_spy_ready: bool,
    pub word_spy_vote: Option<PlayerId>,
    pub word_spy_guesses: Vec<String>,
}

impl Player {
    pub fn new(
        id: PlayerId,
        name: String,
        color: String,
        join_seq: u64,
        starting_money: u32,
        authenticated: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            word: None,
            has_word: false,
            wordmoney: Some(starting_money),
            revealed: Vec::new(),
            guessed_by: BTreeMap::new(),
            eliminated: false,
            team: None,
            color,
            last_seen: now,
            stale: false,
            present: true,
            left_at: None,
            authenticated,
            join_seq,
            frozen: false,
            frozen_until_turn_index: None,
            private_wrong: HashMap::new(),
            private_wrong_words: HashMap::new(),
            private_hits: HashMap::new(),
            private_power_reveals: HashMap::new(),
            starter_bonus_awarded: false,
            word_spy_ready: false,
            word_spy_vote: None,
            word_spy_guesses: Vec::new(),
        }
    }

    /// Clear everything tied to a single game, keeping identity and liveness
    pub fn reset_for_game(&mut self, starting_money: u32) {
        self.word = None;
        self.has_word = false;
        self.wordmoney = Some(starting_money);
        self.revealed.clear();
        self.guessed_by.clear();
        self.eliminated = false;
        self.team = None;
        self.frozen = false;
        self.frozen_until_turn_index = None;
        self.private_wrong.clear();
        self.private_wrong_words.clear();
        self.private_hits.clear();
        self.private_power_reveals.clear();
        self.starter_bonus_awarded = false;
        self.reset_word_spy();
    }

    pub fn reset_word_spy(&mut self) {
        self.word_spy_ready = false;
        self.word_spy_vote = None;
        self.word_spy_guesses.clear();
    }

    /// Heartbeat within the stale threshold and still in the room
    pub fn is_active(&self) -> bool {
        self.present && !self.stale
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum WordSpyState {
    Waiting,
    Playing,
    Voting,
    SpyGuess,
    SpyWon,
    SpyFailed,
    SpyWonByWrongGuess,
    Ended,
}

impl WordSpyState {
    /// Room phase mirroring this session state
    pub fn phase(&self) -> Phase {
        match self {
            WordSpyState::Waiting => Phase::WordspyWait,
            WordSpyState::Playing => Phase::WordspyPlaying,
            WordSpyState::Voting => Phase::WordspyVoting,
            WordSpyState::SpyGuess => Phase::WordspySpyguess,
            WordSpyState::SpyWon
            | WordSpyState::SpyFailed
            | WordSpyState::SpyWonByWrongGuess
            | WordSpyState::Ended => Phase::WordspyReveal,
        }
    }

    pub fn is_revealed(&self) -> bool {
        self.phase() == Phase::WordspyReveal
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct SpyTally {
    pub counts: BTreeMap<PlayerId, usize>,
    pub votes_cast: usize,
    pub majority_needed: usize,
    pub majority_pick: Option<PlayerId>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SpyReveal {
    pub attempt: usize,
    pub guess: String,
    pub letters: Vec<char>,
    pub correct: bool,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum AwardReason {
    CorrectVote,
    SpyEscaped,
    MinorityVote,
    SpyGuessedWord,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AwardEntry {
    pub round: u32,
    pub player_id: PlayerId,
    pub amount: u32,
    pub reason: AwardReason,
    pub ts: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RoundSummary {
    pub round: u32,
    pub spy_id: PlayerId,
    pub word: String,
    pub outcome: WordSpyState,
    pub majority_pick: Option<PlayerId>,
    pub awards: Vec<AwardEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WordSpySession {
    pub word: String,
    pub spy_id: PlayerId,
    pub timer_seconds: u32,
    pub rounds_remaining: u32,
    pub current_round: u32,
    pub state: WordSpyState,
    pub started_at: DateTime<Utc>,
    pub playing_started_at: Option<DateTime<Utc>>,
    pub voting_started_at: Option<DateTime<Utc>>,
    pub last_tally: Option<SpyTally>,
    pub last_reveal: Option<SpyReveal>,
    /// letter -> number of occurrences known to be in the word
    pub revealed: BTreeMap<String, usize>,
    pub reveal_sequence: Vec<SpyReveal>,
    pub last_round_summary: Option<RoundSummary>,
    /// Append-only award ledger spanning every round of the session
    pub round_results: Vec<AwardEntry>,
}

/// Options chosen by the host when starting a game
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StartOptions {
    #[serde(default)]
    pub timed: bool,
    #[serde(default = "default_turn_timeout")]
    pub turn_timeout_seconds: u32,
    #[serde(default = "default_true")]
    pub starter_bonus: bool,
    #[serde(default)]
    pub game_mode: Option<GameMode>,
}

fn default_turn_timeout() -> u32 {
    60
}

fn default_true() -> bool {
    true
}

impl Default for StartOptions {
    fn default() -> Self {
        Self {
            timed: false,
            turn_timeout_seconds: default_turn_timeout(),
            starter_bonus: true,
            game_mode: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Room {
    pub id: RoomId,
    pub version: u64,
    pub created_at: DateTime<Utc>,
    pub host_id: Option<PlayerId>,
    pub phase: Phase,
    pub open: bool,
    pub password: Option<String>,
    pub players: HashMap<PlayerId, Player>,
    pub teams: Option<BTreeMap<TeamName, Team>>,
    pub turn_order: Vec<PlayerId>,
    pub current_turn_index: usize,
    pub current_turn_started_at: Option<DateTime<Utc>>,
    pub timed: bool,
    pub turn_timeout_seconds: u32,
    pub game_mode: GameMode,
    pub starting_money: u32,
    pub starter_bonus: StarterBonus,
    pub secret_word_theme: SecretWordTheme,
    pub word_spy: Option<WordSpySession>,
    pub ghost_challenge: Option<String>,
    pub queue: Vec<GuessRequest>,
    pub timeouts: Vec<TimeoutEntry>,
    pub winner_id: Option<PlayerId>,
    pub winner_team: Option<TeamName>,
    /// Room-visible warning, e.g. too few players for team mode
    pub warning: Option<String>,
    pub last_turn_team: Option<TeamName>,
    pub last_start: Option<StartOptions>,
    pub next_join_seq: u64,
}

impl Room {
    pub fn new(id: RoomId, starting_money: u32, now: DateTime<Utc>) -> Self {
        Self {
            id,
            version: 1,
            created_at: now,
            host_id: None,
            phase: Phase::Lobby,
            open: true,
            password: None,
            players: HashMap::new(),
            teams: None,
            turn_order: Vec::new(),
            current_turn_index: 0,
            current_turn_started_at: None,
            timed: false,
            turn_timeout_seconds: default_turn_timeout(),
            game_mode: GameMode::default(),
            starting_money,
            starter_bonus: StarterBonus::default(),
            secret_word_theme: SecretWordTheme::default(),
            word_spy: None,
            ghost_challenge: None,
            queue: Vec::new(),
            timeouts: Vec::new(),
            winner_id: None,
            winner_team: None,
            warning: None,
            last_turn_team: None,
            last_start: None,
            next_join_seq: 0,
        }
    }

    /// Players sorted by join order
    pub fn players_in_join_order(&self) -> Vec<&Player> {
        let mut players: Vec<&Player> = self.players.values().collect();
        players.sort_by_key(|p| p.join_seq);
        players
    }

    /// The player whose guess is currently valid
    pub fn current_turn_player(&self) -> Option<&PlayerId> {
        if self.phase != Phase::Playing {
            return None;
        }
        self.turn_order.get(self.current_turn_index)
    }

    pub fn is_host(&self, player_id: &str) -> bool {
        self.host_id.as_deref() == Some(player_id)
    }
}
