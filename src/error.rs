//! Typed rejections shared by the socket handlers and the HTTP guess endpoint.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use crate::types::Phase;

pub type GameResult<T> = Result<T, GameError>;

/// Every way a request can be rejected. Rejections never leave partial writes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GameError {
    #[error("Room not found")]
    RoomNotFound,

    #[error("Player not found")]
    PlayerNotFound,

    #[error("Join a room first")]
    NotJoined,

    #[error("Room is closed")]
    RoomClosed,

    #[error("Wrong room password")]
    WrongPassword,

    #[error("Only the host can {0}")]
    NotHost(&'static str),

    #[error("Not allowed during phase {0:?}")]
    BadPhase(Phase),

    #[error("Not your turn")]
    NotYourTurn,

    #[error("You cannot guess your own word")]
    SelfGuess,

    #[error("That player has not submitted a word")]
    NoWord,

    #[error("Already guessed")]
    AlreadyGuessed,

    #[error("Player is eliminated")]
    Eliminated,

    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error("'{word}' is not a valid {theme} word")]
    InvalidWord { word: String, theme: String },

    #[error("Word list for {0} is unavailable")]
    ThemeUnavailable(String),

    #[error("Need at least {0} players")]
    NotEnoughPlayers(usize),

    #[error("Not all players are ready")]
    NotReady,

    #[error("Only the spy can do that")]
    NotSpy,

    #[error("Guess must have {0} letters")]
    WrongLength(usize),

    #[error("No guesses left")]
    NoGuessesLeft,

    #[error("Invalid credentials")]
    Unauthorized,

    #[error("Credential does not grant access to this room")]
    Forbidden,
}

impl GameError {
    /// Stable code the UI switches on for its inline message
    pub fn code(&self) -> &'static str {
        match self {
            GameError::RoomNotFound => "ROOM_NOT_FOUND",
            GameError::PlayerNotFound => "PLAYER_NOT_FOUND",
            GameError::NotJoined => "NOT_JOINED",
            GameError::RoomClosed => "ROOM_CLOSED",
            GameError::WrongPassword => "WRONG_PASSWORD",
            GameError::NotHost(_) => "NOT_HOST",
            GameError::BadPhase(_) => "BAD_PHASE",
            GameError::NotYourTurn => "NOT_YOUR_TURN",
            GameError::SelfGuess => "SELF_GUESS",
            GameError::NoWord => "NO_WORD",
            GameError::AlreadyGuessed => "ALREADY_GUESSED",
            GameError::Eliminated => "ELIMINATED",
            GameError::Malformed(_) => "MALFORMED",
            GameError::InvalidWord { .. } => "INVALID_WORD",
            GameError::ThemeUnavailable(_) => "THEME_UNAVAILABLE",
            GameError::NotEnoughPlayers(_) => "NOT_ENOUGH_PLAYERS",
            GameError::NotReady => "NOT_READY",
            GameError::NotSpy => "NOT_SPY",
            GameError::WrongLength(_) => "WRONG_LENGTH",
            GameError::NoGuessesLeft => "NO_GUESSES_LEFT",
            GameError::Unauthorized => "UNAUTHORIZED",
            GameError::Forbidden => "FORBIDDEN",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            GameError::Unauthorized | GameError::NotJoined => StatusCode::UNAUTHORIZED,
            GameError::Forbidden | GameError::NotHost(_) => StatusCode::FORBIDDEN,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// JSON error payload `{code, msg}`
#[derive(Debug, Clone, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub msg: String,
}

impl From<&GameError> for ErrorBody {
    fn from(err: &GameError) -> Self {
        Self {
            code: err.code().to_string(),
            msg: err.to_string(),
        }
    }
}

impl IntoResponse for GameError {
    fn into_response(self) -> Response {
        (self.status(), Json(ErrorBody::from(&self))).into_response()
    }
}
