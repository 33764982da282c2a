//! HTTP endpoints next to the socket: the hardened guess path, the
//! dictionary proxy and a health probe.

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::bearer_token;
use crate::error::{ErrorBody, GameError};
use crate::state::AppState;
use crate::types::{PlayerId, RoomId};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GuessRequest {
    pub room_id: RoomId,
    pub target_id: PlayerId,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub rooms: usize,
}

/// Resolve a guess on behalf of the bearer of a join token.
///
/// POST /api/guess
///
/// The guesser identity comes from the token only, never from the body.
pub async fn submit_guess(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Result<Json<GuessRequest>, JsonRejection>,
) -> Response {
    let claims = match bearer_token(&headers).map(|t| state.tokens.verify(t)) {
        Some(Ok(claims)) => claims,
        Some(Err(e)) => return e.into_response(),
        None => return GameError::Unauthorized.into_response(),
    };

    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!("Rejected guess body: {}", rejection.body_text());
            return GameError::Malformed(rejection.body_text()).into_response();
        }
    };

    if claims.room_id != request.room_id {
        tracing::warn!(
            room_id = %request.room_id,
            token_room = %claims.room_id,
            "Guess token used for another room"
        );
        return GameError::Forbidden.into_response();
    }

    let member = state
        .get_room(&request.room_id)
        .await
        .is_some_and(|room| room.players.contains_key(&claims.player_id));
    if !member {
        return GameError::Forbidden.into_response();
    }

    match state
        .submit_guess(
            &request.room_id,
            &claims.player_id,
            &request.target_id,
            &request.value,
        )
        .await
    {
        Ok(outcome) => Json(outcome).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Look up a word in the configured dictionary.
///
/// GET /api/define/{word}
pub async fn define_word(
    State(state): State<Arc<AppState>>,
    Path(word): Path<String>,
) -> Response {
    let word = word.trim().to_lowercase();
    if word.is_empty() || !word.chars().all(|c| c.is_ascii_lowercase()) {
        return GameError::Malformed("word must be letters a-z".to_string()).into_response();
    }

    let Some(dictionary) = state.dictionary.clone() else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(ErrorBody {
                code: "LOOKUP_DISABLED".to_string(),
                msg: "No dictionary configured".to_string(),
            }),
        )
            .into_response();
    };

    match dictionary.define(&word).await {
        Ok(definition) => Json(definition).into_response(),
        Err(e) => {
            tracing::warn!(word = %word, "Definition lookup failed: {}", e);
            (
                StatusCode::BAD_GATEWAY,
                Json(ErrorBody {
                    code: e.code().to_string(),
                    msg: e.to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        rooms: state.room_count().await,
    })
}
