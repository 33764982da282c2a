//! Bearer credentials for the hardened guess endpoint.
//!
//! A token is issued on join and binds one player to one room:
//! `hex(room_id).hex(player_id).hex(signature)`, where the signature is an
//! HMAC-SHA256 keyed with the server secret over both ids.

use axum::http::{header, HeaderMap};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::GameError;
use crate::types::{PlayerId, RoomId};

type HmacSha256 = Hmac<Sha256>;

/// Issues and verifies player tokens
#[derive(Clone)]
pub struct TokenSigner {
    mac: HmacSha256,
}

/// Identity proven by a verified token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claims {
    pub room_id: RoomId,
    pub player_id: PlayerId,
}

impl TokenSigner {
    pub fn new(secret: &[u8]) -> Self {
        // HMAC takes keys of any length; the fallback is never hit
        let mac = HmacSha256::new_from_slice(secret)
            .unwrap_or_else(|_| HmacSha256::new(&Default::default()));
        Self { mac }
    }

    fn keyed(&self, room_id: &str, player_id: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(room_id.as_bytes());
        mac.update(&[0u8]);
        mac.update(player_id.as_bytes());
        mac
    }

    pub fn issue(&self, room_id: &str, player_id: &str) -> String {
        format!(
            "{}.{}.{}",
            hex::encode(room_id),
            hex::encode(player_id),
            hex::encode(self.keyed(room_id, player_id).finalize().into_bytes())
        )
    }

    pub fn verify(&self, token: &str) -> Result<Claims, GameError> {
        let mut parts = token.trim().split('.');
        let (Some(room), Some(player), Some(sig), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(GameError::Unauthorized);
        };

        let decode = |part: &str| {
            hex::decode(part)
                .ok()
                .and_then(|bytes| String::from_utf8(bytes).ok())
                .ok_or(GameError::Unauthorized)
        };
        let room_id = decode(room)?;
        let player_id = decode(player)?;
        let sig = hex::decode(sig).map_err(|_| GameError::Unauthorized)?;

        self.keyed(&room_id, &player_id)
            .verify_slice(&sig)
            .map_err(|_| GameError::Unauthorized)?;
        Ok(Claims { room_id, player_id })
    }
}

/// Extract the token from an `Authorization: Bearer ...` header
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
