use crate::types::{PlayerId, RoomId};

/// What a socket is bound to after a successful join
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    /// Bearer credential for `POST /api/guess`
    pub token: String,
}
