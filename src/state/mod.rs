mod award;
mod guess;
mod liveness;
mod phase;
mod room;
mod spy;
mod submission;
mod teams;
mod turn;
mod view;

pub use guess::GuessOutcome;
pub use liveness::{EvictionReport, LivenessPolicy, SweepReport};
pub use room::{JoinOutcome, JoinRequest, SettingsUpdate, StartOutcome};
pub use spy::{SpyGuessOutcome, VoteOutcome, VoteResolution};

use crate::auth::TokenSigner;
use crate::config::GameConfig;
use crate::error::{GameError, GameResult};
use crate::lookup::DefinitionProvider;
use crate::types::*;
use crate::words::ThemeRegistry;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex, RwLock};

/// One room aggregate behind its own lock, plus the channel its subscribers listen on
pub struct RoomHandle {
    pub room: Mutex<Room>,
    updates: broadcast::Sender<Arc<Room>>,
    removed: AtomicBool,
}

impl RoomHandle {
    fn new(room: Room) -> Self {
        let (tx, _rx) = broadcast::channel(64);
        Self {
            room: Mutex::new(room),
            updates: tx,
            removed: AtomicBool::new(false),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<Room>> {
        self.updates.subscribe()
    }

    /// Set once the room has been dropped from the registry; checked under the room lock
    pub fn is_removed(&self) -> bool {
        self.removed.load(Ordering::SeqCst)
    }

    fn publish(&self, room: &Room) {
        // No subscribers is fine
        let _ = self.updates.send(Arc::new(room.clone()));
    }
}

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<RoomId, Arc<RoomHandle>>>>,
    pub config: Arc<GameConfig>,
    pub themes: Arc<ThemeRegistry>,
    pub tokens: TokenSigner,
    pub dictionary: Option<Arc<dyn DefinitionProvider>>,
}

impl AppState {
    pub fn new() -> Self {
        Self::with_config(GameConfig::default(), ThemeRegistry::builtin())
    }

    pub fn with_config(config: GameConfig, themes: ThemeRegistry) -> Self {
        let tokens = TokenSigner::new(config.token_secret.as_bytes());
        Self {
            rooms: Arc::new(RwLock::new(HashMap::new())),
            config: Arc::new(config),
            themes: Arc::new(themes),
            tokens,
            dictionary: None,
        }
    }

    pub fn with_dictionary(mut self, provider: Arc<dyn DefinitionProvider>) -> Self {
        self.dictionary = Some(provider);
        self
    }

    pub async fn room_handle(&self, room_id: &str) -> Option<Arc<RoomHandle>> {
        self.rooms.read().await.get(room_id).cloned()
    }

    /// Current snapshot of a room
    pub async fn get_room(&self, room_id: &str) -> Option<Room> {
        let handle = self.room_handle(room_id).await?;
        let room = handle.room.lock().await;
        if handle.is_removed() {
            return None;
        }
        Some(room.clone())
    }

    pub async fn room_count(&self) -> usize {
        self.rooms.read().await.len()
    }

    /// Run one logical operation against a room as a single transaction.
    ///
    /// The closure works on a draft; the draft replaces the room only when the
    /// closure succeeds, so a rejection never leaves partial writes. Committed
    /// changes bump the version and are pushed to subscribers. A room left
    /// without players is deleted.
    pub async fn with_room<T, F>(&self, room_id: &str, f: F) -> GameResult<T>
    where
        F: FnOnce(&mut Room) -> GameResult<T>,
    {
        self.with_room_when(room_id, |room| f(room).map(|value| (value, true)))
            .await
    }

    /// Like [`with_room`](Self::with_room), but the closure decides whether
    /// the draft is worth committing. Used by the background jobs so an idle
    /// sweep does not bump the version.
    pub async fn with_room_when<T, F>(&self, room_id: &str, f: F) -> GameResult<T>
    where
        F: FnOnce(&mut Room) -> GameResult<(T, bool)>,
    {
        let handle = self
            .room_handle(room_id)
            .await
            .ok_or(GameError::RoomNotFound)?;
        let mut room = handle.room.lock().await;
        if handle.is_removed() {
            return Err(GameError::RoomNotFound);
        }

        let mut draft = room.clone();
        let (value, changed) = f(&mut draft)?;
        if !changed {
            return Ok(value);
        }
        draft.version += 1;
        *room = draft;

        if room.players.is_empty() {
            self.remove_room_locked(&handle, &room).await;
        } else {
            handle.publish(&room);
        }
        Ok(value)
    }

    /// Drop a room from the registry. Caller holds the room lock.
    async fn remove_room_locked(&self, handle: &Arc<RoomHandle>, room: &Room) {
        handle.removed.store(true, Ordering::SeqCst);
        let mut rooms = self.rooms.write().await;
        if let Some(existing) = rooms.get(&room.id) {
            if Arc::ptr_eq(existing, handle) {
                rooms.remove(&room.id);
            }
        }
        tracing::info!(room_id = %room.id, "Room deleted");
    }

    /// Ids of every live room, without holding the registry lock afterwards
    pub(crate) async fn room_ids(&self) -> Vec<RoomId> {
        self.rooms.read().await.keys().cloned().collect()
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
