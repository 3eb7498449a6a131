use serde::{Deserialize, Serialize};

use quiznight_core::player::PlayerId;
use quiznight_core::room::Room;

/// Locally cached room snapshot plus the identity used to join it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedRoom {
    pub room: Room,
    pub player_id: PlayerId,
    pub player_name: String,
    pub language: String,
}

/// Persistence seam for the cached snapshot. On the web build this is backed
/// by localStorage; tests use `MemoryStore`.
pub trait SnapshotStore {
    fn load(&self) -> Option<CachedRoom>;
    fn save(&mut self, cached: &CachedRoom);
    fn clear(&mut self);
}

/// In-memory store, used in tests and native builds.
#[derive(Debug, Default)]
pub struct MemoryStore {
    slot: Option<String>,
}

impl SnapshotStore for MemoryStore {
    fn load(&self) -> Option<CachedRoom> {
        let raw = self.slot.as_deref()?;
        match serde_json::from_str(raw) {
            Ok(cached) => Some(cached),
            Err(e) => {
                tracing::debug!(error = %e, "Discarding unreadable cached room");
                None
            },
        }
    }

    fn save(&mut self, cached: &CachedRoom) {
        match serde_json::to_string(cached) {
            Ok(raw) => self.slot = Some(raw),
            Err(e) => tracing::debug!(error = %e, "Failed to serialize cached room"),
        }
    }

    fn clear(&mut self) {
        self.slot = None;
    }
}
