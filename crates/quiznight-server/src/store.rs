use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex as SyncMutex;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, RwLock};

use quiznight_core::room::{Room, RoomId, generate_room_code};

/// One room plus its activity clock. The `tokio::sync::Mutex` serializes all
/// mutating operations for the room, giving a total per-room event order
/// while other rooms proceed in parallel.
pub struct RoomSlot {
    pub room: Mutex<Room>,
    last_activity: SyncMutex<Instant>,
}

impl RoomSlot {
    fn new(room: Room) -> Self {
        Self {
            room: Mutex::new(room),
            last_activity: SyncMutex::new(Instant::now()),
        }
    }

    /// Touch the activity clock (called on any event for the room).
    pub fn touch(&self) {
        *self.last_activity.lock().unwrap() = Instant::now();
    }

    pub fn idle_for(&self) -> Duration {
        self.last_activity.lock().unwrap().elapsed()
    }
}

/// In-memory room table. The outer lock guards only lookup/insert/remove;
/// room mutation happens under each slot's own lock.
#[derive(Default)]
pub struct RoomStore {
    rooms: RwLock<HashMap<RoomId, Arc<RoomSlot>>>,
}

impl RoomStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a freshly created room, returning its slot.
    pub async fn insert(&self, room: Room) -> Arc<RoomSlot> {
        let id = room.id.clone();
        let slot = Arc::new(RoomSlot::new(room));
        self.rooms.write().await.insert(id, Arc::clone(&slot));
        slot
    }

    /// Insert a freshly created room, regenerating its code under the write
    /// lock until it collides with no live room. Returns the stored room as
    /// inserted; two racing creations can never end up sharing a code.
    pub async fn insert_unique(&self, mut room: Room) -> Room {
        let mut rooms = self.rooms.write().await;
        while rooms.contains_key(&room.id) {
            room.id = generate_room_code();
        }
        let snapshot = room.clone();
        rooms.insert(room.id.clone(), Arc::new(RoomSlot::new(room)));
        snapshot
    }

    pub async fn get(&self, room_id: &str) -> Option<Arc<RoomSlot>> {
        self.rooms.read().await.get(room_id).map(Arc::clone)
    }

    pub async fn remove(&self, room_id: &str) -> Option<Arc<RoomSlot>> {
        self.rooms.write().await.remove(room_id)
    }

    pub async fn contains(&self, room_id: &str) -> bool {
        self.rooms.read().await.contains_key(room_id)
    }

    pub async fn len(&self) -> usize {
        self.rooms.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.rooms.read().await.is_empty()
    }

    /// Remove rooms idle longer than `max_idle`, returning their ids so the
    /// caller can purge dependent state (registry entries, chat feed).
    pub async fn sweep_idle(&self, max_idle: Duration) -> Vec<RoomId> {
        let mut rooms = self.rooms.write().await;
        let stale: Vec<RoomId> = rooms
            .iter()
            .filter(|(_, slot)| slot.idle_for() >= max_idle)
            .map(|(id, _)| id.clone())
            .collect();
        for id in &stale {
            rooms.remove(id);
        }
        stale
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiznight_core::test_helpers::make_room;

    #[tokio::test]
    async fn insert_get_remove() {
        let store = RoomStore::new();
        let room = make_room(1);
        let id = room.id.clone();

        store.insert(room).await;
        assert!(store.contains(&id).await);
        assert_eq!(store.len().await, 1);

        let slot = store.get(&id).await.unwrap();
        assert_eq!(slot.room.lock().await.id, id);

        store.remove(&id).await;
        assert!(!store.contains(&id).await);
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn insert_unique_regenerates_colliding_codes() {
        let store = RoomStore::new();
        let first = make_room(1);
        let mut second = make_room(1);
        second.id = first.id.clone();
        let taken = first.id.clone();

        store.insert_unique(first).await;
        let stored = store.insert_unique(second).await;
        assert_ne!(stored.id, taken);
        assert_eq!(store.len().await, 2);
        assert!(store.contains(&taken).await);
        assert!(store.contains(&stored.id).await);
    }

    #[tokio::test]
    async fn sweep_removes_only_idle_rooms() {
        let store = RoomStore::new();
        let fresh = make_room(1);
        let stale = make_room(1);
        let fresh_id = fresh.id.clone();
        let stale_id = stale.id.clone();

        store.insert(fresh).await;
        let stale_slot = store.insert(stale).await;
        *stale_slot.last_activity.lock().unwrap() = Instant::now() - Duration::from_secs(7200);

        let removed = store.sweep_idle(Duration::from_secs(3600)).await;
        assert_eq!(removed, vec![stale_id.clone()]);
        assert!(store.contains(&fresh_id).await);
        assert!(!store.contains(&stale_id).await);
    }

    #[tokio::test]
    async fn touch_resets_idle_clock() {
        let store = RoomStore::new();
        let slot = store.insert(make_room(1)).await;
        *slot.last_activity.lock().unwrap() = Instant::now() - Duration::from_secs(7200);
        slot.touch();
        assert!(slot.idle_for() < Duration::from_secs(1));
    }
}
