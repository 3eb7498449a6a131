use std::collections::{HashMap, HashSet};
use std::time::{Duration, Instant};

use quiznight_core::net::messages::{GetRoomStateMsg, JoinRoomMsg};
use quiznight_core::player::SocketId;
use quiznight_core::room::{Room, RoomId, RoomStatus};

use crate::cache::CachedRoom;

/// How long a rejoin may stay in flight before the UI falls back to the
/// last-known snapshot.
pub const REJOIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Minimum spacing between convergence polls for the same room.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Transport connection state as observed by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connection {
    Disconnected,
    Connected { socket_id: SocketId },
}

/// What the UI should do after a screen-focus reconciliation pass.
#[derive(Debug, Clone, PartialEq)]
pub enum FocusOutcome {
    /// Cached snapshot is current; no network call needed.
    TrustCache,
    /// Send this rejoin request (connecting first if necessary).
    Rejoin(JoinRoomMsg),
    /// Nothing cached; stay on the neutral screen.
    NoRoom,
}

/// Result of the bounded rejoin-fallback timer firing.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    Idle,
    /// Rejoin timed out; proceed with the stale snapshot rather than block.
    FallBackToCache(Option<Room>),
}

/// Per-client-session reconciliation state machine. Owns the cached room
/// snapshot, the in-flight rejoin flag, and the poll throttle; no ambient
/// globals.
#[derive(Debug, Default)]
pub struct RoomSession {
    cache: Option<CachedRoom>,
    rejoining: bool,
    rejoin_deadline: Option<Instant>,
    /// Sticky: once a room is observed started, it is never polled again.
    started_rooms: HashSet<RoomId>,
    last_poll: HashMap<RoomId, Instant>,
}

impl RoomSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached(&self) -> Option<&CachedRoom> {
        self.cache.as_ref()
    }

    pub fn is_rejoining(&self) -> bool {
        self.rejoining
    }

    /// Seed the cache after a create/join confirmed by the server.
    pub fn cache_room(&mut self, room: Room, player_id: String, name: String, language: String) {
        if room.status == RoomStatus::InProgress || room.status == RoomStatus::Finished {
            self.started_rooms.insert(room.id.clone());
        }
        self.cache = Some(CachedRoom {
            room,
            player_id,
            player_name: name,
            language,
        });
    }

    /// Screen-focus reconciliation (spec'd cache-vs-rejoin decision).
    pub fn on_focus(&mut self, now: Instant, connection: Connection) -> FocusOutcome {
        let Some(cached) = &self.cache else {
            return FocusOutcome::NoRoom;
        };

        // Trust the cache only when the live connection is the same one the
        // snapshot was taken over.
        if let Connection::Connected { socket_id } = connection {
            let matches_live = cached
                .room
                .player(&cached.player_id)
                .and_then(|p| p.socket_id)
                .is_some_and(|recorded| recorded == socket_id);
            if matches_live {
                return FocusOutcome::TrustCache;
            }
        }

        self.rejoining = true;
        self.rejoin_deadline = Some(now + REJOIN_TIMEOUT);
        FocusOutcome::Rejoin(JoinRoomMsg {
            room_id: cached.room.id.clone(),
            player_id: cached.player_id.clone(),
            player_name: cached.player_name.clone(),
            language: cached.language.clone(),
        })
    }

    /// Server confirmed the rejoin with a full snapshot.
    pub fn on_room_joined(&mut self, room: Room) {
        self.rejoining = false;
        self.rejoin_deadline = None;
        self.apply_snapshot(room);
    }

    /// Pushed state update. Applies a replace-if-newer merge and reports
    /// whether the push was accepted.
    pub fn on_push(&mut self, room: Room) -> bool {
        self.apply_snapshot(room)
    }

    /// A `game-started` push freezes polling for that room permanently.
    pub fn on_game_started(&mut self, room: Room) {
        self.started_rooms.insert(room.id.clone());
        self.apply_snapshot(room);
    }

    /// Room-level error from the server (room gone). Clears the cache so the
    /// UI returns to a neutral screen.
    pub fn on_room_gone(&mut self) {
        self.rejoining = false;
        self.rejoin_deadline = None;
        self.cache = None;
    }

    /// Drive the bounded fallback timer. The UI is never stuck waiting on a
    /// rejoin that will not answer.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        match self.rejoin_deadline {
            Some(deadline) if self.rejoining && now >= deadline => {
                self.rejoining = false;
                self.rejoin_deadline = None;
                tracing::debug!("Rejoin timed out, falling back to cached snapshot");
                TickOutcome::FallBackToCache(self.cache.as_ref().map(|c| c.room.clone()))
            },
            _ => TickOutcome::Idle,
        }
    }

    /// Rate-limited convergence poll. Returns the request to send, or None
    /// when throttled or the room has started.
    pub fn poll_request(&mut self, now: Instant) -> Option<GetRoomStateMsg> {
        let room_id = self.cache.as_ref()?.room.id.clone();
        if self.started_rooms.contains(&room_id) {
            return None;
        }
        if let Some(last) = self.last_poll.get(&room_id)
            && now.duration_since(*last) < POLL_INTERVAL
        {
            return None;
        }
        self.last_poll.insert(room_id.clone(), now);
        Some(GetRoomStateMsg { room_id })
    }

    /// Replace-if-newer merge: duplicates and stale reordered pushes must
    /// never rewind an observed game start.
    fn apply_snapshot(&mut self, room: Room) -> bool {
        if room.status == RoomStatus::InProgress || room.status == RoomStatus::Finished {
            self.started_rooms.insert(room.id.clone());
        }

        // Pushes for rooms we hold no cache for are ignored; the rejoin path
        // owns cache creation.
        let Some(cached) = &mut self.cache else {
            return false;
        };
        if cached.room.id != room.id {
            return false;
        }

        if self.started_rooms.contains(&room.id)
            && room.status.rank() < RoomStatus::InProgress.rank()
        {
            tracing::debug!(room = %room.id, status = ?room.status, "Dropping rewind push for started room");
            return false;
        }
        cached.room = room;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quiznight_core::test_helpers::make_room;
    use uuid::Uuid;

    fn session_with_cache(room: Room) -> RoomSession {
        let mut session = RoomSession::new();
        session.cache_room(
            room,
            "acct-1".to_string(),
            "Player1".to_string(),
            "en".to_string(),
        );
        session
    }

    #[test]
    fn focus_without_cache_stays_home() {
        let mut session = RoomSession::new();
        assert_eq!(
            session.on_focus(Instant::now(), Connection::Disconnected),
            FocusOutcome::NoRoom
        );
    }

    #[test]
    fn focus_with_matching_live_socket_trusts_cache() {
        let socket = Uuid::new_v4();
        let mut room = make_room(1);
        room.upsert_player(
            "acct-1".to_string(),
            "Player1".to_string(),
            "en".to_string(),
            socket,
        );
        let mut session = session_with_cache(room);

        let outcome = session.on_focus(Instant::now(), Connection::Connected { socket_id: socket });
        assert_eq!(outcome, FocusOutcome::TrustCache);
        assert!(!session.is_rejoining());
    }

    #[test]
    fn focus_after_reconnect_sends_rejoin() {
        let old_socket = Uuid::new_v4();
        let new_socket = Uuid::new_v4();
        let mut room = make_room(1);
        room.upsert_player(
            "acct-1".to_string(),
            "Player1".to_string(),
            "en".to_string(),
            old_socket,
        );
        let room_id = room.id.clone();
        let mut session = session_with_cache(room);

        let outcome = session.on_focus(
            Instant::now(),
            Connection::Connected {
                socket_id: new_socket,
            },
        );
        match outcome {
            FocusOutcome::Rejoin(msg) => {
                assert_eq!(msg.room_id, room_id);
                assert_eq!(msg.player_id, "acct-1");
            },
            other => panic!("expected Rejoin, got {other:?}"),
        }
        assert!(session.is_rejoining());
    }

    #[test]
    fn room_joined_clears_rejoining_and_replaces_cache() {
        let room = make_room(1);
        let mut session = session_with_cache(room.clone());
        session.on_focus(Instant::now(), Connection::Disconnected);
        assert!(session.is_rejoining());

        let mut updated = room;
        updated.name = "Renamed".to_string();
        session.on_room_joined(updated);
        assert!(!session.is_rejoining());
        assert_eq!(session.cached().unwrap().room.name, "Renamed");
    }

    #[test]
    fn rejoin_timeout_falls_back_to_cache() {
        let room = make_room(1);
        let start = Instant::now();
        let mut session = session_with_cache(room.clone());
        session.on_focus(start, Connection::Disconnected);

        assert_eq!(session.tick(start), TickOutcome::Idle);
        let after = start + REJOIN_TIMEOUT + Duration::from_millis(1);
        match session.tick(after) {
            TickOutcome::FallBackToCache(Some(snapshot)) => assert_eq!(snapshot.id, room.id),
            other => panic!("expected fallback, got {other:?}"),
        }
        assert!(!session.is_rejoining());
    }

    #[test]
    fn room_gone_clears_cache() {
        let mut session = session_with_cache(make_room(1));
        session.on_room_gone();
        assert!(session.cached().is_none());
        assert_eq!(
            session.on_focus(Instant::now(), Connection::Disconnected),
            FocusOutcome::NoRoom
        );
    }

    #[test]
    fn poll_is_throttled_per_room() {
        let mut session = session_with_cache(make_room(1));
        let start = Instant::now();

        assert!(session.poll_request(start).is_some());
        assert!(session.poll_request(start + Duration::from_millis(500)).is_none());
        assert!(session.poll_request(start + POLL_INTERVAL).is_some());
    }

    #[test]
    fn poll_suppressed_after_game_start() {
        let mut room = make_room(1);
        let mut session = session_with_cache(room.clone());

        room.status = RoomStatus::InProgress;
        session.on_game_started(room);

        assert!(session.poll_request(Instant::now()).is_none());
        // Sticky: still suppressed much later.
        assert!(
            session
                .poll_request(Instant::now() + Duration::from_secs(60))
                .is_none()
        );
    }

    #[test]
    fn rewind_push_rejected_after_start() {
        let mut room = make_room(1);
        let mut session = session_with_cache(room.clone());

        room.status = RoomStatus::InProgress;
        session.on_game_started(room.clone());

        let mut stale = room.clone();
        stale.status = RoomStatus::CategorySelecting;
        assert!(!session.on_push(stale));
        assert_eq!(
            session.cached().unwrap().room.status,
            RoomStatus::InProgress
        );

        // Forward pushes still apply.
        let mut finished = room;
        finished.status = RoomStatus::Finished;
        assert!(session.on_push(finished));
        assert_eq!(session.cached().unwrap().room.status, RoomStatus::Finished);
    }

    #[test]
    fn duplicate_push_is_idempotent() {
        let room = make_room(2);
        let mut session = session_with_cache(room.clone());
        assert!(session.on_push(room.clone()));
        assert!(session.on_push(room.clone()));
        assert_eq!(session.cached().unwrap().room, room);
    }
}
