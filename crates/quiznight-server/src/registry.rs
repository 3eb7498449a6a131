use std::collections::HashMap;
use std::sync::RwLock;

use bytes::Bytes;
use tokio::sync::mpsc;

use quiznight_core::net::messages::ServerMessage;
use quiznight_core::net::protocol::encode_server_message;
use quiznight_core::player::{PlayerId, SocketId};
use quiznight_core::room::RoomId;

/// Per-player sender for outbound WebSocket binary messages.
/// Bounded to prevent memory exhaustion from slow clients.
/// Uses `Bytes` for zero-copy cloning when broadcasting.
pub type PlayerSender = mpsc::Sender<Bytes>;

/// What a socket id currently stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Binding {
    pub room_id: RoomId,
    pub player_id: PlayerId,
}

#[derive(Default)]
struct Inner {
    by_socket: HashMap<SocketId, Binding>,
    /// Per-room index of live outbound senders, keyed by socket id.
    rooms: HashMap<RoomId, HashMap<SocketId, PlayerSender>>,
}

/// Session bookkeeping: the only place that knows which live connection
/// currently represents a player. Entries are created on join/rejoin and
/// destroyed on disconnect or explicit leave; the Player entry in the room
/// outlives them.
#[derive(Default)]
pub struct ConnectionRegistry {
    inner: RwLock<Inner>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &self,
        socket_id: SocketId,
        room_id: RoomId,
        player_id: PlayerId,
        sender: PlayerSender,
    ) {
        let mut inner = self.inner.write().unwrap();
        // A socket re-registering (e.g. join after leave) moves cleanly.
        if let Some(old) = inner.by_socket.remove(&socket_id)
            && let Some(sockets) = inner.rooms.get_mut(&old.room_id)
        {
            sockets.remove(&socket_id);
        }
        inner
            .rooms
            .entry(room_id.clone())
            .or_default()
            .insert(socket_id, sender);
        inner
            .by_socket
            .insert(socket_id, Binding { room_id, player_id });
    }

    pub fn resolve(&self, socket_id: SocketId) -> Option<Binding> {
        self.inner.read().unwrap().by_socket.get(&socket_id).cloned()
    }

    /// Remove a connection. Returns the binding it held, if any.
    pub fn unregister(&self, socket_id: SocketId) -> Option<Binding> {
        let mut inner = self.inner.write().unwrap();
        let binding = inner.by_socket.remove(&socket_id)?;
        if let Some(sockets) = inner.rooms.get_mut(&binding.room_id) {
            sockets.remove(&socket_id);
            if sockets.is_empty() {
                inner.rooms.remove(&binding.room_id);
            }
        }
        Some(binding)
    }

    /// Drop every connection entry for a destroyed room.
    pub fn drop_room(&self, room_id: &str) {
        let mut inner = self.inner.write().unwrap();
        if let Some(sockets) = inner.rooms.remove(room_id) {
            for socket_id in sockets.keys() {
                inner.by_socket.remove(socket_id);
            }
        }
    }

    /// Number of live connections registered for a room.
    pub fn connection_count(&self, room_id: &str) -> usize {
        self.inner
            .read()
            .unwrap()
            .rooms
            .get(room_id)
            .map_or(0, HashMap::len)
    }

    /// Send a message to one connection. Fire-and-forget.
    pub fn send_to(&self, socket_id: SocketId, msg: &ServerMessage) {
        let Ok(data) = encode_server_message(msg) else {
            tracing::warn!(msg_type = ?msg.message_type(), "Failed to encode server message");
            return;
        };
        let inner = self.inner.read().unwrap();
        let Some(binding) = inner.by_socket.get(&socket_id) else {
            return;
        };
        if let Some(sender) = inner
            .rooms
            .get(&binding.room_id)
            .and_then(|sockets| sockets.get(&socket_id))
            && let Err(e) = sender.try_send(Bytes::from(data))
        {
            tracing::debug!(%socket_id, error = %e, "Failed to send to connection (slow or gone)");
        }
    }

    /// Broadcast fanout: deliver to every connection registered for the room.
    /// Fire-and-forget, at-least-once; clients tolerate duplicates.
    pub fn broadcast(&self, room_id: &str, msg: &ServerMessage) {
        self.fanout(room_id, None, msg);
    }

    /// Same as `broadcast`, skipping the originating connection when it
    /// already received a tailored response.
    pub fn broadcast_except(&self, room_id: &str, exclude: SocketId, msg: &ServerMessage) {
        self.fanout(room_id, Some(exclude), msg);
    }

    fn fanout(&self, room_id: &str, exclude: Option<SocketId>, msg: &ServerMessage) {
        let Ok(data) = encode_server_message(msg) else {
            tracing::warn!(msg_type = ?msg.message_type(), "Failed to encode broadcast");
            return;
        };
        let bytes = Bytes::from(data);
        let inner = self.inner.read().unwrap();
        if let Some(sockets) = inner.rooms.get(room_id) {
            for (&socket_id, sender) in sockets {
                if Some(socket_id) == exclude {
                    continue;
                }
                if let Err(e) = sender.try_send(bytes.clone()) {
                    tracing::debug!(
                        %socket_id, room = room_id, error = %e,
                        "Skipping broadcast to slow client"
                    );
                }
            }
        }
    }
}
