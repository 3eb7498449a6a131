use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::scoring::GamePoints;

/// Stable account identifier from the external identity provider.
/// Identifies a person; survives reconnects.
pub type PlayerId = String;

/// Transport-connection identifier. Identifies a connection; a new one is
/// issued on every reconnect.
pub type SocketId = Uuid;

/// A player entry inside a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    /// Absent while the player is present-but-disconnected.
    pub socket_id: Option<SocketId>,
    pub name: String,
    pub language: String,
    pub ready: bool,
    /// Questions this player has submitted answers for in the current game.
    pub answers_submitted: u32,
    /// Convenience mirror of the reported total, for lobby display.
    pub score: u32,
    pub game_points: Option<GamePoints>,
}

impl Player {
    pub fn new(id: PlayerId, name: String, language: String) -> Self {
        Self {
            id,
            socket_id: None,
            name,
            language,
            ready: false,
            answers_submitted: 0,
            score: 0,
            game_points: None,
        }
    }

    /// Whether a live connection currently represents this player.
    pub fn is_connected(&self) -> bool {
        self.socket_id.is_some()
    }
}
