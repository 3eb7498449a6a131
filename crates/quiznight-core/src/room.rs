use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::player::{Player, PlayerId, SocketId};
use crate::question::{Difficulty, Question};

/// Shareable room code, e.g. `QUIZ-4821`.
pub type RoomId = String;

/// Room lifecycle status. Moves forward only (see `can_transition`), except
/// the `Finished -> Lobby` play-again reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoomStatus {
    Lobby,
    CategorySelecting,
    QuestionsGenerating,
    Countdown,
    InProgress,
    Finished,
}

impl RoomStatus {
    /// Ordering rank used by clients for replace-if-newer merges.
    pub fn rank(self) -> u8 {
        match self {
            Self::Lobby => 0,
            Self::CategorySelecting => 1,
            Self::QuestionsGenerating => 2,
            Self::Countdown => 3,
            Self::InProgress => 4,
            Self::Finished => 5,
        }
    }

    /// Whether `self -> to` is a legal coordinator transition.
    pub fn can_transition(self, to: RoomStatus) -> bool {
        matches!(
            (self, to),
            (Self::Lobby, Self::CategorySelecting)
                | (Self::CategorySelecting, Self::QuestionsGenerating)
                | (Self::QuestionsGenerating, Self::Countdown)
                // Generator failure rolls back; the only backward edge
                // before the game starts.
                | (Self::QuestionsGenerating, Self::CategorySelecting)
                // A host supplying a ready-made question set skips the
                // generation phase.
                | (Self::Lobby, Self::Countdown)
                | (Self::CategorySelecting, Self::Countdown)
                | (Self::Countdown, Self::InProgress)
                | (Self::InProgress, Self::Finished)
                | (Self::Finished, Self::Lobby)
        )
    }
}

/// Host-configured game settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomSettings {
    pub question_count: u32,
    /// Per-question time limit in seconds.
    pub time_limit: u32,
    pub categories: Vec<String>,
    pub difficulty: Difficulty,
}

impl Default for RoomSettings {
    fn default() -> Self {
        Self {
            question_count: 10,
            time_limit: 30,
            categories: Vec::new(),
            difficulty: Difficulty::Medium,
        }
    }
}

/// Outcome of `upsert_player`: whether an existing entry was re-bound or a
/// new one appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Joined,
    Rejoined,
}

/// One multiplayer quiz session. All mutation goes through the coordinator,
/// which holds the per-room lock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Room {
    pub id: RoomId,
    pub name: String,
    pub host_player_id: PlayerId,
    /// Insertion order is join order; used as the host-migration tie-break.
    pub players: Vec<Player>,
    pub settings: RoomSettings,
    pub status: RoomStatus,
    pub selected_category: Option<String>,
    pub selected_topic: Option<String>,
    /// Written exactly once, at the transition into `Countdown`.
    pub questions: Option<Vec<Question>>,
    /// Unix timestamp in milliseconds.
    pub created_at: u64,
}

impl Room {
    pub fn new(name: String, mut host: Player, settings: RoomSettings) -> Self {
        host.socket_id = None;
        let host_player_id = host.id.clone();
        Self {
            id: generate_room_code(),
            name,
            host_player_id,
            players: vec![host],
            settings,
            status: RoomStatus::Lobby,
            selected_category: None,
            selected_topic: None,
            questions: None,
            created_at: unix_millis(),
        }
    }

    pub fn player(&self, player_id: &str) -> Option<&Player> {
        self.players.iter().find(|p| p.id == player_id)
    }

    pub fn player_mut(&mut self, player_id: &str) -> Option<&mut Player> {
        self.players.iter_mut().find(|p| p.id == player_id)
    }

    pub fn is_host(&self, player_id: &str) -> bool {
        self.host_player_id == player_id
    }

    /// Join-or-rejoin merge. An existing entry with the same account id is
    /// re-bound to the new connection in place; otherwise a new Player is
    /// appended. The player list never grows a duplicate id.
    pub fn upsert_player(
        &mut self,
        player_id: PlayerId,
        name: String,
        language: String,
        socket_id: SocketId,
    ) -> JoinKind {
        if let Some(existing) = self.player_mut(&player_id) {
            existing.socket_id = Some(socket_id);
            existing.name = name;
            existing.language = language;
            JoinKind::Rejoined
        } else {
            let mut player = Player::new(player_id, name, language);
            player.socket_id = Some(socket_id);
            self.players.push(player);
            JoinKind::Joined
        }
    }

    /// Mark a player disconnected without removing them. Disconnection is
    /// not the same event as leaving.
    pub fn detach_socket(&mut self, socket_id: SocketId) {
        for p in &mut self.players {
            if p.socket_id == Some(socket_id) {
                p.socket_id = None;
            }
        }
    }

    /// Remove a player on explicit leave. Returns the removed entry and, if
    /// host authority moved, the new host's id. The caller destroys the room
    /// when the list comes back empty.
    pub fn remove_player(&mut self, player_id: &str) -> Option<(Player, Option<PlayerId>)> {
        let idx = self.players.iter().position(|p| p.id == player_id)?;
        let removed = self.players.remove(idx);

        let new_host = if self.host_player_id == player_id && !self.players.is_empty() {
            let next = self.next_host();
            self.host_player_id = next.clone();
            Some(next)
        } else {
            None
        };

        Some((removed, new_host))
    }

    /// Deterministic host-migration policy: earliest surviving joiner among
    /// connected players, falling back to the earliest joiner outright.
    fn next_host(&self) -> PlayerId {
        self.players
            .iter()
            .find(|p| p.is_connected())
            .or_else(|| self.players.first())
            .map(|p| p.id.clone())
            .unwrap_or_default()
    }

    /// Apply a status change, refusing edges `can_transition` rejects. The
    /// room is untouched on a refusal.
    pub fn transition(&mut self, to: RoomStatus) -> bool {
        if !self.status.can_transition(to) {
            return false;
        }
        self.status = to;
        true
    }

    /// Host-only category selection; also drives `Lobby -> CategorySelecting`.
    pub fn set_category(&mut self, category: String, topic: Option<String>) {
        self.selected_category = Some(category);
        self.selected_topic = topic;
        if self.status == RoomStatus::Lobby {
            self.transition(RoomStatus::CategorySelecting);
        }
    }

    /// Write-once question assignment. Returns false (and leaves the room
    /// untouched) if questions were already set.
    pub fn set_questions(&mut self, questions: Vec<Question>) -> bool {
        if self.questions.is_some() {
            return false;
        }
        self.questions = Some(questions);
        true
    }

    /// Whether every currently connected player has answered all questions.
    pub fn all_answered(&self) -> bool {
        let connected: Vec<&Player> = self.players.iter().filter(|p| p.is_connected()).collect();
        !connected.is_empty()
            && connected
                .iter()
                .all(|p| p.answers_submitted >= self.settings.question_count)
    }

    /// Play-again reset: semantics of a new room sharing the same id.
    pub fn reset_for_replay(&mut self) {
        self.transition(RoomStatus::Lobby);
        self.questions = None;
        self.selected_category = None;
        self.selected_topic = None;
        for p in &mut self.players {
            p.ready = false;
            p.answers_submitted = 0;
            p.score = 0;
            p.game_points = None;
        }
    }
}

fn unix_millis() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

/// Generate a shareable room code in `AAAA-0000` format.
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    let letters: String = (0..4)
        .map(|_| rng.random_range(b'A'..=b'Z') as char)
        .collect();
    let digits: u16 = rng.random_range(0..10_000);
    format!("{letters}-{digits:04}")
}

/// Validate the `AAAA-0000` room code format before any store lookup.
pub fn is_valid_room_code(code: &str) -> bool {
    let bytes = code.as_bytes();
    bytes.len() == 9
        && bytes[..4].iter().all(|b| b.is_ascii_uppercase())
        && bytes[4] == b'-'
        && bytes[5..].iter().all(|b| b.is_ascii_digit())
}
