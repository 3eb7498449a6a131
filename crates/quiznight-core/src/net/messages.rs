use serde::{Deserialize, Serialize};

use crate::player::{Player, PlayerId};
use crate::question::Question;
use crate::room::{Room, RoomId, RoomSettings};
use crate::scoring::GamePoints;

/// Network message type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum MessageType {
    // Client -> Server
    CreateRoom = 0x01,
    JoinRoom = 0x02,
    RejoinRoom = 0x03,
    LeaveRoom = 0x04,
    GetRoomState = 0x05,
    SetCategory = 0x06,
    RequestQuestions = 0x07,
    StartGame = 0x08,
    PlayAgain = 0x09,
    SubmitAnswer = 0x0A,
    SubmitGameResults = 0x0B,
    GetGameResults = 0x0C,

    // Server -> Client
    RoomCreated = 0x10,
    RoomJoined = 0x11,
    PlayerJoined = 0x12,
    PlayerRejoined = 0x13,
    PlayerLeft = 0x14,
    RoomStateUpdated = 0x15,
    CategoryChanged = 0x16,
    HostChanged = 0x17,
    ShowStartQuiz = 0x18,
    GameStarted = 0x19,
    GameResults = 0x1A,
    Error = 0x1B,

    // Chat feed (both directions, outside the room state machine)
    ChatMessage = 0x20,
    PlayerTyping = 0x21,
    ChatRelay = 0x22,
    TypingStatus = 0x23,
}

impl MessageType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0x01 => Self::CreateRoom,
            0x02 => Self::JoinRoom,
            0x03 => Self::RejoinRoom,
            0x04 => Self::LeaveRoom,
            0x05 => Self::GetRoomState,
            0x06 => Self::SetCategory,
            0x07 => Self::RequestQuestions,
            0x08 => Self::StartGame,
            0x09 => Self::PlayAgain,
            0x0A => Self::SubmitAnswer,
            0x0B => Self::SubmitGameResults,
            0x0C => Self::GetGameResults,
            0x10 => Self::RoomCreated,
            0x11 => Self::RoomJoined,
            0x12 => Self::PlayerJoined,
            0x13 => Self::PlayerRejoined,
            0x14 => Self::PlayerLeft,
            0x15 => Self::RoomStateUpdated,
            0x16 => Self::CategoryChanged,
            0x17 => Self::HostChanged,
            0x18 => Self::ShowStartQuiz,
            0x19 => Self::GameStarted,
            0x1A => Self::GameResults,
            0x1B => Self::Error,
            0x20 => Self::ChatMessage,
            0x21 => Self::PlayerTyping,
            0x22 => Self::ChatRelay,
            0x23 => Self::TypingStatus,
            _ => return None,
        })
    }
}

// ---- Client -> Server payloads ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateRoomMsg {
    pub room_name: String,
    pub host_id: PlayerId,
    pub host_name: String,
    pub host_language: String,
    pub settings: RoomSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRoomMsg {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    pub player_name: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeaveRoomMsg {
    pub room_id: RoomId,
    pub player_id: PlayerId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetRoomStateMsg {
    pub room_id: RoomId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetCategoryMsg {
    pub room_id: RoomId,
    pub category: String,
    pub topic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestQuestionsMsg {
    pub room_id: RoomId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StartGameMsg {
    pub room_id: RoomId,
    /// Applied only when the room holds no questions yet (write-once).
    pub questions: Option<Vec<Question>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayAgainMsg {
    pub room_id: RoomId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitAnswerMsg {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    pub answer: String,
    /// Seconds left on the question clock; informational only.
    pub time_remaining: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitGameResultsMsg {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    pub player_name: String,
    pub game_points: GamePoints,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetGameResultsMsg {
    pub room_id: RoomId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageMsg {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerTypingMsg {
    pub room_id: RoomId,
    pub player_id: PlayerId,
    pub is_typing: bool,
}

// ---- Server -> Client payloads ----

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomCreatedMsg {
    pub room_id: RoomId,
    pub room: Room,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomJoinedMsg {
    pub room: Room,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerJoinedMsg {
    pub player: Player,
    pub room: Room,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRejoinedMsg {
    pub player: Player,
    pub room: Room,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerLeftMsg {
    pub player_id: PlayerId,
    pub player_name: String,
    pub room: Room,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomStateUpdatedMsg {
    pub room: Room,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryChangedMsg {
    pub category: String,
    pub topic: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostChangedMsg {
    pub new_host: Player,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowStartQuizMsg {
    pub room: Room,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameStartedMsg {
    pub room: Room,
    pub questions: Vec<Question>,
}

/// One ranked entry on the results screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalScore {
    pub player_id: PlayerId,
    pub player_name: String,
    pub game_points: GamePoints,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameResultsMsg {
    pub final_scores: Vec<FinalScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorMsg {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRelayMsg {
    pub player_id: PlayerId,
    pub player_name: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingStatusMsg {
    pub player_id: PlayerId,
    pub is_typing: bool,
}

// ---- Envelopes ----

#[derive(Debug, Clone, PartialEq)]
pub enum ClientMessage {
    CreateRoom(CreateRoomMsg),
    JoinRoom(JoinRoomMsg),
    RejoinRoom(JoinRoomMsg),
    LeaveRoom(LeaveRoomMsg),
    GetRoomState(GetRoomStateMsg),
    SetCategory(SetCategoryMsg),
    RequestQuestions(RequestQuestionsMsg),
    StartGame(StartGameMsg),
    PlayAgain(PlayAgainMsg),
    SubmitAnswer(SubmitAnswerMsg),
    SubmitGameResults(SubmitGameResultsMsg),
    GetGameResults(GetGameResultsMsg),
    ChatMessage(ChatMessageMsg),
    PlayerTyping(PlayerTypingMsg),
}

impl ClientMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::CreateRoom(_) => MessageType::CreateRoom,
            Self::JoinRoom(_) => MessageType::JoinRoom,
            Self::RejoinRoom(_) => MessageType::RejoinRoom,
            Self::LeaveRoom(_) => MessageType::LeaveRoom,
            Self::GetRoomState(_) => MessageType::GetRoomState,
            Self::SetCategory(_) => MessageType::SetCategory,
            Self::RequestQuestions(_) => MessageType::RequestQuestions,
            Self::StartGame(_) => MessageType::StartGame,
            Self::PlayAgain(_) => MessageType::PlayAgain,
            Self::SubmitAnswer(_) => MessageType::SubmitAnswer,
            Self::SubmitGameResults(_) => MessageType::SubmitGameResults,
            Self::GetGameResults(_) => MessageType::GetGameResults,
            Self::ChatMessage(_) => MessageType::ChatMessage,
            Self::PlayerTyping(_) => MessageType::PlayerTyping,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ServerMessage {
    RoomCreated(RoomCreatedMsg),
    RoomJoined(RoomJoinedMsg),
    PlayerJoined(PlayerJoinedMsg),
    PlayerRejoined(PlayerRejoinedMsg),
    PlayerLeft(PlayerLeftMsg),
    RoomStateUpdated(RoomStateUpdatedMsg),
    CategoryChanged(CategoryChangedMsg),
    HostChanged(HostChangedMsg),
    ShowStartQuiz(ShowStartQuizMsg),
    GameStarted(Box<GameStartedMsg>),
    GameResults(GameResultsMsg),
    Error(ErrorMsg),
    ChatRelay(ChatRelayMsg),
    TypingStatus(TypingStatusMsg),
}

impl ServerMessage {
    pub fn message_type(&self) -> MessageType {
        match self {
            Self::RoomCreated(_) => MessageType::RoomCreated,
            Self::RoomJoined(_) => MessageType::RoomJoined,
            Self::PlayerJoined(_) => MessageType::PlayerJoined,
            Self::PlayerRejoined(_) => MessageType::PlayerRejoined,
            Self::PlayerLeft(_) => MessageType::PlayerLeft,
            Self::RoomStateUpdated(_) => MessageType::RoomStateUpdated,
            Self::CategoryChanged(_) => MessageType::CategoryChanged,
            Self::HostChanged(_) => MessageType::HostChanged,
            Self::ShowStartQuiz(_) => MessageType::ShowStartQuiz,
            Self::GameStarted(_) => MessageType::GameStarted,
            Self::GameResults(_) => MessageType::GameResults,
            Self::Error(_) => MessageType::Error,
            Self::ChatRelay(_) => MessageType::ChatRelay,
            Self::TypingStatus(_) => MessageType::TypingStatus,
        }
    }
}
