use serde::{Deserialize, Serialize};

use super::messages::{
    CategoryChangedMsg, ChatMessageMsg, ChatRelayMsg, ClientMessage, CreateRoomMsg, ErrorMsg,
    GameResultsMsg, GameStartedMsg, GetGameResultsMsg, GetRoomStateMsg, HostChangedMsg,
    JoinRoomMsg, LeaveRoomMsg, MessageType, PlayAgainMsg, PlayerJoinedMsg, PlayerLeftMsg,
    PlayerRejoinedMsg, PlayerTypingMsg, RequestQuestionsMsg, RoomCreatedMsg, RoomJoinedMsg,
    RoomStateUpdatedMsg, ServerMessage, SetCategoryMsg, ShowStartQuizMsg, StartGameMsg,
    SubmitAnswerMsg, SubmitGameResultsMsg, TypingStatusMsg,
};

/// Current protocol version.
pub const PROTOCOL_VERSION: u8 = 1;

/// Maximum message payload size in bytes.
pub const MAX_MESSAGE_SIZE: usize = 64 * 1024; // 64 KiB

#[derive(Debug)]
pub enum ProtocolError {
    EmptyMessage,
    UnknownMessageType(u8),
    PayloadTooLarge(usize),
    SerializeError(String),
    DeserializeError(String),
}

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMessage => write!(f, "empty message"),
            Self::UnknownMessageType(b) => write!(f, "unknown message type: 0x{b:02x}"),
            Self::PayloadTooLarge(size) => {
                write!(
                    f,
                    "payload too large: {size} bytes (max {MAX_MESSAGE_SIZE})"
                )
            },
            Self::SerializeError(e) => write!(f, "serialize error: {e}"),
            Self::DeserializeError(e) => write!(f, "deserialize error: {e}"),
        }
    }
}

impl std::error::Error for ProtocolError {}

/// Encode a serializable payload with a 1-byte type prefix.
pub fn encode_message<T: Serialize>(
    msg_type: MessageType,
    payload: &T,
) -> Result<Vec<u8>, ProtocolError> {
    let payload_bytes =
        rmp_serde::to_vec(payload).map_err(|e| ProtocolError::SerializeError(e.to_string()))?;
    let total = 1 + payload_bytes.len();
    if total > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::PayloadTooLarge(total));
    }
    let mut buf = Vec::with_capacity(total);
    buf.push(msg_type as u8);
    buf.extend_from_slice(&payload_bytes);
    Ok(buf)
}

/// Encode a `ClientMessage` to wire format.
pub fn encode_client_message(msg: &ClientMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ClientMessage::CreateRoom(m) => encode_message(MessageType::CreateRoom, m),
        ClientMessage::JoinRoom(m) => encode_message(MessageType::JoinRoom, m),
        ClientMessage::RejoinRoom(m) => encode_message(MessageType::RejoinRoom, m),
        ClientMessage::LeaveRoom(m) => encode_message(MessageType::LeaveRoom, m),
        ClientMessage::GetRoomState(m) => encode_message(MessageType::GetRoomState, m),
        ClientMessage::SetCategory(m) => encode_message(MessageType::SetCategory, m),
        ClientMessage::RequestQuestions(m) => encode_message(MessageType::RequestQuestions, m),
        ClientMessage::StartGame(m) => encode_message(MessageType::StartGame, m),
        ClientMessage::PlayAgain(m) => encode_message(MessageType::PlayAgain, m),
        ClientMessage::SubmitAnswer(m) => encode_message(MessageType::SubmitAnswer, m),
        ClientMessage::SubmitGameResults(m) => encode_message(MessageType::SubmitGameResults, m),
        ClientMessage::GetGameResults(m) => encode_message(MessageType::GetGameResults, m),
        ClientMessage::ChatMessage(m) => encode_message(MessageType::ChatMessage, m),
        ClientMessage::PlayerTyping(m) => encode_message(MessageType::PlayerTyping, m),
    }
}

/// Encode a `ServerMessage` to wire format.
pub fn encode_server_message(msg: &ServerMessage) -> Result<Vec<u8>, ProtocolError> {
    match msg {
        ServerMessage::RoomCreated(m) => encode_message(MessageType::RoomCreated, m),
        ServerMessage::RoomJoined(m) => encode_message(MessageType::RoomJoined, m),
        ServerMessage::PlayerJoined(m) => encode_message(MessageType::PlayerJoined, m),
        ServerMessage::PlayerRejoined(m) => encode_message(MessageType::PlayerRejoined, m),
        ServerMessage::PlayerLeft(m) => encode_message(MessageType::PlayerLeft, m),
        ServerMessage::RoomStateUpdated(m) => encode_message(MessageType::RoomStateUpdated, m),
        ServerMessage::CategoryChanged(m) => encode_message(MessageType::CategoryChanged, m),
        ServerMessage::HostChanged(m) => encode_message(MessageType::HostChanged, m),
        ServerMessage::ShowStartQuiz(m) => encode_message(MessageType::ShowStartQuiz, m),
        ServerMessage::GameStarted(m) => encode_message(MessageType::GameStarted, m.as_ref()),
        ServerMessage::GameResults(m) => encode_message(MessageType::GameResults, m),
        ServerMessage::Error(m) => encode_message(MessageType::Error, m),
        ServerMessage::ChatRelay(m) => encode_message(MessageType::ChatRelay, m),
        ServerMessage::TypingStatus(m) => encode_message(MessageType::TypingStatus, m),
    }
}

/// Extract the message type byte from raw wire data.
pub fn decode_message_type(data: &[u8]) -> Result<MessageType, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    MessageType::from_byte(data[0]).ok_or(ProtocolError::UnknownMessageType(data[0]))
}

/// Decode a MessagePack payload (bytes after the type prefix).
pub fn decode_payload<T: for<'de> Deserialize<'de>>(data: &[u8]) -> Result<T, ProtocolError> {
    if data.is_empty() {
        return Err(ProtocolError::EmptyMessage);
    }
    rmp_serde::from_slice(&data[1..]).map_err(|e| ProtocolError::DeserializeError(e.to_string()))
}

/// Decode raw wire data into a `ClientMessage`.
pub fn decode_client_message(data: &[u8]) -> Result<ClientMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::CreateRoom => Ok(ClientMessage::CreateRoom(
            decode_payload::<CreateRoomMsg>(data)?,
        )),
        MessageType::JoinRoom => Ok(ClientMessage::JoinRoom(decode_payload::<JoinRoomMsg>(
            data,
        )?)),
        MessageType::RejoinRoom => Ok(ClientMessage::RejoinRoom(decode_payload::<JoinRoomMsg>(
            data,
        )?)),
        MessageType::LeaveRoom => Ok(ClientMessage::LeaveRoom(decode_payload::<LeaveRoomMsg>(
            data,
        )?)),
        MessageType::GetRoomState => Ok(ClientMessage::GetRoomState(decode_payload::<
            GetRoomStateMsg,
        >(data)?)),
        MessageType::SetCategory => Ok(ClientMessage::SetCategory(
            decode_payload::<SetCategoryMsg>(data)?,
        )),
        MessageType::RequestQuestions => Ok(ClientMessage::RequestQuestions(decode_payload::<
            RequestQuestionsMsg,
        >(data)?)),
        MessageType::StartGame => Ok(ClientMessage::StartGame(decode_payload::<StartGameMsg>(
            data,
        )?)),
        MessageType::PlayAgain => Ok(ClientMessage::PlayAgain(decode_payload::<PlayAgainMsg>(
            data,
        )?)),
        MessageType::SubmitAnswer => Ok(ClientMessage::SubmitAnswer(decode_payload::<
            SubmitAnswerMsg,
        >(data)?)),
        MessageType::SubmitGameResults => Ok(ClientMessage::SubmitGameResults(decode_payload::<
            SubmitGameResultsMsg,
        >(data)?)),
        MessageType::GetGameResults => Ok(ClientMessage::GetGameResults(decode_payload::<
            GetGameResultsMsg,
        >(data)?)),
        MessageType::ChatMessage => Ok(ClientMessage::ChatMessage(
            decode_payload::<ChatMessageMsg>(data)?,
        )),
        MessageType::PlayerTyping => Ok(ClientMessage::PlayerTyping(decode_payload::<
            PlayerTypingMsg,
        >(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}

/// Decode raw wire data into a `ServerMessage`.
pub fn decode_server_message(data: &[u8]) -> Result<ServerMessage, ProtocolError> {
    let msg_type = decode_message_type(data)?;
    match msg_type {
        MessageType::RoomCreated => Ok(ServerMessage::RoomCreated(decode_payload::<
            RoomCreatedMsg,
        >(data)?)),
        MessageType::RoomJoined => Ok(ServerMessage::RoomJoined(decode_payload::<RoomJoinedMsg>(
            data,
        )?)),
        MessageType::PlayerJoined => Ok(ServerMessage::PlayerJoined(decode_payload::<
            PlayerJoinedMsg,
        >(data)?)),
        MessageType::PlayerRejoined => Ok(ServerMessage::PlayerRejoined(decode_payload::<
            PlayerRejoinedMsg,
        >(data)?)),
        MessageType::PlayerLeft => Ok(ServerMessage::PlayerLeft(decode_payload::<PlayerLeftMsg>(
            data,
        )?)),
        MessageType::RoomStateUpdated => Ok(ServerMessage::RoomStateUpdated(decode_payload::<
            RoomStateUpdatedMsg,
        >(data)?)),
        MessageType::CategoryChanged => Ok(ServerMessage::CategoryChanged(decode_payload::<
            CategoryChangedMsg,
        >(data)?)),
        MessageType::HostChanged => Ok(ServerMessage::HostChanged(decode_payload::<
            HostChangedMsg,
        >(data)?)),
        MessageType::ShowStartQuiz => Ok(ServerMessage::ShowStartQuiz(decode_payload::<
            ShowStartQuizMsg,
        >(data)?)),
        MessageType::GameStarted => Ok(ServerMessage::GameStarted(Box::new(decode_payload::<
            GameStartedMsg,
        >(data)?))),
        MessageType::GameResults => Ok(ServerMessage::GameResults(decode_payload::<
            GameResultsMsg,
        >(data)?)),
        MessageType::Error => Ok(ServerMessage::Error(decode_payload::<ErrorMsg>(data)?)),
        MessageType::ChatRelay => Ok(ServerMessage::ChatRelay(decode_payload::<ChatRelayMsg>(
            data,
        )?)),
        MessageType::TypingStatus => Ok(ServerMessage::TypingStatus(decode_payload::<
            TypingStatusMsg,
        >(data)?)),
        _ => Err(ProtocolError::UnknownMessageType(data[0])),
    }
}
