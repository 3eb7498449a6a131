use quiznight_core::net::messages::{ErrorMsg, ServerMessage};
use quiznight_core::room::RoomStatus;

/// Coordinator-level failures. Delivered only to the requesting connection;
/// rejected operations leave the room store untouched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomError {
    RoomNotFound,
    NotAuthorized,
    GenerationFailed(String),
    InvalidTransition {
        status: RoomStatus,
        operation: &'static str,
    },
}

impl RoomError {
    /// Stable wire code the client switches on.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RoomNotFound => "room_not_found",
            Self::NotAuthorized => "not_authorized",
            Self::GenerationFailed(_) => "generation_failed",
            Self::InvalidTransition { .. } => "invalid_transition",
        }
    }

    pub fn to_server_message(&self) -> ServerMessage {
        ServerMessage::Error(ErrorMsg {
            code: self.code().to_string(),
            message: self.to_string(),
        })
    }
}

impl std::fmt::Display for RoomError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoomNotFound => write!(f, "room not found"),
            Self::NotAuthorized => write!(f, "not authorized"),
            Self::GenerationFailed(reason) => write!(f, "question generation failed: {reason}"),
            Self::InvalidTransition { status, operation } => {
                write!(f, "{operation} not accepted while room is {status:?}")
            },
        }
    }
}

impl std::error::Error for RoomError {}
