use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::Ordering;

use axum::extract::ConnectInfo;
use axum::extract::FromRequest;
use axum::extract::ws::{Message, WebSocket};
use axum::extract::{State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use uuid::Uuid;

use quiznight_core::net::messages::ClientMessage;
use quiznight_core::net::protocol::{
    MAX_MESSAGE_SIZE, decode_client_message, encode_server_message,
};
use quiznight_core::player::SocketId;

use crate::error::RoomError;
use crate::registry::PlayerSender;
use crate::state::{AppState, ConnectionGuard, IpConnectionGuard};

pub async fn ws_handler(
    State(state): State<AppState>,
    request: axum::extract::Request,
) -> Result<axum::response::Response, StatusCode> {
    let max_ws = state.config.limits.max_ws_connections;
    let current = state.ws_connection_count.load(Ordering::Relaxed);
    if current >= max_ws {
        tracing::warn!(current, max = max_ws, "WS connection limit reached");
        return Err(StatusCode::SERVICE_UNAVAILABLE);
    }

    // Per-IP connection limit
    let ip = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| ci.0.ip())
        .unwrap_or(std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST));
    let max_per_ip = state.config.limits.max_ws_per_ip;
    let ip_guard = IpConnectionGuard::try_acquire(ip, Arc::clone(&state.ws_per_ip), max_per_ip);
    let Some(ip_guard) = ip_guard else {
        tracing::warn!(%ip, max_per_ip, "Per-IP WS connection limit reached");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    };

    // Perform WebSocket upgrade manually
    let ws = WebSocketUpgrade::from_request(request, &state)
        .await
        .map_err(|_| StatusCode::BAD_REQUEST)?;

    Ok(ws
        .on_upgrade(move |socket| handle_socket(socket, state, ip_guard))
        .into_response())
}

async fn handle_socket(socket: WebSocket, state: AppState, _ip_guard: IpConnectionGuard) {
    let _guard = ConnectionGuard::new(Arc::clone(&state.ws_connection_count));
    let (mut ws_sender, mut ws_receiver) = socket.split();

    let socket_id: SocketId = Uuid::new_v4();

    // Wait for the first message: must bind the connection to a room.
    let first_msg = match ws_receiver.next().await {
        Some(Ok(Message::Binary(data))) => data,
        _ => return,
    };
    let Ok(client_msg) = decode_client_message(&first_msg) else {
        return;
    };

    let (tx, rx) = mpsc::channel::<Bytes>(state.config.limits.player_message_buffer);

    let result = match client_msg {
        ClientMessage::CreateRoom(msg) => {
            state
                .coordinator
                .create_room(socket_id, tx.clone(), msg)
                .await
        },
        ClientMessage::JoinRoom(msg) | ClientMessage::RejoinRoom(msg) => {
            state
                .coordinator
                .join_room(socket_id, tx.clone(), msg)
                .await
        },
        _ => return,
    };
    if let Err(e) = result {
        send_direct_error(&mut ws_sender, &e).await;
        return;
    }

    spawn_writer(ws_sender, rx);

    read_loop(&mut ws_receiver, &state, socket_id, &tx).await;

    // Connection gone. Not a leave: the player entry survives for rejoin.
    state.coordinator.disconnect(socket_id).await;
}

/// Deliver an error on a connection not yet bound to a room.
async fn send_direct_error(
    ws_sender: &mut futures::stream::SplitSink<WebSocket, Message>,
    error: &RoomError,
) {
    if let Ok(data) = encode_server_message(&error.to_server_message())
        && let Err(e) = ws_sender.send(Message::Binary(data.into())).await
    {
        tracing::warn!(error = %e, "Failed to send error response");
    }
}

/// Deliver an error to the requester only, through its outbound channel.
fn send_error(tx: &PlayerSender, error: &RoomError) {
    if let Ok(data) = encode_server_message(&error.to_server_message()) {
        let _ = tx.try_send(Bytes::from(data));
    }
}

fn spawn_writer(
    mut ws_sender: futures::stream::SplitSink<WebSocket, Message>,
    mut rx: mpsc::Receiver<Bytes>,
) {
    tokio::spawn(async move {
        while let Some(data) = rx.recv().await {
            if ws_sender
                .send(Message::Binary(data.to_vec().into()))
                .await
                .is_err()
            {
                break;
            }
        }
    });
}

/// Per-connection rate limiter (token bucket).
struct RateLimiter {
    tokens: f64,
    last_refill: tokio::time::Instant,
    max_tokens: f64,
    refill_rate: f64, // tokens per second
}

impl RateLimiter {
    fn new(max_tokens: f64, refill_rate: f64) -> Self {
        Self {
            tokens: max_tokens,
            last_refill: tokio::time::Instant::now(),
            max_tokens,
            refill_rate,
        }
    }

    /// Returns true if the message is allowed; false if rate-limited.
    fn allow(&mut self) -> bool {
        let now = tokio::time::Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_rate).min(self.max_tokens);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

async fn read_loop(
    ws_receiver: &mut futures::stream::SplitStream<WebSocket>,
    state: &AppState,
    socket_id: SocketId,
    tx: &PlayerSender,
) {
    let rate = state.config.limits.ws_rate_limit_per_sec;
    let mut rate_limiter = RateLimiter::new(rate, rate);
    let max_chat_len = state.config.limits.max_chat_message_len;

    while let Some(Ok(msg)) = ws_receiver.next().await {
        let data = match msg {
            Message::Binary(d) => d.to_vec(),
            Message::Close(_) => break,
            _ => continue,
        };

        // Rate limit: drop messages that exceed per-connection rate
        if !rate_limiter.allow() {
            tracing::warn!(%socket_id, "Rate limited");
            continue;
        }

        if data.is_empty() || data.len() > MAX_MESSAGE_SIZE {
            continue;
        }

        // Server message types fail to decode here, so a client replaying
        // lifecycle broadcasts is rejected by construction.
        let client_msg = match decode_client_message(&data) {
            Ok(m) => m,
            Err(_) => continue,
        };

        let outcome = match client_msg {
            // The connection is already bound to a player and room.
            ClientMessage::CreateRoom(_)
            | ClientMessage::JoinRoom(_)
            | ClientMessage::RejoinRoom(_) => {
                tracing::debug!(%socket_id, "Duplicate room bind rejected");
                continue;
            },

            ClientMessage::LeaveRoom(msg) => state.coordinator.leave_room(socket_id, msg).await,
            ClientMessage::GetRoomState(msg) => {
                state.coordinator.get_room_state(socket_id, &msg.room_id).await
            },
            ClientMessage::SetCategory(msg) => state.coordinator.set_category(socket_id, msg).await,
            ClientMessage::RequestQuestions(msg) => {
                state
                    .coordinator
                    .request_questions(socket_id, &msg.room_id)
                    .await
            },
            ClientMessage::StartGame(msg) => state.coordinator.start_game(socket_id, msg).await,
            ClientMessage::PlayAgain(msg) => {
                state.coordinator.play_again(socket_id, &msg.room_id).await
            },
            ClientMessage::SubmitAnswer(msg) => {
                state.coordinator.submit_answer(socket_id, msg).await
            },
            ClientMessage::SubmitGameResults(msg) => {
                state.coordinator.submit_results(socket_id, msg).await
            },
            ClientMessage::GetGameResults(msg) => {
                state.coordinator.get_results(socket_id, &msg.room_id).await
            },

            // Chat sits outside the room state machine; invalid content is
            // dropped, never errored.
            ClientMessage::ChatMessage(msg) => {
                if msg.content.len() > max_chat_len
                    || msg.content.chars().any(|c| c.is_control() && c != '\n')
                {
                    continue;
                }
                state
                    .coordinator
                    .relay_chat(socket_id, &msg.player_id, msg.content)
                    .await;
                continue;
            },
            ClientMessage::PlayerTyping(msg) => {
                state
                    .coordinator
                    .relay_typing(socket_id, &msg.player_id, msg.is_typing);
                continue;
            },
        };

        // Errors are never broadcast: only the requester hears about them.
        if let Err(e) = outcome {
            tracing::debug!(%socket_id, code = e.code(), "Request rejected");
            send_error(tx, &e);
        }
    }
}
