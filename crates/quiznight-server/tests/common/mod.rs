use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use quiznight_core::net::messages::{
    ClientMessage, CreateRoomMsg, JoinRoomMsg, ServerMessage,
};
use quiznight_core::net::protocol::{decode_server_message, encode_client_message};
use quiznight_core::room::{Room, RoomSettings};

use quiznight_server::build_router;
use quiznight_server::config::ServerConfig;
use quiznight_server::external::{FailingGenerator, MedalStore, NoopChatStore, QuestionGenerator};
use quiznight_server::state::AppState;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Medal store that records awards for assertions.
#[derive(Default)]
pub struct RecordingMedalStore {
    pub awards: Mutex<Vec<(String, u8)>>,
}

#[async_trait::async_trait]
impl MedalStore for RecordingMedalStore {
    async fn award_medal(&self, player_id: &str, place: u8, _room_id: &str) {
        self.awards
            .lock()
            .unwrap()
            .push((player_id.to_string(), place));
    }
}

pub struct TestServer {
    pub addr: SocketAddr,
    pub medals: Arc<RecordingMedalStore>,
    _shutdown: tokio::task::JoinHandle<()>,
}

impl TestServer {
    /// Start a test server with the built-in deterministic generator.
    pub async fn new() -> Self {
        let config = ServerConfig::default();
        let generator: Arc<dyn QuestionGenerator> =
            Arc::new(quiznight_server::external::FixedGenerator);
        Self::from_parts(config, generator).await
    }

    /// Start a test server whose generator always fails.
    pub async fn with_failing_generator() -> Self {
        Self::from_parts(ServerConfig::default(), Arc::new(FailingGenerator)).await
    }

    async fn from_parts(config: ServerConfig, generator: Arc<dyn QuestionGenerator>) -> Self {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let medals = Arc::new(RecordingMedalStore::default());
        let state = AppState::with_collaborators(
            config,
            generator,
            Arc::clone(&medals) as Arc<dyn MedalStore>,
            Arc::new(NoopChatStore),
        );
        let (app, _state) = build_router(state);

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Give the server a moment to start accepting
        tokio::time::sleep(Duration::from_millis(20)).await;

        Self {
            addr,
            medals,
            _shutdown: handle,
        }
    }

    pub fn ws_url(&self) -> String {
        format!("ws://{}/ws", self.addr)
    }
}

/// Connect a WebSocket client to the given URL.
pub async fn ws_connect(url: &str) -> WsStream {
    let (stream, _) = tokio_tungstenite::connect_async(url).await.unwrap();
    stream
}

/// Send a ClientMessage over a WS stream.
pub async fn ws_send_client_msg(stream: &mut WsStream, msg: &ClientMessage) {
    let encoded = encode_client_message(msg).unwrap();
    stream.send(Message::Binary(encoded.into())).await.unwrap();
}

/// Create a room with two-question games so flows finish fast.
/// Returns the room snapshot from the RoomCreated ack.
pub async fn ws_create_room(stream: &mut WsStream, host_id: &str, host_name: &str) -> Room {
    let msg = ClientMessage::CreateRoom(CreateRoomMsg {
        room_name: format!("{host_name}'s room"),
        host_id: host_id.to_string(),
        host_name: host_name.to_string(),
        host_language: "en".to_string(),
        settings: RoomSettings {
            question_count: 2,
            ..RoomSettings::default()
        },
    });
    ws_send_client_msg(stream, &msg).await;

    match ws_read_server_msg(stream).await {
        ServerMessage::RoomCreated(created) => created.room,
        other => panic!("Expected RoomCreated, got: {other:?}"),
    }
}

/// Join (or rejoin) an existing room. Returns the RoomJoined snapshot.
pub async fn ws_join_room(stream: &mut WsStream, room_id: &str, player_id: &str) -> Room {
    let msg = ClientMessage::JoinRoom(JoinRoomMsg {
        room_id: room_id.to_string(),
        player_id: player_id.to_string(),
        player_name: player_id.to_uppercase(),
        language: "en".to_string(),
    });
    ws_send_client_msg(stream, &msg).await;

    match ws_read_server_msg(stream).await {
        ServerMessage::RoomJoined(joined) => joined.room,
        other => panic!("Expected RoomJoined, got: {other:?}"),
    }
}

/// Read the next ServerMessage from a WS stream (5s timeout).
pub async fn ws_read_server_msg(stream: &mut WsStream) -> ServerMessage {
    let data = ws_read_raw(stream).await;
    decode_server_message(&data).unwrap()
}

/// Read raw binary data from a WS stream (5s timeout).
pub async fn ws_read_raw(stream: &mut WsStream) -> Vec<u8> {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => return data.to_vec(),
                Some(Ok(Message::Close(_))) => panic!("WebSocket closed unexpectedly"),
                Some(Err(e)) => panic!("WebSocket error: {e}"),
                None => panic!("WebSocket stream ended"),
                _ => continue,
            }
        }
    })
    .await
    .expect("Timed out waiting for WebSocket message")
}

/// Try to read the next ServerMessage, returning None on timeout. Used to
/// assert a message was NOT delivered.
pub async fn ws_try_read_server_msg(stream: &mut WsStream, timeout_ms: u64) -> Option<ServerMessage> {
    let deadline = Duration::from_millis(timeout_ms);
    tokio::time::timeout(deadline, async {
        loop {
            match stream.next().await {
                Some(Ok(Message::Binary(data))) => {
                    return decode_server_message(&data).unwrap();
                },
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => {
                    panic!("WebSocket error or closed")
                },
                _ => continue,
            }
        }
    })
    .await
    .ok()
}

/// Drain messages until one satisfies the matcher (5s overall budget).
pub async fn ws_wait_for<T>(
    stream: &mut WsStream,
    mut matcher: impl FnMut(ServerMessage) -> Option<T>,
) -> T {
    let deadline = Duration::from_secs(5);
    tokio::time::timeout(deadline, async {
        loop {
            let msg = ws_read_server_msg(stream).await;
            if let Some(out) = matcher(msg) {
                return out;
            }
        }
    })
    .await
    .expect("Timed out waiting for expected message")
}
