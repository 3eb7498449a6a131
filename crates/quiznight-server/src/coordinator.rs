use std::sync::Arc;

use quiznight_core::net::messages::{
    CategoryChangedMsg, CreateRoomMsg, GameResultsMsg, GameStartedMsg, HostChangedMsg, JoinRoomMsg,
    LeaveRoomMsg, PlayerJoinedMsg, PlayerLeftMsg, PlayerRejoinedMsg, RoomCreatedMsg, RoomJoinedMsg,
    RoomStateUpdatedMsg, ServerMessage, SetCategoryMsg, ShowStartQuizMsg, StartGameMsg,
    SubmitAnswerMsg, SubmitGameResultsMsg,
};
use quiznight_core::player::SocketId;
use quiznight_core::question::Difficulty;
use quiznight_core::room::{JoinKind, Room, RoomId, RoomSettings, RoomStatus, is_valid_room_code};

use crate::error::RoomError;
use crate::external::{ChatStore, MedalStore, QuestionGenerator};
use crate::registry::{ConnectionRegistry, PlayerSender};
use crate::results::ResultsAggregator;
use crate::store::RoomStore;

/// Parameters captured under the room lock for the async generator call.
struct GenerationJob {
    room_id: RoomId,
    topic: String,
    difficulty: Difficulty,
    count: u32,
    languages: Vec<String>,
}

/// The room lifecycle state machine. All room mutation flows through here;
/// each operation takes the per-room lock, applies one transition, and
/// broadcasts the outcome before returning. Errors go only to the requester
/// (the caller forwards them) and never touch room state.
pub struct RoomCoordinator {
    store: RoomStore,
    registry: Arc<ConnectionRegistry>,
    results: ResultsAggregator,
    generator: Arc<dyn QuestionGenerator>,
    medals: Arc<dyn MedalStore>,
    chat: Arc<dyn ChatStore>,
}

impl RoomCoordinator {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        generator: Arc<dyn QuestionGenerator>,
        medals: Arc<dyn MedalStore>,
        chat: Arc<dyn ChatStore>,
    ) -> Self {
        Self {
            store: RoomStore::new(),
            registry: Arc::clone(&registry),
            results: ResultsAggregator::new(),
            generator,
            medals,
            chat,
        }
    }

    pub fn store(&self) -> &RoomStore {
        &self.store
    }

    /// Create a room with the requester as host and first player.
    pub async fn create_room(
        &self,
        socket_id: SocketId,
        sender: PlayerSender,
        msg: CreateRoomMsg,
    ) -> Result<(), RoomError> {
        let host = quiznight_core::player::Player::new(
            msg.host_id.clone(),
            msg.host_name,
            msg.host_language,
        );
        let mut room = Room::new(msg.room_name, host, clamp_settings(msg.settings));
        room.upsert_player(
            msg.host_id.clone(),
            room.players[0].name.clone(),
            room.players[0].language.clone(),
            socket_id,
        );

        // Code collisions with live rooms are resolved under the store's
        // write lock, so racing creations cannot land on the same code.
        let snapshot = self.store.insert_unique(room).await;
        let room_id = snapshot.id.clone();
        self.registry
            .register(socket_id, room_id.clone(), msg.host_id, sender);

        tracing::info!(room = %room_id, host = %snapshot.host_player_id, "Room created");
        self.registry.send_to(
            socket_id,
            &ServerMessage::RoomCreated(RoomCreatedMsg {
                room_id,
                room: snapshot,
            }),
        );
        Ok(())
    }

    /// Join-or-rejoin. An existing account id is re-bound to the new
    /// connection in place; a fresh id is appended, but only while the room
    /// is still in the lobby. Both paths update the registry entry.
    pub async fn join_room(
        &self,
        socket_id: SocketId,
        sender: PlayerSender,
        msg: JoinRoomMsg,
    ) -> Result<(), RoomError> {
        if !is_valid_room_code(&msg.room_id) {
            return Err(RoomError::RoomNotFound);
        }
        let slot = self
            .store
            .get(&msg.room_id)
            .await
            .ok_or(RoomError::RoomNotFound)?;
        slot.touch();

        let (kind, player, snapshot) = {
            let mut room = slot.room.lock().await;
            let existing = room.player(&msg.player_id).is_some();
            if !existing && room.status != RoomStatus::Lobby {
                return Err(RoomError::InvalidTransition {
                    status: room.status,
                    operation: "join-room",
                });
            }
            let kind = room.upsert_player(
                msg.player_id.clone(),
                msg.player_name,
                msg.language,
                socket_id,
            );
            let player = room
                .player(&msg.player_id)
                .cloned()
                .ok_or(RoomError::RoomNotFound)?;
            (kind, player, room.clone())
        };

        self.registry
            .register(socket_id, msg.room_id.clone(), msg.player_id, sender);

        // Requester gets the tailored full snapshot; everyone else learns
        // about the (re)arrival.
        self.registry.send_to(
            socket_id,
            &ServerMessage::RoomJoined(RoomJoinedMsg {
                room: snapshot.clone(),
            }),
        );
        let announcement = match kind {
            JoinKind::Joined => ServerMessage::PlayerJoined(PlayerJoinedMsg {
                player,
                room: snapshot,
            }),
            JoinKind::Rejoined => ServerMessage::PlayerRejoined(PlayerRejoinedMsg {
                player,
                room: snapshot,
            }),
        };
        self.registry
            .broadcast_except(&msg.room_id, socket_id, &announcement);

        tracing::info!(room = %msg.room_id, ?kind, "Player joined room");
        Ok(())
    }

    /// Explicit leave. Unlike a disconnect, this removes the Player entry and
    /// can trigger host migration or room destruction.
    pub async fn leave_room(
        &self,
        socket_id: SocketId,
        msg: LeaveRoomMsg,
    ) -> Result<(), RoomError> {
        self.require_self(socket_id, &msg.player_id)?;
        let slot = self
            .store
            .get(&msg.room_id)
            .await
            .ok_or(RoomError::RoomNotFound)?;
        slot.touch();

        let (removed, new_host, snapshot) = {
            let mut room = slot.room.lock().await;
            let Some((removed, new_host_id)) = room.remove_player(&msg.player_id) else {
                // Unknown player leaving is a no-op.
                return Ok(());
            };
            let new_host = new_host_id.and_then(|id| room.player(&id).cloned());
            (removed, new_host, room.clone())
        };

        if let Some(socket) = removed.socket_id {
            self.registry.unregister(socket);
        }

        if snapshot.players.is_empty() {
            self.destroy_room(&msg.room_id).await;
            return Ok(());
        }

        self.registry.broadcast(
            &msg.room_id,
            &ServerMessage::PlayerLeft(PlayerLeftMsg {
                player_id: removed.id,
                player_name: removed.name,
                room: snapshot,
            }),
        );
        if let Some(new_host) = new_host {
            tracing::info!(room = %msg.room_id, new_host = %new_host.id, "Host migrated");
            self.registry.broadcast(
                &msg.room_id,
                &ServerMessage::HostChanged(HostChangedMsg { new_host }),
            );
        }
        Ok(())
    }

    /// Transport-level disconnect: the registry entry dies, the Player entry
    /// stays (present-but-disconnected) so a later rejoin is a merge, not a
    /// duplicate join.
    pub async fn disconnect(&self, socket_id: SocketId) {
        let Some(binding) = self.registry.unregister(socket_id) else {
            return;
        };
        let Some(slot) = self.store.get(&binding.room_id).await else {
            return;
        };
        let snapshot = {
            let mut room = slot.room.lock().await;
            room.detach_socket(socket_id);
            room.clone()
        };
        tracing::info!(room = %binding.room_id, player = %binding.player_id, "Player disconnected");
        self.registry.broadcast(
            &binding.room_id,
            &ServerMessage::RoomStateUpdated(RoomStateUpdatedMsg { room: snapshot }),
        );
    }

    /// Convergence poll: tailored full snapshot back to the requester.
    /// Snapshots carry answer keys mid-game, so only members get them.
    pub async fn get_room_state(
        &self,
        socket_id: SocketId,
        room_id: &str,
    ) -> Result<(), RoomError> {
        self.require_member(socket_id, room_id)?;
        let slot = self
            .store
            .get(room_id)
            .await
            .ok_or(RoomError::RoomNotFound)?;
        let snapshot = slot.room.lock().await.clone();
        self.registry.send_to(
            socket_id,
            &ServerMessage::RoomStateUpdated(RoomStateUpdatedMsg { room: snapshot }),
        );
        Ok(())
    }

    /// Host-only category/topic selection; single-writer by construction.
    pub async fn set_category(
        &self,
        socket_id: SocketId,
        msg: SetCategoryMsg,
    ) -> Result<(), RoomError> {
        let slot = self
            .store
            .get(&msg.room_id)
            .await
            .ok_or(RoomError::RoomNotFound)?;
        slot.touch();

        {
            let mut room = slot.room.lock().await;
            self.require_host(&room, socket_id)?;
            if !matches!(
                room.status,
                RoomStatus::Lobby | RoomStatus::CategorySelecting
            ) {
                return Err(RoomError::InvalidTransition {
                    status: room.status,
                    operation: "category-changed",
                });
            }
            room.set_category(msg.category.clone(), msg.topic.clone());
        }

        self.registry.broadcast(
            &msg.room_id,
            &ServerMessage::CategoryChanged(CategoryChangedMsg {
                category: msg.category,
                topic: msg.topic,
            }),
        );
        Ok(())
    }

    /// Host asks for question generation. The generator runs outside the room
    /// lock so other rooms (and this room's lobby traffic) never stall on it;
    /// the lock is re-taken only to apply the outcome.
    pub async fn request_questions(
        self: &Arc<Self>,
        socket_id: SocketId,
        room_id: &str,
    ) -> Result<(), RoomError> {
        let slot = self
            .store
            .get(room_id)
            .await
            .ok_or(RoomError::RoomNotFound)?;
        slot.touch();

        let (job, snapshot) = {
            let mut room = slot.room.lock().await;
            self.require_host(&room, socket_id)?;
            let Some(category) = room.selected_category.clone() else {
                return Err(RoomError::InvalidTransition {
                    status: room.status,
                    operation: "request-questions",
                });
            };
            if !room.transition(RoomStatus::QuestionsGenerating) {
                return Err(RoomError::InvalidTransition {
                    status: room.status,
                    operation: "request-questions",
                });
            }

            let mut languages: Vec<String> =
                room.players.iter().map(|p| p.language.clone()).collect();
            languages.sort_unstable();
            languages.dedup();

            let job = GenerationJob {
                room_id: room.id.clone(),
                topic: room.selected_topic.clone().unwrap_or(category),
                difficulty: room.settings.difficulty,
                count: room.settings.question_count,
                languages,
            };
            (job, room.clone())
        };

        self.registry.broadcast(
            room_id,
            &ServerMessage::RoomStateUpdated(RoomStateUpdatedMsg { room: snapshot }),
        );

        let this = Arc::clone(self);
        tokio::spawn(async move {
            this.run_generation(job).await;
        });
        Ok(())
    }

    async fn run_generation(&self, job: GenerationJob) {
        let outcome = self
            .generator
            .generate(&job.topic, job.difficulty, job.count, &job.languages)
            .await;

        let Some(slot) = self.store.get(&job.room_id).await else {
            return; // room destroyed while generating
        };
        let mut room = slot.room.lock().await;
        if room.status != RoomStatus::QuestionsGenerating {
            tracing::debug!(room = %job.room_id, status = ?room.status, "Stale generation result dropped");
            return;
        }

        match outcome {
            Ok(questions) => {
                if !room.set_questions(questions) {
                    // Write-once: a racing writer got there first.
                    tracing::warn!(room = %job.room_id, "Questions already set, keeping existing set");
                }
                room.transition(RoomStatus::Countdown);
                let snapshot = room.clone();
                drop(room);
                tracing::info!(room = %job.room_id, "Questions ready, countdown starting");
                self.registry.broadcast(
                    &job.room_id,
                    &ServerMessage::ShowStartQuiz(ShowStartQuizMsg { room: snapshot }),
                );
            },
            Err(e) => {
                room.transition(RoomStatus::CategorySelecting);
                let host_socket = room.player(&room.host_player_id).and_then(|p| p.socket_id);
                let snapshot = room.clone();
                drop(room);
                tracing::warn!(room = %job.room_id, error = %e, "Question generation failed");
                // Recoverable: surfaced to the host only.
                if let Some(socket) = host_socket {
                    self.registry.send_to(
                        socket,
                        &RoomError::GenerationFailed(e.to_string()).to_server_message(),
                    );
                }
                self.registry.broadcast(
                    &job.room_id,
                    &ServerMessage::RoomStateUpdated(RoomStateUpdatedMsg { room: snapshot }),
                );
            },
        }
    }

    /// Host starts the game. Idempotent: a duplicate start re-sends the
    /// confirmation to the requester without rebroadcasting. After this
    /// transition nothing ever moves the room to an earlier state.
    pub async fn start_game(
        &self,
        socket_id: SocketId,
        msg: StartGameMsg,
    ) -> Result<(), RoomError> {
        let slot = self
            .store
            .get(&msg.room_id)
            .await
            .ok_or(RoomError::RoomNotFound)?;
        slot.touch();

        let broadcast = {
            let mut room = slot.room.lock().await;
            self.require_host(&room, socket_id)?;

            if room.status == RoomStatus::InProgress {
                let questions = room.questions.clone().unwrap_or_default();
                self.registry.send_to(
                    socket_id,
                    &ServerMessage::GameStarted(Box::new(GameStartedMsg {
                        room: room.clone(),
                        questions,
                    })),
                );
                return Ok(());
            }

            // A host whose own device produced the questions may supply them
            // here; accepted only while the room holds none (write-once).
            if room.questions.is_none()
                && let Some(questions) = msg.questions
            {
                if !room.transition(RoomStatus::Countdown) {
                    return Err(RoomError::InvalidTransition {
                        status: room.status,
                        operation: "start-game",
                    });
                }
                room.set_questions(questions);
            }

            if room.questions.is_none() || !room.transition(RoomStatus::InProgress) {
                return Err(RoomError::InvalidTransition {
                    status: room.status,
                    operation: "start-game",
                });
            }
            let questions = room.questions.clone().unwrap_or_default();
            ServerMessage::GameStarted(Box::new(GameStartedMsg {
                room: room.clone(),
                questions,
            }))
        };

        tracing::info!(room = %msg.room_id, "Game started");
        self.registry.broadcast(&msg.room_id, &broadcast);
        Ok(())
    }

    /// Record an answer submission. The server does not judge correctness; it
    /// only tracks progress to detect when the game is over.
    pub async fn submit_answer(
        &self,
        socket_id: SocketId,
        msg: SubmitAnswerMsg,
    ) -> Result<(), RoomError> {
        self.require_self(socket_id, &msg.player_id)?;
        let slot = self
            .store
            .get(&msg.room_id)
            .await
            .ok_or(RoomError::RoomNotFound)?;
        slot.touch();

        let finished = {
            let mut room = slot.room.lock().await;
            if room.status != RoomStatus::InProgress {
                return Err(RoomError::InvalidTransition {
                    status: room.status,
                    operation: "submit-answer",
                });
            }
            let question_count = room.settings.question_count;
            let Some(player) = room.player_mut(&msg.player_id) else {
                return Err(RoomError::RoomNotFound);
            };
            if player.answers_submitted < question_count {
                player.answers_submitted += 1;
            }
            if room.all_answered() {
                room.transition(RoomStatus::Finished);
                Some(room.clone())
            } else {
                None
            }
        };

        if let Some(snapshot) = finished {
            tracing::info!(room = %msg.room_id, "All answers in, game finished");
            self.registry.broadcast(
                &msg.room_id,
                &ServerMessage::RoomStateUpdated(RoomStateUpdatedMsg { room: snapshot }),
            );
        }
        Ok(())
    }

    /// One score submission per player; duplicates overwrite. When every
    /// player has reported, the ranked results go out and the medal pass runs.
    pub async fn submit_results(
        &self,
        socket_id: SocketId,
        msg: SubmitGameResultsMsg,
    ) -> Result<(), RoomError> {
        self.require_self(socket_id, &msg.player_id)?;
        let slot = self
            .store
            .get(&msg.room_id)
            .await
            .ok_or(RoomError::RoomNotFound)?;
        slot.touch();

        let complete = {
            let mut room = slot.room.lock().await;
            if !matches!(room.status, RoomStatus::InProgress | RoomStatus::Finished) {
                return Err(RoomError::InvalidTransition {
                    status: room.status,
                    operation: "submit-game-results",
                });
            }
            let Some(player) = room.player_mut(&msg.player_id) else {
                return Err(RoomError::RoomNotFound);
            };
            player.score = msg.game_points.total;
            player.game_points = Some(msg.game_points.clone());

            self.results.submit(
                &msg.room_id,
                msg.player_id.clone(),
                msg.player_name.clone(),
                msg.game_points,
            );

            let all_reported = room.players.iter().all(|p| p.game_points.is_some());
            if all_reported {
                // No-op when a prior submission already finished the game.
                room.transition(RoomStatus::Finished);
            }
            if all_reported { Some(room.clone()) } else { None }
        };

        if let Some(snapshot) = complete {
            self.registry.broadcast(
                &msg.room_id,
                &ServerMessage::RoomStateUpdated(RoomStateUpdatedMsg { room: snapshot }),
            );
            self.registry.broadcast(
                &msg.room_id,
                &ServerMessage::GameResults(GameResultsMsg {
                    final_scores: self.results.ranked(&msg.room_id),
                }),
            );
            if let Some(podium) = self.results.take_podium(&msg.room_id) {
                for (i, entry) in podium.iter().enumerate() {
                    self.medals
                        .award_medal(&entry.player_id, i as u8 + 1, &msg.room_id)
                        .await;
                }
            }
        }
        Ok(())
    }

    /// Serve whatever scores are known so far, ranked. Members only.
    pub async fn get_results(&self, socket_id: SocketId, room_id: &str) -> Result<(), RoomError> {
        self.require_member(socket_id, room_id)?;
        if !self.store.contains(room_id).await {
            return Err(RoomError::RoomNotFound);
        }
        self.registry.send_to(
            socket_id,
            &ServerMessage::GameResults(GameResultsMsg {
                final_scores: self.results.ranked(room_id),
            }),
        );
        Ok(())
    }

    /// Host-only play-again reset: same id, fresh game state.
    pub async fn play_again(&self, socket_id: SocketId, room_id: &str) -> Result<(), RoomError> {
        let slot = self
            .store
            .get(room_id)
            .await
            .ok_or(RoomError::RoomNotFound)?;
        slot.touch();

        let snapshot = {
            let mut room = slot.room.lock().await;
            self.require_host(&room, socket_id)?;
            if room.status != RoomStatus::Finished {
                return Err(RoomError::InvalidTransition {
                    status: room.status,
                    operation: "play-again",
                });
            }
            room.reset_for_replay();
            room.clone()
        };

        self.results.clear(room_id);
        tracing::info!(room = %room_id, "Room reset for another round");
        self.registry.broadcast(
            room_id,
            &ServerMessage::RoomStateUpdated(RoomStateUpdatedMsg { room: snapshot }),
        );
        Ok(())
    }

    /// Destroy a room and purge everything attached to its id.
    pub async fn destroy_room(&self, room_id: &str) {
        self.store.remove(room_id).await;
        self.registry.drop_room(room_id);
        self.results.clear(room_id);
        self.chat.delete_room_chat(&room_id.to_string()).await;
        tracing::info!(room = %room_id, "Room destroyed");
    }

    /// Idle sweep entry point for the background task.
    pub async fn sweep_idle_rooms(&self, max_idle: std::time::Duration) -> usize {
        let stale = self.store.sweep_idle(max_idle).await;
        for room_id in &stale {
            self.registry.drop_room(room_id);
            self.results.clear(room_id);
            self.chat.delete_room_chat(room_id).await;
        }
        stale.len()
    }

    /// Host-only writes resolve the requester through the registry so a
    /// forged player id in the payload cannot claim authority.
    fn require_host(&self, room: &Room, socket_id: SocketId) -> Result<(), RoomError> {
        let binding = self
            .registry
            .resolve(socket_id)
            .ok_or(RoomError::NotAuthorized)?;
        if !room.is_host(&binding.player_id) {
            return Err(RoomError::NotAuthorized);
        }
        Ok(())
    }

    /// Reads are scoped to the room the connection is bound to.
    fn require_member(&self, socket_id: SocketId, room_id: &str) -> Result<(), RoomError> {
        let binding = self
            .registry
            .resolve(socket_id)
            .ok_or(RoomError::NotAuthorized)?;
        if binding.room_id != room_id {
            return Err(RoomError::NotAuthorized);
        }
        Ok(())
    }

    /// Reject payloads that claim to act for another player.
    fn require_self(&self, socket_id: SocketId, player_id: &str) -> Result<(), RoomError> {
        let binding = self
            .registry
            .resolve(socket_id)
            .ok_or(RoomError::NotAuthorized)?;
        if binding.player_id != player_id {
            return Err(RoomError::NotAuthorized);
        }
        Ok(())
    }

    /// Relay a chat message to the whole room. Not in the critical path of
    /// game correctness; failures are silent.
    pub async fn relay_chat(&self, socket_id: SocketId, player_id: &str, content: String) {
        let Some(binding) = self.registry.resolve(socket_id) else {
            return;
        };
        if binding.player_id != player_id {
            return;
        }
        let Some(slot) = self.store.get(&binding.room_id).await else {
            return;
        };
        let name = slot
            .room
            .lock()
            .await
            .player(player_id)
            .map(|p| p.name.clone())
            .unwrap_or_else(|| player_id.to_string());
        self.registry.broadcast(
            &binding.room_id,
            &ServerMessage::ChatRelay(quiznight_core::net::messages::ChatRelayMsg {
                player_id: player_id.to_string(),
                player_name: name,
                content,
            }),
        );
    }

    /// Relay a typing indicator to everyone but the typist.
    pub fn relay_typing(&self, socket_id: SocketId, player_id: &str, is_typing: bool) {
        let Some(binding) = self.registry.resolve(socket_id) else {
            return;
        };
        if binding.player_id != player_id {
            return;
        }
        self.registry.broadcast_except(
            &binding.room_id,
            socket_id,
            &ServerMessage::TypingStatus(quiznight_core::net::messages::TypingStatusMsg {
                player_id: player_id.to_string(),
                is_typing,
            }),
        );
    }
}

/// Settings sanity pass applied at room creation.
pub fn clamp_settings(mut settings: RoomSettings) -> RoomSettings {
    settings.question_count = settings.question_count.clamp(1, 50);
    settings.time_limit = settings.time_limit.clamp(5, 300);
    settings
}
