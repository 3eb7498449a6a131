use std::time::Duration;

use serde::{Deserialize, Serialize};

use quiznight_core::question::{Difficulty, Question};
use quiznight_core::room::RoomId;

use crate::config::GeneratorConfig;

/// Failure from the external question generator. Recoverable: the room rolls
/// back to category selection.
#[derive(Debug)]
pub enum GenerateError {
    Request(String),
    BadResponse(String),
}

impl std::fmt::Display for GenerateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Request(e) => write!(f, "generator request failed: {e}"),
            Self::BadResponse(e) => write!(f, "generator returned bad response: {e}"),
        }
    }
}

impl std::error::Error for GenerateError {}

/// External AI content generator: given topic/difficulty/language, returns a
/// fixed-size question set. Opaque async call with success/failure.
#[async_trait::async_trait]
pub trait QuestionGenerator: Send + Sync {
    async fn generate(
        &self,
        topic: &str,
        difficulty: Difficulty,
        count: u32,
        languages: &[String],
    ) -> Result<Vec<Question>, GenerateError>;
}

/// Statistics/medal document store, updated at most a few times per game.
#[async_trait::async_trait]
pub trait MedalStore: Send + Sync {
    async fn award_medal(&self, player_id: &str, place: u8, room_id: &str);
}

/// Ephemeral chat store; only teardown is in the coordinator's path.
#[async_trait::async_trait]
pub trait ChatStore: Send + Sync {
    async fn delete_room_chat(&self, room_id: &RoomId);
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    topic: &'a str,
    difficulty: Difficulty,
    count: u32,
    languages: &'a [String],
}

#[derive(Deserialize)]
struct GenerateResponse {
    questions: Vec<Question>,
}

/// HTTP-backed generator client.
pub struct HttpGenerator {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl HttpGenerator {
    pub fn from_config(config: &GeneratorConfig, endpoint: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs_or_default()))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait::async_trait]
impl QuestionGenerator for HttpGenerator {
    async fn generate(
        &self,
        topic: &str,
        difficulty: Difficulty,
        count: u32,
        languages: &[String],
    ) -> Result<Vec<Question>, GenerateError> {
        let mut request = self.client.post(&self.endpoint).json(&GenerateRequest {
            topic,
            difficulty,
            count,
            languages,
        });
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| GenerateError::Request(e.to_string()))?;
        if !response.status().is_success() {
            return Err(GenerateError::BadResponse(format!(
                "status {}",
                response.status()
            )));
        }
        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| GenerateError::BadResponse(e.to_string()))?;
        if body.questions.len() != count as usize {
            return Err(GenerateError::BadResponse(format!(
                "expected {count} questions, got {}",
                body.questions.len()
            )));
        }
        Ok(body.questions)
    }
}

/// Built-in generator used when no external endpoint is configured, and by
/// the test suite. Produces a deterministic set tagged with the topic.
pub struct FixedGenerator;

#[async_trait::async_trait]
impl QuestionGenerator for FixedGenerator {
    async fn generate(
        &self,
        topic: &str,
        difficulty: Difficulty,
        count: u32,
        _languages: &[String],
    ) -> Result<Vec<Question>, GenerateError> {
        Ok((0..count)
            .map(|i| Question {
                prompt: format!("{topic}: question {}", i + 1),
                options: vec![
                    "Option A".to_string(),
                    "Option B".to_string(),
                    "Option C".to_string(),
                    "Option D".to_string(),
                ],
                correct_index: (i as usize) % 4,
                difficulty,
            })
            .collect())
    }
}

/// Generator that always fails; exercises the rollback transition in tests.
pub struct FailingGenerator;

#[async_trait::async_trait]
impl QuestionGenerator for FailingGenerator {
    async fn generate(
        &self,
        _topic: &str,
        _difficulty: Difficulty,
        _count: u32,
        _languages: &[String],
    ) -> Result<Vec<Question>, GenerateError> {
        Err(GenerateError::Request("generator unavailable".to_string()))
    }
}

/// No-op collaborators for deployments without a stats backend.
pub struct NoopMedalStore;

#[async_trait::async_trait]
impl MedalStore for NoopMedalStore {
    async fn award_medal(&self, player_id: &str, place: u8, room_id: &str) {
        tracing::debug!(player_id, place, room_id, "Medal awarded (no store configured)");
    }
}

pub struct NoopChatStore;

#[async_trait::async_trait]
impl ChatStore for NoopChatStore {
    async fn delete_room_chat(&self, room_id: &RoomId) {
        tracing::debug!(room = %room_id, "Chat feed purged (no store configured)");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fixed_generator_produces_requested_count() {
        let questions = FixedGenerator
            .generate("History", Difficulty::Medium, 10, &["en".to_string()])
            .await
            .unwrap();
        assert_eq!(questions.len(), 10);
        assert!(questions[0].prompt.starts_with("History"));
        assert!(questions.iter().all(|q| q.options.len() == 4));
    }

    #[tokio::test]
    async fn failing_generator_fails() {
        let result = FailingGenerator
            .generate("History", Difficulty::Easy, 5, &[])
            .await;
        assert!(result.is_err());
    }
}
