use serde::{Deserialize, Serialize};

/// Question difficulty tier, used for base-score lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

/// A single quiz question. Immutable once attached to a room.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    pub prompt: String,
    pub options: Vec<String>,
    pub correct_index: usize,
    pub difficulty: Difficulty,
}
