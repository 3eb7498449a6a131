pub mod net;
pub mod player;
pub mod question;
pub mod room;
pub mod scoring;

#[cfg(any(test, feature = "test-helpers"))]
pub mod test_helpers {
    use crate::player::Player;
    use crate::question::{Difficulty, Question};
    use crate::room::{Room, RoomSettings};

    /// Create `n` test players with account ids `acct-1..acct-n`.
    pub fn make_players(n: usize) -> Vec<Player> {
        (1..=n)
            .map(|i| Player::new(format!("acct-{i}"), format!("Player{i}"), "en".to_string()))
            .collect()
    }

    /// Create a room with the given player count; the first player is host.
    pub fn make_room(n: usize) -> Room {
        let mut players = make_players(n);
        let host = players.remove(0);
        let mut room = Room::new("Test Room".to_string(), host, RoomSettings::default());
        for p in players {
            room.players.push(p);
        }
        room
    }

    /// Create `n` medium-difficulty questions.
    pub fn make_questions(n: usize) -> Vec<Question> {
        (0..n)
            .map(|i| Question {
                prompt: format!("Question {i}?"),
                options: vec![
                    "A".to_string(),
                    "B".to_string(),
                    "C".to_string(),
                    "D".to_string(),
                ],
                correct_index: i % 4,
                difficulty: Difficulty::Medium,
            })
            .collect()
    }
}
