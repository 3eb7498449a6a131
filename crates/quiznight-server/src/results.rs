use std::collections::HashMap;
use std::sync::Mutex;

use quiznight_core::net::messages::FinalScore;
use quiznight_core::player::PlayerId;
use quiznight_core::room::RoomId;
use quiznight_core::scoring::GamePoints;

/// Per-room score board. Submission order is preserved so that ties on
/// `total` rank the earlier submitter first.
#[derive(Debug, Default)]
struct Board {
    submissions: Vec<FinalScore>,
    medals_awarded: bool,
}

/// Collects one client-reported score per player per room and serves the
/// ranked result set. Duplicate submissions from the same player overwrite
/// in place rather than double-count.
#[derive(Default)]
pub struct ResultsAggregator {
    boards: Mutex<HashMap<RoomId, Board>>,
}

impl ResultsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record (or replace) a player's submission. Returns the number of
    /// distinct submissions now held for the room.
    pub fn submit(
        &self,
        room_id: &str,
        player_id: PlayerId,
        player_name: String,
        game_points: GamePoints,
    ) -> usize {
        let mut boards = self.boards.lock().unwrap();
        let board = boards.entry(room_id.to_string()).or_default();
        let entry = FinalScore {
            player_id: player_id.clone(),
            player_name,
            game_points,
        };
        match board
            .submissions
            .iter_mut()
            .find(|s| s.player_id == player_id)
        {
            Some(existing) => *existing = entry,
            None => board.submissions.push(entry),
        }
        board.submissions.len()
    }

    /// Ranked result set: total descending, ties broken by earlier
    /// submission order (stable sort over the insertion-ordered board).
    pub fn ranked(&self, room_id: &str) -> Vec<FinalScore> {
        let boards = self.boards.lock().unwrap();
        let Some(board) = boards.get(room_id) else {
            return Vec::new();
        };
        let mut scores = board.submissions.clone();
        scores.sort_by(|a, b| b.game_points.total.cmp(&a.game_points.total));
        scores
    }

    /// The top-3 medal pass runs at most once per game; returns the podium
    /// the first time, None afterwards.
    pub fn take_podium(&self, room_id: &str) -> Option<Vec<FinalScore>> {
        let mut boards = self.boards.lock().unwrap();
        let board = boards.get_mut(room_id)?;
        if board.medals_awarded || board.submissions.is_empty() {
            return None;
        }
        board.medals_awarded = true;
        drop(boards);
        let mut ranked = self.ranked(room_id);
        ranked.truncate(3);
        Some(ranked)
    }

    /// Forget a room's board (room destroyed or play-again reset).
    pub fn clear(&self, room_id: &str) {
        self.boards.lock().unwrap().remove(room_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn points(total: u32) -> GamePoints {
        GamePoints {
            score: total,
            total,
            ..GamePoints::default()
        }
    }

    #[test]
    fn ranked_by_total_descending() {
        let agg = ResultsAggregator::new();
        agg.submit("R1", "b".to_string(), "Bob".to_string(), points(95));
        agg.submit("R1", "a".to_string(), "Alice".to_string(), points(120));

        let ranked = agg.ranked("R1");
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].player_id, "a");
        assert_eq!(ranked[0].game_points.total, 120);
        assert_eq!(ranked[1].game_points.total, 95);
    }

    #[test]
    fn duplicate_submission_overwrites() {
        let agg = ResultsAggregator::new();
        agg.submit("R1", "a".to_string(), "Alice".to_string(), points(120));
        agg.submit("R1", "b".to_string(), "Bob".to_string(), points(95));
        let count = agg.submit("R1", "a".to_string(), "Alice".to_string(), points(120));

        assert_eq!(count, 2);
        let ranked = agg.ranked("R1");
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].game_points.total, 120);
    }

    #[test]
    fn ties_rank_earlier_submitter_first() {
        let agg = ResultsAggregator::new();
        agg.submit("R1", "first".to_string(), "First".to_string(), points(80));
        agg.submit("R1", "second".to_string(), "Second".to_string(), points(80));

        let ranked = agg.ranked("R1");
        assert_eq!(ranked[0].player_id, "first");
        assert_eq!(ranked[1].player_id, "second");
    }

    #[test]
    fn podium_taken_once() {
        let agg = ResultsAggregator::new();
        for (i, id) in ["a", "b", "c", "d"].iter().enumerate() {
            agg.submit(
                "R1",
                (*id).to_string(),
                id.to_uppercase(),
                points(100 - i as u32 * 10),
            );
        }

        let podium = agg.take_podium("R1").unwrap();
        assert_eq!(podium.len(), 3);
        assert_eq!(podium[0].player_id, "a");
        assert!(agg.take_podium("R1").is_none());
    }

    #[test]
    fn unknown_room_is_empty() {
        let agg = ResultsAggregator::new();
        assert!(agg.ranked("NOPE").is_empty());
        assert!(agg.take_podium("NOPE").is_none());
    }

    #[test]
    fn clear_forgets_board() {
        let agg = ResultsAggregator::new();
        agg.submit("R1", "a".to_string(), "Alice".to_string(), points(10));
        agg.clear("R1");
        assert!(agg.ranked("R1").is_empty());
    }
}
