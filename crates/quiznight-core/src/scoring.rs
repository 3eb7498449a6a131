use serde::{Deserialize, Serialize};

use crate::question::Difficulty;

/// Base score for a correct answer, keyed by difficulty tier.
pub const BASE_EASY: u32 = 50;
pub const BASE_MEDIUM: u32 = 75;
pub const BASE_HARD: u32 = 100;

/// Time-bonus tiers, by fraction of the question clock still remaining.
pub const TIME_BONUS_FAST: u32 = 25;
pub const TIME_BONUS_MID: u32 = 15;
pub const TIME_BONUS_SLOW: u32 = 5;

/// Flat bonus when every question was answered correctly.
pub const PERFECT_GAME_BONUS: u32 = 100;

/// Per-player structured score, computed client-side from the player's own
/// answer log and submitted once at game end. The server does not re-verify
/// it (accepted trust boundary for a casual game).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamePoints {
    pub score: u32,
    pub time_points: u32,
    pub perfect_game: u32,
    pub total: u32,
    pub chosen_correct: u32,
    pub total_answers: u32,
}

/// One entry in a player's local answer log.
#[derive(Debug, Clone, Copy)]
pub struct AnswerRecord {
    pub correct: bool,
    pub difficulty: Difficulty,
    /// Seconds left on the question clock when the answer was locked in.
    pub time_remaining: f32,
}

pub fn base_score(difficulty: Difficulty) -> u32 {
    match difficulty {
        Difficulty::Easy => BASE_EASY,
        Difficulty::Medium => BASE_MEDIUM,
        Difficulty::Hard => BASE_HARD,
    }
}

/// Latency bonus for a correct answer given the per-question time limit.
pub fn time_bonus(time_remaining: f32, time_limit: f32) -> u32 {
    if time_limit <= 0.0 || time_remaining <= 0.0 {
        return 0;
    }
    let fraction = time_remaining / time_limit;
    if fraction >= 2.0 / 3.0 {
        TIME_BONUS_FAST
    } else if fraction >= 1.0 / 3.0 {
        TIME_BONUS_MID
    } else {
        TIME_BONUS_SLOW
    }
}

impl GamePoints {
    /// Fold an answer log into a final score. `time_limit` is the configured
    /// per-question limit in seconds.
    pub fn from_answers(answers: &[AnswerRecord], time_limit: f32) -> Self {
        let mut points = GamePoints {
            total_answers: answers.len() as u32,
            ..GamePoints::default()
        };
        for answer in answers {
            if !answer.correct {
                continue;
            }
            points.chosen_correct += 1;
            points.score += base_score(answer.difficulty);
            points.time_points += time_bonus(answer.time_remaining, time_limit);
        }
        if !answers.is_empty() && points.chosen_correct == points.total_answers {
            points.perfect_game = PERFECT_GAME_BONUS;
        }
        points.total = points.score + points.time_points + points.perfect_game;
        points
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(correct: bool, difficulty: Difficulty, time_remaining: f32) -> AnswerRecord {
        AnswerRecord {
            correct,
            difficulty,
            time_remaining,
        }
    }

    #[test]
    fn empty_log_scores_zero() {
        let points = GamePoints::from_answers(&[], 30.0);
        assert_eq!(points, GamePoints::default());
    }

    #[test]
    fn base_score_by_difficulty() {
        let answers = [
            record(true, Difficulty::Easy, 0.0),
            record(true, Difficulty::Medium, 0.0),
            record(true, Difficulty::Hard, 0.0),
        ];
        let points = GamePoints::from_answers(&answers, 30.0);
        assert_eq!(points.score, BASE_EASY + BASE_MEDIUM + BASE_HARD);
        assert_eq!(points.time_points, 0);
    }

    #[test]
    fn time_bonus_tiers() {
        assert_eq!(time_bonus(25.0, 30.0), TIME_BONUS_FAST);
        assert_eq!(time_bonus(15.0, 30.0), TIME_BONUS_MID);
        assert_eq!(time_bonus(2.0, 30.0), TIME_BONUS_SLOW);
        assert_eq!(time_bonus(0.0, 30.0), 0);
        assert_eq!(time_bonus(10.0, 0.0), 0);
    }

    #[test]
    fn wrong_answers_earn_nothing() {
        let answers = [
            record(false, Difficulty::Hard, 29.0),
            record(true, Difficulty::Easy, 29.0),
        ];
        let points = GamePoints::from_answers(&answers, 30.0);
        assert_eq!(points.chosen_correct, 1);
        assert_eq!(points.total_answers, 2);
        assert_eq!(points.score, BASE_EASY);
        assert_eq!(points.perfect_game, 0);
    }

    #[test]
    fn perfect_game_bonus_applied_once() {
        let answers = [
            record(true, Difficulty::Medium, 29.0),
            record(true, Difficulty::Medium, 29.0),
        ];
        let points = GamePoints::from_answers(&answers, 30.0);
        assert_eq!(points.perfect_game, PERFECT_GAME_BONUS);
        assert_eq!(
            points.total,
            points.score + points.time_points + PERFECT_GAME_BONUS
        );
    }
}
