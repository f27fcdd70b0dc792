//! Arithmetic question generation and latency-based scoring
//!
//! Each connected player always has exactly one outstanding question
//! while a round is running. A question is a small arithmetic challenge
//! with one correct answer hidden among randomized decoys; answering it
//! faster earns more points.

use serde::Serialize;
use web_time::SystemTime;

use crate::constants::question::{MAX_OPERAND, MAX_SCORE, MIN_OPERAND};

/// A single arithmetic challenge issued to one player
///
/// The correct answer never leaves this struct; clients only ever see
/// the [`QuestionView`] projection with the challenge text and the
/// shuffled candidate options.
#[derive(Debug, Clone)]
pub struct Question {
    /// The challenge text, e.g. `"3 + 7"`
    text: String,
    /// Candidate answers in shuffled order, exactly one of them correct
    options: Vec<i64>,
    /// The correct answer value
    answer: i64,
    /// When the question was issued, for latency scoring
    issued_at: SystemTime,
}

/// The client-facing projection of a [`Question`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QuestionView {
    /// The challenge text
    pub question: String,
    /// Candidate answers in the order the player must index into
    pub options: Vec<i64>,
}

impl Question {
    /// Generates a fresh randomized question
    ///
    /// Picks two operands in `[MIN_OPERAND, MAX_OPERAND]` and one of
    /// addition, subtraction, or multiplication uniformly. The decoy
    /// options are derived from the correct answer by small random
    /// offsets and a small multiplier, then shuffled together with it.
    pub fn generate() -> Self {
        let left = fastrand::i64(MIN_OPERAND..=MAX_OPERAND);
        let right = fastrand::i64(MIN_OPERAND..=MAX_OPERAND);

        let (text, answer) = match fastrand::u8(0..3) {
            0 => (format!("{left} + {right}"), left + right),
            1 => (format!("{left} - {right}"), left - right),
            _ => (format!("{left} * {right}"), left * right),
        };

        let mut options = vec![
            answer,
            answer + fastrand::i64(1..=4),
            answer - fastrand::i64(1..=4),
            answer * fastrand::i64(2..=3),
        ];
        fastrand::shuffle(&mut options);

        Self {
            text,
            options,
            answer,
            issued_at: SystemTime::now(),
        }
    }

    /// Checks whether the option at `option_index` is the correct answer
    ///
    /// An out-of-range index counts as incorrect rather than an error;
    /// a confused or malicious client must not be able to fault the
    /// session.
    pub fn is_correct(&self, option_index: usize) -> bool {
        self.options
            .get(option_index)
            .is_some_and(|&option| option == self.answer)
    }

    /// Computes the latency score for an answer submitted at `answered_at`
    ///
    /// The reward decays linearly from [`MAX_SCORE`] by one point per
    /// full second elapsed since issuance, flooring at zero after
    /// `MAX_SCORE` seconds.
    pub fn score(&self, answered_at: SystemTime) -> u32 {
        let elapsed = answered_at
            .duration_since(self.issued_at)
            .unwrap_or_default()
            .as_secs();
        u64::from(MAX_SCORE).saturating_sub(elapsed) as u32
    }

    /// Returns the client-facing projection of this question
    pub fn view(&self) -> QuestionView {
        QuestionView {
            question: self.text.clone(),
            options: self.options.clone(),
        }
    }

    /// Builds a question with fixed content for deterministic tests
    #[cfg(test)]
    pub(crate) fn fixed(
        text: &str,
        options: Vec<i64>,
        answer: i64,
        issued_at: SystemTime,
    ) -> Self {
        Self {
            text: text.to_owned(),
            options,
            answer,
            issued_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::constants::question::OPTION_COUNT;

    #[test]
    fn generate_produces_four_options_including_the_answer() {
        for _ in 0..100 {
            let question = Question::generate();
            assert_eq!(question.options.len(), OPTION_COUNT);
            assert!(question.options.contains(&question.answer));
        }
    }

    #[test]
    fn generate_uses_a_known_operation() {
        for _ in 0..100 {
            let question = Question::generate();
            assert!(
                question.text.contains(" + ")
                    || question.text.contains(" - ")
                    || question.text.contains(" * "),
                "unexpected challenge text: {}",
                question.text
            );
        }
    }

    #[test]
    fn is_correct_matches_only_the_answer_position() {
        let question = Question::fixed("2 + 2", vec![3, 4, 5, 8], 4, SystemTime::now());

        assert!(!question.is_correct(0));
        assert!(question.is_correct(1));
        assert!(!question.is_correct(2));
        assert!(!question.is_correct(3));
    }

    #[test]
    fn out_of_range_option_is_incorrect() {
        let question = Question::fixed("2 + 2", vec![3, 4, 5, 8], 4, SystemTime::now());

        assert!(!question.is_correct(4));
        assert!(!question.is_correct(usize::MAX));
    }

    #[test]
    fn score_decays_by_one_per_second() {
        let issued_at = SystemTime::now();
        let question = Question::fixed("2 + 2", vec![3, 4, 5, 8], 4, issued_at);

        assert_eq!(question.score(issued_at), 10);
        assert_eq!(question.score(issued_at + Duration::from_secs(1)), 9);
        assert_eq!(question.score(issued_at + Duration::from_secs(3)), 7);
        assert_eq!(question.score(issued_at + Duration::from_millis(2500)), 8);
    }

    #[test]
    fn score_floors_at_zero() {
        let issued_at = SystemTime::now();
        let question = Question::fixed("2 + 2", vec![3, 4, 5, 8], 4, issued_at);

        assert_eq!(question.score(issued_at + Duration::from_secs(10)), 0);
        assert_eq!(question.score(issued_at + Duration::from_secs(1000)), 0);
    }

    #[test]
    fn score_before_issuance_is_max() {
        let issued_at = SystemTime::now() + Duration::from_secs(5);
        let question = Question::fixed("2 + 2", vec![3, 4, 5, 8], 4, issued_at);

        assert_eq!(question.score(SystemTime::now()), 10);
    }

    #[test]
    fn view_does_not_leak_the_answer() {
        let question = Question::fixed("2 + 2", vec![3, 4, 5, 8], 4, SystemTime::now());
        let view = question.view();

        assert_eq!(view.question, "2 + 2");
        assert_eq!(view.options, vec![3, 4, 5, 8]);
        let encoded = serde_json::to_string(&view).unwrap();
        assert!(!encoded.contains("answer"));
    }
}
