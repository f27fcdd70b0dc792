//! Round state machine and score-to-movement conversion
//!
//! A session has at most one [`RoundState`]. While the state exists the
//! round is either `Running` (timer active, answers accepted) or
//! `Paused` (timer elapsed, scores frozen until the next start). Idle
//! is represented by the absence of a `RoundState`.
//!
//! When a round pauses, the score accumulated since the previous pause
//! is converted into board movement and the per-player snapshot
//! (`last_scores`) is overwritten, so each pause attributes movement
//! only to the round just completed.

use std::collections::HashMap;

use serde::Serialize;
use serde_with::skip_serializing_none;
use web_time::SystemTime;

use crate::{
    constants::round::{MAX_MOVES_PER_ROUND, SCORE_PER_SPACE, SMALL_ROSTER_LIMIT},
    question::{Question, QuestionView},
    roster::Id,
};

/// Whether the round is live or between-rounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Timer active, answers accepted, scores accumulating
    Running,
    /// Timer elapsed; scores frozen pending the next start
    Paused,
}

/// Live state of one round
#[derive(Debug)]
pub struct RoundState {
    /// Cumulative score per player for the whole session
    scores: HashMap<Id, u32>,
    /// Score recorded as of the last pause, per player
    last_scores: HashMap<Id, u32>,
    /// The one outstanding question per player
    questions: HashMap<Id, Question>,
    /// When the round was first started
    started_at: SystemTime,
    status: Status,
}

/// Broadcast projection of a [`RoundState`]
///
/// `move_spaces` is only present while the round is paused; a running
/// round has no movement to report yet.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct RoundView {
    /// Cumulative score per player
    pub scores: HashMap<Id, u32>,
    /// Current round status
    pub status: Status,
    /// Board spaces earned in the round just completed, when paused
    pub move_spaces: Option<HashMap<Id, u32>>,
}

impl RoundState {
    /// Creates a fresh running round seeded with zero scores
    ///
    /// Every player in `players` gets a zero entry in both `scores`
    /// and `last_scores`.
    pub fn new(players: impl IntoIterator<Item = Id>) -> Self {
        let mut scores = HashMap::new();
        let mut last_scores = HashMap::new();
        for id in players {
            scores.insert(id, 0);
            last_scores.insert(id, 0);
        }

        Self {
            scores,
            last_scores,
            questions: HashMap::new(),
            started_at: SystemTime::now(),
            status: Status::Running,
        }
    }

    /// Current round status
    pub fn status(&self) -> Status {
        self.status
    }

    /// Returns `true` while the round accepts answers
    pub fn is_running(&self) -> bool {
        self.status == Status::Running
    }

    /// When the round was first started
    pub fn started_at(&self) -> SystemTime {
        self.started_at
    }

    /// Resumes a paused round without reseeding scores
    pub fn resume(&mut self) {
        self.status = Status::Running;
    }

    /// Freezes the round at the end of its countdown
    pub fn pause(&mut self) {
        self.status = Status::Paused;
    }

    /// Issues a fresh question to the given player
    ///
    /// Replaces any previously outstanding question; there is always
    /// exactly one pending question per active player.
    pub fn issue_question(&mut self, player: Id) -> QuestionView {
        let question = Question::generate();
        let view = question.view();
        self.questions.insert(player, question);
        view
    }

    /// Returns `true` if the player has an outstanding question
    pub fn has_question(&self, player: Id) -> bool {
        self.questions.contains_key(&player)
    }

    /// Scores an answer against the player's outstanding question
    ///
    /// Returns `true` and adds the latency score to the player's total
    /// when the chosen option is correct. A missing question or an
    /// out-of-range index counts as incorrect; this never fails.
    pub fn answer(&mut self, player: Id, option_index: usize, answered_at: SystemTime) -> bool {
        let Some(question) = self.questions.get(&player) else {
            return false;
        };

        if !question.is_correct(option_index) {
            return false;
        }

        let earned = question.score(answered_at);
        *self.scores.entry(player).or_insert(0) += earned;
        true
    }

    /// The player's cumulative score, if they are still in the round
    pub fn score(&self, player: Id) -> Option<u32> {
        self.scores.get(&player).copied()
    }

    /// Drops a departing player's score and outstanding question
    ///
    /// Their `last_scores` snapshot is left in place; it is harmless
    /// and disappears with the round.
    pub fn remove_player(&mut self, player: Id) {
        self.scores.remove(&player);
        self.questions.remove(&player);
    }

    /// Builds the broadcast view of the round
    ///
    /// While paused this computes board movement for the round just
    /// completed and then overwrites `last_scores` with the current
    /// scores, so the conversion happens exactly once per pause.
    pub fn view(&mut self) -> RoundView {
        let move_spaces = match self.status {
            Status::Running => None,
            Status::Paused => {
                let moves = self.move_spaces();
                self.last_scores = self.scores.clone();
                Some(moves)
            }
        };

        RoundView {
            scores: self.scores.clone(),
            status: self.status,
            move_spaces,
        }
    }

    /// Converts score deltas since the last pause into board spaces
    ///
    /// Two formulas, selected by the number of scoring players. Small
    /// rosters use absolute thresholding per player; three or more
    /// players are measured relative to the field's average score,
    /// since small-population averages are too noisy for a fair
    /// comparison. Both results are clamped to
    /// `[0, MAX_MOVES_PER_ROUND]`.
    fn move_spaces(&self) -> HashMap<Id, u32> {
        let delta = |id: &Id, score: u32| match self.last_scores.get(id) {
            Some(&last) => score.saturating_sub(last),
            None => score,
        };

        if self.scores.len() < SMALL_ROSTER_LIMIT {
            self.scores
                .iter()
                .map(|(id, &score)| {
                    let delta = delta(id, score);
                    let spaces = if delta > 0 {
                        (delta / SCORE_PER_SPACE + 1).min(MAX_MOVES_PER_ROUND)
                    } else {
                        0
                    };
                    (*id, spaces)
                })
                .collect()
        } else {
            let average =
                f64::from(self.scores.values().sum::<u32>()) / self.scores.len() as f64;
            self.scores
                .iter()
                .map(|(id, &score)| {
                    let proportion = if average > 0.0 {
                        f64::from(delta(id, score)) / average
                    } else {
                        0.0
                    };
                    let spaces = (f64::from(MAX_MOVES_PER_ROUND) * proportion)
                        .round()
                        .clamp(0.0, f64::from(MAX_MOVES_PER_ROUND))
                        as u32;
                    (*id, spaces)
                })
                .collect()
        }
    }

    /// Replaces a player's outstanding question for deterministic tests
    #[cfg(test)]
    pub(crate) fn set_question(&mut self, player: Id, question: Question) {
        self.questions.insert(player, question);
    }

    /// Overrides score bookkeeping for deterministic tests
    #[cfg(test)]
    pub(crate) fn set_scores(&mut self, scores: HashMap<Id, u32>, last_scores: HashMap<Id, u32>) {
        self.scores = scores;
        self.last_scores = last_scores;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn fixed_question(issued_at: SystemTime) -> Question {
        Question::fixed("2 + 2", vec![3, 4, 5, 8], 4, issued_at)
    }

    #[test]
    fn new_round_seeds_zero_scores_for_every_player() {
        let players = [Id::new(), Id::new(), Id::new()];
        let round = RoundState::new(players);

        assert!(round.is_running());
        for id in players {
            assert_eq!(round.score(id), Some(0));
            assert_eq!(round.last_scores.get(&id), Some(&0));
        }
    }

    #[test]
    fn issue_question_replaces_the_outstanding_one() {
        let player = Id::new();
        let mut round = RoundState::new([player]);

        assert!(!round.has_question(player));
        round.issue_question(player);
        assert!(round.has_question(player));
        round.issue_question(player);
        assert_eq!(round.questions.len(), 1);
    }

    #[test]
    fn correct_answer_adds_latency_score() {
        let player = Id::new();
        let mut round = RoundState::new([player]);
        let issued_at = SystemTime::now();
        round.set_question(player, fixed_question(issued_at));

        let correct = round.answer(player, 1, issued_at + Duration::from_secs(1));

        assert!(correct);
        assert_eq!(round.score(player), Some(9));
    }

    #[test]
    fn wrong_answer_leaves_score_untouched() {
        let player = Id::new();
        let mut round = RoundState::new([player]);
        let issued_at = SystemTime::now();
        round.set_question(player, fixed_question(issued_at));

        assert!(!round.answer(player, 0, issued_at));
        assert!(!round.answer(player, 17, issued_at));
        assert_eq!(round.score(player), Some(0));
    }

    #[test]
    fn answer_without_pending_question_is_incorrect_not_an_error() {
        let player = Id::new();
        let mut round = RoundState::new([player]);

        assert!(!round.answer(player, 0, SystemTime::now()));
        assert!(!round.answer(Id::new(), 0, SystemTime::now()));
    }

    #[test]
    fn running_view_has_no_movement() {
        let player = Id::new();
        let mut round = RoundState::new([player]);

        let view = round.view();

        assert_eq!(view.status, Status::Running);
        assert!(view.move_spaces.is_none());
        assert_eq!(view.scores.get(&player), Some(&0));
    }

    #[test]
    fn small_roster_movement_uses_absolute_thresholds() {
        let a = Id::new();
        let b = Id::new();
        let mut round = RoundState::new([a, b]);
        round.set_scores(
            HashMap::from([(a, 9), (b, 0)]),
            HashMap::from([(a, 0), (b, 0)]),
        );
        round.pause();

        let view = round.view();
        let moves = view.move_spaces.unwrap();

        assert_eq!(moves.get(&a), Some(&2)); // 9 / 6 + 1
        assert_eq!(moves.get(&b), Some(&0));
    }

    #[test]
    fn small_roster_movement_is_capped() {
        let a = Id::new();
        let mut round = RoundState::new([a]);
        round.set_scores(HashMap::from([(a, 100)]), HashMap::from([(a, 0)]));
        round.pause();

        let moves = round.view().move_spaces.unwrap();

        assert_eq!(moves.get(&a), Some(&MAX_MOVES_PER_ROUND));
    }

    #[test]
    fn player_without_snapshot_moves_on_raw_score() {
        let a = Id::new();
        let mut round = RoundState::new([a]);
        round.set_scores(HashMap::from([(a, 13)]), HashMap::new());
        round.pause();

        let moves = round.view().move_spaces.unwrap();

        assert_eq!(moves.get(&a), Some(&3)); // 13 / 6 + 1
    }

    #[test]
    fn large_roster_movement_is_relative_to_average() {
        let a = Id::new();
        let b = Id::new();
        let c = Id::new();
        let mut round = RoundState::new([a, b, c]);
        // average = (4 + 16 + 40) / 3 = 20
        round.set_scores(
            HashMap::from([(a, 4), (b, 16), (c, 40)]),
            HashMap::from([(a, 0), (b, 0), (c, 0)]),
        );
        round.pause();

        let moves = round.view().move_spaces.unwrap();

        assert_eq!(moves.get(&a), Some(&1)); // round(5 * 4/20)
        assert_eq!(moves.get(&b), Some(&4)); // round(5 * 16/20)
        assert_eq!(moves.get(&c), Some(&5)); // round(5 * 40/20) clamped
    }

    #[test]
    fn zero_average_yields_zero_movement_without_fault() {
        let players = [Id::new(), Id::new(), Id::new()];
        let mut round = RoundState::new(players);
        round.pause();

        let moves = round.view().move_spaces.unwrap();

        for id in players {
            assert_eq!(moves.get(&id), Some(&0));
        }
    }

    #[test]
    fn paused_view_snapshots_last_scores_exactly_once() {
        let a = Id::new();
        let mut round = RoundState::new([a]);
        round.set_scores(HashMap::from([(a, 9)]), HashMap::from([(a, 0)]));
        round.pause();

        let first = round.view().move_spaces.unwrap();
        assert_eq!(first.get(&a), Some(&2));
        assert_eq!(round.last_scores.get(&a), Some(&9));

        // A second view of the same pause sees no fresh delta.
        let second = round.view().move_spaces.unwrap();
        assert_eq!(second.get(&a), Some(&0));
    }

    #[test]
    fn resume_keeps_scores() {
        let a = Id::new();
        let mut round = RoundState::new([a]);
        round.set_scores(HashMap::from([(a, 7)]), HashMap::from([(a, 0)]));
        round.pause();
        round.resume();

        assert!(round.is_running());
        assert_eq!(round.score(a), Some(7));
    }

    #[test]
    fn remove_player_drops_score_and_question() {
        let a = Id::new();
        let b = Id::new();
        let mut round = RoundState::new([a, b]);
        round.issue_question(a);

        round.remove_player(a);

        assert_eq!(round.score(a), None);
        assert!(!round.has_question(a));
        assert_eq!(round.score(b), Some(0));
    }
}
