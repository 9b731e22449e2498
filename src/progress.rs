/**
 * The learner's practice history and the rules for updating it.
 *
 * Every field carries `#[serde(default)]` so that progress files written before a field
 * existed still load.
 */
use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};

use super::quiz::{Question, QuestionId, Scope, Subject, VehicleClass};

/// A mock exam is passed with a score of at least this much.
pub const PASS_SCORE: u32 = 90;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Progress {
    pub total_answered: u64,
    pub total_correct: u64,
    pub categories: BTreeMap<String, CategoryProgress>,
    /// Questions whose most recent answer was wrong. No id appears twice.
    pub wrong_questions: Vec<QuestionId>,
    pub favorites: Vec<QuestionId>,
    /// Cursor for sequential practice, keyed by `Scope::key`.
    pub sequential_pos: BTreeMap<String, usize>,
    pub question_stats: BTreeMap<QuestionId, QuestionStat>,
    pub mock_exams: Vec<ExamRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CategoryProgress {
    pub answered: u64,
    pub correct: u64,
    /// Every question answered in this category, once per attempt.
    pub answered_ids: Vec<QuestionId>,
}

impl CategoryProgress {
    pub fn accuracy(&self) -> Option<f64> {
        if self.answered > 0 {
            Some(self.correct as f64 / self.answered as f64 * 100.0)
        } else {
            None
        }
    }
}

/// All-time results for a single question.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionStat {
    pub attempts: u64,
    pub correct: u64,
}

impl QuestionStat {
    /// The fraction of attempts answered wrong, or `None` if there were no attempts.
    pub fn error_rate(&self) -> Option<f64> {
        if self.attempts > 0 {
            Some(1.0 - self.correct as f64 / self.attempts as f64)
        } else {
            None
        }
    }

    pub fn error_rate_label(&self) -> String {
        match self.error_rate() {
            Some(rate) => format!("{:.0}%", rate * 100.0),
            None => String::from("N/A"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExamRecord {
    pub date: String,
    pub vehicle_type: VehicleClass,
    pub subject: Subject,
    pub score: u32,
    pub total: u32,
    pub passed: bool,
}

impl ExamRecord {
    pub fn new(date: String, scope: Scope, score: u32, total: u32) -> Self {
        ExamRecord {
            date,
            vehicle_type: scope.vehicle_class,
            subject: scope.subject,
            score,
            total,
            passed: score >= PASS_SCORE,
        }
    }
}

impl Progress {
    /// Record one answer to `q` and return the question's updated all-time stats.
    pub fn record_answer(&mut self, q: &Question, correct: bool) -> QuestionStat {
        self.total_answered += 1;
        let category = self.categories.entry(q.category.clone()).or_default();
        category.answered += 1;
        category.answered_ids.push(q.id);

        if correct {
            self.total_correct += 1;
            category.correct += 1;
            self.wrong_questions.retain(|id| *id != q.id);
        } else if !self.wrong_questions.contains(&q.id) {
            self.wrong_questions.push(q.id);
        }

        let stat = self.question_stats.entry(q.id).or_default();
        stat.attempts += 1;
        if correct {
            stat.correct += 1;
        }
        *stat
    }

    /// Every question that has been answered at least once.
    pub fn answered_ids(&self) -> HashSet<QuestionId> {
        self.categories
            .values()
            .flat_map(|c| c.answered_ids.iter().copied())
            .collect()
    }

    /// Return `false` if `id` was already a favorite.
    pub fn add_favorite(&mut self, id: QuestionId) -> bool {
        if self.favorites.contains(&id) {
            false
        } else {
            self.favorites.push(id);
            true
        }
    }

    /// Return `false` if `id` was not a favorite.
    pub fn remove_favorite(&mut self, id: QuestionId) -> bool {
        let before = self.favorites.len();
        self.favorites.retain(|f| *f != id);
        self.favorites.len() != before
    }

    pub fn cursor(&self, scope: &Scope) -> usize {
        self.sequential_pos.get(&scope.key()).copied().unwrap_or(0)
    }

    pub fn set_cursor(&mut self, scope: &Scope, position: usize) {
        self.sequential_pos.insert(scope.key(), position);
    }

    /// Overall accuracy as a percentage; zero before anything has been answered.
    pub fn accuracy(&self) -> f64 {
        if self.total_answered > 0 {
            self.total_correct as f64 / self.total_answered as f64 * 100.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::QuestionKind;
    use std::convert::TryFrom;

    fn question(id: u32, category: &str) -> Question {
        let id = QuestionId::try_from(id).unwrap();
        Question::new(id, category, QuestionKind::Single, "?", &["A", "B"], "A").unwrap()
    }

    #[test]
    fn repeated_correct_answers_never_leave_question_wrong() {
        let q = question(10001, "法规");
        let mut progress = Progress::default();

        progress.record_answer(&q, true);
        assert_eq!(progress.total_correct, 1);
        assert_eq!(progress.categories["法规"].correct, 1);

        progress.record_answer(&q, true);
        assert_eq!(progress.total_correct, 2);
        assert_eq!(progress.categories["法规"].correct, 2);
        assert!(progress.wrong_questions.is_empty());
    }

    #[test]
    fn wrong_set_tracks_latest_answer() {
        let q = question(10001, "法规");
        let mut progress = Progress::default();

        progress.record_answer(&q, false);
        assert_eq!(progress.wrong_questions, vec![q.id]);
        progress.record_answer(&q, true);
        assert!(progress.wrong_questions.is_empty());
        progress.record_answer(&q, false);
        progress.record_answer(&q, false);
        assert_eq!(progress.wrong_questions, vec![q.id]);

        let stat = progress.question_stats[&q.id];
        assert_eq!(stat, QuestionStat { attempts: 4, correct: 1 });
        assert_eq!(stat.error_rate_label(), "75%");
        assert_eq!(progress.categories["法规"].answered_ids.len(), 4);
        assert_eq!(progress.answered_ids().len(), 1);
    }

    #[test]
    fn error_rate_of_unattempted_question_is_not_available() {
        assert_eq!(QuestionStat::default().error_rate_label(), "N/A");
    }

    #[test]
    fn favorites_are_a_set() {
        let id = QuestionId::try_from(40001).unwrap();
        let mut progress = Progress::default();
        assert!(progress.add_favorite(id));
        assert!(!progress.add_favorite(id));
        assert_eq!(progress.favorites.len(), 1);
        assert!(progress.remove_favorite(id));
        assert!(!progress.remove_favorite(id));
    }

    #[test]
    fn missing_fields_take_defaults() {
        let old = r#"{"total_answered": 3, "total_correct": 2, "wrong_questions": [10001]}"#;
        let progress: Progress = serde_json::from_str(old).unwrap();
        assert_eq!(progress.total_answered, 3);
        assert!(progress.favorites.is_empty());
        assert!(progress.sequential_pos.is_empty());
        assert!(progress.question_stats.is_empty());
        assert!(progress.mock_exams.is_empty());
    }

    #[test]
    fn question_stats_are_keyed_by_numeric_id() {
        let mut progress = Progress::default();
        progress.record_answer(&question(10001, "法规"), true);
        let data = serde_json::to_string(&progress).unwrap();
        let json: serde_json::Value = serde_json::from_str(&data).unwrap();
        assert_eq!(json["question_stats"]["10001"]["attempts"], 1);

        let back: Progress = serde_json::from_str(&data).unwrap();
        assert_eq!(back, progress);
    }
}
