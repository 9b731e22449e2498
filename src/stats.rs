/**
 * Read-only summaries of the learner's progress and of the question banks.
 */
use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use super::common::Result;
use super::progress::{ExamRecord, Progress};
use super::quiz::{Question, QuestionKind, Scope, Subject, VehicleClass};
use super::topics::{MnemonicTable, TopicClassifier};

// A category needs this many answers before it can count as weak.
const WEAK_MIN_ANSWERED: u64 = 5;
// Categories answered correctly less often than this are weak.
const WEAK_ACCURACY: f64 = 80.0;
const WEAK_LIMIT: usize = 5;
const RECENT_EXAMS: usize = 5;

#[derive(Debug, Serialize)]
pub struct Stats {
    pub total_answered: u64,
    pub total_correct: u64,
    pub accuracy: String,
    pub wrong_count: usize,
    pub favorites_count: usize,
    pub weak_categories: Vec<WeakCategory>,
    pub sequential_progress: BTreeMap<String, CursorProgress>,
    pub mock_exams: Vec<ExamRecord>,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct WeakCategory {
    pub name: String,
    pub accuracy: String,
    pub answered: u64,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct CursorProgress {
    pub position: usize,
    pub total: usize,
    pub progress: String,
}

/// Summarize `progress`. `declared_total` reports how many questions the bank of a scope
/// has, for the sequential progress percentages.
pub fn summarize<F>(progress: &Progress, mut declared_total: F) -> Result<Stats>
where
    F: FnMut(&Scope) -> Result<usize>,
{
    let mut weak: Vec<(f64, WeakCategory)> = Vec::new();
    for (name, category) in progress.categories.iter() {
        if category.answered < WEAK_MIN_ANSWERED {
            continue;
        }
        if let Some(accuracy) = category.accuracy() {
            if accuracy < WEAK_ACCURACY {
                weak.push((
                    accuracy,
                    WeakCategory {
                        name: name.clone(),
                        accuracy: format!("{:.0}%", accuracy),
                        answered: category.answered,
                    },
                ));
            }
        }
    }
    weak.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(std::cmp::Ordering::Equal));

    let mut sequential_progress = BTreeMap::new();
    for (key, position) in progress.sequential_pos.iter() {
        let total = match Scope::from_key(key) {
            Some(scope) => declared_total(&scope)?,
            None => 0,
        };
        let pct = if total > 0 {
            format!("{:.1}%", *position as f64 / total as f64 * 100.0)
        } else {
            String::from("0%")
        };
        sequential_progress.insert(
            key.clone(),
            CursorProgress { position: *position, total, progress: pct },
        );
    }

    let recent = progress.mock_exams.len().saturating_sub(RECENT_EXAMS);
    Ok(Stats {
        total_answered: progress.total_answered,
        total_correct: progress.total_correct,
        accuracy: format!("{:.1}%", progress.accuracy()),
        wrong_count: progress.wrong_questions.len(),
        favorites_count: progress.favorites.len(),
        weak_categories: weak.into_iter().take(WEAK_LIMIT).map(|(_, w)| w).collect(),
        sequential_progress,
        mock_exams: progress.mock_exams[recent..].to_vec(),
    })
}

#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct TypeCounts {
    pub single: usize,
    pub judge: usize,
    pub multi: usize,
}

#[derive(Debug, Serialize)]
pub struct CategorySummary {
    pub name: String,
    pub total: usize,
    pub types: TypeCounts,
    pub answered: u64,
    pub correct: u64,
    pub accuracy: String,
}

#[derive(Debug, Serialize)]
pub struct CategoryListing {
    #[serde(flatten)]
    pub scope: Scope,
    pub categories: Vec<CategorySummary>,
}

/// List the categories of a bank, largest first, with the learner's record in each.
pub fn categories(scope: Scope, questions: &[Question], progress: &Progress) -> CategoryListing {
    let mut summaries: Vec<CategorySummary> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for q in questions.iter() {
        let i = *index.entry(q.category.as_str()).or_insert_with(|| {
            let record = progress.categories.get(&q.category);
            summaries.push(CategorySummary {
                name: q.category.clone(),
                total: 0,
                types: TypeCounts::default(),
                answered: record.map(|r| r.answered).unwrap_or(0),
                correct: record.map(|r| r.correct).unwrap_or(0),
                accuracy: match record.and_then(|r| r.accuracy()) {
                    Some(accuracy) => format!("{:.0}%", accuracy),
                    None => String::from("未练习"),
                },
            });
            summaries.len() - 1
        });

        let summary = &mut summaries[i];
        summary.total += 1;
        match q.kind {
            QuestionKind::Single => summary.types.single += 1,
            QuestionKind::Judge => summary.types.judge += 1,
            QuestionKind::Multi => summary.types.multi += 1,
        }
    }

    summaries.sort_by(|a, b| b.total.cmp(&a.total));
    CategoryListing { scope, categories: summaries }
}

#[derive(Debug, Serialize)]
pub struct TopicSummary {
    pub topic: String,
    pub total: usize,
    /// Distinct questions of the topic answered at least once.
    pub answered: usize,
    pub wrong: usize,
    pub progress: String,
    pub has_mnemonic: bool,
}

#[derive(Debug, Serialize)]
pub struct TopicListing {
    #[serde(flatten)]
    pub scope: Scope,
    pub topics: Vec<TopicSummary>,
}

/// List every topic that occurs in a bank, most common first.
pub fn topics(
    scope: Scope,
    questions: &[Question],
    progress: &Progress,
    classifier: &TopicClassifier,
    mnemonics: &MnemonicTable,
) -> TopicListing {
    let answered = progress.answered_ids();
    let wrong: HashSet<_> = progress.wrong_questions.iter().copied().collect();

    let mut summaries = Vec::new();
    for label in classifier.labels() {
        let mut total = 0;
        let mut done = 0;
        let mut missed = 0;
        for q in questions.iter().filter(|q| classifier.matches(q, label)) {
            total += 1;
            if answered.contains(&q.id) {
                done += 1;
            }
            if wrong.contains(&q.id) {
                missed += 1;
            }
        }
        if total == 0 {
            continue;
        }

        summaries.push(TopicSummary {
            topic: label.to_string(),
            total,
            answered: done,
            wrong: missed,
            progress: format!("{:.0}%", done as f64 / total as f64 * 100.0),
            has_mnemonic: mnemonics.has_mnemonic(label),
        });
    }

    summaries.sort_by(|a, b| b.total.cmp(&a.total));
    TopicListing { scope, topics: summaries }
}

#[derive(Debug, Serialize)]
pub struct VehicleTypeSummary {
    pub vtype: VehicleClass,
    pub name: &'static str,
    pub covers: &'static [&'static str],
    pub subject1: usize,
    pub subject4: usize,
}

#[derive(Debug, Serialize)]
pub struct VehicleTypes {
    pub vehicle_types: Vec<VehicleTypeSummary>,
}

/// List the vehicle classes with the size of each of their banks.
pub fn vehicle_types<F>(mut declared_total: F) -> Result<VehicleTypes>
where
    F: FnMut(&Scope) -> Result<usize>,
{
    let mut vehicle_types = Vec::new();
    for vtype in VehicleClass::ALL.iter().copied() {
        vehicle_types.push(VehicleTypeSummary {
            vtype,
            name: vtype.name(),
            covers: vtype.covers(),
            subject1: declared_total(&Scope::new(vtype, Subject::One))?,
            subject4: declared_total(&Scope::new(vtype, Subject::Four))?,
        });
    }
    Ok(VehicleTypes { vehicle_types })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::CategoryProgress;
    use crate::quiz::QuestionId;
    use crate::topics::Mnemonic;

    fn record(answered: u64, correct: u64) -> CategoryProgress {
        CategoryProgress { answered, correct, answered_ids: Vec::new() }
    }

    fn judge(seq: u32, category: &str, text: &str) -> Question {
        let id = QuestionId::new(VehicleClass::C1, Subject::One, seq).unwrap();
        Question::new(id, category, QuestionKind::Judge, text, &[], "对").unwrap()
    }

    #[test]
    fn empty_progress_has_zero_accuracy() {
        let stats = summarize(&Progress::default(), |_| Ok(0)).unwrap();
        assert_eq!(stats.accuracy, "0.0%");
        assert!(stats.weak_categories.is_empty());
        assert!(stats.mock_exams.is_empty());
    }

    #[test]
    fn weak_categories_are_sorted_and_capped() {
        let mut progress = Progress::default();
        progress.categories.insert(String::from("甲"), record(10, 7));
        progress.categories.insert(String::from("乙"), record(10, 2));
        progress.categories.insert(String::from("丙"), record(4, 0));
        progress.categories.insert(String::from("丁"), record(10, 9));
        for i in 0..5 {
            progress.categories.insert(format!("戊{}", i), record(20, 10 + i));
        }

        let stats = summarize(&progress, |_| Ok(0)).unwrap();
        let names: Vec<&str> = stats.weak_categories.iter().map(|w| w.name.as_str()).collect();
        assert_eq!(names, vec!["乙", "戊0", "戊1", "戊2", "戊3"]);
        assert_eq!(stats.weak_categories[0].accuracy, "20%");
    }

    #[test]
    fn sequential_progress_uses_declared_totals() {
        let mut progress = Progress::default();
        progress.sequential_pos.insert(String::from("c1_subject1"), 50);
        progress.sequential_pos.insert(String::from("d_subject4"), 3);
        progress.sequential_pos.insert(String::from("bogus"), 3);

        let stats = summarize(&progress, |scope| {
            Ok(if scope.vehicle_class == VehicleClass::C1 { 200 } else { 0 })
        })
        .unwrap();
        assert_eq!(stats.sequential_progress["c1_subject1"].progress, "25.0%");
        assert_eq!(stats.sequential_progress["d_subject4"].progress, "0%");
        assert_eq!(stats.sequential_progress["bogus"].total, 0);
    }

    #[test]
    fn only_recent_exams_are_reported() {
        let mut progress = Progress::default();
        let scope = Scope::new(VehicleClass::C1, Subject::One);
        for score in 80..88 {
            progress.mock_exams.push(ExamRecord::new(String::from("2024-01-01 10:00"), scope, score, 100));
        }
        let stats = summarize(&progress, |_| Ok(0)).unwrap();
        let scores: Vec<u32> = stats.mock_exams.iter().map(|e| e.score).collect();
        assert_eq!(scores, vec![83, 84, 85, 86, 87]);
    }

    #[test]
    fn categories_are_listed_largest_first() {
        let questions = vec![
            judge(1, "法规", "题"),
            judge(2, "标志", "题"),
            judge(3, "标志", "题"),
        ];
        let mut progress = Progress::default();
        progress.record_answer(&questions[1], true);
        progress.record_answer(&questions[2], false);

        let scope = Scope::new(VehicleClass::C1, Subject::One);
        let listing = categories(scope, &questions, &progress);
        assert_eq!(listing.categories[0].name, "标志");
        assert_eq!(listing.categories[0].types.judge, 2);
        assert_eq!(listing.categories[0].accuracy, "50%");
        assert_eq!(listing.categories[1].accuracy, "未练习");
    }

    #[test]
    fn topics_report_progress_and_mnemonics() {
        let questions = vec![
            judge(1, "综合", "遇到红灯应停车等待。"),
            judge(2, "综合", "绿灯亮时可以通行。"),
            judge(3, "综合", "超车时应鸣喇叭。"),
        ];
        let mut progress = Progress::default();
        progress.record_answer(&questions[0], false);
        progress.record_answer(&questions[0], false);

        let mut by_topic = std::collections::HashMap::new();
        by_topic.insert(
            String::from("信号灯"),
            vec![Mnemonic { title: String::from("红停绿行"), body: String::new() }],
        );
        let table = MnemonicTable::new(by_topic);

        let scope = Scope::new(VehicleClass::C1, Subject::One);
        let listing = topics(scope, &questions, &progress, TopicClassifier::standard(), &table);
        let lights = &listing.topics[0];
        assert_eq!(lights.topic, "交通信号灯");
        assert_eq!((lights.total, lights.answered, lights.wrong), (2, 1, 1));
        assert_eq!(lights.progress, "50%");
        assert!(lights.has_mnemonic);
        assert!(listing.topics.iter().all(|t| t.total > 0));
    }

    #[test]
    fn vehicle_types_report_every_class() {
        let listing = vehicle_types(|scope| Ok(if scope.subject == Subject::One { 10 } else { 0 })).unwrap();
        assert_eq!(listing.vehicle_types.len(), 4);
        assert_eq!(listing.vehicle_types[2].covers, &["A2", "B2"]);
        assert_eq!(listing.vehicle_types[0].subject1, 10);
        assert_eq!(listing.vehicle_types[0].subject4, 0);
    }
}
