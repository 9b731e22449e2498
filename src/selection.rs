/**
 * Choose which questions to ask.
 *
 * Every strategy works on the questions of one bank plus the learner's progress, and
 * returns the chosen questions with their answers withheld. Only `sequential` changes
 * the progress (it moves the cursor); persisting that change is up to the caller.
 */
use std::cmp::{self, Ordering};
use std::collections::{BTreeMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;

use super::common::{QuizError, Result};
use super::progress::{Progress, QuestionStat, PASS_SCORE};
use super::quiz::{Corpus, Question, QuestionId, QuestionView, Scope};
use super::topics::TopicClassifier;

/// The number of questions in the curated set.
pub const CURATED_SIZE: usize = 500;

#[derive(Debug, Serialize)]
pub struct RandomSet {
    pub mode: &'static str,
    #[serde(flatten)]
    pub scope: Scope,
    pub category: Option<String>,
    /// The size of the pool after filtering.
    pub total_available: usize,
    pub count: usize,
    pub questions: Vec<QuestionView>,
}

/// Draw `count` questions at random, optionally restricted to one category and to
/// questions that have never been answered.
pub fn random<R: Rng + ?Sized>(
    scope: Scope,
    questions: &[Question],
    progress: &Progress,
    category: Option<&str>,
    exclude_done: bool,
    count: usize,
    rng: &mut R,
) -> Result<RandomSet> {
    let mut pool: Vec<&Question> = questions.iter().collect();

    if let Some(category) = category {
        pool.retain(|q| q.category == category);
        if pool.is_empty() {
            return Err(QuizError::UnknownCategory(category.to_string()));
        }
    }

    if exclude_done {
        let done = progress.answered_ids();
        pool.retain(|q| !done.contains(&q.id));
    }

    let chosen = sample(&pool, count, rng);
    Ok(RandomSet {
        mode: "random",
        scope,
        category: category.map(String::from),
        total_available: pool.len(),
        count: chosen.len(),
        questions: views(&chosen),
    })
}

#[derive(Debug, Serialize)]
pub struct SequentialBatch {
    pub mode: &'static str,
    #[serde(flatten)]
    pub scope: Scope,
    /// 1-based position of the first question in the batch.
    pub position: usize,
    pub end_position: usize,
    pub total: usize,
    pub remaining: usize,
    pub progress_pct: String,
    pub count: usize,
    pub questions: Vec<QuestionView>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum SequentialOutcome {
    Reset {
        message: String,
        position: usize,
        total: usize,
    },
    Finished {
        message: String,
        position: usize,
        total: usize,
        hint: String,
    },
    Batch(SequentialBatch),
}

/// Return the next `count` questions in bank order and advance the cursor past them.
/// With `reset`, move the cursor back to the start and return no questions.
pub fn sequential(
    scope: Scope,
    questions: &[Question],
    progress: &mut Progress,
    count: usize,
    reset: bool,
) -> SequentialOutcome {
    let total = questions.len();

    if reset {
        progress.set_cursor(&scope, 0);
        return SequentialOutcome::Reset {
            message: format!("已重置 {} 的顺序练习进度", scope.key()),
            position: 0,
            total,
        };
    }

    // The bank may have been re-imported with fewer questions.
    let start = cmp::min(progress.cursor(&scope), total);
    if start >= total {
        progress.set_cursor(&scope, start);
        return SequentialOutcome::Finished {
            message: String::from("已完成全部题目!"),
            position: start,
            total,
            hint: String::from("使用 --reset 可从头开始"),
        };
    }

    let end = cmp::min(start + count, total);
    let chosen: Vec<&Question> = questions[start..end].iter().collect();
    progress.set_cursor(&scope, end);

    SequentialOutcome::Batch(SequentialBatch {
        mode: "sequential",
        scope,
        position: start + 1,
        end_position: end,
        total,
        remaining: total - end,
        progress_pct: format!("{:.1}%", end as f64 / total as f64 * 100.0),
        count: chosen.len(),
        questions: views(&chosen),
    })
}

#[derive(Debug, Serialize)]
pub struct ExamPaper {
    pub mode: &'static str,
    #[serde(flatten)]
    pub scope: Scope,
    pub total_questions: usize,
    pub pass_score: u32,
    pub time_limit_minutes: u32,
    pub questions: Vec<QuestionView>,
}

/// Draw a mock exam of the official size for the subject, or the whole bank if it is
/// smaller than that.
pub fn exam<R: Rng + ?Sized>(scope: Scope, questions: &[Question], rng: &mut R) -> ExamPaper {
    let pool: Vec<&Question> = questions.iter().collect();
    let chosen = sample(&pool, scope.subject.exam_size(), rng);
    ExamPaper {
        mode: "exam",
        scope,
        total_questions: chosen.len(),
        pass_score: PASS_SCORE,
        time_limit_minutes: scope.subject.exam_minutes(),
        questions: views(&chosen),
    }
}

#[derive(Debug, Serialize)]
pub struct TopicSet {
    pub mode: &'static str,
    #[serde(flatten)]
    pub scope: Scope,
    pub topic: String,
    pub total_available: usize,
    pub count: usize,
    pub questions: Vec<QuestionView>,
}

/// Draw `count` questions that carry the topic label `topic`.
pub fn topic_practice<R: Rng + ?Sized>(
    scope: Scope,
    questions: &[Question],
    classifier: &TopicClassifier,
    topic: &str,
    count: usize,
    rng: &mut R,
) -> Result<TopicSet> {
    let pool: Vec<&Question> = questions
        .iter()
        .filter(|q| classifier.matches(q, topic))
        .collect();
    if pool.is_empty() {
        return Err(QuizError::UnknownTopic(topic.to_string()));
    }

    let chosen = sample(&pool, count, rng);
    Ok(TopicSet {
        mode: "topic_practice",
        scope,
        topic: topic.to_string(),
        total_available: pool.len(),
        count: chosen.len(),
        questions: chosen
            .iter()
            .map(|q| QuestionView::from(*q).with_topics(classifier.classify(q)))
            .collect(),
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ReviewMode {
    #[serde(rename = "wrong_review")]
    Wrong,
    #[serde(rename = "favorites")]
    Favorites,
}

#[derive(Debug, Serialize)]
pub struct ReviewSet {
    pub mode: ReviewMode,
    /// The size of the whole wrong set or favorites set.
    pub total: usize,
    pub showing: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub questions: Vec<QuestionView>,
}

/// Collect the questions whose ids are in `ids` from every bank in `corpora`, in bank
/// order. If `count` is given, nonzero and fewer than all of them, draw that many at
/// random.
pub fn review<R: Rng + ?Sized>(
    mode: ReviewMode,
    corpora: &[&Corpus],
    ids: &[QuestionId],
    count: Option<usize>,
    rng: &mut R,
) -> ReviewSet {
    let wanted: HashSet<QuestionId> = ids.iter().copied().collect();
    if wanted.is_empty() {
        let message = match mode {
            ReviewMode::Wrong => "没有错题记录，继续保持!",
            ReviewMode::Favorites => "没有收藏的题目",
        };
        return ReviewSet {
            mode,
            total: 0,
            showing: 0,
            message: Some(String::from(message)),
            questions: Vec::new(),
        };
    }

    let mut found: Vec<&Question> = corpora
        .iter()
        .flat_map(|c| c.questions.iter())
        .filter(|q| wanted.contains(&q.id))
        .collect();
    if let Some(count) = count.filter(|c| *c > 0) {
        if found.len() > count {
            found = sample(&found, count, rng);
        }
    }

    ReviewSet {
        mode,
        total: wanted.len(),
        showing: found.len(),
        message: None,
        questions: views(&found),
    }
}

#[derive(Debug, Serialize)]
pub struct RankedQuestion {
    #[serde(flatten)]
    pub question: QuestionView,
    pub error_rate: String,
    pub attempts: u64,
}

#[derive(Debug, Serialize)]
pub struct HardSet {
    pub mode: &'static str,
    #[serde(flatten)]
    pub scope: Scope,
    /// How many questions of the bank have been attempted at least once.
    pub total_with_stats: usize,
    pub count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
    pub questions: Vec<RankedQuestion>,
}

type Ranked<'a> = (&'a Question, QuestionStat, f64);

/// Return the `count` attempted questions with the highest error rates. Ties go to the
/// question attempted more often, then to bank order.
pub fn hard(
    scope: Scope,
    questions: &[Question],
    progress: &Progress,
    classifier: &TopicClassifier,
    count: usize,
) -> HardSet {
    let mut ranked: Vec<Ranked> = Vec::new();
    for q in questions.iter() {
        if let Some(stat) = progress.question_stats.get(&q.id) {
            if let Some(rate) = stat.error_rate() {
                ranked.push((q, *stat, rate));
            }
        }
    }

    if ranked.is_empty() {
        return HardSet {
            mode: "hard",
            scope,
            total_with_stats: 0,
            count: 0,
            message: Some(String::from("还没有做题记录，无法计算易错率。请先做一些题目!")),
            hint: Some(String::from("建议先用 sequential 或 random 模式做一轮题")),
            questions: Vec::new(),
        };
    }

    // `sort_by` is stable, so bank order breaks the remaining ties.
    ranked.sort_by(cmp_ranked_hardest);
    let total_with_stats = ranked.len();
    ranked.truncate(count);

    HardSet {
        mode: "hard",
        scope,
        total_with_stats,
        count: ranked.len(),
        message: None,
        hint: None,
        questions: ranked
            .into_iter()
            .map(|(q, stat, _)| RankedQuestion {
                question: QuestionView::from(q).with_topics(classifier.classify(q)),
                error_rate: stat.error_rate_label(),
                attempts: stat.attempts,
            })
            .collect(),
    }
}

/// Comparison function that sorts ranked questions such that the highest error rates
/// come first.
fn cmp_ranked_hardest(a: &Ranked, b: &Ranked) -> Ordering {
    if a.2 > b.2 {
        Ordering::Less
    } else if a.2 < b.2 {
        Ordering::Greater
    } else {
        cmp_ranked_most(a, b)
    }
}

/// Comparison function that sorts ranked questions such that the most attempted come
/// first.
fn cmp_ranked_most(a: &Ranked, b: &Ranked) -> Ordering {
    b.1.attempts.cmp(&a.1.attempts)
}

/// How the returned batch of the curated set splits between questions currently
/// answered wrong, questions never answered and questions answered before.
#[derive(Debug, Default, PartialEq, Eq, Serialize)]
pub struct Composition {
    pub wrong: usize,
    pub unanswered: usize,
    pub reviewed: usize,
}

#[derive(Debug, Serialize)]
pub struct CuratedBatch {
    pub mode: &'static str,
    #[serde(flatten)]
    pub scope: Scope,
    pub total_selected: usize,
    pub composition: Composition,
    pub count: usize,
    pub questions: Vec<QuestionView>,
}

/// Build the curated set of `CURATED_SIZE` questions and return a batch of `count` of
/// them.
///
/// The set holds, in order of priority:
///
/// 1. every question currently answered wrong;
/// 2. never-answered questions, spread evenly across categories;
/// 3. questions answered correctly before, drawn at random.
///
/// The set is truncated to `CURATED_SIZE` and shuffled before the batch is taken, so
/// that repeated calls eventually cover the whole set.
pub fn curated<R: Rng + ?Sized>(
    scope: Scope,
    questions: &[Question],
    progress: &Progress,
    count: usize,
    rng: &mut R,
) -> CuratedBatch {
    let wrong: HashSet<QuestionId> = progress.wrong_questions.iter().copied().collect();
    let answered = progress.answered_ids();

    let mut wrong_pool = Vec::new();
    let mut unanswered_pool = Vec::new();
    let mut reviewed_pool = Vec::new();
    for q in questions.iter() {
        if wrong.contains(&q.id) {
            wrong_pool.push(q);
        } else if !answered.contains(&q.id) {
            unanswered_pool.push(q);
        } else {
            reviewed_pool.push(q);
        }
    }

    let mut selected = wrong_pool;
    let budget = CURATED_SIZE.saturating_sub(selected.len());
    if budget > 0 {
        selected.extend(sample_across_categories(&unanswered_pool, budget, rng));
    }
    let budget = CURATED_SIZE.saturating_sub(selected.len());
    if budget > 0 {
        selected.extend(sample(&reviewed_pool, budget, rng));
    }
    selected.truncate(CURATED_SIZE);
    selected.shuffle(rng);

    let batch = &selected[..cmp::min(count, selected.len())];
    let mut composition = Composition::default();
    for q in batch.iter() {
        if wrong.contains(&q.id) {
            composition.wrong += 1;
        } else if answered.contains(&q.id) {
            composition.reviewed += 1;
        } else {
            composition.unanswered += 1;
        }
    }

    CuratedBatch {
        mode: "top500",
        scope,
        total_selected: selected.len(),
        composition,
        count: batch.len(),
        questions: views(batch),
    }
}

/// Draw up to `budget` questions from `pool` so that every category gets an even share.
///
/// Each round offers every category that still has questions a quota of
/// `max(1, budget_left / open_categories)`. Categories smaller than their quota give up
/// the difference, which later rounds hand to the larger ones.
fn sample_across_categories<'a, R: Rng + ?Sized>(
    pool: &[&'a Question],
    budget: usize,
    rng: &mut R,
) -> Vec<&'a Question> {
    let mut by_category: BTreeMap<&str, Vec<&'a Question>> = BTreeMap::new();
    for q in pool.iter() {
        by_category.entry(q.category.as_str()).or_default().push(q);
    }

    let mut groups: Vec<Vec<&'a Question>> = by_category.into_iter().map(|(_, g)| g).collect();
    for group in groups.iter_mut() {
        group.shuffle(rng);
    }

    let mut taken = vec![0; groups.len()];
    let mut chosen = Vec::new();
    loop {
        let left = budget - chosen.len();
        let open = groups
            .iter()
            .zip(taken.iter())
            .filter(|(g, t)| **t < g.len())
            .count();
        if left == 0 || open == 0 {
            break;
        }

        let quota = cmp::max(1, left / open);
        for (group, t) in groups.iter().zip(taken.iter_mut()) {
            let room = budget - chosen.len();
            let take = cmp::min(cmp::min(quota, group.len() - *t), room);
            chosen.extend_from_slice(&group[*t..*t + take]);
            *t += take;
        }
    }
    chosen
}

/// Uniform sample without replacement of at most `count` questions.
fn sample<'a, R: Rng + ?Sized>(pool: &[&'a Question], count: usize, rng: &mut R) -> Vec<&'a Question> {
    pool.choose_multiple(rng, count).copied().collect()
}

fn views(questions: &[&Question]) -> Vec<QuestionView> {
    questions.iter().map(|q| QuestionView::from(*q)).collect()
}
