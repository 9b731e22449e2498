/**
 * The operations behind each subcommand: load what they need from the stores, run the
 * selection or check, and persist any change to the learner's progress.
 */
use std::convert::TryFrom;
use std::rc::Rc;

use once_cell::unsync::OnceCell;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::Serialize;
use tracing::{debug, info};

use super::common::{QuizError, Result};
use super::config::Config;
use super::persistence::{load_mnemonics, CorpusStore, ProgressStore};
use super::progress::ExamRecord;
use super::quiz::{Corpus, QuestionId, Scope, Subject, VehicleClass};
use super::selection::{
    self, CuratedBatch, ExamPaper, HardSet, RandomSet, ReviewMode, ReviewSet, SequentialOutcome,
    TopicSet,
};
use super::stats::{self, CategoryListing, Stats, TopicListing, VehicleTypes};
use super::topics::{Mnemonic, MnemonicTable, TopicClassifier};

/// The result of checking one answer.
#[derive(Debug, Serialize)]
pub struct CheckOutcome {
    pub question_id: QuestionId,
    pub correct: bool,
    /// The answer as submitted.
    pub user_answer: String,
    pub correct_answer: String,
    pub explanation: String,
    pub category: String,
    pub topics: Vec<String>,
    /// The all-time error rate of the question, including this answer.
    pub error_rate: String,
    pub attempts: u64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mnemonics: Vec<Mnemonic>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FavoriteAction {
    Favorited,
    AlreadyFavorited,
    Unfavorited,
    NotInFavorites,
}

#[derive(Debug, Serialize)]
pub struct FavoriteOutcome {
    pub action: FavoriteAction,
    pub question_id: u32,
    pub total_favorites: usize,
}

#[derive(Debug, Serialize)]
pub struct ExamRecorded {
    pub recorded: bool,
    pub passed: bool,
}

pub struct Engine {
    config: Config,
    corpora: CorpusStore,
    progress: ProgressStore,
    /// Only `check` and `topics` read the mnemonics, so they are loaded on first use.
    mnemonics: OnceCell<MnemonicTable>,
    classifier: &'static TopicClassifier,
    rng: StdRng,
}

impl Engine {
    pub fn new(config: Config) -> Result<Self> {
        Engine::with_rng(config, StdRng::from_entropy())
    }

    /// An engine whose random selections are reproducible.
    pub fn with_seed(config: Config, seed: u64) -> Result<Self> {
        Engine::with_rng(config, StdRng::seed_from_u64(seed))
    }

    fn with_rng(config: Config, rng: StdRng) -> Result<Self> {
        debug!(
            data_dir = %config.data_dir.display(),
            progress = %config.progress_file.display(),
            "starting engine"
        );
        Ok(Engine {
            corpora: CorpusStore::new(&config.data_dir),
            progress: ProgressStore::new(&config.progress_file),
            mnemonics: OnceCell::new(),
            classifier: TopicClassifier::standard(),
            rng,
            config,
        })
    }

    fn mnemonics(&self) -> Result<&MnemonicTable> {
        self.mnemonics
            .get_or_try_init(|| load_mnemonics(&self.config.mnemonics_file))
    }

    pub fn vehicle_types(&self) -> Result<VehicleTypes> {
        stats::vehicle_types(|scope| self.corpora.declared_total(scope))
    }

    pub fn random(
        &mut self,
        scope: Scope,
        count: usize,
        category: Option<&str>,
        exclude_done: bool,
    ) -> Result<RandomSet> {
        let corpus = self.corpora.load(&scope)?;
        let progress = self.progress.load()?;
        let result = selection::random(
            scope,
            &corpus.questions,
            &progress,
            category,
            exclude_done,
            count,
            &mut self.rng,
        )?;
        debug!(pool = result.total_available, chosen = result.count, "random selection");
        Ok(result)
    }

    pub fn sequential(&mut self, scope: Scope, count: usize, reset: bool) -> Result<SequentialOutcome> {
        let corpus = self.corpora.load(&scope)?;
        self.progress.update(|progress| {
            Ok(selection::sequential(scope, &corpus.questions, progress, count, reset))
        })
    }

    pub fn exam(&mut self, scope: Scope) -> Result<ExamPaper> {
        let corpus = self.corpora.load(&scope)?;
        Ok(selection::exam(scope, &corpus.questions, &mut self.rng))
    }

    /// Check `answer` against question `id`, record the result and return it with the
    /// explanation.
    pub fn check(&mut self, id: u32, answer: &str) -> Result<CheckOutcome> {
        let question = self.corpora.find_by_id(resolve_id(id)?)?;
        let mnemonics = self.mnemonics()?.for_question(self.classifier, &question);
        let correct = question.check(answer);
        let stat = self
            .progress
            .update(|progress| Ok(progress.record_answer(&question, correct)))?;
        info!(question = id, correct, attempts = stat.attempts, "checked answer");

        Ok(CheckOutcome {
            question_id: question.id,
            correct,
            user_answer: answer.to_string(),
            correct_answer: question.answer_text.clone(),
            explanation: question.explanation.clone(),
            category: question.category.clone(),
            topics: self.classifier.classify(&question),
            error_rate: stat.error_rate_label(),
            attempts: stat.attempts,
            mnemonics,
        })
    }

    pub fn categories(&self, scope: Scope) -> Result<CategoryListing> {
        let corpus = self.corpora.load(&scope)?;
        let progress = self.progress.load()?;
        Ok(stats::categories(scope, &corpus.questions, &progress))
    }

    pub fn stats(&self) -> Result<Stats> {
        let progress = self.progress.load()?;
        stats::summarize(&progress, |scope| self.corpora.declared_total(scope))
    }

    pub fn wrong(
        &mut self,
        vehicle_class: Option<VehicleClass>,
        subject: Option<Subject>,
        count: Option<usize>,
    ) -> Result<ReviewSet> {
        let progress = self.progress.load()?;
        let corpora = self.review_corpora(vehicle_class, subject)?;
        let corpora: Vec<&Corpus> = corpora.iter().map(|c| c.as_ref()).collect();
        Ok(selection::review(
            ReviewMode::Wrong,
            &corpora,
            &progress.wrong_questions,
            count,
            &mut self.rng,
        ))
    }

    pub fn favorites(
        &mut self,
        vehicle_class: Option<VehicleClass>,
        subject: Option<Subject>,
        count: Option<usize>,
    ) -> Result<ReviewSet> {
        let progress = self.progress.load()?;
        let corpora = self.review_corpora(vehicle_class, subject)?;
        let corpora: Vec<&Corpus> = corpora.iter().map(|c| c.as_ref()).collect();
        Ok(selection::review(
            ReviewMode::Favorites,
            &corpora,
            &progress.favorites,
            count,
            &mut self.rng,
        ))
    }

    pub fn favorite(&self, id: u32) -> Result<FavoriteOutcome> {
        let question = self.corpora.find_by_id(resolve_id(id)?)?;
        self.progress.update(|progress| {
            let action = if progress.add_favorite(question.id) {
                FavoriteAction::Favorited
            } else {
                FavoriteAction::AlreadyFavorited
            };
            Ok(FavoriteOutcome {
                action,
                question_id: id,
                total_favorites: progress.favorites.len(),
            })
        })
    }

    /// The progress file is only written when a favorite is actually removed.
    pub fn unfavorite(&self, id: u32) -> Result<FavoriteOutcome> {
        let not_in_favorites = |total_favorites| FavoriteOutcome {
            action: FavoriteAction::NotInFavorites,
            question_id: id,
            total_favorites,
        };

        let progress = self.progress.load()?;
        let qid = match QuestionId::try_from(id) {
            Ok(qid) if progress.favorites.contains(&qid) => qid,
            _ => return Ok(not_in_favorites(progress.favorites.len())),
        };

        self.progress.update(|progress| {
            if !progress.remove_favorite(qid) {
                return Ok(not_in_favorites(progress.favorites.len()));
            }
            Ok(FavoriteOutcome {
                action: FavoriteAction::Unfavorited,
                question_id: id,
                total_favorites: progress.favorites.len(),
            })
        })
    }

    pub fn top500(&mut self, scope: Scope, count: usize) -> Result<CuratedBatch> {
        let corpus = self.corpora.load(&scope)?;
        let progress = self.progress.load()?;
        let result = selection::curated(scope, &corpus.questions, &progress, count, &mut self.rng);
        debug!(
            selected = result.total_selected,
            wrong = result.composition.wrong,
            unanswered = result.composition.unanswered,
            reviewed = result.composition.reviewed,
            "curated batch"
        );
        Ok(result)
    }

    pub fn topics(&self, scope: Scope) -> Result<TopicListing> {
        let corpus = self.corpora.load(&scope)?;
        let progress = self.progress.load()?;
        Ok(stats::topics(
            scope,
            &corpus.questions,
            &progress,
            self.classifier,
            self.mnemonics()?,
        ))
    }

    pub fn topic_practice(&mut self, scope: Scope, topic: &str, count: usize) -> Result<TopicSet> {
        let corpus = self.corpora.load(&scope)?;
        selection::topic_practice(
            scope,
            &corpus.questions,
            self.classifier,
            topic,
            count,
            &mut self.rng,
        )
    }

    pub fn hard(&self, scope: Scope, count: usize) -> Result<HardSet> {
        let corpus = self.corpora.load(&scope)?;
        let progress = self.progress.load()?;
        Ok(selection::hard(scope, &corpus.questions, &progress, self.classifier, count))
    }

    pub fn record_exam(&self, scope: Scope, score: u32, total: u32) -> Result<ExamRecorded> {
        let date = chrono::Local::now().format("%Y-%m-%d %H:%M").to_string();
        let record = ExamRecord::new(date, scope, score, total);
        let passed = record.passed;
        self.progress.update(|progress| {
            progress.mock_exams.push(record);
            Ok(())
        })?;
        info!(bank = %scope.key(), score, total, passed, "recorded mock exam");
        Ok(ExamRecorded { recorded: true, passed })
    }

    /// Every imported bank that matches the optional vehicle class and subject.
    fn review_corpora(
        &self,
        vehicle_class: Option<VehicleClass>,
        subject: Option<Subject>,
    ) -> Result<Vec<Rc<Corpus>>> {
        let mut corpora = Vec::new();
        for scope in self.corpora.available() {
            if vehicle_class.map_or(false, |v| v != scope.vehicle_class) {
                continue;
            }
            if subject.map_or(false, |s| s != scope.subject) {
                continue;
            }
            corpora.push(self.corpora.load(&scope)?);
        }
        Ok(corpora)
    }
}

/// An id that does not decode cannot name any question.
fn resolve_id(id: u32) -> Result<QuestionId> {
    QuestionId::try_from(id).map_err(|_| QuizError::QuestionNotFound(id))
}
