/**
 * Definitions of data structures used by several modules, such as `QuizError` and the
 * various structs that hold command-line arguments.
 */
use std::io;
use std::path::PathBuf;

use structopt::StructOpt;
use thiserror::Error;

use super::quiz::{QuestionId, Subject, VehicleClass};

pub type Result<T> = ::std::result::Result<T, QuizError>;

#[derive(Debug, Error)]
pub enum QuizError {
    /// For when the question bank for a vehicle class and subject has not been imported.
    #[error("no question bank for {vehicle_class} subject {subject} at '{}'", path.display())]
    CorpusNotFound {
        vehicle_class: VehicleClass,
        subject: Subject,
        path: PathBuf,
    },
    #[error("could not parse question bank '{}' ({message})", path.display())]
    CorpusInvalid { path: PathBuf, message: String },
    #[error("question {id} appears more than once in '{}'", path.display())]
    DuplicateQuestionId { id: QuestionId, path: PathBuf },
    #[error("could not find question with id {0}")]
    QuestionNotFound(u32),
    #[error("unknown topic '{0}'")]
    UnknownTopic(String),
    #[error("no questions in category '{0}'")]
    UnknownCategory(String),
    #[error("unsupported vehicle class '{0}'")]
    InvalidVehicleClass(String),
    #[error("subject must be 1 or 4, not {0}")]
    InvalidSubject(String),
    #[error("{0} is not a valid question id")]
    InvalidQuestionId(u32),
    #[error("could not parse JSON ({0})")]
    Json(#[from] serde_json::Error),
    #[error("IO error ({0})")]
    Io(#[from] io::Error),
}

impl QuizError {
    /// A suggestion for how the user can fix the error, if there is one.
    pub fn hint(&self) -> Option<String> {
        match self {
            QuizError::CorpusNotFound {
                vehicle_class,
                subject,
                ..
            } => Some(format!(
                "import the question bank first (expected {}_subject{}.json in the data \
                 directory)",
                vehicle_class.code(),
                subject
            )),
            QuizError::UnknownTopic(_) => Some(String::from("run `topics` to list available topics")),
            QuizError::UnknownCategory(_) => {
                Some(String::from("run `categories` to list available categories"))
            }
            QuizError::InvalidVehicleClass(_) => {
                Some(format!("choose one of: {}", VehicleClass::ALIASES.join(", ")))
            }
            _ => None,
        }
    }
}

pub fn is_broken_pipe(e: &QuizError) -> bool {
    if let QuizError::Io(e) = e {
        if let io::ErrorKind::BrokenPipe = e.kind() {
            return true;
        }
    }
    false
}

/// Holds the command-line configuration for the application.
#[derive(StructOpt)]
#[structopt(name = "drivedrill", about = "Practise driving-test questions from the command line.")]
pub struct Options {
    /// Look for question banks in a particular directory.
    #[structopt(long = "data-dir", parse(from_os_str))]
    pub data_dir: Option<PathBuf>,
    /// Read and write learner progress at this path.
    #[structopt(long = "progress", parse(from_os_str))]
    pub progress: Option<PathBuf>,
    #[structopt(subcommand)]
    pub cmd: Command,
}

#[derive(StructOpt)]
pub enum Command {
    /// List vehicle classes and the size of their question banks.
    #[structopt(name = "vtypes")]
    Vtypes,
    /// Draw random questions.
    #[structopt(name = "random")]
    Random(RandomOptions),
    /// Work through the question bank in order, resuming where you left off.
    #[structopt(name = "sequential")]
    Sequential(SequentialOptions),
    /// Generate a mock exam.
    #[structopt(name = "exam")]
    Exam(ScopeOptions),
    /// Check an answer and record the result.
    #[structopt(name = "check")]
    Check(CheckOptions),
    /// List the categories of a question bank.
    #[structopt(name = "categories")]
    Categories(ScopeOptions),
    /// Report practice statistics.
    #[structopt(name = "stats")]
    Stats,
    /// Review questions that are currently answered wrong.
    #[structopt(name = "wrong")]
    Wrong(ReviewOptions),
    /// Add a question to favorites.
    #[structopt(name = "favorite")]
    Favorite(IdOptions),
    /// Remove a question from favorites.
    #[structopt(name = "unfavorite")]
    Unfavorite(IdOptions),
    /// Review favorite questions.
    #[structopt(name = "favorites")]
    Favorites(ReviewOptions),
    /// Draw from a curated set of 500 high-value questions.
    #[structopt(name = "top500")]
    Top500(CountOptions),
    /// List topic labels and how many questions carry each.
    #[structopt(name = "topics")]
    Topics(ScopeOptions),
    /// Practise the questions of one topic.
    #[structopt(name = "topic-practice")]
    TopicPractice(TopicOptions),
    /// Practise the questions you get wrong most often.
    #[structopt(name = "hard")]
    Hard(HardOptions),
    /// Record the score of a mock exam.
    #[structopt(name = "record-exam")]
    RecordExam(RecordExamOptions),
}

/// The vehicle class and subject shared by every command that reads one question bank.
#[derive(StructOpt)]
pub struct ScopeOptions {
    /// Either 1 or 4.
    #[structopt(long = "subject")]
    pub subject: Subject,
    /// Vehicle class: c1 (car), a1 (bus), a2 (truck) or d (motorcycle).
    #[structopt(long = "vtype", default_value = "c1")]
    pub vtype: String,
}

#[derive(StructOpt)]
pub struct RandomOptions {
    #[structopt(flatten)]
    pub scope: ScopeOptions,
    /// Number of questions to draw.
    #[structopt(long = "count", default_value = "5")]
    pub count: usize,
    /// Only draw from the given category.
    #[structopt(long = "category")]
    pub category: Option<String>,
    /// Skip questions that have been answered before.
    #[structopt(long = "exclude-done")]
    pub exclude_done: bool,
}

#[derive(StructOpt)]
pub struct SequentialOptions {
    #[structopt(flatten)]
    pub scope: ScopeOptions,
    #[structopt(long = "count", default_value = "5")]
    pub count: usize,
    /// Start again from the first question.
    #[structopt(long = "reset")]
    pub reset: bool,
}

#[derive(StructOpt)]
pub struct CheckOptions {
    #[structopt(long = "id")]
    pub id: u32,
    #[structopt(long = "answer")]
    pub answer: String,
}

#[derive(StructOpt)]
pub struct IdOptions {
    #[structopt(long = "id")]
    pub id: u32,
}

/// These options are shared between the `wrong` and `favorites` subcommands.
#[derive(StructOpt)]
pub struct ReviewOptions {
    /// Only include questions of this subject.
    #[structopt(long = "subject")]
    pub subject: Option<Subject>,
    /// Only include questions of this vehicle class.
    #[structopt(long = "vtype")]
    pub vtype: Option<String>,
    /// Limit the number of questions shown.
    #[structopt(long = "count")]
    pub count: Option<usize>,
}

#[derive(StructOpt)]
pub struct CountOptions {
    #[structopt(flatten)]
    pub scope: ScopeOptions,
    #[structopt(long = "count", default_value = "5")]
    pub count: usize,
}

#[derive(StructOpt)]
pub struct TopicOptions {
    #[structopt(flatten)]
    pub scope: ScopeOptions,
    /// The topic label, as listed by `topics`.
    #[structopt(long = "topic")]
    pub topic: String,
    #[structopt(long = "count", default_value = "5")]
    pub count: usize,
}

#[derive(StructOpt)]
pub struct HardOptions {
    #[structopt(flatten)]
    pub scope: ScopeOptions,
    #[structopt(long = "count", default_value = "10")]
    pub count: usize,
}

#[derive(StructOpt)]
pub struct RecordExamOptions {
    #[structopt(flatten)]
    pub scope: ScopeOptions,
    #[structopt(long = "score")]
    pub score: u32,
    #[structopt(long = "total")]
    pub total: u32,
}
