/**
 * Questions, the identifiers that locate them, and the checking of submitted answers.
 */
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::convert::TryFrom;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use unicode_normalization::UnicodeNormalization;

use super::common::{QuizError, Result};

// Question ids are laid out as `band * BAND_WIDTH + subject * SUBJECT_WIDTH + sequence`.
const BAND_WIDTH: u32 = 100_000;
const SUBJECT_WIDTH: u32 = 10_000;

// Spellings accepted for the two judge answers. Replacement is by substring, so the
// longer spellings must come first.
const JUDGE_SYNONYMS: [(&str, &str); 6] = [
    ("正确", "对"),
    ("错误", "错"),
    ("TRUE", "对"),
    ("FALSE", "错"),
    ("RIGHT", "对"),
    ("WRONG", "错"),
];

/// A group of licence classes that share one question bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleClass {
    C1,
    A1,
    A2,
    D,
}

impl VehicleClass {
    pub const ALL: [VehicleClass; 4] =
        [VehicleClass::C1, VehicleClass::A1, VehicleClass::A2, VehicleClass::D];

    pub const ALIASES: [&'static str; 11] =
        ["a1", "a2", "a3", "b1", "b2", "c1", "c2", "c3", "d", "e", "f"];

    /// Resolve a licence code such as `B2` to the class whose question bank covers it.
    pub fn from_alias(raw: &str) -> Result<Self> {
        match raw.trim().to_lowercase().as_str() {
            "a1" | "a3" | "b1" => Ok(VehicleClass::A1),
            "a2" | "b2" => Ok(VehicleClass::A2),
            "c1" | "c2" | "c3" => Ok(VehicleClass::C1),
            "d" | "e" | "f" => Ok(VehicleClass::D),
            _ => Err(QuizError::InvalidVehicleClass(raw.to_string())),
        }
    }

    pub fn code(self) -> &'static str {
        match self {
            VehicleClass::C1 => "c1",
            VehicleClass::A1 => "a1",
            VehicleClass::A2 => "a2",
            VehicleClass::D => "d",
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            VehicleClass::C1 => "小车 (C1/C2/C3)",
            VehicleClass::A1 => "客车 (A1/A3/B1)",
            VehicleClass::A2 => "货车 (A2/B2)",
            VehicleClass::D => "摩托车 (D/E/F)",
        }
    }

    /// The licence codes this class covers.
    pub fn covers(self) -> &'static [&'static str] {
        match self {
            VehicleClass::C1 => &["C1", "C2", "C3"],
            VehicleClass::A1 => &["A1", "A3", "B1"],
            VehicleClass::A2 => &["A2", "B2"],
            VehicleClass::D => &["D", "E", "F"],
        }
    }

    fn band(self) -> u32 {
        match self {
            VehicleClass::C1 => 0,
            VehicleClass::A1 => 1,
            VehicleClass::A2 => 2,
            VehicleClass::D => 3,
        }
    }

    fn from_band(band: u32) -> Option<Self> {
        VehicleClass::ALL.iter().copied().find(|v| v.band() == band)
    }
}

impl fmt::Display for VehicleClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Subject {
    One,
    Four,
}

impl Subject {
    pub const ALL: [Subject; 2] = [Subject::One, Subject::Four];

    pub fn number(self) -> u8 {
        match self {
            Subject::One => 1,
            Subject::Four => 4,
        }
    }

    /// How many questions a mock exam of this subject has.
    pub fn exam_size(self) -> usize {
        match self {
            Subject::One => 100,
            Subject::Four => 50,
        }
    }

    pub fn exam_minutes(self) -> u32 {
        match self {
            Subject::One => 45,
            Subject::Four => 30,
        }
    }
}

impl TryFrom<u8> for Subject {
    type Error = QuizError;

    fn try_from(n: u8) -> Result<Self> {
        match n {
            1 => Ok(Subject::One),
            4 => Ok(Subject::Four),
            _ => Err(QuizError::InvalidSubject(n.to_string())),
        }
    }
}

impl From<Subject> for u8 {
    fn from(subject: Subject) -> u8 {
        subject.number()
    }
}

impl FromStr for Subject {
    type Err = QuizError;

    fn from_str(s: &str) -> Result<Self> {
        let n = s
            .trim()
            .parse::<u8>()
            .map_err(|_| QuizError::InvalidSubject(s.to_string()))?;
        Subject::try_from(n)
    }
}

impl fmt::Display for Subject {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// Names one question bank: the questions of one subject for one vehicle class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Scope {
    #[serde(rename = "vehicle_type")]
    pub vehicle_class: VehicleClass,
    pub subject: Subject,
}

impl Scope {
    pub fn new(vehicle_class: VehicleClass, subject: Subject) -> Self {
        Scope { vehicle_class, subject }
    }

    /// Every scope, in the order question banks are searched.
    pub fn all() -> Vec<Scope> {
        let mut scopes = Vec::new();
        for vehicle_class in VehicleClass::ALL.iter() {
            for subject in Subject::ALL.iter() {
                scopes.push(Scope::new(*vehicle_class, *subject));
            }
        }
        scopes
    }

    /// The key under which sequential progress is stored, e.g. `c1_subject1`.
    pub fn key(&self) -> String {
        format!("{}_subject{}", self.vehicle_class.code(), self.subject)
    }

    /// Inverse of `key`. Returns `None` for keys that name no known scope.
    pub fn from_key(key: &str) -> Option<Scope> {
        let mut parts = key.splitn(2, "_subject");
        let vehicle_class = parts.next()?;
        let subject = parts.next()?;
        let vehicle_class = VehicleClass::ALL
            .iter()
            .copied()
            .find(|v| v.code() == vehicle_class)?;
        let subject = subject.parse::<Subject>().ok()?;
        Some(Scope::new(vehicle_class, subject))
    }

    pub fn file_name(&self) -> String {
        format!("{}.json", self.key())
    }
}

/// A question identifier. On disk it is a single integer that packs the vehicle class,
/// the subject and the position of the question in its bank; in memory the three parts
/// are kept apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct QuestionId {
    pub band: VehicleClass,
    pub subject: Subject,
    pub sequence: u32,
}

impl QuestionId {
    pub fn new(band: VehicleClass, subject: Subject, sequence: u32) -> Result<Self> {
        let id = QuestionId { band, subject, sequence };
        if sequence >= SUBJECT_WIDTH {
            return Err(QuizError::InvalidQuestionId(id.raw()));
        }
        Ok(id)
    }

    pub fn raw(&self) -> u32 {
        self.band.band() * BAND_WIDTH
            + u32::from(self.subject.number()) * SUBJECT_WIDTH
            + self.sequence
    }

    /// The question bank this id was allocated in.
    pub fn scope(&self) -> Scope {
        Scope::new(self.band, self.subject)
    }
}

impl TryFrom<u32> for QuestionId {
    type Error = QuizError;

    fn try_from(raw: u32) -> Result<Self> {
        let band = VehicleClass::from_band(raw / BAND_WIDTH)
            .ok_or(QuizError::InvalidQuestionId(raw))?;
        let rest = raw % BAND_WIDTH;
        // `rest / SUBJECT_WIDTH` is below 10 and so always fits in a u8.
        let subject = Subject::try_from((rest / SUBJECT_WIDTH) as u8)
            .map_err(|_| QuizError::InvalidQuestionId(raw))?;
        Ok(QuestionId { band, subject, sequence: rest % SUBJECT_WIDTH })
    }
}

impl From<QuestionId> for u32 {
    fn from(id: QuestionId) -> u32 {
        id.raw()
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.raw())
    }
}

/// An enumeration for the `type` field of questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionKind {
    Single,
    Judge,
    Multi,
}

/// The correct answer to a question, parsed once when the question bank is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerKind {
    Single(char),
    /// The letters of every correct option, in alphabetical order.
    Multi(BTreeSet<char>),
    Judge(bool),
}

impl AnswerKind {
    pub fn parse(kind: QuestionKind, text: &str) -> ::std::result::Result<Self, String> {
        let normalized = normalize(text);
        match kind {
            QuestionKind::Single => {
                let mut chars = normalized.chars();
                match (chars.next(), chars.next()) {
                    (Some(letter), None) if letter.is_ascii_uppercase() => {
                        Ok(AnswerKind::Single(letter))
                    }
                    _ => Err(format!("'{}' is not a single option letter", text)),
                }
            }
            QuestionKind::Multi => {
                let letters = letters(&normalized);
                if letters.is_empty() {
                    Err(format!("'{}' names no options", text))
                } else {
                    Ok(AnswerKind::Multi(letters))
                }
            }
            QuestionKind::Judge => match normalize_judge(&normalized).as_str() {
                "对" => Ok(AnswerKind::Judge(true)),
                "错" => Ok(AnswerKind::Judge(false)),
                _ => Err(format!("'{}' is neither 对 nor 错", text)),
            },
        }
    }

    /// Return `true` if `guess` is a correct response.
    ///
    /// Multiple-choice answers are compared as sets of letters, so `C,A` and `AC` both
    /// match an answer of `A,C`.
    pub fn matches(&self, guess: &str) -> bool {
        let guess = normalize(guess);
        match self {
            AnswerKind::Single(letter) => {
                let mut chars = guess.chars();
                chars.next() == Some(*letter) && chars.next().is_none()
            }
            AnswerKind::Multi(expected) => letters(&guess) == *expected,
            AnswerKind::Judge(true) => normalize_judge(&guess) == "对",
            AnswerKind::Judge(false) => normalize_judge(&guess) == "错",
        }
    }
}

fn normalize(text: &str) -> String {
    text.trim().nfc().collect::<String>().to_uppercase()
}

fn normalize_judge(text: &str) -> String {
    let mut normalized = text.to_string();
    for (synonym, canonical) in JUDGE_SYNONYMS.iter() {
        normalized = normalized.replace(synonym, canonical);
    }
    normalized
}

fn letters(text: &str) -> BTreeSet<char> {
    text.chars().filter(|c| c.is_ascii_uppercase()).collect()
}

/// Represents a question.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "StoredQuestion", into = "StoredQuestion")]
pub struct Question {
    pub id: QuestionId,
    pub subject: Subject,
    /// The chapter the question bank files it under.
    pub category: String,
    pub kind: QuestionKind,
    pub text: String,
    /// Empty for judge questions.
    pub options: Vec<String>,
    pub answer: AnswerKind,
    /// The answer exactly as the question bank spells it, for display.
    pub answer_text: String,
    pub explanation: String,
    pub image: Option<String>,
}

/// The on-disk form of a question.
#[derive(Clone, Serialize, Deserialize)]
struct StoredQuestion {
    id: QuestionId,
    subject: Subject,
    category: String,
    #[serde(rename = "type")]
    kind: QuestionKind,
    question: String,
    #[serde(default)]
    options: Vec<String>,
    answer: String,
    #[serde(default)]
    explanation: String,
    #[serde(default)]
    image: Option<String>,
}

impl TryFrom<StoredQuestion> for Question {
    type Error = String;

    fn try_from(q: StoredQuestion) -> ::std::result::Result<Self, String> {
        let answer = AnswerKind::parse(q.kind, &q.answer)
            .map_err(|e| format!("question {}: {}", q.id, e))?;
        Ok(Question {
            id: q.id,
            subject: q.subject,
            category: q.category,
            kind: q.kind,
            text: q.question,
            options: q.options,
            answer,
            answer_text: q.answer,
            explanation: q.explanation,
            image: q.image,
        })
    }
}

impl From<Question> for StoredQuestion {
    fn from(q: Question) -> StoredQuestion {
        StoredQuestion {
            id: q.id,
            subject: q.subject,
            category: q.category,
            kind: q.kind,
            question: q.text,
            options: q.options,
            answer: q.answer_text,
            explanation: q.explanation,
            image: q.image,
        }
    }
}

impl Question {
    pub fn new(
        id: QuestionId,
        category: &str,
        kind: QuestionKind,
        text: &str,
        options: &[&str],
        answer: &str,
    ) -> Result<Self> {
        let parsed = AnswerKind::parse(kind, answer).map_err(|message| QuizError::CorpusInvalid {
            path: Path::new("<memory>").to_path_buf(),
            message,
        })?;
        Ok(Question {
            id,
            subject: id.subject,
            category: category.to_string(),
            kind,
            text: text.to_string(),
            options: options.iter().map(|o| o.to_string()).collect(),
            answer: parsed,
            answer_text: answer.to_string(),
            explanation: String::new(),
            image: None,
        })
    }

    /// The question text, the options and the explanation, joined into one string for
    /// keyword matching.
    pub fn search_text(&self) -> String {
        let mut blob = self.text.clone();
        for option in self.options.iter() {
            blob.push(' ');
            blob.push_str(option);
        }
        blob.push(' ');
        blob.push_str(&self.explanation);
        blob
    }

    /// Return `true` if `guess` is a correct answer to the question.
    pub fn check(&self, guess: &str) -> bool {
        self.answer.matches(guess)
    }
}

/// What the learner is shown of a question: everything except the answer and the
/// explanation.
#[derive(Debug, Clone, Serialize)]
pub struct QuestionView {
    pub id: QuestionId,
    pub subject: Subject,
    pub category: String,
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub question: String,
    pub options: Vec<String>,
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub topics: Option<Vec<String>>,
}

impl QuestionView {
    pub fn with_topics(mut self, topics: Vec<String>) -> Self {
        self.topics = Some(topics);
        self
    }
}

impl From<&Question> for QuestionView {
    fn from(q: &Question) -> Self {
        QuestionView {
            id: q.id,
            subject: q.subject,
            category: q.category.clone(),
            kind: q.kind,
            question: q.text.clone(),
            options: q.options.clone(),
            image: q.image.clone(),
            topics: None,
        }
    }
}

/// The question bank for one vehicle class and subject.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Corpus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
    /// The number of questions the file declares, which is informational only.
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub categories: BTreeMap<String, usize>,
    pub questions: Vec<Question>,
}

impl Corpus {
    pub fn new(questions: Vec<Question>) -> Self {
        let mut categories = BTreeMap::new();
        for q in questions.iter() {
            *categories.entry(q.category.clone()).or_insert(0) += 1;
        }
        Corpus {
            version: None,
            last_updated: None,
            total: questions.len(),
            categories,
            questions,
        }
    }

    pub fn find(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Return the first id that occurs more than once, if any.
    pub fn duplicate_id(&self) -> Option<QuestionId> {
        let mut seen = HashSet::new();
        for q in self.questions.iter() {
            if !seen.insert(q.id) {
                return Some(q.id);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn question_ids_pack_and_unpack() {
        let id = QuestionId::try_from(210_042).unwrap();
        assert_eq!(id.band, VehicleClass::A2);
        assert_eq!(id.subject, Subject::One);
        assert_eq!(id.sequence, 42);
        assert_eq!(id.raw(), 210_042);

        let id = QuestionId::new(VehicleClass::D, Subject::Four, 7).unwrap();
        assert_eq!(id.raw(), 340_007);
        assert_eq!(id.scope(), Scope::new(VehicleClass::D, Subject::Four));
    }

    #[test]
    fn malformed_question_ids_are_rejected() {
        assert!(QuestionId::try_from(20_001).is_err());
        assert!(QuestionId::try_from(510_001).is_err());
        assert!(QuestionId::new(VehicleClass::C1, Subject::One, 10_000).is_err());
    }

    #[test]
    fn vehicle_class_aliases_resolve() {
        assert_eq!(VehicleClass::from_alias("B2").unwrap(), VehicleClass::A2);
        assert_eq!(VehicleClass::from_alias(" c3 ").unwrap(), VehicleClass::C1);
        assert_eq!(VehicleClass::from_alias("e").unwrap(), VehicleClass::D);
        assert!(VehicleClass::from_alias("z9").is_err());
    }

    #[test]
    fn scope_keys_round_trip() {
        let scope = Scope::new(VehicleClass::A1, Subject::Four);
        assert_eq!(scope.key(), "a1_subject4");
        assert_eq!(Scope::from_key("a1_subject4"), Some(scope));
        assert_eq!(Scope::from_key("a1_subject2"), None);
        assert_eq!(Scope::from_key("garbage"), None);
    }

    #[test]
    fn judge_synonyms_are_accepted() {
        let answer = AnswerKind::parse(QuestionKind::Judge, "对").unwrap();
        for guess in ["对", "正确", "true", "TRUE", "Right"].iter() {
            assert!(answer.matches(guess), "{} should be correct", guess);
        }
        for guess in ["错", "错误", "false", "wrong", "A"].iter() {
            assert!(!answer.matches(guess), "{} should be incorrect", guess);
        }
    }

    #[test]
    fn single_answers_ignore_case_and_whitespace() {
        let answer = AnswerKind::parse(QuestionKind::Single, "B").unwrap();
        assert!(answer.matches("b"));
        assert!(answer.matches(" B "));
        assert!(!answer.matches("A"));
        assert!(!answer.matches("BC"));
    }

    #[test]
    fn multi_answers_ignore_order_and_separators() {
        let answer = AnswerKind::parse(QuestionKind::Multi, "A,B,D").unwrap();
        assert!(answer.matches("A,B,D"));
        assert!(answer.matches("dba"));
        assert!(answer.matches("B, A, D"));
        assert!(!answer.matches("A,B"));
        assert!(!answer.matches("A,B,C,D"));
    }

    #[test]
    fn bad_stored_answers_are_rejected() {
        assert!(AnswerKind::parse(QuestionKind::Single, "AB").is_err());
        assert!(AnswerKind::parse(QuestionKind::Judge, "maybe").is_err());
        assert!(AnswerKind::parse(QuestionKind::Multi, ",").is_err());
    }

    #[test]
    fn questions_load_from_json() {
        let data = r#"{
            "id": 10001, "subject": 1, "category": "道路交通安全法律、法规和规章",
            "type": "single", "question": "驾驶机动车在道路上违反道路交通安全法的行为，属于什么行为？",
            "options": ["A、违章行为", "B、违法行为", "C、过失行为", "D、违规行为"],
            "answer": "B", "explanation": "违反道路交通安全法，属于违法行为。",
            "image": null, "vehicle_type": "C1"
        }"#;
        let q: Question = serde_json::from_str(data).unwrap();
        assert_eq!(q.id.raw(), 10001);
        assert_eq!(q.kind, QuestionKind::Single);
        assert_eq!(q.answer, AnswerKind::Single('B'));
        assert!(q.check("b"));
        assert!(q.search_text().contains("违法行为"));
    }
}
