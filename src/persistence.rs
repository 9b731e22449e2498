/**
 * Functions and data structures for reading question banks and for reading and writing
 * the progress file.
 */
use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::fs::{File, OpenOptions};
use std::io;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use tracing::{debug, info, warn};

use super::common::{QuizError, Result};
use super::progress::Progress;
use super::quiz::{Corpus, Question, QuestionId, Scope};
use super::topics::MnemonicTable;

/// Read-only access to the question banks in one directory. Banks are cached for the
/// lifetime of the store since they do not change while the program runs.
pub struct CorpusStore {
    data_dir: PathBuf,
    cache: RefCell<HashMap<Scope, Rc<Corpus>>>,
}

impl CorpusStore {
    pub fn new(data_dir: &Path) -> Self {
        CorpusStore {
            data_dir: data_dir.to_path_buf(),
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn path(&self, scope: &Scope) -> PathBuf {
        self.data_dir.join(scope.file_name())
    }

    pub fn exists(&self, scope: &Scope) -> bool {
        self.cache.borrow().contains_key(scope) || self.path(scope).exists()
    }

    /// Every scope whose question bank has been imported.
    pub fn available(&self) -> Vec<Scope> {
        Scope::all().into_iter().filter(|s| self.exists(s)).collect()
    }

    /// Load the question bank for `scope`.
    pub fn load(&self, scope: &Scope) -> Result<Rc<Corpus>> {
        if let Some(corpus) = self.cache.borrow().get(scope) {
            return Ok(Rc::clone(corpus));
        }

        let path = self.path(scope);
        let data = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                QuizError::CorpusNotFound {
                    vehicle_class: scope.vehicle_class,
                    subject: scope.subject,
                    path: path.clone(),
                }
            } else {
                QuizError::Io(e)
            }
        })?;
        let corpus = parse_corpus(&path, &data)?;
        info!(bank = %scope.key(), questions = corpus.questions.len(), "loaded question bank");

        let corpus = Rc::new(corpus);
        self.cache.borrow_mut().insert(*scope, Rc::clone(&corpus));
        Ok(corpus)
    }

    /// The number of questions the bank for `scope` declares, or 0 if it has not been
    /// imported.
    pub fn declared_total(&self, scope: &Scope) -> Result<usize> {
        if !self.exists(scope) {
            return Ok(0);
        }
        Ok(self.load(scope)?.total)
    }

    /// Look a question up by id across every imported bank.
    ///
    /// The bank the id was allocated in is searched first; the others are scanned in
    /// case a bank was re-imported under different numbering.
    pub fn find_by_id(&self, id: QuestionId) -> Result<Question> {
        let home = id.scope();
        let mut scopes = vec![home];
        scopes.extend(Scope::all().into_iter().filter(|s| *s != home));

        for scope in scopes.iter() {
            if !self.exists(scope) {
                continue;
            }
            if let Some(q) = self.load(scope)?.find(id) {
                return Ok(q.clone());
            }
        }
        Err(QuizError::QuestionNotFound(id.raw()))
    }
}

fn parse_corpus(path: &Path, data: &str) -> Result<Corpus> {
    let mut corpus: Corpus = serde_json::from_str(data).map_err(|e| QuizError::CorpusInvalid {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    if let Some(id) = corpus.duplicate_id() {
        return Err(QuizError::DuplicateQuestionId {
            id,
            path: path.to_path_buf(),
        });
    }

    if corpus.total == 0 {
        corpus.total = corpus.questions.len();
    } else if corpus.total != corpus.questions.len() {
        warn!(
            path = %path.display(),
            declared = corpus.total,
            actual = corpus.questions.len(),
            "question bank declares a different number of questions than it holds"
        );
    }
    Ok(corpus)
}

/// Load the mnemonics table. A missing file is an empty table.
pub fn load_mnemonics(path: &Path) -> Result<MnemonicTable> {
    match fs::read_to_string(path) {
        Ok(data) => Ok(serde_json::from_str(&data)?),
        Err(ref e) if e.kind() == io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "no mnemonics file");
            Ok(MnemonicTable::default())
        }
        Err(e) => Err(QuizError::Io(e)),
    }
}

/// The learner's progress file.
pub struct ProgressStore {
    path: PathBuf,
}

impl ProgressStore {
    pub fn new(path: &Path) -> Self {
        ProgressStore { path: path.to_path_buf() }
    }

    /// Load the progress file, or return empty progress if there is none yet.
    pub fn load(&self) -> Result<Progress> {
        match fs::read_to_string(&self.path) {
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(ref e) if e.kind() == io::ErrorKind::NotFound => Ok(Progress::default()),
            Err(e) => Err(QuizError::Io(e)),
        }
    }

    /// Overwrite the progress file with `progress`.
    ///
    /// The data is written to a temporary file which is then renamed over the old one,
    /// so an interrupted write leaves the previous progress intact.
    pub fn save(&self, progress: &Progress) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let serialized = serde_json::to_string_pretty(progress)?;
        let temp_path = self.sibling("tmp");
        {
            let mut file = File::create(&temp_path)?;
            file.write_all(serialized.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp_path, &self.path).map_err(|e| {
            let _ = fs::remove_file(&temp_path);
            QuizError::Io(e)
        })?;
        debug!(path = %self.path.display(), "saved progress");
        Ok(())
    }

    /// Load the progress, let `f` modify it, and save it, all while holding an exclusive
    /// lock so that concurrent writers cannot interleave. Nothing is saved if `f` fails.
    pub fn update<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Progress) -> Result<T>,
    {
        let _lock = ProgressLock::acquire(&self.sibling("lock"))?;
        let mut progress = self.load()?;
        let value = f(&mut progress)?;
        self.save(&progress)?;
        Ok(value)
    }

    fn sibling(&self, extension: &str) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".");
        name.push(extension);
        self.path.with_file_name(name)
    }
}

/// An exclusive advisory lock on a file next to the progress file, released on drop.
struct ProgressLock {
    file: File,
}

impl ProgressLock {
    fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).write(true).open(path)?;
        lock_exclusive(&file)?;
        debug!(path = %path.display(), "acquired progress lock");
        Ok(ProgressLock { file })
    }
}

impl Drop for ProgressLock {
    fn drop(&mut self) {
        unlock(&self.file);
    }
}

#[cfg(unix)]
fn lock_exclusive(file: &File) -> io::Result<()> {
    use std::os::unix::io::AsRawFd;

    let ret = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
    if ret == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(unix)]
fn unlock(file: &File) {
    use std::os::unix::io::AsRawFd;

    unsafe {
        libc::flock(file.as_raw_fd(), libc::LOCK_UN);
    }
}

#[cfg(not(unix))]
fn lock_exclusive(_file: &File) -> io::Result<()> {
    Ok(())
}

#[cfg(not(unix))]
fn unlock(_file: &File) {}
