/// Persisted snapshot of the last rendered metrics and the refresh decision
///
/// The on-disk format is three decimal lines: session count, temperature,
/// usage. Anything else is treated as if no state existed, which forces a
/// refresh. Writes are not atomic; a torn write is repaired by the next
/// successful refresh.

use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::metrics::Snapshot;

/// Number of lines in a well-formed persisted snapshot
pub const SNAPSHOT_LINES: usize = 3;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Durable storage for the last rendered snapshot
pub trait StateStore {
    /// Persisted lines, trailing whitespace stripped
    fn load(&self) -> Result<Vec<String>, StateError>;

    /// Replace the persisted lines with `snapshot`
    fn save(&self, snapshot: &Snapshot) -> Result<(), StateError>;

    /// Forget the persisted snapshot
    fn clear(&self) -> Result<(), StateError>;
}

/// Plain text file at a configured path
#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for FileStateStore {
    fn load(&self) -> Result<Vec<String>, StateError> {
        let content = fs::read_to_string(&self.path).map_err(|source| StateError::Read {
            path: self.path.clone(),
            source,
        })?;

        Ok(content
            .lines()
            .map(|line| line.trim_end().to_string())
            .collect())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StateError> {
        let content: String = snapshot
            .to_lines()
            .iter()
            .map(|line| format!("{}\n", line))
            .collect();

        fs::write(&self.path, content).map_err(|source| StateError::Write {
            path: self.path.clone(),
            source,
        })
    }

    fn clear(&self) -> Result<(), StateError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(StateError::Write {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

/// In-process store
#[derive(Debug, Default)]
pub struct MemoryStateStore {
    lines: RefCell<Option<Vec<String>>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lines(lines: &[&str]) -> Self {
        Self {
            lines: RefCell::new(Some(lines.iter().map(|l| l.to_string()).collect())),
        }
    }

    pub fn lines(&self) -> Option<Vec<String>> {
        self.lines.borrow().clone()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self) -> Result<Vec<String>, StateError> {
        self.lines.borrow().clone().ok_or_else(|| StateError::Read {
            path: PathBuf::from("<memory>"),
            source: io::Error::from(io::ErrorKind::NotFound),
        })
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StateError> {
        *self.lines.borrow_mut() = Some(snapshot.to_lines().to_vec());
        Ok(())
    }

    fn clear(&self) -> Result<(), StateError> {
        *self.lines.borrow_mut() = None;
        Ok(())
    }
}

/// Why a refresh is or is not needed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshDecision {
    /// Missing, unreadable, or empty state
    NoPriorState,
    /// State present but not exactly three lines
    Malformed { lines: usize },
    Changed,
    Unchanged,
}

impl RefreshDecision {
    pub fn needs_refresh(&self) -> bool {
        !matches!(self, RefreshDecision::Unchanged)
    }

    pub fn reason(&self) -> &'static str {
        match self {
            RefreshDecision::NoPriorState => "no persisted snapshot",
            RefreshDecision::Malformed { .. } => "persisted snapshot is malformed",
            RefreshDecision::Changed => "metrics changed",
            RefreshDecision::Unchanged => "metrics unchanged",
        }
    }
}

/// Persisted lines, or an empty list when they cannot be read
pub fn load_persisted_snapshot(store: &dyn StateStore) -> Vec<String> {
    store.load().unwrap_or_else(|err| {
        debug!("Treating persisted state as absent: {}", err);
        Vec::new()
    })
}

/// Compare `current` against the persisted snapshot
pub fn decide(store: &dyn StateStore, current: &Snapshot) -> RefreshDecision {
    let persisted = load_persisted_snapshot(store);

    if persisted.is_empty() {
        return RefreshDecision::NoPriorState;
    }

    if persisted.len() != SNAPSHOT_LINES {
        return RefreshDecision::Malformed {
            lines: persisted.len(),
        };
    }

    if current.to_lines().iter().eq(persisted.iter()) {
        RefreshDecision::Unchanged
    } else {
        RefreshDecision::Changed
    }
}

pub fn needs_refresh(store: &dyn StateStore, current: &Snapshot) -> bool {
    decide(store, current).needs_refresh()
}

/// Store `current`; failures are logged and otherwise ignored
pub fn persist_snapshot(store: &dyn StateStore, current: &Snapshot) {
    if let Err(err) = store.save(current) {
        warn!("Failed to persist: {}", err);
    }
}
