//! Persistent storage for rule lists
//!
//! The engine only needs load-at-startup and save-on-commit. The persisted
//! shape is [`RuleSnapshot`]: string-keyed sets with presence semantics.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use log::{debug, info};
use parking_lot::Mutex;

use crate::rules::RuleSnapshot;
use crate::url::normalize_host;

/// Error type for rule persistence.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error on '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Invalid rule store JSON: {0}")]
    Json(#[from] serde_json::Error),
}

pub trait PersistentStore: Send + Sync {
    fn load(&self) -> Result<RuleSnapshot, StoreError>;
    fn save(&self, snapshot: &RuleSnapshot) -> Result<(), StoreError>;
}

// =============================================================================
// JSON File Store
// =============================================================================

/// Rule snapshot stored as a pretty-printed JSON document.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn io_error(&self, source: io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

impl PersistentStore for JsonFileStore {
    /// A missing file loads as an empty snapshot.
    fn load(&self) -> Result<RuleSnapshot, StoreError> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No rule store at '{}', starting empty", self.path.display());
                return Ok(RuleSnapshot::default());
            }
            Err(e) => return Err(self.io_error(e)),
        };
        let snapshot = serde_json::from_str(&text)?;
        info!("Loaded rule store '{}'", self.path.display());
        Ok(snapshot)
    }

    fn save(&self, snapshot: &RuleSnapshot) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(&self.path, json).map_err(|e| self.io_error(e))?;
        debug!("Saved rule store '{}'", self.path.display());
        Ok(())
    }
}

// =============================================================================
// Memory Store
// =============================================================================

/// In-memory store. Counts saves so callers can observe persistence.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<(RuleSnapshot, usize)>,
}

impl MemoryStore {
    pub fn new(snapshot: RuleSnapshot) -> Self {
        Self {
            state: Mutex::new((snapshot, 0)),
        }
    }

    pub fn current(&self) -> RuleSnapshot {
        self.state.lock().0.clone()
    }

    pub fn save_count(&self) -> usize {
        self.state.lock().1
    }
}

impl PersistentStore for MemoryStore {
    fn load(&self) -> Result<RuleSnapshot, StoreError> {
        Ok(self.current())
    }

    fn save(&self, snapshot: &RuleSnapshot) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        state.0 = snapshot.clone();
        state.1 += 1;
        Ok(())
    }
}

// =============================================================================
// Origin List Files
// =============================================================================

/// Check if a line is a comment.
fn is_comment_line(line: &str) -> bool {
    line.starts_with('#') || line.starts_with('!') || line.starts_with("//")
}

/// Parse a plain origin list (one host per line), e.g. a preload allowlist.
pub fn parse_origin_list(text: &str) -> Vec<String> {
    let mut origins = Vec::new();

    for raw_line in text.lines() {
        let line = raw_line.trim();
        if line.is_empty() || is_comment_line(line) {
            continue;
        }

        // Trailing comments
        let line = match line.find('#') {
            Some(pos) => line[..pos].trim_end(),
            None => line,
        };

        let origin = normalize_host(line);
        if origin.is_empty() || origin.contains(char::is_whitespace) {
            continue;
        }
        origins.push(origin);
    }

    origins
}
