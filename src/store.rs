use chrono::{DateTime, Local};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::app_dirs::AppDirs;
use crate::config::WorkoutConfig;
use crate::session::SessionSnapshot;

/// Persistence boundary. The config is read once at startup; a snapshot is
/// written after every state change.
pub trait StateStore {
    fn load_config(&self) -> Option<WorkoutConfig>;
    fn save(&self, snapshot: &SessionSnapshot) -> std::io::Result<()>;
}

impl<T: StateStore + ?Sized> StateStore for Box<T> {
    fn load_config(&self) -> Option<WorkoutConfig> {
        (**self).load_config()
    }

    fn save(&self, snapshot: &SessionSnapshot) -> std::io::Result<()> {
        (**self).save(snapshot)
    }
}

/// On-disk record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoredSession {
    pub saved_at: DateTime<Local>,
    #[serde(flatten)]
    pub snapshot: SessionSnapshot,
}

#[derive(Debug, Clone)]
pub struct FileStateStore {
    path: PathBuf,
}

impl FileStateStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path =
            AppDirs::session_path().unwrap_or_else(|| PathBuf::from("hiitr_session.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> Option<StoredSession> {
        let bytes = fs::read(&self.path).ok()?;
        match serde_json::from_slice::<StoredSession>(&bytes) {
            Ok(stored) => Some(stored),
            Err(err) => {
                tracing::warn!(%err, path = ?self.path, "ignoring unreadable session file");
                None
            }
        }
    }
}

impl Default for FileStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl StateStore for FileStateStore {
    fn load_config(&self) -> Option<WorkoutConfig> {
        let config = self.load()?.snapshot.config;
        match config.validate() {
            Ok(()) => Some(config),
            Err(err) => {
                tracing::warn!(%err, "stored config out of range, using defaults");
                None
            }
        }
    }

    fn save(&self, snapshot: &SessionSnapshot) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let stored = StoredSession {
            saved_at: Local::now(),
            snapshot: snapshot.clone(),
        };
        let data = serde_json::to_vec_pretty(&stored).map_err(std::io::Error::other)?;
        fs::write(&self.path, data)
    }
}

#[derive(Debug, Default)]
struct Memory {
    config: Option<WorkoutConfig>,
    saved: Vec<SessionSnapshot>,
    failing: bool,
}

/// Keeps everything in memory. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<Mutex<Memory>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: WorkoutConfig) -> Self {
        let store = Self::default();
        store.inner.lock().config = Some(config);
        store
    }

    pub fn saved(&self) -> Vec<SessionSnapshot> {
        self.inner.lock().saved.clone()
    }

    pub fn last_saved(&self) -> Option<SessionSnapshot> {
        self.inner.lock().saved.last().cloned()
    }

    pub fn fail_writes(&self) {
        self.inner.lock().failing = true;
    }
}

impl StateStore for MemoryStateStore {
    fn load_config(&self) -> Option<WorkoutConfig> {
        self.inner.lock().config
    }

    fn save(&self, snapshot: &SessionSnapshot) -> std::io::Result<()> {
        let mut inner = self.inner.lock();
        if inner.failing {
            return Err(std::io::Error::other("store is read-only"));
        }
        inner.config = Some(snapshot.config);
        inner.saved.push(snapshot.clone());
        Ok(())
    }
}
