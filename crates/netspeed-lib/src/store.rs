//! Baseline persistence across runs
//!
//! The monitor never decides where state lives; it loads and saves a
//! [`PersistedState`] through a [`BaselineStore`].

use crate::models::PersistedState;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::debug;

/// Key/value store for the usage baseline and boot epoch
pub trait BaselineStore: Send + Sync {
    /// Load the persisted state, `None` if nothing was saved yet
    fn load(&self) -> Result<Option<PersistedState>>;

    fn save(&self, state: &PersistedState) -> Result<()>;
}

/// JSON file store
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

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(".tmp");
        PathBuf::from(name)
    }
}

impl BaselineStore for JsonFileStore {
    fn load(&self) -> Result<Option<PersistedState>> {
        if !self.path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        let state = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", self.path.display()))?;

        Ok(Some(state))
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create state directory")?;
        }

        // The state file is only ever replaced whole
        let content = serde_json::to_string_pretty(state).context("Failed to serialize state")?;
        let tmp_path = self.tmp_path();
        std::fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        std::fs::rename(&tmp_path, &self.path)
            .with_context(|| format!("Failed to move state into {}", self.path.display()))?;

        debug!(path = %self.path.display(), "Persisted usage baseline");
        Ok(())
    }
}

/// In-memory store, for hosts that persist elsewhere and for tests
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<Option<PersistedState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: PersistedState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
        }
    }

    /// Most recently saved state
    pub fn snapshot(&self) -> Option<PersistedState> {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl BaselineStore for MemoryStore {
    fn load(&self) -> Result<Option<PersistedState>> {
        Ok(self.snapshot())
    }

    fn save(&self, state: &PersistedState) -> Result<()> {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = Some(*state);
        Ok(())
    }
}
