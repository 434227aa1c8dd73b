//! JSON state file for [`MemoryHost`].
//!
//! The whole host state is written as one pretty-printed JSON document. Loads
//! happen once at open; saves rewrite the file through a temporary sibling so
//! a crash mid-write leaves the previous state intact.

use crate::memory::{HostState, MemoryHost};
use crate::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

// ============================================================================
// Store Configuration
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path to the JSON state file
    pub path: PathBuf,
    /// Start from an empty state when the file does not exist yet
    pub create_if_missing: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./metarev-store.json"),
            create_if_missing: true,
        }
    }
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

// ============================================================================
// Load / Save
// ============================================================================

impl MemoryHost {
    /// Open the state file named by `config`.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let state = if config.path.exists() {
            let contents = std::fs::read_to_string(&config.path)?;
            let state: HostState = serde_json::from_str(&contents)?;
            tracing::debug!(
                path = %config.path.display(),
                records = state.records.len(),
                "loaded host state"
            );
            state
        } else if config.create_if_missing {
            HostState::default()
        } else {
            return Err(StoreError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("state file not found: {}", config.path.display()),
            )));
        };

        Ok(Self::from_state(state, Some(config.path.clone())))
    }

    /// Write the state back to the file it was opened from.
    ///
    /// A host built with [`MemoryHost::new`] has nowhere to save to; this is a no-op then.
    pub fn save(&self) -> StoreResult<()> {
        match &self.path {
            Some(path) => self.save_to(path),
            None => Ok(()),
        }
    }

    pub fn save_to(&self, path: &Path) -> StoreResult<()> {
        let json = serde_json::to_string_pretty(&*self.state.read())?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;
        tracing::debug!(path = %path.display(), "saved host state");
        Ok(())
    }
}
