//! Persisted state: pane cwds, bounded cursor history, and favorites,
//! stored as a single TOML document (spec §6 "Persisted state").
//!
//! Forward compatibility: unknown top-level keys are preserved via
//! `#[serde(flatten)] extra` and round-tripped rather than dropped, so a
//! newer TFM's writes survive a load by an older build that only
//! understands the subset it wrote (SPEC_FULL.md §6).

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::config::FavoritePath;
use crate::error::{ErrorKind, Result, TfmError};

pub const STATE_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaneState {
    pub cwd_uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CursorHistoryEntry {
    pub dir_uri: String,
    pub cursor_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedState {
    pub version: u32,
    pub panes: [PaneState; 2],
    #[serde(default)]
    pub cursor_history: Vec<CursorHistoryEntry>,
    #[serde(default)]
    pub favorites: Vec<FavoritePath>,
    #[serde(flatten)]
    pub extra: toml::Table,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            version: STATE_FORMAT_VERSION,
            panes: [PaneState::default(), PaneState::default()],
            cursor_history: Vec::new(),
            favorites: Vec::new(),
            extra: toml::Table::new(),
        }
    }
}

/// Reads and writes [`PersistedState`] to a single TOML file. A missing
/// file loads as the default state rather than an error (first run).
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub async fn load(&self) -> Result<PersistedState> {
        let text = match tokio::fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(PersistedState::default()),
            Err(e) => return Err(TfmError::from(e)),
        };
        toml::from_str(&text)
            .map_err(|e| TfmError::with_source(ErrorKind::ConfigInvalid, "persisted state is not valid TOML", e))
    }

    pub async fn save(&self, state: &PersistedState) -> Result<()> {
        let text = toml::to_string_pretty(state)
            .map_err(|e| TfmError::with_source(ErrorKind::IoFailure, "failed to serialize persisted state", e))?;
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(TfmError::from)?;
        }
        tokio::fs::write(&self.path, text).await.map_err(TfmError::from)
    }
}
