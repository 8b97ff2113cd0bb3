//! Configuration record consumed by the core (spec §3 "Configuration").
//!
//! Loading this from disk/CLI flags is out of scope — the embedder parses
//! TOML with `toml`/`serde` (or argv with its own `clap` app) and hands the
//! core a validated `Config`.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, TfmError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorScheme {
    Dark,
    Light,
}

impl Default for ColorScheme {
    fn default() -> Self {
        ColorScheme::Dark
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FavoritePath {
    pub name: String,
    pub uri: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub s3_cache_ttl_seconds: u32,
    pub control_master_check_interval_seconds: u32,
    pub health_check_interval_seconds: u32,
    pub key_bindings: HashMap<String, HashSet<String>>,
    pub favorite_paths: Vec<FavoritePath>,
    pub confirm_delete: bool,
    pub confirm_move: bool,
    pub confirm_copy: bool,
    pub color_scheme: ColorScheme,
    pub force_fallback_colors: bool,
    pub cache_max_entries: u32,
    pub cursor_history_depth: u32,
    pub progress_redraw_min_interval_ms: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            s3_cache_ttl_seconds: 60,
            control_master_check_interval_seconds: 5,
            health_check_interval_seconds: 30,
            key_bindings: HashMap::new(),
            favorite_paths: Vec::new(),
            confirm_delete: true,
            confirm_move: true,
            confirm_copy: false,
            color_scheme: ColorScheme::Dark,
            force_fallback_colors: false,
            cache_max_entries: 10_000,
            cursor_history_depth: 100,
            progress_redraw_min_interval_ms: 16,
        }
    }
}

impl Config {
    /// Rejects configuration values that cannot be acted on, raising
    /// `ConfigInvalid` (spec §7) rather than panicking or silently
    /// clamping.
    pub fn validate(&self) -> Result<(), TfmError> {
        if self.s3_cache_ttl_seconds == 0 {
            return Err(TfmError::new(
                ErrorKind::ConfigInvalid,
                "s3_cache_ttl_seconds must be non-zero",
            ));
        }
        if self.progress_redraw_min_interval_ms < 16 {
            return Err(TfmError::new(
                ErrorKind::ConfigInvalid,
                "progress_redraw_min_interval_ms must be >= 16",
            ));
        }
        if self.cursor_history_depth == 0 {
            return Err(TfmError::new(
                ErrorKind::ConfigInvalid,
                "cursor_history_depth must be non-zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_pass_validation() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn zero_ttl_is_rejected() {
        let mut cfg = Config::default();
        cfg.s3_cache_ttl_seconds = 0;
        let err = cfg.validate().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    }

    #[test]
    fn sub_frame_redraw_interval_is_rejected() {
        let mut cfg = Config::default();
        cfg.progress_redraw_min_interval_ms = 4;
        assert!(cfg.validate().is_err());
    }
}
