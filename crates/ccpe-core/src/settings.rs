//! Persisted user choices.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, Result};
use crate::locations::{SLOT_COUNT, find_game_root, find_profile_root, is_game_root, is_profile_root};

/// Last used folders and defaults, stored as JSON in the user config dir.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub last_selected_root: Option<PathBuf>,
    pub last_selected_profile: Option<usize>,
    pub last_selected_game_root: Option<PathBuf>,
    pub author_name: String,
}

impl Settings {
    /// `<config dir>/ccpe/settings.json`.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("ccpe").join("settings.json"))
    }

    /// Load settings, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(path).map_err(|e| CoreError::io(path, e))?;
        let settings = serde_json::from_str(&data)?;
        debug!(path = %path.display(), "loaded settings");
        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
        }
        let s = serde_json::to_string_pretty(self)?;
        fs::write(path, s).map_err(|e| CoreError::io(path, e))
    }

    /// The slot to act on: `explicit` if given, otherwise the last one used.
    pub fn slot_or_last(&self, explicit: Option<usize>) -> Result<usize> {
        let slot = explicit
            .or(self.last_selected_profile)
            .ok_or_else(|| CoreError::Invalid("no slot given and none selected before".into()))?;
        if slot >= SLOT_COUNT {
            return Err(CoreError::Invalid(format!("slot must be 0..{}, got {}", SLOT_COUNT - 1, slot)));
        }
        Ok(slot)
    }

    /// Saved profile root if still valid, otherwise the standard location.
    pub fn resolve_profile_root(&self) -> Option<PathBuf> {
        self.last_selected_root
            .clone()
            .filter(|p| is_profile_root(p))
            .or_else(find_profile_root)
    }

    /// Saved game root if still valid, otherwise a Steam library lookup.
    pub fn resolve_game_root(&self) -> Option<PathBuf> {
        self.last_selected_game_root
            .clone()
            .filter(|p| is_game_root(p))
            .or_else(find_game_root)
    }
}
