// Game install and profile folder layout.
// - Game root: contains `Data/` and `CobaltCore.exe`; packages go to `<root>/ShipMods`.
// - Profile root: `Slot0`..`Slot2`, each holding a `Save.json`.
use std::fs;
use std::path::{Path, PathBuf};

use keyvalues_parser::Vdf;
use tracing::{debug, info, warn};

use crate::error::{CoreError, Result};

pub const SLOT_COUNT: usize = 3;
pub const SAVE_FILE_NAME: &str = "Save.json";
pub const MOD_FOLDER_NAME: &str = "ShipMods";
const GAME_EXE: &str = "CobaltCore.exe";
const GAME_FOLDERS: &[&str] = &["Cobalt Core", "Cobalt Core Demo"];
const PROFILE_FOLDERS: &[&str] = &["CobaltCore", "CobaltCoreDemo"];

pub fn is_game_root(p: &Path) -> bool {
    if !p.is_dir() {
        debug!(path = %p.display(), "game folder does not exist");
        return false;
    }
    if !p.join("Data").is_dir() {
        debug!(path = %p.display(), "no Data folder");
        return false;
    }
    if !p.join(GAME_EXE).is_file() {
        debug!(path = %p.display(), exe = GAME_EXE, "missing game executable");
        return false;
    }
    true
}

pub fn slot_path(root: &Path, slot: usize) -> PathBuf {
    root.join(format!("Slot{slot}")).join(SAVE_FILE_NAME)
}

/// Which of the three slots hold a save file.
pub fn valid_slots(root: &Path) -> [bool; SLOT_COUNT] {
    let mut out = [false; SLOT_COUNT];
    for (i, slot) in out.iter_mut().enumerate() {
        *slot = slot_path(root, i).is_file();
    }
    out
}

pub fn is_profile_root(p: &Path) -> bool {
    p.is_dir() && valid_slots(p).contains(&true)
}

/// Validated slot save path, or an error naming why it cannot be used.
pub fn existing_slot(root: &Path, slot: usize) -> Result<PathBuf> {
    if slot >= SLOT_COUNT {
        return Err(CoreError::Invalid(format!("slot must be 0..{}, got {slot}", SLOT_COUNT - 1)));
    }
    let p = slot_path(root, slot);
    if !p.is_file() {
        return Err(CoreError::Invalid(format!("no save in slot {slot}: {}", p.display())));
    }
    Ok(p)
}

/// `<game root>/ShipMods`, created if missing.
pub fn ensure_mod_folder(game_root: &Path) -> Result<PathBuf> {
    let dir = game_root.join(MOD_FOLDER_NAME);
    if !dir.is_dir() {
        fs::create_dir_all(&dir).map_err(|e| CoreError::io(&dir, e))?;
        info!(path = %dir.display(), "created mod folder");
    }
    Ok(dir)
}

/// Library paths listed in a Steam `libraryfolders.vdf`.
///
/// Reads the `path` of every numbered library block. The older layout maps
/// the number straight to the path string, which is accepted too. Anything
/// that does not parse yields no libraries.
pub fn parse_library_folders(text: &str) -> Vec<PathBuf> {
    let vdf = match Vdf::parse(text) {
        Ok(vdf) => vdf,
        Err(e) => {
            warn!(error = %e, "unreadable libraryfolders.vdf");
            return Vec::new();
        }
    };
    if !vdf.key.eq_ignore_ascii_case("libraryfolders") {
        debug!(key = %vdf.key, "unexpected libraryfolders.vdf root");
        return Vec::new();
    }
    let Some(folders) = vdf.value.get_obj() else { return Vec::new() };

    let mut out = Vec::new();
    for (key, values) in folders.iter() {
        if key.parse::<u32>().is_err() {
            continue;
        }
        for value in values {
            let path = match value.get_obj() {
                Some(library) => library.get("path").and_then(|v| v.first()).and_then(|v| v.get_str()),
                None => value.get_str(),
            };
            if let Some(path) = path {
                out.push(PathBuf::from(path));
            }
        }
    }
    out
}

fn steam_install_dirs() -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(home) = dirs::home_dir() {
        out.push(home.join(".steam").join("steam"));
        out.push(home.join(".local").join("share").join("Steam"));
        out.push(home.join("Library").join("Application Support").join("Steam"));
    }
    out.push(PathBuf::from(r"C:\Program Files (x86)\Steam"));
    out.push(PathBuf::from(r"C:\Program Files\Steam"));
    out
}

/// Look for the game in every Steam library we can find.
pub fn find_game_root() -> Option<PathBuf> {
    let mut libraries = Vec::new();
    for install in steam_install_dirs() {
        let vdf = install.join("steamapps").join("libraryfolders.vdf");
        if let Ok(text) = fs::read_to_string(&vdf) {
            libraries.extend(parse_library_folders(&text));
        }
        libraries.push(install);
    }
    for lib in libraries {
        for name in GAME_FOLDERS {
            let candidate = lib.join("steamapps").join("common").join(name);
            if is_game_root(&candidate) {
                info!(path = %candidate.display(), "found game folder");
                return Some(candidate);
            }
        }
    }
    None
}

/// Look for the profile folder in the roaming config directory.
pub fn find_profile_root() -> Option<PathBuf> {
    let base = dirs::config_dir()?;
    PROFILE_FOLDERS
        .iter()
        .map(|name| base.join(name))
        .find(|p| is_profile_root(p))
}
