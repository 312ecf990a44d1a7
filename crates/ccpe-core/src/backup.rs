use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{CoreError, Result};

/// Local time as `year-day-month_hour-minute-second`, e.g. `2024-07-3_14-05-09`.
/// Used both for backup suffixes and for exported package names.
pub fn timestamp() -> String {
    chrono::Local::now().format("%Y-%d-%-m_%H-%M-%S").to_string()
}

/// Copy `file` to `<file>.<timestamp>.backup` next to it.
pub fn backup_file(file: &Path) -> Result<PathBuf> {
    let mut name = file.as_os_str().to_owned();
    name.push(format!(".{}.backup", timestamp()));
    let dest = PathBuf::from(name);
    if dest.exists() {
        return Err(CoreError::Invalid(format!("backup already exists: {}", dest.display())));
    }
    fs::copy(file, &dest).map_err(|e| CoreError::io(file, e))?;
    info!(backup = %dest.display(), "wrote save backup");
    Ok(dest)
}

/// Strip characters that are not allowed in file names on any platform we target.
pub fn make_valid_file_name(name: &str) -> String {
    const INVALID: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];
    name.chars()
        .filter(|c| !c.is_control() && !INVALID.contains(c))
        .collect()
}
