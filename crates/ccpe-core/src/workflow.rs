//! End-to-end slot operations: save file in, package out, and back.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::info;

use crate::backup::backup_file;
use crate::doc::{read_json_file, write_json_to_file};
use crate::error::Result;
use crate::export::{ExportFlags, project};
use crate::meta::ShipMetaData;
use crate::package::write_package;
use crate::patch::{MergeOptions, MergeReport, merge};

#[derive(Debug, Clone, Copy)]
pub struct ImportOptions {
    pub reset_position: bool,
    pub backup: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self { reset_position: true, backup: true }
    }
}

#[derive(Debug)]
pub struct ImportOutcome {
    pub report: MergeReport,
    pub backup: Option<PathBuf>,
}

/// Export the selected categories of `save_path` into a new package in `mod_folder`.
pub fn export_slot(save_path: &Path, mod_folder: &Path, flags: ExportFlags, meta: &ShipMetaData) -> Result<PathBuf> {
    let save = read_json_file(save_path)?;
    let package = project(&save, flags, meta)?;
    write_package(mod_folder, &package)
}

/// Merge `package_json` into the save at `save_path` and write it back.
///
/// The save is only rewritten after every package key was processed.
pub fn import_into_slot(save_path: &Path, package_json: &str, options: ImportOptions) -> Result<ImportOutcome> {
    let package: Value = serde_json::from_str(package_json)?;
    let save = read_json_file(save_path)?;
    let backup = if options.backup { Some(backup_file(save_path)?) } else { None };
    let (merged, report) = merge(save, &package, MergeOptions { reset_position: options.reset_position })?;
    write_json_to_file(save_path, &merged)?;
    info!(
        save = %save_path.display(),
        applied = report.applied.len(),
        skipped = report.skipped.len(),
        "imported package"
    );
    Ok(ImportOutcome { report, backup })
}
