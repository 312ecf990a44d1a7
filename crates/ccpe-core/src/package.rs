//! Finding, reading and writing `.ccpj` ship packages.
//!
//! Packages live either as loose files anywhere below the mod folder, or as
//! entries inside `.zip` archives placed directly in it. Discovery only
//! decodes the `__meta` header; bodies are loaded on demand through
//! [`load_body`], which tolerates packages that vanished in the meantime.

use std::fmt;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::CompressionMethod;
use zip::result::ZipError;
use zip::write::FileOptions;

use crate::backup::{make_valid_file_name, timestamp};
use crate::error::{CoreError, Result};
use crate::meta::ShipMetaData;

pub const PACKAGE_EXTENSION: &str = "ccpj";
pub const ARCHIVE_EXTENSION: &str = "zip";

/// Where a discovered package lives. `entry` is set for packages inside an archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShipPath {
    pub path: PathBuf,
    pub entry: Option<String>,
}

impl ShipPath {
    pub fn loose(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), entry: None }
    }

    pub fn in_archive(archive: impl Into<PathBuf>, entry: impl Into<String>) -> Self {
        Self { path: archive.into(), entry: Some(entry.into()) }
    }
}

impl fmt::Display for ShipPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.entry {
            Some(entry) => write!(f, "{}!{}", self.path.display(), entry),
            None => write!(f, "{}", self.path.display()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveredShip {
    pub meta: ShipMetaData,
    pub path: ShipPath,
}

// Everything besides `__meta` is skipped by the deserializer without being built.
#[derive(Deserialize)]
struct MetaHeader {
    #[serde(rename = "__meta", default)]
    meta: Option<Value>,
}

/// Decode only the metadata header of a package document.
pub fn read_meta(json: &str) -> Result<ShipMetaData> {
    let header: MetaHeader = serde_json::from_str(json)?;
    Ok(ShipMetaData::from_value_lenient(header.meta.as_ref()))
}

/// Extension match ignoring ASCII case, so `Ship.CCPJ` and `Bundle.ZIP` count.
fn has_extension(p: &Path, ext: &str) -> bool {
    p.extension()
        .and_then(|s| s.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// List every package under `folder`: loose files recursively, archives at the top level only.
///
/// Unreadable files and archives are logged and skipped.
pub fn discover(folder: &Path) -> Result<Vec<DiscoveredShip>> {
    if !folder.is_dir() {
        return Err(CoreError::Invalid(format!("not a directory: {}", folder.display())));
    }
    let mut out = Vec::new();

    for entry in WalkDir::new(folder).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(e) => {
                warn!(error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        let p = entry.path();
        if !entry.file_type().is_file() || !has_extension(p, PACKAGE_EXTENSION) {
            continue;
        }
        match fs::read_to_string(p).map_err(|e| CoreError::io(p, e)).and_then(|s| read_meta(&s)) {
            Ok(meta) => out.push(DiscoveredShip { meta, path: ShipPath::loose(p) }),
            Err(e) => warn!(path = %p.display(), error = %e, "skipping package"),
        }
    }

    let mut archives = Vec::new();
    let rd = fs::read_dir(folder).map_err(|e| CoreError::io(folder, e))?;
    for e in rd.flatten() {
        let p = e.path();
        if p.is_file() && has_extension(&p, ARCHIVE_EXTENSION) {
            archives.push(p);
        }
    }
    archives.sort();
    debug!(count = archives.len(), folder = %folder.display(), "found archives");
    for archive in archives {
        if let Err(e) = discover_in_archive(&archive, &mut out) {
            warn!(archive = %archive.display(), error = %e, "skipping archive");
        }
    }
    Ok(out)
}

fn discover_in_archive(archive: &Path, out: &mut Vec<DiscoveredShip>) -> Result<()> {
    let file = fs::File::open(archive).map_err(|e| CoreError::io(archive, e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| CoreError::zip(archive, e))?;
    for i in 0..zip.len() {
        // raw access reads the header only, so entries we cannot decompress do not matter here
        let name = match zip.by_index_raw(i) {
            Ok(entry) if !entry.is_dir() => entry.name().to_string(),
            Ok(_) => continue,
            Err(e) => {
                warn!(archive = %archive.display(), index = i, error = %e, "skipping archive entry");
                continue;
            }
        };
        if !has_extension(Path::new(&name), PACKAGE_EXTENSION) {
            continue;
        }
        let mut json = String::new();
        let read = zip
            .by_index(i)
            .map_err(|e| CoreError::zip(archive, e))
            .and_then(|mut entry| entry.read_to_string(&mut json).map_err(|e| CoreError::io(archive, e)));
        if let Err(e) = read {
            warn!(archive = %archive.display(), entry = %name, error = %e, "skipping archive entry");
            continue;
        }
        match read_meta(&json) {
            Ok(meta) => out.push(DiscoveredShip { meta, path: ShipPath::in_archive(archive, name) }),
            Err(e) => warn!(archive = %archive.display(), entry = %name, error = %e, "skipping archive entry"),
        }
    }
    Ok(())
}

/// Read the full package text behind `path`.
///
/// Returns `Ok(None)` when the file or archive entry no longer exists, since
/// discovery results can be stale by the time a package is picked.
pub fn load_body(path: &ShipPath) -> Result<Option<String>> {
    if !path.path.is_file() {
        warn!(path = %path.path.display(), "package file no longer exists");
        return Ok(None);
    }
    let Some(entry_name) = &path.entry else {
        return match fs::read_to_string(&path.path) {
            Ok(s) => Ok(Some(s)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(CoreError::io(&path.path, e)),
        };
    };

    let file = fs::File::open(&path.path).map_err(|e| CoreError::io(&path.path, e))?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| CoreError::zip(&path.path, e))?;
    let mut entry = match zip.by_name(entry_name) {
        Ok(entry) => entry,
        Err(ZipError::FileNotFound) => {
            warn!(archive = %path.path.display(), entry = %entry_name, "archive entry no longer exists");
            return Ok(None);
        }
        Err(e) => return Err(CoreError::zip(&path.path, e)),
    };
    let mut json = String::new();
    entry.read_to_string(&mut json).map_err(|e| CoreError::io(&path.path, e))?;
    Ok(Some(json))
}

/// Write `package` into `folder` as `<name>_<timestamp>.ccpj` and return its path.
pub fn write_package(folder: &Path, package: &Value) -> Result<PathBuf> {
    let meta = ShipMetaData::from_value_lenient(package.get("__meta"));
    let mut name = make_valid_file_name(&meta.name);
    if name.is_empty() {
        name = "ship".to_string();
    }
    fs::create_dir_all(folder).map_err(|e| CoreError::io(folder, e))?;
    let dest = folder.join(format!("{}_{}.{}", name, timestamp(), PACKAGE_EXTENSION));
    let s = serde_json::to_string(package)?;
    fs::write(&dest, s).map_err(|e| CoreError::io(&dest, e))?;
    info!(path = %dest.display(), "wrote package");
    Ok(dest)
}

/// Bundle every package below `folder` into a new archive at `dest`.
/// Entry names are relative to `folder` with `/` separators. Returns the entry count.
pub fn pack_folder(folder: &Path, dest: &Path) -> Result<usize> {
    if !folder.is_dir() {
        return Err(CoreError::Invalid(format!("not a directory: {}", folder.display())));
    }
    let file = fs::File::create(dest).map_err(|e| CoreError::io(dest, e))?;
    let mut zip = zip::ZipWriter::new(file);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .unix_permissions(0o644);
    let mut count = 0;
    for entry in WalkDir::new(folder).sort_by_file_name() {
        let entry = entry.map_err(|e| CoreError::Invalid(e.to_string()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || !has_extension(path, PACKAGE_EXTENSION) {
            continue;
        }
        let Ok(rel) = path.strip_prefix(folder) else { continue };
        let name = rel.to_string_lossy().replace('\\', "/");
        zip.start_file(name, options).map_err(|e| CoreError::zip(dest, e))?;
        let data = fs::read(path).map_err(|e| CoreError::io(path, e))?;
        zip.write_all(&data).map_err(|e| CoreError::io(dest, e))?;
        count += 1;
    }
    zip.finish().map_err(|e| CoreError::zip(dest, e))?;
    info!(archive = %dest.display(), count, "packed packages");
    Ok(count)
}
