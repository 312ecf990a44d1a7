use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::error::Result;
use crate::package::{DiscoveredShip, discover, load_body};

/// Cloneable handle that marks a [`PackageIndex`] stale. Safe to call from a
/// filesystem watcher thread.
#[derive(Debug, Clone)]
pub struct Invalidator(Arc<AtomicBool>);

impl Invalidator {
    pub fn invalidate(&self) {
        self.0.store(true, Ordering::Release);
    }
}

/// Cached discovery results for one mod folder.
///
/// Any number of invalidations between two refreshes collapse into one rescan.
#[derive(Debug)]
pub struct PackageIndex {
    folder: PathBuf,
    dirty: Arc<AtomicBool>,
    ships: Vec<DiscoveredShip>,
}

impl PackageIndex {
    /// A new index starts dirty; call [`refresh_if_dirty`](Self::refresh_if_dirty) to populate it.
    pub fn new(folder: impl Into<PathBuf>) -> Self {
        Self { folder: folder.into(), dirty: Arc::new(AtomicBool::new(true)), ships: Vec::new() }
    }

    pub fn folder(&self) -> &Path { &self.folder }

    pub fn ships(&self) -> &[DiscoveredShip] { &self.ships }

    pub fn invalidator(&self) -> Invalidator { Invalidator(Arc::clone(&self.dirty)) }

    pub fn invalidate(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.load(Ordering::Acquire)
    }

    /// Re-run discovery if anything invalidated the index. Returns whether a rescan happened.
    pub fn refresh_if_dirty(&mut self) -> Result<bool> {
        if !self.dirty.swap(false, Ordering::AcqRel) {
            return Ok(false);
        }
        match discover(&self.folder) {
            Ok(ships) => {
                debug!(count = ships.len(), "package index refreshed");
                self.ships = ships;
                Ok(true)
            }
            Err(e) => {
                // stay dirty so the next poll retries
                self.dirty.store(true, Ordering::Release);
                Err(e)
            }
        }
    }

    /// Load the body of the `i`-th listed package, `None` if it is out of range or gone.
    pub fn load(&self, i: usize) -> Result<Option<String>> {
        match self.ships.get(i) {
            Some(ship) => load_body(&ship.path),
            None => Ok(None),
        }
    }
}
