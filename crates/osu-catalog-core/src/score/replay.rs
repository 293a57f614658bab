//! Opaque replay blob storage

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Stores compressed replays as `<dir>/<timestamp>.replay.lzma`
#[derive(Debug, Clone)]
pub struct ReplayStore {
    dir: PathBuf,
}

impl ReplayStore {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    pub fn path_for(&self, timestamp: u64) -> PathBuf {
        self.dir.join(format!("{}.replay.lzma", timestamp))
    }

    /// Write a replay blob. Empty blobs are not stored.
    pub fn save(&self, timestamp: u64, data: &[u8]) -> Result<Option<PathBuf>> {
        if data.is_empty() {
            return Ok(None);
        }

        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(timestamp);
        fs::write(&path, data)?;
        tracing::debug!("Saved replay to {}", path.display());
        Ok(Some(path))
    }

    pub fn load(&self, timestamp: u64) -> Option<Vec<u8>> {
        fs::read(self.path_for(timestamp)).ok()
    }

    pub fn exists(&self, timestamp: u64) -> bool {
        self.path_for(timestamp).is_file()
    }
}
