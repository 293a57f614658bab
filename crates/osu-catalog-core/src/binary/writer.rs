//! Buffered writer with atomic replacement
//!
//! File-backed writers stream into `<path>.tmp` and only rename it over the
//! destination in [`DbWriter::finish`] when every write succeeded. A writer
//! that is dropped unfinished deletes its temporary file.

use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use super::STRING_PRESENT;
use crate::error::Result;
use crate::hash::{Md5Hash, MD5_LEN};

const WRITE_BUFFER_SIZE: usize = 64 * 1024;

struct FileTarget {
    path: PathBuf,
    tmp_path: PathBuf,
    file: Option<File>,
}

/// Writer for osu!-style binary database files
pub struct DbWriter {
    buffer: Vec<u8>,
    target: Option<FileTarget>,
    failure: Option<io::Error>,
}

macro_rules! write_le {
    ($name:ident, $ty:ty) => {
        pub fn $name(&mut self, value: $ty) {
            self.write_bytes(&value.to_le_bytes());
        }
    };
}

/// `<path>.tmp` next to the destination
fn tmp_path_for(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

impl DbWriter {
    /// Start writing a file. Errors are deferred to [`DbWriter::finish`].
    pub fn create<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref().to_path_buf();
        let tmp_path = tmp_path_for(&path);

        let opened = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => fs::create_dir_all(parent),
            _ => Ok(()),
        }
        .and_then(|_| File::create(&tmp_path));

        let (file, failure) = match opened {
            Ok(file) => (Some(file), None),
            Err(e) => {
                tracing::warn!("Failed to open {}: {}", tmp_path.display(), e);
                (None, Some(e))
            }
        };

        Self {
            buffer: Vec::with_capacity(WRITE_BUFFER_SIZE),
            target: Some(FileTarget {
                path,
                tmp_path,
                file,
            }),
            failure,
        }
    }

    /// Writer that only accumulates bytes, see [`DbWriter::into_bytes`]
    pub fn in_memory() -> Self {
        Self {
            buffer: Vec::new(),
            target: None,
            failure: None,
        }
    }

    /// Whether any write failed so far
    pub fn has_error(&self) -> bool {
        self.failure.is_some()
    }

    fn flush_buffer(&mut self) {
        let Some(target) = self.target.as_mut() else {
            return;
        };

        if self.failure.is_none() {
            if let Some(file) = target.file.as_mut() {
                if let Err(e) = file.write_all(&self.buffer) {
                    tracing::warn!("Failed to write to {}: {}", target.tmp_path.display(), e);
                    self.failure = Some(e);
                }
            }
        }
        self.buffer.clear();
    }

    /// Append raw bytes
    pub fn write_bytes(&mut self, bytes: &[u8]) {
        if self.failure.is_some() {
            return;
        }

        if self.target.is_some() && self.buffer.len() + bytes.len() > WRITE_BUFFER_SIZE {
            self.flush_buffer();
        }
        self.buffer.extend_from_slice(bytes);
    }

    write_le!(write_u8, u8);
    write_le!(write_u16, u16);
    write_le!(write_i16, i16);
    write_le!(write_u32, u32);
    write_le!(write_i32, i32);
    write_le!(write_u64, u64);
    write_le!(write_i64, i64);
    write_le!(write_f32, f32);
    write_le!(write_f64, f64);

    pub fn write_bool(&mut self, value: bool) {
        self.write_u8(value as u8);
    }

    pub fn write_uleb128(&mut self, mut value: u32) {
        loop {
            let mut byte = (value & 0x7F) as u8;
            value >>= 7;
            if value != 0 {
                byte |= 0x80;
            }
            self.write_u8(byte);
            if value == 0 {
                break;
            }
        }
    }

    /// Presence-tagged string. The empty string is the single byte 0x00.
    pub fn write_string(&mut self, value: &str) {
        if value.is_empty() {
            self.write_u8(0);
            return;
        }

        self.write_u8(STRING_PRESENT);
        self.write_uleb128(value.len() as u32);
        self.write_bytes(value.as_bytes());
    }

    /// Hash strings always declare the full 32 bytes
    pub fn write_hash(&mut self, hash: &Md5Hash) {
        self.write_u8(STRING_PRESENT);
        self.write_u8(MD5_LEN as u8);
        self.write_bytes(hash.as_bytes());
    }

    /// Flush and move the temporary file over the destination.
    ///
    /// On any earlier write failure the temporary file is removed and the
    /// destination is left untouched. In-memory writers always succeed.
    pub fn finish(mut self) -> Result<()> {
        self.flush_buffer();

        let Some(mut target) = self.target.take() else {
            return Ok(());
        };

        if let Some(file) = target.file.take() {
            if self.failure.is_none() {
                if let Err(e) = file.sync_all() {
                    self.failure = Some(e);
                }
            }
        }

        if let Some(e) = self.failure.take() {
            let _ = fs::remove_file(&target.tmp_path);
            tracing::warn!("Not replacing {} after failed write", target.path.display());
            return Err(e.into());
        }

        fs::rename(&target.tmp_path, &target.path)?;
        Ok(())
    }

    /// Take the bytes written so far (in-memory writers)
    pub fn into_bytes(mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }
}

impl Drop for DbWriter {
    fn drop(&mut self) {
        if let Some(mut target) = self.target.take() {
            drop(target.file.take());
            let _ = fs::remove_file(&target.tmp_path);
        }
    }
}
