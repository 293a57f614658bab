//! Corruption-tolerant sequential reader
//!
//! The reader never fails. Once an I/O error or end of file is hit it turns
//! "dead" and every further read yields zeroes or empty values, so a
//! truncated database decodes into defaults instead of aborting the load.

use std::fs::File;
use std::io::{self, BufReader, Cursor, Read};
use std::path::Path;

use crate::hash::{Md5Hash, MD5_LEN};

const READ_BUFFER_SIZE: usize = 64 * 1024;

/// Varints needing this much shift cannot encode a u32
const MAX_ULEB128_SHIFT: u32 = 35;

/// Reader for osu!-style binary database files
pub struct DbReader<R> {
    inner: Option<R>,
    position: u64,
    total_size: u64,
    dead: bool,
}

macro_rules! read_le {
    ($(#[$doc:meta])* $name:ident, $ty:ty) => {
        $(#[$doc])*
        pub fn $name(&mut self) -> $ty {
            let mut buf = [0u8; std::mem::size_of::<$ty>()];
            self.fill(&mut buf);
            <$ty>::from_le_bytes(buf)
        }
    };
}

impl DbReader<BufReader<File>> {
    /// Open a database file.
    ///
    /// A missing or unreadable file produces a dead reader with a total size
    /// of zero, which callers treat as an empty dataset.
    pub fn open<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();
        match File::open(path) {
            Ok(file) => {
                let total_size = file.metadata().map(|m| m.len()).unwrap_or(0);
                Self::new(BufReader::with_capacity(READ_BUFFER_SIZE, file), total_size)
            }
            Err(e) => {
                tracing::debug!("Failed to open {}: {}", path.display(), e);
                Self {
                    inner: None,
                    position: 0,
                    total_size: 0,
                    dead: true,
                }
            }
        }
    }
}

impl DbReader<Cursor<Vec<u8>>> {
    /// Read from an in-memory buffer
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let total_size = bytes.len() as u64;
        Self::new(Cursor::new(bytes), total_size)
    }
}

impl<R: Read> DbReader<R> {
    /// Wrap an arbitrary reader whose length is known up front
    pub fn new(inner: R, total_size: u64) -> Self {
        Self {
            inner: Some(inner),
            position: 0,
            total_size,
            dead: false,
        }
    }

    /// Whether the reader hit EOF or an I/O error
    pub fn is_dead(&self) -> bool {
        self.dead
    }

    /// Bytes consumed so far
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Size of the underlying file, zero if it could not be opened
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    /// True when there is nothing to decode
    pub fn is_empty(&self) -> bool {
        self.total_size == 0
    }

    fn kill(&mut self, err: &io::Error) {
        if !self.dead {
            if err.kind() == io::ErrorKind::UnexpectedEof {
                tracing::debug!("Unexpected end of file at byte {}", self.position);
            } else {
                tracing::warn!("Read failed at byte {}: {}", self.position, err);
            }
        }
        self.dead = true;
        self.position = self.total_size;
    }

    fn fill(&mut self, buf: &mut [u8]) {
        let result = match self.inner.as_mut() {
            Some(inner) if !self.dead => inner.read_exact(buf),
            _ => {
                buf.fill(0);
                return;
            }
        };

        match result {
            Ok(()) => self.position += buf.len() as u64,
            Err(e) => {
                buf.fill(0);
                self.kill(&e);
            }
        }
    }

    /// Read exactly `len` bytes, or an empty vector if the data runs out
    pub fn read_bytes(&mut self, len: usize) -> Vec<u8> {
        let result = match self.inner.as_mut() {
            Some(inner) if !self.dead => {
                let mut buf = Vec::new();
                inner
                    .by_ref()
                    .take(len as u64)
                    .read_to_end(&mut buf)
                    .map(|_| buf)
            }
            _ => return Vec::new(),
        };

        match result {
            Ok(buf) if buf.len() == len => {
                self.position += len as u64;
                buf
            }
            Ok(buf) => {
                self.position += buf.len() as u64;
                self.kill(&io::Error::from(io::ErrorKind::UnexpectedEof));
                Vec::new()
            }
            Err(e) => {
                self.kill(&e);
                Vec::new()
            }
        }
    }

    read_le!(read_u8, u8);
    read_le!(read_u16, u16);
    read_le!(read_i16, i16);
    read_le!(read_u32, u32);
    read_le!(read_i32, i32);
    read_le!(read_u64, u64);
    read_le!(read_i64, i64);
    read_le!(read_f32, f32);
    read_le!(read_f64, f64);

    /// Single byte boolean
    pub fn read_bool(&mut self) -> bool {
        self.read_u8() != 0
    }

    /// Read a ULEB128 encoded integer
    ///
    /// Varints longer than five bytes are corrupt: the reader is killed and
    /// zero is returned.
    pub fn read_uleb128(&mut self) -> u32 {
        let mut result: u32 = 0;
        let mut shift = 0;

        loop {
            let byte = self.read_u8();
            result |= ((byte & 0x7F) as u32) << shift;

            if byte & 0x80 == 0 {
                return result;
            }

            shift += 7;
            if shift >= MAX_ULEB128_SHIFT {
                tracing::warn!("ULEB128 value too large at byte {}", self.position);
                self.dead = true;
                self.position = self.total_size;
                return 0;
            }
        }
    }

    /// Read a presence-tagged string. Invalid UTF-8 is replaced.
    pub fn read_string(&mut self) -> String {
        if self.read_u8() == 0 {
            return String::new();
        }

        let len = self.read_uleb128() as usize;
        let bytes = self.read_bytes(len);
        String::from_utf8_lossy(&bytes).into_owned()
    }

    /// Read a string that should hold an MD5 digest.
    ///
    /// Oversized values keep their first 32 bytes and the rest is skipped,
    /// so the cursor still ends up after the full declared length.
    pub fn read_hash(&mut self) -> Md5Hash {
        self.read_hash_with_len().0
    }

    /// Like [`DbReader::read_hash`], also returning the declared length
    pub fn read_hash_with_len(&mut self) -> (Md5Hash, usize) {
        if self.read_u8() == 0 {
            return (Md5Hash::default(), 0);
        }

        let declared = self.read_uleb128() as usize;
        let mut extra = 0;
        let len = if declared > MD5_LEN {
            tracing::warn!("Expected {} bytes for hash, got {}", MD5_LEN, declared);
            extra = declared - MD5_LEN;
            MD5_LEN
        } else {
            declared
        };

        let bytes = self.read_bytes(len);
        if bytes.len() != len {
            return (Md5Hash::default(), declared);
        }

        self.skip_bytes(extra as u64);
        (Md5Hash::from_bytes(&bytes), declared)
    }

    /// Advance without materializing the data
    pub fn skip_bytes(&mut self, n: u64) {
        if n == 0 {
            return;
        }

        let result = match self.inner.as_mut() {
            Some(inner) if !self.dead => io::copy(&mut inner.by_ref().take(n), &mut io::sink()),
            _ => return,
        };

        match result {
            Ok(skipped) if skipped == n => self.position += n,
            Ok(skipped) => {
                self.position += skipped;
                self.kill(&io::Error::from(io::ErrorKind::UnexpectedEof));
            }
            Err(e) => self.kill(&e),
        }
    }

    /// Skip a presence-tagged string
    pub fn skip_string(&mut self) {
        if self.read_u8() == 0 {
            return;
        }

        let len = self.read_uleb128();
        self.skip_bytes(len as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary::DbWriter;

    fn encode(f: impl FnOnce(&mut DbWriter)) -> Vec<u8> {
        let mut writer = DbWriter::in_memory();
        f(&mut writer);
        writer.into_bytes()
    }

    #[test]
    fn test_fixed_width_values() {
        let data = encode(|w| {
            w.write_u8(7);
            w.write_u16(0xBEEF);
            w.write_i32(-42);
            w.write_u64(621355968000000000);
            w.write_f32(1.5);
            w.write_f64(-2.25);
        });

        let mut reader = DbReader::from_bytes(data);
        assert_eq!(reader.read_u8(), 7);
        assert_eq!(reader.read_u16(), 0xBEEF);
        assert_eq!(reader.read_i32(), -42);
        assert_eq!(reader.read_u64(), 621355968000000000);
        assert_eq!(reader.read_f32(), 1.5);
        assert_eq!(reader.read_f64(), -2.25);
        assert!(!reader.is_dead());
        assert_eq!(reader.position(), reader.total_size());
    }

    #[test]
    fn test_uleb128_small() {
        let mut reader = DbReader::from_bytes(vec![127]);
        assert_eq!(reader.read_uleb128(), 127);
    }

    #[test]
    fn test_uleb128_multi_byte() {
        // 300 = 0xAC 0x02
        let mut reader = DbReader::from_bytes(vec![0xAC, 0x02]);
        assert_eq!(reader.read_uleb128(), 300);
    }

    #[test]
    fn test_uleb128_overlong_kills_reader() {
        let mut reader = DbReader::from_bytes(vec![0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF, 0x01, 0x05]);
        assert_eq!(reader.read_uleb128(), 0);
        assert!(reader.is_dead());
        assert_eq!(reader.read_u8(), 0);
    }

    #[test]
    fn test_strings() {
        let data = encode(|w| {
            w.write_string("");
            w.write_string("Camellia");
            w.write_string("ルミナスタイム");
        });

        let mut reader = DbReader::from_bytes(data);
        assert_eq!(reader.read_string(), "");
        assert_eq!(reader.read_string(), "Camellia");
        assert_eq!(reader.read_string(), "ルミナスタイム");
    }

    #[test]
    fn test_skip_string() {
        let data = encode(|w| {
            w.write_string("skip me");
            w.write_u32(99);
        });

        let mut reader = DbReader::from_bytes(data);
        reader.skip_string();
        assert_eq!(reader.read_u32(), 99);
    }

    #[test]
    fn test_read_hash_exact() {
        let hash = Md5Hash::from("d41d8cd98f00b204e9800998ecf8427e");
        let data = encode(|w| w.write_hash(&hash));
        let mut reader = DbReader::from_bytes(data);
        assert_eq!(reader.read_hash(), hash);
        assert_eq!(reader.position(), 34);
    }

    #[test]
    fn test_read_hash_truncates_oversized() {
        let mut data = vec![0x0b, 40];
        data.extend_from_slice(b"0123456789abcdef0123456789abcdefXXXXXXXX");
        data.push(0x42);

        let mut reader = DbReader::from_bytes(data);
        let hash = reader.read_hash();

        assert_eq!(hash.as_str(), "0123456789abcdef0123456789abcdef");
        assert_eq!(hash.as_bytes().len(), MD5_LEN);
        assert_eq!(reader.position(), 2 + 40);
        assert!(!reader.is_dead());
        assert_eq!(reader.read_u8(), 0x42);
    }

    #[test]
    fn test_read_hash_reports_declared_length() {
        let mut data = vec![0x0b, 3];
        data.extend_from_slice(b"abc");
        let mut reader = DbReader::from_bytes(data);
        let (hash, declared) = reader.read_hash_with_len();
        assert_eq!(hash.as_str(), "abc");
        assert_eq!(declared, 3);
    }

    #[test]
    fn test_dead_after_eof() {
        let mut reader = DbReader::from_bytes(vec![1, 0]);
        assert_eq!(reader.read_u32(), 0);
        assert!(reader.is_dead());
        assert_eq!(reader.read_string(), "");
        assert!(reader.read_hash().is_empty());
        assert_eq!(reader.read_f64(), 0.0);
    }

    #[test]
    fn test_truncated_string_is_empty() {
        let mut reader = DbReader::from_bytes(vec![0x0b, 10, b'a', b'b']);
        assert_eq!(reader.read_string(), "");
        assert!(reader.is_dead());
    }

    #[test]
    fn test_open_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut reader = DbReader::open(dir.path().join("missing.db"));
        assert!(reader.is_dead());
        assert!(reader.is_empty());
        assert_eq!(reader.read_u32(), 0);
    }
}
