//! Fixed-width MD5 identifier shared by every store

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Length of a textual MD5 digest
pub const MD5_LEN: usize = 32;

/// A 32 character MD5 hex digest stored inline.
///
/// Shorter inputs are zero padded, longer ones truncated. The all-zero value
/// is the "empty" hash that corrupt database entries carry.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Md5Hash([u8; MD5_LEN]);

impl Md5Hash {
    /// Build a hash from raw bytes, truncating or zero-padding to 32 bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut buf = [0u8; MD5_LEN];
        let len = bytes.len().min(MD5_LEN);
        buf[..len].copy_from_slice(&bytes[..len]);
        Self(buf)
    }

    /// Raw 32-byte buffer, including any trailing zero padding
    pub fn as_bytes(&self) -> &[u8; MD5_LEN] {
        &self.0
    }

    /// Number of meaningful bytes (up to the first NUL)
    pub fn len(&self) -> usize {
        self.0.iter().position(|&b| b == 0).unwrap_or(MD5_LEN)
    }

    /// True for the all-zero hash
    pub fn is_empty(&self) -> bool {
        self.0[0] == 0
    }

    /// Textual form, up to the first NUL byte
    pub fn as_str(&self) -> &str {
        std::str::from_utf8(&self.0[..self.len()]).unwrap_or("")
    }
}

impl From<&str> for Md5Hash {
    fn from(s: &str) -> Self {
        Self::from_bytes(s.as_bytes())
    }
}

impl fmt::Display for Md5Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Md5Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Md5Hash({})", self.as_str())
    }
}

impl Serialize for Md5Hash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Md5Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(Self::from(s.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_hash_is_padded() {
        let hash = Md5Hash::from("abc");
        assert_eq!(hash.as_str(), "abc");
        assert_eq!(hash.len(), 3);
        assert_eq!(hash.as_bytes()[3], 0);
    }

    #[test]
    fn test_long_hash_is_truncated() {
        let text = "0123456789abcdef0123456789abcdefEXTRA";
        let hash = Md5Hash::from(text);
        assert_eq!(hash.as_str(), &text[..32]);
        assert_eq!(hash.len(), MD5_LEN);
    }

    #[test]
    fn test_empty_hash() {
        assert!(Md5Hash::default().is_empty());
        assert!(!Md5Hash::from("d41d8cd98f00b204e9800998ecf8427e").is_empty());
    }

    #[test]
    fn test_serde_as_string() {
        let hash = Md5Hash::from("d41d8cd98f00b204e9800998ecf8427e");
        let json = serde_json::to_string(&hash).unwrap();
        assert_eq!(json, "\"d41d8cd98f00b204e9800998ecf8427e\"");
        let back: Md5Hash = serde_json::from_str(&json).unwrap();
        assert_eq!(back, hash);
    }
}
