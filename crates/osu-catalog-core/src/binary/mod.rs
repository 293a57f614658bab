//! Binary encoding shared by every osu! database file
//!
//! All values are little-endian. Strings are a presence byte (`0x00` for an
//! empty string, `0x0b` otherwise) followed by a ULEB128 length and raw bytes.

pub mod reader;
pub mod writer;

pub use reader::DbReader;
pub use writer::DbWriter;

/// Presence byte that precedes a non-empty string
pub const STRING_PRESENT: u8 = 0x0b;
