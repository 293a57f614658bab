//! Error types for osu-catalog-core

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for catalog operations
///
/// Loading never surfaces these: decoders log and fall back to empty data.
/// They are returned by the write side (saves, exports, config persistence).
#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse beatmap file {path}: {message}")]
    BeatmapParse { path: PathBuf, message: String },

    #[error("{0} were not loaded, refusing to overwrite them")]
    NotLoaded(&'static str),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type alias for catalog operations
pub type Result<T> = std::result::Result<T, Error>;
