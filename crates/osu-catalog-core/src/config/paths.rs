//! Platform-specific path detection for osu! installations

use std::fs;
use std::path::{Path, PathBuf};

/// Get all available drive letters on Windows
#[cfg(target_os = "windows")]
fn get_available_drives() -> Vec<PathBuf> {
    let mut drives = Vec::new();
    for letter in b'A'..=b'Z' {
        let path = PathBuf::from(format!("{}:\\", letter as char));
        if path.exists() {
            drives.push(path);
        }
    }
    drives
}

/// Check if a path is an osu!stable installation.
/// Looks for: Songs folder or any of the database files
pub fn is_osu_folder(path: &Path) -> bool {
    if !path.is_dir() {
        return false;
    }

    path.join("Songs").is_dir()
        || path.join("osu!.db").is_file()
        || path.join("scores.db").is_file()
        || path.join("collection.db").is_file()
}

/// Scan a directory and its immediate children for an osu! installation
#[cfg(target_os = "windows")]
fn scan_directory(dir: &Path) -> Option<PathBuf> {
    if !dir.is_dir() {
        return None;
    }

    if is_osu_folder(dir) {
        return Some(dir.to_path_buf());
    }

    fs::read_dir(dir)
        .ok()?
        .flatten()
        .map(|entry| entry.path())
        .find(|path| path.is_dir() && path.join("osu!.db").is_file())
}

/// Detect the osu!stable installation directory
pub fn detect_osu_folder() -> Option<PathBuf> {
    #[cfg(target_os = "windows")]
    {
        if let Some(local) = dirs::data_local_dir() {
            let path = local.join("osu!");
            if is_osu_folder(&path) {
                return Some(path);
            }
        }

        for drive in get_available_drives() {
            let scan_dirs = [
                drive.clone(),
                drive.join("Games"),
                drive.join("Program Files"),
                drive.join("Program Files (x86)"),
            ];

            for dir in &scan_dirs {
                if let Some(path) = scan_directory(dir) {
                    return Some(path);
                }
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        if let Some(home) = dirs::home_dir() {
            let wine_paths = [
                home.join(".wine/drive_c/osu!"),
                home.join(".local/share/osu-wine/osu!"),
                home.join("Games/osu!"),
            ];

            for path in wine_paths {
                if is_osu_folder(&path) {
                    return Some(path);
                }
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        if let Some(home) = dirs::home_dir() {
            let candidates = [
                home.join("Library/Application Support/osu-wine/osu!"),
                home.join(".wine/drive_c/osu!"),
            ];

            for path in candidates {
                if is_osu_folder(&path) {
                    return Some(path);
                }
            }
        }
    }

    None
}

/// `<data dir>/osu-catalog`, or `./osu-catalog` without a data dir
pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .map(|p| p.join("osu-catalog"))
        .unwrap_or_else(|| PathBuf::from("osu-catalog"))
}

pub fn default_player_name() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .unwrap_or_else(|_| "Guest".to_string())
}

/// Absolute on this platform, or a Windows drive path like `D:\Songs`
pub(crate) fn is_absolute_path(path: &Path) -> bool {
    path.is_absolute() || path.to_string_lossy().contains(':')
}

/// Read `BeatmapDirectory` from `osu!.<username>.cfg`.
///
/// Relative directories are joined onto the osu! folder. Values of two
/// characters or fewer are ignored.
pub fn beatmap_directory_from_user_config(osu_folder: &Path, username: &str) -> Option<PathBuf> {
    if username.is_empty() {
        return None;
    }

    let cfg_path = osu_folder.join(format!("osu!.{}.cfg", username));
    let content = fs::read_to_string(&cfg_path).ok()?;

    let value = content.lines().find_map(|line| {
        let (key, value) = line.split_once('=')?;
        (key.trim() == "BeatmapDirectory").then(|| value.trim().to_string())
    })?;

    if value.len() <= 2 {
        return None;
    }

    let path = PathBuf::from(&value);
    if is_absolute_path(&path) {
        Some(path)
    } else {
        Some(osu_folder.join(value.trim_start_matches(['/', '\\'])))
    }
}

/// Validate that a path looks like an osu!stable installation
pub fn validate_osu_folder(path: &Path) -> bool {
    path.exists() && (path.join("Songs").is_dir() || path.join("osu!.db").is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_detect_paths() {
        // Just verify detection runs without panicking
        let _ = detect_osu_folder();
    }

    #[test]
    fn test_is_osu_folder() {
        let dir = TempDir::new().unwrap();
        assert!(!is_osu_folder(dir.path()));
        assert!(!validate_osu_folder(dir.path()));

        fs::write(dir.path().join("osu!.db"), b"").unwrap();
        assert!(is_osu_folder(dir.path()));
        assert!(validate_osu_folder(dir.path()));
    }

    #[test]
    fn test_beatmap_directory_relative() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("osu!.player.cfg"),
            "# osu! configuration\nVolumeUniversal = 60\nBeatmapDirectory = /Maps\n",
        )
        .unwrap();

        assert_eq!(
            beatmap_directory_from_user_config(dir.path(), "player").unwrap(),
            dir.path().join("Maps")
        );
        assert!(beatmap_directory_from_user_config(dir.path(), "other").is_none());
        assert!(beatmap_directory_from_user_config(dir.path(), "").is_none());
    }

    #[test]
    fn test_beatmap_directory_absolute_and_short() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("osu!.a.cfg"), "BeatmapDirectory = D:\\Songs\n").unwrap();
        fs::write(dir.path().join("osu!.b.cfg"), "BeatmapDirectory = S\n").unwrap();

        assert_eq!(
            beatmap_directory_from_user_config(dir.path(), "a").unwrap(),
            PathBuf::from("D:\\Songs")
        );
        assert!(beatmap_directory_from_user_config(dir.path(), "b").is_none());
    }
}
