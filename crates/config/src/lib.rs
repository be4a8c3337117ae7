//! Settings files for geomail
//!
//! Repository settings live as JSON under the platform config directory
//! (`~/.config/geomail/` on Linux). Callers may also point at any other file.

use anyhow::{Context, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "geomail";

/// Platform config directory for geomail, if the platform has one
pub fn config_dir() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join(APP_DIR))
}

/// Location of `filename` inside [`config_dir`]
pub fn config_path(filename: &str) -> Option<PathBuf> {
    config_dir().map(|p| p.join(filename))
}

pub fn config_exists(filename: &str) -> bool {
    config_path(filename).is_some_and(|p| p.is_file())
}

/// Read `filename` from [`config_dir`]
pub fn load_json<T: DeserializeOwned>(filename: &str) -> Result<T> {
    let path = config_path(filename).context("No config directory on this platform")?;
    load_json_file(&path)
}

pub fn load_json_file<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("Cannot read settings {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Invalid settings in {}", path.display()))
}

/// Write `value` to `filename` in [`config_dir`]
pub fn save_json<T: Serialize>(filename: &str, value: &T) -> Result<PathBuf> {
    let path = config_path(filename).context("No config directory on this platform")?;
    save_json_file(&path, value)?;
    Ok(path)
}

/// Write `value` as pretty JSON, creating missing parent directories
pub fn save_json_file<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Cannot create directory {}", parent.display()))?;
    }
    let content = serde_json::to_string_pretty(value)?;
    fs::write(path, content).with_context(|| format!("Cannot write settings {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Limits {
        name: String,
        limit: u64,
    }

    #[test]
    fn test_config_path_under_app_dir() {
        let path = config_path("repository.json").unwrap();
        assert!(path.ends_with("geomail/repository.json"));
        assert_eq!(path.parent(), config_dir().as_deref());
    }

    #[test]
    fn test_save_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/limits.json");
        let value = Limits {
            name: "repo".to_string(),
            limit: 4096,
        };

        save_json_file(&path, &value).unwrap();
        let loaded: Limits = load_json_file(&path).unwrap();

        assert_eq!(loaded, value);
    }

    #[test]
    fn test_load_missing_file_fails() {
        let dir = tempfile::tempdir().unwrap();
        let result: Result<Limits> = load_json_file(&dir.path().join("missing.json"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_invalid_json_names_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();

        let err = load_json_file::<Limits>(&path).unwrap_err();
        assert!(err.to_string().contains("broken.json"));
    }
}
