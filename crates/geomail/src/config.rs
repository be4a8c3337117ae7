//! Repository configuration
//!
//! Store layout and limits are explicit values handed to each repository at
//! construction, so repositories with different policies can coexist.
//!
//! Loaded from (in order of priority):
//! 1. JSON file (~/.config/geomail/repository.json)
//! 2. Built-in defaults

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config filename in the geomail config directory
const REPOSITORY_CONFIG_FILE: &str = "repository.json";

/// Layout and limits of a mail repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RepositoryConfig {
    /// Directory (under the root) holding canonical message files
    pub messages_dir: String,
    /// Directory (under the root) holding attachment blobs
    pub attachments_dir: String,
    /// Number of leading digest hex chars used in file names
    pub hash_prefix_len: usize,
    /// Zero-padded width of the disambiguation suffix
    pub suffix_width: usize,
    /// Disambiguation slots tried before giving up
    pub max_suffix_attempts: u32,
    /// Message files above this size are rejected without parsing
    pub max_message_size_bytes: u64,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            messages_dir: "adps_messages".to_string(),
            attachments_dir: "adps_attachments".to_string(),
            hash_prefix_len: 10,
            suffix_width: 4,
            max_suffix_attempts: 10_000,
            max_message_size_bytes: 4 * 1024,
        }
    }
}

impl RepositoryConfig {
    /// Load the config file if present, otherwise use defaults
    pub fn load() -> Result<Self> {
        if config::config_exists(REPOSITORY_CONFIG_FILE) {
            return config::load_json(REPOSITORY_CONFIG_FILE);
        }
        Ok(Self::default())
    }

    /// Load from a specific JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        config::load_json_file(path)
    }

    /// Parse from a JSON string; missing keys take their defaults
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse repository config JSON")
    }

    /// Get the default config file path (~/.config/geomail/repository.json)
    pub fn default_config_path() -> Option<PathBuf> {
        config::config_path(REPOSITORY_CONFIG_FILE)
    }

    /// Persist this config as the default repository config, returning where it went
    pub fn save(&self) -> Result<PathBuf> {
        config::save_json(REPOSITORY_CONFIG_FILE, self)
    }

    /// Persist this config to a specific JSON file
    pub fn save_to(&self, path: &Path) -> Result<()> {
        config::save_json_file(path, self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RepositoryConfig::default();
        assert_eq!(config.messages_dir, "adps_messages");
        assert_eq!(config.attachments_dir, "adps_attachments");
        assert_eq!(config.hash_prefix_len, 10);
        assert_eq!(config.max_message_size_bytes, 4096);
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = RepositoryConfig::from_json(r#"{ "max_message_size_bytes": 8192 }"#).unwrap();
        assert_eq!(config.max_message_size_bytes, 8192);
        assert_eq!(config.suffix_width, 4);
        assert_eq!(config.messages_dir, "adps_messages");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("repository.json");
        std::fs::write(&path, r#"{ "messages_dir": "msgs", "hash_prefix_len": 6 }"#).unwrap();

        let config = RepositoryConfig::from_file(&path).unwrap();
        assert_eq!(config.messages_dir, "msgs");
        assert_eq!(config.hash_prefix_len, 6);
        assert_eq!(config.attachments_dir, "adps_attachments");
    }

    #[test]
    fn test_save_to_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("settings/repository.json");
        let config = RepositoryConfig {
            max_message_size_bytes: 8192,
            ..RepositoryConfig::default()
        };

        config.save_to(&path).unwrap();
        let loaded = RepositoryConfig::from_file(&path).unwrap();
        assert_eq!(loaded.max_message_size_bytes, 8192);
        assert_eq!(loaded.messages_dir, config.messages_dir);
    }

    #[test]
    fn test_invalid_json() {
        assert!(RepositoryConfig::from_json("[1, 2]").is_err());
    }
}
