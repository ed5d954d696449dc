//! TOML configuration file support.
//!
//! # Configuration File Format
//!
//! ```toml
//! [search]
//! task_timeout_secs = 15.0
//! dispatch_timeout_secs = 15.0
//! max_workers = 3
//! default_limit = 5
//!
//! [cache]
//! enabled = true
//! path = "~/.cache/reference-assistant/results.json"
//! ttl_seconds = 604800
//!
//! [controller]
//! min_capacity = 4
//! max_capacity = 8
//!
//! [breaker]
//! failure_threshold = 5
//! recovery_timeout_secs = 30
//!
//! [api_keys]
//! crossref_mailto = "you@example.org"
//! google_books = "your-key"
//! ncbi = "your-key"
//!
//! [sources]
//! enabled = "crossref,pubmed,google_books"
//! disabled = ""
//!
//! [[source_rates]]
//! source = "pubmed"
//! requests_per_second = 3.0
//!
//! [logging]
//! level = "info"
//! ```

use std::path::{Path, PathBuf};

use super::{default_config_file, Config};

/// Configuration file errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigFileError {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Serialize error: {0}")]
    Serialize(String),
}

impl Config {
    /// Load configuration from a TOML file only, without the environment
    pub fn load_file(path: &Path) -> Result<Self, ConfigFileError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| ConfigFileError::Io(e.to_string()))?;

        toml::from_str(&content).map_err(|e| ConfigFileError::Parse(e.to_string()))
    }

    /// Save configuration to a TOML file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<(), ConfigFileError> {
        let content =
            toml::to_string_pretty(self).map_err(|e| ConfigFileError::Serialize(e.to_string()))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigFileError::Io(e.to_string()))?;
        }
        std::fs::write(path, content).map_err(|e| ConfigFileError::Io(e.to_string()))
    }
}

/// Find the configuration file, checking the working directory first
pub fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("reference-assistant.toml");
    if local.is_file() {
        return Some(local);
    }

    default_config_file().filter(|path| path.is_file())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_file_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.api_keys.google_books = Some("saved-key".to_string());
        config.search.max_workers = 6;
        config.cache.path = Some(dir.path().join("cache.json"));

        config.save(&path).unwrap();

        let loaded = Config::load_file(&path).unwrap();
        assert_eq!(loaded.api_keys.google_books, Some("saved-key".to_string()));
        assert_eq!(loaded.search.max_workers, 6);
        assert_eq!(loaded.cache.path, config.cache.path);
        assert_eq!(loaded.retry, config.retry);
    }

    #[test]
    fn test_config_file_nonexistent() {
        let result = Config::load_file(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigFileError::Io(_))));
    }

    #[test]
    fn test_config_file_invalid_toml() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("invalid.toml");

        std::fs::write(&path, "invalid = toml = content").unwrap();

        let result = Config::load_file(&path);
        assert!(matches!(result, Err(ConfigFileError::Parse(_))));
    }
}
