//! YAML run configuration.
//!
//! ```yaml
//! state_file: /var/lib/registry-ping/state.json
//! timeout_secs: 60
//! http_timeout_secs: 10
//! images:
//!   - ref: php:8.2.30-fpm
//!   - ref: nginx:1.25-alpine
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_STATE_FILE: &str = "state.json";
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// One entry of the `images` list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageEntry {
    #[serde(rename = "ref")]
    pub reference: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_state_file")]
    pub state_file: PathBuf,

    /// Deadline for the whole run.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Per-request HTTP timeout.
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,

    /// Overrides the Docker Hub API base URL; `None` uses the public hub.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dockerhub_base_url: Option<String>,

    #[serde(default)]
    pub images: Vec<ImageEntry>,
}

fn default_state_file() -> PathBuf {
    PathBuf::from(DEFAULT_STATE_FILE)
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_file: default_state_file(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            dockerhub_base_url: None,
            images: Vec::new(),
        }
    }
}

impl Config {
    /// Read and parse the YAML file at `path`.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        // An empty document deserializes as unit, not as an empty mapping.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        let mut config: Self = serde_yaml::from_str(text)?;
        if config.state_file.as_os_str().is_empty() {
            config.state_file = default_state_file();
        }
        Ok(config)
    }

    /// Raw references in configured order.
    pub fn references(&self) -> Vec<&str> {
        self.images.iter().map(|e| e.reference.as_str()).collect()
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_fields() {
        let config = Config::from_yaml("images:\n  - ref: php:8.2.30-fpm\n").unwrap();
        assert_eq!(config.state_file, PathBuf::from("state.json"));
        assert_eq!(config.timeout(), Duration::from_secs(60));
        assert_eq!(config.http_timeout(), Duration::from_secs(10));
        assert_eq!(config.dockerhub_base_url, None);
        assert_eq!(config.references(), vec!["php:8.2.30-fpm"]);
    }

    #[test]
    fn empty_document_is_an_empty_batch() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.references().is_empty());
    }

    #[test]
    fn references_keep_file_order() {
        let yaml = r#"
state_file: /var/lib/registry-ping/state.json
timeout_secs: 30
http_timeout_secs: 5
dockerhub_base_url: http://127.0.0.1:8080
images:
  - ref: nginx:1.25-alpine
  - ref: php:8.2.30-fpm
  - ref: ghcr.io/org/img:latest
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(
            config.references(),
            vec!["nginx:1.25-alpine", "php:8.2.30-fpm", "ghcr.io/org/img:latest"]
        );
        assert_eq!(config.timeout_secs, 30);
        assert_eq!(
            config.dockerhub_base_url.as_deref(),
            Some("http://127.0.0.1:8080")
        );
    }

    #[test]
    fn blank_state_file_falls_back_to_default() {
        let config = Config::from_yaml("state_file: \"\"\nimages: []\n").unwrap();
        assert_eq!(config.state_file, PathBuf::from(DEFAULT_STATE_FILE));
    }

    #[test]
    fn unknown_keys_are_ignored() {
        let config = Config::from_yaml("schedule: hourly\nimages:\n  - ref: redis:7\n").unwrap();
        assert_eq!(config.references(), vec!["redis:7"]);
    }

    #[test]
    fn load_reports_path_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.yaml");

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("nope.yaml"));
    }

    #[test]
    fn load_reports_path_on_bad_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "images: [ref: \n").unwrap();

        let err = Config::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("config.yaml"));
    }

    #[test]
    fn load_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        std::fs::write(&path, "timeout_secs: 5\nimages:\n  - ref: redis:7\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.references(), vec!["redis:7"]);
    }
}
