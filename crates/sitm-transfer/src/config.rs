//! Configuration for the transfer pipeline.
//!
//! Values are merged from three sources, highest priority first:
//!
//! 1. Environment variables (`SITM_*`)
//! 2. A JSON config file (`config.json` in the platform config directory,
//!    or an explicit path)
//! 3. Built-in defaults
//!
//! # Example
//!
//! ```rust,no_run
//! use sitm_transfer::config::TransferConfig;
//!
//! let config = TransferConfig::build(None, true).unwrap();
//! println!("Cloud mirror marker: {}", config.cloud_mirror_marker);
//! ```

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::copy::{DIRECTORY_COPY_BUFFER, FILE_COPY_BUFFER};
use crate::http::HttpClientConfig;
use crate::{Result, TransferError};

/// Settings shared by every transfer operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct TransferConfig {
    /// Seconds a download may stall before it fails; also bounds API calls
    #[serde(default = "default_http_timeout")]
    pub http_timeout: u64,

    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cafile: Option<PathBuf>,

    /// Substring of a source URL that routes it to the cloud mirror backend
    #[serde(default = "default_cloud_mirror_marker")]
    pub cloud_mirror_marker: String,

    /// Command endpoint of the cloud mirror API
    #[serde(default = "default_mirror_api_url")]
    pub mirror_api_url: String,

    #[serde(default = "default_copy_buffer_size")]
    pub copy_buffer_size: usize,

    #[serde(default = "default_file_copy_buffer_size")]
    pub file_copy_buffer_size: usize,
}

fn default_http_timeout() -> u64 {
    300
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    concat!("sitm/", env!("CARGO_PKG_VERSION")).to_string()
}

fn default_cloud_mirror_marker() -> String {
    "mega.nz".to_string()
}

fn default_mirror_api_url() -> String {
    "https://g.api.mega.co.nz/cs".to_string()
}

fn default_copy_buffer_size() -> usize {
    DIRECTORY_COPY_BUFFER
}

fn default_file_copy_buffer_size() -> usize {
    FILE_COPY_BUFFER
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            http_timeout: default_http_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
            proxy: None,
            cafile: None,
            cloud_mirror_marker: default_cloud_mirror_marker(),
            mirror_api_url: default_mirror_api_url(),
            copy_buffer_size: default_copy_buffer_size(),
            file_copy_buffer_size: default_file_copy_buffer_size(),
        }
    }
}

impl TransferConfig {
    /// Build the effective configuration.
    ///
    /// `config_file` overrides the default location; a missing file is not
    /// an error. Environment overrides apply only when `use_environment` is set.
    pub fn build(config_file: Option<&Path>, use_environment: bool) -> Result<Self> {
        let loader = ConfigLoader::new(use_environment);
        let path = match config_file {
            Some(path) => path.to_path_buf(),
            None => loader.get_config_dir().join("config.json"),
        };

        let mut config = loader.load_config_file(&path)?;
        loader.apply_env(&mut config)?;
        Ok(config)
    }

    pub fn http_client_config(&self) -> HttpClientConfig {
        let mut http = HttpClientConfig::new()
            .with_timeout(Duration::from_secs(self.http_timeout))
            .with_connect_timeout(Duration::from_secs(self.connect_timeout))
            .with_user_agent(self.user_agent.clone());

        if let Some(proxy) = &self.proxy {
            http = http.with_proxy(proxy.clone());
        }
        if let Some(cafile) = &self.cafile {
            http = http.with_cafile(cafile.clone());
        }
        http
    }
}

/// Loads configuration from files and the environment
#[derive(Debug)]
pub struct ConfigLoader {
    use_environment: bool,
}

impl ConfigLoader {
    pub fn new(use_environment: bool) -> Self {
        Self { use_environment }
    }

    /// Get a SITM_* environment variable
    pub fn get_env(&self, var: &str) -> Option<String> {
        if !self.use_environment {
            return None;
        }

        env::var(var).ok().filter(|s| !s.is_empty())
    }

    /// Directory holding `config.json`
    pub fn get_config_dir(&self) -> PathBuf {
        if let Some(home) = self.get_env("SITM_HOME") {
            return PathBuf::from(home);
        }

        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "sitm") {
            proj_dirs.config_dir().to_path_buf()
        } else if let Some(base) = directories::BaseDirs::new() {
            base.home_dir().join(".sitm")
        } else {
            PathBuf::from(".sitm")
        }
    }

    /// Load configuration from a JSON file; a missing file yields defaults
    pub fn load_config_file(&self, path: &Path) -> Result<TransferConfig> {
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(TransferConfig::default());
        }

        let contents = fs::read_to_string(path).map_err(|e| {
            TransferError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;

        let config: TransferConfig = serde_json::from_str(&contents).map_err(|e| {
            TransferError::Config(format!("Failed to parse {}: {}", path.display(), e))
        })?;

        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Apply SITM_* environment overrides
    pub fn apply_env(&self, config: &mut TransferConfig) -> Result<()> {
        if let Some(v) = self.get_env("SITM_HTTP_TIMEOUT") {
            config.http_timeout = parse_number("SITM_HTTP_TIMEOUT", &v)?;
        }
        if let Some(v) = self.get_env("SITM_CONNECT_TIMEOUT") {
            config.connect_timeout = parse_number("SITM_CONNECT_TIMEOUT", &v)?;
        }
        if let Some(v) = self.get_env("SITM_USER_AGENT") {
            config.user_agent = v;
        }
        if let Some(v) = self.get_env("SITM_PROXY") {
            config.proxy = Some(v);
        }
        if let Some(v) = self.get_env("SITM_CAFILE") {
            config.cafile = Some(PathBuf::from(v));
        }
        if let Some(v) = self.get_env("SITM_CLOUD_MIRROR_MARKER") {
            config.cloud_mirror_marker = v;
        }
        if let Some(v) = self.get_env("SITM_MIRROR_API_URL") {
            config.mirror_api_url = v;
        }
        if let Some(v) = self.get_env("SITM_COPY_BUFFER_SIZE") {
            config.copy_buffer_size = parse_number("SITM_COPY_BUFFER_SIZE", &v)?;
        }
        if let Some(v) = self.get_env("SITM_FILE_COPY_BUFFER_SIZE") {
            config.file_copy_buffer_size = parse_number("SITM_FILE_COPY_BUFFER_SIZE", &v)?;
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(var: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| TransferError::Config(format!("{} must be a number, got '{}'", var, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = TransferConfig::default();
        assert_eq!(config.cloud_mirror_marker, "mega.nz");
        assert_eq!(config.copy_buffer_size, 65_535);
        assert_eq!(config.file_copy_buffer_size, 4_096);
        assert_eq!(config.http_timeout, 300);
        assert!(config.proxy.is_none());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, r#"{"http-timeout": 5, "cloud-mirror-marker": "mirror.test"}"#).unwrap();

        let config = ConfigLoader::new(false).load_config_file(&path).unwrap();
        assert_eq!(config.http_timeout, 5);
        assert_eq!(config.cloud_mirror_marker, "mirror.test");
        assert_eq!(config.connect_timeout, 10);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let temp = TempDir::new().unwrap();
        let config = ConfigLoader::new(false)
            .load_config_file(&temp.path().join("absent.json"))
            .unwrap();
        assert_eq!(config, TransferConfig::default());
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.json");
        fs::write(&path, "{not json").unwrap();

        let result = ConfigLoader::new(false).load_config_file(&path);
        assert!(matches!(result, Err(TransferError::Config(_))));
    }

    #[test]
    fn test_env_disabled() {
        let loader = ConfigLoader::new(false);
        assert_eq!(loader.get_env("PATH"), None);

        let mut config = TransferConfig::default();
        loader.apply_env(&mut config).unwrap();
        assert_eq!(config, TransferConfig::default());
    }

    #[test]
    fn test_http_client_config() {
        let config = TransferConfig {
            http_timeout: 12,
            proxy: Some("http://proxy.local:3128".to_string()),
            ..Default::default()
        };
        let http = config.http_client_config();
        assert_eq!(http.timeout, Duration::from_secs(12));
        assert_eq!(http.proxy.as_deref(), Some("http://proxy.local:3128"));
    }

    #[test]
    fn test_parse_number_rejects_garbage() {
        assert!(parse_number::<u64>("SITM_HTTP_TIMEOUT", "abc").is_err());
        assert_eq!(parse_number::<u64>("SITM_HTTP_TIMEOUT", " 42 ").unwrap(), 42);
    }
}
