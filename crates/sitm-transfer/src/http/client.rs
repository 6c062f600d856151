//! HTTP client used by the download backends.
//!
//! This module wraps `reqwest` with:
//! - Streaming downloads straight to disk with a progress callback
//! - Custom User-Agent, timeouts, proxy and CA certificate support
//! - JSON POST for API-style endpoints (used by the cloud mirror)
//!
//! Requests are attempted once. Retrying is left to the caller.
//!
//! # Examples
//!
//! ```no_run
//! use sitm_transfer::http::{HttpClient, HttpClientConfig};
//! use std::time::Duration;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = HttpClientConfig::new()
//!     .with_timeout(Duration::from_secs(60))
//!     .with_user_agent("sitm-test/1.0".to_string());
//! let client = HttpClient::with_config(config)?;
//!
//! client.download(
//!     "https://example.com/release.zip",
//!     "/tmp/release.zip".as_ref(),
//!     |received, total| println!("{}/{:?} bytes", received, total),
//! ).await?;
//! # Ok(())
//! # }
//! ```

use futures_util::StreamExt;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

const DEFAULT_USER_AGENT: &str = concat!("sitm/", env!("CARGO_PKG_VERSION"));
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum HttpError {
    #[error("Request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP {status}: {url}")]
    HttpStatus { status: u16, url: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON deserialization error: {0}")]
    JsonParse(String),
}

#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    user_agent: String,
    request_timeout: Duration,
}

impl HttpClient {
    pub fn new() -> Result<Self, reqwest::Error> {
        Self::with_config(HttpClientConfig::default())
    }

    pub fn with_config(config: HttpClientConfig) -> Result<Self, reqwest::Error> {
        // Downloads may legitimately run for hours, so the client only
        // limits idle time; whole-request limits are set per API call
        let mut builder = Client::builder()
            .read_timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .gzip(true)
            .user_agent(&config.user_agent);

        if config.no_proxy {
            builder = builder.no_proxy();
        } else if let Some(proxy_url) = &config.proxy {
            let proxy = reqwest::Proxy::all(proxy_url)?;
            builder = builder.proxy(proxy);
        }

        // Add custom CA certificate if configured
        if let Some(cafile) = &config.cafile {
            match std::fs::read(cafile) {
                Ok(cert_bytes) => match reqwest::Certificate::from_pem(&cert_bytes) {
                    Ok(cert) => builder = builder.add_root_certificate(cert),
                    Err(e) => log::warn!("Ignoring CA file {}: {}", cafile.display(), e),
                },
                Err(e) => log::warn!("Cannot read CA file {}: {}", cafile.display(), e),
            }
        }

        let client = builder.build()?;

        Ok(Self {
            client,
            user_agent: config.user_agent,
            request_timeout: config.timeout,
        })
    }

    /// Perform a GET request, failing on non-success status codes
    pub async fn get(&self, url: &str) -> Result<Response, HttpError> {
        let response = self.client.get(url).send().await?;
        Self::check_status(response, url)
    }

    /// POST a JSON body and deserialize the JSON reply
    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, HttpError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let response = self
            .client
            .post(url)
            .json(body)
            .timeout(self.request_timeout)
            .send()
            .await?;
        let response = Self::check_status(response, url)?;
        let text = response.text().await?;

        serde_json::from_str(&text).map_err(|e| HttpError::JsonParse(e.to_string()))
    }

    fn check_status(response: Response, url: &str) -> Result<Response, HttpError> {
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(HttpError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            })
        }
    }

    /// Download a file, calling `progress(received, content_length)` after
    /// every chunk. `content_length` is `None` when the server omits it.
    pub async fn download<F>(&self, url: &str, dest: &Path, progress: F) -> Result<u64, HttpError>
    where
        F: FnMut(u64, Option<u64>),
    {
        let response = self.get(url).await?;
        write_stream(response, dest, progress, |chunk| chunk).await
    }

    /// Like [`download`](Self::download) but passes every chunk through
    /// `transform` before it is written (used for stream decryption).
    pub async fn download_with<F, T>(
        &self,
        url: &str,
        dest: &Path,
        progress: F,
        transform: T,
    ) -> Result<u64, HttpError>
    where
        F: FnMut(u64, Option<u64>),
        T: FnMut(Vec<u8>) -> Vec<u8>,
    {
        let response = self.get(url).await?;
        write_stream(response, dest, progress, transform).await
    }

    /// Get the configured user agent
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

async fn write_stream<F, T>(
    response: Response,
    dest: &Path,
    mut progress: F,
    mut transform: T,
) -> Result<u64, HttpError>
where
    F: FnMut(u64, Option<u64>),
    T: FnMut(Vec<u8>) -> Vec<u8>,
{
    let total_size = response.content_length();

    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let mut file = File::create(dest).await?;
    let mut downloaded: u64 = 0;

    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        downloaded += chunk.len() as u64;
        let data = transform(chunk.to_vec());
        file.write_all(&data).await?;

        progress(downloaded, total_size);
    }

    file.flush().await?;

    Ok(downloaded)
}

#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Longest silence while streaming a body, and the whole-request limit
    /// for JSON API calls
    pub timeout: Duration,
    pub connect_timeout: Duration,
    pub proxy: Option<String>,
    pub no_proxy: bool,
    pub cafile: Option<PathBuf>,
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            proxy: None,
            no_proxy: false,
            cafile: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpClientConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    pub fn with_proxy(mut self, proxy: String) -> Self {
        self.proxy = Some(proxy);
        self
    }

    /// Ignore both configured and system proxies
    pub fn with_no_proxy(mut self) -> Self {
        self.no_proxy = true;
        self
    }

    pub fn with_cafile(mut self, cafile: PathBuf) -> Self {
        self.cafile = Some(cafile);
        self
    }

    pub fn with_user_agent(mut self, user_agent: String) -> Self {
        self.user_agent = user_agent;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = HttpClientConfig::new()
            .with_timeout(Duration::from_secs(60))
            .with_connect_timeout(Duration::from_secs(5))
            .with_user_agent("Test/1.0".to_string());

        assert_eq!(config.timeout, Duration::from_secs(60));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
        assert_eq!(config.user_agent, "Test/1.0");
        assert!(!config.no_proxy);
    }

    #[test]
    fn test_default_config() {
        let config = HttpClientConfig::default();
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.connect_timeout, DEFAULT_CONNECT_TIMEOUT);
        assert!(config.proxy.is_none());
        assert!(config.user_agent.starts_with("sitm/"));
    }

    #[test]
    fn test_client_keeps_user_agent() {
        let config = HttpClientConfig::new().with_user_agent("Custom/2.0".to_string());
        let client = HttpClient::with_config(config).unwrap();
        assert_eq!(client.user_agent(), "Custom/2.0");
    }

    #[test]
    fn test_missing_cafile_is_ignored() {
        let config = HttpClientConfig::new().with_cafile(PathBuf::from("/nonexistent/ca.pem"));
        assert!(HttpClient::with_config(config).is_ok());
    }
}
