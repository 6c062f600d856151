//! Plain HTTP(S) backend.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::http::HttpClient;
use crate::progress::ProgressTracker;
use crate::Result;

use super::backend::{BackendKind, DownloadBackend};

/// Streams a URL to disk with a GET request
pub struct HttpBackend {
    http_client: Arc<HttpClient>,
}

impl HttpBackend {
    pub fn new(http_client: Arc<HttpClient>) -> Self {
        Self { http_client }
    }
}

#[async_trait]
impl DownloadBackend for HttpBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Http
    }

    async fn retrieve(
        &self,
        url: &str,
        dest: &Path,
        progress: &mut ProgressTracker<'_>,
    ) -> Result<()> {
        // Without a Content-Length only the closing 100 is reported
        let received = self
            .http_client
            .download(url, dest, |received, total| {
                if let Some(total) = total {
                    progress.report_bytes(received, total);
                }
            })
            .await?;

        log::debug!("Received {} bytes from {}", received, url);
        progress.finish();
        Ok(())
    }
}
