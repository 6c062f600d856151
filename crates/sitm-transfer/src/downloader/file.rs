//! Single-file downloads routed to the matching backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::http::HttpClient;
use crate::progress::{ProgressSink, ProgressTracker};

use super::backend::{select_backend, BackendKind, DownloadBackend};
use super::http::HttpBackend;
use super::mirror::{CloudMirrorBackend, MegaService};

/// Downloads one file into a directory, choosing the backend from the URL.
pub struct FileDownloader {
    http: Arc<dyn DownloadBackend>,
    cloud_mirror: Arc<dyn DownloadBackend>,
    cloud_mirror_marker: String,
}

impl FileDownloader {
    /// Create a downloader with the stock HTTP and MEGA backends
    pub fn new(
        http_client: Arc<HttpClient>,
        mirror_api_url: &str,
        cloud_mirror_marker: impl Into<String>,
    ) -> Self {
        let mega = MegaService::new(Arc::clone(&http_client), mirror_api_url);
        Self::with_backends(
            Arc::new(HttpBackend::new(http_client)),
            Arc::new(CloudMirrorBackend::new(Arc::new(mega))),
            cloud_mirror_marker,
        )
    }

    /// Create a downloader with explicit backends
    pub fn with_backends(
        http: Arc<dyn DownloadBackend>,
        cloud_mirror: Arc<dyn DownloadBackend>,
        cloud_mirror_marker: impl Into<String>,
    ) -> Self {
        Self {
            http,
            cloud_mirror,
            cloud_mirror_marker: cloud_mirror_marker.into(),
        }
    }

    pub fn backend_for(&self, url: &str) -> &dyn DownloadBackend {
        match select_backend(url, &self.cloud_mirror_marker) {
            BackendKind::Http => self.http.as_ref(),
            BackendKind::CloudMirror => self.cloud_mirror.as_ref(),
        }
    }

    /// Download `url` to `dest_dir/file_name`.
    ///
    /// A file already at the target path is deleted first. Backend failures
    /// are logged and turned into `false`; a partially written file is removed.
    pub async fn download(
        &self,
        file_name: &str,
        dest_dir: &Path,
        url: &str,
        progress: Option<&dyn ProgressSink>,
    ) -> bool {
        let file_path = dest_dir.join(file_name);

        if let Err(e) = remove_existing(&file_path).await {
            log::error!("Cannot remove existing file {}: {}", file_path.display(), e);
            return false;
        }

        let backend = self.backend_for(url);
        if backend.kind() == BackendKind::Http {
            log::info!("Starting download of '{}' from '{}'", file_name, url);
        }

        let mut tracker = ProgressTracker::new(progress);
        match backend.retrieve(url, &file_path, &mut tracker).await {
            Ok(()) => {
                log::debug!("Downloaded '{}' to {}", file_name, file_path.display());
                true
            }
            Err(e) => {
                log::error!(
                    "Failed to download file '{}' from {} at url '{}': {}",
                    file_name,
                    backend.kind(),
                    url,
                    e
                );
                if let Err(e) = remove_existing(&file_path).await {
                    log::warn!("Cannot remove partial file {}: {}", file_path.display(), e);
                }
                false
            }
        }
    }

    /// Target path of a download, for callers that need it afterwards
    pub fn target_path(dest_dir: &Path, file_name: &str) -> PathBuf {
        dest_dir.join(file_name)
    }
}

async fn remove_existing(path: &Path) -> std::io::Result<()> {
    match tokio::fs::remove_file(path).await {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
