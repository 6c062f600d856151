//! Single entry point for every transfer operation.

use std::path::Path;
use std::sync::Arc;

use crate::archive::ArchiveExtractor;
use crate::cancel::CancelFlag;
use crate::config::TransferConfig;
use crate::copy::CopyEngine;
use crate::downloader::FileDownloader;
use crate::http::HttpClient;
use crate::permissions;
use crate::progress::ProgressSink;
use crate::shell::{self, Launcher, SystemLauncher};
use crate::Result;

/// Delegates to the copy engine, downloader, extractor and OS helpers.
///
/// Holds no per-operation state, so independent calls may run concurrently.
pub struct TransferService {
    copier: CopyEngine,
    downloader: FileDownloader,
    launcher: Arc<dyn Launcher>,
}

impl TransferService {
    /// Build the stock service from configuration
    pub fn from_config(config: &TransferConfig) -> Result<Self> {
        let http_client = Arc::new(HttpClient::with_config(config.http_client_config())?);

        Ok(Self::with_parts(
            CopyEngine::with_buffers(config.copy_buffer_size, config.file_copy_buffer_size),
            FileDownloader::new(
                http_client,
                &config.mirror_api_url,
                config.cloud_mirror_marker.clone(),
            ),
            Arc::new(SystemLauncher),
        ))
    }

    pub fn with_parts(
        copier: CopyEngine,
        downloader: FileDownloader,
        launcher: Arc<dyn Launcher>,
    ) -> Self {
        Self {
            copier,
            downloader,
            launcher,
        }
    }

    pub async fn copy_directory(
        &self,
        source: &Path,
        destination: &Path,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<()> {
        self.copier.copy_directory(source, destination, progress).await
    }

    pub async fn copy_file(
        &self,
        source: &Path,
        destination: &Path,
        cancel: Option<&CancelFlag>,
    ) -> Result<()> {
        self.copier.copy_file(source, destination, cancel).await
    }

    /// Returns `false` when the download failed; the reason is logged.
    pub async fn download_file(
        &self,
        file_name: &str,
        dest_dir: &Path,
        url: &str,
        progress: Option<&dyn ProgressSink>,
    ) -> bool {
        self.downloader.download(file_name, dest_dir, url, progress).await
    }

    pub async fn extract_archive(
        &self,
        archive_path: &Path,
        dest_dir: &Path,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<()> {
        ArchiveExtractor::extract(archive_path, dest_dir, progress).await
    }

    pub async fn open_directory(&self, path: &Path) -> Result<()> {
        shell::open_directory(self.launcher.as_ref(), path).await
    }

    pub async fn open_file(&self, path: &Path) -> Result<()> {
        shell::open_file(self.launcher.as_ref(), path).await
    }

    pub async fn set_executable(&self, path: &Path) -> Result<()> {
        permissions::set_executable(path).await
    }

    pub fn downloader(&self) -> &FileDownloader {
        &self.downloader
    }
}
