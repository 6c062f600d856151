//! Directory mirroring and single-file copies.

use std::path::{Path, PathBuf};

use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use walkdir::WalkDir;

use crate::cancel::CancelFlag;
use crate::progress::{ProgressSink, ProgressTracker};
use crate::size::directory_size;
use crate::{Result, TransferError};

/// Chunk size used while mirroring a tree.
pub const DIRECTORY_COPY_BUFFER: usize = 65_535;

/// Chunk size used by [`CopyEngine::copy_file`]; cancellation is checked once per chunk.
pub const FILE_COPY_BUFFER: usize = 4_096;

/// One unit of work in a directory copy, relative to the source root.
#[derive(Debug, Clone, PartialEq, Eq)]
enum CopyStep {
    Directory(PathBuf),
    File(PathBuf),
}

/// Copies directory trees and single files.
#[derive(Debug, Clone)]
pub struct CopyEngine {
    directory_buffer: usize,
    file_buffer: usize,
}

impl CopyEngine {
    pub fn new() -> Self {
        Self::with_buffers(DIRECTORY_COPY_BUFFER, FILE_COPY_BUFFER)
    }

    /// Create an engine with explicit chunk sizes (zero is bumped to one byte)
    pub fn with_buffers(directory_buffer: usize, file_buffer: usize) -> Self {
        Self {
            directory_buffer: directory_buffer.max(1),
            file_buffer: file_buffer.max(1),
        }
    }

    /// Mirror everything under `source` into `destination`.
    ///
    /// The total tree size is computed first and used as the progress
    /// denominator; progress is reported per chunk across the whole tree and
    /// always ends with 100. On error, whatever was already copied stays.
    pub async fn copy_directory(
        &self,
        source: &Path,
        destination: &Path,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<()> {
        self.mirror(source, destination, progress)
            .await
            .inspect_err(|e| {
                log::error!(
                    "Failed to copy {} to {}: {}",
                    source.display(),
                    destination.display(),
                    e
                )
            })
    }

    async fn mirror(
        &self,
        source: &Path,
        destination: &Path,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<()> {
        let total = directory_size(source).await?;

        let root = source.to_path_buf();
        let steps = tokio::task::spawn_blocking(move || plan_copy(&root)).await??;

        log::debug!(
            "Copying {} ({} bytes, {} entries) to {}",
            source.display(),
            total,
            steps.len(),
            destination.display()
        );

        tokio::fs::create_dir_all(destination).await?;

        let mut tracker = ProgressTracker::new(progress);
        let mut buffer = vec![0u8; self.directory_buffer];
        let mut copied: u64 = 0;

        for step in steps {
            match step {
                CopyStep::Directory(relative) => {
                    tokio::fs::create_dir_all(destination.join(relative)).await?;
                }
                CopyStep::File(relative) => {
                    let mut reader = File::open(source.join(&relative)).await?;
                    let mut writer = File::create(destination.join(&relative)).await?;

                    loop {
                        let read = reader.read(&mut buffer).await?;
                        if read == 0 {
                            break;
                        }
                        writer.write_all(&buffer[..read]).await?;
                        copied += read as u64;
                        tracker.report_bytes(copied, total);
                    }

                    writer.flush().await?;
                }
            }
        }

        tracker.finish();
        Ok(())
    }

    /// Copy a single file, creating or truncating `destination`.
    ///
    /// Returns [`TransferError::Cancelled`] as soon as `cancel` is raised;
    /// the partially written destination is left in place.
    pub async fn copy_file(
        &self,
        source: &Path,
        destination: &Path,
        cancel: Option<&CancelFlag>,
    ) -> Result<()> {
        let mut reader = File::open(source).await?;
        let mut writer = File::create(destination).await?;
        let mut buffer = vec![0u8; self.file_buffer];

        loop {
            if cancel.is_some_and(CancelFlag::is_cancelled) {
                log::info!(
                    "Copy of {} to {} cancelled",
                    source.display(),
                    destination.display()
                );
                return Err(TransferError::Cancelled);
            }

            let read = reader.read(&mut buffer).await?;
            if read == 0 {
                break;
            }
            writer.write_all(&buffer[..read]).await?;
        }

        writer.flush().await?;
        Ok(())
    }
}

impl Default for CopyEngine {
    fn default() -> Self {
        Self::new()
    }
}

/// Walk `source` depth-first, listing each directory's subdirectories
/// (with their full contents) before its own files. Symlinks are resolved,
/// so the copy holds the linked content rather than the links.
fn plan_copy(source: &Path) -> Result<Vec<CopyStep>> {
    let walker = WalkDir::new(source)
        .min_depth(1)
        .follow_links(true)
        .sort_by(|a, b| b.file_type().is_dir().cmp(&a.file_type().is_dir()));

    let mut steps = Vec::new();
    for entry in walker {
        let entry = entry.map_err(std::io::Error::from)?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .unwrap_or(entry.path())
            .to_path_buf();

        let file_type = entry.file_type();
        if file_type.is_dir() {
            steps.push(CopyStep::Directory(relative));
        } else if file_type.is_file() {
            steps.push(CopyStep::File(relative));
        } else {
            log::debug!("Skipping non-regular entry {}", entry.path().display());
        }
    }

    Ok(steps)
}
