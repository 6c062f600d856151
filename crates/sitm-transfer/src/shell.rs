//! Hand-off of paths to the operating system's default handler.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::Result;

/// Opens a path with whatever the desktop associates with it
#[async_trait]
pub trait Launcher: Send + Sync {
    async fn launch(&self, path: &Path) -> Result<()>;
}

/// Launcher backed by the `open` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemLauncher;

#[async_trait]
impl Launcher for SystemLauncher {
    async fn launch(&self, path: &Path) -> Result<()> {
        let path = path.to_path_buf();
        tokio::task::spawn_blocking(move || open::that(&path)).await??;
        Ok(())
    }
}

/// Open a directory in the file manager. Absent paths are ignored.
pub async fn open_directory(launcher: &dyn Launcher, path: &Path) -> Result<()> {
    match resolve(path).await? {
        Some(dir) if dir.is_dir() => hand_off(launcher, &dir).await,
        Some(other) => {
            log::debug!("{} is not a directory, not opening it", other.display());
            Ok(())
        }
        None => Ok(()),
    }
}

/// Open a file with its default application. Absent paths are ignored.
pub async fn open_file(launcher: &dyn Launcher, path: &Path) -> Result<()> {
    match resolve(path).await? {
        Some(file) if file.is_file() => hand_off(launcher, &file).await,
        Some(other) => {
            log::debug!("{} is not a file, not opening it", other.display());
            Ok(())
        }
        None => Ok(()),
    }
}

/// Absolute form of `path`, or `None` when nothing exists there
async fn resolve(path: &Path) -> Result<Option<PathBuf>> {
    match tokio::fs::canonicalize(path).await {
        Ok(absolute) => Ok(Some(absolute)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::debug!("{} does not exist, nothing to open", path.display());
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

async fn hand_off(launcher: &dyn Launcher, path: &Path) -> Result<()> {
    log::info!("Opening {}", path.display());
    launcher
        .launch(path)
        .await
        .inspect_err(|e| log::error!("Cannot open {}: {}", path.display(), e))
}
