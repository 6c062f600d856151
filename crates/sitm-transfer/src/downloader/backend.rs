//! Backend abstraction and selection.

use std::fmt;
use std::path::Path;

use async_trait::async_trait;

use crate::progress::ProgressTracker;
use crate::Result;

/// The retrieval strategies a source URL can be routed to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    Http,
    CloudMirror,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Http => "http",
            BackendKind::CloudMirror => "cloud-mirror",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pick the backend for `url`.
///
/// Any URL containing `cloud_mirror_marker` goes to the cloud mirror; every
/// other URL (and every URL when the marker is empty) goes over plain HTTP.
///
/// ```
/// use sitm_transfer::downloader::{select_backend, BackendKind};
///
/// assert_eq!(select_backend("https://mega.nz/file/abc#key", "mega.nz"), BackendKind::CloudMirror);
/// assert_eq!(select_backend("https://example.com/mod.zip", "mega.nz"), BackendKind::Http);
/// ```
pub fn select_backend(url: &str, cloud_mirror_marker: &str) -> BackendKind {
    if !cloud_mirror_marker.is_empty() && url.contains(cloud_mirror_marker) {
        BackendKind::CloudMirror
    } else {
        BackendKind::Http
    }
}

/// A way of fetching one remote file to a local path.
///
/// Implementations write to `dest` (creating it) and push progress through
/// `progress`. They keep no state between calls.
#[async_trait]
pub trait DownloadBackend: Send + Sync {
    fn kind(&self) -> BackendKind;

    async fn retrieve(
        &self,
        url: &str,
        dest: &Path,
        progress: &mut ProgressTracker<'_>,
    ) -> Result<()>;
}
