//! Cloud mirror backend.
//!
//! Files hosted on the cloud mirror are fetched in three steps: an anonymous
//! session is opened, the shareable link is resolved to a remote node, and the
//! node's bytes are streamed to disk. The remote protocol sits behind the
//! [`MirrorService`] trait so the backend can run against a substitute.

mod link;
mod mega;

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;

use crate::progress::ProgressTracker;
use crate::Result;

use super::backend::{BackendKind, DownloadBackend};

pub use link::{parse_file_link, FileLink, NodeKey};
pub use mega::MegaService;

/// An established (possibly anonymous) session with the mirror
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorSession {
    pub id: String,
}

/// A remote file resolved from a shareable link
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorNode {
    pub handle: String,
    pub size: u64,
    pub key: Option<NodeKey>,
}

/// Remote operations the cloud mirror backend relies on
#[async_trait]
pub trait MirrorService: Send + Sync {
    async fn login_anonymous(&self) -> Result<MirrorSession>;

    async fn resolve_link(&self, session: &MirrorSession, link: &str) -> Result<MirrorNode>;

    async fn download_node(
        &self,
        session: &MirrorSession,
        node: &MirrorNode,
        dest: &Path,
        progress: &mut ProgressTracker<'_>,
    ) -> Result<()>;
}

pub struct CloudMirrorBackend {
    service: Arc<dyn MirrorService>,
}

impl CloudMirrorBackend {
    pub fn new(service: Arc<dyn MirrorService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl DownloadBackend for CloudMirrorBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::CloudMirror
    }

    async fn retrieve(
        &self,
        url: &str,
        dest: &Path,
        progress: &mut ProgressTracker<'_>,
    ) -> Result<()> {
        log::info!("Attempting to use cloud mirror.");

        let session = self
            .service
            .login_anonymous()
            .await
            .inspect_err(|e| log::warn!("Failed to login as anonymous to cloud mirror: {}", e))?;

        log::info!("Starting cloud mirror download from '{}'", url);

        let node = self.service.resolve_link(&session, url).await?;
        log::debug!("Resolved {} to node {} ({} bytes)", url, node.handle, node.size);

        self.service.download_node(&session, &node, dest, progress).await?;
        progress.finish();
        Ok(())
    }
}
