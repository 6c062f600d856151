//! Remote file retrieval.
//!
//! This module fetches a single file from a URL, routing it either to the
//! plain HTTP backend or to the cloud mirror backend depending on the URL.

mod backend;
mod file;
mod http;
pub mod mirror;

pub use backend::{select_backend, BackendKind, DownloadBackend};
pub use file::FileDownloader;
pub use http::HttpBackend;
pub use mirror::{CloudMirrorBackend, MegaService, MirrorNode, MirrorService, MirrorSession};
