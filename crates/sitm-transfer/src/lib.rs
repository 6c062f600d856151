//! Copy, download and extraction pipeline used to install mods.
//!
//! Everything is reachable through [`TransferService`]; the individual
//! components are public for callers that only need one of them.

pub mod archive;
pub mod cancel;
pub mod config;
pub mod copy;
pub mod downloader;
pub mod error;
pub mod http;
pub mod permissions;
pub mod progress;
pub mod service;
pub mod shell;
pub mod size;

pub use archive::{ArchiveEntry, ArchiveExtractor, ArchiveFormat};
pub use cancel::CancelFlag;
pub use config::{ConfigLoader, TransferConfig};
pub use copy::CopyEngine;
pub use downloader::{select_backend, BackendKind, DownloadBackend, FileDownloader};
pub use error::{Result, TransferError};
pub use progress::{percentage, ChannelSink, ProgressSink, ProgressTracker};
pub use service::TransferService;
pub use shell::{Launcher, SystemLauncher};
pub use size::{directory_size, summarize, TreeSummary};
