use std::path::PathBuf;

use thiserror::Error;

use crate::http::HttpError;

#[derive(Error, Debug)]
pub enum TransferError {
    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Network errors
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] HttpError),

    // Cloud mirror errors
    #[error("Cloud mirror login failed: {0}")]
    MirrorLogin(String),

    #[error("Cloud mirror error: {0}")]
    Mirror(String),

    #[error("Invalid link: {0}")]
    InvalidLink(String),

    // Archive errors
    #[error("Unsupported archive format: {}", path.display())]
    UnsupportedArchive { path: PathBuf },

    #[error("Zip error: {0}")]
    Zip(#[from] zip::result::ZipError),

    #[error("Archive entry {entry} escapes the destination directory")]
    PathEscape { entry: String },

    // Copy errors
    #[error("Operation cancelled")]
    Cancelled,

    #[error("Not a directory: {}", path.display())]
    NotADirectory { path: PathBuf },

    // Config errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Background task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

pub type Result<T> = std::result::Result<T, TransferError>;
