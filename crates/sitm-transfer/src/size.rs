//! Directory size accounting.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::{Result, TransferError};

/// Total size in bytes of every regular file below `dir`.
///
/// The walk is driven by `walkdir`'s own work list, so depth does not grow
/// the call stack. Symlinks count as their targets; a dangling link or a
/// link loop aborts the tally like any other unreadable entry.
pub async fn directory_size(dir: &Path) -> Result<u64> {
    let dir = dir.to_path_buf();
    tokio::task::spawn_blocking(move || tally(&dir)).await?
}

/// Blocking variant of [`directory_size`].
pub fn tally(dir: &Path) -> Result<u64> {
    if !dir.is_dir() {
        return Err(TransferError::NotADirectory {
            path: dir.to_path_buf(),
        });
    }

    let mut total: u64 = 0;
    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = entry.map_err(std::io::Error::from)?;
        if entry.file_type().is_file() {
            total += entry.metadata().map_err(std::io::Error::from)?.len();
        }
    }

    log::trace!("Size of {}: {} bytes", dir.display(), total);
    Ok(total)
}

/// Count of files and directories under a root, for status output.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TreeSummary {
    pub root: PathBuf,
    pub files: u64,
    pub directories: u64,
    pub bytes: u64,
}

/// Blocking walk that also counts entries.
pub fn summarize(dir: &Path) -> Result<TreeSummary> {
    let mut summary = TreeSummary {
        root: dir.to_path_buf(),
        ..Default::default()
    };

    for entry in WalkDir::new(dir).min_depth(1).follow_links(true) {
        let entry = entry.map_err(std::io::Error::from)?;
        let file_type = entry.file_type();
        if file_type.is_dir() {
            summary.directories += 1;
        } else if file_type.is_file() {
            summary.files += 1;
            summary.bytes += entry.metadata().map_err(std::io::Error::from)?.len();
        }
    }

    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_size_includes_subdirectories() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("a.bin"), vec![0u8; 10]).unwrap();
        std::fs::create_dir_all(temp.path().join("nested/deeper")).unwrap();
        std::fs::write(temp.path().join("nested/b.bin"), vec![0u8; 20]).unwrap();
        std::fs::write(temp.path().join("nested/deeper/c.bin"), vec![0u8; 30]).unwrap();

        assert_eq!(directory_size(temp.path()).await.unwrap(), 60);
    }

    #[tokio::test]
    async fn test_size_of_empty_tree() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("empty/also-empty")).unwrap();
        std::fs::write(temp.path().join("empty/zero.txt"), b"").unwrap();

        assert_eq!(directory_size(temp.path()).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_error() {
        let temp = TempDir::new().unwrap();
        let result = directory_size(&temp.path().join("missing")).await;
        assert!(matches!(result, Err(TransferError::NotADirectory { .. })));
    }

    #[test]
    fn test_deep_tree_does_not_recurse() {
        let temp = TempDir::new().unwrap();
        let mut path = temp.path().to_path_buf();
        for _ in 0..200 {
            path.push("d");
        }
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("leaf"), b"abc").unwrap();

        assert_eq!(tally(temp.path()).unwrap(), 3);
    }

    #[test]
    fn test_summarize() {
        let temp = TempDir::new().unwrap();
        std::fs::create_dir_all(temp.path().join("x/y")).unwrap();
        std::fs::write(temp.path().join("x/f"), b"12345").unwrap();

        let summary = summarize(temp.path()).unwrap();
        assert_eq!(summary.directories, 2);
        assert_eq!(summary.files, 1);
        assert_eq!(summary.bytes, 5);
    }
}
