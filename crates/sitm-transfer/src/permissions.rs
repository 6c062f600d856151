use std::path::Path;

use crate::Result;

/// Mode given to files marked executable
#[cfg(unix)]
pub const EXECUTABLE_MODE: u32 = 0o755;

/// Mark `path` as executable.
///
/// On Unix the mode becomes 0o755. Other platforms have no executable bit,
/// so this succeeds without touching the file.
#[cfg(unix)]
pub async fn set_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let perms = std::fs::Permissions::from_mode(EXECUTABLE_MODE);
    tokio::fs::set_permissions(path, perms)
        .await
        .inspect_err(|e| log::error!("Cannot set executable bit on {}: {}", path.display(), e))?;

    log::debug!("Marked {} as executable", path.display());
    Ok(())
}

#[cfg(not(unix))]
pub async fn set_executable(path: &Path) -> Result<()> {
    log::trace!("No executable bit to set for {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[cfg(unix)]
    #[tokio::test]
    async fn test_sets_mode() {
        use std::os::unix::fs::PermissionsExt;

        let temp = TempDir::new().unwrap();
        let script = temp.path().join("run.sh");
        std::fs::write(&script, "#!/bin/sh\n").unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o600)).unwrap();

        set_executable(&script).await.unwrap();

        let mode = std::fs::metadata(&script).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o755);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_missing_file_fails() {
        let temp = TempDir::new().unwrap();
        assert!(set_executable(&temp.path().join("nope")).await.is_err());
    }

    #[cfg(not(unix))]
    #[tokio::test]
    async fn test_noop_elsewhere() {
        let temp = TempDir::new().unwrap();
        set_executable(&temp.path().join("nope")).await.unwrap();
    }
}
