//! Archive extraction (zip, tar, tar.gz, tar.bz2, tar.xz).
//!
//! The format is detected from the file's leading bytes, not its name.
//! Extraction runs on the blocking pool; each completed entry is sent back
//! over a channel and turned into progress on the async side.

use std::cell::Cell;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR, MAIN_SEPARATOR_STR};
use std::rc::Rc;

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use tokio::sync::mpsc::{unbounded_channel, UnboundedSender};
use xz2::read::XzDecoder;

use crate::progress::{ProgressSink, ProgressTracker};
use crate::{Result, TransferError};

/// Supported archive formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Zip,
    Tar,
    TarGz,
    TarBz2,
    TarXz,
}

impl ArchiveFormat {
    /// Detect the format from the first bytes of a file (up to 512)
    pub fn detect(header: &[u8]) -> Option<Self> {
        if header.starts_with(b"PK\x03\x04")
            || header.starts_with(b"PK\x05\x06")
            || header.starts_with(b"PK\x07\x08")
        {
            Some(ArchiveFormat::Zip)
        } else if header.starts_with(&[0x1f, 0x8b]) {
            Some(ArchiveFormat::TarGz)
        } else if header.starts_with(b"BZh") {
            Some(ArchiveFormat::TarBz2)
        } else if header.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            Some(ArchiveFormat::TarXz)
        } else if header.get(257..262) == Some(b"ustar".as_slice()) {
            Some(ArchiveFormat::Tar)
        } else {
            None
        }
    }

    /// Read the header of `path` and detect its format
    pub fn sniff(path: &Path) -> Result<Option<Self>> {
        let mut header = Vec::with_capacity(512);
        File::open(path)?.take(512).read_to_end(&mut header)?;
        Ok(Self::detect(&header))
    }
}

/// An archive member as it is extracted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveEntry {
    /// Path as stored in the archive
    pub path: String,
    pub compressed_size: u64,
    /// Set once the entry's bytes are fully on disk
    pub completed: bool,
}

/// Make sure `dest` ends with the platform directory separator.
pub fn normalize_destination(dest: &Path) -> PathBuf {
    let mut normalized = dest.as_os_str().to_os_string();
    if !normalized.to_string_lossy().ends_with(MAIN_SEPARATOR) {
        normalized.push(MAIN_SEPARATOR_STR);
    }
    PathBuf::from(normalized)
}

/// Relative path of an entry below the destination.
///
/// Absolute paths, drive prefixes and `..` components are rejected rather
/// than clamped.
fn contained_path(name: &str, path: &Path) -> Result<PathBuf> {
    let mut clean = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return Err(TransferError::PathEscape {
                    entry: name.to_string(),
                })
            }
        }
    }
    Ok(clean)
}

/// Archive extractor
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    /// Extract every entry of `archive_path` into `dest_dir`, overwriting
    /// existing files.
    ///
    /// Progress is the compressed size of completed entries over the archive
    /// length, followed by a final 100. Errors are logged and returned.
    pub async fn extract(
        archive_path: &Path,
        dest_dir: &Path,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<()> {
        Self::run(archive_path, dest_dir, progress)
            .await
            .inspect_err(|e| {
                log::error!(
                    "Error when extracting archive {}: {}",
                    archive_path.display(),
                    e
                )
            })
    }

    async fn run(
        archive_path: &Path,
        dest_dir: &Path,
        progress: Option<&dyn ProgressSink>,
    ) -> Result<()> {
        let dest = normalize_destination(dest_dir);
        tokio::fs::create_dir_all(&dest).await?;

        let total = tokio::fs::metadata(archive_path).await?.len();
        let (tx, mut rx) = unbounded_channel::<ArchiveEntry>();

        let archive = archive_path.to_path_buf();
        let target = dest.clone();
        let task =
            tokio::task::spawn_blocking(move || Self::extract_blocking(&archive, &target, &tx));

        let mut tracker = ProgressTracker::new(progress);
        let mut completed: u64 = 0;
        while let Some(entry) = rx.recv().await {
            if entry.completed {
                completed += entry.compressed_size;
                tracker.report_bytes(completed, total);
            }
            log::trace!("Extracted {} ({} bytes compressed)", entry.path, entry.compressed_size);
        }

        let count = task.await??;
        log::debug!(
            "Extracted {} entries from {} to {}",
            count,
            archive_path.display(),
            dest.display()
        );

        tracker.finish();
        Ok(())
    }

    /// Synchronous extraction; sends one event per completed entry
    pub fn extract_blocking(
        archive_path: &Path,
        dest: &Path,
        events: &UnboundedSender<ArchiveEntry>,
    ) -> Result<usize> {
        let format = ArchiveFormat::sniff(archive_path)?.ok_or_else(|| {
            TransferError::UnsupportedArchive {
                path: archive_path.to_path_buf(),
            }
        })?;
        log::debug!("Detected {:?} archive at {}", format, archive_path.display());

        if format == ArchiveFormat::Zip {
            return Self::extract_zip(archive_path, dest, events);
        }

        let consumed = Rc::new(Cell::new(0u64));
        let reader = CountingReader {
            inner: BufReader::new(File::open(archive_path)?),
            count: Rc::clone(&consumed),
        };

        match format {
            ArchiveFormat::Tar => Self::extract_tar(reader, &consumed, dest, events),
            ArchiveFormat::TarGz => {
                Self::extract_tar(GzDecoder::new(reader), &consumed, dest, events)
            }
            ArchiveFormat::TarBz2 => {
                Self::extract_tar(BzDecoder::new(reader), &consumed, dest, events)
            }
            ArchiveFormat::TarXz => {
                Self::extract_tar(XzDecoder::new(reader), &consumed, dest, events)
            }
            ArchiveFormat::Zip => unreachable!("zip handled above"),
        }
    }

    fn extract_zip(
        archive_path: &Path,
        dest: &Path,
        events: &UnboundedSender<ArchiveEntry>,
    ) -> Result<usize> {
        let file = File::open(archive_path)?;
        let mut archive = zip::ZipArchive::new(BufReader::new(file))?;
        let mut count = 0;

        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let name = entry.name().to_string();

            // Archives written on Windows may use backslashes
            let relative = contained_path(&name, Path::new(&name.replace('\\', "/")))?;
            if relative.as_os_str().is_empty() {
                continue;
            }

            let outpath = dest.join(&relative);
            if entry.is_dir() {
                std::fs::create_dir_all(&outpath)?;
            } else {
                if let Some(parent) = outpath.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let mut outfile = File::create(&outpath)?;
                std::io::copy(&mut entry, &mut outfile)?;

                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    // Owner keeps write access so a later extraction can overwrite
                    if let Some(mode) = entry.unix_mode() {
                        let mode = mode | 0o200;
                        std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode))?;
                    }
                }
            }

            count += 1;
            let _ = events.send(ArchiveEntry {
                path: name,
                compressed_size: entry.compressed_size(),
                completed: true,
            });
        }

        Ok(count)
    }

    fn extract_tar<R: Read>(
        reader: R,
        consumed: &Cell<u64>,
        dest: &Path,
        events: &UnboundedSender<ArchiveEntry>,
    ) -> Result<usize> {
        let mut archive = tar::Archive::new(reader);
        archive.set_overwrite(true);

        let mut count = 0;
        let mut accounted: u64 = 0;

        for entry in archive.entries()? {
            let mut entry = entry?;
            let path = entry.path()?.into_owned();
            let name = path.to_string_lossy().into_owned();

            let relative = contained_path(&name, &path)?;
            if relative.as_os_str().is_empty() {
                continue;
            }

            // unpack_in also refuses to write through symlinks leading outside `dest`
            if !entry.unpack_in(dest)? {
                return Err(TransferError::PathEscape { entry: name });
            }

            let position = consumed.get();
            count += 1;
            let _ = events.send(ArchiveEntry {
                path: name,
                compressed_size: position.saturating_sub(accounted),
                completed: true,
            });
            accounted = position;
        }

        Ok(count)
    }
}

/// Counts bytes pulled from the underlying archive file
struct CountingReader<R> {
    inner: R,
    count: Rc<Cell<u64>>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let read = self.inner.read(buf)?;
        self.count.set(self.count.get() + read as u64);
        Ok(read)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detect_formats() {
        assert_eq!(ArchiveFormat::detect(b"PK\x03\x04rest"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::detect(b"PK\x05\x06"), Some(ArchiveFormat::Zip));
        assert_eq!(ArchiveFormat::detect(&[0x1f, 0x8b, 8, 0]), Some(ArchiveFormat::TarGz));
        assert_eq!(ArchiveFormat::detect(b"BZh91AY"), Some(ArchiveFormat::TarBz2));
        assert_eq!(
            ArchiveFormat::detect(&[0xfd, b'7', b'z', b'X', b'Z', 0x00, 0]),
            Some(ArchiveFormat::TarXz)
        );
        assert_eq!(ArchiveFormat::detect(b"plain text"), None);
        assert_eq!(ArchiveFormat::detect(b""), None);
    }

    #[test]
    fn test_detect_tar() {
        let mut header = vec![0u8; 512];
        header[257..262].copy_from_slice(b"ustar");
        assert_eq!(ArchiveFormat::detect(&header), Some(ArchiveFormat::Tar));
    }

    #[test]
    fn test_normalize_destination() {
        let sep = MAIN_SEPARATOR_STR;
        let normalized = normalize_destination(Path::new("out"));
        assert_eq!(normalized.as_os_str().to_string_lossy(), format!("out{}", sep));

        let already = format!("out{}", sep);
        assert_eq!(
            normalize_destination(Path::new(&already)).as_os_str().to_string_lossy(),
            already
        );
    }

    #[test]
    fn test_contained_path() {
        assert_eq!(
            contained_path("a/./b.txt", Path::new("a/./b.txt")).unwrap(),
            PathBuf::from("a/b.txt")
        );
        assert!(matches!(
            contained_path("../evil", Path::new("../evil")),
            Err(TransferError::PathEscape { .. })
        ));
        assert!(matches!(
            contained_path("a/../../evil", Path::new("a/../../evil")),
            Err(TransferError::PathEscape { .. })
        ));
        assert!(matches!(
            contained_path("/etc/passwd", Path::new("/etc/passwd")),
            Err(TransferError::PathEscape { .. })
        ));
        assert_eq!(contained_path("./", Path::new("./")).unwrap(), PathBuf::new());
    }

    #[test]
    fn test_counting_reader() {
        let count = Rc::new(Cell::new(0));
        let mut reader = CountingReader {
            inner: &b"hello world"[..],
            count: Rc::clone(&count),
        };
        let mut out = Vec::new();
        reader.read_to_end(&mut out).unwrap();
        assert_eq!(count.get(), 11);
    }

    #[test]
    fn test_sniff_unknown_file() {
        let temp = tempfile::TempDir::new().unwrap();
        let path = temp.path().join("notes.txt");
        std::fs::write(&path, b"just text").unwrap();
        assert_eq!(ArchiveFormat::sniff(&path).unwrap(), None);
    }
}
