//! Content-diffing file synchronizer
//!
//! Regenerated files are only rewritten when their text actually changed, so
//! unchanged output never bumps a modification time and never wakes up
//! incremental build machinery watching the file.

use crate::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, warn};

/// Outcome of a synchronization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WriteResult {
    /// Whether the file was created or rewritten
    pub written: bool,
}

/// Writes generated content to disk only when it differs from what is there
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentSynchronizer;

impl ContentSynchronizer {
    /// Create a synchronizer
    pub fn new() -> Self {
        Self
    }

    /// Make `target` hold `generated`.
    ///
    /// A missing file is created. An existing file is compared line by line
    /// under an exclusive lock and rewritten only when some line differs or
    /// one side has more lines. `\n`, `\r\n` and a lone `\r` all end a line.
    ///
    /// The file is rewritten in place through the locked handle, so the path
    /// keeps its inode and a syncer waiting on the lock always reads what the
    /// previous holder wrote.
    pub fn sync(&self, target: &Path, generated: &[u8]) -> Result<WriteResult> {
        if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::io(parent, e))?;
        }

        let (file, created) = open_target(target)?;
        with_lock(&file, target, |mut file| {
            if !created {
                let mut current = Vec::new();
                file.read_to_end(&mut current)
                    .map_err(|e| Error::io(target, e))?;
                if same_lines(&current, generated) {
                    debug!("{} is up to date", target.display());
                    return Ok(WriteResult { written: false });
                }
            }

            rewrite(file, generated).map_err(|e| Error::io(target, e))?;

            if created {
                debug!("Created {}", target.display());
            } else {
                debug!("Rewrote {}", target.display());
            }
            Ok(WriteResult { written: true })
        })
    }
}

/// Open `target` for read and write, creating it when missing.
///
/// The flag tells whether this call created the file.
fn open_target(target: &Path) -> Result<(File, bool)> {
    match OpenOptions::new()
        .read(true)
        .write(true)
        .create_new(true)
        .open(target)
    {
        Ok(file) => return Ok((file, true)),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
        Err(e) => return Err(Error::io(target, e)),
    }

    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .open(target)
        .map_err(|e| Error::io(target, e))?;
    Ok((file, false))
}

fn rewrite(mut file: &File, content: &[u8]) -> std::io::Result<()> {
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(content)?;
    file.sync_all()
}

/// Run `f` while holding an exclusive lock on `file`
fn with_lock<T>(file: &File, path: &Path, f: impl FnOnce(&File) -> Result<T>) -> Result<T> {
    let _lock = FileLock::acquire(file, path)?;
    f(file)
}

/// Exclusive advisory lock released when dropped
struct FileLock<'a> {
    file: &'a File,
}

impl<'a> FileLock<'a> {
    fn acquire(file: &'a File, path: &Path) -> Result<Self> {
        file.lock().map_err(|e| Error::io(path, e))?;
        Ok(Self { file })
    }
}

impl Drop for FileLock<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.file.unlock() {
            warn!("Failed to release file lock: {}", e);
        }
    }
}

fn same_lines(current: &[u8], generated: &[u8]) -> bool {
    Lines::new(current).eq(Lines::new(generated))
}

/// Raw byte lines, split like a buffered line reader splits them
struct Lines<'a> {
    rest: &'a [u8],
}

impl<'a> Lines<'a> {
    fn new(content: &'a [u8]) -> Self {
        Self { rest: content }
    }
}

impl<'a> Iterator for Lines<'a> {
    type Item = &'a [u8];

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        match self.rest.iter().position(|&b| b == b'\n' || b == b'\r') {
            Some(end) => {
                let line = &self.rest[..end];
                let skip = if self.rest[end] == b'\r' && self.rest.get(end + 1) == Some(&b'\n') {
                    2
                } else {
                    1
                };
                self.rest = &self.rest[end + skip..];
                Some(line)
            }
            None => {
                let line = self.rest;
                self.rest = &[];
                Some(line)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ErrorKind as FailureKind;

    #[test]
    fn test_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("deploy.xml");

        let result = ContentSynchronizer::new().sync(&target, b"<project/>").unwrap();

        assert!(result.written);
        assert_eq!(std::fs::read(&target).unwrap(), b"<project/>");
    }

    #[test]
    fn test_second_sync_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("deploy.xml");
        let sync = ContentSynchronizer::new();

        assert!(sync.sync(&target, b"A\nB\nC").unwrap().written);
        let modified = std::fs::metadata(&target).unwrap().modified().unwrap();

        assert!(!sync.sync(&target, b"A\nB\nC").unwrap().written);
        assert_eq!(std::fs::read(&target).unwrap(), b"A\nB\nC");
        assert_eq!(
            std::fs::metadata(&target).unwrap().modified().unwrap(),
            modified
        );
    }

    #[test]
    fn test_line_diff_semantics() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("deploy.xml");
        let sync = ContentSynchronizer::new();
        std::fs::write(&target, "A\nB\nC").unwrap();

        assert!(!sync.sync(&target, b"A\nB\nC").unwrap().written);
        assert!(sync.sync(&target, b"A\nB\nD").unwrap().written);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "A\nB\nD");

        assert!(sync.sync(&target, b"A\nB").unwrap().written);
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "A\nB");

        assert!(sync.sync(&target, b"A\nB\nC\nD").unwrap().written);
    }

    #[test]
    fn test_line_endings_are_not_content() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("deploy.xml");
        std::fs::write(&target, "A\r\nB\r\n").unwrap();

        let result = ContentSynchronizer::new().sync(&target, b"A\nB").unwrap();

        assert!(!result.written);
        assert_eq!(std::fs::read(&target).unwrap(), b"A\r\nB\r\n");
    }

    #[test]
    fn test_undecodable_content_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("deploy.xml");
        std::fs::write(&target, [0xff, 0xfe, b'A']).unwrap();

        assert!(ContentSynchronizer::new().sync(&target, b"A").unwrap().written);
        assert_eq!(std::fs::read(&target).unwrap(), b"A");
    }

    #[test]
    fn test_distinct_undecodable_bytes_are_a_change() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("deploy.xml");
        std::fs::write(&target, [0xff]).unwrap();

        assert!(ContentSynchronizer::new().sync(&target, &[0xfe]).unwrap().written);
        assert_eq!(std::fs::read(&target).unwrap(), [0xfe]);
    }

    #[test]
    fn test_lone_carriage_return_ends_a_line() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("deploy.xml");
        std::fs::write(&target, "A\rB\r").unwrap();

        assert!(!ContentSynchronizer::new().sync(&target, b"A\nB").unwrap().written);
        assert!(ContentSynchronizer::new().sync(&target, b"AB").unwrap().written);
    }

    #[test]
    fn test_unwritable_target_reports_io_failure() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let err = ContentSynchronizer::new()
            .sync(&blocker.join("deploy.xml"), b"x")
            .unwrap_err();

        assert_eq!(err.kind(), FailureKind::IoFailure);
    }

    #[test]
    fn test_lock_is_released_after_sync() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("deploy.xml");
        let sync = ContentSynchronizer::new();
        sync.sync(&target, b"one").unwrap();
        sync.sync(&target, b"two").unwrap();

        let file = File::open(&target).unwrap();
        file.try_lock().expect("lock should be free");
        file.unlock().unwrap();
    }

    #[test]
    fn test_lock_is_released_when_locked_step_fails() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("deploy.xml");
        std::fs::write(&target, "old").unwrap();
        let file = File::open(&target).unwrap();

        let result: Result<()> = with_lock(&file, &target, |_| {
            Err(Error::io(&target, std::io::Error::other("disk full")))
        });

        assert_eq!(result.unwrap_err().kind(), FailureKind::IoFailure);
        let other = File::open(&target).unwrap();
        other.try_lock().expect("lock should be free");
        other.unlock().unwrap();
    }

    #[test]
    fn test_rewrite_keeps_the_file_identity() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("deploy.xml");
        std::fs::write(&target, "old content").unwrap();
        let mut earlier = File::open(&target).unwrap();

        assert!(ContentSynchronizer::new().sync(&target, b"new").unwrap().written);

        let mut seen = String::new();
        earlier.read_to_string(&mut seen).unwrap();
        assert_eq!(seen, "new");
    }

    #[test]
    fn test_waiting_syncers_see_the_previous_write() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("deploy.xml");
        std::fs::write(&target, "old").unwrap();

        let holder = File::open(&target).unwrap();
        holder.lock().unwrap();
        let results: Vec<bool> = std::thread::scope(|scope| {
            let handles: Vec<_> = (0..4)
                .map(|_| {
                    scope.spawn(|| ContentSynchronizer::new().sync(&target, b"new").unwrap().written)
                })
                .collect();
            // Give the syncers time to open the file and queue on the lock
            std::thread::sleep(std::time::Duration::from_millis(200));
            holder.unlock().unwrap();
            handles.into_iter().map(|h| h.join().unwrap()).collect()
        });

        assert_eq!(results.iter().filter(|written| **written).count(), 1);
        assert_eq!(std::fs::read(&target).unwrap(), b"new");
    }
}
