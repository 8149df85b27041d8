// src/fs/mod.rs

//! Filesystem seam for the control directory protocol.
//!
//! Every read and write the controller or the launcher performs on the
//! control directory goes through [`FileSystem`], so the same protocol can
//! run against a local disk, a remote agent's disk, or an in-memory mock.

use std::fmt::Debug;
use std::fs;
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::Path;

use anyhow::{Context, Result};

pub mod mock;

/// Abstract filesystem interface.
pub trait FileSystem: Send + Sync + Debug {
    /// Read a whole file. `Ok(None)` means the file does not exist, which is
    /// different from an empty file.
    fn read_if_exists(&self, path: &Path) -> Result<Option<Vec<u8>>>;

    /// Read up to `limit` bytes starting at `offset`.
    ///
    /// Never blocks for more data: a short buffer means the current end of
    /// the file was reached. A missing file, or an offset at or past the
    /// end, yields an empty buffer.
    fn read_from(&self, path: &Path, offset: u64, limit: usize) -> Result<Vec<u8>>;

    /// Create or truncate `path` and write `contents`.
    ///
    /// The parent directory must already exist; a control directory removed
    /// by cleanup is never brought back by a late write.
    fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// Open `path` for appending, creating it if needed.
    fn open_append(&self, path: &Path) -> Result<Box<dyn Write + Send>>;

    fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Atomically replace `to` with `from`.
    fn rename(&self, from: &Path, to: &Path) -> Result<()>;

    /// Recursively delete `path`. Deleting something already gone succeeds.
    fn remove_dir_all(&self, path: &Path) -> Result<()>;

    fn exists(&self, path: &Path) -> bool;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealFileSystem;

impl FileSystem for RealFileSystem {
    fn read_if_exists(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match fs::read(path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("reading file {:?}", path)),
        }
    }

    fn read_from(&self, path: &Path, offset: u64, limit: usize) -> Result<Vec<u8>> {
        let mut file = match fs::File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e).with_context(|| format!("opening file {:?}", path)),
        };

        // The writer may still be appending; whatever is there now is what we
        // return, so no length is assumed up front.
        file.seek(SeekFrom::Start(offset))
            .with_context(|| format!("seeking to {offset} in {:?}", path))?;
        let mut buf = Vec::new();
        file.take(limit as u64)
            .read_to_end(&mut buf)
            .with_context(|| format!("reading file {:?}", path))?;
        Ok(buf)
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let mut file = fs::File::create(path).with_context(|| format!("creating file {:?}", path))?;
        file.write_all(contents).with_context(|| format!("writing to file {:?}", path))?;
        Ok(())
    }

    fn open_append(&self, path: &Path) -> Result<Box<dyn Write + Send>> {
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("opening {:?} for append", path))?;
        Ok(Box::new(file))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path).with_context(|| format!("creating dir {:?}", path))
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        fs::rename(from, to).with_context(|| format!("renaming {:?} to {:?}", from, to))
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        match fs::remove_dir_all(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing dir {:?}", path)),
        }
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_from_tolerates_missing_and_short_files() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFileSystem;
        let path = dir.path().join("log.txt");

        assert!(fs.read_from(&path, 0, 16).unwrap().is_empty());

        fs.write(&path, b"abcdef").unwrap();
        assert_eq!(fs.read_from(&path, 2, 16).unwrap(), b"cdef");
        assert_eq!(fs.read_from(&path, 1, 3).unwrap(), b"bcd");
        assert!(fs.read_from(&path, 100, 16).unwrap().is_empty());
    }

    #[test]
    fn append_keeps_existing_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFileSystem;
        let path = dir.path().join("log.txt");

        fs.open_append(&path).unwrap().write_all(b"one ").unwrap();
        fs.open_append(&path).unwrap().write_all(b"two").unwrap();

        assert_eq!(fs.read_if_exists(&path).unwrap().unwrap(), b"one two");
    }

    #[test]
    fn write_does_not_recreate_removed_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFileSystem;
        let gone = dir.path().join("gone/result.txt");

        assert!(fs.write(&gone, b"0").is_err());
        assert!(!fs.exists(&dir.path().join("gone")));
    }

    #[test]
    fn remove_dir_all_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let fs = RealFileSystem;
        let target = dir.path().join("a/b");
        fs.create_dir_all(&target).unwrap();

        fs.remove_dir_all(&dir.path().join("a")).unwrap();
        fs.remove_dir_all(&dir.path().join("a")).unwrap();
        assert!(!fs.exists(&target));
    }
}
