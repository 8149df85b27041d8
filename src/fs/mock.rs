// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::{HashMap, HashSet};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File(Vec<u8>),
    Dir(Vec<String>), // List of child names
}

type Entries = Arc<Mutex<HashMap<PathBuf, MockEntry>>>;

/// In-memory filesystem shared between clones.
///
/// Writers returned by `open_append` write straight into the
/// shared map, so a controller reading through another clone sees bytes as
/// soon as they are written.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Entries,
    failing_writes: Arc<Mutex<HashSet<PathBuf>>>,
    fail_removals: Arc<Mutex<bool>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut files = HashMap::new();
        // Ensure root exists
        files.insert(PathBuf::from("/"), MockEntry::Dir(Vec::new()));

        Self {
            files: Arc::new(Mutex::new(files)),
            ..Default::default()
        }
    }

    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let mut files = self.files.lock().unwrap();
        insert_file(&mut files, path.as_ref(), content.into());
    }

    /// Make every later write through a writer for `path` fail.
    pub fn fail_writes_to(&self, path: impl AsRef<Path>) {
        self.failing_writes
            .lock()
            .unwrap()
            .insert(path.as_ref().to_path_buf());
    }

    /// Make `remove_dir_all` fail, as a locked file on Windows would.
    pub fn fail_removals(&self, fail: bool) {
        *self.fail_removals.lock().unwrap() = fail;
    }

    /// Paths currently present, sorted. Handy for assertions.
    pub fn paths(&self) -> Vec<PathBuf> {
        let files = self.files.lock().unwrap();
        let mut paths: Vec<PathBuf> = files.keys().cloned().collect();
        paths.sort();
        paths
    }

    fn writer(&self, path: &Path) -> MockWriter {
        MockWriter {
            files: Arc::clone(&self.files),
            failing: Arc::clone(&self.failing_writes),
            path: path.to_path_buf(),
        }
    }
}

fn insert_file(files: &mut HashMap<PathBuf, MockEntry>, path: &Path, content: Vec<u8>) {
    files.insert(path.to_path_buf(), MockEntry::File(content));
    if let Some(parent) = path.parent() {
        ensure_dir_entry(files, parent);
        link_child(files, parent, path);
    }
}

fn ensure_dir_entry(files: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    if files.contains_key(path) {
        return;
    }
    files.insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
    if let Some(parent) = path.parent() {
        if parent != path {
            ensure_dir_entry(files, parent);
            link_child(files, parent, path);
        }
    }
}

fn require_parent(files: &HashMap<PathBuf, MockEntry>, path: &Path) -> Result<()> {
    match path.parent() {
        Some(parent) if !matches!(files.get(parent), Some(MockEntry::Dir(_))) => {
            Err(anyhow!("Parent directory not found: {:?}", parent))
        }
        _ => Ok(()),
    }
}

fn link_child(files: &mut HashMap<PathBuf, MockEntry>, parent: &Path, child: &Path) {
    if let Some(MockEntry::Dir(children)) = files.get_mut(parent) {
        if let Some(name) = child.file_name().and_then(|n| n.to_str()) {
            if !children.iter().any(|c| c == name) {
                children.push(name.to_string());
            }
        }
    }
}

fn unlink_child(files: &mut HashMap<PathBuf, MockEntry>, child: &Path) {
    let (Some(parent), Some(name)) = (child.parent(), child.file_name().and_then(|n| n.to_str()))
    else {
        return;
    };
    if let Some(MockEntry::Dir(children)) = files.get_mut(parent) {
        children.retain(|c| c != name);
    }
}

impl FileSystem for MockFileSystem {
    fn read_if_exists(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        let files = self.files.lock().unwrap();
        match files.get(path) {
            Some(MockEntry::File(content)) => Ok(Some(content.clone())),
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Ok(None),
        }
    }

    fn read_from(&self, path: &Path, offset: u64, limit: usize) -> Result<Vec<u8>> {
        let files = self.files.lock().unwrap();
        match files.get(path) {
            Some(MockEntry::File(content)) => {
                let start = usize::try_from(offset).unwrap_or(usize::MAX).min(content.len());
                let end = start.saturating_add(limit).min(content.len());
                Ok(content[start..end].to_vec())
            }
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Ok(Vec::new()),
        }
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        let mut files = self.files.lock().unwrap();
        require_parent(&files, path)?;
        insert_file(&mut files, path, contents.to_vec());
        Ok(())
    }

    fn open_append(&self, path: &Path) -> Result<Box<dyn Write + Send>> {
        {
            let mut files = self.files.lock().unwrap();
            require_parent(&files, path)?;
            if !files.contains_key(path) {
                insert_file(&mut files, path, Vec::new());
            }
        }
        Ok(Box::new(self.writer(path)))
    }

    fn create_dir_all(&self, path: &Path) -> Result<()> {
        let mut files = self.files.lock().unwrap();
        ensure_dir_entry(&mut files, path);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut files = self.files.lock().unwrap();
        match files.remove(from) {
            Some(MockEntry::File(content)) => {
                unlink_child(&mut files, from);
                insert_file(&mut files, to, content);
                Ok(())
            }
            Some(dir) => {
                files.insert(from.to_path_buf(), dir);
                Err(anyhow!("Renaming directories is not supported: {:?}", from))
            }
            None => Err(anyhow!("File not found: {:?}", from)),
        }
    }

    fn remove_dir_all(&self, path: &Path) -> Result<()> {
        if *self.fail_removals.lock().unwrap() {
            return Err(anyhow!("Permission denied: {:?}", path));
        }
        let mut files = self.files.lock().unwrap();
        files.retain(|p, _| !p.starts_with(path));
        unlink_child(&mut files, path);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        let files = self.files.lock().unwrap();
        files.contains_key(path)
    }
}

/// Appending writer into a [`MockFileSystem`] entry.
struct MockWriter {
    files: Entries,
    failing: Arc<Mutex<HashSet<PathBuf>>>,
    path: PathBuf,
}

impl Write for MockWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.failing.lock().unwrap().contains(&self.path) {
            return Err(io::Error::other(format!("injected failure for {:?}", self.path)));
        }
        let mut files = self.files.lock().unwrap();
        match files.get_mut(&self.path) {
            Some(MockEntry::File(content)) => {
                content.extend_from_slice(buf);
                Ok(buf.len())
            }
            _ => Err(io::Error::new(
                io::ErrorKind::NotFound,
                format!("file removed: {:?}", self.path),
            )),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writers_share_the_backing_map() {
        let fs = MockFileSystem::new();
        let path = Path::new("/ws/log.txt");
        fs.create_dir_all(Path::new("/ws")).unwrap();
        let mut a = fs.open_append(path).unwrap();
        let mut b = fs.clone().open_append(path).unwrap();

        a.write_all(b"left ").unwrap();
        b.write_all(b"right").unwrap();

        assert_eq!(fs.read_if_exists(path).unwrap().unwrap(), b"left right");
        assert!(fs.exists(Path::new("/ws")));
    }

    #[test]
    fn write_needs_an_existing_parent() {
        let fs = MockFileSystem::new();
        assert!(fs.write(Path::new("/missing/result.txt"), b"0").is_err());
        assert!(!fs.exists(Path::new("/missing")));
    }

    #[test]
    fn rename_moves_and_remove_clears_subtree() {
        let fs = MockFileSystem::new();
        fs.add_file("/ws/ctl/result.tmp", "3");
        fs.rename(Path::new("/ws/ctl/result.tmp"), Path::new("/ws/ctl/result.txt"))
            .unwrap();

        assert!(!fs.exists(Path::new("/ws/ctl/result.tmp")));
        assert_eq!(fs.read_if_exists(Path::new("/ws/ctl/result.txt")).unwrap().unwrap(), b"3");

        fs.remove_dir_all(Path::new("/ws/ctl")).unwrap();
        assert!(!fs.exists(Path::new("/ws/ctl/result.txt")));
        assert!(fs.exists(Path::new("/ws")));
    }
}
