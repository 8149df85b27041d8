// src/control.rs

//! Control directory layout and the result file protocol.
//!
//! One control directory exists per launch. It lives next to the workspace
//! (`<workspace>@tmp/durable-<id>`) so it never shows up in the workspace
//! itself, and the random id keeps concurrent launches apart.
//!
//! Result file reads have three outcomes:
//! - absent: the process is still running (`Ok(None)`);
//! - present and a decimal integer: the process is done (`Ok(Some(code))`);
//! - present but anything else: [`DurableTaskError::ProtocolViolation`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::errors::{DurableTaskError, Result};
use crate::fs::FileSystem;

/// Names of the protocol files inside a control directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlFiles {
    pub log: String,
    pub output: String,
    pub result: String,
}

impl Default for ControlFiles {
    fn default() -> Self {
        Self {
            log: "log.txt".to_string(),
            output: "output.txt".to_string(),
            result: "result.txt".to_string(),
        }
    }
}

/// A control directory path plus the file names used inside it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlDir {
    path: PathBuf,
    files: ControlFiles,
}

impl ControlDir {
    pub fn new(path: impl Into<PathBuf>, files: ControlFiles) -> Self {
        Self {
            path: path.into(),
            files,
        }
    }

    /// Control directory for `workspace` and a given id.
    pub fn derive(workspace: &Path, id: &str, files: ControlFiles) -> Self {
        let tmp = match workspace.file_name() {
            Some(name) => {
                let mut sibling = name.to_os_string();
                sibling.push("@tmp");
                workspace.with_file_name(sibling)
            }
            None => workspace.join("@tmp"),
        };
        Self::new(tmp.join(format!("durable-{id}")), files)
    }

    /// Control directory for `workspace` with a fresh random id.
    pub fn generate(workspace: &Path, files: ControlFiles) -> Self {
        let id = Uuid::new_v4().simple().to_string();
        Self::derive(workspace, &id[..8], files)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn files(&self) -> &ControlFiles {
        &self.files
    }

    /// Last path component, used in the launch banner.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn child(&self, name: &str) -> PathBuf {
        self.path.join(name)
    }

    pub fn log_file(&self) -> PathBuf {
        self.child(&self.files.log)
    }

    pub fn output_file(&self) -> PathBuf {
        self.child(&self.files.output)
    }

    pub fn result_file(&self) -> PathBuf {
        self.child(&self.files.result)
    }

    fn result_temp_file(&self) -> PathBuf {
        self.child(&format!("{}.tmp", self.files.result))
    }

    /// Single probe of the result file.
    pub fn read_result(&self, fs: &dyn FileSystem) -> Result<Option<i32>> {
        let path = self.result_file();
        match fs.read_if_exists(&path)? {
            None => Ok(None),
            Some(bytes) => parse_result(&path, &bytes).map(Some),
        }
    }

    /// Record the exit code. Written to a temporary name first and renamed
    /// into place, so readers see either nothing or the whole value.
    pub fn write_result(&self, fs: &dyn FileSystem, code: i32) -> Result<()> {
        let tmp = self.result_temp_file();
        fs.write(&tmp, code.to_string().as_bytes())?;
        fs.rename(&tmp, &self.result_file())?;
        debug!(control_dir = %self.path.display(), exit_code = code, "result file written");
        Ok(())
    }
}

fn parse_result(path: &Path, bytes: &[u8]) -> Result<i32> {
    let violation = || DurableTaskError::ProtocolViolation {
        path: path.to_path_buf(),
        content: String::from_utf8_lossy(bytes).into_owned(),
    };

    std::str::from_utf8(bytes)
        .map_err(|_| violation())?
        .trim()
        .parse::<i32>()
        .map_err(|_| violation())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    fn dir() -> ControlDir {
        ControlDir::derive(Path::new("/jobs/ws"), "cafe0001", ControlFiles::default())
    }

    #[test]
    fn derived_path_is_a_workspace_sibling() {
        let dir = dir();
        assert_eq!(dir.path(), Path::new("/jobs/ws@tmp/durable-cafe0001"));
        assert_eq!(dir.name(), "durable-cafe0001");
        assert_eq!(dir.log_file(), Path::new("/jobs/ws@tmp/durable-cafe0001/log.txt"));
    }

    #[test]
    fn generated_ids_differ() {
        let a = ControlDir::generate(Path::new("/ws"), ControlFiles::default());
        let b = ControlDir::generate(Path::new("/ws"), ControlFiles::default());
        assert_ne!(a.path(), b.path());
        assert!(a.name().starts_with("durable-"));
        assert_eq!(a.name().len(), "durable-".len() + 8);
    }

    #[test]
    fn absent_result_means_running() {
        let fs = MockFileSystem::new();
        assert_eq!(dir().read_result(&fs).unwrap(), None);
    }

    #[test]
    fn written_result_is_read_back_and_temp_file_is_gone() {
        let fs = MockFileSystem::new();
        let dir = dir();
        fs.create_dir_all(dir.path()).unwrap();
        dir.write_result(&fs, -3).unwrap();

        assert_eq!(dir.read_result(&fs).unwrap(), Some(-3));
        assert!(!fs.exists(&dir.child("result.txt.tmp")));
    }

    #[test]
    fn result_is_not_written_into_a_removed_directory() {
        let fs = MockFileSystem::new();
        let dir = dir();
        assert!(dir.write_result(&fs, 0).is_err());
        assert!(!fs.exists(dir.path()));
    }

    #[test]
    fn trailing_newline_is_accepted() {
        let fs = MockFileSystem::new();
        let dir = dir();
        fs.add_file(dir.result_file(), "42\r\n");
        assert_eq!(dir.read_result(&fs).unwrap(), Some(42));
    }

    #[test]
    fn garbage_result_is_a_protocol_violation() {
        let fs = MockFileSystem::new();
        let dir = dir();
        fs.add_file(dir.result_file(), "done");

        match dir.read_result(&fs) {
            Err(DurableTaskError::ProtocolViolation { content, .. }) => assert_eq!(content, "done"),
            other => panic!("expected ProtocolViolation, got {other:?}"),
        }
    }

    #[test]
    fn empty_result_is_a_protocol_violation() {
        let fs = MockFileSystem::new();
        let dir = dir();
        fs.add_file(dir.result_file(), "");
        assert!(matches!(
            dir.read_result(&fs),
            Err(DurableTaskError::ProtocolViolation { .. })
        ));
    }
}
