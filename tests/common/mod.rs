#![allow(dead_code)]

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub use durabletask_test_utils::{init_tracing, poll_until_done, trim_line_terminator};

use durabletask::fs::mock::MockFileSystem;
use durabletask::fs::FileSystem;

/// Workspace root used by tests running on the mock filesystem.
pub const MOCK_WORKSPACE: &str = "/jobs/ws";

pub fn mock_fs() -> (MockFileSystem, Arc<dyn FileSystem>) {
    let fs = MockFileSystem::new();
    let shared: Arc<dyn FileSystem> = Arc::new(fs.clone());
    (fs, shared)
}

pub fn mock_workspace() -> PathBuf {
    PathBuf::from(MOCK_WORKSPACE)
}

pub fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

/// Find `program` on `PATH`, the way a shell would.
pub fn find_on_path(program: &str) -> Option<PathBuf> {
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|candidate| candidate.is_file())
}

/// True if any path under `root` names a control directory.
pub fn has_control_dir(paths: &[PathBuf], root: &Path) -> bool {
    paths.iter().any(|p| {
        p.starts_with(root)
            && p.file_name()
                .and_then(|n| n.to_str())
                .is_some_and(|n| n.starts_with("durable-"))
    })
}
