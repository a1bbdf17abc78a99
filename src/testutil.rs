//! Helpers for tests that drive stub external tools.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

use crate::build::context::ToolContext;

/// Write an executable `/bin/sh` script named `name` into `bin`.
pub fn stub_tool(bin: &Path, name: &str, body: &str) -> PathBuf {
    fs::create_dir_all(bin).unwrap();
    let path = bin.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// A context running in `work_dir` whose `PATH` searches `bin` first.
pub fn stub_context(work_dir: &Path, bin: &Path) -> ToolContext {
    let path = format!(
        "{}:{}",
        bin.display(),
        std::env::var("PATH").unwrap_or_default()
    );
    ToolContext::new(
        work_dir.to_path_buf(),
        vec![
            ("PATH".to_string(), PathBuf::from(path)),
            ("HOME".to_string(), work_dir.to_path_buf()),
        ],
    )
}
