//! Unpack an image archive into a `rootfs/` tree with skopeo and umoci.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use super::inspect::{ImageArchiveKind, SKOPEO};
use crate::build::context::ToolContext;

pub const UMOCI: &str = "umoci";
pub const ROOTFS_DIR: &str = "rootfs";

/// Copy the archive into a scratch OCI layout, then unpack it beside the archive.
///
/// The scratch layout lives in a [`TempDir`] and is removed when this
/// returns, on success or failure. An existing `rootfs` is replaced.
pub fn unpack_image(
    ctx: &ToolContext,
    kind: ImageArchiveKind,
    tar_path: &Path,
) -> Result<PathBuf> {
    let parent = tar_path.parent().unwrap_or_else(|| Path::new("."));
    let rootfs = parent.join(ROOTFS_DIR);
    if rootfs.exists() {
        fs::remove_dir_all(&rootfs)
            .with_context(|| format!("removing previous {}", rootfs.display()))?;
    }

    let layout = TempDir::new().context("creating temporary OCI layout directory")?;

    ctx.cmd(SKOPEO)
        .args(["--insecure-policy", "copy"])
        .arg(kind.reference(tar_path))
        .arg(format!("oci:{}:latest", layout.path().display()))
        .error_msg(&format!("skopeo copy failed for {}", tar_path.display()))
        .run_interactive()?;

    ctx.cmd(UMOCI)
        .args(["raw", "unpack", "--image"])
        .arg_path(layout.path())
        .arg_path(&rootfs)
        .error_msg(&format!("umoci unpack failed for {}", tar_path.display()))
        .run_interactive()?;

    Ok(rootfs)
}
