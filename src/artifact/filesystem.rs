//! Filesystem utilities for materializing build results.
//!
//! Build results usually live in a read-only store and are reached through
//! symlinks. Copies here always follow symlinks so the output directory
//! holds real content, and they replace whatever an earlier run left behind.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// Copy a single file, following symlinks, replacing any existing destination.
///
/// Store files are commonly mode 0444, so an earlier copy can't be opened
/// for writing; it is removed first instead.
pub fn copy_file_replacing(src: &Path, dst: &Path) -> Result<()> {
    if dst.is_symlink() || dst.is_file() {
        fs::remove_file(dst)
            .with_context(|| format!("Failed to remove existing {}", dst.display()))?;
    }
    fs::copy(src, dst)
        .with_context(|| format!("Failed to copy {} to {}", src.display(), dst.display()))?;
    Ok(())
}

/// Recursively copy a directory, dereferencing symlinks at every depth.
///
/// Merges into `dst` if it already exists. Directories are created with
/// default permissions so later runs can write into them again.
///
/// # Example
///
/// ```rust,ignore
/// use nix_build_task::artifact::filesystem::copy_tree_dereferenced;
/// use std::path::Path;
///
/// copy_tree_dereferenced(
///     Path::new("/nix/store/abc-site"),
///     Path::new("output/result"),
/// )?;
/// ```
pub fn copy_tree_dereferenced(src: &Path, dst: &Path) -> Result<()> {
    for entry in WalkDir::new(src).follow_links(true) {
        let entry =
            entry.with_context(|| format!("Failed to walk directory: {}", src.display()))?;
        let rel = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("{} escaped {}", entry.path().display(), src.display()))?;
        let target = dst.join(rel);

        if entry.file_type().is_dir() {
            if target.is_symlink() || target.is_file() {
                fs::remove_file(&target)?;
            }
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create directory: {}", target.display()))?;
        } else {
            copy_file_replacing(entry.path(), &target)?;
        }
    }
    Ok(())
}
