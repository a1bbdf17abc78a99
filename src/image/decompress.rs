//! Produce a plain `image.tar` next to a detected image file.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use super::detect::ImageFileType;
use crate::build::context::ToolContext;

pub const IMAGE_TAR: &str = "image.tar";

impl ImageFileType {
    /// Decompressor program for compressed types; `None` for plain tar.
    pub fn decompressor(self) -> Option<&'static str> {
        match self {
            ImageFileType::Gzip => Some("gzip"),
            ImageFileType::Xz => Some("xz"),
            ImageFileType::Tar => None,
        }
    }
}

/// Write `image.tar` beside `image_path` and return its path.
///
/// Compressed input is piped through `<tool> -dc`. Tar input gets a relative
/// symlink instead of a copy. A previous `image.tar` is replaced.
pub fn decompress_image(
    ctx: &ToolContext,
    kind: ImageFileType,
    image_path: &Path,
) -> Result<PathBuf> {
    let parent = image_path.parent().unwrap_or_else(|| Path::new("."));
    let tar_path = parent.join(IMAGE_TAR);
    if tar_path.is_symlink() || tar_path.exists() {
        fs::remove_file(&tar_path)
            .with_context(|| format!("removing stale {}", tar_path.display()))?;
    }

    match kind.decompressor() {
        Some(program) => {
            ctx.cmd(program)
                .arg("-dc")
                .arg_path(image_path)
                .error_msg(&format!("{program} failed decompressing {}", image_path.display()))
                .run_to_file(&tar_path)?;
        }
        None => {
            let target = image_path
                .file_name()
                .map(PathBuf::from)
                .unwrap_or_else(|| image_path.to_path_buf());
            std::os::unix::fs::symlink(&target, &tar_path).with_context(|| {
                format!(
                    "Failed to create symlink {} -> {}",
                    tar_path.display(),
                    target.display()
                )
            })?;
        }
    }

    Ok(tar_path)
}
