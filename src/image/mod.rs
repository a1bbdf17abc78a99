//! Container image preparation for an output directory.
//!
//! Given an output directory whose `result` is an image archive:
//! - [`detect`] - gzip / xz / tar by magic bytes
//! - [`decompress`] - plain `image.tar` beside `result`
//! - [`inspect`] - oci-archive vs docker-archive, then `skopeo inspect`
//! - [`unpack`] - `rootfs/` via skopeo + umoci
//!
//! # Files written
//!
//! ```text
//! output/
//!   result           (input)
//!   image.tar        decompressed copy, or symlink to result
//!   digest           image digest
//!   metadata.json    {"env": [...], "user": "..."}     (unpack only)
//!   rootfs/          unpacked root filesystem          (unpack only)
//! ```

pub mod decompress;
pub mod detect;
pub mod inspect;
pub mod unpack;

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::build::context::ToolContext;
use crate::config::ImagePrepareMode;
use crate::error::TaskError;
use crate::outpath::result_name;
use decompress::decompress_image;
use detect::detect_file_type;
use inspect::{classify_members, inspect_image, list_members, ImageMetadata};
use unpack::unpack_image;

pub const DIGEST_FILE: &str = "digest";
pub const METADATA_FILE: &str = "metadata.json";

/// Prepare the image in `output_dir/result` according to `mode`.
pub fn prepare_image(ctx: &ToolContext, output_dir: &Path, mode: ImagePrepareMode) -> Result<()> {
    if mode == ImagePrepareMode::Off {
        return Ok(());
    }
    log::info!("preparing image for {}", output_dir.display());

    let image_path = output_dir.join(result_name(0));
    let kind = detect_file_type(&image_path)?
        .ok_or_else(|| TaskError::UnknownImageFormat(output_dir.display().to_string()))?;
    let tar_path = decompress_image(ctx, kind, &image_path)?;

    let archive_kind = classify_members(&list_members(&tar_path)?)
        .ok_or_else(|| TaskError::UnknownImageFormat(output_dir.display().to_string()))?;
    log::info!(
        "image in {} appears to be '{}'",
        output_dir.display(),
        archive_kind
    );

    let metadata = inspect_image(ctx, archive_kind, &tar_path)?;
    write_digest(output_dir, &metadata)?;

    if mode == ImagePrepareMode::Unpack {
        log::info!("unpacking image for {}", output_dir.display());
        write_runtime_metadata(output_dir, &metadata)?;
        unpack_image(ctx, archive_kind, &tar_path)?;
    }
    Ok(())
}

fn write_digest(output_dir: &Path, metadata: &ImageMetadata) -> Result<()> {
    let path = output_dir.join(DIGEST_FILE);
    fs::write(&path, &metadata.digest).with_context(|| format!("writing {}", path.display()))
}

fn write_runtime_metadata(output_dir: &Path, metadata: &ImageMetadata) -> Result<()> {
    let path = output_dir.join(METADATA_FILE);
    let json = serde_json::to_vec(&metadata.runtime())?;
    fs::write(&path, json).with_context(|| format!("writing {}", path.display()))
}
