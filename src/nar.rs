//! Export an output directory's store paths as a single `result.nar`.

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::build::context::ToolContext;
use crate::config::NarExportMode;
use crate::materialize::NIX_STORE;
use crate::outpath::read_outpaths;

pub const NAR_FILE: &str = "result.nar";

/// Store paths to export: the sidecar outpaths, optionally closed over their
/// runtime dependencies. Always sorted.
pub fn export_paths(
    ctx: &ToolContext,
    output_dir: &Path,
    mode: NarExportMode,
) -> Result<Vec<String>> {
    let mut outpaths = read_outpaths(output_dir, "")?;
    outpaths.sort();

    if mode == NarExportMode::RuntimeClosure && !outpaths.is_empty() {
        log::info!(
            "calculating runtime closure of results in {}",
            output_dir.display()
        );
        outpaths = ctx
            .cmd(NIX_STORE)
            .arg("-qR")
            .args(&outpaths)
            .error_msg("nix-store -qR failed")
            .run()?
            .lines();
        outpaths.sort();
        outpaths.dedup();
    }
    Ok(outpaths)
}

/// Write `result.nar` for `output_dir` according to `mode`.
pub fn export_nar(
    ctx: &ToolContext,
    output_dir: &Path,
    mode: NarExportMode,
) -> Result<Option<PathBuf>> {
    if mode == NarExportMode::Off {
        return Ok(None);
    }
    log::info!("exporting nar for {}", output_dir.display());

    let outpaths = export_paths(ctx, output_dir, mode)?;
    if outpaths.is_empty() {
        log::warn!(
            "no .outpath files in {}, exporting an empty nar",
            output_dir.display()
        );
    }

    let nar_path = output_dir.join(NAR_FILE);
    log::info!("exporting {}", nar_path.display());
    ctx.cmd(NIX_STORE)
        .arg("--export")
        .args(&outpaths)
        .error_msg(&format!("nix-store --export failed for {}", output_dir.display()))
        .run_to_file(&nar_path)?;
    Ok(Some(nar_path))
}
