//! Preflight checks for the external tools a run will need.
//!
//! Everything this task does is delegated to external programs. Checking
//! them up front turns a missing `umoci` into one clear message before the
//! first (possibly hour-long) build, instead of a spawn error after it.
//!
//! # Example
//!
//! ```rust,ignore
//! use nix_build_task::preflight::{check_required_tools, required_tools};
//!
//! check_required_tools(&required_tools(&config, RunMode::Build))?;
//! ```

use anyhow::{bail, Result};

use crate::build::{RunMode, NIX_BUILD, NIX_INSTANTIATE};
use crate::cachix::CACHIX;
use crate::config::{ImagePrepareMode, NarExportMode, TaskConfig};
use crate::image::inspect::SKOPEO;
use crate::image::unpack::UMOCI;
use crate::materialize::NIX_STORE;
use crate::process;

/// (command_name, package_name) pairs needed for `config` in `mode`.
pub fn required_tools(config: &TaskConfig, mode: RunMode) -> Vec<(&'static str, &'static str)> {
    let mut tools = Vec::new();
    match mode {
        RunMode::Build => tools.push((NIX_BUILD, "nix")),
        RunMode::EvalOutpaths => {
            tools.push((NIX_INSTANTIATE, "nix"));
            tools.push((NIX_STORE, "nix"));
        }
    }
    if mode == RunMode::EvalOutpaths {
        return tools;
    }

    // gzip/xz are only needed for compressed images, known after the build
    let image_mode = config.deepest_image_mode();
    if image_mode != ImagePrepareMode::Off {
        tools.push((SKOPEO, "skopeo"));
    }
    if image_mode == ImagePrepareMode::Unpack {
        tools.push((UMOCI, "umoci"));
    }
    if config
        .targets
        .iter()
        .any(|t| t.export_nar != NarExportMode::Off)
    {
        tools.push((NIX_STORE, "nix"));
    }
    if config.cachix.is_some() {
        tools.push((CACHIX, "cachix"));
    }
    tools.dedup();
    tools
}

/// Check that specific tools are available.
///
/// # Returns
///
/// * `Ok(())` if all tools are found
/// * `Err` with list of missing tools and their packages
pub fn check_required_tools(tools: &[(&str, &str)]) -> Result<()> {
    let missing: Vec<String> = tools
        .iter()
        .filter(|(tool, _)| !process::exists(tool))
        .map(|(tool, package)| format!("  {} (install: {})", tool, package))
        .collect();

    if !missing.is_empty() {
        bail!("Missing required host tools:\n{}", missing.join("\n"));
    }
    Ok(())
}
