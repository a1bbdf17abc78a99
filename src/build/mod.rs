//! The per-attr build loop.
//!
//! For every [`TargetSpec`] the build tool is run once, each non-blank line
//! of its stdout is handed to the mode's [`ResultHandler`], and then the
//! post-output hooks run against the target's output directory.
//!
//! - [`context`] - working directory and environment for spawned tools
//! - [`output`] - output directory lookup

pub mod context;
pub mod output;

use anyhow::{Context, Result};
use std::path::Path;

use crate::cachix::{push_outputs, CachixConfig, CachixPushMode};
use crate::config::{TargetSpec, TaskConfig};
use crate::image::prepare_image;
use crate::materialize::{CopyResult, ResolveOutpath, ResultHandler};
use crate::nar::export_nar;
use crate::process::Cmd;
use context::ToolContext;
use output::locate_output_dir;

pub const NIX_BUILD: &str = "nix-build";
pub const NIX_INSTANTIATE: &str = "nix-instantiate";

/// What the task does with each attr.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// `nix-build`, copy results, run image/export/cachix hooks.
    Build,
    /// `nix-instantiate`, resolve each derivation to an outpath sidecar.
    EvalOutpaths,
}

impl RunMode {
    pub fn tool(self) -> &'static str {
        match self {
            RunMode::Build => NIX_BUILD,
            RunMode::EvalOutpaths => NIX_INSTANTIATE,
        }
    }

    fn handler(self) -> &'static dyn ResultHandler {
        match self {
            RunMode::Build => &CopyResult,
            RunMode::EvalOutpaths => &ResolveOutpath,
        }
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Indices that were built.
    pub built: Vec<usize>,
    /// Indices whose output directory was missing.
    pub skipped_outputs: Vec<usize>,
    /// Results materialized across all output directories.
    pub results: usize,
}

/// Drives the build tool over every configured target.
pub struct TaskRunner<'a> {
    config: &'a TaskConfig,
    mode: RunMode,
    ctx: ToolContext,
    command_prefix: Vec<String>,
    push_outputs: Option<&'a CachixConfig>,
}

impl<'a> TaskRunner<'a> {
    pub fn new(config: &'a TaskConfig, mode: RunMode) -> Self {
        Self::with_context(config, mode, ToolContext::from_config(config))
    }

    /// Like [`TaskRunner::new`] with an explicit tool context.
    pub fn with_context(config: &'a TaskConfig, mode: RunMode, ctx: ToolContext) -> Self {
        let cachix = config
            .cachix
            .as_ref()
            .filter(|_| mode == RunMode::Build);
        Self {
            config,
            mode,
            ctx,
            command_prefix: cachix.map(CachixConfig::command_prefix).unwrap_or_default(),
            push_outputs: cachix.filter(|c| c.push == CachixPushMode::Outputs),
        }
    }

    /// `cachix use` once before any build, when a cache is configured.
    fn init_cache(&self) -> Result<()> {
        let Some(cachix) = self.config.cachix.as_ref().filter(|_| self.mode == RunMode::Build)
        else {
            return Ok(());
        };
        log::info!("preparing cachix to use cache '{}'", cachix.cache);
        self.ctx
            .prepare(cachix.use_cache())
            .error_msg(&format!("cachix use {} failed", cachix.cache))
            .run_interactive()?;
        Ok(())
    }

    /// Full build-tool invocation for one target.
    pub fn build_command(&self, target: &TargetSpec) -> Cmd {
        let tool = self.mode.tool();
        let base = Cmd::from_argv(&self.command_prefix)
            .map(|cmd| cmd.arg(tool))
            .unwrap_or_else(|| Cmd::new(tool));
        let cmd = base.args(self.config.common_build_args());
        let cmd = match &target.attr {
            Some(attr) => cmd.arg("-A").arg(attr),
            None => cmd,
        };
        self.ctx.prepare(cmd)
    }

    /// Run every target in order, then warn about unreachable ones.
    pub fn run(&self) -> Result<RunReport> {
        self.init_cache()?;

        let mut report = RunReport::default();
        for target in &self.config.targets {
            self.run_target(target, &mut report)?;
        }

        if !self.config.unreachable_attrs.is_empty() {
            log::warn!(
                "ignoring params {}: evaluation stopped when ATTR{} was not found",
                self.config.unreachable_attrs.join(", "),
                self.config.targets.len()
            );
        }
        Ok(report)
    }

    fn run_target(&self, target: &TargetSpec, report: &mut RunReport) -> Result<()> {
        let describe = target.describe();
        log::info!("running {}{}", self.mode.tool(), describe);

        let results = self
            .build_command(target)
            .error_msg(&format!("{}{} failed", self.mode.tool(), describe))
            .run()?
            .lines();
        report.built.push(target.index);

        let Some(output_dir) = locate_output_dir(&self.ctx.work_dir, target.index) else {
            log::warn!(
                "missing output {}, nowhere to put results{}",
                output::last_candidate_name(target.index),
                describe
            );
            report.skipped_outputs.push(target.index);
            return Ok(());
        };

        log::info!("copying results{} to {}", describe, output_dir.display());
        let handler = self.mode.handler();
        for (index, reference) in results.iter().enumerate() {
            handler
                .handle(&self.ctx, index, reference, &output_dir)
                .with_context(|| format!("materializing result '{reference}'{describe}"))?;
        }
        report.results += results.len();

        self.post_output(target, &output_dir)
            .with_context(|| format!("post-processing {}", output_dir.display()))
    }

    fn post_output(&self, target: &TargetSpec, output_dir: &Path) -> Result<()> {
        if self.mode != RunMode::Build {
            return Ok(());
        }
        prepare_image(&self.ctx, output_dir, target.prepare_image)?;
        export_nar(&self.ctx, output_dir, target.export_nar)?;
        if let Some(cachix) = self.push_outputs {
            push_outputs(&self.ctx, cachix, output_dir)?;
        }
        Ok(())
    }
}
