//! Configuration resolver.
//!
//! Turns the task's environment into a [`TaskConfig`]: aliases resolved,
//! conflicts rejected, targets enumerated. All conflicts surface here,
//! before any external tool runs.

pub mod env;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::cachix::CachixConfig;
use crate::error::TaskError;
pub use env::Env;
use env::{attr_index, is_truthy};

/// What to do with an output directory's `result` as a container image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ImagePrepareMode {
    #[default]
    Off,
    /// Write `digest` only.
    Inspect,
    /// Also write `metadata.json` and unpack into `rootfs/`.
    Unpack,
}

impl ImagePrepareMode {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            _ if !is_truthy(value) => ImagePrepareMode::Off,
            Some(v) if v.eq_ignore_ascii_case("unpack") => ImagePrepareMode::Unpack,
            _ => ImagePrepareMode::Inspect,
        }
    }
}

/// Whether to serialize an output directory's store paths into `result.nar`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NarExportMode {
    #[default]
    Off,
    /// Export just the paths named by the outpath sidecars.
    Outputs,
    /// Export their full runtime closure.
    RuntimeClosure,
}

impl NarExportMode {
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            _ if !is_truthy(value) => NarExportMode::Off,
            Some(v) if v.eq_ignore_ascii_case("runtime-closure") => NarExportMode::RuntimeClosure,
            _ => NarExportMode::Outputs,
        }
    }
}

/// One attr to build, with its per-output settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetSpec {
    pub index: usize,
    /// `None` only for index 0: build the file's default expression.
    pub attr: Option<String>,
    pub prepare_image: ImagePrepareMode,
    pub export_nar: NarExportMode,
}

impl TargetSpec {
    /// `" for attr 'name'"`, or empty for the default target. Used in log lines.
    pub fn describe(&self) -> String {
        match &self.attr {
            Some(attr) => format!(" for attr '{attr}'"),
            None => String::new(),
        }
    }
}

/// Fully resolved task configuration.
#[derive(Debug, Clone)]
pub struct TaskConfig {
    /// Directory outputs and the build file are resolved against.
    pub work_dir: PathBuf,
    /// `NIXFILE`, defaulting to `.`.
    pub nixfile: String,
    /// `BUILD_ARG_*`, passed as `--arg`.
    pub build_args: BTreeMap<String, String>,
    /// `BUILD_ARGSTR_*`, passed as `--argstr`.
    pub build_argstrs: BTreeMap<String, String>,
    /// `NIX_OPTION_*`, passed as `--option`.
    pub nix_options: BTreeMap<String, String>,
    pub targets: Vec<TargetSpec>,
    /// `ATTR<n>` keys past the last enumerated target.
    pub unreachable_attrs: Vec<String>,
    /// Absolute `NIX_LOG_DIR`, if set.
    pub log_dir: Option<PathBuf>,
    pub cachix: Option<CachixConfig>,
}

impl TaskConfig {
    /// Resolve configuration from `env`, with `work_dir` as the task's working directory.
    pub fn resolve(env: &Env, work_dir: &Path) -> Result<Self> {
        let attr0 = env.aliased("ATTR", "ATTR0")?;
        let prepare0 = env.aliased("OUTPUT_PREPARE_IMAGE", "OUTPUT0_PREPARE_IMAGE")?;
        let export0 = env.aliased("OUTPUT_EXPORT_NAR", "OUTPUT0_EXPORT_NAR")?;

        let build_args = env.with_prefix("BUILD_ARG_");
        let build_argstrs = env.with_prefix("BUILD_ARGSTR_");
        let conflicts: Vec<&str> = build_args
            .keys()
            .filter(|k| build_argstrs.contains_key(*k))
            .map(String::as_str)
            .collect();
        if !conflicts.is_empty() {
            return Err(TaskError::ConfigConflict(format!(
                "both BUILD_ARG_ and BUILD_ARGSTR_ set for arguments: {}",
                conflicts.join(", ")
            ))
            .into());
        }

        let targets = enumerate_targets(env, attr0, prepare0, export0);
        let last_index = targets.len() - 1;
        let mut unreachable: Vec<(usize, String)> = env
            .keys()
            .filter_map(|k| attr_index(k).map(|i| (i, k.to_string())))
            .filter(|(i, _)| *i > last_index)
            .collect();
        unreachable.sort();

        let log_dir = env.get("NIX_LOG_DIR").map(|dir| {
            let dir = PathBuf::from(dir);
            if dir.is_absolute() {
                dir
            } else {
                work_dir.join(dir)
            }
        });

        Ok(Self {
            work_dir: work_dir.to_path_buf(),
            nixfile: env.get("NIXFILE").unwrap_or(".").to_string(),
            build_args,
            build_argstrs,
            nix_options: env.with_prefix("NIX_OPTION_"),
            targets,
            unreachable_attrs: unreachable.into_iter().map(|(_, k)| k).collect(),
            log_dir,
            cachix: CachixConfig::from_env(env)?,
        })
    }

    /// Environment overrides applied to every external tool.
    pub fn child_env(&self) -> Vec<(String, PathBuf)> {
        let mut vars = vec![("HOME".to_string(), self.work_dir.clone())];
        if let Some(log_dir) = &self.log_dir {
            vars.push(("NIX_LOG_DIR".to_string(), log_dir.clone()));
        }
        vars
    }

    /// Arguments shared by every build-tool invocation, in order:
    /// file locator, `--arg`s, `--argstr`s, `--option`s.
    pub fn common_build_args(&self) -> Vec<String> {
        let mut args = vec![self.nixfile.clone()];
        for (flag, map) in [
            ("--arg", &self.build_args),
            ("--argstr", &self.build_argstrs),
            ("--option", &self.nix_options),
        ] {
            for (k, v) in map {
                args.extend([flag.to_string(), k.clone(), v.clone()]);
            }
        }
        args
    }

    /// Whether any target wants image preparation, and at which depth.
    pub fn deepest_image_mode(&self) -> ImagePrepareMode {
        if self
            .targets
            .iter()
            .any(|t| t.prepare_image == ImagePrepareMode::Unpack)
        {
            ImagePrepareMode::Unpack
        } else if self
            .targets
            .iter()
            .any(|t| t.prepare_image == ImagePrepareMode::Inspect)
        {
            ImagePrepareMode::Inspect
        } else {
            ImagePrepareMode::Off
        }
    }
}

/// Index 0 always; then `i + 1` while `ATTR<i+1>` is set.
fn enumerate_targets(
    env: &Env,
    attr0: Option<String>,
    prepare0: Option<String>,
    export0: Option<String>,
) -> Vec<TargetSpec> {
    let mut targets = vec![TargetSpec {
        index: 0,
        attr: attr0,
        prepare_image: ImagePrepareMode::parse(prepare0.as_deref()),
        export_nar: NarExportMode::parse(export0.as_deref()),
    }];

    let mut index = 1;
    while let Some(attr) = env.get(&format!("ATTR{index}")) {
        targets.push(TargetSpec {
            index,
            attr: Some(attr.to_string()),
            prepare_image: ImagePrepareMode::parse(
                env.get(&format!("OUTPUT{index}_PREPARE_IMAGE")),
            ),
            export_nar: NarExportMode::parse(env.get(&format!("OUTPUT{index}_EXPORT_NAR"))),
        });
        index += 1;
    }
    targets
}
