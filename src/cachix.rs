//! Binary cache publishing through cachix.
//!
//! Two push strategies exist. `watch-exec` wraps the build tool so cachix
//! uploads every path as it is realised; `outputs` pushes only the paths
//! named by each output directory's `result*.outpath` sidecars after
//! materialization.

use anyhow::{Context, Result};
use std::path::Path;

use crate::build::context::ToolContext;
use crate::config::env::{is_truthy, Env};
use crate::error::TaskError;
use crate::outpath::read_outpaths;
use crate::process::Cmd;

pub const CACHIX: &str = "cachix";

const PUSH_EXTRA_ARGS: &str = "CACHIX_PUSH_EXTRA_ARGS";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachixPushMode {
    Off,
    /// Push result outpaths after each output directory is populated.
    Outputs,
    /// Run the build under `cachix watch-exec`.
    WatchExec,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachixConfig {
    pub cache: String,
    /// Global args placed before the subcommand (`-c <conf>`).
    pub extra_args: Vec<String>,
    /// `CACHIX_PUSH_EXTRA_ARGS`, shell-split.
    pub push_extra_args: Vec<String>,
    pub push: CachixPushMode,
}

impl CachixConfig {
    /// `None` unless `CACHIX_CACHE` is set.
    ///
    /// Fails when `CACHIX_PUSH_EXTRA_ARGS` is not valid shell quoting.
    pub fn from_env(env: &Env) -> Result<Option<Self>, TaskError> {
        let Some(cache) = env.get("CACHIX_CACHE").map(str::to_string) else {
            return Ok(None);
        };
        let conf = env.get("CACHIX_CONF");

        let extra_args = conf
            .map(|conf| vec!["-c".to_string(), conf.to_string()])
            .unwrap_or_default();
        let push_extra_args = match env.get(PUSH_EXTRA_ARGS) {
            Some(raw) => shlex::split(raw).ok_or_else(|| TaskError::InvalidConfig {
                key: PUSH_EXTRA_ARGS.to_string(),
                reason: format!("cannot split '{raw}' into arguments"),
            })?,
            None => Vec::new(),
        };

        // Without an explicit setting, push whenever credentials were supplied.
        let push = match env.get("CACHIX_PUSH") {
            Some(v) if v.eq_ignore_ascii_case("outputs") => CachixPushMode::Outputs,
            Some(v) if is_truthy(Some(v)) => CachixPushMode::WatchExec,
            Some(_) => CachixPushMode::Off,
            None => {
                let has_credentials = conf.is_some()
                    || env.get("CACHIX_SIGNING_KEY").is_some()
                    || env.get("CACHIX_AUTH_TOKEN").is_some();
                if has_credentials {
                    CachixPushMode::WatchExec
                } else {
                    CachixPushMode::Off
                }
            }
        };

        Ok(Some(Self {
            cache,
            extra_args,
            push_extra_args,
            push,
        }))
    }

    fn cmd(&self) -> Cmd {
        Cmd::new(CACHIX).args(&self.extra_args)
    }

    /// `cachix use <cache>`: configure nix to substitute from the cache.
    pub fn use_cache(&self) -> Cmd {
        self.cmd().arg("use").arg(&self.cache)
    }

    /// Argv prefix that wraps the build tool, if pushing via watch-exec.
    pub fn command_prefix(&self) -> Vec<String> {
        if self.push != CachixPushMode::WatchExec {
            return Vec::new();
        }
        let mut prefix = vec![CACHIX.to_string()];
        prefix.extend(self.extra_args.iter().cloned());
        prefix.push("watch-exec".to_string());
        prefix.extend(self.push_extra_args.iter().cloned());
        prefix.push(self.cache.clone());
        prefix.push("--".to_string());
        prefix
    }

    /// `cachix push <cache> <outpath>`.
    pub fn push_cmd(&self, outpath: &str) -> Cmd {
        self.cmd()
            .arg("push")
            .args(&self.push_extra_args)
            .arg(&self.cache)
            .arg(outpath)
    }
}

/// Push every `result*.outpath` in `output_dir`, one cachix invocation each.
pub fn push_outputs(ctx: &ToolContext, config: &CachixConfig, output_dir: &Path) -> Result<()> {
    log::info!("pushing results for {} to cachix", output_dir.display());
    for outpath in read_outpaths(output_dir, "result")? {
        ctx.prepare(config.push_cmd(&outpath))
            .error_msg(&format!("pushing {outpath} to cachix"))
            .run_interactive()
            .with_context(|| format!("publishing results of {}", output_dir.display()))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absent_without_cache() {
        assert!(CachixConfig::from_env(&Env::from([("CACHIX_AUTH_TOKEN", "t")]))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_push_defaults_to_credentials() {
        let anon = CachixConfig::from_env(&Env::from([("CACHIX_CACHE", "mycache")]))
            .unwrap()
            .unwrap();
        assert_eq!(anon.push, CachixPushMode::Off);
        assert!(anon.command_prefix().is_empty());

        let authed = CachixConfig::from_env(&Env::from([
            ("CACHIX_CACHE", "mycache"),
            ("CACHIX_SIGNING_KEY", "key"),
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(authed.push, CachixPushMode::WatchExec);
    }

    #[test]
    fn test_explicit_push_modes() {
        let outputs = CachixConfig::from_env(&Env::from([
            ("CACHIX_CACHE", "c"),
            ("CACHIX_PUSH", "Outputs"),
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(outputs.push, CachixPushMode::Outputs);

        let off = CachixConfig::from_env(&Env::from([
            ("CACHIX_CACHE", "c"),
            ("CACHIX_AUTH_TOKEN", "t"),
            ("CACHIX_PUSH", "false"),
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(off.push, CachixPushMode::Off);
    }

    #[test]
    fn test_watch_exec_prefix() {
        let config = CachixConfig::from_env(&Env::from([
            ("CACHIX_CACHE", "c"),
            ("CACHIX_CONF", "/etc/cachix.dhall"),
            ("CACHIX_PUSH", "1"),
            ("CACHIX_PUSH_EXTRA_ARGS", "--compression-level '9'"),
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(
            config.command_prefix(),
            vec![
                "cachix",
                "-c",
                "/etc/cachix.dhall",
                "watch-exec",
                "--compression-level",
                "9",
                "c",
                "--",
            ]
        );
        assert_eq!(
            config.push_cmd("/nix/store/abc-hello").display(),
            "cachix -c /etc/cachix.dhall push --compression-level 9 c /nix/store/abc-hello"
        );
        assert_eq!(
            config.use_cache().display(),
            "cachix -c /etc/cachix.dhall use c"
        );
    }

    #[test]
    fn test_unbalanced_push_args_rejected() {
        let err = CachixConfig::from_env(&Env::from([
            ("CACHIX_CACHE", "c"),
            ("CACHIX_AUTH_TOKEN", "t"),
            ("CACHIX_PUSH_EXTRA_ARGS", "--compression-level '9"),
        ]))
        .unwrap_err();
        assert!(matches!(err, TaskError::InvalidConfig { ref key, .. } if key == "CACHIX_PUSH_EXTRA_ARGS"));

        // only consulted when a cache is configured
        assert!(CachixConfig::from_env(&Env::from([("CACHIX_PUSH_EXTRA_ARGS", "'")]))
            .unwrap()
            .is_none());
    }
}
