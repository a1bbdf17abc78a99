//! Thin wrapper around [`std::process::Command`] for external tools.
//!
//! Every external program this crate drives (nix, gzip, skopeo, umoci,
//! cachix) goes through [`Cmd`]. Stderr is always inherited so the tool's
//! own diagnostics land in the CI log; stdout is either captured, written
//! into a file, or inherited.
//!
//! A nonzero exit becomes [`TaskError::ToolFailed`].

use anyhow::{Context, Result};
use std::ffi::{OsStr, OsString};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus, Stdio};

use crate::error::TaskError;

/// Check if a program can be found on `PATH`.
pub fn exists(program: &str) -> bool {
    which::which(program).is_ok()
}

/// Output of a captured command.
#[derive(Debug)]
pub struct CommandResult {
    pub status: ExitStatus,
    pub stdout: String,
}

impl CommandResult {
    /// Non-empty stdout lines with surrounding whitespace removed, in order.
    pub fn lines(&self) -> Vec<String> {
        self.stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect()
    }
}

/// Builder for an external tool invocation.
#[derive(Debug, Clone)]
pub struct Cmd {
    program: String,
    args: Vec<OsString>,
    envs: Vec<(String, OsString)>,
    dir: Option<PathBuf>,
    error_msg: Option<String>,
}

impl Cmd {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            envs: Vec::new(),
            dir: None,
            error_msg: None,
        }
    }

    /// Build a command from an argv-style list; the first element is the program.
    ///
    /// Returns `None` for an empty list.
    pub fn from_argv<I, S>(argv: I) -> Option<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut iter = argv.into_iter();
        let program = iter.next()?.as_ref().to_string_lossy().into_owned();
        Some(Self::new(program).args(iter))
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_owned());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_owned()));
        self
    }

    pub fn arg_path(self, path: &Path) -> Self {
        self.arg(path.as_os_str())
    }

    pub fn env(mut self, key: impl Into<String>, value: impl AsRef<OsStr>) -> Self {
        self.envs.push((key.into(), value.as_ref().to_owned()));
        self
    }

    pub fn envs<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<OsStr>,
    {
        for (key, value) in vars {
            self.envs.push((key.into(), value.as_ref().to_owned()));
        }
        self
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.dir = Some(dir.to_path_buf());
        self
    }

    /// Context message attached to the error if the tool fails.
    pub fn error_msg(mut self, msg: &str) -> Self {
        self.error_msg = Some(msg.to_string());
        self
    }

    /// Program and arguments, space separated, for log lines.
    pub fn display(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().map(|a| a.to_string_lossy().into_owned()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        for (key, value) in &self.envs {
            cmd.env(key, value);
        }
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }
        cmd.stdin(Stdio::null()).stderr(Stdio::inherit());
        cmd
    }

    fn check(&self, status: ExitStatus) -> Result<()> {
        if status.success() {
            return Ok(());
        }
        let err = TaskError::ToolFailed {
            program: self.program.clone(),
            code: status.code(),
        };
        match &self.error_msg {
            Some(msg) => Err(anyhow::Error::new(err).context(msg.clone())),
            None => Err(err.into()),
        }
    }

    /// Run with stdout captured.
    pub fn run(&self) -> Result<CommandResult> {
        log::debug!("running {}", self.display());
        let output = self
            .command()
            .stdout(Stdio::piped())
            .output()
            .with_context(|| format!("failed to spawn {}", self.program))?;
        self.check(output.status)?;
        Ok(CommandResult {
            status: output.status,
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }

    /// Run with stdout written into `path` (truncated first).
    pub fn run_to_file(&self, path: &Path) -> Result<ExitStatus> {
        log::debug!("running {} > {}", self.display(), path.display());
        let file = File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        let status = self
            .command()
            .stdout(Stdio::from(file))
            .status()
            .with_context(|| format!("failed to spawn {}", self.program))?;
        self.check(status)?;
        Ok(status)
    }

    /// Run with stdout inherited, for tools whose output is only progress.
    pub fn run_interactive(&self) -> Result<ExitStatus> {
        log::debug!("running {}", self.display());
        let status = self
            .command()
            .stdout(Stdio::inherit())
            .status()
            .with_context(|| format!("failed to spawn {}", self.program))?;
        self.check(status)?;
        Ok(status)
    }
}
