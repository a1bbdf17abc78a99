//! Execution context shared by every external tool invocation.

use std::path::PathBuf;

use crate::config::TaskConfig;
use crate::process::Cmd;

/// Working directory and environment overrides for spawned tools.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Directory tools run in and outputs are resolved against.
    pub work_dir: PathBuf,
    env: Vec<(String, PathBuf)>,
}

impl ToolContext {
    pub fn new(work_dir: PathBuf, env: Vec<(String, PathBuf)>) -> Self {
        Self { work_dir, env }
    }

    pub fn from_config(config: &TaskConfig) -> Self {
        Self::new(config.work_dir.clone(), config.child_env())
    }

    /// Apply the working directory and environment overrides to `cmd`.
    pub fn prepare(&self, cmd: Cmd) -> Cmd {
        cmd.current_dir(&self.work_dir)
            .envs(self.env.iter().map(|(k, v)| (k.clone(), v.as_os_str())))
    }

    /// A new command for `program` with the context applied.
    pub fn cmd(&self, program: &str) -> Cmd {
        self.prepare(Cmd::new(program))
    }
}
