//! Fatal error classes that map to distinct process exit codes.
//!
//! Most code propagates `anyhow::Error` with context attached. The variants
//! here are the ones the binary has to recognize to pick an exit code, so
//! they are raised as typed errors and found again by walking the chain.

use thiserror::Error;

/// Exit code for mutually exclusive configuration.
pub const EXIT_CONFIG_CONFLICT: i32 = 5;

/// Exit code for an output that is not a recognizable image archive.
pub const EXIT_UNKNOWN_IMAGE_FORMAT: i32 = 6;

/// Exit code for everything without a more specific one.
pub const EXIT_FAILURE: i32 = 1;

#[derive(Error, Debug)]
pub enum TaskError {
    /// Two environment settings that exclude each other were both present.
    #[error("conflict: {0}")]
    ConfigConflict(String),

    /// Neither a compression/tar signature nor an image layout marker matched.
    #[error("unable to determine image type of {0}")]
    UnknownImageFormat(String),

    /// An environment setting could not be parsed.
    #[error("invalid ${key}: {reason}")]
    InvalidConfig { key: String, reason: String },

    /// An external tool exited nonzero (or was killed by a signal).
    ///
    /// The tool's own code is only reported, never used as the exit code, so
    /// it cannot be mistaken for one of the codes above.
    #[error("{program} failed{}", .code.map(|c| format!(" with exit code {c}")).unwrap_or_else(|| " (terminated by signal)".to_string()))]
    ToolFailed { program: String, code: Option<i32> },
}

impl TaskError {
    pub fn exit_code(&self) -> i32 {
        match self {
            TaskError::ConfigConflict(_) => EXIT_CONFIG_CONFLICT,
            TaskError::UnknownImageFormat(_) => EXIT_UNKNOWN_IMAGE_FORMAT,
            TaskError::InvalidConfig { .. } | TaskError::ToolFailed { .. } => EXIT_FAILURE,
        }
    }
}

/// Find the first [`TaskError`] anywhere in an error chain.
pub fn find_task_error(err: &anyhow::Error) -> Option<&TaskError> {
    err.chain().find_map(|cause| cause.downcast_ref::<TaskError>())
}

/// Exit code for a run that ended in `err`.
pub fn exit_code_for(err: &anyhow::Error) -> i32 {
    find_task_error(err).map_or(EXIT_FAILURE, TaskError::exit_code)
}
