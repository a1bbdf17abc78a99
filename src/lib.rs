//! CI task that builds Nix attributes and materializes their results.
//!
//! Configuration comes entirely from the environment (`ATTR0..N`,
//! `BUILD_ARG_*`, `OUTPUT<N>_PREPARE_IMAGE`, `CACHIX_*`, ...). For every
//! selected attribute the task runs `nix-build`, copies each result into
//! the matching `output<N>` directory with an `.outpath` sidecar, and then
//! optionally prepares container images, exports NARs and pushes to a
//! binary cache.
//!
//! # Architecture
//!
//! ```text
//! config      environment -> TaskConfig (targets, args, cachix)
//!   │
//!   ├── preflight    required host tools
//!   │
//! build       TaskRunner: one nix-build / nix-instantiate per target
//!   │
//!   ├── materialize  result lines -> output<N>/result[-K] + .outpath
//!   ├── image        detect, decompress, inspect, unpack
//!   ├── nar          result.nar export
//!   └── cachix       watch-exec / push
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use nix_build_task::{Env, RunMode, TaskConfig, TaskRunner};
//!
//! let config = TaskConfig::resolve(&Env::from_process(), &std::env::current_dir()?)?;
//! TaskRunner::new(&config, RunMode::Build).run()?;
//! ```

pub mod artifact;
pub mod build;
pub mod cachix;
pub mod config;
pub mod error;
pub mod image;
pub mod materialize;
pub mod nar;
pub mod outpath;
pub mod preflight;
pub mod process;

#[cfg(test)]
mod testutil;

pub use build::{RunMode, RunReport, TaskRunner};
pub use config::{Env, TaskConfig};
pub use error::{exit_code_for, TaskError};
