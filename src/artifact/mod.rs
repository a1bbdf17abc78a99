//! Helpers for placing build results on disk.
//!
//! - [`filesystem`] - dereferencing copies of files and directory trees

pub mod filesystem;
