//! Output directory lookup.
//!
//! Output directories are created by the CI system, not by this task:
//! `output<N>` for target N, with plain `output` accepted for target 0.

use std::path::{Path, PathBuf};

pub fn output_dir_name(index: usize) -> String {
    format!("output{index}")
}

/// Name of the last directory [`locate_output_dir`] tries for `index`,
/// for reporting a miss.
pub fn last_candidate_name(index: usize) -> String {
    if index == 0 {
        "output".to_string()
    } else {
        output_dir_name(index)
    }
}

/// The output directory for target `index` under `work_dir`, if it exists.
pub fn locate_output_dir(work_dir: &Path, index: usize) -> Option<PathBuf> {
    let numbered = work_dir.join(output_dir_name(index));
    if numbered.is_dir() {
        return Some(numbered);
    }
    if index == 0 {
        let plain = work_dir.join(last_candidate_name(0));
        if plain.is_dir() {
            return Some(plain);
        }
    }
    None
}
