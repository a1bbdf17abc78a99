//! Result materialization.
//!
//! The build loop hands every non-blank line the build tool printed to a
//! [`ResultHandler`], together with its position and the output directory.
//! Two handlers exist, one per run mode.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use crate::artifact::filesystem::{copy_file_replacing, copy_tree_dereferenced};
use crate::build::context::ToolContext;
use crate::outpath::{result_name, select_outpath, sidecar_path, split_qualifier};

pub const NIX_STORE: &str = "nix-store";

/// Something that turns one result line into files in an output directory.
pub trait ResultHandler {
    /// Handle the `index`-th result line of a build.
    fn handle(
        &self,
        ctx: &ToolContext,
        index: usize,
        reference: &str,
        output_dir: &Path,
    ) -> Result<()>;
}

/// Copies a built path into the output directory and records where it came from.
#[derive(Debug, Clone, Copy, Default)]
pub struct CopyResult;

impl ResultHandler for CopyResult {
    fn handle(
        &self,
        _ctx: &ToolContext,
        index: usize,
        reference: &str,
        output_dir: &Path,
    ) -> Result<()> {
        let src = Path::new(reference);
        let result_path = output_dir.join(result_name(index));

        if src.is_dir() {
            copy_tree_dereferenced(src, &result_path)
        } else {
            copy_file_replacing(src, &result_path)
        }
        .with_context(|| format!("copying {} to {}", reference, result_path.display()))?;

        write_sidecar(&result_path, reference)
    }
}

/// Resolves a derivation to one of its output paths, writing only the sidecar.
#[derive(Debug, Clone, Copy, Default)]
pub struct ResolveOutpath;

impl ResultHandler for ResolveOutpath {
    fn handle(
        &self,
        ctx: &ToolContext,
        index: usize,
        reference: &str,
        output_dir: &Path,
    ) -> Result<()> {
        log::info!("determining outpath for drv '{reference}'");
        let (drv, output_name) = split_qualifier(reference);

        let outpaths = ctx
            .cmd(NIX_STORE)
            .args(["--query", "--outputs", drv])
            .error_msg(&format!("querying outputs of {drv}"))
            .run()?
            .lines();
        let outpath = select_outpath(&outpaths, output_name)
            .with_context(|| format!("resolving outpath for '{reference}'"))?;

        write_sidecar(&output_dir.join(result_name(index)), outpath)
    }
}

fn write_sidecar(result_path: &Path, contents: &str) -> Result<()> {
    let sidecar = sidecar_path(result_path);
    fs::write(&sidecar, contents).with_context(|| format!("writing {}", sidecar.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{stub_context, stub_tool};
    use tempfile::TempDir;

    fn ctx(dir: &Path) -> ToolContext {
        ToolContext::new(dir.to_path_buf(), Vec::new())
    }

    fn file_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_copy_file_result() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("built");
        let out = temp.path().join("output");
        fs::write(&src, "artifact").unwrap();
        fs::create_dir(&out).unwrap();

        let reference = src.to_str().unwrap();
        CopyResult.handle(&ctx(temp.path()), 0, reference, &out).unwrap();

        assert_eq!(file_names(&out), vec!["result", "result.outpath"]);
        assert_eq!(fs::read_to_string(out.join("result")).unwrap(), "artifact");
        assert_eq!(fs::read_to_string(out.join("result.outpath")).unwrap(), reference);
    }

    #[test]
    fn test_copy_is_idempotent() {
        let temp = TempDir::new().unwrap();
        let src = temp.path().join("tree");
        let out = temp.path().join("output");
        fs::create_dir_all(src.join("bin")).unwrap();
        fs::write(src.join("bin/tool"), "#!/bin/sh\n").unwrap();
        fs::create_dir(&out).unwrap();

        let reference = src.to_str().unwrap();
        CopyResult.handle(&ctx(temp.path()), 1, reference, &out).unwrap();
        let first = fs::read(out.join("result-2/bin/tool")).unwrap();
        CopyResult.handle(&ctx(temp.path()), 1, reference, &out).unwrap();

        assert_eq!(fs::read(out.join("result-2/bin/tool")).unwrap(), first);
        assert_eq!(file_names(&out), vec!["result-2", "result-2.outpath"]);
        assert_eq!(fs::read_to_string(out.join("result-2.outpath")).unwrap(), reference);
    }

    #[test]
    fn test_missing_source_is_error() {
        let temp = TempDir::new().unwrap();
        let result = CopyResult.handle(
            &ctx(temp.path()),
            0,
            "/nonexistent_path_12345",
            temp.path(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_resolve_outpath_with_stub_store() {
        let temp = TempDir::new().unwrap();
        let bin = temp.path().join("bin");
        let out = temp.path().join("output");
        fs::create_dir(&out).unwrap();
        stub_tool(
            &bin,
            "nix-store",
            "test \"$1 $2 $3\" = '--query --outputs /nix/store/xyz-hello.drv' || exit 1\n\
             printf '/nix/store/abc-hello-man\\n/nix/store/abc-hello\\n'",
        );

        let ctx = stub_context(temp.path(), &bin);
        ResolveOutpath
            .handle(&ctx, 0, "/nix/store/xyz-hello.drv!man", &out)
            .unwrap();

        assert_eq!(
            fs::read_to_string(out.join("result.outpath")).unwrap(),
            "/nix/store/abc-hello-man"
        );
        assert!(!out.join("result").exists());
    }
}
