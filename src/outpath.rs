//! Result naming, `.outpath` sidecars, and derivation output selection.

use anyhow::{bail, Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const OUTPATH_SUFFIX: &str = ".outpath";

/// `result` for the first result of a build, `result-2`, `result-3`, … after that.
pub fn result_name(index: usize) -> String {
    if index == 0 {
        "result".to_string()
    } else {
        format!("result-{}", index + 1)
    }
}

/// `<result>.outpath` beside a result path.
pub fn sidecar_path(result_path: &Path) -> PathBuf {
    let mut name = result_path.as_os_str().to_owned();
    name.push(OUTPATH_SUFFIX);
    PathBuf::from(name)
}

/// Read every `<prefix>*.outpath` sidecar in `dir`, trimmed, sorted by file name.
pub fn read_outpaths(dir: &Path, prefix: &str) -> Result<Vec<String>> {
    let mut sidecars = Vec::new();
    for entry in
        fs::read_dir(dir).with_context(|| format!("reading output directory '{}'", dir.display()))?
    {
        let entry = entry.with_context(|| format!("iterating '{}'", dir.display()))?;
        let Some(name) = entry.file_name().to_str().map(str::to_owned) else {
            continue;
        };
        if name.starts_with(prefix) && name.ends_with(OUTPATH_SUFFIX) {
            sidecars.push((name, entry.path()));
        }
    }
    sidecars.sort();

    let mut outpaths = Vec::with_capacity(sidecars.len());
    for (_, path) in sidecars {
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("reading outpath sidecar '{}'", path.display()))?;
        outpaths.push(contents.trim().to_string());
    }
    Ok(outpaths)
}

/// Split `drv!out` into the derivation and the optional output name.
///
/// With several `!`, the last segment is the output name.
pub fn split_qualifier(reference: &str) -> (&str, Option<&str>) {
    match reference.split_once('!') {
        Some((drv, rest)) => (drv, rest.rsplit('!').next()),
        None => (reference, None),
    }
}

/// Pick the output path a result reference refers to.
///
/// - one output: that one
/// - `!name` given: the longest path ending in `-name` (a derivation whose
///   own name ends in `-name` produces a shorter false match)
/// - otherwise: the shortest path, taken to be the default `out` output
///
/// Ties go to whichever the store listed first.
pub fn select_outpath<'a>(outpaths: &'a [String], output_name: Option<&str>) -> Result<&'a str> {
    match (outpaths, output_name) {
        ([], _) => bail!("derivation has no output paths"),
        ([only], _) => Ok(only.as_str()),
        (_, Some(name)) => {
            let suffix = format!("-{name}");
            outpaths
                .iter()
                .filter(|op| op.ends_with(&suffix))
                .rev()
                .max_by_key(|op| op.len())
                .map(String::as_str)
                .with_context(|| format!("no output path ends with '{suffix}'"))
        }
        (_, None) => outpaths
            .iter()
            .min_by_key(|op| op.len())
            .map(String::as_str)
            .context("derivation has no output paths"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn paths(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_result_name() {
        assert_eq!(result_name(0), "result");
        assert_eq!(result_name(1), "result-2");
        assert_eq!(result_name(9), "result-10");
    }

    #[test]
    fn test_sidecar_path() {
        assert_eq!(
            sidecar_path(Path::new("output/result-2")),
            PathBuf::from("output/result-2.outpath")
        );
    }

    #[test]
    fn test_split_qualifier() {
        assert_eq!(split_qualifier("/nix/store/a.drv"), ("/nix/store/a.drv", None));
        assert_eq!(
            split_qualifier("/nix/store/a.drv!dev"),
            ("/nix/store/a.drv", Some("dev"))
        );
        assert_eq!(split_qualifier("a!b!c"), ("a", Some("c")));
    }

    #[test]
    fn test_single_output_wins_regardless_of_qualifier() {
        let outs = paths(&["/nix/store/abc-hello"]);
        assert_eq!(select_outpath(&outs, Some("dev")).unwrap(), "/nix/store/abc-hello");
    }

    #[test]
    fn test_qualifier_selects_matching_output() {
        let outs = paths(&["/a-x", "/a-foo"]);
        assert_eq!(select_outpath(&outs, Some("foo")).unwrap(), "/a-foo");
    }

    #[test]
    fn test_qualifier_prefers_longest_match() {
        let outs = paths(&[
            "/nix/store/abc-lib-dev",
            "/nix/store/abc-lib-dev-dev",
            "/nix/store/abc-lib-dev-out",
        ]);
        assert_eq!(
            select_outpath(&outs, Some("dev")).unwrap(),
            "/nix/store/abc-lib-dev-dev"
        );
    }

    #[test]
    fn test_qualifier_tie_goes_to_first() {
        let outs = paths(&["/a-1-foo", "/a-2-foo"]);
        assert_eq!(select_outpath(&outs, Some("foo")).unwrap(), "/a-1-foo");
    }

    #[test]
    fn test_qualifier_without_match_is_error() {
        let outs = paths(&["/a-x", "/a-y"]);
        assert!(select_outpath(&outs, Some("doc")).is_err());
    }

    #[test]
    fn test_unqualified_selects_shortest() {
        let outs = paths(&["/nix/store/abc-hello-man", "/nix/store/abc-hello"]);
        assert_eq!(select_outpath(&outs, None).unwrap(), "/nix/store/abc-hello");

        let ties = paths(&["/a-x", "/a-y"]);
        assert_eq!(select_outpath(&ties, None).unwrap(), "/a-x");
    }

    #[test]
    fn test_no_outputs_is_error() {
        assert!(select_outpath(&[], None).is_err());
    }

    #[test]
    fn test_read_outpaths_filters_and_sorts() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("result-2.outpath"), "/nix/store/b\n").unwrap();
        fs::write(temp.path().join("result.outpath"), "/nix/store/a").unwrap();
        fs::write(temp.path().join("extra.outpath"), "/nix/store/c").unwrap();
        fs::write(temp.path().join("result"), "content").unwrap();

        assert_eq!(
            read_outpaths(temp.path(), "result").unwrap(),
            vec!["/nix/store/b", "/nix/store/a"]
        );
        assert_eq!(
            read_outpaths(temp.path(), "").unwrap(),
            vec!["/nix/store/c", "/nix/store/b", "/nix/store/a"]
        );
    }
}
