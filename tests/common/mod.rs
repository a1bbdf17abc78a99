//! Shared fixtures for the CLI end-to-end tests.
//!
//! Every external tool is replaced by a `/bin/sh` script in a per-test
//! `bin/` directory that is prepended to `PATH`.

#![allow(dead_code)]

use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use assert_fs::prelude::*;
use assert_fs::TempDir;
use std::io::Write;
use std::os::unix::fs::PermissionsExt;
use std::path::Path;
use std::process::Stdio;

/// Prints the lines of `results/<attr>`, or `results/default` without `-A`.
pub const STUB_NIX_BUILD: &str = r#"attr=default
while [ $# -gt 0 ]; do
  if [ "$1" = -A ]; then attr=$2; fi
  shift
done
echo "$attr" >> built.log
cat "results/$attr""#;

/// `inspect` prints fixed metadata; `copy` creates the OCI layout directory.
pub const STUB_SKOPEO: &str = r#"case "$1" in
  inspect) echo '{"Digest":"sha256:feed","Env":["PATH=/bin"],"User":"app"}' ;;
  --insecure-policy) dir=${4#oci:}; mkdir -p "${dir%:latest}" ;;
  *) exit 1 ;;
esac"#;

/// `raw unpack --image <layout> <rootfs>`
pub const STUB_UMOCI: &str = r#"mkdir -p "$5/etc" && echo app > "$5/etc/hostname""#;

pub struct Workspace {
    pub temp: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        temp.child("bin").create_dir_all().unwrap();
        temp.child("results").create_dir_all().unwrap();
        let ws = Self { temp };
        ws.stub("nix-build", STUB_NIX_BUILD);
        ws
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn stub(&self, name: &str, body: &str) {
        let path = self.temp.child("bin").child(name);
        path.write_str(&format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(path.path(), std::fs::Permissions::from_mode(0o755)).unwrap();
    }

    pub fn output_dir(&self, name: &str) {
        self.temp.child(name).create_dir_all().unwrap();
    }

    /// Write `contents` to `name` and list it as a result line of `attr`.
    pub fn add_result(&self, attr: &str, name: &str, contents: &[u8]) -> String {
        let src = self.temp.child(name);
        src.write_binary(contents).unwrap();
        let listing = self.temp.child("results").child(attr);
        let mut lines = std::fs::read_to_string(listing.path()).unwrap_or_default();
        lines.push_str(&format!("{}\n", src.path().display()));
        listing.write_str(&lines).unwrap();
        src.path().display().to_string()
    }

    /// The binary in this workspace with a clean environment.
    pub fn cmd(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("nix-build-task");
        let path = format!(
            "{}:{}",
            self.temp.child("bin").path().display(),
            std::env::var("PATH").unwrap_or_default()
        );
        cmd.current_dir(self.path()).env_clear().env("PATH", path);
        cmd
    }
}

/// A minimal archive whose member names mark it as an OCI layout.
pub fn oci_tar() -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for name in ["oci-layout", "index.json"] {
        let mut header = tar::Header::new_ustar();
        header.set_size(2);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, &b"{}"[..]).unwrap();
    }
    builder.into_inner().unwrap()
}

/// `data` compressed by the host `gzip`, or `None` when it is not installed.
pub fn host_gzip(data: &[u8]) -> Option<Vec<u8>> {
    which::which("gzip").ok()?;
    let mut child = std::process::Command::new("gzip")
        .arg("-c")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .spawn()
        .unwrap();
    child.stdin.take().unwrap().write_all(data).unwrap();
    let output = child.wait_with_output().unwrap();
    assert!(output.status.success());
    Some(output.stdout)
}
