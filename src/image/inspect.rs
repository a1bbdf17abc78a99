//! Archive layout classification and `skopeo inspect`.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::fs::File;
use std::path::Path;

use crate::build::context::ToolContext;

pub const SKOPEO: &str = "skopeo";

const OCI_LAYOUT_MARKER: &str = "oci-layout";
const DOCKER_MANIFEST_MARKER: &str = "manifest.json";

/// Which container-image archive convention a tar follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageArchiveKind {
    OciArchive,
    DockerArchive,
}

impl ImageArchiveKind {
    /// containers-transports(5) name.
    pub fn transport(self) -> &'static str {
        match self {
            ImageArchiveKind::OciArchive => "oci-archive",
            ImageArchiveKind::DockerArchive => "docker-archive",
        }
    }

    /// `<transport>:<path>` reference for skopeo.
    pub fn reference(self, archive: &Path) -> String {
        format!("{}:{}", self.transport(), archive.display())
    }
}

impl fmt::Display for ImageArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.transport())
    }
}

/// The subset of `skopeo inspect` output that gets persisted.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ImageMetadata {
    #[serde(rename = "Digest")]
    pub digest: String,
    #[serde(rename = "Env", default)]
    pub env: Option<Vec<String>>,
    #[serde(rename = "User", default)]
    pub user: Option<String>,
}

/// Contents of `metadata.json`.
#[derive(Debug, Serialize)]
pub struct RuntimeMetadata<'a> {
    pub env: &'a Option<Vec<String>>,
    pub user: &'a Option<String>,
}

impl ImageMetadata {
    pub fn runtime(&self) -> RuntimeMetadata<'_> {
        RuntimeMetadata {
            env: &self.env,
            user: &self.user,
        }
    }
}

/// Member names of a tar archive, read from headers only.
pub fn list_members(tar_path: &Path) -> Result<BTreeSet<String>> {
    let file = File::open(tar_path).with_context(|| format!("opening {}", tar_path.display()))?;
    let mut archive = tar::Archive::new(file);
    let mut names = BTreeSet::new();
    for entry in archive
        .entries()
        .with_context(|| format!("reading tar {}", tar_path.display()))?
    {
        let entry = entry.with_context(|| format!("reading tar entry in {}", tar_path.display()))?;
        let path = entry.path()?;
        let name = path.to_string_lossy();
        let name = name.strip_prefix("./").unwrap_or(name.as_ref());
        names.insert(name.trim_end_matches('/').to_string());
    }
    Ok(names)
}

/// Classify by marker member; `None` if neither marker is present.
pub fn classify_members(members: &BTreeSet<String>) -> Option<ImageArchiveKind> {
    if members.contains(OCI_LAYOUT_MARKER) {
        Some(ImageArchiveKind::OciArchive)
    } else if members.contains(DOCKER_MANIFEST_MARKER) {
        Some(ImageArchiveKind::DockerArchive)
    } else {
        None
    }
}

/// Run `skopeo inspect` against a classified archive.
pub fn inspect_image(
    ctx: &ToolContext,
    kind: ImageArchiveKind,
    tar_path: &Path,
) -> Result<ImageMetadata> {
    let output = ctx
        .cmd(SKOPEO)
        .arg("inspect")
        .arg(kind.reference(tar_path))
        .error_msg(&format!("skopeo inspect failed for {}", tar_path.display()))
        .run()?;
    parse_inspect(&output.stdout)
        .with_context(|| format!("parsing skopeo inspect output for {}", tar_path.display()))
}

pub fn parse_inspect(json: &str) -> Result<ImageMetadata> {
    Ok(serde_json::from_str(json)?)
}
