//! Image file type detection by magic bytes.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Container formats a `result` may arrive in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFileType {
    Gzip,
    Xz,
    Tar,
}

/// `(type, signature, offset)`, tested in order. The tar marker sits deep in
/// the first header block, so compressed formats are checked first.
const SIGNATURES: &[(ImageFileType, &[u8], usize)] = &[
    (ImageFileType::Gzip, b"\x1f\x8b", 0),
    (ImageFileType::Xz, b"\xfd\x37\x7a\x58\x5a\x00", 0),
    (ImageFileType::Tar, b"ustar", 0x101),
];

/// Bytes needed to test every signature.
pub const PREFIX_LEN: usize = max_signature_end();

const fn max_signature_end() -> usize {
    let mut max = 0;
    let mut i = 0;
    while i < SIGNATURES.len() {
        let end = SIGNATURES[i].2 + SIGNATURES[i].1.len();
        if end > max {
            max = end;
        }
        i += 1;
    }
    max
}

/// Classify a byte prefix. `None` means no known signature matched.
pub fn detect_bytes(head: &[u8]) -> Option<ImageFileType> {
    SIGNATURES.iter().find_map(|(kind, sig, offset)| {
        head.get(*offset..*offset + sig.len())
            .filter(|window| window == sig)
            .map(|_| *kind)
    })
}

/// Read the head of `path` and classify it.
pub fn detect_file_type(path: &Path) -> Result<Option<ImageFileType>> {
    let file = File::open(path).with_context(|| format!("opening {}", path.display()))?;
    let mut head = Vec::with_capacity(PREFIX_LEN);
    file.take(PREFIX_LEN as u64)
        .read_to_end(&mut head)
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(detect_bytes(&head))
}
