//! Header-only image validation.
//!
//! The validator looks at a file's size and leading bytes. It never decodes
//! pixel data, so a file with a correct signature and a corrupted body passes
//! here and is only caught later, at composition time.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use crate::types::ValidationReport;

/// Files smaller than this cannot hold a meaningful page image.
pub const MIN_IMAGE_BYTES: u64 = 100;
/// How many leading bytes are inspected for a signature.
const HEADER_WINDOW: usize = 12;

const JPEG_SIGNATURE: &[u8] = &[0xFF, 0xD8, 0xFF];
const PNG_SIGNATURE: &[u8] = &[0x89, 0x50, 0x4E, 0x47];
const GIF_SIGNATURE: &[u8] = b"GIF";
const WEBP_MARKER: &[u8] = b"WEBP";

/// Image families recognised from their leading bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignatureKind {
    Jpeg,
    Png,
    Gif,
    Webp,
}

/// Classifies a header window by its magic bytes.
pub fn detect_signature(header: &[u8]) -> Option<SignatureKind> {
    if header.starts_with(JPEG_SIGNATURE) {
        Some(SignatureKind::Jpeg)
    } else if header.starts_with(PNG_SIGNATURE) {
        Some(SignatureKind::Png)
    } else if header.starts_with(GIF_SIGNATURE) {
        Some(SignatureKind::Gif)
    } else if header
        .windows(WEBP_MARKER.len())
        .any(|window| window == WEBP_MARKER)
    {
        Some(SignatureKind::Webp)
    } else {
        None
    }
}

/// Inspects `path` and decides whether it is structurally an image.
///
/// Filesystem errors are folded into an invalid verdict carrying the
/// underlying message, so callers only ever see a [`ValidationReport`].
pub fn validate(path: &Path) -> ValidationReport {
    let size = match std::fs::metadata(path) {
        Ok(metadata) => metadata.len(),
        Err(e) => return ValidationReport::invalid(0, e.to_string()),
    };

    if size == 0 {
        return ValidationReport::invalid(size, "empty file");
    }
    if size < MIN_IMAGE_BYTES {
        return ValidationReport::invalid(size, "too small");
    }

    let header = match read_header(path) {
        Ok(header) => header,
        Err(e) => return ValidationReport::invalid(size, e.to_string()),
    };

    match detect_signature(&header) {
        Some(_) => ValidationReport::valid(size),
        None => ValidationReport::invalid(size, "unrecognized image signature"),
    }
}

fn read_header(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut header = Vec::with_capacity(HEADER_WINDOW);
    File::open(path)?
        .take(HEADER_WINDOW as u64)
        .read_to_end(&mut header)?;
    Ok(header)
}
