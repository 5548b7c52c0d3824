//! Path utilities for safe and robust file path handling.
//!
//! This module provides helpers for lossy name extraction, hidden-file and
//! supported-image detection, and the sibling paths used for intermediate
//! repair artifacts.

use crate::error::{Error, Result};

use std::path::{Path, PathBuf};

/// Image extensions accepted as chapter pages (compared case-insensitively).
pub const SUPPORTED_IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "webp"];

/// Stem suffixes marking files written by a previous repair pass.
pub const INTERMEDIATE_SUFFIXES: [&str; 4] = ["_fixed", "_recovered", "_converted", "_placeholder"];

/// Gets the file name from a path with fallback to lossy conversion.
///
/// # Arguments
///
/// * `path` - The path to extract the file name from
///
/// # Returns
///
/// * `String` - The file name, using lossy conversion if necessary
pub fn get_file_name_lossy(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Converts a path to a string with fallback to lossy conversion.
pub fn path_to_string_lossy(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Checks if a filename starts with a dot (hidden file) using safe conversion.
pub fn is_hidden_file(path: &Path) -> bool {
    path.file_name()
        .map(|name| name.to_string_lossy().starts_with('.'))
        .unwrap_or(false)
}

/// Returns true when the extension is on the page allow-list.
pub fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
        .is_some_and(|ext| SUPPORTED_IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

/// Returns true for files produced by the repair engine.
///
/// These must never be collected as pages, otherwise a second run would
/// render the same image twice.
pub fn is_intermediate_artifact(path: &Path) -> bool {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    INTERMEDIATE_SUFFIXES
        .iter()
        .any(|suffix| stem.ends_with(suffix))
}

/// Builds the sibling path `<dir>/<stem><suffix>.<extension>` for a repair artifact.
///
/// # Arguments
///
/// * `original` - The image being repaired
/// * `suffix` - One of [`INTERMEDIATE_SUFFIXES`]
/// * `extension` - Extension of the written file, without the dot
pub fn artifact_path(original: &Path, suffix: &str, extension: &str) -> PathBuf {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());
    original.with_file_name(format!("{}{}.{}", stem, suffix, extension))
}

/// Checks if a path contains characters that Windows does not allow in file names.
///
/// Unix file systems accept these characters, so there every path passes.
///
/// # Arguments
///
/// * `path` - The path to validate
///
/// # Returns
///
/// * `Result<()>` - Ok if the path is valid, or an error describing the issue
pub fn validate_path(path: &Path) -> Result<()> {
    if !cfg!(windows) {
        return Ok(());
    }
    let path_str = path_to_string_lossy(path);

    if path_str
        .chars()
        .any(|c| matches!(c, '<' | '>' | '"' | '|' | '?' | '*'))
    {
        return Err(Error::InvalidPath(
            path.to_path_buf(),
            "Path contains invalid characters".to_string(),
        ));
    }

    Ok(())
}

/// Sanitizes a filename by replacing invalid characters with safe alternatives.
pub fn sanitize_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| match c {
            '<' | '>' | '"' | '|' | '?' | '*' => '-',
            ':' => '-',
            '/' | '\\' => '-',
            c if c.is_control() => '_',
            c => c,
        })
        .collect()
}
