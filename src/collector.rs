//! Chapter and page collection module.
//!
//! This module enumerates chapter folders below a manga root, collects the
//! page images inside each one, and sorts both by the first integer embedded
//! in their names. Intermediate files left behind by the repair engine are
//! never collected.

use std::cmp::Ordering;
use std::path::{Path, PathBuf};

use lazy_static::lazy_static;
use log::debug;
use rayon::prelude::*;
use regex::Regex;
use tokio::fs::{ReadDir, read_dir};

use crate::error::{Error, Result};
use crate::path_utils::{
    get_file_name_lossy, has_supported_extension, is_hidden_file, is_intermediate_artifact,
};
use crate::types::{Chapter, ChapterSet};

lazy_static! {
    /// Default Regex for extracting the sort key from chapter and page names:
    /// the first run of ASCII digits.
    pub static ref DEFAULT_NUMBER_REGEX: Regex = Regex::new(r"[0-9]+").unwrap();
}

/// Collects and orders the chapters and pages of one manga folder.
#[derive(Debug)]
pub struct Collector<'a> {
    base_directory: &'a Path,
    chapter_name_regex: Option<&'a Regex>, // Custom regex for chapter name parsing
    page_name_regex: Option<&'a Regex>,    // Custom regex for page name parsing
}

impl<'a> Collector<'a> {
    /// Creates a new Collector instance for the specified directory.
    ///
    /// # Arguments
    ///
    /// * `base_directory` - Path to the root directory containing one folder per chapter
    /// * `chapter_name_regex` - Optional custom regex for the chapter sort key
    /// * `page_name_regex` - Optional custom regex for the page sort key
    pub fn new(
        base_directory: &'a Path,
        chapter_name_regex: Option<&'a Regex>,
        page_name_regex: Option<&'a Regex>,
    ) -> Self {
        Self {
            base_directory,
            chapter_name_regex,
            page_name_regex,
        }
    }

    /// Builds the full, ordered [`ChapterSet`].
    ///
    /// Chapters without any page are kept, so the caller can tell "no
    /// chapters" apart from "no images".
    pub async fn collect_chapter_set(&self) -> Result<ChapterSet> {
        let mut chapters = Vec::new();
        for chapter_dir in self.collect_chapters().await? {
            let pages = self.collect_pages(&chapter_dir).await?;
            debug!(
                "Chapter '{}' holds {} page(s)",
                get_file_name_lossy(&chapter_dir),
                pages.len()
            );
            chapters.push(Chapter {
                name: get_file_name_lossy(&chapter_dir),
                number: self.sort_key(&chapter_dir, true),
                path: chapter_dir,
                pages,
            });
        }
        Ok(ChapterSet { chapters })
    }

    /// Collects chapter directories from the base directory, in reading order.
    pub async fn collect_chapters(&self) -> Result<Vec<PathBuf>> {
        let mut chapters = Self::collect_entries(self.base_directory, true).await?;
        // Stable sort: equal keys keep enumeration order
        chapters.par_sort_by(|a, b| self.compare(a, b, true));
        Ok(chapters)
    }

    /// Collects the page images of one chapter directory, in reading order.
    ///
    /// Only files on the extension allow-list are kept, and repair artifacts
    /// (`_fixed`, `_recovered`, `_converted`, `_placeholder`) are skipped.
    pub async fn collect_pages(&self, chapter_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut pages: Vec<PathBuf> = Self::collect_entries(chapter_dir, false)
            .await?
            .into_iter()
            .filter(|path| has_supported_extension(path) && !is_intermediate_artifact(path))
            .collect();
        pages.par_sort_by(|a, b| self.compare(a, b, false));
        Ok(pages)
    }

    /// Collects directory contents with filtering options
    ///
    /// # Arguments
    ///
    /// * `directory` - Directory to scan
    /// * `only_dirs` - When true, only directories are collected; when false, only files
    ///
    /// # Returns
    ///
    /// * `Result<Vec<PathBuf>>` - Paths meeting the criteria, in enumeration order
    pub async fn collect_entries(directory: &Path, only_dirs: bool) -> Result<Vec<PathBuf>> {
        let mut entries: Vec<PathBuf> = Vec::new();

        let mut paths: ReadDir = read_dir(directory).await.map_err(|e| {
            Error::InvalidPath(
                directory.to_path_buf(),
                format!("Cannot read directory: {}", e),
            )
        })?;

        while let Some(entry) = paths.next_entry().await? {
            let path = entry.path();

            if is_hidden_file(&path) {
                continue;
            }

            let is_dir = path.is_dir();
            if only_dirs != is_dir {
                continue; // Just skip, don't return an error for mixed content
            }

            entries.push(path);
        }

        Ok(entries)
    }

    /// Extracts the sort key of a path using the configured regex or the default.
    ///
    /// The first match wins; names without a match sort as 0.
    pub fn sort_key(&self, path: &Path, for_chapter_name: bool) -> f64 {
        let active_regex = if for_chapter_name {
            self.chapter_name_regex.unwrap_or(&DEFAULT_NUMBER_REGEX)
        } else {
            self.page_name_regex.unwrap_or(&DEFAULT_NUMBER_REGEX)
        };
        extract_first_number(path, active_regex)
    }

    fn compare(&self, a: &Path, b: &Path, for_chapter_name: bool) -> Ordering {
        self.sort_key(a, for_chapter_name)
            .partial_cmp(&self.sort_key(b, for_chapter_name))
            .unwrap_or(Ordering::Equal)
    }

    /// Sorts paths by the first integer in their file name using the default regex.
    pub fn sort_name_by_number_default(a: &PathBuf, b: &PathBuf) -> Ordering {
        extract_first_number(a, &DEFAULT_NUMBER_REGEX)
            .partial_cmp(&extract_first_number(b, &DEFAULT_NUMBER_REGEX))
            .unwrap_or(Ordering::Equal)
    }
}

/// Parses the first match of `regex` in the file name of `path`.
///
/// Capture group 1 is preferred when the regex defines one. Returns 0 when
/// nothing matches or the match is not numeric.
pub fn extract_first_number(path: &Path, regex: &Regex) -> f64 {
    let file_name = get_file_name_lossy(path);
    regex
        .captures(&file_name)
        .and_then(|cap| cap.get(1).or_else(|| cap.get(0)))
        .and_then(|m| m.as_str().parse::<f64>().ok())
        .unwrap_or(0.0)
}
