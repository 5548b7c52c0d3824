//! Generator module provides the trait and implementation for document generators.
//!
//! This module contains the common interface for page-based document
//! generators and the PDF implementation used by the assembler.

use crate::error::Result;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

pub mod pdf;

/// Diagnostic content for a page that replaces an unrenderable image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPage {
    pub file_name: String,
    pub chapter: String,
    pub message: String,
}

/// Common interface for all document generators.
///
/// The `Generator` trait defines a consistent API for generators that lay
/// images out one per page. A failed [`add_page`](Generator::add_page) must
/// leave the document untouched, so the caller is free to retry or to emit
/// an [`ErrorPage`] instead.
#[async_trait(?Send)]
pub trait Generator {
    /// Creates a new generator instance.
    ///
    /// # Parameters
    /// * `output_dir` - Directory where the generated file will be saved
    /// * `base_filename` - Base name of the output file (without extension)
    ///
    /// # Returns
    /// * `Result<Self>` - A new generator instance or an error if creation fails
    fn new(output_dir: &Path, base_filename: &str) -> Result<Self>
    where
        Self: Sized;

    /// Adds a page holding the image at `image_path`.
    ///
    /// # Returns
    /// * `Result<&mut Self>` - Self reference for method chaining, or an error if
    ///   the image cannot be embedded (no page is added in that case)
    async fn add_page(&mut self, image_path: &Path) -> Result<&mut Self>
    where
        Self: Sized;

    /// Adds a text-only page describing why an image is missing.
    fn add_error_page(&mut self, page: &ErrorPage) -> Result<&mut Self>
    where
        Self: Sized;

    /// Number of pages emitted so far.
    fn page_count(&self) -> usize;

    /// Finalizes the document and writes it to disk.
    ///
    /// # Returns
    /// * `Result<PathBuf>` - The path of the written file
    async fn save(self) -> Result<PathBuf>;
}
