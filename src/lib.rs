//! Tankobon - Manga Chapter to PDF Assembly Library
//!
//! This crate turns a folder of downloaded manga chapters into a single PDF,
//! one image per page, and keeps going when individual images are broken.
//! Every image is validated by its header, composed onto a page and, if that
//! fails, repaired through a three-tier chain (normalize, emergency recovery,
//! grey placeholder) and retried once. Images that still cannot be rendered
//! get a diagnostic page, and every outcome is listed in a plain-text report
//! written next to the PDF.
//!
//! # Getting Started
//!
//! Point a `TankobonConfig` at the manga root folder, which holds one
//! sub-folder per chapter, and call [`assemble`](TankobonConfig::assemble).
//!
//! ```rust,no_run
//! use tankobon::prelude::*;
//! use std::path::PathBuf;
//!
//! #[tokio::main]
//! async fn main() -> tankobon::error::Result<()> {
//!     let manga_dir = PathBuf::from("./downloads/series_a");
//!
//!     // 1. Configure the assembly using the builder
//!     let config = TankobonConfig::builder()
//!         .source_path(manga_dir.clone())
//!         .output_name("Series A")
//!         .title("Series A, Volume 1")
//!         .placeholder_for_invalid(true)
//!         .build()?;
//!
//!     // Optional: check the folder before doing any work
//!     config.preflight_check()?;
//!
//!     // 2. Build the PDF and the report
//!     let report = config.assemble().await?;
//!     println!(
//!         "Wrote {:?} ({} pages, {:.1}% of images rendered)",
//!         report.output_path,
//!         report.pages.len(),
//!         report.stats.success_rate()
//!     );
//!
//!     Ok(())
//! }
//! ```
//!
//! The lower-level pieces ([`validator`], [`repair`], [`collector`] and the
//! [`generator`] module) are public as well, for callers that want to check or
//! repair single images without building a whole document.

pub mod collector;
pub mod error;
pub mod generator;
pub mod path_utils;
pub mod repair;
pub mod report;
pub mod tankobon;
pub mod types;
pub mod validator;

// Publicly expose the main `TankobonConfig` struct and its builder
pub use tankobon::TankobonConfig;
pub use tankobon::TankobonConfigBuilder;

// Re-export core types for direct access
pub use generator::pdf::PageLayout;
pub use repair::{RepairLimits, Repairer};
pub use types::{
    AssemblyReport, Chapter, ChapterSet, ImageRecord, PageKind, RecordOutcome, RepairOutcome,
    RepairTier, RunStatistics, ValidationReport,
};

/// Prelude module for convenient imports.
///
/// This module re-exports the most commonly used types and traits, allowing you to
/// import everything you need with a single `use tankobon::prelude::*;` statement.
pub mod prelude {
    pub use super::{
        AssemblyReport, Chapter, ChapterSet, ImageRecord, PageKind, PageLayout, RecordOutcome,
        RepairLimits, RepairOutcome, RepairTier, Repairer, RunStatistics, TankobonConfig,
        TankobonConfigBuilder, ValidationReport, error, generator, types,
    };
    pub use crate::collector::Collector;
    pub use crate::generator::Generator;
    pub use crate::validator::validate;
    pub use regex::Regex;
    pub use std::path::{Path, PathBuf};
}
