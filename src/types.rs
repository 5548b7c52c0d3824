//! Core data types and reports for the Tankobon assembly pipeline.
//!
//! This module defines the fundamental data structures used throughout Tankobon:
//! - Collected input (`Chapter`, `ChapterSet`)
//! - Per-image verdicts (`ValidationReport`, `RepairOutcome`, `ImageRecord`)
//! - Run aggregates (`RunStatistics`, `PageKind`, `AssemblyReport`)

use std::path::PathBuf;

/// One chapter folder and its page images, already in reading order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Chapter {
    pub name: String,
    pub path: PathBuf,
    /// Sort key extracted from the folder name (0 when it holds no digits).
    pub number: f64,
    pub pages: Vec<PathBuf>,
}

/// The ordered chapters of one manga. Built once per run, read-only afterwards.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChapterSet {
    pub chapters: Vec<Chapter>,
}

impl ChapterSet {
    pub fn is_empty(&self) -> bool {
        self.chapters.is_empty()
    }

    pub fn len(&self) -> usize {
        self.chapters.len()
    }

    /// Number of page images across every chapter.
    pub fn total_images(&self) -> usize {
        self.chapters.iter().map(|c| c.pages.len()).sum()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Chapter> {
        self.chapters.iter()
    }
}

/// Verdict of the cheap, header-only image check.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ValidationReport {
    pub valid: bool,
    pub reason: Option<String>,
    pub size: u64,
}

impl ValidationReport {
    pub fn valid(size: u64) -> Self {
        Self {
            valid: true,
            reason: None,
            size,
        }
    }

    pub fn invalid(size: u64, reason: impl Into<String>) -> Self {
        Self {
            valid: false,
            reason: Some(reason.into()),
            size,
        }
    }
}

/// Which repair tier produced a re-encoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RepairTier {
    /// Metadata-driven re-encode to a baseline JPEG.
    Normalize,
    /// Corruption-tolerant decode, forced into a bounded canvas.
    Emergency,
}

/// Result of running the repair chain on one image.
///
/// Every variant except [`RepairOutcome::Passthrough`] and
/// [`RepairOutcome::Fatal`] points at a freshly written sibling file that
/// the caller owns and must delete.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RepairOutcome {
    /// The image matches no known problem profile.
    Passthrough,
    Repaired {
        path: PathBuf,
        tier: RepairTier,
        reason: String,
    },
    /// Neutral filler image substituted for an undecodable source.
    Placeholder { path: PathBuf, reason: String },
    /// Every tier failed, including placeholder synthesis.
    Fatal { reasons: Vec<String> },
}

impl RepairOutcome {
    /// Path of the replacement file, if one was written.
    pub fn fixed_path(&self) -> Option<&PathBuf> {
        match self {
            RepairOutcome::Repaired { path, .. } | RepairOutcome::Placeholder { path, .. } => {
                Some(path)
            }
            RepairOutcome::Passthrough | RepairOutcome::Fatal { .. } => None,
        }
    }

    pub fn is_success(&self) -> bool {
        !matches!(self, RepairOutcome::Fatal { .. })
    }

    pub fn reason(&self) -> Option<String> {
        match self {
            RepairOutcome::Passthrough => None,
            RepairOutcome::Repaired { reason, .. } | RepairOutcome::Placeholder { reason, .. } => {
                Some(reason.clone())
            }
            RepairOutcome::Fatal { reasons } => Some(reasons.join("; ")),
        }
    }
}

/// How an image that made it into the document was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RecordOutcome {
    #[default]
    None,
    Repaired,
    Placeholder,
}

/// The recorded fate of one discovered image.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageRecord {
    pub path: PathBuf,
    pub chapter: String,
    pub size: u64,
    pub valid: bool,
    pub outcome: RecordOutcome,
    pub reason: Option<String>,
}

/// Running counters for one assembly run.
///
/// At completion `succeeded + skipped == total` and `repaired <= succeeded`.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RunStatistics {
    pub total: usize,
    pub succeeded: usize,
    pub repaired: usize,
    pub skipped: usize,
    pub repaired_items: Vec<ImageRecord>,
    pub failed_items: Vec<ImageRecord>,
}

impl RunStatistics {
    /// An image rendered as-is.
    pub fn record_success(&mut self) {
        self.total += 1;
        self.succeeded += 1;
    }

    /// An image rendered from a repaired or placeholder replacement.
    pub fn record_repaired(&mut self, record: ImageRecord) {
        self.total += 1;
        self.succeeded += 1;
        self.repaired += 1;
        self.repaired_items.push(record);
    }

    /// An image that produced no content page.
    pub fn record_failure(&mut self, record: ImageRecord) {
        self.total += 1;
        self.skipped += 1;
        self.failed_items.push(record);
    }

    /// Share of images that reached the document, in percent.
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        self.succeeded as f64 * 100.0 / self.total as f64
    }

    /// Records rendered from a synthetic filler image.
    pub fn placeholder_items(&self) -> impl Iterator<Item = &ImageRecord> {
        self.repaired_items
            .iter()
            .filter(|r| r.outcome == RecordOutcome::Placeholder)
    }

    /// Records fixed by re-encoding.
    pub fn fixed_items(&self) -> impl Iterator<Item = &ImageRecord> {
        self.repaired_items
            .iter()
            .filter(|r| r.outcome == RecordOutcome::Repaired)
    }

    /// Records rejected by header validation.
    pub fn invalid_items(&self) -> impl Iterator<Item = &ImageRecord> {
        self.failed_items.iter().filter(|r| !r.valid)
    }

    /// Records that validated but could not be rendered by any tier.
    pub fn render_failures(&self) -> impl Iterator<Item = &ImageRecord> {
        self.failed_items.iter().filter(|r| r.valid)
    }
}

/// One page of the output document, in emission order.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PageKind {
    Image { source: PathBuf },
    ErrorPlaceholder { source: PathBuf },
}

impl PageKind {
    pub fn source(&self) -> &PathBuf {
        match self {
            PageKind::Image { source } | PageKind::ErrorPlaceholder { source } => source,
        }
    }
}

/// Structured outcome of a finished assembly run.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct AssemblyReport {
    pub output_path: PathBuf,
    pub report_path: PathBuf,
    pub stats: RunStatistics,
    pub pages: Vec<PageKind>,
}
