use std::path::{Path, PathBuf};

use chrono::Utc;
use log::{debug, error, info, warn};
use regex::Regex;
use tokio::task::spawn_blocking;

use crate::collector::Collector;
use crate::error::{Error, Result};
use crate::generator::pdf::{PageLayout, Pdf};
use crate::generator::{ErrorPage, Generator};
use crate::path_utils::{get_file_name_lossy, sanitize_filename, validate_path};
use crate::repair::{RepairLimits, Repairer, TempArtifact};
use crate::report::{DEFAULT_REPORT_FILE_NAME, render_report, write_report};
use crate::types::{
    AssemblyReport, ChapterSet, ImageRecord, PageKind, RecordOutcome, RepairOutcome,
    RunStatistics, ValidationReport,
};
use crate::validator::validate;

/// The main Tankobon assembly configuration, built declaratively using the builder pattern.
///
/// This struct holds everything needed to turn a folder of chapter folders
/// into a single PDF: where the chapters live, how the output is named, how
/// pages are laid out and how aggressively images are repaired.
///
/// ## Builder Pattern
///
/// Use [`TankobonConfig::builder()`](TankobonConfig::builder) to create a new configuration:
///
/// ```rust,no_run
/// # use tankobon::prelude::*;
/// # use std::path::PathBuf;
/// let config = TankobonConfig::builder()
///     .source_path(PathBuf::from("./downloads/my-manga"))
///     .output_name("My Manga")
///     .build()
///     .expect("Invalid configuration");
/// ```
#[derive(Debug, Clone, derive_builder::Builder)]
#[builder(setter(into, strip_option), build_fn(validate = "Self::validate"))]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct TankobonConfig {
    /// Root folder holding one sub-folder per chapter.
    ///
    /// The PDF and the processing report are written into this folder too.
    #[builder(default)]
    pub source_path: PathBuf,

    /// Name of the generated PDF. A missing `.pdf` extension is appended.
    #[builder(default = "\"manga.pdf\".to_string()")]
    pub output_name: String,

    /// Document title embedded in the PDF. Defaults to the source folder name.
    #[builder(default)]
    pub title: Option<String>,

    /// Custom regex for the chapter sort key. Capture group 1 is used when present.
    ///
    /// If not provided, chapters sort by the first integer in their folder name.
    #[builder(default)]
    pub chapter_name_regex_str: Option<String>,

    /// Custom regex for the page sort key, same rules as for chapters.
    #[builder(default)]
    pub page_name_regex_str: Option<String>,

    /// Emit a diagnostic page for images rejected by header validation.
    ///
    /// When `true` (the default), every discovered image yields exactly one
    /// page. When `false`, invalid images are only listed in the report.
    #[builder(default = "true")]
    pub placeholder_for_invalid: bool,

    /// File name of the plain-text report written into `source_path`.
    #[builder(default = "DEFAULT_REPORT_FILE_NAME.to_string()")]
    pub report_file_name: String,

    /// Page geometry in points.
    #[builder(default)]
    pub page_layout: PageLayout,

    /// Thresholds of the image repair chain.
    #[builder(default)]
    pub repair_limits: RepairLimits,
}

impl TankobonConfig {
    /// Creates a new builder for configuring `TankobonConfig`.
    pub fn builder() -> TankobonConfigBuilder {
        TankobonConfigBuilder::default()
    }

    /// Performs validation checks on the configuration without touching any image.
    ///
    /// [`assemble`](TankobonConfig::assemble) calls this automatically, so manual
    /// invocation is optional but useful for early error detection.
    ///
    /// # Returns
    ///
    /// * `Ok(&self)` - Configuration is valid
    /// * `Err(Error)` - The source folder is missing, not a directory or has an invalid name
    pub fn preflight_check(&self) -> Result<&Self> {
        if self.source_path.as_os_str().is_empty() {
            return Err(Error::Other("`source_path` must be set.".to_string()));
        }
        validate_path(&self.source_path)?;

        if !self.source_path.exists() {
            return Err(Error::NotFound(format!(
                "Source path does not exist: {:?}",
                self.source_path
            )));
        }
        if !self.source_path.is_dir() {
            return Err(Error::InvalidPath(
                self.source_path.clone(),
                "Source path is not a directory.".to_string(),
            ));
        }
        if self.output_base_name().is_empty() {
            return Err(Error::Other("Output name is required".to_string()));
        }

        Ok(self)
    }

    /// Output file name without the `.pdf` extension, sanitized for the filesystem.
    pub fn output_base_name(&self) -> String {
        let name = sanitize_filename(self.output_name.trim());
        if name.to_ascii_lowercase().ends_with(".pdf") {
            name[..name.len() - 4].to_string()
        } else {
            name
        }
    }

    /// Where the PDF will be written.
    pub fn output_path(&self) -> PathBuf {
        self.source_path
            .join(format!("{}.pdf", self.output_base_name()))
    }

    /// Where the processing report will be written.
    pub fn report_path(&self) -> PathBuf {
        self.source_path.join(&self.report_file_name)
    }

    /// Enumerates chapters and pages without processing any image.
    ///
    /// # Returns
    ///
    /// * `Ok(ChapterSet)` - At least one chapter holding at least one image
    /// * `Err(Error::NoChapters)` - The source folder has no chapter sub-folder
    /// * `Err(Error::NoImages)` - No chapter holds a supported image
    pub async fn collect_chapters(&self) -> Result<ChapterSet> {
        self.preflight_check()?;

        let chapter_regex = compile_optional(self.chapter_name_regex_str.as_deref())?;
        let page_regex = compile_optional(self.page_name_regex_str.as_deref())?;
        let collector = Collector::new(
            &self.source_path,
            chapter_regex.as_ref(),
            page_regex.as_ref(),
        );

        let chapters = collector.collect_chapter_set().await?;
        if chapters.is_empty() {
            return Err(Error::NoChapters(self.source_path.clone()));
        }
        if chapters.total_images() == 0 {
            return Err(Error::NoImages(self.source_path.clone()));
        }
        Ok(chapters)
    }

    /// Runs the full pipeline and writes the PDF plus the processing report.
    ///
    /// Images are processed one at a time in chapter-then-page order:
    /// validate, compose, and on failure repair and retry once. Per-image
    /// failures never abort the run. They become report entries and
    /// diagnostic pages. Only structural problems (missing folder, no
    /// chapters, no images) and failures to write the outputs are returned
    /// as errors, and the structural ones are raised before the document is
    /// opened.
    ///
    /// The returned future is not `Send`: the PDF document handle is
    /// reference-counted with `Rc`. Await it directly, or run it on a
    /// `LocalSet` or a current-thread runtime instead of `tokio::spawn`.
    ///
    /// # Example
    ///
    /// ```rust,no_run
    /// # use tankobon::prelude::*;
    /// # use std::path::PathBuf;
    /// # #[tokio::main]
    /// # async fn main() -> tankobon::error::Result<()> {
    /// let config = TankobonConfig::builder()
    ///     .source_path(PathBuf::from("./downloads/my-manga"))
    ///     .output_name("my-manga.pdf")
    ///     .build()?;
    ///
    /// let report = config.assemble().await?;
    /// println!(
    ///     "{} of {} images rendered ({} repaired)",
    ///     report.stats.succeeded, report.stats.total, report.stats.repaired
    /// );
    /// # Ok(())
    /// # }
    /// ```
    pub async fn assemble(&self) -> Result<AssemblyReport> {
        let chapters = self.collect_chapters().await?;
        info!(
            "Assembling {} image(s) from {} chapter(s) in {:?}",
            chapters.total_images(),
            chapters.len(),
            self.source_path
        );

        let title = self
            .title
            .clone()
            .unwrap_or_else(|| get_file_name_lossy(&self.source_path));
        let generator = Pdf::with_options(
            &self.source_path,
            &self.output_base_name(),
            &title,
            self.page_layout,
        )?;

        let mut run = AssemblyRun::new(
            generator,
            Repairer::new(self.repair_limits),
            self.placeholder_for_invalid,
        );
        for chapter in chapters.iter() {
            for page in &chapter.pages {
                run.process_image(&chapter.name, page).await;
            }
        }

        let AssemblyRun {
            generator,
            stats,
            pages,
            ..
        } = run;
        let output_path = generator.save().await?;

        let report_path = self.report_path();
        write_report(
            &report_path,
            &render_report(&output_path, &stats, Utc::now()),
        )
        .await?;

        info!(
            "Wrote {:?}: {}/{} images ({} repaired, {} skipped, {:.1}% success)",
            output_path,
            stats.succeeded,
            stats.total,
            stats.repaired,
            stats.skipped,
            stats.success_rate()
        );

        Ok(AssemblyReport {
            output_path,
            report_path,
            stats,
            pages,
        })
    }
}

fn compile_optional(pattern: Option<&str>) -> Result<Option<Regex>> {
    Ok(pattern.map(Regex::new).transpose()?)
}

/// State owned by one assembly run: the open document and the statistics.
struct AssemblyRun<G: Generator> {
    generator: G,
    repairer: Repairer,
    placeholder_for_invalid: bool,
    stats: RunStatistics,
    pages: Vec<PageKind>,
}

impl<G: Generator> AssemblyRun<G> {
    fn new(generator: G, repairer: Repairer, placeholder_for_invalid: bool) -> Self {
        Self {
            generator,
            repairer,
            placeholder_for_invalid,
            stats: RunStatistics::default(),
            pages: Vec::new(),
        }
    }

    /// Processes one image and records exactly one outcome for it.
    async fn process_image(&mut self, chapter: &str, path: &Path) {
        let validation = {
            let owned = path.to_path_buf();
            spawn_blocking(move || validate(&owned))
                .await
                .unwrap_or_else(|e| ValidationReport::invalid(0, e.to_string()))
        };

        let mut record = ImageRecord {
            path: path.to_path_buf(),
            chapter: chapter.to_string(),
            size: validation.size,
            valid: validation.valid,
            outcome: RecordOutcome::None,
            reason: validation.reason,
        };

        if !record.valid {
            warn!(
                "Skipping invalid image '{}' in '{}': {}",
                get_file_name_lossy(path),
                chapter,
                record.reason.as_deref().unwrap_or_default()
            );
            if self.placeholder_for_invalid {
                self.push_error_page(&record);
            }
            self.stats.record_failure(record);
            return;
        }

        let direct_error = match self.generator.add_page(path).await.map(|_| ()) {
            Ok(()) => {
                self.pages.push(PageKind::Image {
                    source: path.to_path_buf(),
                });
                self.stats.record_success();
                return;
            }
            Err(e) => e,
        };
        warn!(
            "Could not render '{}' in '{}': {}; attempting repair",
            get_file_name_lossy(path),
            chapter,
            direct_error
        );

        let outcome = self.run_repair(path).await;
        match outcome {
            RepairOutcome::Repaired { path: fixed, reason, .. } => {
                self.retry(record, fixed, RecordOutcome::Repaired, reason)
                    .await
            }
            RepairOutcome::Placeholder {
                path: fixed,
                reason,
            } => {
                self.retry(record, fixed, RecordOutcome::Placeholder, reason)
                    .await
            }
            RepairOutcome::Fatal { reasons } => {
                record.reason = Some(format!("{}; {}", direct_error, reasons.join("; ")));
                self.fail(record);
            }
            RepairOutcome::Passthrough => {
                record.reason = Some(direct_error.to_string());
                self.fail(record);
            }
        }
    }

    /// Runs the repair chain off the async runtime.
    ///
    /// The image already failed to render, so a clean normalize verdict is
    /// not an answer; the chain continues with the recovery tiers.
    async fn run_repair(&self, path: &Path) -> RepairOutcome {
        let repairer = self.repairer.clone();
        let owned = path.to_path_buf();
        spawn_blocking(move || match repairer.repair(&owned) {
            RepairOutcome::Passthrough => repairer.recover(&owned),
            outcome => outcome,
        })
        .await
        .unwrap_or_else(|e| RepairOutcome::Fatal {
            reasons: vec![e.to_string()],
        })
    }

    /// Retries composition once with a repaired file, which is deleted afterwards.
    async fn retry(
        &mut self,
        mut record: ImageRecord,
        fixed: PathBuf,
        outcome: RecordOutcome,
        reason: String,
    ) {
        let artifact = TempArtifact::new(fixed);
        match self.generator.add_page(artifact.path()).await.map(|_| ()) {
            Ok(()) => {
                debug!(
                    "Rendered '{}' after repair: {}",
                    get_file_name_lossy(&record.path),
                    reason
                );
                record.outcome = outcome;
                record.reason = Some(reason);
                self.pages.push(PageKind::Image {
                    source: record.path.clone(),
                });
                self.stats.record_repaired(record);
            }
            Err(e) => {
                record.reason = Some(format!("{}; retry failed: {}", reason, e));
                self.fail(record);
            }
        }
    }

    fn fail(&mut self, record: ImageRecord) {
        error!(
            "Giving up on '{}' in '{}': {}",
            get_file_name_lossy(&record.path),
            record.chapter,
            record.reason.as_deref().unwrap_or_default()
        );
        self.push_error_page(&record);
        self.stats.record_failure(record);
    }

    fn push_error_page(&mut self, record: &ImageRecord) {
        let page = ErrorPage {
            file_name: get_file_name_lossy(&record.path),
            chapter: record.chapter.clone(),
            message: record
                .reason
                .clone()
                .unwrap_or_else(|| "unknown error".to_string()),
        };
        match self.generator.add_error_page(&page).map(|_| ()) {
            Ok(()) => self.pages.push(PageKind::ErrorPlaceholder {
                source: record.path.clone(),
            }),
            Err(e) => error!(
                "Failed to add placeholder page for '{}': {}",
                page.file_name, e
            ),
        }
    }
}

impl TankobonConfigBuilder {
    fn validate(&self) -> std::result::Result<(), String> {
        // Validate custom regexes if they are provided
        if let Some(Some(s)) = &self.chapter_name_regex_str {
            if Regex::new(s).is_err() {
                return Err(format!("Invalid chapter_name_regex: {}", s));
            }
        }
        if let Some(Some(s)) = &self.page_name_regex_str {
            if Regex::new(s).is_err() {
                return Err(format!("Invalid page_name_regex: {}", s));
            }
        }

        if let Some(name) = &self.output_name {
            if name.trim().is_empty() {
                return Err("Output name must not be empty.".to_string());
            }
        }

        if let Some(layout) = &self.page_layout {
            if layout.page_width <= 0.0
                || layout.page_height <= 0.0
                || layout.error_page_height <= 0.0
            {
                return Err("Page dimensions must be positive.".to_string());
            }
        }

        Ok(())
    }
}
