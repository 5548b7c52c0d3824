//! Plain-text processing report written next to the generated PDF.

use std::fmt::Write as _;
use std::path::Path;

use chrono::{DateTime, Utc};
use tokio::fs;

use crate::error::Result;
use crate::path_utils::{get_file_name_lossy, path_to_string_lossy};
use crate::types::{ImageRecord, RunStatistics};

/// File name of the report inside the manga root folder.
pub const DEFAULT_REPORT_FILE_NAME: &str = "enhanced-pdf-generation-report.txt";

const RULE: &str = "==================================================";

/// Renders the processing report for one run.
pub fn render_report(output_path: &Path, stats: &RunStatistics, generated_at: DateTime<Utc>) -> String {
    let mut out = String::new();

    // Writing into a String cannot fail
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "PDF GENERATION REPORT");
    let _ = writeln!(out, "{}", RULE);
    let _ = writeln!(out, "Generated: {}", generated_at.format("%Y-%m-%d %H:%M:%S UTC"));
    let _ = writeln!(out, "Output: {}", path_to_string_lossy(output_path));
    let _ = writeln!(out);

    let _ = writeln!(out, "SUMMARY");
    let _ = writeln!(out, "  Total images:   {}", stats.total);
    let _ = writeln!(out, "  Succeeded:      {}", stats.succeeded);
    let _ = writeln!(out, "  Auto-repaired:  {}", stats.repaired);
    let _ = writeln!(out, "  Skipped:        {}", stats.skipped);
    let _ = writeln!(out, "  Success rate:   {:.1}%", stats.success_rate());

    write_section(&mut out, "AUTO-FIXED IMAGES", stats.fixed_items());
    write_section(
        &mut out,
        "CORRUPTED IMAGES (placeholder substituted)",
        stats.placeholder_items(),
    );
    write_section(&mut out, "INVALID IMAGES (skipped)", stats.invalid_items());
    write_section(&mut out, "REMAINING ERRORS", stats.render_failures());

    out
}

fn write_section<'a>(out: &mut String, title: &str, items: impl Iterator<Item = &'a ImageRecord>) {
    let items: Vec<&ImageRecord> = items.collect();
    let _ = writeln!(out);
    let _ = writeln!(out, "{} ({})", title, items.len());
    if items.is_empty() {
        let _ = writeln!(out, "  none");
        return;
    }
    for record in items {
        let _ = writeln!(
            out,
            "  - [{}] {} ({} bytes): {}",
            record.chapter,
            get_file_name_lossy(&record.path),
            record.size,
            record.reason.as_deref().unwrap_or("no reason recorded")
        );
    }
}

/// Writes the rendered report to `path`.
pub async fn write_report(path: &Path, contents: &str) -> Result<()> {
    fs::write(path, contents).await?;
    Ok(())
}
