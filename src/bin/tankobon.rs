//! Command-line front end for tankobon.
//!
//! Maps flags onto `TankobonConfig`, runs one assembly and prints the summary.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use tankobon::TankobonConfig;
use tracing_subscriber::EnvFilter;

/// Assemble a folder of manga chapters into a single PDF.
#[derive(Parser, Debug)]
#[command(name = "tankobon", version, about)]
struct Cli {
    /// Manga root folder, holding one sub-folder per chapter
    source: PathBuf,

    /// Name of the generated PDF, written inside the source folder
    #[arg(short, long, default_value = "manga.pdf")]
    output: String,

    /// Document title (defaults to the source folder name)
    #[arg(long)]
    title: Option<String>,

    /// Do not emit a diagnostic page for images that fail header validation
    #[arg(long)]
    skip_invalid_pages: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "tankobon=info",
        1 => "tankobon=debug",
        _ => "tankobon=trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(std::io::stderr)
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut builder = TankobonConfig::builder();
    builder
        .source_path(cli.source.clone())
        .output_name(cli.output)
        .placeholder_for_invalid(!cli.skip_invalid_pages);
    if let Some(title) = cli.title {
        builder.title(title);
    }
    let config = builder.build().context("invalid configuration")?;

    let report = config
        .assemble()
        .await
        .with_context(|| format!("failed to assemble {}", cli.source.display()))?;

    let stats = &report.stats;
    println!("PDF:     {}", report.output_path.display());
    println!("Report:  {}", report.report_path.display());
    println!("Pages:   {}", report.pages.len());
    println!(
        "Images:  {} total, {} succeeded, {} auto-repaired, {} skipped",
        stats.total, stats.succeeded, stats.repaired, stats.skipped
    );
    println!("Success: {:.1}%", stats.success_rate());
    Ok(())
}
