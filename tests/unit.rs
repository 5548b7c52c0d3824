//! Unit-level tests for the public building blocks of the Tankobon crate.
//!
//! Covers header validation, every tier of the repair chain, chapter and page
//! collection, the PDF generator on its own, and configuration building.

use image::GenericImageView;
use std::path::PathBuf;
use tankobon::error::{Error, Result};
use tankobon::generator::ErrorPage;
use tankobon::generator::pdf::Pdf;
use tankobon::prelude::*;
use tankobon::repair::{EMERGENCY_REASON, PLACEHOLDER_REASON, scan_jpeg_frame};
use tokio::time::timeout;

mod common;
use common::{
    LONG_TEST_TIMEOUT, TEST_TIMEOUT, create_corrupted_jpeg, create_dummy_image, create_jpeg,
    create_png, create_progressive_jpeg, create_tiny_file, create_webp, pdf_page_count,
    setup_test_dirs, write_bytes,
};

// --- Validation ---

#[tokio::test]
async fn test_validate_accepts_real_images() -> Result<()> {
    let test_dirs = setup_test_dirs("validate_real").await;
    let jpeg = test_dirs.source_dir.join("page.jpg");
    let png = test_dirs.source_dir.join("page.png");
    let webp = test_dirs.source_dir.join("page.webp");
    create_dummy_image(&jpeg).await?;
    create_png(&png, 60, 60).await?;
    create_webp(&webp, 60, 60).await?;

    for path in [&jpeg, &png, &webp] {
        let report = validate(path);
        assert!(report.valid, "{:?} should be valid: {:?}", path, report.reason);
        assert!(report.reason.is_none());
        assert!(report.size > 0);
    }
    Ok(())
}

#[tokio::test]
async fn test_validate_rejects_broken_files() -> Result<()> {
    let test_dirs = setup_test_dirs("validate_broken").await;
    let empty = test_dirs.source_dir.join("empty.jpg");
    let tiny = test_dirs.source_dir.join("tiny.jpg");
    let text = test_dirs.source_dir.join("notes.png");
    write_bytes(&empty, &[]).await?;
    create_tiny_file(&tiny).await?;
    write_bytes(&text, "this is not an image at all, only text. ".repeat(8).as_bytes()).await?;

    let report = validate(&empty);
    assert!(!report.valid);
    assert_eq!(report.reason.as_deref(), Some("empty file"));
    assert_eq!(report.size, 0);

    let report = validate(&tiny);
    assert!(!report.valid);
    assert_eq!(report.reason.as_deref(), Some("too small"));
    assert_eq!(report.size, 44);

    let report = validate(&text);
    assert!(!report.valid);
    assert_eq!(
        report.reason.as_deref(),
        Some("unrecognized image signature")
    );

    let report = validate(&test_dirs.source_dir.join("missing.jpg"));
    assert!(!report.valid);
    assert!(report.reason.is_some());
    Ok(())
}

#[tokio::test]
async fn test_validate_passes_corrupted_body() -> Result<()> {
    // Validation is header-only; the broken body is found at composition time
    let test_dirs = setup_test_dirs("validate_corrupted_body").await;
    let path = test_dirs.source_dir.join("broken.jpg");
    create_corrupted_jpeg(&path).await?;
    assert!(validate(&path).valid);
    Ok(())
}

// --- Repair chain ---

#[tokio::test]
async fn test_repair_passthrough_for_healthy_image() -> Result<()> {
    let test_dirs = setup_test_dirs("repair_passthrough").await;
    let path = test_dirs.source_dir.join("ok.jpg");
    create_jpeg(&path, 200, 300).await?;

    let outcome = Repairer::default().repair(&path);
    assert_eq!(outcome, RepairOutcome::Passthrough);
    assert!(!path.with_file_name("ok_fixed.jpg").exists());
    Ok(())
}

#[tokio::test]
async fn test_repair_normalizes_unsupported_container() -> Result<()> {
    let test_dirs = setup_test_dirs("repair_webp").await;
    let path = test_dirs.source_dir.join("page.webp");
    create_webp(&path, 120, 180).await?;

    let outcome = Repairer::default().repair(&path);
    let RepairOutcome::Repaired { path: fixed, tier, reason } = outcome else {
        panic!("Expected a normalized image, got {:?}", outcome);
    };
    assert_eq!(tier, RepairTier::Normalize);
    assert_eq!(reason, "unsupported container format: WebP");
    assert_eq!(fixed, test_dirs.source_dir.join("page_fixed.jpg"));

    let repaired = image::open(&fixed)?;
    assert_eq!(repaired.dimensions(), (120, 180));
    assert_eq!(
        image::ImageFormat::from_path(&fixed)?,
        image::ImageFormat::Jpeg
    );
    Ok(())
}

#[tokio::test]
async fn test_repair_caps_tall_images() -> Result<()> {
    let test_dirs = setup_test_dirs("repair_tall").await;
    let path = test_dirs.source_dir.join("strip.png");
    create_png(&path, 100, 12_000).await?;

    let repairer = Repairer::default();
    let outcome = timeout(
        LONG_TEST_TIMEOUT,
        tokio::task::spawn_blocking(move || repairer.repair(&path)),
    )
    .await
    .expect("Test timed out")?;

    let RepairOutcome::Repaired { path: fixed, tier, reason } = outcome else {
        panic!("Expected a normalized image, got {:?}", outcome);
    };
    assert_eq!(tier, RepairTier::Normalize);
    assert_eq!(reason, "image too tall (12000px)");

    let (width, height) = image::open(&fixed)?.dimensions();
    assert_eq!(height, 8_000);
    assert!(width <= 100);
    Ok(())
}

#[tokio::test]
async fn test_repair_rewrites_progressive_jpeg_as_baseline() -> Result<()> {
    let test_dirs = setup_test_dirs("repair_progressive").await;
    let path = test_dirs.source_dir.join("scan.jpg");
    create_progressive_jpeg(&path, 300, 500).await?;
    assert!(scan_jpeg_frame(&std::fs::read(&path)?).is_some_and(|f| f.progressive));

    let outcome = Repairer::default().repair(&path);
    let RepairOutcome::Repaired { path: fixed, tier, reason } = outcome else {
        panic!("Expected a normalized image, got {:?}", outcome);
    };
    assert_eq!(tier, RepairTier::Normalize);
    assert_eq!(reason, "progressive JPEG");

    let frame = scan_jpeg_frame(&std::fs::read(&fixed)?).expect("JPEG frame header");
    assert!(!frame.progressive);
    assert_eq!((frame.width, frame.height), (300, 500));
    assert_eq!(image::open(&fixed)?.dimensions(), (300, 500));
    Ok(())
}

#[tokio::test]
async fn test_repair_reencodes_large_pixel_count_without_resizing() -> Result<()> {
    let test_dirs = setup_test_dirs("repair_pixel_count").await;
    let path = test_dirs.source_dir.join("spread.png");
    create_png(&path, 200, 100).await?;

    let limits = RepairLimits {
        max_pixel_count: 10_000,
        ..RepairLimits::default()
    };
    let outcome = Repairer::new(limits).repair(&path);
    let RepairOutcome::Repaired { path: fixed, tier, reason } = outcome else {
        panic!("Expected a normalized image, got {:?}", outcome);
    };
    assert_eq!(tier, RepairTier::Normalize);
    assert_eq!(reason, "pixel count too large (20000)");
    assert_eq!(image::open(&fixed)?.dimensions(), (200, 100));
    Ok(())
}

#[tokio::test]
async fn test_recover_downscales_wide_images() -> Result<()> {
    let test_dirs = setup_test_dirs("repair_emergency").await;
    let path = test_dirs.source_dir.join("wide.jpg");
    create_jpeg(&path, 1_000, 500).await?;

    let outcome = Repairer::default().recover(&path);
    let RepairOutcome::Repaired { path: fixed, tier, reason } = outcome else {
        panic!("Expected an emergency recovery, got {:?}", outcome);
    };
    assert_eq!(tier, RepairTier::Emergency);
    assert_eq!(reason, EMERGENCY_REASON);
    assert_eq!(fixed, test_dirs.source_dir.join("wide_recovered.jpg"));
    assert_eq!(image::open(&fixed)?.dimensions(), (720, 360));
    Ok(())
}

#[tokio::test]
async fn test_recover_keeps_small_images_unscaled() -> Result<()> {
    let test_dirs = setup_test_dirs("repair_emergency_small").await;
    let path = test_dirs.source_dir.join("small.jpg");
    create_jpeg(&path, 300, 400).await?;

    let outcome = Repairer::default().recover(&path);
    let fixed = outcome.fixed_path().expect("recovered path").clone();
    assert_eq!(image::open(&fixed)?.dimensions(), (300, 400));
    Ok(())
}

#[tokio::test]
async fn test_repair_falls_back_to_placeholder() -> Result<()> {
    let test_dirs = setup_test_dirs("repair_placeholder").await;
    let path = test_dirs.source_dir.join("broken.jpg");
    create_corrupted_jpeg(&path).await?;

    let outcome = Repairer::default().repair(&path);
    let RepairOutcome::Placeholder { path: fixed, reason } = outcome else {
        panic!("Expected a placeholder, got {:?}", outcome);
    };
    assert_eq!(reason, PLACEHOLDER_REASON);
    assert_eq!(fixed, test_dirs.source_dir.join("broken_placeholder.jpg"));
    assert_eq!(image::open(&fixed)?.dimensions(), (720, 1_000));
    Ok(())
}

#[tokio::test]
async fn test_repair_is_fatal_when_nothing_can_be_written() {
    let path = PathBuf::from(common::TEST_TMP_DIR)
        .join("does-not-exist")
        .join("nowhere")
        .join("ghost.jpg");

    let outcome = Repairer::default().recover(&path);
    match outcome {
        RepairOutcome::Fatal { reasons } => {
            assert_eq!(reasons.len(), 2);
            assert!(reasons[0].starts_with(EMERGENCY_REASON));
            assert!(reasons[1].starts_with("placeholder"));
        }
        other => panic!("Expected a fatal outcome, got {:?}", other),
    }
}

#[tokio::test]
async fn test_custom_repair_limits() -> Result<()> {
    let test_dirs = setup_test_dirs("repair_custom_limits").await;
    let path = test_dirs.source_dir.join("broken.jpg");
    create_corrupted_jpeg(&path).await?;

    let limits = RepairLimits {
        placeholder_width: 200,
        placeholder_height: 100,
        ..RepairLimits::default()
    };
    let outcome = Repairer::new(limits).repair(&path);
    let fixed = outcome.fixed_path().expect("placeholder path").clone();
    assert_eq!(image::open(&fixed)?.dimensions(), (200, 100));
    Ok(())
}

// --- Collection ---

#[tokio::test]
async fn test_collect_sorts_chapters_and_pages_numerically() -> Result<()> {
    let test_dirs = setup_test_dirs("collect_sorting").await;
    let source = &test_dirs.source_dir;
    create_dummy_image(&source.join("Chapter 10").join("1.jpg")).await?;
    create_dummy_image(&source.join("Chapter 2").join("10.jpg")).await?;
    create_dummy_image(&source.join("Chapter 2").join("2.jpg")).await?;
    create_dummy_image(&source.join("Chapter 2").join("1.jpg")).await?;
    create_dummy_image(&source.join("Extras").join("cover.jpg")).await?;

    let collector = Collector::new(source, None, None);
    let chapters = collector.collect_chapter_set().await?;

    let names: Vec<&str> = chapters.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Extras", "Chapter 2", "Chapter 10"]);
    assert_eq!(chapters.chapters[0].number, 0.0);
    assert_eq!(chapters.chapters[2].number, 10.0);

    let pages: Vec<String> = chapters.chapters[1]
        .pages
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(pages, vec!["1.jpg", "2.jpg", "10.jpg"]);
    assert_eq!(chapters.total_images(), 5);
    Ok(())
}

#[tokio::test]
async fn test_collect_pages_filters_non_images_and_artifacts() -> Result<()> {
    let test_dirs = setup_test_dirs("collect_filtering").await;
    let chapter = test_dirs.source_dir.join("Chapter 1");
    create_dummy_image(&chapter.join("001.jpg")).await?;
    create_png(&chapter.join("002.PNG"), 20, 20).await?;
    create_dummy_image(&chapter.join("001_fixed.jpg")).await?;
    create_dummy_image(&chapter.join("003_placeholder.jpg")).await?;
    create_dummy_image(&chapter.join(".hidden.jpg")).await?;
    write_bytes(&chapter.join("info.txt"), b"scanlation credits").await?;
    write_bytes(&chapter.join("pages.pdf"), b"%PDF-1.4").await?;
    tokio::fs::create_dir_all(chapter.join("nested")).await?;

    let collector = Collector::new(&test_dirs.source_dir, None, None);
    let pages = collector.collect_pages(&chapter).await?;
    assert_eq!(pages, vec![chapter.join("001.jpg"), chapter.join("002.PNG")]);
    Ok(())
}

#[tokio::test]
async fn test_collect_with_custom_regex() -> Result<()> {
    let test_dirs = setup_test_dirs("collect_custom_regex").await;
    let source = &test_dirs.source_dir;
    create_dummy_image(&source.join("Vol.2 Ch.1").join("p1.jpg")).await?;
    create_dummy_image(&source.join("Vol.1 Ch.7").join("p1.jpg")).await?;

    let regex = Regex::new(r"Ch\.(\d+)")?;
    let collector = Collector::new(source, Some(&regex), None);
    let chapters = collector.collect_chapters().await?;
    assert_eq!(
        chapters,
        vec![source.join("Vol.2 Ch.1"), source.join("Vol.1 Ch.7")]
    );
    Ok(())
}

#[tokio::test]
async fn test_collect_reports_unreadable_directory() {
    let missing = PathBuf::from(common::TEST_TMP_DIR).join("no-such-manga");
    let result = Collector::collect_entries(&missing, true).await;
    assert!(matches!(result, Err(Error::InvalidPath(_, _))));
}

// --- PDF generator ---

#[tokio::test]
async fn test_pdf_generator_writes_image_and_error_pages() -> Result<()> {
    let test_dirs = setup_test_dirs("pdf_generator").await;
    let first = test_dirs.source_dir.join("1.jpg");
    let second = test_dirs.source_dir.join("2.png");
    let broken = test_dirs.source_dir.join("3.jpg");
    create_jpeg(&first, 400, 600).await?;
    create_png(&second, 50, 50).await?;
    create_corrupted_jpeg(&broken).await?;

    let mut pdf = Pdf::new(&test_dirs.base_dir, "generator")?;
    pdf.add_page(&first).await?.add_page(&second).await?;
    assert_eq!(pdf.page_count(), 2);

    // A failed page must leave the document untouched
    assert!(pdf.add_page(&broken).await.is_err());
    assert_eq!(pdf.page_count(), 2);

    pdf.add_error_page(&ErrorPage {
        file_name: "3.jpg".to_string(),
        chapter: "Chapter 1".to_string(),
        message: "could not decode image".to_string(),
    })?;
    assert_eq!(pdf.page_count(), 3);

    let output = timeout(TEST_TIMEOUT, pdf.save())
        .await
        .expect("Test timed out")?;
    assert_eq!(output, test_dirs.base_dir.join("generator.pdf"));
    assert_eq!(pdf_page_count(&output), 3);
    Ok(())
}

#[tokio::test]
async fn test_pdf_generator_rejects_webp() -> Result<()> {
    let test_dirs = setup_test_dirs("pdf_generator_webp").await;
    let path = test_dirs.source_dir.join("1.webp");
    create_webp(&path, 40, 40).await?;

    let mut pdf = Pdf::new(&test_dirs.base_dir, "webp")?;
    let result = pdf.add_page(&path).await.map(|_| ());
    assert!(matches!(result, Err(Error::Unsupported(_))));
    assert_eq!(pdf.page_count(), 0);
    Ok(())
}

// --- Configuration ---

#[tokio::test]
async fn test_builder_and_preflight() -> Result<()> {
    let test_dirs = setup_test_dirs("builder_preflight").await;

    let config = TankobonConfig::builder()
        .source_path(test_dirs.source_dir.clone())
        .output_name("Volume 1")
        .title("Volume One")
        .chapter_name_regex_str(r"Chapter (\d+)")
        .build()?;
    config.preflight_check()?;
    assert_eq!(config.output_path(), test_dirs.source_dir.join("Volume 1.pdf"));
    assert_eq!(
        config.report_path(),
        test_dirs
            .source_dir
            .join("enhanced-pdf-generation-report.txt")
    );

    let result = TankobonConfig::builder()
        .chapter_name_regex_str("[unclosed")
        .build();
    assert!(result.is_err());

    let missing = TankobonConfig::builder()
        .source_path(test_dirs.base_dir.join("missing"))
        .build()?;
    assert!(matches!(missing.preflight_check(), Err(Error::NotFound(_))));

    let file_path = test_dirs.base_dir.join("file.jpg");
    create_tiny_file(&file_path).await?;
    let not_a_dir = TankobonConfig::builder().source_path(file_path).build()?;
    assert!(matches!(
        not_a_dir.preflight_check(),
        Err(Error::InvalidPath(_, _))
    ));

    let unset = TankobonConfig::builder().build()?;
    assert!(unset.preflight_check().is_err());
    Ok(())
}
