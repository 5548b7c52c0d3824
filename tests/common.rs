//! Common test utilities and constants for the Tankobon crate.
//!
//! Provides functions for setting up test directories, writing healthy and
//! broken image files, and inspecting generated PDFs.

use image::{ImageFormat, Rgb, RgbImage};
use rand::{Rng, distributions::Alphanumeric};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tankobon::error::{Error, Result};
use tokio::fs;

#[allow(dead_code)]
pub const TEST_TMP_DIR: &str = "tests/tmp";
#[allow(dead_code)]
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);
#[allow(dead_code)]
pub const LONG_TEST_TIMEOUT: Duration = Duration::from_secs(120); // Repairs of tall images can be slow

/// Directories used by a single test.
#[allow(dead_code)]
pub struct TestDirs {
    pub base_dir: PathBuf,
    pub source_dir: PathBuf,
}

/// Creates a fresh, uniquely named test directory with a `source` folder inside.
#[allow(dead_code)]
pub async fn setup_test_dirs(sub_path: &str) -> TestDirs {
    let rand_string: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(8)
        .map(char::from)
        .collect();
    let base_dir = PathBuf::from(TEST_TMP_DIR).join(format!("{}-{}", sub_path, rand_string));
    if base_dir.exists() {
        fs::remove_dir_all(&base_dir).await.unwrap();
    }
    let source_dir = base_dir.join("source");
    fs::create_dir_all(&source_dir).await.unwrap();

    TestDirs {
        base_dir,
        source_dir,
    }
}

async fn save_image(path: &Path, img: RgbImage, format: ImageFormat) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let path_clone = path.to_path_buf();
    tokio::task::spawn_blocking(move || img.save_with_format(path_clone, format))
        .await
        .map_err(Error::Join)?
        .map_err(Error::Image)?;
    Ok(())
}

fn solid(width: u32, height: u32, color: Rgb<u8>) -> RgbImage {
    RgbImage::from_pixel(width, height, color)
}

/// Creates a baseline JPEG of the given size.
#[allow(dead_code)]
pub async fn create_jpeg(path: &Path, width: u32, height: u32) -> Result<()> {
    save_image(path, solid(width, height, Rgb([255, 0, 0])), ImageFormat::Jpeg).await
}

/// Creates a small red JPEG page.
#[allow(dead_code)]
pub async fn create_dummy_image(path: &Path) -> Result<()> {
    create_jpeg(path, 100, 150).await
}

/// Creates a progressive JPEG, which the PDF writer cannot embed verbatim.
#[allow(dead_code)]
pub async fn create_progressive_jpeg(path: &Path, width: u16, height: u16) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let pixels: Vec<u8> = (0..width as usize * height as usize)
        .flat_map(|i| [(i % 251) as u8, 64, 192])
        .collect();
    let path_clone = path.to_path_buf();
    tokio::task::spawn_blocking(move || {
        let mut encoder = jpeg_encoder::Encoder::new_file(&path_clone, 90)?;
        encoder.set_progressive(true);
        encoder.encode(&pixels, width, height, jpeg_encoder::ColorType::Rgb)
    })
    .await
    .map_err(Error::Join)?
    .map_err(|e| Error::Other(e.to_string()))?;
    Ok(())
}

/// Creates a PNG of the given size.
#[allow(dead_code)]
pub async fn create_png(path: &Path, width: u32, height: u32) -> Result<()> {
    save_image(path, solid(width, height, Rgb([0, 0, 255])), ImageFormat::Png).await
}

/// Creates a lossless WebP image, a format PDF pages cannot embed directly.
#[allow(dead_code)]
pub async fn create_webp(path: &Path, width: u32, height: u32) -> Result<()> {
    save_image(path, solid(width, height, Rgb([0, 128, 0])), ImageFormat::WebP).await
}

/// Creates a file with a valid JPEG signature and an undecodable body.
#[allow(dead_code)]
pub async fn create_corrupted_jpeg(path: &Path) -> Result<()> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.extend(std::iter::repeat(0u8).take(2048));
    write_bytes(path, &bytes).await
}

/// Creates a JPEG-signed file below the minimum size accepted by validation.
#[allow(dead_code)]
pub async fn create_tiny_file(path: &Path) -> Result<()> {
    let mut bytes = vec![0xFF, 0xD8, 0xFF, 0xE0];
    bytes.extend(std::iter::repeat(0u8).take(40));
    write_bytes(path, &bytes).await
}

/// Writes `bytes` verbatim, creating parent directories.
#[allow(dead_code)]
pub async fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(path, bytes).await?;
    Ok(())
}

/// Asserts the PDF exists, parses, and returns its page count.
#[allow(dead_code)]
pub fn pdf_page_count(path: &Path) -> usize {
    assert!(path.is_file(), "Output PDF does not exist: {:?}", path);
    let document = lopdf::Document::load(path).unwrap();
    document.get_pages().len()
}

/// Lists every file below `dir` whose name carries a repair suffix.
#[allow(dead_code)]
pub fn leftover_artifacts(dir: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    let mut stack = vec![dir.to_path_buf()];
    while let Some(current) = stack.pop() {
        for entry in std::fs::read_dir(&current).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else if tankobon::path_utils::is_intermediate_artifact(&path) {
                found.push(path);
            }
        }
    }
    found
}
