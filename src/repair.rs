//! Three-tier image repair engine.
//!
//! [`Repairer::repair`] walks a strictly ordered chain:
//!
//! 1. **Normalize**: read only the header. If the image is progressive, in a
//!    container the PDF writer cannot embed, too tall, or too large in pixel
//!    count, re-encode it as a baseline JPEG with the height capped.
//! 2. **Emergency**: entered when tier 1 errors. Decode with limits disabled and
//!    a format fallback, then force the raster into a bounded canvas with
//!    nearest-neighbour scaling.
//! 3. **Placeholder**: entered when tier 2 errors. Write a neutral grey filler.
//!
//! Every tier writes a sibling file next to the original. The caller owns it
//! and deletes it once the page is composed, see [`TempArtifact`].

use std::fmt;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, ImageReader, Rgb, RgbImage};
use log::{debug, warn};

use crate::error::{Error, Result};
use crate::path_utils::{artifact_path, get_file_name_lossy};
use crate::types::{RepairOutcome, RepairTier};

pub const EMERGENCY_REASON: &str = "emergency recovery";
pub const PLACEHOLDER_REASON: &str = "placeholder for corrupted image";

/// Neutral grey used for synthetic filler images.
const PLACEHOLDER_GRAY: [u8; 3] = [200, 200, 200];

/// Thresholds and output parameters of the repair chain.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RepairLimits {
    /// Images taller than this are normalized.
    pub tall_image_height: u32,
    /// Images with more pixels than this are normalized.
    pub max_pixel_count: u64,
    /// Height cap applied when re-encoding in the normalize tier.
    pub normalized_max_height: u32,
    pub normalize_quality: u8,
    pub emergency_max_width: u32,
    pub emergency_max_height: u32,
    pub emergency_quality: u8,
    pub placeholder_width: u32,
    pub placeholder_height: u32,
}

impl Default for RepairLimits {
    fn default() -> Self {
        Self {
            tall_image_height: 10_000,
            max_pixel_count: 50_000_000,
            normalized_max_height: 8_000,
            normalize_quality: 92,
            emergency_max_width: 720,
            emergency_max_height: 8_000,
            emergency_quality: 85,
            placeholder_width: 720,
            placeholder_height: 1_000,
        }
    }
}

/// The normalize-tier predicate that fired for an image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeTrigger {
    Progressive,
    ContainerFormat(ImageFormat),
    TooTall(u32),
    TooManyPixels(u64),
}

impl fmt::Display for NormalizeTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NormalizeTrigger::Progressive => write!(f, "progressive JPEG"),
            NormalizeTrigger::ContainerFormat(format) => {
                write!(f, "unsupported container format: {:?}", format)
            }
            NormalizeTrigger::TooTall(height) => write!(f, "image too tall ({}px)", height),
            NormalizeTrigger::TooManyPixels(pixels) => {
                write!(f, "pixel count too large ({})", pixels)
            }
        }
    }
}

impl RepairLimits {
    /// Evaluates the normalize decision table, first match wins.
    ///
    /// JPEG and PNG are the primary formats; anything else is re-encoded.
    pub fn normalize_trigger(
        &self,
        format: ImageFormat,
        width: u32,
        height: u32,
        progressive: bool,
    ) -> Option<NormalizeTrigger> {
        let pixels = width as u64 * height as u64;
        if progressive {
            Some(NormalizeTrigger::Progressive)
        } else if !matches!(format, ImageFormat::Jpeg | ImageFormat::Png) {
            Some(NormalizeTrigger::ContainerFormat(format))
        } else if height > self.tall_image_height {
            Some(NormalizeTrigger::TooTall(height))
        } else if pixels > self.max_pixel_count {
            Some(NormalizeTrigger::TooManyPixels(pixels))
        } else {
            None
        }
    }
}

/// Frame header facts read from a JPEG without decoding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JpegFrame {
    pub progressive: bool,
    pub width: u32,
    pub height: u32,
    pub components: u8,
}

/// Walks JPEG markers up to the first start-of-frame segment.
pub fn scan_jpeg_frame(data: &[u8]) -> Option<JpegFrame> {
    if data.len() < 4 || data[0] != 0xFF || data[1] != 0xD8 {
        return None;
    }

    let mut i = 2;
    while i + 3 < data.len() {
        if data[i] != 0xFF {
            i += 1;
            continue;
        }
        let marker = data[i + 1];
        match marker {
            // Fill byte before a marker
            0xFF => {
                i += 1;
                continue;
            }
            // Standalone markers carry no length field
            0x01 | 0xD0..=0xD8 => {
                i += 2;
                continue;
            }
            // End of image or start of scan before any frame header
            0xD9 | 0xDA => return None,
            _ => {}
        }

        let length = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        let is_frame = matches!(marker, 0xC0..=0xCF) && !matches!(marker, 0xC4 | 0xC8 | 0xCC);
        if is_frame {
            if i + 9 >= data.len() {
                return None;
            }
            return Some(JpegFrame {
                progressive: matches!(marker, 0xC2 | 0xC6 | 0xCA | 0xCE),
                height: u16::from_be_bytes([data[i + 5], data[i + 6]]) as u32,
                width: u16::from_be_bytes([data[i + 7], data[i + 8]]) as u32,
                components: data[i + 9],
            });
        }
        i += 2 + length;
    }
    None
}

/// Encodes `image` as a baseline JPEG.
pub(crate) fn encode_jpeg(image: &DynamicImage, quality: u8) -> Result<Vec<u8>> {
    let rgb = image.to_rgb8();
    let mut buffer = Vec::new();
    rgb.write_with_encoder(JpegEncoder::new_with_quality(&mut buffer, quality))?;
    Ok(buffer)
}

fn write_jpeg(image: &DynamicImage, destination: &Path, quality: u8) -> Result<()> {
    let bytes = encode_jpeg(image, quality)?;
    if let Err(e) = std::fs::write(destination, bytes) {
        // A half-written artifact would never be cleaned up by the caller
        let _ = std::fs::remove_file(destination);
        return Err(e.into());
    }
    Ok(())
}

/// Runs the repair chain with a fixed set of [`RepairLimits`].
#[derive(Debug, Clone, Default)]
pub struct Repairer {
    limits: RepairLimits,
}

impl Repairer {
    pub fn new(limits: RepairLimits) -> Self {
        Self { limits }
    }

    /// Runs tiers 1 → 2 → 3, each entered only if the previous one errors.
    ///
    /// Returns [`RepairOutcome::Passthrough`] when the header shows no known
    /// problem. [`RepairOutcome::Fatal`] is only produced when even the
    /// placeholder cannot be written.
    pub fn repair(&self, path: &Path) -> RepairOutcome {
        match self.normalize(path) {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(
                    "Normalize tier failed for '{}': {}",
                    get_file_name_lossy(path),
                    e
                );
                self.recover_with(path, vec![format!("normalize: {}", e)])
            }
        }
    }

    /// Runs tiers 2 → 3 directly.
    ///
    /// Used for images that already failed to render even though their header
    /// looked healthy, where tier 1 has nothing to offer.
    pub fn recover(&self, path: &Path) -> RepairOutcome {
        self.recover_with(path, Vec::new())
    }

    fn recover_with(&self, path: &Path, mut reasons: Vec<String>) -> RepairOutcome {
        match self.emergency(path) {
            Ok(outcome) => return outcome,
            Err(e) => {
                warn!(
                    "Emergency tier failed for '{}': {}",
                    get_file_name_lossy(path),
                    e
                );
                reasons.push(format!("{}: {}", EMERGENCY_REASON, e));
            }
        }

        match self.placeholder(path) {
            Ok(outcome) => outcome,
            Err(e) => {
                reasons.push(format!("placeholder: {}", e));
                RepairOutcome::Fatal { reasons }
            }
        }
    }

    fn normalize(&self, path: &Path) -> Result<RepairOutcome> {
        let reader = ImageReader::open(path)?.with_guessed_format()?;
        let format = reader.format().ok_or_else(|| {
            Error::Unsupported(format!(
                "Cannot determine image format of '{}'",
                get_file_name_lossy(path)
            ))
        })?;
        let (width, height) = reader.into_dimensions()?;
        let progressive = format == ImageFormat::Jpeg
            && scan_jpeg_frame(&std::fs::read(path)?).is_some_and(|frame| frame.progressive);

        let Some(trigger) = self
            .limits
            .normalize_trigger(format, width, height, progressive)
        else {
            return Ok(RepairOutcome::Passthrough);
        };
        debug!(
            "Normalizing '{}' ({}x{}): {}",
            get_file_name_lossy(path),
            width,
            height,
            trigger
        );

        let image = ImageReader::open(path)?.with_guessed_format()?.decode()?;
        let target_height = height.min(self.limits.normalized_max_height);
        let image = if target_height < height {
            image.resize(width, target_height, FilterType::Lanczos3)
        } else {
            image
        };

        let fixed = artifact_path(path, "_fixed", "jpg");
        write_jpeg(&image, &fixed, self.limits.normalize_quality)?;
        Ok(RepairOutcome::Repaired {
            path: fixed,
            tier: RepairTier::Normalize,
            reason: trigger.to_string(),
        })
    }

    fn emergency(&self, path: &Path) -> Result<RepairOutcome> {
        let image = decode_tolerant(path)?;

        let (width, height) = image.dimensions();
        let (max_width, max_height) = (
            self.limits.emergency_max_width,
            self.limits.emergency_max_height,
        );
        let image = if width > max_width || height > max_height {
            image.resize(max_width, max_height, FilterType::Nearest)
        } else {
            image
        };

        let recovered = artifact_path(path, "_recovered", "jpg");
        write_jpeg(&image, &recovered, self.limits.emergency_quality)?;
        debug!(
            "Recovered '{}' into {}x{}",
            get_file_name_lossy(path),
            image.width(),
            image.height()
        );
        Ok(RepairOutcome::Repaired {
            path: recovered,
            tier: RepairTier::Emergency,
            reason: EMERGENCY_REASON.to_string(),
        })
    }

    fn placeholder(&self, path: &Path) -> Result<RepairOutcome> {
        let canvas = RgbImage::from_pixel(
            self.limits.placeholder_width,
            self.limits.placeholder_height,
            Rgb(PLACEHOLDER_GRAY),
        );
        let placeholder = artifact_path(path, "_placeholder", "jpg");
        write_jpeg(
            &DynamicImage::ImageRgb8(canvas),
            &placeholder,
            self.limits.emergency_quality,
        )?;
        Ok(RepairOutcome::Placeholder {
            path: placeholder,
            reason: PLACEHOLDER_REASON.to_string(),
        })
    }
}

/// Decodes with allocation limits disabled, trying the sniffed format first
/// and the extension's format second.
fn decode_tolerant(path: &Path) -> Result<DynamicImage> {
    let mut candidates: Vec<Option<ImageFormat>> = Vec::with_capacity(2);
    candidates.push(ImageReader::open(path)?.with_guessed_format()?.format());
    let by_extension = ImageFormat::from_path(path).ok();
    if !candidates.contains(&by_extension) {
        candidates.push(by_extension);
    }

    let mut last_error: Option<Error> = None;
    for format in candidates.into_iter().flatten() {
        let mut reader = ImageReader::open(path)?;
        reader.set_format(format);
        reader.no_limits();
        match reader.decode() {
            Ok(image) => return Ok(image),
            Err(e) => last_error = Some(e.into()),
        }
    }

    Err(last_error.unwrap_or_else(|| {
        Error::Unsupported(format!(
            "No decoder available for '{}'",
            get_file_name_lossy(path)
        ))
    }))
}

/// A repair artifact that is removed from disk when dropped.
///
/// Holding the replacement path in this guard keeps cleanup on every exit
/// path of the per-image processing, including early returns and panics.
#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Removed temporary file {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove temporary file {:?}: {}", self.path, e),
        }
    }
}
