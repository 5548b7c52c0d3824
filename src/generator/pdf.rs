use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use image::{DynamicImage, GenericImageView, ImageFormat};
use log::debug;
use memmap2::MmapOptions;
use printpdf::{
    BuiltinFont, ColorBits, ColorSpace, Image, ImageFilter, ImageTransform, ImageXObject,
    IndirectFontRef, Mm, PdfDocument, PdfDocumentReference, Px,
};
use tokio::task::spawn_blocking;

use crate::error::{Error, Result};
use crate::generator::{ErrorPage, Generator};
use crate::path_utils::path_to_string_lossy;
use crate::repair::{encode_jpeg, scan_jpeg_frame};

/// Fixed page width in points.
pub const DEFAULT_PAGE_WIDTH: f32 = 800.0;
/// Generously tall page height in points, so no page image is ever cropped.
pub const DEFAULT_PAGE_HEIGHT: f32 = 15_000.0;
/// Height of diagnostic pages in points.
pub const DEFAULT_ERROR_PAGE_HEIGHT: f32 = 1_000.0;

/// JPEG quality used when a decoded raster has to be re-encoded for embedding.
const EMBED_QUALITY: u8 = 92;
/// Images are placed at one pixel per point, then scaled to the page width.
const IMAGE_DPI: f32 = 72.0;
const LAYER_NAME: &str = "Page";
const ERROR_PAGE_MARGIN: f32 = 40.0;
const ERROR_TEXT_WRAP: usize = 80;

/// Converts PDF points to the millimetres printpdf expects.
fn pt(value: f32) -> Mm {
    Mm(value * 25.4 / 72.0)
}

/// Page geometry, in points.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PageLayout {
    pub page_width: f32,
    pub page_height: f32,
    pub error_page_height: f32,
}

impl Default for PageLayout {
    fn default() -> Self {
        Self {
            page_width: DEFAULT_PAGE_WIDTH,
            page_height: DEFAULT_PAGE_HEIGHT,
            error_page_height: DEFAULT_ERROR_PAGE_HEIGHT,
        }
    }
}

impl PageLayout {
    /// Height an image of `width`×`height` pixels takes once scaled to the page width.
    pub fn scaled_height(&self, width: u32, height: u32) -> f32 {
        self.page_width * height as f32 / width as f32
    }

    /// Height of the page holding such an image.
    ///
    /// The fixed tall height is used unless the scaled image is taller still,
    /// in which case the page grows with it.
    pub fn image_page_height(&self, width: u32, height: u32) -> f32 {
        self.page_height.max(self.scaled_height(width, height))
    }
}

/// An image that has been fully decoded once and is ready to embed.
///
/// Preparing happens before any page is created, so a broken image never
/// leaves an empty page behind.
pub struct PreparedImage {
    pub width: u32,
    pub height: u32,
    grayscale: bool,
    jpeg_data: Vec<u8>,
}

impl PreparedImage {
    /// Reads and verifies the image at `path`.
    pub fn open(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to open image file '{}': {}",
                    path_to_string_lossy(path),
                    e
                ),
            ))
        })?;
        // Read-only map; the file is not modified while the page is prepared
        let mmap = unsafe { MmapOptions::new().map(&file)? };
        Self::from_bytes(&mmap[..])
    }

    /// Verifies `bytes` and produces DCT data for the PDF stream.
    ///
    /// Baseline JPEGs with one or three components are embedded untouched after
    /// a verification decode. Other JPEGs and PNGs are re-encoded. Everything
    /// else is rejected, which sends the image through the repair chain.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        match image::guess_format(bytes)? {
            ImageFormat::Jpeg => {
                let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Jpeg)?;
                match scan_jpeg_frame(bytes) {
                    Some(frame) if !frame.progressive && matches!(frame.components, 1 | 3) => {
                        let (width, height) = decoded.dimensions();
                        Self::checked(width, height, frame.components == 1, bytes.to_vec())
                    }
                    _ => Self::from_decoded(&decoded),
                }
            }
            ImageFormat::Png => {
                let decoded = image::load_from_memory_with_format(bytes, ImageFormat::Png)?;
                Self::from_decoded(&decoded)
            }
            other => Err(Error::Unsupported(format!(
                "{:?} images cannot be embedded in a PDF page",
                other
            ))),
        }
    }

    fn from_decoded(image: &DynamicImage) -> Result<Self> {
        let (width, height) = image.dimensions();
        Self::checked(width, height, false, encode_jpeg(image, EMBED_QUALITY)?)
    }

    fn checked(width: u32, height: u32, grayscale: bool, jpeg_data: Vec<u8>) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(Error::Unsupported(format!(
                "Image has zero dimension ({}x{})",
                width, height
            )));
        }
        Ok(Self {
            width,
            height,
            grayscale,
            jpeg_data,
        })
    }

    fn into_image(self) -> Image {
        Image::from(ImageXObject {
            width: Px(self.width as usize),
            height: Px(self.height as usize),
            color_space: if self.grayscale {
                ColorSpace::Greyscale
            } else {
                ColorSpace::Rgb
            },
            bits_per_component: ColorBits::Bit8,
            interpolate: true,
            image_data: self.jpeg_data,
            image_filter: Some(ImageFilter::DCT),
            clipping_bbox: None,
            smask: None,
        })
    }
}

/// A generator for creating PDF documents with one image per page.
///
/// Each image page is [`PageLayout::page_width`] points wide with zero margin.
/// The image sits at the top-left corner, scaled to the full width with its
/// height following the natural aspect ratio.
pub struct Pdf {
    document: Option<PdfDocumentReference>,
    output_path: PathBuf,
    layout: PageLayout,
    font: Option<IndirectFontRef>,
    page_count: usize,
}

impl Pdf {
    /// Creates a generator with an explicit document title and page layout.
    pub fn with_options(
        output_dir: &Path,
        base_filename: &str,
        title: &str,
        layout: PageLayout,
    ) -> Result<Self> {
        if !output_dir.exists() {
            std::fs::create_dir_all(output_dir)?;
        }

        Ok(Pdf {
            document: Some(PdfDocument::empty(title)),
            output_path: output_dir.join(format!("{}.pdf", base_filename)),
            layout,
            font: None,
            page_count: 0,
        })
    }

    /// Lays a prepared image onto a new page.
    pub fn place(&mut self, prepared: PreparedImage) -> Result<&mut Self> {
        let layout = self.layout;
        let page_height = layout.image_page_height(prepared.width, prepared.height);
        let scale = layout.page_width / prepared.width as f32;
        let scaled_height = layout.scaled_height(prepared.width, prepared.height);

        let document = self.document()?;
        let (page, layer) =
            document.add_page(pt(layout.page_width), pt(page_height), LAYER_NAME);
        let layer = document.get_page(page).get_layer(layer);

        // PDF space grows upwards, so the top edge sits at page_height - scaled_height
        prepared.into_image().add_to_layer(
            layer,
            ImageTransform {
                translate_x: Some(Mm(0.0)),
                translate_y: Some(pt(page_height - scaled_height)),
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(IMAGE_DPI),
                ..Default::default()
            },
        );

        self.page_count += 1;
        Ok(self)
    }

    fn document(&self) -> Result<&PdfDocumentReference> {
        self.document
            .as_ref()
            .ok_or_else(|| Error::Unsupported("PDF document already saved".to_string()))
    }

    fn font(&mut self) -> Result<IndirectFontRef> {
        if let Some(font) = &self.font {
            return Ok(font.clone());
        }
        let font = self.document()?.add_builtin_font(BuiltinFont::Helvetica)?;
        self.font = Some(font.clone());
        Ok(font)
    }
}

/// Makes `text` printable with a builtin font.
///
/// Builtin fonts are WinAnsi encoded and silently drop anything outside
/// Latin-1, so such characters are written as `\u{...}` escapes instead.
fn winansi_text(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c as u32 {
            _ if c.is_control() => out.push('?'),
            0x20..=0xFF => out.push(c),
            _ => out.extend(c.escape_unicode()),
        }
    }
    out
}

/// Splits `text` into lines of at most `width` characters on word boundaries.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        if !current.is_empty() && current.chars().count() + 1 + word.chars().count() > width {
            lines.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

#[async_trait(?Send)]
impl Generator for Pdf {
    fn new(output_dir: &Path, base_filename: &str) -> Result<Self> {
        Self::with_options(output_dir, base_filename, base_filename, PageLayout::default())
    }

    async fn add_page(&mut self, image_path: &Path) -> Result<&mut Self> {
        let path = image_path.to_path_buf();
        let prepared = spawn_blocking(move || PreparedImage::open(&path)).await??;
        debug!(
            "Placing {}x{} image from {:?}",
            prepared.width, prepared.height, image_path
        );
        self.place(prepared)
    }

    fn add_error_page(&mut self, page: &ErrorPage) -> Result<&mut Self> {
        let font = self.font()?;
        let layout = self.layout;
        let document = self.document()?;
        let (page_index, layer) = document.add_page(
            pt(layout.page_width),
            pt(layout.error_page_height),
            LAYER_NAME,
        );
        let layer = document.get_page(page_index).get_layer(layer);

        let mut lines: Vec<(String, f32)> = vec![
            ("Image could not be rendered".to_string(), 24.0),
            (format!("File: {}", winansi_text(&page.file_name)), 14.0),
            (format!("Chapter: {}", winansi_text(&page.chapter)), 14.0),
        ];
        lines.extend(
            wrap_text(
                &format!("Error: {}", winansi_text(&page.message)),
                ERROR_TEXT_WRAP,
            )
                .into_iter()
                .map(|line| (line, 12.0)),
        );

        let mut y = layout.error_page_height - ERROR_PAGE_MARGIN * 2.0;
        for (text, size) in lines {
            layer.use_text(text, size, pt(ERROR_PAGE_MARGIN), pt(y), &font);
            y -= size * 1.8;
        }

        self.page_count += 1;
        Ok(self)
    }

    fn page_count(&self) -> usize {
        self.page_count
    }

    async fn save(mut self) -> Result<PathBuf> {
        let document = self
            .document
            .take()
            .ok_or_else(|| Error::Unsupported("PDF document already saved".to_string()))?;

        // The document handle is not Send, so it is serialized on this task
        let file = File::create(&self.output_path)?;
        let mut writer = BufWriter::new(file);
        document.save(&mut writer)?;
        writer.flush()?;

        Ok(self.output_path)
    }
}
