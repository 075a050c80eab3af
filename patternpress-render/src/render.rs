//! Auto-sized, centered text rendering.
//!
//! [`AutoSizeRenderer`] binary-searches the font size range for the largest
//! size at which [`fit_text`] succeeds, lays the wrapped lines out centered on
//! the canvas and paints them onto a transparent RGBA image.

use std::path::{Path, PathBuf};

use image::codecs::png::PngEncoder;
use image::{ExtendedColorType, ImageEncoder, RgbaImage};

use crate::color::Rgba;
use crate::error::{RenderError, Result};
use crate::fit::{FitResult, fit_text, line_spacing};
use crate::font::{FontMetrics, GlyphPainter};

/// Inclusive font size search bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeRange {
    min: u32,
    max: u32,
}

impl Default for SizeRange {
    fn default() -> Self {
        Self { min: 1, max: 500 }
    }
}

impl SizeRange {
    /// Build a range, rejecting `min == 0` and `min > max`.
    pub fn new(min: u32, max: u32) -> Result<Self> {
        if min == 0 || min > max {
            return Err(RenderError::InvalidSizeRange { min, max });
        }
        Ok(Self { min, max })
    }

    pub fn min(&self) -> u32 {
        self.min
    }

    pub fn max(&self) -> u32 {
        self.max
    }
}

/// One render call's input.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderRequest {
    pub text: String,
    pub width: u32,
    pub height: u32,
    pub color: Rgba,
}

impl RenderRequest {
    pub fn new(text: impl Into<String>, width: u32, height: u32, color: Rgba) -> Self {
        Self {
            text: text.into(),
            width,
            height,
            color,
        }
    }

    fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::InvalidCanvas {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

/// A wrapped line with its top-left position on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedLine {
    pub text: String,
    pub x: f32,
    pub y: f32,
    pub width: f32,
}

/// The solved layout for one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Layout {
    pub font_size: u32,
    pub lines: Vec<PlacedLine>,
    /// Wrapped block height plus the last line's descender.
    pub extent: f32,
}

/// A rendered image written to disk.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedImage {
    pub path: PathBuf,
    pub width_px: u32,
    pub height_px: u32,
    pub font_size: u32,
    pub lines: Vec<String>,
}

/// Largest size in `range` at which `text` fits a `width` x `height` box.
///
/// Assumes the fit predicate is monotonic in size: if a size fits, every
/// smaller size fits too.
pub fn search_font_size<M: FontMetrics + ?Sized>(
    metrics: &M,
    text: &str,
    width: u32,
    height: u32,
    range: SizeRange,
) -> Result<(u32, FitResult)> {
    let (w, h) = (width as f32, height as f32);
    let mut low = range.min;
    let mut high = range.max;
    let mut best: Option<(u32, FitResult)> = None;

    while low <= high {
        let mid = low + (high - low) / 2;
        let fit = fit_text(metrics, mid, text, w, h);
        if fit.fits {
            best = Some((mid, fit));
            match mid.checked_add(1) {
                Some(next) => low = next,
                None => break,
            }
        } else if mid == 0 {
            break;
        } else {
            high = mid - 1;
        }
    }

    best.ok_or_else(|| RenderError::TextDoesNotFit {
        text: text.to_owned(),
        width,
        height,
    })
}

/// Finds the largest fitting font size and renders centered text.
#[derive(Debug)]
pub struct AutoSizeRenderer<F> {
    face: F,
    range: SizeRange,
}

impl<F: GlyphPainter> AutoSizeRenderer<F> {
    /// Renderer searching the default `1..=500` range.
    pub fn new(face: F) -> Self {
        Self {
            face,
            range: SizeRange::default(),
        }
    }

    pub fn with_range(mut self, range: SizeRange) -> Self {
        self.range = range;
        self
    }

    pub fn range(&self) -> SizeRange {
        self.range
    }

    pub fn face(&self) -> &F {
        &self.face
    }

    /// Solve font size and line positions without painting.
    pub fn layout(&self, request: &RenderRequest) -> Result<Layout> {
        request.validate()?;
        let (size, fit) = search_font_size(
            &self.face,
            &request.text,
            request.width,
            request.height,
            self.range,
        )?;

        let metrics = self.face.line_metrics(size);
        let advance = metrics.line_height() + line_spacing(size);
        let extent = fit.total_height + metrics.descent;
        let mut y = (request.height as f32 - extent) / 2.0;

        let mut lines = Vec::with_capacity(fit.lines.len());
        for text in fit.lines {
            let width = self.face.text_width(size, &text);
            let x = (request.width as f32 - width) / 2.0;
            lines.push(PlacedLine { text, x, y, width });
            y += advance;
        }

        tracing::debug!(
            font_size = size,
            lines = lines.len(),
            width = request.width,
            height = request.height,
            "solved text layout"
        );

        Ok(Layout {
            font_size: size,
            lines,
            extent,
        })
    }

    /// Paint the request onto a fresh transparent canvas.
    pub fn paint(&self, request: &RenderRequest) -> Result<(Layout, RgbaImage)> {
        let layout = self.layout(request)?;
        let mut canvas = RgbaImage::from_pixel(
            request.width,
            request.height,
            image::Rgba([255, 255, 255, 0]),
        );
        for line in &layout.lines {
            self.face.draw_line(
                &mut canvas,
                line.x,
                line.y,
                layout.font_size,
                &line.text,
                request.color,
            );
        }
        Ok((layout, canvas))
    }

    /// Paint and encode as PNG bytes.
    pub fn render_png(&self, request: &RenderRequest) -> Result<(Layout, Vec<u8>)> {
        let (layout, canvas) = self.paint(request)?;
        Ok((layout, encode_png(&canvas)?))
    }

    /// Paint, encode and write to `path`, creating parent directories and
    /// replacing any existing file. Nothing touches the filesystem when the
    /// text cannot be fitted.
    pub fn render_to_file(&self, request: &RenderRequest, path: &Path) -> Result<RenderedImage> {
        let (layout, png) = self.render_png(request)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, png)?;
        tracing::info!(
            path = %path.display(),
            font_size = layout.font_size,
            "rendered text image"
        );
        Ok(RenderedImage {
            path: path.to_path_buf(),
            width_px: request.width,
            height_px: request.height,
            font_size: layout.font_size,
            lines: layout.lines.into_iter().map(|l| l.text).collect(),
        })
    }
}

/// Encode an RGBA canvas as PNG.
pub fn encode_png(canvas: &RgbaImage) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    PngEncoder::new(&mut buf)
        .write_image(
            canvas.as_raw(),
            canvas.width(),
            canvas.height(),
            ExtendedColorType::Rgba8,
        )
        .map_err(|e| RenderError::Encode(e.to_string()))?;
    Ok(buf)
}
