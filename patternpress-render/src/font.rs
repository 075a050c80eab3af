//! Font metrics and glyph painting.
//!
//! The fitting and layout code only needs [`FontMetrics`]; painting needs
//! [`GlyphPainter`]. [`RusttypeFace`] implements both over a TrueType or
//! OpenType file.

use std::path::{Path, PathBuf};

use image::RgbaImage;
use rusttype::{Font, Scale, point};

use crate::color::Rgba;
use crate::error::RenderError;

/// Vertical metrics for one font size, both measured as positive pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LineMetrics {
    /// Distance from the top of the line box to the baseline.
    pub ascent: f32,
    /// Distance from the baseline to the bottom of the line box.
    pub descent: f32,
}

impl LineMetrics {
    /// Height of a single line without spacing.
    pub fn line_height(&self) -> f32 {
        self.ascent + self.descent
    }
}

/// Size-dependent text measurement.
///
/// Implementations must be monotonic: a larger size never yields a smaller
/// width or line height for the same text. The font size search relies on it.
pub trait FontMetrics: Send + Sync {
    /// Ascent/descent at `size`.
    fn line_metrics(&self, size: u32) -> LineMetrics;

    /// Advance width of `text` set on one line at `size`.
    fn text_width(&self, size: u32, text: &str) -> f32;
}

/// A [`FontMetrics`] that can also rasterise a line of text.
pub trait GlyphPainter: FontMetrics {
    /// Paint `text` with its line box top-left corner at (`x`, `y`).
    fn draw_line(&self, canvas: &mut RgbaImage, x: f32, y: f32, size: u32, text: &str, color: Rgba);
}

/// Well-known font locations, tried in order by [`RusttypeFace::discover`].
pub const SYSTEM_FONT_CANDIDATES: &[&str] = &[
    "/Library/Fonts/Arial.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Helvetica.ttf",
    "/System/Library/Fonts/Supplemental/Helvetica.ttf",
    "/Library/Fonts/Times New Roman.ttf",
    "C:\\Windows\\Fonts\\Arial.ttf",
    "C:\\Windows\\Fonts\\times.ttf",
    "C:\\Windows\\Fonts\\verdana.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
];

/// A scalable font face backed by `rusttype`.
///
/// Sizes are em sizes in pixels, so `size` 100 yields glyphs whose em box is
/// 100 px tall regardless of the font's own ascent/descent ratio.
pub struct RusttypeFace {
    font: Font<'static>,
    path: Option<PathBuf>,
    /// `(ascent - descent) / units_per_em`, converts em size to rusttype scale.
    height_per_em: f32,
}

impl std::fmt::Debug for RusttypeFace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RusttypeFace")
            .field("path", &self.path)
            .field("height_per_em", &self.height_per_em)
            .finish()
    }
}

impl RusttypeFace {
    /// Parse a face from raw font bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, RenderError> {
        let font = Font::try_from_vec(bytes)
            .ok_or_else(|| RenderError::Font("unsupported or corrupt font data".into()))?;
        let unscaled = font.v_metrics_unscaled();
        let units_per_em = f32::from(font.units_per_em().max(1));
        let height_per_em = (unscaled.ascent - unscaled.descent) / units_per_em;
        Ok(Self {
            font,
            path: None,
            height_per_em,
        })
    }

    /// Load a face from a font file.
    pub fn from_file(path: &Path) -> Result<Self, RenderError> {
        let bytes = std::fs::read(path)?;
        let mut face = Self::from_bytes(bytes)
            .map_err(|e| RenderError::Font(format!("{}: {e}", path.display())))?;
        face.path = Some(path.to_path_buf());
        Ok(face)
    }

    /// Load `explicit` if given, otherwise the first existing entry of
    /// [`SYSTEM_FONT_CANDIDATES`].
    pub fn discover(explicit: Option<&Path>) -> Result<Self, RenderError> {
        if let Some(path) = explicit {
            return Self::from_file(path);
        }
        let mut tried = Vec::with_capacity(SYSTEM_FONT_CANDIDATES.len());
        for candidate in SYSTEM_FONT_CANDIDATES {
            let path = PathBuf::from(candidate);
            if path.is_file() {
                tracing::debug!(font = %path.display(), "using system font");
                return Self::from_file(&path);
            }
            tried.push(path);
        }
        Err(RenderError::FontNotFound(tried))
    }

    /// Path the face was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn scale(&self, size: u32) -> Scale {
        Scale::uniform(size as f32 * self.height_per_em)
    }
}

impl FontMetrics for RusttypeFace {
    fn line_metrics(&self, size: u32) -> LineMetrics {
        let v = self.font.v_metrics(self.scale(size));
        LineMetrics {
            ascent: v.ascent.ceil(),
            descent: (-v.descent).ceil(),
        }
    }

    fn text_width(&self, size: u32, text: &str) -> f32 {
        let scale = self.scale(size);
        self.font
            .layout(text, scale, point(0.0, 0.0))
            .last()
            .map(|g| g.position().x + g.unpositioned().h_metrics().advance_width)
            .unwrap_or(0.0)
    }
}

impl GlyphPainter for RusttypeFace {
    fn draw_line(&self, canvas: &mut RgbaImage, x: f32, y: f32, size: u32, text: &str, color: Rgba) {
        let scale = self.scale(size);
        let ascent = self.line_metrics(size).ascent;
        let (cw, ch) = canvas.dimensions();
        for glyph in self.font.layout(text, scale, point(x, y + ascent)) {
            let Some(bb) = glyph.pixel_bounding_box() else {
                continue;
            };
            glyph.draw(|gx, gy, coverage| {
                let px = gx as i32 + bb.min.x;
                let py = gy as i32 + bb.min.y;
                if px < 0 || py < 0 || px as u32 >= cw || py as u32 >= ch {
                    return;
                }
                blend_over(canvas.get_pixel_mut(px as u32, py as u32), color, coverage);
            });
        }
    }
}

/// Source-over compositing of `color` at `coverage` onto `dst`.
pub fn blend_over(dst: &mut image::Rgba<u8>, color: Rgba, coverage: f32) {
    let sa = (f32::from(color.a) / 255.0) * coverage.clamp(0.0, 1.0);
    if sa <= 0.0 {
        return;
    }
    let da = f32::from(dst.0[3]) / 255.0;
    let out_a = sa + da * (1.0 - sa);
    let mix = |s: u8, d: u8| -> u8 {
        let v = (f32::from(s) * sa + f32::from(d) * da * (1.0 - sa)) / out_a;
        v.round().clamp(0.0, 255.0) as u8
    };
    dst.0 = [
        mix(color.r, dst.0[0]),
        mix(color.g, dst.0[1]),
        mix(color.b, dst.0[2]),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ];
}
