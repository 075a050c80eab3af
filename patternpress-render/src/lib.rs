//! # patternpress-render
//!
//! Auto-sizing, centered text-to-image rendering for patternpress.
//!
//! Given a text and a fixed canvas, the renderer finds the largest font size
//! at which the greedily word-wrapped text fits the canvas on both axes,
//! centers the block and writes a transparent PNG.
//!
//! ## Design
//!
//! - [`fit`] wraps text at one size and decides whether it fits
//! - [`render`] binary-searches the size range and paints the result
//! - [`font`] abstracts measurement behind [`FontMetrics`] so the search can
//!   run against any face, including synthetic ones in tests
//! - Rendering is deterministic: no clock, no randomness
//!
//! # Examples
//!
//! ```no_run
//! use patternpress_render::{AutoSizeRenderer, RenderRequest, Rgba, RusttypeFace};
//!
//! # fn example() -> patternpress_render::Result<()> {
//! let face = RusttypeFace::discover(None)?;
//! let renderer = AutoSizeRenderer::new(face);
//! let request = RenderRequest::new("Bug-Free Zone", 1200, 800, Rgba::BLACK);
//! let image = renderer.render_to_file(&request, "img/bug-free.png".as_ref())?;
//! println!("rendered at {} px", image.font_size);
//! # Ok(())
//! # }
//! ```

pub mod color;
pub mod error;
pub mod fit;
pub mod font;
pub mod render;

pub use color::Rgba;
pub use error::{RenderError, Result};
pub use fit::{FitResult, fit_text, wrap_text};
pub use font::{FontMetrics, GlyphPainter, LineMetrics, RusttypeFace};
pub use render::{
    AutoSizeRenderer, Layout, PlacedLine, RenderRequest, RenderedImage, SizeRange,
    search_font_size,
};
