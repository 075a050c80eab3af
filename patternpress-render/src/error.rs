//! Error types for the patternpress-render crate.
//!
//! Messages carry the requested text and canvas so a failed render can be
//! reported against the pattern that produced it.

use std::path::PathBuf;

/// Errors that can occur while fitting or rendering text.
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    /// No font size in the configured range lets the text fit the canvas.
    #[error("text does not fit a {width}x{height} canvas at any font size: {text:?}")]
    TextDoesNotFit {
        /// The text that was requested.
        text: String,
        /// Canvas width in pixels.
        width: u32,
        /// Canvas height in pixels.
        height: u32,
    },

    /// Canvas dimensions must both be non-zero.
    #[error("invalid canvas size {width}x{height}")]
    InvalidCanvas {
        /// Requested width.
        width: u32,
        /// Requested height.
        height: u32,
    },

    /// Font size search bounds are empty or start at zero.
    #[error("invalid font size range {min}..={max}")]
    InvalidSizeRange {
        /// Lower bound.
        min: u32,
        /// Upper bound.
        max: u32,
    },

    /// None of the candidate font files exist.
    #[error("no usable font found (tried {0:?})")]
    FontNotFound(Vec<PathBuf>),

    /// A font file exists but could not be parsed.
    #[error("font error: {0}")]
    Font(String),

    /// A color string could not be parsed.
    #[error("invalid color: {0}")]
    Color(String),

    /// Filesystem error while writing the image.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// PNG encoding failed.
    #[error("encode error: {0}")]
    Encode(String),
}

/// Convenience type alias for render results.
pub type Result<T> = std::result::Result<T, RenderError>;
