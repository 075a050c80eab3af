//! Greedy word wrap and the fit predicate.
//!
//! Given a text, a font size and a target box, [`fit_text`] wraps the text
//! word by word and reports whether the wrapped block fits the box on both
//! axes. Forced line breaks in the input always start a new line.

use crate::font::FontMetrics;

/// Outcome of fitting text at one candidate font size.
#[derive(Debug, Clone, PartialEq)]
pub struct FitResult {
    /// Whether the wrapped text fits inside the box.
    pub fits: bool,
    /// Wrapped lines, top to bottom. Empty when `fits` is false.
    pub lines: Vec<String>,
    /// `line_height * n + line_spacing * (n - 1)`, without the last descender.
    pub total_height: f32,
}

impl FitResult {
    fn rejected() -> Self {
        Self {
            fits: false,
            lines: Vec::new(),
            total_height: 0.0,
        }
    }
}

/// Extra gap between lines: 20% of the font size, rounded down.
pub fn line_spacing(size: u32) -> f32 {
    (size / 5) as f32
}

/// Height of `line_count` lines at `size`.
pub fn block_height<M: FontMetrics + ?Sized>(metrics: &M, size: u32, line_count: usize) -> f32 {
    if line_count == 0 {
        return 0.0;
    }
    let n = line_count as f32;
    metrics.line_metrics(size).line_height() * n + line_spacing(size) * (n - 1.0)
}

/// Greedily wrap `text` to `max_width` at `size`.
///
/// Returns `None` when a single word is wider than `max_width` on its own.
pub fn wrap_text<M: FontMetrics + ?Sized>(
    metrics: &M,
    size: u32,
    text: &str,
    max_width: f32,
) -> Option<Vec<String>> {
    let mut wrapped = Vec::new();
    for segment in text.lines() {
        let mut current = String::new();
        for word in segment.split_whitespace() {
            let candidate = if current.is_empty() {
                word.to_owned()
            } else {
                format!("{current} {word}")
            };
            if metrics.text_width(size, &candidate) <= max_width {
                current = candidate;
            } else if current.is_empty() {
                return None;
            } else {
                wrapped.push(std::mem::replace(&mut current, word.to_owned()));
            }
        }
        if !current.is_empty() {
            wrapped.push(current);
        }
    }
    Some(wrapped)
}

/// Wrap `text` at `size` and test it against a `width` x `height` box.
pub fn fit_text<M: FontMetrics + ?Sized>(
    metrics: &M,
    size: u32,
    text: &str,
    width: f32,
    height: f32,
) -> FitResult {
    let Some(lines) = wrap_text(metrics, size, text, width) else {
        return FitResult::rejected();
    };
    let total_height = block_height(metrics, size, lines.len());
    let too_wide = lines.iter().any(|l| metrics.text_width(size, l) > width);
    if too_wide || total_height > height {
        return FitResult::rejected();
    }
    FitResult {
        fits: true,
        lines,
        total_height,
    }
}
