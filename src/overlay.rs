//! Burning page text into the illustration.

use std::path::Path;

use ab_glyph::{Font, FontArc, PxScale, ScaleFont};
use image::{DynamicImage, Pixel, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};

use crate::constants::{
    DEFAULT_FONT_SIZE, DEFAULT_MAX_TEXT_WIDTH_CHARS, TEXT_BOTTOM_MARGIN, TEXT_BOX_ALPHA,
    TEXT_BOX_PADDING,
};
use crate::error::CompositeError;

const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Font loading failures.
#[derive(Debug)]
pub enum FontError {
    /// The font file couldn't be read
    Io(std::io::Error),
    /// The file isn't a font ab_glyph understands
    Invalid(ab_glyph::InvalidFont),
}

impl std::fmt::Display for FontError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(err) => write!(f, "Failed to read font: {err}"),
            Self::Invalid(err) => write!(f, "Invalid font: {err}"),
        }
    }
}

impl std::error::Error for FontError {}

/// Loads a TrueType/OpenType font from disk.
pub fn load_font(path: &Path) -> Result<FontArc, FontError> {
    let bytes = std::fs::read(path).map_err(FontError::Io)?;
    FontArc::try_from_vec(bytes).map_err(FontError::Invalid)
}

/// Word-wraps `text` to at most `width` characters per line.
///
/// Words longer than `width` are left whole on a line of their own.
pub fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if current_len > 0 && current_len + 1 + word_len > width {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.push_str(word);
        current_len += word_len;
    }
    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Where the text block lands on a page.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TextLayout {
    /// Wrapped lines, top to bottom
    pub lines: Vec<String>,
    /// Pixel width of each line
    pub line_widths: Vec<u32>,
    /// Height of a single line
    pub line_height: u32,
    /// Left edge of the block (may be negative for very wide text)
    pub x: i32,
    /// Top edge of the block (may be negative for very tall text)
    pub y: i32,
    /// Widest line
    pub width: u32,
    /// All lines stacked
    pub height: u32,
}

/// Draws wrapped narrative text over a tinted box near the bottom of a page.
#[derive(Clone, Debug)]
pub struct TextOverlay {
    font: FontArc,
    scale: PxScale,
    max_text_width_chars: usize,
}

impl TextOverlay {
    /// Overlay with the default font size and wrap width.
    pub fn new(font: FontArc) -> Self {
        Self {
            font,
            scale: PxScale::from(DEFAULT_FONT_SIZE),
            max_text_width_chars: DEFAULT_MAX_TEXT_WIDTH_CHARS,
        }
    }

    /// Sets the font size in pixels.
    pub fn with_font_size(mut self, size: f32) -> Self {
        self.scale = PxScale::from(size);
        self
    }

    /// Sets the wrap width in characters (zero is treated as one).
    pub fn with_max_text_width_chars(mut self, width: usize) -> Self {
        self.max_text_width_chars = width.max(1);
        self
    }

    /// Works out the wrapped lines and where they go on an image of this size.
    pub fn layout(&self, image_width: u32, image_height: u32, text: &str) -> TextLayout {
        let lines = wrap_text(text, self.max_text_width_chars);
        let scaled = self.font.as_scaled(self.scale);
        let line_height = (scaled.ascent() - scaled.descent() + scaled.line_gap())
            .ceil()
            .max(1.0) as u32;

        let line_widths: Vec<u32> = lines
            .iter()
            .map(|line| text_size(self.scale, &self.font, line).0)
            .collect();
        let width = line_widths.iter().copied().max().unwrap_or(0);
        let height = line_height * lines.len() as u32;

        let x = (i64::from(image_width) - i64::from(width)) / 2;
        let y = i64::from(image_height) - i64::from(height) - i64::from(TEXT_BOTTOM_MARGIN);

        TextLayout {
            lines,
            line_widths,
            line_height,
            x: x as i32,
            y: y as i32,
            width,
            height,
        }
    }

    /// Returns a copy of `image` with `text` drawn onto it.
    ///
    /// The background box takes its tint from the pixel under the top-left of
    /// the text, so the box blends into the picture.
    pub fn overlay(&self, image: &DynamicImage, text: &str) -> Result<RgbaImage, CompositeError> {
        let mut canvas = image.to_rgba8();
        let (image_width, image_height) = canvas.dimensions();
        if image_width == 0 || image_height == 0 {
            return Err(CompositeError::EmptyImage);
        }

        let layout = self.layout(image_width, image_height, text);
        if layout.lines.is_empty() {
            return Ok(canvas);
        }

        let sample_x = clamp_to(layout.x, image_width);
        let sample_y = clamp_to(layout.y, image_height);
        let sampled = canvas.get_pixel(sample_x, sample_y).to_rgb();
        let tint = Rgba([sampled[0], sampled[1], sampled[2], TEXT_BOX_ALPHA]);

        let padding = TEXT_BOX_PADDING as i32;
        blend_rect(
            &mut canvas,
            layout.x - padding,
            layout.y - padding,
            layout.x + layout.width as i32 + padding,
            layout.y + layout.height as i32 + padding,
            tint,
        );

        for (row, (line, line_width)) in layout.lines.iter().zip(&layout.line_widths).enumerate() {
            let line_x = layout.x + (layout.width - line_width) as i32 / 2;
            let line_y = layout.y + (row as u32 * layout.line_height) as i32;
            draw_text_mut(
                &mut canvas,
                TEXT_COLOR,
                line_x,
                line_y,
                self.scale,
                &self.font,
                line,
            );
        }

        Ok(canvas)
    }
}

fn clamp_to(value: i32, limit: u32) -> u32 {
    value.clamp(0, limit.saturating_sub(1) as i32) as u32
}

/// Alpha-blends `color` over the (clipped) rectangle `[x0, x1) x [y0, y1)`.
fn blend_rect(canvas: &mut RgbaImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgba<u8>) {
    let (width, height) = canvas.dimensions();
    let x_range = x0.max(0) as u32..x1.clamp(0, width as i32) as u32;
    let y_range = y0.max(0) as u32..y1.clamp(0, height as i32) as u32;
    for y in y_range {
        for x in x_range.clone() {
            canvas.get_pixel_mut(x, y).blend(&color);
        }
    }
}
