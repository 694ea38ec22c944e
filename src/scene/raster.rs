//! Raster export of the current scene.
//!
//! This is a preview, not a renderer: images are resized and composited at
//! their position and scale, text is drawn as a solid block covering its
//! approximate extent, and rotation is ignored.

use std::path::Path;

use image::imageops::{self, FilterType};
use image::{ImageFormat, Rgba, RgbaImage};

use super::{ingest, ImageItem, SceneItem, SceneSurface, TextItem, Transform};
use crate::error::{EaselError, Result};

const BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);
const FALLBACK_INK: Rgba<u8> = Rgba([31, 41, 51, 255]);

/// Average glyph advance relative to the font size.
const GLYPH_WIDTH_RATIO: f64 = 0.6;
const LINE_HEIGHT_RATIO: f64 = 1.2;

const MAX_CANVAS_PIXELS: u64 = 1 << 28;

/// Render `scene` onto a `width` x `height` canvas upscaled by `factor`.
pub fn render<S: SceneSurface + ?Sized>(
    scene: &S,
    width: u32,
    height: u32,
    factor: u32,
) -> Result<RgbaImage> {
    let factor = factor.max(1);
    let (canvas_width, canvas_height) = match (width.checked_mul(factor), height.checked_mul(factor)) {
        (Some(w), Some(h)) if (w as u64) * (h as u64) <= MAX_CANVAS_PIXELS => (w, h),
        _ => {
            return Err(EaselError::Render(format!(
                "{}x{} canvas at {}x is too large",
                width, height, factor
            )))
        }
    };
    let mut canvas = RgbaImage::from_pixel(canvas_width, canvas_height, BACKGROUND);

    for object in scene.objects() {
        match &object.item {
            SceneItem::Image(item) => draw_image(&mut canvas, item, &object.transform, factor)?,
            SceneItem::Text(item) => draw_text_block(&mut canvas, item, &object.transform, factor),
        }
    }

    Ok(canvas)
}

pub fn save_png(image: &RgbaImage, path: &Path) -> Result<()> {
    image
        .save_with_format(path, ImageFormat::Png)
        .map_err(|e| EaselError::Io(std::io::Error::other(e)))
}

/// Placement of one object axis in canvas pixels.
#[derive(Debug, Clone, Copy)]
struct Extent {
    start: f64,
    length: f64,
}

impl Extent {
    fn new(position: f64, length: f64, scale: f64, factor: u32) -> Self {
        let factor = factor as f64;
        Extent {
            start: position * factor,
            length: (length * scale.abs() * factor).max(1.0),
        }
    }

    /// The `(offset, len)` of this extent clipped to `0..limit`, if any of it
    /// lands on the canvas.
    fn visible(&self, limit: u32) -> Option<(u32, u32)> {
        if !self.start.is_finite() || !self.length.is_finite() {
            return None;
        }
        let from = self.start.round().max(0.0);
        let to = (self.start + self.length).round().min(limit as f64);
        (to > from).then(|| (from as u32, (to - from) as u32))
    }

    /// Source pixel range behind the visible window `offset..offset + len`.
    fn source_range(&self, offset: u32, len: u32, source_len: u32) -> (u32, u32) {
        let ratio = source_len as f64 / self.length;
        let from = ((offset as f64 - self.start) * ratio).floor().clamp(0.0, (source_len - 1) as f64) as u32;
        let to = (((offset + len) as f64 - self.start) * ratio)
            .ceil()
            .clamp((from + 1) as f64, source_len as f64) as u32;
        (from, to - from)
    }
}

fn draw_image(canvas: &mut RgbaImage, item: &ImageItem, transform: &Transform, factor: u32) -> Result<()> {
    let horizontal = Extent::new(transform.left, item.width as f64, transform.scale_x, factor);
    let vertical = Extent::new(transform.top, item.height as f64, transform.scale_y, factor);
    let (Some((x, width)), Some((y, height))) =
        (horizontal.visible(canvas.width()), vertical.visible(canvas.height()))
    else {
        return Ok(());
    };

    let bytes = ingest::data_url_bytes(&item.src)?;
    let source = image::load_from_memory(&bytes)
        .map_err(|e| EaselError::ImageDecode(e.to_string()))?
        .to_rgba8();
    if source.width() == 0 || source.height() == 0 {
        return Ok(());
    }

    // Only the part that lands on the canvas is resized.
    let (src_x, src_width) = horizontal.source_range(x, width, source.width());
    let (src_y, src_height) = vertical.source_range(y, height, source.height());
    let visible = imageops::crop_imm(&source, src_x, src_y, src_width, src_height).to_image();
    let resized = imageops::resize(&visible, width, height, FilterType::Triangle);

    imageops::overlay(canvas, &resized, x as i64, y as i64);
    Ok(())
}

fn draw_text_block(canvas: &mut RgbaImage, item: &TextItem, transform: &Transform, factor: u32) {
    let longest_line = item.text.lines().map(|l| l.chars().count()).max().unwrap_or(0);
    let line_count = item.text.lines().count().max(1);
    if longest_line == 0 {
        return;
    }

    let horizontal = Extent::new(
        transform.left,
        longest_line as f64 * item.font_size * GLYPH_WIDTH_RATIO,
        transform.scale_x,
        factor,
    );
    let vertical = Extent::new(
        transform.top,
        line_count as f64 * item.font_size * LINE_HEIGHT_RATIO,
        transform.scale_y,
        factor,
    );
    let (Some((x0, width)), Some((y0, height))) =
        (horizontal.visible(canvas.width()), vertical.visible(canvas.height()))
    else {
        return;
    };

    let ink = parse_hex_color(&item.fill).unwrap_or(FALLBACK_INK);
    for y in y0..y0 + height {
        for x in x0..x0 + width {
            canvas.put_pixel(x, y, ink);
        }
    }
}

fn parse_hex_color(value: &str) -> Option<Rgba<u8>> {
    let hex = value.strip_prefix('#')?;
    if hex.len() != 6 {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(hex.get(range)?, 16).ok();
    Some(Rgba([channel(0..2)?, channel(2..4)?, channel(4..6)?, 255]))
}
