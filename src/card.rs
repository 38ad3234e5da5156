//! Title card rendering: a fixed 1920x1080 still with the author, the
//! collection title and one or more caption lines, all centred.

use anyhow::{Context, Result, anyhow};
use fontdue::layout::{CoordinateSystem, Layout, LayoutSettings, TextStyle, VerticalAlign};
use fontdue::{Font, FontSettings};
use image::{ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::path::Path;
use tokio::fs;

pub const CARD_WIDTH: u32 = 1920;
pub const CARD_HEIGHT: u32 = 1080;
pub const BACKGROUND: Rgba<u8> = Rgba([0xf0, 0xf0, 0xf0, 0xff]);
pub const INK: Rgba<u8> = Rgba([0x00, 0x00, 0x00, 0xff]);

const AUTHOR_Y: f32 = 150.0;
const TITLE_Y: f32 = 290.0;
const LINE_SPACING: f32 = 150.0;

/// One piece of text anchored by its centre point.
#[derive(Debug, Clone, PartialEq)]
pub struct TextRun<'a> {
    pub text: &'a str,
    pub size: f32,
    pub center_x: f32,
    pub center_y: f32,
}

/// Positions every text run on a `width` x `height` canvas.
///
/// The author uses height/7, everything below it height/10. Caption lines
/// start at mid-canvas and step down by a fixed spacing.
pub fn layout<'a>(
    lines: &[&'a str],
    title: &'a str,
    author: &'a str,
    width: u32,
    height: u32,
) -> Vec<TextRun<'a>> {
    let center_x = width as f32 / 2.0;
    let author_size = height as f32 / 7.0;
    let body_size = height as f32 / 10.0;

    let mut runs = vec![
        TextRun {
            text: author,
            size: author_size,
            center_x,
            center_y: AUTHOR_Y,
        },
        TextRun {
            text: title,
            size: body_size,
            center_x,
            center_y: TITLE_Y,
        },
    ];

    let mut y = height as f32 / 2.0;
    for line in lines {
        runs.push(TextRun {
            text: line,
            size: body_size,
            center_x,
            center_y: y,
        });
        y += LINE_SPACING;
    }

    runs
}

pub trait CardRenderer: Send + Sync {
    fn render(&self, lines: &[&str], title: &str, author: &str) -> Result<RgbaImage>;
}

pub struct TitleCard {
    font: Font,
}

impl TitleCard {
    pub fn new(font: Font) -> Self {
        Self { font }
    }

    pub fn load(font_path: &Path) -> Result<Self> {
        let bytes = std::fs::read(font_path)
            .with_context(|| format!("Failed to read font {}", font_path.display()))?;
        let font = Font::from_bytes(bytes, FontSettings::default())
            .map_err(|err| anyhow!("Failed to parse font {}: {err}", font_path.display()))?;
        Ok(Self::new(font))
    }

    /// Pen advance of a laid-out single line, kerning included.
    fn line_advance(&self, layout: &Layout, size: f32) -> f32 {
        let glyphs = layout.glyphs();
        let (Some(first), Some(last)) = (glyphs.first(), glyphs.last()) else {
            return 0.0;
        };
        let start = first.x - self.font.metrics(first.parent, size).xmin as f32;
        let last_metrics = self.font.metrics(last.parent, size);
        let end = last.x - last_metrics.xmin as f32 + last_metrics.advance_width;
        end - start
    }

    fn draw_run(&self, canvas: &mut RgbaImage, run: &TextRun<'_>) {
        if run.text.is_empty() {
            return;
        }

        // No max_width: a run never wraps, it overflows the canvas instead.
        let box_height = run.size * 2.0;
        let mut layout = Layout::new(CoordinateSystem::PositiveYDown);
        layout.reset(&LayoutSettings {
            x: 0.0,
            y: run.center_y - box_height / 2.0,
            max_height: Some(box_height),
            vertical_align: VerticalAlign::Middle,
            ..LayoutSettings::default()
        });
        layout.append(&[&self.font], &TextStyle::new(run.text, run.size, 0));

        let offset_x = run.center_x - self.line_advance(&layout, run.size) / 2.0;
        for glyph in layout.glyphs() {
            if glyph.width == 0 || glyph.height == 0 {
                continue;
            }
            let (_, coverage) = self.font.rasterize_config(glyph.key);
            blend_glyph(
                canvas,
                (offset_x + glyph.x).round() as i64,
                glyph.y.round() as i64,
                glyph.width,
                &coverage,
                INK,
            );
        }
    }
}

fn blend_glyph(
    canvas: &mut RgbaImage,
    origin_x: i64,
    origin_y: i64,
    glyph_width: usize,
    coverage: &[u8],
    color: Rgba<u8>,
) {
    let (width, height) = canvas.dimensions();
    for (i, alpha) in coverage.iter().enumerate() {
        if *alpha == 0 {
            continue;
        }
        let px = origin_x + (i % glyph_width) as i64;
        let py = origin_y + (i / glyph_width) as i64;
        if px < 0 || py < 0 || px >= width as i64 || py >= height as i64 {
            continue;
        }

        let a = *alpha as u32;
        let dst = canvas.get_pixel_mut(px as u32, py as u32);
        for c in 0..3 {
            let blended = (color.0[c] as u32 * a + dst.0[c] as u32 * (255 - a)) / 255;
            dst.0[c] = blended as u8;
        }
        dst.0[3] = 0xff;
    }
}

impl CardRenderer for TitleCard {
    fn render(&self, lines: &[&str], title: &str, author: &str) -> Result<RgbaImage> {
        let mut canvas = RgbaImage::from_pixel(CARD_WIDTH, CARD_HEIGHT, BACKGROUND);
        for run in layout(lines, title, author, CARD_WIDTH, CARD_HEIGHT) {
            self.draw_run(&mut canvas, &run);
        }
        Ok(canvas)
    }
}

/// Caption lines for a card: the file stem, one line per embedded newline.
pub fn caption_lines(stem: &str) -> Vec<&str> {
    stem.split('\n').collect()
}

pub fn encode_png(image: &RgbaImage) -> Result<Vec<u8>> {
    let mut out = Cursor::new(Vec::new());
    image
        .write_to(&mut out, ImageFormat::Png)
        .context("PNG encoding failed")?;
    Ok(out.into_inner())
}

pub async fn save_png(image: &RgbaImage, path: &Path) -> Result<()> {
    let bytes = encode_png(image)?;
    fs::write(path, bytes)
        .await
        .with_context(|| format!("Failed to write image {}", path.display()))?;
    Ok(())
}
