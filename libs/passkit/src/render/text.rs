//! Font lookup and text sprites

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use ab_glyph::{Font, FontArc, PxScale, ScaleFont, point};
use font8x8::{BASIC_FONTS, LATIN_FONTS, UnicodeFonts};
use image::{Rgba, RgbaImage};
use tracing::{debug, info, warn};

use super::{MAX_SPRITE_PIXELS, RenderError};
use crate::geometry::{Color, DEFAULT_FONT_FAMILY};

const FONT_EXTENSIONS: [&str; 3] = ["ttf", "otf", "ttc"];

/// Font families available to the compositor, keyed by lowercase file stem
#[derive(Clone)]
pub struct FontBook {
    fonts: HashMap<String, FontArc>,
    default_family: String,
}

/// Face chosen for a family name
pub enum Face<'a> {
    Outline(&'a FontArc),
    /// Built-in 8×8 bitmap, used when no font files are installed
    Bitmap,
}

impl FontBook {
    /// Book with no font files; every family renders with the bitmap face
    pub fn builtin() -> Self {
        Self {
            fonts: HashMap::new(),
            default_family: DEFAULT_FONT_FAMILY.to_lowercase(),
        }
    }

    /// Load every font file in `dir`. A missing directory yields an empty book.
    pub fn load_dir(dir: impl AsRef<Path>, default_family: &str) -> Result<Self, RenderError> {
        let dir = dir.as_ref();
        let mut book = Self {
            fonts: HashMap::new(),
            default_family: default_family.to_lowercase(),
        };

        if !dir.is_dir() {
            warn!("Font directory not found, using built-in face: {}", dir.display());
            return Ok(book);
        }

        let entries = fs::read_dir(dir)
            .map_err(|e| RenderError::Font(format!("{}: {}", dir.display(), e)))?;
        for entry in entries {
            let path = entry
                .map_err(|e| RenderError::Font(format!("{}: {}", dir.display(), e)))?
                .path();
            let is_font = path
                .extension()
                .and_then(|ext| ext.to_str())
                .map(|ext| FONT_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
                .unwrap_or(false);
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if !is_font {
                continue;
            }

            let bytes = fs::read(&path)
                .map_err(|e| RenderError::Font(format!("{}: {}", path.display(), e)))?;
            let font = FontArc::try_from_vec(bytes)
                .map_err(|e| RenderError::Font(format!("{}: {}", path.display(), e)))?;
            debug!("Loaded font {} from {}", stem, path.display());
            book.fonts.insert(stem.to_lowercase(), font);
        }

        info!("Loaded {} font(s) from {}", book.fonts.len(), dir.display());
        Ok(book)
    }

    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }

    /// Exact family first, then the default family, then any loaded font
    pub fn resolve(&self, family: &str) -> Face<'_> {
        let wanted = family.trim().to_lowercase();
        self.fonts
            .get(&wanted)
            .or_else(|| self.fonts.get(&self.default_family))
            .or_else(|| {
                let mut families: Vec<&String> = self.fonts.keys().collect();
                families.sort();
                families.first().and_then(|key| self.fonts.get(*key))
            })
            .map(Face::Outline)
            .unwrap_or(Face::Bitmap)
    }
}

/// Render `text` left-aligned with its top edge at row 0.
///
/// Returns `None` for text that produces no pixels, and
/// [`RenderError::Surface`] when the sprite would exceed [`MAX_SPRITE_PIXELS`].
pub fn text_sprite(
    face: Face<'_>,
    text: &str,
    size: f64,
    color: Color,
) -> Result<Option<RgbaImage>, RenderError> {
    match face {
        Face::Outline(font) => outline_sprite(font, text, size, color),
        Face::Bitmap => bitmap_sprite(text, size, color),
    }
}

fn check_surface(width: u32, height: u32) -> Result<(), RenderError> {
    if width as u64 * height as u64 > MAX_SPRITE_PIXELS {
        return Err(RenderError::Surface { width, height });
    }
    Ok(())
}

fn outline_sprite(
    font: &FontArc,
    text: &str,
    size: f64,
    color: Color,
) -> Result<Option<RgbaImage>, RenderError> {
    let scale = PxScale::from(size as f32);
    let scaled = font.as_scaled(scale);

    let mut glyphs = Vec::new();
    let mut caret = 0.0f32;
    let mut previous = None;
    for ch in text.chars() {
        let id = scaled.glyph_id(ch);
        if let Some(prev) = previous {
            caret += scaled.kern(prev, id);
        }
        glyphs.push(id.with_scale_and_position(scale, point(caret, scaled.ascent())));
        caret += scaled.h_advance(id);
        previous = Some(id);
    }

    let width = caret.ceil() as u32;
    let height = scaled.height().ceil() as u32;
    if width == 0 || height == 0 {
        return Ok(None);
    }
    check_surface(width, height)?;

    let mut sprite = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
    let [r, g, b, a] = color.channels();
    for glyph in glyphs {
        let Some(outlined) = font.outline_glyph(glyph) else {
            continue;
        };
        let bounds = outlined.px_bounds();
        outlined.draw(|gx, gy, coverage| {
            let x = bounds.min.x as i64 + gx as i64;
            let y = bounds.min.y as i64 + gy as i64;
            if x < 0 || y < 0 || x >= width as i64 || y >= height as i64 {
                return;
            }
            let alpha = (a as f32 * coverage.clamp(0.0, 1.0)).round() as u8;
            let pixel = sprite.get_pixel_mut(x as u32, y as u32);
            if alpha > pixel[3] {
                *pixel = Rgba([r, g, b, alpha]);
            }
        });
    }
    Ok(Some(sprite))
}

fn bitmap_sprite(text: &str, size: f64, color: Color) -> Result<Option<RgbaImage>, RenderError> {
    let rows: Vec<[u8; 8]> = text
        .chars()
        .map(|ch| {
            BASIC_FONTS
                .get(ch)
                .or_else(|| LATIN_FONTS.get(ch))
                .or_else(|| BASIC_FONTS.get('?'))
                .unwrap_or([0; 8])
        })
        .collect();

    let cell = size / 8.0;
    let width = (rows.len() as f64 * size).ceil() as u32;
    let height = size.ceil() as u32;
    if width == 0 || height == 0 {
        return Ok(None);
    }
    check_surface(width, height)?;

    let mut sprite = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
    let ink = Rgba(color.channels());
    for y in 0..height {
        let row = ((y as f64 + 0.5) / cell) as usize;
        if row >= 8 {
            continue;
        }
        for x in 0..width {
            let column = ((x as f64 + 0.5) / cell) as usize;
            let Some(glyph) = rows.get(column / 8) else {
                continue;
            };
            // Bit 0 is the leftmost pixel
            if (glyph[row] >> (column % 8)) & 1 == 1 {
                sprite.put_pixel(x, y, ink);
            }
        }
    }
    Ok(Some(sprite))
}
