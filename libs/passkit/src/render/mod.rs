//! Pass compositing
//!
//! A pass is the event template with the attendee's QR code and, optionally,
//! their name drawn on top. The canvas always has the template's natural size.

mod affine;
mod qr;
mod text;

use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Rgb, RgbImage, RgbaImage};
use thiserror::Error;
use tracing::debug;

use crate::geometry::{Color, NameGeometry, QrGeometry};

pub use affine::{Affine, draw_transformed};
pub use text::{Face, FontBook};

/// Largest template accepted, in pixels
pub const MAX_CANVAS_PIXELS: u64 = 64 * 1024 * 1024;

/// Largest intermediate sprite, in pixels
pub const MAX_SPRITE_PIXELS: u64 = 16 * 1024 * 1024;

/// Text is rasterized no larger than this and scaled up when drawn
const MAX_GLYPH_PX: f64 = 512.0;

#[derive(Error, Debug)]
#[error("QR encoding failed: {0}")]
pub struct EncodeError(pub String);

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Template image could not be decoded: {0}")]
    Decode(#[source] image::ImageError),

    #[error("Cannot create a {width}x{height} canvas")]
    Surface { width: u32, height: u32 },

    #[error("Font error: {0}")]
    Font(String),

    #[error(transparent)]
    Encode(#[from] EncodeError),

    #[error("Failed to encode pass image: {0}")]
    Output(#[source] image::ImageError),
}

/// Draws passes. Cheap to clone; fonts are shared.
#[derive(Clone)]
pub struct Compositor {
    fonts: FontBook,
}

impl Compositor {
    pub fn new(fonts: FontBook) -> Self {
        Self { fonts }
    }

    pub fn fonts(&self) -> &FontBook {
        &self.fonts
    }

    /// Compose a pass and return it as PNG bytes
    pub fn composite(
        &self,
        template: &[u8],
        qr: &QrGeometry,
        name: Option<&NameGeometry>,
        attendee_name: &str,
        payload: &str,
    ) -> Result<Vec<u8>, RenderError> {
        let canvas = self.render(template, qr, name, attendee_name, payload)?;

        let mut png = Cursor::new(Vec::new());
        DynamicImage::ImageRgb8(flatten(&canvas))
            .write_to(&mut png, ImageFormat::Png)
            .map_err(RenderError::Output)?;
        Ok(png.into_inner())
    }

    /// Same as [`Compositor::composite`] without the PNG step
    pub fn render(
        &self,
        template: &[u8],
        qr: &QrGeometry,
        name: Option<&NameGeometry>,
        attendee_name: &str,
        payload: &str,
    ) -> Result<RgbaImage, RenderError> {
        let template = image::load_from_memory(template).map_err(RenderError::Decode)?;
        let (width, height) = (template.width(), template.height());
        if width == 0 || height == 0 || width as u64 * height as u64 > MAX_CANVAS_PIXELS {
            return Err(RenderError::Surface { width, height });
        }
        let mut canvas = template.to_rgba8();
        debug!("Compositing pass on {}x{} canvas", width, height);

        draw_qr(&mut canvas, qr, payload)?;

        if let Some(name) = name {
            self.draw_name(&mut canvas, name, attendee_name)?;
        }

        Ok(canvas)
    }

    fn draw_name(
        &self,
        canvas: &mut RgbaImage,
        name: &NameGeometry,
        attendee_name: &str,
    ) -> Result<(), RenderError> {
        if attendee_name.trim().is_empty() {
            return Ok(());
        }
        let size = name.size();
        let render_size = raster_size(size, attendee_name.chars().count());

        let face = self.fonts.resolve(name.font());
        let Some(sprite) = text::text_sprite(face, attendee_name, render_size, name.color())? else {
            return Ok(());
        };
        // Rotation pivots on the text origin
        let transform = Affine::scale(size / render_size)
            .then(Affine::rotate_degrees(name.rotation()))
            .then(Affine::translate(name.x(), name.y()));
        draw_transformed(canvas, &sprite, transform);
        Ok(())
    }
}

impl Default for Compositor {
    fn default() -> Self {
        Self::new(FontBook::builtin())
    }
}

/// Font size to rasterize at so that a line of `chars` glyphs stays within
/// [`MAX_SPRITE_PIXELS`]. Glyph cells are budgeted at up to 3 square ems.
fn raster_size(size: f64, chars: usize) -> f64 {
    let budget = (MAX_SPRITE_PIXELS as f64 / (3.0 * chars.max(1) as f64)).sqrt();
    size.min(MAX_GLYPH_PX).min(budget)
}

fn draw_qr(canvas: &mut RgbaImage, qr: &QrGeometry, payload: &str) -> Result<(), RenderError> {
    let size = qr.size();
    // Saturates for huge sizes; the sprite is capped and scaled up
    let side = size.round().max(1.0) as u32;
    let sprite = qr::qr_sprite(
        payload,
        side,
        qr.color().unwrap_or(Color::BLACK),
        qr.bg_color().unwrap_or(Color::TRANSPARENT),
    )?;

    // Rotation pivots on the center of the QR box
    let side = sprite.width() as f64;
    let half = side / 2.0;
    let transform = Affine::translate(-half, -half)
        .then(Affine::scale(size / side))
        .then(Affine::rotate_degrees(qr.rotation()))
        .then(Affine::translate(qr.x() + size / 2.0, qr.y() + size / 2.0));
    draw_transformed(canvas, &sprite, transform);
    Ok(())
}

/// Composite over white and drop the alpha channel
fn flatten(canvas: &RgbaImage) -> RgbImage {
    let mut out = RgbImage::new(canvas.width(), canvas.height());
    for (x, y, pixel) in canvas.enumerate_pixels() {
        let alpha = pixel[3] as u32;
        let over_white = |c: u8| ((c as u32 * alpha + 255 * (255 - alpha) + 127) / 255) as u8;
        out.put_pixel(x, y, Rgb([over_white(pixel[0]), over_white(pixel[1]), over_white(pixel[2])]));
    }
    out
}
