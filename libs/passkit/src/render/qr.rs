use image::{Rgba, RgbaImage};
use qrcode::{EcLevel, QrCode};

use super::EncodeError;
use crate::geometry::Color;

/// Modules of light border around the symbol
const QUIET_ZONE: usize = 1;

/// Largest sprite edge; bigger codes are drawn scaled up from this
pub const MAX_QR_SIDE: u32 = 2048;

/// Render `payload` as a square QR sprite with error correction level H.
///
/// The sprite is `side` pixels wide unless that exceeds [`MAX_QR_SIDE`], in
/// which case the edge is the largest whole multiple of the module count that
/// fits. Callers scale by the returned width.
pub fn qr_sprite(
    payload: &str,
    side: u32,
    foreground: Color,
    background: Color,
) -> Result<RgbaImage, EncodeError> {
    let code = QrCode::with_error_correction_level(payload.as_bytes(), EcLevel::H)
        .map_err(|e| EncodeError(e.to_string()))?;
    let width = code.width();
    let modules = code.to_colors();
    let total = width + 2 * QUIET_ZONE;
    let side = if side > MAX_QR_SIDE {
        (MAX_QR_SIDE as usize / total * total) as u32
    } else {
        side.max(1)
    };

    let module_at = |pixel: u32| -> Option<usize> {
        let index = pixel as usize * total / side as usize;
        (QUIET_ZONE..QUIET_ZONE + width)
            .contains(&index)
            .then(|| index - QUIET_ZONE)
    };

    let fg = Rgba(foreground.channels());
    let bg = Rgba(background.channels());
    let mut sprite = RgbaImage::from_pixel(side, side, bg);
    for y in 0..side {
        let Some(row) = module_at(y) else { continue };
        for x in 0..side {
            let Some(col) = module_at(x) else { continue };
            if modules[row * width + col] == qrcode::Color::Dark {
                sprite.put_pixel(x, y, fg);
            }
        }
    }
    Ok(sprite)
}
