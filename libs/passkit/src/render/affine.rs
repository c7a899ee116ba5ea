//! 2D affine transforms and sprite blitting

use image::{Rgba, RgbaImage};

/// Maps `(x, y)` to `(a*x + c*y + tx, b*x + d*y + ty)`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    a: f64,
    b: f64,
    c: f64,
    d: f64,
    tx: f64,
    ty: f64,
}

impl Affine {
    pub const IDENTITY: Affine = Affine {
        a: 1.0,
        b: 0.0,
        c: 0.0,
        d: 1.0,
        tx: 0.0,
        ty: 0.0,
    };

    pub fn translate(tx: f64, ty: f64) -> Self {
        Affine {
            tx,
            ty,
            ..Self::IDENTITY
        }
    }

    pub fn scale(factor: f64) -> Self {
        Affine {
            a: factor,
            d: factor,
            ..Self::IDENTITY
        }
    }

    /// Clockwise on screen, since y grows downwards
    pub fn rotate_degrees(degrees: f64) -> Self {
        let (sin, cos) = degrees.to_radians().sin_cos();
        Affine {
            a: cos,
            b: sin,
            c: -sin,
            d: cos,
            tx: 0.0,
            ty: 0.0,
        }
    }

    /// `self` first, then `next`
    pub fn then(self, next: Affine) -> Affine {
        Affine {
            a: next.a * self.a + next.c * self.b,
            b: next.b * self.a + next.d * self.b,
            c: next.a * self.c + next.c * self.d,
            d: next.b * self.c + next.d * self.d,
            tx: next.a * self.tx + next.c * self.ty + next.tx,
            ty: next.b * self.tx + next.d * self.ty + next.ty,
        }
    }

    pub fn invert(self) -> Option<Affine> {
        let det = self.a * self.d - self.b * self.c;
        if det.abs() < f64::EPSILON {
            return None;
        }
        Some(Affine {
            a: self.d / det,
            b: -self.b / det,
            c: -self.c / det,
            d: self.a / det,
            tx: (self.c * self.ty - self.d * self.tx) / det,
            ty: (self.b * self.tx - self.a * self.ty) / det,
        })
    }

    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (
            self.a * x + self.c * y + self.tx,
            self.b * x + self.d * y + self.ty,
        )
    }
}

/// Draw `sprite` onto `canvas` through `transform`, blending source-over.
///
/// Each covered canvas pixel samples the nearest sprite pixel. Whatever falls
/// outside the canvas is dropped.
pub fn draw_transformed(canvas: &mut RgbaImage, sprite: &RgbaImage, transform: Affine) {
    let Some(inverse) = transform.invert() else {
        return;
    };
    let (sw, sh) = (sprite.width() as f64, sprite.height() as f64);
    if sw == 0.0 || sh == 0.0 {
        return;
    }

    let corners = [(0.0, 0.0), (sw, 0.0), (0.0, sh), (sw, sh)].map(|(x, y)| transform.apply(x, y));
    let min_x = corners.iter().map(|c| c.0).fold(f64::INFINITY, f64::min);
    let max_x = corners.iter().map(|c| c.0).fold(f64::NEG_INFINITY, f64::max);
    let min_y = corners.iter().map(|c| c.1).fold(f64::INFINITY, f64::min);
    let max_y = corners.iter().map(|c| c.1).fold(f64::NEG_INFINITY, f64::max);

    let x_start = min_x.floor().max(0.0) as u32;
    let y_start = min_y.floor().max(0.0) as u32;
    let x_end = max_x.ceil().min(canvas.width() as f64);
    let y_end = max_y.ceil().min(canvas.height() as f64);
    if x_end <= x_start as f64 || y_end <= y_start as f64 {
        return;
    }
    let (x_end, y_end) = (x_end as u32, y_end as u32);

    for py in y_start..y_end {
        for px in x_start..x_end {
            let (u, v) = inverse.apply(px as f64 + 0.5, py as f64 + 0.5);
            if u < 0.0 || v < 0.0 || u >= sw || v >= sh {
                continue;
            }
            let source = sprite.get_pixel(u as u32, v as u32);
            blend(canvas.get_pixel_mut(px, py), source);
        }
    }
}

/// Porter-Duff source-over
pub fn blend(dst: &mut Rgba<u8>, src: &Rgba<u8>) {
    let sa = src[3] as f64 / 255.0;
    if sa <= 0.0 {
        return;
    }
    let da = dst[3] as f64 / 255.0;
    let out_a = sa + da * (1.0 - sa);
    for i in 0..3 {
        let value = (src[i] as f64 * sa + dst[i] as f64 * da * (1.0 - sa)) / out_a;
        dst[i] = value.round().clamp(0.0, 255.0) as u8;
    }
    dst[3] = (out_a * 255.0).round().clamp(0.0, 255.0) as u8;
}
