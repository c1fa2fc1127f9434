//! CIE L*a*b* conversion for 8-bit sRGB pixels.
//!
//! The assay indicator turns wells yellow, which is the positive end of the
//! b* (blue-yellow) axis.

/// CIE L*a*b* color (D65).
/// - `l`: 0..100
/// - `a`: green (-) to red (+)
/// - `b`: blue (-) to yellow (+)
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Lab {
    pub l: f32,
    pub a: f32,
    pub b: f32,
}

const D65_X: f32 = 0.95047;
const D65_Y: f32 = 1.00000;
const D65_Z: f32 = 1.08883;

const SRGB_TO_XYZ: [[f32; 3]; 3] = [
    [0.4124564, 0.3575761, 0.1804375],
    [0.2126729, 0.7151522, 0.0721750],
    [0.0193339, 0.119_192, 0.9503041],
];

/// sRGB transfer function inverse (display-encoded 0..1 to linear).
#[inline]
fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

#[inline]
fn lab_f(t: f32) -> f32 {
    const DELTA: f32 = 6.0 / 29.0;
    const DELTA_CUBED: f32 = DELTA * DELTA * DELTA;

    if t > DELTA_CUBED {
        t.cbrt()
    } else {
        t / (3.0 * DELTA * DELTA) + 4.0 / 29.0
    }
}

/// Convert linear RGB (0..1) to L*a*b*.
#[inline]
pub fn linear_rgb_to_lab(r: f32, g: f32, b: f32) -> Lab {
    let (r, g, b) = (r.max(0.0), g.max(0.0), b.max(0.0));
    let m = &SRGB_TO_XYZ;
    let x = m[0][0] * r + m[0][1] * g + m[0][2] * b;
    let y = m[1][0] * r + m[1][1] * g + m[1][2] * b;
    let z = m[2][0] * r + m[2][1] * g + m[2][2] * b;

    let fx = lab_f(x / D65_X);
    let fy = lab_f(y / D65_Y);
    let fz = lab_f(z / D65_Z);

    Lab {
        l: 116.0 * fy - 16.0,
        a: 500.0 * (fx - fy),
        b: 200.0 * (fy - fz),
    }
}

/// Convert an 8-bit sRGB pixel to L*a*b*.
#[inline]
pub fn srgb8_to_lab(rgb: [u8; 3]) -> Lab {
    let lin = |c: u8| srgb_to_linear(c as f32 / 255.0);
    linear_rgb_to_lab(lin(rgb[0]), lin(rgb[1]), lin(rgb[2]))
}

/// Rec.601 luma of an 8-bit pixel.
#[inline]
pub(crate) fn luma(rgb: [u8; 3]) -> f32 {
    0.299 * rgb[0] as f32 + 0.587 * rgb[1] as f32 + 0.114 * rgb[2] as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn white_is_neutral() {
        let lab = srgb8_to_lab([255, 255, 255]);
        assert_relative_eq!(lab.l, 100.0, epsilon = 0.05);
        assert!(lab.a.abs() < 0.1);
        assert!(lab.b.abs() < 0.1);
    }

    #[test]
    fn black_is_zero() {
        let lab = srgb8_to_lab([0, 0, 0]);
        assert_relative_eq!(lab.l, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn yellow_has_large_positive_b() {
        let lab = srgb8_to_lab([255, 255, 0]);
        assert!(lab.b > 90.0, "b* = {}", lab.b);
        let blue = srgb8_to_lab([0, 0, 255]);
        assert!(blue.b < -90.0, "b* = {}", blue.b);
    }

    #[test]
    fn luma_weights_sum_to_one() {
        assert_relative_eq!(luma([200, 200, 200]), 200.0, epsilon = 1e-3);
    }
}
