use image::{Rgb, RgbImage};
use nalgebra::Matrix3;

use super::project;

/// Bilinear RGB sample at a sub-pixel location. Returns `None` outside the
/// image.
#[inline]
fn sample_bilinear(img: &RgbImage, x: f64, y: f64) -> Option<[f32; 3]> {
    let (w, h) = img.dimensions();
    if w == 0 || h == 0 || !(x.is_finite() && y.is_finite()) || x < 0.0 || y < 0.0 {
        return None;
    }
    let max_x = (w - 1) as f64;
    let max_y = (h - 1) as f64;
    if x > max_x || y > max_y {
        return None;
    }

    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = (x - x0 as f64) as f32;
    let fy = (y - y0 as f64) as f32;

    let p00 = img.get_pixel(x0, y0).0;
    let p10 = img.get_pixel(x1, y0).0;
    let p01 = img.get_pixel(x0, y1).0;
    let p11 = img.get_pixel(x1, y1).0;

    let mut out = [0.0f32; 3];
    for c in 0..3 {
        let top = p00[c] as f32 * (1.0 - fx) + p10[c] as f32 * fx;
        let bottom = p01[c] as f32 * (1.0 - fx) + p11[c] as f32 * fx;
        out[c] = top * (1.0 - fy) + bottom * fy;
    }
    Some(out)
}

/// Resample `src` onto a `width x height` canvas.
///
/// `canvas_to_src` maps canvas pixel coordinates to source pixel coordinates.
/// Canvas pixels that land outside the source, or on a source pixel rejected
/// by `inside`, are black.
pub(crate) fn warp_masked<F>(
    src: &RgbImage,
    canvas_to_src: &Matrix3<f64>,
    width: u32,
    height: u32,
    inside: F,
) -> RgbImage
where
    F: Fn(u32, u32) -> bool,
{
    let mut out = RgbImage::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let [sx, sy] = project(canvas_to_src, x as f64, y as f64);
            let Some(rgb) = sample_bilinear(src, sx, sy) else {
                continue;
            };
            let nx = sx.round() as u32;
            let ny = sy.round() as u32;
            if !inside(nx, ny) {
                continue;
            }
            out.put_pixel(
                x,
                y,
                Rgb([
                    rgb[0].round().clamp(0.0, 255.0) as u8,
                    rgb[1].round().clamp(0.0, 255.0) as u8,
                    rgb[2].round().clamp(0.0, 255.0) as u8,
                ]),
            );
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_warp_copies_pixels() {
        let src = RgbImage::from_fn(8, 6, |x, y| Rgb([(x * 10) as u8, (y * 20) as u8, 7]));
        let out = warp_masked(&src, &Matrix3::identity(), 8, 6, |_, _| true);
        assert_eq!(out, src);
    }

    #[test]
    fn rejected_pixels_are_black() {
        let src = RgbImage::from_pixel(8, 8, Rgb([200, 100, 50]));
        let out = warp_masked(&src, &Matrix3::identity(), 8, 8, |x, _| x < 4);
        assert_eq!(out.get_pixel(2, 2).0, [200, 100, 50]);
        assert_eq!(out.get_pixel(6, 2).0, [0, 0, 0]);
    }

    #[test]
    fn scaling_warp_interpolates() {
        let src = RgbImage::from_fn(2, 1, |x, _| Rgb([(x * 100) as u8, 0, 0]));
        // canvas x in [0, 2] maps to source x in [0, 1]
        let h = Matrix3::new(0.5, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0);
        let out = warp_masked(&src, &h, 3, 1, |_, _| true);
        assert_eq!(out.get_pixel(1, 0).0[0], 50);
        assert_eq!(out.get_pixel(2, 0).0[0], 100);
    }
}
