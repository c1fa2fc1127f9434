//! Boundary map: dark well walls against the locally brighter tray.

use image::{GrayImage, ImageBuffer, Luma, RgbImage};
use imageproc::distance_transform::Norm;

use super::LocateConfig;
use crate::color::luma;

type GrayF32 = ImageBuffer<Luma<f32>, Vec<f32>>;

fn luma_f32(img: &RgbImage) -> GrayF32 {
    ImageBuffer::from_fn(img.width(), img.height(), |x, y| {
        Luma([luma(img.get_pixel(x, y).0)])
    })
}

/// Summed-area table with a zero first row and column.
struct Integral {
    stride: usize,
    sums: Vec<f64>,
}

impl Integral {
    fn new(img: &GrayF32) -> Self {
        let (w, h) = (img.width() as usize, img.height() as usize);
        let stride = w + 1;
        let mut sums = vec![0.0; stride * (h + 1)];
        for y in 0..h {
            let mut row = 0.0;
            for x in 0..w {
                row += img.get_pixel(x as u32, y as u32).0[0] as f64;
                sums[(y + 1) * stride + x + 1] = sums[y * stride + x + 1] + row;
            }
        }
        Self { stride, sums }
    }

    /// Sum over `[x0, x1) x [y0, y1)`.
    fn sum(&self, x0: usize, y0: usize, x1: usize, y1: usize) -> f64 {
        let s = self.stride;
        self.sums[y1 * s + x1] - self.sums[y0 * s + x1] - self.sums[y1 * s + x0]
            + self.sums[y0 * s + x0]
    }
}

/// Local-mean threshold: 255 where the pixel is darker than its window mean
/// minus `offset`. The window is clipped at the image border.
pub(crate) fn adaptive_threshold(img: &GrayF32, radius: u32, offset: f32) -> GrayImage {
    let (w, h) = img.dimensions();
    let integral = Integral::new(img);
    let r = radius as usize;
    GrayImage::from_fn(w, h, |x, y| {
        let (x, y) = (x as usize, y as usize);
        let x0 = x.saturating_sub(r);
        let y0 = y.saturating_sub(r);
        let x1 = (x + r + 1).min(w as usize);
        let y1 = (y + r + 1).min(h as usize);
        let n = ((x1 - x0) * (y1 - y0)) as f64;
        let mean = integral.sum(x0, y0, x1, y1) / n;
        let v = img.get_pixel(x as u32, y as u32).0[0] as f64;
        Luma([if v < mean - offset as f64 { 255 } else { 0 }])
    })
}

/// Binary boundary map of a rectified tray (255 = well wall).
pub(crate) fn boundary_map(tray: &RgbImage, cfg: &LocateConfig) -> GrayImage {
    let gray = luma_f32(tray);
    let gray = if cfg.blur_sigma > 0.0 {
        imageproc::filter::gaussian_blur_f32(&gray, cfg.blur_sigma)
    } else {
        gray
    };
    let radius = ((cfg.block_radius_frac * tray.width() as f32).round() as u32).max(1);
    let binary = adaptive_threshold(&gray, radius, cfg.threshold_offset);
    if cfg.close_radius == 0 {
        return binary;
    }
    imageproc::morphology::close(&binary, Norm::LInf, cfg.close_radius)
}
