//! Tray segmentation: foreground/background separation of the raw photo,
//! tray region extraction and rectification onto the layout canvas.

mod config;
mod gmm;
mod grabcut;
mod maxflow;
mod rectify;
mod trimap;

use image::imageops::{self, FilterType};
use image::RgbImage;
use nalgebra::Matrix3;
use rand::rngs::StdRng;
use rand::SeedableRng;

pub use config::SegmentConfig;

use crate::error::AnalysisError;
use crate::layout::WellLayout;
use grabcut::{grabcut, GrabCutParams};
use trimap::Trimap;

/// Raw photograph: 8-bit RGB, caller-owned.
pub type RawImage = RgbImage;

/// Axis-aligned pixel rectangle `[x0, x1) x [y0, y1)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct PixelRect {
    pub x0: u32,
    pub y0: u32,
    pub x1: u32,
    pub y1: u32,
}

impl PixelRect {
    pub fn width(&self) -> u32 {
        self.x1.saturating_sub(self.x0)
    }

    pub fn height(&self) -> u32 {
        self.y1.saturating_sub(self.y0)
    }

    pub fn area(&self) -> u64 {
        self.width() as u64 * self.height() as u64
    }
}

/// Per-pixel tray/background labels at raw-image resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationMask {
    pub width: u32,
    pub height: u32,
    /// Row-major, `true` = tray.
    pub labels: Vec<bool>,
}

impl SegmentationMask {
    #[inline]
    pub fn is_foreground(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.labels[(y * self.width + x) as usize]
    }

    pub fn foreground_count(&self) -> usize {
        self.labels.iter().filter(|&&l| l).count()
    }

    /// Bounding box of all foreground pixels, `None` for an empty mask.
    pub fn bounding_box(&self) -> Option<PixelRect> {
        let mut rect: Option<PixelRect> = None;
        for y in 0..self.height {
            for x in 0..self.width {
                if !self.labels[(y * self.width + x) as usize] {
                    continue;
                }
                let r = rect.get_or_insert(PixelRect {
                    x0: x,
                    y0: y,
                    x1: x + 1,
                    y1: y + 1,
                });
                r.x0 = r.x0.min(x);
                r.y0 = r.y0.min(y);
                r.x1 = r.x1.max(x + 1);
                r.y1 = r.y1.max(y + 1);
            }
        }
        rect
    }
}

/// Located tray in raw-image coordinates.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrayRegion {
    pub bbox: PixelRect,
    /// Top-left, top-right, bottom-right, bottom-left.
    pub corners: [[f64; 2]; 4],
    /// Tray component area over image area.
    pub area_fraction: f64,
}

/// Tray resampled onto the layout canvas.
#[derive(Debug, Clone)]
pub struct RectifiedTray {
    pub image: RgbImage,
    pub region: TrayRegion,
    /// Maps rectified pixel coordinates to raw-image coordinates.
    pub homography: Matrix3<f64>,
}

impl RectifiedTray {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

fn working_size(w: u32, h: u32, max_side: u32) -> (u32, u32) {
    let longest = w.max(h);
    if max_side == 0 || longest <= max_side {
        return (w, h);
    }
    let s = max_side as f64 / longest as f64;
    (
        ((w as f64 * s).round() as u32).max(1),
        ((h as f64 * s).round() as u32).max(1),
    )
}

fn seed_trimap(w: u32, h: u32, cfg: &SegmentConfig) -> Trimap {
    let inset = cfg.seed_inset_frac.clamp(0.0, 0.45);
    let ix = (w as f32 * inset).round() as u32;
    let iy = (h as f32 * inset).round() as u32;
    let margin = cfg.probable_bg_margin_frac.max(0.0);
    let mx = ((w as f32 * margin).round() as u32).max(1);
    let my = ((h as f32 * margin).round() as u32).max(1);
    Trimap::from_rect(w, h, [ix, iy, w - ix, h - iy], [mx, my])
        .with_definite_core(cfg.definite_core_frac)
}

/// Separate the tray from the background. The returned mask has the
/// dimensions of `image`.
pub fn segment_mask(
    image: &RawImage,
    cfg: &SegmentConfig,
) -> Result<SegmentationMask, AnalysisError> {
    let (w, h) = image.dimensions();
    if w.min(h) < cfg.min_side_px.max(1) {
        return Err(AnalysisError::InsufficientResolution {
            width: w,
            height: h,
            min_side_px: cfg.min_side_px,
        });
    }

    let (ww, wh) = working_size(w, h, cfg.working_max_side_px);
    let working = if (ww, wh) == (w, h) {
        image.clone()
    } else {
        imageops::resize(image, ww, wh, FilterType::Triangle)
    };

    let trimap = seed_trimap(ww, wh, cfg);
    let params = GrabCutParams {
        components: cfg.gmm_components.max(1),
        max_iterations: cfg.max_iterations.max(1),
        convergence_frac: cfg.convergence_frac,
        smoothness: cfg.smoothness,
    };
    let mut rng = StdRng::seed_from_u64(cfg.seed);
    let outcome = grabcut(&working, &trimap, &params, &mut rng);

    let mut labels = Vec::with_capacity((w as usize) * (h as usize));
    for y in 0..h {
        let wy = ((y as u64 * wh as u64) / h as u64) as u32;
        for x in 0..w {
            let wx = ((x as u64 * ww as u64) / w as u64) as u32;
            labels.push(outcome.foreground[(wy * ww + wx) as usize]);
        }
    }
    let mask = SegmentationMask {
        width: w,
        height: h,
        labels,
    };
    tracing::debug!(
        working_w = ww,
        working_h = wh,
        iterations = outcome.iterations,
        foreground = mask.foreground_count(),
        "foreground segmentation done"
    );
    Ok(mask)
}

/// Locate the tray in `mask` and rectify it onto the canvas of `layout`.
pub fn extract_tray(
    image: &RawImage,
    mask: &SegmentationMask,
    layout: &WellLayout,
    cfg: &SegmentConfig,
) -> Result<RectifiedTray, AnalysisError> {
    let total = (mask.width as f64 * mask.height as f64).max(1.0);
    let comp = rectify::largest_component(mask);
    let area_fraction = comp.as_ref().map_or(0.0, |c| c.area as f64 / total);
    let comp = match comp {
        Some(c) if area_fraction >= cfg.min_tray_area_frac => c,
        _ => {
            return Err(AnalysisError::SegmentationFailed {
                area_fraction,
                min_fraction: cfg.min_tray_area_frac,
            })
        }
    };

    let width = cfg.rectified_width_px.max(2);
    let height = layout.canvas_height(width).max(2);
    let mut corners = rectify::tray_corners(&comp, cfg.perspective_correction);
    let homography = match rectify::canvas_homography(&corners, width, height) {
        Ok(h) => h,
        Err(e) => {
            tracing::warn!("corner homography failed ({}); using bounding box", e);
            corners = rectify::tray_corners(&comp, false);
            rectify::canvas_homography(&corners, width, height).map_err(|_| {
                AnalysisError::SegmentationFailed {
                    area_fraction,
                    min_fraction: cfg.min_tray_area_frac,
                }
            })?
        }
    };
    let warped = rectify::warp_tray(image, &comp, &homography, width, height);

    let region = TrayRegion {
        bbox: comp.bbox,
        corners,
        area_fraction,
    };
    tracing::info!(
        area_fraction,
        bbox = ?region.bbox,
        "tray located"
    );
    Ok(RectifiedTray {
        image: warped,
        region,
        homography,
    })
}

/// Full segmentation: mask, tray region and rectified tray image.
pub fn segment(
    image: &RawImage,
    layout: &WellLayout,
    cfg: &SegmentConfig,
) -> Result<(SegmentationMask, RectifiedTray), AnalysisError> {
    let mask = segment_mask(image, cfg)?;
    let tray = extract_tray(image, &mask, layout, cfg)?;
    Ok((mask, tray))
}
