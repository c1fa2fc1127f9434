//! Color sampling inside a well contour.

use image::RgbImage;

use crate::color::{srgb8_to_lab, Lab};
use crate::locate::contour::{point_in_polygon, polygon_bbox};

/// Median color of a well's interior.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WellColor {
    pub lab: Lab,
    pub n_samples: usize,
}

fn median(values: &mut [f32]) -> f32 {
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    }
}

/// Sample pixels whose center, scaled about `centroid` by `1 / shrink`, lies
/// inside `contour`. Returns `None` when no pixel qualifies.
pub fn sample_well_color(
    img: &RgbImage,
    contour: &[[i32; 2]],
    centroid: [f64; 2],
    shrink: f64,
) -> Option<WellColor> {
    let bbox = polygon_bbox(contour)?;
    let shrink = if shrink > 0.0 { shrink.min(1.0) } else { 1.0 };
    let (w, h) = img.dimensions();
    let x0 = bbox[0].max(0) as u32;
    let y0 = bbox[1].max(0) as u32;
    let x1 = (bbox[2].max(-1) + 1).min(w as i32) as u32;
    let y1 = (bbox[3].max(-1) + 1).min(h as i32) as u32;

    let mut ls = Vec::new();
    let mut as_ = Vec::new();
    let mut bs = Vec::new();
    for y in y0..y1 {
        for x in x0..x1 {
            let px = centroid[0] + (x as f64 - centroid[0]) / shrink;
            let py = centroid[1] + (y as f64 - centroid[1]) / shrink;
            if !point_in_polygon(contour, px, py) {
                continue;
            }
            let lab = srgb8_to_lab(img.get_pixel(x, y).0);
            ls.push(lab.l);
            as_.push(lab.a);
            bs.push(lab.b);
        }
    }
    if ls.is_empty() {
        return None;
    }
    Some(WellColor {
        lab: Lab {
            l: median(&mut ls),
            a: median(&mut as_),
            b: median(&mut bs),
        },
        n_samples: ls.len(),
    })
}
