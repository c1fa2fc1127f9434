//! Tray region extraction from the foreground mask and perspective
//! normalization onto the layout canvas.

use std::collections::VecDeque;

use image::{GrayImage, Luma, RgbImage};
use imageproc::region_labelling::{connected_components, Connectivity};
use nalgebra::Matrix3;

use super::{PixelRect, SegmentationMask};
use crate::homography::{rect_to_quad, warp_masked, QuadError};

/// Minimum corner-quad area relative to the bounding box.
const MIN_QUAD_FILL: f64 = 0.5;

/// Largest 8-connected foreground component, holes filled.
#[derive(Debug, Clone)]
pub(crate) struct Component {
    pub width: u32,
    pub height: u32,
    pub inside: Vec<bool>,
    pub area: usize,
    pub bbox: PixelRect,
}

impl Component {
    #[inline]
    pub(crate) fn contains(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.inside[(y * self.width + x) as usize]
    }
}

pub(crate) fn largest_component(mask: &SegmentationMask) -> Option<Component> {
    let (w, h) = (mask.width, mask.height);
    let binary = GrayImage::from_fn(w, h, |x, y| {
        Luma([if mask.is_foreground(x, y) { 255 } else { 0 }])
    });
    let labels = connected_components(&binary, Connectivity::Eight, Luma([0u8]));

    let mut counts: Vec<usize> = Vec::new();
    for p in labels.pixels() {
        let l = p.0[0] as usize;
        if l == 0 {
            continue;
        }
        if counts.len() <= l {
            counts.resize(l + 1, 0);
        }
        counts[l] += 1;
    }
    let (best, &area) = counts
        .iter()
        .enumerate()
        .skip(1)
        .fold((0, &0usize), |acc, (l, c)| if *c > *acc.1 { (l, c) } else { acc });
    if area == 0 {
        return None;
    }

    let mut inside = vec![false; (w as usize) * (h as usize)];
    let (mut x0, mut y0, mut x1, mut y1) = (u32::MAX, u32::MAX, 0u32, 0u32);
    for (x, y, p) in labels.enumerate_pixels() {
        if p.0[0] as usize == best {
            inside[(y * w + x) as usize] = true;
            x0 = x0.min(x);
            y0 = y0.min(y);
            x1 = x1.max(x + 1);
            y1 = y1.max(y + 1);
        }
    }
    let filled = fill_holes(&mut inside, w, h);
    Some(Component {
        width: w,
        height: h,
        inside,
        area: area + filled,
        bbox: PixelRect { x0, y0, x1, y1 },
    })
}

/// Mark every pixel not 4-connected to the image border through outside
/// pixels as inside. Returns the number of pixels added.
fn fill_holes(inside: &mut [bool], w: u32, h: u32) -> usize {
    let (w, h) = (w as usize, h as usize);
    let mut outer = vec![false; w * h];
    let mut queue = VecDeque::new();
    for y in 0..h {
        for x in 0..w {
            let border = x == 0 || y == 0 || x + 1 == w || y + 1 == h;
            let i = y * w + x;
            if border && !inside[i] {
                outer[i] = true;
                queue.push_back(i);
            }
        }
    }
    while let Some(i) = queue.pop_front() {
        let (x, y) = (i % w, i / w);
        let mut visit = |j: usize| {
            if !inside[j] && !outer[j] {
                outer[j] = true;
                queue.push_back(j);
            }
        };
        if x > 0 {
            visit(i - 1);
        }
        if x + 1 < w {
            visit(i + 1);
        }
        if y > 0 {
            visit(i - w);
        }
        if y + 1 < h {
            visit(i + w);
        }
    }
    let mut added = 0;
    for (v, o) in inside.iter_mut().zip(&outer) {
        if !*v && !*o {
            *v = true;
            added += 1;
        }
    }
    added
}

fn quad_area(q: &[[f64; 2]; 4]) -> f64 {
    let mut s = 0.0;
    for i in 0..4 {
        let a = q[i];
        let b = q[(i + 1) % 4];
        s += a[0] * b[1] - b[0] * a[1];
    }
    0.5 * s.abs()
}

fn bbox_corners(b: &PixelRect) -> [[f64; 2]; 4] {
    let (x0, y0) = (b.x0 as f64, b.y0 as f64);
    let (x1, y1) = ((b.x1.max(b.x0 + 1) - 1) as f64, (b.y1.max(b.y0 + 1) - 1) as f64);
    [[x0, y0], [x1, y0], [x1, y1], [x0, y1]]
}

/// Tray corners ordered top-left, top-right, bottom-right, bottom-left.
pub(crate) fn tray_corners(comp: &Component, perspective: bool) -> [[f64; 2]; 4] {
    let fallback = bbox_corners(&comp.bbox);
    if !perspective {
        return fallback;
    }

    // (score, x, y) per corner: min x+y, max x-y, max x+y, min x-y
    let mut best = [
        (i64::MAX, 0u32, 0u32),
        (i64::MIN, 0, 0),
        (i64::MIN, 0, 0),
        (i64::MAX, 0, 0),
    ];
    for y in comp.bbox.y0..comp.bbox.y1 {
        for x in comp.bbox.x0..comp.bbox.x1 {
            if !comp.contains(x, y) {
                continue;
            }
            let sum = x as i64 + y as i64;
            let diff = x as i64 - y as i64;
            if sum < best[0].0 {
                best[0] = (sum, x, y);
            }
            if diff > best[1].0 {
                best[1] = (diff, x, y);
            }
            if sum > best[2].0 {
                best[2] = (sum, x, y);
            }
            if diff < best[3].0 {
                best[3] = (diff, x, y);
            }
        }
    }
    let quad = best.map(|(_, x, y)| [x as f64, y as f64]);

    let bbox_area = comp.bbox.area() as f64;
    if quad_area(&quad) < MIN_QUAD_FILL * bbox_area {
        tracing::warn!(
            quad_area = quad_area(&quad),
            bbox_area,
            "degenerate tray corner quad; using bounding box corners"
        );
        return fallback;
    }
    quad
}

/// Canvas-to-image homography for the given corners.
pub(crate) fn canvas_homography(
    corners: &[[f64; 2]; 4],
    width: u32,
    height: u32,
) -> Result<Matrix3<f64>, QuadError> {
    rect_to_quad(width.max(2), height.max(2), corners)
}

pub(crate) fn warp_tray(
    image: &RgbImage,
    comp: &Component,
    canvas_to_image: &Matrix3<f64>,
    width: u32,
    height: u32,
) -> RgbImage {
    warp_masked(image, canvas_to_image, width, height, |x, y| comp.contains(x, y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::homography::project;
    use approx::assert_relative_eq;

    fn mask_from_fn(w: u32, h: u32, f: impl Fn(u32, u32) -> bool) -> SegmentationMask {
        let mut labels = Vec::with_capacity((w * h) as usize);
        for y in 0..h {
            for x in 0..w {
                labels.push(f(x, y));
            }
        }
        SegmentationMask {
            width: w,
            height: h,
            labels,
        }
    }

    #[test]
    fn largest_component_wins() {
        let mask = mask_from_fn(30, 20, |x, y| {
            ((2..6).contains(&x) && (2..6).contains(&y))
                || ((10..28).contains(&x) && (4..18).contains(&y))
        });
        let comp = largest_component(&mask).unwrap();
        assert_eq!(comp.area, 18 * 14);
        assert_eq!(
            comp.bbox,
            PixelRect {
                x0: 10,
                y0: 4,
                x1: 28,
                y1: 18
            }
        );
        assert!(!comp.contains(3, 3));
    }

    #[test]
    fn holes_are_filled() {
        let mask = mask_from_fn(20, 20, |x, y| {
            let ring = (3..17).contains(&x) && (3..17).contains(&y);
            let hole = (6..10).contains(&x) && (6..10).contains(&y);
            ring && !hole
        });
        let comp = largest_component(&mask).unwrap();
        assert!(comp.contains(7, 7));
        assert_eq!(comp.area, 14 * 14);
    }

    #[test]
    fn empty_mask_has_no_component() {
        let mask = mask_from_fn(8, 8, |_, _| false);
        assert!(largest_component(&mask).is_none());
    }

    #[test]
    fn rectangle_corners_are_its_extremes() {
        let mask = mask_from_fn(30, 20, |x, y| (5..25).contains(&x) && (3..17).contains(&y));
        let comp = largest_component(&mask).unwrap();
        let c = tray_corners(&comp, true);
        assert_eq!(c, [[5.0, 3.0], [24.0, 3.0], [24.0, 16.0], [5.0, 16.0]]);
    }

    #[test]
    fn thin_diagonal_falls_back_to_bbox() {
        let mask = mask_from_fn(20, 20, |x, y| x == y || x == y + 1);
        let comp = largest_component(&mask).unwrap();
        let c = tray_corners(&comp, true);
        assert_eq!(c, bbox_corners(&comp.bbox));
    }

    #[test]
    fn canvas_corners_map_to_tray_corners() {
        let corners = [[12.0, 8.0], [110.0, 14.0], [104.0, 170.0], [6.0, 160.0]];
        let h = canvas_homography(&corners, 48, 75).unwrap();
        let tr = project(&h, 47.0, 0.0);
        assert_relative_eq!(tr[0], 110.0, epsilon = 1e-6);
        assert_relative_eq!(tr[1], 14.0, epsilon = 1e-6);
        let bl = project(&h, 0.0, 74.0);
        assert_relative_eq!(bl[0], 6.0, epsilon = 1e-6);
        assert_relative_eq!(bl[1], 160.0, epsilon = 1e-6);
    }
}
