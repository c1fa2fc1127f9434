//! Verification overlay: well contours colored by their classification.

use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_cross_mut, draw_line_segment_mut};

use crate::layout::WellRole;
use crate::locate::{DetectedWell, WellState};
use crate::segment::RectifiedTray;

const SMALL_POSITIVE: Rgb<u8> = Rgb([0, 255, 0]);
const LARGE_POSITIVE: Rgb<u8> = Rgb([255, 0, 0]);
const NEGATIVE: Rgb<u8> = Rgb([0, 0, 255]);
const UNMATCHED: Rgb<u8> = Rgb([255, 0, 255]);

fn well_color(well: &DetectedWell) -> Rgb<u8> {
    match (well.state, well.role) {
        (WellState::Positive, WellRole::Small) => SMALL_POSITIVE,
        (WellState::Positive, WellRole::Large) => LARGE_POSITIVE,
        _ => NEGATIVE,
    }
}

fn draw_closed_polyline(img: &mut RgbImage, points: &[[i32; 2]], color: Rgb<u8>) {
    let n = points.len();
    for i in 0..n {
        let a = points[i];
        let b = points[(i + 1) % n];
        // 2 px wide
        for (dx, dy) in [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0)] {
            draw_line_segment_mut(
                img,
                (a[0] as f32 + dx, a[1] as f32 + dy),
                (b[0] as f32 + dx, b[1] as f32 + dy),
                color,
            );
        }
    }
}

/// Copy of the rectified tray with every well contour drawn; unmatched slots
/// get a cross at their expected center.
pub fn draw_wells(tray: &RectifiedTray, wells: &[DetectedWell]) -> RgbImage {
    let mut img = tray.image.clone();
    for well in wells {
        if well.matched && !well.contour.is_empty() {
            draw_closed_polyline(&mut img, &well.contour, well_color(well));
        } else {
            let [x, y] = well.centroid;
            draw_cross_mut(&mut img, UNMATCHED, x.round() as i32, y.round() as i32);
        }
    }
    img
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::{PixelRect, TrayRegion};
    use nalgebra::Matrix3;

    fn tray() -> RectifiedTray {
        RectifiedTray {
            image: RgbImage::from_pixel(40, 40, Rgb([200, 200, 200])),
            region: TrayRegion {
                bbox: PixelRect {
                    x0: 0,
                    y0: 0,
                    x1: 40,
                    y1: 40,
                },
                corners: [[0.0, 0.0], [39.0, 0.0], [39.0, 39.0], [0.0, 39.0]],
                area_fraction: 1.0,
            },
            homography: Matrix3::identity(),
        }
    }

    fn well(role: WellRole, state: WellState, matched: bool) -> DetectedWell {
        DetectedWell {
            slot_id: 0,
            role,
            contour: if matched {
                vec![[5, 5], [15, 5], [15, 15], [5, 15]]
            } else {
                Vec::new()
            },
            area_px: if matched { 100.0 } else { 0.0 },
            centroid: [10.0, 10.0],
            matched,
            state,
        }
    }

    #[test]
    fn contour_color_follows_state_and_role() {
        let t = tray();
        let img = draw_wells(&t, &[well(WellRole::Small, WellState::Positive, true)]);
        assert_eq!(*img.get_pixel(10, 5), SMALL_POSITIVE);
        let img = draw_wells(&t, &[well(WellRole::Large, WellState::Positive, true)]);
        assert_eq!(*img.get_pixel(5, 10), LARGE_POSITIVE);
        let img = draw_wells(&t, &[well(WellRole::Large, WellState::Negative, true)]);
        assert_eq!(*img.get_pixel(15, 10), NEGATIVE);
        assert_eq!(*img.get_pixel(10, 10), Rgb([200, 200, 200]));
    }

    #[test]
    fn unmatched_slot_gets_a_cross() {
        let img = draw_wells(&tray(), &[well(WellRole::Small, WellState::Negative, false)]);
        assert_eq!(*img.get_pixel(10, 10), UNMATCHED);
    }
}
