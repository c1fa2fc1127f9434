//! Synthetic tray images shared by unit tests.

use image::imageops::{self, FilterType};
use image::{Rgb, RgbImage};

use crate::homography::{project, rect_to_quad, warp_masked};
use crate::layout::{WellLayout, WellRole};

pub(crate) const GROUND: [u8; 3] = [40, 60, 50];
pub(crate) const SURFACE: [u8; 3] = [205, 205, 200];
pub(crate) const OUTLINE: [u8; 3] = [70, 70, 70];
pub(crate) const NEGATIVE: [u8; 3] = [235, 235, 225];
pub(crate) const POSITIVE: [u8; 3] = [235, 200, 40];
pub(crate) const OUTLINE_PX: u32 = 3;

fn fill_rect(img: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, rgb: [u8; 3]) {
    for y in y0..y1.min(img.height()) {
        for x in x0..x1.min(img.width()) {
            img.put_pixel(x, y, Rgb(rgb));
        }
    }
}

/// Render a rectified tray of the given canvas width. Every slot is drawn as
/// a filled rectangle with a dark wall; slot ids in `positives` are yellow.
pub(crate) fn render_tray(layout: &WellLayout, width: u32, positives: &[usize]) -> RgbImage {
    let height = layout.canvas_height(width);
    let mut img = RgbImage::from_pixel(width, height, Rgb(SURFACE));
    for slot in &layout.slots {
        let [cx, cy] = slot.center_px(width, height);
        let [sw, sh] = slot.size_px(width, height);
        let x0 = (cx - 0.5 * sw).round().max(0.0) as u32;
        let y0 = (cy - 0.5 * sh).round().max(0.0) as u32;
        let x1 = (cx + 0.5 * sw).round() as u32;
        let y1 = (cy + 0.5 * sh).round() as u32;
        fill_rect(&mut img, x0, y0, x1, y1, OUTLINE);
        let fill = if positives.contains(&slot.id) {
            POSITIVE
        } else {
            NEGATIVE
        };
        fill_rect(
            &mut img,
            x0 + OUTLINE_PX,
            y0 + OUTLINE_PX,
            x1.saturating_sub(OUTLINE_PX),
            y1.saturating_sub(OUTLINE_PX),
            fill,
        );
    }
    img
}

/// Render a photo of size `photo` with the tray scaled into `rect`
/// (`[x0, y0, x1, y1)`) on a dark ground.
pub(crate) fn render_photo(
    layout: &WellLayout,
    positives: &[usize],
    photo: (u32, u32),
    rect: [u32; 4],
) -> RgbImage {
    let tray = render_tray(layout, 480, positives);
    let (tw, th) = (rect[2] - rect[0], rect[3] - rect[1]);
    let scaled = imageops::resize(&tray, tw, th, FilterType::Triangle);
    let mut img = RgbImage::from_pixel(photo.0, photo.1, Rgb(GROUND));
    imageops::overlay(&mut img, &scaled, rect[0] as i64, rect[1] as i64);
    img
}

/// Render a photo of size `photo` with the tray warped onto the quad
/// `corners` (TL, TR, BR, BL) on a dark ground.
pub(crate) fn render_quad_photo(
    layout: &WellLayout,
    positives: &[usize],
    photo: (u32, u32),
    corners: [[f64; 2]; 4],
) -> RgbImage {
    let tray = render_tray(layout, 480, positives);
    let (tw, th) = tray.dimensions();
    let canvas_to_photo = rect_to_quad(tw, th, &corners).expect("test quad is valid");
    let photo_to_canvas = canvas_to_photo.try_inverse().expect("test quad is invertible");
    let mut img = warp_masked(&tray, &photo_to_canvas, photo.0, photo.1, |_, _| true);
    let (max_x, max_y) = ((tw - 1) as f64, (th - 1) as f64);
    for (x, y, px) in img.enumerate_pixels_mut() {
        let [u, v] = project(&photo_to_canvas, x as f64, y as f64);
        if !(0.0..=max_x).contains(&u) || !(0.0..=max_y).contains(&v) {
            *px = Rgb(GROUND);
        }
    }
    img
}

/// Slot ids of the first `n_small` small and first `n_large` large wells.
pub(crate) fn positives_for(layout: &WellLayout, n_small: usize, n_large: usize) -> Vec<usize> {
    layout
        .slots_with_role(WellRole::Small)
        .take(n_small)
        .chain(layout.slots_with_role(WellRole::Large).take(n_large))
        .map(|s| s.id)
        .collect()
}

/// Default photo used by pipeline tests: 440x620 with the tray at
/// (60, 60)..(380, 560).
pub(crate) fn default_photo(layout: &WellLayout, positives: &[usize]) -> RgbImage {
    render_photo(layout, positives, (440, 620), [60, 60, 380, 560])
}
