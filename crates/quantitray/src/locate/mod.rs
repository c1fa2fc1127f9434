//! Well location on the rectified tray: boundary map, hole contours,
//! candidate filtering and slot matching.

mod config;
pub mod contour;
mod matching;
mod threshold;

use image::RgbImage;
use imageproc::contours::{find_contours, BorderType};

pub use config::LocateConfig;

use crate::error::AnalysisError;
use crate::layout::{WellLayout, WellRole};
use contour::Candidate;

/// Fill state of a well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WellState {
    Unknown,
    Positive,
    Negative,
}

/// One layout slot and the contour found for it.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DetectedWell {
    pub slot_id: usize,
    pub role: WellRole,
    /// Closed contour in rectified-tray pixels; empty when unmatched.
    pub contour: Vec<[i32; 2]>,
    pub area_px: f64,
    /// Contour centroid, or the expected slot center when unmatched.
    pub centroid: [f64; 2],
    pub matched: bool,
    pub state: WellState,
}

fn hole_contours(boundary: &image::GrayImage) -> Vec<Candidate> {
    find_contours::<i32>(boundary)
        .into_iter()
        .filter(|c| c.border_type == BorderType::Hole)
        .filter_map(|c| Candidate::from_points(c.points.iter().map(|p| [p.x, p.y]).collect()))
        .collect()
}

/// Global candidate bounds derived from the whole layout.
struct CandidateFilter {
    min_area: f64,
    max_area: f64,
    min_aspect: f64,
    max_aspect: f64,
}

impl CandidateFilter {
    fn new(layout: &WellLayout, width: u32, height: u32, cfg: &LocateConfig) -> Self {
        let mut areas = layout.slots.iter().map(|s| s.area_px(width, height));
        let first = areas.next().unwrap_or(0.0);
        let (a_min, a_max) = areas.fold((first, first), |(lo, hi), a| (lo.min(a), hi.max(a)));
        let mut aspects = layout.slots.iter().map(|s| s.aspect(width, height));
        let first = aspects.next().unwrap_or(1.0);
        let (r_min, r_max) = aspects.fold((first, first), |(lo, hi), r| (lo.min(r), hi.max(r)));
        let tol = cfg.aspect_tolerance.max(1.0);
        Self {
            min_area: cfg.min_area_ratio * a_min,
            max_area: cfg.max_area_ratio * a_max,
            min_aspect: r_min / tol,
            max_aspect: r_max * tol,
        }
    }

    fn accepts(&self, c: &Candidate) -> bool {
        let aspect = c.aspect();
        c.area >= self.min_area
            && c.area <= self.max_area
            && aspect >= self.min_aspect
            && aspect <= self.max_aspect
    }
}

/// Locate every layout slot on a rectified tray image.
///
/// Returns one [`DetectedWell`] per slot in slot order, or
/// [`AnalysisError::LayoutMismatch`] when too few slots were matched.
pub fn locate_wells(
    tray: &RgbImage,
    layout: &WellLayout,
    cfg: &LocateConfig,
) -> Result<Vec<DetectedWell>, AnalysisError> {
    let (w, h) = tray.dimensions();
    let boundary = threshold::boundary_map(tray, cfg);
    let holes = hole_contours(&boundary);
    let n_holes = holes.len();

    let filter = CandidateFilter::new(layout, w, h, cfg);
    let candidates: Vec<Candidate> = holes.into_iter().filter(|c| filter.accepts(c)).collect();
    let (wells, stats) = matching::match_to_slots(candidates, layout, w, h, cfg);

    let total = wells.len();
    let matched = wells.iter().filter(|w| w.matched).count();
    tracing::info!(
        n_holes,
        n_candidates = stats.n_candidates,
        rejected = stats.n_rejected_gate,
        collisions = stats.n_collisions,
        "{}/{} wells matched",
        matched,
        total
    );

    let required = (cfg.min_matched_frac * total as f64).ceil() as usize;
    if total == 0 || matched < required {
        return Err(AnalysisError::LayoutMismatch {
            matched,
            total,
            required,
        });
    }
    Ok(wells)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::render_tray;

    #[test]
    fn synthetic_tray_matches_every_slot() {
        let layout = WellLayout::default();
        let tray = render_tray(&layout, 480, &[]);
        let wells = locate_wells(&tray, &layout, &LocateConfig::default()).unwrap();
        assert_eq!(wells.len(), 97);
        let unmatched: Vec<usize> = wells
            .iter()
            .filter(|w| !w.matched)
            .map(|w| w.slot_id)
            .collect();
        assert!(unmatched.is_empty(), "unmatched slots: {:?}", unmatched);
        for w in &wells {
            let expect = layout.slots[w.slot_id].center_px(480, 750);
            assert!((w.centroid[0] - expect[0]).abs() < 3.0);
            assert!((w.centroid[1] - expect[1]).abs() < 3.0);
        }
    }

    #[test]
    fn positive_wells_are_still_located() {
        let layout = WellLayout::default();
        let positives: Vec<usize> = (0..97).step_by(3).collect();
        let tray = render_tray(&layout, 480, &positives);
        let wells = locate_wells(&tray, &layout, &LocateConfig::default()).unwrap();
        assert!(wells.iter().all(|w| w.matched));
    }

    #[test]
    fn blank_tray_is_a_layout_mismatch() {
        let layout = WellLayout::default();
        let tray = RgbImage::from_pixel(480, 750, image::Rgb([200, 200, 195]));
        let err = locate_wells(&tray, &layout, &LocateConfig::default()).unwrap_err();
        assert_eq!(
            err,
            AnalysisError::LayoutMismatch {
                matched: 0,
                total: 97,
                required: 59
            }
        );
    }
}
