//! Well fill-state classification from interior color.
//!
//! Positive wells are yellow: their median b* is compared against a fixed
//! threshold, and wells inside the uncertainty band are decided either by the
//! threshold or relative to the tray's own negative wells.

mod config;
mod sampling;

use image::RgbImage;

pub use config::{ClassifyConfig, ThresholdMode};
pub use sampling::{sample_well_color, WellColor};

use crate::layout::WellRole;
use crate::locate::{DetectedWell, WellState};

/// Positive counts per well role.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize,
)]
pub struct WellTally {
    pub small_positive: u32,
    pub large_positive: u32,
    pub small_total: u32,
    pub large_total: u32,
}

impl WellTally {
    pub fn from_wells(wells: &[DetectedWell]) -> Self {
        let mut t = Self::default();
        for w in wells {
            let pos = (w.state == WellState::Positive) as u32;
            match w.role {
                WellRole::Small => {
                    t.small_total += 1;
                    t.small_positive += pos;
                }
                WellRole::Large => {
                    t.large_total += 1;
                    t.large_positive += pos;
                }
            }
        }
        t
    }
}

/// Color of a well usable for classification: large enough contour and
/// enough interior samples.
pub fn well_color(
    tray: &RgbImage,
    well: &DetectedWell,
    cfg: &ClassifyConfig,
) -> Option<WellColor> {
    if !well.matched || well.area_px < cfg.min_area_px {
        return None;
    }
    sample_well_color(tray, &well.contour, well.centroid, cfg.sample_shrink)
        .filter(|c| c.n_samples >= cfg.min_samples)
}

/// Decide a single well against the fixed threshold.
pub fn classify_well(tray: &RgbImage, well: &DetectedWell, cfg: &ClassifyConfig) -> WellState {
    match well_color(tray, well, cfg) {
        Some(c) if c.lab.b >= cfg.threshold_b => WellState::Positive,
        _ => WellState::Negative,
    }
}

fn median_b(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    Some(if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    })
}

/// Outcome of tray-level classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifyReport {
    /// Median b* of the clearly negative wells.
    pub reference_b: Option<f32>,
    /// Usable color per well, in input order.
    pub colors: Vec<Option<WellColor>>,
}

/// Classify all wells of one tray in two passes and set their `state`.
pub fn classify_wells(
    tray: &RgbImage,
    wells: &mut [DetectedWell],
    cfg: &ClassifyConfig,
) -> ClassifyReport {
    let colors: Vec<Option<WellColor>> = wells.iter().map(|w| well_color(tray, w, cfg)).collect();

    let low = cfg.threshold_b - cfg.tolerance_b;
    let high = cfg.threshold_b + cfg.tolerance_b;
    let mut negatives: Vec<f32> = colors
        .iter()
        .flatten()
        .map(|c| c.lab.b)
        .filter(|&b| b <= low)
        .collect();
    let reference_b = median_b(&mut negatives);
    if cfg.mode == ThresholdMode::Adaptive && reference_b.is_none() {
        tracing::warn!("no clearly negative wells; falling back to the fixed threshold");
    }

    for (well, color) in wells.iter_mut().zip(&colors) {
        well.state = match color {
            None => WellState::Negative,
            Some(c) => {
                let b = c.lab.b;
                let positive = if b >= high {
                    true
                } else if b <= low {
                    false
                } else {
                    match (cfg.mode, reference_b) {
                        (ThresholdMode::Adaptive, Some(r)) => b - r >= cfg.adaptive_delta_b,
                        _ => b >= cfg.threshold_b,
                    }
                };
                if positive {
                    WellState::Positive
                } else {
                    WellState::Negative
                }
            }
        };
    }

    let n_positive = wells.iter().filter(|w| w.state == WellState::Positive).count();
    tracing::debug!(
        reference_b = reference_b.map(f64::from),
        n_positive,
        n_usable = colors.iter().flatten().count(),
        "wells classified"
    );
    ClassifyReport {
        reference_b,
        colors,
    }
}
