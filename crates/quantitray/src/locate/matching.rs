//! Assignment of contour candidates to layout slots.

use super::contour::Candidate;
use super::{DetectedWell, LocateConfig, WellState};
use crate::layout::WellLayout;

#[derive(Debug, Clone, Copy)]
struct SlotGeometry {
    center: [f64; 2],
    area: f64,
    radius: f64,
}

#[derive(Debug, Clone, Copy)]
struct Claim {
    candidate: usize,
    area: f64,
    dist: f64,
}

impl Claim {
    /// Larger area first, then smaller distance, then earlier scan order.
    fn beats(&self, other: &Claim) -> bool {
        if self.area != other.area {
            return self.area > other.area;
        }
        if self.dist != other.dist {
            return self.dist < other.dist;
        }
        self.candidate < other.candidate
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct MatchStats {
    pub n_candidates: usize,
    pub n_rejected_gate: usize,
    pub n_collisions: usize,
}

fn slot_geometry(
    layout: &WellLayout,
    width: u32,
    height: u32,
    cfg: &LocateConfig,
) -> Vec<SlotGeometry> {
    layout
        .slots
        .iter()
        .map(|s| {
            let [sw, sh] = s.size_px(width, height);
            SlotGeometry {
                center: s.center_px(width, height),
                area: s.area_px(width, height),
                radius: cfg.match_radius_frac * sw.max(sh),
            }
        })
        .collect()
}

fn nearest_slot(slots: &[SlotGeometry], p: [f64; 2]) -> Option<(usize, f64)> {
    slots
        .iter()
        .enumerate()
        .map(|(i, s)| (i, (s.center[0] - p[0]).hypot(s.center[1] - p[1])))
        .fold(None, |best, (i, d)| match best {
            Some((_, bd)) if bd <= d => best,
            _ => Some((i, d)),
        })
}

/// One [`DetectedWell`] per layout slot, in slot order. Slots without an
/// accepted candidate are reported unmatched at their expected center.
pub(crate) fn match_to_slots(
    candidates: Vec<Candidate>,
    layout: &WellLayout,
    width: u32,
    height: u32,
    cfg: &LocateConfig,
) -> (Vec<DetectedWell>, MatchStats) {
    let slots = slot_geometry(layout, width, height, cfg);
    let mut claims: Vec<Option<Claim>> = vec![None; slots.len()];
    let mut stats = MatchStats {
        n_candidates: candidates.len(),
        ..MatchStats::default()
    };

    for (ci, cand) in candidates.iter().enumerate() {
        let Some((si, dist)) = nearest_slot(&slots, cand.centroid) else {
            break;
        };
        let slot = &slots[si];
        let area_ok = cand.area >= cfg.min_area_ratio * slot.area
            && cand.area <= cfg.max_area_ratio * slot.area;
        if dist > slot.radius || !area_ok {
            stats.n_rejected_gate += 1;
            continue;
        }
        let claim = Claim {
            candidate: ci,
            area: cand.area,
            dist,
        };
        match &claims[si] {
            Some(prev) => {
                stats.n_collisions += 1;
                tracing::debug!(
                    slot = layout.slots[si].id,
                    prev_area = prev.area,
                    new_area = claim.area,
                    "slot claimed by two contours"
                );
                if claim.beats(prev) {
                    claims[si] = Some(claim);
                }
            }
            None => claims[si] = Some(claim),
        }
    }

    let mut candidates: Vec<Option<Candidate>> = candidates.into_iter().map(Some).collect();
    let wells = layout
        .slots
        .iter()
        .zip(&claims)
        .zip(&slots)
        .map(|((slot, claim), geom)| {
            match (*claim).and_then(|c| candidates[c.candidate].take()) {
                Some(cand) => DetectedWell {
                    slot_id: slot.id,
                    role: slot.role,
                    contour: cand.points,
                    area_px: cand.area,
                    centroid: cand.centroid,
                    matched: true,
                    state: WellState::Unknown,
                },
                None => DetectedWell {
                    slot_id: slot.id,
                    role: slot.role,
                    contour: Vec::new(),
                    area_px: 0.0,
                    centroid: geom.center,
                    matched: false,
                    state: WellState::Unknown,
                },
            }
        })
        .collect();
    (wells, stats)
}
