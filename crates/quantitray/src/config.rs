use std::path::Path;

use crate::classify::ClassifyConfig;
use crate::error::{read_to_string, ReferenceError};
use crate::locate::LocateConfig;
use crate::segment::SegmentConfig;

/// Top-level analysis configuration.
///
/// Every section has defaults, so a JSON file only needs the fields it
/// overrides.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AnalyzeConfig {
    pub segment: SegmentConfig,
    pub locate: LocateConfig,
    pub classify: ClassifyConfig,
    /// Per-image budget in milliseconds, checked between stages.
    pub time_budget_ms: Option<u64>,
}

impl AnalyzeConfig {
    pub fn from_json_file(path: &Path) -> Result<Self, ReferenceError> {
        Self::from_json_str(&read_to_string(path)?)
    }

    pub fn from_json_str(data: &str) -> Result<Self, ReferenceError> {
        let cfg: Self = serde_json::from_str(data)?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject values no stage can work with.
    pub fn validate(&self) -> Result<(), ReferenceError> {
        let s = &self.segment;
        if s.gmm_components == 0 || s.max_iterations == 0 {
            return Err(ReferenceError::invalid(
                "segment.gmm_components and segment.max_iterations must be >= 1",
            ));
        }
        if !(0.0..0.5).contains(&s.seed_inset_frac) {
            return Err(ReferenceError::invalid("segment.seed_inset_frac must be in [0, 0.5)"));
        }
        if s.rectified_width_px < 2 {
            return Err(ReferenceError::invalid("segment.rectified_width_px must be >= 2"));
        }
        if !(self.classify.sample_shrink > 0.0 && self.classify.sample_shrink <= 1.0) {
            return Err(ReferenceError::invalid("classify.sample_shrink must be in (0, 1]"));
        }
        let l = &self.locate;
        if l.min_area_ratio > l.max_area_ratio {
            return Err(ReferenceError::invalid(
                "locate.min_area_ratio must not exceed locate.max_area_ratio",
            ));
        }
        if !(0.0..=1.0).contains(&l.min_matched_frac) {
            return Err(ReferenceError::invalid("locate.min_matched_frac must be in [0, 1]"));
        }
        Ok(())
    }
}
