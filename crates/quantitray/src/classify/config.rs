/// How wells inside the uncertainty band around the threshold are decided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdMode {
    /// Compare against `threshold_b` only.
    Fixed,
    /// Compare against the tray's own negative-well reference color.
    Adaptive,
}

/// Well color decision controls. Thresholds are in CIE b* units.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ClassifyConfig {
    pub threshold_b: f32,
    /// Half-width of the band around `threshold_b` decided by `mode`.
    pub tolerance_b: f32,
    pub mode: ThresholdMode,
    /// Minimum b* rise over the negative reference for an adaptive positive.
    pub adaptive_delta_b: f32,
    /// Wells with a smaller contour area are negative.
    pub min_area_px: f64,
    /// Sampling region scale about the contour centroid.
    pub sample_shrink: f64,
    /// Wells with fewer color samples are negative.
    pub min_samples: usize,
}

impl Default for ClassifyConfig {
    fn default() -> Self {
        Self {
            threshold_b: 32.0,
            tolerance_b: 6.0,
            mode: ThresholdMode::Adaptive,
            adaptive_delta_b: 20.0,
            min_area_px: 50.0,
            sample_shrink: 0.7,
            min_samples: 8,
        }
    }
}
