/// Well contour detection and slot matching controls.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LocateConfig {
    /// Gaussian pre-blur sigma (pixels). `0` disables the blur.
    pub blur_sigma: f32,
    /// Adaptive threshold window radius as a fraction of the tray width.
    pub block_radius_frac: f32,
    /// A pixel is a boundary pixel when darker than the local mean minus this.
    pub threshold_offset: f32,
    /// Morphological closing radius (pixels, L-infinity).
    pub close_radius: u8,
    /// Lower candidate area bound relative to the expected slot area.
    pub min_area_ratio: f64,
    /// Upper candidate area bound relative to the expected slot area.
    pub max_area_ratio: f64,
    /// Allowed factor between candidate and slot aspect ratios.
    pub aspect_tolerance: f64,
    /// Match radius as a fraction of the larger slot extent.
    pub match_radius_frac: f64,
    /// Minimum fraction of slots that must be matched.
    pub min_matched_frac: f64,
}

impl Default for LocateConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.0,
            block_radius_frac: 0.02,
            threshold_offset: 12.0,
            close_radius: 1,
            min_area_ratio: 0.3,
            max_area_ratio: 2.0,
            aspect_tolerance: 2.0,
            match_radius_frac: 0.6,
            min_matched_frac: 0.6,
        }
    }
}
