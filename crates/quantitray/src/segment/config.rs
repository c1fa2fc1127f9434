/// Tray segmentation and rectification controls.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Minimum accepted length of the shorter image side (pixels).
    pub min_side_px: u32,
    /// Longer side of the working image used for the energy minimization.
    pub working_max_side_px: u32,
    /// Seed rectangle inset from each image side (fraction of that side).
    pub seed_inset_frac: f32,
    /// Band just inside the seed rectangle marked probable background
    /// (fraction of the corresponding image side).
    pub probable_bg_margin_frac: f32,
    /// Centered portion of the probable-foreground seed fixed as definite
    /// foreground; 0 leaves the whole seed revisable.
    pub definite_core_frac: f32,
    /// Gaussian components per color model.
    pub gmm_components: usize,
    /// Maximum number of refinement iterations.
    pub max_iterations: usize,
    /// Stop once fewer than this fraction of working pixels change label.
    pub convergence_frac: f32,
    /// Pairwise smoothness weight (gamma).
    pub smoothness: f64,
    /// Minimum tray component area (fraction of the image area).
    pub min_tray_area_frac: f64,
    /// Map the tray's corner quadrilateral instead of its bounding box.
    pub perspective_correction: bool,
    /// Rectified tray width in pixels; height follows the layout aspect ratio.
    pub rectified_width_px: u32,
    /// Seed for color-model initialization.
    pub seed: u64,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            min_side_px: 200,
            working_max_side_px: 160,
            seed_inset_frac: 0.04,
            probable_bg_margin_frac: 0.02,
            definite_core_frac: 0.0,
            gmm_components: 5,
            max_iterations: 5,
            convergence_frac: 0.001,
            smoothness: 50.0,
            min_tray_area_frac: 0.05,
            perspective_correction: true,
            rectified_width_px: 480,
            seed: 0x5eed,
        }
    }
}
