//! High-level analysis API.
//!
//! [`Analyzer`] is the primary entry point. It owns the reference data and
//! the analysis configuration and provides the single-image and batch entry
//! points.

use std::path::Path;

use crate::config::AnalyzeConfig;
use crate::error::AnalysisError;
use crate::layout::WellLayout;
use crate::mpn::MpnTable;
use crate::pipeline::{self, BatchReport, ImageSource, ReferenceData, TrayAnalysis, TrayObserver};
use crate::segment::{RawImage, RectifiedTray};

/// Primary analysis interface.
///
/// Create once, analyze many images.
///
/// # Examples
///
/// ```no_run
/// use quantitray::Analyzer;
///
/// let analyzer = Analyzer::quanti_tray_2000();
/// let photo = image::open("tray.jpg").unwrap().to_rgb8();
/// let analysis = analyzer.analyze(&photo).unwrap();
/// println!(
///     "{} large / {} small positive, MPN {}",
///     analysis.tally.large_positive,
///     analysis.tally.small_positive,
///     analysis.mpn.display_value()
/// );
/// ```
#[derive(Debug, Clone)]
pub struct Analyzer {
    reference: ReferenceData,
    config: AnalyzeConfig,
}

impl Analyzer {
    /// Create an analyzer with default configuration.
    pub fn new(reference: ReferenceData) -> Self {
        Self::with_config(reference, AnalyzeConfig::default())
    }

    /// Built-in Quanti-Tray/2000 layout and MPN table.
    pub fn quanti_tray_2000() -> Self {
        Self::new(ReferenceData::quanti_tray_2000())
    }

    /// Load a layout JSON and pair it with the generated Quanti-Tray/2000 table.
    pub fn from_layout_json_file(path: &Path) -> Result<Self, Box<dyn std::error::Error>> {
        let layout = WellLayout::from_json_file(path)?;
        Ok(Self::new(ReferenceData::new(layout, MpnTable::quanti_tray_2000())?))
    }

    /// Create with full config control.
    pub fn with_config(reference: ReferenceData, config: AnalyzeConfig) -> Self {
        Self { reference, config }
    }

    pub fn reference(&self) -> &ReferenceData {
        &self.reference
    }

    /// Access the current configuration.
    pub fn config(&self) -> &AnalyzeConfig {
        &self.config
    }

    /// Mutable access to configuration for post-construction tuning.
    pub fn config_mut(&mut self) -> &mut AnalyzeConfig {
        &mut self.config
    }

    /// Analyze one photograph.
    pub fn analyze(&self, image: &RawImage) -> Result<TrayAnalysis, AnalysisError> {
        pipeline::analyze_image(image, &self.reference, &self.config)
    }

    /// Analyze one photograph and keep the rectified tray (for overlays).
    pub fn analyze_with_tray(
        &self,
        image: &RawImage,
    ) -> Result<(TrayAnalysis, RectifiedTray), AnalysisError> {
        pipeline::analyze_image_with_tray(image, &self.reference, &self.config)
    }

    /// Analyze every image of `source` in parallel.
    pub fn analyze_batch(
        &self,
        source: &dyn ImageSource,
        observer: &dyn TrayObserver,
    ) -> BatchReport {
        pipeline::analyze_batch(source, &self.reference, &self.config, observer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::ThresholdMode;

    #[test]
    fn config_mut_changes_analysis_config() {
        let mut analyzer = Analyzer::quanti_tray_2000();
        analyzer.config_mut().classify.mode = ThresholdMode::Fixed;
        analyzer.config_mut().time_budget_ms = Some(10_000);
        assert_eq!(analyzer.config().classify.mode, ThresholdMode::Fixed);
        assert_eq!(analyzer.config().time_budget_ms, Some(10_000));
        assert_eq!(analyzer.reference().layout().n_slots(), 97);
    }

    #[test]
    fn analyzer_rejects_blank_photo() {
        let analyzer = Analyzer::quanti_tray_2000();
        let img = RawImage::from_pixel(300, 300, image::Rgb([120, 120, 120]));
        assert!(analyzer.analyze(&img).is_err());
    }
}
