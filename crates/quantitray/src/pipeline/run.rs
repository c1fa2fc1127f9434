//! Single-image orchestrator: segment -> rectify -> locate -> classify -> MPN.

use std::time::{Duration, Instant};

use super::{MpnOutcome, ReferenceData, TrayAnalysis};
use crate::classify::{classify_wells, WellTally};
use crate::config::AnalyzeConfig;
use crate::error::AnalysisError;
use crate::locate::locate_wells;
use crate::mpn::estimate;
use crate::segment::{extract_tray, segment_mask, RawImage, RectifiedTray};

struct Deadline {
    start: Instant,
    budget_ms: Option<u64>,
}

impl Deadline {
    fn new(budget_ms: Option<u64>) -> Self {
        Self {
            start: Instant::now(),
            budget_ms,
        }
    }

    fn check(&self, stage: &'static str) -> Result<(), AnalysisError> {
        let Some(budget_ms) = self.budget_ms else {
            return Ok(());
        };
        if self.start.elapsed() > Duration::from_millis(budget_ms) {
            return Err(AnalysisError::Timeout { budget_ms, stage });
        }
        Ok(())
    }
}

/// Analyze one photo, also returning the rectified tray.
pub fn analyze_image_with_tray(
    image: &RawImage,
    reference: &ReferenceData,
    config: &AnalyzeConfig,
) -> Result<(TrayAnalysis, RectifiedTray), AnalysisError> {
    let deadline = Deadline::new(config.time_budget_ms);
    let layout = reference.layout();

    let mask = segment_mask(image, &config.segment)?;
    deadline.check("segment")?;

    let tray = extract_tray(image, &mask, layout, &config.segment)?;
    deadline.check("rectify")?;

    let mut wells = locate_wells(&tray.image, layout, &config.locate)?;
    deadline.check("locate")?;

    classify_wells(&tray.image, &mut wells, &config.classify);
    let tally = WellTally::from_wells(&wells);
    deadline.check("classify")?;

    let mpn = match estimate(&tally, reference.table()) {
        Ok(entry) => MpnOutcome::Estimate(entry.clone()),
        Err(e) => {
            tracing::warn!("{}", e);
            MpnOutcome::Undeterminable {
                reason: e.to_string(),
            }
        }
    };
    tracing::info!(
        small_positive = tally.small_positive,
        large_positive = tally.large_positive,
        mpn = %mpn.display_value(),
        "tray analyzed"
    );

    let analysis = TrayAnalysis {
        image_size: [image.width(), image.height()],
        tray: tray.region.clone(),
        wells,
        tally,
        mpn,
    };
    Ok((analysis, tray))
}

/// Analyze one photo of a tray.
pub fn analyze_image(
    image: &RawImage,
    reference: &ReferenceData,
    config: &AnalyzeConfig,
) -> Result<TrayAnalysis, AnalysisError> {
    analyze_image_with_tray(image, reference, config).map(|(analysis, _)| analysis)
}
