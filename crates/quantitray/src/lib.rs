//! quantitray: pure-Rust well counter for Quanti-Tray photographs.
//!
//! Turns a photo of a multi-well assay tray into positive-well counts and a
//! most-probable-number (MPN) concentration estimate. The pipeline stages are:
//!
//! 1. **Segment** – GrabCut-style tray/background separation (color mixtures +
//!    s-t min-cut), largest component, corner quad.
//! 2. **Rectify** – projective warp of the tray onto the layout canvas.
//! 3. **Locate** – adaptive-threshold boundary map, hole contours, matching
//!    to the reference layout slots.
//! 4. **Classify** – per-well median CIE b* against a fixed or tray-adaptive
//!    threshold.
//! 5. **MPN** – exact lookup of `(small, large)` positives in the combination
//!    table.
//!
//! # Public API
//! - [`Analyzer`] as the primary entry point
//! - [`ReferenceData`] ([`WellLayout`] + [`MpnTable`]) and [`AnalyzeConfig`]
//! - stage functions and result structures for finer control

mod api;
mod classify;
mod color;
mod config;
mod error;
mod homography;
mod layout;
mod locate;
mod mpn;
pub mod overlay;
mod pipeline;
mod segment;

#[cfg(test)]
pub(crate) mod test_utils;

pub use api::Analyzer;
pub use classify::{
    classify_well, classify_wells, sample_well_color, well_color, ClassifyConfig, ClassifyReport,
    ThresholdMode, WellColor, WellTally,
};
pub use color::{linear_rgb_to_lab, srgb8_to_lab, Lab};
pub use config::AnalyzeConfig;
pub use error::{AnalysisError, FailureKind, ReferenceError};
pub use homography::{project, rect_to_quad, QuadError};
pub use layout::{GridSpec, WellDescriptor, WellLayout, WellRole, WellSlot};
pub use locate::{contour, locate_wells, DetectedWell, LocateConfig, WellState};
pub use mpn::{estimate, MpnQualifier, MpnTable, MpnTableEntry, VolumeModel, MPN_SCHEMA_V1};
pub use pipeline::{
    analyze_batch, analyze_image, analyze_image_with_tray, BatchReport, BatchSummary,
    ImageOutcome, ImageSource, MemorySource, MpnOutcome, ReferenceData, TrayAnalysis,
    TrayObserver,
};
pub use segment::{
    extract_tray, segment, segment_mask, PixelRect, RawImage, RectifiedTray, SegmentConfig,
    SegmentationMask, TrayRegion,
};
