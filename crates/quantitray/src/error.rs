//! Error taxonomy.
//!
//! [`AnalysisError`] covers per-image pipeline failures. Every variant is
//! non-fatal at batch level: it aborts the current image only and is recorded
//! in the batch report under its [`FailureKind`].
//!
//! [`ReferenceError`] covers loading of static reference data (well layout,
//! MPN table, analysis config).

use std::path::PathBuf;

/// Per-image pipeline failure.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnalysisError {
    #[error("image {width}x{height} is below the minimum side of {min_side_px}px")]
    InsufficientResolution {
        width: u32,
        height: u32,
        min_side_px: u32,
    },

    #[error(
        "tray not found: largest foreground component covers {area_fraction:.3} of the image \
         (minimum {min_fraction:.3})"
    )]
    SegmentationFailed {
        area_fraction: f64,
        min_fraction: f64,
    },

    #[error("only {matched}/{total} layout slots matched a well contour (need {required})")]
    LayoutMismatch {
        matched: usize,
        total: usize,
        required: usize,
    },

    #[error("no MPN table entry for {small} small / {large} large positive wells")]
    OutOfTableRange { small: u32, large: u32 },

    #[error("time budget of {budget_ms}ms exhausted after stage '{stage}'")]
    Timeout { budget_ms: u64, stage: &'static str },
}

impl AnalysisError {
    /// Coarse classification used for batch statistics.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::InsufficientResolution { .. } => FailureKind::InsufficientResolution,
            Self::SegmentationFailed { .. } => FailureKind::SegmentationFailed,
            Self::LayoutMismatch { .. } => FailureKind::LayoutMismatch,
            Self::OutOfTableRange { .. } => FailureKind::OutOfTableRange,
            Self::Timeout { .. } => FailureKind::Timeout,
        }
    }
}

/// Failure category recorded in batch reports.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    InsufficientResolution,
    SegmentationFailed,
    LayoutMismatch,
    OutOfTableRange,
    Timeout,
    /// The image could not be read or decoded by the caller-supplied source.
    ImageLoad,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::InsufficientResolution => "insufficient_resolution",
            Self::SegmentationFailed => "segmentation_failed",
            Self::LayoutMismatch => "layout_mismatch",
            Self::OutOfTableRange => "out_of_table_range",
            Self::Timeout => "timeout",
            Self::ImageLoad => "image_load",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure while loading or validating reference data.
#[derive(Debug, thiserror::Error)]
pub enum ReferenceError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV line {line}: {message}")]
    Csv { line: usize, message: String },

    #[error("unsupported schema '{found}' (expected '{expected}')")]
    Schema {
        found: String,
        expected: &'static str,
    },

    #[error("{0}")]
    Invalid(String),
}

impl ReferenceError {
    pub(crate) fn invalid(msg: impl Into<String>) -> Self {
        Self::Invalid(msg.into())
    }
}

pub(crate) fn read_to_string(path: &std::path::Path) -> Result<String, ReferenceError> {
    std::fs::read_to_string(path).map_err(|source| ReferenceError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_matches_variant() {
        let err = AnalysisError::OutOfTableRange { small: 49, large: 50 };
        assert_eq!(err.kind(), FailureKind::OutOfTableRange);
        assert!(err.to_string().contains("49 small / 50 large"));
    }

    #[test]
    fn failure_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FailureKind::LayoutMismatch).unwrap();
        assert_eq!(json, "\"layout_mismatch\"");
        assert_eq!(FailureKind::ImageLoad.to_string(), "image_load");
    }
}
