//! Parallel multi-image analysis.

use std::collections::{BTreeMap, BTreeSet};

use rayon::prelude::*;

use super::{analyze_image_with_tray, ReferenceData, TrayAnalysis};
use crate::config::AnalyzeConfig;
use crate::error::FailureKind;
use crate::segment::{RawImage, RectifiedTray};

/// Supplier of images for a batch run.
pub trait ImageSource: Sync {
    /// Identifiers of all images, e.g. file names. Ids should be unique;
    /// repeats are analyzed once and listed in
    /// [`BatchSummary::duplicate_ids`].
    fn ids(&self) -> Vec<String>;
    /// Load one image. Errors are recorded as [`FailureKind::ImageLoad`].
    fn load(&self, id: &str) -> Result<RawImage, String>;
}

/// Receives every successfully rectified tray, from worker threads.
pub trait TrayObserver: Sync {
    fn on_tray(&self, id: &str, tray: &RectifiedTray, analysis: &TrayAnalysis);
}

impl TrayObserver for () {
    fn on_tray(&self, _id: &str, _tray: &RectifiedTray, _analysis: &TrayAnalysis) {}
}

/// Images held in memory, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    pub images: BTreeMap<String, RawImage>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, id: impl Into<String>, image: RawImage) {
        self.images.insert(id.into(), image);
    }
}

impl ImageSource for MemorySource {
    fn ids(&self) -> Vec<String> {
        self.images.keys().cloned().collect()
    }

    fn load(&self, id: &str) -> Result<RawImage, String> {
        self.images
            .get(id)
            .cloned()
            .ok_or_else(|| format!("no image with id '{}'", id))
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ImageOutcome {
    Analyzed(TrayAnalysis),
    Failed { kind: FailureKind, message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BatchSummary {
    pub n_images: usize,
    pub n_analyzed: usize,
    /// Analyzed images with an MPN estimate.
    pub n_estimated: usize,
    /// Analyzed images whose tally has no table row.
    pub n_undeterminable: usize,
    pub n_failed: usize,
    pub failures_by_kind: BTreeMap<FailureKind, usize>,
    /// Ids the source returned more than once, sorted.
    pub duplicate_ids: Vec<String>,
}

impl BatchSummary {
    fn from_results(results: &BTreeMap<String, ImageOutcome>) -> Self {
        let mut s = Self {
            n_images: results.len(),
            ..Self::default()
        };
        for outcome in results.values() {
            match outcome {
                ImageOutcome::Analyzed(a) => {
                    s.n_analyzed += 1;
                    if a.mpn.entry().is_some() {
                        s.n_estimated += 1;
                    } else {
                        s.n_undeterminable += 1;
                    }
                }
                ImageOutcome::Failed { kind, .. } => {
                    s.n_failed += 1;
                    *s.failures_by_kind.entry(*kind).or_insert(0) += 1;
                }
            }
        }
        s
    }
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BatchReport {
    /// Keyed by image id; order does not depend on completion order.
    pub results: BTreeMap<String, ImageOutcome>,
    pub summary: BatchSummary,
}

fn process_one(
    id: &str,
    source: &dyn ImageSource,
    reference: &ReferenceData,
    config: &AnalyzeConfig,
    observer: &dyn TrayObserver,
) -> ImageOutcome {
    let image = match source.load(id) {
        Ok(img) => img,
        Err(message) => {
            tracing::warn!(id, "image load failed: {}", message);
            return ImageOutcome::Failed {
                kind: FailureKind::ImageLoad,
                message,
            };
        }
    };
    match analyze_image_with_tray(&image, reference, config) {
        Ok((analysis, tray)) => {
            observer.on_tray(id, &tray, &analysis);
            ImageOutcome::Analyzed(analysis)
        }
        Err(e) => {
            tracing::warn!(id, kind = %e.kind(), "analysis failed: {}", e);
            ImageOutcome::Failed {
                kind: e.kind(),
                message: e.to_string(),
            }
        }
    }
}

/// Split `ids` into first occurrences (in input order) and the sorted set of
/// repeated ids.
fn unique_ids(ids: Vec<String>) -> (Vec<String>, Vec<String>) {
    let mut seen = BTreeSet::new();
    let mut duplicates = BTreeSet::new();
    let mut unique = Vec::with_capacity(ids.len());
    for id in ids {
        if seen.contains(&id) {
            duplicates.insert(id);
        } else {
            seen.insert(id.clone());
            unique.push(id);
        }
    }
    (unique, duplicates.into_iter().collect())
}

/// Analyze every image of `source` on the rayon pool, one image per task.
///
/// Per-image failures are recorded in the report and never abort the batch.
pub fn analyze_batch(
    source: &dyn ImageSource,
    reference: &ReferenceData,
    config: &AnalyzeConfig,
    observer: &dyn TrayObserver,
) -> BatchReport {
    let (ids, duplicate_ids) = unique_ids(source.ids());
    for id in &duplicate_ids {
        tracing::warn!(id = id.as_str(), "duplicate image id; analyzed once");
    }
    tracing::info!("analyzing {} images", ids.len());
    let results: BTreeMap<String, ImageOutcome> = ids
        .par_iter()
        .map(|id| (id.clone(), process_one(id, source, reference, config, observer)))
        .collect::<Vec<_>>()
        .into_iter()
        .collect();
    let summary = BatchSummary {
        duplicate_ids,
        ..BatchSummary::from_results(&results)
    };
    tracing::info!(
        analyzed = summary.n_analyzed,
        failed = summary.n_failed,
        undeterminable = summary.n_undeterminable,
        "batch complete"
    );
    BatchReport { results, summary }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{default_photo, positives_for};
    use std::sync::Mutex;

    struct FailingSource;

    impl ImageSource for FailingSource {
        fn ids(&self) -> Vec<String> {
            vec!["broken.jpg".to_string()]
        }

        fn load(&self, _id: &str) -> Result<RawImage, String> {
            Err("truncated file".to_string())
        }
    }

    /// Returns `ids` verbatim, failing every load.
    struct RepeatingSource {
        ids: Vec<&'static str>,
    }

    impl ImageSource for RepeatingSource {
        fn ids(&self) -> Vec<String> {
            self.ids.iter().map(|s| s.to_string()).collect()
        }

        fn load(&self, id: &str) -> Result<RawImage, String> {
            Err(format!("missing {}", id))
        }
    }

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<String>>,
    }

    impl TrayObserver for Recorder {
        fn on_tray(&self, id: &str, tray: &RectifiedTray, _analysis: &TrayAnalysis) {
            assert_eq!(tray.width(), 480);
            self.seen.lock().unwrap().push(id.to_string());
        }
    }

    fn sample_source(reference: &ReferenceData) -> MemorySource {
        let layout = reference.layout();
        let mut src = MemorySource::new();
        src.insert("a.png", default_photo(layout, &positives_for(layout, 3, 2)));
        src.insert("b.png", default_photo(layout, &[]));
        src.insert("tiny.png", RawImage::new(64, 64));
        src
    }

    #[test]
    fn batch_records_every_image() {
        let reference = ReferenceData::quanti_tray_2000();
        let src = sample_source(&reference);
        let recorder = Recorder::default();
        let report = analyze_batch(&src, &reference, &AnalyzeConfig::default(), &recorder);

        assert_eq!(report.summary.n_images, 3);
        assert_eq!(report.summary.n_analyzed, 2);
        assert_eq!(report.summary.n_estimated, 2);
        assert_eq!(report.summary.n_failed, 1);
        assert_eq!(
            report.summary.failures_by_kind.get(&FailureKind::InsufficientResolution),
            Some(&1)
        );
        let keys: Vec<&str> = report.results.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, ["a.png", "b.png", "tiny.png"]);

        let mut seen = recorder.seen.into_inner().unwrap();
        seen.sort();
        assert_eq!(seen, ["a.png", "b.png"]);
    }

    #[test]
    fn batch_is_deterministic() {
        let reference = ReferenceData::quanti_tray_2000();
        let src = sample_source(&reference);
        let cfg = AnalyzeConfig::default();
        let a = analyze_batch(&src, &reference, &cfg, &());
        let b = analyze_batch(&src, &reference, &cfg, &());
        assert_eq!(a, b);
    }

    #[test]
    fn load_failures_are_image_load() {
        let reference = ReferenceData::quanti_tray_2000();
        let report = analyze_batch(&FailingSource, &reference, &AnalyzeConfig::default(), &());
        match &report.results["broken.jpg"] {
            ImageOutcome::Failed { kind, message } => {
                assert_eq!(*kind, FailureKind::ImageLoad);
                assert_eq!(message, "truncated file");
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
    }

    #[test]
    fn repeated_ids_are_reported() {
        let reference = ReferenceData::quanti_tray_2000();
        let src = RepeatingSource {
            ids: vec!["b.jpg", "a.jpg", "b.jpg", "c.jpg", "a.jpg", "b.jpg"],
        };
        let report = analyze_batch(&src, &reference, &AnalyzeConfig::default(), &());
        assert_eq!(report.results.len(), 3);
        assert_eq!(report.summary.n_images, 3);
        assert_eq!(report.summary.n_failed, 3);
        assert_eq!(report.summary.duplicate_ids, ["a.jpg", "b.jpg"]);
    }

    #[test]
    fn unique_ids_keep_first_occurrence_order() {
        let ids = ["z", "y", "z", "x"].map(String::from).to_vec();
        let (unique, dups) = unique_ids(ids);
        assert_eq!(unique, ["z", "y", "x"]);
        assert_eq!(dups, ["z"]);
    }
}
