//! High-level analysis pipeline.
//!
//! Wires the stages together: segment -> rectify -> locate -> classify ->
//! MPN lookup. Algorithmic primitives live in `crate::segment`,
//! `crate::locate`, `crate::classify` and `crate::mpn`; this layer owns stage
//! order, the time budget and batch fan-out.
//!
//! Entry points:
//! - `analyze_image`: one photo to a [`TrayAnalysis`]
//! - `analyze_image_with_tray`: same, also returning the rectified tray
//! - `analyze_batch`: many photos on the rayon pool

mod batch;
mod result;
mod run;

pub use batch::{
    analyze_batch, BatchReport, BatchSummary, ImageOutcome, ImageSource, MemorySource,
    TrayObserver,
};
pub use result::{MpnOutcome, TrayAnalysis};
pub use run::{analyze_image, analyze_image_with_tray};

use crate::error::ReferenceError;
use crate::layout::WellLayout;
use crate::mpn::MpnTable;

/// Layout and MPN table, loaded once and shared read-only by every run.
#[derive(Debug, Clone)]
pub struct ReferenceData {
    layout: WellLayout,
    table: MpnTable,
}

impl ReferenceData {
    /// Pair a layout with a table; their well counts must agree.
    pub fn new(layout: WellLayout, table: MpnTable) -> Result<Self, ReferenceError> {
        let (large, small) = (layout.n_large() as u32, layout.n_small() as u32);
        if table.large_wells() != large || table.small_wells() != small {
            return Err(ReferenceError::invalid(format!(
                "MPN table '{}' is for {} large / {} small wells but layout '{}' has {} / {}",
                table.name(),
                table.large_wells(),
                table.small_wells(),
                layout.name,
                large,
                small
            )));
        }
        Ok(Self { layout, table })
    }

    /// Built-in Quanti-Tray/2000 layout and MPN table.
    pub fn quanti_tray_2000() -> Self {
        Self {
            layout: WellLayout::default(),
            table: MpnTable::quanti_tray_2000(),
        }
    }

    pub fn layout(&self) -> &WellLayout {
        &self.layout
    }

    pub fn table(&self) -> &MpnTable {
        &self.table
    }
}
