//! Most-probable-number lookup from positive well counts.

mod model;
mod table;

pub use model::VolumeModel;
pub use table::{MpnQualifier, MpnTable, MpnTableEntry, MPN_SCHEMA_V1};

use crate::classify::WellTally;
use crate::error::AnalysisError;

/// Exact table lookup for a tally.
pub fn estimate<'a>(
    tally: &WellTally,
    table: &'a MpnTable,
) -> Result<&'a MpnTableEntry, AnalysisError> {
    table
        .entry(tally.small_positive, tally.large_positive)
        .ok_or(AnalysisError::OutOfTableRange {
            small: tally.small_positive,
            large: tally.large_positive,
        })
}
