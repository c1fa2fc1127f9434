use crate::classify::WellTally;
use crate::locate::DetectedWell;
use crate::mpn::MpnTableEntry;
use crate::segment::TrayRegion;

/// Concentration estimate, or the reason none could be given.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MpnOutcome {
    Estimate(MpnTableEntry),
    Undeterminable { reason: String },
}

impl MpnOutcome {
    pub fn entry(&self) -> Option<&MpnTableEntry> {
        match self {
            Self::Estimate(e) => Some(e),
            Self::Undeterminable { .. } => None,
        }
    }

    /// Vendor-style value ("<1", "1986.3", ">2419.6") or "undetermined".
    pub fn display_value(&self) -> String {
        match self {
            Self::Estimate(e) => e.display_value(),
            Self::Undeterminable { .. } => "undetermined".to_string(),
        }
    }
}

/// Result of analyzing one tray photograph.
///
/// Carries no timing data: analyzing the same image with the same reference
/// data and config yields an identical value.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TrayAnalysis {
    /// Raw image `[width, height]`.
    pub image_size: [u32; 2],
    pub tray: TrayRegion,
    /// One entry per layout slot, in slot order.
    pub wells: Vec<DetectedWell>,
    pub tally: WellTally,
    pub mpn: MpnOutcome,
}

impl TrayAnalysis {
    pub fn n_matched(&self) -> usize {
        self.wells.iter().filter(|w| w.matched).count()
    }
}
