//! Intensity bands for grouping easy activities
//!
//! Bands are fixed, ordered and non-overlapping. Anything outside them is
//! kept out of baselines so hard efforts never shift what "easy" looks like.

use serde::{Deserialize, Serialize};
use std::fmt;

/// IF band an activity is grouped under
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum IntensityBand {
    /// No intensity factor known
    #[serde(rename = "")]
    Unknown,
    /// IF in `[0.50, 0.60)`
    #[serde(rename = "IF_50_60")]
    If50To60,
    /// IF in `[0.60, 0.65)`
    #[serde(rename = "IF_60_65")]
    If60To65,
    /// Any other IF, including non-finite values
    #[serde(rename = "ignored_for_strain")]
    Ignored,
}

impl IntensityBand {
    /// Bands that can hold a baseline, in order
    pub const STRAIN_BANDS: [IntensityBand; 2] = [IntensityBand::If50To60, IntensityBand::If60To65];

    pub fn classify(intensity_factor: Option<f64>) -> Self {
        match intensity_factor {
            None => IntensityBand::Unknown,
            Some(f) if (0.50..0.60).contains(&f) => IntensityBand::If50To60,
            Some(f) if (0.60..0.65).contains(&f) => IntensityBand::If60To65,
            Some(_) => IntensityBand::Ignored,
        }
    }

    /// Whether activities in this band contribute to baselines
    pub fn is_strain_band(&self) -> bool {
        matches!(self, IntensityBand::If50To60 | IntensityBand::If60To65)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IntensityBand::Unknown => "",
            IntensityBand::If50To60 => "IF_50_60",
            IntensityBand::If60To65 => "IF_60_65",
            IntensityBand::Ignored => "ignored_for_strain",
        }
    }
}

impl fmt::Display for IntensityBand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
