use serde::Serialize;

use crate::constants::{BAND_FAST_ABOVE, BAND_SLOW_BELOW};

/// Burn-rate band over effective vivacity
///
/// The three bands cover the whole real line without overlap; both
/// boundary values belong to `Medium`. NaN has no order and falls into
/// `Medium` as well, so every input maps to exactly one band.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum BurnBand {
    Slow,
    Medium,
    Fast,
}

impl BurnBand {
    /// Slow < 0.55 ≤ Medium ≤ 0.70 < Fast
    pub fn classify(ba_eff: f64) -> Self {
        if ba_eff < BAND_SLOW_BELOW {
            BurnBand::Slow
        } else if ba_eff > BAND_FAST_ABOVE {
            BurnBand::Fast
        } else {
            BurnBand::Medium
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            BurnBand::Slow => "Slow",
            BurnBand::Medium => "Medium",
            BurnBand::Fast => "Fast",
        }
    }

    /// Human-readable band rule
    pub fn description(&self) -> &'static str {
        match self {
            BurnBand::Slow => "Slow: Ba_eff < 0.55",
            BurnBand::Medium => "Medium: 0.55 ≤ Ba_eff ≤ 0.70",
            BurnBand::Fast => "Fast: Ba_eff > 0.70",
        }
    }
}

impl std::fmt::Display for BurnBand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}
