//! Bore geometry, expansion ratio, relative capacity and sectional density.

use serde::Serialize;
use std::f64::consts::PI;

use crate::config::{EngineConfig, SectionalDensityFormula};
use crate::constants::{BORE_CAPACITY_GR_PER_IN3, GRAINS_PER_POUND, MIN_DIVISION_THRESHOLD};
use crate::error::{ensure_finite, ensure_positive, PowleyError, Result};
use crate::records::{required, CartridgeRecord};

/// Derived quantities for one cartridge record
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DerivedFeatures {
    pub cartridge: String,
    pub bore_area: f64,              // in²
    pub bore_capacity_per_inch: f64, // gr H2O / in
    pub expansion_ratio: f64,
    pub relative_capacity: f64,
    pub sectional_density: f64,
    /// muzzle_vel / est_pmax, when both are known
    pub efficiency_proxy: Option<f64>,
    /// propellant_mass / bullet_mass, when both are known
    pub mass_ratio: Option<f64>,
    /// Effective barrel length is zero or negative
    pub short_barrel: bool,
}

/// Feature calculator bound to one bore constant and one SD formula
///
/// Every derivation in an engine instance goes through the same
/// `FeatureDeriver`, so a single SD definition is in force.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureDeriver {
    bore_capacity_constant: f64,
    sd_formula: SectionalDensityFormula,
}

impl Default for FeatureDeriver {
    fn default() -> Self {
        FeatureDeriver {
            bore_capacity_constant: BORE_CAPACITY_GR_PER_IN3,
            sd_formula: SectionalDensityFormula::Dimensional,
        }
    }
}

impl FeatureDeriver {
    pub fn new(bore_capacity_constant: f64, sd_formula: SectionalDensityFormula) -> Result<Self> {
        ensure_positive("bore_capacity_constant", bore_capacity_constant)?;
        Ok(FeatureDeriver { bore_capacity_constant, sd_formula })
    }

    pub fn from_config(config: &EngineConfig) -> Result<Self> {
        Self::new(config.bore_capacity_constant, config.sectional_density)
    }

    pub fn bore_capacity_constant(&self) -> f64 {
        self.bore_capacity_constant
    }

    pub fn sd_formula(&self) -> SectionalDensityFormula {
        self.sd_formula
    }

    /// Cross-sectional bore area π(d/2)² in square inches
    pub fn bore_area(&self, groove_dia: f64) -> Result<f64> {
        let d = ensure_positive("groove_dia", groove_dia)?;
        Ok(PI * (d / 2.0).powi(2))
    }

    /// Water capacity of one inch of bore (gr H₂O / in)
    pub fn bore_capacity_per_inch(&self, groove_dia: f64) -> Result<f64> {
        Ok(self.bore_area(groove_dia)? * self.bore_capacity_constant)
    }

    /// ER = 1 + bore volume ahead of the bullet / effective case volume
    ///
    /// A non-positive case volume is `Undefined`, not a crash. A negative
    /// barrel length is not rejected here; it yields ER < 1 and the caller
    /// flags the record.
    pub fn expansion_ratio(&self, groove_dia: f64, eff_case_vol: f64, eff_barrel_length: f64) -> Result<f64> {
        let eff_case_vol = ensure_finite("eff_case_vol", eff_case_vol)?;
        let eff_barrel_length = ensure_finite("eff_barrel_length", eff_barrel_length)?;
        if eff_case_vol <= 0.0 {
            return Err(PowleyError::Undefined(format!(
                "expansion ratio with case volume {}",
                eff_case_vol
            )));
        }
        let bore_volume = self.bore_area(groove_dia)? * eff_barrel_length * self.bore_capacity_constant;
        Ok(1.0 + bore_volume / eff_case_vol)
    }

    /// RC = effective case volume / bore capacity per inch
    pub fn relative_capacity(&self, groove_dia: f64, eff_case_vol: f64) -> Result<f64> {
        let eff_case_vol = ensure_finite("eff_case_vol", eff_case_vol)?;
        if eff_case_vol <= 0.0 {
            return Err(PowleyError::Undefined(format!(
                "relative capacity with case volume {}",
                eff_case_vol
            )));
        }
        Ok(eff_case_vol / self.bore_capacity_per_inch(groove_dia)?)
    }

    /// Sectional density under the configured formula
    pub fn sectional_density(&self, bullet_mass: f64, groove_dia: f64) -> Result<f64> {
        let mass = ensure_positive("bullet_mass", bullet_mass)?;
        match self.sd_formula {
            SectionalDensityFormula::MassProxy => Ok(mass),
            SectionalDensityFormula::Dimensional => {
                let d = ensure_positive("groove_dia", groove_dia)?;
                Ok((mass / GRAINS_PER_POUND) / (d * d))
            }
        }
    }

    /// All derived quantities for a record; the record itself is not touched
    pub fn derive(&self, record: &CartridgeRecord) -> Result<DerivedFeatures> {
        let groove_dia = required("groove_dia", record.groove_dia)?;
        let eff_case_vol = required("eff_case_vol", record.eff_case_vol)?;
        let eff_barrel_length = required("eff_barrel_length", record.eff_barrel_length)?;
        let bullet_mass = required("bullet_mass", record.bullet_mass)?;

        let short_barrel = eff_barrel_length <= 0.0;
        if short_barrel {
            tracing::warn!(
                cartridge = %record.cartridge,
                eff_barrel_length,
                "effective barrel length is not positive; barrel shorter than cartridge offset"
            );
        }

        let features = DerivedFeatures {
            cartridge: record.cartridge.clone(),
            bore_area: self.bore_area(groove_dia)?,
            bore_capacity_per_inch: self.bore_capacity_per_inch(groove_dia)?,
            expansion_ratio: self.expansion_ratio(groove_dia, eff_case_vol, eff_barrel_length)?,
            relative_capacity: self.relative_capacity(groove_dia, eff_case_vol)?,
            sectional_density: self.sectional_density(bullet_mass, groove_dia)?,
            efficiency_proxy: efficiency_proxy(record).ok(),
            mass_ratio: mass_ratio(record).ok(),
            short_barrel,
        };
        tracing::debug!(
            cartridge = %features.cartridge,
            er = features.expansion_ratio,
            rc = features.relative_capacity,
            sd = features.sectional_density,
            "derived features"
        );
        Ok(features)
    }

    /// RC and SD for a reference record, as used by nearest-cartridge lookup
    pub fn rc_sd(&self, record: &CartridgeRecord) -> Result<(f64, f64)> {
        let groove_dia = required("groove_dia", record.groove_dia)?;
        let eff_case_vol = required("eff_case_vol", record.eff_case_vol)?;
        let bullet_mass = required("bullet_mass", record.bullet_mass)?;
        Ok((
            self.relative_capacity(groove_dia, eff_case_vol)?,
            self.sectional_density(bullet_mass, groove_dia)?,
        ))
    }
}

fn safe_ratio(what: &str, numerator: f64, denominator: f64) -> Result<f64> {
    if denominator.abs() < MIN_DIVISION_THRESHOLD {
        return Err(PowleyError::Undefined(format!("{} with zero denominator", what)));
    }
    Ok(numerator / denominator)
}

/// Velocity per unit of estimated peak pressure
pub fn efficiency_proxy(record: &CartridgeRecord) -> Result<f64> {
    let vel = required("muzzle_vel", record.muzzle_vel)?;
    let pmax = required("est_pmax", record.est_pmax)?;
    safe_ratio("efficiency proxy", vel, pmax)
}

/// Charge mass over bullet mass
pub fn mass_ratio(record: &CartridgeRecord) -> Result<f64> {
    let charge = required("propellant_mass", record.propellant_mass)?;
    let bullet = required("bullet_mass", record.bullet_mass)?;
    safe_ratio("mass ratio", charge, bullet)
}
