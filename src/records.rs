//! Canonical input records and the derived prediction record.
//!
//! Records are produced by ingestion and never mutated by the engine;
//! every derived quantity lands in a separate view.

use serde::{Deserialize, Serialize};

use crate::error::{PowleyError, Result};

/// Fields the engine consumes directly and re-checks on every record
pub const CRITICAL_FIELDS: [&str; 4] = ["cartridge", "bullet_mass", "propellant_mass", "muzzle_vel"];

/// One measured load, in canonical units (inches, grains, grains of water)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CartridgeRecord {
    #[serde(default)]
    pub cartridge: String,
    pub groove_dia: Option<f64>,          // in
    pub case_vol: Option<f64>,            // gr H2O
    pub case_length: Option<f64>,         // in
    pub cartridge_oal: Option<f64>,       // in
    pub barrel_length: Option<f64>,       // in
    pub eff_case_vol: Option<f64>,        // gr H2O
    pub bullet_manu: Option<String>,
    pub bullet_mass: Option<f64>,         // gr
    pub bullet_length: Option<f64>,       // in
    pub propellant_manu: Option<String>,
    pub propellant_name: Option<String>,
    pub bulk_density: Option<f64>,
    #[serde(rename = "propellant_Qex")]
    pub propellant_qex: Option<f64>,
    pub propellant_mass: Option<f64>,     // gr
    pub load_ratio: Option<f64>,
    pub eff_barrel_length: Option<f64>,   // in
    pub muzzle_vel: Option<f64>,          // fps
    pub est_pmax: Option<f64>,
    pub est_muzzle_pressure: Option<f64>,
}

impl CartridgeRecord {
    /// Names of critical fields that are absent (or blank, for the name)
    pub fn missing_critical_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.cartridge.trim().is_empty() {
            missing.push("cartridge");
        }
        if self.bullet_mass.is_none() {
            missing.push("bullet_mass");
        }
        if self.propellant_mass.is_none() {
            missing.push("propellant_mass");
        }
        if self.muzzle_vel.is_none() {
            missing.push("muzzle_vel");
        }
        missing
    }

    /// Fail with the full list of missing critical fields, if any
    pub fn check_critical(&self) -> Result<()> {
        let fields = self.missing_critical_fields();
        if fields.is_empty() {
            Ok(())
        } else {
            Err(PowleyError::MissingField { fields })
        }
    }
}

/// Unwrap an optional numeric field or name it in a `MissingField` error
pub(crate) fn required(field: &'static str, value: Option<f64>) -> Result<f64> {
    value.ok_or_else(|| PowleyError::missing(field))
}

/// Propellant burn parameters
///
/// Parameters are optional: calibrated propellants may carry only a name
/// and rely on the override table for their Ba_eff.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropellantRecord {
    #[serde(alias = "pname")]
    pub name: String,
    #[serde(rename = "Ba")]
    pub ba: Option<f64>,
    pub a0: Option<f64>,
    pub z1: Option<f64>,
    pub z2: Option<f64>,
    pub bulk_density: Option<f64>,
    #[serde(rename = "Qex")]
    pub qex: Option<f64>,
    pub k: Option<f64>,
    /// Ba_eff carried by the source table, used only when it cannot be computed
    #[serde(rename = "Ba_eff", default)]
    pub ba_eff: Option<f64>,
}

impl PropellantRecord {
    pub fn new(name: impl Into<String>) -> Self {
        PropellantRecord { name: name.into(), ..Default::default() }
    }

    pub fn with_burn_params(mut self, ba: f64, a0: f64, z1: f64, z2: f64) -> Self {
        self.ba = Some(ba);
        self.a0 = Some(a0);
        self.z1 = Some(z1);
        self.z2 = Some(z2);
        self
    }
}

/// Predicted versus measured charge for one cartridge
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub cartridge: String,
    pub eff_case_vol: f64,      // gr H2O
    pub eff_barrel_length: f64, // in
    pub predicted_charge: f64,  // gr
    pub actual_charge: f64,     // gr
    /// actual - predicted
    pub difference: f64,        // gr
}

impl PredictionRecord {
    pub fn new(
        cartridge: impl Into<String>,
        eff_case_vol: f64,
        eff_barrel_length: f64,
        predicted_charge: f64,
        actual_charge: f64,
    ) -> Self {
        PredictionRecord {
            cartridge: cartridge.into(),
            eff_case_vol,
            eff_barrel_length,
            predicted_charge,
            actual_charge,
            difference: actual_charge - predicted_charge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_critical_fields() {
        let record = CartridgeRecord {
            cartridge: "6.5 Creedmoor".to_string(),
            bullet_mass: Some(140.0),
            ..Default::default()
        };
        assert_eq!(record.missing_critical_fields(), vec!["propellant_mass", "muzzle_vel"]);

        match record.check_critical() {
            Err(PowleyError::MissingField { fields }) => {
                assert_eq!(fields, vec!["propellant_mass", "muzzle_vel"]);
            }
            other => panic!("expected MissingField, got {:?}", other),
        }
    }

    #[test]
    fn test_blank_name_is_missing() {
        let record = CartridgeRecord {
            cartridge: "   ".to_string(),
            bullet_mass: Some(140.0),
            propellant_mass: Some(41.5),
            muzzle_vel: Some(2710.0),
            ..Default::default()
        };
        assert_eq!(record.missing_critical_fields(), vec!["cartridge"]);
    }

    #[test]
    fn test_prediction_difference_sign() {
        let p = PredictionRecord::new("308 Win", 56.0, 21.5, 45.0, 44.0);
        assert!((p.difference - -1.0).abs() < 1e-12);
    }

    #[test]
    fn test_required() {
        assert_eq!(required("groove_dia", Some(0.264)).unwrap(), 0.264);
        assert!(matches!(
            required("groove_dia", None),
            Err(PowleyError::MissingField { ref fields }) if fields == &vec!["groove_dia"]
        ));
    }
}
