//! Empirical power-law charge model.
//!
//! charge (gr) = 0.71 · eff_case_vol^1.02 · eff_barrel_length^0.06
//!
//! The fit is increasing in case volume and only weakly increasing in
//! barrel length. It is only defined for positive inputs.

use serde::Serialize;

use crate::constants::{CHARGE_BARREL_EXPONENT, CHARGE_COEFFICIENT, CHARGE_VOLUME_EXPONENT};
use crate::error::{ensure_finite, ensure_positive, PowleyError, Result};
use crate::records::{CartridgeRecord, PredictionRecord};

/// Power-law charge estimator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChargePredictor {
    pub coefficient: f64,
    pub volume_exponent: f64,
    pub barrel_exponent: f64,
}

impl Default for ChargePredictor {
    fn default() -> Self {
        ChargePredictor {
            coefficient: CHARGE_COEFFICIENT,
            volume_exponent: CHARGE_VOLUME_EXPONENT,
            barrel_exponent: CHARGE_BARREL_EXPONENT,
        }
    }
}

/// A record the batch could not process
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordFailure {
    /// Position in the input sequence
    pub index: usize,
    pub cartridge: String,
    pub reason: String,
}

impl RecordFailure {
    pub fn new(index: usize, cartridge: &str, error: &PowleyError) -> Self {
        RecordFailure { index, cartridge: cartridge.to_string(), reason: error.to_string() }
    }
}

/// Batch output: successful predictions plus per-record failures
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchPredictions {
    pub predictions: Vec<PredictionRecord>,
    pub failures: Vec<RecordFailure>,
}

impl ChargePredictor {
    /// Predicted charge mass in grains
    pub fn predict(&self, eff_case_vol: f64, eff_barrel_length: f64) -> Result<f64> {
        let vol = ensure_positive("eff_case_vol", eff_case_vol)?;
        let len = ensure_positive("eff_barrel_length", eff_barrel_length)?;
        Ok(self.coefficient * vol.powf(self.volume_exponent) * len.powf(self.barrel_exponent))
    }

    /// Prediction for one measured load
    ///
    /// Fails atomically, naming every consumed field that is absent.
    pub fn predict_record(&self, record: &CartridgeRecord) -> Result<PredictionRecord> {
        let mut missing = Vec::new();
        if record.cartridge.trim().is_empty() {
            missing.push("cartridge");
        }
        if record.eff_case_vol.is_none() {
            missing.push("eff_case_vol");
        }
        if record.eff_barrel_length.is_none() {
            missing.push("eff_barrel_length");
        }
        if record.propellant_mass.is_none() {
            missing.push("propellant_mass");
        }

        match (record.eff_case_vol, record.eff_barrel_length, record.propellant_mass) {
            (Some(vol), Some(len), Some(actual)) if missing.is_empty() => {
                let actual = ensure_finite("propellant_mass", actual)?;
                let predicted = self.predict(vol, len)?;
                Ok(PredictionRecord::new(record.cartridge.clone(), vol, len, predicted, actual))
            }
            _ => Err(PowleyError::MissingField { fields: missing }),
        }
    }

    /// Predict every record, collecting failures instead of aborting
    pub fn predict_batch(&self, records: &[CartridgeRecord]) -> BatchPredictions {
        let mut out = BatchPredictions::default();
        for (index, record) in records.iter().enumerate() {
            match self.predict_record(record) {
                Ok(p) => out.predictions.push(p),
                Err(e) => {
                    tracing::warn!(index, cartridge = %record.cartridge, error = %e, "skipping record");
                    out.failures.push(RecordFailure::new(index, &record.cartridge, &e));
                }
            }
        }
        tracing::debug!(
            predicted = out.predictions.len(),
            failed = out.failures.len(),
            "batch prediction finished"
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_value() {
        let p = ChargePredictor::default();
        let charge = p.predict(55.0, 24.0).unwrap();
        let expected = 0.71 * 55.0_f64.powf(1.02) * 24.0_f64.powf(0.06);
        assert_eq!(charge, expected);
        assert!((charge - 51.196_581_887_708_54).abs() < 1e-10);
    }

    #[test]
    fn test_unit_inputs_give_coefficient() {
        let p = ChargePredictor::default();
        assert!((p.predict(1.0, 1.0).unwrap() - 0.71).abs() < 1e-15);
    }

    #[test]
    fn test_monotonic() {
        let p = ChargePredictor::default();
        let mut prev = 0.0;
        for vol in [10.0, 20.0, 40.0, 55.0, 80.0, 120.0] {
            let c = p.predict(vol, 24.0).unwrap();
            assert!(c > prev);
            prev = c;
        }
        assert!(p.predict(55.0, 26.0).unwrap() >= p.predict(55.0, 20.0).unwrap());
    }

    #[test]
    fn test_non_positive_inputs_rejected() {
        let p = ChargePredictor::default();
        assert!(matches!(p.predict(0.0, 24.0), Err(PowleyError::InvalidInput { what: "eff_case_vol", .. })));
        assert!(matches!(p.predict(55.0, -1.0), Err(PowleyError::InvalidInput { what: "eff_barrel_length", .. })));
        assert!(p.predict(f64::NAN, 24.0).is_err());
    }

    #[test]
    fn test_predict_batch_reports_failures() {
        let good = CartridgeRecord {
            cartridge: "6.5 Creedmoor".to_string(),
            eff_case_vol: Some(47.0),
            eff_barrel_length: Some(21.5),
            propellant_mass: Some(41.5),
            ..Default::default()
        };
        let missing = CartridgeRecord {
            cartridge: "Mystery".to_string(),
            eff_case_vol: Some(47.0),
            ..Default::default()
        };
        let short = CartridgeRecord {
            cartridge: "Stubby".to_string(),
            eff_case_vol: Some(30.0),
            eff_barrel_length: Some(-0.5),
            propellant_mass: Some(25.0),
            ..Default::default()
        };

        let batch = ChargePredictor::default().predict_batch(&[good, missing, short]);
        assert_eq!(batch.predictions.len(), 1);
        assert_eq!(batch.predictions[0].cartridge, "6.5 Creedmoor");
        let p = &batch.predictions[0];
        assert!((p.difference - (41.5 - p.predicted_charge)).abs() < 1e-12);

        assert_eq!(batch.failures.len(), 2);
        assert_eq!(batch.failures[0].index, 1);
        assert!(batch.failures[0].reason.contains("eff_barrel_length"));
        assert!(batch.failures[0].reason.contains("propellant_mass"));
        assert_eq!(batch.failures[1].cartridge, "Stubby");
    }

    #[test]
    fn test_non_finite_actual_charge_is_record_failure() {
        let record = |name: &str, charge: f64| CartridgeRecord {
            cartridge: name.to_string(),
            eff_case_vol: Some(47.0),
            eff_barrel_length: Some(21.5),
            propellant_mass: Some(charge),
            ..Default::default()
        };
        let p = ChargePredictor::default();
        assert!(matches!(
            p.predict_record(&record("D", f64::NAN)),
            Err(PowleyError::InvalidInput { what: "propellant_mass", .. })
        ));

        let batch = p.predict_batch(&[record("A", 41.5), record("D", f64::NAN), record("E", f64::INFINITY)]);
        assert_eq!(batch.predictions.len(), 1);
        assert_eq!(batch.failures.len(), 2);
        assert_eq!(batch.failures[0].cartridge, "D");
        assert!(batch.failures[0].reason.contains("propellant_mass"));
        assert!(batch.predictions.iter().all(|p| p.difference.is_finite()));
    }
}
