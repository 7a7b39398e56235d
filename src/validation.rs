//! Prediction error metrics and column statistics.
//!
//! All functions depend only on the content of their inputs, never on
//! sequence order. Empty inputs are `InsufficientData`; zero variance is
//! `Undefined`.

use serde::Serialize;

use crate::charge::{ChargePredictor, RecordFailure};
use crate::constants::{IQR_FENCE_MULTIPLIER, MIN_DIVISION_THRESHOLD};
use crate::error::{PowleyError, Result};
use crate::records::{CartridgeRecord, PredictionRecord};

fn non_empty<'a>(values: &'a [f64], what: &str) -> Result<&'a [f64]> {
    if values.is_empty() {
        return Err(PowleyError::InsufficientData(format!("{} needs at least one value", what)));
    }
    if let Some(&bad) = values.iter().find(|v| !v.is_finite()) {
        return Err(PowleyError::InvalidInput { what: "value", value: bad });
    }
    Ok(values)
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean absolute error of a difference vector
pub fn mean_absolute_error(differences: &[f64]) -> Result<f64> {
    let d = non_empty(differences, "MAE")?;
    Ok(d.iter().map(|x| x.abs()).sum::<f64>() / d.len() as f64)
}

/// Root-mean-square error of a difference vector
pub fn root_mean_square_error(differences: &[f64]) -> Result<f64> {
    let d = non_empty(differences, "RMSE")?;
    Ok((d.iter().map(|x| x * x).sum::<f64>() / d.len() as f64).sqrt())
}

/// Coefficient of determination 1 - SS_res / SS_tot
pub fn r_squared(actual: &[f64], predicted: &[f64]) -> Result<f64> {
    let actual = non_empty(actual, "R²")?;
    let predicted = non_empty(predicted, "R²")?;
    if actual.len() != predicted.len() {
        return Err(PowleyError::Other(format!(
            "R² needs paired values, got {} actual and {} predicted",
            actual.len(),
            predicted.len()
        )));
    }

    let mean_actual = mean(actual);
    let ss_res: f64 = actual.iter().zip(predicted).map(|(a, p)| (a - p).powi(2)).sum();
    let ss_tot: f64 = actual.iter().map(|a| (a - mean_actual).powi(2)).sum();
    if ss_tot.abs() < MIN_DIVISION_THRESHOLD {
        return Err(PowleyError::Undefined("R² with zero variance in actual values".to_string()));
    }
    Ok(1.0 - ss_res / ss_tot)
}

/// Error metrics over a prediction set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorMetrics {
    pub count: usize,
    pub mae: f64,
    pub rmse: f64,
    /// Signed mean of actual - predicted
    pub mean_difference: f64,
    /// `None` when every actual charge is identical
    pub r_squared: Option<f64>,
}

impl ErrorMetrics {
    pub fn from_predictions(predictions: &[PredictionRecord]) -> Result<Self> {
        let differences: Vec<f64> = predictions.iter().map(|p| p.difference).collect();
        let actual: Vec<f64> = predictions.iter().map(|p| p.actual_charge).collect();
        let predicted: Vec<f64> = predictions.iter().map(|p| p.predicted_charge).collect();

        let mae = mean_absolute_error(&differences)?;
        let rmse = root_mean_square_error(&differences)?;
        let r_squared = match r_squared(&actual, &predicted) {
            Ok(r2) => Some(r2),
            Err(PowleyError::Undefined(reason)) => {
                tracing::warn!(%reason, "R² undefined");
                None
            }
            Err(e) => return Err(e),
        };

        Ok(ErrorMetrics {
            count: differences.len(),
            mae,
            rmse,
            mean_difference: mean(&differences),
            r_squared,
        })
    }
}

/// Quantile with linear interpolation between order statistics
///
/// Position q·(n-1) in the sorted values; the fractional part blends the
/// two neighbours.
pub fn quantile(values: &[f64], q: f64) -> Result<f64> {
    let values = non_empty(values, "quantile")?;
    if !(0.0..=1.0).contains(&q) {
        return Err(PowleyError::InvalidInput { what: "quantile", value: q });
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);

    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let frac = pos - lo as f64;
    match sorted.get(lo + 1) {
        Some(&next) => Ok(sorted[lo] + (next - sorted[lo]) * frac),
        None => Ok(sorted[lo]),
    }
}

/// Tukey fences from the interquartile range
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct IqrFences {
    pub q1: f64,
    pub q3: f64,
    pub iqr: f64,
    pub lower: f64,
    pub upper: f64,
}

impl IqrFences {
    pub fn from_values(values: &[f64]) -> Result<Self> {
        let q1 = quantile(values, 0.25)?;
        let q3 = quantile(values, 0.75)?;
        let iqr = q3 - q1;
        Ok(IqrFences {
            q1,
            q3,
            iqr,
            lower: q1 - IQR_FENCE_MULTIPLIER * iqr,
            upper: q3 + IQR_FENCE_MULTIPLIER * iqr,
        })
    }

    /// Strictly outside either fence
    pub fn is_outlier(&self, x: f64) -> bool {
        x < self.lower || x > self.upper
    }
}

/// Indices of values outside the 1.5·IQR fences
pub fn outlier_indices(values: &[f64]) -> Result<Vec<usize>> {
    let fences = IqrFences::from_values(values)?;
    Ok(values
        .iter()
        .enumerate()
        .filter(|(_, &v)| fences.is_outlier(v))
        .map(|(i, _)| i)
        .collect())
}

/// Pearson correlation coefficient of paired samples
pub fn pearson_correlation(xs: &[f64], ys: &[f64]) -> Result<f64> {
    let xs = non_empty(xs, "correlation")?;
    let ys = non_empty(ys, "correlation")?;
    if xs.len() != ys.len() {
        return Err(PowleyError::Other("correlation needs paired values".to_string()));
    }
    if xs.len() < 2 {
        return Err(PowleyError::InsufficientData("correlation needs at least two pairs".to_string()));
    }
    let mx = mean(xs);
    let my = mean(ys);
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in xs.iter().zip(ys) {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    let denom = (sxx * syy).sqrt();
    if denom < MIN_DIVISION_THRESHOLD {
        return Err(PowleyError::Undefined("correlation with a constant column".to_string()));
    }
    Ok(sxy / denom)
}

/// count / mean / std / min / quartiles / max of a column
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnSummary {
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation; `None` for a single value
    pub std: Option<f64>,
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
}

impl ColumnSummary {
    pub fn describe(values: &[f64]) -> Result<Self> {
        let values = non_empty(values, "summary")?;
        let n = values.len();
        let m = mean(values);
        let std = if n > 1 {
            Some((values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / (n - 1) as f64).sqrt())
        } else {
            None
        };
        Ok(ColumnSummary {
            count: n,
            mean: m,
            std,
            min: values.iter().copied().fold(f64::INFINITY, f64::min),
            q1: quantile(values, 0.25)?,
            median: quantile(values, 0.5)?,
            q3: quantile(values, 0.75)?,
            max: values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        })
    }
}

/// A flagged measurement
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Outlier {
    pub cartridge: String,
    pub value: f64,
}

/// Batch validation of the charge model over one record set
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub source: String,
    pub records: usize,
    pub metrics: ErrorMetrics,
    pub difference_summary: ColumnSummary,
    pub muzzle_velocity_outliers: Vec<Outlier>,
    /// Correlation of muzzle velocity with barrel length, where defined
    pub velocity_barrel_correlation: Option<f64>,
    pub failures: Vec<RecordFailure>,
}

impl ValidationReport {
    /// Predict every record and score the model
    ///
    /// Individual bad records become failures; only an entirely unusable
    /// set is an error.
    pub fn build(source: &str, records: &[CartridgeRecord], predictor: &ChargePredictor) -> Result<Self> {
        if records.is_empty() {
            return Err(PowleyError::InsufficientData(format!("{}: no records", source)));
        }
        let batch = predictor.predict_batch(records);
        let failures = batch.failures;
        for (index, record) in records.iter().enumerate() {
            let missing = record.missing_critical_fields();
            if !missing.is_empty() && !failures.iter().any(|f| f.index == index) {
                tracing::warn!(index, cartridge = %record.cartridge, ?missing, "critical fields missing");
            }
        }

        let metrics = ErrorMetrics::from_predictions(&batch.predictions)?;
        let differences: Vec<f64> = batch.predictions.iter().map(|p| p.difference).collect();
        let difference_summary = ColumnSummary::describe(&differences)?;

        let mut velocities: Vec<(&str, f64)> = Vec::new();
        for (index, record) in records.iter().enumerate() {
            match record.muzzle_vel {
                Some(v) if v.is_finite() => velocities.push((record.cartridge.as_str(), v)),
                Some(v) => {
                    tracing::warn!(index, cartridge = %record.cartridge, muzzle_vel = v, "non-finite muzzle velocity skipped");
                }
                None => {}
            }
        }
        let muzzle_velocity_outliers = if velocities.is_empty() {
            Vec::new()
        } else {
            let column: Vec<f64> = velocities.iter().map(|(_, v)| *v).collect();
            outlier_indices(&column)?
                .into_iter()
                .map(|i| Outlier { cartridge: velocities[i].0.to_string(), value: velocities[i].1 })
                .collect()
        };

        let (vel, barrel): (Vec<f64>, Vec<f64>) = records
            .iter()
            .filter_map(|r| Some((r.muzzle_vel?, r.barrel_length?)))
            .filter(|(v, b)| v.is_finite() && b.is_finite())
            .unzip();
        let velocity_barrel_correlation = pearson_correlation(&vel, &barrel).ok();

        Ok(ValidationReport {
            source: source.to_string(),
            records: records.len(),
            metrics,
            difference_summary,
            muzzle_velocity_outliers,
            velocity_barrel_correlation,
            failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mae_rmse_example() {
        let d = [1.0, -2.0, 3.0];
        assert!((mean_absolute_error(&d).unwrap() - 2.0).abs() < 1e-12);
        let rmse = root_mean_square_error(&d).unwrap();
        assert!((rmse - (14.0_f64 / 3.0).sqrt()).abs() < 1e-12);
        assert!((rmse - 2.1602).abs() < 1e-4);
    }

    #[test]
    fn test_empty_input_is_insufficient() {
        assert!(matches!(mean_absolute_error(&[]), Err(PowleyError::InsufficientData(_))));
        assert!(matches!(root_mean_square_error(&[]), Err(PowleyError::InsufficientData(_))));
        assert!(matches!(r_squared(&[], &[]), Err(PowleyError::InsufficientData(_))));
        assert!(matches!(ErrorMetrics::from_predictions(&[]), Err(PowleyError::InsufficientData(_))));
    }

    #[test]
    fn test_r_squared() {
        let actual = [40.0, 42.0, 45.0, 47.0];
        let predicted = [41.0, 41.5, 44.0, 48.0];
        let r2 = r_squared(&actual, &predicted).unwrap();
        assert!((r2 - 0.887_931_034_482_758_7).abs() < 1e-12);
        assert!((r_squared(&actual, &actual).unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_r_squared_zero_variance() {
        assert!(matches!(r_squared(&[5.0, 5.0, 5.0], &[4.0, 5.0, 6.0]), Err(PowleyError::Undefined(_))));

        let preds = vec![
            PredictionRecord::new("a", 50.0, 20.0, 44.0, 45.0),
            PredictionRecord::new("b", 50.0, 20.0, 46.0, 45.0),
        ];
        let m = ErrorMetrics::from_predictions(&preds).unwrap();
        assert_eq!(m.r_squared, None);
        assert!((m.mae - 1.0).abs() < 1e-12);
        assert!(m.mean_difference.abs() < 1e-12);
    }

    #[test]
    fn test_quantile_linear() {
        let v = [2650.0, 2700.0, 2710.0, 2720.0, 2750.0, 2780.0, 2800.0, 2820.0, 2850.0];
        assert!((quantile(&v, 0.25).unwrap() - 2710.0).abs() < 1e-12);
        assert!((quantile(&v, 0.75).unwrap() - 2800.0).abs() < 1e-12);
        assert!((quantile(&[1.0, 2.0, 3.0, 4.0], 0.5).unwrap() - 2.5).abs() < 1e-12);
        assert_eq!(quantile(&[7.0], 0.75).unwrap(), 7.0);
        assert!(quantile(&v, 1.5).is_err());
    }

    #[test]
    fn test_outlier_three_iqr_above_q3() {
        // q1 = 2712.5, q3 = 2815, IQR = 102.5; last value sits at q3 + 3·IQR
        let v = [2650.0, 2700.0, 2710.0, 2720.0, 2750.0, 2780.0, 2800.0, 2820.0, 2850.0, 3122.5];
        let fences = IqrFences::from_values(&v).unwrap();
        assert!((fences.q1 - 2712.5).abs() < 1e-9);
        assert!((fences.q3 - 2815.0).abs() < 1e-9);
        assert!((fences.upper - 2968.75).abs() < 1e-9);
        assert_eq!(outlier_indices(&v).unwrap(), vec![9]);
    }

    #[test]
    fn test_outliers_order_independent() {
        let v = [3122.5, 2850.0, 2650.0, 2820.0, 2700.0, 2800.0, 2710.0, 2780.0, 2720.0, 2750.0];
        assert_eq!(outlier_indices(&v).unwrap(), vec![0]);
    }

    #[test]
    fn test_fence_boundary_not_outlier() {
        let fences = IqrFences { q1: 10.0, q3: 20.0, iqr: 10.0, lower: -5.0, upper: 35.0 };
        assert!(!fences.is_outlier(35.0));
        assert!(!fences.is_outlier(-5.0));
        assert!(fences.is_outlier(35.0001));
    }

    #[test]
    fn test_pearson() {
        let x = [20.0, 22.0, 24.0, 26.0, 28.0];
        let y = [2600.0, 2650.0, 2700.0, 2750.0, 2800.0];
        assert!((pearson_correlation(&x, &y).unwrap() - 1.0).abs() < 1e-12);
        let y_rev: Vec<f64> = y.iter().rev().copied().collect();
        assert!((pearson_correlation(&x, &y_rev).unwrap() + 1.0).abs() < 1e-12);
        assert!(matches!(
            pearson_correlation(&x, &[1.0, 1.0, 1.0, 1.0, 1.0]),
            Err(PowleyError::Undefined(_))
        ));
    }

    #[test]
    fn test_describe() {
        let s = ColumnSummary::describe(&[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(s.count, 4);
        assert!((s.mean - 2.5).abs() < 1e-12);
        assert!((s.std.unwrap() - 1.290_994_448_735_805_6).abs() < 1e-12);
        assert_eq!(s.min, 1.0);
        assert_eq!(s.max, 4.0);
        assert!((s.median - 2.5).abs() < 1e-12);
        assert_eq!(ColumnSummary::describe(&[3.0]).unwrap().std, None);
    }

    fn load(name: &str, vol: f64, charge: f64, vel: f64, barrel: f64) -> CartridgeRecord {
        CartridgeRecord {
            cartridge: name.to_string(),
            eff_case_vol: Some(vol),
            eff_barrel_length: Some(barrel - 2.5),
            barrel_length: Some(barrel),
            propellant_mass: Some(charge),
            bullet_mass: Some(140.0),
            muzzle_vel: Some(vel),
            ..Default::default()
        }
    }

    #[test]
    fn test_report_continues_past_bad_records() {
        let mut records = vec![
            load("A", 45.0, 40.0, 2650.0, 20.0),
            load("B", 47.0, 41.5, 2700.0, 22.0),
            load("C", 50.0, 44.0, 2710.0, 24.0),
            load("D", 52.0, 45.0, 2720.0, 24.0),
            load("E", 55.0, 48.0, 2750.0, 26.0),
            load("F", 56.0, 49.0, 2780.0, 26.0),
            load("G", 57.0, 50.0, 2800.0, 26.0),
            load("H", 58.0, 50.5, 2820.0, 28.0),
            load("I", 60.0, 52.0, 2850.0, 28.0),
            load("J", 61.0, 53.0, 3122.5, 30.0),
        ];
        records.push(CartridgeRecord { cartridge: "Broken".to_string(), ..Default::default() });

        let report = ValidationReport::build("loads.csv", &records, &ChargePredictor::default()).unwrap();
        assert_eq!(report.records, 11);
        assert_eq!(report.metrics.count, 10);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].cartridge, "Broken");
        assert_eq!(
            report.muzzle_velocity_outliers,
            vec![Outlier { cartridge: "J".to_string(), value: 3122.5 }]
        );
        assert!(report.velocity_barrel_correlation.unwrap() > 0.8);
        assert!(report.metrics.r_squared.is_some());
    }

    #[test]
    fn test_report_nan_charge_becomes_failure() {
        let records = vec![
            load("A", 45.0, 40.0, 2650.0, 20.0),
            load("B", 47.0, 41.5, 2700.0, 22.0),
            load("C", 50.0, 44.0, 2710.0, 24.0),
            load("D", 52.0, f64::NAN, 2720.0, 24.0),
        ];
        let report = ValidationReport::build("loads.csv", &records, &ChargePredictor::default()).unwrap();
        assert_eq!(report.metrics.count, 3);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].cartridge, "D");
        assert!(report.metrics.mae.is_finite());
    }

    #[test]
    fn test_report_nan_velocity_skipped() {
        let records = vec![
            load("A", 45.0, 40.0, 2650.0, 20.0),
            load("B", 47.0, 41.5, f64::NAN, 22.0),
            load("C", 50.0, 44.0, f64::INFINITY, 24.0),
            load("D", 52.0, 45.0, 2720.0, 26.0),
        ];
        let report = ValidationReport::build("loads.csv", &records, &ChargePredictor::default()).unwrap();
        assert_eq!(report.metrics.count, 4);
        assert!(report.failures.is_empty());
        assert!(report.muzzle_velocity_outliers.is_empty());
        assert!((report.velocity_barrel_correlation.unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_report_with_no_usable_records() {
        let records = vec![CartridgeRecord { cartridge: "Broken".to_string(), ..Default::default() }];
        assert!(matches!(
            ValidationReport::build("x", &records, &ChargePredictor::default()),
            Err(PowleyError::InsufficientData(_))
        ));
        assert!(ValidationReport::build("x", &[], &ChargePredictor::default()).is_err());
    }
}
