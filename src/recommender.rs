//! Propellant recommendation for a single load query.
//!
//! The ideal effective vivacity for a case is a calibrated linear fit over
//! relative capacity (clamped to [0.45, 0.90]); catalog propellants are then
//! ranked by distance from it.

use nalgebra::Vector2;
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt;

use crate::bands::BurnBand;
use crate::catalog::{BaEffSource, PropellantCatalog, ResolvedCatalog};
use crate::charge::ChargePredictor;
use crate::config::{EngineConfig, SectionalDensityFormula};
use crate::constants::{IDEAL_BA_EFF_INTERCEPT, IDEAL_BA_EFF_MAX, IDEAL_BA_EFF_MIN, IDEAL_BA_EFF_SLOPE};
use crate::error::{ensure_finite, ensure_positive, PowleyError, Result};
use crate::features::FeatureDeriver;
use crate::records::CartridgeRecord;

/// Ideal Ba_eff for a relative capacity: clamp(-0.05·RC + 0.85, 0.45, 0.90)
pub fn ideal_ba_eff(relative_capacity: f64) -> Result<f64> {
    let rc = ensure_finite("relative_capacity", relative_capacity)?;
    Ok((IDEAL_BA_EFF_SLOPE * rc + IDEAL_BA_EFF_INTERCEPT).clamp(IDEAL_BA_EFF_MIN, IDEAL_BA_EFF_MAX))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RankedPropellant {
    pub rank: usize,
    pub name: String,
    pub ba_eff: f64,
    /// |Ba_eff - ideal|
    pub distance: f64,
    pub band: BurnBand,
    pub source: BaEffSource,
}

/// Sort by closeness to the ideal Ba_eff, ties by name; keep the first `top_k`
pub fn rank_propellants(ideal: f64, catalog: &ResolvedCatalog, top_k: usize) -> Result<Vec<RankedPropellant>> {
    let ideal = ensure_finite("ideal_ba_eff", ideal)?;
    if catalog.propellants.is_empty() {
        return Err(PowleyError::InsufficientData("no propellants to rank".to_string()));
    }

    let mut scored: Vec<(f64, &crate::catalog::ResolvedPropellant)> = catalog
        .propellants
        .iter()
        .map(|p| ((p.ba_eff - ideal).abs(), p))
        .collect();
    scored.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.name.cmp(&b.1.name)));

    Ok(scored
        .into_iter()
        .take(top_k)
        .enumerate()
        .map(|(i, (distance, p))| RankedPropellant {
            rank: i + 1,
            name: p.name.clone(),
            ba_eff: p.ba_eff,
            distance,
            band: BurnBand::classify(p.ba_eff),
            source: p.source,
        })
        .collect())
}

/// Closest reference load in (RC, SD) space
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NearestCartridge {
    /// Position in the reference set
    pub index: usize,
    pub cartridge: String,
    pub relative_capacity: f64,
    pub sectional_density: f64,
    pub distance: f64,
}

/// Euclidean nearest neighbour over (RC, SD); ties keep the earliest record
///
/// Reference records whose RC/SD cannot be derived are skipped.
pub fn nearest_cartridge(
    relative_capacity: f64,
    sectional_density: f64,
    reference: &[CartridgeRecord],
    deriver: &FeatureDeriver,
) -> Result<NearestCartridge> {
    let query = Vector2::new(
        ensure_finite("relative_capacity", relative_capacity)?,
        ensure_finite("sectional_density", sectional_density)?,
    );
    if reference.is_empty() {
        return Err(PowleyError::InsufficientData("reference cartridge set is empty".to_string()));
    }

    let mut best: Option<NearestCartridge> = None;
    for (index, record) in reference.iter().enumerate() {
        let (rc, sd) = match deriver.rc_sd(record) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(index, cartridge = %record.cartridge, error = %e, "reference record skipped");
                continue;
            }
        };
        let distance = (query - Vector2::new(rc, sd)).norm();
        let closer = match &best {
            None => true,
            Some(b) => distance.partial_cmp(&b.distance) == Some(Ordering::Less),
        };
        if closer {
            best = Some(NearestCartridge {
                index,
                cartridge: record.cartridge.clone(),
                relative_capacity: rc,
                sectional_density: sd,
                distance,
            });
        }
    }

    best.ok_or_else(|| PowleyError::InsufficientData("no usable reference cartridge".to_string()))
}

/// Raw values a handloader supplies for one recommendation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoadQuery {
    pub cartridge: String,
    pub groove_dia: f64,    // in
    pub case_vol: f64,      // gr H2O
    pub barrel_length: f64, // in
    pub bullet_mass: f64,   // gr
}

impl LoadQuery {
    /// Effective case volume (taken as the case volume) and effective barrel
    /// length (barrel length minus the cartridge OAL offset)
    pub fn effective(&self, oal_offset: f64) -> (f64, f64) {
        (self.case_vol, self.barrel_length - oal_offset)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub query: LoadQuery,
    pub eff_case_vol: f64,
    pub eff_barrel_length: f64,
    pub predicted_charge: f64,
    pub relative_capacity: f64,
    pub sectional_density: f64,
    pub sd_formula: SectionalDensityFormula,
    pub nearest: Option<NearestCartridge>,
    pub ideal_ba_eff: f64,
    pub ideal_band: BurnBand,
    pub suggestions: Vec<RankedPropellant>,
    pub excluded: Vec<String>,
    pub imputed: Vec<String>,
}

/// Query-level recommender over one catalog and an optional reference set
pub struct Recommender<'a> {
    config: &'a EngineConfig,
    deriver: FeatureDeriver,
    predictor: ChargePredictor,
    catalog: &'a PropellantCatalog,
    reference: &'a [CartridgeRecord],
}

impl<'a> Recommender<'a> {
    pub fn new(
        config: &'a EngineConfig,
        catalog: &'a PropellantCatalog,
        reference: &'a [CartridgeRecord],
    ) -> Result<Self> {
        Ok(Recommender {
            config,
            deriver: FeatureDeriver::from_config(config)?,
            predictor: ChargePredictor::default(),
            catalog,
            reference,
        })
    }

    /// Full recommendation; any invalid input fails the whole call
    pub fn recommend(&self, query: &LoadQuery) -> Result<Recommendation> {
        let groove_dia = ensure_positive("groove_dia", query.groove_dia)?;
        ensure_positive("case_vol", query.case_vol)?;
        ensure_finite("barrel_length", query.barrel_length)?;
        let bullet_mass = ensure_positive("bullet_mass", query.bullet_mass)?;

        let (eff_case_vol, eff_barrel_length) = query.effective(self.config.cartridge_oal_offset);
        if eff_barrel_length <= 0.0 {
            tracing::warn!(
                cartridge = %query.cartridge,
                eff_barrel_length,
                "barrel shorter than cartridge offset"
            );
        }
        let predicted_charge = self.predictor.predict(eff_case_vol, eff_barrel_length)?;
        let relative_capacity = self.deriver.relative_capacity(groove_dia, eff_case_vol)?;
        let sectional_density = self.deriver.sectional_density(bullet_mass, groove_dia)?;

        let nearest = if self.reference.is_empty() {
            None
        } else {
            Some(nearest_cartridge(relative_capacity, sectional_density, self.reference, &self.deriver)?)
        };

        let ideal = ideal_ba_eff(relative_capacity)?;
        let resolved = self.catalog.resolved(self.config.missing_ba_eff)?;
        let suggestions = rank_propellants(ideal, &resolved, self.config.top_k)?;

        tracing::debug!(
            cartridge = %query.cartridge,
            predicted_charge,
            rc = relative_capacity,
            ideal_ba_eff = ideal,
            "recommendation ready"
        );

        Ok(Recommendation {
            query: query.clone(),
            eff_case_vol,
            eff_barrel_length,
            predicted_charge,
            relative_capacity,
            sectional_density,
            sd_formula: self.deriver.sd_formula(),
            nearest,
            ideal_ba_eff: ideal,
            ideal_band: BurnBand::classify(ideal),
            suggestions,
            excluded: resolved.excluded,
            imputed: resolved.imputed,
        })
    }
}

impl fmt::Display for Recommendation {
    /// Plain-text summary suitable for saving next to load notes
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let q = &self.query;
        writeln!(f, "Cartridge: {}", q.cartridge)?;
        writeln!(f, "Groove Dia: {} in", q.groove_dia)?;
        writeln!(f, "Case Vol: {} gr H2O", q.case_vol)?;
        writeln!(f, "Barrel Length: {} in", q.barrel_length)?;
        writeln!(f, "Bullet Mass: {} gr", q.bullet_mass)?;
        writeln!(f, "Predicted Charge: {:.2} gr", self.predicted_charge)?;
        writeln!(f, "RC: {:.2}", self.relative_capacity)?;
        match self.sd_formula {
            SectionalDensityFormula::Dimensional => writeln!(f, "SD: {:.3} lb/in²", self.sectional_density)?,
            SectionalDensityFormula::MassProxy => writeln!(f, "SD: {} gr", self.sectional_density)?,
        }
        if let Some(n) = &self.nearest {
            writeln!(f, "Closest Cartridge: {}", n.cartridge)?;
        }
        writeln!(f, "Ideal Ba_eff: {:.3} ({})", self.ideal_ba_eff, self.ideal_band)?;
        let names: Vec<&str> = self.suggestions.iter().map(|s| s.name.as_str()).collect();
        writeln!(f, "Top Propellants: {}", names.join(", "))?;
        if !self.excluded.is_empty() {
            writeln!(f, "Excluded (no Ba_eff): {}", self.excluded.join(", "))?;
        }
        if !self.imputed.is_empty() {
            writeln!(f, "Imputed (catalog mean): {}", self.imputed.join(", "))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{builtin_catalog, ResolvedPropellant};
    use crate::config::MissingBaEffPolicy;
    use crate::records::PropellantRecord;
    use std::collections::BTreeMap;

    fn resolved(values: &[(&str, f64)]) -> ResolvedCatalog {
        ResolvedCatalog {
            propellants: values
                .iter()
                .map(|(n, v)| ResolvedPropellant { name: n.to_string(), ba_eff: *v, source: BaEffSource::Override })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_ideal_ba_eff() {
        assert!((ideal_ba_eff(2.0).unwrap() - 0.75).abs() < 1e-12);
        assert!((ideal_ba_eff(0.0).unwrap() - 0.85).abs() < 1e-12);
        assert_eq!(ideal_ba_eff(-10.0).unwrap(), 0.90);
        assert_eq!(ideal_ba_eff(20.0).unwrap(), 0.45);
        assert!(matches!(ideal_ba_eff(f64::NAN), Err(PowleyError::InvalidInput { .. })));
    }

    #[test]
    fn test_rc_two_favours_fast_band() {
        let ideal = ideal_ba_eff(2.0).unwrap();
        let catalog = builtin_catalog().resolved(MissingBaEffPolicy::Exclude).unwrap();
        let ranked = rank_propellants(ideal, &catalog, 5).unwrap();
        assert_eq!(ranked[0].name, "N110");
        assert_eq!(ranked[0].band, BurnBand::Fast);
        assert_eq!(ranked.len(), 5);
        assert!(ranked.windows(2).all(|w| w[0].distance <= w[1].distance));
    }

    #[test]
    fn test_ranking_ties_by_name() {
        let catalog = resolved(&[("Zeta", 0.60), ("Alpha", 0.70), ("Mid", 0.65)]);
        let ranked = rank_propellants(0.65, &catalog, 10).unwrap();
        let names: Vec<&str> = ranked.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Mid", "Alpha", "Zeta"]);
        assert_eq!(ranked[0].rank, 1);
        assert_eq!(ranked[2].rank, 3);
    }

    #[test]
    fn test_top_k_length() {
        let catalog = resolved(&[("A", 0.5), ("B", 0.6)]);
        assert_eq!(rank_propellants(0.6, &catalog, 5).unwrap().len(), 2);
        assert_eq!(rank_propellants(0.6, &catalog, 1).unwrap().len(), 1);
        assert!(matches!(
            rank_propellants(0.6, &ResolvedCatalog::default(), 5),
            Err(PowleyError::InsufficientData(_))
        ));
    }

    fn reference_load(name: &str, groove: f64, vol: f64, mass: f64) -> CartridgeRecord {
        CartridgeRecord {
            cartridge: name.to_string(),
            groove_dia: Some(groove),
            eff_case_vol: Some(vol),
            bullet_mass: Some(mass),
            ..Default::default()
        }
    }

    #[test]
    fn test_nearest_cartridge() {
        let fd = FeatureDeriver::default();
        let reference = vec![
            reference_load("223 Rem", 0.224, 28.0, 55.0),
            reference_load("6.5 Creedmoor", 0.264, 47.0, 140.0),
            reference_load("308 Win", 0.308, 51.0, 168.0),
        ];
        let (rc, sd) = fd.rc_sd(&reference[1]).unwrap();
        let nearest = nearest_cartridge(rc + 0.01, sd, &reference, &fd).unwrap();
        assert_eq!(nearest.cartridge, "6.5 Creedmoor");
        assert_eq!(nearest.index, 1);
        assert!((nearest.distance - 0.01).abs() < 1e-9);
    }

    #[test]
    fn test_nearest_tie_keeps_first() {
        let fd = FeatureDeriver::default();
        let reference = vec![
            reference_load("First", 0.264, 47.0, 140.0),
            reference_load("Second", 0.264, 47.0, 140.0),
        ];
        let (rc, sd) = fd.rc_sd(&reference[0]).unwrap();
        assert_eq!(nearest_cartridge(rc, sd, &reference, &fd).unwrap().cartridge, "First");
    }

    #[test]
    fn test_nearest_failures() {
        let fd = FeatureDeriver::default();
        assert!(matches!(nearest_cartridge(1.0, 0.2, &[], &fd), Err(PowleyError::InsufficientData(_))));
        let reference = vec![reference_load("A", 0.264, 47.0, 140.0)];
        assert!(matches!(
            nearest_cartridge(f64::NAN, 0.2, &reference, &fd),
            Err(PowleyError::InvalidInput { .. })
        ));
        let unusable = vec![CartridgeRecord { cartridge: "Blank".to_string(), ..Default::default() }];
        assert!(matches!(nearest_cartridge(1.0, 0.2, &unusable, &fd), Err(PowleyError::InsufficientData(_))));
    }

    fn creedmoor_query() -> LoadQuery {
        LoadQuery {
            cartridge: "6.5 Creedmoor".to_string(),
            groove_dia: 0.264,
            case_vol: 52.5,
            barrel_length: 24.0,
            bullet_mass: 140.0,
        }
    }

    #[test]
    fn test_recommend_end_to_end() {
        let config = EngineConfig::default();
        let reference = vec![
            reference_load("223 Rem", 0.224, 28.0, 55.0),
            reference_load("6.5 Creedmoor", 0.264, 52.0, 140.0),
        ];
        let recommender = Recommender::new(&config, builtin_catalog(), &reference).unwrap();
        let rec = recommender.recommend(&creedmoor_query()).unwrap();

        assert_eq!(rec.eff_case_vol, 52.5);
        assert_eq!(rec.eff_barrel_length, 21.5);
        let expected_charge = 0.71 * 52.5_f64.powf(1.02) * 21.5_f64.powf(0.06);
        assert!((rec.predicted_charge - expected_charge).abs() < 1e-12);
        assert_eq!(rec.nearest.as_ref().unwrap().cartridge, "6.5 Creedmoor");
        assert_eq!(rec.suggestions.len(), 5);
        assert!((rec.ideal_ba_eff - (-0.05 * rec.relative_capacity + 0.85)).abs() < 1e-12);

        let text = rec.to_string();
        assert!(text.contains("Cartridge: 6.5 Creedmoor"));
        assert!(text.contains("Closest Cartridge: 6.5 Creedmoor"));
        assert!(text.contains("Top Propellants: "));
    }

    #[test]
    fn test_recommend_without_reference() {
        let config = EngineConfig::default();
        let recommender = Recommender::new(&config, builtin_catalog(), &[]).unwrap();
        let rec = recommender.recommend(&creedmoor_query()).unwrap();
        assert!(rec.nearest.is_none());
    }

    #[test]
    fn test_recommend_short_barrel_fails_atomically() {
        let config = EngineConfig::default();
        let recommender = Recommender::new(&config, builtin_catalog(), &[]).unwrap();
        let mut query = creedmoor_query();
        query.barrel_length = 2.0;
        assert!(matches!(
            recommender.recommend(&query),
            Err(PowleyError::InvalidInput { what: "eff_barrel_length", .. })
        ));
        query.barrel_length = 24.0;
        query.groove_dia = 0.0;
        assert!(recommender.recommend(&query).is_err());
    }

    #[test]
    fn test_recommend_reports_exclusions() {
        let config = EngineConfig::default();
        let catalog = PropellantCatalog::build(
            vec![PropellantRecord::new("RL16"), PropellantRecord::new("Unlisted")],
            &config.ba_eff_overrides,
            &BTreeMap::new(),
        )
        .unwrap();
        let recommender = Recommender::new(&config, &catalog, &[]).unwrap();
        let rec = recommender.recommend(&creedmoor_query()).unwrap();
        assert_eq!(rec.suggestions.len(), 1);
        assert_eq!(rec.excluded, vec!["Unlisted".to_string()]);
        assert!(rec.to_string().contains("Excluded (no Ba_eff): Unlisted"));
    }
}
