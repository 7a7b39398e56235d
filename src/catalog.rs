//! Propellant catalog with effective vivacity (Ba_eff) per propellant.
//!
//! Ba_eff resolution order for a name:
//! 1. calibrated override table (exact name match)
//! 2. Ba · (a0 + (1 - a0) · z2 / 2) from the burn parameters
//! 3. a Ba_eff value carried by the source table
//!
//! A propellant with none of these has no Ba_eff; what happens to it in a
//! ranking is decided by [`MissingBaEffPolicy`].

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use serde::Serialize;

use crate::bands::BurnBand;
use crate::config::{EngineConfig, MissingBaEffPolicy};
use crate::constants::CALIBRATED_BA_EFF;
use crate::error::{ensure_finite, PowleyError, Result};
use crate::records::PropellantRecord;

/// Ba_eff = Ba · (a0 + (1 - a0) · (z2 / 2))
pub fn compute_ba_eff(ba: f64, a0: f64, z2: f64) -> Result<f64> {
    let ba = ensure_finite("Ba", ba)?;
    let a0 = ensure_finite("a0", a0)?;
    let z2 = ensure_finite("z2", z2)?;
    if !(0.0..=1.0).contains(&z2) {
        return Err(PowleyError::InvalidInput { what: "z2", value: z2 });
    }
    Ok(ba * (a0 + (1.0 - a0) * (z2 / 2.0)))
}

/// Decode `%20` escapes, trim, then map through the alias table
pub fn normalize_propellant_name(raw: &str, aliases: &BTreeMap<String, String>) -> String {
    let cleaned = raw.replace("%20", " ");
    let cleaned = cleaned.trim();
    match aliases.get(cleaned) {
        Some(alias) => alias.clone(),
        None => cleaned.to_string(),
    }
}

/// Where an entry's Ba_eff came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BaEffSource {
    Override,
    Computed,
    /// Taken from the source table's own Ba_eff column
    Supplied,
    /// Catalog mean substituted for a missing value
    Imputed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CatalogEntry {
    pub name: String,
    pub record: PropellantRecord,
    pub ba_eff: Option<f64>,
    pub source: Option<BaEffSource>,
}

impl CatalogEntry {
    pub fn band(&self) -> Option<BurnBand> {
        self.ba_eff.map(BurnBand::classify)
    }
}

/// A catalog value ready for ranking
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedPropellant {
    pub name: String,
    pub ba_eff: f64,
    pub source: BaEffSource,
}

/// Catalog values after the missing-Ba_eff policy has been applied
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolvedCatalog {
    pub propellants: Vec<ResolvedPropellant>,
    /// Names dropped for lack of Ba_eff
    pub excluded: Vec<String>,
    /// Names given the catalog mean
    pub imputed: Vec<String>,
}

/// Read-only propellant table, keyed by exact (case-sensitive) name
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PropellantCatalog {
    entries: Vec<CatalogEntry>,
}

impl PropellantCatalog {
    /// Build a catalog from ingested records and a calibrated override table
    ///
    /// Names are normalised first; two records normalising to the same name
    /// are rejected. Parameter sets that fail validation (e.g. z2 > 1) leave
    /// the entry without a computed value rather than failing the catalog.
    pub fn build(
        records: Vec<PropellantRecord>,
        overrides: &BTreeMap<String, f64>,
        aliases: &BTreeMap<String, String>,
    ) -> Result<Self> {
        let mut entries: Vec<CatalogEntry> = Vec::with_capacity(records.len());
        for mut record in records {
            let name = normalize_propellant_name(&record.name, aliases);
            if name.is_empty() {
                return Err(PowleyError::missing("propellant name"));
            }
            if entries.iter().any(|e| e.name == name) {
                return Err(PowleyError::Other(format!("duplicate propellant '{}'", name)));
            }
            record.name = name.clone();

            let (ba_eff, source) = Self::resolve(&record, overrides.get(&name).copied());
            match ba_eff {
                Some(v) => tracing::debug!(propellant = %name, ba_eff = v, ?source, "catalog entry"),
                None => tracing::debug!(propellant = %name, "catalog entry without Ba_eff"),
            }
            entries.push(CatalogEntry { name, record, ba_eff, source });
        }
        Ok(PropellantCatalog { entries })
    }

    pub fn from_config(records: Vec<PropellantRecord>, config: &EngineConfig) -> Result<Self> {
        Self::build(records, &config.ba_eff_overrides, &config.propellant_aliases)
    }

    /// Catalog made only of calibrated values
    pub fn from_overrides(overrides: &BTreeMap<String, f64>) -> Self {
        let entries = overrides
            .iter()
            .map(|(name, &v)| CatalogEntry {
                name: name.clone(),
                record: PropellantRecord::new(name.clone()),
                ba_eff: Some(v),
                source: Some(BaEffSource::Override),
            })
            .collect();
        PropellantCatalog { entries }
    }

    fn resolve(record: &PropellantRecord, override_value: Option<f64>) -> (Option<f64>, Option<BaEffSource>) {
        if let Some(v) = override_value {
            return (Some(v), Some(BaEffSource::Override));
        }
        if let (Some(ba), Some(a0), Some(z2)) = (record.ba, record.a0, record.z2) {
            let z1_ok = record.z1.map_or(true, |z1| (0.0..=z2).contains(&z1));
            match compute_ba_eff(ba, a0, z2) {
                Ok(v) if z1_ok => return (Some(v), Some(BaEffSource::Computed)),
                Ok(_) => tracing::warn!(propellant = %record.name, "z1 outside [0, z2]; parameters ignored"),
                Err(e) => tracing::warn!(propellant = %record.name, error = %e, "burn parameters rejected"),
            }
        }
        match record.ba_eff.filter(|v| v.is_finite()) {
            Some(v) => (Some(v), Some(BaEffSource::Supplied)),
            None => (None, None),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[CatalogEntry] {
        &self.entries
    }

    pub fn get(&self, name: &str) -> Option<&CatalogEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Ba_eff for an exact name, or `MissingCatalogEntry`
    pub fn ba_eff(&self, name: &str) -> Result<f64> {
        self.get(name)
            .and_then(|e| e.ba_eff)
            .ok_or_else(|| PowleyError::MissingCatalogEntry(name.to_string()))
    }

    /// Mean of all resolved Ba_eff values
    pub fn mean_ba_eff(&self) -> Option<f64> {
        let values: Vec<f64> = self.entries.iter().filter_map(|e| e.ba_eff).collect();
        if values.is_empty() {
            None
        } else {
            Some(values.iter().sum::<f64>() / values.len() as f64)
        }
    }

    /// Apply the missing-Ba_eff policy and list every value available for ranking
    ///
    /// Exclusions and imputations are reported in the result and logged.
    pub fn resolved(&self, policy: MissingBaEffPolicy) -> Result<ResolvedCatalog> {
        if self.is_empty() {
            return Err(PowleyError::InsufficientData("propellant catalog is empty".to_string()));
        }
        let mean = self.mean_ba_eff();
        let mut out = ResolvedCatalog::default();

        for entry in &self.entries {
            match (entry.ba_eff, entry.source, policy, mean) {
                (Some(v), Some(source), _, _) => out.propellants.push(ResolvedPropellant {
                    name: entry.name.clone(),
                    ba_eff: v,
                    source,
                }),
                (_, _, MissingBaEffPolicy::ImputeMean, Some(m)) => {
                    tracing::warn!(propellant = %entry.name, imputed = m, "missing Ba_eff; using catalog mean");
                    out.imputed.push(entry.name.clone());
                    out.propellants.push(ResolvedPropellant {
                        name: entry.name.clone(),
                        ba_eff: m,
                        source: BaEffSource::Imputed,
                    });
                }
                _ => {
                    tracing::warn!(propellant = %entry.name, "missing Ba_eff; excluded from ranking");
                    out.excluded.push(entry.name.clone());
                }
            }
        }

        if out.propellants.is_empty() {
            return Err(PowleyError::InsufficientData(
                "no propellant in the catalog has a Ba_eff".to_string(),
            ));
        }
        Ok(out)
    }
}

static BUILTIN_CATALOG: Lazy<PropellantCatalog> = Lazy::new(|| {
    let overrides: BTreeMap<String, f64> = CALIBRATED_BA_EFF
        .iter()
        .map(|(name, v)| (name.to_string(), *v))
        .collect();
    PropellantCatalog::from_overrides(&overrides)
});

/// Calibrated propellants shipped with the engine
pub fn builtin_catalog() -> &'static PropellantCatalog {
    &BUILTIN_CATALOG
}
