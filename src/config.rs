//! Engine configuration with layered resolution.
//!
//! Resolution order (highest priority first):
//! 1. CLI flags (applied via [`EngineConfig::apply_overrides`])
//! 2. TOML file given explicitly, or named by `POWLEY_CONFIG`
//! 3. Compiled defaults

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{
    BORE_CAPACITY_GR_PER_IN3, CALIBRATED_BA_EFF, CARTRIDGE_OAL_OFFSET_IN, DEFAULT_PROPELLANT_ALIASES,
    DEFAULT_TOP_K,
};
use crate::error::{PowleyError, Result};

/// Environment variable naming a config file
pub const CONFIG_ENV_VAR: &str = "POWLEY_CONFIG";

/// Which sectional density definition the engine uses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionalDensityFormula {
    /// (bullet_mass / 7000) / groove_dia², lb/in²
    #[default]
    Dimensional,
    /// bullet mass in grains, the historical Powley-chart scale
    MassProxy,
}

/// What to do with propellants that have no Ba_eff
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingBaEffPolicy {
    #[default]
    Exclude,
    /// Substitute the mean of the resolved catalog values
    ImputeMean,
}

/// Axis ranges of the text RC vs SD chart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    pub rc_min: f64,
    pub rc_max: f64,
    /// Defaults depend on the sectional density formula when unset
    pub sd_min: Option<f64>,
    pub sd_max: Option<f64>,
}

impl Default for ChartConfig {
    fn default() -> Self {
        ChartConfig { rc_min: 0.0, rc_max: 6.0, sd_min: None, sd_max: None }
    }
}

impl ChartConfig {
    /// SD axis range for the given formula
    pub fn sd_range(&self, formula: SectionalDensityFormula) -> (f64, f64) {
        let (lo, hi) = match formula {
            SectionalDensityFormula::MassProxy => (50.0, 200.0),
            SectionalDensityFormula::Dimensional => (0.15, 0.40),
        };
        (self.sd_min.unwrap_or(lo), self.sd_max.unwrap_or(hi))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// gr H₂O per cubic inch of bore
    pub bore_capacity_constant: f64,
    pub sectional_density: SectionalDensityFormula,
    /// Subtracted from raw barrel length to get effective barrel length (in)
    pub cartridge_oal_offset: f64,
    pub top_k: usize,
    pub missing_ba_eff: MissingBaEffPolicy,
    /// Calibrated Ba_eff by exact propellant name; wins over computed values
    pub ba_eff_overrides: BTreeMap<String, f64>,
    /// Long propellant name -> catalog key
    pub propellant_aliases: BTreeMap<String, String>,
    pub chart: ChartConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            bore_capacity_constant: BORE_CAPACITY_GR_PER_IN3,
            sectional_density: SectionalDensityFormula::default(),
            cartridge_oal_offset: CARTRIDGE_OAL_OFFSET_IN,
            top_k: DEFAULT_TOP_K,
            missing_ba_eff: MissingBaEffPolicy::default(),
            ba_eff_overrides: CALIBRATED_BA_EFF
                .iter()
                .map(|(name, v)| (name.to_string(), *v))
                .collect(),
            propellant_aliases: DEFAULT_PROPELLANT_ALIASES
                .iter()
                .map(|(from, to)| (from.to_string(), to.to_string()))
                .collect(),
            chart: ChartConfig::default(),
        }
    }
}

/// CLI flags that win over file and defaults
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub top_k: Option<usize>,
    pub bore_capacity_constant: Option<f64>,
    pub sectional_density: Option<SectionalDensityFormula>,
    pub missing_ba_eff: Option<MissingBaEffPolicy>,
}

impl EngineConfig {
    /// Resolve configuration from an explicit path, `POWLEY_CONFIG`, or defaults
    pub fn load(path: Option<&Path>, overrides: Option<&CliOverrides>) -> Result<Self> {
        let source: Option<PathBuf> = match path {
            Some(p) => Some(p.to_path_buf()),
            None => std::env::var_os(CONFIG_ENV_VAR).map(PathBuf::from),
        };

        let mut config = match source {
            Some(p) => {
                tracing::debug!(path = %p.display(), "loading engine config");
                Self::from_toml_file(&p)?
            }
            None => Self::default(),
        };

        if let Some(o) = overrides {
            config.apply_overrides(o);
        }
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PowleyError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: EngineConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: &CliOverrides) {
        if let Some(k) = overrides.top_k {
            self.top_k = k;
        }
        if let Some(b) = overrides.bore_capacity_constant {
            self.bore_capacity_constant = b;
        }
        if let Some(sd) = overrides.sectional_density {
            self.sectional_density = sd;
        }
        if let Some(policy) = overrides.missing_ba_eff {
            self.missing_ba_eff = policy;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.bore_capacity_constant.is_finite() && self.bore_capacity_constant > 0.0) {
            return Err(PowleyError::Config(format!(
                "bore_capacity_constant must be positive, got {}",
                self.bore_capacity_constant
            )));
        }
        if !self.cartridge_oal_offset.is_finite() {
            return Err(PowleyError::Config("cartridge_oal_offset must be finite".to_string()));
        }
        if self.top_k == 0 {
            return Err(PowleyError::Config("top_k must be at least 1".to_string()));
        }
        if let Some((name, v)) = self.ba_eff_overrides.iter().find(|(_, v)| !v.is_finite()) {
            return Err(PowleyError::Config(format!("Ba_eff override for '{}' is not finite: {}", name, v)));
        }
        let (sd_lo, sd_hi) = self.chart.sd_range(self.sectional_density);
        if !(self.chart.rc_max > self.chart.rc_min && sd_hi > sd_lo) {
            return Err(PowleyError::Config("chart axis ranges must be increasing".to_string()));
        }
        Ok(())
    }
}
