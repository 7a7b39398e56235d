//! # Powley Engine
//!
//! Cartridge load analysis: derived bore and case metrics, an empirical
//! charge model, validation statistics against measured loads, and
//! propellant recommendation by effective vivacity.

// Re-export the main types and functions
pub use bands::BurnBand;
pub use catalog::{
    builtin_catalog, compute_ba_eff, normalize_propellant_name, BaEffSource, CatalogEntry,
    PropellantCatalog, ResolvedCatalog, ResolvedPropellant,
};
pub use charge::{BatchPredictions, ChargePredictor, RecordFailure};
pub use chart::render_rc_sd_chart;
pub use config::{ChartConfig, CliOverrides, EngineConfig, MissingBaEffPolicy, SectionalDensityFormula};
pub use error::{PowleyError, Result};
pub use features::{efficiency_proxy, mass_ratio, DerivedFeatures, FeatureDeriver};
pub use records::{CartridgeRecord, PredictionRecord, PropellantRecord, CRITICAL_FIELDS};
pub use recommender::{
    ideal_ba_eff, nearest_cartridge, rank_propellants, LoadQuery, NearestCartridge, RankedPropellant,
    Recommendation, Recommender,
};
pub use units::UnitConverter;
pub use validation::{
    mean_absolute_error, outlier_indices, pearson_correlation, quantile, r_squared, root_mean_square_error,
    ColumnSummary, ErrorMetrics, IqrFences, Outlier, ValidationReport,
};

// Module declarations
pub mod bands;
pub mod catalog;
pub mod charge;
pub mod chart;
pub mod config;
pub mod constants;
pub mod error;
pub mod features;
pub mod ingest;
pub mod logging;
pub mod records;
pub mod recommender;
pub mod units;
pub mod validation;
