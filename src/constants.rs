/// Physical and empirical constants used in load calculations

/// Conversion factor: millimeters to inches
pub const MM_TO_INCH: f64 = 1.0 / 25.4;

/// Conversion factor: cubic centimeters to grains of water
///
/// One cm³ of water weighs one gram; one gram is 15.432 grains.
pub const CM3_TO_GR_H2O: f64 = 15.432;

/// Conversion factor: grams to grains
///
/// Value: 1 / 0.0648 ≈ 15.432. The 0.0648 g/grain figure is the rounded
/// value carried by historical load data, not the exact 0.06479891.
pub const G_TO_GR: f64 = 1.0 / 0.0648;

/// Grains per pound (avoirdupois)
pub const GRAINS_PER_POUND: f64 = 7000.0;

/// Bore-capacity constant in grains of water per cubic inch of bore
///
/// Value: 253.0
/// Physical basis: 1 in³ = 16.387 cm³; water at 4°C gives 252.9 gr/in³.
///
/// Two values appear in historical outputs of this model:
/// - 253.0: charge prediction, expansion ratio and the propellant selector
/// - 252.3: the RC/SD and RC/bullet-weight plots
///
/// 253.0 is the canonical constant. See [`BORE_CAPACITY_PLOT_HISTORICAL`]
/// to reproduce the plot values.
pub const BORE_CAPACITY_GR_PER_IN3: f64 = 253.0;

/// Bore-capacity constant used by the historical RC plots (gr H₂O / in³)
pub const BORE_CAPACITY_PLOT_HISTORICAL: f64 = 252.3;

// Empirical charge model: charge = C * eff_case_vol^A * eff_barrel_length^B
//
// Fitted on measured rifle loads. Valid for positive volume and length only.

/// Charge model scale coefficient
pub const CHARGE_COEFFICIENT: f64 = 0.71;

/// Charge model case-volume exponent
pub const CHARGE_VOLUME_EXPONENT: f64 = 1.02;

/// Charge model barrel-length exponent (near-flat sensitivity)
pub const CHARGE_BARREL_EXPONENT: f64 = 0.06;

/// Approximate cartridge overall length subtracted from barrel length (inches)
///
/// Used when only a raw barrel length is known: the bullet travels roughly
/// barrel_length - 2.5 in before exit.
pub const CARTRIDGE_OAL_OFFSET_IN: f64 = 2.5;

// Burn-rate bands over effective vivacity (Ba_eff)

/// Ba_eff strictly below this is Slow
pub const BAND_SLOW_BELOW: f64 = 0.55;

/// Ba_eff strictly above this is Fast
pub const BAND_FAST_ABOVE: f64 = 0.70;

// Ideal Ba_eff heuristic: clamp(slope * RC + intercept, floor, ceiling)
//
// A calibrated linear fit over known loads, not a physical law. Larger
// relative capacity wants a slower (lower Ba_eff) propellant.

/// Ideal Ba_eff slope per unit of relative capacity
pub const IDEAL_BA_EFF_SLOPE: f64 = -0.05;

/// Ideal Ba_eff intercept at RC = 0
pub const IDEAL_BA_EFF_INTERCEPT: f64 = 0.85;

/// Ideal Ba_eff floor
pub const IDEAL_BA_EFF_MIN: f64 = 0.45;

/// Ideal Ba_eff ceiling
pub const IDEAL_BA_EFF_MAX: f64 = 0.90;

/// Default number of ranked propellants returned
pub const DEFAULT_TOP_K: usize = 5;

/// Tukey fence multiplier for IQR outlier detection
pub const IQR_FENCE_MULTIPLIER: f64 = 1.5;

/// Calibrated Ba_eff values for propellants lacking full burn parameters
///
/// Source: historical RC/SD plot calibration. These seed the default
/// override table; a config file replaces them.
pub const CALIBRATED_BA_EFF: &[(&str, f64)] = &[
    ("RL16", 0.651),
    ("N135", 0.65),
    ("H4350", 0.45),
    ("N110", 0.75),
    ("IMR4064", 0.62),
    ("N555", 0.586),
    ("N160", 0.55),
    ("N570", 0.475),
];

/// Long propellant names mapped onto catalog keys
pub const DEFAULT_PROPELLANT_ALIASES: &[(&str, &str)] = &[("Reloder 16", "RL16")];

/// Minimum threshold for preventing division by zero in general calculations
pub const MIN_DIVISION_THRESHOLD: f64 = 1e-12;
