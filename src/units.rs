//! Fixed-factor unit conversions between the metric values found in load
//! files and the inch/grain units the engine works in.

use crate::constants::{CM3_TO_GR_H2O, G_TO_GR, MM_TO_INCH};
use crate::error::{PowleyError, Result};
use crate::records::CartridgeRecord;

/// Stateless unit converter
///
/// No unit inference is done: the caller states the source unit by picking
/// the function.
pub struct UnitConverter;

impl UnitConverter {
    fn scale(value: f64, factor: f64, unit: &'static str) -> Result<f64> {
        if !value.is_finite() {
            return Err(PowleyError::InvalidUnit { unit, value });
        }
        Ok(value * factor)
    }

    /// Millimeters to inches
    pub fn mm_to_in(mm: f64) -> Result<f64> {
        Self::scale(mm, MM_TO_INCH, "mm")
    }

    /// Inches to millimeters
    pub fn in_to_mm(inches: f64) -> Result<f64> {
        Self::scale(inches, 1.0 / MM_TO_INCH, "in")
    }

    /// Cubic centimeters to grains of water
    pub fn cm3_to_gr_h2o(cm3: f64) -> Result<f64> {
        Self::scale(cm3, CM3_TO_GR_H2O, "cm3")
    }

    /// Grains of water to cubic centimeters
    pub fn gr_h2o_to_cm3(gr_h2o: f64) -> Result<f64> {
        Self::scale(gr_h2o, 1.0 / CM3_TO_GR_H2O, "gr H2O")
    }

    /// Grams to grains
    pub fn g_to_gr(grams: f64) -> Result<f64> {
        Self::scale(grams, G_TO_GR, "g")
    }

    /// Grains to grams
    pub fn gr_to_g(grains: f64) -> Result<f64> {
        Self::scale(grains, 1.0 / G_TO_GR, "gr")
    }

    /// Convert a record whose dimensions are in mm, cm³ and g into canonical units
    ///
    /// Lengths (groove_dia, case_length, cartridge_oal, barrel_length,
    /// eff_barrel_length, bullet_length) go mm → in; volumes (case_vol,
    /// eff_case_vol) go cm³ → gr H₂O; masses (bullet_mass, propellant_mass)
    /// go g → gr. Everything else is carried over untouched.
    pub fn cartridge_from_metric(record: &CartridgeRecord) -> Result<CartridgeRecord> {
        fn conv(value: Option<f64>, f: fn(f64) -> Result<f64>) -> Result<Option<f64>> {
            value.map(f).transpose()
        }

        Ok(CartridgeRecord {
            groove_dia: conv(record.groove_dia, Self::mm_to_in)?,
            case_vol: conv(record.case_vol, Self::cm3_to_gr_h2o)?,
            case_length: conv(record.case_length, Self::mm_to_in)?,
            cartridge_oal: conv(record.cartridge_oal, Self::mm_to_in)?,
            barrel_length: conv(record.barrel_length, Self::mm_to_in)?,
            eff_case_vol: conv(record.eff_case_vol, Self::cm3_to_gr_h2o)?,
            bullet_mass: conv(record.bullet_mass, Self::g_to_gr)?,
            bullet_length: conv(record.bullet_length, Self::mm_to_in)?,
            propellant_mass: conv(record.propellant_mass, Self::g_to_gr)?,
            eff_barrel_length: conv(record.eff_barrel_length, Self::mm_to_in)?,
            ..record.clone()
        })
    }
}
