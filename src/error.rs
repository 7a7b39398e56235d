//! Crate-wide error type and input guards.

use thiserror::Error;

/// Errors raised by the load engine and its I/O adapters
#[derive(Error, Debug)]
pub enum PowleyError {
    /// Non-finite, zero or out-of-domain value passed to a calculation
    #[error("invalid input: {what} = {value}")]
    InvalidInput { what: &'static str, value: f64 },

    /// Non-finite value handed to a unit conversion
    #[error("invalid unit value: cannot convert {value} {unit}")]
    InvalidUnit { unit: &'static str, value: f64 },

    /// Required fields absent from a record
    #[error("missing field(s): {}", .fields.join(", "))]
    MissingField { fields: Vec<&'static str> },

    /// Propellant with neither a computed nor an overridden Ba_eff
    #[error("no Ba_eff available for propellant '{0}'")]
    MissingCatalogEntry(String),

    /// Empty record set where at least one record is needed
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    /// Division by zero or zero variance
    #[error("undefined result: {0}")]
    Undefined(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

impl PowleyError {
    pub(crate) fn missing(field: &'static str) -> Self {
        PowleyError::MissingField { fields: vec![field] }
    }
}

impl From<String> for PowleyError {
    fn from(msg: String) -> Self {
        PowleyError::Other(msg)
    }
}

impl From<&str> for PowleyError {
    fn from(msg: &str) -> Self {
        PowleyError::Other(msg.to_string())
    }
}

impl From<toml::de::Error> for PowleyError {
    fn from(err: toml::de::Error) -> Self {
        PowleyError::Config(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PowleyError>;

/// Reject NaN and infinite values with a named `InvalidInput`
pub(crate) fn ensure_finite(what: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(PowleyError::InvalidInput { what, value })
    }
}

/// Require a strictly positive, finite value
pub(crate) fn ensure_positive(what: &'static str, value: f64) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(PowleyError::InvalidInput { what, value })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_lists_names() {
        let err = PowleyError::MissingField { fields: vec!["bullet_mass", "muzzle_vel"] };
        assert_eq!(err.to_string(), "missing field(s): bullet_mass, muzzle_vel");
    }

    #[test]
    fn test_ensure_positive() {
        assert_eq!(ensure_positive("x", 2.0).unwrap(), 2.0);
        assert!(matches!(ensure_positive("x", 0.0), Err(PowleyError::InvalidInput { what: "x", .. })));
        assert!(ensure_positive("x", -1.0).is_err());
        assert!(ensure_positive("x", f64::NAN).is_err());
        assert!(ensure_positive("x", f64::INFINITY).is_err());
    }

    #[test]
    fn test_ensure_finite_allows_negative() {
        assert_eq!(ensure_finite("x", -3.5).unwrap(), -3.5);
        assert!(ensure_finite("x", f64::NEG_INFINITY).is_err());
    }

    #[test]
    fn test_from_str() {
        let err: PowleyError = "boom".into();
        assert_eq!(err.to_string(), "boom");
    }
}
