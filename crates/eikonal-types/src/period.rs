//! Wave periods as exact decimals.
//!
//! Periods name two things downstream: the period group of a run
//! (`10_sec`, `24.5_sec`) and the suffix of the archive's auxiliary-data
//! key (`10sec`, `24sec5`). Both renderings are derived from a
//! [`Decimal`] so that `24.3` never turns into `24sec3000000000000007`.

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

/// Errors produced when constructing a [`Period`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PeriodError {
    /// Periods must be strictly positive.
    #[error("period must be positive, got {0}")]
    NotPositive(Decimal),

    /// The floating-point value cannot be represented as a decimal.
    #[error("period {0} is not a finite decimal value")]
    NotRepresentable(String),
}

/// A strictly positive wave period in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "Decimal", into = "Decimal")]
pub struct Period(Decimal);

impl Period {
    /// Create a period from a decimal number of seconds.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodError::NotPositive`] for zero or negative values.
    pub fn new(seconds: Decimal) -> Result<Self, PeriodError> {
        if seconds <= Decimal::ZERO {
            return Err(PeriodError::NotPositive(seconds));
        }
        Ok(Self(seconds.normalize()))
    }

    /// Create a period from a float, rounding to its shortest decimal form.
    ///
    /// # Errors
    ///
    /// Returns [`PeriodError::NotRepresentable`] for NaN or infinite input,
    /// or [`PeriodError::NotPositive`] for values `<= 0`.
    pub fn from_f64(seconds: f64) -> Result<Self, PeriodError> {
        if !seconds.is_finite() {
            return Err(PeriodError::NotRepresentable(seconds.to_string()));
        }
        // Display yields the shortest string that round-trips the float.
        let value = seconds
            .to_string()
            .parse::<Decimal>()
            .map_err(|e| PeriodError::NotRepresentable(format!("{seconds}: {e}")))?;
        Self::new(value)
    }

    /// Whole-second period (convenience for defaults and tests).
    pub fn from_secs(seconds: u32) -> Self {
        Self(Decimal::from(seconds.max(1)))
    }

    /// The period as an exact decimal.
    pub const fn as_decimal(self) -> Decimal {
        self.0
    }

    /// The period as a float, for numeric work.
    pub fn as_f64(self) -> f64 {
        self.0.to_f64().unwrap_or(f64::NAN)
    }

    /// Name of the period group inside a run, e.g. `10_sec` or `24.5_sec`.
    pub fn group_name(self) -> String {
        format!("{}_sec", self.0)
    }

    /// Suffix of the archive key for this period.
    ///
    /// Integer part, then `sec`, then the digits after the decimal point
    /// when the fractional part is non-zero: `6` becomes `6sec`, `24.5`
    /// becomes `24sec5` and `45.0` becomes `45sec`.
    pub fn archive_suffix(self) -> String {
        let whole = self.0.trunc();
        let fraction = self.0.fract().normalize();
        if fraction.is_zero() {
            return format!("{whole}sec");
        }
        let rendered = fraction.to_string();
        let digits = rendered.split_once('.').map_or("", |(_, digits)| digits);
        format!("{whole}sec{digits}")
    }

    /// Default period list: 6 to 40 s every 2 s, then 45 to 60 s every 5 s.
    pub fn default_list() -> Vec<Self> {
        let short = (0..18_u32).map(|i| Self::from_secs(6_u32.saturating_add(i.saturating_mul(2))));
        let long = (0..4_u32).map(|i| Self::from_secs(45_u32.saturating_add(i.saturating_mul(5))));
        short.chain(long).collect()
    }
}

impl TryFrom<Decimal> for Period {
    type Error = PeriodError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Period> for Decimal {
    fn from(period: Period) -> Self {
        period.0
    }
}

impl core::fmt::Display for Period {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}s", self.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn archive_suffix_whole_seconds() {
        assert_eq!(Period::new(dec!(6)).unwrap().archive_suffix(), "6sec");
        assert_eq!(Period::new(dec!(45.0)).unwrap().archive_suffix(), "45sec");
    }

    #[test]
    fn archive_suffix_fractional_seconds() {
        assert_eq!(Period::new(dec!(24.5)).unwrap().archive_suffix(), "24sec5");
        assert_eq!(Period::new(dec!(7.25)).unwrap().archive_suffix(), "7sec25");
        assert_eq!(Period::from_f64(24.3).unwrap().archive_suffix(), "24sec3");
    }

    #[test]
    fn group_names() {
        assert_eq!(Period::new(dec!(10)).unwrap().group_name(), "10_sec");
        assert_eq!(Period::new(dec!(10.0)).unwrap().group_name(), "10_sec");
        assert_eq!(Period::new(dec!(24.5)).unwrap().group_name(), "24.5_sec");
    }

    #[test]
    fn rejects_non_positive() {
        assert!(Period::new(dec!(0)).is_err());
        assert!(Period::new(dec!(-3)).is_err());
        assert!(Period::from_f64(f64::NAN).is_err());
    }

    #[test]
    fn default_list_matches_layout() {
        let list = Period::default_list();
        assert_eq!(list.len(), 22);
        assert_eq!(list.first().copied(), Some(Period::from_secs(6)));
        assert_eq!(list.get(17).copied(), Some(Period::from_secs(40)));
        assert_eq!(list.get(18).copied(), Some(Period::from_secs(45)));
        assert_eq!(list.last().copied(), Some(Period::from_secs(60)));
    }

    #[test]
    fn deserializes_from_numbers() {
        let periods: Vec<Period> = serde_json::from_str("[10, 24.5]").unwrap();
        assert_eq!(periods.len(), 2);
        assert_eq!(periods.get(1).map(|p| p.archive_suffix()).as_deref(), Some("24sec5"));
    }
}
