//! Precision-safe decimal types for P/L math.
//!
//! Uses `rust_decimal` for exact decimal arithmetic so that
//! `(current - entry) * size * multiplier` never picks up float noise.
//! P/L math goes through the `checked_*` methods: values read from a
//! source are unbounded and `Decimal` operators panic on overflow.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Neg, Sub};
use std::str::FromStr;

use crate::types::Classification;

/// A per-unit value: entry cost basis or current value of a position.
///
/// Negative entry values represent a net credit received at entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(pub Decimal);

impl Price {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// `self - rhs`, or `None` if the result is out of `Decimal` range.
    #[inline]
    pub fn checked_sub(self, rhs: Self) -> Option<Self> {
        self.0.checked_sub(rhs.0).map(Self)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Price {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.trim().parse()?))
    }
}

impl From<Decimal> for Price {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Price {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl Neg for Price {
    type Output = Self;

    fn neg(self) -> Self::Output {
        Self(-self.0)
    }
}

/// Signed, scaled profit/loss total in account currency.
///
/// Positive = profit. Zero and below = loss.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Pnl(pub Decimal);

impl Pnl {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    /// Classify the total. The threshold is strict: exactly zero is a loss.
    #[inline]
    pub fn classify(&self) -> Classification {
        if self.0 > Decimal::ZERO {
            Classification::Profit
        } else {
            Classification::Loss
        }
    }

    /// Round to cents, half away from zero.
    #[inline]
    pub fn to_cents(&self) -> Decimal {
        self.0
            .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    }

    #[inline]
    pub fn checked_add(self, rhs: Self) -> Option<Self> {
        self.0.checked_add(rhs.0).map(Self)
    }

    /// Scale by `factor`, or `None` on overflow.
    #[inline]
    pub fn checked_mul(self, factor: Decimal) -> Option<Self> {
        self.0.checked_mul(factor).map(Self)
    }

    /// Lossy conversion for metrics gauges.
    pub fn to_f64(&self) -> f64 {
        self.0.to_string().parse().unwrap_or(0.0)
    }
}

impl fmt::Display for Pnl {
    /// Always renders two decimal places (`360.00`, `-0.50`).
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.to_cents())
    }
}

impl From<Decimal> for Pnl {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_parse_trims() {
        let p: Price = " -1.78 ".parse().unwrap();
        assert_eq!(p, Price::new(dec!(-1.78)));
    }

    #[test]
    fn test_price_arithmetic() {
        let current = Price::new(dec!(2.50));
        let entry = Price::new(dec!(-1.78));
        assert_eq!(current - entry, Price::new(dec!(4.28)));
        assert_eq!(current.checked_sub(entry), Some(Price::new(dec!(4.28))));
        assert_eq!(-entry, Price::new(dec!(1.78)));
    }

    #[test]
    fn test_checked_ops_report_overflow() {
        let huge = Price::new(Decimal::MAX);
        assert_eq!(huge.checked_sub(Price::new(dec!(-1))), None);

        let total = Pnl::new(Decimal::MAX);
        assert_eq!(total.checked_add(Pnl::new(dec!(1))), None);
        assert_eq!(total.checked_mul(dec!(100)), None);
        assert_eq!(
            Pnl::new(dec!(3.60)).checked_mul(dec!(100)),
            Some(Pnl::new(dec!(360)))
        );
    }

    #[test]
    fn test_pnl_classify_threshold_is_strict() {
        assert_eq!(Pnl::new(dec!(0.01)).classify(), Classification::Profit);
        assert_eq!(Pnl::ZERO.classify(), Classification::Loss);
        assert_eq!(Pnl::new(dec!(-0.01)).classify(), Classification::Loss);
    }

    #[test]
    fn test_pnl_display_two_decimals() {
        assert_eq!(Pnl::new(dec!(360)).to_string(), "360.00");
        assert_eq!(Pnl::new(dec!(-12.5)).to_string(), "-12.50");
        assert_eq!(Pnl::new(dec!(1.005)).to_string(), "1.01");
        assert_eq!(Pnl::new(dec!(-1.005)).to_string(), "-1.01");
    }

    #[test]
    fn test_pnl_checked_add() {
        let total = Pnl::new(dec!(4.28)).checked_add(Pnl::new(dec!(-0.68)));
        assert_eq!(total, Some(Pnl::new(dec!(3.60))));
    }

    #[test]
    fn test_price_serde_accepts_number_and_string() {
        let from_num: Price = serde_json::from_str("-1.78").unwrap();
        let from_str: Price = serde_json::from_str("\"-1.78\"").unwrap();
        assert_eq!(from_num, from_str);
        assert_eq!(from_num, Price::new(dec!(-1.78)));
    }
}
