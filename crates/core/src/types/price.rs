//! Type-safe price representation using decimal arithmetic.
//!
//! Marketplace prices are USD amounts in dollars (not cents). The backend
//! may send them as JSON numbers or decimal strings; both deserialize.

use core::fmt;
use core::ops::{Add, Mul};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A USD price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Price(Decimal);

impl Price {
    /// Zero dollars.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create a new price from a decimal amount.
    #[must_use]
    pub const fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Create a price from whole dollars.
    #[must_use]
    pub fn from_dollars(dollars: i64) -> Self {
        Self(Decimal::from(dollars))
    }

    /// Create a price from cents (e.g. `1999` is `$19.99`).
    #[must_use]
    pub fn from_cents(cents: i64) -> Self {
        Self(Decimal::new(cents, 2))
    }

    /// The underlying decimal amount.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is below zero.
    #[must_use]
    pub fn is_negative(&self) -> bool {
        self.0.is_sign_negative() && !self.0.is_zero()
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rounded = self.0.round_dp(2);
        if rounded.is_sign_negative() && !rounded.is_zero() {
            write!(f, "-${:.2}", rounded.abs())
        } else {
            write!(f, "${:.2}", rounded.abs())
        }
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Mul<u32> for Price {
    type Output = Self;

    fn mul(self, quantity: u32) -> Self::Output {
        Self(self.0 * Decimal::from(quantity))
    }
}

impl core::iter::Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

impl From<Decimal> for Price {
    fn from(amount: Decimal) -> Self {
        Self(amount)
    }
}

/// Errors that can occur when building a [`PriceRange`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum PriceRangeError {
    /// A bound is below zero.
    #[error("price bounds cannot be negative")]
    Negative,
    /// The minimum is greater than the maximum.
    #[error("minimum price {min} is greater than maximum price {max}")]
    Inverted {
        /// Requested minimum.
        min: Price,
        /// Requested maximum.
        max: Price,
    },
}

/// Inclusive price bounds used to filter the catalog.
///
/// Defaults to `[$0, $500]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceRange {
    min: Price,
    max: Price,
}

impl PriceRange {
    /// Default upper bound in whole dollars.
    pub const DEFAULT_MAX_DOLLARS: i64 = 500;

    /// Build a range, rejecting negative or inverted bounds.
    ///
    /// # Errors
    ///
    /// Returns [`PriceRangeError::Negative`] if either bound is below zero and
    /// [`PriceRangeError::Inverted`] if `min > max`.
    pub fn new(min: Price, max: Price) -> Result<Self, PriceRangeError> {
        if min.is_negative() || max.is_negative() {
            return Err(PriceRangeError::Negative);
        }
        if min > max {
            return Err(PriceRangeError::Inverted { min, max });
        }
        Ok(Self { min, max })
    }

    /// Lower bound (inclusive).
    #[must_use]
    pub const fn min(&self) -> Price {
        self.min
    }

    /// Upper bound (inclusive).
    #[must_use]
    pub const fn max(&self) -> Price {
        self.max
    }

    /// Whether `price` lies within the bounds, both ends inclusive.
    #[must_use]
    pub fn contains(&self, price: Price) -> bool {
        self.min <= price && price <= self.max
    }
}

impl Default for PriceRange {
    fn default() -> Self {
        Self {
            min: Price::ZERO,
            max: Price::from_dollars(Self::DEFAULT_MAX_DOLLARS),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_price_display() {
        assert_eq!(Price::from_cents(1999).to_string(), "$19.99");
        assert_eq!(Price::from_dollars(5).to_string(), "$5.00");
        assert_eq!(Price::ZERO.to_string(), "$0.00");
    }

    #[test]
    fn test_price_deserializes_from_string_and_number() {
        let from_str: Price = serde_json::from_str("\"29.50\"").unwrap();
        let from_num: Price = serde_json::from_str("29.5").unwrap();
        assert_eq!(from_str, from_num);
    }

    #[test]
    fn test_price_sum_and_mul() {
        let total: Price = [Price::from_cents(1050) * 2, Price::from_dollars(1)]
            .into_iter()
            .sum();
        assert_eq!(total, Price::from_cents(2200));
    }

    #[test]
    fn test_range_default() {
        let range = PriceRange::default();
        assert_eq!(range.min(), Price::ZERO);
        assert_eq!(range.max(), Price::from_dollars(500));
    }

    #[test]
    fn test_range_bounds_are_inclusive() {
        let range = PriceRange::new(Price::from_dollars(10), Price::from_dollars(20)).unwrap();
        assert!(range.contains(Price::from_dollars(10)));
        assert!(range.contains(Price::from_dollars(20)));
        assert!(!range.contains(Price::from_cents(2001)));
        assert!(!range.contains(Price::from_cents(999)));
    }

    #[test]
    fn test_range_rejects_inverted_and_negative() {
        assert!(matches!(
            PriceRange::new(Price::from_dollars(30), Price::from_dollars(20)),
            Err(PriceRangeError::Inverted { .. })
        ));
        assert_eq!(
            PriceRange::new(Price::from_dollars(-1), Price::from_dollars(20)),
            Err(PriceRangeError::Negative)
        );
    }
}
