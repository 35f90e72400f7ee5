//! Money and pricing arithmetic.
//!
//! Catalog prices are whole rupiah, but a percentage discount can produce a
//! fractional amount (15% off Rp 999 is Rp 849.15), so amounts are carried as
//! [`Decimal`] and only rounded when handed to the payment gateway.

use std::iter::Sum;
use std::ops::Add;

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// A price with currency information.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Price {
    /// Amount in the currency's standard unit (rupiah, not sen).
    pub amount: Decimal,
    /// ISO 4217 currency code.
    pub currency_code: CurrencyCode,
}

impl Price {
    /// Create a new price.
    #[must_use]
    pub const fn new(amount: Decimal, currency_code: CurrencyCode) -> Self {
        Self {
            amount,
            currency_code,
        }
    }

    /// A rupiah amount.
    #[must_use]
    pub const fn idr(amount: Decimal) -> Self {
        Self::new(amount, CurrencyCode::IDR)
    }

    /// Zero rupiah.
    #[must_use]
    pub const fn zero() -> Self {
        Self::idr(Decimal::ZERO)
    }

    /// Price after a percentage discount.
    ///
    /// `price - price * percent / 100`; a zero discount returns the price
    /// unchanged.
    #[must_use]
    pub fn discounted(self, percent: DiscountPercent) -> Self {
        if percent.is_zero() {
            return self;
        }
        let off = self.amount * Decimal::from(percent.get()) / Decimal::ONE_HUNDRED;
        Self::new(self.amount - off, self.currency_code)
    }

    /// Price shifted by a signed adjustment (variant surcharge or markdown).
    #[must_use]
    pub fn adjusted(self, adjustment: Decimal) -> Self {
        Self::new(self.amount + adjustment, self.currency_code)
    }

    /// Price multiplied by a line quantity.
    #[must_use]
    pub fn times(self, quantity: i32) -> Self {
        Self::new(self.amount * Decimal::from(quantity), self.currency_code)
    }

    /// Whole-unit amount for gateways that reject fractional rupiah.
    ///
    /// Rounds half away from zero. Returns `None` if the amount does not fit
    /// in an `i64`.
    #[must_use]
    pub fn whole_units(&self) -> Option<i64> {
        use rust_decimal::prelude::ToPrimitive;

        self.amount
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
    }
}

impl Default for Price {
    fn default() -> Self {
        Self::zero()
    }
}

impl Add for Price {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        debug_assert_eq!(self.currency_code, rhs.currency_code);
        Self::new(self.amount + rhs.amount, self.currency_code)
    }
}

impl Sum for Price {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::zero(), Add::add)
    }
}

impl<'a> Sum<&'a Self> for Price {
    fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
        iter.copied().sum()
    }
}

/// ISO 4217 currency codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum CurrencyCode {
    #[default]
    IDR,
    USD,
}

/// Errors from constructing a [`DiscountPercent`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum DiscountPercentError {
    /// The percentage is outside 0..=100.
    #[error("discount must be between 0 and 100 percent (got {0})")]
    OutOfRange(i32),
}

/// A discount percentage in `0..=100`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub struct DiscountPercent(u8);

impl DiscountPercent {
    /// No discount.
    pub const NONE: Self = Self(0);

    /// Validate a percentage.
    ///
    /// # Errors
    ///
    /// Returns `DiscountPercentError::OutOfRange` outside `0..=100`.
    pub fn new(percent: i32) -> Result<Self, DiscountPercentError> {
        u8::try_from(percent)
            .ok()
            .filter(|p| *p <= 100)
            .map(Self)
            .ok_or(DiscountPercentError::OutOfRange(percent))
    }

    /// The percentage value.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// Whether this is a zero discount.
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<i32> for DiscountPercent {
    type Error = DiscountPercentError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DiscountPercent> for i32 {
    fn from(value: DiscountPercent) -> Self {
        Self::from(value.0)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use super::*;

    fn idr(amount: i64) -> Price {
        Price::idr(Decimal::from(amount))
    }

    #[test]
    fn test_discount_zero_is_identity() {
        assert_eq!(idr(150_000).discounted(DiscountPercent::NONE), idr(150_000));
    }

    #[test]
    fn test_discount_keeps_fraction() {
        let price = idr(999).discounted(DiscountPercent::new(15).unwrap());
        assert_eq!(price.amount, Decimal::new(84915, 2));
    }

    #[test]
    fn test_full_discount_is_free() {
        let price = idr(50_000).discounted(DiscountPercent::new(100).unwrap());
        assert_eq!(price.amount, Decimal::ZERO);
    }

    #[test]
    fn test_adjusted_can_be_negative_offset() {
        let price = idr(100_000)
            .discounted(DiscountPercent::new(10).unwrap())
            .adjusted(Decimal::from(-5_000));
        assert_eq!(price, idr(85_000));
    }

    #[test]
    fn test_sum_of_line_totals() {
        let lines = [idr(10_000).times(2), idr(2_500).times(4)];
        let total: Price = lines.iter().sum();
        assert_eq!(total, idr(30_000));
    }

    #[test]
    fn test_whole_units_round_half_away_from_zero() {
        assert_eq!(Price::idr(Decimal::new(84915, 2)).whole_units(), Some(849));
        assert_eq!(Price::idr(Decimal::new(8495, 1)).whole_units(), Some(850));
    }

    #[test]
    fn test_discount_percent_range() {
        assert!(DiscountPercent::new(-1).is_err());
        assert!(DiscountPercent::new(101).is_err());
        assert_eq!(DiscountPercent::new(100).unwrap().get(), 100);
    }

    #[test]
    fn test_discount_percent_deserialize_rejects_out_of_range() {
        assert!(serde_json::from_str::<DiscountPercent>("120").is_err());
        let ok: DiscountPercent = serde_json::from_str("25").unwrap();
        assert_eq!(ok.get(), 25);
    }
}
