//! # Money
//!
//! Every ledger amount is a signed count of cents.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Σdebit == Σcredit          exact, no tolerance window                  │
//! │  revision delta == 0        "nothing changed", no 0.005 threshold      │
//! │  -Money                     flips a leg between debit and credit        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ```rust
//! use tally_core::money::Money;
//!
//! let total = Money::from_cents(11_000);
//! let tax = Money::from_cents(1_000);
//! assert_eq!((total - tax).cents(), 10_000);
//! assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};
use ts_rs::TS;

/// Signed amount in cents.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(transparent))]
#[ts(export)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    #[inline]
    pub const fn zero() -> Self {
        Money::ZERO
    }

    #[inline]
    pub const fn cents(self) -> i64 {
        self.0
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// Return documents go through this, so `-550` and `550` post alike.
    #[inline]
    pub const fn abs(self) -> Self {
        Money(self.0.abs())
    }

    /// `max(0, self)`.
    ///
    /// ```rust
    /// use tally_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(-40).non_negative(), Money::zero());
    /// assert_eq!(Money::from_cents(40).non_negative().cents(), 40);
    /// ```
    #[inline]
    pub const fn non_negative(self) -> Self {
        if self.0 < 0 {
            Money::ZERO
        } else {
            self
        }
    }

    /// Cost of `qty` units at this unit price.
    #[inline]
    pub const fn times(self, qty: i64) -> Self {
        Money(self.0 * qty)
    }

    /// Splits a signed leg into its `(debit, credit)` columns.
    #[inline]
    pub const fn as_leg(self) -> (Money, Money) {
        if self.0 >= 0 {
            (self, Money::ZERO)
        } else {
            (Money::ZERO, Money(-self.0))
        }
    }
}

/// `1234.5` style without a currency symbol; the ledger is single-currency.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let magnitude = self.0.unsigned_abs();
        if self.0 < 0 {
            f.write_str("-")?;
        }
        write!(f, "{}.{:02}", magnitude / 100, magnitude % 100)
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0 + rhs.0)
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0 - rhs.0)
    }
}

impl Neg for Money {
    type Output = Money;

    fn neg(self) -> Money {
        Money(-self.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl SubAssign for Money {
    fn sub_assign(&mut self, rhs: Money) {
        *self = *self - rhs;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        Money(iter.map(Money::cents).sum())
    }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money {
        iter.copied().sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        assert_eq!(Money::from_cents(1099).to_string(), "10.99");
        assert_eq!(Money::from_cents(-550).to_string(), "-5.50");
        assert_eq!(Money::from_cents(-5).to_string(), "-0.05");
        assert_eq!(Money::zero().to_string(), "0.00");
        assert_eq!(Money::from_cents(i64::MIN).to_string(), "-92233720368547758.08");
    }

    #[test]
    fn test_as_leg() {
        assert_eq!(
            Money::from_cents(700).as_leg(),
            (Money::from_cents(700), Money::zero())
        );
        assert_eq!(
            Money::from_cents(-700).as_leg(),
            (Money::zero(), Money::from_cents(700))
        );
        assert_eq!(Money::zero().as_leg(), (Money::zero(), Money::zero()));
    }

    #[test]
    fn test_signed_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(1500);

        assert_eq!((a - b).cents(), -500);
        assert_eq!((-(a - b)).cents(), 500);
        assert_eq!(a.times(3).cents(), 3000);
        assert_eq!((a - b).non_negative(), Money::zero());

        let mut running = a;
        running -= b;
        running += Money::from_cents(500);
        assert!(running.is_zero());
    }

    #[test]
    fn test_sum() {
        let amounts = [Money::from_cents(110), Money::from_cents(-10), Money::from_cents(0)];
        assert_eq!(amounts.iter().sum::<Money>().cents(), 100);
        assert_eq!(Vec::<Money>::new().into_iter().sum::<Money>(), Money::zero());
    }
}
