//! Money represented in integer cents.

use serde::{Deserialize, Serialize};

/// A monetary amount in cents, to avoid floating point drift.
///
/// Serializes as a bare integer (`2500` = $25.00), which is the wire shape
/// downstream services consume. Arithmetic saturates at the `i64` bounds
/// instead of wrapping or panicking.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money {
    cents: i64,
}

impl Money {
    /// Creates a new amount from cents.
    pub fn from_cents(cents: i64) -> Self {
        Self { cents }
    }

    /// Creates a new amount from whole dollars.
    pub fn from_dollars(dollars: i64) -> Self {
        Self {
            cents: dollars * 100,
        }
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self { cents: 0 }
    }

    /// Returns the amount in cents.
    pub fn cents(&self) -> i64 {
        self.cents
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.cents < 0
    }

    /// Multiplies the amount by a quantity, saturating on overflow.
    pub fn times(&self, quantity: u32) -> Money {
        Money {
            cents: self.cents.saturating_mul(i64::from(quantity)),
        }
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money {
            cents: self.cents.saturating_add(rhs.cents),
        }
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        self.cents = self.cents.saturating_add(rhs.cents);
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money {
            cents: self.cents.saturating_sub(rhs.cents),
        }
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:02}", self.cents / 100, (self.cents % 100).abs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);
        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!(a.times(3).cents(), 3000);
    }

    #[test]
    fn arithmetic_saturates_instead_of_overflowing() {
        let max = Money::from_cents(i64::MAX);
        assert_eq!(max.times(2), max);
        assert_eq!(max + Money::from_cents(1), max);

        let total: Money = [max, max].into_iter().sum();
        assert_eq!(total, max);

        let min = Money::from_cents(i64::MIN);
        assert_eq!(min - Money::from_cents(1), min);
    }

    #[test]
    fn from_dollars() {
        assert_eq!(Money::from_dollars(25).cents(), 2500);
    }

    #[test]
    fn sum_of_amounts() {
        let total: Money = [Money::from_cents(2000), Money::from_cents(500)]
            .into_iter()
            .sum();
        assert_eq!(total.cents(), 2500);
    }

    #[test]
    fn display_formats_dollars_and_cents() {
        assert_eq!(Money::from_cents(2500).to_string(), "25.00");
        assert_eq!(Money::from_cents(905).to_string(), "9.05");
    }

    #[test]
    fn serializes_as_bare_cents() {
        let json = serde_json::to_string(&Money::from_cents(2500)).unwrap();
        assert_eq!(json, "2500");
    }
}
