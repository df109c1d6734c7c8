//! Money amounts in integer minor currency units.

use serde::{Deserialize, Serialize};

/// Money amount in the smallest unit of its currency (yen, cents, ...).
///
/// Amounts are kept as integers end to end; the payment provider reports
/// totals and unit prices in the same unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    /// Creates an amount from minor units.
    pub fn from_minor(units: i64) -> Self {
        Self(units)
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(0)
    }

    /// Returns the amount in minor units.
    pub fn minor_units(&self) -> i64 {
        self.0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if the amount is negative.
    pub fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money(self.0 * i64::from(quantity))
    }
}

impl Default for Money {
    fn default() -> Self {
        Self::zero()
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::iter::Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_plain_minor_units() {
        assert_eq!(Money::from_minor(2000).to_string(), "2000");
        assert_eq!(Money::from_minor(0).to_string(), "0");
        assert_eq!(Money::from_minor(-15).to_string(), "-15");
    }

    #[test]
    fn arithmetic() {
        let a = Money::from_minor(1000);
        assert_eq!(a.multiply(3).minor_units(), 3000);
        assert_eq!((a + Money::from_minor(5)).minor_units(), 1005);

        let total: Money = [a, a, Money::from_minor(1)].into_iter().sum();
        assert_eq!(total.minor_units(), 2001);
    }

    #[test]
    fn serializes_as_bare_integer() {
        assert_eq!(serde_json::to_string(&Money::from_minor(42)).unwrap(), "42");
    }
}
