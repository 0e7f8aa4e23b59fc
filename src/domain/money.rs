use crate::error::AdvanceError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};

/// A running monetary balance (repaid so far, withdrawn so far, ...).
///
/// Wrapper around `rust_decimal::Decimal` so balances cannot be mixed up
/// with raw numbers in financial calculations.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

/// A positive monetary amount, as requested or settled.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, AdvanceError> {
        if value > Decimal::ZERO {
            Ok(Self(value))
        } else {
            Err(AdvanceError::Validation(
                "Amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = AdvanceError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl Add<Decimal> for Balance {
    type Output = Self;
    fn add(self, rhs: Decimal) -> Self::Output {
        Self(self.0 + rhs)
    }
}

impl Sub<Decimal> for Balance {
    type Output = Self;
    fn sub(self, rhs: Decimal) -> Self::Output {
        Self(self.0 - rhs)
    }
}

impl AddAssign<Decimal> for Balance {
    fn add_assign(&mut self, rhs: Decimal) {
        self.0 += rhs;
    }
}

impl SubAssign<Decimal> for Balance {
    fn sub_assign(&mut self, rhs: Decimal) {
        self.0 -= rhs;
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_balance_arithmetic() {
        let mut b = Balance::new(dec!(10.0));
        b += dec!(5.0);
        assert_eq!(b, Balance::new(dec!(15.0)));
        b -= dec!(5.0);
        assert_eq!(b, Balance::new(dec!(10.0)));
        assert_eq!(b + dec!(1.0), Balance::new(dec!(11.0)));
        assert_eq!(b - dec!(1.0), Balance::new(dec!(9.0)));
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(1.0)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0.0)),
            Err(AdvanceError::Validation(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-1.0)),
            Err(AdvanceError::Validation(_))
        ));
    }
}
