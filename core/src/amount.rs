use std::fmt::{Debug, Display};

/// Voting weight / balance in raw units
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Amount(u128);

impl Amount {
    pub const MAX: Amount = Amount(u128::MAX);

    pub const fn raw(value: u128) -> Self {
        Self(value)
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }

    pub fn number(&self) -> u128 {
        self.0
    }

    pub fn wrapping_add(&self, other: Amount) -> Amount {
        Amount(self.0.wrapping_add(other.0))
    }

    pub fn wrapping_sub(&self, other: Amount) -> Amount {
        Amount(self.0.wrapping_sub(other.0))
    }

    pub fn saturating_sub(&self, other: Amount) -> Amount {
        Amount(self.0.saturating_sub(other.0))
    }

    pub fn checked_add(&self, other: Amount) -> Option<Amount> {
        self.0.checked_add(other.0).map(Amount)
    }

    /// Exact floor of `self * percent / 100` without intermediate overflow
    pub fn percentage(&self, percent: u8) -> Amount {
        debug_assert!(percent <= 100);
        let percent = percent as u128;
        Amount((self.0 / 100) * percent + (self.0 % 100) * percent / 100)
    }

    pub fn to_string_dec(&self) -> String {
        self.0.to_string()
    }
}

impl From<u128> for Amount {
    fn from(value: u128) -> Self {
        Amount(value)
    }
}

impl std::ops::AddAssign for Amount {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl std::ops::Add for Amount {
    type Output = Amount;

    fn add(self, rhs: Self) -> Self::Output {
        Amount(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Amount {
    type Output = Amount;

    fn sub(self, rhs: Self) -> Self::Output {
        Amount(self.0 - rhs.0)
    }
}

impl std::iter::Sum for Amount {
    fn sum<I: Iterator<Item = Amount>>(iter: I) -> Self {
        iter.fold(Amount::zero(), |a, b| a.wrapping_add(b))
    }
}

impl Debug for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Display for Amount {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl serde::Serialize for Amount {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string_dec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percentage_is_exact_floor() {
        assert_eq!(Amount::raw(101).percentage(51), Amount::raw(51));
        assert_eq!(Amount::raw(100).percentage(67), Amount::raw(67));
        assert_eq!(Amount::raw(99).percentage(100), Amount::raw(99));
        assert_eq!(Amount::raw(1).percentage(50), Amount::zero());
    }

    #[test]
    fn percentage_does_not_overflow() {
        let expected = Amount::raw(u128::MAX / 100 * 67 + (u128::MAX % 100) * 67 / 100);
        assert_eq!(Amount::MAX.percentage(67), expected);
    }

    #[test]
    fn wrapping_arithmetic() {
        let total = Amount::raw(7).wrapping_add(Amount::raw(9));
        assert_eq!(total, Amount::raw(16));
        assert_eq!(total.wrapping_sub(Amount::raw(9)), Amount::raw(7));
    }
}
