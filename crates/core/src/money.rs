//! Monetary amounts as integer minor units.
//!
//! Stock values and sales values must reconcile exactly with the
//! transaction history, so floating point is off the table. One major
//! unit is 100 minor units; display formatting (currency symbol,
//! thousands separators) is a caller concern.

use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

use serde::{Deserialize, Serialize};

use crate::value_object::ValueObject;

/// A non-negative monetary amount in minor units.
///
/// Prices in this domain are never negative; constructing from `u64`
/// makes that unrepresentable. Differences (unit profit, total profit)
/// are signed and returned as `i64` minor units.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(u64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Amount from minor units (e.g. kobo, cents).
    #[inline]
    pub const fn from_minor(minor: u64) -> Self {
        Money(minor)
    }

    /// Amount from whole major units (e.g. `from_major(150)` is 150.00).
    #[inline]
    pub const fn from_major(major: u64) -> Self {
        Money(major * 100)
    }

    /// The amount in minor units.
    #[inline]
    pub const fn minor(&self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Unit price × quantity.
    ///
    /// Saturates instead of wrapping; a saturated total is still ordered
    /// correctly with respect to every representable value.
    #[inline]
    pub fn times(&self, quantity: u64) -> Money {
        Money(self.0.saturating_mul(quantity))
    }

    /// Signed difference in minor units (`self − other`).
    ///
    /// Selling below cost is representable, so this may be negative.
    #[inline]
    pub fn signed_diff(&self, other: Money) -> i64 {
        self.0 as i64 - other.0 as i64
    }
}

impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Money) {
        *self = *self + rhs;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    /// Two-decimal rendering, e.g. `1050.00`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

impl ValueObject for Money {}
