// This file is part of library-commerce.
// Copyright (C) 2025 Dummy Library
// SPDX-License-Identifier: Apache-2.0

use derive_more::{From, Into};
use serde::{Deserialize, Serialize};
use std::{
    fmt::{self, Display},
    ops::{Add, AddAssign, Neg},
};

/// Signed monetary amount in cents. All money in the system is integer cents; formatting
/// into `"D.CC"` strings happens only at the API boundary via [Display].
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    From,
    Into,
    Serialize,
    Deserialize,
    sqlx::Type,
)]
#[sqlx(transparent)]
pub struct Cents(pub i64);

impl Cents {
    pub const ZERO: Cents = Cents(0);

    pub fn is_credit(&self) -> bool {
        self.0 > 0
    }

    pub fn is_debit(&self) -> bool {
        self.0 < 0
    }
}

impl Display for Cents {
    /// Format as decimal dollars with two cent digits and a sign prefix for negative
    /// amounts, e.g. `1234` → `"12.34"`, `-5` → `"-0.05"`.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{sign}{}.{:02}", abs / 100, abs % 100)
    }
}

impl Add for Cents {
    type Output = Cents;

    fn add(self, rhs: Cents) -> Cents {
        Cents(self.0 + rhs.0)
    }
}

impl AddAssign for Cents {
    fn add_assign(&mut self, rhs: Cents) {
        self.0 += rhs.0;
    }
}

impl Neg for Cents {
    type Output = Cents;

    fn neg(self) -> Cents {
        Cents(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::Cents;

    #[test]
    fn test_display() {
        assert_eq!(Cents(0).to_string(), "0.00");
        assert_eq!(Cents(5).to_string(), "0.05");
        assert_eq!(Cents(1234).to_string(), "12.34");
        assert_eq!(Cents(200_000).to_string(), "2000.00");
        assert_eq!(Cents(-5).to_string(), "-0.05");
        assert_eq!(Cents(-700).to_string(), "-7.00");
    }

    #[test]
    fn test_direction() {
        assert!(Cents(1).is_credit());
        assert!(Cents(-1).is_debit());
        assert!(!Cents(0).is_credit());
        assert!(!Cents(0).is_debit());
    }
}
