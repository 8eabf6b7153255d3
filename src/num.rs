//! Weight Arithmetic for the Constraint Graph.
//!
//! Edge weights and vertex potentials must be exact: a single rounding
//! error can fabricate or hide a negative cycle. The [`DlNumber`] trait
//! abstracts the concrete representation so the detector and store can
//! be instantiated with arbitrary-precision rationals (the default) or
//! a faster fixed-width rational when the input profile allows it.

use num_bigint::BigInt;
use num_rational::{BigRational, Rational64};
use num_traits::{One, Zero};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

/// Exact weight arithmetic required by the difference-logic core.
pub trait DlNumber:
    Clone
    + Ord
    + fmt::Debug
    + fmt::Display
    + Add<Output = Self>
    + Sub<Output = Self>
    + Neg<Output = Self>
    + Mul<Output = Self>
    + Zero
    + One
{
    /// Convert an exact rational constant; `None` when the value does
    /// not fit this representation.
    fn from_rational(value: &BigRational) -> Option<Self>;

    /// Convert back to an arbitrary-precision rational (for models).
    fn to_rational(&self) -> BigRational;

    /// Weight of the complement edge: the strict negation `-w - 1`,
    /// encoding `<` in terms of `<=` over integer-valued constraints.
    fn complement(&self) -> Self {
        -self.clone() - Self::one()
    }
}

impl DlNumber for BigRational {
    fn from_rational(value: &BigRational) -> Option<Self> {
        Some(value.clone())
    }

    fn to_rational(&self) -> BigRational {
        self.clone()
    }
}

impl DlNumber for Rational64 {
    fn from_rational(value: &BigRational) -> Option<Self> {
        let numer: i64 = value.numer().try_into().ok()?;
        let denom: i64 = value.denom().try_into().ok()?;
        Some(Rational64::new(numer, denom))
    }

    fn to_rational(&self) -> BigRational {
        BigRational::new(BigInt::from(*self.numer()), BigInt::from(*self.denom()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn big(n: i64) -> BigRational {
        BigRational::from_integer(BigInt::from(n))
    }

    #[test]
    fn test_complement_is_strict_negation() {
        assert_eq!(big(3).complement(), big(-4));
        assert_eq!(big(0).complement(), big(-1));
        assert_eq!(big(-5).complement(), big(4));
    }

    #[test]
    fn test_rational64_roundtrip() {
        let w = Rational64::new(7, 3);
        let r = w.to_rational();
        assert_eq!(Rational64::from_rational(&r), Some(w));
    }

    #[test]
    fn test_rational64_overflow_rejected() {
        let huge = BigRational::from_integer(BigInt::from(i128::from(i64::MAX) + 1));
        assert_eq!(Rational64::from_rational(&huge), None);
    }
}
