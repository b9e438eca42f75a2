//! Exact, arbitrary-precision signed integer arithmetic.
//!
//! `Coefficient` is the scalar type every row and every intermediate result
//! of the conversion/simplification engines is built from. Unlike a
//! fixed-width word, `BigInt` cannot silently wrap; the only overflow this
//! module can report is the pathological "ran out of memory" case, which we
//! do not attempt to catch. What *is* fallible here — and what the
//! `IntegerError` variants cover — is dividing by zero and asking for an
//! exact quotient that doesn't exist.

#![forbid(unsafe_code)]

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};

use num_bigint::BigInt;
use num_integer::Integer as _;
use num_traits::{One, Signed, Zero};

/// Errors raised by exact integer arithmetic.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IntegerError {
    /// Division where the divisor does not evenly divide the dividend.
    #[error("division of {dividend} by {divisor} is not exact")]
    NotExactlyDivisible {
        /// The numerator.
        dividend: Coefficient,
        /// The denominator.
        divisor: Coefficient,
    },
    /// Division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Integer square root of a negative value.
    #[error("integer square root of a negative value {0}")]
    NegativeSqrt(Coefficient),
}

/// The sign of a [`Coefficient`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Sign {
    /// Strictly negative.
    Negative,
    /// Exactly zero.
    Zero,
    /// Strictly positive.
    Positive,
}

/// An exact, arbitrary-precision signed integer.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Coefficient(BigInt);

impl Coefficient {
    /// The distinguished zero value.
    pub fn zero() -> Self {
        Coefficient(BigInt::zero())
    }

    /// The distinguished one value.
    pub fn one() -> Self {
        Coefficient(BigInt::one())
    }

    /// Wraps a plain `i64`.
    pub fn from_i64(value: i64) -> Self {
        Coefficient(BigInt::from(value))
    }

    /// Whether this value is zero.
    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// The sign of this value.
    pub fn sign(&self) -> Sign {
        if self.0.is_zero() {
            Sign::Zero
        } else if self.0.is_negative() {
            Sign::Negative
        } else {
            Sign::Positive
        }
    }

    /// Absolute value.
    pub fn abs(&self) -> Self {
        Coefficient(self.0.abs())
    }

    /// Exact quotient; fails if `divisor` does not evenly divide `self`.
    pub fn div_exact(&self, divisor: &Self) -> Result<Self, IntegerError> {
        if divisor.is_zero() {
            return Err(IntegerError::DivisionByZero);
        }
        let (q, r) = self.0.div_rem(&divisor.0);
        if r.is_zero() {
            Ok(Coefficient(q))
        } else {
            Err(IntegerError::NotExactlyDivisible {
                dividend: self.clone(),
                divisor: divisor.clone(),
            })
        }
    }

    /// Truncating division with remainder: `(self / divisor, self % divisor)`.
    pub fn div_rem(&self, divisor: &Self) -> Result<(Self, Self), IntegerError> {
        if divisor.is_zero() {
            return Err(IntegerError::DivisionByZero);
        }
        let (q, r) = self.0.div_rem(&divisor.0);
        Ok((Coefficient(q), Coefficient(r)))
    }

    /// Greatest common divisor of the absolute values of `self` and `other`.
    pub fn gcd(&self, other: &Self) -> Self {
        Coefficient(self.0.gcd(&other.0))
    }

    /// Least common multiple.
    pub fn lcm(&self, other: &Self) -> Self {
        Coefficient(self.0.lcm(&other.0))
    }

    /// Extended gcd: returns `(g, s, t)` with `s*a + t*b = g`.
    ///
    /// Ties are broken in favor of `s`: when `|a| == |b|` (both nonzero),
    /// `s` carries the whole combination and `t == 0`, e.g.
    /// `gcdext(5, 5) == (5, 1, 0)`.
    pub fn extended_gcd(a: &Self, b: &Self) -> (Self, Self, Self) {
        if !a.is_zero() && a.abs() == b.abs() {
            let s = if a.sign() == Sign::Negative {
                Coefficient::from_i64(-1)
            } else {
                Coefficient::one()
            };
            return (a.abs(), s, Coefficient::zero());
        }
        let (mut old_r, mut r) = (a.0.clone(), b.0.clone());
        let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());
        let (mut old_t, mut t) = (BigInt::zero(), BigInt::one());
        while !r.is_zero() {
            let q = &old_r / &r;
            let new_r = &old_r - &q * &r;
            old_r = std::mem::replace(&mut r, new_r);
            let new_s = &old_s - &q * &s;
            old_s = std::mem::replace(&mut s, new_s);
            let new_t = &old_t - &q * &t;
            old_t = std::mem::replace(&mut t, new_t);
        }
        if old_r.is_negative() {
            old_r = -old_r;
            old_s = -old_s;
            old_t = -old_t;
        }
        (Coefficient(old_r), Coefficient(old_s), Coefficient(old_t))
    }

    /// `(a/g, b/g)` where `g = gcd(|a|, |b|)`, or `(0, 0)` if both are zero.
    ///
    /// This is the pervasive pairwise-normalization idiom: combining two
    /// values through their gcd rather than multiplying by each other's raw
    /// magnitude keeps intermediate coefficients from blowing up.
    pub fn normalize2(a: &Self, b: &Self) -> (Self, Self) {
        if a.is_zero() && b.is_zero() {
            return (Coefficient::zero(), Coefficient::zero());
        }
        let g = a.gcd(b);
        (
            a.div_exact(&g).expect("gcd always exactly divides its operand"),
            b.div_exact(&g).expect("gcd always exactly divides its operand"),
        )
    }

    /// Integer square root, rounded toward zero, of a non-negative value.
    pub fn isqrt(&self) -> Result<Self, IntegerError> {
        if self.0.is_negative() {
            return Err(IntegerError::NegativeSqrt(self.clone()));
        }
        let u = self.0.to_biguint().expect("checked non-negative above");
        Ok(Coefficient(BigInt::from(u.sqrt())))
    }

    /// Three-way comparison, matching §4.1's `{less, equal, greater}` contract.
    pub fn compare(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }

    /// Converts to `usize` if the value is in range (used at the
    /// dimension/row-index boundary only).
    pub fn to_usize(&self) -> Option<usize> {
        use num_traits::ToPrimitive;
        self.0.to_usize()
    }

    /// Parses a base-10 signed integer, as used by ascii dump/load (§6).
    pub fn parse(s: &str) -> Option<Self> {
        s.parse::<BigInt>().ok().map(Coefficient)
    }
}

impl From<i64> for Coefficient {
    fn from(value: i64) -> Self {
        Coefficient::from_i64(value)
    }
}

impl fmt::Display for Coefficient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Coefficient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Coefficient({})", self.0)
    }
}

impl Add for &Coefficient {
    type Output = Coefficient;
    fn add(self, rhs: Self) -> Coefficient {
        Coefficient(&self.0 + &rhs.0)
    }
}

impl Sub for &Coefficient {
    type Output = Coefficient;
    fn sub(self, rhs: Self) -> Coefficient {
        Coefficient(&self.0 - &rhs.0)
    }
}

impl Mul for &Coefficient {
    type Output = Coefficient;
    fn mul(self, rhs: Self) -> Coefficient {
        Coefficient(&self.0 * &rhs.0)
    }
}

impl Neg for &Coefficient {
    type Output = Coefficient;
    fn neg(self) -> Coefficient {
        Coefficient(-&self.0)
    }
}

impl Neg for Coefficient {
    type Output = Coefficient;
    fn neg(self) -> Coefficient {
        Coefficient(-self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gcd_basic() {
        let a = Coefficient::from_i64(12);
        let b = Coefficient::from_i64(18);
        assert_eq!(a.gcd(&b), Coefficient::from_i64(6));
    }

    #[test]
    fn normalize2_divides_through_gcd() {
        let a = Coefficient::from_i64(12);
        let b = Coefficient::from_i64(18);
        let (na, nb) = Coefficient::normalize2(&a, &b);
        assert_eq!(na, Coefficient::from_i64(2));
        assert_eq!(nb, Coefficient::from_i64(3));
    }

    #[test]
    fn normalize2_of_zero_pair_is_zero() {
        let z = Coefficient::zero();
        let (na, nb) = Coefficient::normalize2(&z, &z);
        assert!(na.is_zero() && nb.is_zero());
    }

    #[test]
    fn extended_gcd_tie_break_favors_s() {
        let a = Coefficient::from_i64(5);
        let b = Coefficient::from_i64(5);
        let (g, s, t) = Coefficient::extended_gcd(&a, &b);
        assert_eq!(g, Coefficient::from_i64(5));
        assert_eq!(s, Coefficient::from_i64(1));
        assert_eq!(t, Coefficient::zero());
    }

    #[test]
    fn extended_gcd_satisfies_bezout() {
        let a = Coefficient::from_i64(35);
        let b = Coefficient::from_i64(15);
        let (g, s, t) = Coefficient::extended_gcd(&a, &b);
        let lhs = &(&s * &a) + &(&t * &b);
        assert_eq!(lhs, g);
    }

    #[test]
    fn div_exact_rejects_inexact_division() {
        let a = Coefficient::from_i64(7);
        let b = Coefficient::from_i64(2);
        assert!(a.div_exact(&b).is_err());
    }

    #[test]
    fn isqrt_rejects_negative() {
        let n = Coefficient::from_i64(-4);
        assert!(n.isqrt().is_err());
    }

    #[test]
    fn isqrt_truncates() {
        let n = Coefficient::from_i64(10);
        assert_eq!(n.isqrt().unwrap(), Coefficient::from_i64(3));
    }
}
