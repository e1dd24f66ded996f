//! Elements of the Cairo prime field.
//!
//! Cairo's native word type is a residue modulo
//! `p = 2^251 + 17*2^192 + 1`. This module implements that field as a thin wrapper around
//! [`BigInt`], always kept reduced into `[0, p)`.

use lazy_static::lazy_static;
use num_bigint::{BigInt, Sign};
use num_integer::Integer;
use num_traits::{One, Signed, Zero};
use std::fmt;
use std::ops::{Add, Div, Mul, Sub};
use thiserror::Error;

lazy_static! {
    /// `2^251 + 17*2^192 + 1`, the modulus of the Cairo prime field.
    pub static ref PRIME: BigInt = BigInt::parse_bytes(
        b"800000000000011000000000000000000000000000000000000000000000001",
        16
    )
    .unwrap();
}

/// An element of the Cairo prime field, always held in its canonical `[0, PRIME)` representative.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct Felt(BigInt);

#[derive(Error, Debug, Clone, Eq, PartialEq)]
pub enum MathError {
    #[error("division by zero")]
    DivisionByZero,
    #[error("value does not fit in a small unsigned integer")]
    DoesNotFitSmallUint,
}

impl Felt {
    /// Reduces `value` modulo [`PRIME`] into the canonical representative.
    pub fn new(value: impl Into<BigInt>) -> Self {
        Self(value.into().mod_floor(&PRIME))
    }

    pub fn zero() -> Self {
        Self(BigInt::zero())
    }

    pub fn one() -> Self {
        Self(BigInt::one())
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// The canonical non-negative big integer this element represents.
    pub fn to_bigint(&self) -> BigInt {
        self.0.clone()
    }

    /// Converts to a `u64`, failing if the canonical representative does not fit.
    ///
    /// Used only by the instruction decoder, which requires instruction words to be small.
    pub fn to_u64(&self) -> Result<u64, MathError> {
        self.0.to_u64_checked().ok_or(MathError::DoesNotFitSmallUint)
    }

    pub fn add(&self, other: &Self) -> Self {
        Self::new(&self.0 + &other.0)
    }

    pub fn sub(&self, other: &Self) -> Self {
        Self::new(&self.0 - &other.0)
    }

    pub fn mul(&self, other: &Self) -> Self {
        Self::new(&self.0 * &other.0)
    }

    /// Divides by `other`, i.e. multiplies by its modular inverse.
    pub fn div(&self, other: &Self) -> Result<Self, MathError> {
        let inv = other.inverse().ok_or(MathError::DivisionByZero)?;
        Ok(self.mul(&inv))
    }

    /// Modular inverse via the extended Euclidean algorithm. `None` iff `self` is zero.
    fn inverse(&self) -> Option<Self> {
        if self.is_zero() {
            return None;
        }
        let (gcd, x, _) = extended_gcd(&self.0, &PRIME);
        debug_assert!(gcd.is_one());
        Some(Self::new(x))
    }
}

/// Returns `(gcd, x, y)` such that `a*x + b*y = gcd`.
fn extended_gcd(a: &BigInt, b: &BigInt) -> (BigInt, BigInt, BigInt) {
    let (mut old_r, mut r) = (a.clone(), b.clone());
    let (mut old_s, mut s) = (BigInt::one(), BigInt::zero());
    let (mut old_t, mut t) = (BigInt::zero(), BigInt::one());
    while !r.is_zero() {
        let quotient = &old_r / &r;
        let new_r = &old_r - &quotient * &r;
        old_r = std::mem::replace(&mut r, new_r);
        let new_s = &old_s - &quotient * &s;
        old_s = std::mem::replace(&mut s, new_s);
        let new_t = &old_t - &quotient * &t;
        old_t = std::mem::replace(&mut t, new_t);
    }
    (old_r, old_s, old_t)
}

trait ToU64Checked {
    fn to_u64_checked(&self) -> Option<u64>;
}

impl ToU64Checked for BigInt {
    fn to_u64_checked(&self) -> Option<u64> {
        if self.is_negative() {
            return None;
        }
        let (sign, bytes) = self.to_bytes_be();
        if sign == Sign::NoSign {
            return Some(0);
        }
        if bytes.len() > 8 {
            return None;
        }
        let mut buf = [0u8; 8];
        buf[8 - bytes.len()..].copy_from_slice(&bytes);
        Some(u64::from_be_bytes(buf))
    }
}

impl From<i64> for Felt {
    fn from(value: i64) -> Self {
        Self::new(BigInt::from(value))
    }
}

impl From<u64> for Felt {
    fn from(value: u64) -> Self {
        Self::new(BigInt::from(value))
    }
}

impl From<i32> for Felt {
    fn from(value: i32) -> Self {
        Self::new(BigInt::from(value))
    }
}

impl From<usize> for Felt {
    fn from(value: usize) -> Self {
        Self::new(BigInt::from(value))
    }
}

impl Add for &Felt {
    type Output = Felt;
    fn add(self, rhs: Self) -> Felt {
        Felt::add(self, rhs)
    }
}

impl Sub for &Felt {
    type Output = Felt;
    fn sub(self, rhs: Self) -> Felt {
        Felt::sub(self, rhs)
    }
}

impl Mul for &Felt {
    type Output = Felt;
    fn mul(self, rhs: Self) -> Felt {
        Felt::mul(self, rhs)
    }
}

impl Div for &Felt {
    type Output = Result<Felt, MathError>;
    fn div(self, rhs: Self) -> Result<Felt, MathError> {
        Felt::div(self, rhs)
    }
}

impl fmt::Display for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Debug for Felt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Felt({})", self.0)
    }
}
