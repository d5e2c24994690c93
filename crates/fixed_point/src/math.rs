//! Scaled multiply-divide with rounding control
//!
//! All helpers compute on `BigUint`, so `a * b` is exact before the division
//! and the only rounding is the one the caller asks for.

use num_bigint::BigUint;
use num_integer::Integer;
use num_traits::{One, Zero};
use thiserror::Error;

/// Basis-point denominator (100% = 10_000)
pub const PERCENTAGE_FACTOR: u32 = 10_000;

/// Errors raised by the arithmetic primitives
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MathError {
    /// `mul_div` called with a zero divisor
    #[error("division by zero")]
    DivisionByZero,

    /// `Rounding::Nearest` has no inverse direction
    #[error("rounding mode {0:?} has no inverse")]
    NoInverse(Rounding),

    /// Decimal string could not be parsed
    #[error("invalid decimal string {0:?}")]
    InvalidDecimal(String),
}

/// Rounding direction for `mul_div`
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Rounding {
    /// Toward zero (floor for unsigned values)
    Down,
    /// Away from zero (ceil for unsigned values)
    Up,
    /// Round half to even ("banker's rounding")
    Nearest,
}

impl Rounding {
    /// Opposite direction. Down and Up are mutual inverses.
    pub fn inverse(self) -> Result<Rounding, MathError> {
        match self {
            Rounding::Down => Ok(Rounding::Up),
            Rounding::Up => Ok(Rounding::Down),
            Rounding::Nearest => Err(MathError::NoInverse(self)),
        }
    }
}

/// 1e27
pub fn ray() -> BigUint {
    BigUint::from(10u32).pow(27)
}

/// 1e18
pub fn wad() -> BigUint {
    BigUint::from(10u32).pow(18)
}

/// `PERCENTAGE_FACTOR` as a `BigUint`
pub fn percentage_factor() -> BigUint {
    BigUint::from(PERCENTAGE_FACTOR)
}

/// Compute `a * b / c` with the requested rounding
///
/// # Arguments
/// * `a`, `b` - Factors (product is exact, no intermediate truncation)
/// * `c` - Divisor, must be non-zero
/// * `rounding` - Down (floor), Up (ceil) or Nearest (ties to even)
///
/// # Returns
/// The rounded quotient, or `MathError::DivisionByZero` when `c == 0`
pub fn mul_div(
    a: &BigUint,
    b: &BigUint,
    c: &BigUint,
    rounding: Rounding,
) -> Result<BigUint, MathError> {
    if c.is_zero() {
        return Err(MathError::DivisionByZero);
    }

    let (quotient, remainder) = (a * b).div_rem(c);
    if remainder.is_zero() {
        return Ok(quotient);
    }

    let round_up = match rounding {
        Rounding::Down => false,
        Rounding::Up => true,
        Rounding::Nearest => {
            let doubled = &remainder << 1u32;
            match doubled.cmp(c) {
                core::cmp::Ordering::Less => false,
                core::cmp::Ordering::Greater => true,
                core::cmp::Ordering::Equal => quotient.is_odd(),
            }
        }
    };

    if round_up {
        Ok(quotient + BigUint::one())
    } else {
        Ok(quotient)
    }
}

/// `a * b / RAY`
#[inline]
pub fn ray_mul(a: &BigUint, b: &BigUint, rounding: Rounding) -> Result<BigUint, MathError> {
    mul_div(a, b, &ray(), rounding)
}

/// `a * RAY / b`
#[inline]
pub fn ray_div(a: &BigUint, b: &BigUint, rounding: Rounding) -> Result<BigUint, MathError> {
    mul_div(a, &ray(), b, rounding)
}

/// `a * bps / 10_000`
#[inline]
pub fn percent_mul(a: &BigUint, bps: u32, rounding: Rounding) -> Result<BigUint, MathError> {
    mul_div(a, &BigUint::from(bps), &percentage_factor(), rounding)
}
