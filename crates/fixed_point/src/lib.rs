//! Fixed-point arithmetic for share accounting
//!
//! Scaled multiply-divide with selectable rounding, plus decimal string
//! conversion at a fixed number of fractional digits. Everything here is pure
//! and stateless; quantities are arbitrary-width unsigned integers so the
//! intermediate product of `a * b / c` never loses precision.
//!
//! ## Scales
//!
//! | Name                | Value  | Used for                          |
//! |---------------------|--------|-----------------------------------|
//! | `RAY`               | 1e27   | indices, ray-scaled premium state |
//! | `WAD`               | 1e18   | token amounts (18 decimals)       |
//! | `PERCENTAGE_FACTOR` | 1e4    | basis points                      |
//!
//! ## Usage Example
//!
//! ```rust
//! use fixed_point::*;
//! use num_bigint::BigUint;
//!
//! let a = parse_ether("1.5").unwrap();
//! let up = mul_div(&a, &BigUint::from(1u32), &BigUint::from(3u32), Rounding::Up).unwrap();
//! let down = mul_div(&a, &BigUint::from(1u32), &BigUint::from(3u32), Rounding::Down).unwrap();
//! assert_eq!(format_ether(&down), "0.5");
//! assert_eq!(up, down);
//! ```

pub mod math;
pub mod units;

pub use math::{
    mul_div, percent_mul, percentage_factor, ray, ray_div, ray_mul, wad, MathError, Rounding,
    PERCENTAGE_FACTOR,
};
pub use units::{
    format_bps, format_ether, format_ray, format_units, parse_ether, parse_ray, parse_units,
};

pub type Result<T> = core::result::Result<T, MathError>;
