//! Real roots of rationals.
//!
//! An algebraic number here is the positive real `q`-th root of a positive
//! rational `r`. Roots that happen to be rational are folded to numerals
//! before an algebraic node is ever created.

use num_bigint::BigInt;
use num_integer::Roots;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};

/// Exact integer `degree`-th root of `n`, if it exists.
fn exact_root(n: &BigInt, degree: u32) -> Option<BigInt> {
    if n.is_negative() {
        return None;
    }
    let root = n.nth_root(degree);
    (num_traits::pow(root.clone(), degree as usize) == *n).then_some(root)
}

/// The positive `degree`-th root of `radicand` when it is rational.
pub(crate) fn rational_root(radicand: &BigRational, degree: u32) -> Option<BigRational> {
    let numer = exact_root(radicand.numer(), degree)?;
    let denom = exact_root(radicand.denom(), degree)?;
    Some(BigRational::new(numer, denom))
}

/// `value ^ (exponent)` for a positive rational base and rational exponent.
///
/// Returns `Ok(rational)` when the power is rational, `Err((radicand, degree))`
/// when it is the irrational root `radicand ^ (1/degree)`, and `None` when
/// the power is not handled (non-positive base, huge exponents).
pub(crate) fn power(
    base: &BigRational,
    exponent: &BigRational,
) -> Option<Result<BigRational, (BigRational, u32)>> {
    if !base.is_positive() {
        return None;
    }
    let degree = exponent.denom().to_u32()?;
    let numer = exponent.numer().to_i32()?;
    if degree > 64 || numer.unsigned_abs() > 64 {
        return None;
    }
    let radicand: BigRational = num_traits::Pow::pow(base, numer);
    if radicand.is_zero() {
        return None;
    }
    if degree == 1 {
        return Some(Ok(radicand));
    }
    if let Some(root) = rational_root(&radicand, degree) {
        return Some(Ok(root));
    }
    Some(Err((radicand, degree)))
}

/// Decimal lower and upper bounds of `radicand ^ (1/degree)` with `precision`
/// digits after the point. The bounds differ by exactly `10^-precision`.
pub(crate) fn root_bounds(
    radicand: &BigRational,
    degree: u32,
    precision: u32,
) -> (BigRational, BigRational) {
    let scale = num_traits::pow(BigInt::from(10), precision as usize);
    let scaled = radicand.numer() * num_traits::pow(scale.clone(), degree as usize) / radicand.denom();
    let floor = scaled.nth_root(degree);
    let lower = BigRational::new(floor.clone(), scale.clone());
    let upper = BigRational::new(floor + BigInt::one(), scale);
    (lower, upper)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rat(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    #[test]
    fn rational_roots_fold() {
        assert_eq!(rational_root(&rat(9, 4), 2), Some(rat(3, 2)));
        assert_eq!(rational_root(&rat(2, 1), 2), None);
        assert_eq!(power(&rat(4, 1), &rat(1, 2)), Some(Ok(rat(2, 1))));
        assert_eq!(power(&rat(2, 1), &rat(-1, 1)), Some(Ok(rat(1, 2))));
    }

    #[test]
    fn irrational_power_becomes_root() {
        assert_eq!(power(&rat(2, 1), &rat(1, 2)), Some(Err((rat(2, 1), 2))));
        assert_eq!(power(&rat(2, 1), &rat(3, 2)), Some(Err((rat(8, 1), 2))));
        assert_eq!(power(&rat(-2, 1), &rat(1, 2)), None);
    }

    #[test]
    fn sqrt_two_bounds() {
        let (lower, upper) = root_bounds(&rat(2, 1), 2, 3);
        assert_eq!(lower, rat(1414, 1000));
        assert_eq!(upper, rat(1415, 1000));
    }

    #[test]
    fn cube_root_of_fraction_bounds() {
        // (1/2)^(1/3) = 0.7937...
        let (lower, upper) = root_bounds(&rat(1, 2), 3, 2);
        assert_eq!(lower, rat(79, 100));
        assert_eq!(upper, rat(80, 100));
    }
}
