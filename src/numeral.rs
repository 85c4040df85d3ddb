//! Numeric extraction from numeral terms.
//!
//! "Not a numeral" and "does not fit" are ordinary results, not errors:
//! callers routinely need to tell a symbolic term from a constant that is
//! too large. The engine's decimal string is the source of truth for
//! magnitudes; the fixed-width accessors are a fast path.

use std::str::FromStr;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, ToPrimitive};

use crate::error::{BridgeResult, NumeralError};
use crate::expr::Expr;
use crate::native::AstKind;
use crate::session::Call;

/// Result of reading a term as a number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumeralValue<T> {
    Value(T),
    /// A numeral whose value is not representable in the target type.
    DoesNotFit,
    /// The term is not a concrete numeral.
    NotANumeral,
}

impl<T> NumeralValue<T> {
    pub fn value(self) -> Option<T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_numeral(&self) -> bool {
        !matches!(self, Self::NotANumeral)
    }

    pub fn fits(&self) -> bool {
        matches!(self, Self::Value(_))
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> NumeralValue<U> {
        match self {
            Self::Value(v) => NumeralValue::Value(f(v)),
            Self::DoesNotFit => NumeralValue::DoesNotFit,
            Self::NotANumeral => NumeralValue::NotANumeral,
        }
    }

    /// `(value, is_numeral, fits)`, with the default value when it does not fit.
    pub fn into_parts(self) -> (T, bool, bool)
    where
        T: Default,
    {
        let (is_numeral, fits) = (self.is_numeral(), self.fits());
        (self.value().unwrap_or_default(), is_numeral, fits)
    }
}

/// Sign-extend the low `width` bits of `bits` (`1 <= width <= 64`).
pub fn sign_extend(bits: u64, width: u32) -> i64 {
    let shift = 64 - width.clamp(1, 64);
    ((bits << shift) as i64) >> shift
}

/// Read the unsigned value of a `width`-bit vector as two's complement.
pub fn twos_complement(value: BigInt, width: u32) -> BigInt {
    if width == 0 {
        return value;
    }
    let half = BigInt::one() << (width - 1);
    if value >= half {
        value - (BigInt::one() << width)
    } else {
        value
    }
}

fn is_numeral(call: &mut Call<'_>, expr: &Expr) -> BridgeResult<bool> {
    let raw = expr.raw();
    Ok(call.run(|e| e.get_ast_kind(raw))? == AstKind::Numeral)
}

fn numeral_string(call: &mut Call<'_>, expr: &Expr) -> BridgeResult<String> {
    let raw = expr.raw();
    call.run(|e| e.get_numeral_string(raw))
}

pub(crate) fn to_i64(expr: &Expr) -> BridgeResult<NumeralValue<i64>> {
    let raw = expr.raw();
    expr.session().transaction(|call| {
        if !is_numeral(call, expr)? {
            return Ok(NumeralValue::NotANumeral);
        }
        let value = call.run(|e| e.get_numeral_int64(raw))?;
        Ok(value.map_or(NumeralValue::DoesNotFit, NumeralValue::Value))
    })
}

pub(crate) fn to_u64(expr: &Expr) -> BridgeResult<NumeralValue<u64>> {
    let raw = expr.raw();
    expr.session().transaction(|call| {
        if !is_numeral(call, expr)? {
            return Ok(NumeralValue::NotANumeral);
        }
        let value = call.run(|e| e.get_numeral_uint64(raw))?;
        Ok(value.map_or(NumeralValue::DoesNotFit, NumeralValue::Value))
    })
}

/// Exact integer value. With `signed_width`, the value is read as a
/// two's-complement bit-vector of that width.
pub(crate) fn to_big_int(
    expr: &Expr,
    signed_width: Option<u32>,
) -> BridgeResult<NumeralValue<BigInt>> {
    let text = expr.session().transaction(|call| {
        if !is_numeral(call, expr)? {
            return Ok(None);
        }
        numeral_string(call, expr).map(Some)
    })?;
    let Some(text) = text else {
        return Ok(NumeralValue::NotANumeral);
    };
    let value = BigInt::from_str(&text).map_err(|_| NumeralError::Malformed { text })?;
    Ok(NumeralValue::Value(match signed_width {
        Some(width) => twos_complement(value, width),
        None => value,
    }))
}

/// Exact rational value of an integer or real numeral.
pub(crate) fn to_big_rational(expr: &Expr) -> BridgeResult<NumeralValue<BigRational>> {
    let text = expr.session().transaction(|call| {
        if !is_numeral(call, expr)? {
            return Ok(None);
        }
        numeral_string(call, expr).map(Some)
    })?;
    let Some(text) = text else {
        return Ok(NumeralValue::NotANumeral);
    };
    let value = BigRational::from_str(&text).map_err(|_| NumeralError::Malformed { text })?;
    Ok(NumeralValue::Value(value))
}

/// Signed value of a `width`-bit vector numeral.
///
/// Narrow vectors are sign-extended in a machine word. From 64 bits up
/// the arbitrary-precision value is range-checked instead, so the result
/// never wraps.
pub(crate) fn bv_to_i64(expr: &Expr, width: u32) -> BridgeResult<NumeralValue<i64>> {
    if width < 64 {
        return Ok(to_u64(expr)?.map(|bits| sign_extend(bits, width)));
    }
    Ok(match to_big_int(expr, Some(width))? {
        NumeralValue::Value(value) => value
            .to_i64()
            .map_or(NumeralValue::DoesNotFit, NumeralValue::Value),
        NumeralValue::DoesNotFit => NumeralValue::DoesNotFit,
        NumeralValue::NotANumeral => NumeralValue::NotANumeral,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_extension_of_narrow_vectors() {
        assert_eq!(sign_extend(0b1111, 4), -1);
        assert_eq!(sign_extend(0b0111, 4), 7);
        assert_eq!(sign_extend(0x80, 8), -128);
        assert_eq!(sign_extend(u64::MAX, 64), -1);
    }

    #[test]
    fn twos_complement_by_width() {
        assert_eq!(twos_complement(BigInt::from(15), 4), BigInt::from(-1));
        assert_eq!(twos_complement(BigInt::from(7), 4), BigInt::from(7));
        let boundary = BigInt::one() << 63u32;
        assert_eq!(
            twos_complement(boundary.clone(), 64),
            BigInt::from(i64::MIN)
        );
        assert_eq!(twos_complement(boundary.clone(), 65), boundary);
    }

    #[test]
    fn parts_follow_the_triple_convention() {
        assert_eq!(NumeralValue::Value(5i64).into_parts(), (5, true, true));
        assert_eq!(NumeralValue::<i64>::DoesNotFit.into_parts(), (0, true, false));
        assert_eq!(NumeralValue::<i64>::NotANumeral.into_parts(), (0, false, false));
    }
}
