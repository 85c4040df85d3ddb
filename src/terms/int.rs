//! Integer terms.

use num_bigint::BigInt;

use crate::error::BridgeResult;
use crate::native::{BuiltinOp, SortKind};
use crate::numeral::{self, NumeralValue};
use crate::terms::{BV, Bool, Real};

term_type!(
    /// A term of sort `Int`.
    Int,
    Int,
    SortKind::Int
);

impl Int {
    unary_ops! {
        neg => BuiltinOp::Neg, Int;
        to_real => BuiltinOp::ToReal, Real;
    }

    binary_ops! {
        add => BuiltinOp::Add, Int;
        sub => BuiltinOp::Sub, Int;
        mul => BuiltinOp::Mul, Int;
        /// Integer division, rounding so that the remainder is non-negative.
        div => BuiltinOp::Div, Int;
        rem => BuiltinOp::Rem, Int;
        modulo => BuiltinOp::Mod, Int;
        power => BuiltinOp::Power, Int;
        lt => BuiltinOp::Lt, Bool;
        le => BuiltinOp::Le, Bool;
        gt => BuiltinOp::Gt, Bool;
        ge => BuiltinOp::Ge, Bool;
    }

    /// The `width`-bit vector congruent to `self` modulo `2^width`.
    pub fn to_bv(&self, width: u32) -> BridgeResult<BV> {
        self.0.apply(BuiltinOp::Int2Bv(width), &[]).map(BV::unchecked)
    }

    pub fn as_i64(&self) -> BridgeResult<NumeralValue<i64>> {
        numeral::to_i64(&self.0)
    }

    /// Unsigned value. Covers `(i64::MAX, u64::MAX]`, which `as_i64`
    /// reports as not fitting; negative values do not fit.
    pub fn as_u64(&self) -> BridgeResult<NumeralValue<u64>> {
        numeral::to_u64(&self.0)
    }

    pub fn as_big_int(&self) -> BridgeResult<NumeralValue<BigInt>> {
        numeral::to_big_int(&self.0, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::Session;
    use crate::terms::Term;

    #[test]
    fn small_and_large_values() {
        let session = Session::default_session();
        assert_eq!(session.int(-7).unwrap().as_i64().unwrap(), NumeralValue::Value(-7));
        assert_eq!(session.int(-7).unwrap().as_u64().unwrap(), NumeralValue::DoesNotFit);

        let sort = session.int_sort().unwrap();
        let huge: BigInt = BigInt::from(u64::MAX) * 4;
        let term = Int::try_from(session.from_big_int(&huge, &sort).unwrap()).unwrap();
        assert_eq!(term.as_i64().unwrap(), NumeralValue::DoesNotFit);
        assert_eq!(term.as_big_int().unwrap(), NumeralValue::Value(huge));
    }

    #[test]
    fn symbolic_terms_are_not_numerals() {
        let session = Session::default_session();
        let x = session.int_const("x").unwrap();
        assert_eq!(x.as_i64().unwrap(), NumeralValue::NotANumeral);
        assert_eq!(x.as_big_int().unwrap(), NumeralValue::NotANumeral);
    }

    #[test]
    fn arithmetic_folds_under_simplify() {
        let session = Session::default_session();
        let six = session.int(6).unwrap();
        let four = session.int(4).unwrap();
        let product = six.mul(&four).unwrap();
        assert_eq!(product.to_string(), "(* 6 4)");
        let folded = product.simplify().unwrap();
        assert_eq!(folded.as_i64().unwrap(), NumeralValue::Value(24));

        let seven = session.int(-7).unwrap();
        let two = session.int(2).unwrap();
        let quotient = seven.div(&two).unwrap().simplify().unwrap();
        let modulus = seven.modulo(&two).unwrap().simplify().unwrap();
        assert_eq!(quotient.as_i64().unwrap(), NumeralValue::Value(-4));
        assert_eq!(modulus.as_i64().unwrap(), NumeralValue::Value(1));
    }

    #[test]
    fn conversions_change_category() {
        let session = Session::default_session();
        let x = session.int_const("x").unwrap();
        assert_eq!(x.to_real().unwrap().sort().unwrap().kind(), SortKind::Real);
        let bv = x.to_bv(8).unwrap();
        assert_eq!(bv.width().unwrap(), 8);
        assert_eq!(x.lt(&x).unwrap().simplify().unwrap().as_bool().unwrap(), Some(false));
    }
}
