//! Fixed-width bit-vector terms.
//!
//! Numerals are stored unsigned. The signed accessors read them as two's
//! complement of the term's own width.

use num_bigint::{BigInt, BigUint};

use crate::error::BridgeResult;
use crate::native::{BuiltinOp, SortKind};
use crate::numeral::{self, NumeralValue};
use crate::terms::{Bool, Int, Term};

term_type!(
    /// A term of sort `(_ BitVec n)`.
    BV,
    BV,
    SortKind::BV
);

impl BV {
    /// Width of this term's sort.
    pub fn width(&self) -> BridgeResult<u32> {
        self.sort()?.bv_size()
    }

    unary_ops! {
        not => BuiltinOp::BvNot, BV;
        neg => BuiltinOp::BvNeg, BV;
        /// 1-bit vector: the conjunction of all bits.
        all_bits => BuiltinOp::BvRedAnd, BV;
        /// 1-bit vector: the disjunction of all bits.
        any_bits => BuiltinOp::BvRedOr, BV;
    }

    binary_ops! {
        and => BuiltinOp::BvAnd, BV;
        or => BuiltinOp::BvOr, BV;
        xor => BuiltinOp::BvXor, BV;
        nand => BuiltinOp::BvNand, BV;
        nor => BuiltinOp::BvNor, BV;
        xnor => BuiltinOp::BvXnor, BV;
        add => BuiltinOp::BvAdd, BV;
        sub => BuiltinOp::BvSub, BV;
        mul => BuiltinOp::BvMul, BV;
        udiv => BuiltinOp::BvUDiv, BV;
        urem => BuiltinOp::BvURem, BV;
        sdiv => BuiltinOp::BvSDiv, BV;
        srem => BuiltinOp::BvSRem, BV;
        smod => BuiltinOp::BvSMod, BV;
        shl => BuiltinOp::BvShl, BV;
        lshr => BuiltinOp::BvLShr, BV;
        ashr => BuiltinOp::BvAShr, BV;
        /// Rotate by `other` bits, taken modulo the width.
        rotate_left => BuiltinOp::BvRotateLeft, BV;
        rotate_right => BuiltinOp::BvRotateRight, BV;
        ult => BuiltinOp::BvUlt, Bool;
        ule => BuiltinOp::BvUle, Bool;
        ugt => BuiltinOp::BvUgt, Bool;
        uge => BuiltinOp::BvUge, Bool;
        slt => BuiltinOp::BvSlt, Bool;
        sle => BuiltinOp::BvSle, Bool;
        sgt => BuiltinOp::BvSgt, Bool;
        sge => BuiltinOp::BvSge, Bool;
        /// `self` in the high bits, `other` in the low bits.
        concat => BuiltinOp::Concat, BV;
    }

    /// Bits `high` down to `low`, inclusive.
    pub fn extract(&self, high: u32, low: u32) -> BridgeResult<BV> {
        self.indexed(BuiltinOp::Extract { high, low })
    }

    pub fn zero_ext(&self, extra: u32) -> BridgeResult<BV> {
        self.indexed(BuiltinOp::ZeroExt(extra))
    }

    pub fn sign_ext(&self, extra: u32) -> BridgeResult<BV> {
        self.indexed(BuiltinOp::SignExt(extra))
    }

    pub fn repeat(&self, count: u32) -> BridgeResult<BV> {
        self.indexed(BuiltinOp::Repeat(count))
    }

    fn indexed(&self, op: BuiltinOp) -> BridgeResult<BV> {
        self.0.apply(op, &[]).map(BV::unchecked)
    }

    /// The integer value, unsigned or two's complement.
    pub fn to_int(&self, signed: bool) -> BridgeResult<Int> {
        self.0
            .apply(BuiltinOp::Bv2Int { signed }, &[])
            .map(Int::unchecked)
    }

    // -- numeric access -----------------------------------------------------

    /// Signed (two's complement) value.
    pub fn as_i64(&self) -> BridgeResult<NumeralValue<i64>> {
        let width = self.width()?;
        numeral::bv_to_i64(&self.0, width)
    }

    /// Unsigned value.
    pub fn as_u64(&self) -> BridgeResult<NumeralValue<u64>> {
        numeral::to_u64(&self.0)
    }

    /// Signed (two's complement) value, exact.
    pub fn as_big_int(&self) -> BridgeResult<NumeralValue<BigInt>> {
        let width = self.width()?;
        numeral::to_big_int(&self.0, Some(width))
    }

    /// Unsigned value, exact.
    pub fn as_big_uint(&self) -> BridgeResult<NumeralValue<BigUint>> {
        Ok(numeral::to_big_int(&self.0, None)?.map(|value| value.to_biguint().unwrap_or_default()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_traits::One;

    use crate::native::ErrorCode;
    use crate::session::Session;

    #[test]
    fn narrow_vectors_read_signed() {
        let session = Session::default_session();
        let all_ones = session.bv(15, 4).unwrap();
        assert_eq!(all_ones.as_i64().unwrap(), NumeralValue::Value(-1));
        assert_eq!(all_ones.as_u64().unwrap(), NumeralValue::Value(15));
        assert_eq!(all_ones.as_big_int().unwrap(), NumeralValue::Value(BigInt::from(-1)));
        assert_eq!(all_ones.to_string(), "#xf");
    }

    #[test]
    fn negative_literals_wrap() {
        let session = Session::default_session();
        let minus_two = session.bv(-2, 8).unwrap();
        assert_eq!(minus_two.as_u64().unwrap(), NumeralValue::Value(254));
        assert_eq!(minus_two.as_i64().unwrap(), NumeralValue::Value(-2));
    }

    #[test]
    fn wide_vectors_never_wrap() {
        let session = Session::default_session();
        let boundary = BigInt::one() << 63u32;

        let bv64 = session.bv_sort(64).unwrap();
        let at_64 = BV::try_from(session.from_big_int(&boundary, &bv64).unwrap()).unwrap();
        assert_eq!(at_64.as_i64().unwrap(), NumeralValue::Value(i64::MIN));

        let bv65 = session.bv_sort(65).unwrap();
        let at_65 = BV::try_from(session.from_big_int(&boundary, &bv65).unwrap()).unwrap();
        assert_eq!(at_65.as_i64().unwrap(), NumeralValue::DoesNotFit);
        assert_eq!(at_65.as_big_int().unwrap(), NumeralValue::Value(boundary.clone()));
        assert_eq!(
            at_65.as_big_uint().unwrap(),
            NumeralValue::Value(BigUint::one() << 63u32)
        );
    }

    #[test]
    fn structural_operators() {
        let session = Session::default_session();
        let a = session.bv_const("a", 8).unwrap();
        let b = session.bv_const("b", 4).unwrap();
        assert_eq!(a.concat(&b).unwrap().width().unwrap(), 12);
        assert_eq!(a.extract(3, 0).unwrap().width().unwrap(), 4);
        assert_eq!(a.zero_ext(8).unwrap().width().unwrap(), 16);
        assert_eq!(b.repeat(3).unwrap().width().unwrap(), 12);
        assert_eq!(a.extract(3, 0).unwrap().to_string(), "((_ extract 3 0) a)");
        assert!(a.extract(8, 0).is_err());
        assert!(a.add(&b).is_err());
    }

    #[test]
    fn folding_respects_width() {
        let session = Session::default_session();
        let x = session.bv(200, 8).unwrap();
        let y = session.bv(100, 8).unwrap();
        let sum = x.add(&y).unwrap().simplify().unwrap();
        assert_eq!(sum.as_u64().unwrap(), NumeralValue::Value(44));
        let signed = session.bv(-3, 8).unwrap().to_int(true).unwrap().simplify().unwrap();
        assert_eq!(signed.as_i64().unwrap(), NumeralValue::Value(-3));
    }

    #[test]
    fn reductions_and_negated_logic_fold() {
        let session = Session::default_session();
        let a = session.bv(0b1100, 4).unwrap();
        let b = session.bv(0b1010, 4).unwrap();
        let fold = |t: BV| t.simplify().unwrap().as_u64().unwrap();
        assert_eq!(fold(a.nand(&b).unwrap()), NumeralValue::Value(0b0111));
        assert_eq!(fold(a.nor(&b).unwrap()), NumeralValue::Value(0b0001));
        assert_eq!(fold(a.xnor(&b).unwrap()), NumeralValue::Value(0b1001));

        let ones = session.bv(-1, 4).unwrap();
        assert_eq!(fold(ones.all_bits().unwrap()), NumeralValue::Value(1));
        assert_eq!(fold(a.all_bits().unwrap()), NumeralValue::Value(0));
        assert_eq!(fold(a.any_bits().unwrap()), NumeralValue::Value(1));
        assert_eq!(fold(session.bv(0, 4).unwrap().any_bits().unwrap()), NumeralValue::Value(0));

        let x = session.bv_const("x", 16).unwrap();
        assert_eq!(x.all_bits().unwrap().width().unwrap(), 1);
        assert_eq!(x.any_bits().unwrap().to_string(), "(bvredor x)");
    }

    #[test]
    fn rotations_wrap_around() {
        let session = Session::default_session();
        let a = session.bv(0b1001_0110, 8).unwrap();
        let fold = |t: BV| t.simplify().unwrap().as_u64().unwrap();
        let three = session.bv(3, 8).unwrap();
        assert_eq!(fold(a.rotate_left(&three).unwrap()), NumeralValue::Value(0b1011_0100));
        assert_eq!(fold(a.rotate_right(&three).unwrap()), NumeralValue::Value(0b1101_0010));
        // Amounts are taken modulo the width.
        let eleven = session.bv(11, 8).unwrap();
        assert_eq!(fold(a.rotate_left(&eleven).unwrap()), NumeralValue::Value(0b1011_0100));
        let zero = session.bv(0, 8).unwrap();
        assert_eq!(fold(a.rotate_right(&zero).unwrap()), NumeralValue::Value(0b1001_0110));

        let x = session.bv_const("x", 8).unwrap();
        assert_eq!(
            x.rotate_left(&three).unwrap().to_string(),
            "(ext_rotate_left x #x03)"
        );
        assert!(x.rotate_left(&session.bv(1, 4).unwrap()).is_err());
    }

    #[test]
    fn width_overflow_is_reported_not_wrapped() {
        let session = Session::default_session();
        let a = session.bv_const("a", 8).unwrap();
        for result in [
            a.zero_ext(u32::MAX - 3),
            a.sign_ext(u32::MAX),
            a.repeat(u32::MAX),
        ] {
            let err = result.unwrap_err();
            assert_eq!(err.native_code(), Some(ErrorCode::InvalidArg));
            assert!(err.to_string().contains("width overflows"));
        }
        let wide = session.bv_const("w", u32::MAX).unwrap();
        let err = wide.concat(&a).unwrap_err();
        assert_eq!(err.native_code(), Some(ErrorCode::InvalidArg));

        // The session and its lock survive the failures.
        assert_eq!(a.zero_ext(8).unwrap().width().unwrap(), 16);
        assert_eq!(a.concat(&a).unwrap().width().unwrap(), 16);
    }
}
