//! Real terms, including irrational algebraic numbers.

use num_rational::BigRational;

use crate::error::BridgeResult;
use crate::expr::Expr;
use crate::native::{AstKind, BuiltinOp, SortKind};
use crate::numeral::{self, NumeralValue};
use crate::terms::{Bool, Int};

term_type!(
    /// A term of sort `Real`.
    Real,
    Real,
    SortKind::Real
);

impl Real {
    unary_ops! {
        neg => BuiltinOp::Neg, Real;
        /// Largest integer not greater than `self`.
        to_int => BuiltinOp::ToInt, Int;
        is_int => BuiltinOp::IsInt, Bool;
    }

    binary_ops! {
        add => BuiltinOp::Add, Real;
        sub => BuiltinOp::Sub, Real;
        mul => BuiltinOp::Mul, Real;
        div => BuiltinOp::Div, Real;
        power => BuiltinOp::Power, Real;
        lt => BuiltinOp::Lt, Bool;
        le => BuiltinOp::Le, Bool;
        gt => BuiltinOp::Gt, Bool;
        ge => BuiltinOp::Ge, Bool;
    }

    /// Numerator and denominator of a rational numeral, in lowest terms.
    pub fn as_rat(&self) -> BridgeResult<Option<(Int, Int)>> {
        let raw = self.0.raw();
        let session = self.0.session();
        let parts = session.transaction(|call| {
            if call.run(|e| e.get_ast_kind(raw))? != AstKind::Numeral {
                return Ok(None);
            }
            let numer = call.create(|e| e.get_numerator(raw))?;
            let denom = call.create(|e| e.get_denominator(raw))?;
            Ok(Some((numer, denom)))
        })?;
        Ok(parts.map(|(numer, denom)| {
            (
                Int::unchecked(Expr::from_handle(numer.into_handle(session))),
                Int::unchecked(Expr::from_handle(denom.into_handle(session))),
            )
        }))
    }

    pub fn as_big_rational(&self) -> BridgeResult<NumeralValue<BigRational>> {
        numeral::to_big_rational(&self.0)
    }

    /// Whether this is an irrational algebraic number such as `2^(1/2)`.
    pub fn is_algebraic(&self) -> BridgeResult<bool> {
        let raw = self.0.raw();
        self.0.session().with_lock(|e| e.is_algebraic_number(raw))
    }

    /// Decimal bounds `(lower, upper)` of an algebraic number with
    /// `precision` digits after the point; `None` for any other term.
    pub fn approx(&self, precision: u32) -> BridgeResult<Option<(Real, Real)>> {
        let raw = self.0.raw();
        let session = self.0.session();
        let bounds = session.transaction(|call| {
            if !call.run(|e| e.is_algebraic_number(raw))? {
                return Ok(None);
            }
            let lower = call.create(|e| e.get_algebraic_number_lower(raw, precision))?;
            let upper = call.create(|e| e.get_algebraic_number_upper(raw, precision))?;
            Ok(Some((lower, upper)))
        })?;
        Ok(bounds.map(|(lower, upper)| {
            (
                Real::unchecked(Expr::from_handle(lower.into_handle(session))),
                Real::unchecked(Expr::from_handle(upper.into_handle(session))),
            )
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use num_bigint::BigInt;

    use crate::session::Session;
    use crate::terms::Term;

    fn rat(n: i64, d: i64) -> BigRational {
        BigRational::new(BigInt::from(n), BigInt::from(d))
    }

    #[test]
    fn rational_parts_are_reduced() {
        let session = Session::default_session();
        let q = session.real(10, 8).unwrap();
        let (numer, denom) = q.as_rat().unwrap().unwrap();
        assert_eq!(numer.as_i64().unwrap(), NumeralValue::Value(5));
        assert_eq!(denom.as_i64().unwrap(), NumeralValue::Value(4));
        assert_eq!(q.as_big_rational().unwrap(), NumeralValue::Value(rat(5, 4)));
        assert_eq!(q.to_string(), "(/ 5.0 4.0)");
    }

    #[test]
    fn symbolic_reals_have_no_parts() {
        let session = Session::default_session();
        let y = session.real_const("y").unwrap();
        assert!(y.as_rat().unwrap().is_none());
        assert!(y.approx(5).unwrap().is_none());
        assert_eq!(y.as_big_rational().unwrap(), NumeralValue::NotANumeral);
    }

    #[test]
    fn square_root_of_two_is_algebraic() {
        let session = Session::default_session();
        let two = session.real(2, 1).unwrap();
        let half = session.real(1, 2).unwrap();
        let root = two.power(&half).unwrap().simplify().unwrap();
        assert!(root.is_algebraic().unwrap());
        assert!(root.as_rat().unwrap().is_none());

        let (lower, upper) = root.approx(4).unwrap().unwrap();
        assert_eq!(lower.as_big_rational().unwrap(), NumeralValue::Value(rat(14142, 10000)));
        assert_eq!(upper.as_big_rational().unwrap(), NumeralValue::Value(rat(14143, 10000)));
    }

    #[test]
    fn perfect_powers_fold_to_rationals() {
        let session = Session::default_session();
        let base = session.real(9, 4).unwrap();
        let half = session.real(1, 2).unwrap();
        let root = base.power(&half).unwrap().simplify().unwrap();
        assert!(!root.is_algebraic().unwrap());
        assert_eq!(root.as_big_rational().unwrap(), NumeralValue::Value(rat(3, 2)));
    }
}
