//! Boolean terms.

use crate::error::BridgeResult;
use crate::native::{BuiltinOp, LBool, SortKind};
use crate::terms::Term;

term_type!(
    /// A term of sort `Bool`.
    Bool,
    Bool,
    SortKind::Bool
);

impl Bool {
    unary_ops! {
        not => BuiltinOp::Not, Bool;
    }

    binary_ops! {
        and => BuiltinOp::And, Bool;
        or => BuiltinOp::Or, Bool;
        xor => BuiltinOp::Xor, Bool;
        implies => BuiltinOp::Implies, Bool;
        /// Logical equivalence.
        iff => BuiltinOp::Eq, Bool;
    }

    /// `if self then then_term else else_term`.
    pub fn ite<T: Term>(&self, then_term: &T, else_term: &T) -> BridgeResult<T> {
        let expr = self
            .0
            .apply(BuiltinOp::Ite, &[then_term.expr(), else_term.expr()])?;
        T::from_known(expr)
    }

    /// `Some` for the literals `true` and `false`, `None` for anything else.
    pub fn as_bool(&self) -> BridgeResult<Option<bool>> {
        let raw = self.0.raw();
        let value = self.0.session().with_lock(|e| e.get_bool_value(raw))?;
        Ok(match value {
            LBool::True => Some(true),
            LBool::False => Some(false),
            LBool::Undef => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::session::Session;
    use crate::terms::{Int, Term};

    #[test]
    fn literals_read_back() {
        let session = Session::default_session();
        assert_eq!(session.from_bool(true).unwrap().as_bool().unwrap(), Some(true));
        let p = session.bool_const("p").unwrap();
        assert_eq!(p.as_bool().unwrap(), None);
        assert_eq!(p.not().unwrap().to_string(), "(not p)");
    }

    #[test]
    fn ite_keeps_the_branch_category() {
        let session = Session::default_session();
        let p = session.bool_const("p").unwrap();
        let one = session.int(1).unwrap();
        let two = session.int(2).unwrap();
        let choice: Int = p.ite(&one, &two).unwrap();
        assert_eq!(choice.to_string(), "(ite p 1 2)");
    }

    #[test]
    fn simplify_decides_tautologies() {
        let session = Session::default_session();
        let p = session.bool_const("p").unwrap();
        let q = session.bool_const("q").unwrap();
        // (p and q and true) or false  ==  (and p q)
        let t = session.from_bool(true).unwrap();
        let f = session.from_bool(false).unwrap();
        let both = p.and(&q).unwrap().and(&t).unwrap().or(&f).unwrap();
        assert_eq!(both.simplify().unwrap().to_string(), "(and p q)");
        // q and not q  ==  false
        let clash = q.and(&q.not().unwrap()).unwrap().simplify().unwrap();
        assert_eq!(clash.as_bool().unwrap(), Some(false));
        // p => p  ==  true
        let taut = p.implies(&p).unwrap().simplify().unwrap();
        assert_eq!(taut.as_bool().unwrap(), Some(true));
    }
}
