//! Optimization: hard constraints, weighted soft constraints and objectives.

use std::fmt;

use crate::error::BridgeResult;
use crate::expr::Expr;
use crate::handle::Handle;
use crate::lift::Dynamic;
use crate::log;
use crate::model::Model;
use crate::native::{LBool, RawOptimize};
use crate::session::Session;
use crate::solver::SatResult;
use crate::terms::{Bool, Term};

/// Weight and group of a soft constraint.
///
/// The weight is the penalty for violating the constraint. Constraints
/// with the same id form one objective.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoftOptions {
    weight: String,
    id: String,
}

impl Default for SoftOptions {
    fn default() -> Self {
        Self {
            weight: "1".to_string(),
            id: String::new(),
        }
    }
}

impl SoftOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Any integer, decimal or `p/q` rendering is accepted.
    pub fn weight(mut self, weight: impl fmt::Display) -> Self {
        self.weight = weight.to_string();
        self
    }

    pub fn id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

/// A set of constraints and objectives with push/pop scopes.
///
/// Objectives are ranked lexicographically in the order they were added,
/// soft constraint groups included.
#[derive(Clone)]
pub struct Optimize {
    handle: Handle<RawOptimize>,
}

impl Optimize {
    pub(crate) fn from_handle(handle: Handle<RawOptimize>) -> Self {
        Self { handle }
    }

    pub fn raw(&self) -> RawOptimize {
        self.handle.raw()
    }

    pub fn session(&self) -> &Session {
        self.handle.session()
    }

    /// Add a hard constraint.
    pub fn assert(&self, formula: &Bool) -> BridgeResult<()> {
        self.session().ensure_same(formula.session())?;
        let (opt, raw) = (self.raw(), formula.expr().raw());
        self.session().with_lock(|e| e.optimize_assert(opt, raw))
    }

    /// Add a soft constraint and return the objective of its group.
    pub fn assert_soft(&self, formula: &Bool, options: &SoftOptions) -> BridgeResult<Objective> {
        let session = self.session();
        session.ensure_same(formula.session())?;
        let symbol = session.intern_symbol(&options.id)?;
        let (opt, raw) = (self.raw(), formula.expr().raw());
        let index =
            session.with_lock(|e| e.optimize_assert_soft(opt, raw, &options.weight, symbol))?;
        Ok(self.objective(index))
    }

    pub fn maximize(&self, term: &Expr) -> BridgeResult<Objective> {
        self.session().ensure_same(term.session())?;
        let (opt, raw) = (self.raw(), term.raw());
        let index = self.session().with_lock(|e| e.optimize_maximize(opt, raw))?;
        Ok(self.objective(index))
    }

    pub fn minimize(&self, term: &Expr) -> BridgeResult<Objective> {
        self.session().ensure_same(term.session())?;
        let (opt, raw) = (self.raw(), term.raw());
        let index = self.session().with_lock(|e| e.optimize_minimize(opt, raw))?;
        Ok(self.objective(index))
    }

    fn objective(&self, index: u32) -> Objective {
        Objective {
            optimize: self.clone(),
            index,
        }
    }

    pub fn push(&self) -> BridgeResult<()> {
        let opt = self.raw();
        self.session().with_lock(|e| e.optimize_push(opt))
    }

    /// Drop the innermost scope with its constraints and objectives.
    pub fn pop(&self) -> BridgeResult<()> {
        let opt = self.raw();
        self.session().with_lock(|e| e.optimize_pop(opt))
    }

    /// Find an optimum of the current objectives.
    ///
    /// Like [`Solver::check`](crate::solver::Solver::check) this holds the
    /// session lock throughout and can be aborted with
    /// [`Session::interrupt`].
    pub fn check(&self) -> BridgeResult<SatResult> {
        let opt = self.raw();
        let verdict = self.session().with_lock(|e| e.optimize_check(opt))?;
        let result = match verdict {
            LBool::True => SatResult::Sat,
            LBool::False => SatResult::Unsat,
            LBool::Undef => SatResult::Unknown,
        };
        tracing::debug!(session = self.session().id(), %result, "optimize check finished");
        log::append(&format!("session {} optimize check: {result}", self.session().id()));
        Ok(result)
    }

    /// The model of the last `Sat` check.
    pub fn model(&self) -> BridgeResult<Model> {
        let opt = self.raw();
        let session = self.session();
        let owned = session.transaction(|call| call.create(|e| e.optimize_get_model(opt)))?;
        Ok(Model::from_handle(owned.into_handle(session)))
    }

    pub fn reason_unknown(&self) -> BridgeResult<String> {
        let opt = self.raw();
        self.session().with_lock(|e| e.optimize_get_reason_unknown(opt))
    }
}

impl fmt::Display for Optimize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.raw();
        match self.session().with_lock(|e| e.optimize_to_string(raw)) {
            Ok(text) => f.write_str(&text),
            Err(err) => write!(f, "<{err}>"),
        }
    }
}

impl fmt::Debug for Optimize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Optimize(#{})", self.raw().get())
    }
}

/// One objective of an [`Optimize`], readable after a `Sat` check.
#[derive(Debug, Clone)]
pub struct Objective {
    optimize: Optimize,
    index: u32,
}

impl Objective {
    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn lower(&self) -> BridgeResult<Dynamic> {
        let (opt, index) = (self.optimize.raw(), self.index);
        self.optimize
            .session()
            .term_from(|e| e.optimize_get_lower(opt, index))?
            .lift()
    }

    pub fn upper(&self) -> BridgeResult<Dynamic> {
        let (opt, index) = (self.optimize.raw(), self.index);
        self.optimize
            .session()
            .term_from(|e| e.optimize_get_upper(opt, index))?
            .lift()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::native::ErrorCode;
    use crate::numeral::NumeralValue;
    use crate::terms::Int;

    #[test]
    fn objectives_are_ranked_in_order() {
        let session = Session::default_session();
        let x = session.int_const("x").unwrap();
        let y = session.int_const("y").unwrap();
        let zero = session.int(0).unwrap();
        let ten = session.int(10).unwrap();
        let eleven = session.int(11).unwrap();

        let opt = session.optimize().unwrap();
        opt.assert(&ten.ge(&x).unwrap().and(&x.ge(&zero).unwrap()).unwrap()).unwrap();
        opt.assert(&ten.ge(&y).unwrap().and(&y.ge(&zero).unwrap()).unwrap()).unwrap();
        opt.assert(&x.add(&y).unwrap().le(&eleven).unwrap()).unwrap();
        let first = opt.maximize(x.expr()).unwrap();
        let second = opt.maximize(y.expr()).unwrap();
        assert_eq!((first.index(), second.index()), (0, 1));

        assert_eq!(opt.check().unwrap(), SatResult::Sat);
        let x_best = Int::try_from(first.lower().unwrap()).unwrap();
        let y_best = Int::try_from(second.upper().unwrap()).unwrap();
        assert_eq!(x_best.as_i64().unwrap(), NumeralValue::Value(10));
        assert_eq!(y_best.as_i64().unwrap(), NumeralValue::Value(1));
        assert_eq!(first.upper().unwrap(), first.lower().unwrap());

        let model = opt.model().unwrap();
        let y_value = model.eval_term(&y, true).unwrap().unwrap();
        assert_eq!(y_value.as_i64().unwrap(), NumeralValue::Value(1));
    }

    #[test]
    fn soft_constraints_trade_off_by_weight() {
        let session = Session::default_session();
        let a = session.bool_const("a").unwrap();
        let b = session.bool_const("b").unwrap();
        let c = session.bool_const("c").unwrap();

        let opt = session.optimize().unwrap();
        let group_a = opt.assert_soft(&a, &SoftOptions::new().weight(1).id("A")).unwrap();
        let group_b = opt.assert_soft(&b, &SoftOptions::new().weight(2).id("B")).unwrap();
        let again_a = opt.assert_soft(&c, &SoftOptions::new().weight(3).id("A")).unwrap();
        assert_eq!(group_a.index(), again_a.index());
        assert_ne!(group_a.index(), group_b.index());
        opt.assert(&a.iff(&c).unwrap()).unwrap();
        opt.assert(&a.and(&b).unwrap().not().unwrap()).unwrap();

        assert_eq!(opt.check().unwrap(), SatResult::Sat);
        let model = opt.model().unwrap();
        let value = |p: &Bool| model.eval_term(p, false).unwrap().unwrap().as_bool().unwrap();
        assert_eq!(value(&a), Some(true));
        assert_eq!(value(&b), Some(false));
        assert_eq!(value(&c), Some(true));

        let penalty_b = Int::try_from(group_b.lower().unwrap()).unwrap();
        assert_eq!(penalty_b.as_i64().unwrap(), NumeralValue::Value(2));
        let penalty_a = Int::try_from(group_a.lower().unwrap()).unwrap();
        assert_eq!(penalty_a.as_i64().unwrap(), NumeralValue::Value(0));
    }

    #[test]
    fn scopes_retract_objectives() {
        let session = Session::default_session();
        let x = session.int_const("x").unwrap();
        let zero = session.int(0).unwrap();
        let five = session.int(5).unwrap();
        let opt = session.optimize().unwrap();
        opt.assert(&x.ge(&zero).unwrap()).unwrap();
        opt.assert(&x.le(&five).unwrap()).unwrap();
        let low = opt.minimize(x.expr()).unwrap();

        opt.push().unwrap();
        opt.assert(&x.gt(&five).unwrap()).unwrap();
        assert_eq!(opt.check().unwrap(), SatResult::Unknown);
        assert_eq!(opt.reason_unknown().unwrap(), "no model within the search horizon");
        assert!(opt.model().is_err());
        opt.pop().unwrap();

        assert_eq!(opt.check().unwrap(), SatResult::Sat);
        let best = Int::try_from(low.lower().unwrap()).unwrap();
        assert_eq!(best.as_i64().unwrap(), NumeralValue::Value(0));
        assert_eq!(opt.pop().unwrap_err().native_code(), Some(ErrorCode::InvalidUsage));
    }

    #[test]
    fn bad_inputs_are_rejected() {
        let session = Session::default_session();
        let p = session.bool_const("p").unwrap();
        let opt = session.optimize().unwrap();
        let err = opt.maximize(p.expr()).unwrap_err();
        assert_eq!(err.native_code(), Some(ErrorCode::SortError));
        let err = opt
            .assert_soft(&p, &SoftOptions::new().weight("lots"))
            .unwrap_err();
        assert_eq!(err.native_code(), Some(ErrorCode::InvalidArg));

        let fine = opt.assert_soft(&p, &SoftOptions::new().weight(2.5)).unwrap();
        assert_eq!(
            opt.to_string(),
            "(assert-soft p :weight 5/2 :id default)\n"
        );
        // Bounds exist only after a sat check.
        assert!(fine.lower().is_err());
        assert_eq!(SoftOptions::default(), SoftOptions::new().weight(1).id(""));
    }
}
