//! Incremental satisfiability checking.

use std::fmt;

use crate::error::BridgeResult;
use crate::handle::Handle;
use crate::log;
use crate::model::Model;
use crate::native::{LBool, RawSolver};
use crate::session::Session;
use crate::terms::{Bool, Term};

/// Outcome of [`Solver::check`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SatResult {
    Sat,
    Unsat,
    /// The engine gave up; see [`Solver::reason_unknown`].
    Unknown,
}

impl fmt::Display for SatResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Sat => "sat",
            Self::Unsat => "unsat",
            Self::Unknown => "unknown",
        })
    }
}

/// A stack of assertions with push/pop scopes.
#[derive(Clone)]
pub struct Solver {
    handle: Handle<RawSolver>,
}

impl Solver {
    pub(crate) fn from_handle(handle: Handle<RawSolver>) -> Self {
        Self { handle }
    }

    pub fn raw(&self) -> RawSolver {
        self.handle.raw()
    }

    pub fn session(&self) -> &Session {
        self.handle.session()
    }

    pub fn assert(&self, formula: &Bool) -> BridgeResult<()> {
        self.session().ensure_same(formula.session())?;
        let (solver, raw) = (self.raw(), formula.expr().raw());
        self.session().with_lock(|e| e.solver_assert(solver, raw))
    }

    pub fn push(&self) -> BridgeResult<()> {
        let solver = self.raw();
        self.session().with_lock(|e| e.solver_push(solver))
    }

    /// Drop the `levels` innermost scopes and their assertions.
    pub fn pop(&self, levels: u32) -> BridgeResult<()> {
        let solver = self.raw();
        self.session().with_lock(|e| e.solver_pop(solver, levels))
    }

    pub fn num_scopes(&self) -> BridgeResult<u32> {
        let solver = self.raw();
        self.session().with_lock(|e| e.solver_get_num_scopes(solver))
    }

    /// Decide the current assertions.
    ///
    /// Blocks the session for the duration of the search. Another thread
    /// can abort it with [`Session::interrupt`], which makes this fail with
    /// an `Exception` error.
    pub fn check(&self) -> BridgeResult<SatResult> {
        let solver = self.raw();
        let verdict = self.session().with_lock(|e| e.solver_check(solver))?;
        let result = match verdict {
            LBool::True => SatResult::Sat,
            LBool::False => SatResult::Unsat,
            LBool::Undef => SatResult::Unknown,
        };
        tracing::debug!(session = self.session().id(), %result, "solver check finished");
        log::append(&format!("session {} solver check: {result}", self.session().id()));
        Ok(result)
    }

    /// The model of the last `Sat` check.
    pub fn model(&self) -> BridgeResult<Model> {
        let solver = self.raw();
        let session = self.session();
        let owned = session.transaction(|call| call.create(|e| e.solver_get_model(solver)))?;
        Ok(Model::from_handle(owned.into_handle(session)))
    }

    pub fn reason_unknown(&self) -> BridgeResult<String> {
        let solver = self.raw();
        self.session().with_lock(|e| e.solver_get_reason_unknown(solver))
    }
}

impl fmt::Display for Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.raw();
        match self.session().with_lock(|e| e.solver_to_string(raw)) {
            Ok(text) => f.write_str(&text),
            Err(err) => write!(f, "<{err}>"),
        }
    }
}

impl fmt::Debug for Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Solver(#{})", self.raw().get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeral::NumeralValue;

    #[test]
    fn satisfiable_constraints_produce_a_model() {
        let session = Session::default_session();
        let x = session.int_const("x").unwrap();
        let three = session.int(3).unwrap();
        let solver = session.solver().unwrap();
        solver.assert(&x.gt(&three).unwrap()).unwrap();
        assert_eq!(solver.check().unwrap(), SatResult::Sat);

        let model = solver.model().unwrap();
        let value = model.eval_term(&x, true).unwrap().unwrap();
        assert_eq!(value.as_i64().unwrap(), NumeralValue::Value(4));
        assert!(model.to_string().contains("(define-fun x () Int 4)"));
    }

    #[test]
    fn scopes_retract_assertions() {
        let session = Session::default_session();
        let p = session.bool_const("p").unwrap();
        let solver = session.solver().unwrap();
        solver.assert(&p).unwrap();
        solver.push().unwrap();
        solver.assert(&p.not().unwrap()).unwrap();
        assert_eq!(solver.num_scopes().unwrap(), 1);
        assert_eq!(solver.check().unwrap(), SatResult::Unsat);
        assert!(solver.model().is_err());

        solver.pop(1).unwrap();
        assert_eq!(solver.num_scopes().unwrap(), 0);
        assert_eq!(solver.check().unwrap(), SatResult::Sat);
        assert!(solver.pop(1).is_err());
    }

    #[test]
    fn assertions_render_as_smt() {
        let session = Session::default_session();
        let p = session.bool_const("p").unwrap();
        let solver = session.solver().unwrap();
        solver.assert(&p).unwrap();
        assert_eq!(solver.to_string(), "(assert p)\n");
        assert_eq!(SatResult::Unknown.to_string(), "unknown");
    }
}
