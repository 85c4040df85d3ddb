//! Satisfying assignments.

use std::fmt;

use crate::error::BridgeResult;
use crate::expr::Expr;
use crate::handle::Handle;
use crate::lift::{self, Dynamic};
use crate::native::RawModel;
use crate::session::Session;
use crate::terms::Term;

/// An assignment produced by a successful [`Solver::check`](crate::solver::Solver::check).
#[derive(Clone)]
pub struct Model {
    handle: Handle<RawModel>,
}

impl Model {
    pub(crate) fn from_handle(handle: Handle<RawModel>) -> Self {
        Self { handle }
    }

    pub fn raw(&self) -> RawModel {
        self.handle.raw()
    }

    pub fn session(&self) -> &Session {
        self.handle.session()
    }

    /// Evaluate `expr` under this model.
    ///
    /// With `completion`, symbols the model leaves open get a default
    /// value; without it they stay symbolic. `None` when the engine cannot
    /// evaluate the term at all.
    pub fn eval(&self, expr: &Expr, completion: bool) -> BridgeResult<Option<Dynamic>> {
        let session = self.session();
        session.ensure_same(expr.session())?;
        let (model, raw) = (self.raw(), expr.raw());
        let owned = session.transaction(|call| {
            let Some(value) = call.run(|e| e.model_eval(model, raw, completion))? else {
                return Ok(None);
            };
            call.adopt(value).map(Some)
        })?;
        match owned {
            Some(owned) => {
                let value = Expr::from_handle(owned.into_handle(session));
                lift::lift(value, None).map(Some)
            }
            None => Ok(None),
        }
    }

    /// Evaluate a typed term, keeping its type.
    pub fn eval_term<T: Term>(&self, term: &T, completion: bool) -> BridgeResult<Option<T>> {
        match self.eval(term.expr(), completion)? {
            Some(value) => value.try_into().map(Some),
            None => Ok(None),
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let raw = self.raw();
        match self.session().with_lock(|e| e.model_to_string(raw)) {
            Ok(text) => f.write_str(&text),
            Err(err) => write!(f, "<{err}>"),
        }
    }
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Model(#{})", self.raw().get())
    }
}
