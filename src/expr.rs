//! The untyped term handle.
//!
//! [`Expr`] is the one handle type every typed term variant wraps. Equality
//! and hashing go through the engine, so two independently built handles
//! for structurally identical terms compare equal and hash alike.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::ast::Ast;
use crate::error::BridgeResult;
use crate::handle::Handle;
use crate::lift::{self, Dynamic};
use crate::native::{AstKind, BuiltinOp, RawAst, SortKind};
use crate::session::Session;
use crate::sort::Sort;
use crate::terms::Bool;

/// A term of any sort.
#[derive(Clone)]
pub struct Expr {
    handle: Handle<RawAst>,
}

impl Expr {
    pub(crate) fn from_handle(handle: Handle<RawAst>) -> Self {
        Self { handle }
    }

    /// Take a new reference to an existing native term.
    pub fn wrap(session: &Session, raw: RawAst) -> BridgeResult<Self> {
        Handle::wrap(session, raw).map(Self::from_handle)
    }

    pub fn raw(&self) -> RawAst {
        self.handle.raw()
    }

    pub fn session(&self) -> &Session {
        self.handle.session()
    }

    pub fn handle(&self) -> &Handle<RawAst> {
        &self.handle
    }

    /// The generic ast view of this term.
    pub fn as_ast(&self) -> Ast {
        Ast::from_handle(self.handle.clone())
    }

    // -- inspection ---------------------------------------------------------

    pub fn sort(&self) -> BridgeResult<Sort> {
        let raw = self.raw();
        self.session().sort_from(|e| e.get_sort(raw))
    }

    /// Category of this term's sort, queried from the engine.
    pub fn sort_kind(&self) -> BridgeResult<SortKind> {
        let raw = self.raw();
        self.session().transaction(|call| {
            let sort = call.run(|e| e.get_sort(raw))?;
            let tag = call.run(|e| e.get_sort_kind(sort))?;
            Ok(SortKind::from_raw(tag))
        })
    }

    pub fn ast_kind(&self) -> BridgeResult<AstKind> {
        let raw = self.raw();
        self.session().with_lock(|e| e.get_ast_kind(raw))
    }

    /// Whether this term is a concrete numeral.
    pub fn is_numeral(&self) -> BridgeResult<bool> {
        Ok(self.ast_kind()? == AstKind::Numeral)
    }

    /// Structural equality, decided by the engine.
    pub fn is_eq(&self, other: &Expr) -> BridgeResult<bool> {
        self.session().ensure_same(other.session())?;
        let (a, b) = (self.raw(), other.raw());
        self.session().with_lock(|e| e.is_eq_ast(a, b))
    }

    /// Structural hash, computed by the engine.
    pub fn ast_hash(&self) -> BridgeResult<u32> {
        let raw = self.raw();
        self.session().with_lock(|e| e.get_ast_hash(raw))
    }

    /// Engine-assigned identifier, unique among live terms.
    pub fn ast_id(&self) -> BridgeResult<u32> {
        let raw = self.raw();
        self.session().with_lock(|e| e.get_ast_id(raw))
    }

    pub fn to_smt_string(&self) -> BridgeResult<String> {
        let raw = self.raw();
        self.session().with_lock(|e| e.ast_to_string(raw))
    }

    // -- conversion ---------------------------------------------------------

    /// Classify this term into its typed variant.
    pub fn lift(self) -> BridgeResult<Dynamic> {
        lift::lift(self, None)
    }

    /// Canonical simplified form, lifted.
    pub fn simplify(&self) -> BridgeResult<Dynamic> {
        let raw = self.raw();
        self.session().term_from(|e| e.simplify(raw))?.lift()
    }

    // -- operators shared by every category ---------------------------------

    /// `self = other`.
    pub fn equals(&self, other: &Expr) -> BridgeResult<Bool> {
        self.apply(BuiltinOp::Eq, &[other]).map(Bool::unchecked)
    }

    /// `self != other`.
    pub fn not_equals(&self, other: &Expr) -> BridgeResult<Bool> {
        self.apply(BuiltinOp::Distinct, &[other]).map(Bool::unchecked)
    }

    /// Apply a builtin operator with `self` as the first argument.
    pub(crate) fn apply(&self, op: BuiltinOp, rest: &[&Expr]) -> BridgeResult<Expr> {
        let mut args = Vec::with_capacity(rest.len() + 1);
        args.push(self.raw());
        for expr in rest {
            self.session().ensure_same(expr.session())?;
            args.push(expr.raw());
        }
        self.session().term_from(|e| e.mk_op(op, &args))
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.is_eq(other).unwrap_or(false)
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u32(self.ast_hash().unwrap_or_default());
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.to_smt_string() {
            Ok(text) => f.write_str(&text),
            Err(err) => write!(f, "<{err}>"),
        }
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Expr(#{}: {self})", self.raw().get())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use crate::terms::Term;

    #[test]
    fn separately_built_terms_are_equal() {
        let session = Session::default_session();
        let x = session.int_const("x").unwrap();
        let one = session.int(1).unwrap();
        let a = x.expr().apply(BuiltinOp::Add, &[one.expr()]).unwrap();
        let b = x.expr().apply(BuiltinOp::Add, &[one.expr()]).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.ast_hash().unwrap(), b.ast_hash().unwrap());
        assert_eq!(a.ast_id().unwrap(), b.ast_id().unwrap());

        let set: HashSet<Expr> = [a, b].into_iter().collect();
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn terms_render_in_smt_syntax() {
        let session = Session::default_session();
        let x = session.int_const("x").unwrap();
        let two = session.int(2).unwrap();
        let sum = x.expr().apply(BuiltinOp::Add, &[two.expr()]).unwrap();
        assert_eq!(sum.to_string(), "(+ x 2)");
        assert!(!sum.is_numeral().unwrap());
        assert!(two.expr().is_numeral().unwrap());
    }

    #[test]
    fn sort_kind_comes_from_the_engine() {
        let session = Session::default_session();
        let b = session.bv_const("b", 8).unwrap();
        assert_eq!(b.expr().sort_kind().unwrap(), SortKind::BV);
        assert_eq!(b.expr().sort().unwrap().to_string(), "(_ BitVec 8)");
    }

    #[test]
    fn ill_sorted_application_is_a_native_error() {
        let session = Session::default_session();
        let x = session.int_const("x").unwrap();
        let p = session.bool_const("p").unwrap();
        let err = x.expr().apply(BuiltinOp::Add, &[p.expr()]).unwrap_err();
        assert_eq!(err.native_code(), Some(crate::native::ErrorCode::SortError));
    }
}
