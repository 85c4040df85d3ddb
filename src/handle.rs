//! Refcounted proxies for native objects.
//!
//! A [`Handle`] owns exactly one native reference: the count is incremented
//! when the handle is created and decremented when it is dropped, both under
//! the owning session's lock. Two handles may wrap the same native id; each
//! carries its own increment.

use std::fmt;

use crate::error::BridgeResult;
use crate::native::{NativeEngine, RawAst, RawFuncDecl, RawModel, RawOptimize, RawSolver, RawSort};
use crate::session::Session;

/// A native identifier whose lifetime is governed by a reference count.
pub trait NativeRef: Copy + Eq + fmt::Debug + Send + Sync + 'static {
    /// Short name of the object kind, used in logs and errors.
    const KIND: &'static str;

    fn id(self) -> u32;

    fn is_null(self) -> bool {
        self.id() == 0
    }

    /// Add one native reference.
    fn inc(self, engine: &mut dyn NativeEngine);

    /// Remove one native reference.
    fn dec(self, engine: &mut dyn NativeEngine);
}

impl NativeRef for RawAst {
    const KIND: &'static str = "ast";

    fn id(self) -> u32 {
        self.get()
    }

    fn inc(self, engine: &mut dyn NativeEngine) {
        engine.inc_ref(self);
    }

    fn dec(self, engine: &mut dyn NativeEngine) {
        engine.dec_ref(self);
    }
}

// Sorts and declarations are asts on the native side and share their counts.

impl NativeRef for RawSort {
    const KIND: &'static str = "sort";

    fn id(self) -> u32 {
        self.get()
    }

    fn inc(self, engine: &mut dyn NativeEngine) {
        let ast = engine.sort_to_ast(self);
        engine.inc_ref(ast);
    }

    fn dec(self, engine: &mut dyn NativeEngine) {
        let ast = engine.sort_to_ast(self);
        engine.dec_ref(ast);
    }
}

impl NativeRef for RawFuncDecl {
    const KIND: &'static str = "func_decl";

    fn id(self) -> u32 {
        self.get()
    }

    fn inc(self, engine: &mut dyn NativeEngine) {
        let ast = engine.func_decl_to_ast(self);
        engine.inc_ref(ast);
    }

    fn dec(self, engine: &mut dyn NativeEngine) {
        let ast = engine.func_decl_to_ast(self);
        engine.dec_ref(ast);
    }
}

impl NativeRef for RawModel {
    const KIND: &'static str = "model";

    fn id(self) -> u32 {
        self.get()
    }

    fn inc(self, engine: &mut dyn NativeEngine) {
        engine.model_inc_ref(self);
    }

    fn dec(self, engine: &mut dyn NativeEngine) {
        engine.model_dec_ref(self);
    }
}

impl NativeRef for RawSolver {
    const KIND: &'static str = "solver";

    fn id(self) -> u32 {
        self.get()
    }

    fn inc(self, engine: &mut dyn NativeEngine) {
        engine.solver_inc_ref(self);
    }

    fn dec(self, engine: &mut dyn NativeEngine) {
        engine.solver_dec_ref(self);
    }
}

impl NativeRef for RawOptimize {
    const KIND: &'static str = "optimize";

    fn id(self) -> u32 {
        self.get()
    }

    fn inc(self, engine: &mut dyn NativeEngine) {
        engine.optimize_inc_ref(self);
    }

    fn dec(self, engine: &mut dyn NativeEngine) {
        engine.optimize_dec_ref(self);
    }
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// One owned native reference plus a strong reference to its session.
///
/// The session cannot be torn down while any handle is alive, so the
/// decrement in `Drop` always has an engine to run against.
pub struct Handle<R: NativeRef> {
    session: Session,
    raw: R,
}

impl<R: NativeRef> Handle<R> {
    /// Take a new reference to `raw`. Wrapping the same id repeatedly is
    /// fine: every wrap is an independent increment/decrement pair.
    pub fn wrap(session: &Session, raw: R) -> BridgeResult<Self> {
        let owned = session.transaction(|call| call.adopt(raw))?;
        Ok(owned.into_handle(session))
    }

    /// Build a handle for a reference that was already incremented.
    pub(crate) fn adopted(session: Session, raw: R) -> Self {
        tracing::trace!(kind = R::KIND, id = raw.id(), "adopted native reference");
        Self { session, raw }
    }

    pub fn raw(&self) -> R {
        self.raw
    }

    pub fn session(&self) -> &Session {
        &self.session
    }
}

impl<R: NativeRef> Clone for Handle<R> {
    fn clone(&self) -> Self {
        self.session.retain(self.raw);
        Self {
            session: self.session.clone(),
            raw: self.raw,
        }
    }
}

impl<R: NativeRef> Drop for Handle<R> {
    fn drop(&mut self) {
        self.session.release(self.raw);
    }
}

impl<R: NativeRef> fmt::Debug for Handle<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle<{}>(#{}, session {})", R::KIND, self.raw.id(), self.session.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terms::Term;

    #[test]
    fn wrapping_repeatedly_balances_counts() {
        let session = Session::default_session();
        let x = session.int_const("x").unwrap();
        let raw = x.expr().raw();
        let _ = session.bool_sort().unwrap();
        let before = session.live_object_count().unwrap();

        let wrappers: Vec<_> = (0..8).map(|_| Handle::wrap(&session, raw).unwrap()).collect();
        assert_eq!(session.live_object_count().unwrap(), before);
        drop(wrappers);

        assert_eq!(session.live_object_count().unwrap(), before);
        // The original wrapper is still valid.
        assert_eq!(x.to_string(), "x");
    }

    #[test]
    fn clone_takes_its_own_reference() {
        let session = Session::default_session();
        let x = session.int_const("x").unwrap();
        let raw = x.expr().raw();
        let copy = x.clone();
        drop(x);
        let _ = session.bool_sort().unwrap();
        assert_eq!(copy.expr().raw(), raw);
        assert_eq!(copy.to_string(), "x");
    }

    #[test]
    fn wrapping_an_unknown_id_fails() {
        let session = Session::default_session();
        let err = Handle::wrap(&session, RawAst::from_raw(9_999)).unwrap_err();
        assert!(err.native_code().is_some());
    }
}
