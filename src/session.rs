//! One logical connection to a native engine.
//!
//! Every native call goes through [`Session::with_lock`] (or
//! [`Session::transaction`] for several calls in one critical section).
//! The error register is read while the lock is still held, the guard is
//! dropped, and only then is a failure returned to the caller.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;
use num_bigint::BigInt;
use num_rational::BigRational;

use crate::config::SessionConfig;
use crate::engine::{Engine, EngineSettings};
use crate::error::{BridgeResult, NativeEngineError, SessionError};
use crate::expr::Expr;
use crate::func_decl::FuncDecl;
use crate::handle::{Handle, NativeRef};
use crate::lift::{self, Dynamic};
use crate::log;
use crate::native::{
    BuiltinOp, ErrorCode, Interrupt, NativeEngine, RawAst, RawSort, RawSymbol, SortKind,
};
use crate::optimize::Optimize;
use crate::solver::Solver;
use crate::sort::Sort;
use crate::terms::{Array, BV, Bool, Int, Real, Term};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

struct SessionInner {
    id: u64,
    engine: Mutex<Box<dyn NativeEngine>>,
    symbols: DashMap<String, RawSymbol>,
    interrupter: Arc<dyn Interrupt>,
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        tracing::info!(session = self.id, "session closed");
        log::append(&format!("session {} closed", self.id));
    }
}

/// A shared, thread-safe connection to one engine instance.
///
/// Cloning a `Session` is cheap and yields another reference to the same
/// connection. The engine is released when the last clone and the last
/// handle created through it are gone.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.inner.id)
            .field("symbols", &self.inner.symbols.len())
            .finish()
    }
}

/// Read the error register, turning a non-ok code into an error value.
fn register_error(engine: &dyn NativeEngine) -> Option<NativeEngineError> {
    let code = engine.error_code();
    if code == ErrorCode::Ok {
        return None;
    }
    Some(NativeEngineError {
        code,
        message: engine.error_message(code),
    })
}

/// A reference taken inside a critical section.
///
/// It becomes a [`Handle`] once the lock is released. Handles are never
/// created while the lock is held: dropping one there would deadlock.
#[must_use]
#[derive(Debug)]
pub struct Owned<R: NativeRef> {
    raw: R,
}

impl<R: NativeRef> Owned<R> {
    pub fn raw(&self) -> R {
        self.raw
    }

    pub fn into_handle(self, session: &Session) -> Handle<R> {
        Handle::adopted(session.clone(), self.raw)
    }
}

type Undo = Box<dyn FnOnce(&mut dyn NativeEngine)>;

/// The engine inside one critical section.
///
/// Each [`Call::run`] checks the error register right after the native
/// call, so a sequence of calls stops at the first failure. References
/// adopted by a failed transaction are released before the lock is.
pub struct Call<'a> {
    engine: &'a mut dyn NativeEngine,
    taken: Vec<Undo>,
}

impl Call<'_> {
    /// Run one native call and check the error register.
    pub fn run<T>(&mut self, op: impl FnOnce(&mut dyn NativeEngine) -> T) -> BridgeResult<T> {
        let value = op(&mut *self.engine);
        match register_error(&*self.engine) {
            None => Ok(value),
            Some(err) => Err(err.into()),
        }
    }

    /// Take a reference to a freshly returned id.
    pub fn adopt<R: NativeRef>(&mut self, raw: R) -> BridgeResult<Owned<R>> {
        if raw.is_null() {
            return Err(NativeEngineError {
                code: ErrorCode::InvalidArg,
                message: format!("engine returned a null {}", R::KIND),
            }
            .into());
        }
        self.run(|engine| raw.inc(engine))?;
        self.taken.push(Box::new(move |engine: &mut dyn NativeEngine| raw.dec(engine)));
        Ok(Owned { raw })
    }

    /// Run a constructor and adopt its result.
    pub fn create<R: NativeRef>(
        &mut self,
        op: impl FnOnce(&mut dyn NativeEngine) -> R,
    ) -> BridgeResult<Owned<R>> {
        let raw = self.run(op)?;
        self.adopt(raw)
    }

    fn roll_back(&mut self) {
        for undo in self.taken.drain(..).rev() {
            undo(&mut *self.engine);
        }
    }
}

impl Session {
    /// Open a session on the reference engine, configured by `config`.
    pub fn new(config: &SessionConfig) -> BridgeResult<Self> {
        let engine = Engine::new(config)?;
        Ok(Self::with_engine(Box::new(engine)))
    }

    /// Open a session on the reference engine with default parameters.
    pub fn default_session() -> Self {
        Self::with_engine(Box::new(Engine::with_settings(EngineSettings::default())))
    }

    /// Open a session on any engine implementing the native call surface.
    pub fn with_engine(engine: Box<dyn NativeEngine>) -> Self {
        lift::registry();
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        let interrupter = engine.interrupter();
        tracing::info!(session = id, "session opened");
        log::append(&format!("session {id} opened"));
        Self {
            inner: Arc::new(SessionInner {
                id,
                engine: Mutex::new(engine),
                symbols: DashMap::new(),
                interrupter,
            }),
        }
    }

    /// Process-unique session identifier.
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    fn lock(&self) -> MutexGuard<'_, Box<dyn NativeEngine>> {
        // A panic in another caller leaves the engine itself consistent:
        // every native call completes before control returns to the host.
        self.inner
            .engine
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    // -- the error channel --------------------------------------------------

    /// Run `op` with the lock held, then check the error register.
    ///
    /// On a non-ok code this fails with [`NativeEngineError`]; the lock is
    /// released before the error is returned.
    pub fn with_lock<T>(&self, op: impl FnOnce(&mut dyn NativeEngine) -> T) -> BridgeResult<T> {
        let (value, failure) = {
            let mut engine = self.lock();
            let value = op(engine.as_mut());
            (value, register_error(engine.as_ref()))
        };
        match failure {
            None => Ok(value),
            Some(err) => {
                tracing::debug!(session = self.id(), code = %err.code, message = %err.message, "native call failed");
                Err(err.into())
            }
        }
    }

    /// Run several native calls in one critical section.
    ///
    /// If `op` fails, every reference it adopted is released again before
    /// the lock is.
    pub fn transaction<T>(&self, op: impl FnOnce(&mut Call<'_>) -> BridgeResult<T>) -> BridgeResult<T> {
        let result = {
            let mut engine = self.lock();
            let mut call = Call {
                engine: engine.as_mut(),
                taken: Vec::new(),
            };
            let result = op(&mut call);
            if result.is_err() {
                call.roll_back();
            }
            result
        };
        if let Err(err) = &result {
            tracing::debug!(session = self.id(), error = %err, "native call failed");
        }
        result
    }

    /// Raise the engine's cancel flag without taking the lock.
    ///
    /// The operation in flight (if any) fails with an `Exception` error
    /// once it notices the flag.
    pub fn interrupt(&self) {
        tracing::info!(session = self.id(), "interrupt requested");
        log::append(&format!("session {} interrupt", self.id()));
        self.inner.interrupter.interrupt();
    }

    /// Fail with [`SessionError::ForeignHandle`] unless `other` is this session.
    pub fn ensure_same(&self, other: &Session) -> BridgeResult<()> {
        if Arc::ptr_eq(&self.inner, &other.inner) {
            Ok(())
        } else {
            Err(SessionError::ForeignHandle {
                expected: self.id(),
                found: other.id(),
            }
            .into())
        }
    }

    /// Number of live native terms, sorts and declarations.
    pub fn live_object_count(&self) -> BridgeResult<usize> {
        self.with_lock(|engine| engine.live_ast_count())
    }

    // -- reference counting -------------------------------------------------

    pub(crate) fn retain<R: NativeRef>(&self, raw: R) {
        let failure = {
            let mut engine = self.lock();
            raw.inc(engine.as_mut());
            register_error(engine.as_ref())
        };
        if let Some(err) = failure {
            tracing::error!(session = self.id(), kind = R::KIND, id = raw.id(), error = %err, "failed to retain native reference");
        }
    }

    pub(crate) fn release<R: NativeRef>(&self, raw: R) {
        let failure = {
            let mut engine = self.lock();
            raw.dec(engine.as_mut());
            register_error(engine.as_ref())
        };
        match failure {
            None => tracing::trace!(kind = R::KIND, id = raw.id(), "released native reference"),
            Some(err) => {
                tracing::error!(session = self.id(), kind = R::KIND, id = raw.id(), error = %err, "failed to release native reference");
            }
        }
    }

    // -- symbols ------------------------------------------------------------

    /// The native symbol for `name`, created once per session.
    pub fn intern_symbol(&self, name: &str) -> BridgeResult<RawSymbol> {
        if let Some(symbol) = self.inner.symbols.get(name) {
            return Ok(*symbol);
        }
        self.with_lock(|engine| {
            if let Some(symbol) = self.inner.symbols.get(name) {
                return *symbol;
            }
            let symbol = engine.mk_string_symbol(name);
            if engine.error_code() == ErrorCode::Ok {
                self.inner.symbols.insert(name.to_string(), symbol);
            }
            symbol
        })
    }

    // -- sorts --------------------------------------------------------------

    /// Run a sort constructor, wrap the result and cache its kind.
    pub(crate) fn sort_from(
        &self,
        op: impl FnOnce(&mut dyn NativeEngine) -> RawSort,
    ) -> BridgeResult<Sort> {
        let (owned, kind) = self.transaction(|call| {
            let owned = call.create(op)?;
            let raw = owned.raw();
            let kind = call.run(|e| e.get_sort_kind(raw))?;
            Ok((owned, SortKind::from_raw(kind)))
        })?;
        Ok(Sort::new(owned.into_handle(self), kind))
    }

    pub fn bool_sort(&self) -> BridgeResult<Sort> {
        self.sort_from(|e| e.mk_bool_sort())
    }

    pub fn int_sort(&self) -> BridgeResult<Sort> {
        self.sort_from(|e| e.mk_int_sort())
    }

    pub fn real_sort(&self) -> BridgeResult<Sort> {
        self.sort_from(|e| e.mk_real_sort())
    }

    pub fn bv_sort(&self, width: u32) -> BridgeResult<Sort> {
        self.sort_from(|e| e.mk_bv_sort(width))
    }

    pub fn array_sort(&self, domain: &Sort, range: &Sort) -> BridgeResult<Sort> {
        self.ensure_same(domain.session())?;
        self.ensure_same(range.session())?;
        let (d, r) = (domain.raw(), range.raw());
        self.sort_from(|e| e.mk_array_sort(d, r))
    }

    pub fn uninterpreted_sort(&self, name: &str) -> BridgeResult<Sort> {
        let symbol = self.intern_symbol(name)?;
        self.sort_from(|e| e.mk_uninterpreted_sort(symbol))
    }

    // -- terms --------------------------------------------------------------

    /// Run a term constructor and wrap the result.
    pub(crate) fn term_from(
        &self,
        op: impl FnOnce(&mut dyn NativeEngine) -> RawAst,
    ) -> BridgeResult<Expr> {
        let owned = self.transaction(|call| call.create(op))?;
        Ok(Expr::from_handle(owned.into_handle(self)))
    }

    /// A constant `name` of `sort`, lifted to its category.
    pub fn constant(&self, name: &str, sort: &Sort) -> BridgeResult<Dynamic> {
        self.ensure_same(sort.session())?;
        let symbol = self.intern_symbol(name)?;
        let raw = sort.raw();
        let expr = self.term_from(|e| e.mk_const(symbol, raw))?;
        lift::lift(expr, Some(sort.kind()))
    }

    /// A constant with a fresh name derived from `prefix`.
    pub fn fresh_constant(&self, prefix: &str, sort: &Sort) -> BridgeResult<Dynamic> {
        self.ensure_same(sort.session())?;
        let raw = sort.raw();
        let expr = self.term_from(|e| e.mk_fresh_const(prefix, raw))?;
        lift::lift(expr, Some(sort.kind()))
    }

    pub fn bool_const(&self, name: &str) -> BridgeResult<Bool> {
        let sort = self.bool_sort()?;
        self.constant(name, &sort)?.try_into()
    }

    pub fn int_const(&self, name: &str) -> BridgeResult<Int> {
        let sort = self.int_sort()?;
        self.constant(name, &sort)?.try_into()
    }

    pub fn real_const(&self, name: &str) -> BridgeResult<Real> {
        let sort = self.real_sort()?;
        self.constant(name, &sort)?.try_into()
    }

    pub fn bv_const(&self, name: &str, width: u32) -> BridgeResult<BV> {
        let sort = self.bv_sort(width)?;
        self.constant(name, &sort)?.try_into()
    }

    // -- literals -----------------------------------------------------------

    pub fn from_bool(&self, value: bool) -> BridgeResult<Bool> {
        let op = if value { BuiltinOp::True } else { BuiltinOp::False };
        self.term_from(|e| e.mk_op(op, &[])).map(Bool::unchecked)
    }

    /// A numeral of `sort` (int, real or bit-vector). Bit-vector numerals
    /// wrap modulo their width.
    pub fn from_i64(&self, value: i64, sort: &Sort) -> BridgeResult<Dynamic> {
        self.ensure_same(sort.session())?;
        let raw = sort.raw();
        let expr = self.term_from(|e| e.mk_int64(value, raw))?;
        lift::lift(expr, Some(sort.kind()))
    }

    pub fn from_u64(&self, value: u64, sort: &Sort) -> BridgeResult<Dynamic> {
        self.ensure_same(sort.session())?;
        let raw = sort.raw();
        let expr = self.term_from(|e| e.mk_unsigned_int64(value, raw))?;
        lift::lift(expr, Some(sort.kind()))
    }

    pub fn from_big_int(&self, value: &BigInt, sort: &Sort) -> BridgeResult<Dynamic> {
        self.ensure_same(sort.session())?;
        let raw = sort.raw();
        let text = value.to_string();
        let expr = self.term_from(|e| e.mk_numeral(&text, raw))?;
        lift::lift(expr, Some(sort.kind()))
    }

    pub fn from_big_rational(&self, value: &BigRational) -> BridgeResult<Real> {
        let sort = self.real_sort()?;
        let raw = sort.raw();
        let text = format!("{}/{}", value.numer(), value.denom());
        self.term_from(|e| e.mk_numeral(&text, raw)).map(Real::unchecked)
    }

    pub fn int(&self, value: i64) -> BridgeResult<Int> {
        let sort = self.int_sort()?;
        self.from_i64(value, &sort)?.try_into()
    }

    /// The rational `numer / denom`.
    pub fn real(&self, numer: i64, denom: i64) -> BridgeResult<Real> {
        let sort = self.real_sort()?;
        let raw = sort.raw();
        let text = format!("{numer}/{denom}");
        self.term_from(|e| e.mk_numeral(&text, raw)).map(Real::unchecked)
    }

    pub fn bv(&self, value: i64, width: u32) -> BridgeResult<BV> {
        let sort = self.bv_sort(width)?;
        self.from_i64(value, &sort)?.try_into()
    }

    // -- declarations and compound terms ------------------------------------

    pub fn func_decl(&self, name: &str, domain: &[&Sort], range: &Sort) -> BridgeResult<FuncDecl> {
        let symbol = self.intern_symbol(name)?;
        let (domain, range) = self.sort_ids(domain, range)?;
        let owned = self.transaction(|call| call.create(|e| e.mk_func_decl(symbol, &domain, range)))?;
        Ok(FuncDecl::from_handle(owned.into_handle(self)))
    }

    pub fn fresh_func_decl(
        &self,
        prefix: &str,
        domain: &[&Sort],
        range: &Sort,
    ) -> BridgeResult<FuncDecl> {
        let (domain, range) = self.sort_ids(domain, range)?;
        let owned =
            self.transaction(|call| call.create(|e| e.mk_fresh_func_decl(prefix, &domain, range)))?;
        Ok(FuncDecl::from_handle(owned.into_handle(self)))
    }

    fn sort_ids(&self, domain: &[&Sort], range: &Sort) -> BridgeResult<(Vec<RawSort>, RawSort)> {
        let mut ids = Vec::with_capacity(domain.len());
        for sort in domain {
            self.ensure_same(sort.session())?;
            ids.push(sort.raw());
        }
        self.ensure_same(range.session())?;
        Ok((ids, range.raw()))
    }

    /// The array over `domain` mapping every index to `value`.
    pub fn const_array(&self, domain: &Sort, value: &Expr) -> BridgeResult<Array> {
        self.ensure_same(domain.session())?;
        self.ensure_same(value.session())?;
        let (d, v) = (domain.raw(), value.raw());
        self.term_from(|e| e.mk_const_array(d, v)).map(Array::unchecked)
    }

    /// Pairwise disequality of `terms`.
    pub fn distinct(&self, terms: &[&Expr]) -> BridgeResult<Bool> {
        self.nary(BuiltinOp::Distinct, terms).map(Bool::unchecked)
    }

    /// Conjunction of `terms`; `true` when empty.
    pub fn and(&self, terms: &[&Bool]) -> BridgeResult<Bool> {
        let exprs: Vec<&Expr> = terms.iter().map(|t| t.expr()).collect();
        self.nary(BuiltinOp::And, &exprs).map(Bool::unchecked)
    }

    /// Disjunction of `terms`; `false` when empty.
    pub fn or(&self, terms: &[&Bool]) -> BridgeResult<Bool> {
        let exprs: Vec<&Expr> = terms.iter().map(|t| t.expr()).collect();
        self.nary(BuiltinOp::Or, &exprs).map(Bool::unchecked)
    }

    pub(crate) fn nary(&self, op: BuiltinOp, terms: &[&Expr]) -> BridgeResult<Expr> {
        let mut raws = Vec::with_capacity(terms.len());
        for term in terms {
            self.ensure_same(term.session())?;
            raws.push(term.raw());
        }
        self.term_from(|e| e.mk_op(op, &raws))
    }

    /// Simplify `expr` and lift the result.
    pub fn simplify(&self, expr: &Expr) -> BridgeResult<Dynamic> {
        self.ensure_same(expr.session())?;
        expr.simplify()
    }

    pub fn solver(&self) -> BridgeResult<Solver> {
        let owned = self.transaction(|call| call.create(|e| e.mk_solver()))?;
        Ok(Solver::from_handle(owned.into_handle(self)))
    }

    pub fn optimize(&self) -> BridgeResult<Optimize> {
        let owned = self.transaction(|call| call.create(|e| e.mk_optimize()))?;
        Ok(Optimize::from_handle(owned.into_handle(self)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;

    #[test]
    fn failed_call_reports_engine_message() {
        let session = Session::default_session();
        let err = session.bv_sort(0).unwrap_err();
        assert_eq!(err.native_code(), Some(ErrorCode::InvalidArg));
        assert!(err.to_string().contains("width must be positive"));
        // The session stays usable.
        assert_eq!(session.bv_sort(8).unwrap().kind(), SortKind::BV);
    }

    #[test]
    fn symbols_are_cached() {
        let session = Session::default_session();
        let a = session.intern_symbol("a").unwrap();
        let b = session.intern_symbol("b").unwrap();
        assert_ne!(a, b);
        assert_eq!(session.intern_symbol("a").unwrap(), a);
    }

    #[test]
    fn foreign_handles_are_rejected() {
        let one = Session::default_session();
        let two = Session::default_session();
        let sort = two.int_sort().unwrap();
        let err = one.constant("x", &sort).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Session(SessionError::ForeignHandle { .. })
        ));
    }

    #[test]
    fn unknown_parameter_fails_session_creation() {
        let config = SessionConfig::new().with("proof", "true");
        assert!(matches!(
            Session::new(&config),
            Err(BridgeError::Config(_))
        ));
    }

    #[test]
    fn lock_is_released_after_a_failure() {
        let session = Session::default_session();
        let int = session.int_sort().unwrap();
        let raw = int.raw();
        assert!(session.with_lock(|e| e.mk_numeral("nope", raw)).is_err());
        assert!(session.with_lock(|e| e.live_ast_count()).is_ok());
    }
}
