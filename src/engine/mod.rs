//! In-process reference engine.
//!
//! A stand-in for a foreign engine, used by the test suite, the benches and
//! the CLI. It implements [`NativeEngine`] the way a foreign library would:
//! raw identifiers, a null identifier on failure, an error register,
//! explicit reference counts, and a cancel flag that can be raised without
//! the session lock.
//!
//! It carries only as much reasoning as the bridge needs to be exercised:
//! hash-consed terms, constant folding and linear-sum canonicalization in
//! `simplify`, real roots of rationals, models, and a bounded
//! enumeration behind `solver_check` and `optimize_check`. It is not a
//! decision procedure; anything beyond its search bounds comes back as
//! `unknown`.

mod algebraic;
mod display;
mod eval;
mod node;
mod optimize;
mod rewrite;
mod search;
mod typing;

use std::str::FromStr;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{One, ToPrimitive};
use rustc_hash::FxHashMap;
use smallvec::smallvec;

use crate::config::SessionConfig;
use crate::error::{ConfigError, ConfigResult};
use crate::native::{
    AstKind, BuiltinOp, ErrorCode, Interrupt, LBool, NativeEngine, RawAst, RawFuncDecl, RawModel,
    RawOptimize, RawSolver, RawSort, RawSymbol,
};

use self::eval::{ModelData, Value, bv_mask};
use self::node::{Args, DeclData, Func, NodeData, NodeId, NodeTable, SortData};
use self::optimize::OptimizeData;

// ---------------------------------------------------------------------------
// Settings
// ---------------------------------------------------------------------------

/// Engine parameters, parsed from a [`SessionConfig`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineSettings {
    /// Wall-clock limit for `solver_check`. `None` means unlimited.
    pub timeout: Option<Duration>,
    /// Whether `solver_check` builds a model on `sat`.
    pub produce_models: bool,
    /// Candidate assignments tried before giving up. Zero means unlimited.
    pub max_candidates: u64,
    /// Whether `mk_app` checks argument sorts against the declaration.
    pub well_sorted_check: bool,
    /// Highest candidate index `optimize_check` tries in an unbounded domain.
    pub opt_horizon: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            timeout: None,
            produce_models: true,
            max_candidates: 0,
            well_sorted_check: true,
            opt_horizon: 32,
        }
    }
}

impl EngineSettings {
    /// Parse engine parameters. Unknown keys are rejected.
    pub fn from_config(config: &SessionConfig) -> ConfigResult<Self> {
        let mut settings = Self::default();
        for (key, value) in config.iter() {
            match key {
                "timeout" => {
                    let ms = parse_u64(key, value)?;
                    settings.timeout = (ms > 0).then(|| Duration::from_millis(ms));
                }
                "model" => settings.produce_models = parse_bool(key, value)?,
                "max_candidates" => settings.max_candidates = parse_u64(key, value)?,
                "well_sorted_check" => settings.well_sorted_check = parse_bool(key, value)?,
                "opt_horizon" => settings.opt_horizon = parse_u64(key, value)?,
                _ => {
                    return Err(ConfigError::UnknownParameter {
                        key: key.to_string(),
                    });
                }
            }
        }
        Ok(settings)
    }
}

fn parse_u64(key: &str, value: &str) -> ConfigResult<u64> {
    value.trim().parse().map_err(|e: std::num::ParseIntError| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
        reason: e.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> ConfigResult<bool> {
    match value.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
            reason: "expected true or false".to_string(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

/// An internal failure, written to the error register at the call boundary.
#[derive(Debug, Clone)]
pub(crate) struct Failure {
    code: ErrorCode,
    message: String,
}

impl Failure {
    fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    pub(crate) fn invalid_arg(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidArg, message)
    }

    pub(crate) fn sort_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SortError, message)
    }

    pub(crate) fn invalid_usage(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidUsage, message)
    }

    /// The check was interrupted.
    pub(crate) fn canceled() -> Self {
        Self::new(ErrorCode::Exception, "canceled")
    }
}

pub(crate) type Step<T> = Result<T, Failure>;

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct CancelFlag {
    raised: AtomicBool,
}

impl Interrupt for CancelFlag {
    fn interrupt(&self) {
        self.raised.store(true, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Solvers
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct SolverData {
    rc: u32,
    assertions: Vec<NodeId>,
    scopes: Vec<usize>,
    model: Option<u32>,
    reason_unknown: String,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// The reference engine.
#[derive(Debug)]
pub struct Engine {
    nodes: NodeTable,
    symbols: Vec<String>,
    symbol_ids: FxHashMap<String, u32>,
    models: Vec<Option<ModelData>>,
    solvers: Vec<Option<SolverData>>,
    optimizers: Vec<Option<OptimizeData>>,
    settings: EngineSettings,
    error: ErrorCode,
    message: String,
    cancel: Arc<CancelFlag>,
    fresh_counter: u32,
    bool_sort: NodeId,
    int_sort: NodeId,
    real_sort: NodeId,
}

impl Engine {
    /// Create an engine configured from `config`.
    pub fn new(config: &SessionConfig) -> ConfigResult<Self> {
        Ok(Self::with_settings(EngineSettings::from_config(config)?))
    }

    pub fn with_settings(settings: EngineSettings) -> Self {
        let mut nodes = NodeTable::new();
        let bool_sort = nodes.intern(NodeData::Sort(SortData::Bool));
        let int_sort = nodes.intern(NodeData::Sort(SortData::Int));
        let real_sort = nodes.intern(NodeData::Sort(SortData::Real));
        for sort in [bool_sort, int_sort, real_sort] {
            nodes.inc(sort);
        }
        nodes.sweep();
        Self {
            nodes,
            symbols: Vec::new(),
            symbol_ids: FxHashMap::default(),
            models: Vec::new(),
            solvers: Vec::new(),
            optimizers: Vec::new(),
            settings,
            error: ErrorCode::Ok,
            message: String::new(),
            cancel: Arc::new(CancelFlag::default()),
            fresh_counter: 0,
            bool_sort,
            int_sort,
            real_sort,
        }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    // -- call boundary ------------------------------------------------------

    fn begin(&mut self) {
        self.error = ErrorCode::Ok;
        self.message.clear();
    }

    fn fail(&mut self, failure: Failure) {
        self.error = failure.code;
        self.message = failure.message;
    }

    /// Publish a node result: pin it, sweep temporaries, report failures.
    fn finish_node(&mut self, result: Step<NodeId>) -> u32 {
        match result {
            Ok(id) => {
                self.nodes.pin(id);
                self.nodes.sweep();
                id
            }
            Err(failure) => {
                self.nodes.sweep();
                self.fail(failure);
                0
            }
        }
    }

    /// Publish a non-node result.
    fn finish<T>(&mut self, result: Step<T>, on_failure: T) -> T {
        self.nodes.sweep();
        match result {
            Ok(value) => value,
            Err(failure) => {
                self.fail(failure);
                on_failure
            }
        }
    }

    pub(crate) fn cancel_requested(&self) -> bool {
        self.cancel.raised.load(Ordering::Relaxed)
    }

    pub(crate) fn consume_cancel(&self) {
        self.cancel.raised.store(false, Ordering::SeqCst);
    }

    // -- node access --------------------------------------------------------

    pub(crate) fn node(&self, id: NodeId) -> Step<&NodeData> {
        self.nodes
            .get(id)
            .ok_or_else(|| Failure::invalid_arg(format!("invalid or released ast #{id}")))
    }

    /// Validate that `id` is a live term (not a sort or declaration).
    pub(crate) fn term(&self, id: NodeId) -> Step<NodeId> {
        match self.node(id)? {
            NodeData::Sort(_) | NodeData::Decl(_) => {
                Err(Failure::invalid_arg(format!("ast #{id} is not a term")))
            }
            _ => Ok(id),
        }
    }

    pub(crate) fn sort_data(&self, id: NodeId) -> Step<&SortData> {
        match self.node(id)? {
            NodeData::Sort(data) => Ok(data),
            _ => Err(Failure::invalid_arg(format!("ast #{id} is not a sort"))),
        }
    }

    pub(crate) fn decl_data(&self, id: NodeId) -> Step<&DeclData> {
        match self.node(id)? {
            NodeData::Decl(data) => Ok(data),
            _ => Err(Failure::invalid_arg(format!(
                "ast #{id} is not a function declaration"
            ))),
        }
    }

    /// Sort of a term.
    pub(crate) fn sort_of(&self, id: NodeId) -> Step<NodeId> {
        match self.node(id)? {
            NodeData::App { sort, .. }
            | NodeData::Numeral { sort, .. }
            | NodeData::Algebraic { sort, .. }
            | NodeData::Elem { sort, .. } => Ok(*sort),
            _ => Err(Failure::invalid_arg(format!("ast #{id} is not a term"))),
        }
    }

    pub(crate) fn bv_width(&self, sort: NodeId) -> Option<u32> {
        match self.nodes.get(sort) {
            Some(NodeData::Sort(SortData::BitVec(w))) => Some(*w),
            _ => None,
        }
    }

    pub(crate) fn symbol_name(&self, symbol: u32) -> &str {
        self.symbols
            .get(symbol as usize - 1)
            .map_or("?", String::as_str)
    }

    pub(crate) fn bv_sort(&mut self, width: u32) -> NodeId {
        self.nodes.intern(NodeData::Sort(SortData::BitVec(width)))
    }

    pub(crate) fn mk_bool_node(&mut self, value: bool) -> NodeId {
        let op = if value { BuiltinOp::True } else { BuiltinOp::False };
        self.nodes.intern(NodeData::App {
            func: Func::Builtin(op),
            args: Args::new(),
            sort: self.bool_sort,
        })
    }

    pub(crate) fn bool_literal(&self, id: NodeId) -> Option<bool> {
        match self.nodes.get(id) {
            Some(NodeData::App {
                func: Func::Builtin(BuiltinOp::True),
                ..
            }) => Some(true),
            Some(NodeData::App {
                func: Func::Builtin(BuiltinOp::False),
                ..
            }) => Some(false),
            _ => None,
        }
    }

    /// Whether `id` is a concrete value: a numeral, boolean literal or model element.
    pub(crate) fn is_value(&self, id: NodeId) -> bool {
        matches!(
            self.nodes.get(id),
            Some(NodeData::Numeral { .. } | NodeData::Elem { .. })
        ) || self.bool_literal(id).is_some()
    }

    pub(crate) fn node_value(&self, id: NodeId) -> Option<Value> {
        if let Some(b) = self.bool_literal(id) {
            return Some(Value::Bool(b));
        }
        match self.nodes.get(id)? {
            NodeData::Numeral { value, sort } => match self.nodes.get(*sort)? {
                NodeData::Sort(SortData::Int) => Some(Value::Int(value.to_integer())),
                NodeData::Sort(SortData::Real) => Some(Value::Real(value.clone())),
                NodeData::Sort(SortData::BitVec(width)) => Some(Value::Bv {
                    bits: value.to_integer().to_biguint()?,
                    width: *width,
                }),
                _ => None,
            },
            NodeData::Elem { sort, index } => Some(Value::Elem {
                sort: *sort,
                index: *index,
            }),
            _ => None,
        }
    }

    pub(crate) fn value_node(&mut self, value: &Value, sort: NodeId) -> NodeId {
        match value {
            Value::Bool(b) => self.mk_bool_node(*b),
            Value::Int(i) => self.nodes.intern(NodeData::Numeral {
                value: BigRational::from_integer(i.clone()),
                sort,
            }),
            Value::Real(r) => self.nodes.intern(NodeData::Numeral {
                value: r.clone(),
                sort,
            }),
            Value::Bv { bits, .. } => self.nodes.intern(NodeData::Numeral {
                value: BigRational::from_integer(BigInt::from(bits.clone())),
                sort,
            }),
            Value::Elem { sort, index } => self.nodes.intern(NodeData::Elem {
                sort: *sort,
                index: *index,
            }),
        }
    }

    /// Build a numeral of `sort`, normalizing bit-vectors modulo their width.
    pub(crate) fn make_numeral(&mut self, value: BigRational, sort: NodeId) -> Step<NodeId> {
        let value = match self.sort_data(sort)? {
            SortData::Real => value,
            SortData::Int if value.is_integer() => value,
            SortData::Int => {
                return Err(Failure::invalid_arg(format!(
                    "{value} is not an integer"
                )));
            }
            SortData::BitVec(width) if value.is_integer() => {
                let modulus = BigInt::from(bv_mask(*width)) + BigInt::one();
                let reduced = num_integer::Integer::mod_floor(&value.to_integer(), &modulus);
                BigRational::from_integer(reduced)
            }
            SortData::BitVec(_) => {
                return Err(Failure::invalid_arg(format!(
                    "{value} is not an integer"
                )));
            }
            _ => {
                return Err(Failure::invalid_arg(
                    "numerals must have int, real or bit-vector sort",
                ));
            }
        };
        Ok(self.nodes.intern(NodeData::Numeral { value, sort }))
    }

    fn numeral_value(&self, id: NodeId) -> Step<(&BigRational, NodeId)> {
        match self.node(id)? {
            NodeData::Numeral { value, sort } => Ok((value, *sort)),
            _ => Err(Failure::invalid_arg(format!("ast #{id} is not a numeral"))),
        }
    }

    fn fresh_name(&mut self, prefix: &str) -> String {
        self.fresh_counter += 1;
        format!("{prefix}!{}", self.fresh_counter)
    }

    fn sorts(&self, raw: &[RawSort]) -> Step<Args> {
        raw.iter()
            .map(|s| {
                self.sort_data(s.get())?;
                Ok(s.get())
            })
            .collect()
    }

    fn terms(&self, raw: &[RawAst]) -> Step<Args> {
        raw.iter().map(|a| self.term(a.get())).collect()
    }

    // -- models and solvers -------------------------------------------------

    fn model_slot(&mut self, raw: RawModel) -> Step<&mut ModelData> {
        self.models
            .get_mut((raw.get() as usize).wrapping_sub(1))
            .and_then(Option::as_mut)
            .ok_or_else(|| Failure::invalid_arg(format!("invalid or released model #{}", raw.get())))
    }

    fn solver_slot(&mut self, raw: RawSolver) -> Step<&mut SolverData> {
        self.solvers
            .get_mut((raw.get() as usize).wrapping_sub(1))
            .and_then(Option::as_mut)
            .ok_or_else(|| {
                Failure::invalid_arg(format!("invalid or released solver #{}", raw.get()))
            })
    }

    /// Register a freshly built model. The caller owns the returned reference.
    pub(crate) fn add_model(&mut self, model: ModelData) -> u32 {
        for id in model.held_nodes() {
            self.nodes.inc(id);
        }
        self.models.push(Some(ModelData { rc: 1, ..model }));
        self.models.len() as u32
    }

    fn release_model(&mut self, id: u32) {
        let Some(slot) = self.models.get_mut(id as usize - 1) else {
            return;
        };
        let free = match slot {
            Some(model) => {
                model.rc = model.rc.saturating_sub(1);
                model.rc == 0
            }
            None => false,
        };
        if !free {
            return;
        }
        if let Some(model) = slot.take() {
            for node in model.held_nodes() {
                self.nodes.release(node);
            }
        }
    }

    fn release_solver(&mut self, index: usize) {
        let Some(solver) = self.solvers.get_mut(index).and_then(Option::take) else {
            return;
        };
        for node in solver.assertions {
            self.nodes.release(node);
        }
        if let Some(model) = solver.model {
            self.release_model(model);
        }
    }

    fn solver_check_inner(&mut self, raw: RawSolver) -> Step<LBool> {
        let (assertions, previous) = {
            let solver = self.solver_slot(raw)?;
            solver.reason_unknown.clear();
            (solver.assertions.clone(), solver.model.take())
        };
        if let Some(model) = previous {
            self.release_model(model);
        }
        // Interrupts raised while idle do not carry over into this check.
        self.consume_cancel();
        let outcome = self.search(&assertions);
        self.consume_cancel();
        let outcome = outcome?;
        let solver = self.solver_slot(raw)?;
        match outcome {
            search::Outcome::Sat(model) => {
                solver.model = model;
                Ok(LBool::True)
            }
            search::Outcome::Unsat => Ok(LBool::False),
            search::Outcome::Unknown(reason) => {
                solver.reason_unknown = reason;
                Ok(LBool::Undef)
            }
        }
    }
}

/// Parse a numeral literal: an integer, `p/q`, or a decimal such as `1.25`.
pub(crate) fn parse_rational(text: &str) -> Option<BigRational> {
    let text = text.trim();
    if let Ok(r) = BigRational::from_str(text) {
        return Some(r);
    }
    let (negative, body) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (whole, frac) = body.split_once('.')?;
    if whole.is_empty() && frac.is_empty() {
        return None;
    }
    if !whole.chars().chain(frac.chars()).all(|c| c.is_ascii_digit()) {
        return None;
    }
    let digits = format!("{whole}{frac}");
    let numer = BigInt::from_str(&digits).ok()?;
    let denom = num_traits::pow(BigInt::from(10), frac.len());
    let r = BigRational::new(numer, denom);
    Some(if negative { -r } else { r })
}

// ---------------------------------------------------------------------------
// Native call surface
// ---------------------------------------------------------------------------

impl NativeEngine for Engine {
    fn error_code(&self) -> ErrorCode {
        self.error
    }

    fn error_message(&self, code: ErrorCode) -> String {
        if code == self.error && !self.message.is_empty() {
            self.message.clone()
        } else {
            code.to_string()
        }
    }

    fn interrupter(&self) -> Arc<dyn Interrupt> {
        self.cancel.clone()
    }

    fn inc_ref(&mut self, ast: RawAst) {
        self.begin();
        match self.node(ast.get()) {
            Ok(_) => self.nodes.inc(ast.get()),
            Err(failure) => self.fail(failure),
        }
    }

    fn dec_ref(&mut self, ast: RawAst) {
        self.begin();
        if self.nodes.dec(ast.get()).is_err() {
            self.fail(Failure::new(
                ErrorCode::DecRefError,
                format!("dec_ref on ast #{} without a matching inc_ref", ast.get()),
            ));
        }
    }

    fn sort_to_ast(&mut self, sort: RawSort) -> RawAst {
        self.begin();
        let result = self.sort_data(sort.get()).map(|_| sort.get());
        RawAst::from_raw(self.finish(result, 0))
    }

    fn func_decl_to_ast(&mut self, decl: RawFuncDecl) -> RawAst {
        self.begin();
        let result = self.decl_data(decl.get()).map(|_| decl.get());
        RawAst::from_raw(self.finish(result, 0))
    }

    fn model_inc_ref(&mut self, model: RawModel) {
        self.begin();
        let result = self.model_slot(model).map(|m| m.rc += 1);
        self.finish(result, ());
    }

    fn model_dec_ref(&mut self, model: RawModel) {
        self.begin();
        let result = match self.model_slot(model) {
            Ok(m) if m.rc == 0 => Err(Failure::new(
                ErrorCode::DecRefError,
                format!("dec_ref on model #{} without a matching inc_ref", model.get()),
            )),
            Ok(_) => Ok(()),
            Err(failure) => Err(failure),
        };
        if result.is_ok() {
            self.release_model(model.get());
        }
        self.finish(result, ());
    }

    fn solver_inc_ref(&mut self, solver: RawSolver) {
        self.begin();
        let result = self.solver_slot(solver).map(|s| s.rc += 1);
        self.finish(result, ());
    }

    fn solver_dec_ref(&mut self, solver: RawSolver) {
        self.begin();
        let result = match self.solver_slot(solver) {
            Ok(s) if s.rc == 0 => Err(Failure::new(
                ErrorCode::DecRefError,
                format!("dec_ref on solver #{} without a matching inc_ref", solver.get()),
            )),
            Ok(s) => {
                s.rc -= 1;
                Ok(s.rc == 0)
            }
            Err(failure) => Err(failure),
        };
        if let Ok(true) = result {
            self.release_solver(solver.get() as usize - 1);
        }
        self.finish(result.map(|_| ()), ());
    }

    fn optimize_inc_ref(&mut self, opt: RawOptimize) {
        self.begin();
        let result = self.optimize_slot(opt).map(|o| o.rc += 1);
        self.finish(result, ());
    }

    fn optimize_dec_ref(&mut self, opt: RawOptimize) {
        self.begin();
        let result = match self.optimize_slot(opt) {
            Ok(o) if o.rc == 0 => Err(Failure::new(
                ErrorCode::DecRefError,
                format!("dec_ref on optimize context #{} without a matching inc_ref", opt.get()),
            )),
            Ok(o) => {
                o.rc -= 1;
                Ok(o.rc == 0)
            }
            Err(failure) => Err(failure),
        };
        if let Ok(true) = result {
            self.release_optimize(opt.get() as usize - 1);
        }
        self.finish(result.map(|_| ()), ());
    }

    fn live_ast_count(&self) -> usize {
        self.nodes.live()
    }

    // -- symbols and sorts --------------------------------------------------

    fn mk_string_symbol(&mut self, name: &str) -> RawSymbol {
        self.begin();
        if let Some(&id) = self.symbol_ids.get(name) {
            return RawSymbol::from_raw(id);
        }
        self.symbols.push(name.to_string());
        let id = self.symbols.len() as u32;
        self.symbol_ids.insert(name.to_string(), id);
        RawSymbol::from_raw(id)
    }

    fn mk_bool_sort(&mut self) -> RawSort {
        self.begin();
        let id = self.bool_sort;
        RawSort::from_raw(self.finish_node(Ok(id)))
    }

    fn mk_int_sort(&mut self) -> RawSort {
        self.begin();
        let id = self.int_sort;
        RawSort::from_raw(self.finish_node(Ok(id)))
    }

    fn mk_real_sort(&mut self) -> RawSort {
        self.begin();
        let id = self.real_sort;
        RawSort::from_raw(self.finish_node(Ok(id)))
    }

    fn mk_bv_sort(&mut self, width: u32) -> RawSort {
        self.begin();
        let result = if width == 0 {
            Err(Failure::invalid_arg("bit-vector width must be positive"))
        } else {
            Ok(self.bv_sort(width))
        };
        RawSort::from_raw(self.finish_node(result))
    }

    fn mk_array_sort(&mut self, domain: RawSort, range: RawSort) -> RawSort {
        self.begin();
        let result = self.sorts(&[domain, range]).map(|s| {
            self.nodes.intern(NodeData::Sort(SortData::Array {
                domain: s[0],
                range: s[1],
            }))
        });
        RawSort::from_raw(self.finish_node(result))
    }

    fn mk_uninterpreted_sort(&mut self, name: RawSymbol) -> RawSort {
        self.begin();
        let result = if name.is_null() || name.get() as usize > self.symbols.len() {
            Err(Failure::invalid_arg("invalid symbol"))
        } else {
            Ok(self
                .nodes
                .intern(NodeData::Sort(SortData::Uninterpreted(name.get()))))
        };
        RawSort::from_raw(self.finish_node(result))
    }

    fn get_sort(&mut self, ast: RawAst) -> RawSort {
        self.begin();
        let result = self.sort_of(ast.get());
        RawSort::from_raw(self.finish_node(result))
    }

    fn get_sort_kind(&mut self, sort: RawSort) -> u32 {
        use crate::native::SortKind;
        self.begin();
        let result = self.sort_data(sort.get()).map(|data| {
            let kind = match data {
                SortData::Uninterpreted(_) => SortKind::Uninterpreted,
                SortData::Bool => SortKind::Bool,
                SortData::Int => SortKind::Int,
                SortData::Real => SortKind::Real,
                SortData::BitVec(_) => SortKind::BV,
                SortData::Array { .. } => SortKind::Array,
            };
            kind.to_raw()
        });
        self.finish(result, SortKind::Unknown.to_raw())
    }

    fn get_bv_sort_size(&mut self, sort: RawSort) -> u32 {
        self.begin();
        let result = self.sort_data(sort.get()).and_then(|data| match data {
            SortData::BitVec(w) => Ok(*w),
            _ => Err(Failure::invalid_arg("sort is not a bit-vector sort")),
        });
        self.finish(result, 0)
    }

    fn get_array_sort_domain(&mut self, sort: RawSort) -> RawSort {
        self.begin();
        let result = self.sort_data(sort.get()).and_then(|data| match data {
            SortData::Array { domain, .. } => Ok(*domain),
            _ => Err(Failure::invalid_arg("sort is not an array sort")),
        });
        RawSort::from_raw(self.finish_node(result))
    }

    fn get_array_sort_range(&mut self, sort: RawSort) -> RawSort {
        self.begin();
        let result = self.sort_data(sort.get()).and_then(|data| match data {
            SortData::Array { range, .. } => Ok(*range),
            _ => Err(Failure::invalid_arg("sort is not an array sort")),
        });
        RawSort::from_raw(self.finish_node(result))
    }

    fn is_eq_sort(&mut self, a: RawSort, b: RawSort) -> bool {
        self.begin();
        let result = self.sorts(&[a, b]).map(|s| s[0] == s[1]);
        self.finish(result, false)
    }

    // -- terms --------------------------------------------------------------

    fn mk_func_decl(&mut self, name: RawSymbol, domain: &[RawSort], range: RawSort) -> RawFuncDecl {
        self.begin();
        let result = (|| -> Step<NodeId> {
            if name.is_null() || name.get() as usize > self.symbols.len() {
                return Err(Failure::invalid_arg("invalid symbol"));
            }
            let domain = self.sorts(domain)?;
            let range = self.sorts(&[range])?[0];
            let name = self.symbol_name(name.get()).to_string();
            Ok(self.nodes.intern(NodeData::Decl(DeclData {
                name,
                domain,
                range,
                fresh: false,
            })))
        })();
        RawFuncDecl::from_raw(self.finish_node(result))
    }

    fn mk_fresh_func_decl(
        &mut self,
        prefix: &str,
        domain: &[RawSort],
        range: RawSort,
    ) -> RawFuncDecl {
        self.begin();
        let result = (|| -> Step<NodeId> {
            let domain = self.sorts(domain)?;
            let range = self.sorts(&[range])?[0];
            let name = self.fresh_name(prefix);
            Ok(self.nodes.intern(NodeData::Decl(DeclData {
                name,
                domain,
                range,
                fresh: true,
            })))
        })();
        RawFuncDecl::from_raw(self.finish_node(result))
    }

    fn mk_app(&mut self, decl: RawFuncDecl, args: &[RawAst]) -> RawAst {
        self.begin();
        let result = (|| -> Step<NodeId> {
            let data = self.decl_data(decl.get())?.clone();
            let args = self.terms(args)?;
            if args.len() != data.domain.len() {
                return Err(Failure::invalid_arg(format!(
                    "{} expects {} arguments, got {}",
                    data.name,
                    data.domain.len(),
                    args.len()
                )));
            }
            if self.settings.well_sorted_check {
                for (i, (arg, expected)) in args.iter().zip(&data.domain).enumerate() {
                    if self.sort_of(*arg)? != *expected {
                        return Err(Failure::sort_error(format!(
                            "argument {i} of {} has the wrong sort",
                            data.name
                        )));
                    }
                }
            }
            Ok(self.nodes.intern(NodeData::App {
                func: Func::Decl(decl.get()),
                args,
                sort: data.range,
            }))
        })();
        RawAst::from_raw(self.finish_node(result))
    }

    fn mk_const(&mut self, name: RawSymbol, sort: RawSort) -> RawAst {
        self.begin();
        let result = (|| -> Step<NodeId> {
            if name.is_null() || name.get() as usize > self.symbols.len() {
                return Err(Failure::invalid_arg("invalid symbol"));
            }
            let sort = self.sorts(&[sort])?[0];
            let name = self.symbol_name(name.get()).to_string();
            Ok(self.constant(name, sort, false))
        })();
        RawAst::from_raw(self.finish_node(result))
    }

    fn mk_fresh_const(&mut self, prefix: &str, sort: RawSort) -> RawAst {
        self.begin();
        let result = (|| -> Step<NodeId> {
            let sort = self.sorts(&[sort])?[0];
            let name = self.fresh_name(prefix);
            Ok(self.constant(name, sort, true))
        })();
        RawAst::from_raw(self.finish_node(result))
    }

    fn mk_op(&mut self, op: BuiltinOp, args: &[RawAst]) -> RawAst {
        self.begin();
        let result = (|| -> Step<NodeId> {
            let args = self.terms(args)?;
            let sort = self.op_sort(op, &args)?;
            Ok(self.nodes.intern(NodeData::App {
                func: Func::Builtin(op),
                args,
                sort,
            }))
        })();
        RawAst::from_raw(self.finish_node(result))
    }

    fn mk_const_array(&mut self, domain: RawSort, value: RawAst) -> RawAst {
        self.begin();
        let result = (|| -> Step<NodeId> {
            let domain = self.sorts(&[domain])?[0];
            let value = self.term(value.get())?;
            let range = self.sort_of(value)?;
            let sort = self
                .nodes
                .intern(NodeData::Sort(SortData::Array { domain, range }));
            Ok(self.nodes.intern(NodeData::App {
                func: Func::ConstArray,
                args: smallvec![value],
                sort,
            }))
        })();
        RawAst::from_raw(self.finish_node(result))
    }

    fn mk_numeral(&mut self, text: &str, sort: RawSort) -> RawAst {
        self.begin();
        let result = (|| -> Step<NodeId> {
            let sort = self.sorts(&[sort])?[0];
            let value = parse_rational(text)
                .ok_or_else(|| Failure::invalid_arg(format!("invalid numeral \"{text}\"")))?;
            self.make_numeral(value, sort)
        })();
        RawAst::from_raw(self.finish_node(result))
    }

    fn mk_int64(&mut self, value: i64, sort: RawSort) -> RawAst {
        self.begin();
        let result = self
            .sorts(&[sort])
            .and_then(|s| self.make_numeral(BigRational::from_integer(BigInt::from(value)), s[0]));
        RawAst::from_raw(self.finish_node(result))
    }

    fn mk_unsigned_int64(&mut self, value: u64, sort: RawSort) -> RawAst {
        self.begin();
        let result = self
            .sorts(&[sort])
            .and_then(|s| self.make_numeral(BigRational::from_integer(BigInt::from(value)), s[0]));
        RawAst::from_raw(self.finish_node(result))
    }

    // -- inspection ---------------------------------------------------------

    fn get_ast_kind(&mut self, ast: RawAst) -> AstKind {
        self.begin();
        let result = self.node(ast.get()).map(|data| match data {
            NodeData::Sort(_) => AstKind::Sort,
            NodeData::Decl(_) => AstKind::FuncDecl,
            NodeData::Numeral { .. } => AstKind::Numeral,
            NodeData::App { .. } | NodeData::Algebraic { .. } | NodeData::Elem { .. } => {
                AstKind::App
            }
        });
        self.finish(result, AstKind::Unknown)
    }

    fn is_eq_ast(&mut self, a: RawAst, b: RawAst) -> bool {
        self.begin();
        let result = self
            .node(a.get())
            .and_then(|_| self.node(b.get()))
            .map(|_| a == b);
        self.finish(result, false)
    }

    fn get_ast_hash(&mut self, ast: RawAst) -> u32 {
        self.begin();
        let result = self
            .nodes
            .hash_of(ast.get())
            .ok_or_else(|| Failure::invalid_arg(format!("invalid or released ast #{}", ast.get())));
        self.finish(result, 0)
    }

    fn get_ast_id(&mut self, ast: RawAst) -> u32 {
        self.begin();
        let result = self.node(ast.get()).map(|_| ast.get());
        self.finish(result, 0)
    }

    fn ast_to_string(&mut self, ast: RawAst) -> String {
        self.begin();
        let result = self.render(ast.get());
        self.finish(result, String::new())
    }

    fn sort_to_string(&mut self, sort: RawSort) -> String {
        self.begin();
        let result = self.sort_data(sort.get()).and_then(|_| self.render(sort.get()));
        self.finish(result, String::new())
    }

    fn func_decl_to_string(&mut self, decl: RawFuncDecl) -> String {
        self.begin();
        let result = self.decl_data(decl.get()).and_then(|_| self.render(decl.get()));
        self.finish(result, String::new())
    }

    fn get_bool_value(&mut self, ast: RawAst) -> LBool {
        self.begin();
        let result = self.term(ast.get()).map(|id| match self.bool_literal(id) {
            Some(true) => LBool::True,
            Some(false) => LBool::False,
            None => LBool::Undef,
        });
        self.finish(result, LBool::Undef)
    }

    // -- numerals -----------------------------------------------------------

    fn get_numeral_string(&mut self, ast: RawAst) -> String {
        self.begin();
        let result = self.numeral_value(ast.get()).map(|(value, _)| {
            if value.is_integer() {
                value.numer().to_string()
            } else {
                format!("{}/{}", value.numer(), value.denom())
            }
        });
        self.finish(result, String::new())
    }

    fn get_numeral_int64(&mut self, ast: RawAst) -> Option<i64> {
        self.begin();
        let result = self
            .numeral_value(ast.get())
            .map(|(value, _)| value.is_integer().then(|| value.numer().to_i64()).flatten());
        self.finish(result, None)
    }

    fn get_numeral_uint64(&mut self, ast: RawAst) -> Option<u64> {
        self.begin();
        let result = self
            .numeral_value(ast.get())
            .map(|(value, _)| value.is_integer().then(|| value.numer().to_u64()).flatten());
        self.finish(result, None)
    }

    fn get_numerator(&mut self, ast: RawAst) -> RawAst {
        self.begin();
        let result = (|| -> Step<NodeId> {
            let (value, sort) = self.numeral_value(ast.get())?;
            if self.bv_width(sort).is_some() {
                return Err(Failure::invalid_arg("bit-vector numerals have no numerator"));
            }
            let numer = value.numer().clone();
            let int = self.int_sort;
            self.make_numeral(BigRational::from_integer(numer), int)
        })();
        RawAst::from_raw(self.finish_node(result))
    }

    fn get_denominator(&mut self, ast: RawAst) -> RawAst {
        self.begin();
        let result = (|| -> Step<NodeId> {
            let (value, sort) = self.numeral_value(ast.get())?;
            if self.bv_width(sort).is_some() {
                return Err(Failure::invalid_arg("bit-vector numerals have no denominator"));
            }
            let denom = value.denom().clone();
            let int = self.int_sort;
            self.make_numeral(BigRational::from_integer(denom), int)
        })();
        RawAst::from_raw(self.finish_node(result))
    }

    fn is_algebraic_number(&mut self, ast: RawAst) -> bool {
        self.begin();
        let result = self
            .node(ast.get())
            .map(|data| matches!(data, NodeData::Algebraic { .. }));
        self.finish(result, false)
    }

    fn get_algebraic_number_lower(&mut self, ast: RawAst, precision: u32) -> RawAst {
        self.begin();
        let result = self.algebraic_bound(ast.get(), precision, false);
        RawAst::from_raw(self.finish_node(result))
    }

    fn get_algebraic_number_upper(&mut self, ast: RawAst, precision: u32) -> RawAst {
        self.begin();
        let result = self.algebraic_bound(ast.get(), precision, true);
        RawAst::from_raw(self.finish_node(result))
    }

    // -- rewriting ----------------------------------------------------------

    fn simplify(&mut self, ast: RawAst) -> RawAst {
        self.begin();
        let result = self.term(ast.get()).map(|id| self.simplify_term(id));
        RawAst::from_raw(self.finish_node(result))
    }

    // -- solvers and models -------------------------------------------------

    fn mk_solver(&mut self) -> RawSolver {
        self.begin();
        self.solvers.push(Some(SolverData::default()));
        RawSolver::from_raw(self.solvers.len() as u32)
    }

    fn solver_assert(&mut self, solver: RawSolver, formula: RawAst) {
        self.begin();
        let result = (|| -> Step<()> {
            let formula = self.term(formula.get())?;
            if self.sort_of(formula)? != self.bool_sort {
                return Err(Failure::sort_error("assertions must be boolean"));
            }
            self.solver_slot(solver)?.assertions.push(formula);
            self.nodes.inc(formula);
            Ok(())
        })();
        self.finish(result, ());
    }

    fn solver_push(&mut self, solver: RawSolver) {
        self.begin();
        let result = self.solver_slot(solver).map(|s| {
            let depth = s.assertions.len();
            s.scopes.push(depth);
        });
        self.finish(result, ());
    }

    fn solver_pop(&mut self, solver: RawSolver, levels: u32) {
        self.begin();
        let result = (|| -> Step<Vec<NodeId>> {
            let s = self.solver_slot(solver)?;
            let levels = levels as usize;
            if levels > s.scopes.len() {
                return Err(Failure::invalid_usage(format!(
                    "cannot pop {levels} scopes, only {} pushed",
                    s.scopes.len()
                )));
            }
            if levels == 0 {
                return Ok(Vec::new());
            }
            let depth = s.scopes[s.scopes.len() - levels];
            s.scopes.truncate(s.scopes.len() - levels);
            Ok(s.assertions.split_off(depth))
        })();
        if let Ok(dropped) = &result {
            for node in dropped.clone() {
                self.nodes.release(node);
            }
        }
        self.finish(result.map(|_| ()), ());
    }

    fn solver_get_num_scopes(&mut self, solver: RawSolver) -> u32 {
        self.begin();
        let result = self.solver_slot(solver).map(|s| s.scopes.len() as u32);
        self.finish(result, 0)
    }

    fn solver_check(&mut self, solver: RawSolver) -> LBool {
        self.begin();
        let result = self.solver_check_inner(solver);
        self.finish(result, LBool::Undef)
    }

    fn solver_get_model(&mut self, solver: RawSolver) -> RawModel {
        self.begin();
        let result = self.solver_slot(solver).and_then(|s| {
            s.model
                .ok_or_else(|| Failure::invalid_usage("there is no current model"))
        });
        RawModel::from_raw(self.finish(result, 0))
    }

    fn solver_get_reason_unknown(&mut self, solver: RawSolver) -> String {
        self.begin();
        let result = self.solver_slot(solver).map(|s| s.reason_unknown.clone());
        self.finish(result, String::new())
    }

    fn solver_to_string(&mut self, solver: RawSolver) -> String {
        self.begin();
        let result = (|| -> Step<String> {
            let assertions = self.solver_slot(solver)?.assertions.clone();
            let mut out = String::new();
            for formula in assertions {
                out.push_str(&format!("(assert {})\n", self.render(formula)?));
            }
            Ok(out)
        })();
        self.finish(result, String::new())
    }

    fn model_eval(&mut self, model: RawModel, ast: RawAst, completion: bool) -> Option<RawAst> {
        self.begin();
        let result = (|| -> Step<NodeId> {
            let interps = self.model_slot(model)?.interps.clone();
            let term = self.term(ast.get())?;
            let mut memo = FxHashMap::default();
            self.eval_node(term, &interps, completion, &mut memo)
        })();
        match self.finish_node(result) {
            0 => None,
            id => Some(RawAst::from_raw(id)),
        }
    }

    fn model_to_string(&mut self, model: RawModel) -> String {
        self.begin();
        let result = (|| -> Step<String> {
            let interps = self.model_slot(model)?.interps.clone();
            self.render_model(&interps)
        })();
        self.finish(result, String::new())
    }

    // -- optimization -------------------------------------------------------

    fn mk_optimize(&mut self) -> RawOptimize {
        self.begin();
        self.optimizers.push(Some(OptimizeData::default()));
        RawOptimize::from_raw(self.optimizers.len() as u32)
    }

    fn optimize_assert(&mut self, opt: RawOptimize, formula: RawAst) {
        self.begin();
        let result = self.optimize_assert_inner(opt, formula);
        self.finish(result, ());
    }

    fn optimize_assert_soft(
        &mut self,
        opt: RawOptimize,
        formula: RawAst,
        weight: &str,
        id: RawSymbol,
    ) -> u32 {
        self.begin();
        let result = self.optimize_assert_soft_inner(opt, formula, weight, id);
        self.finish(result, 0)
    }

    fn optimize_maximize(&mut self, opt: RawOptimize, term: RawAst) -> u32 {
        self.begin();
        let result = self.optimize_objective_inner(opt, term, true);
        self.finish(result, 0)
    }

    fn optimize_minimize(&mut self, opt: RawOptimize, term: RawAst) -> u32 {
        self.begin();
        let result = self.optimize_objective_inner(opt, term, false);
        self.finish(result, 0)
    }

    fn optimize_push(&mut self, opt: RawOptimize) {
        self.begin();
        let result = self.optimize_push_inner(opt);
        self.finish(result, ());
    }

    fn optimize_pop(&mut self, opt: RawOptimize) {
        self.begin();
        let result = self.optimize_pop_inner(opt);
        self.finish(result, ());
    }

    fn optimize_check(&mut self, opt: RawOptimize) -> LBool {
        self.begin();
        let result = self.optimize_check_inner(opt);
        self.finish(result, LBool::Undef)
    }

    fn optimize_get_reason_unknown(&mut self, opt: RawOptimize) -> String {
        self.begin();
        let result = self.optimize_slot(opt).map(|o| o.reason_unknown.clone());
        self.finish(result, String::new())
    }

    fn optimize_get_model(&mut self, opt: RawOptimize) -> RawModel {
        self.begin();
        let result = self.optimize_slot(opt).and_then(|o| {
            o.model
                .ok_or_else(|| Failure::invalid_usage("there is no current model"))
        });
        RawModel::from_raw(self.finish(result, 0))
    }

    fn optimize_get_lower(&mut self, opt: RawOptimize, index: u32) -> RawAst {
        self.begin();
        let result = self.optimize_bound(opt, index);
        RawAst::from_raw(self.finish_node(result))
    }

    fn optimize_get_upper(&mut self, opt: RawOptimize, index: u32) -> RawAst {
        self.begin();
        let result = self.optimize_bound(opt, index);
        RawAst::from_raw(self.finish_node(result))
    }

    fn optimize_to_string(&mut self, opt: RawOptimize) -> String {
        self.begin();
        let result = self.render_optimize(opt);
        self.finish(result, String::new())
    }
}

impl Engine {
    fn constant(&mut self, name: String, sort: NodeId, fresh: bool) -> NodeId {
        let decl = self.nodes.intern(NodeData::Decl(DeclData {
            name,
            domain: Args::new(),
            range: sort,
            fresh,
        }));
        self.nodes.intern(NodeData::App {
            func: Func::Decl(decl),
            args: Args::new(),
            sort,
        })
    }

    fn algebraic_bound(&mut self, id: NodeId, precision: u32, upper: bool) -> Step<NodeId> {
        let (radicand, degree) = match self.node(id)? {
            NodeData::Algebraic {
                radicand, degree, ..
            } => (radicand.clone(), *degree),
            _ => return Err(Failure::invalid_arg(format!("ast #{id} is not an algebraic number"))),
        };
        let (lower, upper_bound) = algebraic::root_bounds(&radicand, degree, precision);
        let real = self.real_sort;
        self.make_numeral(if upper { upper_bound } else { lower }, real)
    }
}
