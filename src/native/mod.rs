//! The native call surface.
//!
//! [`NativeEngine`] is the narrow boundary between the bridge and a
//! reference-counted expression engine. It is shaped like a C API on
//! purpose: objects are plain integer identifiers, a failing call returns
//! a null identifier (or a neutral value) and leaves the engine's error
//! register non-ok, and nothing is released unless the caller says so
//! with a matching `dec_ref`.
//!
//! The bridge never trusts a return value before it has read the error
//! register, and it never calls into an engine without holding the owning
//! session's lock. The only exception is [`Interrupt::interrupt`], which is
//! obtained once at session creation and may be called from any thread.

use std::fmt;
use std::sync::Arc;

macro_rules! raw_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        #[repr(transparent)]
        pub struct $name(u32);

        impl $name {
            /// The identifier a failed call returns.
            pub const NULL: Self = Self(0);

            /// Wrap a raw identifier handed out by an engine.
            pub const fn from_raw(raw: u32) -> Self {
                Self(raw)
            }

            /// The underlying integer.
            pub const fn get(self) -> u32 {
                self.0
            }

            /// Whether this is the null identifier.
            pub const fn is_null(self) -> bool {
                self.0 == 0
            }
        }
    };
}

raw_id!(
    /// Native identifier of an AST node (term, sort or declaration).
    RawAst
);
raw_id!(
    /// Native identifier of a sort. Convertible to a [`RawAst`].
    RawSort
);
raw_id!(
    /// Native identifier of a function declaration. Convertible to a [`RawAst`].
    RawFuncDecl
);
raw_id!(
    /// Native identifier of an interned symbol. Symbols are never freed.
    RawSymbol
);
raw_id!(
    /// Native identifier of a model.
    RawModel
);
raw_id!(
    /// Native identifier of a solver.
    RawSolver
);
raw_id!(
    /// Native identifier of an optimization context.
    RawOptimize
);

// ---------------------------------------------------------------------------
// Tags
// ---------------------------------------------------------------------------

/// Value of the engine's error register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// The last call succeeded.
    Ok,
    /// Arguments had incompatible sorts.
    SortError,
    /// An index was out of bounds.
    IndexOutOfBounds,
    /// An argument was invalid (dead or null identifier, malformed text).
    InvalidArg,
    /// The call is not valid in the current state.
    InvalidUsage,
    /// A reference count was decremented below zero.
    DecRefError,
    /// The operation was aborted, e.g. by an interrupt.
    Exception,
    /// The engine hit an internal invariant violation.
    InternalFatal,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Ok => "ok",
            Self::SortError => "sort error",
            Self::IndexOutOfBounds => "index out of bounds",
            Self::InvalidArg => "invalid argument",
            Self::InvalidUsage => "invalid usage",
            Self::DecRefError => "invalid dec_ref",
            Self::Exception => "exception",
            Self::InternalFatal => "internal fatal error",
        };
        f.write_str(text)
    }
}

/// Coarse category of a sort.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SortKind {
    Uninterpreted,
    Bool,
    Int,
    Real,
    BV,
    Array,
    Datatype,
    Relation,
    FiniteDomain,
    FloatingPoint,
    RoundingMode,
    Seq,
    Re,
    Unknown,
}

impl SortKind {
    /// Decode the integer tag returned by [`NativeEngine::get_sort_kind`].
    pub fn from_raw(tag: u32) -> Self {
        match tag {
            0 => Self::Uninterpreted,
            1 => Self::Bool,
            2 => Self::Int,
            3 => Self::Real,
            4 => Self::BV,
            5 => Self::Array,
            6 => Self::Datatype,
            7 => Self::Relation,
            8 => Self::FiniteDomain,
            9 => Self::FloatingPoint,
            10 => Self::RoundingMode,
            11 => Self::Seq,
            12 => Self::Re,
            _ => Self::Unknown,
        }
    }

    /// The integer tag for this kind.
    pub fn to_raw(self) -> u32 {
        match self {
            Self::Uninterpreted => 0,
            Self::Bool => 1,
            Self::Int => 2,
            Self::Real => 3,
            Self::BV => 4,
            Self::Array => 5,
            Self::Datatype => 6,
            Self::Relation => 7,
            Self::FiniteDomain => 8,
            Self::FloatingPoint => 9,
            Self::RoundingMode => 10,
            Self::Seq => 11,
            Self::Re => 12,
            Self::Unknown => 1000,
        }
    }
}

impl fmt::Display for SortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Uninterpreted => "uninterpreted",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Real => "real",
            Self::BV => "bit-vector",
            Self::Array => "array",
            Self::Datatype => "datatype",
            Self::Relation => "relation",
            Self::FiniteDomain => "finite-domain",
            Self::FloatingPoint => "floating-point",
            Self::RoundingMode => "rounding-mode",
            Self::Seq => "sequence",
            Self::Re => "regex",
            Self::Unknown => "unknown",
        };
        f.write_str(text)
    }
}

/// Structural class of an AST node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AstKind {
    Numeral,
    App,
    Var,
    Quantifier,
    Sort,
    FuncDecl,
    Unknown,
}

/// Three-valued boolean returned by checks and boolean inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LBool {
    False,
    Undef,
    True,
}

/// Builtin (interpreted) operators accepted by [`NativeEngine::mk_op`].
///
/// Parameterized operators carry their indices inline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum BuiltinOp {
    // Core
    True,
    False,
    Not,
    And,
    Or,
    Xor,
    Implies,
    Eq,
    Distinct,
    Ite,

    // Arithmetic
    Add,
    Sub,
    Mul,
    Neg,
    Div,
    Mod,
    Rem,
    Power,
    Lt,
    Le,
    Gt,
    Ge,
    ToReal,
    ToInt,
    IsInt,

    // Bit-vectors
    BvNot,
    BvNeg,
    BvAnd,
    BvOr,
    BvXor,
    BvNand,
    BvNor,
    BvXnor,
    /// 1-bit conjunction of all bits.
    BvRedAnd,
    /// 1-bit disjunction of all bits.
    BvRedOr,
    BvAdd,
    BvSub,
    BvMul,
    BvUDiv,
    BvURem,
    BvSDiv,
    BvSRem,
    BvSMod,
    BvShl,
    BvLShr,
    BvAShr,
    /// Rotation by a bit-vector amount of the same width.
    BvRotateLeft,
    BvRotateRight,
    BvUlt,
    BvUle,
    BvUgt,
    BvUge,
    BvSlt,
    BvSle,
    BvSgt,
    BvSge,
    Concat,
    Extract { high: u32, low: u32 },
    ZeroExt(u32),
    SignExt(u32),
    Repeat(u32),
    Int2Bv(u32),
    Bv2Int { signed: bool },

    // Arrays
    Select,
    Store,
}

/// Asynchronous cancellation of whatever the engine is currently doing.
///
/// Implementations must be callable from any thread without the session
/// lock.
pub trait Interrupt: Send + Sync {
    /// Ask the in-flight operation to abort.
    fn interrupt(&self);
}

/// The call surface of a reference-counted expression engine.
///
/// Every method except [`error_code`](Self::error_code),
/// [`error_message`](Self::error_message) and
/// [`interrupter`](Self::interrupter) resets the error register on entry.
/// Objects returned by constructors start with a reference count of zero
/// and stay alive until the next call that returns a new object, so the
/// caller must `inc_ref` them before issuing another constructor call.
pub trait NativeEngine: Send {
    // -- error channel ------------------------------------------------------

    /// Current value of the error register.
    fn error_code(&self) -> ErrorCode;

    /// Human-readable message for the last error.
    fn error_message(&self, code: ErrorCode) -> String;

    /// A handle that cancels the in-flight operation without the lock.
    fn interrupter(&self) -> Arc<dyn Interrupt>;

    // -- reference counting -------------------------------------------------

    fn inc_ref(&mut self, ast: RawAst);
    fn dec_ref(&mut self, ast: RawAst);
    fn sort_to_ast(&mut self, sort: RawSort) -> RawAst;
    fn func_decl_to_ast(&mut self, decl: RawFuncDecl) -> RawAst;
    fn model_inc_ref(&mut self, model: RawModel);
    fn model_dec_ref(&mut self, model: RawModel);
    fn solver_inc_ref(&mut self, solver: RawSolver);
    fn solver_dec_ref(&mut self, solver: RawSolver);
    fn optimize_inc_ref(&mut self, opt: RawOptimize);
    fn optimize_dec_ref(&mut self, opt: RawOptimize);

    /// Number of live AST nodes. Diagnostic only.
    fn live_ast_count(&self) -> usize;

    // -- symbols and sorts --------------------------------------------------

    fn mk_string_symbol(&mut self, name: &str) -> RawSymbol;
    fn mk_bool_sort(&mut self) -> RawSort;
    fn mk_int_sort(&mut self) -> RawSort;
    fn mk_real_sort(&mut self) -> RawSort;
    fn mk_bv_sort(&mut self, width: u32) -> RawSort;
    fn mk_array_sort(&mut self, domain: RawSort, range: RawSort) -> RawSort;
    fn mk_uninterpreted_sort(&mut self, name: RawSymbol) -> RawSort;

    fn get_sort(&mut self, ast: RawAst) -> RawSort;
    /// Integer tag decodable with [`SortKind::from_raw`].
    fn get_sort_kind(&mut self, sort: RawSort) -> u32;
    fn get_bv_sort_size(&mut self, sort: RawSort) -> u32;
    fn get_array_sort_domain(&mut self, sort: RawSort) -> RawSort;
    fn get_array_sort_range(&mut self, sort: RawSort) -> RawSort;
    fn is_eq_sort(&mut self, a: RawSort, b: RawSort) -> bool;

    // -- terms --------------------------------------------------------------

    fn mk_func_decl(&mut self, name: RawSymbol, domain: &[RawSort], range: RawSort) -> RawFuncDecl;
    fn mk_fresh_func_decl(&mut self, prefix: &str, domain: &[RawSort], range: RawSort)
    -> RawFuncDecl;
    fn mk_app(&mut self, decl: RawFuncDecl, args: &[RawAst]) -> RawAst;
    fn mk_const(&mut self, name: RawSymbol, sort: RawSort) -> RawAst;
    fn mk_fresh_const(&mut self, prefix: &str, sort: RawSort) -> RawAst;
    fn mk_op(&mut self, op: BuiltinOp, args: &[RawAst]) -> RawAst;
    fn mk_const_array(&mut self, domain: RawSort, value: RawAst) -> RawAst;

    /// Parse a decimal integer, or `p/q` for real sorts, as a numeral of `sort`.
    fn mk_numeral(&mut self, text: &str, sort: RawSort) -> RawAst;
    fn mk_int64(&mut self, value: i64, sort: RawSort) -> RawAst;
    fn mk_unsigned_int64(&mut self, value: u64, sort: RawSort) -> RawAst;

    // -- inspection ---------------------------------------------------------

    fn get_ast_kind(&mut self, ast: RawAst) -> AstKind;
    fn is_eq_ast(&mut self, a: RawAst, b: RawAst) -> bool;
    fn get_ast_hash(&mut self, ast: RawAst) -> u32;
    fn get_ast_id(&mut self, ast: RawAst) -> u32;
    fn ast_to_string(&mut self, ast: RawAst) -> String;
    fn sort_to_string(&mut self, sort: RawSort) -> String;
    fn func_decl_to_string(&mut self, decl: RawFuncDecl) -> String;
    fn get_bool_value(&mut self, ast: RawAst) -> LBool;

    // -- numerals -----------------------------------------------------------

    /// Decimal text of a numeral. Bit-vectors are rendered unsigned.
    fn get_numeral_string(&mut self, ast: RawAst) -> String;
    /// `None` if the numeral is not an integer or does not fit. Bit-vectors
    /// are read as unsigned.
    fn get_numeral_int64(&mut self, ast: RawAst) -> Option<i64>;
    fn get_numeral_uint64(&mut self, ast: RawAst) -> Option<u64>;
    fn get_numerator(&mut self, ast: RawAst) -> RawAst;
    fn get_denominator(&mut self, ast: RawAst) -> RawAst;
    /// Whether `ast` is an irrational algebraic number.
    fn is_algebraic_number(&mut self, ast: RawAst) -> bool;
    fn get_algebraic_number_lower(&mut self, ast: RawAst, precision: u32) -> RawAst;
    fn get_algebraic_number_upper(&mut self, ast: RawAst, precision: u32) -> RawAst;

    // -- rewriting ----------------------------------------------------------

    fn simplify(&mut self, ast: RawAst) -> RawAst;

    // -- solvers and models -------------------------------------------------

    fn mk_solver(&mut self) -> RawSolver;
    fn solver_assert(&mut self, solver: RawSolver, formula: RawAst);
    fn solver_push(&mut self, solver: RawSolver);
    fn solver_pop(&mut self, solver: RawSolver, levels: u32);
    fn solver_get_num_scopes(&mut self, solver: RawSolver) -> u32;
    fn solver_check(&mut self, solver: RawSolver) -> LBool;
    fn solver_get_model(&mut self, solver: RawSolver) -> RawModel;
    fn solver_get_reason_unknown(&mut self, solver: RawSolver) -> String;
    fn solver_to_string(&mut self, solver: RawSolver) -> String;

    /// Evaluate `ast` under `model`. `None` if evaluation failed.
    fn model_eval(&mut self, model: RawModel, ast: RawAst, completion: bool) -> Option<RawAst>;
    fn model_to_string(&mut self, model: RawModel) -> String;

    // -- optimization -------------------------------------------------------

    fn mk_optimize(&mut self) -> RawOptimize;
    fn optimize_assert(&mut self, opt: RawOptimize, formula: RawAst);
    /// Add a soft constraint of decimal `weight` to the group named `id`.
    /// Returns the objective index of the group.
    fn optimize_assert_soft(
        &mut self,
        opt: RawOptimize,
        formula: RawAst,
        weight: &str,
        id: RawSymbol,
    ) -> u32;
    /// Returns the objective index.
    fn optimize_maximize(&mut self, opt: RawOptimize, term: RawAst) -> u32;
    fn optimize_minimize(&mut self, opt: RawOptimize, term: RawAst) -> u32;
    fn optimize_push(&mut self, opt: RawOptimize);
    /// Drop the innermost scope.
    fn optimize_pop(&mut self, opt: RawOptimize);
    fn optimize_check(&mut self, opt: RawOptimize) -> LBool;
    fn optimize_get_reason_unknown(&mut self, opt: RawOptimize) -> String;
    fn optimize_get_model(&mut self, opt: RawOptimize) -> RawModel;
    fn optimize_get_lower(&mut self, opt: RawOptimize, index: u32) -> RawAst;
    fn optimize_get_upper(&mut self, opt: RawOptimize, index: u32) -> RawAst;
    fn optimize_to_string(&mut self, opt: RawOptimize) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_kind_tags_round_trip() {
        for kind in [
            SortKind::Uninterpreted,
            SortKind::Bool,
            SortKind::Int,
            SortKind::Real,
            SortKind::BV,
            SortKind::Array,
            SortKind::FloatingPoint,
            SortKind::Unknown,
        ] {
            assert_eq!(SortKind::from_raw(kind.to_raw()), kind);
        }
        assert_eq!(SortKind::from_raw(77), SortKind::Unknown);
    }

    #[test]
    fn null_identifiers() {
        assert!(RawAst::NULL.is_null());
        assert!(!RawAst::from_raw(3).is_null());
        assert_eq!(RawModel::from_raw(9).get(), 9);
    }

    #[test]
    fn error_code_display() {
        assert_eq!(ErrorCode::SortError.to_string(), "sort error");
        assert_eq!(ErrorCode::Exception.to_string(), "exception");
    }
}
