//! Category registry and lifting.
//!
//! Each term module contributes one [`Registration`]: the sort kind it
//! handles and a constructor wrapping an [`Expr`] into its variant. The
//! table is built once per process and never changes afterwards; sessions
//! force it on construction so it is complete before the first term exists.

use std::fmt;
use std::sync::OnceLock;

use num_bigint::BigInt;
use rustc_hash::FxHashMap;

use crate::error::{BridgeResult, CategoryError};
use crate::expr::Expr;
use crate::native::SortKind;
use crate::numeral::NumeralValue;
use crate::terms::{Array, BV, Bool, Int, Real, Term, Uninterpreted};

/// A term classified by the category of its sort.
#[derive(Clone, PartialEq, Eq, Hash)]
pub enum Dynamic {
    Bool(Bool),
    Int(Int),
    Real(Real),
    BV(BV),
    Array(Array),
    Uninterpreted(Uninterpreted),
}

impl Dynamic {
    pub fn kind(&self) -> SortKind {
        match self {
            Self::Bool(_) => SortKind::Bool,
            Self::Int(_) => SortKind::Int,
            Self::Real(_) => SortKind::Real,
            Self::BV(_) => SortKind::BV,
            Self::Array(_) => SortKind::Array,
            Self::Uninterpreted(_) => SortKind::Uninterpreted,
        }
    }

    pub fn expr(&self) -> &Expr {
        match self {
            Self::Bool(t) => t.expr(),
            Self::Int(t) => t.expr(),
            Self::Real(t) => t.expr(),
            Self::BV(t) => t.expr(),
            Self::Array(t) => t.expr(),
            Self::Uninterpreted(t) => t.expr(),
        }
    }

    pub fn into_expr(self) -> Expr {
        match self {
            Self::Bool(t) => t.into_expr(),
            Self::Int(t) => t.into_expr(),
            Self::Real(t) => t.into_expr(),
            Self::BV(t) => t.into_expr(),
            Self::Array(t) => t.into_expr(),
            Self::Uninterpreted(t) => t.into_expr(),
        }
    }

    fn numeric_only(&self) -> CategoryError {
        CategoryError::WrongCategory {
            expected: "int or bit-vector".to_string(),
            actual: self.kind(),
        }
    }

    /// Signed value of an integer or bit-vector numeral.
    pub fn as_i64(&self) -> BridgeResult<NumeralValue<i64>> {
        match self {
            Self::Int(t) => t.as_i64(),
            Self::BV(t) => t.as_i64(),
            _ => Err(self.numeric_only().into()),
        }
    }

    /// Unsigned value of an integer or bit-vector numeral.
    pub fn as_u64(&self) -> BridgeResult<NumeralValue<u64>> {
        match self {
            Self::Int(t) => t.as_u64(),
            Self::BV(t) => t.as_u64(),
            _ => Err(self.numeric_only().into()),
        }
    }

    /// Exact value of an integer or bit-vector numeral; bit-vectors are
    /// read as two's complement.
    pub fn as_big_int(&self) -> BridgeResult<NumeralValue<BigInt>> {
        match self {
            Self::Int(t) => t.as_big_int(),
            Self::BV(t) => t.as_big_int(),
            _ => Err(self.numeric_only().into()),
        }
    }
}

impl fmt::Display for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self.expr(), f)
    }
}

impl fmt::Debug for Dynamic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Dynamic::{:?}", self.kind())?;
        write!(f, "({self})")
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// One category: its sort kind and the constructor for its variant.
#[derive(Debug, Clone, Copy)]
pub struct Registration {
    pub kind: SortKind,
    pub lift: fn(Expr) -> Dynamic,
}

/// The process-wide category table.
#[derive(Debug)]
pub struct Registry {
    entries: FxHashMap<SortKind, Registration>,
}

impl Registry {
    pub fn get(&self, kind: SortKind) -> Option<&Registration> {
        self.entries.get(&kind)
    }

    /// Registered kinds, in tag order.
    pub fn kinds(&self) -> Vec<SortKind> {
        let mut kinds: Vec<_> = self.entries.keys().copied().collect();
        kinds.sort();
        kinds
    }
}

static REGISTRY: OnceLock<Registry> = OnceLock::new();

fn build_registry() -> Registry {
    let entries: FxHashMap<_, _> = [
        Uninterpreted::REGISTRATION,
        Bool::REGISTRATION,
        Int::REGISTRATION,
        Real::REGISTRATION,
        BV::REGISTRATION,
        Array::REGISTRATION,
    ]
    .into_iter()
    .map(|r| (r.kind, r))
    .collect();
    tracing::debug!(categories = entries.len(), "term category registry initialized");
    Registry { entries }
}

/// The registry, built on first use.
pub fn registry() -> &'static Registry {
    REGISTRY.get_or_init(build_registry)
}

/// Wrap `expr` in the variant for its category.
///
/// `known` skips the engine query when the caller already knows the kind,
/// e.g. from a [`Sort`](crate::sort::Sort) whose kind is cached.
pub fn lift(expr: Expr, known: Option<SortKind>) -> BridgeResult<Dynamic> {
    let kind = match known {
        Some(kind) => kind,
        None => expr.sort_kind()?,
    };
    match registry().get(kind) {
        Some(registration) => Ok((registration.lift)(expr)),
        None => Err(CategoryError::UnknownCategory { kind }.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeError;
    use crate::session::Session;

    #[test]
    fn registry_covers_the_core_categories() {
        assert_eq!(
            registry().kinds(),
            vec![
                SortKind::Uninterpreted,
                SortKind::Bool,
                SortKind::Int,
                SortKind::Real,
                SortKind::BV,
                SortKind::Array,
            ]
        );
        assert!(registry().get(SortKind::FloatingPoint).is_none());
    }

    #[test]
    fn lifted_kind_matches_engine() {
        let session = Session::default_session();
        let int = session.int_sort().unwrap();
        let bv = session.bv_sort(4).unwrap();
        let arr = session.array_sort(&int, &bv).unwrap();
        let s = session.uninterpreted_sort("S").unwrap();
        for sort in [&int, &bv, &arr, &s] {
            let c = session.fresh_constant("c", sort).unwrap();
            let relifted = c.clone().into_expr().lift().unwrap();
            assert_eq!(relifted.kind(), sort.kind());
            assert_eq!(c.expr().sort_kind().unwrap(), c.kind());
        }
    }

    #[test]
    fn unregistered_kind_is_reported() {
        let session = Session::default_session();
        let x = session.int_const("x").unwrap();
        let err = lift(x.into_expr(), Some(SortKind::FloatingPoint)).unwrap_err();
        assert!(matches!(
            err,
            BridgeError::Category(CategoryError::UnknownCategory {
                kind: SortKind::FloatingPoint
            })
        ));
    }

    #[test]
    fn numeric_accessors_reject_other_categories() {
        let session = Session::default_session();
        let p = Dynamic::from(session.bool_const("p").unwrap());
        assert!(matches!(
            p.as_i64(),
            Err(BridgeError::Category(CategoryError::WrongCategory { .. }))
        ));
    }
}
