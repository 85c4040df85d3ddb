//! Typed term variants.
//!
//! Every variant is a newtype over [`Expr`] tagged with one sort category.
//! Operators whose result category is known statically return the typed
//! result directly; the engine still performs the authoritative sort check.

use std::fmt;

use crate::error::{BridgeError, BridgeResult};
use crate::expr::Expr;
use crate::lift::{self, Dynamic};
use crate::native::SortKind;
use crate::session::Session;
use crate::sort::Sort;

/// Behaviour shared by every typed term variant.
pub trait Term: Clone + fmt::Display + TryFrom<Dynamic, Error = BridgeError> {
    /// The category of every term of this type.
    const KIND: SortKind;

    fn expr(&self) -> &Expr;

    fn into_expr(self) -> Expr;

    fn session(&self) -> &Session {
        self.expr().session()
    }

    fn sort(&self) -> BridgeResult<Sort> {
        self.expr().sort()
    }

    /// Wrap a term already known to belong to this category.
    fn from_known(expr: Expr) -> BridgeResult<Self> {
        lift::lift(expr, Some(Self::KIND))?.try_into()
    }

    /// Canonical simplified form.
    fn simplify(&self) -> BridgeResult<Self> {
        self.expr().simplify()?.try_into()
    }

    fn equals(&self, other: &Self) -> BridgeResult<Bool> {
        self.expr().equals(other.expr())
    }

    fn not_equals(&self, other: &Self) -> BridgeResult<Bool> {
        self.expr().not_equals(other.expr())
    }
}

/// Declare a typed variant over [`Expr`] for one sort category.
macro_rules! term_type {
    ($(#[$meta:meta])* $name:ident, $variant:ident, $kind:expr) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash)]
        pub struct $name(pub(crate) $crate::expr::Expr);

        impl $name {
            pub(crate) const REGISTRATION: $crate::lift::Registration = $crate::lift::Registration {
                kind: $kind,
                lift: |expr| $crate::lift::Dynamic::$variant($name(expr)),
            };

            pub(crate) fn unchecked(expr: $crate::expr::Expr) -> Self {
                Self(expr)
            }
        }

        impl $crate::terms::Term for $name {
            const KIND: $crate::native::SortKind = $kind;

            fn expr(&self) -> &$crate::expr::Expr {
                &self.0
            }

            fn into_expr(self) -> $crate::expr::Expr {
                self.0
            }
        }

        impl TryFrom<$crate::lift::Dynamic> for $name {
            type Error = $crate::error::BridgeError;

            fn try_from(term: $crate::lift::Dynamic) -> Result<Self, Self::Error> {
                match term {
                    $crate::lift::Dynamic::$variant(inner) => Ok(inner),
                    other => Err($crate::error::CategoryError::WrongCategory {
                        expected: <$name as $crate::terms::Term>::KIND.to_string(),
                        actual: other.kind(),
                    }
                    .into()),
                }
            }
        }

        impl TryFrom<$crate::expr::Expr> for $name {
            type Error = $crate::error::BridgeError;

            fn try_from(expr: $crate::expr::Expr) -> Result<Self, Self::Error> {
                expr.lift()?.try_into()
            }
        }

        impl From<$name> for $crate::lift::Dynamic {
            fn from(term: $name) -> Self {
                $crate::lift::Dynamic::$variant(term)
            }
        }

        impl From<$name> for $crate::expr::Expr {
            fn from(term: $name) -> Self {
                term.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                std::fmt::Display::fmt(&self.0, f)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

/// Operators of one argument whose result category is fixed.
macro_rules! unary_ops {
    ($($(#[$meta:meta])* $method:ident => $op:expr, $out:ident;)*) => {
        $(
            $(#[$meta])*
            pub fn $method(&self) -> $crate::error::BridgeResult<$out> {
                self.0.apply($op, &[]).map($out::unchecked)
            }
        )*
    };
}

/// Operators of two same-category arguments whose result category is fixed.
macro_rules! binary_ops {
    ($($(#[$meta:meta])* $method:ident => $op:expr, $out:ident;)*) => {
        $(
            $(#[$meta])*
            pub fn $method(&self, other: &Self) -> $crate::error::BridgeResult<$out> {
                self.0.apply($op, &[&other.0]).map($out::unchecked)
            }
        )*
    };
}

mod array;
mod bool;
mod bv;
mod int;
mod real;
mod uninterpreted;

pub use self::array::Array;
pub use self::bool::Bool;
pub use self::bv::BV;
pub use self::int::Int;
pub use self::real::Real;
pub use self::uninterpreted::Uninterpreted;
