//! Array terms.

use crate::error::BridgeResult;
use crate::expr::Expr;
use crate::lift::{self, Dynamic};
use crate::native::{BuiltinOp, SortKind};
use crate::sort::Sort;
use crate::terms::Term;

term_type!(
    /// A term of sort `(Array D R)`.
    Array,
    Array,
    SortKind::Array
);

impl Array {
    pub fn domain(&self) -> BridgeResult<Sort> {
        self.sort()?.array_domain()
    }

    pub fn range(&self) -> BridgeResult<Sort> {
        self.sort()?.array_range()
    }

    /// The element at `index`, lifted by the range's category.
    pub fn select(&self, index: &Expr) -> BridgeResult<Dynamic> {
        let range = self.range()?;
        let expr = self.0.apply(BuiltinOp::Select, &[index])?;
        lift::lift(expr, Some(range.kind()))
    }

    /// The array equal to `self` except that `index` maps to `value`.
    pub fn store(&self, index: &Expr, value: &Expr) -> BridgeResult<Array> {
        self.0
            .apply(BuiltinOp::Store, &[index, value])
            .map(Array::unchecked)
    }
}
