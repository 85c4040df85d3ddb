//! Sort checking for builtin operators.

use super::node::{NodeData, NodeId, SortData};
use super::{Engine, Failure, Step};
use crate::native::BuiltinOp;

fn checked_width(width: Option<u32>) -> Step<u32> {
    width.ok_or_else(|| Failure::invalid_arg("bit-vector width overflows"))
}

impl Engine {
    /// Result sort of `op` applied to `args`, or a sort error.
    pub(super) fn op_sort(&mut self, op: BuiltinOp, args: &[NodeId]) -> Step<NodeId> {
        use BuiltinOp::*;
        let sorts = args
            .iter()
            .map(|a| self.sort_of(*a))
            .collect::<Step<Vec<_>>>()?;
        let arity = |n: usize| -> Step<()> {
            if sorts.len() == n {
                Ok(())
            } else {
                Err(Failure::invalid_arg(format!(
                    "{op:?} expects {n} arguments, got {}",
                    sorts.len()
                )))
            }
        };
        let at_least = |n: usize| -> Step<()> {
            if sorts.len() >= n {
                Ok(())
            } else {
                Err(Failure::invalid_arg(format!(
                    "{op:?} expects at least {n} arguments, got {}",
                    sorts.len()
                )))
            }
        };
        let bool_sort = self.bool_sort;

        match op {
            True | False => {
                arity(0)?;
                Ok(bool_sort)
            }
            Not => {
                arity(1)?;
                self.all_bool(&sorts)?;
                Ok(bool_sort)
            }
            And | Or => {
                self.all_bool(&sorts)?;
                Ok(bool_sort)
            }
            Xor | Implies => {
                arity(2)?;
                self.all_bool(&sorts)?;
                Ok(bool_sort)
            }
            Eq => {
                arity(2)?;
                self.all_same(&sorts)?;
                Ok(bool_sort)
            }
            Distinct => {
                at_least(2)?;
                self.all_same(&sorts)?;
                Ok(bool_sort)
            }
            Ite => {
                arity(3)?;
                if sorts[0] != bool_sort {
                    return Err(Failure::sort_error("ite condition must be boolean"));
                }
                self.all_same(&sorts[1..])?;
                Ok(sorts[1])
            }
            Add | Mul | Sub => {
                at_least(1)?;
                self.arithmetic(&sorts)
            }
            Neg => {
                arity(1)?;
                self.arithmetic(&sorts)
            }
            Div | Power => {
                arity(2)?;
                self.arithmetic(&sorts)
            }
            Mod | Rem => {
                arity(2)?;
                if sorts.iter().all(|s| *s == self.int_sort) {
                    Ok(self.int_sort)
                } else {
                    Err(Failure::sort_error(format!("{op:?} expects integer arguments")))
                }
            }
            Lt | Le | Gt | Ge => {
                arity(2)?;
                self.arithmetic(&sorts)?;
                Ok(bool_sort)
            }
            ToReal => {
                arity(1)?;
                self.expect(sorts[0], self.int_sort, "to_real expects an integer")?;
                Ok(self.real_sort)
            }
            ToInt => {
                arity(1)?;
                self.expect(sorts[0], self.real_sort, "to_int expects a real")?;
                Ok(self.int_sort)
            }
            IsInt => {
                arity(1)?;
                self.expect(sorts[0], self.real_sort, "is_int expects a real")?;
                Ok(bool_sort)
            }
            BvNot | BvNeg => {
                arity(1)?;
                self.same_width(&sorts)?;
                Ok(sorts[0])
            }
            BvRedAnd | BvRedOr => {
                arity(1)?;
                self.width_of(sorts[0])?;
                Ok(self.bv_sort(1))
            }
            BvAnd | BvOr | BvXor | BvNand | BvNor | BvXnor | BvAdd | BvSub | BvMul | BvUDiv
            | BvURem | BvSDiv | BvSRem | BvSMod | BvShl | BvLShr | BvAShr | BvRotateLeft
            | BvRotateRight => {
                arity(2)?;
                self.same_width(&sorts)?;
                Ok(sorts[0])
            }
            BvUlt | BvUle | BvUgt | BvUge | BvSlt | BvSle | BvSgt | BvSge => {
                arity(2)?;
                self.same_width(&sorts)?;
                Ok(bool_sort)
            }
            Concat => {
                at_least(2)?;
                let mut total = 0u32;
                for sort in &sorts {
                    total = checked_width(total.checked_add(self.width_of(*sort)?))?;
                }
                Ok(self.bv_sort(total))
            }
            Extract { high, low } => {
                arity(1)?;
                let width = self.width_of(sorts[0])?;
                if low > high || high >= width {
                    return Err(Failure::invalid_arg(format!(
                        "extract [{high}:{low}] out of range for width {width}"
                    )));
                }
                Ok(self.bv_sort(high - low + 1))
            }
            ZeroExt(n) | SignExt(n) => {
                arity(1)?;
                let width = self.width_of(sorts[0])?;
                Ok(self.bv_sort(checked_width(width.checked_add(n))?))
            }
            Repeat(n) => {
                arity(1)?;
                let width = self.width_of(sorts[0])?;
                if n == 0 {
                    return Err(Failure::invalid_arg("repeat count must be positive"));
                }
                Ok(self.bv_sort(checked_width(width.checked_mul(n))?))
            }
            Int2Bv(n) => {
                arity(1)?;
                self.expect(sorts[0], self.int_sort, "int2bv expects an integer")?;
                if n == 0 {
                    return Err(Failure::invalid_arg("bit-vector width must be positive"));
                }
                Ok(self.bv_sort(n))
            }
            Bv2Int { .. } => {
                arity(1)?;
                self.width_of(sorts[0])?;
                Ok(self.int_sort)
            }
            Select => {
                arity(2)?;
                let (domain, range) = self.array_parts(sorts[0])?;
                self.expect(sorts[1], domain, "select index has the wrong sort")?;
                Ok(range)
            }
            Store => {
                arity(3)?;
                let (domain, range) = self.array_parts(sorts[0])?;
                self.expect(sorts[1], domain, "store index has the wrong sort")?;
                self.expect(sorts[2], range, "stored value has the wrong sort")?;
                Ok(sorts[0])
            }
        }
    }

    fn expect(&self, actual: NodeId, expected: NodeId, message: &str) -> Step<()> {
        if actual == expected {
            Ok(())
        } else {
            Err(Failure::sort_error(message))
        }
    }

    fn all_bool(&self, sorts: &[NodeId]) -> Step<()> {
        if sorts.iter().all(|s| *s == self.bool_sort) {
            Ok(())
        } else {
            Err(Failure::sort_error("expected boolean arguments"))
        }
    }

    fn all_same(&self, sorts: &[NodeId]) -> Step<()> {
        match sorts.split_first() {
            Some((first, rest)) if rest.iter().any(|s| s != first) => {
                Err(Failure::sort_error("arguments must have the same sort"))
            }
            _ => Ok(()),
        }
    }

    fn arithmetic(&self, sorts: &[NodeId]) -> Step<NodeId> {
        self.all_same(sorts)?;
        match sorts.first() {
            Some(s) if *s == self.int_sort || *s == self.real_sort => Ok(*s),
            _ => Err(Failure::sort_error("expected int or real arguments")),
        }
    }

    fn width_of(&self, sort: NodeId) -> Step<u32> {
        self.bv_width(sort)
            .ok_or_else(|| Failure::sort_error("expected bit-vector arguments"))
    }

    fn same_width(&self, sorts: &[NodeId]) -> Step<()> {
        for sort in sorts {
            self.width_of(*sort)?;
        }
        self.all_same(sorts)
    }

    fn array_parts(&self, sort: NodeId) -> Step<(NodeId, NodeId)> {
        match self.nodes.get(sort) {
            Some(NodeData::Sort(SortData::Array { domain, range })) => Ok((*domain, *range)),
            _ => Err(Failure::sort_error("expected an array")),
        }
    }
}
