//! Ground values and evaluation.
//!
//! [`apply_op`] is the single definition of what a builtin operator means on
//! concrete values. The rewriter uses it for constant folding, model
//! evaluation uses it through the rewriter, and model search calls it
//! directly on candidate assignments.

use std::cmp::Ordering;
use std::collections::BTreeMap;

use num_bigint::{BigInt, BigUint};
use num_integer::Integer;
use num_rational::BigRational;
use num_traits::{One, Signed, ToPrimitive, Zero};
use rustc_hash::FxHashMap;

use super::node::{Args, Func, NodeData, NodeId, SortData};
use super::{Engine, Failure, Step};
use crate::native::BuiltinOp;

/// A concrete value of a term.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum Value {
    Bool(bool),
    Int(BigInt),
    Real(BigRational),
    Bv { bits: BigUint, width: u32 },
    Elem { sort: NodeId, index: u32 },
}

/// Why a ground evaluation could not produce a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum EvalStop {
    /// The operator is not interpreted on these values.
    Unsupported,
    /// Division by zero; SMT-LIB leaves the result unspecified.
    DivByZero,
}

type Eval<T> = Result<T, EvalStop>;

// ---------------------------------------------------------------------------
// Bit-vector helpers
// ---------------------------------------------------------------------------

pub(crate) fn bv_mask(width: u32) -> BigUint {
    (BigUint::one() << width as usize) - BigUint::one()
}

fn bv(bits: BigUint, width: u32) -> Value {
    Value::Bv {
        bits: bits & bv_mask(width),
        width,
    }
}

fn negative(bits: &BigUint, width: u32) -> bool {
    width > 0 && !(bits >> (width as usize - 1)).is_zero()
}

pub(crate) fn bv_to_signed(bits: &BigUint, width: u32) -> BigInt {
    let value = BigInt::from(bits.clone());
    if negative(bits, width) {
        value - (BigInt::one() << width as usize)
    } else {
        value
    }
}

pub(crate) fn bv_from_signed(value: &BigInt, width: u32) -> BigUint {
    let modulus = BigInt::one() << width as usize;
    value.mod_floor(&modulus).to_biguint().unwrap_or_default()
}

fn udiv(a: &BigUint, b: &BigUint, width: u32) -> BigUint {
    if b.is_zero() { bv_mask(width) } else { a / b }
}

fn urem(a: &BigUint, b: &BigUint) -> BigUint {
    if b.is_zero() { a.clone() } else { a % b }
}

fn bv_neg(a: &BigUint, width: u32) -> BigUint {
    bv_from_signed(&-BigInt::from(a.clone()), width)
}

fn bv_abs(a: &BigUint, width: u32) -> BigUint {
    if negative(a, width) { bv_neg(a, width) } else { a.clone() }
}

/// Rotate left by `amount` modulo `width`.
fn rotate_left(a: &BigUint, amount: &BigUint, width: u32) -> BigUint {
    let s = (amount % width).to_usize().unwrap_or(0);
    if s == 0 {
        return a.clone();
    }
    ((a << s) | (a >> (width as usize - s))) & bv_mask(width)
}

fn shift_amount(b: &BigUint, width: u32) -> Option<usize> {
    b.to_usize().filter(|&s| s < width as usize)
}

// ---------------------------------------------------------------------------
// Operator semantics
// ---------------------------------------------------------------------------

fn ints(args: &[Value]) -> Option<Vec<&BigInt>> {
    args.iter()
        .map(|a| match a {
            Value::Int(i) => Some(i),
            _ => None,
        })
        .collect()
}

fn reals(args: &[Value]) -> Option<Vec<&BigRational>> {
    args.iter()
        .map(|a| match a {
            Value::Real(r) => Some(r),
            _ => None,
        })
        .collect()
}

fn bools(args: &[Value]) -> Option<Vec<bool>> {
    args.iter()
        .map(|a| match a {
            Value::Bool(b) => Some(*b),
            _ => None,
        })
        .collect()
}

fn bvs(args: &[Value]) -> Option<(Vec<&BigUint>, u32)> {
    let mut width = None;
    let mut out = Vec::with_capacity(args.len());
    for a in args {
        let Value::Bv { bits, width: w } = a else {
            return None;
        };
        width.get_or_insert(*w);
        out.push(bits);
    }
    width.map(|w| (out, w))
}

fn euclid_div(a: &BigInt, b: &BigInt) -> Eval<(BigInt, BigInt)> {
    if b.is_zero() {
        return Err(EvalStop::DivByZero);
    }
    let r = a.mod_floor(&b.abs());
    let q = (a - &r) / b;
    Ok((q, r))
}

fn compare(op: BuiltinOp, ord: Ordering) -> bool {
    match op {
        BuiltinOp::Lt | BuiltinOp::BvUlt | BuiltinOp::BvSlt => ord == Ordering::Less,
        BuiltinOp::Le | BuiltinOp::BvUle | BuiltinOp::BvSle => ord != Ordering::Greater,
        BuiltinOp::Gt | BuiltinOp::BvUgt | BuiltinOp::BvSgt => ord == Ordering::Greater,
        _ => ord != Ordering::Less,
    }
}

fn arith(op: BuiltinOp, args: &[Value]) -> Eval<Value> {
    use BuiltinOp::*;
    if let Some(xs) = ints(args) {
        return match op {
            Add => Ok(Value::Int(xs.into_iter().fold(BigInt::zero(), |acc, x| acc + x))),
            Mul => Ok(Value::Int(xs.into_iter().fold(BigInt::one(), |acc, x| acc * x))),
            Neg if xs.len() == 1 => Ok(Value::Int(-xs[0])),
            Sub if xs.len() == 1 => Ok(Value::Int(-xs[0])),
            Sub if !xs.is_empty() => Ok(Value::Int(
                xs[1..].iter().fold(xs[0].clone(), |acc, x| acc - *x),
            )),
            Div if xs.len() == 2 => Ok(Value::Int(euclid_div(xs[0], xs[1])?.0)),
            Mod if xs.len() == 2 => Ok(Value::Int(euclid_div(xs[0], xs[1])?.1)),
            Rem if xs.len() == 2 => {
                let r = euclid_div(xs[0], xs[1])?.1;
                Ok(Value::Int(if xs[1].is_negative() { -r } else { r }))
            }
            Power if xs.len() == 2 => {
                let exp = xs[1].to_u32().ok_or(EvalStop::Unsupported)?;
                Ok(Value::Int(num_traits::pow(xs[0].clone(), exp as usize)))
            }
            Lt | Le | Gt | Ge if xs.len() == 2 => Ok(Value::Bool(compare(op, xs[0].cmp(xs[1])))),
            ToReal if xs.len() == 1 => Ok(Value::Real(BigRational::from_integer(xs[0].clone()))),
            _ => Err(EvalStop::Unsupported),
        };
    }
    if let Some(xs) = reals(args) {
        return match op {
            Add => Ok(Value::Real(xs.into_iter().fold(BigRational::zero(), |acc, x| acc + x))),
            Mul => Ok(Value::Real(xs.into_iter().fold(BigRational::one(), |acc, x| acc * x))),
            Neg if xs.len() == 1 => Ok(Value::Real(-xs[0])),
            Sub if xs.len() == 1 => Ok(Value::Real(-xs[0])),
            Sub if !xs.is_empty() => Ok(Value::Real(
                xs[1..].iter().fold(xs[0].clone(), |acc, x| acc - *x),
            )),
            Div if xs.len() == 2 => {
                if xs[1].is_zero() {
                    Err(EvalStop::DivByZero)
                } else {
                    Ok(Value::Real(xs[0] / xs[1]))
                }
            }
            Power if xs.len() == 2 => {
                if !xs[1].is_integer() {
                    return Err(EvalStop::Unsupported);
                }
                let exp = xs[1].to_integer().to_i32().ok_or(EvalStop::Unsupported)?;
                if exp < 0 && xs[0].is_zero() {
                    return Err(EvalStop::Unsupported);
                }
                Ok(Value::Real(num_traits::Pow::pow(xs[0], exp)))
            }
            Lt | Le | Gt | Ge if xs.len() == 2 => Ok(Value::Bool(compare(op, xs[0].cmp(xs[1])))),
            ToInt if xs.len() == 1 => Ok(Value::Int(xs[0].floor().to_integer())),
            IsInt if xs.len() == 1 => Ok(Value::Bool(xs[0].is_integer())),
            _ => Err(EvalStop::Unsupported),
        };
    }
    Err(EvalStop::Unsupported)
}

fn bitvec(op: BuiltinOp, args: &[Value]) -> Eval<Value> {
    use BuiltinOp::*;
    let (xs, width) = bvs(args).ok_or(EvalStop::Unsupported)?;
    let w = width as usize;
    let value = match (op, xs.as_slice()) {
        (BvNot, [a]) => bv(bv_mask(width) ^ *a, width),
        (BvNeg, [a]) => bv(bv_neg(a, width), width),
        (BvAnd, [a, b]) => bv(*a & *b, width),
        (BvOr, [a, b]) => bv(*a | *b, width),
        (BvXor, [a, b]) => bv(*a ^ *b, width),
        (BvNand, [a, b]) => bv(bv_mask(width) ^ (*a & *b), width),
        (BvNor, [a, b]) => bv(bv_mask(width) ^ (*a | *b), width),
        (BvXnor, [a, b]) => bv(bv_mask(width) ^ (*a ^ *b), width),
        (BvRedAnd, [a]) => bv(BigUint::from(u8::from(**a == bv_mask(width))), 1),
        (BvRedOr, [a]) => bv(BigUint::from(u8::from(!a.is_zero())), 1),
        (BvAdd, [a, b]) => bv(*a + *b, width),
        (BvSub, [a, b]) => bv((*a + (BigUint::one() << w)) - *b, width),
        (BvMul, [a, b]) => bv(*a * *b, width),
        (BvUDiv, [a, b]) => bv(udiv(a, b, width), width),
        (BvURem, [a, b]) => bv(urem(a, b), width),
        (BvSDiv, [a, b]) => {
            let q = udiv(&bv_abs(a, width), &bv_abs(b, width), width);
            if negative(a, width) != negative(b, width) {
                bv(bv_neg(&q, width), width)
            } else {
                bv(q, width)
            }
        }
        (BvSRem, [a, b]) => {
            let r = urem(&bv_abs(a, width), &bv_abs(b, width));
            if negative(a, width) {
                bv(bv_neg(&r, width), width)
            } else {
                bv(r, width)
            }
        }
        (BvSMod, [a, b]) => {
            if b.is_zero() {
                bv((*a).clone(), width)
            } else {
                let u = urem(&bv_abs(a, width), &bv_abs(b, width));
                let bits = match (negative(a, width), negative(b, width)) {
                    _ if u.is_zero() => u,
                    (false, false) => u,
                    (true, false) => bv_neg(&u, width) + *b,
                    (false, true) => u + *b,
                    (true, true) => bv_neg(&u, width),
                };
                bv(bits, width)
            }
        }
        (BvShl, [a, b]) => match shift_amount(b, width) {
            Some(s) => bv(*a << s, width),
            None => bv(BigUint::zero(), width),
        },
        (BvLShr, [a, b]) => match shift_amount(b, width) {
            Some(s) => bv(*a >> s, width),
            None => bv(BigUint::zero(), width),
        },
        (BvAShr, [a, b]) => {
            let signed = bv_to_signed(a, width);
            let s = shift_amount(b, width).unwrap_or(w);
            bv(bv_from_signed(&(signed >> s), width), width)
        }
        (BvRotateLeft, [a, b]) => bv(rotate_left(a, b, width), width),
        (BvRotateRight, [a, b]) => {
            let back = (BigUint::from(width) - (*b % width)) % width;
            bv(rotate_left(a, &back, width), width)
        }
        (BvUlt | BvUle | BvUgt | BvUge, [a, b]) => Value::Bool(compare(op, a.cmp(b))),
        (BvSlt | BvSle | BvSgt | BvSge, [a, b]) => Value::Bool(compare(
            op,
            bv_to_signed(a, width).cmp(&bv_to_signed(b, width)),
        )),
        (Extract { high, low }, [a]) if high >= low && high < width => {
            bv(*a >> low as usize, high - low + 1)
        }
        (ZeroExt(n), [a]) => {
            let wide = width.checked_add(n).ok_or(EvalStop::Unsupported)?;
            bv((*a).clone(), wide)
        }
        (SignExt(n), [a]) => {
            let wide = width.checked_add(n).ok_or(EvalStop::Unsupported)?;
            bv(bv_from_signed(&bv_to_signed(a, width), wide), wide)
        }
        (Repeat(n), [a]) if n >= 1 => {
            let wide = width.checked_mul(n).ok_or(EvalStop::Unsupported)?;
            let mut bits = BigUint::zero();
            for _ in 0..n {
                bits = (bits << w) | *a;
            }
            bv(bits, wide)
        }
        (Bv2Int { signed }, [a]) => {
            if signed {
                Value::Int(bv_to_signed(a, width))
            } else {
                Value::Int(BigInt::from((*a).clone()))
            }
        }
        _ => return Err(EvalStop::Unsupported),
    };
    Ok(value)
}

fn concat(args: &[Value]) -> Eval<Value> {
    let mut bits = BigUint::zero();
    let mut total = 0u32;
    for a in args {
        let Value::Bv { bits: b, width } = a else {
            return Err(EvalStop::Unsupported);
        };
        bits = (bits << *width as usize) | b;
        total = total.checked_add(*width).ok_or(EvalStop::Unsupported)?;
    }
    Ok(bv(bits, total))
}

/// Evaluate a builtin operator on concrete arguments.
pub(crate) fn apply_op(op: BuiltinOp, args: &[Value]) -> Eval<Value> {
    use BuiltinOp::*;
    match op {
        True => Ok(Value::Bool(true)),
        False => Ok(Value::Bool(false)),
        Not | And | Or | Xor | Implies => {
            let bs = bools(args).ok_or(EvalStop::Unsupported)?;
            match (op, bs.as_slice()) {
                (Not, [a]) => Ok(Value::Bool(!a)),
                (And, _) => Ok(Value::Bool(bs.iter().all(|b| *b))),
                (Or, _) => Ok(Value::Bool(bs.iter().any(|b| *b))),
                (Xor, [a, b]) => Ok(Value::Bool(a != b)),
                (Implies, [a, b]) => Ok(Value::Bool(!a || *b)),
                _ => Err(EvalStop::Unsupported),
            }
        }
        Eq => match args {
            [a, b] => Ok(Value::Bool(a == b)),
            _ => Err(EvalStop::Unsupported),
        },
        Distinct => {
            for (i, a) in args.iter().enumerate() {
                if args[i + 1..].contains(a) {
                    return Ok(Value::Bool(false));
                }
            }
            Ok(Value::Bool(true))
        }
        Ite => match args {
            [Value::Bool(c), a, b] => Ok(if *c { a.clone() } else { b.clone() }),
            _ => Err(EvalStop::Unsupported),
        },
        Add | Sub | Mul | Neg | Div | Mod | Rem | Power | Lt | Le | Gt | Ge | ToReal | ToInt
        | IsInt => arith(op, args),
        Int2Bv(width) => match args {
            [Value::Int(i)] if width > 0 => Ok(bv(bv_from_signed(i, width), width)),
            _ => Err(EvalStop::Unsupported),
        },
        Concat => concat(args),
        Select | Store => Err(EvalStop::Unsupported),
        _ => bitvec(op, args),
    }
}

// ---------------------------------------------------------------------------
// Models
// ---------------------------------------------------------------------------

/// Interpretation of a function: point entries plus an else value.
#[derive(Debug, Clone)]
pub(crate) struct FuncInterp {
    pub entries: Vec<(Args, NodeId)>,
    pub default: NodeId,
}

#[derive(Debug, Clone)]
pub(crate) enum Interp {
    Const(NodeId),
    Func(FuncInterp),
}

impl Interp {
    fn nodes(&self) -> Args {
        let mut out = Args::new();
        match self {
            Interp::Const(v) => out.push(*v),
            Interp::Func(f) => {
                for (args, v) in &f.entries {
                    out.extend(args.iter().copied());
                    out.push(*v);
                }
                out.push(f.default);
            }
        }
        out
    }
}

/// A model: interpretations keyed by declaration node.
#[derive(Debug, Default)]
pub(crate) struct ModelData {
    pub rc: u32,
    pub interps: BTreeMap<NodeId, Interp>,
}

impl ModelData {
    /// Every node the model keeps alive.
    pub fn held_nodes(&self) -> Vec<NodeId> {
        let mut out = Vec::new();
        for (decl, interp) in &self.interps {
            out.push(*decl);
            out.extend(interp.nodes());
        }
        out
    }
}

// ---------------------------------------------------------------------------
// Evaluation against the node table
// ---------------------------------------------------------------------------

impl Engine {
    /// Evaluate `id` under `interps`, building result nodes.
    pub(super) fn eval_node(
        &mut self,
        id: NodeId,
        interps: &BTreeMap<NodeId, Interp>,
        completion: bool,
        memo: &mut FxHashMap<NodeId, NodeId>,
    ) -> Step<NodeId> {
        if let Some(&done) = memo.get(&id) {
            return Ok(done);
        }
        let data = self.node(id)?.clone();
        let result = match data {
            NodeData::Sort(_) | NodeData::Decl(_) => {
                return Err(Failure::invalid_arg("only terms can be evaluated"));
            }
            NodeData::Numeral { .. } | NodeData::Algebraic { .. } | NodeData::Elem { .. } => id,
            NodeData::App {
                func: Func::Builtin(BuiltinOp::Ite),
                args,
                sort,
            } => {
                let cond = self.eval_node(args[0], interps, completion, memo)?;
                match self.bool_literal(cond) {
                    Some(true) => self.eval_node(args[1], interps, completion, memo)?,
                    Some(false) => self.eval_node(args[2], interps, completion, memo)?,
                    None => {
                        let then = self.eval_node(args[1], interps, completion, memo)?;
                        let other = self.eval_node(args[2], interps, completion, memo)?;
                        self.rewrite_app(BuiltinOp::Ite, Args::from_slice(&[cond, then, other]), sort)
                    }
                }
            }
            NodeData::App {
                func: Func::Builtin(op),
                args,
                sort,
            } => {
                let mut values = Args::new();
                for arg in args {
                    values.push(self.eval_node(arg, interps, completion, memo)?);
                }
                self.rewrite_app(op, values, sort)
            }
            NodeData::App {
                func: Func::ConstArray,
                args,
                sort,
            } => {
                let value = self.eval_node(args[0], interps, completion, memo)?;
                self.nodes.intern(NodeData::App {
                    func: Func::ConstArray,
                    args: Args::from_slice(&[value]),
                    sort,
                })
            }
            NodeData::App {
                func: Func::Decl(decl),
                args,
                sort,
            } => {
                let mut values = Args::new();
                for arg in args {
                    values.push(self.eval_node(arg, interps, completion, memo)?);
                }
                match interps.get(&decl) {
                    Some(Interp::Const(v)) if values.is_empty() => *v,
                    Some(Interp::Func(f)) => {
                        match f.entries.iter().find(|(point, _)| *point == values) {
                            Some((_, v)) => *v,
                            None if values.iter().all(|v| self.is_value(*v)) => f.default,
                            None => self.nodes.intern(NodeData::App {
                                func: Func::Decl(decl),
                                args: values,
                                sort,
                            }),
                        }
                    }
                    _ if completion => self.default_value(sort)?,
                    _ => self.nodes.intern(NodeData::App {
                        func: Func::Decl(decl),
                        args: values,
                        sort,
                    }),
                }
            }
        };
        memo.insert(id, result);
        Ok(result)
    }

    /// The value chosen for an unconstrained term of `sort`.
    pub(super) fn default_value(&mut self, sort: NodeId) -> Step<NodeId> {
        let data = self.sort_data(sort)?.clone();
        let node = match data {
            SortData::Bool => self.mk_bool_node(false),
            SortData::Int | SortData::Real | SortData::BitVec(_) => self.nodes.intern(NodeData::Numeral {
                value: BigRational::zero(),
                sort,
            }),
            SortData::Uninterpreted(_) => self.nodes.intern(NodeData::Elem { sort, index: 0 }),
            SortData::Array { range, .. } => {
                let inner = self.default_value(range)?;
                self.nodes.intern(NodeData::App {
                    func: Func::ConstArray,
                    args: Args::from_slice(&[inner]),
                    sort,
                })
            }
        };
        Ok(node)
    }

    /// Evaluate `id` to a concrete value under a candidate assignment.
    ///
    /// Uninterpreted constants and applications are looked up in
    /// `assignment` by node.
    pub(super) fn eval_value(
        &self,
        id: NodeId,
        assignment: &FxHashMap<NodeId, Value>,
        memo: &mut FxHashMap<NodeId, Value>,
    ) -> Eval<Value> {
        if let Some(v) = memo.get(&id) {
            return Ok(v.clone());
        }
        if let Some(v) = self.node_value(id) {
            return Ok(v);
        }
        let value = match self.nodes.get(id) {
            Some(NodeData::App {
                func: Func::Builtin(BuiltinOp::Ite),
                args,
                ..
            }) => match self.eval_value(args[0], assignment, memo)? {
                Value::Bool(true) => self.eval_value(args[1], assignment, memo)?,
                Value::Bool(false) => self.eval_value(args[2], assignment, memo)?,
                _ => return Err(EvalStop::Unsupported),
            },
            Some(NodeData::App {
                func: Func::Builtin(op),
                args,
                ..
            }) => {
                let op = *op;
                let mut values = Vec::with_capacity(args.len());
                for &arg in args.iter() {
                    values.push(self.eval_value(arg, assignment, memo)?);
                }
                apply_op(op, &values)?
            }
            Some(NodeData::App {
                func: Func::Decl(_), ..
            }) => assignment.get(&id).cloned().ok_or(EvalStop::Unsupported)?,
            _ => return Err(EvalStop::Unsupported),
        };
        memo.insert(id, value.clone());
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn int(v: i64) -> Value {
        Value::Int(BigInt::from(v))
    }

    fn bv4(v: u32) -> Value {
        Value::Bv {
            bits: BigUint::from(v),
            width: 4,
        }
    }

    #[test]
    fn integer_division_is_euclidean() {
        assert_eq!(apply_op(BuiltinOp::Div, &[int(7), int(2)]), Ok(int(3)));
        assert_eq!(apply_op(BuiltinOp::Div, &[int(-7), int(2)]), Ok(int(-4)));
        assert_eq!(apply_op(BuiltinOp::Div, &[int(-7), int(-2)]), Ok(int(4)));
        assert_eq!(apply_op(BuiltinOp::Mod, &[int(-7), int(2)]), Ok(int(1)));
        assert_eq!(apply_op(BuiltinOp::Mod, &[int(-7), int(-2)]), Ok(int(1)));
        assert_eq!(apply_op(BuiltinOp::Rem, &[int(7), int(-2)]), Ok(int(-1)));
        assert_eq!(
            apply_op(BuiltinOp::Div, &[int(1), int(0)]),
            Err(EvalStop::DivByZero)
        );
    }

    #[test]
    fn bitvector_arithmetic_wraps() {
        assert_eq!(apply_op(BuiltinOp::BvAdd, &[bv4(15), bv4(2)]), Ok(bv4(1)));
        assert_eq!(apply_op(BuiltinOp::BvSub, &[bv4(1), bv4(2)]), Ok(bv4(15)));
        assert_eq!(apply_op(BuiltinOp::BvNeg, &[bv4(1)]), Ok(bv4(15)));
        assert_eq!(apply_op(BuiltinOp::BvNot, &[bv4(5)]), Ok(bv4(10)));
        assert_eq!(apply_op(BuiltinOp::BvUDiv, &[bv4(5), bv4(0)]), Ok(bv4(15)));
        assert_eq!(apply_op(BuiltinOp::BvURem, &[bv4(5), bv4(0)]), Ok(bv4(5)));
    }

    #[test]
    fn bitvector_signed_ops() {
        // -7 sdiv 2 = -3, -7 srem 2 = -1, -7 smod 2 = 1
        assert_eq!(apply_op(BuiltinOp::BvSDiv, &[bv4(9), bv4(2)]), Ok(bv4(13)));
        assert_eq!(apply_op(BuiltinOp::BvSRem, &[bv4(9), bv4(2)]), Ok(bv4(15)));
        assert_eq!(apply_op(BuiltinOp::BvSMod, &[bv4(9), bv4(2)]), Ok(bv4(1)));
        assert_eq!(apply_op(BuiltinOp::BvSlt, &[bv4(15), bv4(0)]), Ok(Value::Bool(true)));
        assert_eq!(apply_op(BuiltinOp::BvUlt, &[bv4(15), bv4(0)]), Ok(Value::Bool(false)));
        assert_eq!(apply_op(BuiltinOp::BvAShr, &[bv4(8), bv4(1)]), Ok(bv4(12)));
        assert_eq!(apply_op(BuiltinOp::BvAShr, &[bv4(8), bv4(9)]), Ok(bv4(15)));
    }

    #[test]
    fn bitvector_resizing() {
        assert_eq!(
            apply_op(BuiltinOp::Extract { high: 3, low: 2 }, &[bv4(13)]),
            Ok(Value::Bv {
                bits: BigUint::from(3u32),
                width: 2
            })
        );
        assert_eq!(
            apply_op(BuiltinOp::SignExt(4), &[bv4(8)]),
            Ok(Value::Bv {
                bits: BigUint::from(0xf8u32),
                width: 8
            })
        );
        assert_eq!(
            apply_op(BuiltinOp::Concat, &[bv4(1), bv4(2)]),
            Ok(Value::Bv {
                bits: BigUint::from(0x12u32),
                width: 8
            })
        );
        assert_eq!(
            apply_op(BuiltinOp::Bv2Int { signed: true }, &[bv4(15)]),
            Ok(int(-1))
        );
        assert_eq!(apply_op(BuiltinOp::Int2Bv(4), &[int(-1)]), Ok(bv4(15)));
    }

    #[test]
    fn real_power_and_floor() {
        let half = Value::Real(BigRational::new(BigInt::from(1), BigInt::from(2)));
        let two = Value::Real(BigRational::from_integer(BigInt::from(2)));
        assert_eq!(
            apply_op(BuiltinOp::Power, &[half.clone(), two.clone()]),
            Ok(Value::Real(BigRational::new(BigInt::from(1), BigInt::from(4))))
        );
        assert_eq!(
            apply_op(BuiltinOp::Power, &[two, half.clone()]),
            Err(EvalStop::Unsupported)
        );
        let neg = Value::Real(BigRational::new(BigInt::from(-3), BigInt::from(2)));
        assert_eq!(apply_op(BuiltinOp::ToInt, &[neg]), Ok(int(-2)));
    }

    #[test]
    fn distinct_and_ite() {
        assert_eq!(
            apply_op(BuiltinOp::Distinct, &[int(1), int(2), int(1)]),
            Ok(Value::Bool(false))
        );
        assert_eq!(
            apply_op(BuiltinOp::Ite, &[Value::Bool(false), int(1), int(2)]),
            Ok(int(2))
        );
    }
}
