//! Canonicalizing rewriter behind `simplify` and model evaluation.
//!
//! [`Engine::rewrite_app`] turns one application with already-canonical
//! arguments into canonical form:
//!
//! - ground applications fold to values;
//! - sums become `(+ c t1 t2 ...)` with the constant first and the terms
//!   ordered by node, each term `(* k m)` or `m` for a monomial `m`;
//! - conjunctions and disjunctions are flattened, sorted and deduplicated;
//! - double negation, `ite` with a literal condition and `select` over
//!   `store` are resolved.
//!
//! Everything else is kept as built.
//!
//! Two sums that are equal as linear combinations end up as the same node.

use std::collections::BTreeMap;

use num_rational::BigRational;
use num_traits::{One, Zero};
use rustc_hash::FxHashMap;
use smallvec::smallvec;

use super::algebraic;
use super::eval::{Value, apply_op};
use super::node::{Args, Func, NodeData, NodeId};
use super::Engine;
use crate::native::BuiltinOp;

impl Engine {
    /// Simplify a term bottom-up.
    pub(super) fn simplify_term(&mut self, root: NodeId) -> NodeId {
        let mut memo = FxHashMap::default();
        self.simplify_rec(root, &mut memo)
    }

    fn simplify_rec(&mut self, id: NodeId, memo: &mut FxHashMap<NodeId, NodeId>) -> NodeId {
        if let Some(&done) = memo.get(&id) {
            return done;
        }
        let Some(data) = self.nodes.get(id).cloned() else {
            return id;
        };
        let result = match data {
            NodeData::App {
                func: Func::Builtin(op),
                args,
                sort,
            } => {
                let args: Args = args.iter().map(|a| self.simplify_rec(*a, memo)).collect();
                self.rewrite_app(op, args, sort)
            }
            NodeData::App { func, args, sort } => {
                let new_args: Args = args.iter().map(|a| self.simplify_rec(*a, memo)).collect();
                if new_args == args {
                    id
                } else {
                    self.nodes.intern(NodeData::App {
                        func,
                        args: new_args,
                        sort,
                    })
                }
            }
            _ => id,
        };
        memo.insert(id, result);
        result
    }

    /// Canonical form of `op(args)`, given canonical `args`.
    pub(super) fn rewrite_app(&mut self, op: BuiltinOp, args: Args, sort: NodeId) -> NodeId {
        use BuiltinOp::*;
        if let Some(folded) = self.fold(op, &args, sort) {
            return folded;
        }
        match op {
            Not => self.rewrite_not(args[0]),
            And | Or => self.rewrite_junction(op, &args),
            Implies => {
                let premise = self.rewrite_not(args[0]);
                self.rewrite_junction(Or, &[premise, args[1]])
            }
            Eq => self.rewrite_eq(args[0], args[1]),
            Ite => match self.bool_literal(args[0]) {
                Some(true) => args[1],
                Some(false) => args[2],
                None if args[1] == args[2] => args[1],
                None => self.mk_raw(op, args, sort),
            },
            Add | Sub | Neg => self.rewrite_sum(op, &args, sort),
            Lt | Le | Gt | Ge => self.rewrite_cmp(op, args),
            Power => self.rewrite_power(args, sort),
            Select => self.rewrite_select(args, sort),
            _ => self.mk_raw(op, args, sort),
        }
    }

    fn mk_raw(&mut self, op: BuiltinOp, args: Args, sort: NodeId) -> NodeId {
        self.nodes.intern(NodeData::App {
            func: Func::Builtin(op),
            args,
            sort,
        })
    }

    fn numeral(&mut self, value: BigRational, sort: NodeId) -> NodeId {
        self.nodes.intern(NodeData::Numeral { value, sort })
    }

    fn numeral_of(&self, id: NodeId) -> Option<&BigRational> {
        match self.nodes.get(id) {
            Some(NodeData::Numeral { value, .. }) => Some(value),
            _ => None,
        }
    }

    /// Arguments of `id` if it is an application of builtin `op`.
    fn builtin_args(&self, id: NodeId, op: BuiltinOp) -> Option<Args> {
        match self.nodes.get(id) {
            Some(NodeData::App {
                func: Func::Builtin(found),
                args,
                ..
            }) if *found == op => Some(args.clone()),
            _ => None,
        }
    }

    fn fold(&mut self, op: BuiltinOp, args: &[NodeId], sort: NodeId) -> Option<NodeId> {
        if matches!(op, BuiltinOp::Select | BuiltinOp::Store) {
            return None;
        }
        let values = args
            .iter()
            .map(|a| self.node_value(*a))
            .collect::<Option<Vec<Value>>>()?;
        let value = apply_op(op, &values).ok()?;
        Some(self.value_node(&value, sort))
    }

    // -- booleans -----------------------------------------------------------

    fn rewrite_not(&mut self, arg: NodeId) -> NodeId {
        if let Some(b) = self.bool_literal(arg) {
            return self.mk_bool_node(!b);
        }
        if let Some(inner) = self.builtin_args(arg, BuiltinOp::Not) {
            return inner[0];
        }
        let bool_sort = self.bool_sort;
        self.mk_raw(BuiltinOp::Not, smallvec![arg], bool_sort)
    }

    fn rewrite_junction(&mut self, op: BuiltinOp, args: &[NodeId]) -> NodeId {
        let unit = op == BuiltinOp::And;
        let mut flat = Vec::with_capacity(args.len());
        for &arg in args {
            match self.builtin_args(arg, op) {
                Some(inner) => flat.extend(inner),
                None => flat.push(arg),
            }
        }
        let mut kept = Vec::with_capacity(flat.len());
        for arg in flat {
            match self.bool_literal(arg) {
                Some(b) if b == unit => {}
                Some(_) => return self.mk_bool_node(!unit),
                None => kept.push(arg),
            }
        }
        kept.sort_unstable();
        kept.dedup();
        let complemented = kept.iter().any(|&arg| {
            self.builtin_args(arg, BuiltinOp::Not)
                .is_some_and(|inner| kept.binary_search(&inner[0]).is_ok())
        });
        if complemented {
            return self.mk_bool_node(!unit);
        }
        match kept.len() {
            0 => self.mk_bool_node(unit),
            1 => kept[0],
            _ => {
                let bool_sort = self.bool_sort;
                self.mk_raw(op, kept.into_iter().collect(), bool_sort)
            }
        }
    }

    fn rewrite_eq(&mut self, a: NodeId, b: NodeId) -> NodeId {
        if a == b {
            return self.mk_bool_node(true);
        }
        if self.is_value(a) && self.is_value(b) {
            return self.mk_bool_node(false);
        }
        for (lit, other) in [(a, b), (b, a)] {
            match self.bool_literal(lit) {
                Some(true) => return other,
                Some(false) => return self.rewrite_not(other),
                None => {}
            }
        }
        let bool_sort = self.bool_sort;
        self.mk_raw(BuiltinOp::Eq, smallvec![a.min(b), a.max(b)], bool_sort)
    }

    // -- arithmetic ---------------------------------------------------------

    /// Accumulate `scale * id` into a constant and per-monomial coefficients.
    fn linear_terms(
        &mut self,
        id: NodeId,
        scale: &BigRational,
        sort: NodeId,
        constant: &mut BigRational,
        terms: &mut BTreeMap<NodeId, BigRational>,
    ) {
        if let Some(value) = self.numeral_of(id) {
            *constant += scale * value;
            return;
        }
        let minus = -scale;
        if let Some(args) = self.builtin_args(id, BuiltinOp::Add) {
            for arg in args {
                self.linear_terms(arg, scale, sort, constant, terms);
            }
        } else if let Some(args) = self.builtin_args(id, BuiltinOp::Neg) {
            self.linear_terms(args[0], &minus, sort, constant, terms);
        } else if let Some(args) = self.builtin_args(id, BuiltinOp::Sub) {
            if args.len() == 1 {
                self.linear_terms(args[0], &minus, sort, constant, terms);
            } else {
                self.linear_terms(args[0], scale, sort, constant, terms);
                for arg in &args[1..] {
                    self.linear_terms(*arg, &minus, sort, constant, terms);
                }
            }
        } else if let Some((coeff, rest)) = self.scaled_product(id) {
            let scaled = scale * coeff;
            if rest.len() == 1 {
                self.linear_terms(rest[0], &scaled, sort, constant, terms);
            } else {
                let monomial = self.mk_raw(BuiltinOp::Mul, rest, sort);
                *terms.entry(monomial).or_insert_with(BigRational::zero) += scaled;
            }
        } else {
            *terms.entry(id).or_insert_with(BigRational::zero) += scale;
        }
    }

    /// Split `(* k f1 f2 ...)` with a numeral `k` into `k` and its factors.
    fn scaled_product(&self, id: NodeId) -> Option<(BigRational, Args)> {
        let args = self.builtin_args(id, BuiltinOp::Mul)?;
        let coeff = self.numeral_of(args[0])?.clone();
        Some((coeff, args[1..].iter().copied().collect()))
    }

    /// `coeff * term`, folding the coefficient into an existing product.
    fn scaled(&mut self, term: NodeId, coeff: BigRational, sort: NodeId) -> NodeId {
        if coeff.is_one() {
            return term;
        }
        let mut args: Args = smallvec![self.numeral(coeff, sort)];
        match self.builtin_args(term, BuiltinOp::Mul) {
            Some(factors) => args.extend(factors),
            None => args.push(term),
        }
        self.mk_raw(BuiltinOp::Mul, args, sort)
    }

    fn build_sum(
        &mut self,
        constant: BigRational,
        terms: BTreeMap<NodeId, BigRational>,
        sort: NodeId,
    ) -> NodeId {
        let mut args = Args::new();
        if !constant.is_zero() {
            args.push(self.numeral(constant, sort));
        }
        for (term, coeff) in terms {
            if !coeff.is_zero() {
                args.push(self.scaled(term, coeff, sort));
            }
        }
        match args.len() {
            0 => self.numeral(BigRational::zero(), sort),
            1 => args[0],
            _ => self.mk_raw(BuiltinOp::Add, args, sort),
        }
    }

    fn rewrite_sum(&mut self, op: BuiltinOp, args: &[NodeId], sort: NodeId) -> NodeId {
        let mut constant = BigRational::zero();
        let mut terms = BTreeMap::new();
        let one = BigRational::one();
        let minus_one = -BigRational::one();
        for (i, arg) in args.iter().enumerate() {
            let scale = match op {
                BuiltinOp::Neg => &minus_one,
                BuiltinOp::Sub if i > 0 || args.len() == 1 => &minus_one,
                _ => &one,
            };
            self.linear_terms(*arg, scale, sort, &mut constant, &mut terms);
        }
        self.build_sum(constant, terms, sort)
    }

    fn rewrite_cmp(&mut self, op: BuiltinOp, args: Args) -> NodeId {
        if args[0] == args[1] {
            return self.mk_bool_node(matches!(op, BuiltinOp::Le | BuiltinOp::Ge));
        }
        let bool_sort = self.bool_sort;
        match op {
            BuiltinOp::Gt => self.mk_raw(BuiltinOp::Lt, smallvec![args[1], args[0]], bool_sort),
            BuiltinOp::Ge => self.mk_raw(BuiltinOp::Le, smallvec![args[1], args[0]], bool_sort),
            _ => self.mk_raw(op, args, bool_sort),
        }
    }

    fn rewrite_power(&mut self, args: Args, sort: NodeId) -> NodeId {
        if self.numeral_of(args[1]).is_some_and(|e| e.is_one()) {
            return args[0];
        }
        let power = match (self.numeral_of(args[0]), self.numeral_of(args[1])) {
            (Some(base), Some(exponent)) if sort == self.real_sort => {
                algebraic::power(base, exponent)
            }
            _ => None,
        };
        match power {
            Some(Ok(value)) => self.numeral(value, sort),
            Some(Err((radicand, degree))) => self.nodes.intern(NodeData::Algebraic {
                radicand,
                degree,
                sort,
            }),
            None => self.mk_raw(BuiltinOp::Power, args, sort),
        }
    }

    // -- arrays -------------------------------------------------------------

    fn rewrite_select(&mut self, args: Args, sort: NodeId) -> NodeId {
        let index = args[1];
        let mut array = args[0];
        loop {
            match self.nodes.get(array) {
                Some(NodeData::App {
                    func: Func::Builtin(BuiltinOp::Store),
                    args: inner,
                    ..
                }) => {
                    let (base, key, value) = (inner[0], inner[1], inner[2]);
                    if key == index {
                        return value;
                    }
                    if self.is_value(key) && self.is_value(index) {
                        array = base;
                        continue;
                    }
                    break;
                }
                Some(NodeData::App {
                    func: Func::ConstArray,
                    args: inner,
                    ..
                }) => return inner[0],
                _ => break,
            }
        }
        self.mk_raw(BuiltinOp::Select, smallvec![array, index], sort)
    }
}
