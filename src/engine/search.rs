//! Bounded model search behind `solver_check`.
//!
//! Every uninterpreted constant and application in the assertions is an
//! unknown. Candidate assignments are enumerated in shells: shell `s` holds
//! the assignments whose largest domain index is exactly `s`, so every
//! assignment is eventually reached even when some domains are infinite.
//! When all domains are finite and exhausted the assertions are unsat.
//! The candidate helpers are shared with the optimizer.

use std::collections::BTreeMap;
use std::collections::hash_map::Entry;
use std::time::Instant;

use num_bigint::{BigInt, BigUint};
use num_rational::BigRational;
use rustc_hash::{FxHashMap, FxHashSet};

use super::eval::{EvalStop, FuncInterp, Interp, ModelData, Value};
use super::node::{Args, Func, NodeData, NodeId, SortData};
use super::{Engine, Failure, Step};

/// Result of a search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Outcome {
    /// A satisfying assignment; the model, if models are enabled.
    Sat(Option<u32>),
    Unsat,
    Unknown(String),
}

#[derive(Debug, Clone, Copy)]
pub(super) enum Domain {
    Bool,
    BitVec(u32),
    Int,
    Real,
    Elem(NodeId),
}

impl Domain {
    /// Number of values, or `None` when unbounded.
    pub(super) fn size(self) -> Option<u64> {
        match self {
            Domain::Bool => Some(2),
            Domain::BitVec(width) if width < 64 => Some(1u64 << width),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub(super) struct Unknown {
    /// The application node itself.
    pub(super) id: NodeId,
    decl: NodeId,
    args: Args,
    sort: NodeId,
    pub(super) domain: Domain,
}

pub(super) enum Verdict {
    Satisfied,
    Falsified,
    /// Evaluation hit a division by zero.
    Undefined,
    Unsupported,
}

impl From<EvalStop> for Verdict {
    fn from(stop: EvalStop) -> Self {
        match stop {
            EvalStop::DivByZero => Verdict::Undefined,
            EvalStop::Unsupported => Verdict::Unsupported,
        }
    }
}

/// Step the odometer. Returns `false` once every digit has wrapped.
pub(super) fn advance(point: &mut [u64], bounds: &[u64]) -> bool {
    for (digit, bound) in point.iter_mut().zip(bounds) {
        if *digit < *bound {
            *digit += 1;
            return true;
        }
        *digit = 0;
    }
    false
}

impl Engine {
    pub(super) fn search(&mut self, assertions: &[NodeId]) -> Step<Outcome> {
        if self.cancel_requested() {
            return Err(Failure::canceled());
        }
        let unknowns = match self.collect_unknowns(assertions) {
            Ok(unknowns) => unknowns,
            Err(reason) => return Ok(Outcome::Unknown(reason)),
        };
        tracing::trace!(unknowns = unknowns.len(), assertions = assertions.len(), "model search");

        let started = Instant::now();
        let sizes: Vec<Option<u64>> = unknowns.iter().map(|u| u.domain.size()).collect();
        let mut tried = 0u64;
        let mut incomplete = false;
        let mut shell = 0u64;
        loop {
            let bounds: Vec<u64> = sizes
                .iter()
                .map(|size| match size {
                    Some(n) => shell.min(n - 1),
                    None => shell,
                })
                .collect();
            if shell > 0 && bounds.iter().all(|b| *b < shell) {
                return Ok(if incomplete {
                    Outcome::Unknown("division by zero left the search incomplete".to_string())
                } else {
                    Outcome::Unsat
                });
            }

            let mut point = vec![0u64; unknowns.len()];
            loop {
                if shell == 0 || point.contains(&shell) {
                    if self.cancel_requested() {
                        return Err(Failure::canceled());
                    }
                    if let Some(limit) = self.settings.timeout {
                        if started.elapsed() >= limit {
                            return Ok(Outcome::Unknown("timeout".to_string()));
                        }
                    }
                    if self.settings.max_candidates > 0 && tried >= self.settings.max_candidates {
                        return Ok(Outcome::Unknown("candidate limit reached".to_string()));
                    }
                    tried += 1;

                    let assignment: FxHashMap<NodeId, Value> = unknowns
                        .iter()
                        .zip(&point)
                        .map(|(u, k)| (u.id, value_at(u.domain, *k)))
                        .collect();
                    match self.check_candidate(assertions, &unknowns, &assignment) {
                        Verdict::Satisfied => {
                            tracing::trace!(tried, "model found");
                            return self.build_model(&unknowns, &assignment);
                        }
                        Verdict::Falsified => {}
                        Verdict::Undefined => incomplete = true,
                        Verdict::Unsupported => {
                            return Ok(Outcome::Unknown(
                                "unsupported term in model search".to_string(),
                            ));
                        }
                    }
                }
                if !advance(&mut point, &bounds) {
                    break;
                }
            }
            shell += 1;
        }
    }

    pub(super) fn collect_unknowns(&self, roots: &[NodeId]) -> Result<Vec<Unknown>, String> {
        let mut unknowns = Vec::new();
        let mut seen = FxHashSet::default();
        let mut stack: Vec<NodeId> = roots.to_vec();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            let Some(NodeData::App { func, args, sort }) = self.nodes.get(id) else {
                continue;
            };
            let domain = match self.nodes.get(*sort) {
                Some(NodeData::Sort(data)) => match data {
                    SortData::Bool => Domain::Bool,
                    SortData::Int => Domain::Int,
                    SortData::Real => Domain::Real,
                    SortData::BitVec(width) => Domain::BitVec(*width),
                    SortData::Uninterpreted(_) => Domain::Elem(*sort),
                    SortData::Array { .. } => {
                        return Err("arrays are not supported by model search".to_string());
                    }
                },
                _ => continue,
            };
            if let Func::Decl(decl) = func {
                unknowns.push(Unknown {
                    id,
                    decl: *decl,
                    args: args.clone(),
                    sort: *sort,
                    domain,
                });
            }
            stack.extend(args.iter().copied());
        }
        unknowns.sort_by_key(|u| u.id);
        Ok(unknowns)
    }

    pub(super) fn check_candidate(
        &self,
        assertions: &[NodeId],
        unknowns: &[Unknown],
        assignment: &FxHashMap<NodeId, Value>,
    ) -> Verdict {
        let mut memo = FxHashMap::default();

        // Applications of one declaration must agree on equal arguments.
        let mut points: FxHashMap<(NodeId, Vec<Value>), &Value> = FxHashMap::default();
        for unknown in unknowns.iter().filter(|u| !u.args.is_empty()) {
            let mut point = Vec::with_capacity(unknown.args.len());
            for arg in &unknown.args {
                match self.eval_value(*arg, assignment, &mut memo) {
                    Ok(value) => point.push(value),
                    Err(stop) => return stop.into(),
                }
            }
            let Some(value) = assignment.get(&unknown.id) else {
                continue;
            };
            match points.entry((unknown.decl, point)) {
                Entry::Occupied(existing) if *existing.get() != value => return Verdict::Falsified,
                Entry::Occupied(_) => {}
                Entry::Vacant(slot) => {
                    slot.insert(value);
                }
            }
        }

        for assertion in assertions {
            match self.eval_value(*assertion, assignment, &mut memo) {
                Ok(Value::Bool(true)) => {}
                Ok(_) => return Verdict::Falsified,
                Err(stop) => return stop.into(),
            }
        }
        Verdict::Satisfied
    }

    pub(super) fn build_model(
        &mut self,
        unknowns: &[Unknown],
        assignment: &FxHashMap<NodeId, Value>,
    ) -> Step<Outcome> {
        if !self.settings.produce_models {
            return Ok(Outcome::Sat(None));
        }
        let mut interps = BTreeMap::new();
        let mut memo = FxHashMap::default();
        for unknown in unknowns {
            let Some(value) = assignment.get(&unknown.id) else {
                continue;
            };
            let node = self.value_node(value, unknown.sort);
            if unknown.args.is_empty() {
                interps.insert(unknown.decl, Interp::Const(node));
                continue;
            }

            let mut point = Args::new();
            for arg in &unknown.args {
                let arg_value = self
                    .eval_value(*arg, assignment, &mut memo)
                    .map_err(|_| Failure::invalid_usage("model argument could not be evaluated"))?;
                let arg_sort = self.sort_of(*arg)?;
                point.push(self.value_node(&arg_value, arg_sort));
            }
            if !interps.contains_key(&unknown.decl) {
                let default = self.default_value(unknown.sort)?;
                interps.insert(
                    unknown.decl,
                    Interp::Func(FuncInterp {
                        entries: Vec::new(),
                        default,
                    }),
                );
            }
            if let Some(Interp::Func(func)) = interps.get_mut(&unknown.decl) {
                if !func.entries.iter().any(|(existing, _)| *existing == point) {
                    func.entries.push((point, node));
                }
            }
        }
        let model = self.add_model(ModelData { rc: 0, interps });
        Ok(Outcome::Sat(Some(model)))
    }
}

fn int_at(k: u64) -> BigInt {
    let half = BigInt::from(k.div_ceil(2));
    if k % 2 == 1 { half } else { -half }
}

/// The `k`-th value of a domain.
pub(super) fn value_at(domain: Domain, k: u64) -> Value {
    match domain {
        Domain::Bool => Value::Bool(k == 1),
        Domain::BitVec(width) => Value::Bv {
            bits: BigUint::from(k),
            width,
        },
        // 0, 1, -1, 2, -2, ...
        Domain::Int => Value::Int(int_at(k)),
        // Reals range over the integers only.
        Domain::Real => Value::Real(BigRational::from_integer(int_at(k))),
        Domain::Elem(sort) => Value::Elem {
            sort,
            index: u32::try_from(k).unwrap_or(u32::MAX),
        },
    }
}
