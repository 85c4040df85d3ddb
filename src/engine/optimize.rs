//! Bounded optimization behind `optimize_check`.
//!
//! Goals are ranked lexicographically in declaration order. A soft
//! constraint group costs the summed weight of its violated members, and
//! an objective is ranked by its numeric value. Candidates range over the
//! same domains as the model search, with unbounded domains cut off at
//! `opt_horizon`. An optimum that reaches the outermost values of a cut-off
//! domain is reported as unknown rather than as a bound.

use std::time::Instant;

use num_bigint::BigInt;
use num_rational::BigRational;
use num_traits::{Signed, Zero};
use rustc_hash::FxHashMap;

use super::eval::{EvalStop, Value};
use super::node::NodeId;
use super::search::{Outcome, Verdict, advance, value_at};
use super::{Engine, Failure, Step, parse_rational};
use crate::native::{LBool, RawAst, RawOptimize, RawSymbol};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) enum Goal {
    /// Soft constraints sharing an id.
    Soft(String),
    Maximize(NodeId),
    Minimize(NodeId),
}

impl Goal {
    fn term(&self) -> Option<NodeId> {
        match self {
            Goal::Maximize(term) | Goal::Minimize(term) => Some(*term),
            Goal::Soft(_) => None,
        }
    }
}

#[derive(Debug, Clone)]
pub(super) struct SoftConstraint {
    formula: NodeId,
    weight: BigRational,
    goal: usize,
}

#[derive(Debug, Clone, Copy)]
struct Scope {
    hard: usize,
    soft: usize,
    goals: usize,
}

#[derive(Debug, Default)]
pub(super) struct OptimizeData {
    pub(super) rc: u32,
    hard: Vec<NodeId>,
    soft: Vec<SoftConstraint>,
    goals: Vec<Goal>,
    scopes: Vec<Scope>,
    pub(super) model: Option<u32>,
    /// Value of each goal at the last optimum.
    bounds: Vec<NodeId>,
    pub(super) reason_unknown: String,
}

impl OptimizeData {
    /// Nodes this context holds a reference to.
    pub(super) fn held_nodes(&self) -> Vec<NodeId> {
        self.hard
            .iter()
            .copied()
            .chain(self.soft.iter().map(|s| s.formula))
            .chain(self.goals.iter().filter_map(Goal::term))
            .chain(self.bounds.iter().copied())
            .collect()
    }
}

/// Best candidate so far: its ranking key, odometer point and goal values.
type Best = (Vec<BigRational>, Vec<u64>, Vec<Value>);

fn numeric(value: &Value) -> Option<BigRational> {
    match value {
        Value::Int(n) => Some(BigRational::from_integer(n.clone())),
        Value::Real(q) => Some(q.clone()),
        Value::Bv { bits, .. } => Some(BigRational::from_integer(BigInt::from(bits.clone()))),
        Value::Bool(_) | Value::Elem { .. } => None,
    }
}

impl Engine {
    pub(super) fn optimize_slot(&mut self, raw: RawOptimize) -> Step<&mut OptimizeData> {
        self.optimizers
            .get_mut((raw.get() as usize).wrapping_sub(1))
            .and_then(Option::as_mut)
            .ok_or_else(|| {
                Failure::invalid_arg(format!("invalid or released optimize context #{}", raw.get()))
            })
    }

    pub(super) fn release_optimize(&mut self, index: usize) {
        let Some(opt) = self.optimizers.get_mut(index).and_then(Option::take) else {
            return;
        };
        for node in opt.held_nodes() {
            self.nodes.release(node);
        }
        if let Some(model) = opt.model {
            self.release_model(model);
        }
    }

    fn boolean_term(&self, raw: RawAst) -> Step<NodeId> {
        let formula = self.term(raw.get())?;
        if self.sort_of(formula)? != self.bool_sort {
            return Err(Failure::sort_error("optimization constraints must be boolean"));
        }
        Ok(formula)
    }

    pub(super) fn optimize_assert_inner(&mut self, raw: RawOptimize, formula: RawAst) -> Step<()> {
        let formula = self.boolean_term(formula)?;
        self.optimize_slot(raw)?.hard.push(formula);
        self.nodes.inc(formula);
        Ok(())
    }

    pub(super) fn optimize_assert_soft_inner(
        &mut self,
        raw: RawOptimize,
        formula: RawAst,
        weight: &str,
        id: RawSymbol,
    ) -> Step<u32> {
        let formula = self.boolean_term(formula)?;
        let weight = parse_rational(weight)
            .filter(|w| !w.is_negative())
            .ok_or_else(|| Failure::invalid_arg(format!("invalid soft constraint weight '{weight}'")))?;
        if id.is_null() || id.get() as usize > self.symbols.len() {
            return Err(Failure::invalid_arg(format!("invalid symbol #{}", id.get())));
        }
        let name = self.symbol_name(id.get()).to_string();
        let opt = self.optimize_slot(raw)?;
        let goal = match opt
            .goals
            .iter()
            .position(|g| matches!(g, Goal::Soft(existing) if *existing == name))
        {
            Some(index) => index,
            None => {
                opt.goals.push(Goal::Soft(name));
                opt.goals.len() - 1
            }
        };
        opt.soft.push(SoftConstraint {
            formula,
            weight,
            goal,
        });
        self.nodes.inc(formula);
        Ok(goal as u32)
    }

    pub(super) fn optimize_objective_inner(
        &mut self,
        raw: RawOptimize,
        term: RawAst,
        maximize: bool,
    ) -> Step<u32> {
        let term = self.term(term.get())?;
        let sort = self.sort_of(term)?;
        if sort != self.int_sort && sort != self.real_sort && self.bv_width(sort).is_none() {
            return Err(Failure::sort_error(
                "objectives must be integer, real or bit-vector terms",
            ));
        }
        let opt = self.optimize_slot(raw)?;
        opt.goals.push(if maximize {
            Goal::Maximize(term)
        } else {
            Goal::Minimize(term)
        });
        let index = opt.goals.len() - 1;
        self.nodes.inc(term);
        Ok(index as u32)
    }

    pub(super) fn optimize_push_inner(&mut self, raw: RawOptimize) -> Step<()> {
        let opt = self.optimize_slot(raw)?;
        let scope = Scope {
            hard: opt.hard.len(),
            soft: opt.soft.len(),
            goals: opt.goals.len(),
        };
        opt.scopes.push(scope);
        Ok(())
    }

    pub(super) fn optimize_pop_inner(&mut self, raw: RawOptimize) -> Step<()> {
        let opt = self.optimize_slot(raw)?;
        let scope = opt
            .scopes
            .pop()
            .ok_or_else(|| Failure::invalid_usage("there is no scope to pop"))?;
        let mut dropped = opt.hard.split_off(scope.hard);
        dropped.extend(opt.soft.split_off(scope.soft).into_iter().map(|s| s.formula));
        dropped.extend(opt.goals.split_off(scope.goals).iter().filter_map(Goal::term));
        for node in dropped {
            self.nodes.release(node);
        }
        Ok(())
    }

    pub(super) fn optimize_bound(&mut self, raw: RawOptimize, index: u32) -> Step<NodeId> {
        let opt = self.optimize_slot(raw)?;
        if index as usize >= opt.goals.len() {
            return Err(Failure::invalid_arg(format!("no objective with index {index}")));
        }
        opt.bounds.get(index as usize).copied().ok_or_else(|| {
            Failure::invalid_usage("objective bounds are only available after a sat check")
        })
    }

    pub(super) fn optimize_check_inner(&mut self, raw: RawOptimize) -> Step<LBool> {
        let (hard, soft, goals, previous, stale) = {
            let opt = self.optimize_slot(raw)?;
            opt.reason_unknown.clear();
            (
                opt.hard.clone(),
                opt.soft.clone(),
                opt.goals.clone(),
                opt.model.take(),
                std::mem::take(&mut opt.bounds),
            )
        };
        if let Some(model) = previous {
            self.release_model(model);
        }
        for node in stale {
            self.nodes.release(node);
        }
        // Interrupts raised while idle do not carry over into this check.
        self.consume_cancel();
        let result = self.optimize_search(&hard, &soft, &goals);
        self.consume_cancel();
        let (outcome, bounds) = result?;
        let opt = self.optimize_slot(raw)?;
        opt.bounds = bounds;
        match outcome {
            Outcome::Sat(model) => {
                opt.model = model;
                Ok(LBool::True)
            }
            Outcome::Unsat => Ok(LBool::False),
            Outcome::Unknown(reason) => {
                opt.reason_unknown = reason;
                Ok(LBool::Undef)
            }
        }
    }

    /// Search the bounded box for the lexicographically best candidate.
    ///
    /// On `Sat` the returned bound nodes carry one reference each.
    fn optimize_search(
        &mut self,
        hard: &[NodeId],
        soft: &[SoftConstraint],
        goals: &[Goal],
    ) -> Step<(Outcome, Vec<NodeId>)> {
        let unknown = |reason: &str| Ok((Outcome::Unknown(reason.to_string()), Vec::new()));
        if self.cancel_requested() {
            return Err(Failure::canceled());
        }
        let mut roots = hard.to_vec();
        roots.extend(soft.iter().map(|s| s.formula));
        roots.extend(goals.iter().filter_map(Goal::term));
        let unknowns = match self.collect_unknowns(&roots) {
            Ok(unknowns) => unknowns,
            Err(reason) => return unknown(&reason),
        };

        let horizon = self.settings.opt_horizon;
        let bounds: Vec<u64> = unknowns
            .iter()
            .map(|u| u.domain.size().map_or(horizon, |n| (n - 1).min(horizon)))
            .collect();
        let truncated: Vec<bool> = unknowns
            .iter()
            .zip(&bounds)
            .map(|(u, bound)| u.domain.size().is_none_or(|n| n - 1 > *bound))
            .collect();
        tracing::trace!(
            unknowns = unknowns.len(),
            goals = goals.len(),
            horizon,
            "optimization search"
        );

        let started = Instant::now();
        let mut tried = 0u64;
        let mut incomplete = false;
        let mut best: Option<Best> = None;
        let mut point = vec![0u64; unknowns.len()];
        loop {
            if self.cancel_requested() {
                return Err(Failure::canceled());
            }
            if let Some(limit) = self.settings.timeout {
                if started.elapsed() >= limit {
                    return unknown("timeout");
                }
            }
            if self.settings.max_candidates > 0 && tried >= self.settings.max_candidates {
                return unknown("candidate limit reached");
            }
            tried += 1;

            let assignment: FxHashMap<NodeId, Value> = unknowns
                .iter()
                .zip(&point)
                .map(|(u, k)| (u.id, value_at(u.domain, *k)))
                .collect();
            match self.check_candidate(hard, &unknowns, &assignment) {
                Verdict::Satisfied => match self.rank(soft, goals, &assignment) {
                    Ok((key, values)) => {
                        if best.as_ref().is_none_or(|(current, ..)| key < *current) {
                            best = Some((key, point.clone(), values));
                        }
                    }
                    Err(EvalStop::DivByZero) => incomplete = true,
                    Err(EvalStop::Unsupported) => return unknown("unsupported objective term"),
                },
                Verdict::Falsified => {}
                Verdict::Undefined => incomplete = true,
                Verdict::Unsupported => return unknown("unsupported term in model search"),
            }
            if !advance(&mut point, &bounds) {
                break;
            }
        }

        let Some((_, point, values)) = best else {
            return if incomplete || truncated.iter().any(|t| *t) {
                unknown("no model within the search horizon")
            } else {
                Ok((Outcome::Unsat, Vec::new()))
            };
        };
        let on_edge = point
            .iter()
            .zip(&bounds)
            .zip(&truncated)
            .any(|((k, bound), cut)| *cut && *k + 1 >= *bound);
        if on_edge {
            return unknown("optimum not established within the search horizon");
        }
        tracing::trace!(tried, "optimum found");

        let assignment: FxHashMap<NodeId, Value> = unknowns
            .iter()
            .zip(&point)
            .map(|(u, k)| (u.id, value_at(u.domain, *k)))
            .collect();
        let outcome = self.build_model(&unknowns, &assignment)?;
        let mut bound_nodes = Vec::with_capacity(goals.len());
        for (goal, value) in goals.iter().zip(&values) {
            let sort = match (goal.term(), value) {
                (Some(term), _) => self.sort_of(term)?,
                (None, Value::Int(_)) => self.int_sort,
                (None, _) => self.real_sort,
            };
            let node = self.value_node(value, sort);
            self.nodes.inc(node);
            bound_nodes.push(node);
        }
        Ok((outcome, bound_nodes))
    }

    /// Ranking key of a candidate that satisfies the hard constraints,
    /// smaller is better, plus the value each goal takes.
    fn rank(
        &self,
        soft: &[SoftConstraint],
        goals: &[Goal],
        assignment: &FxHashMap<NodeId, Value>,
    ) -> Result<(Vec<BigRational>, Vec<Value>), EvalStop> {
        let mut memo = FxHashMap::default();
        let mut penalties = vec![BigRational::zero(); goals.len()];
        for item in soft {
            if self.eval_value(item.formula, assignment, &mut memo)? != Value::Bool(true) {
                penalties[item.goal] += &item.weight;
            }
        }
        let mut key = Vec::with_capacity(goals.len());
        let mut values = Vec::with_capacity(goals.len());
        for (goal, penalty) in goals.iter().zip(penalties) {
            match goal {
                Goal::Soft(_) => {
                    key.push(penalty.clone());
                    values.push(if penalty.is_integer() {
                        Value::Int(penalty.to_integer())
                    } else {
                        Value::Real(penalty)
                    });
                }
                Goal::Maximize(term) | Goal::Minimize(term) => {
                    let value = self.eval_value(*term, assignment, &mut memo)?;
                    let magnitude = numeric(&value).ok_or(EvalStop::Unsupported)?;
                    key.push(if matches!(goal, Goal::Maximize(_)) {
                        -magnitude
                    } else {
                        magnitude
                    });
                    values.push(value);
                }
            }
        }
        Ok((key, values))
    }

    pub(super) fn render_optimize(&self, raw: RawOptimize) -> Step<String> {
        let opt = self
            .optimizers
            .get((raw.get() as usize).wrapping_sub(1))
            .and_then(Option::as_ref)
            .ok_or_else(|| {
                Failure::invalid_arg(format!("invalid or released optimize context #{}", raw.get()))
            })?;
        let mut out = String::new();
        for formula in &opt.hard {
            out.push_str(&format!("(assert {})\n", self.render(*formula)?));
        }
        for item in &opt.soft {
            let Goal::Soft(id) = &opt.goals[item.goal] else {
                continue;
            };
            out.push_str(&format!(
                "(assert-soft {} :weight {} :id {})\n",
                self.render(item.formula)?,
                item.weight,
                if id.is_empty() { "default" } else { id },
            ));
        }
        for goal in &opt.goals {
            match goal {
                Goal::Maximize(term) => out.push_str(&format!("(maximize {})\n", self.render(*term)?)),
                Goal::Minimize(term) => out.push_str(&format!("(minimize {})\n", self.render(*term)?)),
                Goal::Soft(_) => {}
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use crate::engine::{Engine, EngineSettings};
    use crate::native::{BuiltinOp, ErrorCode, LBool, NativeEngine, RawAst};

    fn int_const(e: &mut Engine, name: &str) -> RawAst {
        let int = e.mk_int_sort();
        let symbol = e.mk_string_symbol(name);
        let x = e.mk_const(symbol, int);
        e.inc_ref(x);
        x
    }

    fn op(e: &mut Engine, op: BuiltinOp, args: &[RawAst]) -> RawAst {
        let node = e.mk_op(op, args);
        e.inc_ref(node);
        node
    }

    fn int(e: &mut Engine, value: i64) -> RawAst {
        let int = e.mk_int_sort();
        let node = e.mk_int64(value, int);
        e.inc_ref(node);
        node
    }

    #[test]
    fn minimize_reports_the_bound() {
        let mut e = Engine::with_settings(EngineSettings::default());
        let x = int_const(&mut e, "x");
        let three = int(&mut e, 3);
        let ge = op(&mut e, BuiltinOp::Ge, &[x, three]);
        let opt = e.mk_optimize();
        e.optimize_inc_ref(opt);
        e.optimize_assert(opt, ge);
        let index = e.optimize_minimize(opt, x);
        assert_eq!(index, 0);
        assert_eq!(e.optimize_check(opt), LBool::True);
        let lower = e.optimize_get_lower(opt, index);
        assert_eq!(e.get_numeral_int64(lower), Some(3));
        let upper = e.optimize_get_upper(opt, index);
        assert_eq!(e.get_numeral_int64(upper), Some(3));
    }

    #[test]
    fn unbounded_objective_is_unknown() {
        let mut e = Engine::with_settings(EngineSettings::default());
        let x = int_const(&mut e, "x");
        let opt = e.mk_optimize();
        e.optimize_inc_ref(opt);
        e.optimize_maximize(opt, x);
        assert_eq!(e.optimize_check(opt), LBool::Undef);
        assert_eq!(
            e.optimize_get_reason_unknown(opt),
            "optimum not established within the search horizon"
        );
        e.optimize_get_lower(opt, 0);
        assert_eq!(e.error_code(), ErrorCode::InvalidUsage);
    }

    #[test]
    fn weights_are_validated() {
        let mut e = Engine::with_settings(EngineSettings::default());
        let bool_sort = e.mk_bool_sort();
        let p_name = e.mk_string_symbol("p");
        let p = e.mk_const(p_name, bool_sort);
        e.inc_ref(p);
        let id = e.mk_string_symbol("");
        let opt = e.mk_optimize();
        e.optimize_inc_ref(opt);
        e.optimize_assert_soft(opt, p, "-1", id);
        assert_eq!(e.error_code(), ErrorCode::InvalidArg);
        e.optimize_assert_soft(opt, p, "heavy", id);
        assert_eq!(e.error_code(), ErrorCode::InvalidArg);
        assert_eq!(e.optimize_assert_soft(opt, p, "0.5", id), 0);
        assert_eq!(e.error_code(), ErrorCode::Ok);
        assert_eq!(e.optimize_to_string(opt), "(assert-soft p :weight 1/2 :id default)\n");
    }

    #[test]
    fn pop_releases_goals() {
        let mut e = Engine::with_settings(EngineSettings::default());
        let x = int_const(&mut e, "x");
        let one = int(&mut e, 1);
        let opt = e.mk_optimize();
        e.optimize_inc_ref(opt);
        e.optimize_push(opt);
        let sum = e.mk_op(BuiltinOp::Add, &[x, one]);
        e.optimize_minimize(opt, sum);
        // The next constructor drops the engine's pin on `sum`.
        int(&mut e, 7);
        let held = e.live_ast_count();
        e.optimize_pop(opt);
        assert_eq!(e.error_code(), ErrorCode::Ok);
        assert!(e.live_ast_count() < held);
        assert_eq!(e.optimize_to_string(opt), "");
        e.optimize_pop(opt);
        assert_eq!(e.error_code(), ErrorCode::InvalidUsage);
    }

    #[test]
    fn infeasible_finite_problem_is_unsat() {
        let mut e = Engine::with_settings(EngineSettings::default());
        let bool_sort = e.mk_bool_sort();
        let p_name = e.mk_string_symbol("p");
        let p = e.mk_const(p_name, bool_sort);
        e.inc_ref(p);
        let not_p = op(&mut e, BuiltinOp::Not, &[p]);
        let opt = e.mk_optimize();
        e.optimize_inc_ref(opt);
        e.optimize_assert(opt, p);
        e.optimize_assert(opt, not_p);
        assert_eq!(e.optimize_check(opt), LBool::False);
        e.optimize_get_model(opt);
        assert_eq!(e.error_code(), ErrorCode::InvalidUsage);
    }
}
