//! Exact depth-first branch-and-bound over the boolean variables.
//!
//! Integer variables of a [`CpModel`] are functions of the booleans, so a
//! complete boolean assignment fixes every value. Each node derives interval
//! bounds for every constraint and for the objective from the partial
//! assignment and prunes when a constraint cannot hold or the objective cannot
//! beat the incumbent.
//!
//! Upper-bounded constraints over min variables also yield cover requirements:
//! sets of booleans of which one must be switched on. A requirement with a
//! single literal forces it, and for objectives over booleans only, a packing
//! of disjoint requirements tightens the objective bound.
//!
//! Booleans are branched in declaration order; the value with the lower
//! objective bound is tried first (ties go to the hint, then to `false`). The
//! search is single threaded and deterministic.

use super::{
    BoolVar, CpModel, LinearExpr, MinVarDef, SolveOutcome, SolveParams, SolveStatus,
    SolverBackend, Var,
};
use crate::error::Result;
use std::time::Instant;
use tracing::trace;

#[derive(Debug, Clone, Copy, Default)]
pub struct BranchAndBound;

impl BranchAndBound {
    pub fn new() -> Self {
        Self
    }
}

impl SolverBackend for BranchAndBound {
    fn name(&self) -> &'static str {
        "branch-and-bound"
    }

    fn solve(&self, model: &CpModel, params: &SolveParams) -> Result<SolveOutcome> {
        model.validate()?;

        let start = Instant::now();
        // An unrepresentable deadline is as good as none.
        let deadline = params.time_limit.and_then(|limit| start.checked_add(limit));
        let mut search = Search::new(model, deadline, params.check_interval.max(1));

        search.seed_from_hints();
        if search.deadline_passed() {
            search.timed_out = true;
        } else {
            search.explore(0);
        }

        let status = match (search.timed_out, search.incumbent.is_some()) {
            (false, true) => SolveStatus::Optimal,
            (false, false) => SolveStatus::Infeasible,
            (true, true) => SolveStatus::Feasible,
            (true, false) => SolveStatus::Unknown,
        };
        let (objective, assignment) = match search.incumbent {
            Some((value, bools)) => (Some(value), bools),
            None => (None, Vec::new()),
        };
        let wall_time = start.elapsed();

        trace!(
            backend = self.name(),
            status = status.name(),
            nodes = search.nodes,
            wall_time_ms = wall_time.as_millis() as u64,
            "Search finished"
        );

        Ok(SolveOutcome { status, objective, assignment, wall_time, nodes: search.nodes })
    }
}

struct Search<'a> {
    model: &'a CpModel,
    objective: LinearExpr,
    /// Objective cost of setting each boolean to true; `None` when the
    /// objective involves integer variables.
    literal_costs: Option<Vec<i64>>,
    assignment: Vec<Option<bool>>,
    incumbent: Option<(i64, Vec<bool>)>,
    deadline: Option<Instant>,
    check_interval: u64,
    nodes: u64,
    timed_out: bool,
}

impl<'a> Search<'a> {
    fn new(model: &'a CpModel, deadline: Option<Instant>, check_interval: u64) -> Self {
        let objective = model.objective().cloned().unwrap_or_default();
        let literal_costs = literal_costs(&objective, model.num_bools());
        Self {
            model,
            objective,
            literal_costs,
            assignment: vec![None; model.num_bools()],
            incumbent: None,
            deadline,
            check_interval,
            nodes: 0,
            timed_out: false,
        }
    }

    fn deadline_passed(&self) -> bool {
        self.deadline.map_or(false, |deadline| Instant::now() >= deadline)
    }

    /// A complete, feasible hint becomes the first incumbent.
    fn seed_from_hints(&mut self) {
        let hinted: Option<Vec<bool>> = (0..self.model.num_bools())
            .map(|i| self.model.hint(BoolVar(i)))
            .collect();

        if let Some(bools) = hinted {
            if self.model.is_feasible(&bools) {
                let value = self.model.evaluate(&self.objective, &bools);
                trace!(objective = value, "Seeded incumbent from hints");
                self.incumbent = Some((value, bools));
            }
        }
    }

    fn explore(&mut self, depth: usize) {
        self.nodes += 1;
        if self.nodes % self.check_interval == 0 && self.deadline_passed() {
            self.timed_out = true;
            return;
        }
        if self.violates_constraint() {
            return;
        }

        let requirements = self.cover_requirements();
        if requirements.iter().any(Vec::is_empty) {
            return;
        }
        if let Some((best, _)) = &self.incumbent {
            if self.objective_lower_bound(&requirements) >= *best {
                return;
            }
        }

        if depth == self.assignment.len() {
            // Every bound is exact at a leaf, so passing the pruning tests means
            // feasible and strictly better than the incumbent.
            let bools: Vec<bool> = self.assignment.iter().map(|v| v.unwrap_or(false)).collect();
            let value = self.model.evaluate(&self.objective, &bools);
            self.incumbent = Some((value, bools));
            return;
        }

        for &value in self.branch_order(depth, &requirements) {
            self.assignment[depth] = Some(value);
            self.explore(depth + 1);
            if self.timed_out {
                break;
            }
        }
        self.assignment[depth] = None;
    }

    fn branch_order(&mut self, depth: usize, requirements: &[Vec<usize>]) -> &'static [bool] {
        // The only literal left that can satisfy a requirement is forced.
        if requirements.iter().any(|r| r.len() == 1 && r[0] == depth) {
            return &[true];
        }

        self.assignment[depth] = Some(false);
        let lb_false = self.expr_bounds(&self.objective).0;
        self.assignment[depth] = Some(true);
        let lb_true = self.expr_bounds(&self.objective).0;
        self.assignment[depth] = None;

        if lb_true != lb_false {
            return if lb_true < lb_false { &[true, false] } else { &[false, true] };
        }
        match self.model.hint(BoolVar(depth)) {
            Some(true) => &[true, false],
            _ => &[false, true],
        }
    }

    fn violates_constraint(&self) -> bool {
        self.model.constraints().iter().any(|constraint| {
            let (lb, ub) = self.expr_bounds(&constraint.expr);
            constraint.upper.map_or(false, |hi| lb > hi) || constraint.lower.map_or(false, |lo| ub < lo)
        })
    }

    /// Sets of undecided booleans of which at least one must become true.
    ///
    /// Under `sum(coef * v) <= hi` with `coef > 0`, every other term sits at or
    /// above its lower bound, so each `v` can exceed its own lower bound by at
    /// most `slack / coef`. A min variable that cannot get under that threshold
    /// without switching on one of its options yields a requirement.
    fn cover_requirements(&self) -> Vec<Vec<usize>> {
        let mut requirements = Vec::new();
        for constraint in self.model.constraints() {
            let Some(hi) = constraint.upper else {
                continue;
            };
            let slack = hi.saturating_sub(self.expr_bounds(&constraint.expr).0);

            for (coef, var) in &constraint.expr.terms {
                let Var::Int(int) = var else {
                    continue;
                };
                if *coef <= 0 {
                    continue;
                }
                let def = &self.model.int_defs()[int.0];
                let threshold = self.min_var_bounds(def).0.saturating_add(slack / coef);
                if let Some(literals) = self.literals_needed(def, threshold) {
                    requirements.push(literals);
                }
            }
        }
        requirements
    }

    /// Undecided literals able to bring `def` down to `threshold`, or `None`
    /// when it can get there without switching any option on.
    fn literals_needed(&self, def: &MinVarDef, threshold: i64) -> Option<Vec<usize>> {
        if def.fallback <= threshold {
            return None;
        }

        let mut literals = Vec::new();
        for option in &def.options {
            match self.assignment[option.literal.0] {
                Some(true) if option.if_true <= threshold => return None,
                Some(false) if option.if_false <= threshold => return None,
                None if option.if_false <= threshold => return None,
                None if option.if_true <= threshold => literals.push(option.literal.0),
                _ => {}
            }
        }
        literals.sort_unstable();
        literals.dedup();
        Some(literals)
    }

    fn objective_lower_bound(&self, requirements: &[Vec<usize>]) -> i64 {
        let base = self.expr_bounds(&self.objective).0;
        match &self.literal_costs {
            Some(costs) => base.saturating_add(cover_cost(requirements, costs)),
            None => base,
        }
    }

    fn bool_bounds(&self, var: BoolVar) -> (i64, i64) {
        match self.assignment[var.0] {
            Some(value) => (value as i64, value as i64),
            None => (0, 1),
        }
    }

    fn min_var_bounds(&self, def: &MinVarDef) -> (i64, i64) {
        def.options.iter().fold((def.fallback, def.fallback), |(lb, ub), option| {
            let (lo, hi) = match self.assignment[option.literal.0] {
                Some(true) => (option.if_true, option.if_true),
                Some(false) => (option.if_false, option.if_false),
                None => (
                    option.if_true.min(option.if_false),
                    option.if_true.max(option.if_false),
                ),
            };
            (lb.min(lo), ub.min(hi))
        })
    }

    fn expr_bounds(&self, expr: &LinearExpr) -> (i64, i64) {
        expr.terms.iter().fold((expr.constant, expr.constant), |(lb, ub), (coef, var)| {
            let (lo, hi) = match var {
                Var::Bool(b) => self.bool_bounds(*b),
                Var::Int(i) => self.min_var_bounds(&self.model.int_defs()[i.0]),
            };
            if *coef >= 0 {
                (lb.saturating_add(coef.saturating_mul(lo)), ub.saturating_add(coef.saturating_mul(hi)))
            } else {
                (lb.saturating_add(coef.saturating_mul(hi)), ub.saturating_add(coef.saturating_mul(lo)))
            }
        })
    }
}

/// Per-boolean cost of switching it on, for objectives over booleans only.
///
/// The objective lower bound already counts negative coefficients as taken,
/// so only the positive part is charged.
fn literal_costs(objective: &LinearExpr, num_bools: usize) -> Option<Vec<i64>> {
    let mut costs = vec![0i64; num_bools];
    for (coef, var) in &objective.terms {
        match var {
            Var::Bool(b) => costs[b.0] = costs[b.0].saturating_add((*coef).max(0)),
            Var::Int(_) => return None,
        }
    }
    Some(costs)
}

/// Cost every assignment satisfying all `requirements` must pay.
///
/// Requirements are packed greedily, smallest first, keeping only those
/// disjoint from the ones already taken. Disjoint requirements need distinct
/// literals, so the cheapest literal of each adds up to a valid bound.
fn cover_cost(requirements: &[Vec<usize>], costs: &[i64]) -> i64 {
    let mut order: Vec<&Vec<usize>> = requirements.iter().collect();
    order.sort_by_key(|literals| literals.len());

    let mut used = vec![false; costs.len()];
    let mut total = 0i64;
    for literals in order {
        if literals.iter().any(|&b| used[b]) {
            continue;
        }
        let cheapest = literals.iter().map(|&b| costs[b]).min().unwrap_or(0);
        total = total.saturating_add(cheapest);
        for &b in literals {
            used[b] = true;
        }
    }
    total
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{IntVar, MinOption};
    use std::time::Duration;

    fn knapsack_model() -> (CpModel, Vec<BoolVar>) {
        // Pick items to maximize value (minimize negative value) under a weight cap.
        let mut model = CpModel::new();
        let items: Vec<BoolVar> = (0..5).map(|i| model.new_bool_var(format!("item_{}", i))).collect();
        let weights = [4, 3, 2, 5, 1];
        let values = [-10, -7, -4, -12, -1];
        model.add_le("capacity", LinearExpr::weighted_sum(items.iter().copied(), &weights), 8);
        model.minimize(LinearExpr::weighted_sum(items.iter().copied(), &values));
        (model, items)
    }

    fn brute_force(model: &CpModel) -> Option<i64> {
        let n = model.num_bools();
        let objective = model.objective().cloned().unwrap_or_default();
        (0..1u64 << n)
            .map(|mask| (0..n).map(|i| mask & (1 << i) != 0).collect::<Vec<bool>>())
            .filter(|bools| model.is_feasible(bools))
            .map(|bools| model.evaluate(&objective, &bools))
            .min()
    }

    #[test]
    fn test_knapsack_optimum_matches_brute_force() {
        let (model, _) = knapsack_model();
        let outcome = BranchAndBound.solve(&model, &SolveParams::default()).unwrap();

        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert_eq!(outcome.objective, brute_force(&model));
        assert!(model.is_feasible(&outcome.assignment));
    }

    #[test]
    fn test_infeasible_model() {
        let mut model = CpModel::new();
        let a = model.new_bool_var("a");
        let b = model.new_bool_var("b");
        model.add_ge("both", LinearExpr::sum([a, b]), 2);
        model.add_le("at_most_one", LinearExpr::sum([a, b]), 1);

        let outcome = BranchAndBound.solve(&model, &SolveParams::default()).unwrap();
        assert_eq!(outcome.status, SolveStatus::Infeasible);
        assert!(outcome.objective.is_none());
        assert!(outcome.assignment.is_empty());
    }

    #[test]
    fn test_min_var_objective() {
        let mut model = CpModel::new();
        let a = model.new_bool_var("a");
        let b = model.new_bool_var("b");
        let cost = model.new_min_var(
            "cost",
            100,
            vec![
                MinOption { literal: a, if_true: 30, if_false: 100 },
                MinOption { literal: b, if_true: 60, if_false: 100 },
            ],
        );
        model.minimize(LinearExpr::sum([cost]));
        model.add_le("one_index", LinearExpr::sum([a, b]), 1);

        let outcome = BranchAndBound.solve(&model, &SolveParams::default()).unwrap();
        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert_eq!(outcome.objective, Some(30));
        assert!(outcome.value(a));
        assert!(!outcome.value(b));
    }

    #[test]
    fn test_zero_time_limit_without_hints_is_unknown() {
        let (model, _) = knapsack_model();
        let params = SolveParams { time_limit: Some(Duration::ZERO), ..Default::default() };

        let outcome = BranchAndBound.solve(&model, &params).unwrap();
        assert_eq!(outcome.status, SolveStatus::Unknown);
    }

    #[test]
    fn test_zero_time_limit_keeps_feasible_hint() {
        let (mut model, items) = knapsack_model();
        for (i, item) in items.iter().enumerate() {
            model.add_hint(*item, i == 0);
        }
        let params = SolveParams { time_limit: Some(Duration::ZERO), ..Default::default() };

        let outcome = BranchAndBound.solve(&model, &params).unwrap();
        assert_eq!(outcome.status, SolveStatus::Feasible);
        assert_eq!(outcome.objective, Some(-10));
    }

    #[test]
    fn test_no_objective_finds_any_feasible_assignment() {
        let mut model = CpModel::new();
        let a = model.new_bool_var("a");
        let b = model.new_bool_var("b");
        model.add_eq("exactly_one", LinearExpr::sum([a, b]), 1);

        let outcome = BranchAndBound.solve(&model, &SolveParams::default()).unwrap();
        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert_eq!(outcome.objective, Some(0));
        assert!(model.is_feasible(&outcome.assignment));
    }

    #[test]
    fn test_deterministic() {
        let (model, _) = knapsack_model();
        let first = BranchAndBound.solve(&model, &SolveParams::default()).unwrap();
        let second = BranchAndBound.solve(&model, &SolveParams::default()).unwrap();
        assert_eq!(first.assignment, second.assignment);
        assert_eq!(first.nodes, second.nodes);
    }

    /// Twelve scans, each cheapest through its own index. Six shared indexes
    /// cover four scans apiece at a worse cost. Minimizing the index count
    /// under a zero-slack cost bound (120) needs exactly the twelve dedicated ones.
    fn cover_model(cost_bound: i64) -> CpModel {
        let mut model = CpModel::new();
        let shared: Vec<BoolVar> = (0..6).map(|d| model.new_bool_var(format!("shared_{}", d))).collect();
        let dedicated: Vec<BoolVar> =
            (0..12).map(|j| model.new_bool_var(format!("dedicated_{}", j))).collect();

        let costs: Vec<IntVar> = (0..12)
            .map(|j| {
                let mut options = vec![MinOption { literal: dedicated[j], if_true: 10, if_false: 100 }];
                for (d, literal) in shared.iter().enumerate() {
                    if (0..4).any(|k| (2 * d + k) % 12 == j) {
                        options.push(MinOption { literal: *literal, if_true: 20, if_false: 100 });
                    }
                }
                model.new_min_var(format!("cost_{}", j), 100, options)
            })
            .collect();

        model.add_le("cost", LinearExpr::sum(costs), cost_bound);
        model.minimize(LinearExpr::sum(shared.iter().chain(&dedicated).copied()));
        model
    }

    #[test]
    fn test_cover_requirements_force_and_bound() {
        let model = cover_model(120);
        let outcome = BranchAndBound.solve(&model, &SolveParams::default()).unwrap();

        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert_eq!(outcome.objective, Some(12));
        assert!(outcome.assignment[..6].iter().all(|x| !x));
        assert!(outcome.assignment[6..].iter().all(|x| *x));
        // Shared indexes are refuted by the bound instead of enumerated.
        assert!(outcome.nodes < 100, "explored {} nodes", outcome.nodes);
    }

    #[test]
    fn test_cover_bound_with_slack() {
        // A slack of 20 lets one shared index replace two dedicated ones.
        let model = cover_model(140);
        let outcome = BranchAndBound.solve(&model, &SolveParams::default()).unwrap();

        assert_eq!(outcome.status, SolveStatus::Optimal);
        assert_eq!(outcome.objective, Some(11));
        assert_eq!(outcome.objective, brute_force(&model));
    }

    #[test]
    fn test_cover_cost_packs_disjoint_requirements() {
        let requirements = vec![vec![0, 1], vec![1, 2], vec![3]];
        let costs = [5, 1, 7, 2];
        // [3] costs 2, [0, 1] costs 1, [1, 2] overlaps and is skipped.
        assert_eq!(cover_cost(&requirements, &costs), 3);
        assert_eq!(cover_cost(&[], &costs), 0);
    }

    #[test]
    fn test_literal_costs_only_for_boolean_objectives() {
        let mut model = CpModel::new();
        let a = model.new_bool_var("a");
        let b = model.new_bool_var("b");
        let objective = LinearExpr::weighted_sum([a, b], &[3, -2]);
        assert_eq!(literal_costs(&objective, 2), Some(vec![3, 0]));

        let v = model.new_min_var("v", 5, vec![MinOption { literal: a, if_true: 1, if_false: 5 }]);
        let objective = LinearExpr::sum([v]);
        assert_eq!(literal_costs(&objective, 2), None);
    }
}
