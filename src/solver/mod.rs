//! Constraint-solving backend capability.
//!
//! The index-selection core only talks to a backend through [`CpModel`] and
//! the [`SolverBackend`] trait:
//! - boolean decision variables
//! - integer variables defined as the minimum of boolean-guarded constants
//! - linear (in)equality constraints and a single linear objective to minimize
//! - a wall-clock time limit
//!
//! [`BranchAndBound`] is the backend shipped with the crate.

use crate::error::{Error, Result};
use std::time::Duration;

pub mod branch_bound;

pub use branch_bound::BranchAndBound;

/// Handle of a boolean decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BoolVar(pub(crate) usize);

/// Handle of a defined integer variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IntVar(pub(crate) usize);

impl BoolVar {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Var {
    Bool(BoolVar),
    Int(IntVar),
}

impl From<BoolVar> for Var {
    fn from(var: BoolVar) -> Self {
        Var::Bool(var)
    }
}

impl From<IntVar> for Var {
    fn from(var: IntVar) -> Self {
        Var::Int(var)
    }
}

/// `sum(coefficient * var) + constant`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinearExpr {
    pub terms: Vec<(i64, Var)>,
    pub constant: i64,
}

impl LinearExpr {
    pub fn new() -> Self {
        Self::default()
    }

    /// Plain sum of variables.
    pub fn sum<I, V>(vars: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Var>,
    {
        Self {
            terms: vars.into_iter().map(|v| (1, v.into())).collect(),
            constant: 0,
        }
    }

    /// Sum of `weights[k] * vars[k]`. Extra elements on either side are ignored.
    pub fn weighted_sum<I, V>(vars: I, weights: &[i64]) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Var>,
    {
        Self {
            terms: vars
                .into_iter()
                .zip(weights.iter())
                .map(|(v, w)| (*w, v.into()))
                .collect(),
            constant: 0,
        }
    }

    pub fn add_term(&mut self, coefficient: i64, var: impl Into<Var>) {
        self.terms.push((coefficient, var.into()));
    }

    pub fn with_term(mut self, coefficient: i64, var: impl Into<Var>) -> Self {
        self.add_term(coefficient, var);
        self
    }
}

/// One guarded value of a [`MinVarDef`]: `if literal { if_true } else { if_false }`.
///
/// This is the linear form `if_true * x + if_false * (1 - x)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MinOption {
    pub literal: BoolVar,
    pub if_true: i64,
    pub if_false: i64,
}

/// Integer variable constrained to `min(fallback, options...)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MinVarDef {
    pub name: String,
    pub fallback: i64,
    pub options: Vec<MinOption>,
}

impl MinVarDef {
    /// Value under a complete boolean assignment.
    pub fn evaluate(&self, bools: &[bool]) -> i64 {
        self.options
            .iter()
            .map(|o| if bools[o.literal.0] { o.if_true } else { o.if_false })
            .fold(self.fallback, i64::min)
    }
}

/// `lower <= expr <= upper`; a missing side is unbounded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearConstraint {
    pub name: String,
    pub expr: LinearExpr,
    pub lower: Option<i64>,
    pub upper: Option<i64>,
}

impl LinearConstraint {
    pub fn is_satisfied_by(&self, value: i64) -> bool {
        self.lower.map_or(true, |lo| value >= lo) && self.upper.map_or(true, |hi| value <= hi)
    }
}

/// Model handed to a backend.
#[derive(Debug, Clone, Default)]
pub struct CpModel {
    bool_names: Vec<String>,
    ints: Vec<MinVarDef>,
    constraints: Vec<LinearConstraint>,
    objective: Option<LinearExpr>,
    hints: Vec<Option<bool>>,
}

impl CpModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_bool_var(&mut self, name: impl Into<String>) -> BoolVar {
        self.bool_names.push(name.into());
        self.hints.push(None);
        BoolVar(self.bool_names.len() - 1)
    }

    pub fn new_min_var(
        &mut self,
        name: impl Into<String>,
        fallback: i64,
        options: Vec<MinOption>,
    ) -> IntVar {
        self.ints.push(MinVarDef { name: name.into(), fallback, options });
        IntVar(self.ints.len() - 1)
    }

    pub fn add_constraint(
        &mut self,
        name: impl Into<String>,
        expr: LinearExpr,
        lower: Option<i64>,
        upper: Option<i64>,
    ) {
        self.constraints.push(LinearConstraint { name: name.into(), expr, lower, upper });
    }

    pub fn add_le(&mut self, name: impl Into<String>, expr: LinearExpr, upper: i64) {
        self.add_constraint(name, expr, None, Some(upper));
    }

    pub fn add_ge(&mut self, name: impl Into<String>, expr: LinearExpr, lower: i64) {
        self.add_constraint(name, expr, Some(lower), None);
    }

    pub fn add_eq(&mut self, name: impl Into<String>, expr: LinearExpr, value: i64) {
        self.add_constraint(name, expr, Some(value), Some(value));
    }

    /// Replace the active objective.
    pub fn minimize(&mut self, expr: LinearExpr) {
        self.objective = Some(expr);
    }

    pub fn add_hint(&mut self, var: BoolVar, value: bool) {
        self.hints[var.0] = Some(value);
    }

    pub fn num_bools(&self) -> usize {
        self.bool_names.len()
    }

    pub fn int_defs(&self) -> &[MinVarDef] {
        &self.ints
    }

    pub fn constraints(&self) -> &[LinearConstraint] {
        &self.constraints
    }

    pub fn objective(&self) -> Option<&LinearExpr> {
        self.objective.as_ref()
    }

    pub fn hint(&self, var: BoolVar) -> Option<bool> {
        self.hints[var.0]
    }

    /// Value of `expr` under a complete boolean assignment.
    pub fn evaluate(&self, expr: &LinearExpr, bools: &[bool]) -> i64 {
        expr.terms.iter().fold(expr.constant, |acc, (coef, var)| {
            let value = match var {
                Var::Bool(b) => bools[b.0] as i64,
                Var::Int(i) => self.ints[i.0].evaluate(bools),
            };
            acc + coef * value
        })
    }

    pub fn is_feasible(&self, bools: &[bool]) -> bool {
        self.constraints
            .iter()
            .all(|c| c.is_satisfied_by(self.evaluate(&c.expr, bools)))
    }

    /// Check every variable reference before a solve.
    pub fn validate(&self) -> Result<()> {
        let check_var = |var: &Var, context: &str| -> Result<()> {
            let in_range = match var {
                Var::Bool(b) => b.0 < self.bool_names.len(),
                Var::Int(i) => i.0 < self.ints.len(),
            };
            if in_range {
                Ok(())
            } else {
                Err(Error::Model(format!("{} references unknown variable {:?}", context, var)))
            }
        };

        for def in &self.ints {
            for option in &def.options {
                check_var(&Var::Bool(option.literal), &def.name)?;
            }
        }
        for constraint in &self.constraints {
            if let (Some(lo), Some(hi)) = (constraint.lower, constraint.upper) {
                if lo > hi {
                    return Err(Error::Model(format!(
                        "constraint '{}' has empty range [{}, {}]",
                        constraint.name, lo, hi
                    )));
                }
            }
            for (_, var) in &constraint.expr.terms {
                check_var(var, &constraint.name)?;
            }
        }
        if let Some(objective) = &self.objective {
            for (_, var) in &objective.terms {
                check_var(var, "objective")?;
            }
        }
        Ok(())
    }
}

/// Outcome class of a single solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SolveStatus {
    /// Proven optimal.
    Optimal,
    /// Stopped at the time limit holding a feasible incumbent.
    Feasible,
    /// Proven to admit no assignment.
    Infeasible,
    /// Stopped at the time limit without any feasible assignment.
    Unknown,
}

impl SolveStatus {
    pub fn name(&self) -> &'static str {
        match self {
            SolveStatus::Optimal => "Optimal",
            SolveStatus::Feasible => "Feasible",
            SolveStatus::Infeasible => "Infeasible",
            SolveStatus::Unknown => "Unknown",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SolveParams {
    /// `None` is unbounded.
    pub time_limit: Option<Duration>,
    /// Search nodes between two deadline checks.
    pub check_interval: u64,
}

impl Default for SolveParams {
    fn default() -> Self {
        Self { time_limit: None, check_interval: 1024 }
    }
}

#[derive(Debug, Clone)]
pub struct SolveOutcome {
    pub status: SolveStatus,
    /// Objective of the returned assignment, when there is one.
    pub objective: Option<i64>,
    /// One entry per boolean variable; empty without a solution.
    pub assignment: Vec<bool>,
    pub wall_time: Duration,
    pub nodes: u64,
}

impl SolveOutcome {
    pub fn value(&self, var: BoolVar) -> bool {
        self.assignment[var.0]
    }
}

/// A constraint-solving backend.
pub trait SolverBackend {
    fn name(&self) -> &'static str;

    /// Minimize the model's objective (a missing objective is the constant 0).
    /// Must return by the time limit.
    fn solve(&self, model: &CpModel, params: &SolveParams) -> Result<SolveOutcome>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_var_evaluation() {
        let mut model = CpModel::new();
        let a = model.new_bool_var("a");
        let b = model.new_bool_var("b");
        let cost = model.new_min_var(
            "cost",
            100,
            vec![
                MinOption { literal: a, if_true: 40, if_false: 100 },
                MinOption { literal: b, if_true: 70, if_false: 100 },
            ],
        );
        let expr = LinearExpr::sum([cost]);

        assert_eq!(model.evaluate(&expr, &[false, false]), 100);
        assert_eq!(model.evaluate(&expr, &[false, true]), 70);
        // Both selected: the cheaper one applies, nothing is added up.
        assert_eq!(model.evaluate(&expr, &[true, true]), 40);
    }

    #[test]
    fn test_constraint_feasibility() {
        let mut model = CpModel::new();
        let vars: Vec<BoolVar> = (0..3).map(|i| model.new_bool_var(format!("x_{}", i))).collect();
        model.add_le("at_most_two", LinearExpr::sum(vars.iter().copied()), 2);
        model.add_ge("weighted", LinearExpr::weighted_sum(vars.iter().copied(), &[1, 2, 4]), 3);

        assert!(model.is_feasible(&[true, true, false]));
        assert!(!model.is_feasible(&[true, true, true]));
        assert!(!model.is_feasible(&[true, false, false]));
    }

    #[test]
    fn test_validate_rejects_unknown_variables() {
        let mut model = CpModel::new();
        model.new_bool_var("x_0");
        model.add_le("bad", LinearExpr::new().with_term(1, BoolVar(7)), 1);
        assert!(matches!(model.validate(), Err(Error::Model(_))));
    }

    #[test]
    fn test_validate_rejects_empty_range() {
        let mut model = CpModel::new();
        let x = model.new_bool_var("x_0");
        model.add_constraint("empty", LinearExpr::sum([x]), Some(2), Some(1));
        assert!(model.validate().is_err());
    }
}
