//! Optimization goals.
//!
//! A goal is first an objective; once solved it turns into a constraint that
//! keeps every later goal within its tolerance of the value it reached.

use crate::error::{Error, Result};
use crate::model_builder::SelectionModel;
use crate::solver::LinearExpr;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum GoalKind {
    /// Sum of realized scan costs.
    Cost,
    /// Number of selected indexes.
    IndexCount,
    /// Sum of write overheads of selected indexes.
    WriteOverhead,
}

impl GoalKind {
    pub const ALL: [GoalKind; 3] = [GoalKind::Cost, GoalKind::IndexCount, GoalKind::WriteOverhead];

    /// Canonical name, used as the goal's identity in reports.
    pub fn name(&self) -> &'static str {
        match self {
            GoalKind::Cost => "Minimal Cost",
            GoalKind::IndexCount => "Minimal Indexes",
            GoalKind::WriteOverhead => "Minimal Index Write Overhead",
        }
    }

    fn aliases(&self) -> &'static [&'static str] {
        match self {
            GoalKind::Cost => &["Minimize Total Cost", "MinimalCost"],
            GoalKind::IndexCount => &["Minimize Number of Indexes", "MinimalIndexes"],
            GoalKind::WriteOverhead => &[
                "Minimize Index Write Overhead",
                "Minimal IWO",
                "MinimalIndexWriteOverhead",
            ],
        }
    }

    /// Whether the goal's value is a fixed-point scaled quantity.
    pub fn is_scaled(&self) -> bool {
        !matches!(self, GoalKind::IndexCount)
    }

    pub fn expression(&self, model: &SelectionModel) -> LinearExpr {
        match self {
            GoalKind::Cost => model.cost_expr(),
            GoalKind::IndexCount => model.index_count_expr(),
            GoalKind::WriteOverhead => model.write_overhead_expr(),
        }
    }

    pub fn objective_description(&self) -> &'static str {
        match self {
            GoalKind::Cost => "Minimize the combined costs of all the scans",
            GoalKind::IndexCount => "Minimize the number of existing and possible indexes",
            GoalKind::WriteOverhead => "Minimize the sum of write overheads of the selected indexes",
        }
    }

    fn subject(&self) -> &'static str {
        match self {
            GoalKind::Cost => "The combined costs of all the scans",
            GoalKind::IndexCount => "The number of existing and possible indexes",
            GoalKind::WriteOverhead => "The sum of all index write overheads",
        }
    }
}

impl FromStr for GoalKind {
    type Err = Error;

    fn from_str(name: &str) -> Result<Self> {
        let name = name.trim();
        GoalKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.name() == name || kind.aliases().contains(&name))
            .ok_or_else(|| {
                let known: Vec<&str> = GoalKind::ALL.iter().map(|k| k.name()).collect();
                Error::validation(format!("unknown goal '{}' (expected one of: {})", name, known.join(", ")))
            })
    }
}

impl fmt::Display for GoalKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

const BOUND_EPSILON: f64 = 1e-12;

/// One optimization priority.
#[derive(Debug, Clone, PartialEq)]
pub struct Goal {
    kind: GoalKind,
    tolerance: f64,
    /// Raw optimum; `None` until solved, then never changes.
    value: Option<i64>,
}

impl Goal {
    pub fn new(kind: GoalKind, tolerance: f64) -> Result<Self> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return Err(Error::validation(format!(
                "tolerance of goal '{}' must be a non-negative number, got {}",
                kind, tolerance
            )));
        }
        Ok(Self { kind, tolerance, value: None })
    }

    /// Zero-tolerance goal.
    pub fn strict(kind: GoalKind) -> Self {
        Self { kind, tolerance: 0.0, value: None }
    }

    pub fn parse(name: &str, tolerance: f64) -> Result<Self> {
        Self::new(name.parse()?, tolerance)
    }

    pub fn kind(&self) -> GoalKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn is_solved(&self) -> bool {
        self.value.is_some()
    }

    /// Raw optimum. Panics when the goal has not been solved.
    pub fn value(&self) -> i64 {
        match self.value {
            Some(value) => value,
            None => panic!("goal '{}' read before it was solved", self.kind),
        }
    }

    /// Record the optimum. A goal is solved exactly once.
    pub fn record_value(&mut self, value: i64) {
        assert!(self.value.is_none(), "goal '{}' solved twice", self.kind);
        self.value = Some(value);
    }

    /// `floor(value * (1 + tolerance))`
    ///
    /// Products such as `100 * 1.14` come out just below the exact integer in
    /// f64, so the product is nudged up by a relative `1e-12` before flooring.
    /// The nudge stays well under one unit for values below `1e11`.
    pub fn bound(&self) -> i64 {
        let scaled = self.value() as f64 * (1.0 + self.tolerance);
        (scaled * (1.0 + BOUND_EPSILON)).floor() as i64
    }

    /// Install this goal as the model's objective.
    pub fn add_as_objective(&self, model: &mut SelectionModel) {
        let expr = self.kind.expression(model);
        model.cp.minimize(expr);
    }

    /// Freeze this solved goal as a bound for every later goal.
    pub fn add_as_constraint(&self, model: &mut SelectionModel) {
        let expr = self.kind.expression(model);
        let bound = self.bound();
        model.cp.add_le(format!("goal: {}", self.kind), expr, bound);
    }

    pub fn constraint_description(&self) -> String {
        format!(
            "{} must be at most {} ({} with a tolerance of {:.2}%)",
            self.kind.subject(),
            self.bound(),
            self.value(),
            self.tolerance * 100.0
        )
    }
}
