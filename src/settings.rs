//! Optimizer settings: goal sequence, rules and time limit.

use crate::error::{Error, Result};
use crate::goal::{Goal, GoalKind};
use crate::input::{RuleInput, SettingsInput};
use crate::problem::{downscale, upscale, Problem};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::time::Duration;

pub const MAX_POSSIBLE_INDEXES_RULE: &str = "Maximum Number of Possible Indexes";
pub const MAX_WRITE_OVERHEAD_RULE: &str = "Maximum Index Write Overhead";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKind {
    MaximumPossibleIndexes,
    MaximumWriteOverhead,
}

impl RuleKind {
    pub fn name(&self) -> &'static str {
        match self {
            RuleKind::MaximumPossibleIndexes => MAX_POSSIBLE_INDEXES_RULE,
            RuleKind::MaximumWriteOverhead => MAX_WRITE_OVERHEAD_RULE,
        }
    }

    pub fn parse(name: &str) -> Result<Self> {
        match name.trim() {
            MAX_POSSIBLE_INDEXES_RULE | "MaximumNumberOfPossibleIndexes" => {
                Ok(RuleKind::MaximumPossibleIndexes)
            }
            MAX_WRITE_OVERHEAD_RULE | "MaximumIndexWriteOverhead" => Ok(RuleKind::MaximumWriteOverhead),
            other => Err(Error::validation(format!(
                "unknown rule '{}' (expected '{}' or '{}')",
                other, MAX_POSSIBLE_INDEXES_RULE, MAX_WRITE_OVERHEAD_RULE
            ))),
        }
    }
}

/// Structural limits applied to every goal's solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rules {
    /// Upper bound on the number of selected possible indexes.
    pub max_possible_indexes: usize,
    /// Upper bound on the summed write overhead, scaled.
    pub max_write_overhead: i64,
}

impl Rules {
    /// Non-binding limits for `problem`.
    pub fn unbounded(problem: &Problem) -> Self {
        Self {
            max_possible_indexes: problem.num_possible(),
            max_write_overhead: problem.total_write_overhead(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub goals: Vec<Goal>,
    pub rules: Rules,
    /// `None` is unbounded.
    pub time_limit: Option<Duration>,
}

impl Settings {
    /// Default goals, non-binding rules and no time limit.
    pub fn defaults(problem: &Problem) -> Self {
        Self { goals: default_goals(), rules: Rules::unbounded(problem), time_limit: None }
    }

    pub fn from_input(input: &SettingsInput, problem: &Problem) -> Result<Self> {
        let goals = match &input.options.goals {
            None => default_goals(),
            Some(entries) if entries.is_empty() => {
                return Err(Error::validation("at least one goal is required"));
            }
            Some(entries) => {
                let mut seen = HashSet::new();
                let mut goals = Vec::with_capacity(entries.len());
                for entry in entries {
                    let goal = Goal::parse(&entry.name, entry.tolerance.unwrap_or(0.0))?;
                    if !seen.insert(goal.kind()) {
                        return Err(Error::validation(format!("duplicate goal '{}'", goal.name())));
                    }
                    goals.push(goal);
                }
                goals
            }
        };

        let rules = read_rules(&input.options.rules, problem)?;

        let time_limit = match input.time_limit {
            Some(seconds) => time_limit_from_secs(seconds)?,
            None => None,
        };

        Ok(Self { goals, rules, time_limit })
    }
}

/// Parse a time limit in seconds.
///
/// Limits too large for a [`Duration`] are treated as unbounded (`None`).
pub fn time_limit_from_secs(seconds: f64) -> Result<Option<Duration>> {
    if !seconds.is_finite() || seconds < 0.0 {
        return Err(Error::validation(format!(
            "time limit must be a non-negative number of seconds, got {}",
            seconds
        )));
    }
    Ok(Duration::try_from_secs_f64(seconds).ok())
}

/// Total cost first, then index count, both strict.
pub fn default_goals() -> Vec<Goal> {
    vec![Goal::strict(GoalKind::Cost), Goal::strict(GoalKind::IndexCount)]
}

fn read_rules(entries: &[RuleInput], problem: &Problem) -> Result<Rules> {
    let mut rules = Rules::unbounded(problem);
    let mut seen = HashSet::new();

    for entry in entries {
        let kind = RuleKind::parse(&entry.name)?;
        if !seen.insert(kind) {
            return Err(Error::validation(format!("duplicate rule '{}' in settings", kind.name())));
        }
        if entry.value.is_null() {
            continue;
        }

        match kind {
            RuleKind::MaximumPossibleIndexes => {
                let value = entry.value.as_u64().ok_or_else(|| invalid_rule_value(kind, &entry.value))?;
                rules.max_possible_indexes = usize::try_from(value).unwrap_or(usize::MAX);
            }
            RuleKind::MaximumWriteOverhead => {
                let value = entry
                    .value
                    .as_f64()
                    .filter(|v| v.is_finite() && *v >= 0.0)
                    .ok_or_else(|| invalid_rule_value(kind, &entry.value))?;
                rules.max_write_overhead = upscale(value);
            }
        }
    }

    Ok(rules)
}

fn invalid_rule_value(kind: RuleKind, value: &Value) -> Error {
    let expected = match kind {
        RuleKind::MaximumPossibleIndexes => "a non-negative integer",
        RuleKind::MaximumWriteOverhead => "a non-negative number",
    };
    Error::validation(format!("rule '{}' must be {}, got {}", kind.name(), expected, value))
}

impl fmt::Display for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Goals:")?;
        for goal in &self.goals {
            writeln!(f, "  {}: {}", goal.name(), goal.tolerance())?;
        }
        writeln!(f, "Rules:")?;
        writeln!(f, "  {}: {}", MAX_POSSIBLE_INDEXES_RULE, self.rules.max_possible_indexes)?;
        writeln!(
            f,
            "  {}: {:.2}",
            MAX_WRITE_OVERHEAD_RULE,
            downscale(self.rules.max_write_overhead)
        )?;
        match self.time_limit {
            Some(limit) => writeln!(f, "Time limit: {:.3}s", limit.as_secs_f64()),
            None => writeln!(f, "Time limit: none"),
        }
    }
}
