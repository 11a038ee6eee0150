//! Lexicographic multi-goal optimizer.
//!
//! Goals are solved strictly one after another against a single shared
//! [`SelectionModel`]. After each solve the goal is frozen as a
//! `<= floor(value * (1 + tolerance))` constraint, so later goals can only
//! trade within the slack earlier goals allow.

use crate::error::{Error, Result};
use crate::goal::{Goal, GoalKind};
use crate::model_builder::SelectionModel;
use crate::problem::Problem;
use crate::settings::Settings;
use crate::solver::{BranchAndBound, SolveParams, SolveStatus, SolverBackend};
use crate::stats;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, trace, warn};

/// Backend and run configuration.
#[derive(Debug, Clone)]
pub struct SolverConfig {
    /// Per-goal time limit. Overrides the settings document when set.
    pub time_limit: Option<Duration>,
    /// Seed each goal's search with the previous goal's selection.
    pub warm_start: bool,
    /// Search nodes between two deadline checks.
    pub check_interval: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            time_limit: None,
            warm_start: true,
            check_interval: 1024,
        }
    }
}

/// Token for cancelling a run between two goals.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Cancel this token
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }

    /// Check if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of one goal's solve.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalSolution {
    pub goal: GoalKind,
    pub tolerance: f64,
    pub status: SolveStatus,
    /// Raw (scaled) optimum reported by the backend.
    pub objective_value: i64,
    /// Optimum in the caller's units.
    pub real_value: f64,
    /// One flag per index, existing first.
    pub selection: Vec<bool>,
    pub wall_time: Duration,
    pub nodes: u64,
}

impl GoalSolution {
    pub fn is_optimal(&self) -> bool {
        self.status == SolveStatus::Optimal
    }
}

/// Append-only record of goal solutions, in solve order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Solutions {
    entries: Vec<GoalSolution>,
}

impl Solutions {
    fn push(&mut self, solution: GoalSolution) {
        assert!(
            self.get(solution.goal).is_none(),
            "goal '{}' recorded twice",
            solution.goal
        );
        self.entries.push(solution);
    }

    pub fn get(&self, goal: GoalKind) -> Option<&GoalSolution> {
        self.entries.iter().find(|s| s.goal == goal)
    }

    /// The last solution satisfies every goal's bound; it is the answer.
    pub fn final_solution(&self) -> Option<&GoalSolution> {
        self.entries.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &GoalSolution> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// False when any goal stopped at the time limit.
    pub fn all_optimal(&self) -> bool {
        self.entries.iter().all(GoalSolution::is_optimal)
    }
}

/// Phases of a run. Failure is an early `Err` return.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunState {
    Pending(usize),
    Solving(usize),
    Solved(usize),
    Done,
}

pub struct LexicographicOptimizer<B: SolverBackend = BranchAndBound> {
    backend: B,
    config: SolverConfig,
    cancellation: CancellationToken,
}

impl LexicographicOptimizer<BranchAndBound> {
    pub fn new(config: SolverConfig) -> Self {
        Self::with_backend(BranchAndBound::new(), config)
    }
}

impl<B: SolverBackend> LexicographicOptimizer<B> {
    pub fn with_backend(backend: B, config: SolverConfig) -> Self {
        Self {
            backend,
            config,
            cancellation: CancellationToken::new(),
        }
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    /// Solve every goal of `settings` in order.
    pub fn optimize(&self, problem: &Problem, settings: &Settings) -> Result<Solutions> {
        let mut goals: Vec<Goal> = settings.goals.clone();
        assert!(goals.iter().all(|g| !g.is_solved()), "goals must start unsolved");

        let params = SolveParams {
            time_limit: self.config.time_limit.or(settings.time_limit),
            check_interval: self.config.check_interval,
        };
        let mut model = SelectionModel::build(problem, &settings.rules);
        let mut solutions = Solutions::default();

        info!(
            goals = goals.len(),
            backend = self.backend.name(),
            time_limit_s = params.time_limit.map(|t| t.as_secs_f64()),
            "Start of the solving process"
        );

        let mut state = RunState::Pending(0);
        loop {
            trace!(?state, "Optimizer state");
            state = match state {
                RunState::Pending(step) if step == goals.len() => RunState::Done,
                RunState::Pending(step) => {
                    if self.cancellation.is_cancelled() {
                        warn!(completed = step, "Run cancelled");
                        return Err(Error::Cancelled { completed: step });
                    }

                    let goal = &goals[step];
                    debug!(step = step + 1, goal = goal.name(), "{}", goal.kind().objective_description());
                    goal.add_as_objective(&mut model);

                    if self.config.warm_start {
                        if let Some(previous) = solutions.final_solution() {
                            model.set_hints(&previous.selection);
                        }
                    }
                    RunState::Solving(step)
                }
                RunState::Solving(step) => {
                    let kind = goals[step].kind();
                    let outcome = self.backend.solve(&model.cp, &params)?;

                    let objective_value = match (outcome.status, outcome.objective) {
                        (SolveStatus::Infeasible, _) => {
                            return Err(Error::Infeasible { goal: kind.name().to_string() });
                        }
                        (SolveStatus::Unknown, _) | (_, None) => {
                            return Err(Error::NoSolution { goal: kind.name().to_string() });
                        }
                        (_, Some(value)) => value,
                    };
                    if outcome.status == SolveStatus::Feasible {
                        warn!(
                            goal = kind.name(),
                            objective = objective_value,
                            "Time limit reached before optimality was proven; using the best selection found"
                        );
                    }

                    let selection = model.selection_from(&outcome.assignment);
                    debug_assert_eq!(objective_value, stats::objective_value(kind, problem, &selection));

                    goals[step].record_value(objective_value);
                    let real_value = stats::real_objective_value(kind, problem, &selection);
                    debug!(
                        goal = kind.name(),
                        status = outcome.status.name(),
                        objective = objective_value,
                        real_value,
                        nodes = outcome.nodes,
                        "The solution found has value {}",
                        objective_value
                    );

                    solutions.push(GoalSolution {
                        goal: kind,
                        tolerance: goals[step].tolerance(),
                        status: outcome.status,
                        objective_value,
                        real_value,
                        selection,
                        wall_time: outcome.wall_time,
                        nodes: outcome.nodes,
                    });
                    RunState::Solved(step)
                }
                RunState::Solved(step) => {
                    let goal = &goals[step];
                    goal.add_as_constraint(&mut model);
                    debug!(goal = goal.name(), "{}", goal.constraint_description());
                    RunState::Pending(step + 1)
                }
                RunState::Done => break,
            };
        }

        info!(
            solved = solutions.len(),
            optimal = solutions.all_optimal(),
            "End of the solving process"
        );
        Ok(solutions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{SettingsInput, WorkloadInput};
    use crate::solver::{CpModel, SolveOutcome};

    fn problem() -> Problem {
        let json = r#"{
            "Scans": [
                {"Scan ID": "s0", "Sequential Scan Cost": 100,
                 "Existing Index Costs": [{"Index OID": 1, "Cost": 50}]},
                {"Scan ID": "s1", "Sequential Scan Cost": 200,
                 "Possible Index Costs": [{"Index OID": 2, "Cost": 80}]}
            ],
            "Existing Indexes": [{"Index": {"Index OID": 1}, "Index Write Overhead": 10}],
            "Possible Indexes": [{"Index": {"Index OID": 2}, "Index Write Overhead": 20}]
        }"#;
        Problem::from_input(&WorkloadInput::from_json(json).unwrap()).unwrap()
    }

    fn settings(problem: &Problem, json: &str) -> Settings {
        Settings::from_input(&SettingsInput::from_json(json).unwrap(), problem).unwrap()
    }

    #[test]
    fn test_default_goals_select_both_indexes() {
        let problem = problem();
        let solutions = LexicographicOptimizer::new(SolverConfig::default())
            .optimize(&problem, &Settings::defaults(&problem))
            .unwrap();

        assert_eq!(solutions.len(), 2);
        let cost = solutions.get(GoalKind::Cost).unwrap();
        assert_eq!(cost.objective_value, 13000);
        assert_eq!(cost.real_value, 130.0);

        let last = solutions.final_solution().unwrap();
        assert_eq!(last.goal, GoalKind::IndexCount);
        assert_eq!(last.objective_value, 2);
        assert_eq!(last.selection, vec![true, true]);
        assert!(solutions.all_optimal());
    }

    #[test]
    fn test_index_count_first_drops_everything() {
        let problem = problem();
        let settings = settings(
            &problem,
            r#"{"Options": {"Goals": [{"Name": "Minimal Indexes"}, {"Name": "Minimal Cost"}]}}"#,
        );
        let solutions = LexicographicOptimizer::new(SolverConfig::default())
            .optimize(&problem, &settings)
            .unwrap();

        let last = solutions.final_solution().unwrap();
        assert_eq!(last.selection, vec![false, false]);
        assert_eq!(last.objective_value, 30000);
    }

    #[test]
    fn test_tolerance_allows_trade_off() {
        let problem = problem();
        // Cost bound becomes floor(13000 * 1.5) = 19500, which admits index 2 alone (180.0).
        let settings = settings(
            &problem,
            r#"{"Options": {"Goals": [{"Name": "Minimal Cost", "Tolerance": 0.5}, {"Name": "Minimal Indexes"}]}}"#,
        );
        let solutions = LexicographicOptimizer::new(SolverConfig::default())
            .optimize(&problem, &settings)
            .unwrap();

        let last = solutions.final_solution().unwrap();
        assert_eq!(last.selection, vec![false, true]);
        assert_eq!(last.objective_value, 1);
        assert_eq!(solutions.get(GoalKind::Cost).unwrap().objective_value, 13000);
    }

    #[test]
    fn test_cancelled_before_first_goal() {
        let problem = problem();
        let optimizer = LexicographicOptimizer::new(SolverConfig::default());
        optimizer.cancellation_token().cancel();

        let err = optimizer.optimize(&problem, &Settings::defaults(&problem)).unwrap_err();
        assert!(matches!(err, Error::Cancelled { completed: 0 }));
    }

    struct AlwaysInfeasible;

    impl SolverBackend for AlwaysInfeasible {
        fn name(&self) -> &'static str {
            "always-infeasible"
        }

        fn solve(&self, _model: &CpModel, _params: &SolveParams) -> Result<SolveOutcome> {
            Ok(SolveOutcome {
                status: SolveStatus::Infeasible,
                objective: None,
                assignment: Vec::new(),
                wall_time: Duration::ZERO,
                nodes: 0,
            })
        }
    }

    #[test]
    fn test_infeasible_names_goal() {
        let problem = problem();
        let err = LexicographicOptimizer::with_backend(AlwaysInfeasible, SolverConfig::default())
            .optimize(&problem, &Settings::defaults(&problem))
            .unwrap_err();

        match err {
            Error::Infeasible { goal } => assert_eq!(goal, "Minimal Cost"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_zero_time_limit_without_incumbent() {
        let problem = problem();
        let config = SolverConfig { time_limit: Some(Duration::ZERO), ..Default::default() };
        let err = LexicographicOptimizer::new(config)
            .optimize(&problem, &Settings::defaults(&problem))
            .unwrap_err();
        assert!(matches!(err, Error::NoSolution { .. }));
    }
}
