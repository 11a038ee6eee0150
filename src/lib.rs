pub mod datagen;
pub mod error;
pub mod goal;
pub mod input;
pub mod logging;
pub mod model_builder;
pub mod optimizer;
pub mod problem;
pub mod report;
pub mod settings;
pub mod solver;
pub mod stats;

pub use error::{Error, Result};
pub use goal::{Goal, GoalKind};
pub use input::{Identifier, SettingsInput, WorkloadInput};
pub use optimizer::{CancellationToken, GoalSolution, LexicographicOptimizer, Solutions, SolverConfig};
pub use problem::{downscale, upscale, Problem, MULTIPLIER};
pub use report::Report;
pub use settings::{Rules, Settings};
pub use solver::{BranchAndBound, SolveStatus, SolverBackend};

use tracing::info;

/// Normalize `workload`, solve every goal and build the report.
///
/// Missing settings select the default goals with non-binding rules.
pub fn recommend(
    workload: &WorkloadInput,
    settings: Option<&SettingsInput>,
    config: SolverConfig,
) -> Result<Report> {
    let problem = Problem::from_input(workload)?;
    let settings = match settings {
        Some(input) => Settings::from_input(input, &problem)?,
        None => Settings::defaults(&problem),
    };
    info!(
        scans = problem.num_scans(),
        existing = problem.num_existing(),
        possible = problem.num_possible(),
        "Loaded workload"
    );

    let solutions = LexicographicOptimizer::new(config).optimize(&problem, &settings)?;
    Ok(Report::build(&problem, &solutions))
}

/// JSON in, pretty JSON out.
pub fn run_json(data: &str, settings: Option<&str>, config: SolverConfig) -> Result<String> {
    let workload = WorkloadInput::from_json(data)?;
    let settings = settings.map(SettingsInput::from_json).transpose()?;
    recommend(&workload, settings.as_ref(), config)?.to_json()
}
