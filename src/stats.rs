//! Statistics derived from a selection.
//!
//! Everything here is a pure function of the [`Problem`] and a selection
//! vector (one flag per index, in index order).

use crate::goal::GoalKind;
use crate::problem::{downscale, Problem};
use serde::{Deserialize, Serialize};

/// Realized cost of `scan`: cheapest selected covering index, else sequential.
pub fn cost_of_scan(problem: &Problem, selection: &[bool], scan: usize) -> i64 {
    selected_covering(problem, selection, scan)
        .map(|(_, cost)| cost)
        .fold(problem.sequential_cost(scan), i64::min)
}

/// Selected index giving `scan` its lowest cost.
///
/// Ties go to the lowest index position. `None` when no selected index covers
/// the scan.
pub fn best_covered_by(problem: &Problem, selection: &[bool], scan: usize) -> Option<usize> {
    let mut best: Option<(usize, i64)> = None;
    for (index, cost) in selected_covering(problem, selection, scan) {
        if best.map_or(true, |(_, best_cost)| cost < best_cost) {
            best = Some((index, cost));
        }
    }
    best.map(|(index, _)| index)
}

fn selected_covering<'a>(
    problem: &'a Problem,
    selection: &'a [bool],
    scan: usize,
) -> impl Iterator<Item = (usize, i64)> + 'a {
    problem
        .covering_indexes(scan)
        .filter(move |&i| selection[i])
        .filter_map(move |i| problem.index_cost(i, scan).map(|cost| (i, cost)))
}

pub fn total_coverage(problem: &Problem, selection: &[bool]) -> usize {
    (0..problem.num_scans())
        .filter(|&scan| cost_of_scan(problem, selection, scan) < problem.sequential_cost(scan))
        .count()
}

pub fn total_cost(problem: &Problem, selection: &[bool]) -> i64 {
    (0..problem.num_scans()).map(|scan| cost_of_scan(problem, selection, scan)).sum()
}

pub fn maximum_cost(problem: &Problem, selection: &[bool]) -> i64 {
    (0..problem.num_scans())
        .map(|scan| cost_of_scan(problem, selection, scan))
        .max()
        .unwrap_or(0)
}

pub fn num_indexes_used(selection: &[bool]) -> usize {
    selection.iter().filter(|s| **s).count()
}

pub fn total_write_overhead(problem: &Problem, selection: &[bool]) -> i64 {
    write_overhead_in(problem, selection, 0..problem.num_indexes())
}

pub fn existing_write_overhead(problem: &Problem, selection: &[bool]) -> i64 {
    write_overhead_in(problem, selection, 0..problem.num_existing())
}

pub fn possible_write_overhead(problem: &Problem, selection: &[bool]) -> i64 {
    write_overhead_in(problem, selection, problem.num_existing()..problem.num_indexes())
}

fn write_overhead_in(problem: &Problem, selection: &[bool], range: std::ops::Range<usize>) -> i64 {
    range
        .filter(|&i| selection[i])
        .map(|i| problem.write_overheads()[i])
        .sum()
}

/// Raw (scaled) value of a goal's expression for `selection`.
pub fn objective_value(kind: GoalKind, problem: &Problem, selection: &[bool]) -> i64 {
    match kind {
        GoalKind::Cost => total_cost(problem, selection),
        GoalKind::IndexCount => num_indexes_used(selection) as i64,
        GoalKind::WriteOverhead => total_write_overhead(problem, selection),
    }
}

/// Goal value in the caller's units.
pub fn real_objective_value(kind: GoalKind, problem: &Problem, selection: &[bool]) -> f64 {
    let raw = objective_value(kind, problem, selection);
    if kind.is_scaled() {
        downscale(raw)
    } else {
        raw as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverageStats {
    #[serde(rename = "Total")]
    pub total: usize,
    #[serde(rename = "Existing")]
    pub existing: usize,
    #[serde(rename = "Possible")]
    pub possible: usize,
    #[serde(rename = "Uncovered")]
    pub uncovered: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CostStats {
    #[serde(rename = "Total")]
    pub total: f64,
    #[serde(rename = "Maximum")]
    pub maximum: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexUsageStats {
    #[serde(rename = "Total")]
    pub total: usize,
    #[serde(rename = "Existing")]
    pub existing: usize,
    #[serde(rename = "Possible")]
    pub possible: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteOverheadStats {
    #[serde(rename = "Total")]
    pub total: f64,
    #[serde(rename = "Existing")]
    pub existing: f64,
    #[serde(rename = "Possible")]
    pub possible: f64,
}

/// Aggregates over a final selection, downscaled to the caller's units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(rename = "Coverage")]
    pub coverage: CoverageStats,
    #[serde(rename = "Cost")]
    pub cost: CostStats,
    #[serde(rename = "Indexes Used")]
    pub indexes_used: IndexUsageStats,
    #[serde(rename = "Index Write Overhead")]
    pub write_overhead: WriteOverheadStats,
}

impl Statistics {
    pub fn compute(problem: &Problem, selection: &[bool]) -> Self {
        let (mut existing, mut possible) = (0, 0);
        for scan in 0..problem.num_scans() {
            match best_covered_by(problem, selection, scan) {
                Some(index) if problem.is_existing(index) => existing += 1,
                Some(_) => possible += 1,
                None => {}
            }
        }
        let covered = total_coverage(problem, selection);

        let used = |range: std::ops::Range<usize>| range.filter(|&i| selection[i]).count();

        Self {
            coverage: CoverageStats {
                total: covered,
                existing,
                possible,
                uncovered: problem.num_scans() - covered,
            },
            cost: CostStats {
                total: downscale(total_cost(problem, selection)),
                maximum: downscale(maximum_cost(problem, selection)),
            },
            indexes_used: IndexUsageStats {
                total: num_indexes_used(selection),
                existing: used(0..problem.num_existing()),
                possible: used(problem.num_existing()..problem.num_indexes()),
            },
            write_overhead: WriteOverheadStats {
                total: downscale(total_write_overhead(problem, selection)),
                existing: downscale(existing_write_overhead(problem, selection)),
                possible: downscale(possible_write_overhead(problem, selection)),
            },
        }
    }
}
