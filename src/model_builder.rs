//! Decision variables and structural constraints of the index-selection model.

use crate::problem::Problem;
use crate::settings::Rules;
use crate::solver::{BoolVar, CpModel, IntVar, LinearExpr, MinOption};
use tracing::debug;

/// The shared model all goals are solved against.
///
/// Built once per run. Goals swap the objective and append bounding
/// constraints; the variables and rule constraints never change.
#[derive(Debug, Clone)]
pub struct SelectionModel {
    pub cp: CpModel,
    /// `selected[i]`: index `i` is kept or created.
    selected: Vec<BoolVar>,
    /// `scan_costs[j]`: realized cost of scan `j`.
    scan_costs: Vec<IntVar>,
    write_overheads: Vec<i64>,
    num_existing: usize,
}

impl SelectionModel {
    pub fn build(problem: &Problem, rules: &Rules) -> Self {
        let mut cp = CpModel::new();

        // Existing indexes are not pinned; dropping one is a valid recommendation.
        let selected: Vec<BoolVar> = (0..problem.num_indexes())
            .map(|i| cp.new_bool_var(format!("x_{}", i)))
            .collect();

        // Realized scan cost: the cheapest selected covering index, else the
        // sequential cost. Only covering indexes can lower it.
        let scan_costs: Vec<IntVar> = (0..problem.num_scans())
            .map(|j| {
                let sequential = problem.sequential_cost(j);
                let options = problem
                    .covering_indexes(j)
                    .map(|i| MinOption {
                        literal: selected[i],
                        if_true: problem.real_cost(i, j),
                        if_false: sequential,
                    })
                    .collect();
                cp.new_min_var(format!("scan_cost_{}", j), sequential, options)
            })
            .collect();

        let mut model = Self {
            cp,
            selected,
            scan_costs,
            write_overheads: problem.write_overheads().to_vec(),
            num_existing: problem.num_existing(),
        };

        let possible = LinearExpr::sum(model.possible_selected().iter().copied());
        let write_overhead = model.write_overhead_expr();
        let max_possible = i64::try_from(rules.max_possible_indexes).unwrap_or(i64::MAX);
        model.cp.add_le("maximum_possible_indexes", possible, max_possible);
        model.cp.add_le("maximum_write_overhead", write_overhead, rules.max_write_overhead);

        debug!(
            selection_vars = model.selected.len(),
            scan_cost_vars = model.scan_costs.len(),
            max_possible_indexes = rules.max_possible_indexes,
            max_write_overhead = rules.max_write_overhead,
            "Built selection model"
        );

        model
    }

    pub fn selected(&self) -> &[BoolVar] {
        &self.selected
    }

    pub fn existing_selected(&self) -> &[BoolVar] {
        &self.selected[..self.num_existing]
    }

    pub fn possible_selected(&self) -> &[BoolVar] {
        &self.selected[self.num_existing..]
    }

    pub fn scan_costs(&self) -> &[IntVar] {
        &self.scan_costs
    }

    /// Weighted sum of selections by write overhead.
    pub fn write_overhead_expr(&self) -> LinearExpr {
        LinearExpr::weighted_sum(self.selected.iter().copied(), &self.write_overheads)
    }

    /// Number of selected indexes.
    pub fn index_count_expr(&self) -> LinearExpr {
        LinearExpr::sum(self.selected.iter().copied())
    }

    /// Sum of realized scan costs.
    pub fn cost_expr(&self) -> LinearExpr {
        LinearExpr::sum(self.scan_costs.iter().copied())
    }

    /// Warm-start the next solve from a previous selection.
    pub fn set_hints(&mut self, selection: &[bool]) {
        for (var, value) in self.selected.iter().zip(selection.iter()) {
            self.cp.add_hint(*var, *value);
        }
    }

    /// Selection vector of a backend assignment, in index order.
    pub fn selection_from(&self, assignment: &[bool]) -> Vec<bool> {
        self.selected.iter().map(|var| assignment[var.index()]).collect()
    }
}
