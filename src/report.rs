//! Final result document.

use crate::error::Result;
use crate::input::Identifier;
use crate::optimizer::Solutions;
use crate::problem::{downscale, Problem};
use crate::stats::{self, Statistics};
use serde::de::{self, Deserializer};
use serde::ser::{SerializeMap, Serializer};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;

/// One goal and its optimum, serialized as `{"<goal name>": value}`.
#[derive(Debug, Clone, PartialEq)]
pub struct GoalValue {
    pub name: String,
    pub value: f64,
}

impl Serialize for GoalValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.name, &self.value)?;
        map.end()
    }
}

impl<'de> Deserialize<'de> for GoalValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let mut entries = BTreeMap::<String, f64>::deserialize(deserializer)?.into_iter();
        match (entries.next(), entries.next()) {
            (Some((name, value)), None) => Ok(Self { name, value }),
            _ => Err(de::Error::custom("expected exactly one goal entry")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolverEntry {
    #[serde(rename = "Goal")]
    pub goal: String,
    #[serde(rename = "Status")]
    pub status: String,
    #[serde(rename = "Objective Value")]
    pub objective_value: i64,
    #[serde(rename = "Tolerance")]
    pub tolerance: f64,
    /// Seconds.
    #[serde(rename = "Wall Time")]
    pub wall_time: f64,
    #[serde(rename = "Nodes")]
    pub nodes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanReport {
    #[serde(rename = "Scan ID")]
    pub scan_id: Identifier,
    #[serde(rename = "Cost")]
    pub cost: f64,
    #[serde(rename = "Best Covered By")]
    pub best_covered_by: Option<Identifier>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexSelection {
    #[serde(rename = "Index OID")]
    pub oid: Identifier,
    #[serde(rename = "Selected")]
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexReport {
    #[serde(rename = "Existing Indexes")]
    pub existing: Vec<IndexSelection>,
    #[serde(rename = "Possible Indexes")]
    pub possible: Vec<IndexSelection>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    /// Goal optima in solve order.
    #[serde(rename = "Goals")]
    pub goals: Vec<GoalValue>,
    #[serde(rename = "Solver")]
    pub solver: Vec<SolverEntry>,
    /// False when any goal stopped at the time limit.
    #[serde(rename = "Optimal")]
    pub optimal: bool,
    #[serde(rename = "Scans")]
    pub scans: Vec<ScanReport>,
    #[serde(rename = "Indexes")]
    pub indexes: IndexReport,
    #[serde(rename = "Statistics")]
    pub statistics: Statistics,
}

impl Report {
    /// Build the report from the final goal's selection.
    ///
    /// Panics if `solutions` is empty.
    pub fn build(problem: &Problem, solutions: &Solutions) -> Self {
        let last = match solutions.final_solution() {
            Some(last) => last,
            None => panic!("report requested before any goal was solved"),
        };
        let selection = &last.selection;

        let goals = solutions
            .iter()
            .map(|s| GoalValue { name: s.goal.name().to_string(), value: s.real_value })
            .collect();

        let solver = solutions
            .iter()
            .map(|s| SolverEntry {
                goal: s.goal.name().to_string(),
                status: s.status.name().to_string(),
                objective_value: s.objective_value,
                tolerance: s.tolerance,
                wall_time: s.wall_time.as_secs_f64(),
                nodes: s.nodes,
            })
            .collect();

        let scans = (0..problem.num_scans())
            .map(|scan| ScanReport {
                scan_id: problem.scan_id(scan).clone(),
                cost: downscale(stats::cost_of_scan(problem, selection, scan)),
                best_covered_by: stats::best_covered_by(problem, selection, scan)
                    .map(|index| problem.index_oid(index).clone()),
            })
            .collect();

        let index_entry = |index: usize| IndexSelection {
            oid: problem.index_oid(index).clone(),
            selected: selection[index],
        };
        let indexes = IndexReport {
            existing: (0..problem.num_existing()).map(index_entry).collect(),
            possible: (problem.num_existing()..problem.num_indexes()).map(index_entry).collect(),
        };

        Self {
            goals,
            solver,
            optimal: solutions.all_optimal(),
            scans,
            indexes,
            statistics: Statistics::compute(problem, selection),
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn selected_oids(&self) -> impl Iterator<Item = &Identifier> {
        self.indexes
            .existing
            .iter()
            .chain(&self.indexes.possible)
            .filter(|entry| entry.selected)
            .map(|entry| &entry.oid)
    }

    /// Human-readable rendering for terminals.
    pub fn render_text(&self) -> String {
        let mut out = String::new();
        let mark = |selected: bool| if selected { "x" } else { " " };

        let _ = writeln!(out, "Goals:");
        for (goal, solver) in self.goals.iter().zip(&self.solver) {
            let _ = writeln!(
                out,
                "  {:<30} {:>14.2}  [{}, {:.3}s, {} nodes]",
                goal.name, goal.value, solver.status, solver.wall_time, solver.nodes
            );
        }
        if !self.optimal {
            let _ = writeln!(out, "  (time limit reached: result may not be optimal)");
        }

        let _ = writeln!(out, "Indexes:");
        for entry in &self.indexes.existing {
            let _ = writeln!(out, "  [{}] {} (existing)", mark(entry.selected), entry.oid);
        }
        for entry in &self.indexes.possible {
            let _ = writeln!(out, "  [{}] {}", mark(entry.selected), entry.oid);
        }

        let _ = writeln!(out, "Scans:");
        for scan in &self.scans {
            match &scan.best_covered_by {
                Some(oid) => {
                    let _ = writeln!(out, "  {:<12} {:>12.2}  via {}", scan.scan_id, scan.cost, oid);
                }
                None => {
                    let _ = writeln!(out, "  {:<12} {:>12.2}  sequential", scan.scan_id, scan.cost);
                }
            }
        }

        let st = &self.statistics;
        let _ = writeln!(out, "Statistics:");
        let _ = writeln!(
            out,
            "  Coverage: {} ({} existing, {} possible, {} uncovered)",
            st.coverage.total, st.coverage.existing, st.coverage.possible, st.coverage.uncovered
        );
        let _ = writeln!(out, "  Cost: {:.2} total, {:.2} maximum", st.cost.total, st.cost.maximum);
        let _ = writeln!(
            out,
            "  Indexes used: {} ({} existing, {} possible)",
            st.indexes_used.total, st.indexes_used.existing, st.indexes_used.possible
        );
        let _ = writeln!(
            out,
            "  Index write overhead: {:.2} ({:.2} existing, {:.2} possible)",
            st.write_overhead.total, st.write_overhead.existing, st.write_overhead.possible
        );
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::WorkloadInput;
    use crate::optimizer::{LexicographicOptimizer, SolverConfig};
    use crate::settings::Settings;

    fn report() -> Report {
        let json = r#"{
            "Scans": [
                {"Scan ID": "s0", "Sequential Scan Cost": 100,
                 "Existing Index Costs": [{"Index OID": 1, "Cost": 50}]},
                {"Scan ID": "s1", "Sequential Scan Cost": 200,
                 "Possible Index Costs": [{"Index OID": 2, "Cost": 80}]},
                {"Scan ID": "s2", "Sequential Scan Cost": 40}
            ],
            "Existing Indexes": [{"Index": {"Index OID": 1}, "Index Write Overhead": 10}],
            "Possible Indexes": [{"Index": {"Index OID": 2}, "Index Write Overhead": 20}]
        }"#;
        let problem = Problem::from_input(&WorkloadInput::from_json(json).unwrap()).unwrap();
        let solutions = LexicographicOptimizer::new(SolverConfig::default())
            .optimize(&problem, &Settings::defaults(&problem))
            .unwrap();
        Report::build(&problem, &solutions)
    }

    #[test]
    fn test_report_contents() {
        let report = report();

        assert_eq!(report.goals[0], GoalValue { name: "Minimal Cost".into(), value: 170.0 });
        assert_eq!(report.goals[1], GoalValue { name: "Minimal Indexes".into(), value: 2.0 });
        assert!(report.optimal);

        assert_eq!(report.scans[0].best_covered_by, Some(Identifier::Number(1)));
        assert_eq!(report.scans[1].cost, 80.0);
        assert_eq!(report.scans[2].best_covered_by, None);
        assert_eq!(report.scans[2].cost, 40.0);

        let selected: Vec<_> = report.selected_oids().cloned().collect();
        assert_eq!(selected, vec![Identifier::Number(1), Identifier::Number(2)]);
        assert_eq!(report.statistics.coverage.uncovered, 1);
    }

    #[test]
    fn test_json_layout() {
        let report = report();
        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(value["Goals"][0]["Minimal Cost"], 170.0);
        assert_eq!(value["Solver"][1]["Goal"], "Minimal Indexes");
        assert_eq!(value["Solver"][1]["Status"], "Optimal");
        assert_eq!(value["Scans"][2]["Best Covered By"], serde_json::Value::Null);
        assert_eq!(value["Indexes"]["Possible Indexes"][0]["Selected"], true);
        assert_eq!(value["Statistics"]["Cost"]["Total"], 170.0);

        let parsed = Report::from_json(&report.to_json().unwrap()).unwrap();
        assert_eq!(parsed.goals, report.goals);
    }

    #[test]
    fn test_goal_value_rejects_multiple_entries() {
        let err = serde_json::from_str::<GoalValue>(r#"{"a": 1.0, "b": 2.0}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_render_text() {
        let text = report().render_text();
        assert!(text.contains("Minimal Cost"));
        assert!(text.contains("[x] 1 (existing)"));
        assert!(text.contains("sequential"));
        assert!(!text.contains("time limit reached"));
    }
}
