//! Data normalizer.
//!
//! Turns a [`WorkloadInput`] into the dense, integer-scaled numeric model the
//! rest of the crate works on. Existing indexes occupy positions
//! `[0, num_existing)` and possible indexes the rest; "existing vs possible"
//! is decided everywhere by comparing a position against `num_existing`.

use crate::error::{Error, Result};
use crate::input::{IndexCost, Identifier, WorkloadInput};
use std::collections::{HashMap, HashSet};
use std::fmt;
use tracing::{debug, warn};

/// Fixed-point multiplier applied to every cost and write overhead.
pub const MULTIPLIER: i64 = 100;

pub fn upscale(value: f64) -> i64 {
    (value * MULTIPLIER as f64).round() as i64
}

pub fn downscale(value: i64) -> f64 {
    value as f64 / MULTIPLIER as f64
}

/// Normalized, read-only problem instance.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    scan_ids: Vec<Identifier>,
    index_oids: Vec<Identifier>,
    num_existing: usize,
    sequential_costs: Vec<i64>,
    /// Cost of index `i` for scan `j`, present only when it beats the sequential cost.
    index_costs: Vec<Vec<Option<i64>>>,
    /// Boolean form: index `i` covers scan `j`.
    covers: Vec<Vec<bool>>,
    /// Real form: covering cost, or the sequential cost as fallback.
    real_costs: Vec<Vec<i64>>,
    write_overheads: Vec<i64>,
}

impl Problem {
    pub fn from_input(input: &WorkloadInput) -> Result<Self> {
        // Identifier tables
        let mut scan_positions: HashMap<&Identifier, usize> = HashMap::new();
        let mut seen_scans = HashSet::new();
        let mut scan_ids = Vec::new();
        let mut sequential_costs = Vec::new();
        for scan in &input.scans {
            if !seen_scans.insert(&scan.scan_id) {
                return Err(Error::validation(format!("duplicate scan ID '{}'", scan.scan_id)));
            }
            match scan.sequential_cost {
                Some(cost) => {
                    check_cost(cost, || format!("sequential cost of scan '{}'", scan.scan_id))?;
                    scan_positions.insert(&scan.scan_id, scan_ids.len());
                    scan_ids.push(scan.scan_id.clone());
                    sequential_costs.push(upscale(cost));
                }
                None => {
                    debug!(scan = %scan.scan_id, "Dropping scan without a sequential cost");
                }
            }
        }

        let num_existing = input.existing_indexes.len();
        let mut index_positions: HashMap<&Identifier, usize> = HashMap::new();
        let mut index_oids = Vec::new();
        let mut write_overheads = Vec::new();
        for record in input.existing_indexes.iter().chain(input.possible_indexes.iter()) {
            let oid = &record.index.oid;
            if index_positions.insert(oid, index_oids.len()).is_some() {
                return Err(Error::validation(format!("duplicate index OID '{}'", oid)));
            }
            check_cost(record.write_overhead, || format!("write overhead of index '{}'", oid))?;
            index_oids.push(oid.clone());
            write_overheads.push(upscale(record.write_overhead));
        }

        // There must be something to decide
        if index_oids.len() <= num_existing {
            return Err(Error::validation(
                "at least one possible index is required beyond the existing ones",
            ));
        }

        // Per-index costs, only where the index improves on the sequential scan
        let mut index_costs: Vec<Vec<Option<i64>>> = vec![vec![None; scan_ids.len()]; index_oids.len()];
        for scan in &input.scans {
            let scan_pos = scan_positions.get(&scan.scan_id).copied();
            let entries = scan
                .existing_index_costs
                .iter()
                .map(|c| (c, true))
                .chain(scan.possible_index_costs.iter().map(|c| (c, false)));

            for (entry, listed_as_existing) in entries {
                let index_pos =
                    resolve_index(&index_positions, num_existing, entry, listed_as_existing, &scan.scan_id)?;
                check_cost(entry.cost, || {
                    format!("cost of index '{}' for scan '{}'", entry.oid, scan.scan_id)
                })?;

                let Some(scan_pos) = scan_pos else {
                    continue;
                };
                let cost = upscale(entry.cost);
                if cost >= sequential_costs[scan_pos] {
                    continue;
                }
                let slot = &mut index_costs[index_pos][scan_pos];
                if let Some(previous) = *slot {
                    warn!(
                        index = %entry.oid,
                        scan = %scan.scan_id,
                        "Index listed twice for the same scan, keeping the lower cost"
                    );
                    *slot = Some(previous.min(cost));
                } else {
                    *slot = Some(cost);
                }
            }
        }

        let covers = index_costs
            .iter()
            .map(|row| row.iter().map(Option::is_some).collect())
            .collect();
        let real_costs = index_costs
            .iter()
            .map(|row| {
                row.iter()
                    .zip(sequential_costs.iter())
                    .map(|(cost, sequential)| cost.unwrap_or(*sequential))
                    .collect()
            })
            .collect();

        let problem = Self {
            scan_ids,
            index_oids,
            num_existing,
            sequential_costs,
            index_costs,
            covers,
            real_costs,
            write_overheads,
        };

        debug!(
            scans = problem.num_scans(),
            existing = problem.num_existing(),
            possible = problem.num_possible(),
            "Normalized workload"
        );

        Ok(problem)
    }

    pub fn num_scans(&self) -> usize {
        self.scan_ids.len()
    }

    pub fn num_indexes(&self) -> usize {
        self.index_oids.len()
    }

    pub fn num_existing(&self) -> usize {
        self.num_existing
    }

    pub fn num_possible(&self) -> usize {
        self.index_oids.len() - self.num_existing
    }

    pub fn is_existing(&self, index: usize) -> bool {
        index < self.num_existing
    }

    pub fn scan_id(&self, scan: usize) -> &Identifier {
        &self.scan_ids[scan]
    }

    pub fn index_oid(&self, index: usize) -> &Identifier {
        &self.index_oids[index]
    }

    pub fn sequential_costs(&self) -> &[i64] {
        &self.sequential_costs
    }

    pub fn sequential_cost(&self, scan: usize) -> i64 {
        self.sequential_costs[scan]
    }

    /// Cost of `index` for `scan`, `None` when the index does not cover it.
    pub fn index_cost(&self, index: usize, scan: usize) -> Option<i64> {
        self.index_costs[index][scan]
    }

    pub fn covers(&self, index: usize, scan: usize) -> bool {
        self.covers[index][scan]
    }

    pub fn real_cost(&self, index: usize, scan: usize) -> i64 {
        self.real_costs[index][scan]
    }

    pub fn write_overheads(&self) -> &[i64] {
        &self.write_overheads
    }

    pub fn total_write_overhead(&self) -> i64 {
        self.write_overheads.iter().sum()
    }

    /// Indexes covering `scan`, in position order.
    pub fn covering_indexes(&self, scan: usize) -> impl Iterator<Item = usize> + '_ {
        (0..self.num_indexes()).filter(move |&i| self.covers[i][scan])
    }
}

fn check_cost(value: f64, describe: impl FnOnce() -> String) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(Error::validation(format!("{} must be a non-negative number, got {}", describe(), value)))
    }
}

fn resolve_index(
    positions: &HashMap<&Identifier, usize>,
    num_existing: usize,
    entry: &IndexCost,
    listed_as_existing: bool,
    scan: &Identifier,
) -> Result<usize> {
    let position = *positions.get(&entry.oid).ok_or_else(|| {
        Error::validation(format!("scan '{}' references unknown index '{}'", scan, entry.oid))
    })?;

    if (position < num_existing) != listed_as_existing {
        let (listed, actual) = if listed_as_existing {
            ("existing", "possible")
        } else {
            ("possible", "existing")
        };
        return Err(Error::validation(format!(
            "scan '{}' lists index '{}' under {} index costs but it is a {} index",
            scan, entry.oid, listed, actual
        )));
    }

    Ok(position)
}

impl fmt::Display for Problem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let join = |values: &[i64]| {
            values.iter().map(|v| format!("{:.2}", downscale(*v))).collect::<Vec<_>>().join(" ")
        };

        writeln!(f, "Number of scans: {}", self.num_scans())?;
        writeln!(f, "Sequential costs: {}", join(&self.sequential_costs))?;
        writeln!(
            f,
            "Number of indexes: {} ({} existing, {} possible)",
            self.num_indexes(),
            self.num_existing(),
            self.num_possible()
        )?;
        writeln!(f, "Index write overheads: {}", join(&self.write_overheads))?;
        writeln!(f, "Index/scan cost matrix:")?;
        for (index, row) in self.real_costs.iter().enumerate() {
            writeln!(f, "  {:>12}  {}", self.index_oids[index].to_string(), join(row))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::input::{IndexRecord, IndexRef, ScanRecord};

    fn index(oid: u64, overhead: f64) -> IndexRecord {
        IndexRecord { index: IndexRef { oid: Identifier::Number(oid) }, write_overhead: overhead }
    }

    fn cost(oid: u64, cost: f64) -> IndexCost {
        IndexCost { oid: Identifier::Number(oid), cost }
    }

    fn scan(id: &str, sequential: Option<f64>, existing: Vec<IndexCost>, possible: Vec<IndexCost>) -> ScanRecord {
        ScanRecord {
            scan_id: Identifier::from(id),
            sequential_cost: sequential,
            existing_index_costs: existing,
            possible_index_costs: possible,
        }
    }

    fn two_scan_workload() -> WorkloadInput {
        WorkloadInput {
            scans: vec![
                scan("s0", Some(100.0), vec![cost(1, 50.0)], vec![]),
                scan("s1", Some(200.0), vec![], vec![cost(2, 80.0)]),
            ],
            existing_indexes: vec![index(1, 10.0)],
            possible_indexes: vec![index(2, 20.0)],
        }
    }

    #[test]
    fn test_scaling() {
        assert_eq!(upscale(1.234), 123);
        assert_eq!(upscale(1.236), 124);
        assert_eq!(upscale(0.0), 0);
        assert_eq!(downscale(12345), 123.45);
    }

    #[test]
    fn test_normalize_two_scans() {
        let problem = Problem::from_input(&two_scan_workload()).unwrap();

        assert_eq!(problem.num_scans(), 2);
        assert_eq!(problem.num_indexes(), 2);
        assert_eq!(problem.num_existing(), 1);
        assert_eq!(problem.num_possible(), 1);
        assert_eq!(problem.sequential_costs(), &[10000, 20000]);
        assert_eq!(problem.write_overheads(), &[1000, 2000]);

        assert_eq!(problem.index_cost(0, 0), Some(5000));
        assert_eq!(problem.index_cost(0, 1), None);
        assert!(problem.covers(1, 1));
        assert!(!problem.covers(1, 0));
        assert_eq!(problem.real_cost(0, 1), 20000);
        assert_eq!(problem.real_cost(1, 1), 8000);
        assert!(problem.is_existing(0));
        assert!(!problem.is_existing(1));
    }

    #[test]
    fn test_non_improving_cost_is_not_coverage() {
        let mut workload = two_scan_workload();
        workload.scans[0].possible_index_costs.push(cost(2, 100.0));

        let problem = Problem::from_input(&workload).unwrap();
        assert!(!problem.covers(1, 0));
        assert_eq!(problem.real_cost(1, 0), 10000);
    }

    #[test]
    fn test_scan_without_sequential_cost_is_dropped() {
        let mut workload = two_scan_workload();
        workload.scans.insert(0, scan("dropped", None, vec![cost(1, 1.0)], vec![]));

        let problem = Problem::from_input(&workload).unwrap();
        assert_eq!(problem.num_scans(), 2);
        assert_eq!(problem.scan_id(0), &Identifier::from("s0"));
    }

    #[test]
    fn test_requires_possible_index() {
        let mut workload = two_scan_workload();
        workload.possible_indexes.clear();
        workload.scans[1].possible_index_costs.clear();

        let err = Problem::from_input(&workload).unwrap_err();
        assert!(err.is_validation());
    }

    #[test]
    fn test_unknown_index_reference() {
        let mut workload = two_scan_workload();
        workload.scans[0].possible_index_costs.push(cost(99, 1.0));
        assert!(Problem::from_input(&workload).unwrap_err().is_validation());
    }

    #[test]
    fn test_index_listed_in_wrong_category() {
        let mut workload = two_scan_workload();
        workload.scans[0].existing_index_costs.push(cost(2, 1.0));
        assert!(Problem::from_input(&workload).unwrap_err().is_validation());
    }

    #[test]
    fn test_duplicate_identifiers() {
        let mut workload = two_scan_workload();
        workload.possible_indexes.push(index(1, 5.0));
        assert!(Problem::from_input(&workload).unwrap_err().is_validation());

        let mut workload = two_scan_workload();
        workload.scans.push(scan("s0", Some(1.0), vec![], vec![]));
        assert!(Problem::from_input(&workload).unwrap_err().is_validation());
    }

    #[test]
    fn test_negative_values_rejected() {
        let mut workload = two_scan_workload();
        workload.possible_indexes[0].write_overhead = -1.0;
        assert!(Problem::from_input(&workload).unwrap_err().is_validation());

        let mut workload = two_scan_workload();
        workload.scans[0].sequential_cost = Some(f64::NAN);
        assert!(Problem::from_input(&workload).unwrap_err().is_validation());
    }

    #[test]
    fn test_duplicate_cost_entry_keeps_lowest() {
        let mut workload = two_scan_workload();
        workload.scans[1].possible_index_costs.push(cost(2, 60.0));

        let problem = Problem::from_input(&workload).unwrap();
        assert_eq!(problem.index_cost(1, 1), Some(6000));
    }

    #[test]
    fn test_covering_indexes() {
        let mut workload = two_scan_workload();
        workload.scans[0].possible_index_costs.push(cost(2, 70.0));

        let problem = Problem::from_input(&workload).unwrap();
        assert_eq!(problem.covering_indexes(0).collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(problem.covering_indexes(1).collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_display_mentions_counts() {
        let problem = Problem::from_input(&two_scan_workload()).unwrap();
        let text = problem.to_string();
        assert!(text.contains("Number of scans: 2"));
        assert!(text.contains("(1 existing, 1 possible)"));
        assert!(text.contains("100.00 200.00"));
    }
}
