//! Random workload generator for benchmarking and testing.

use crate::error::{Error, Result};
use crate::input::{Identifier, IndexCost, IndexRecord, IndexRef, ScanRecord, WorkloadInput};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::ops::RangeInclusive;
use tracing::debug;

/// Ranges the generator draws from. All bounds are inclusive.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorConfig {
    pub num_scans: RangeInclusive<usize>,
    /// Cost of a scan through a covering index.
    pub index_cost: RangeInclusive<u64>,
    pub sequential_cost: RangeInclusive<u64>,
    pub num_possible_indexes: RangeInclusive<usize>,
    pub num_existing_indexes: RangeInclusive<usize>,
    pub write_overhead: RangeInclusive<u64>,
    /// Fraction of all scans each index covers.
    pub coverage_fraction: RangeInclusive<f64>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            num_scans: 40..=60,
            index_cost: 10..=100,
            sequential_cost: 150..=300,
            num_possible_indexes: 50..=100,
            num_existing_indexes: 1..=3,
            write_overhead: 10..=30,
            coverage_fraction: 0.1..=0.25,
        }
    }
}

impl GeneratorConfig {
    pub fn validate(&self) -> Result<()> {
        fn positive<T: PartialOrd + Default>(name: &str, range: &RangeInclusive<T>) -> Result<()> {
            if *range.start() > T::default() && range.start() <= range.end() {
                Ok(())
            } else {
                Err(Error::validation(format!("{} must be a non-empty positive range", name)))
            }
        }

        positive("num_scans", &self.num_scans)?;
        positive("index_cost", &self.index_cost)?;
        positive("sequential_cost", &self.sequential_cost)?;
        positive("num_possible_indexes", &self.num_possible_indexes)?;
        positive("write_overhead", &self.write_overhead)?;

        if self.num_existing_indexes.start() > self.num_existing_indexes.end() {
            return Err(Error::validation("num_existing_indexes must be a non-empty range"));
        }
        // Every scan needs room for at least one index cost below its sequential cost.
        if self.index_cost.start() >= self.sequential_cost.start() {
            return Err(Error::validation(
                "index_cost minimum must be below the sequential_cost minimum",
            ));
        }
        let (lo, hi) = (*self.coverage_fraction.start(), *self.coverage_fraction.end());
        if !(lo > 0.0 && lo <= hi && hi <= 1.0) {
            return Err(Error::validation("coverage_fraction must lie within (0, 1]"));
        }
        Ok(())
    }
}

/// Generate a workload. `None` draws a fresh seed from the OS.
pub fn generate(config: &GeneratorConfig, seed: Option<u64>) -> Result<WorkloadInput> {
    config.validate()?;
    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };

    let num_scans = rng.random_range(config.num_scans.clone());
    let mut scans: Vec<ScanRecord> = (0..num_scans)
        .map(|scan| ScanRecord {
            scan_id: Identifier::Text(format!("Scan {}", scan)),
            sequential_cost: Some(rng.random_range(config.sequential_cost.clone()) as f64),
            existing_index_costs: Vec::new(),
            possible_index_costs: Vec::new(),
        })
        .collect();

    let num_possible = rng.random_range(config.num_possible_indexes.clone());
    let num_existing = rng.random_range(config.num_existing_indexes.clone());

    let mut possible_indexes = Vec::with_capacity(num_possible);
    let mut existing_indexes = Vec::with_capacity(num_existing);
    // Existing indexes are numbered after the possible ones so OIDs stay unique.
    for index in 0..num_possible + num_existing {
        let existing = index >= num_possible;
        let oid = Identifier::Text(format!("Index {}", index));
        let record = IndexRecord {
            index: IndexRef { oid: oid.clone() },
            write_overhead: rng.random_range(config.write_overhead.clone()) as f64,
        };

        let fraction = rng.random_range(config.coverage_fraction.clone());
        let amount = ((num_scans as f64 * fraction).round() as usize).min(num_scans);
        for scan in rand::seq::index::sample(&mut rng, num_scans, amount) {
            let scan_record = &mut scans[scan];
            let sequential = scan_record.sequential_cost.unwrap_or_default() as u64;
            let max_cost = (*config.index_cost.end()).min(sequential - 1);
            let cost = IndexCost {
                oid: oid.clone(),
                cost: rng.random_range(*config.index_cost.start()..=max_cost) as f64,
            };
            if existing {
                scan_record.existing_index_costs.push(cost);
            } else {
                scan_record.possible_index_costs.push(cost);
            }
        }

        if existing {
            existing_indexes.push(record);
        } else {
            possible_indexes.push(record);
        }
    }

    debug!(
        scans = num_scans,
        possible = num_possible,
        existing = num_existing,
        ?seed,
        "Generated workload"
    );

    Ok(WorkloadInput { scans, existing_indexes, possible_indexes })
}
