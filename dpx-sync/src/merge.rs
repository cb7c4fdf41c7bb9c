//! Reconciliation merge
//!
//! Scenario A and B candidates are concatenated. Partitions belong to exactly
//! one scenario, so no cross-scenario de-duplication happens here; the
//! extract writer de-duplicates per (partition, sales order, line).

use crate::models::CandidateRecord;
use std::collections::{BTreeMap, HashSet};

/// Concatenate both candidate sets, scenario A first
pub fn merge(
    scenario_a: Vec<CandidateRecord>,
    scenario_b: Vec<CandidateRecord>,
) -> Vec<CandidateRecord> {
    let mut merged = scenario_a;
    merged.extend(scenario_b);
    merged
}

/// Group by partition, keeping the first record per (partition, sales order, line)
///
/// Input order is preserved within each partition.
pub fn group_by_partition(records: Vec<CandidateRecord>) -> BTreeMap<String, Vec<CandidateRecord>> {
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    let mut grouped: BTreeMap<String, Vec<CandidateRecord>> = BTreeMap::new();

    for record in records {
        let (partition, sales_order, item) = record.dedup_key();
        let key = (partition.to_string(), sales_order.to_string(), item.to_string());
        if !seen.insert(key) {
            tracing::debug!(
                partition = %record.partition,
                sales_order = %record.sales_order,
                sales_order_item = %record.sales_order_item,
                "Duplicate candidate dropped"
            );
            continue;
        }
        grouped.entry(record.partition.clone()).or_default().push(record);
    }

    grouped
}
