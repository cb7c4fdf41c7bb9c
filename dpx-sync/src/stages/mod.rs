//! Stage executors
//!
//! One executor per scenario. Both walk a single partition through its
//! dependent fetch stages (fanning out through the shared pools) and return
//! only complete candidate records.
//!
//! Failure of the first stage aborts the partition; failure of an individual
//! fan-out unit drops only the records that depended on it.

pub mod accounting;
pub mod scenario_a;
pub mod scenario_b;

pub use accounting::{select_offset_entry, AccountingSelection};
pub use scenario_a::ScenarioAExecutor;
pub use scenario_b::ScenarioBExecutor;

use crate::error::{FetchError, SyncError};
use crate::models::CandidateRecord;

/// Flatten a pool result, logging and discarding failed units
pub(crate) fn unit_result<T>(
    result: Result<Result<T, FetchError>, SyncError>,
    stage: &'static str,
    partition: &str,
    key: &str,
) -> Option<T> {
    match result {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            tracing::error!(
                stage,
                partition,
                key,
                error = %e,
                "Lookup failed, dependent records dropped"
            );
            None
        }
        Err(e) => {
            tracing::error!(
                stage,
                partition,
                key,
                error = %e,
                "Lookup not admitted, dependent records dropped"
            );
            None
        }
    }
}

/// Keep complete records, counting the rest
pub(crate) fn retain_complete(
    partition: &str,
    candidates: Vec<CandidateRecord>,
) -> Vec<CandidateRecord> {
    let total = candidates.len();
    let complete: Vec<CandidateRecord> = candidates
        .into_iter()
        .filter(CandidateRecord::is_complete)
        .collect();
    if complete.len() < total {
        tracing::debug!(
            partition,
            dropped = total - complete.len(),
            "Dropped incomplete candidates"
        );
    }
    complete
}
