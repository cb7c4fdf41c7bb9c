//! Flag filter
//!
//! Every candidate's accounting document is looked up in the remote status
//! collection. A candidate is excluded when:
//! - its status is Paid, Sent or Error
//! - either flag field is "Yes"
//! - either flag field is "NA" and its partition treats NA as flagged
//!
//! Candidates without an accounting document are excluded without a lookup.
//! A failed lookup excludes the candidate (fail closed).

use crate::api::SalesApi;
use crate::models::{CandidateRecord, FlagRecord};
use crate::pool::TaskPool;
use dpx_common::Partition;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Status codes that disqualify a record
pub const DISQUALIFYING_STATUSES: [&str; 3] = ["Paid", "Sent", "Error"];

const FLAG_YES: &str = "Yes";
const FLAG_NA: &str = "NA";

/// Why a candidate left the set
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    NoAccountingDocument,
    Status(String),
    Flag { field: &'static str, value: String },
    LookupFailed(String),
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExclusionReason::NoAccountingDocument => write!(f, "no accounting document"),
            ExclusionReason::Status(status) => write!(f, "status {}", status),
            ExclusionReason::Flag { field, value } => write!(f, "{} = {}", field, value),
            ExclusionReason::LookupFailed(e) => write!(f, "flag lookup failed: {}", e),
        }
    }
}

/// Evaluate one status record
pub fn disqualification(record: &FlagRecord, treat_na_as_flagged: bool) -> Option<ExclusionReason> {
    if let Some(status) = record.status.as_deref().map(str::trim) {
        if DISQUALIFYING_STATUSES
            .iter()
            .any(|s| s.eq_ignore_ascii_case(status))
        {
            return Some(ExclusionReason::Status(status.to_string()));
        }
    }

    let flags = [
        ("IsPaymentSent", record.payment_sent.as_deref()),
        ("IsPaymentBlocked", record.payment_blocked.as_deref()),
    ];
    for (field, value) in flags {
        let Some(value) = value.map(str::trim) else {
            continue;
        };
        let flagged = value.eq_ignore_ascii_case(FLAG_YES)
            || (treat_na_as_flagged && value.eq_ignore_ascii_case(FLAG_NA));
        if flagged {
            return Some(ExclusionReason::Flag {
                field,
                value: value.to_string(),
            });
        }
    }

    None
}

/// Result of filtering one candidate set
#[derive(Debug, Default)]
pub struct FilterOutcome {
    pub retained: Vec<CandidateRecord>,
    pub excluded: Vec<(CandidateRecord, ExclusionReason)>,
}

impl FilterOutcome {
    /// Excluded count for one partition
    pub fn excluded_in(&self, partition: &str) -> usize {
        self.excluded
            .iter()
            .filter(|(record, _)| record.partition == partition)
            .count()
    }
}

/// Remote-status gate
pub struct FlagFilter {
    api: Arc<dyn SalesApi>,
    pool: TaskPool,
}

impl FlagFilter {
    pub fn new(api: Arc<dyn SalesApi>, pool: TaskPool) -> Self {
        Self { api, pool }
    }

    /// Split `candidates` into retained and excluded, preserving input order
    pub async fn apply(
        &self,
        candidates: Vec<CandidateRecord>,
        roster: &[Partition],
    ) -> FilterOutcome {
        let policy: HashMap<&str, bool> = roster
            .iter()
            .map(|p| (p.code.as_str(), p.treat_na_as_flagged))
            .collect();

        let verdicts = self
            .pool
            .run_all(candidates.iter(), |candidate| {
                let api = Arc::clone(&self.api);
                let treat_na = policy.get(candidate.partition.as_str()).copied().unwrap_or(false);
                async move { check(api.as_ref(), candidate, treat_na).await }
            })
            .await;

        let mut outcome = FilterOutcome::default();
        for (candidate, verdict) in candidates.into_iter().zip(verdicts) {
            let verdict = verdict
                .unwrap_or_else(|e| Some(ExclusionReason::LookupFailed(e.to_string())));
            match verdict {
                None => outcome.retained.push(candidate),
                Some(reason) => {
                    match &reason {
                        ExclusionReason::LookupFailed(_) => tracing::error!(
                            partition = %candidate.partition,
                            sales_order = %candidate.sales_order,
                            accounting_document = ?candidate.accounting_document,
                            reason = %reason,
                            "Candidate excluded"
                        ),
                        _ => tracing::debug!(
                            partition = %candidate.partition,
                            sales_order = %candidate.sales_order,
                            accounting_document = ?candidate.accounting_document,
                            reason = %reason,
                            "Candidate excluded"
                        ),
                    }
                    outcome.excluded.push((candidate, reason));
                }
            }
        }

        tracing::info!(
            retained = outcome.retained.len(),
            excluded = outcome.excluded.len(),
            "Flag filter applied"
        );
        outcome
    }
}

async fn check(
    api: &dyn SalesApi,
    candidate: &CandidateRecord,
    treat_na: bool,
) -> Option<ExclusionReason> {
    let Some(document) = candidate
        .accounting_document
        .as_deref()
        .filter(|d| !d.trim().is_empty())
    else {
        return Some(ExclusionReason::NoAccountingDocument);
    };

    match api.flag_records(document, &candidate.partition).await {
        Ok(records) => records
            .iter()
            .find_map(|record| disqualification(record, treat_na)),
        Err(e) => Some(ExclusionReason::LookupFailed(e.to_string())),
    }
}
