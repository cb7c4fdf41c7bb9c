//! Run driver
//!
//! A run has two halves:
//! - submit: sweep superseded extracts, then dispatch each partition's active file
//! - extract: walk every partition through its scenario path, merge, filter
//!   and write fresh extract files
//!
//! A full run submits first so that files produced by earlier runs get their
//! retry before the new ones land. Partitions are handled one at a time and a
//! failing partition never stops the others. Failures end up in the
//! [`RunSummary`] rather than aborting the run.

use crate::api::{ODataSalesApi, SalesApi};
use crate::archive::{ArchiveManager, PartitionOutcome};
use crate::dispatch::{Dispatcher, HttpSubmitter, Submit};
use crate::error::Result;
use crate::extract::{ExtractWriter, WrittenExtract};
use crate::flag_filter::FlagFilter;
use crate::merge::merge;
use crate::models::CandidateRecord;
use crate::pool::StagePools;
use crate::stages::{ScenarioAExecutor, ScenarioBExecutor};
use chrono::{DateTime, Utc};
use dpx_common::config::{ExclusionConfig, Settings};
use dpx_common::{Partition, Scenario};
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

/// Which halves of the pipeline to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    Extract,
    Submit,
    /// Submit, then extract
    Full,
}

/// Per-partition counters for one run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PartitionSummary {
    pub partition: String,
    pub candidates: usize,
    pub excluded: usize,
    pub rows_written: usize,
    pub extract_file: Option<PathBuf>,
    pub submitted: usize,
    pub failed: usize,
    pub archived: bool,
    pub errors: Vec<String>,
}

/// Everything a run did, logged at the end
#[derive(Debug, Clone)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub partitions: Vec<PartitionSummary>,
    /// Failures not tied to one partition
    pub errors: Vec<String>,
}

impl RunSummary {
    pub fn new(partitions: &[Partition]) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            started_at: dpx_common::time::now(),
            partitions: partitions
                .iter()
                .map(|p| PartitionSummary {
                    partition: p.code.clone(),
                    ..Default::default()
                })
                .collect(),
            errors: Vec::new(),
        }
    }

    pub fn partition(&self, code: &str) -> Option<&PartitionSummary> {
        self.partitions.iter().find(|p| p.partition == code)
    }

    fn partition_mut(&mut self, code: &str) -> &mut PartitionSummary {
        let index = match self.partitions.iter().position(|p| p.partition == code) {
            Some(index) => index,
            None => {
                self.partitions.push(PartitionSummary {
                    partition: code.to_string(),
                    ..Default::default()
                });
                self.partitions.len() - 1
            }
        };
        &mut self.partitions[index]
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty() || self.partitions.iter().any(|p| !p.errors.is_empty())
    }

    pub fn log(&self) {
        for p in &self.partitions {
            tracing::info!(
                run_id = %self.run_id,
                partition = %p.partition,
                candidates = p.candidates,
                excluded = p.excluded,
                rows_written = p.rows_written,
                submitted = p.submitted,
                failed = p.failed,
                archived = p.archived,
                errors = p.errors.len(),
                "Partition summary"
            );
        }

        let elapsed = dpx_common::time::now() - self.started_at;
        tracing::info!(
            run_id = %self.run_id,
            partitions = self.partitions.len(),
            rows_written = self.partitions.iter().map(|p| p.rows_written).sum::<usize>(),
            submitted = self.partitions.iter().map(|p| p.submitted).sum::<usize>(),
            failed = self.partitions.iter().map(|p| p.failed).sum::<usize>(),
            errors = self.errors.len(),
            elapsed_secs = elapsed.num_seconds(),
            "Run complete"
        );
    }
}

/// Wires the stages together for one run
pub struct Pipeline<S> {
    partitions: Vec<Partition>,
    exclusions: ExclusionConfig,
    scenario_a: ScenarioAExecutor,
    scenario_b: ScenarioBExecutor,
    flag_filter: FlagFilter,
    writer: ExtractWriter,
    manager: ArchiveManager<S>,
}

impl Pipeline<HttpSubmitter> {
    /// Production wiring: OData reads, HTTP submissions
    pub fn from_settings(settings: &Settings, dry_run: bool) -> Result<Self> {
        let api: Arc<dyn SalesApi> = Arc::new(ODataSalesApi::from_settings(settings)?);
        let submitter = HttpSubmitter::from_config(&settings.submission)?;
        let prefix = settings.extract.file_prefix.clone();

        Ok(Self::new(
            settings.partitions.clone(),
            settings.exclusions.clone(),
            api,
            StagePools::from_config(&settings.pools),
            ExtractWriter::new(&settings.output_root, prefix.clone()),
            ArchiveManager::new(&settings.output_root, prefix, Dispatcher::new(submitter))
                .with_dry_run(dry_run),
        ))
    }
}

impl<S: Submit> Pipeline<S> {
    pub fn new(
        partitions: Vec<Partition>,
        exclusions: ExclusionConfig,
        api: Arc<dyn SalesApi>,
        pools: StagePools,
        writer: ExtractWriter,
        manager: ArchiveManager<S>,
    ) -> Self {
        Self {
            partitions,
            exclusions,
            scenario_a: ScenarioAExecutor::new(Arc::clone(&api), pools.clone()),
            scenario_b: ScenarioBExecutor::new(Arc::clone(&api), pools.clone()),
            flag_filter: FlagFilter::new(api, pools.flags),
            writer,
            manager,
        }
    }

    pub async fn run(&self, mode: RunMode) -> RunSummary {
        let mut summary = RunSummary::new(&self.partitions);
        tracing::info!(
            run_id = %summary.run_id,
            ?mode,
            partitions = self.partitions.len(),
            "Run started"
        );

        if matches!(mode, RunMode::Submit | RunMode::Full) {
            self.submit(&mut summary).await;
        }
        if matches!(mode, RunMode::Extract | RunMode::Full) {
            self.extract(&mut summary).await;
        }

        summary.log();
        summary
    }

    /// Dispatch every partition's active extract file
    pub async fn submit(&self, summary: &mut RunSummary) {
        let codes: Vec<String> = self.partitions.iter().map(|p| p.code.clone()).collect();
        let run = self.manager.run(&codes).await;
        if let Some(error) = run.sweep_error {
            summary.errors.push(format!("sweep: {}", error));
        }

        for (code, outcome) in run.outcomes {
            let entry = summary.partition_mut(&code);
            if let Some(report) = outcome.report() {
                entry.submitted += report.succeeded;
                entry.failed += report.failed;
            }
            entry.archived |= outcome.archived();
            if let PartitionOutcome::Failed { error } = outcome {
                entry.errors.push(error);
            }
        }
    }

    /// Produce this run's extract files
    ///
    /// Returns the files written; partitions that failed are recorded in `summary`.
    pub async fn extract(&self, summary: &mut RunSummary) -> Vec<WrittenExtract> {
        let mut processed = Vec::new();
        let mut scenario_a = Vec::new();
        let mut scenario_b = Vec::new();

        for partition in &self.partitions {
            let code = partition.code.as_str();
            tracing::info!(
                partition = code,
                scenario = %partition.scenario,
                "Processing partition"
            );

            let result: Result<Vec<CandidateRecord>> = match partition.scenario {
                Scenario::A => {
                    let excluded = self.exclusions.for_partition(code);
                    self.scenario_a.run(partition, excluded).await
                }
                Scenario::B => self.scenario_b.run(partition).await,
            };

            match result {
                Ok(candidates) => {
                    summary.partition_mut(code).candidates = candidates.len();
                    processed.push(partition.code.clone());
                    match partition.scenario {
                        Scenario::A => scenario_a.extend(candidates),
                        Scenario::B => scenario_b.extend(candidates),
                    }
                }
                Err(e) => {
                    tracing::error!(
                        partition = code,
                        error = %e,
                        "Partition extraction failed, no file written"
                    );
                    summary.partition_mut(code).errors.push(e.to_string());
                }
            }
        }

        let merged: Vec<CandidateRecord> = merge(scenario_a, scenario_b);
        let outcome = self.flag_filter.apply(merged, &self.partitions).await;
        for code in &processed {
            summary.partition_mut(code).excluded = outcome.excluded_in(code);
        }

        let stamp = dpx_common::time::local_run_stamp();
        let batch = self.writer.write_all(&processed, outcome.retained, &stamp);
        for (code, error) in batch.failed {
            summary.partition_mut(&code).errors.push(error.to_string());
        }
        for extract in &batch.written {
            let entry = summary.partition_mut(&extract.partition);
            entry.rows_written = extract.rows;
            entry.extract_file = Some(extract.path.clone());
        }
        batch.written
    }
}
