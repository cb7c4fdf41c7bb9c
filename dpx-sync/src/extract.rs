//! Extract files
//!
//! One comma-separated file per partition and run, at
//! `{output_root}/{partition}/{prefix}_{partition}_{YYYYMMDDHHMM}.csv`.
//! Values are written and read without quoting, so an embedded comma shifts
//! the fields of its row.

use crate::error::{Result, SyncError};
use crate::merge::group_by_partition;
use crate::models::{CandidateRecord, ExtractRow};
use csv::{QuoteStyle, ReaderBuilder, WriterBuilder};
use std::path::{Path, PathBuf};

/// Default file name prefix
pub const DEFAULT_PREFIX: &str = "DownPaymentExtract";

/// Extract file extension
pub const EXTRACT_EXTENSION: &str = "csv";

/// File written by one partition in one run
#[derive(Debug, Clone)]
pub struct WrittenExtract {
    pub partition: String,
    pub path: PathBuf,
    pub rows: usize,
}

/// Files written by one batch, plus the partitions that could not be written
#[derive(Debug, Default)]
pub struct ExtractBatch {
    pub written: Vec<WrittenExtract>,
    pub failed: Vec<(String, SyncError)>,
}

/// Writes per-partition extract files under the output root
#[derive(Debug, Clone)]
pub struct ExtractWriter {
    output_root: PathBuf,
    prefix: String,
}

impl ExtractWriter {
    pub fn new(output_root: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            output_root: output_root.into(),
            prefix: prefix.into(),
        }
    }

    pub fn partition_dir(&self, partition: &str) -> PathBuf {
        self.output_root.join(partition)
    }

    pub fn file_name(&self, partition: &str, stamp: &str) -> String {
        format!("{}_{}_{}.{}", self.prefix, partition, stamp, EXTRACT_EXTENSION)
    }

    /// Write one file for each listed partition, zero-row files included
    ///
    /// Records of partitions not in `partitions` are ignored. Only the first
    /// record per (partition, sales order, line) is written. A partition that
    /// fails to write is reported in the batch and the rest are still written.
    pub fn write_all(
        &self,
        partitions: &[String],
        records: Vec<CandidateRecord>,
        stamp: &str,
    ) -> ExtractBatch {
        let mut grouped = group_by_partition(records);
        let mut batch = ExtractBatch::default();

        for partition in partitions {
            let records = grouped.remove(partition).unwrap_or_default();
            match self.write_partition(partition, &records, stamp) {
                Ok(written) => batch.written.push(written),
                Err(e) => {
                    tracing::error!(partition = %partition, error = %e, "Extract file not written");
                    batch.failed.push((partition.clone(), e));
                }
            }
        }

        for (partition, records) in grouped {
            tracing::warn!(
                partition = %partition,
                records = records.len(),
                "Candidates for a partition that was not processed, not written"
            );
        }

        batch
    }

    /// Write a single partition's file
    ///
    /// A partially written file is removed so it can never become active.
    pub fn write_partition(
        &self,
        partition: &str,
        records: &[CandidateRecord],
        stamp: &str,
    ) -> Result<WrittenExtract> {
        let dir = self.partition_dir(partition);
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(self.file_name(partition, stamp));

        let rows = match write_rows(&path, records) {
            Ok(rows) => rows,
            Err(e) => {
                if path.exists() {
                    if let Err(remove_err) = std::fs::remove_file(&path) {
                        tracing::warn!(
                            path = %path.display(),
                            error = %remove_err,
                            "Partial extract file left behind"
                        );
                    }
                }
                return Err(e);
            }
        };

        tracing::info!(partition, path = %path.display(), rows, "Extract file written");

        Ok(WrittenExtract {
            partition: partition.to_string(),
            path,
            rows,
        })
    }
}

fn write_rows(path: &Path, records: &[CandidateRecord]) -> Result<usize> {
    let mut writer = WriterBuilder::new().quote_style(QuoteStyle::Never).from_path(path)?;
    writer.write_record(ExtractRow::HEADER)?;

    let mut rows = 0;
    for row in records.iter().filter_map(CandidateRecord::to_extract_row) {
        writer.write_record(row.fields())?;
        rows += 1;
    }
    writer.flush()?;
    Ok(rows)
}

/// Read the data rows of an extract file
///
/// The header line and blank lines are skipped. Short rows are padded with
/// empty fields.
pub fn read_extract(path: &Path) -> Result<Vec<ExtractRow>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .quoting(false)
        .from_path(path)?;

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(ExtractRow::from_fields(record.iter()));
    }
    Ok(rows)
}

/// Whether `path` names an extract file with `prefix`
pub fn is_extract_file(path: &Path, prefix: &str) -> bool {
    let extension = path.extension().and_then(|e| e.to_str());
    let name = path.file_name().and_then(|n| n.to_str());
    match (extension, name) {
        (Some(extension), Some(name)) => {
            extension.eq_ignore_ascii_case(EXTRACT_EXTENSION) && name.starts_with(prefix)
        }
        _ => false,
    }
}
