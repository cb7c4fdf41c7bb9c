//! Archive and retry management
//!
//! The output root is the only record of what has been produced and what has
//! been consumed. Each partition folder holds at most one active extract
//! file; everything older lives in `{partition}/archive/` under the name
//! `{stem}.{mtime_epoch}.csv` (with `-N` appended when that name is taken).
//!
//! A submit run:
//! 1. sweeps every partition folder, archiving all but the newest extract
//! 2. per partition, picks the newest extract as active
//! 3. archives it unread if it cannot be parsed
//! 4. leaves it in place if it has no rows
//! 5. dispatches its rows and archives it only if at least one was accepted

use crate::dispatch::{DispatchReport, Dispatcher, Submit};
use crate::error::Result;
use crate::extract::{is_extract_file, read_extract, EXTRACT_EXTENSION};
use dpx_common::time::epoch_secs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Archive subfolder name inside each partition folder
pub const ARCHIVE_DIR: &str = "archive";

/// Move a file, falling back to copy-then-delete when rename fails
pub fn move_file(from: &Path, to: &Path) -> io::Result<()> {
    match std::fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            tracing::debug!(
                from = %from.display(),
                to = %to.display(),
                error = %rename_err,
                "Rename failed, copying instead"
            );
            copy_then_remove(from, to)
        }
    }
}

/// Fallback half of [`move_file`]
fn copy_then_remove(from: &Path, to: &Path) -> io::Result<()> {
    std::fs::copy(from, to)?;
    std::fs::remove_file(from)
}

/// Archive path for `file`: `{stem}.{epoch}.csv`, suffixed `-N` until unused
pub fn archive_target(archive_dir: &Path, file: &Path, modified: SystemTime) -> PathBuf {
    let stem = file
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let base = format!("{}.{}", stem, epoch_secs(modified));

    let mut candidate = archive_dir.join(format!("{}.{}", base, EXTRACT_EXTENSION));
    let mut suffix = 1u32;
    while candidate.exists() {
        candidate = archive_dir.join(format!("{}-{}.{}", base, suffix, EXTRACT_EXTENSION));
        suffix += 1;
    }
    candidate
}

/// Move `file` into the `archive` folder next to it
pub fn archive_file(file: &Path) -> io::Result<PathBuf> {
    let modified = std::fs::metadata(file)?.modified()?;
    let parent = file.parent().unwrap_or_else(|| Path::new("."));
    let archive_dir = parent.join(ARCHIVE_DIR);
    std::fs::create_dir_all(&archive_dir)?;

    let target = archive_target(&archive_dir, file, modified);
    move_file(file, &target)?;

    tracing::info!(from = %file.display(), to = %target.display(), "File archived");
    Ok(target)
}

/// Extract files directly inside `dir`, oldest first
///
/// Equal modification times are ordered by file name.
pub fn list_extracts(dir: &Path, prefix: &str) -> io::Result<Vec<(PathBuf, SystemTime)>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !entry.file_type()?.is_file() || !is_extract_file(&path, prefix) {
            continue;
        }
        let modified = entry.metadata()?.modified()?;
        files.push((path, modified));
    }
    files.sort_by(|(a_path, a_time), (b_path, b_time)| {
        a_time.cmp(b_time).then_with(|| a_path.cmp(b_path))
    });
    Ok(files)
}

/// Newest extract file in `dir`, if any
pub fn newest_extract(dir: &Path, prefix: &str) -> io::Result<Option<PathBuf>> {
    let mut files = list_extracts(dir, prefix)?;
    Ok(files.pop().map(|(path, _)| path))
}

/// Archive every superseded extract in every partition folder under `output_root`
///
/// Returns the number of files archived. Only an unreadable output root is an
/// error; unreadable entries and failing files are logged and skipped.
pub fn sweep_superseded(output_root: &Path, prefix: &str) -> Result<usize> {
    if !output_root.exists() {
        return Ok(0);
    }

    let mut archived = 0;
    for entry in std::fs::read_dir(output_root)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::error!(
                    root = %output_root.display(),
                    error = %e,
                    "Unreadable output root entry"
                );
                continue;
            }
        };
        let dir = entry.path();
        match entry.file_type() {
            Ok(file_type) if file_type.is_dir() => {}
            Ok(_) => continue,
            Err(e) => {
                tracing::error!(path = %dir.display(), error = %e, "Cannot stat output root entry");
                continue;
            }
        }

        let mut files = match list_extracts(&dir, prefix) {
            Ok(files) => files,
            Err(e) => {
                tracing::error!(dir = %dir.display(), error = %e, "Cannot list partition folder");
                continue;
            }
        };
        if files.len() < 2 {
            continue;
        }
        files.pop();

        for (path, _) in files {
            match archive_file(&path) {
                Ok(_) => archived += 1,
                Err(e) => tracing::error!(
                    file = %path.display(),
                    error = %e,
                    "Failed to archive superseded file"
                ),
            }
        }
    }

    if archived > 0 {
        tracing::info!(archived, "Superseded extract files archived");
    }
    Ok(archived)
}

/// What happened to one partition in a submit run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PartitionOutcome {
    /// No extract file to work on
    NoFile,
    /// Unreadable file moved straight to the archive
    Poisoned { file: PathBuf, archived_to: Option<PathBuf> },
    /// Zero-row file left in place
    Empty { file: PathBuf },
    /// Dry run: file selected and parsed, nothing sent
    DryRun { file: PathBuf, rows: usize },
    /// Nothing accepted; file kept for the next run
    Retained { file: PathBuf, report: DispatchReport },
    /// At least one row accepted; file archived
    Archived {
        file: PathBuf,
        archived_to: PathBuf,
        report: DispatchReport,
    },
    /// Filesystem error while handling the partition
    Failed { error: String },
}

impl PartitionOutcome {
    pub fn report(&self) -> Option<DispatchReport> {
        match self {
            PartitionOutcome::Retained { report, .. }
            | PartitionOutcome::Archived { report, .. } => Some(*report),
            _ => None,
        }
    }

    pub fn archived(&self) -> bool {
        matches!(
            self,
            PartitionOutcome::Archived { .. }
                | PartitionOutcome::Poisoned {
                    archived_to: Some(_),
                    ..
                }
        )
    }
}

/// Result of one submit pass
#[derive(Debug, Clone, Default)]
pub struct SubmitRun {
    /// Superseded files archived by the sweep
    pub swept: usize,
    /// Set when the sweep could not read the output root
    pub sweep_error: Option<String>,
    pub outcomes: Vec<(String, PartitionOutcome)>,
}

/// Drives the submit side of a run
pub struct ArchiveManager<S> {
    output_root: PathBuf,
    prefix: String,
    dispatcher: Dispatcher<S>,
    dry_run: bool,
}

impl<S: Submit> ArchiveManager<S> {
    pub fn new(
        output_root: impl Into<PathBuf>,
        prefix: impl Into<String>,
        dispatcher: Dispatcher<S>,
    ) -> Self {
        Self {
            output_root: output_root.into(),
            prefix: prefix.into(),
            dispatcher,
            dry_run: false,
        }
    }

    /// Select and parse only: no submissions, no archival
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn dispatcher(&self) -> &Dispatcher<S> {
        &self.dispatcher
    }

    /// Sweep, then process each partition in order
    ///
    /// A failed sweep is recorded and dispatch still goes ahead.
    pub async fn run(&self, partitions: &[String]) -> SubmitRun {
        let mut run = SubmitRun::default();
        if self.dry_run {
            tracing::info!("Dry run, superseded files are not swept");
        } else {
            match sweep_superseded(&self.output_root, &self.prefix) {
                Ok(swept) => run.swept = swept,
                Err(e) => {
                    tracing::error!(
                        root = %self.output_root.display(),
                        error = %e,
                        "Sweep failed, dispatching anyway"
                    );
                    run.sweep_error = Some(e.to_string());
                }
            }
        }

        run.outcomes.reserve(partitions.len());
        for partition in partitions {
            let outcome = match self.process_partition(partition).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(
                        partition = %partition,
                        error = %e,
                        "Partition submission failed"
                    );
                    PartitionOutcome::Failed { error: e.to_string() }
                }
            };
            run.outcomes.push((partition.clone(), outcome));
        }
        run
    }

    /// Select, parse, dispatch and gate archival for one partition
    pub async fn process_partition(&self, partition: &str) -> Result<PartitionOutcome> {
        let dir = self.output_root.join(partition);
        let active = if dir.is_dir() {
            newest_extract(&dir, &self.prefix)?
        } else {
            None
        };
        let Some(file) = active else {
            tracing::warn!(partition, dir = %dir.display(), "No extract file, partition skipped");
            return Ok(PartitionOutcome::NoFile);
        };

        let rows = match read_extract(&file) {
            Ok(rows) => rows,
            Err(e) => {
                tracing::error!(
                    partition,
                    file = %file.display(),
                    error = %e,
                    "Unreadable extract file"
                );
                if self.dry_run {
                    return Ok(PartitionOutcome::Poisoned { file, archived_to: None });
                }
                let archived_to = match archive_file(&file) {
                    Ok(target) => Some(target),
                    Err(e) => {
                        tracing::error!(
                            partition,
                            file = %file.display(),
                            error = %e,
                            "Failed to archive unreadable file"
                        );
                        None
                    }
                };
                return Ok(PartitionOutcome::Poisoned { file, archived_to });
            }
        };

        if rows.is_empty() {
            tracing::info!(
                partition,
                file = %file.display(),
                "Extract file has no rows, left in place"
            );
            return Ok(PartitionOutcome::Empty { file });
        }

        if self.dry_run {
            tracing::info!(
                partition,
                file = %file.display(),
                rows = rows.len(),
                "Dry run, rows not submitted"
            );
            return Ok(PartitionOutcome::DryRun { file, rows: rows.len() });
        }

        let report = self.dispatcher.dispatch_file(&file, &rows).await;
        if !report.any_succeeded() {
            tracing::warn!(
                partition,
                file = %file.display(),
                failed = report.failed,
                "No rows accepted, file kept for the next run"
            );
            return Ok(PartitionOutcome::Retained { file, report });
        }

        let archived_to = archive_file(&file)?;
        Ok(PartitionOutcome::Archived {
            file,
            archived_to,
            report,
        })
    }
}
