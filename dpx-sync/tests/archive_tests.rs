//! Archive gating, newest-file selection and sweep behaviour

mod helpers;

use dpx_sync::archive::{ArchiveManager, PartitionOutcome};
use dpx_sync::dispatch::Dispatcher;
use dpx_sync::extract::{read_extract, DEFAULT_PREFIX};
use helpers::submitter::RecordingSubmitter;
use helpers::{file_names, write_extract};
use tempfile::TempDir;

const T1: u64 = 1_700_000_100;
const T2: u64 = 1_700_000_200;
const T3: u64 = 1_700_000_300;

fn manager(root: &TempDir, submitter: RecordingSubmitter) -> ArchiveManager<RecordingSubmitter> {
    ArchiveManager::new(root.path(), DEFAULT_PREFIX, Dispatcher::new(submitter))
}

fn partitions(codes: &[&str]) -> Vec<String> {
    codes.iter().map(|c| c.to_string()).collect()
}

#[tokio::test]
async fn test_partial_success_archives_whole_file_once() {
    let root = TempDir::new().unwrap();
    let file = root.path().join("1000").join("DownPaymentExtract_1000_202401010000.csv");
    write_extract(
        &file,
        &[
            "500,10,SF-1,C1,A1,1000,2024",
            "501,10,SF-2,C1,A2,1000,2024",
            "502,10,SF-3,C1,A3,1000,2024",
        ],
        T1,
    );

    let manager = manager(&root, RecordingSubmitter::rejecting(&["501", "502"]));
    let outcomes = manager.run(&partitions(&["1000"])).await.outcomes;

    let PartitionOutcome::Archived { archived_to, report, .. } = &outcomes[0].1 else {
        panic!("expected archived outcome, got {:?}", outcomes[0].1);
    };
    assert_eq!(report.succeeded, 1);
    assert_eq!(report.failed, 2);
    assert!(!file.exists());
    assert_eq!(
        archived_to.file_name().unwrap(),
        "DownPaymentExtract_1000_202401010000.1700000100.csv"
    );
    assert_eq!(read_extract(archived_to).unwrap().len(), 3);

    // Second run: nothing left to pick up
    let outcomes = manager.run(&partitions(&["1000"])).await.outcomes;
    assert_eq!(outcomes[0].1, PartitionOutcome::NoFile);
    assert_eq!(manager.dispatcher().submitter().attempt_count(), 3);
    assert_eq!(file_names(&root.path().join("1000").join("archive")).len(), 1);
}

#[tokio::test]
async fn test_all_rows_failing_keeps_file_for_retry() {
    let root = TempDir::new().unwrap();
    let file = root.path().join("1000").join("DownPaymentExtract_1000_202401010000.csv");
    write_extract(&file, &["500,10,SF-1,C1,A1,1000,2024"], T1);

    let manager = manager(&root, RecordingSubmitter::rejecting(&["500"]));

    for _ in 0..2 {
        let outcomes = manager.run(&partitions(&["1000"])).await.outcomes;
        assert!(matches!(outcomes[0].1, PartitionOutcome::Retained { .. }));
        assert!(file.exists());
    }
    assert_eq!(manager.dispatcher().submitter().attempt_count(), 2);
}

#[tokio::test]
async fn test_newest_file_active_older_files_archived_with_own_mtime() {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("1000");
    write_extract(
        &dir.join("DownPaymentExtract_1000_202401010000.csv"),
        &["500,10,SF-1,C1,A1,1000,2024"],
        T1,
    );
    write_extract(
        &dir.join("DownPaymentExtract_1000_202401020000.csv"),
        &["501,10,SF-2,C1,A2,1000,2024"],
        T2,
    );
    write_extract(
        &dir.join("DownPaymentExtract_1000_202401030000.csv"),
        &["502,10,SF-3,C1,A3,1000,2024"],
        T3,
    );

    let manager = manager(&root, RecordingSubmitter::new());
    let outcomes = manager.run(&partitions(&["1000"])).await.outcomes;

    let PartitionOutcome::Archived { file, .. } = &outcomes[0].1 else {
        panic!("expected archived outcome, got {:?}", outcomes[0].1);
    };
    assert_eq!(file.file_name().unwrap(), "DownPaymentExtract_1000_202401030000.csv");

    let submitted = manager.dispatcher().submitter().accepted.lock().unwrap().clone();
    assert_eq!(submitted.len(), 1);
    assert_eq!(submitted[0].sales_document, "502");

    assert_eq!(
        file_names(&dir.join("archive")),
        vec![
            "DownPaymentExtract_1000_202401010000.1700000100.csv".to_string(),
            "DownPaymentExtract_1000_202401020000.1700000200.csv".to_string(),
            "DownPaymentExtract_1000_202401030000.1700000300.csv".to_string(),
        ]
    );
}

#[tokio::test]
async fn test_sweep_covers_partitions_not_in_roster() {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("3000");
    write_extract(&dir.join("DownPaymentExtract_3000_202401010000.csv"), &[], T1);
    write_extract(&dir.join("DownPaymentExtract_3000_202401020000.csv"), &[], T2);

    let manager = manager(&root, RecordingSubmitter::new());
    manager.run(&partitions(&["1000"])).await;

    assert_eq!(file_names(&dir), vec!["DownPaymentExtract_3000_202401020000.csv".to_string()]);
    assert_eq!(file_names(&dir.join("archive")).len(), 1);
}

#[tokio::test]
async fn test_empty_file_retained_until_superseded() {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("1000");
    let empty = dir.join("DownPaymentExtract_1000_202401010000.csv");
    write_extract(&empty, &[], T1);

    let manager = manager(&root, RecordingSubmitter::new());
    for _ in 0..3 {
        let outcomes = manager.run(&partitions(&["1000"])).await.outcomes;
        assert!(matches!(outcomes[0].1, PartitionOutcome::Empty { .. }));
        assert!(empty.exists());
    }

    let newer = dir.join("DownPaymentExtract_1000_202401020000.csv");
    write_extract(&newer, &["500,10,SF-1,C1,A1,1000,2024"], T2);
    manager.run(&partitions(&["1000"])).await;

    assert!(!empty.exists());
    assert!(!newer.exists());
    assert_eq!(file_names(&dir.join("archive")).len(), 2);
}

#[tokio::test]
async fn test_unreadable_file_archived_and_run_continues() {
    let root = TempDir::new().unwrap();
    let poison = root.path().join("1000").join("DownPaymentExtract_1000_202401010000.csv");
    std::fs::create_dir_all(poison.parent().unwrap()).unwrap();
    let mut bytes = helpers::HEADER_LINE.as_bytes().to_vec();
    bytes.extend_from_slice(b"\n500,10,\xff\xfe,C1,A1,1000,2024\n");
    std::fs::write(&poison, bytes).unwrap();

    let good = root.path().join("2000").join("DownPaymentExtract_2000_202401010000.csv");
    write_extract(&good, &["700,10,SF-7,,B1,2000,2024"], T1);

    let manager = manager(&root, RecordingSubmitter::new());
    let outcomes = manager.run(&partitions(&["1000", "2000"])).await.outcomes;

    assert!(matches!(
        &outcomes[0].1,
        PartitionOutcome::Poisoned { archived_to: Some(_), .. }
    ));
    assert!(!poison.exists());
    assert!(matches!(outcomes[1].1, PartitionOutcome::Archived { .. }));
    assert_eq!(manager.dispatcher().submitter().accepted_count(), 1);
}

#[tokio::test]
async fn test_dry_run_neither_submits_nor_archives() {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("1000");
    write_extract(
        &dir.join("DownPaymentExtract_1000_202401010000.csv"),
        &["500,10,SF-1,C1,A1,1000,2024"],
        T1,
    );
    write_extract(
        &dir.join("DownPaymentExtract_1000_202401020000.csv"),
        &["501,10,SF-2,C1,A2,1000,2024"],
        T2,
    );

    let manager = manager(&root, RecordingSubmitter::new()).with_dry_run(true);
    let outcomes = manager.run(&partitions(&["1000"])).await.outcomes;

    assert!(matches!(outcomes[0].1, PartitionOutcome::DryRun { rows: 1, .. }));
    assert_eq!(manager.dispatcher().submitter().attempt_count(), 0);
    assert_eq!(file_names(&dir).len(), 2);
}

#[tokio::test]
async fn test_missing_partition_folder_skipped() {
    let root = TempDir::new().unwrap();
    let manager = manager(&root, RecordingSubmitter::new());
    let outcomes = manager.run(&partitions(&["9999"])).await.outcomes;
    assert_eq!(outcomes[0].1, PartitionOutcome::NoFile);
}

#[tokio::test]
async fn test_non_extract_files_ignored() {
    let root = TempDir::new().unwrap();
    let dir = root.path().join("1000");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("notes.csv"), "hello\n").unwrap();

    let manager = manager(&root, RecordingSubmitter::new());
    let outcomes = manager.run(&partitions(&["1000"])).await.outcomes;

    assert_eq!(outcomes[0].1, PartitionOutcome::NoFile);
    assert!(dir.join("notes.csv").exists());
}
