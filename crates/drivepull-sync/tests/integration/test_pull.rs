//! End-to-end pulls into an in-memory destination

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use drivepull_sync::{RunOutcome, SyncError};

use crate::common::{
    id, options, options_with_workers, scenario_source, FakeDestination, FakeSource, Harness, ROOT,
};

#[tokio::test]
async fn test_merge_into_empty_destination() {
    let harness = Harness::new(scenario_source(), FakeDestination::new());
    let report = harness
        .engine(options(true, -1))
        .run(CancellationToken::new())
        .await
        .unwrap();

    let dest = &harness.destination;
    assert_eq!(report.outcome, RunOutcome::Completed);
    assert!(report.is_success());
    assert_eq!(dest.count(&dest.make_directory_calls), 1);
    assert_eq!(dest.count(&dest.direct_upload_calls), 2);

    let stats = &report.stats;
    assert!(stats.is_completed);
    assert!(stats.is_consistent());
    assert_eq!(stats.failed.total, 0);
    assert_eq!(stats.success.total, 4);
    assert_eq!(stats.tasks.total, 4);
    assert_eq!(stats.success.files, 2);
    assert_eq!(stats.success.dirs, 2);
    assert_eq!(stats.success.size, 30);
    assert_eq!(stats.unfinished.total, 0);

    let a = dest.find(&id(ROOT), "a.txt").expect("a.txt uploaded");
    assert_eq!(a.size, 10);
    let sub = dest.find(&id(ROOT), "sub").expect("sub created");
    assert!(sub.is_directory);
    let b = dest.find(&sub.id, "b.txt").expect("b.txt uploaded");
    assert_eq!(b.size, 20);
    assert_eq!(b.hash.as_deref(), Some("H2"));

    assert!(report.tasks.unfinished.is_empty());
    assert_eq!(report.tasks.success.len(), 4);
}

#[tokio::test]
async fn test_small_files_renegotiate_before_direct_upload() {
    let harness = Harness::new(scenario_source(), FakeDestination::new());
    harness
        .engine(options(true, -1))
        .run(CancellationToken::new())
        .await
        .unwrap();

    let dest = &harness.destination;
    // three negotiations per small file, then one streamed upload each
    assert_eq!(dest.count(&dest.negotiate_calls), 6);
    assert_eq!(
        harness
            .source
            .open_calls
            .load(std::sync::atomic::Ordering::SeqCst),
        2
    );
}

#[tokio::test]
async fn test_named_root_directory_is_created() {
    let harness = Harness::new(scenario_source(), FakeDestination::new());
    let report = harness
        .engine(options(false, -1))
        .run(CancellationToken::new())
        .await
        .unwrap();

    let dest = &harness.destination;
    assert!(report.is_success());
    assert_eq!(dest.count(&dest.make_directory_calls), 2);

    let root = dest.find(&id(ROOT), "root").expect("named root created");
    assert!(dest.find(&root.id, "a.txt").is_some());
    let sub = dest.find(&root.id, "sub").unwrap();
    assert!(dest.find(&sub.id, "b.txt").is_some());
    assert!(dest.find(&id(ROOT), "a.txt").is_none());
    assert_eq!(report.stats.success.total, 4);
}

#[tokio::test]
async fn test_existing_named_root_is_reused() {
    let destination = FakeDestination::new();
    let existing = destination.with_dir(&id(ROOT), "root");
    destination.with_file(&existing, "a.txt", "H1", 10);

    let harness = Harness::new(scenario_source(), destination);
    let report = harness
        .engine(options(false, -1))
        .run(CancellationToken::new())
        .await
        .unwrap();

    let dest = &harness.destination;
    assert!(report.is_success());
    assert_eq!(
        dest.children_of(&id(ROOT))
            .iter()
            .filter(|e| e.name == "root")
            .count(),
        1
    );
    // "root" is found by listing, only "sub" is created
    assert_eq!(dest.count(&dest.make_directory_calls), 1);
    assert_eq!(dest.count(&dest.direct_upload_calls), 1);
}

#[tokio::test]
async fn test_matching_file_is_skipped() {
    let destination = FakeDestination::new();
    destination.with_file(&id(ROOT), "a.txt", "H1", 10);

    let harness = Harness::new(scenario_source(), destination);
    let report = harness
        .engine(options(true, -1))
        .run(CancellationToken::new())
        .await
        .unwrap();

    let dest = &harness.destination;
    assert!(report.is_success());
    assert_eq!(dest.count(&dest.direct_upload_calls), 1);
    assert_eq!(dest.count(&dest.negotiate_calls), 3);
    assert_eq!(report.stats.success.total, 4);
    assert!(report.stats.is_consistent());
}

#[tokio::test]
async fn test_hash_mismatch_reuploads() {
    let destination = FakeDestination::new();
    destination.with_file(&id(ROOT), "a.txt", "H3", 10);

    let harness = Harness::new(scenario_source(), destination);
    let report = harness
        .engine(options(true, -1))
        .run(CancellationToken::new())
        .await
        .unwrap();

    let dest = &harness.destination;
    assert!(report.is_success());
    assert_eq!(dest.count(&dest.direct_upload_calls), 2);
    let a: Vec<_> = dest
        .children_of(&id(ROOT))
        .into_iter()
        .filter(|e| e.name == "a.txt")
        .collect();
    assert_eq!(a.len(), 1);
    assert_eq!(a[0].hash.as_deref(), Some("H1"));
}

#[tokio::test]
async fn test_known_content_is_accepted_by_hash() {
    let destination = FakeDestination::new();
    destination.learn("H1");
    destination.learn("H2");

    let harness = Harness::new(scenario_source(), destination);
    let report = harness
        .engine(options(true, -1))
        .run(CancellationToken::new())
        .await
        .unwrap();

    let dest = &harness.destination;
    assert!(report.is_success());
    assert_eq!(dest.count(&dest.negotiate_calls), 2);
    assert_eq!(dest.count(&dest.direct_upload_calls), 0);
    assert!(dest.find(&id(ROOT), "a.txt").is_some());
}

async fn assert_rerun_makes_no_changes(no_root: bool) {
    let source = Arc::new(scenario_source());
    let destination = Arc::new(FakeDestination::new());

    let first = Harness::shared(source.clone(), destination.clone());
    first
        .engine(options(no_root, -1))
        .run(CancellationToken::new())
        .await
        .unwrap();
    let after_first = destination.mutating_calls();

    let second = Harness::shared(source, destination.clone());
    let report = second
        .engine(options(no_root, -1))
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(destination.mutating_calls(), after_first);
    assert_eq!(report.stats.success.total, 4);
}

#[tokio::test]
async fn test_second_run_makes_no_changes() {
    assert_rerun_makes_no_changes(true).await;
}

#[tokio::test]
async fn test_second_run_into_named_root_makes_no_changes() {
    assert_rerun_makes_no_changes(false).await;
}

#[tokio::test]
async fn test_existing_path_components_are_not_recreated() {
    let destination = FakeDestination::new();
    let backup = destination.with_dir(&id(ROOT), "backup");
    let harness = Harness::new(scenario_source(), destination);
    let mut opts = options(false, -1);
    opts.to = "/backup/2025".into();

    let report = harness
        .engine(opts)
        .run(CancellationToken::new())
        .await
        .unwrap();

    let dest = &harness.destination;
    assert!(report.is_success());
    // "2025", the named root and "sub"; "backup" is found by listing
    assert_eq!(dest.count(&dest.make_directory_calls), 3);
    let year = dest.find(&backup, "2025").expect("2025 created");
    assert!(dest.find(&year.id, "root").is_some());
}

#[tokio::test]
async fn test_unhashed_file_uploads_directly() {
    let source = FakeSource::new("root").unhashed_file(1, ROOT, "raw.bin", b"xyz");
    let harness = Harness::new(source, FakeDestination::new());
    let report = harness
        .engine(options(true, -1))
        .run(CancellationToken::new())
        .await
        .unwrap();

    let dest = &harness.destination;
    assert!(report.is_success());
    assert_eq!(dest.count(&dest.negotiate_calls), 0);
    assert_eq!(dest.count(&dest.direct_upload_calls), 1);
    assert_eq!(dest.find(&id(ROOT), "raw.bin").unwrap().size, 3);
}

#[tokio::test]
async fn test_direct_upload_refused_by_policy() {
    let harness = Harness::new(scenario_source(), FakeDestination::new());
    let mut opts = options(true, -1);
    opts.upload_policy = drivepull_sync::transfer::DirectUploadPolicy::UpTo(15);

    let report = harness
        .engine(opts)
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(report.outcome, RunOutcome::Completed);
    assert!(!report.is_success());
    assert_eq!(report.stats.failed.total, 1);
    assert_eq!(report.stats.failed.size, 20);
    assert_eq!(report.stats.errors.reasons["DirectUploadRefused"], 1);

    let failures = report.failures();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].path, "/root/sub/b.txt");
    assert!(harness.destination.find(&id(ROOT), "a.txt").is_some());
}

#[tokio::test]
async fn test_file_root_is_transferred_into_target() {
    let harness = Harness::new(scenario_source(), FakeDestination::new());
    let mut opts = options(false, -1);
    opts.push = "3".into();

    let report = harness
        .engine(opts)
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert!(report.is_success());
    assert_eq!(report.stats.tasks.total, 1);
    assert_eq!(report.stats.success.files, 1);
    assert!(harness.destination.find(&id(ROOT), "b.txt").is_some());
}

#[tokio::test]
async fn test_path_target_is_created() {
    let harness = Harness::new(scenario_source(), FakeDestination::new());
    let mut opts = options(true, -1);
    opts.to = "/backup/2024".into();

    let report = harness
        .engine(opts)
        .run(CancellationToken::new())
        .await
        .unwrap();

    let dest = &harness.destination;
    assert!(report.is_success());
    let backup = dest.find(&id(ROOT), "backup").expect("backup created");
    let year = dest.find(&backup.id, "2024").expect("2024 created");
    assert!(dest.find(&year.id, "a.txt").is_some());
    assert_eq!(report.stats.dest_root.as_ref().map(|e| &e.id), Some(&year.id));
}

#[tokio::test]
async fn test_missing_source_root_is_an_error() {
    let harness = Harness::new(scenario_source(), FakeDestination::new());
    let mut opts = options(true, -1);
    opts.push = "/nowhere".into();

    let err = harness
        .engine(opts)
        .run(CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::SourceRoot { .. }));
}

#[tokio::test]
async fn test_file_target_is_rejected() {
    let destination = FakeDestination::new();
    let file = destination.with_file(&id(ROOT), "taken", "H9", 1);
    let harness = Harness::new(scenario_source(), destination);
    let mut opts = options(true, -1);
    opts.to = file.to_string();

    let err = harness
        .engine(opts)
        .run(CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, SyncError::NotADirectory(_)));
}

#[tokio::test]
async fn test_panicking_execution_aborts_run() {
    let harness = Harness::new(scenario_source().panicking_on(2), FakeDestination::new());
    let report = harness
        .engine(options(true, -1))
        .run(CancellationToken::new())
        .await
        .unwrap();

    assert!(matches!(report.outcome, RunOutcome::Aborted(_)));
    assert!(!report.stats.is_completed);
    assert!(report.stats.is_consistent());
    assert!(matches!(report.into_result(), Err(SyncError::Aborted(_))));
}

fn wide_source() -> FakeSource {
    scenario_source()
        .dir(4, 2, "deep")
        .file(5, 4, "c.txt", "H5", &[b'c'; 7])
        .file(6, 4, "big.bin", "H6", &[b'd'; 40])
        .dir(7, ROOT, "empty")
        .file(8, ROOT, "d.txt", "H8", &[b'e'; 3])
}

/// Every destination entry below the root as `(path, is_directory, size, hash)`
fn destination_tree(dest: &FakeDestination) -> Vec<(String, bool, u64, Option<String>)> {
    let mut pending = vec![id(ROOT)];
    let mut tree = Vec::new();
    while let Some(parent) = pending.pop() {
        for entry in dest.children_of(&parent) {
            if entry.is_directory {
                pending.push(entry.id.clone());
            }
            tree.push((entry.path, entry.is_directory, entry.size, entry.hash));
        }
    }
    tree.sort();
    tree
}

async fn pull_with_workers(workers: usize) -> (drivepull_sync::PullReport, Arc<FakeDestination>) {
    let destination = FakeDestination::new();
    let named = destination.with_dir(&id(ROOT), "root");
    destination.with_file(&named, "d.txt", "H8", 3);
    let harness = Harness::new(wide_source(), destination);
    let mut opts = options_with_workers(false, -1, workers);
    opts.upload_policy = drivepull_sync::transfer::DirectUploadPolicy::UpTo(25);

    let report = harness
        .engine(opts)
        .run(CancellationToken::new())
        .await
        .unwrap();
    (report, harness.destination.clone())
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_single_worker_matches_parallel_run() {
    let (serial, serial_dest) = pull_with_workers(1).await;
    let (parallel, parallel_dest) = pull_with_workers(8).await;

    assert_eq!(serial.outcome, RunOutcome::Completed);
    assert_eq!(parallel.outcome, serial.outcome);

    let (a, b) = (&serial.stats, &parallel.stats);
    assert_eq!(a.tasks, b.tasks);
    assert_eq!(a.success, b.success);
    assert_eq!(a.failed, b.failed);
    assert_eq!(a.unfinished, b.unfinished);
    assert_eq!(a.retry, b.retry);
    assert_eq!(a.errors, b.errors);
    // big.bin exceeds the direct-upload limit
    assert_eq!(a.failed.total, 1);
    assert!(a.is_consistent() && b.is_consistent());

    let keys = |tasks: &std::collections::HashMap<drivepull_core::domain::EntryId, _>| {
        let mut ids: Vec<_> = tasks.keys().cloned().collect();
        ids.sort();
        ids
    };
    assert_eq!(keys(&serial.tasks.success), keys(&parallel.tasks.success));
    assert_eq!(keys(&serial.tasks.failed), keys(&parallel.tasks.failed));
    assert!(serial.tasks.unfinished.is_empty() && parallel.tasks.unfinished.is_empty());

    assert_eq!(destination_tree(&serial_dest), destination_tree(&parallel_dest));
    assert_eq!(
        serial_dest.count(&serial_dest.make_directory_calls),
        parallel_dest.count(&parallel_dest.make_directory_calls)
    );
}
