use std::fs;
use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;
use worldbak::BackupError;
use worldbak::archive::ZipArchiver;
use worldbak::artifact::ArtifactKey;
use worldbak::config::BackupPlan;
use worldbak::notify::Notifier;
use worldbak::orchestrator::{BackupAction, RunContext, run};
use worldbak::store::MemoryStore;

const BUCKET: &str = "saves";

#[derive(Default)]
struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
}

impl RecordingNotifier {
    fn messages(&self) -> Vec<String> {
        self.messages.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, _title: &str, message: &str) {
        self.messages.lock().unwrap().push(message.to_string());
    }
}

fn make_world(root: &Path, world: &str) {
    let dir = root.join(world);
    fs::create_dir_all(dir.join("db")).unwrap();
    fs::write(dir.join("level.dat"), format!("level of {world}")).unwrap();
}

fn plan(root: &TempDir, worlds: &[&str], generation: usize) -> BackupPlan {
    BackupPlan {
        bucket: BUCKET.to_string(),
        source_root: root.path().to_path_buf(),
        worlds: worlds.iter().map(|w| w.to_string()).collect(),
        generation,
    }
}

/// Seed `count` backups of `world` starting at `start`, one hour apart.
fn seed(store: &MemoryStore, world: &str, start: DateTime<Utc>, count: i64) -> Vec<String> {
    (0..count)
        .map(|i| {
            let ts = start + Duration::hours(i);
            let key = ArtifactKey::new(world, ts).to_string();
            store.insert(BUCKET, &key, ts);
            key
        })
        .collect()
}

fn long_ago() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2020, 1, 1, 0, 0, 0).unwrap()
}

fn context<'a>(
    store: &'a MemoryStore,
    archiver: &'a ZipArchiver,
    notifier: &'a RecordingNotifier,
    dry_run: bool,
) -> RunContext<'a> {
    RunContext {
        store,
        archiver,
        notifier,
        dry_run,
    }
}

#[tokio::test]
async fn test_first_backup_of_new_world() {
    let root = tempfile::tempdir().unwrap();
    make_world(root.path(), "w1");
    let store = MemoryStore::new();
    store.create_bucket(BUCKET);
    let (archiver, notifier) = (ZipArchiver::default(), RecordingNotifier::default());

    let report = run(&context(&store, &archiver, &notifier, false), &plan(&root, &["w1"], 3))
        .await
        .unwrap();

    let w1 = report.world("w1").unwrap();
    let BackupAction::BackedUp { key } = &w1.action else {
        panic!("expected a backup, got {:?}", w1.action);
    };
    assert!(key.starts_with("w1_"));
    assert!(key.ends_with(".zip"));
    assert!(w1.pruned.is_empty());
    assert_eq!(store.keys(BUCKET), vec![key.clone()]);
    assert!(notifier.messages().is_empty());
}

#[tokio::test]
async fn test_unchanged_world_is_only_pruned() {
    let root = tempfile::tempdir().unwrap();
    make_world(root.path(), "w1");
    let store = MemoryStore::new();
    // all backups are newer than the world directory
    let keys = seed(&store, "w1", Utc::now() + Duration::hours(1), 5);
    let (archiver, notifier) = (ZipArchiver::default(), RecordingNotifier::default());

    let report = run(&context(&store, &archiver, &notifier, false), &plan(&root, &["w1"], 3))
        .await
        .unwrap();

    let w1 = report.world("w1").unwrap();
    assert_eq!(w1.action, BackupAction::UpToDate);
    assert_eq!(w1.pruned, keys[..2].to_vec());
    assert!(store.uploaded().is_empty());
    assert_eq!(store.deleted(), keys[..2].to_vec());
    assert_eq!(store.keys(BUCKET), keys[2..].to_vec());
}

#[tokio::test]
async fn test_missing_world_does_not_stop_the_run() {
    let root = tempfile::tempdir().unwrap();
    make_world(root.path(), "w1");
    let store = MemoryStore::new();
    store.create_bucket(BUCKET);
    let (archiver, notifier) = (ZipArchiver::default(), RecordingNotifier::default());

    let report = run(
        &context(&store, &archiver, &notifier, false),
        &plan(&root, &["w2", "w1"], 3),
    )
    .await
    .unwrap();

    let w2 = report.world("w2").unwrap();
    assert_eq!(w2.action, BackupAction::Failed);
    assert!(matches!(w2.errors[0], BackupError::LocalAccess { .. }));
    assert!(matches!(
        report.world("w1").unwrap().action,
        BackupAction::BackedUp { .. }
    ));
    assert_eq!(report.failure_count(), 1);
    assert_eq!(notifier.messages(), vec!["Failed to access world data w2"]);
}

#[tokio::test]
async fn test_new_backup_counts_towards_generation() {
    let root = tempfile::tempdir().unwrap();
    make_world(root.path(), "w1");
    let store = MemoryStore::new();
    let old = seed(&store, "w1", long_ago(), 3);
    let (archiver, notifier) = (ZipArchiver::default(), RecordingNotifier::default());

    let report = run(&context(&store, &archiver, &notifier, false), &plan(&root, &["w1"], 3))
        .await
        .unwrap();

    let w1 = report.world("w1").unwrap();
    assert!(matches!(w1.action, BackupAction::BackedUp { .. }));
    assert_eq!(w1.pruned, vec![old[0].clone()]);
    assert_eq!(store.keys(BUCKET).len(), 3);
}

#[tokio::test]
async fn test_upload_failure_still_prunes() {
    let root = tempfile::tempdir().unwrap();
    make_world(root.path(), "w1");
    let store = MemoryStore::new();
    let old = seed(&store, "w1", long_ago(), 4);
    store.fail_uploads_with_prefix("w1_");
    let (archiver, notifier) = (ZipArchiver::default(), RecordingNotifier::default());

    let report = run(&context(&store, &archiver, &notifier, false), &plan(&root, &["w1"], 2))
        .await
        .unwrap();

    let w1 = report.world("w1").unwrap();
    assert_eq!(w1.action, BackupAction::Failed);
    assert!(matches!(w1.errors[0], BackupError::Upload { .. }));
    // the failed upload was not added to the catalog
    assert_eq!(w1.pruned, old[..2].to_vec());
    assert_eq!(store.keys(BUCKET), old[2..].to_vec());
    assert_eq!(notifier.messages().len(), 1);
}

#[tokio::test]
async fn test_listing_failure_aborts_before_any_world() {
    let root = tempfile::tempdir().unwrap();
    make_world(root.path(), "w1");
    let store = MemoryStore::new();
    store.fail_listing();
    let (archiver, notifier) = (ZipArchiver::default(), RecordingNotifier::default());

    let err = run(&context(&store, &archiver, &notifier, false), &plan(&root, &["w1"], 3))
        .await
        .unwrap_err();

    assert!(err.is_fatal());
    assert!(store.uploaded_paths().is_empty());
    assert_eq!(
        notifier.messages(),
        vec!["Failed to get object list from bucket saves"]
    );
}

#[tokio::test]
async fn test_dry_run_touches_nothing() {
    let root = tempfile::tempdir().unwrap();
    make_world(root.path(), "w1");
    let store = MemoryStore::new();
    let old = seed(&store, "w1", long_ago(), 3);
    let (archiver, notifier) = (ZipArchiver::default(), RecordingNotifier::default());

    let report = run(&context(&store, &archiver, &notifier, true), &plan(&root, &["w1"], 3))
        .await
        .unwrap();

    let w1 = report.world("w1").unwrap();
    assert_eq!(w1.action, BackupAction::Planned);
    assert_eq!(w1.pruned, vec![old[0].clone()]);
    assert!(store.uploaded_paths().is_empty());
    assert!(store.deleted().is_empty());
    assert_eq!(store.keys(BUCKET), old);
}

#[tokio::test]
async fn test_prefix_sharing_worlds_are_independent() {
    let root = tempfile::tempdir().unwrap();
    make_world(root.path(), "A");
    make_world(root.path(), "AB");
    let store = MemoryStore::new();
    let future = Utc::now() + Duration::hours(1);
    let a = seed(&store, "A", future, 2);
    let ab = seed(&store, "AB", future, 3);
    let (archiver, notifier) = (ZipArchiver::default(), RecordingNotifier::default());

    let report = run(
        &context(&store, &archiver, &notifier, false),
        &plan(&root, &["A", "AB"], 2),
    )
    .await
    .unwrap();

    assert!(report.world("A").unwrap().pruned.is_empty());
    assert_eq!(report.world("AB").unwrap().pruned, vec![ab[0].clone()]);
    let remaining = store.keys(BUCKET);
    assert!(a.iter().all(|k| remaining.contains(k)));
}

#[tokio::test]
async fn test_delete_failure_is_reported_and_run_continues() {
    let root = tempfile::tempdir().unwrap();
    make_world(root.path(), "w1");
    make_world(root.path(), "w2");
    let store = MemoryStore::new();
    let future = Utc::now() + Duration::hours(1);
    let keys = seed(&store, "w1", future, 5);
    store.fail_key(&keys[0]);
    let (archiver, notifier) = (ZipArchiver::default(), RecordingNotifier::default());

    let report = run(
        &context(&store, &archiver, &notifier, false),
        &plan(&root, &["w1", "w2"], 3),
    )
    .await
    .unwrap();

    let w1 = report.world("w1").unwrap();
    assert_eq!(w1.action, BackupAction::UpToDate);
    assert_eq!(w1.pruned, vec![keys[1].clone()]);
    assert_eq!(w1.errors.len(), 1);
    assert!(matches!(
        &w1.errors[0],
        BackupError::Delete { key, .. } if key == &keys[0]
    ));
    assert_eq!(
        notifier.messages(),
        vec![format!("Failed to delete old backup {} on bucket saves", keys[0])]
    );
    let remaining = store.keys(BUCKET);
    assert!(remaining.contains(&keys[0]));
    assert!(!remaining.contains(&keys[1]));

    assert!(matches!(
        report.world("w2").unwrap().action,
        BackupAction::BackedUp { .. }
    ));
}
