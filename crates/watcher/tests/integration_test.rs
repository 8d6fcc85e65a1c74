//! Integration tests for the recursive monitor
//!
//! These tests use temporary directories and real filesystem operations
//! to validate the monitor's behavior in realistic scenarios. Files are
//! created empty so that no modification events follow their creation.

use pretty_assertions::assert_eq;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tokio::time::timeout;
use treewatch_core::error::Error;
use treewatch_watcher::{Constraints, EventKind, FileType, FilesystemEvent, Monitor, Notifier};

type Events = mpsc::UnboundedReceiver<FilesystemEvent>;

/// Helper to build a monitor that forwards events into a channel
fn build_monitor(root: &Path, constraints: Constraints) -> (Monitor, Events) {
    let (tx, rx) = mpsc::unbounded_channel();
    let monitor = Monitor::builder()
        .root(root)
        .constraints(constraints)
        .subscriber(move |event| {
            let _ = tx.send(event);
        })
        .build()
        .unwrap();
    (monitor, rx)
}

/// Helper to create a canonical temporary root
fn temp_root() -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path().canonicalize().unwrap();
    (temp_dir, root)
}

/// Helper to create an empty file
fn touch(path: &Path) {
    std::fs::File::create(path).unwrap();
}

/// Collect events until `expected` arrives, failing after a timeout
async fn wait_for(events: &mut Events, expected: &FilesystemEvent) -> Vec<FilesystemEvent> {
    let mut seen = Vec::new();
    let result = timeout(Duration::from_secs(5), async {
        while let Some(event) = events.recv().await {
            let done = &event == expected;
            seen.push(event);
            if done {
                return;
            }
        }
    })
    .await;
    assert!(result.is_ok(), "Timed out waiting for {expected}, saw {seen:?}");
    seen
}

/// Collect whatever arrives within a short quiet period
async fn drain(events: &mut Events) -> Vec<FilesystemEvent> {
    let mut seen = Vec::new();
    while let Ok(Some(event)) = timeout(Duration::from_millis(500), events.recv()).await {
        seen.push(event);
    }
    seen
}

fn count(events: &[FilesystemEvent], expected: &FilesystemEvent) -> usize {
    events.iter().filter(|event| *event == expected).count()
}

#[tokio::test]
async fn test_initial_events_non_recursive() {
    let (_temp_dir, root) = temp_root();
    touch(&root.join("a.txt"));
    std::fs::create_dir(root.join("sub")).unwrap();
    touch(&root.join("sub/inner.txt"));

    let (mut monitor, mut events) = build_monitor(&root, Constraints::default());
    assert_eq!(monitor.start().await.unwrap(), 2);

    let mut initial = drain(&mut events).await;
    initial.sort_by(|a, b| a.path().cmp(b.path()));
    assert_eq!(
        initial,
        vec![
            FilesystemEvent::new(root.join("a.txt"), EventKind::Initial),
            FilesystemEvent::new(root.join("sub"), EventKind::Initial),
        ]
    );

    // nothing inside sub is observed
    touch(&root.join("sub/later.txt"));
    std::fs::remove_file(root.join("sub/inner.txt")).unwrap();
    assert_eq!(drain(&mut events).await, Vec::new());

    monitor.stop().await.unwrap();
}

#[tokio::test]
async fn test_initial_events_recursive() {
    let (_temp_dir, root) = temp_root();
    std::fs::create_dir_all(root.join("sub/deep")).unwrap();
    touch(&root.join("sub/deep/file.txt"));

    let (mut monitor, mut events) =
        build_monitor(&root, Constraints::default().with_recursive(true));
    assert_eq!(monitor.start().await.unwrap(), 3);

    let initial = drain(&mut events).await;
    assert_eq!(
        initial,
        vec![
            FilesystemEvent::new(root.join("sub"), EventKind::Initial),
            FilesystemEvent::new(root.join("sub/deep"), EventKind::Initial),
            FilesystemEvent::new(root.join("sub/deep/file.txt"), EventKind::Initial),
        ]
    );

    // directories found by the scan are watched
    touch(&root.join("sub/deep/new.txt"));
    let expected = FilesystemEvent::new(root.join("sub/deep/new.txt"), EventKind::Created);
    wait_for(&mut events, &expected).await;

    monitor.stop().await.unwrap();
}

#[tokio::test]
async fn test_nested_creation_in_existing_directory() {
    let (_temp_dir, root) = temp_root();
    std::fs::create_dir(root.join("sub")).unwrap();

    let (mut monitor, mut events) =
        build_monitor(&root, Constraints::default().with_recursive(true));
    monitor.start().await.unwrap();
    drain(&mut events).await;

    std::fs::create_dir(root.join("sub/deep")).unwrap();
    touch(&root.join("sub/deep/file.txt"));

    let deep = FilesystemEvent::new(root.join("sub/deep"), EventKind::Created);
    let file = FilesystemEvent::new(root.join("sub/deep/file.txt"), EventKind::Created);

    let mut seen = wait_for(&mut events, &file).await;
    let deep_index = seen.iter().position(|e| *e == deep);
    assert!(deep_index.is_some(), "deep was never announced: {seen:?}");
    assert!(deep_index < seen.iter().position(|e| *e == file));

    seen.extend(drain(&mut events).await);
    assert_eq!(count(&seen, &deep), 1);
    assert_eq!(count(&seen, &file), 1);

    monitor.stop().await.unwrap();
}

#[tokio::test]
async fn test_rapid_nested_creation_is_reported_once() {
    let (_temp_dir, root) = temp_root();
    let (mut monitor, mut events) =
        build_monitor(&root, Constraints::default().with_recursive(true));
    monitor.start().await.unwrap();

    let nested = root.join("a/b/c/d");
    std::fs::create_dir_all(&nested).unwrap();
    let mut expected = Vec::new();
    for dir in ["a", "a/b", "a/b/c", "a/b/c/d"] {
        touch(&root.join(dir).join("file.txt"));
        expected.push(root.join(dir));
        expected.push(root.join(dir).join("file.txt"));
    }

    let last = FilesystemEvent::new(nested.join("file.txt"), EventKind::Created);
    let mut seen = wait_for(&mut events, &last).await;
    seen.extend(drain(&mut events).await);

    for path in expected {
        let event = FilesystemEvent::new(&path, EventKind::Created);
        assert_eq!(count(&seen, &event), 1, "{} in {seen:?}", path.display());
    }
    assert!(seen.iter().all(|e| e.kind() == EventKind::Created));

    monitor.stop().await.unwrap();
}

#[tokio::test]
async fn test_substring_filter() {
    let (_temp_dir, root) = temp_root();
    let (mut monitor, mut events) = build_monitor(
        &root,
        Constraints::default().with_filename_substrings(["first"]),
    );
    monitor.start().await.unwrap();

    touch(&root.join("second.txt"));
    touch(&root.join("first.log"));

    let mut seen = wait_for(
        &mut events,
        &FilesystemEvent::new(root.join("first.log"), EventKind::Created),
    )
    .await;
    seen.extend(drain(&mut events).await);

    assert_eq!(
        seen,
        vec![FilesystemEvent::new(root.join("first.log"), EventKind::Created)]
    );

    monitor.stop().await.unwrap();
}

#[tokio::test]
async fn test_rejected_directories_are_still_watched() {
    let (_temp_dir, root) = temp_root();
    let constraints = Constraints::default()
        .with_recursive(true)
        .with_filename_patterns([r".*\.txt"])
        .unwrap();
    let (mut monitor, mut events) = build_monitor(&root, constraints);
    monitor.start().await.unwrap();

    std::fs::create_dir(root.join("logs")).unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;
    touch(&root.join("logs/x.txt"));

    let expected = FilesystemEvent::new(root.join("logs/x.txt"), EventKind::Created);
    let mut seen = wait_for(&mut events, &expected).await;
    seen.extend(drain(&mut events).await);
    assert_eq!(seen, vec![expected]);

    monitor.stop().await.unwrap();
}

#[tokio::test]
async fn test_deletion_and_rename() {
    let (_temp_dir, root) = temp_root();
    touch(&root.join("a.txt"));
    touch(&root.join("old.txt"));

    let (mut monitor, mut events) = build_monitor(&root, Constraints::default());
    monitor.start().await.unwrap();
    drain(&mut events).await;

    std::fs::remove_file(root.join("a.txt")).unwrap();
    wait_for(
        &mut events,
        &FilesystemEvent::new(root.join("a.txt"), EventKind::Deleted),
    )
    .await;

    std::fs::rename(root.join("old.txt"), root.join("new.txt")).unwrap();
    let mut seen = wait_for(
        &mut events,
        &FilesystemEvent::new(root.join("new.txt"), EventKind::Created),
    )
    .await;
    seen.extend(drain(&mut events).await);
    assert!(seen.contains(&FilesystemEvent::new(
        root.join("old.txt"),
        EventKind::Deleted
    )));

    monitor.stop().await.unwrap();
}

#[tokio::test]
async fn test_removed_directory_is_no_longer_watched() {
    let temp_dir = TempDir::new().unwrap();
    let base = temp_dir.path().canonicalize().unwrap();
    let root = base.join("root");
    let elsewhere = base.join("elsewhere");
    std::fs::create_dir_all(root.join("sub/inner")).unwrap();

    let (mut monitor, mut events) =
        build_monitor(&root, Constraints::default().with_recursive(true));
    monitor.start().await.unwrap();
    drain(&mut events).await;

    // moving the directory out keeps it alive, so a leaked watch would still fire
    std::fs::rename(root.join("sub"), &elsewhere).unwrap();
    let deleted = FilesystemEvent::new(root.join("sub"), EventKind::Deleted);
    let mut seen = wait_for(&mut events, &deleted).await;
    seen.extend(drain(&mut events).await);
    assert_eq!(count(&seen, &deleted), 1);

    touch(&elsewhere.join("ghost.txt"));
    touch(&elsewhere.join("inner/ghost.txt"));
    std::fs::create_dir(elsewhere.join("phantom")).unwrap();
    assert_eq!(drain(&mut events).await, Vec::new());

    monitor.stop().await.unwrap();
}

#[tokio::test]
async fn test_deleted_subtree_reports_once() {
    let (_temp_dir, root) = temp_root();
    std::fs::create_dir(root.join("gone")).unwrap();

    let (mut monitor, mut events) =
        build_monitor(&root, Constraints::default().with_recursive(true));
    monitor.start().await.unwrap();
    drain(&mut events).await;

    std::fs::remove_dir(root.join("gone")).unwrap();
    let deleted = FilesystemEvent::new(root.join("gone"), EventKind::Deleted);
    let mut seen = wait_for(&mut events, &deleted).await;
    seen.extend(drain(&mut events).await);
    assert_eq!(count(&seen, &deleted), 1);

    monitor.stop().await.unwrap();
}

#[tokio::test]
async fn test_replace_by_rename_is_reported() {
    let (_temp_dir, root) = temp_root();
    touch(&root.join("a.txt"));

    let (mut monitor, mut events) = build_monitor(&root, Constraints::default());
    monitor.start().await.unwrap();
    drain(&mut events).await;

    // the usual atomic save: write a sibling, then rename it over the original
    touch(&root.join("a.tmp"));
    std::fs::rename(root.join("a.tmp"), root.join("a.txt")).unwrap();
    let replaced = FilesystemEvent::new(root.join("a.txt"), EventKind::Created);
    let mut seen = wait_for(&mut events, &replaced).await;
    seen.extend(drain(&mut events).await);
    assert_eq!(count(&seen, &replaced), 1);

    // the replacement is tracked like any other entry
    std::fs::remove_file(root.join("a.txt")).unwrap();
    wait_for(
        &mut events,
        &FilesystemEvent::new(root.join("a.txt"), EventKind::Deleted),
    )
    .await;

    monitor.stop().await.unwrap();
}

#[tokio::test]
async fn test_rejected_entries_are_not_reported_as_deleted() {
    for recursive in [false, true] {
        let (_temp_dir, root) = temp_root();
        std::fs::create_dir(root.join("keep")).unwrap();
        touch(&root.join("f.txt"));

        let constraints = Constraints::default()
            .with_file_types([FileType::Directory])
            .with_recursive(recursive);
        let (mut monitor, mut events) = build_monitor(&root, constraints);
        assert_eq!(monitor.start().await.unwrap(), 1);
        assert_eq!(
            drain(&mut events).await,
            vec![FilesystemEvent::new(root.join("keep"), EventKind::Initial)]
        );

        std::fs::remove_file(root.join("f.txt")).unwrap();
        assert_eq!(drain(&mut events).await, Vec::new(), "recursive: {recursive}");

        std::fs::remove_dir(root.join("keep")).unwrap();
        let deleted = FilesystemEvent::new(root.join("keep"), EventKind::Deleted);
        let mut seen = wait_for(&mut events, &deleted).await;
        seen.extend(drain(&mut events).await);
        assert_eq!(seen, vec![deleted], "recursive: {recursive}");

        monitor.stop().await.unwrap();
    }
}

#[tokio::test]
async fn test_single_write_reports_one_modification() {
    let (_temp_dir, root) = temp_root();
    touch(&root.join("a.txt"));

    let (mut monitor, mut events) = build_monitor(&root, Constraints::default());
    monitor.start().await.unwrap();
    drain(&mut events).await;

    {
        let mut file = std::fs::OpenOptions::new()
            .append(true)
            .open(root.join("a.txt"))
            .unwrap();
        file.write_all(b"x").unwrap();
    }
    let modified = FilesystemEvent::new(root.join("a.txt"), EventKind::Modified);
    let mut seen = wait_for(&mut events, &modified).await;
    seen.extend(drain(&mut events).await);
    assert_eq!(seen, vec![modified]);

    monitor.stop().await.unwrap();
}

#[cfg(unix)]
#[tokio::test]
async fn test_watched_directory_change_is_reported_once() {
    use std::os::unix::fs::PermissionsExt;

    let (_temp_dir, root) = temp_root();
    std::fs::create_dir(root.join("sub")).unwrap();

    let (mut monitor, mut events) =
        build_monitor(&root, Constraints::default().with_recursive(true));
    monitor.start().await.unwrap();
    drain(&mut events).await;

    // seen both by the root's watch and by the watch on sub itself
    std::fs::set_permissions(root.join("sub"), std::fs::Permissions::from_mode(0o700)).unwrap();
    let modified = FilesystemEvent::new(root.join("sub"), EventKind::Modified);
    let mut seen = wait_for(&mut events, &modified).await;
    seen.extend(drain(&mut events).await);
    assert_eq!(seen, vec![modified]);

    monitor.stop().await.unwrap();
}

#[tokio::test]
async fn test_empty_directory_yields_nothing() {
    let (_temp_dir, root) = temp_root();
    let (mut monitor, mut events) =
        build_monitor(&root, Constraints::default().with_recursive(true));

    assert_eq!(monitor.start().await.unwrap(), 0);
    assert_eq!(drain(&mut events).await, Vec::new());
    monitor.stop().await.unwrap();
}

#[tokio::test]
async fn test_lifecycle_through_notifier() {
    let (_temp_dir, root) = temp_root();
    let (monitor, _events) = build_monitor(&root, Constraints::default());
    let mut notifier: Box<dyn Notifier> = Box::new(monitor);

    assert!(matches!(
        notifier.stop_watching().await,
        Err(Error::IllegalState(_))
    ));
    notifier.start_watching().await.unwrap();
    assert!(matches!(
        notifier.start_watching().await,
        Err(Error::IllegalState(_))
    ));
    notifier.stop_watching().await.unwrap();
    assert!(matches!(
        notifier.stop_watching().await,
        Err(Error::IllegalState(_))
    ));
}

#[tokio::test]
async fn test_missing_root_fails_to_start() {
    let (_temp_dir, root) = temp_root();
    let (mut monitor, _events) = build_monitor(&root.join("missing"), Constraints::default());

    assert!(monitor.start().await.is_err());
    assert!(!monitor.is_running());
}
