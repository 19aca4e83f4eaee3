// tests/clean_scenarios.rs

mod common;
use crate::common::{init_tracing, TestTree};

use std::error::Error;

use globmirror::config::MirrorOptions;
use globmirror::engine::Mirror;

type TestResult = Result<(), Box<dyn Error>>;

#[tokio::test]
async fn deleted_source_is_pruned_with_its_empty_directory() -> TestResult {
    init_tracing();
    let tree = TestTree::hi_yo();
    let glob = tree.glob("**/*.txt");

    globmirror::copy(&glob, tree.out(), MirrorOptions::default())?
        .wait()
        .await?;
    tree.remove("b/c.txt");

    let summary = globmirror::clean(&glob, tree.out()).await?;

    assert_eq!(summary.removed_files, vec![tree.out().join("b/c.txt")]);
    assert_eq!(summary.removed_dirs, vec![tree.out().join("b")]);
    assert!(!tree.out_exists("b"));
    assert_eq!(tree.read_out("a.txt").as_deref(), Some("hi"));
    Ok(())
}

#[test]
fn clean_is_idempotent() -> TestResult {
    let tree = TestTree::hi_yo();
    let glob = tree.glob("**/*.txt");
    tree.write_out("gone.txt", "x");
    tree.write_out("deep/er/gone.txt", "x");

    let first = globmirror::clean_sync(&glob, tree.out())?;
    let second = globmirror::clean_sync(&glob, tree.out())?;

    assert_eq!(first.removed_files.len(), 2);
    assert!(second.removed_files.is_empty());
    assert!(second.removed_dirs.is_empty());
    assert!(tree.out().is_dir());
    Ok(())
}

#[test]
fn after_clean_and_copy_destination_equals_match_set() -> TestResult {
    let tree = TestTree::hi_yo();
    let mirror = Mirror::new(&tree.glob("**/*.txt"), tree.out(), MirrorOptions::default().clean(true))?;

    mirror.copy_sync()?;
    tree.remove("a.txt");
    tree.write("b/new.txt", "n");
    mirror.copy_sync()?;

    assert_eq!(
        tree.out_snapshot(),
        vec![
            ("b/c.txt".to_string(), b"yo".to_vec()),
            ("b/new.txt".to_string(), b"n".to_vec()),
        ]
    );
    Ok(())
}

#[test]
fn never_removes_files_backed_by_a_current_source() -> TestResult {
    let tree = TestTree::hi_yo();
    let glob = tree.glob("**/*.txt");
    globmirror::copy_sync(&glob, tree.out(), MirrorOptions::default())?;

    let summary = globmirror::clean_sync(&glob, tree.out())?;

    assert!(summary.removed_files.is_empty());
    assert!(tree.out_exists("a.txt"));
    assert!(tree.out_exists("b/c.txt"));
    Ok(())
}

#[test]
fn ignored_shapes_are_not_cleaned() -> TestResult {
    let tree = TestTree::hi_yo();
    tree.write_out("drafts/old.txt", "kept");
    tree.write_out("stale.txt", "removed");

    let mirror = Mirror::new(
        &tree.glob("**/*.txt"),
        tree.out(),
        MirrorOptions::default().ignore(["drafts/**"]),
    )?;
    let summary = mirror.clean_sync()?;

    assert_eq!(summary.removed_files, vec![tree.out().join("stale.txt")]);
    assert!(tree.out_exists("drafts/old.txt"));
    Ok(())
}
