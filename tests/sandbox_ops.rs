//! End-to-end sandbox lifecycles over the public API.
//!
//! Coverage:
//! - Mixed pending set: summaries, ordering, JSON determinism, commit-all
//! - Nested add committed from the leaf commits its ancestors first
//! - Folder delete cascade and ancestor revival on child rollback
//! - Unversioned create, explicit scheduling, and the commit refusal
//! - Rename chains collapse to one record and cancel on rename-back
//! - The same engine against a real directory tree

mod common;

use common::{assert_clean, path};
use pendulum::{
    ChangeKind, DiskTree, EngineError, MemoryTree, Sandbox, SandboxConfig,
};

// ==========================================================================
// Mixed pending set
// ==========================================================================

#[test]
fn mixed_changes_summarize_and_commit() {
    let mut sb = common::committed(
        &["Src", "Docs"],
        &[
            ("Src/main.rs", b"fn main() {}"),
            ("Src/util.rs", b"pub fn util() {}"),
            ("Docs/guide.md", b"# Guide"),
        ],
    );

    sb.edit(&path("Src/main.rs"), b"fn main() { run() }").unwrap();
    sb.rename(&path("Src/util.rs"), "helpers.rs").unwrap();
    sb.create_file(&path("Src/new.rs"), b"// new").unwrap();
    sb.delete(&path("Docs/guide.md")).unwrap();
    sb.rename(&path("Docs"), "Notes").unwrap();
    assert_clean(&sb);

    // Summaries sort by path: deletes under their committed path, the rest
    // under their working path.
    let changes = sb.pending_changes().unwrap();
    let listed: Vec<(ChangeKind, String)> = changes
        .iter()
        .map(|c| {
            let at = c.destination.as_ref().or(c.source.as_ref()).unwrap();
            (c.kind, at.to_string())
        })
        .collect();
    assert_eq!(
        listed,
        vec![
            (ChangeKind::Delete, "Docs/guide.md".to_owned()),
            (ChangeKind::Rename, "Notes".to_owned()),
            (ChangeKind::Rename, "Src/helpers.rs".to_owned()),
            (ChangeKind::Edit, "Src/main.rs".to_owned()),
            (ChangeKind::Add, "Src/new.rs".to_owned()),
        ]
    );

    // Two reads of the same state serialize identically.
    let first = sb.changes_json().unwrap();
    let second = sb.changes_json().unwrap();
    assert_eq!(first, second);
    assert!(first.contains("\"kind\": \"delete\""), "got: {first}");

    sb.commit_all().unwrap();
    assert_clean(&sb);

    let view = sb.changes();
    view.assert_total_items(0).unwrap();
    view.assert_file(&path("Src/main.rs"), b"fn main() { run() }", false)
        .unwrap();
    view.assert_file(&path("Src/helpers.rs"), b"pub fn util() {}", false)
        .unwrap();
    view.assert_file(&path("Src/new.rs"), b"// new", false).unwrap();
    view.assert_folder(&path("Notes"), 0).unwrap();
    assert!(sb.item_at(&path("Src/util.rs")).is_none());
    assert!(sb.item_at(&path("Docs")).is_none());
}

// ==========================================================================
// Nested adds
// ==========================================================================

#[test]
fn leaf_commit_pulls_in_uncommitted_ancestors() {
    let mut sb = Sandbox::new(MemoryTree::new());
    sb.create_folder(&path("A")).unwrap();
    sb.create_folder(&path("A/B")).unwrap();
    sb.create_file(&path("A/B/leaf.txt"), b"x").unwrap();

    sb.commit_path(&path("A/B/leaf.txt")).unwrap();
    assert_clean(&sb);

    let view = sb.changes();
    view.assert_total_items(0).unwrap();
    view.assert_file(&path("A/B/leaf.txt"), b"x", false).unwrap();
}

// ==========================================================================
// Folder delete cascade
// ==========================================================================

#[test]
fn folder_delete_cascades_and_child_rollback_revives_ancestors() {
    let mut sb = common::committed(
        &["Top", "Top/Mid"],
        &[("Top/Mid/deep.txt", b"deep"), ("Top/root.txt", b"r")],
    );

    sb.delete(&path("Top")).unwrap();
    assert_clean(&sb);

    let changes = sb.pending_changes().unwrap();
    let sources: Vec<String> = changes
        .iter()
        .map(|c| c.source.as_ref().unwrap().to_string())
        .collect();
    assert_eq!(sources, vec!["Top", "Top/Mid", "Top/Mid/deep.txt", "Top/root.txt"]);
    assert!(changes.iter().all(|c| c.kind == ChangeKind::Delete));

    // Undoing the deepest delete restores its deleted ancestors first.
    sb.rollback_path(&path("Top/Mid/deep.txt")).unwrap();
    assert_clean(&sb);

    let view = sb.changes();
    view.assert_total_items(1).unwrap();
    view.assert_deleted(&path("Top/root.txt")).unwrap();
    view.assert_file(&path("Top/Mid/deep.txt"), b"deep", false).unwrap();
    view.assert_folder(&path("Top"), 1).unwrap();

    sb.rollback_path(&path("Top/root.txt")).unwrap();
    assert_clean(&sb);
    sb.changes().assert_total_items(0).unwrap();
    sb.changes().assert_folder(&path("Top"), 2).unwrap();
    sb.changes().assert_file(&path("Top/root.txt"), b"r", false).unwrap();
}

// ==========================================================================
// Unversioned files
// ==========================================================================

#[test]
fn unversioned_create_schedule_then_commit() {
    let config = SandboxConfig {
        schedule_created_files: false,
        ..SandboxConfig::default()
    };
    let mut sb = Sandbox::with_config(MemoryTree::new(), config);

    sb.create_file(&path("notes.txt"), b"n").unwrap();
    assert_clean(&sb);
    sb.changes().assert_unversioned(&path("notes.txt")).unwrap();

    // Unversioned entries are not commit candidates.
    let err = sb.commit_path(&path("notes.txt")).unwrap_err();
    assert!(matches!(err, EngineError::ConflictingChange { .. }), "got: {err}");

    sb.schedule_for_addition(&path("notes.txt")).unwrap();
    sb.changes()
        .assert_scheduled_for_addition(&path("notes.txt"))
        .unwrap();

    sb.commit_path(&path("notes.txt")).unwrap();
    assert_clean(&sb);
    sb.changes().assert_total_items(0).unwrap();
    sb.changes().assert_file(&path("notes.txt"), b"n", false).unwrap();
}

// ==========================================================================
// Rename chains
// ==========================================================================

#[test]
fn rename_chain_is_one_record_and_cancels_on_return() {
    let mut sb = common::committed(&[], &[("a.txt", b"A")]);

    sb.rename(&path("a.txt"), "b.txt").unwrap();
    sb.rename(&path("b.txt"), "c.txt").unwrap();
    assert_clean(&sb);

    let view = sb.changes();
    view.assert_total_items(1).unwrap();
    view.assert_renamed_or_moved(&path("a.txt"), &path("c.txt")).unwrap();

    sb.rename(&path("c.txt"), "a.txt").unwrap();
    assert_clean(&sb);
    sb.changes().assert_total_items(0).unwrap();
    sb.changes().assert_file(&path("a.txt"), b"A", false).unwrap();
}

// ==========================================================================
// Disk-backed tree
// ==========================================================================

#[test]
fn disk_tree_runs_the_same_lifecycle() {
    let dir = tempfile::tempdir().expect("tempdir");
    let mut sb = Sandbox::new(DiskTree::new(dir.path()));

    sb.create_folder(&path("src")).unwrap();
    sb.create_file(&path("src/lib.rs"), b"pub fn x() {}").unwrap();
    sb.commit_all().unwrap();
    assert_clean(&sb);

    let on_disk = dir.path().join("src").join("lib.rs");
    assert!(
        std::fs::metadata(&on_disk).unwrap().permissions().readonly(),
        "committed file should be read-only on disk"
    );

    sb.edit(&path("src/lib.rs"), b"pub fn y() {}").unwrap();
    assert!(!std::fs::metadata(&on_disk).unwrap().permissions().readonly());
    assert_eq!(std::fs::read(&on_disk).unwrap(), b"pub fn y() {}");

    sb.rollback_path(&path("src/lib.rs")).unwrap();
    assert_clean(&sb);
    assert_eq!(std::fs::read(&on_disk).unwrap(), b"pub fn x() {}");
    assert!(std::fs::metadata(&on_disk).unwrap().permissions().readonly());

    sb.rename(&path("src/lib.rs"), "mod.rs").unwrap();
    assert!(dir.path().join("src").join("mod.rs").exists());
    assert!(!on_disk.exists());
    sb.commit_all().unwrap();
    assert_clean(&sb);
    sb.changes().assert_file(&path("src/mod.rs"), b"pub fn x() {}", false)
        .unwrap();
}
