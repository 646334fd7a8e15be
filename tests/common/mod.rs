//! Shared helpers for pendulum integration tests.
//!
//! Every test builds its own in-memory sandbox — no shared state. The
//! scenario driver [`run_in_each_order`] re-runs a step list in several
//! orders so commit and rollback ordering claims are checked rather than
//! assumed.

#![allow(dead_code)]

use pendulum::{MemoryTree, Sandbox, SandboxPath, WorkTree};

/// Parse a sandbox path, panicking on bad test input.
pub fn path(s: &str) -> SandboxPath {
    SandboxPath::parse(s).expect("test path")
}

/// Build a sandbox with the given folders and files already committed.
///
/// Folders are created in the order given, so parents must precede
/// children. Files end up read-only with the given bytes as their
/// committed baseline.
pub fn committed(folders: &[&str], files: &[(&str, &[u8])]) -> Sandbox<MemoryTree> {
    let mut sb = Sandbox::new(MemoryTree::new());
    for folder in folders {
        sb.create_folder(&path(folder)).expect("create folder");
    }
    for (file, bytes) in files {
        sb.create_file(&path(file), bytes).expect("create file");
    }
    sb.commit_all().expect("commit fixture");
    sb
}

/// Assert the record store, item table, and working tree agree.
pub fn assert_clean<T: WorkTree>(sb: &Sandbox<T>) {
    let issues = sb.verify_consistency();
    assert!(issues.is_empty(), "sandbox inconsistent: {issues:?}");
}

/// One step of a scenario: a mutation applied to the sandbox.
pub type Step = fn(&mut Sandbox<MemoryTree>);

/// Run `steps` against a fresh sandbox from `setup`, once per listed
/// order, then consistency-check and apply `check` to each outcome.
pub fn run_in_each_order(
    setup: impl Fn() -> Sandbox<MemoryTree>,
    steps: &[Step],
    orders: &[&[usize]],
    check: impl Fn(&Sandbox<MemoryTree>),
) {
    for order in orders {
        let mut sb = setup();
        for &i in *order {
            steps[i](&mut sb);
        }
        let issues = sb.verify_consistency();
        assert!(
            issues.is_empty(),
            "order {order:?} left the sandbox inconsistent: {issues:?}"
        );
        check(&sb);
    }
}
