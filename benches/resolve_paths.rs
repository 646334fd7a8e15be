//! Path resolution benchmarks.
//!
//! Measures working-path resolution and lookup over deep folder chains with
//! a pending rename at every level — the worst case for id-anchored
//! records, since every segment on the way up is overridden.
//!
//! # Running
//!
//! ```bash
//! cargo bench --bench resolve_paths
//! # With a custom filter:
//! cargo bench --bench resolve_paths -- working_path
//! ```

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use pendulum::{ItemId, ItemName, MemoryTree, Sandbox, SandboxPath, resolve};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// The committed path of chain level `i` (inclusive).
fn original_prefix(i: usize) -> SandboxPath {
    let mut at = SandboxPath::root();
    for level in 0..=i {
        at = at.join(&ItemName::new(&format!("dir{level}")).expect("name"));
    }
    at
}

/// Build a committed chain of `depth` folders with a file at the bottom,
/// then rename every folder. Returns the sandbox and the file's id.
fn renamed_chain(depth: usize) -> (Sandbox<MemoryTree>, ItemId) {
    let mut sb = Sandbox::new(MemoryTree::new());
    for i in 0..depth {
        sb.create_folder(&original_prefix(i)).expect("create folder");
    }
    let file = original_prefix(depth - 1).join(&ItemName::new("leaf.txt").expect("name"));
    sb.create_file(&file, b"leaf").expect("create file");
    sb.commit_all().expect("commit");
    let id = sb.item_at(&file).expect("leaf id");

    // Deepest first, so each rename resolves through unrenamed ancestors.
    for i in (0..depth).rev() {
        sb.rename(&original_prefix(i), &format!("moved{i}"))
            .expect("rename");
    }
    (sb, id)
}

/// A flat sandbox with `n` committed files, all renamed.
fn renamed_files(n: usize) -> Sandbox<MemoryTree> {
    let mut sb = Sandbox::new(MemoryTree::new());
    for i in 0..n {
        let at = SandboxPath::parse(&format!("file{i}.txt")).expect("path");
        sb.create_file(&at, b"x").expect("create file");
    }
    sb.commit_all().expect("commit");
    for i in 0..n {
        let at = SandboxPath::parse(&format!("file{i}.txt")).expect("path");
        sb.rename(&at, &format!("renamed{i}.txt")).expect("rename");
    }
    sb
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_working_path(c: &mut Criterion) {
    let mut group = c.benchmark_group("working_path");
    for depth in [4_usize, 16, 64] {
        let (sb, id) = renamed_chain(depth);
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| resolve::working_path(sb.table(), sb.store(), id).expect("resolve"));
        });
    }
    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");
    for depth in [4_usize, 16, 64] {
        let (sb, id) = renamed_chain(depth);
        let at = resolve::working_path(sb.table(), sb.store(), id).expect("resolve");
        group.bench_with_input(BenchmarkId::from_parameter(depth), &depth, |b, _| {
            b.iter(|| resolve::lookup(sb.table(), sb.store(), &at));
        });
    }
    group.finish();
}

fn bench_pending_changes(c: &mut Criterion) {
    let mut group = c.benchmark_group("pending_changes");
    for n in [16_usize, 128] {
        let sb = renamed_files(n);
        group.bench_with_input(BenchmarkId::from_parameter(n), &n, |b, _| {
            b.iter(|| sb.pending_changes().expect("summaries"));
        });
    }
    group.finish();
}

criterion_group!(benches, bench_working_path, bench_lookup, bench_pending_changes);
criterion_main!(benches);
