//! Background discovery of build-description files.
//!
//! One sub-search per (category, filename pattern) runs on the blocking pool
//! and walks the tree breadth-first per level, so shallow candidates — the
//! ones relevance scoring favors — surface first. Matches stream to the
//! caller immediately; nothing waits for the full walk.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use beacon_build_model::{classify, CandidatePath, PathKind};
use tokio::sync::mpsc::{self, UnboundedSender};
use tokio_util::sync::CancellationToken;

/// A category still in flight after this long is forcibly marked complete.
/// Only bookkeeping is terminated; in-flight filesystem I/O finishes on its
/// own (workers cooperate via cancellation tokens, they are never killed).
pub const CATEGORY_SAFETY_TIMEOUT: Duration = Duration::from_secs(15);

/// Directory names never worth descending into: dependency managers, build
/// artifacts, VCS internals.
const EXCLUDED_DIR_NAMES: [&str; 10] = [
    ".git",
    ".build",
    ".swiftpm",
    "node_modules",
    "Pods",
    "Carthage",
    "DerivedData",
    "vendor",
    "build",
    "target",
];

/// Filename patterns per category. `SecondaryBuildFile` fans out into two
/// independent sub-searches sharing one result cap.
const SUB_SEARCHES: [(PathKind, &str); 5] = [
    (PathKind::Workspace, "contents.xcworkspacedata"),
    (PathKind::PackageManifest, "Package.swift"),
    (PathKind::SecondaryBuildFile, "BUILD"),
    (PathKind::SecondaryBuildFile, "BUILD.bazel"),
    (PathKind::Other, "project.pbxproj"),
];

/// Per-category result caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryCaps {
    pub workspace: usize,
    pub package_manifest: usize,
    pub secondary_build_file: usize,
    pub other: usize,
}

impl CategoryCaps {
    pub fn uniform(cap: usize) -> Self {
        Self {
            workspace: cap,
            package_manifest: cap,
            secondary_build_file: cap,
            other: cap,
        }
    }

    pub fn for_kind(&self, kind: PathKind) -> usize {
        match kind {
            PathKind::Workspace => self.workspace,
            PathKind::PackageManifest => self.package_manifest,
            PathKind::SecondaryBuildFile => self.secondary_build_file,
            PathKind::Other => self.other,
        }
    }
}

impl Default for CategoryCaps {
    fn default() -> Self {
        Self {
            workspace: 10,
            package_manifest: 40,
            secondary_build_file: 60,
            other: 10,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DiscoveryOptions {
    /// Maximum directory depth below the project root.
    pub max_depth: usize,
    pub caps: CategoryCaps,
    /// Directory-name segments to skip, in addition to `bazel-*` output
    /// trees which are always skipped.
    pub excluded_dirs: Vec<String>,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            max_depth: 8,
            caps: CategoryCaps::default(),
            excluded_dirs: EXCLUDED_DIR_NAMES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Streamed notifications from a discovery run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiscoveryEvent {
    /// A screened match, emitted as soon as it is found.
    Candidate(CandidatePath),
    /// All of this category's sub-searches finished (or timed out).
    CategoryComplete(PathKind),
    /// Every category completed.
    Finished,
}

/// Start a discovery run. Events arrive on the returned channel; dropping
/// the receiver stops the walk cooperatively.
///
/// Must be called from within a tokio runtime.
pub fn spawn_discovery(
    root: PathBuf,
    options: DiscoveryOptions,
    token: CancellationToken,
) -> mpsc::UnboundedReceiver<DiscoveryEvent> {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(run_discovery(root, options, token, tx));
    rx
}

async fn run_discovery(
    root: PathBuf,
    options: DiscoveryOptions,
    token: CancellationToken,
    tx: UnboundedSender<DiscoveryEvent>,
) {
    let options = Arc::new(options);
    let mut categories = Vec::new();

    for kind in PathKind::ALL {
        let cap = options.caps.for_kind(kind);
        let counter = Arc::new(AtomicUsize::new(0));
        let category_token = token.child_token();

        let mut workers = Vec::new();
        for &(_, file_name) in SUB_SEARCHES.iter().filter(|(k, _)| *k == kind) {
            let root = root.clone();
            let options = Arc::clone(&options);
            let counter = Arc::clone(&counter);
            let tx = tx.clone();
            let walk_token = category_token.clone();
            workers.push(tokio::task::spawn_blocking(move || {
                walk_sub_search(&root, kind, file_name, cap, &counter, &options, &tx, &walk_token);
            }));
        }

        let tx = tx.clone();
        categories.push(tokio::spawn(async move {
            let all_done = async {
                for worker in workers {
                    let _ = worker.await;
                }
            };
            if tokio::time::timeout(CATEGORY_SAFETY_TIMEOUT, all_done)
                .await
                .is_err()
            {
                tracing::warn!(
                    target: "beacon.project",
                    kind = ?kind,
                    "discovery category exceeded safety timeout; forcing completion"
                );
                category_token.cancel();
            }
            let _ = tx.send(DiscoveryEvent::CategoryComplete(kind));
        }));
    }

    for category in categories {
        let _ = category.await;
    }
    let _ = tx.send(DiscoveryEvent::Finished);
}

/// One blocking breadth-first walk matching a single filename pattern.
#[allow(clippy::too_many_arguments)]
fn walk_sub_search(
    root: &Path,
    kind: PathKind,
    file_name: &str,
    cap: usize,
    counter: &AtomicUsize,
    options: &DiscoveryOptions,
    tx: &UnboundedSender<DiscoveryEvent>,
    token: &CancellationToken,
) {
    let mut queue = VecDeque::new();
    queue.push_back((root.to_path_buf(), 0usize));

    while let Some((dir, depth)) = queue.pop_front() {
        if token.is_cancelled() || counter.load(Ordering::SeqCst) >= cap {
            return;
        }

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(err) => {
                tracing::debug!(
                    target: "beacon.project",
                    dir = %dir.display(),
                    error = %err,
                    "failed to list directory during discovery; skipping subtree"
                );
                continue;
            }
        };

        for entry in entries.flatten() {
            if token.is_cancelled() {
                return;
            }

            let path = entry.path();
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            let entry_name = entry.file_name();
            let entry_name = entry_name.to_string_lossy();

            if file_type.is_dir() {
                // `file_type()` reports symlinks as symlinks, not
                // directories, so symlink cycles are never followed.
                if depth + 1 > options.max_depth
                    || is_excluded_dir_name(&entry_name, &options.excluded_dirs)
                {
                    continue;
                }
                if counter.load(Ordering::SeqCst) < cap {
                    queue.push_back((path, depth + 1));
                }
                continue;
            }

            if entry_name != file_name || !accept_candidate(root, &path, kind, options) {
                continue;
            }

            let previous = counter.fetch_add(1, Ordering::SeqCst);
            if previous >= cap {
                return;
            }
            if tx
                .send(DiscoveryEvent::Candidate(CandidatePath {
                    path,
                    kind,
                }))
                .is_err()
            {
                // Receiver dropped; nobody is listening anymore.
                return;
            }
            if previous + 1 >= cap {
                return;
            }
        }
    }
}

fn is_excluded_dir_name(name: &str, excluded: &[String]) -> bool {
    // Bazel output trees (`bazel-out`, `bazel-bin`, `bazel-<workspace>`, …)
    // sit at the workspace root and can be enormous.
    name.starts_with("bazel-") || excluded.iter().any(|ex| ex == name)
}

/// Screen a matched path before emitting it.
///
/// Applies independently of the walk itself, so cached/legacy entries can be
/// re-screened with the same predicate.
fn accept_candidate(root: &Path, path: &Path, kind: PathKind, options: &DiscoveryOptions) -> bool {
    let Ok(rel) = path.strip_prefix(root) else {
        return false;
    };

    if rel.components().count() > options.max_depth + 1 {
        return false;
    }
    let under_excluded_dir = rel.components().rev().skip(1).any(|component| {
        let segment = component.as_os_str().to_string_lossy();
        is_excluded_dir_name(&segment, &options.excluded_dirs)
    });
    if under_excluded_dir {
        return false;
    }

    match kind {
        // Only the canonical nested form counts; anything else is a
        // duplicate representation of the same project.
        PathKind::Workspace => classify(path) == PathKind::Workspace,
        PathKind::Other => path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(".xcodeproj")),
        // Purely numeric or very short directory names are low-signal
        // (generated shards, versioned output dirs).
        PathKind::SecondaryBuildFile => path
            .parent()
            .and_then(|p| p.file_name())
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.len() >= 3 && !n.bytes().all(|b| b.is_ascii_digit())),
        PathKind::PackageManifest => true,
    }
}
