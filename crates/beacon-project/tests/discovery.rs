use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use beacon_build_model::PathKind;
use beacon_project::{
    spawn_discovery, CategoryCaps, DiscoveryEvent, DiscoveryOptions,
};
use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

fn write_file(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

async fn collect_events(mut rx: UnboundedReceiver<DiscoveryEvent>) -> Vec<DiscoveryEvent> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        let finished = event == DiscoveryEvent::Finished;
        events.push(event);
        if finished {
            break;
        }
    }
    events
}

fn candidate_paths(events: &[DiscoveryEvent]) -> BTreeSet<PathBuf> {
    events
        .iter()
        .filter_map(|event| match event {
            DiscoveryEvent::Candidate(candidate) => Some(candidate.path.clone()),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn walk_finds_all_categories_and_screens_duplicates() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write_file(&root.join("App.xcworkspace/contents.xcworkspacedata"), b"<Workspace/>");
    write_file(&root.join("App.xcodeproj/project.pbxproj"), b"// !$*UTF8*$!");
    // The embedded workspace duplicates the project; it must be screened out.
    write_file(
        &root.join("App.xcodeproj/project.xcworkspace/contents.xcworkspacedata"),
        b"<Workspace/>",
    );
    write_file(&root.join("modules/core/Package.swift"), b"// manifest");
    write_file(&root.join("modules/core/BUILD"), b"swift_library(name = \"core\")");
    write_file(&root.join("modules/shared/BUILD.bazel"), b"swift_library(name = \"shared\")");
    // Excluded subtrees.
    write_file(&root.join("Pods/Dep/Package.swift"), b"// vendored");
    write_file(&root.join("bazel-out/gen/BUILD"), b"# generated");
    write_file(&root.join("node_modules/pkg/BUILD"), b"# vendored");
    // Low-signal parents for secondary build files.
    write_file(&root.join("modules/1234/BUILD"), b"# shard");
    write_file(&root.join("modules/ab/BUILD"), b"# short");

    let events = collect_events(spawn_discovery(
        root.to_path_buf(),
        DiscoveryOptions::default(),
        CancellationToken::new(),
    ))
    .await;

    let expected: BTreeSet<PathBuf> = [
        root.join("App.xcworkspace/contents.xcworkspacedata"),
        root.join("App.xcodeproj/project.pbxproj"),
        root.join("modules/core/Package.swift"),
        root.join("modules/core/BUILD"),
        root.join("modules/shared/BUILD.bazel"),
    ]
    .into_iter()
    .collect();
    assert_eq!(candidate_paths(&events), expected);

    // Every category completes exactly once, and only after its candidates.
    for kind in PathKind::ALL {
        let completions = events
            .iter()
            .filter(|event| **event == DiscoveryEvent::CategoryComplete(kind))
            .count();
        assert_eq!(completions, 1, "expected one completion for {kind:?}");

        let complete_at = events
            .iter()
            .position(|event| *event == DiscoveryEvent::CategoryComplete(kind))
            .unwrap();
        let last_candidate = events
            .iter()
            .rposition(|event| matches!(event, DiscoveryEvent::Candidate(c) if c.kind == kind));
        if let Some(last_candidate) = last_candidate {
            assert!(
                last_candidate < complete_at,
                "candidates for {kind:?} must stream before its completion"
            );
        }
    }

    assert_eq!(events.last(), Some(&DiscoveryEvent::Finished));
}

#[tokio::test]
async fn category_cap_limits_results_to_shallowest_matches() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    // Five manifests; the two direct children outrank the deep ones.
    write_file(&root.join("alpha/Package.swift"), b"// a");
    write_file(&root.join("beta/Package.swift"), b"// b");
    write_file(&root.join("deep/one/Package.swift"), b"// c");
    write_file(&root.join("deep/two/Package.swift"), b"// d");
    write_file(&root.join("deep/three/nested/Package.swift"), b"// e");

    let options = DiscoveryOptions {
        caps: CategoryCaps::uniform(2),
        ..DiscoveryOptions::default()
    };
    let events = collect_events(spawn_discovery(
        root.to_path_buf(),
        options,
        CancellationToken::new(),
    ))
    .await;

    let found = candidate_paths(&events);
    let expected: BTreeSet<PathBuf> = [
        root.join("alpha/Package.swift"),
        root.join("beta/Package.swift"),
    ]
    .into_iter()
    .collect();
    assert_eq!(found, expected, "cap must keep the two shallowest manifests");

    // The capped category still signals completion.
    assert!(events.contains(&DiscoveryEvent::CategoryComplete(PathKind::PackageManifest)));
    assert_eq!(events.last(), Some(&DiscoveryEvent::Finished));
}

#[tokio::test]
async fn depth_bound_prunes_nested_trees() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write_file(&root.join("shallow/Package.swift"), b"// in range");
    write_file(&root.join("a/b/c/Package.swift"), b"// out of range");

    let options = DiscoveryOptions {
        max_depth: 2,
        ..DiscoveryOptions::default()
    };
    let events = collect_events(spawn_discovery(
        root.to_path_buf(),
        options,
        CancellationToken::new(),
    ))
    .await;

    let expected: BTreeSet<PathBuf> = [root.join("shallow/Package.swift")].into_iter().collect();
    assert_eq!(candidate_paths(&events), expected);
}

#[tokio::test]
async fn unreadable_subtrees_are_skipped_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    write_file(&root.join("ok/Package.swift"), b"// fine");
    let missing_root = root.join("does-not-exist");

    // Walking a root that disappears entirely still completes cleanly.
    let events = collect_events(spawn_discovery(
        missing_root,
        DiscoveryOptions::default(),
        CancellationToken::new(),
    ))
    .await;
    assert!(candidate_paths(&events).is_empty());
    assert_eq!(events.last(), Some(&DiscoveryEvent::Finished));
}
