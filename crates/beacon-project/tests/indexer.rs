use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use beacon_build_model::{PathKind, TargetKind};
use beacon_project::{
    BlobStore, DiscoveryCache, DiscoveryEvent, DiscoveryOptions, ManualClock, MemoryBlobStore,
    ProjectIndexer,
};
use tokio::sync::mpsc::UnboundedReceiver;

fn write_file(path: &Path, contents: &[u8]) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}

async fn drain_to_finished(mut rx: UnboundedReceiver<DiscoveryEvent>) -> Vec<DiscoveryEvent> {
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

#[tokio::test]
async fn construction_seeds_instant_results_from_the_cross_session_cache() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_file(&root.join("modules/core/Package.swift"), b"// manifest");

    let store: Arc<MemoryBlobStore> = Arc::new(MemoryBlobStore::new());
    let clock = ManualClock::default();

    // A previous session persisted one candidate.
    let seeder = DiscoveryCache::with_limits(
        Arc::clone(&store) as Arc<dyn BlobStore>,
        Arc::new(clock.clone()),
        10,
        Duration::from_millis(1),
    );
    seeder.save(
        root,
        vec![beacon_build_model::CandidatePath::new(
            root.join("modules/core/Package.swift"),
        )],
        Vec::new(),
        None,
    );
    tokio::time::sleep(Duration::from_millis(30)).await;

    let indexer = ProjectIndexer::with_clock(
        root,
        Arc::clone(&store) as Arc<dyn BlobStore>,
        Arc::new(clock),
        DiscoveryOptions::default(),
    );

    // No refresh has run, yet the candidate is already there.
    let candidates = indexer.candidates();
    assert_eq!(candidates.len(), 1);
    assert_eq!(candidates[0].kind, PathKind::PackageManifest);
    assert!(!indexer.is_loading(PathKind::PackageManifest));
}

#[tokio::test]
async fn refresh_is_single_flight_and_updates_state() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write_file(&root.join("App.xcworkspace/contents.xcworkspacedata"), b"<Workspace/>");
    write_file(&root.join("modules/core/BUILD"), b"swift_library(name = \"core\")");

    let store: Arc<MemoryBlobStore> = Arc::new(MemoryBlobStore::new());
    let indexer = ProjectIndexer::new(root, Arc::clone(&store) as Arc<dyn BlobStore>);

    let rx = indexer.refresh().expect("first refresh starts a run");
    // Loading flags flip on before any event is consumed.
    assert!(indexer.is_loading(PathKind::Workspace));
    // A re-entrant refresh while one is in flight is a no-op.
    assert!(indexer.refresh().is_none());

    let events = drain_to_finished(rx).await;
    assert_eq!(events.last(), Some(&DiscoveryEvent::Finished));

    let candidates = indexer.candidates();
    assert_eq!(candidates.len(), 2);
    // Relevance order: the workspace bundle outranks the nested build file.
    assert_eq!(candidates[0].kind, PathKind::Workspace);
    for kind in PathKind::ALL {
        assert!(!indexer.is_loading(kind), "{kind:?} must be complete");
    }

    // Once the walk finished, a new refresh is allowed again.
    let rx = indexer.refresh().expect("refresh after completion");
    drain_to_finished(rx).await;

    // The discovered set is persisted (debounced).
    tokio::time::sleep(Duration::from_millis(700)).await;
    assert!(store.write_count() >= 1, "expected a persisted discovery cache");
}

#[tokio::test]
async fn package_queries_are_memoized_until_ttl_or_invalidation() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    let build_file = root.join("modules/core/BUILD");
    write_file(&build_file, b"swift_library(name = \"core\")");

    let store: Arc<MemoryBlobStore> = Arc::new(MemoryBlobStore::new());
    let clock = ManualClock::default();
    let indexer = ProjectIndexer::with_clock(
        root,
        Arc::clone(&store) as Arc<dyn BlobStore>,
        Arc::new(clock.clone()),
        DiscoveryOptions::default(),
    );

    let package = indexer.package_for(&build_file).expect("package");
    assert_eq!(package.targets.len(), 1);
    assert_eq!(package.targets[0].name, "core");
    assert_eq!(package.targets[0].kind, TargetKind::Library);

    // An edit within the TTL window is not visible yet.
    write_file(&build_file, b"swift_library(name = \"renamed\")");
    let cached = indexer.package_for(&build_file).expect("cached package");
    assert_eq!(cached.targets[0].name, "core");

    // TTL expiry picks up the edit.
    clock.advance(Duration::from_secs(31));
    let reparsed = indexer.package_for(&build_file).expect("reparsed package");
    assert_eq!(reparsed.targets[0].name, "renamed");

    // Explicit invalidation does the same without waiting.
    write_file(&build_file, b"swift_library(name = \"again\")");
    indexer.invalidate_parses();
    let reparsed = indexer.package_for(&build_file).expect("reparsed package");
    assert_eq!(reparsed.targets[0].name, "again");
}

#[tokio::test]
async fn missing_files_are_no_package_and_cached_as_such() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    let store: Arc<MemoryBlobStore> = Arc::new(MemoryBlobStore::new());
    let indexer = ProjectIndexer::new(root, Arc::clone(&store) as Arc<dyn BlobStore>);

    let missing = root.join("gone/BUILD");
    assert!(indexer.package_for(&missing).is_none());
    // Creating the file within the TTL window doesn't resurrect it: the
    // negative result is cached exactly like a positive one.
    write_file(&missing, b"swift_library(name = \"late\")");
    assert!(indexer.package_for(&missing).is_none());
}

#[tokio::test]
async fn recent_paths_are_capped_and_most_recent_first() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();

    let store: Arc<MemoryBlobStore> = Arc::new(MemoryBlobStore::new());
    let indexer = ProjectIndexer::new(root, Arc::clone(&store) as Arc<dyn BlobStore>);

    for name in ["a", "b", "c", "d", "e", "f"] {
        indexer.mark_recent(&root.join(name).join("Package.swift"));
    }
    // Re-marking moves an entry back to the front without duplicating it.
    indexer.mark_recent(&root.join("d/Package.swift"));

    let recents = indexer.recent_paths();
    assert_eq!(recents.len(), 5);
    assert_eq!(recents[0].path, root.join("d/Package.swift"));
    assert_eq!(
        recents
            .iter()
            .filter(|recent| recent.path == root.join("d/Package.swift"))
            .count(),
        1
    );
}
