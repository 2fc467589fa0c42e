use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use beacon_build_model::{package_for_file, BuildPackage, CandidatePath, PathKind};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::clock::{Clock, SystemClock};
use crate::discover::{self, DiscoveryEvent, DiscoveryOptions};
use crate::discovery_cache::DiscoveryCache;
use crate::parse_cache::ParseCache;
use crate::score;
use crate::store::BlobStore;

const MAX_RECENT_PATHS: usize = 5;

#[derive(Default)]
struct IndexState {
    candidates: Vec<CandidatePath>,
    recents: Vec<CandidatePath>,
    selected: Option<PathBuf>,
    loading: HashMap<PathKind, bool>,
}

/// The single logical owner of build-description indexing for one project
/// root.
///
/// Construction seeds the candidate set from the cross-session cache, so the
/// first query answers instantly; [`ProjectIndexer::refresh`] then runs the
/// discovery walk in the background and streams updates. Individual files
/// are parsed lazily, on demand, through the per-file parse cache.
///
/// Requires a tokio runtime for `refresh` and debounced persistence.
pub struct ProjectIndexer {
    root: PathBuf,
    options: DiscoveryOptions,
    parse_cache: ParseCache,
    discovery_cache: DiscoveryCache,
    state: Arc<Mutex<IndexState>>,
    in_flight: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl ProjectIndexer {
    pub fn new(root: impl Into<PathBuf>, store: Arc<dyn BlobStore>) -> Self {
        Self::with_clock(root, store, Arc::new(SystemClock), DiscoveryOptions::default())
    }

    pub fn with_clock(
        root: impl Into<PathBuf>,
        store: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
        options: DiscoveryOptions,
    ) -> Self {
        let root = root.into();
        let parse_cache = ParseCache::new(Arc::clone(&clock));
        let discovery_cache = DiscoveryCache::new(store, clock);

        let mut state = IndexState::default();
        if let Some(entry) = discovery_cache.load(&root, None) {
            tracing::debug!(
                target: "beacon.project",
                root = %root.display(),
                count = entry.candidate_paths.len(),
                "seeded candidates from discovery cache"
            );
            state.candidates = entry.candidate_paths;
            state.recents = entry.recent_paths;
        }

        Self {
            root,
            options,
            parse_cache,
            discovery_cache,
            state: Arc::new(Mutex::new(state)),
            in_flight: Arc::new(AtomicBool::new(false)),
            cancel: CancellationToken::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Current candidate snapshot, most relevant first.
    pub fn candidates(&self) -> Vec<CandidatePath> {
        self.state.lock().candidates.clone()
    }

    pub fn candidates_for(&self, kind: PathKind) -> Vec<CandidatePath> {
        self.state
            .lock()
            .candidates
            .iter()
            .filter(|candidate| candidate.kind == kind)
            .cloned()
            .collect()
    }

    pub fn recent_paths(&self) -> Vec<CandidatePath> {
        self.state.lock().recents.clone()
    }

    /// Record a candidate the user acted on; persisted with the next save.
    pub fn mark_recent(&self, path: &Path) {
        let (candidates, recents, selected) = {
            let mut state = self.state.lock();
            let candidate = state
                .candidates
                .iter()
                .find(|candidate| candidate.path == path)
                .cloned()
                .unwrap_or_else(|| CandidatePath::new(path));
            state.recents.retain(|recent| recent.path != path);
            state.recents.insert(0, candidate);
            state.recents.truncate(MAX_RECENT_PATHS);
            (
                state.candidates.clone(),
                state.recents.clone(),
                state.selected.clone(),
            )
        };
        self.discovery_cache
            .save(&self.root, candidates, recents, selected.as_deref());
    }

    /// Only used as a scoring input; `None` clears the selection.
    pub fn set_selected_project(&self, selected: Option<PathBuf>) {
        self.state.lock().selected = selected;
    }

    /// Whether a category's scan is still in flight.
    pub fn is_loading(&self, kind: PathKind) -> bool {
        self.state
            .lock()
            .loading
            .get(&kind)
            .copied()
            .unwrap_or(false)
    }

    /// Parse one build-description file, memoized through the parse cache.
    ///
    /// `None` means "no package here" (unreadable or suspicious file) and is
    /// itself cached.
    pub fn package_for(&self, file: &Path) -> Option<BuildPackage> {
        if let Some(cached) = self.parse_cache.get(file) {
            return cached;
        }
        let parsed = package_for_file(file);
        self.parse_cache.put(file, parsed.clone());
        parsed
    }

    /// Data-changed hook: drop memoized parses so the next query re-reads.
    pub fn invalidate_parses(&self) {
        self.parse_cache.clear();
    }

    /// Start a background discovery run and stream its events.
    ///
    /// Returns `None` when a run is already in flight for this root — a
    /// re-entrant refresh is a no-op, never a second walk.
    pub fn refresh(&self) -> Option<mpsc::UnboundedReceiver<DiscoveryEvent>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(
                target: "beacon.project",
                root = %self.root.display(),
                "discovery already in flight; refresh is a no-op"
            );
            return None;
        }

        {
            let mut state = self.state.lock();
            for kind in PathKind::ALL {
                state.loading.insert(kind, true);
            }
        }

        let mut walk_rx = discover::spawn_discovery(
            self.root.clone(),
            self.options.clone(),
            self.cancel.child_token(),
        );

        let (tx, rx) = mpsc::unbounded_channel();
        let state = Arc::clone(&self.state);
        let in_flight = Arc::clone(&self.in_flight);
        let discovery_cache = self.discovery_cache.clone();
        let root = self.root.clone();

        tokio::spawn(async move {
            while let Some(event) = walk_rx.recv().await {
                match &event {
                    DiscoveryEvent::Candidate(candidate) => {
                        let mut state = state.lock();
                        if !state
                            .candidates
                            .iter()
                            .any(|existing| existing.path == candidate.path)
                        {
                            state.candidates.push(candidate.clone());
                        }
                    }
                    DiscoveryEvent::CategoryComplete(kind) => {
                        state.lock().loading.insert(*kind, false);
                    }
                    DiscoveryEvent::Finished => {
                        let (candidates, recents, selected) = {
                            let mut state = state.lock();
                            // Alphabetical by display name first, so the
                            // relevance sort breaks ties predictably.
                            state.candidates.sort_by_key(|c| c.display_name());
                            let selected = state.selected.clone();
                            score::prioritize(&mut state.candidates, &root, selected.as_deref());
                            (
                                state.candidates.clone(),
                                state.recents.clone(),
                                selected,
                            )
                        };
                        discovery_cache.save(&root, candidates, recents, selected.as_deref());
                        in_flight.store(false, Ordering::Release);
                    }
                }
                // The caller may have stopped listening; state above is
                // already updated either way.
                let _ = tx.send(event);
            }
            in_flight.store(false, Ordering::Release);
        });

        Some(rx)
    }
}

impl Drop for ProjectIndexer {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}
