use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use beacon_build_model::{classify, CandidatePath};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::clock::Clock;
use crate::score;
use crate::store::BlobStore;

/// Bumped whenever the persisted shape changes. A mismatch invalidates the
/// whole entry — full re-discovery, never partial migration.
pub const DISCOVERY_SCHEMA_VERSION: &str = "1.1.0";

/// Entries older than this are treated as absent.
pub const DISCOVERY_CACHE_MAX_AGE: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Upper bound on persisted candidate paths. Oversized legacy entries are
/// re-prioritized and truncated on load.
pub const DEFAULT_MAX_CANDIDATE_PATHS: usize = 200;

const DEFAULT_SAVE_DEBOUNCE: Duration = Duration::from_millis(500);

/// The persisted blob: the full discovered-path set plus a small "recent"
/// subset, validated by schema version, project root, and age.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryCacheEntry {
    pub schema_version: String,
    /// Unix seconds.
    pub created_at: u64,
    pub project_root: PathBuf,
    pub candidate_paths: Vec<CandidatePath>,
    pub recent_paths: Vec<CandidatePath>,
}

struct CacheInner {
    store: Arc<dyn BlobStore>,
    clock: Arc<dyn Clock>,
    max_paths: usize,
    debounce: Duration,
    pending_save: Mutex<Option<tokio::task::JoinHandle<()>>>,
}

/// Cross-session discovery cache for one project root.
///
/// Cheap to clone; clones share the debounce slot, so bursty save triggers
/// from any handle coalesce into one write.
#[derive(Clone)]
pub struct DiscoveryCache {
    inner: Arc<CacheInner>,
}

impl DiscoveryCache {
    pub fn new(store: Arc<dyn BlobStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_limits(store, clock, DEFAULT_MAX_CANDIDATE_PATHS, DEFAULT_SAVE_DEBOUNCE)
    }

    pub fn with_limits(
        store: Arc<dyn BlobStore>,
        clock: Arc<dyn Clock>,
        max_paths: usize,
        debounce: Duration,
    ) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                store,
                clock,
                max_paths,
                debounce,
                pending_save: Mutex::new(None),
            }),
        }
    }

    /// Load the persisted entry for `root`, or `None` when anything about it
    /// is off: missing, corrupt, schema-version mismatch, root mismatch, or
    /// age beyond [`DISCOVERY_CACHE_MAX_AGE`]. Corruption is treated exactly
    /// like a version mismatch.
    ///
    /// An oversized legacy entry self-heals: it is re-prioritized, truncated,
    /// returned in corrected form, and scheduled for an asynchronous resave.
    pub fn load(&self, root: &Path, selected: Option<&Path>) -> Option<DiscoveryCacheEntry> {
        let raw = self.inner.store.get(&cache_key(root))?;

        let mut entry: DiscoveryCacheEntry = match serde_json::from_str(&raw) {
            Ok(entry) => entry,
            Err(err) => {
                tracing::debug!(
                    target: "beacon.project",
                    root = %root.display(),
                    error = %err,
                    "corrupt discovery cache; treating as absent"
                );
                return None;
            }
        };

        if entry.schema_version != DISCOVERY_SCHEMA_VERSION {
            tracing::debug!(
                target: "beacon.project",
                root = %root.display(),
                found = %entry.schema_version,
                current = DISCOVERY_SCHEMA_VERSION,
                "discovery cache schema mismatch; treating as absent"
            );
            return None;
        }
        if entry.project_root != root {
            return None;
        }

        let now = self.unix_now();
        if now.saturating_sub(entry.created_at) > DISCOVERY_CACHE_MAX_AGE.as_secs() {
            tracing::debug!(
                target: "beacon.project",
                root = %root.display(),
                "discovery cache expired; treating as absent"
            );
            return None;
        }

        // Category is a pure function of the path; entries that disagree
        // with a recomputation were misrouted by an older writer.
        entry
            .candidate_paths
            .retain(|candidate| classify(&candidate.path) == candidate.kind);
        entry
            .recent_paths
            .retain(|candidate| classify(&candidate.path) == candidate.kind);

        if entry.candidate_paths.len() > self.inner.max_paths {
            tracing::debug!(
                target: "beacon.project",
                root = %root.display(),
                count = entry.candidate_paths.len(),
                max = self.inner.max_paths,
                "oversized discovery cache; truncating by relevance and rescheduling save"
            );
            entry.candidate_paths = score::truncate_by_relevance(
                std::mem::take(&mut entry.candidate_paths),
                self.inner.max_paths,
                root,
                selected,
            );
            self.save(
                root,
                entry.candidate_paths.clone(),
                entry.recent_paths.clone(),
                selected,
            );
        }

        Some(entry)
    }

    /// Persist the discovered set, debounced: triggers landing within the
    /// debounce window coalesce into one write.
    pub fn save(
        &self,
        root: &Path,
        candidate_paths: Vec<CandidatePath>,
        recent_paths: Vec<CandidatePath>,
        selected: Option<&Path>,
    ) {
        let root = root.to_path_buf();
        let selected = selected.map(Path::to_path_buf);

        // Outside a runtime (construction-time self-heal in sync contexts)
        // there is nothing to debounce against; write through directly.
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            self.save_now(&root, candidate_paths, recent_paths, selected.as_deref());
            return;
        };

        let cache = self.clone();
        let mut pending = self.inner.pending_save.lock();
        if let Some(previous) = pending.take() {
            previous.abort();
        }
        *pending = Some(runtime.spawn(async move {
            tokio::time::sleep(cache.inner.debounce).await;
            cache.save_now(&root, candidate_paths, recent_paths, selected.as_deref());
        }));
    }

    fn save_now(
        &self,
        root: &Path,
        candidate_paths: Vec<CandidatePath>,
        recent_paths: Vec<CandidatePath>,
        selected: Option<&Path>,
    ) {
        let candidate_paths = if candidate_paths.len() > self.inner.max_paths {
            score::truncate_by_relevance(candidate_paths, self.inner.max_paths, root, selected)
        } else {
            candidate_paths
        };

        let entry = DiscoveryCacheEntry {
            schema_version: DISCOVERY_SCHEMA_VERSION.to_string(),
            created_at: self.unix_now(),
            project_root: root.to_path_buf(),
            candidate_paths,
            recent_paths,
        };

        let data = match serde_json::to_string(&entry) {
            Ok(data) => data,
            Err(err) => {
                tracing::debug!(
                    target: "beacon.project",
                    root = %root.display(),
                    error = %err,
                    "failed to encode discovery cache"
                );
                return;
            }
        };

        // Persistence is best-effort; a failed write only costs a fresh
        // discovery next session.
        if let Err(err) = self.inner.store.set(&cache_key(root), &data) {
            tracing::debug!(
                target: "beacon.project",
                root = %root.display(),
                error = %err,
                "failed to persist discovery cache"
            );
        }
    }

    fn unix_now(&self) -> u64 {
        self.inner
            .clock
            .now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs()
    }
}

fn cache_key(root: &Path) -> String {
    format!("beacon.discovery.{}", root.display())
}
