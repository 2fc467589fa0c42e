use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use beacon_build_model::BuildPackage;
use parking_lot::Mutex;

use crate::clock::Clock;

/// How long a memoized parse result stays valid.
pub const PARSE_CACHE_TTL: Duration = Duration::from_secs(30);

struct CachedParse {
    inserted_at: SystemTime,
    /// `None` means "parse attempted, no package" (unreadable or suspicious
    /// file). Cached like a hit so permanently broken files aren't re-parsed
    /// in a hot loop.
    package: Option<BuildPackage>,
}

/// Short-lived memoization of per-file parse results.
///
/// Keyed by absolute file path. Staleness is purely time-based — no content
/// hashing — so edits within the TTL window only become visible on expiry or
/// explicit invalidation via [`ParseCache::clear`].
pub struct ParseCache {
    clock: Arc<dyn Clock>,
    ttl: Duration,
    entries: Mutex<HashMap<PathBuf, CachedParse>>,
}

impl ParseCache {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self::with_ttl(clock, PARSE_CACHE_TTL)
    }

    pub fn with_ttl(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self {
            clock,
            ttl,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Outer `None` = absent (caller should parse); inner `None` = cached
    /// "no package" result.
    pub fn get(&self, path: &Path) -> Option<Option<BuildPackage>> {
        let mut entries = self.entries.lock();
        let entry = entries.get(path)?;

        let age = self
            .clock
            .now()
            .duration_since(entry.inserted_at)
            .unwrap_or_default();
        if age > self.ttl {
            entries.remove(path);
            return None;
        }
        Some(entry.package.clone())
    }

    pub fn put(&self, path: impl Into<PathBuf>, package: Option<BuildPackage>) {
        self.entries.lock().insert(
            path.into(),
            CachedParse {
                inserted_at: self.clock.now(),
                package,
            },
        );
    }

    /// Explicit invalidation, driven by the walker's data-changed event.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }
}
