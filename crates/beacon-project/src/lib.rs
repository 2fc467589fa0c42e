//! Build-description discovery and indexing for Beacon.
//!
//! This crate owns everything between "a project root" and "an interactive
//! list of build targets":
//! - a depth-bounded, category-capped background walk over the tree
//!   ([`discover`]), streaming candidates as it finds them
//! - relevance scoring so truncated result sets keep the most useful
//!   projects ([`score`])
//! - a short-lived per-file parse cache ([`ParseCache`]) and a long-lived
//!   cross-session cache ([`DiscoveryCache`])
//! - the [`ProjectIndexer`] facade tying those together for one root
//!
//! Nothing here raises hard errors to the caller: every failure degrades to
//! fewer or no results so interactive surfaces stay responsive.

mod clock;
mod discover;
mod discovery_cache;
mod indexer;
mod parse_cache;
mod score;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use discover::{
    spawn_discovery, CategoryCaps, DiscoveryEvent, DiscoveryOptions, CATEGORY_SAFETY_TIMEOUT,
};
pub use discovery_cache::{
    DiscoveryCache, DiscoveryCacheEntry, DEFAULT_MAX_CANDIDATE_PATHS, DISCOVERY_CACHE_MAX_AGE,
    DISCOVERY_SCHEMA_VERSION,
};
pub use indexer::ProjectIndexer;
pub use parse_cache::{ParseCache, PARSE_CACHE_TTL};
pub use score::{prioritize, score_candidate, truncate_by_relevance};
pub use store::{BlobStore, FileBlobStore, MemoryBlobStore, StoreError};
