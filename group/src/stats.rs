use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

/// Counters describing how a group served its gets.
#[derive(Debug, Default)]
pub struct GroupStats {
  pub(crate) gets: CachePadded<AtomicU64>,
  pub(crate) cache_hits: CachePadded<AtomicU64>,
  pub(crate) loads: CachePadded<AtomicU64>,
  pub(crate) peer_loads: CachePadded<AtomicU64>,
  pub(crate) peer_errors: CachePadded<AtomicU64>,
  pub(crate) local_loads: CachePadded<AtomicU64>,
  pub(crate) local_load_errors: CachePadded<AtomicU64>,
  pub(crate) negative_hits: CachePadded<AtomicU64>,
}

impl GroupStats {
  #[inline]
  pub(crate) fn incr(counter: &CachePadded<AtomicU64>) {
    counter.fetch_add(1, Ordering::Relaxed);
  }

  pub(crate) fn snapshot(&self, deduplicated: u64) -> GroupStatsSnapshot {
    GroupStatsSnapshot {
      gets: self.gets.load(Ordering::Relaxed),
      cache_hits: self.cache_hits.load(Ordering::Relaxed),
      loads: self.loads.load(Ordering::Relaxed),
      deduplicated,
      peer_loads: self.peer_loads.load(Ordering::Relaxed),
      peer_errors: self.peer_errors.load(Ordering::Relaxed),
      local_loads: self.local_loads.load(Ordering::Relaxed),
      local_load_errors: self.local_load_errors.load(Ordering::Relaxed),
      negative_hits: self.negative_hits.load(Ordering::Relaxed),
    }
  }
}

/// A point-in-time view of [`GroupStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GroupStatsSnapshot {
  /// Calls to `get` with a valid key.
  pub gets: u64,
  /// Gets answered by the local cache.
  pub cache_hits: u64,
  /// Gets that missed the cache and went through the deduplicated load path.
  pub loads: u64,
  /// Loads answered by another caller's in-flight or recently completed load.
  pub deduplicated: u64,
  /// Values fetched from the owning peer.
  pub peer_loads: u64,
  /// Remote fetches that failed and fell back to the source of truth.
  pub peer_errors: u64,
  /// Values loaded from the source of truth.
  pub local_loads: u64,
  pub local_load_errors: u64,
  /// Loads answered `NotFound` from the negative cache.
  pub negative_hits: u64,
}
