use crate::listener::EvictionReason;

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use crossbeam_utils::CachePadded;

/// Lock-free counters updated by a [`Cache`](crate::Cache).
#[derive(Debug)]
pub struct Metrics {
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,

  pub(crate) inserts: CachePadded<AtomicU64>,
  pub(crate) removals: CachePadded<AtomicU64>,

  pub(crate) evicted_by_capacity: CachePadded<AtomicU64>,
  pub(crate) evicted_by_ttl: CachePadded<AtomicU64>,
  pub(crate) notifications_dropped: CachePadded<AtomicU64>,

  created_at: Instant,
}

impl Default for Metrics {
  fn default() -> Self {
    Self {
      hits: CachePadded::new(AtomicU64::new(0)),
      misses: CachePadded::new(AtomicU64::new(0)),
      inserts: CachePadded::new(AtomicU64::new(0)),
      removals: CachePadded::new(AtomicU64::new(0)),
      evicted_by_capacity: CachePadded::new(AtomicU64::new(0)),
      evicted_by_ttl: CachePadded::new(AtomicU64::new(0)),
      notifications_dropped: CachePadded::new(AtomicU64::new(0)),
      created_at: Instant::now(),
    }
  }
}

impl Metrics {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  #[inline]
  pub(crate) fn record_lookup(&self, hit: bool) {
    let counter = if hit { &self.hits } else { &self.misses };
    counter.fetch_add(1, Ordering::Relaxed);
  }

  #[inline]
  pub(crate) fn record_eviction(&self, reason: EvictionReason) {
    let counter = match reason {
      EvictionReason::Capacity => &self.evicted_by_capacity,
      EvictionReason::Expired => &self.evicted_by_ttl,
    };
    counter.fetch_add(1, Ordering::Relaxed);
  }

  /// Creates a point-in-time snapshot. `current_bytes` and `entries` are
  /// read from the engine by the caller.
  pub(crate) fn snapshot(&self, current_bytes: u64, entries: usize) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      inserts: self.inserts.load(Ordering::Relaxed),
      removals: self.removals.load(Ordering::Relaxed),
      evicted_by_capacity: self.evicted_by_capacity.load(Ordering::Relaxed),
      evicted_by_ttl: self.evicted_by_ttl.load(Ordering::Relaxed),
      notifications_dropped: self.notifications_dropped.load(Ordering::Relaxed),
      current_bytes,
      entries,
      uptime_secs: self.created_at.elapsed().as_secs(),
    }
  }
}

/// A point-in-time view of a cache's metrics.
#[derive(Clone, PartialEq)]
pub struct MetricsSnapshot {
  /// Lookups that found a value.
  pub hits: u64,
  /// Lookups that found nothing.
  pub misses: u64,
  /// hits / (hits + misses), `0.0` before the first lookup.
  pub hit_ratio: f64,
  /// Values stored by `put`, including replacements. Values too large to
  /// store are not counted.
  pub inserts: u64,
  /// Explicit removals that found a value.
  pub removals: u64,
  pub evicted_by_capacity: u64,
  pub evicted_by_ttl: u64,
  /// Eviction notifications that could not be queued for the listener.
  pub notifications_dropped: u64,
  /// Bytes currently accounted against the capacity.
  pub current_bytes: u64,
  pub entries: usize,
  pub uptime_secs: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("inserts", &self.inserts)
      .field("removals", &self.removals)
      .field("evicted_by_capacity", &self.evicted_by_capacity)
      .field("evicted_by_ttl", &self.evicted_by_ttl)
      .field("notifications_dropped", &self.notifications_dropped)
      .field("current_bytes", &self.current_bytes)
      .field("entries", &self.entries)
      .field("uptime_secs", &self.uptime_secs)
      .finish()
  }
}
