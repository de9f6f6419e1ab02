use super::lru::Lru;
use super::{CacheStrategy, Hit};
use crate::listener::SharedListener;
use crate::value::Value;

use std::fmt;
use std::time::Duration;

use crossbeam_utils::CachePadded;
use parking_lot::Mutex;

/// The default number of independent LRU segments.
pub const DEFAULT_SEGMENTS: usize = 16;

/// Each segment is given at least this many bytes of budget; small caches get
/// fewer segments rather than segments too small to hold anything.
pub const MIN_SEGMENT_BYTES: u64 = 1024;

/// An LRU partitioned into independently locked segments.
///
/// A key is routed to one segment by hash, so operations on different keys
/// rarely contend. The byte capacity is divided evenly across segments and
/// each segment evicts on its own.
pub struct SegmentedLru<V> {
  segments: Box<[CachePadded<Mutex<Lru<V>>>]>,
  hasher: ahash::RandomState,
  capacity: u64,
}

impl<V: Value> SegmentedLru<V> {
  /// Creates `segments` segments sharing `capacity` bytes (`0` = unbounded).
  pub fn new(capacity: u64, segments: usize, listener: Option<SharedListener<V>>) -> Self {
    let count = Self::effective_segments(capacity, segments);
    let per_segment = if capacity == 0 { 0 } else { capacity / count as u64 };

    let segments = (0..count)
      .map(|_| CachePadded::new(Mutex::new(Lru::new(per_segment, listener.clone()))))
      .collect::<Vec<_>>()
      .into_boxed_slice();

    Self {
      segments,
      hasher: ahash::RandomState::new(),
      capacity,
    }
  }

  fn effective_segments(capacity: u64, requested: usize) -> usize {
    let requested = requested.max(1);
    if capacity == 0 {
      return requested;
    }
    let affordable = (capacity / MIN_SEGMENT_BYTES).max(1);
    requested.min(usize::try_from(affordable).unwrap_or(usize::MAX))
  }

  #[inline]
  fn segment(&self, key: &str) -> &Mutex<Lru<V>> {
    let index = self.hasher.hash_one(key) as usize % self.segments.len();
    &self.segments[index]
  }

  pub fn get(&self, key: &str) -> Option<Hit<V>> {
    self.segment(key).lock().get(key)
  }

  /// Returns `false` if the value does not fit in its segment.
  pub fn put(&self, key: String, value: V) -> bool {
    self.segment(&key).lock().put(key, value)
  }

  pub fn remove(&self, key: &str) -> Option<V> {
    self.segment(key).lock().remove(key)
  }

  /// Sweeps every segment in turn, locking one at a time.
  pub fn clean_up(&self, ttl: Duration) -> usize {
    self
      .segments
      .iter()
      .map(|segment| segment.lock().clean_up(ttl))
      .sum()
  }

  pub fn len(&self) -> usize {
    self.segments.iter().map(|segment| segment.lock().len()).sum()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn used_bytes(&self) -> u64 {
    self
      .segments
      .iter()
      .map(|segment| segment.lock().used_bytes())
      .sum()
  }

  pub fn capacity(&self) -> u64 {
    self.capacity
  }

  pub fn segment_count(&self) -> usize {
    self.segments.len()
  }

  pub fn clear(&self) {
    for segment in self.segments.iter() {
      segment.lock().clear();
    }
  }
}

impl<V> fmt::Debug for SegmentedLru<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("SegmentedLru")
      .field("segments", &self.segments.len())
      .field("capacity", &self.capacity)
      .finish_non_exhaustive()
  }
}
