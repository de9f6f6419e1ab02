use super::list::OrderedList;
use super::{evicted, over_capacity, oversized, CacheStrategy, Hit};
use crate::entry::{entry_size, Entry};
use crate::listener::{EvictionReason, SharedListener};
use crate::value::Value;

use std::fmt;
use std::time::{Duration, Instant};

/// A single list evicting from its front.
///
/// With `PROMOTE` set, reads and writes move an entry to the back (LRU).
/// Without it the list keeps insertion order and reads change nothing (FIFO).
pub struct OrderedStrategy<V, const PROMOTE: bool> {
  pub(super) list: OrderedList<Entry<V>>,
  capacity: u64,
  listener: Option<SharedListener<V>>,
}

impl<V: Value, const PROMOTE: bool> OrderedStrategy<V, PROMOTE> {
  pub fn new(capacity: u64, listener: Option<SharedListener<V>>) -> Self {
    Self {
      list: OrderedList::new(),
      capacity,
      listener,
    }
  }

  fn evict_overflow(&mut self) {
    while over_capacity(self.capacity, self.list.weight()) {
      match self.list.pop_front() {
        Some(entry) => {
          let (key, value) = entry.into_parts();
          evicted(&self.listener, key, value, EvictionReason::Capacity);
        }
        None => break,
      }
    }
  }
}

impl<V: Value, const PROMOTE: bool> CacheStrategy<V> for OrderedStrategy<V, PROMOTE> {
  fn get(&mut self, key: &str) -> Option<Hit<V>> {
    if !PROMOTE {
      return self
        .list
        .get(key)
        .map(|entry| (entry.value.clone(), entry.updated_at));
    }
    self.list.update(key, true, |entry| {
      entry.touch();
      (entry.value.clone(), entry.updated_at)
    })
  }

  fn put(&mut self, key: String, value: V) -> bool {
    if oversized(self.capacity, entry_size(&key, &value)) {
      if let Some(previous) = self.list.remove(&key) {
        let (key, value) = previous.into_parts();
        evicted(&self.listener, key, value, EvictionReason::Capacity);
      }
      return false;
    }

    let mut pending = Some(value);
    self.list.update(&key, PROMOTE, |entry| {
      if let Some(value) = pending.take() {
        entry.value = value;
      }
      entry.touch();
    });

    if let Some(value) = pending {
      let mut entry = Entry::new(key, value);
      entry.touch();
      self.list.push_back(entry);
    }
    self.evict_overflow();
    true
  }

  fn remove(&mut self, key: &str) -> Option<V> {
    self.list.remove(key).map(|entry| entry.value)
  }

  fn clean_up(&mut self, ttl: Duration) -> usize {
    let now = Instant::now();
    let expired = self.list.keys_where(|entry| entry.expired_at(ttl, now));
    for key in &expired {
      if let Some(entry) = self.list.remove(key) {
        let (key, value) = entry.into_parts();
        evicted(&self.listener, key, value, EvictionReason::Expired);
      }
    }
    expired.len()
  }

  fn len(&self) -> usize {
    self.list.len()
  }

  fn used_bytes(&self) -> u64 {
    self.list.weight()
  }

  fn capacity(&self) -> u64 {
    self.capacity
  }

  fn clear(&mut self) {
    self.list.clear();
  }
}

impl<V, const PROMOTE: bool> fmt::Debug for OrderedStrategy<V, PROMOTE> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct(if PROMOTE { "Lru" } else { "Fifo" })
      .field("capacity", &self.capacity)
      .field("len", &self.list.len())
      .field("has_listener", &self.listener.is_some())
      .finish_non_exhaustive()
  }
}
