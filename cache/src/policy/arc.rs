use super::list::{Ghost, OrderedList};
use super::{evicted, over_capacity, oversized, CacheStrategy, Hit};
use crate::entry::{entry_size, Entry};
use crate::listener::{EvictionReason, SharedListener};
use crate::value::Value;

use std::fmt;
use std::time::{Duration, Instant};

/// Adaptive Replacement Cache.
///
/// Resident entries live in `t1` (seen once recently) or `t2` (seen at least
/// twice). Keys evicted from those lists are remembered, without values, in
/// the ghost lists `b1` and `b2`. A ghost hit moves the split point `p`,
/// shifting space between recency and frequency. All sizes, `p` included,
/// are accounted in bytes; in every list the front is the least recently
/// used end.
pub struct ArcStrategy<V> {
  t1: OrderedList<Entry<V>>,
  t2: OrderedList<Entry<V>>,
  b1: OrderedList<Ghost>,
  b2: OrderedList<Ghost>,
  p: u64,
  capacity: u64,
  listener: Option<SharedListener<V>>,
}

#[inline]
fn ratio(numerator: u64, denominator: u64) -> u64 {
  if denominator == 0 {
    1
  } else {
    (numerator / denominator).max(1)
  }
}

impl<V: Value> ArcStrategy<V> {
  pub fn new(capacity: u64, listener: Option<SharedListener<V>>) -> Self {
    Self {
      t1: OrderedList::new(),
      t2: OrderedList::new(),
      b1: OrderedList::new(),
      b2: OrderedList::new(),
      p: 0,
      capacity,
      listener,
    }
  }

  /// The current adaptive split point.
  pub fn target(&self) -> u64 {
    self.p
  }

  fn resident_bytes(&self) -> u64 {
    self.t1.weight() + self.t2.weight()
  }

  fn remember(ghosts: &mut OrderedList<Ghost>, key: String, size: u64, budget: u64) {
    ghosts.push_back(Ghost { key, size });
    while over_capacity(budget, ghosts.weight()) {
      if ghosts.pop_front().is_none() {
        break;
      }
    }
  }

  /// Evicts one resident entry into its ghost list. Returns `false` if
  /// nothing is resident.
  fn replace(&mut self) -> bool {
    let from_t1 = !self.t1.is_empty()
      && (self.t2.weight() > self.p || (self.t2.is_empty() && self.b2.is_empty()));

    let (entry, into_b1) = if from_t1 {
      (self.t1.pop_front(), true)
    } else if let Some(entry) = self.t2.pop_front() {
      (Some(entry), false)
    } else {
      // T2 is empty but B2 still remembers keys; T1 is all that is left.
      (self.t1.pop_front(), true)
    };

    let Some(entry) = entry else {
      return false;
    };

    let size = entry.size();
    let (key, value) = entry.into_parts();
    let ghosts = if into_b1 { &mut self.b1 } else { &mut self.b2 };
    Self::remember(ghosts, key.clone(), size, self.capacity);
    evicted(&self.listener, key, value, EvictionReason::Capacity);
    true
  }

  /// Makes room for `incoming` more bytes.
  fn make_room(&mut self, incoming: u64) {
    while over_capacity(self.capacity, self.resident_bytes() + incoming) {
      if !self.replace() {
        break;
      }
    }
  }

  /// Adapts `p` on a ghost hit and forgets the ghost.
  fn adapt(&mut self, key: &str) {
    if self.b2.contains(key) {
      let delta = ratio(self.b1.weight(), self.b2.weight());
      self.p = (self.p + delta).min(self.capacity);
      self.b2.remove(key);
    } else if self.b1.contains(key) {
      let delta = ratio(self.b2.weight(), self.b1.weight());
      self.p = self.p.saturating_sub(delta);
      self.b1.remove(key);
    }
  }

  fn remove_resident(&mut self, key: &str) -> Option<Entry<V>> {
    self.t1.remove(key).or_else(|| self.t2.remove(key))
  }

  #[cfg(test)]
  fn lists(&self) -> [Vec<String>; 4] {
    [self.t1.keys(), self.t2.keys(), self.b1.keys(), self.b2.keys()]
  }
}

impl<V: Value> CacheStrategy<V> for ArcStrategy<V> {
  /// A hit in T1 is promoted to T2; a hit in T2 moves to its MRU end.
  fn get(&mut self, key: &str) -> Option<Hit<V>> {
    if let Some(mut entry) = self.t1.remove(key) {
      entry.touch();
      let hit = (entry.value.clone(), entry.updated_at);
      self.t2.push_back(entry);
      return Some(hit);
    }

    self.t2.update(key, true, |entry| {
      entry.touch();
      (entry.value.clone(), entry.updated_at)
    })
  }

  fn put(&mut self, key: String, value: V) -> bool {
    let size = entry_size(&key, &value);
    if oversized(self.capacity, size) {
      if let Some(previous) = self.remove_resident(&key) {
        let (key, value) = previous.into_parts();
        evicted(&self.listener, key, value, EvictionReason::Capacity);
      }
      return false;
    }

    // Resident: replace the value and promote exactly as a read would.
    if let Some(mut entry) = self.t1.remove(&key) {
      entry.value = value;
      entry.touch();
      self.t2.push_back(entry);
      self.make_room(0);
      return true;
    }
    let mut pending = Some(value);
    self.t2.update(&key, true, |entry| {
      if let Some(value) = pending.take() {
        entry.value = value;
      }
      entry.touch();
    });
    let Some(value) = pending else {
      self.make_room(0);
      return true;
    };

    self.adapt(&key);
    self.make_room(size);

    let mut entry = Entry::new(key, value);
    entry.touch();
    self.t1.push_back(entry);
    true
  }

  fn remove(&mut self, key: &str) -> Option<V> {
    self.remove_resident(key).map(|entry| entry.value)
  }

  /// Sweeps T1 and T2. Ghosts carry no value and are not time-bounded.
  fn clean_up(&mut self, ttl: Duration) -> usize {
    let now = Instant::now();
    let mut removed = 0;
    for list in [&mut self.t1, &mut self.t2] {
      let expired = list.keys_where(|entry| entry.expired_at(ttl, now));
      for key in expired {
        if let Some(entry) = list.remove(&key) {
          let (key, value) = entry.into_parts();
          evicted(&self.listener, key, value, EvictionReason::Expired);
          removed += 1;
        }
      }
    }
    removed
  }

  fn len(&self) -> usize {
    self.t1.len() + self.t2.len()
  }

  fn used_bytes(&self) -> u64 {
    self.resident_bytes()
  }

  fn capacity(&self) -> u64 {
    self.capacity
  }

  fn clear(&mut self) {
    self.p = 0;
    self.t1.clear();
    self.t2.clear();
    self.b1.clear();
    self.b2.clear();
  }
}

impl<V> fmt::Debug for ArcStrategy<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ArcStrategy")
      .field("capacity", &self.capacity)
      .field("p", &self.p)
      .field("t1", &self.t1.len())
      .field("t2", &self.t2.len())
      .field("b1", &self.b1.len())
      .field("b2", &self.b2.len())
      .finish_non_exhaustive()
  }
}
