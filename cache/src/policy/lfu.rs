use super::{evicted, over_capacity, oversized, CacheStrategy, Hit};
use crate::entry::{entry_size, Entry};
use crate::listener::{EvictionReason, SharedListener};
use crate::value::Value;

use std::cmp::Ordering;
use std::fmt;
use std::time::{Duration, Instant};

use ahash::HashMap;
use generational_arena::{Arena, Index};

/// A heap node: the entry, how often it was used, and where it sits in the heap.
#[derive(Debug)]
struct Item<V> {
  entry: Entry<V>,
  count: u64,
  /// Position in `heap`; `None` once the item has been popped.
  heap_index: Option<usize>,
}

impl<V> Item<V> {
  // Fewer uses first; among equals, the one touched longest ago.
  fn priority_cmp(&self, other: &Self) -> Ordering {
    self
      .count
      .cmp(&other.count)
      .then_with(|| self.entry.updated_at.cmp(&other.entry.updated_at))
  }
}

/// Evicts the least frequently used entry, breaking ties by age.
///
/// Items live in an arena; `heap` is a binary min-heap of arena indices and
/// every item records its own heap position so a single item can be
/// re-prioritized in O(log n).
pub struct Lfu<V> {
  items: Arena<Item<V>>,
  lookup: HashMap<String, Index>,
  heap: Vec<Index>,
  used: u64,
  capacity: u64,
  listener: Option<SharedListener<V>>,
}

impl<V: Value> Lfu<V> {
  pub fn new(capacity: u64, listener: Option<SharedListener<V>>) -> Self {
    Self {
      items: Arena::new(),
      lookup: HashMap::default(),
      heap: Vec::new(),
      used: 0,
      capacity,
      listener,
    }
  }

  fn less(&self, a: usize, b: usize) -> bool {
    self.items[self.heap[a]].priority_cmp(&self.items[self.heap[b]]) == Ordering::Less
  }

  // Swaps two heap slots and repairs both back-pointers.
  fn swap(&mut self, a: usize, b: usize) {
    self.heap.swap(a, b);
    let (ia, ib) = (self.heap[a], self.heap[b]);
    self.items[ia].heap_index = Some(a);
    self.items[ib].heap_index = Some(b);
  }

  fn sift_up(&mut self, mut pos: usize) -> usize {
    while pos > 0 {
      let parent = (pos - 1) / 2;
      if !self.less(pos, parent) {
        break;
      }
      self.swap(pos, parent);
      pos = parent;
    }
    pos
  }

  fn sift_down(&mut self, mut pos: usize) {
    let len = self.heap.len();
    loop {
      let left = 2 * pos + 1;
      let right = left + 1;
      let mut smallest = pos;
      if left < len && self.less(left, smallest) {
        smallest = left;
      }
      if right < len && self.less(right, smallest) {
        smallest = right;
      }
      if smallest == pos {
        return;
      }
      self.swap(pos, smallest);
      pos = smallest;
    }
  }

  /// Restores heap order around a single item whose priority changed.
  fn fix(&mut self, pos: usize) {
    if self.sift_up(pos) == pos {
      self.sift_down(pos);
    }
  }

  fn push(&mut self, index: Index) {
    let pos = self.heap.len();
    self.heap.push(index);
    self.items[index].heap_index = Some(pos);
    self.sift_up(pos);
  }

  /// Removes the heap slot at `pos` and frees its item.
  fn remove_at(&mut self, pos: usize) -> Option<Entry<V>> {
    let last = self.heap.len().checked_sub(1)?;
    if pos != last {
      self.swap(pos, last);
    }
    let index = self.heap.pop()?;
    if pos < self.heap.len() {
      self.fix(pos);
    }

    let mut item = self.items.remove(index)?;
    item.heap_index = None;
    self.lookup.remove(&item.entry.key);
    self.used -= item.entry.size();
    Some(item.entry)
  }

  fn pop(&mut self) -> Option<Entry<V>> {
    if self.heap.is_empty() {
      return None;
    }
    self.remove_at(0)
  }

  fn remove_entry(&mut self, key: &str) -> Option<Entry<V>> {
    let index = *self.lookup.get(key)?;
    let pos = self.items.get(index)?.heap_index?;
    self.remove_at(pos)
  }

  fn evict_overflow(&mut self) {
    while over_capacity(self.capacity, self.used) {
      match self.pop() {
        Some(entry) => {
          let (key, value) = entry.into_parts();
          evicted(&self.listener, key, value, EvictionReason::Capacity);
        }
        None => break,
      }
    }
  }

  /// Bumps the use count and touch time of an existing item.
  fn bump(&mut self, index: Index) -> Option<usize> {
    let item = self.items.get_mut(index)?;
    item.count += 1;
    item.entry.touch();
    item.heap_index
  }

  #[cfg(test)]
  fn count_of(&self, key: &str) -> Option<u64> {
    let index = self.lookup.get(key)?;
    Some(self.items[*index].count)
  }

  #[cfg(test)]
  fn assert_heap_consistent(&self) {
    for (pos, index) in self.heap.iter().enumerate() {
      assert_eq!(self.items[*index].heap_index, Some(pos), "stale back-pointer");
      if pos > 0 {
        assert!(!self.less(pos, (pos - 1) / 2), "heap order violated at {pos}");
      }
    }
    assert_eq!(self.heap.len(), self.lookup.len());
  }
}

impl<V: Value> CacheStrategy<V> for Lfu<V> {
  fn get(&mut self, key: &str) -> Option<Hit<V>> {
    let index = *self.lookup.get(key)?;
    let pos = self.bump(index)?;
    self.fix(pos);
    let entry = &self.items[index].entry;
    Some((entry.value.clone(), entry.updated_at))
  }

  fn put(&mut self, key: String, value: V) -> bool {
    let size = entry_size(&key, &value);
    if oversized(self.capacity, size) {
      if let Some(previous) = self.remove_entry(&key) {
        let (key, value) = previous.into_parts();
        evicted(&self.listener, key, value, EvictionReason::Capacity);
      }
      return false;
    }

    if let Some(&index) = self.lookup.get(&key) {
      let old_size = self.items[index].entry.size();
      self.items[index].entry.value = value;
      self.used = self.used - old_size + size;
      if let Some(pos) = self.bump(index) {
        self.fix(pos);
      }
    } else {
      let mut entry = Entry::new(key, value);
      entry.touch();
      let key = entry.key.clone();
      let index = self.items.insert(Item {
        entry,
        count: 1,
        heap_index: None,
      });
      self.lookup.insert(key, index);
      self.used += size;
      self.push(index);
    }
    self.evict_overflow();
    true
  }

  fn remove(&mut self, key: &str) -> Option<V> {
    self.remove_entry(key).map(|entry| entry.value)
  }

  fn clean_up(&mut self, ttl: Duration) -> usize {
    let now = Instant::now();
    let expired: Vec<String> = self
      .items
      .iter()
      .filter(|(_, item)| item.entry.expired_at(ttl, now))
      .map(|(_, item)| item.entry.key.clone())
      .collect();

    for key in &expired {
      if let Some(entry) = self.remove_entry(key) {
        let (key, value) = entry.into_parts();
        evicted(&self.listener, key, value, EvictionReason::Expired);
      }
    }
    expired.len()
  }

  fn len(&self) -> usize {
    self.heap.len()
  }

  fn used_bytes(&self) -> u64 {
    self.used
  }

  fn capacity(&self) -> u64 {
    self.capacity
  }

  fn clear(&mut self) {
    self.items.clear();
    self.lookup.clear();
    self.heap.clear();
    self.used = 0;
  }
}

impl<V> fmt::Debug for Lfu<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Lfu")
      .field("capacity", &self.capacity)
      .field("used", &self.used)
      .field("len", &self.heap.len())
      .finish_non_exhaustive()
  }
}
