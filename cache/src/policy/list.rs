use crate::entry::Entry;
use crate::value::Value;

use ahash::HashMap;
use generational_arena::{Arena, Index};

/// Something that can live in an [`OrderedList`]: it has a key and a size.
pub(crate) trait ListItem {
  fn key(&self) -> &str;
  fn weight(&self) -> u64;
}

impl<V: Value> ListItem for Entry<V> {
  fn key(&self) -> &str {
    &self.key
  }

  fn weight(&self) -> u64 {
    self.size()
  }
}

/// A key remembered after its value was evicted (ARC ghost lists).
#[derive(Debug, Clone)]
pub(crate) struct Ghost {
  pub(crate) key: String,
  pub(crate) size: u64,
}

impl ListItem for Ghost {
  fn key(&self) -> &str {
    &self.key
  }

  fn weight(&self) -> u64 {
    self.size
  }
}

#[derive(Debug)]
struct Node<T> {
  item: T,
  weight: u64,
  prev: Option<Index>,
  next: Option<Index>,
}

/// A doubly linked list with O(1) keyed access, backed by an arena.
///
/// The front holds the oldest (or least recently used) item, the back the
/// newest. The list tracks the summed weight of its items.
#[derive(Debug)]
pub(crate) struct OrderedList<T> {
  nodes: Arena<Node<T>>,
  lookup: HashMap<String, Index>,
  head: Option<Index>,
  tail: Option<Index>,
  weight: u64,
}

impl<T> OrderedList<T> {
  pub(crate) fn len(&self) -> usize {
    self.lookup.len()
  }

  pub(crate) fn is_empty(&self) -> bool {
    self.lookup.is_empty()
  }
}

impl<T: ListItem> OrderedList<T> {
  pub(crate) fn new() -> Self {
    Self {
      nodes: Arena::new(),
      lookup: HashMap::default(),
      head: None,
      tail: None,
      weight: 0,
    }
  }

  // Detaches a node from its neighbours without freeing it.
  fn unlink(&mut self, index: Index) {
    let (prev, next) = {
      let node = &self.nodes[index];
      (node.prev, node.next)
    };

    match prev {
      Some(prev) => self.nodes[prev].next = next,
      None => self.head = next,
    }
    match next {
      Some(next) => self.nodes[next].prev = prev,
      None => self.tail = prev,
    }
  }

  fn link_back(&mut self, index: Index) {
    let old_tail = self.tail;
    {
      let node = &mut self.nodes[index];
      node.prev = old_tail;
      node.next = None;
    }
    match old_tail {
      Some(old_tail) => self.nodes[old_tail].next = Some(index),
      None => self.head = Some(index),
    }
    self.tail = Some(index);
  }

  pub(crate) fn weight(&self) -> u64 {
    self.weight
  }

  pub(crate) fn contains(&self, key: &str) -> bool {
    self.lookup.contains_key(key)
  }

  pub(crate) fn get(&self, key: &str) -> Option<&T> {
    let index = *self.lookup.get(key)?;
    self.nodes.get(index).map(|node| &node.item)
  }

  /// Appends a new item at the back. The key must not already be present.
  pub(crate) fn push_back(&mut self, item: T) {
    debug_assert!(!self.contains(item.key()));
    let key = item.key().to_owned();
    let weight = item.weight();
    let index = self.nodes.insert(Node {
      item,
      weight,
      prev: None,
      next: None,
    });
    self.lookup.insert(key, index);
    self.weight += weight;
    self.link_back(index);
  }

  /// Mutates an item in place, optionally moving it to the back.
  ///
  /// The item's weight is re-read after `f` runs so the list total stays
  /// accurate. Returns `None` if the key is absent.
  pub(crate) fn update<R>(&mut self, key: &str, to_back: bool, f: impl FnOnce(&mut T) -> R) -> Option<R> {
    let index = *self.lookup.get(key)?;
    let (result, old_weight, new_weight) = {
      let node = &mut self.nodes[index];
      let old_weight = node.weight;
      let result = f(&mut node.item);
      node.weight = node.item.weight();
      (result, old_weight, node.weight)
    };
    self.weight = self.weight - old_weight + new_weight;

    if to_back && self.tail != Some(index) {
      self.unlink(index);
      self.link_back(index);
    }
    Some(result)
  }

  pub(crate) fn remove(&mut self, key: &str) -> Option<T> {
    let index = self.lookup.remove(key)?;
    self.unlink(index);
    let node = self.nodes.remove(index)?;
    self.weight -= node.weight;
    Some(node.item)
  }

  /// Removes and returns the front (oldest) item.
  pub(crate) fn pop_front(&mut self) -> Option<T> {
    let head = self.head?;
    let key = self.nodes[head].item.key().to_owned();
    self.remove(&key)
  }

  /// Keys whose items match `pred`, front to back.
  pub(crate) fn keys_where(&self, mut pred: impl FnMut(&T) -> bool) -> Vec<String> {
    let mut keys = Vec::new();
    let mut current = self.head;
    while let Some(index) = current {
      let node = &self.nodes[index];
      if pred(&node.item) {
        keys.push(node.item.key().to_owned());
      }
      current = node.next;
    }
    keys
  }

  pub(crate) fn clear(&mut self) {
    self.nodes.clear();
    self.lookup.clear();
    self.head = None;
    self.tail = None;
    self.weight = 0;
  }

  // Front-to-back key order, for assertions.
  #[cfg(test)]
  pub(crate) fn keys(&self) -> Vec<String> {
    self.keys_where(|_| true)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn ghost(key: &str, size: u64) -> Ghost {
    Ghost {
      key: key.to_owned(),
      size,
    }
  }

  #[test]
  fn new_list_is_empty() {
    let list = OrderedList::<Ghost>::new();
    assert!(list.is_empty());
    assert_eq!(list.weight(), 0);
    assert!(!list.contains("a"));
    assert!(list.keys().is_empty());
  }

  #[test]
  fn push_back_appends_in_order() {
    let mut list = OrderedList::new();
    list.push_back(ghost("a", 5));
    list.push_back(ghost("b", 2));

    assert_eq!(list.keys(), vec!["a", "b"]);
    assert_eq!(list.weight(), 7);
    assert_eq!(list.len(), 2);
  }

  #[test]
  fn update_can_move_to_back_and_reweigh() {
    let mut list = OrderedList::new();
    list.push_back(ghost("a", 1));
    list.push_back(ghost("b", 1));
    list.push_back(ghost("c", 1));

    list.update("a", true, |g| g.size = 10);
    assert_eq!(list.keys(), vec!["b", "c", "a"]);
    assert_eq!(list.weight(), 12);

    list.update("b", false, |g| g.size = 2);
    assert_eq!(list.keys(), vec!["b", "c", "a"], "in-place update keeps position");
    assert_eq!(list.weight(), 13);

    assert!(list.update("zzz", true, |_| ()).is_none());
  }

  #[test]
  fn pop_front_returns_oldest() {
    let mut list = OrderedList::new();
    list.push_back(ghost("a", 1));
    list.push_back(ghost("b", 2));
    list.push_back(ghost("c", 3));

    let popped = list.pop_front().unwrap();
    assert_eq!(popped.key, "a");
    assert_eq!(list.weight(), 5);
    assert_eq!(list.keys(), vec!["b", "c"]);
  }

  #[test]
  fn pop_front_on_single_and_empty_list() {
    let mut list = OrderedList::new();
    list.push_back(ghost("a", 10));
    assert_eq!(list.pop_front().map(|g| g.key), Some("a".to_owned()));
    assert!(list.is_empty());
    assert!(list.pop_front().is_none());
    assert_eq!(list.weight(), 0);
  }

  #[test]
  fn remove_from_middle_relinks_neighbours() {
    let mut list = OrderedList::new();
    list.push_back(ghost("a", 1));
    list.push_back(ghost("b", 2));
    list.push_back(ghost("c", 3));

    assert_eq!(list.remove("b").map(|g| g.size), Some(2));
    assert_eq!(list.keys(), vec!["a", "c"]);
    assert_eq!(list.weight(), 4);
    assert!(list.remove("b").is_none());

    // Removing the tail then appending must keep links intact.
    list.remove("c");
    list.push_back(ghost("d", 1));
    assert_eq!(list.keys(), vec!["a", "d"]);
  }

  #[test]
  fn keys_where_filters_front_to_back() {
    let mut list = OrderedList::new();
    list.push_back(ghost("a", 1));
    list.push_back(ghost("b", 5));
    list.push_back(ghost("c", 7));
    assert_eq!(list.keys_where(|g| g.size > 2), vec!["b", "c"]);
  }

  #[test]
  fn clear_resets_list() {
    let mut list = OrderedList::new();
    list.push_back(ghost("a", 10));
    list.push_back(ghost("b", 20));
    list.clear();
    assert!(list.is_empty());
    assert_eq!(list.weight(), 0);
    assert!(list.get("a").is_none());
  }
}
