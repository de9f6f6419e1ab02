use super::ordered::OrderedStrategy;

/// Evicts the least recently used entry first.
///
/// Both reads and writes move an entry to the most-recently-used end of the
/// list and touch it.
pub type Lru<V> = OrderedStrategy<V, true>;

#[cfg(test)]
mod tests {
  use super::*;
  use crate::policy::test_util::{put1, Recorder};
  use crate::policy::CacheStrategy;

  use std::sync::Arc;
  use std::time::Duration;

  #[test]
  fn recently_read_entry_survives_eviction() {
    let recorder = Arc::new(Recorder::default());
    let mut lru = Lru::new(4, recorder.listener());
    put1(&mut lru, "a");
    put1(&mut lru, "b");
    assert!(lru.get("a").is_some());
    put1(&mut lru, "c");

    assert!(lru.get("b").is_none(), "b was least recently used");
    assert!(lru.get("a").is_some());
    assert!(lru.get("c").is_some());
    assert_eq!(recorder.keys(), vec!["b"]);
  }

  #[test]
  fn put_refreshes_recency() {
    let mut lru = Lru::new(4, None);
    put1(&mut lru, "a");
    put1(&mut lru, "b");
    put1(&mut lru, "a");
    put1(&mut lru, "c");

    assert_eq!(lru.list.keys(), vec!["a", "c"]);
  }

  #[test]
  fn get_touches_entry() {
    let mut lru = Lru::new(0, None);
    put1(&mut lru, "a");
    let (_, first) = lru.get("a").unwrap();
    std::thread::sleep(Duration::from_millis(2));
    let (_, second) = lru.get("a").unwrap();
    assert!(second > first);
  }

  #[test]
  fn miss_has_no_side_effects() {
    let mut lru = Lru::<String>::new(4, None);
    assert!(lru.get("nope").is_none());
    assert_eq!(lru.len(), 0);
    assert_eq!(lru.used_bytes(), 0);
  }

  #[test]
  fn unbounded_never_evicts() {
    let mut lru = Lru::new(0, None);
    for i in 0..1000 {
      lru.put(format!("k{}", i), "v".to_owned());
    }
    assert_eq!(lru.len(), 1000);
  }
}
