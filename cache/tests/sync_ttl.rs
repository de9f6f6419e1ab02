use shoal_cache::{ByteView, Cache, StrategyKind};

use std::thread;
use std::time::{Duration, Instant};

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
  let deadline = Instant::now() + timeout;
  while Instant::now() < deadline {
    if condition() {
      return true;
    }
    thread::sleep(Duration::from_millis(5));
  }
  condition()
}

#[test]
fn janitor_expires_entries_for_every_strategy() {
  for kind in [StrategyKind::Fifo, StrategyKind::Lru, StrategyKind::Lfu, StrategyKind::Arc] {
    let cache: Cache<ByteView> = Cache::builder()
      .strategy(kind)
      .time_to_live(Duration::from_millis(40))
      .cleanup_interval(Duration::from_millis(10))
      .build()
      .unwrap();

    cache.put("old", ByteView::from("1"));
    assert!(
      wait_until(Duration::from_secs(2), || cache.is_empty()),
      "{kind}: entry should expire"
    );
    assert_eq!(cache.metrics().evicted_by_ttl, 1, "{kind}");
  }
}

#[test]
fn manual_clean_up_keeps_fresh_entries() {
  let cache: Cache<ByteView> = Cache::builder().strategy(StrategyKind::Fifo).build().unwrap();
  cache.put("old", ByteView::from("1"));
  thread::sleep(Duration::from_millis(40));
  cache.put("new", ByteView::from("2"));

  assert_eq!(cache.clean_up(Duration::from_millis(25)), 1);
  assert!(cache.get("old").is_none());
  assert!(cache.get("new").is_some());
}

#[test]
fn lru_get_refreshes_ttl() {
  let cache: Cache<ByteView> = Cache::builder().strategy(StrategyKind::Lru).build().unwrap();
  cache.put("k", ByteView::from("v"));
  thread::sleep(Duration::from_millis(30));
  assert!(cache.get("k").is_some());

  assert_eq!(cache.clean_up(Duration::from_millis(25)), 0);
  assert!(cache.get("k").is_some());
}

#[test]
fn cleanup_can_be_swapped_and_stopped() {
  let cache: Cache<ByteView> = Cache::builder()
    .time_to_live(Duration::from_secs(3600))
    .build()
    .unwrap();
  assert!(cache.cleanup_running());

  cache.put("k", ByteView::from("v"));
  thread::sleep(Duration::from_millis(20));
  assert_eq!(cache.len(), 1, "long ttl keeps the entry");

  cache
    .set_cleanup(Duration::from_millis(10), Duration::from_millis(5))
    .unwrap();
  assert!(wait_until(Duration::from_secs(2), || cache.is_empty()));

  assert!(cache.stop_cleanup());
  assert!(!cache.cleanup_running());

  cache.put("k", ByteView::from("v"));
  thread::sleep(Duration::from_millis(50));
  assert_eq!(cache.len(), 1, "no sweeps after stop");
}
