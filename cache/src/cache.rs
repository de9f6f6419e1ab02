use crate::builder::CacheBuilder;
use crate::error::BuildError;
use crate::listener::{EvictionListener, EvictionReason, SharedListener};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::policy::{CacheStrategy, Hit, SegmentedLru, Strategy, StrategyKind};
use crate::task::janitor::Janitor;
use crate::task::notifier::{self, Notification, Notifier};
use crate::value::Value;

use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;

/// The storage behind a [`Cache`]: a single strategy under one lock, or a
/// segmented LRU with a lock per segment.
pub(crate) enum Engine<V> {
  Locked(Mutex<Strategy<V>>),
  Segmented(SegmentedLru<V>),
}

impl<V: Value> Engine<V> {
  pub(crate) fn new(kind: StrategyKind, capacity: u64, segments: usize, listener: SharedListener<V>) -> Self {
    match kind {
      StrategyKind::Lru => Engine::Segmented(SegmentedLru::new(capacity, segments, Some(listener))),
      other => Engine::Locked(Mutex::new(other.build(capacity, Some(listener)))),
    }
  }

  fn get(&self, key: &str) -> Option<Hit<V>> {
    match self {
      Engine::Locked(strategy) => strategy.lock().get(key),
      Engine::Segmented(lru) => lru.get(key),
    }
  }

  fn put(&self, key: String, value: V) -> bool {
    match self {
      Engine::Locked(strategy) => strategy.lock().put(key, value),
      Engine::Segmented(lru) => lru.put(key, value),
    }
  }

  fn remove(&self, key: &str) -> Option<V> {
    match self {
      Engine::Locked(strategy) => strategy.lock().remove(key),
      Engine::Segmented(lru) => lru.remove(key),
    }
  }

  fn clean_up(&self, ttl: Duration) -> usize {
    match self {
      Engine::Locked(strategy) => strategy.lock().clean_up(ttl),
      Engine::Segmented(lru) => lru.clean_up(ttl),
    }
  }

  fn len(&self) -> usize {
    match self {
      Engine::Locked(strategy) => strategy.lock().len(),
      Engine::Segmented(lru) => lru.len(),
    }
  }

  fn used_bytes(&self) -> u64 {
    match self {
      Engine::Locked(strategy) => strategy.lock().used_bytes(),
      Engine::Segmented(lru) => lru.used_bytes(),
    }
  }

  fn capacity(&self) -> u64 {
    match self {
      Engine::Locked(strategy) => strategy.lock().capacity(),
      Engine::Segmented(lru) => lru.capacity(),
    }
  }

  fn clear(&self) {
    match self {
      Engine::Locked(strategy) => strategy.lock().clear(),
      Engine::Segmented(lru) => lru.clear(),
    }
  }

  fn segments(&self) -> usize {
    match self {
      Engine::Locked(_) => 1,
      Engine::Segmented(lru) => lru.segment_count(),
    }
  }
}

/// The listener every engine is built with. It counts evictions and, when
/// the user registered a listener, queues the notification for the notifier
/// thread instead of calling user code under a strategy lock.
pub(crate) struct MeteredListener<V> {
  metrics: Arc<Metrics>,
  sender: Option<flume::Sender<Notification<V>>>,
}

impl<V: Send> EvictionListener<V> for MeteredListener<V> {
  fn on_evict(&self, key: String, value: V, reason: EvictionReason) {
    self.metrics.record_eviction(reason);
    if let Some(sender) = &self.sender {
      notifier::forward(sender, &self.metrics, (key, value, reason));
    }
  }
}

/// State shared between a `Cache` and its janitor thread.
pub(crate) struct CacheCore<V> {
  engine: Engine<V>,
  metrics: Arc<Metrics>,
}

impl<V: Value> CacheCore<V> {
  fn sweep(&self, ttl: Duration) -> usize {
    self.engine.clean_up(ttl)
  }
}

struct Cleanup {
  ttl: Duration,
  janitor: Janitor,
}

/// A thread-safe, byte-bounded cache owned by one group.
///
/// All methods take `&self`. With a listener registered, eviction
/// notifications are delivered on a separate thread, so the listener may call
/// back into the cache.
pub struct Cache<V: Value> {
  name: String,
  kind: StrategyKind,
  core: Arc<CacheCore<V>>,
  cleanup: Mutex<Option<Cleanup>>,
  _notifier: Option<Notifier<V>>,
}

impl<V: Value> Cache<V> {
  /// Returns a builder for configuring a new cache.
  pub fn builder() -> CacheBuilder<V> {
    CacheBuilder::default()
  }

  pub(crate) fn from_parts(
    name: String,
    kind: StrategyKind,
    capacity: u64,
    segments: usize,
    listener: Option<SharedListener<V>>,
  ) -> Self {
    let metrics = Arc::new(Metrics::new());
    let (notifier, sender) = match listener {
      Some(listener) => {
        let (notifier, sender) = Notifier::spawn(listener);
        (Some(notifier), Some(sender))
      }
      None => (None, None),
    };

    let metered: SharedListener<V> = Arc::new(MeteredListener {
      metrics: metrics.clone(),
      sender,
    });
    let engine = Engine::new(kind, capacity, segments, metered);

    tracing::debug!(cache = %name, strategy = %kind, capacity, segments = engine.segments(), "cache created");

    Self {
      name,
      kind,
      core: Arc::new(CacheCore { engine, metrics }),
      cleanup: Mutex::new(None),
      _notifier: notifier,
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn strategy(&self) -> StrategyKind {
    self.kind
  }

  /// Looks up `key`, returning a clone of the stored value.
  pub fn get(&self, key: &str) -> Option<V> {
    self.get_with_timestamp(key).map(|(value, _)| value)
  }

  /// Like [`get`](Self::get), also returning when the entry was last touched.
  pub fn get_with_timestamp(&self, key: &str) -> Option<Hit<V>> {
    let hit = self.core.engine.get(key);
    self.core.metrics.record_lookup(hit.is_some());
    hit
  }

  /// Inserts or replaces `key`, evicting other entries if the cache is over
  /// capacity afterwards.
  pub fn put(&self, key: impl Into<String>, value: V) {
    if self.core.engine.put(key.into(), value) {
      self.core.metrics.inserts.fetch_add(1, Ordering::Relaxed);
    }
  }

  /// Removes `key` without notifying the eviction listener.
  pub fn remove(&self, key: &str) -> Option<V> {
    let removed = self.core.engine.remove(key);
    if removed.is_some() {
      self.core.metrics.removals.fetch_add(1, Ordering::Relaxed);
    }
    removed
  }

  /// Removes every entry whose TTL has elapsed, notifying the listener for
  /// each. Returns how many entries were removed.
  pub fn clean_up(&self, ttl: Duration) -> usize {
    self.core.sweep(ttl)
  }

  /// Drops every entry without notifying the listener.
  pub fn clear(&self) {
    self.core.engine.clear();
  }

  pub fn len(&self) -> usize {
    self.core.engine.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn used_bytes(&self) -> u64 {
    self.core.engine.used_bytes()
  }

  /// The byte capacity, `0` when unbounded.
  pub fn capacity(&self) -> u64 {
    self.core.engine.capacity()
  }

  /// Number of independently locked segments (`1` unless the strategy is LRU).
  pub fn segments(&self) -> usize {
    self.core.engine.segments()
  }

  /// The TTL enforced by the running janitor, if any.
  pub fn ttl(&self) -> Option<Duration> {
    self.cleanup.lock().as_ref().map(|cleanup| cleanup.ttl)
  }

  /// Starts, or replaces, the background TTL sweep.
  ///
  /// A running janitor is stopped and joined before the new one is spawned,
  /// so two sweeps never run side by side.
  pub fn set_cleanup(&self, ttl: Duration, interval: Duration) -> Result<(), BuildError> {
    if interval.is_zero() {
      return Err(BuildError::ZeroInterval);
    }

    let mut cleanup = self.cleanup.lock();
    if let Some(previous) = cleanup.take() {
      previous.janitor.stop();
    }

    let core = self.core.clone();
    let name = self.name.clone();
    let janitor = Janitor::spawn(format!("{}-janitor", self.name), interval, move || {
      let removed = core.sweep(ttl);
      if removed > 0 {
        tracing::debug!(cache = %name, removed, "expired entries swept");
      }
    });
    *cleanup = Some(Cleanup { ttl, janitor });
    Ok(())
  }

  /// Stops the background TTL sweep. Returns `false` if none was running.
  pub fn stop_cleanup(&self) -> bool {
    match self.cleanup.lock().take() {
      Some(cleanup) => {
        cleanup.janitor.stop();
        true
      }
      None => false,
    }
  }

  /// `true` while a background TTL sweep is active.
  pub fn cleanup_running(&self) -> bool {
    self
      .cleanup
      .lock()
      .as_ref()
      .map_or(false, |cleanup| cleanup.janitor.is_running())
  }

  pub fn metrics(&self) -> MetricsSnapshot {
    let engine = &self.core.engine;
    self.core.metrics.snapshot(engine.used_bytes(), engine.len())
  }
}

impl<V: Value> Drop for Cache<V> {
  fn drop(&mut self) {
    // The janitor holds a reference to the core; join it first so the core,
    // and with it the last notification sender, is released below.
    self.stop_cleanup();
  }
}

impl<V: Value> fmt::Debug for Cache<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Cache")
      .field("name", &self.name)
      .field("strategy", &self.kind)
      .field("capacity", &self.capacity())
      .field("used_bytes", &self.used_bytes())
      .field("len", &self.len())
      .field("ttl", &self.ttl())
      .finish_non_exhaustive()
  }
}
