use crate::cache::Cache;
use crate::error::BuildError;
use crate::listener::{EvictionListener, SharedListener};
use crate::policy::segmented::DEFAULT_SEGMENTS;
use crate::policy::StrategyKind;
use crate::value::Value;

use core::fmt;
use std::sync::Arc;
use std::time::Duration;

/// The janitor interval used when a TTL is set without an explicit interval.
/// Short TTLs are swept at their own period instead.
pub const DEFAULT_CLEANUP_INTERVAL: Duration = Duration::from_secs(1);

/// A builder for [`Cache`] instances.
pub struct CacheBuilder<V> {
  name: String,
  strategy: StrategyKind,
  capacity: u64,
  segments: usize,
  time_to_live: Option<Duration>,
  cleanup_interval: Option<Duration>,
  listener: Option<SharedListener<V>>,
}

impl<V> Default for CacheBuilder<V> {
  fn default() -> Self {
    Self {
      name: "cache".to_owned(),
      strategy: StrategyKind::default(),
      capacity: 0,
      segments: DEFAULT_SEGMENTS,
      time_to_live: None,
      cleanup_interval: None,
      listener: None,
    }
  }
}

impl<V> fmt::Debug for CacheBuilder<V> {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("CacheBuilder")
      .field("name", &self.name)
      .field("strategy", &self.strategy)
      .field("capacity", &self.capacity)
      .field("segments", &self.segments)
      .field("time_to_live", &self.time_to_live)
      .field("cleanup_interval", &self.cleanup_interval)
      .field("has_listener", &self.listener.is_some())
      .finish()
  }
}

impl<V: Value> CacheBuilder<V> {
  /// Names the cache in logs. The cleanup janitor is named `<name>-janitor`.
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = name.into();
    self
  }

  /// Selects the eviction strategy. Defaults to LRU.
  pub fn strategy(mut self, strategy: StrategyKind) -> Self {
    self.strategy = strategy;
    self
  }

  /// Selects the eviction strategy by name (`fifo`, `lru`, `lfu`, `arc`,
  /// case-insensitive).
  pub fn strategy_name(mut self, name: &str) -> Result<Self, BuildError> {
    self.strategy = name.parse()?;
    Ok(self)
  }

  /// Sets the byte capacity. `0`, the default, means unbounded.
  pub fn capacity(mut self, capacity: u64) -> Self {
    self.capacity = capacity;
    self
  }

  /// Sets the number of LRU segments. Ignored by other strategies.
  pub fn segments(mut self, segments: usize) -> Self {
    self.segments = segments;
    self
  }

  /// Enables a background sweep removing entries not touched for `ttl`.
  pub fn time_to_live(mut self, ttl: Duration) -> Self {
    self.time_to_live = Some(ttl);
    self
  }

  /// Sets how often the TTL sweep runs.
  pub fn cleanup_interval(mut self, interval: Duration) -> Self {
    self.cleanup_interval = Some(interval);
    self
  }

  /// Registers a listener told about every eviction, on a notifier thread.
  pub fn eviction_listener<Listener>(mut self, listener: Listener) -> Self
  where
    Listener: EvictionListener<V> + 'static,
  {
    self.listener = Some(Arc::new(listener));
    self
  }

  pub fn build(self) -> Result<Cache<V>, BuildError> {
    if self.segments == 0 {
      return Err(BuildError::ZeroSegments);
    }
    if matches!(self.cleanup_interval, Some(interval) if interval.is_zero()) {
      return Err(BuildError::ZeroInterval);
    }

    let cache = Cache::from_parts(
      self.name,
      self.strategy,
      self.capacity,
      self.segments,
      self.listener,
    );

    if let Some(ttl) = self.time_to_live {
      let interval = self
        .cleanup_interval
        .unwrap_or_else(|| ttl.min(DEFAULT_CLEANUP_INTERVAL));
      // A zero TTL would otherwise yield a zero interval.
      let interval = if interval.is_zero() { DEFAULT_CLEANUP_INTERVAL } else { interval };
      cache.set_cleanup(ttl, interval)?;
    }
    Ok(cache)
  }
}
