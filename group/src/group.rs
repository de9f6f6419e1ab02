use crate::config::GroupConfig;
use crate::error::{Error, Result};
use crate::peers::{FetchContext, Fetcher, Picker};
use crate::retriever::{RetrieveError, Retriever};
use crate::singleflight::SingleFlight;
use crate::stats::{GroupStats, GroupStatsSnapshot};

use shoal_cache::{ByteView, Cache, MetricsSnapshot, StrategyKind};

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

/// A named cache namespace.
///
/// A `get` is answered from the local cache when possible. Misses go through
/// one deduplicated load per key: the owning peer is asked first, and the
/// source of truth is the fallback when no peer owns the key or the peer
/// fails.
pub struct Group {
  name: String,
  cache: Cache<ByteView>,
  /// Keys the source of truth reported missing, with their report time.
  negative: Option<(Cache<ByteView>, Duration)>,
  retriever: Arc<dyn Retriever>,
  picker: RwLock<Option<Arc<dyn Picker>>>,
  flight: SingleFlight<ByteView, Error>,
  fetch_timeout: Option<Duration>,
  populate_on_peer_hit: bool,
  stats: GroupStats,
}

impl Group {
  /// Builds a group from a validated configuration.
  pub fn new<R>(name: impl Into<String>, config: &GroupConfig, retriever: R) -> Result<Self>
  where
    R: Retriever + 'static,
  {
    Self::with_retriever(name, config, Arc::new(retriever))
  }

  pub fn with_retriever(name: impl Into<String>, config: &GroupConfig, retriever: Arc<dyn Retriever>) -> Result<Self> {
    let name = name.into();
    if name.is_empty() {
      return Err(Error::InvalidArgument("group name must not be empty".to_owned()));
    }
    config.validate()?;

    let mut builder = Cache::builder()
      .name(name.clone())
      .strategy(config.strategy_kind()?)
      .capacity(config.capacity_bytes)
      .segments(config.lru_segments);
    if let Some(ttl) = config.ttl {
      builder = builder.time_to_live(ttl);
    }
    if let Some(interval) = config.cleanup_interval {
      builder = builder.cleanup_interval(interval);
    }
    let cache = builder.build()?;

    let negative = match config.negative_ttl {
      Some(ttl) => {
        let cache = Cache::builder()
          .name(format!("{}-negative", name))
          .strategy(StrategyKind::Fifo)
          .capacity(config.capacity_bytes)
          .time_to_live(ttl)
          .build()?;
        Some((cache, ttl))
      }
      None => None,
    };

    tracing::info!(group = %name, strategy = %config.strategy, capacity = config.capacity_bytes, "group created");

    Ok(Self {
      name,
      cache,
      negative,
      retriever,
      picker: RwLock::new(None),
      flight: SingleFlight::new(config.singleflight_ttl),
      fetch_timeout: config.fetch_timeout,
      populate_on_peer_hit: config.populate_on_peer_hit,
      stats: GroupStats::default(),
    })
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Attaches the peer picker. A group accepts exactly one.
  pub fn register_peers(&self, picker: Arc<dyn Picker>) -> Result<()> {
    let mut slot = self.picker.write();
    if slot.is_some() {
      return Err(Error::DoubleRegistration(format!("peer picker for group '{}'", self.name)));
    }
    *slot = Some(picker);
    tracing::debug!(group = %self.name, "peer picker registered");
    Ok(())
  }

  pub fn has_peers(&self) -> bool {
    self.picker.read().is_some()
  }

  /// Returns the value for `key`, loading it on a cache miss.
  pub fn get(&self, key: &str) -> Result<ByteView> {
    if key.is_empty() {
      return Err(Error::InvalidArgument("key must not be empty".to_owned()));
    }
    GroupStats::incr(&self.stats.gets);

    if let Some(value) = self.cache.get(key) {
      GroupStats::incr(&self.stats.cache_hits);
      tracing::trace!(group = %self.name, key, "cache hit");
      return Ok(value);
    }

    GroupStats::incr(&self.stats.loads);
    self.flight.call(key, || self.load(key))
  }

  /// Drops `key` from the local cache and from any recent-result caches.
  pub fn remove(&self, key: &str) -> Option<ByteView> {
    self.flight.forget(key);
    if let Some((negative, _)) = &self.negative {
      negative.remove(key);
    }
    self.cache.remove(key)
  }

  fn load(&self, key: &str) -> Result<ByteView> {
    if self.is_known_missing(key) {
      GroupStats::incr(&self.stats.negative_hits);
      return Err(Error::NotFound(key.to_owned()));
    }

    let picker = self.picker.read().clone();
    if let Some(fetcher) = picker.and_then(|picker| picker.pick(key)) {
      match self.load_from_peer(fetcher.as_ref(), key) {
        Ok(value) => {
          GroupStats::incr(&self.stats.peer_loads);
          if self.populate_on_peer_hit {
            self.cache.put(key, value.clone());
          }
          return Ok(value);
        }
        Err(err) => {
          GroupStats::incr(&self.stats.peer_errors);
          tracing::warn!(group = %self.name, key, peer = fetcher.peer(), error = %err, "remote fetch failed; loading locally");
        }
      }
    }

    self.load_locally(key)
  }

  fn load_from_peer(&self, fetcher: &dyn Fetcher, key: &str) -> Result<ByteView> {
    let ctx = FetchContext::new(self.fetch_timeout);
    let failed = |reason: String| Error::RemoteFetchFailed {
      key: key.to_owned(),
      reason,
    };

    let bytes = fetcher
      .fetch(&ctx, &self.name, key)
      .map_err(|err| failed(err.to_string()))?;
    if ctx.is_expired() {
      return Err(failed("response arrived after the deadline".to_owned()));
    }
    Ok(ByteView::new(bytes))
  }

  fn load_locally(&self, key: &str) -> Result<ByteView> {
    match self.retriever.retrieve(key) {
      Ok(bytes) => {
        GroupStats::incr(&self.stats.local_loads);
        let value = ByteView::new(bytes);
        self.cache.put(key, value.clone());
        Ok(value)
      }
      Err(RetrieveError::NotFound) => {
        if let Some((negative, _)) = &self.negative {
          negative.put(key, ByteView::default());
        }
        Err(Error::NotFound(key.to_owned()))
      }
      Err(RetrieveError::Unavailable(reason)) => {
        GroupStats::incr(&self.stats.local_load_errors);
        tracing::warn!(group = %self.name, key, %reason, "source of truth failed");
        Err(Error::SourceUnavailable(reason))
      }
    }
  }

  fn is_known_missing(&self, key: &str) -> bool {
    let Some((negative, ttl)) = &self.negative else {
      return false;
    };
    match negative.get_with_timestamp(key) {
      Some((_, Some(at))) if at.elapsed() < *ttl => true,
      Some(_) => {
        negative.remove(key);
        false
      }
      None => false,
    }
  }

  pub fn stats(&self) -> GroupStatsSnapshot {
    self.stats.snapshot(self.flight.suppressed())
  }

  pub fn cache_metrics(&self) -> MetricsSnapshot {
    self.cache.metrics()
  }

  /// The group's local cache.
  pub fn cache(&self) -> &Cache<ByteView> {
    &self.cache
  }

  /// Stops background work and releases the peer picker. The group still
  /// answers gets afterwards, without TTL sweeps.
  pub fn shutdown(&self) {
    self.cache.stop_cleanup();
    if let Some((negative, _)) = &self.negative {
      negative.stop_cleanup();
    }
    self.flight.stop();
    if let Some(picker) = self.picker.read().as_ref() {
      picker.shutdown();
    }
    tracing::info!(group = %self.name, "group shut down");
  }
}

impl fmt::Debug for Group {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Group")
      .field("name", &self.name)
      .field("cache", &self.cache)
      .field("has_peers", &self.has_peers())
      .field("populate_on_peer_hit", &self.populate_on_peer_hit)
      .finish_non_exhaustive()
  }
}
