use std::fmt;
use std::sync::Arc;

/// Describes the reason an entry left the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvictionReason {
  /// The entry was removed to bring the cache back under its byte capacity.
  Capacity,
  /// The entry was removed by a TTL sweep.
  Expired,
}

impl fmt::Display for EvictionReason {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      EvictionReason::Capacity => write!(f, "evicted due to capacity"),
      EvictionReason::Expired => write!(f, "evicted due to expiration (TTL)"),
    }
  }
}

/// A listener that is told about every entry leaving an eviction strategy.
///
/// When attached directly to a strategy the listener runs synchronously,
/// while the strategy's internal state is borrowed. It must not call back
/// into the same strategy or the `Cache` that owns it. Listeners registered
/// through [`CacheBuilder`](crate::CacheBuilder) run on a dedicated notifier
/// thread instead and are free of that restriction.
pub trait EvictionListener<V>: Send + Sync {
  fn on_evict(&self, key: String, value: V, reason: EvictionReason);
}

impl<V, F> EvictionListener<V> for F
where
  F: Fn(String, V, EvictionReason) + Send + Sync,
{
  fn on_evict(&self, key: String, value: V, reason: EvictionReason) {
    self(key, value, reason)
  }
}

/// A shared handle to a listener, as held by the strategies.
pub type SharedListener<V> = Arc<dyn EvictionListener<V>>;

/// Invokes the listener, if any.
#[inline]
pub(crate) fn notify<V>(
  listener: &Option<SharedListener<V>>,
  key: String,
  value: V,
  reason: EvictionReason,
) {
  if let Some(listener) = listener {
    listener.on_evict(key, value, reason);
  }
}
