//! Eviction strategies.
//!
//! Every strategy implements [`CacheStrategy`]: a byte-bounded map from string
//! keys to [`Value`]s that decides which entry leaves when the bound is
//! exceeded. [`Strategy`] is the closed set of built-in strategies, selected
//! by [`StrategyKind`].

pub mod arc;
pub mod fifo;
pub mod lfu;
pub mod lru;
pub mod segmented;

pub(crate) mod list;
mod ordered;

use crate::error::BuildError;
use crate::listener::{notify, EvictionReason, SharedListener};
use crate::value::Value;

use std::fmt;
use std::str::FromStr;
use std::time::{Duration, Instant};

pub use arc::ArcStrategy;
pub use fifo::Fifo;
pub use lfu::Lfu;
pub use lru::Lru;
pub use ordered::OrderedStrategy;
pub use segmented::SegmentedLru;

/// A value found by [`CacheStrategy::get`], along with its last touch time.
pub type Hit<V> = (V, Option<Instant>);

/// The capability shared by all eviction strategies.
///
/// Strategies are not internally synchronized; the owning [`Cache`](crate::Cache)
/// serializes access. A capacity of `0` means unbounded.
pub trait CacheStrategy<V: Value>: Send {
  /// Looks up a key. Side effects (promotion, touch) depend on the strategy;
  /// a miss never has side effects.
  fn get(&mut self, key: &str) -> Option<Hit<V>>;

  /// Inserts or replaces a value, then evicts until the accounted size is
  /// within capacity. Returns `false` if the value is too large to store.
  fn put(&mut self, key: String, value: V) -> bool;

  /// Removes a key without notifying the listener.
  fn remove(&mut self, key: &str) -> Option<V>;

  /// Removes every entry whose TTL has elapsed. Returns how many were removed.
  fn clean_up(&mut self, ttl: Duration) -> usize;

  /// Number of resident entries.
  fn len(&self) -> usize;

  fn is_empty(&self) -> bool {
    self.len() == 0
  }

  /// Bytes currently accounted against the capacity.
  fn used_bytes(&self) -> u64;

  /// The configured byte capacity, `0` for unbounded.
  fn capacity(&self) -> u64;

  /// Drops every entry without notifying the listener.
  fn clear(&mut self);
}

/// Names one of the built-in eviction strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StrategyKind {
  Fifo,
  #[default]
  Lru,
  Lfu,
  Arc,
}

impl StrategyKind {
  pub const ALL: [StrategyKind; 4] = [
    StrategyKind::Fifo,
    StrategyKind::Lru,
    StrategyKind::Lfu,
    StrategyKind::Arc,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      StrategyKind::Fifo => "fifo",
      StrategyKind::Lru => "lru",
      StrategyKind::Lfu => "lfu",
      StrategyKind::Arc => "arc",
    }
  }

  /// Constructs a single, unsegmented strategy of this kind.
  pub fn build<V: Value>(self, capacity: u64, listener: Option<SharedListener<V>>) -> Strategy<V> {
    match self {
      StrategyKind::Fifo => Strategy::Fifo(Fifo::new(capacity, listener)),
      StrategyKind::Lru => Strategy::Lru(Lru::new(capacity, listener)),
      StrategyKind::Lfu => Strategy::Lfu(Lfu::new(capacity, listener)),
      StrategyKind::Arc => Strategy::Arc(ArcStrategy::new(capacity, listener)),
    }
  }
}

impl FromStr for StrategyKind {
  type Err = BuildError;

  /// Parses a strategy name case-insensitively.
  fn from_str(name: &str) -> Result<Self, Self::Err> {
    match name.trim().to_ascii_lowercase().as_str() {
      "fifo" => Ok(StrategyKind::Fifo),
      "lru" => Ok(StrategyKind::Lru),
      "lfu" => Ok(StrategyKind::Lfu),
      "arc" => Ok(StrategyKind::Arc),
      _ => Err(BuildError::UnsupportedStrategy(name.to_owned())),
    }
  }
}

impl fmt::Display for StrategyKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Builds a strategy from its name, e.g. `"LRU"` or `"arc"`.
pub fn new_strategy<V: Value>(
  name: &str,
  capacity: u64,
  listener: Option<SharedListener<V>>,
) -> Result<Strategy<V>, BuildError> {
  Ok(name.parse::<StrategyKind>()?.build(capacity, listener))
}

/// One of the built-in strategies.
#[derive(Debug)]
pub enum Strategy<V> {
  Fifo(Fifo<V>),
  Lru(Lru<V>),
  Lfu(Lfu<V>),
  Arc(ArcStrategy<V>),
}

impl<V> Strategy<V> {
  pub fn kind(&self) -> StrategyKind {
    match self {
      Strategy::Fifo(_) => StrategyKind::Fifo,
      Strategy::Lru(_) => StrategyKind::Lru,
      Strategy::Lfu(_) => StrategyKind::Lfu,
      Strategy::Arc(_) => StrategyKind::Arc,
    }
  }
}

macro_rules! dispatch {
  ($self:ident, $inner:ident => $body:expr) => {
    match $self {
      Strategy::Fifo($inner) => $body,
      Strategy::Lru($inner) => $body,
      Strategy::Lfu($inner) => $body,
      Strategy::Arc($inner) => $body,
    }
  };
}

impl<V: Value> CacheStrategy<V> for Strategy<V> {
  fn get(&mut self, key: &str) -> Option<Hit<V>> {
    dispatch!(self, s => s.get(key))
  }

  fn put(&mut self, key: String, value: V) -> bool {
    dispatch!(self, s => s.put(key, value))
  }

  fn remove(&mut self, key: &str) -> Option<V> {
    dispatch!(self, s => s.remove(key))
  }

  fn clean_up(&mut self, ttl: Duration) -> usize {
    dispatch!(self, s => s.clean_up(ttl))
  }

  fn len(&self) -> usize {
    dispatch!(self, s => s.len())
  }

  fn used_bytes(&self) -> u64 {
    dispatch!(self, s => s.used_bytes())
  }

  fn capacity(&self) -> u64 {
    dispatch!(self, s => s.capacity())
  }

  fn clear(&mut self) {
    dispatch!(self, s => s.clear())
  }
}

/// `true` if an entry of `size` bytes can never fit under `capacity`.
#[inline]
pub(crate) fn oversized(capacity: u64, size: u64) -> bool {
  capacity > 0 && size > capacity
}

/// `true` while `used` exceeds a bounded `capacity`.
#[inline]
pub(crate) fn over_capacity(capacity: u64, used: u64) -> bool {
  capacity > 0 && used > capacity
}

/// Hands an evicted entry to the listener.
#[inline]
pub(crate) fn evicted<V>(listener: &Option<SharedListener<V>>, key: String, value: V, reason: EvictionReason) {
  tracing::trace!(key = %key, %reason, "entry evicted");
  notify(listener, key, value, reason);
}

#[cfg(test)]
pub(crate) mod test_util {
  use super::*;

  use parking_lot::Mutex;
  use std::sync::Arc;

  /// Records every eviction it is told about.
  #[derive(Default)]
  pub(crate) struct Recorder {
    pub(crate) events: Mutex<Vec<(String, String, EvictionReason)>>,
  }

  impl Recorder {
    pub(crate) fn listener(self: &Arc<Self>) -> Option<SharedListener<String>> {
      let recorder = Arc::clone(self);
      Some(Arc::new(move |key: String, value: String, reason: EvictionReason| {
        recorder.events.lock().push((key, value, reason));
      }))
    }

    pub(crate) fn keys(&self) -> Vec<String> {
      self.events.lock().iter().map(|(k, _, _)| k.clone()).collect()
    }
  }

  /// A one-byte key with a one-byte value accounts for two bytes.
  pub(crate) fn put1<S: CacheStrategy<String>>(strategy: &mut S, key: &str) {
    strategy.put(key.to_owned(), "x".to_owned());
  }
}
