use std::fmt;

/// Errors that can occur when building a cache or selecting a strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuildError {
  /// The strategy name does not match any known eviction strategy.
  UnsupportedStrategy(String),
  /// A segmented LRU was configured with zero segments.
  ZeroSegments,
  /// A cleanup interval of zero was requested for the background janitor.
  ZeroInterval,
}

impl fmt::Display for BuildError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      BuildError::UnsupportedStrategy(name) => {
        write!(f, "unsupported cache strategy '{}' (expected fifo, lru, lfu or arc)", name)
      }
      BuildError::ZeroSegments => write!(f, "lru segment count cannot be zero"),
      BuildError::ZeroInterval => write!(f, "cleanup interval cannot be zero"),
    }
  }
}

impl std::error::Error for BuildError {}
