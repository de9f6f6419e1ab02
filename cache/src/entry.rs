use crate::value::Value;

use std::time::{Duration, Instant};

/// A key/value pair held by an eviction strategy, with its last touch time.
#[derive(Debug, Clone)]
pub struct Entry<V> {
  pub(crate) key: String,
  pub(crate) value: V,
  /// `None` until the entry is first touched.
  pub(crate) updated_at: Option<Instant>,
}

impl<V> Entry<V> {
  /// Creates an untouched entry.
  pub fn new(key: impl Into<String>, value: V) -> Self {
    Self {
      key: key.into(),
      value,
      updated_at: None,
    }
  }

  pub fn key(&self) -> &str {
    &self.key
  }

  pub fn value(&self) -> &V {
    &self.value
  }

  pub fn updated_at(&self) -> Option<Instant> {
    self.updated_at
  }

  /// Resets the last touch time to now.
  #[inline]
  pub fn touch(&mut self) {
    self.updated_at = Some(Instant::now());
  }

  /// Returns `true` once `updated_at + ttl` lies in the past.
  /// An untouched entry never expires.
  #[inline]
  pub fn expired(&self, ttl: Duration) -> bool {
    self.expired_at(ttl, Instant::now())
  }

  #[inline]
  pub(crate) fn expired_at(&self, ttl: Duration, now: Instant) -> bool {
    match self.updated_at {
      Some(updated_at) => updated_at
        .checked_add(ttl)
        .map_or(false, |deadline| deadline < now),
      None => false,
    }
  }

  pub(crate) fn into_parts(self) -> (String, V) {
    (self.key, self.value)
  }
}

impl<V: Value> Entry<V> {
  /// Bytes this entry accounts for: `len(key) + value.len()`.
  #[inline]
  pub fn size(&self) -> u64 {
    entry_size(&self.key, &self.value)
  }
}

#[inline]
pub(crate) fn entry_size<V: Value>(key: &str, value: &V) -> u64 {
  (key.len() + value.len()) as u64
}
