#![allow(dead_code)]

use shoal_group::{Bytes, RetrieveError, Retriever};

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// A source of truth backed by a map, counting calls per key.
pub struct CountingSource {
  data: HashMap<String, String>,
  delay: Duration,
  pub calls: AtomicUsize,
}

impl CountingSource {
  pub fn new(entries: &[(&str, &str)]) -> Arc<Self> {
    Self::with_delay(entries, Duration::ZERO)
  }

  pub fn with_delay(entries: &[(&str, &str)], delay: Duration) -> Arc<Self> {
    Arc::new(Self {
      data: entries
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect(),
      delay,
      calls: AtomicUsize::new(0),
    })
  }

  pub fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

impl Retriever for CountingSource {
  fn retrieve(&self, key: &str) -> Result<Bytes, RetrieveError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    if !self.delay.is_zero() {
      thread::sleep(self.delay);
    }
    match self.data.get(key) {
      Some(value) => Ok(Bytes::from(value.clone())),
      None => Err(RetrieveError::NotFound),
    }
  }
}

/// Lets an `Arc<CountingSource>` be handed to a group while the test keeps a
/// handle for assertions.
pub struct Shared(pub Arc<CountingSource>);

impl Retriever for Shared {
  fn retrieve(&self, key: &str) -> Result<Bytes, RetrieveError> {
    self.0.retrieve(key)
  }
}
