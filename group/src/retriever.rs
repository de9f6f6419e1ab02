use bytes::Bytes;
use thiserror::Error;

/// Why the source of truth could not produce a value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrieveError {
  #[error("key not found in the source of truth")]
  NotFound,
  #[error("{0}")]
  Unavailable(String),
}

/// Loads a key from the source of truth on a full cache miss.
///
/// Called synchronously inside the deduplicated load path: never concurrently
/// for the same key, but possibly concurrently for different keys.
pub trait Retriever: Send + Sync {
  fn retrieve(&self, key: &str) -> Result<Bytes, RetrieveError>;
}

impl<F> Retriever for F
where
  F: Fn(&str) -> Result<Bytes, RetrieveError> + Send + Sync,
{
  fn retrieve(&self, key: &str) -> Result<Bytes, RetrieveError> {
    self(key)
  }
}
