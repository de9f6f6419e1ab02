use shoal_cache::BuildError;

use thiserror::Error;

/// The error type for group operations.
///
/// `Clone` so that one in-flight load can hand the same result to every
/// caller waiting on it.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  #[error("unsupported cache strategy '{0}'")]
  UnsupportedStrategy(String),

  #[error("key '{0}' not found")]
  NotFound(String),

  #[error("remote fetch for key '{key}' failed: {reason}")]
  RemoteFetchFailed { key: String, reason: String },

  #[error("source of truth unavailable: {0}")]
  SourceUnavailable(String),

  #[error("{0} is already registered")]
  DoubleRegistration(String),

  #[error("invalid configuration value for '{field}': {message}")]
  Config { field: String, message: String },
}

impl Error {
  pub(crate) fn config(field: &str, message: impl Into<String>) -> Self {
    Error::Config {
      field: field.to_owned(),
      message: message.into(),
    }
  }
}

impl From<BuildError> for Error {
  fn from(err: BuildError) -> Self {
    match err {
      BuildError::UnsupportedStrategy(name) => Error::UnsupportedStrategy(name),
      BuildError::ZeroSegments => Error::config("lru_segments", "must be at least 1"),
      BuildError::ZeroInterval => Error::config("cleanup_interval", "must be greater than zero"),
    }
  }
}

/// A specialized `Result` type for `shoal_group` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
