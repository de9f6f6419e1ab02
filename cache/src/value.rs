use std::fmt;
use std::ops::Deref;

use bytes::Bytes;

/// A payload that can be stored in the cache.
///
/// The only thing the eviction engine needs to know about a value is how many
/// bytes it accounts for. Stored values are never handed out by reference;
/// every read returns a clone, so `Clone` should be cheap.
pub trait Value: Clone + Send + Sync + 'static {
  /// The number of bytes this value accounts for against the capacity.
  fn len(&self) -> usize;

  /// Returns `true` if the value accounts for zero bytes.
  fn is_empty(&self) -> bool {
    self.len() == 0
  }
}

/// An immutable view over a byte buffer.
///
/// Cloning a `ByteView` is O(1); the underlying storage is shared and can
/// never be mutated, so clones handed to callers cannot affect the copy held
/// by the cache.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct ByteView {
  bytes: Bytes,
}

impl ByteView {
  /// Creates a view over the given bytes.
  pub fn new(bytes: impl Into<Bytes>) -> Self {
    Self { bytes: bytes.into() }
  }

  /// Creates a view by copying the given slice.
  pub fn copy_from_slice(data: &[u8]) -> Self {
    Self {
      bytes: Bytes::copy_from_slice(data),
    }
  }

  /// Returns the contents as a byte slice.
  pub fn as_slice(&self) -> &[u8] {
    &self.bytes
  }

  /// Returns an owned copy of the contents.
  pub fn to_vec(&self) -> Vec<u8> {
    self.bytes.to_vec()
  }

  /// Consumes the view and returns the shared buffer.
  pub fn into_bytes(self) -> Bytes {
    self.bytes
  }

  /// Interprets the contents as UTF-8, replacing invalid sequences.
  pub fn to_string_lossy(&self) -> String {
    String::from_utf8_lossy(&self.bytes).into_owned()
  }
}

impl Value for ByteView {
  fn len(&self) -> usize {
    self.bytes.len()
  }
}

impl Deref for ByteView {
  type Target = [u8];

  fn deref(&self) -> &[u8] {
    &self.bytes
  }
}

impl AsRef<[u8]> for ByteView {
  fn as_ref(&self) -> &[u8] {
    &self.bytes
  }
}

impl From<Bytes> for ByteView {
  fn from(bytes: Bytes) -> Self {
    Self { bytes }
  }
}

impl From<Vec<u8>> for ByteView {
  fn from(data: Vec<u8>) -> Self {
    Self { bytes: data.into() }
  }
}

impl From<&'static str> for ByteView {
  fn from(data: &'static str) -> Self {
    Self {
      bytes: Bytes::from_static(data.as_bytes()),
    }
  }
}

impl From<String> for ByteView {
  fn from(data: String) -> Self {
    Self { bytes: data.into() }
  }
}

impl fmt::Debug for ByteView {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match std::str::from_utf8(&self.bytes) {
      Ok(text) => f.debug_tuple("ByteView").field(&text).finish(),
      Err(_) => f.debug_tuple("ByteView").field(&self.bytes).finish(),
    }
  }
}

impl Value for String {
  fn len(&self) -> usize {
    String::len(self)
  }
}

impl Value for Vec<u8> {
  fn len(&self) -> usize {
    Vec::len(self)
  }
}

impl Value for Bytes {
  fn len(&self) -> usize {
    Bytes::len(self)
  }
}
