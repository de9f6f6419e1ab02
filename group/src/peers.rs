//! Peer routing: which process owns a key, and how to ask it.

use crate::error::{Error, Result};
use crate::ring::HashRing;

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use ahash::HashMap;
use arc_swap::ArcSwap;
use bytes::Bytes;
use thiserror::Error;

/// The default number of virtual points per peer on the ring.
pub const DEFAULT_REPLICAS: usize = 50;

/// Deadline carried by every remote fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchContext {
  deadline: Option<Instant>,
}

impl FetchContext {
  /// A context expiring `timeout` from now, or never for `None`.
  pub fn new(timeout: Option<Duration>) -> Self {
    Self {
      deadline: timeout.map(|timeout| Instant::now() + timeout),
    }
  }

  pub fn with_deadline(deadline: Instant) -> Self {
    Self {
      deadline: Some(deadline),
    }
  }

  pub fn unbounded() -> Self {
    Self { deadline: None }
  }

  pub fn deadline(&self) -> Option<Instant> {
    self.deadline
  }

  /// Time left before the deadline; `None` when unbounded.
  pub fn remaining(&self) -> Option<Duration> {
    self
      .deadline
      .map(|deadline| deadline.saturating_duration_since(Instant::now()))
  }

  pub fn is_expired(&self) -> bool {
    self.deadline.map_or(false, |deadline| Instant::now() >= deadline)
  }
}

/// Why a remote fetch failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
  #[error("deadline exceeded")]
  Timeout,
  #[error("transport error: {0}")]
  Transport(String),
  #[error("peer has no value for the key")]
  NotFound,
}

/// Retrieves a key from one remote peer. Implemented by transports.
pub trait Fetcher: Send + Sync {
  /// Fetches `key` of `group` from the peer. Implementations should give up
  /// once `ctx` expires and return [`FetchError::Timeout`].
  fn fetch(&self, ctx: &FetchContext, group: &str, key: &str) -> Result<Bytes, FetchError>;

  /// The peer's address, for logging.
  fn peer(&self) -> &str {
    ""
  }
}

/// Chooses the peer that owns a key.
pub trait Picker: Send + Sync {
  /// Returns the owning peer's fetcher, or `None` when the key should be
  /// loaded locally (no peers, or this process owns it).
  fn pick(&self, key: &str) -> Option<Arc<dyn Fetcher>>;

  /// Releases transport resources. Called when the owning group is destroyed.
  fn shutdown(&self) {}
}

struct PeerSet {
  ring: HashRing,
  fetchers: HashMap<String, Arc<dyn Fetcher>>,
}

/// A [`Picker`] over a consistent-hash ring of `host:port` peers.
///
/// The ring and the fetcher map are rebuilt together off to the side and
/// published with a single atomic swap, so `pick` always sees one complete
/// peer set.
pub struct PeerPicker {
  self_addr: String,
  replicas: usize,
  peers: ArcSwap<PeerSet>,
}

impl PeerPicker {
  /// Creates a picker for the process listening on `self_addr`.
  pub fn new(self_addr: impl Into<String>, replicas: usize) -> Result<Self> {
    let self_addr = self_addr.into();
    validate_addr(&self_addr)?;
    if replicas == 0 {
      return Err(Error::config("replicas", "must be at least 1"));
    }
    Ok(Self {
      self_addr,
      replicas,
      peers: ArcSwap::from_pointee(PeerSet {
        ring: HashRing::new(replicas),
        fetchers: HashMap::default(),
      }),
    })
  }

  pub fn self_addr(&self) -> &str {
    &self.self_addr
  }

  /// Replaces the peer set.
  ///
  /// `factory` builds a fetcher for every peer except this process. Every
  /// address is validated before anything is built, so a bad address leaves
  /// the current peer set untouched.
  pub fn set_peers<I, S, F>(&self, addrs: I, mut factory: F) -> Result<()>
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
    F: FnMut(&str) -> Arc<dyn Fetcher>,
  {
    let mut addrs: Vec<String> = addrs.into_iter().map(|addr| addr.as_ref().to_owned()).collect();
    for addr in &addrs {
      validate_addr(addr)?;
    }
    addrs.sort_unstable();
    addrs.dedup();

    let mut ring = HashRing::new(self.replicas);
    ring.add_nodes(&addrs);
    let fetchers = addrs
      .iter()
      .filter(|addr| **addr != self.self_addr)
      .map(|addr| (addr.clone(), factory(addr)))
      .collect();

    self.peers.store(Arc::new(PeerSet { ring, fetchers }));
    tracing::info!(self_addr = %self.self_addr, peers = ?addrs, "peer set replaced");
    Ok(())
  }

  /// The peers currently on the ring, sorted.
  pub fn peers(&self) -> Vec<String> {
    self.peers.load().ring.nodes()
  }

  /// The address owning `key`, which may be this process.
  pub fn owner(&self, key: &str) -> Option<String> {
    self.peers.load().ring.get_node(key).map(str::to_owned)
  }
}

impl Picker for PeerPicker {
  fn pick(&self, key: &str) -> Option<Arc<dyn Fetcher>> {
    let peers = self.peers.load();
    let owner = peers.ring.get_node(key)?;
    if owner == self.self_addr {
      return None;
    }
    tracing::trace!(key, peer = owner, "picked remote peer");
    peers.fetchers.get(owner).cloned()
  }

  fn shutdown(&self) {
    self.peers.store(Arc::new(PeerSet {
      ring: HashRing::new(self.replicas),
      fetchers: HashMap::default(),
    }));
    tracing::debug!(self_addr = %self.self_addr, "peer picker shut down");
  }
}

impl fmt::Debug for PeerPicker {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("PeerPicker")
      .field("self_addr", &self.self_addr)
      .field("replicas", &self.replicas)
      .field("peers", &self.peers())
      .finish()
  }
}

/// Accepts `host:port` with a non-empty host and a non-zero port.
pub fn validate_addr(addr: &str) -> Result<()> {
  let invalid = || Error::InvalidArgument(format!("peer address '{}' is not host:port", addr));
  let (host, port) = addr.rsplit_once(':').ok_or_else(invalid)?;
  if host.is_empty() || host.contains(char::is_whitespace) {
    return Err(invalid());
  }
  match port.parse::<u16>() {
    Ok(port) if port > 0 => Ok(()),
    _ => Err(invalid()),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  struct NamedFetcher(String);

  impl Fetcher for NamedFetcher {
    fn fetch(&self, _ctx: &FetchContext, _group: &str, key: &str) -> Result<Bytes, FetchError> {
      Ok(Bytes::from(format!("{}@{}", key, self.0)))
    }

    fn peer(&self) -> &str {
      &self.0
    }
  }

  fn factory(addr: &str) -> Arc<dyn Fetcher> {
    Arc::new(NamedFetcher(addr.to_owned()))
  }

  #[test]
  fn address_validation() {
    for good in ["localhost:8001", "10.0.0.1:1", "[::1]:9999", "cache-0.svc:65535"] {
      assert!(validate_addr(good).is_ok(), "{good}");
    }
    for bad in ["", "localhost", ":8001", "host:", "host:0", "host:70000", "host:port", "a b:1"] {
      assert!(
        matches!(validate_addr(bad), Err(Error::InvalidArgument(_))),
        "{bad}"
      );
    }
  }

  #[test]
  fn empty_peer_set_picks_nothing() {
    let picker = PeerPicker::new("localhost:8001", DEFAULT_REPLICAS).unwrap();
    assert!(picker.pick("alice").is_none());
    assert!(picker.peers().is_empty());
  }

  #[test]
  fn self_owned_keys_are_local() {
    let picker = PeerPicker::new("a:1", DEFAULT_REPLICAS).unwrap();
    picker.set_peers(["a:1", "b:1", "c:1"], factory).unwrap();

    let mut local = 0;
    let mut remote = 0;
    for i in 0..300 {
      let key = format!("key-{}", i);
      let owner = picker.owner(&key).unwrap();
      match picker.pick(&key) {
        None => {
          assert_eq!(owner, "a:1");
          local += 1;
        }
        Some(fetcher) => {
          assert_eq!(fetcher.peer(), owner);
          assert_ne!(owner, "a:1");
          remote += 1;
        }
      }
    }
    assert!(local > 0 && remote > 0);
  }

  #[test]
  fn invalid_address_keeps_the_current_set() {
    let picker = PeerPicker::new("a:1", DEFAULT_REPLICAS).unwrap();
    picker.set_peers(["a:1", "b:1"], factory).unwrap();

    let err = picker.set_peers(["a:1", "nonsense"], factory).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert_eq!(picker.peers(), vec!["a:1", "b:1"]);
  }

  #[test]
  fn no_fetcher_is_built_for_self() {
    let picker = PeerPicker::new("a:1", 10).unwrap();
    let mut built = Vec::new();
    picker
      .set_peers(["b:1", "a:1", "c:1", "b:1"], |addr: &str| {
        built.push(addr.to_owned());
        factory(addr)
      })
      .unwrap();
    assert_eq!(built, vec!["b:1", "c:1"]);
  }

  #[test]
  fn shutdown_clears_the_ring() {
    let picker = PeerPicker::new("a:1", 10).unwrap();
    picker.set_peers(["b:1"], factory).unwrap();
    assert!(picker.pick("k").is_some());
    picker.shutdown();
    assert!(picker.pick("k").is_none());
  }

  #[test]
  fn fetch_context_deadlines() {
    assert!(!FetchContext::unbounded().is_expired());
    assert_eq!(FetchContext::new(None).remaining(), None);

    let ctx = FetchContext::new(Some(Duration::from_secs(60)));
    assert!(!ctx.is_expired());
    assert!(ctx.remaining().unwrap() > Duration::from_secs(59));

    let past = FetchContext::with_deadline(Instant::now());
    std::thread::sleep(Duration::from_millis(1));
    assert!(past.is_expired());
    assert_eq!(past.remaining(), Some(Duration::ZERO));
  }
}
