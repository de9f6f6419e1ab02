mod common;

use common::CountingSource;

use shoal_group::{
  Bytes, Error, FetchContext, FetchError, Fetcher, Group, GroupConfig, PeerPicker, Picker,
};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

/// Routes fetches straight into another in-process group.
struct LoopbackFetcher {
  addr: String,
  target: Mutex<Weak<Group>>,
  calls: AtomicUsize,
}

impl LoopbackFetcher {
  fn new(addr: &str) -> Arc<Self> {
    Arc::new(Self {
      addr: addr.to_owned(),
      target: Mutex::new(Weak::new()),
      calls: AtomicUsize::new(0),
    })
  }

  fn connect(&self, group: &Arc<Group>) {
    *self.target.lock() = Arc::downgrade(group);
  }
}

impl Fetcher for LoopbackFetcher {
  fn fetch(&self, _ctx: &FetchContext, _group: &str, key: &str) -> Result<Bytes, FetchError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    let target = self.target.lock().upgrade().ok_or(FetchError::Transport("peer is gone".to_owned()))?;
    match target.get(key) {
      Ok(value) => Ok(value.into_bytes()),
      Err(Error::NotFound(_)) => Err(FetchError::NotFound),
      Err(err) => Err(FetchError::Transport(err.to_string())),
    }
  }

  fn peer(&self) -> &str {
    &self.addr
  }
}

/// Always fails, either immediately or by overrunning the deadline.
struct BrokenFetcher {
  stall: Option<Duration>,
}

impl Fetcher for BrokenFetcher {
  fn fetch(&self, _ctx: &FetchContext, _group: &str, _key: &str) -> Result<Bytes, FetchError> {
    match self.stall {
      Some(stall) => {
        thread::sleep(stall);
        Ok(Bytes::from_static(b"too late"))
      }
      None => Err(FetchError::Transport("connection refused".to_owned())),
    }
  }
}

/// The first `count` keys of the form `user:N` that `picker` routes to `addr`.
fn keys_owned_by(picker: &PeerPicker, addr: &str, count: usize) -> Vec<String> {
  (0..)
    .map(|i| format!("user:{}", i))
    .filter(|key| picker.owner(key).as_deref() == Some(addr))
    .take(count)
    .collect()
}

struct Cluster {
  a: Arc<Group>,
  b: Arc<Group>,
  source_a: Arc<CountingSource>,
  source_b: Arc<CountingSource>,
  picker_a: Arc<PeerPicker>,
  to_b: Arc<LoopbackFetcher>,
}

fn cluster(config: &GroupConfig) -> Cluster {
  let entries: Vec<(String, String)> = (0..200).map(|i| (format!("user:{}", i), format!("score-{}", i))).collect();
  let entries: Vec<(&str, &str)> = entries.iter().map(|(k, v)| (k.as_str(), v.as_str())).collect();

  let source_a = CountingSource::new(&entries);
  let source_b = CountingSource::new(&entries);
  let a = Arc::new(Group::with_retriever("scores", config, source_a.clone()).unwrap());
  let b = Arc::new(Group::with_retriever("scores", config, source_b.clone()).unwrap());

  let to_a = LoopbackFetcher::new("a:1");
  let to_b = LoopbackFetcher::new("b:1");
  to_a.connect(&a);
  to_b.connect(&b);

  let picker_a = Arc::new(PeerPicker::new("a:1", 50).unwrap());
  let fetcher_b: Arc<dyn Fetcher> = to_b.clone();
  picker_a.set_peers(["a:1", "b:1"], |_: &str| fetcher_b.clone()).unwrap();
  let picker_b = Arc::new(PeerPicker::new("b:1", 50).unwrap());
  let fetcher_a: Arc<dyn Fetcher> = to_a.clone();
  picker_b.set_peers(["a:1", "b:1"], |_: &str| fetcher_a.clone()).unwrap();

  a.register_peers(picker_a.clone()).unwrap();
  b.register_peers(picker_b).unwrap();

  Cluster {
    a,
    b,
    source_a,
    source_b,
    picker_a,
    to_b,
  }
}

#[test_log::test]
fn remote_keys_are_fetched_from_their_owner() {
  let c = cluster(&GroupConfig::default());
  let remote = keys_owned_by(&c.picker_a, "b:1", 5);

  for key in &remote {
    let value = c.a.get(key).unwrap();
    assert_eq!(value.to_string_lossy(), format!("score-{}", &key["user:".len()..]));
  }

  assert_eq!(c.source_a.calls(), 0, "a never touched its source for b's keys");
  assert_eq!(c.source_b.calls(), 5);
  assert_eq!(c.to_b.calls.load(Ordering::SeqCst), 5);
  assert_eq!(c.a.stats().peer_loads, 5);
  assert!(c.a.cache().is_empty(), "peer results are not cached by default");
  assert_eq!(c.b.cache().len(), 5, "the owner caches what it loaded");
}

#[test_log::test]
fn local_keys_skip_the_network() {
  let c = cluster(&GroupConfig::default());
  let local = keys_owned_by(&c.picker_a, "a:1", 5);

  for key in &local {
    c.a.get(key).unwrap();
  }
  assert_eq!(c.to_b.calls.load(Ordering::SeqCst), 0);
  assert_eq!(c.source_a.calls(), 5);
  assert_eq!(c.a.cache().len(), 5);
}

#[test_log::test]
fn peer_hits_can_populate_the_local_cache() {
  let config = GroupConfig {
    populate_on_peer_hit: true,
    ..GroupConfig::default()
  };
  let c = cluster(&config);
  let key = &keys_owned_by(&c.picker_a, "b:1", 1)[0];

  c.a.get(key).unwrap();
  c.a.get(key).unwrap();
  assert_eq!(c.to_b.calls.load(Ordering::SeqCst), 1, "second get hit a's cache");
  assert!(c.a.cache().get(key).is_some());
}

#[test_log::test]
fn peer_not_found_falls_back_and_reports_not_found() {
  let c = cluster(&GroupConfig::default());
  let picker = &c.picker_a;
  let missing = (1000..)
    .map(|i| format!("user:{}", i))
    .find(|key| picker.owner(key).as_deref() == Some("b:1"))
    .unwrap();

  assert_eq!(c.a.get(&missing).unwrap_err(), Error::NotFound(missing.clone()));
  assert_eq!(c.source_a.calls(), 1, "fell back to the local source");
  assert_eq!(c.a.stats().peer_errors, 1);
}

#[test_log::test]
fn transport_failure_falls_back_to_the_source() {
  let source = CountingSource::new(&[("alice", "100")]);
  let group = Group::with_retriever("scores", &GroupConfig::default(), source.clone()).unwrap();

  let picker = Arc::new(PeerPicker::new("a:1", 50).unwrap());
  picker
    .set_peers(["b:1"], |_: &str| Arc::new(BrokenFetcher { stall: None }) as Arc<dyn Fetcher>)
    .unwrap();
  group.register_peers(picker).unwrap();

  assert_eq!(group.get("alice").unwrap().as_slice(), b"100");
  assert_eq!(source.calls(), 1);
  assert_eq!(group.stats().peer_errors, 1);
  assert_eq!(group.cache().len(), 1, "locally loaded values are cached");
}

#[test_log::test]
fn late_peer_responses_count_as_failures() {
  let source = CountingSource::new(&[("alice", "100")]);
  let config = GroupConfig {
    fetch_timeout: Some(Duration::from_millis(20)),
    ..GroupConfig::default()
  };
  let group = Group::with_retriever("scores", &config, source.clone()).unwrap();

  let picker = Arc::new(PeerPicker::new("a:1", 50).unwrap());
  picker
    .set_peers(["b:1"], |_: &str| {
      Arc::new(BrokenFetcher {
        stall: Some(Duration::from_millis(60)),
      }) as Arc<dyn Fetcher>
    })
    .unwrap();
  group.register_peers(picker).unwrap();

  assert_eq!(group.get("alice").unwrap().as_slice(), b"100");
  assert_eq!(source.calls(), 1);
  assert_eq!(group.stats().peer_errors, 1);
}

#[test_log::test]
fn picker_registers_once() {
  let source = CountingSource::new(&[]);
  let group = Group::with_retriever("scores", &GroupConfig::default(), source).unwrap();
  let picker: Arc<dyn Picker> = Arc::new(PeerPicker::new("a:1", 50).unwrap());

  group.register_peers(picker.clone()).unwrap();
  assert!(matches!(
    group.register_peers(picker),
    Err(Error::DoubleRegistration(_))
  ));
}

#[test_log::test]
fn peer_set_changes_are_atomic_for_readers() {
  let picker = Arc::new(PeerPicker::new("a:1", 50).unwrap());
  let fetcher: Arc<dyn Fetcher> = Arc::new(BrokenFetcher { stall: None });
  let sets: [&[&str]; 2] = [&["a:1", "b:1"], &["a:1", "c:1", "d:1"]];

  let reader = {
    let picker = picker.clone();
    thread::spawn(move || {
      for i in 0..20_000 {
        if let Some(owner) = picker.owner(&format!("k{}", i)) {
          assert!(["a:1", "b:1", "c:1", "d:1"].contains(&owner.as_str()));
        }
      }
    })
  };

  for round in 0..200 {
    picker
      .set_peers(sets[round % 2].iter().copied(), |_: &str| fetcher.clone())
      .unwrap();
  }
  reader.join().unwrap();
  assert_eq!(picker.peers(), vec!["a:1", "c:1", "d:1"]);
}
