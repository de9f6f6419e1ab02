//! Consistent hashing with virtual nodes.

use std::collections::BTreeSet;
use std::fmt;
use std::hash::Hasher;

use ahash::{HashMap, HashMapExt};
use twox_hash::XxHash32;

/// Hashes bytes onto the ring.
pub type HashFn = fn(&[u8]) -> u32;

/// XxHash32 with seed 0. Stable across processes and platforms, so every peer
/// computes the same owner for a key.
pub fn xxhash32(data: &[u8]) -> u32 {
  let mut hasher = XxHash32::with_seed(0);
  hasher.write(data);
  hasher.finish() as u32
}

/// Maps keys to named nodes. Each node occupies `replicas` points on the ring;
/// a key belongs to the node owning the first point at or after its hash.
#[derive(Clone)]
pub struct HashRing {
  hash: HashFn,
  replicas: usize,
  /// Distinct virtual node hashes, sorted ascending.
  points: Vec<u32>,
  /// Every node claiming a point. The smallest name answers lookups, so a
  /// collision never depends on add or remove order.
  owners: HashMap<u32, BTreeSet<String>>,
}

impl HashRing {
  pub fn new(replicas: usize) -> Self {
    Self::with_hash(replicas, xxhash32)
  }

  pub fn with_hash(replicas: usize, hash: HashFn) -> Self {
    Self {
      hash,
      replicas: replicas.max(1),
      points: Vec::new(),
      owners: HashMap::new(),
    }
  }

  fn point(&self, node: &str, replica: usize) -> u32 {
    (self.hash)(format!("{}{}", node, replica).as_bytes())
  }

  /// Adds real nodes, `replicas` virtual points each, and re-sorts once.
  pub fn add_nodes<I, S>(&mut self, nodes: I)
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    for node in nodes {
      let node = node.as_ref();
      for replica in 0..self.replicas {
        let point = self.point(node, replica);
        let claimants = self.owners.entry(point).or_default();
        if claimants.is_empty() {
          self.points.push(point);
        }
        claimants.insert(node.to_owned());
      }
    }
    self.points.sort_unstable();
  }

  /// Removes a real node and all of its virtual points in a single pass.
  /// Points shared with another node stay on the ring.
  pub fn remove_node(&mut self, node: &str) {
    let mut emptied = false;
    for replica in 0..self.replicas {
      let point = self.point(node, replica);
      if let Some(claimants) = self.owners.get_mut(&point) {
        claimants.remove(node);
        if claimants.is_empty() {
          self.owners.remove(&point);
          emptied = true;
        }
      }
    }
    if emptied {
      let owners = &self.owners;
      self.points.retain(|point| owners.contains_key(point));
    }
  }

  /// Returns the node owning `key`, or `None` for an empty ring or key.
  pub fn get_node(&self, key: &str) -> Option<&str> {
    if key.is_empty() || self.points.is_empty() {
      return None;
    }
    let hash = (self.hash)(key.as_bytes());
    let mut index = self.points.partition_point(|point| *point < hash);
    if index == self.points.len() {
      index = 0;
    }
    self
      .owners
      .get(&self.points[index])
      .and_then(|claimants| claimants.first())
      .map(String::as_str)
  }

  /// The distinct real nodes on the ring, sorted.
  pub fn nodes(&self) -> Vec<String> {
    let nodes: BTreeSet<&String> = self.owners.values().flatten().collect();
    nodes.into_iter().cloned().collect()
  }

  pub fn replicas(&self) -> usize {
    self.replicas
  }

  /// Number of distinct virtual points on the ring.
  pub fn len(&self) -> usize {
    self.points.len()
  }

  pub fn is_empty(&self) -> bool {
    self.points.is_empty()
  }
}

impl fmt::Debug for HashRing {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("HashRing")
      .field("replicas", &self.replicas)
      .field("points", &self.points.len())
      .field("nodes", &self.nodes())
      .finish()
  }
}
