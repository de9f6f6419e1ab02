use crate::config::GroupConfig;
use crate::error::{Error, Result};
use crate::group::Group;
use crate::retriever::Retriever;

use std::fmt;
use std::sync::Arc;

use ahash::HashMap;
use parking_lot::RwLock;

/// Owns the groups of one application. Each name is registered at most once.
#[derive(Default)]
pub struct GroupRegistry {
  groups: RwLock<HashMap<String, Arc<Group>>>,
}

impl GroupRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Creates and registers a group.
  ///
  /// Fails with [`Error::DoubleRegistration`] if the name is taken; use
  /// [`get_group`](Self::get_group) to reach an existing group.
  pub fn new_group<R>(&self, name: &str, config: &GroupConfig, retriever: R) -> Result<Arc<Group>>
  where
    R: Retriever + 'static,
  {
    if name.is_empty() {
      return Err(Error::InvalidArgument("group name must not be empty".to_owned()));
    }

    let mut groups = self.groups.write();
    if groups.contains_key(name) {
      return Err(Error::DoubleRegistration(format!("group '{}'", name)));
    }
    let group = Arc::new(Group::new(name, config, retriever)?);
    groups.insert(name.to_owned(), group.clone());
    Ok(group)
  }

  pub fn get_group(&self, name: &str) -> Option<Arc<Group>> {
    self.groups.read().get(name).cloned()
  }

  /// Unregisters a group and shuts it down. Callers still holding the group
  /// keep a working handle without background sweeps.
  pub fn destroy_group(&self, name: &str) -> Option<Arc<Group>> {
    let group = self.groups.write().remove(name)?;
    group.shutdown();
    tracing::info!(group = %name, "group destroyed");
    Some(group)
  }

  /// Registered group names, sorted.
  pub fn group_names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.groups.read().keys().cloned().collect();
    names.sort_unstable();
    names
  }

  pub fn len(&self) -> usize {
    self.groups.read().len()
  }

  pub fn is_empty(&self) -> bool {
    self.groups.read().is_empty()
  }
}

impl fmt::Debug for GroupRegistry {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("GroupRegistry")
      .field("groups", &self.group_names())
      .finish()
  }
}
