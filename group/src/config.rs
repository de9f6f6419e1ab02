use crate::error::{Error, Result};
use crate::peers::DEFAULT_REPLICAS;

use shoal_cache::StrategyKind;

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for one group. Durations are written in humantime form, e.g.
/// `"30s"` or `"5m"`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GroupConfig {
  /// Eviction strategy name: `fifo`, `lru`, `lfu` or `arc`.
  pub strategy: String,
  /// Byte budget of the group's cache; `0` is unbounded.
  pub capacity_bytes: u64,
  /// Entries untouched for this long are swept. `None` keeps entries until
  /// they are evicted for capacity.
  #[serde(with = "humantime_opt")]
  pub ttl: Option<Duration>,
  /// How often the TTL sweep runs. Defaults to the TTL, capped at one second.
  #[serde(with = "humantime_opt")]
  pub cleanup_interval: Option<Duration>,
  /// Number of LRU segments.
  pub lru_segments: usize,
  /// Virtual points per peer on the hash ring.
  pub replicas: usize,
  /// How long a completed load keeps answering identical requests.
  #[serde(with = "humantime_opt")]
  pub singleflight_ttl: Option<Duration>,
  /// Deadline for each remote fetch.
  #[serde(with = "humantime_opt")]
  pub fetch_timeout: Option<Duration>,
  /// How long a key the source of truth reported missing is answered with
  /// `NotFound` without asking again. `None` disables negative caching.
  #[serde(with = "humantime_opt")]
  pub negative_ttl: Option<Duration>,
  /// Whether values fetched from a peer are also stored locally.
  pub populate_on_peer_hit: bool,
}

impl Default for GroupConfig {
  fn default() -> Self {
    Self {
      strategy: StrategyKind::Lru.as_str().to_owned(),
      capacity_bytes: 64 * 1024 * 1024,
      ttl: None,
      cleanup_interval: None,
      lru_segments: 16,
      replicas: DEFAULT_REPLICAS,
      singleflight_ttl: None,
      fetch_timeout: Some(Duration::from_secs(3)),
      negative_ttl: None,
      populate_on_peer_hit: false,
    }
  }
}

impl GroupConfig {
  /// Parses and validates a YAML document.
  pub fn from_yaml_str(yaml: &str) -> Result<Self> {
    let config: GroupConfig =
      serde_yaml::from_str(yaml).map_err(|err| Error::config("yaml", err.to_string()))?;
    config.validate()?;
    Ok(config)
  }

  /// The parsed strategy.
  pub fn strategy_kind(&self) -> Result<StrategyKind> {
    Ok(self.strategy.parse::<StrategyKind>()?)
  }

  /// Rejects settings that cannot be built.
  pub fn validate(&self) -> Result<()> {
    self.strategy_kind()?;
    if self.lru_segments == 0 {
      return Err(Error::config("lru_segments", "must be at least 1"));
    }
    if self.replicas == 0 {
      return Err(Error::config("replicas", "must be at least 1"));
    }
    for (field, value) in [
      ("ttl", self.ttl),
      ("cleanup_interval", self.cleanup_interval),
      ("negative_ttl", self.negative_ttl),
      ("fetch_timeout", self.fetch_timeout),
    ] {
      if value.is_some_and(|duration| duration.is_zero()) {
        return Err(Error::config(field, "must be greater than zero when set"));
      }
    }
    if self.cleanup_interval.is_some() && self.ttl.is_none() {
      return Err(Error::config("cleanup_interval", "requires ttl"));
    }
    Ok(())
  }
}

mod humantime_opt {
  use std::time::Duration;

  use serde::{Deserialize, Deserializer, Serializer};

  pub fn serialize<S: Serializer>(value: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    match value {
      Some(duration) => serializer.serialize_str(&humantime::format_duration(*duration).to_string()),
      None => serializer.serialize_none(),
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Duration>, D::Error> {
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw
      .map(|text| humantime::parse_duration(text.trim()).map_err(serde::de::Error::custom))
      .transpose()
  }
}
