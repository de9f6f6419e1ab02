//! A byte-bounded, thread-safe cache with pluggable eviction strategies.
//!
//! # Features
//! - **Four strategies**: FIFO, LRU (segmented for low contention), LFU and
//!   ARC, selected by [`StrategyKind`] or by name.
//! - **Byte accounting**: every entry costs `key.len() + value.len()` against
//!   the configured capacity.
//! - **TTL sweeps**: a background [`Janitor`] removes entries that have not
//!   been touched within the TTL; it can be replaced or stopped at runtime.
//! - **Eviction listeners**: run on a dedicated notifier thread, outside of
//!   any cache lock.
//! - **Metrics**: hit/miss and eviction counters via [`MetricsSnapshot`].

pub mod builder;
pub mod cache;
pub mod entry;
pub mod error;
pub mod listener;
pub mod metrics;
pub mod policy;
pub mod task;
pub mod value;

pub use builder::CacheBuilder;
pub use cache::Cache;
pub use entry::Entry;
pub use error::BuildError;
pub use listener::{EvictionListener, EvictionReason, SharedListener};
pub use metrics::MetricsSnapshot;
pub use policy::{new_strategy, CacheStrategy, Hit, Strategy, StrategyKind};
pub use task::janitor::Janitor;
pub use value::{ByteView, Value};
