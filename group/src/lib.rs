//! Distributed cache groups in the groupcache style.
//!
//! Every process holds a partition of a shared namespace. A [`Group`]
//! answers `get` from its local [`shoal_cache::Cache`]; on a miss it runs a
//! single deduplicated load that asks the peer owning the key (chosen on a
//! consistent-hash [`HashRing`]) and falls back to the source of truth, a
//! [`Retriever`].
//!
//! Transports are external: they implement [`Fetcher`] for outgoing requests
//! and call [`Group::get`] for incoming ones.

pub mod config;
pub mod error;
pub mod group;
pub mod peers;
pub mod registry;
pub mod retriever;
pub mod ring;
pub mod singleflight;
pub mod stats;

pub use config::GroupConfig;
pub use error::{Error, Result};
pub use group::Group;
pub use peers::{FetchContext, FetchError, Fetcher, PeerPicker, Picker};
pub use registry::GroupRegistry;
pub use retriever::{RetrieveError, Retriever};
pub use ring::HashRing;
pub use singleflight::SingleFlight;
pub use stats::GroupStatsSnapshot;

pub use bytes::Bytes;
pub use shoal_cache::{ByteView, StrategyKind};
