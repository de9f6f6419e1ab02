//! Background threads owned by a cache: the janitor that sweeps expired
//! entries and the notifier that runs eviction listeners.

pub mod janitor;
pub(crate) mod notifier;
