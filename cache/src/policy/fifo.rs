use super::ordered::OrderedStrategy;

/// Evicts entries in insertion order. Reads never change that order.
pub type Fifo<V> = OrderedStrategy<V, false>;
