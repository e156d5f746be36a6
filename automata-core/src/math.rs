/// Type alias for maps, we use this to hide which type of `HashMap` we are actually using.
/// Iteration follows insertion order.
pub type Map<K, V> = indexmap::IndexMap<K, V>;
