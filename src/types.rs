// Fast hash maps / sets using AHash instead of the default SipHash.
// Import these with `use crate::types::{HashMap, HashSet}`; add
// `HashMapExt` / `HashSetExt` for `::new()` / `::with_capacity()`.
pub(crate) type HashMap<K, V> = ahash::HashMap<K, V>;
pub(crate) type HashSet<K> = ahash::HashSet<K>;
pub(crate) use ahash::HashMapExt;
pub(crate) use ahash::HashSetExt;

/// Genome-wide running fragment ordinal assigned during genome digestion.
pub type FragmentId = u64;
