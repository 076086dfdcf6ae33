//! Runtime options of a [`MeshTopology`](crate::topology::mesh::MeshTopology).
//!
//! Structural choices (dimensions, domains, entity types, declared
//! connectivities) live in the [`MeshPolicy`](crate::topology::policy::MeshPolicy);
//! this struct only carries knobs that do not change results.

/// Default initial capacity of the serialization buffer (1 MiB).
pub const DEFAULT_SERIALIZE_BLOCK: usize = 1 << 20;

#[derive(Clone, Debug, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TopologyConfig {
    /// Initial capacity of the buffer built by `serialize`; it grows
    /// geometrically past that.
    pub serialize_block_size: usize,
    /// Validate every table right after a derivation primitive produces it
    /// and report violations as errors.
    pub check_invariants: bool,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            serialize_block_size: DEFAULT_SERIALIZE_BLOCK,
            check_invariants: cfg!(any(debug_assertions, feature = "check-invariants")),
        }
    }
}
