//! Read-only view of the distributed-coloring collaborator.
//!
//! Derivation needs three things from the runtime that owns the partition:
//! the current color, the local↔global index maps of every index space, and
//! (optionally) the intermediate map that pre-assigns global ids to edges and
//! faces by their vertex sets. The engine never mutates any of them.
//!
//! [`SerialContext`] is the in-process implementation used for single
//! partition runs and tests.

use std::collections::BTreeMap;

use hashbrown::HashMap;

/// Ordered `usize -> usize` map (local→global or global→local).
pub type IndexMap = BTreeMap<usize, usize>;

/// Sorted vertex global ids → global id of the entity they define.
pub type IntermediateMap = BTreeMap<Vec<usize>, usize>;

pub trait MeshContext {
    /// The partition this topology belongs to.
    fn color(&self) -> usize;

    /// Local (color-compacted) id → global id, for one index space.
    fn index_map(&self, index_space: usize) -> Option<&IndexMap>;

    /// Global id → local id, for one index space. Iteration order (ascending
    /// global id) is the "color order" cells are visited in.
    fn reverse_index_map(&self, index_space: usize) -> Option<&IndexMap>;

    /// Vertex-set key → global id for intermediate entities of `dimension`
    /// in `domain`. `None` or an empty map means ids follow discovery order.
    fn reverse_intermediate_map(&self, dimension: usize, domain: usize)
    -> Option<&IntermediateMap>;
}

/// Compile-time no-op collaborator for serial runs.
#[derive(Clone, Debug, Default)]
pub struct SerialContext {
    color: usize,
    index_maps: HashMap<usize, IndexMap>,
    reverse_index_maps: HashMap<usize, IndexMap>,
    intermediate_maps: HashMap<(usize, usize), IntermediateMap>,
}

impl SerialContext {
    pub fn new(color: usize) -> Self {
        Self {
            color,
            ..Default::default()
        }
    }

    /// Register the local→global map of `index_space`; the reverse map is
    /// derived from it.
    pub fn with_index_map(
        mut self,
        index_space: usize,
        local_to_global: impl IntoIterator<Item = (usize, usize)>,
    ) -> Self {
        let forward: IndexMap = local_to_global.into_iter().collect();
        let reverse: IndexMap = forward.iter().map(|(&l, &g)| (g, l)).collect();
        self.index_maps.insert(index_space, forward);
        self.reverse_index_maps.insert(index_space, reverse);
        self
    }

    /// Register the intermediate map for `(dimension, domain)`. Keys are
    /// sorted before insertion.
    pub fn with_intermediate_map(
        mut self,
        dimension: usize,
        domain: usize,
        entries: impl IntoIterator<Item = (Vec<usize>, usize)>,
    ) -> Self {
        let map = entries
            .into_iter()
            .map(|(mut key, gid)| {
                key.sort_unstable();
                (key, gid)
            })
            .collect();
        self.intermediate_maps.insert((dimension, domain), map);
        self
    }
}

impl MeshContext for SerialContext {
    fn color(&self) -> usize {
        self.color
    }

    fn index_map(&self, index_space: usize) -> Option<&IndexMap> {
        self.index_maps.get(&index_space)
    }

    fn reverse_index_map(&self, index_space: usize) -> Option<&IndexMap> {
        self.reverse_index_maps.get(&index_space)
    }

    fn reverse_intermediate_map(
        &self,
        dimension: usize,
        domain: usize,
    ) -> Option<&IntermediateMap> {
        self.intermediate_maps.get(&(dimension, domain))
    }
}
