//! Flyweight entity storage for one `(domain, dimension)`.
//!
//! An [`IndexSpace`] owns its entities (boxed, never relocated once
//! appended) and keeps a parallel array of their [`EntityId`]s. Position `k`
//! holds the entity whose `id.entity() == k`; [`IndexSpace::append`] is the
//! only operation that grows the space and it updates both arrays together.

use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshTopologyError;
use crate::topology::id::EntityId;
use crate::topology::partition::{PartitionClass, PartitionSlices};

#[derive(Debug)]
pub struct IndexSpace<E> {
    domain: usize,
    dimension: usize,
    entities: Vec<Box<E>>,
    ids: Vec<EntityId>,
    partitions: PartitionSlices,
}

impl<E> IndexSpace<E> {
    pub fn new(domain: usize, dimension: usize) -> Self {
        Self {
            domain,
            dimension,
            entities: Vec::new(),
            ids: Vec::new(),
            partitions: PartitionSlices::default(),
        }
    }

    pub fn domain(&self) -> usize {
        self.domain
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Append entities with their ids.
    ///
    /// Every id must carry this space's domain and dimension and continue the
    /// dense numbering (`id.entity() == len()` for the first, and so on).
    pub fn append(
        &mut self,
        entities: Vec<Box<E>>,
        ids: Vec<EntityId>,
    ) -> Result<(), MeshTopologyError> {
        if entities.len() != ids.len() {
            return Err(MeshTopologyError::LengthMismatch {
                what: "index space entities vs ids",
                left: entities.len(),
                right: ids.len(),
            });
        }
        for (k, id) in ids.iter().enumerate() {
            let expected = self.ids.len() + k;
            if id.entity() != expected {
                return Err(MeshTopologyError::IdMismatch {
                    expected,
                    found: id.entity(),
                });
            }
            if id.domain() != self.domain || id.dimension() != self.dimension {
                return Err(MeshTopologyError::InvariantViolation(format!(
                    "id {id:?} appended to index space ({}, {})",
                    self.domain, self.dimension
                )));
            }
        }
        self.entities.extend(entities);
        self.ids.extend(ids);
        Ok(())
    }

    /// Append a single entity.
    pub fn push(&mut self, entity: E, id: EntityId) -> Result<(), MeshTopologyError> {
        self.append(vec![Box::new(entity)], vec![id])
    }

    /// Entity at a local index.
    #[inline]
    pub fn get(&self, index: usize) -> Option<&E> {
        self.entities.get(index).map(|b| b.as_ref())
    }

    #[inline]
    pub fn get_mut(&mut self, index: usize) -> Option<&mut E> {
        self.entities.get_mut(index).map(|b| b.as_mut())
    }

    /// Id at a local index.
    #[inline]
    pub fn id(&self, index: usize) -> Option<EntityId> {
        self.ids.get(index).copied()
    }

    pub fn ids(&self) -> &[EntityId] {
        &self.ids
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityId, &E)> + '_ {
        self.ids
            .iter()
            .copied()
            .zip(self.entities.iter().map(|b| b.as_ref()))
    }

    // --- partition slices ---------------------------------------------------

    pub fn set_partition(
        &mut self,
        class: PartitionClass,
        indices: impl IntoIterator<Item = usize>,
    ) -> Result<(), MeshTopologyError> {
        let size = self.len();
        self.partitions.set(class, indices, size)
    }

    pub fn partitions(&self) -> &PartitionSlices {
        &self.partitions
    }

    /// Ids restricted to a partition class, in ascending local order.
    pub fn partition_ids(&self, class: PartitionClass) -> Vec<EntityId> {
        self.partitions
            .get(class)
            .into_iter()
            .map(|i| self.ids[i])
            .collect()
    }

    /// `(id, entity)` pairs restricted to a partition class.
    pub fn partition_iter(
        &self,
        class: PartitionClass,
    ) -> impl Iterator<Item = (EntityId, &E)> + '_ {
        self.partitions
            .get(class)
            .into_iter()
            .map(move |i| (self.ids[i], self.entities[i].as_ref()))
    }
}

impl<E> DebugInvariants for IndexSpace<E> {
    fn validate_invariants(&self) -> Result<(), MeshTopologyError> {
        if self.entities.len() != self.ids.len() {
            return Err(MeshTopologyError::LengthMismatch {
                what: "index space entities vs ids",
                left: self.entities.len(),
                right: self.ids.len(),
            });
        }
        for (k, id) in self.ids.iter().enumerate() {
            if id.entity() != k {
                return Err(MeshTopologyError::IdMismatch {
                    expected: k,
                    found: id.entity(),
                });
            }
        }
        Ok(())
    }
}
