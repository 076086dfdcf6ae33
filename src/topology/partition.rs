//! Partition classes and per-index-space partition slices.
//!
//! On a distributed run every local entity is either *exclusive* (owned and
//! never seen by another color), *shared* (owned here, ghosted elsewhere) or
//! a *ghost* (owned elsewhere). [`PartitionSlices`] records the local indices
//! of each class for one index space; *owned* is the union of exclusive and
//! shared and is derived, never stored.

use crate::mesh_error::MeshTopologyError;
use crate::topology::utils::first_common;
use itertools::Itertools;

/// Partition class bit flags.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
#[repr(usize)]
pub enum PartitionClass {
    Exclusive = 0b001,
    Shared = 0b010,
    Ghost = 0b100,
    /// Exclusive ∪ shared.
    Owned = 0b011,
}

impl PartitionClass {
    /// The three stored classes, in storage order.
    pub const STORED: [PartitionClass; 3] = [
        PartitionClass::Exclusive,
        PartitionClass::Shared,
        PartitionClass::Ghost,
    ];

    #[inline]
    pub const fn bits(self) -> usize {
        self as usize
    }

    /// True when `self` covers every entity of `other`.
    #[inline]
    pub const fn contains(self, other: PartitionClass) -> bool {
        self.bits() & other.bits() == other.bits()
    }

    fn slot(self) -> Option<usize> {
        match self {
            PartitionClass::Exclusive => Some(0),
            PartitionClass::Shared => Some(1),
            PartitionClass::Ghost => Some(2),
            PartitionClass::Owned => None,
        }
    }
}

/// Local indices of one index space grouped by partition class.
#[derive(Clone, Debug, Default, serde::Serialize, serde::Deserialize)]
pub struct PartitionSlices {
    classes: [Vec<usize>; 3],
}

impl PartitionSlices {
    /// Replace the indices of a stored class.
    ///
    /// Indices are sorted and must be `< size` and must not already belong
    /// to another class. `Owned` is derived and cannot be assigned.
    pub fn set(
        &mut self,
        class: PartitionClass,
        indices: impl IntoIterator<Item = usize>,
        size: usize,
    ) -> Result<(), MeshTopologyError> {
        let slot = class.slot().ok_or_else(|| {
            MeshTopologyError::UnsupportedQuery(
                "the owned partition is derived from exclusive and shared".into(),
            )
        })?;
        let indices: Vec<usize> = indices.into_iter().sorted_unstable().dedup().collect();
        if let Some(&bad) = indices.iter().find(|&&i| i >= size) {
            return Err(MeshTopologyError::OutOfRange {
                what: "partition entity",
                index: bad,
                limit: size,
            });
        }
        for (other, stored) in self.classes.iter().enumerate() {
            if other == slot {
                continue;
            }
            if let Some(i) = first_common(&indices, stored).copied() {
                return Err(MeshTopologyError::InvariantViolation(format!(
                    "entity {i} assigned to both {:?} and {:?}",
                    class,
                    PartitionClass::STORED[other]
                )));
            }
        }
        self.classes[slot] = indices;
        Ok(())
    }

    /// Sorted local indices of `class`.
    pub fn get(&self, class: PartitionClass) -> Vec<usize> {
        match class.slot() {
            Some(slot) => self.classes[slot].clone(),
            None => self.classes[0]
                .iter()
                .copied()
                .merge(self.classes[1].iter().copied())
                .collect(),
        }
    }

    pub fn len(&self, class: PartitionClass) -> usize {
        match class.slot() {
            Some(slot) => self.classes[slot].len(),
            None => self.classes[0].len() + self.classes[1].len(),
        }
    }

    /// True when no class has been assigned.
    pub fn is_empty(&self) -> bool {
        self.classes.iter().all(Vec::is_empty)
    }

    /// Class of a local index, if assigned.
    pub fn class_of(&self, index: usize) -> Option<PartitionClass> {
        self.classes
            .iter()
            .position(|c| c.binary_search(&index).is_ok())
            .map(|slot| PartitionClass::STORED[slot])
    }
}
