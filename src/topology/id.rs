//! `EntityId`: a packed, zero-cost handle for mesh entities
//!
//! Every entity (vertex, edge, face, cell, or a bound entity living in a
//! secondary domain) is named by one 64-bit integer holding four fields:
//!
//! ```text
//!  63 62 | 61 60 | 59 .......... 40 | 39 .................... 0
//!  dim   | domain| color (20 bits)  | entity (40 bits)
//! ```
//!
//! Connectivity tables store nothing but `EntityId`s; the entity itself is
//! found by using [`EntityId::entity`] as a dense index into the
//! `(domain, dimension)` index space.

use crate::mesh_error::MeshTopologyError;
use bytemuck::{Pod, Zeroable};
use std::fmt;

const ENTITY_BITS: u32 = 40;
const COLOR_BITS: u32 = 20;
const DOMAIN_BITS: u32 = 2;
const DIMENSION_BITS: u32 = 2;

const COLOR_SHIFT: u32 = ENTITY_BITS;
const DOMAIN_SHIFT: u32 = COLOR_SHIFT + COLOR_BITS;
const DIMENSION_SHIFT: u32 = DOMAIN_SHIFT + DOMAIN_BITS;

const ENTITY_MASK: u64 = (1 << ENTITY_BITS) - 1;
const COLOR_MASK: u64 = (1 << COLOR_BITS) - 1;
const DOMAIN_MASK: u64 = (1 << DOMAIN_BITS) - 1;
const DIMENSION_MASK: u64 = (1 << DIMENSION_BITS) - 1;

/// Packed `(dimension, domain, color, entity)` identifier.
///
/// # Memory layout
/// `repr(transparent)` over `u64`; slices of ids are reinterpreted as raw
/// bytes by the serializer through [`bytemuck`].
#[derive(
    Copy,
    Clone,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Default,
    Pod,
    Zeroable,
    serde::Serialize,
    serde::Deserialize,
)]
#[repr(transparent)]
pub struct EntityId(u64);

impl EntityId {
    /// Largest representable topological dimension.
    pub const MAX_DIMENSION: usize = DIMENSION_MASK as usize;
    /// Largest representable domain index.
    pub const MAX_DOMAIN: usize = DOMAIN_MASK as usize;
    /// Largest representable color.
    pub const MAX_COLOR: usize = COLOR_MASK as usize;
    /// Largest representable local entity number.
    pub const MAX_ENTITY: usize = ENTITY_MASK as usize;

    /// Pack the four fields.
    ///
    /// # Panics
    /// Panics if any field exceeds its bit width; use [`EntityId::try_new`]
    /// for untrusted input.
    #[inline]
    pub fn new(dimension: usize, domain: usize, entity: usize, color: usize) -> Self {
        match Self::try_new(dimension, domain, entity, color) {
            Ok(id) => id,
            Err(e) => panic!("EntityId::new: {e}"),
        }
    }

    /// Pack the four fields, rejecting values that do not fit.
    pub fn try_new(
        dimension: usize,
        domain: usize,
        entity: usize,
        color: usize,
    ) -> Result<Self, MeshTopologyError> {
        check_field("dimension", dimension, Self::MAX_DIMENSION)?;
        check_field("domain", domain, Self::MAX_DOMAIN)?;
        check_field("color", color, Self::MAX_COLOR)?;
        check_field("entity", entity, Self::MAX_ENTITY)?;
        Ok(Self(
            ((dimension as u64) << DIMENSION_SHIFT)
                | ((domain as u64) << DOMAIN_SHIFT)
                | ((color as u64) << COLOR_SHIFT)
                | entity as u64,
        ))
    }

    /// Reinterpret a raw packed value.
    #[inline]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// The raw packed value.
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn dimension(self) -> usize {
        ((self.0 >> DIMENSION_SHIFT) & DIMENSION_MASK) as usize
    }

    #[inline]
    pub const fn domain(self) -> usize {
        ((self.0 >> DOMAIN_SHIFT) & DOMAIN_MASK) as usize
    }

    /// Owning partition.
    #[inline]
    pub const fn color(self) -> usize {
        ((self.0 >> COLOR_SHIFT) & COLOR_MASK) as usize
    }

    /// Local sequence number; the dense index into the owning index space.
    #[inline]
    pub const fn entity(self) -> usize {
        (self.0 & ENTITY_MASK) as usize
    }

    /// Color and entity together (the low 60 bits), unique across colors
    /// within one `(domain, dimension)`.
    #[inline]
    pub const fn local_id(self) -> u64 {
        self.0 & ((COLOR_MASK << COLOR_SHIFT) | ENTITY_MASK)
    }
}

fn check_field(what: &'static str, value: usize, max: usize) -> Result<(), MeshTopologyError> {
    if value > max {
        Err(MeshTopologyError::OutOfRange {
            what,
            index: value,
            limit: max + 1,
        })
    } else {
        Ok(())
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "EntityId({}:{}:{}:{})",
            self.dimension(),
            self.domain(),
            self.color(),
            self.entity()
        )
    }
}

/// Prints `dimension.domain.color.entity`.
impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.dimension(),
            self.domain(),
            self.color(),
            self.entity()
        )
    }
}

/// `EntityId` travels over MPI exactly like a `u64`.
#[cfg(feature = "mpi-support")]
unsafe impl mpi::datatype::Equivalence for EntityId {
    type Out = <u64 as mpi::datatype::Equivalence>::Out;

    fn equivalent_datatype() -> Self::Out {
        u64::equivalent_datatype()
    }
}
