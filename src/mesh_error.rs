//! MeshTopologyError: Unified error type for mesh-topology public APIs
//!
//! Every fallible operation of the topology engine reports through this enum.
//! Variants are grouped by the kind of failure: configuration, invariant,
//! unsupported query, serialization and collaborator data.

use thiserror::Error;

/// Unified error type for mesh-topology operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MeshTopologyError {
    // ---- configuration ----------------------------------------------------
    /// The mesh policy is inconsistent (bad dimension/domain counts, missing
    /// entity types for a declared connectivity, ...).
    #[error("invalid mesh policy: {0}")]
    InvalidPolicy(String),
    /// A serialized topology declares a different domain count.
    #[error("domain count mismatch: expected {expected}, found {found}")]
    DomainMismatch { expected: usize, found: usize },
    /// A serialized topology declares a different topological dimension.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: usize, found: usize },

    // ---- invariants -------------------------------------------------------
    /// A primitive entity was initialised out of insertion order.
    #[error("id mismatch: expected local id {expected}, found {found}")]
    IdMismatch { expected: usize, found: usize },
    /// Two parallel sequences disagree in length.
    #[error("length mismatch: {what} ({left} vs {right})")]
    LengthMismatch {
        what: &'static str,
        left: usize,
        right: usize,
    },
    /// A connectivity table required by a derivation has not been computed.
    #[error("empty connectivity {from_domain}:{to_domain} {from_dim}->{to_dim}")]
    EmptyConnectivity {
        from_domain: usize,
        to_domain: usize,
        from_dim: usize,
        to_dim: usize,
    },
    /// Any other broken structural invariant.
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    // ---- unsupported queries ---------------------------------------------
    /// The requested adjacency cannot be derived by this engine.
    #[error("unsupported query: {0}")]
    UnsupportedQuery(String),
    /// A dimension, domain or entity index outside the configured range.
    #[error("{what} {index} out of range (limit {limit})")]
    OutOfRange {
        what: &'static str,
        index: usize,
        limit: usize,
    },

    // ---- serialization ----------------------------------------------------
    /// The buffer ended before the declared payload.
    #[error("truncated buffer: needed {needed} bytes at offset {offset}, {available} available")]
    Truncated {
        offset: usize,
        needed: usize,
        available: usize,
    },
    /// The buffer decodes but describes an impossible topology.
    #[error("corrupt buffer: {0}")]
    CorruptBuffer(String),
    /// Deserialization requires a topology that holds no entities yet.
    #[error("cannot unserialize into a topology that already holds entities")]
    TargetNotEmpty,

    // ---- collaborator data ------------------------------------------------
    /// The index map of an index space has no entry for a local/global id.
    #[error("index space {index_space}: no index map entry for {id}")]
    MissingIndexMapEntry { index_space: usize, id: usize },
    /// The intermediate map has no entry for a vertex set.
    #[error("no intermediate id for vertex set {0:?}")]
    MissingIntermediateEntry(Vec<usize>),

    // ---- io ---------------------------------------------------------------
    /// Wrapped I/O failure from `save`/`load`/`dump`.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for MeshTopologyError {
    fn from(e: std::io::Error) -> Self {
        MeshTopologyError::Io(e.to_string())
    }
}

impl MeshTopologyError {
    pub(crate) fn empty_connectivity(fm: usize, tm: usize, fd: usize, td: usize) -> Self {
        MeshTopologyError::EmptyConnectivity {
            from_domain: fm,
            to_domain: tm,
            from_dim: fd,
            to_dim: td,
        }
    }
}
