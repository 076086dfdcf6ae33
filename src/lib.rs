#![cfg_attr(docsrs, feature(doc_cfg))]
//! # mesh-topology
//!
//! mesh-topology is a policy-parameterized engine for unstructured mesh
//! connectivity. A mesh is supplied as vertices, cells and the cell→vertex
//! adjacency; every other adjacency (edges, faces, their incidence in both
//! directions, same-dimension neighbours, and bindings to secondary entity
//! domains) is derived on first request and memoized.
//!
//! ## Features
//! - Packed 64-bit [`EntityId`](topology::id::EntityId) handles
//! - CSR [`Connectivity`](topology::connectivity::Connectivity) tables
//! - Lazy derivation by building, transposing and intersecting tables
//! - Cross-domain bindings (corners, wedges, ...) driven by the policy
//! - Exclusive / shared / ghost partition views of every index space
//! - A little-endian binary checkpoint format
//! - Same-dimension CSR graph chunks for external partitioners
//!
//! ## Usage
//!
//! ```toml
//! [dependencies]
//! mesh-topology = "0.3"
//! # Optional features:
//! # features = ["mpi-support", "check-invariants"]
//! ```
//!
//! The distributed runtime is not part of this crate; it is consulted
//! through the [`MeshContext`](topology::context::MeshContext) trait, and
//! [`SerialContext`](topology::context::SerialContext) covers single
//! partition runs.

pub mod algs;
pub mod config;
pub mod debug_invariants;
pub mod mesh_error;
pub mod topology;

pub use debug_invariants::DebugInvariants;

/// A convenient prelude to import the most-used traits & types:
pub mod prelude {
    pub use crate::algs::graph_partition::{GraphPartition, compute_graph_partition};
    pub use crate::config::TopologyConfig;
    pub use crate::debug_invariants::DebugInvariants;
    pub use crate::mesh_error::MeshTopologyError;
    pub use crate::topology::connectivity::{Connectivity, DomainConnectivity};
    pub use crate::topology::context::{MeshContext, SerialContext};
    pub use crate::topology::derive::{DerivationStats, Strategy, select_strategy};
    pub use crate::topology::id::EntityId;
    pub use crate::topology::index_space::IndexSpace;
    pub use crate::topology::mesh::MeshTopology;
    pub use crate::topology::partition::PartitionClass;
    pub use crate::topology::policy::{BindingPair, ConnectivityPair, EntityType, MeshPolicy};
}
