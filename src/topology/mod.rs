//! Mesh topology: identifiers, storage, connectivity and derivation.
//!
//! - `id`, `index_space`, `partition`: entity identity and storage
//! - `connectivity`: CSR tables and the per-domain-pair matrix
//! - `policy`, `context`: what the user and the runtime provide
//! - `mesh`, `derive`, `serialize`: the topology object and its operations

pub mod connectivity;
pub mod context;
pub mod derive;
pub mod id;
pub mod index_space;
pub mod mesh;
pub mod partition;
pub mod policy;
pub mod serialize;
pub mod utils;

pub use connectivity::{Connectivity, DomainConnectivity};
pub use context::{MeshContext, SerialContext};
pub use id::EntityId;
pub use mesh::MeshTopology;
pub use policy::MeshPolicy;
