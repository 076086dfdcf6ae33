//! The mesh policy: everything a specialization tells the engine.
//!
//! A [`MeshPolicy`] fixes the topological dimension and the number of
//! domains, associates an index space with every `(dimension, domain)` that
//! holds entities, declares which connectivities and cross-domain bindings
//! `init` should compute, and supplies the callbacks that describe new
//! entities in terms of existing ones.
//!
//! # Callback protocol
//! `create_entities` and `create_bound_entities` append the ids that define
//! each new entity to `out`, group after group, and return the size of every
//! group. A quad asked for its edges pushes `[v0,v1, v1,v2, v2,v3, v3,v0]`
//! and returns `[2, 2, 2, 2]`.

use crate::mesh_error::MeshTopologyError;
use crate::topology::connectivity::DomainConnectivity;
use crate::topology::id::EntityId;

/// Association of a `(dimension, domain)` with an index-space id of the
/// coloring collaborator.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct EntityType {
    pub dimension: usize,
    pub domain: usize,
    pub index_space: usize,
}

/// A connectivity `from_dim -> to_dim` within one domain.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct ConnectivityPair {
    pub domain: usize,
    pub from_dim: usize,
    pub to_dim: usize,
}

/// A binding between two domains.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, serde::Serialize, serde::Deserialize)]
pub struct BindingPair {
    pub from_domain: usize,
    pub to_domain: usize,
    pub from_dim: usize,
    pub to_dim: usize,
}

pub trait MeshPolicy {
    /// Topological dimension of the cells (1..=3).
    const NUM_DIMENSIONS: usize;
    /// Number of domains (1..=4).
    const NUM_DOMAINS: usize;

    /// Entity payload stored in the index spaces.
    type Entity;

    /// The `(dimension, domain) -> index space` association table.
    fn entity_types(&self) -> Vec<EntityType>;

    /// Connectivities computed by `init`.
    fn connectivities(&self) -> Vec<ConnectivityPair> {
        Vec::new()
    }

    /// Bindings computed by `init` / `init_bindings`.
    fn bindings(&self) -> Vec<BindingPair> {
        Vec::new()
    }

    /// Describe the `dim`-dimensional sub-entities of `cell` as vertex
    /// groups. `conn` is the cell's own domain matrix.
    fn create_entities(
        &self,
        cell_id: EntityId,
        cell: &Self::Entity,
        dim: usize,
        conn: &DomainConnectivity,
        out: &mut Vec<EntityId>,
    ) -> Vec<usize>;

    /// Describe the `dim`-dimensional entities of `to_domain` bound to `cell`
    /// of `from_domain`. Each group lists the ids the new entity connects to;
    /// ids may come from either domain.
    #[allow(clippy::too_many_arguments)]
    fn create_bound_entities(
        &self,
        _from_domain: usize,
        _to_domain: usize,
        _dim: usize,
        _cell_id: EntityId,
        _cell: &Self::Entity,
        _primal: &DomainConnectivity,
        _binding: &DomainConnectivity,
        _out: &mut Vec<EntityId>,
    ) -> Vec<usize> {
        Vec::new()
    }

    /// Construct the payload of an entity the engine has just created.
    fn create_entity(
        &self,
        domain: usize,
        dim: usize,
        id: EntityId,
        num_vertices: usize,
    ) -> Self::Entity;
}

/// Resolved association table: `[domain][dimension] -> index space`.
#[derive(Clone, Debug)]
pub(crate) struct TypeTable {
    slots: Vec<Vec<Option<usize>>>,
}

impl TypeTable {
    pub(crate) fn index_space(&self, dim: usize, domain: usize) -> Option<usize> {
        self.slots.get(domain)?.get(dim).copied().flatten()
    }
}

/// Check a policy for consistency and resolve its association table.
pub(crate) fn validate_policy<P: MeshPolicy>(policy: &P) -> Result<TypeTable, MeshTopologyError> {
    let top = P::NUM_DIMENSIONS;
    if !(1..=EntityId::MAX_DIMENSION).contains(&top) {
        return Err(MeshTopologyError::InvalidPolicy(format!(
            "NUM_DIMENSIONS must be in 1..={}, got {top}",
            EntityId::MAX_DIMENSION
        )));
    }
    if !(1..=EntityId::MAX_DOMAIN + 1).contains(&P::NUM_DOMAINS) {
        return Err(MeshTopologyError::InvalidPolicy(format!(
            "NUM_DOMAINS must be in 1..={}, got {}",
            EntityId::MAX_DOMAIN + 1,
            P::NUM_DOMAINS
        )));
    }

    let mut slots = vec![vec![None; top + 1]; P::NUM_DOMAINS];
    let mut spaces = hashbrown::HashSet::new();
    for et in policy.entity_types() {
        if et.domain >= P::NUM_DOMAINS || et.dimension > top {
            return Err(MeshTopologyError::InvalidPolicy(format!(
                "entity type {et:?} outside {} domains / dimension {top}",
                P::NUM_DOMAINS
            )));
        }
        if slots[et.domain][et.dimension].replace(et.index_space).is_some() {
            return Err(MeshTopologyError::InvalidPolicy(format!(
                "duplicate entity type for dimension {} in domain {}",
                et.dimension, et.domain
            )));
        }
        if !spaces.insert(et.index_space) {
            return Err(MeshTopologyError::InvalidPolicy(format!(
                "index space {} associated twice",
                et.index_space
            )));
        }
    }
    let table = TypeTable { slots };

    let require = |dim: usize, domain: usize, what: &str| {
        if domain >= P::NUM_DOMAINS || dim > top {
            return Err(MeshTopologyError::InvalidPolicy(format!(
                "{what} refers to dimension {dim} of domain {domain}, outside the mesh"
            )));
        }
        match table.index_space(dim, domain) {
            Some(_) => Ok(()),
            None => Err(MeshTopologyError::InvalidPolicy(format!(
                "{what} refers to dimension {dim} of domain {domain}, which has no entity type"
            ))),
        }
    };
    for c in policy.connectivities() {
        require(c.from_dim, c.domain, "connectivity")?;
        require(c.to_dim, c.domain, "connectivity")?;
    }
    for b in policy.bindings() {
        require(b.from_dim, b.from_domain, "binding")?;
        require(b.to_dim, b.to_domain, "binding")?;
        if b.from_domain == b.to_domain && b.from_domain == 0 {
            return Err(MeshTopologyError::InvalidPolicy(
                "a binding must leave domain 0".into(),
            ));
        }
    }
    Ok(table)
}
