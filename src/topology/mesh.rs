//! The mesh topology: storage, primitive construction and queries.
//!
//! A [`MeshTopology`] owns one [`IndexSpace`] per `(domain, dimension)` and
//! one [`DomainConnectivity`] per ordered `(from_domain, to_domain)` pair. A
//! mesh is constructed by creating vertices and cells with
//! [`make_entity`](MeshTopology::make_entity) and attaching vertices to cells
//! with [`init_cell`](MeshTopology::init_cell); every other adjacency is
//! derived lazily by [`get_connectivity`](MeshTopology::get_connectivity) (see
//! `derive.rs`) and memoized for the lifetime of the topology.
//!
//! The topology is movable but not `Clone`: two instances never share
//! entity storage.

use std::io::Write;

use log::{debug, warn};

use crate::config::TopologyConfig;
use crate::debug_invariants::DebugInvariants;
use crate::mesh_error::MeshTopologyError;
use crate::topology::connectivity::{Connectivity, DomainConnectivity};
use crate::topology::context::MeshContext;
use crate::topology::derive::DerivationStats;
use crate::topology::id::EntityId;
use crate::topology::index_space::IndexSpace;
use crate::topology::partition::PartitionClass;
use crate::topology::policy::{MeshPolicy, TypeTable, validate_policy};

pub struct MeshTopology<P: MeshPolicy> {
    pub(crate) policy: P,
    pub(crate) config: TopologyConfig,
    pub(crate) types: TypeTable,
    /// `[domain][dimension]`
    pub(crate) index_spaces: Vec<Vec<IndexSpace<P::Entity>>>,
    /// `[from_domain][to_domain]`
    pub(crate) topology: Vec<Vec<DomainConnectivity>>,
    pub(crate) stats: DerivationStats,
}

impl<P: MeshPolicy> MeshTopology<P> {
    /// Validate `policy` and allocate empty storage.
    pub fn new(policy: P) -> Result<Self, MeshTopologyError> {
        Self::with_config(policy, TopologyConfig::default())
    }

    pub fn with_config(policy: P, config: TopologyConfig) -> Result<Self, MeshTopologyError> {
        let types = validate_policy(&policy)?;
        let top = P::NUM_DIMENSIONS;
        let index_spaces = (0..P::NUM_DOMAINS)
            .map(|m| (0..=top).map(|d| IndexSpace::new(m, d)).collect())
            .collect();
        let topology = (0..P::NUM_DOMAINS)
            .map(|fm| {
                (0..P::NUM_DOMAINS)
                    .map(|tm| DomainConnectivity::new(fm, tm, top))
                    .collect()
            })
            .collect();
        debug!(
            "mesh topology: {} dimensions, {} domains",
            top,
            P::NUM_DOMAINS
        );
        Ok(Self {
            policy,
            config,
            types,
            index_spaces,
            topology,
            stats: DerivationStats::default(),
        })
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    pub fn config(&self) -> &TopologyConfig {
        &self.config
    }

    /// Counters of the derivation primitives run so far.
    pub fn stats(&self) -> DerivationStats {
        self.stats
    }

    /// Dimension of the cells.
    pub fn topological_dimension(&self) -> usize {
        P::NUM_DIMENSIONS
    }

    pub fn num_domains(&self) -> usize {
        P::NUM_DOMAINS
    }

    // --- range checks -------------------------------------------------------

    pub(crate) fn check_domain(&self, domain: usize) -> Result<(), MeshTopologyError> {
        if domain < P::NUM_DOMAINS {
            Ok(())
        } else {
            Err(MeshTopologyError::OutOfRange {
                what: "domain",
                index: domain,
                limit: P::NUM_DOMAINS,
            })
        }
    }

    pub(crate) fn check_dim(&self, dim: usize) -> Result<(), MeshTopologyError> {
        if dim <= P::NUM_DIMENSIONS {
            Ok(())
        } else {
            Err(MeshTopologyError::OutOfRange {
                what: "dimension",
                index: dim,
                limit: P::NUM_DIMENSIONS + 1,
            })
        }
    }

    pub(crate) fn check_tuple(
        &self,
        from_domain: usize,
        to_domain: usize,
        from_dim: usize,
        to_dim: usize,
    ) -> Result<(), MeshTopologyError> {
        self.check_domain(from_domain)?;
        self.check_domain(to_domain)?;
        self.check_dim(from_dim)?;
        self.check_dim(to_dim)
    }

    /// Index-space id of the coloring collaborator for `(dim, domain)`.
    pub(crate) fn index_space_id(&self, dim: usize, domain: usize) -> Result<usize, MeshTopologyError> {
        self.types.index_space(dim, domain).ok_or_else(|| {
            MeshTopologyError::UnsupportedQuery(format!(
                "dimension {dim} of domain {domain} has no entity type"
            ))
        })
    }

    // --- raw table access ---------------------------------------------------

    #[inline]
    pub(crate) fn conn(&self, fm: usize, tm: usize, fd: usize, td: usize) -> &Connectivity {
        self.topology[fm][tm].get(fd, td)
    }

    #[inline]
    pub(crate) fn conn_mut(&mut self, fm: usize, tm: usize, fd: usize, td: usize) -> &mut Connectivity {
        self.topology[fm][tm].get_mut(fd, td)
    }

    /// Store a freshly derived table, validating it when configured to.
    pub(crate) fn commit(
        &mut self,
        (fm, tm, fd, td): (usize, usize, usize, usize),
        table: Connectivity,
    ) -> Result<(), MeshTopologyError> {
        if self.config.check_invariants {
            table.validate_invariants()?;
        }
        *self.conn_mut(fm, tm, fd, td) = table;
        Ok(())
    }

    /// The table for a tuple as it currently stands, computed or not.
    pub fn connectivity(
        &self,
        from_domain: usize,
        to_domain: usize,
        from_dim: usize,
        to_dim: usize,
    ) -> Result<&Connectivity, MeshTopologyError> {
        self.check_tuple(from_domain, to_domain, from_dim, to_dim)?;
        Ok(self.conn(from_domain, to_domain, from_dim, to_dim))
    }

    pub fn connectivity_mut(
        &mut self,
        from_domain: usize,
        to_domain: usize,
        from_dim: usize,
        to_dim: usize,
    ) -> Result<&mut Connectivity, MeshTopologyError> {
        self.check_tuple(from_domain, to_domain, from_dim, to_dim)?;
        Ok(self.conn_mut(from_domain, to_domain, from_dim, to_dim))
    }

    /// All tables leaving `from_domain` towards `to_domain`.
    pub fn domain_connectivity(
        &self,
        from_domain: usize,
        to_domain: usize,
    ) -> Result<&DomainConnectivity, MeshTopologyError> {
        self.check_domain(from_domain)?;
        self.check_domain(to_domain)?;
        Ok(&self.topology[from_domain][to_domain])
    }

    /// Get a connectivity, deriving it (and whatever it depends on) first.
    ///
    /// Same-domain tuples go through `compute_connectivity`, cross-domain
    /// tuples through `compute_bindings`. A tuple that is still not computed
    /// afterwards is reported as [`MeshTopologyError::EmptyConnectivity`].
    pub fn get_connectivity<C: MeshContext + ?Sized>(
        &mut self,
        ctx: &C,
        from_domain: usize,
        to_domain: usize,
        from_dim: usize,
        to_dim: usize,
    ) -> Result<&Connectivity, MeshTopologyError> {
        self.check_tuple(from_domain, to_domain, from_dim, to_dim)?;
        if from_domain == to_domain {
            self.compute_connectivity(ctx, from_domain, from_dim, to_dim)?;
        } else {
            self.compute_bindings(ctx, from_domain, to_domain, from_dim, to_dim)?;
        }
        let c = self.conn(from_domain, to_domain, from_dim, to_dim);
        if c.is_empty() {
            return Err(MeshTopologyError::empty_connectivity(
                from_domain,
                to_domain,
                from_dim,
                to_dim,
            ));
        }
        Ok(c)
    }

    /// Compute every connectivity of `domain` declared by the policy, then
    /// every binding leaving `domain`.
    pub fn init<C: MeshContext + ?Sized>(
        &mut self,
        ctx: &C,
        domain: usize,
    ) -> Result<(), MeshTopologyError> {
        self.check_domain(domain)?;
        for pair in self.policy.connectivities() {
            if pair.domain == domain {
                self.compute_connectivity(ctx, domain, pair.from_dim, pair.to_dim)?;
            }
        }
        self.init_bindings(ctx, domain)
    }

    /// Like [`init`](Self::init) but only bindings; for sparse domains that
    /// lack the cells needed to derive connectivities.
    pub fn init_bindings<C: MeshContext + ?Sized>(
        &mut self,
        ctx: &C,
        domain: usize,
    ) -> Result<(), MeshTopologyError> {
        self.check_domain(domain)?;
        for b in self.policy.bindings() {
            if b.from_domain == domain {
                self.compute_bindings(ctx, b.from_domain, b.to_domain, b.from_dim, b.to_dim)?;
            }
        }
        Ok(())
    }

    // --- entities -----------------------------------------------------------

    /// Number of entities of `(dim, domain)`.
    ///
    /// # Panics
    /// If `dim` or `domain` is out of range; see
    /// [`try_num_entities`](Self::try_num_entities).
    pub fn num_entities(&self, dim: usize, domain: usize) -> usize {
        self.index_spaces[domain][dim].len()
    }

    pub fn try_num_entities(&self, dim: usize, domain: usize) -> Result<usize, MeshTopologyError> {
        Ok(self.index_space(dim, domain)?.len())
    }

    pub fn index_space(&self, dim: usize, domain: usize) -> Result<&IndexSpace<P::Entity>, MeshTopologyError> {
        self.check_dim(dim)?;
        self.check_domain(domain)?;
        Ok(&self.index_spaces[domain][dim])
    }

    /// `(id, entity)` pairs of one `(dimension, domain)` in local order.
    pub fn entities(
        &self,
        dim: usize,
        domain: usize,
    ) -> Result<impl Iterator<Item = (EntityId, &P::Entity)> + '_, MeshTopologyError> {
        Ok(self.index_space(dim, domain)?.iter())
    }

    pub fn entity_ids(&self, dim: usize, domain: usize) -> Result<&[EntityId], MeshTopologyError> {
        Ok(self.index_space(dim, domain)?.ids())
    }

    /// The entity named by `id`, looked up in O(1).
    pub fn entity(&self, id: EntityId) -> Option<&P::Entity> {
        self.index_spaces
            .get(id.domain())?
            .get(id.dimension())?
            .get(id.entity())
    }

    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut P::Entity> {
        self.index_spaces
            .get_mut(id.domain())?
            .get_mut(id.dimension())?
            .get_mut(id.entity())
    }

    /// Create an entity of `(dim, domain)` with the next local id and the
    /// context's color.
    pub fn make_entity<C: MeshContext + ?Sized>(
        &mut self,
        ctx: &C,
        domain: usize,
        dim: usize,
        entity: P::Entity,
    ) -> Result<EntityId, MeshTopologyError> {
        self.check_domain(domain)?;
        self.check_dim(dim)?;
        let is = &mut self.index_spaces[domain][dim];
        let id = EntityId::try_new(dim, domain, is.len(), ctx.color())?;
        is.push(entity, id)?;
        Ok(id)
    }

    /// Append already-identified entities to an index space.
    pub fn append_to_index_space(
        &mut self,
        domain: usize,
        dim: usize,
        entities: Vec<Box<P::Entity>>,
        ids: Vec<EntityId>,
    ) -> Result<(), MeshTopologyError> {
        self.check_domain(domain)?;
        self.check_dim(dim)?;
        self.index_spaces[domain][dim].append(entities, ids)
    }

    // --- primitive connectivity --------------------------------------------

    /// Attach vertices to a cell. Cells must be initialised in local-id
    /// order.
    pub fn init_cell(
        &mut self,
        domain: usize,
        cell: EntityId,
        vertices: &[EntityId],
    ) -> Result<(), MeshTopologyError> {
        self.init_entity(domain, P::NUM_DIMENSIONS, 0, cell, vertices)
    }

    /// Attach `subs` (dimension `to_dim`) to `sup` (dimension `from_dim`),
    /// e.g. face→vertex when a mesh is supplied face-up.
    pub fn init_entity(
        &mut self,
        domain: usize,
        from_dim: usize,
        to_dim: usize,
        sup: EntityId,
        subs: &[EntityId],
    ) -> Result<(), MeshTopologyError> {
        self.check_tuple(domain, domain, from_dim, to_dim)?;
        if sup.dimension() != from_dim || sup.domain() != domain {
            return Err(MeshTopologyError::InvariantViolation(format!(
                "{sup:?} is not an entity of dimension {from_dim} in domain {domain}"
            )));
        }
        let n_to = self.num_entities(to_dim, domain);
        if let Some(bad) = subs.iter().find(|s| {
            s.dimension() != to_dim || s.domain() != domain || s.entity() >= n_to
        }) {
            return Err(MeshTopologyError::InvariantViolation(format!(
                "{bad:?} is not an existing entity of dimension {to_dim} in domain {domain}"
            )));
        }
        let c = self.conn_mut(domain, domain, from_dim, to_dim);
        if sup.entity() != c.from_size() {
            return Err(MeshTopologyError::IdMismatch {
                expected: c.from_size(),
                found: sup.entity(),
            });
        }
        for &s in subs {
            c.push(s);
        }
        c.add_count(subs.len());
        Ok(())
    }

    // --- adjacency by entity ------------------------------------------------

    /// Ids of the `to_dim` entities of `to_domain` adjacent to `id`. The
    /// table must already be computed.
    pub fn adjacent_ids(
        &self,
        to_domain: usize,
        id: EntityId,
        to_dim: usize,
    ) -> Result<&[EntityId], MeshTopologyError> {
        let (fm, fd) = (id.domain(), id.dimension());
        let c = self.connectivity(fm, to_domain, fd, to_dim)?;
        if c.is_empty() {
            return Err(MeshTopologyError::empty_connectivity(fm, to_domain, fd, to_dim));
        }
        c.try_get_entities(id.entity())
    }

    /// Entities adjacent to `id`, resolved through the target index space.
    pub fn adjacent_entities(
        &self,
        to_domain: usize,
        id: EntityId,
        to_dim: usize,
    ) -> Result<Vec<&P::Entity>, MeshTopologyError> {
        self.adjacent_ids(to_domain, id, to_dim)?
            .iter()
            .map(|&t| {
                self.entity(t).ok_or_else(|| {
                    MeshTopologyError::InvariantViolation(format!("dangling id {t:?}"))
                })
            })
            .collect()
    }

    /// Reverse the adjacency run of `id` towards `(to_domain, to_dim)`.
    pub fn reverse_entities(
        &mut self,
        to_domain: usize,
        id: EntityId,
        to_dim: usize,
    ) -> Result<(), MeshTopologyError> {
        self.adjacent_ids(to_domain, id, to_dim)?;
        self.conn_mut(id.domain(), to_domain, id.dimension(), to_dim)
            .reverse_entities(id.entity());
        Ok(())
    }

    /// Permute the adjacency run of `id`; position `i` receives the entry
    /// previously at `order[i]`.
    pub fn reorder_entities(
        &mut self,
        to_domain: usize,
        id: EntityId,
        to_dim: usize,
        order: &[usize],
    ) -> Result<(), MeshTopologyError> {
        self.adjacent_ids(to_domain, id, to_dim)?;
        self.conn_mut(id.domain(), to_domain, id.dimension(), to_dim)
            .reorder_entities(id.entity(), order)
    }

    // --- partition classes --------------------------------------------------

    /// Record which local entities of `(dim, domain)` belong to `class`.
    pub fn set_partition(
        &mut self,
        domain: usize,
        dim: usize,
        class: PartitionClass,
        local_ids: impl IntoIterator<Item = usize>,
    ) -> Result<(), MeshTopologyError> {
        self.check_domain(domain)?;
        self.check_dim(dim)?;
        self.index_spaces[domain][dim].set_partition(class, local_ids)
    }

    pub fn num_entities_in(
        &self,
        dim: usize,
        domain: usize,
        class: PartitionClass,
    ) -> Result<usize, MeshTopologyError> {
        Ok(self.index_space(dim, domain)?.partitions().len(class))
    }

    pub fn entity_ids_in(
        &self,
        dim: usize,
        domain: usize,
        class: PartitionClass,
    ) -> Result<Vec<EntityId>, MeshTopologyError> {
        Ok(self.index_space(dim, domain)?.partition_ids(class))
    }

    pub fn entities_in(
        &self,
        dim: usize,
        domain: usize,
        class: PartitionClass,
    ) -> Result<impl Iterator<Item = (EntityId, &P::Entity)> + '_, MeshTopologyError> {
        Ok(self.index_space(dim, domain)?.partition_iter(class))
    }

    /// The `position`-th entity of a partition slice.
    pub fn entity_in(
        &self,
        dim: usize,
        domain: usize,
        class: PartitionClass,
        position: usize,
    ) -> Result<(EntityId, &P::Entity), MeshTopologyError> {
        let is = self.index_space(dim, domain)?;
        let slice = is.partitions().get(class);
        let &local = slice.get(position).ok_or(MeshTopologyError::OutOfRange {
            what: "partition position",
            index: position,
            limit: slice.len(),
        })?;
        match (is.id(local), is.get(local)) {
            (Some(id), Some(entity)) => Ok((id, entity)),
            _ => Err(MeshTopologyError::InvariantViolation(format!(
                "partition index {local} past end"
            ))),
        }
    }

    // --- debugging ----------------------------------------------------------

    /// Write every computed table, grouped by domain pair.
    pub fn dump<W: Write>(&self, out: &mut W) -> Result<(), MeshTopologyError> {
        for (fm, row) in self.topology.iter().enumerate() {
            writeln!(out, "=================== from domain: {fm}")?;
            for (tm, dc) in row.iter().enumerate() {
                writeln!(out, "========== to domain: {tm}")?;
                write!(out, "{dc}")?;
            }
        }
        Ok(())
    }

    /// True when no index space holds an entity.
    pub(crate) fn has_no_entities(&self) -> bool {
        let empty = self
            .index_spaces
            .iter()
            .all(|dims| dims.iter().all(IndexSpace::is_empty));
        if !empty {
            warn!("topology already holds entities");
        }
        empty
    }
}

impl<P: MeshPolicy> DebugInvariants for MeshTopology<P> {
    fn validate_invariants(&self) -> Result<(), MeshTopologyError> {
        for dims in &self.index_spaces {
            for is in dims {
                is.validate_invariants()?;
            }
        }
        for row in &self.topology {
            for dc in row {
                for (_, _, c) in dc.iter() {
                    c.validate_invariants()?;
                }
            }
        }
        Ok(())
    }
}
