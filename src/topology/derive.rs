//! Lazy derivation of connectivities and bindings.
//!
//! Every table of a [`MeshTopology`] starts out empty. Asking for one runs
//! the smallest chain of primitives that produces it:
//!
//! * **build**: materialize edges/faces from the cells' vertex groups
//!   (`MeshPolicy::create_entities`), deduplicated by vertex set;
//! * **transpose**: invert `A -> B` into `B -> A`;
//! * **intersect**: compose `A -> D -> B` and filter by vertex sets;
//! * **bindings**: create entities of a secondary domain from the cells of
//!   another (`MeshPolicy::create_bound_entities`).
//!
//! Results are memoized in the topology; a second request for the same tuple
//! runs nothing (see [`DerivationStats`]).

use hashbrown::HashMap;
use hashbrown::hash_map::Entry;
use log::{debug, trace, warn};
use std::cmp::Ordering;

use crate::mesh_error::MeshTopologyError;
use crate::topology::connectivity::Connectivity;
use crate::topology::context::MeshContext;
use crate::topology::id::EntityId;
use crate::topology::mesh::MeshTopology;
use crate::topology::policy::MeshPolicy;
use crate::topology::utils::{includes, intersects};

/// How a same-domain `from_dim -> to_dim` table is obtained.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Strategy {
    /// `top -> 0`: supplied by the user or bootstrapped from faces.
    Direct,
    /// `from_dim < to_dim`: transpose of `to_dim -> from_dim`.
    Transpose,
    /// `0 -> 0`: vertices sharing a cell.
    IntersectThroughTop,
    /// Everything else: entities sharing a vertex.
    IntersectThroughVertex,
}

/// Pick the derivation strategy for `from_dim -> to_dim` in a mesh of
/// topological dimension `top`.
pub fn select_strategy(from_dim: usize, to_dim: usize, top: usize) -> Strategy {
    if from_dim == top && to_dim == 0 {
        Strategy::Direct
    } else if from_dim < to_dim {
        Strategy::Transpose
    } else if from_dim == 0 && to_dim == 0 {
        Strategy::IntersectThroughTop
    } else {
        Strategy::IntersectThroughVertex
    }
}

/// Number of times each derivation primitive has run.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DerivationStats {
    pub builds: usize,
    pub binding_builds: usize,
    pub transposes: usize,
    pub intersects: usize,
}

impl DerivationStats {
    pub fn total(&self) -> usize {
        self.builds + self.binding_builds + self.transposes + self.intersects
    }
}

impl<P: MeshPolicy> MeshTopology<P> {
    /// Ensure `(domain, domain, from_dim, to_dim)` is computed.
    ///
    /// Degenerate requests (a domain without cells, or without entities of
    /// either dimension) log a warning and leave the table empty.
    pub fn compute_connectivity<C: MeshContext + ?Sized>(
        &mut self,
        ctx: &C,
        m: usize,
        fd: usize,
        td: usize,
    ) -> Result<(), MeshTopologyError> {
        self.check_tuple(m, m, fd, td)?;
        if !self.conn(m, m, fd, td).is_empty() {
            trace!("connectivity {m}:{m} {fd}->{td} already computed");
            return Ok(());
        }
        let top = P::NUM_DIMENSIONS;

        if self.conn(m, m, top, 0).is_empty() {
            if self.num_entities(top, m) == 0 {
                warn!("domain {m} has no cells; {fd}->{td} left empty");
                return Ok(());
            }
            self.bootstrap_cell_vertices(ctx, m)?;
            if !self.conn(m, m, fd, td).is_empty() {
                return Ok(());
            }
        }

        self.ensure_entities(ctx, m, fd)?;
        self.ensure_entities(ctx, m, td)?;
        if !self.conn(m, m, fd, td).is_empty() {
            return Ok(());
        }
        if self.num_entities(fd, m) == 0 && self.num_entities(td, m) == 0 {
            warn!("domain {m} has no entities of dimension {fd} or {td}");
            return Ok(());
        }

        match select_strategy(fd, td, top) {
            Strategy::Direct => Err(MeshTopologyError::empty_connectivity(m, m, fd, td)),
            Strategy::Transpose => {
                self.compute_connectivity(ctx, m, td, fd)?;
                self.transpose(ctx, m, m, fd, td)
            }
            Strategy::IntersectThroughTop => {
                self.compute_connectivity(ctx, m, fd, top)?;
                self.compute_connectivity(ctx, m, top, td)?;
                self.intersect(m, m, fd, td, top)
            }
            Strategy::IntersectThroughVertex => {
                if td == 0 && self.conn(m, m, fd, 0).is_empty() {
                    return Err(MeshTopologyError::UnsupportedQuery(format!(
                        "no rule derives {fd}->0 in domain {m}"
                    )));
                }
                self.compute_connectivity(ctx, m, fd, 0)?;
                self.compute_connectivity(ctx, m, 0, td)?;
                if fd != td {
                    self.compute_connectivity(ctx, m, td, 0)?;
                }
                self.intersect(m, m, fd, td, 0)
            }
        }
    }

    /// Recover `top -> 0` from `top -> top-1` and `top-1 -> 0`.
    fn bootstrap_cell_vertices<C: MeshContext + ?Sized>(
        &mut self,
        ctx: &C,
        m: usize,
    ) -> Result<(), MeshTopologyError> {
        let top = P::NUM_DIMENSIONS;
        let sub = top - 1;
        for (fd, td) in [(top, sub), (sub, 0)] {
            if self.conn(m, m, fd, td).is_empty() {
                return Err(MeshTopologyError::empty_connectivity(m, m, fd, td));
            }
        }
        debug!("domain {m}: deriving cells->vertices through dimension {sub}");
        self.transpose(ctx, m, m, sub, top)?;
        self.transpose(ctx, m, m, 0, sub)?;
        self.intersect(m, m, top, 0, sub)
    }

    /// Build the entities of `dim` if there are none yet.
    fn ensure_entities<C: MeshContext + ?Sized>(
        &mut self,
        ctx: &C,
        m: usize,
        dim: usize,
    ) -> Result<(), MeshTopologyError> {
        if self.num_entities(dim, m) > 0 {
            return Ok(());
        }
        let top = P::NUM_DIMENSIONS;
        if dim == 0 {
            return Err(MeshTopologyError::UnsupportedQuery(format!(
                "vertices of domain {m} are primitive and cannot be built"
            )));
        }
        if dim == top {
            warn!("domain {m} has no cells");
            return Ok(());
        }
        let using = if !self.conn(m, m, dim + 1, 0).is_empty() {
            dim + 1
        } else {
            top
        };
        if using <= 1 {
            return Err(MeshTopologyError::UnsupportedQuery(format!(
                "cannot build dimension {dim} from dimension {using}"
            )));
        }
        self.build_entities(ctx, m, dim, using)
    }

    /// Create the `dim` entities of domain `m` from the entities of `using`.
    ///
    /// Commits `(m, m, dim, 0)` and `(m, m, using, dim)`.
    pub fn build_entities<C: MeshContext + ?Sized>(
        &mut self,
        ctx: &C,
        m: usize,
        dim: usize,
        using: usize,
    ) -> Result<(), MeshTopologyError> {
        debug!("domain {m}: building dimension {dim} from dimension {using}");
        self.check_tuple(m, m, using, dim)?;
        if !self.conn(m, m, using, dim).is_empty() {
            return Ok(());
        }
        if self.conn(m, m, using, 0).is_empty() {
            return Err(MeshTopologyError::empty_connectivity(m, m, using, 0));
        }
        let color = ctx.color();
        let cells_is = self.index_space_id(using, m)?;
        let vertex_is = self.index_space_id(0, m)?;
        let entity_is = self.index_space_id(dim, m)?;
        let vertex_map = ctx.index_map(vertex_is);
        let entity_map = ctx.reverse_index_map(entity_is);
        let intermediate = ctx
            .reverse_intermediate_map(dim, m)
            .filter(|map| !map.is_empty());

        let cells = &self.index_spaces[m][using];
        let n_cells = cells.len();
        let order: Vec<usize> = match ctx.reverse_index_map(cells_is) {
            Some(map) => map.values().copied().collect(),
            None => (0..n_cells).collect(),
        };

        let mut seen: HashMap<Vec<EntityId>, EntityId> = HashMap::new();
        let mut cell_rows: Vec<Vec<EntityId>> = vec![Vec::new(); n_cells];
        let mut entity_vertices: Vec<(EntityId, Vec<EntityId>)> = Vec::new();
        let mut buf = Vec::new();
        let mut counter = 0usize;

        for c in order {
            let (Some(cell_id), Some(cell)) = (cells.id(c), cells.get(c)) else {
                return Err(MeshTopologyError::OutOfRange {
                    what: "cell in color order",
                    index: c,
                    limit: n_cells,
                });
            };
            buf.clear();
            let sizes =
                self.policy
                    .create_entities(cell_id, cell, dim, &self.topology[m][m], &mut buf);
            let total: usize = sizes.iter().sum();
            if total != buf.len() {
                return Err(MeshTopologyError::LengthMismatch {
                    what: "create_entities group sizes vs ids",
                    left: total,
                    right: buf.len(),
                });
            }

            let mut pos = 0;
            for size in sizes {
                let group = &buf[pos..pos + size];
                pos += size;
                let mut key = group.to_vec();
                key.sort_unstable();
                let id = match seen.entry(key) {
                    Entry::Occupied(e) => *e.get(),
                    Entry::Vacant(e) => {
                        let local = match intermediate {
                            Some(imap) => {
                                let mut globals = group
                                    .iter()
                                    .map(|v| match vertex_map {
                                        Some(map) => map.get(&v.entity()).copied().ok_or(
                                            MeshTopologyError::MissingIndexMapEntry {
                                                index_space: vertex_is,
                                                id: v.entity(),
                                            },
                                        ),
                                        None => Ok(v.entity()),
                                    })
                                    .collect::<Result<Vec<_>, _>>()?;
                                globals.sort_unstable();
                                let gid = *imap
                                    .get(&globals)
                                    .ok_or(MeshTopologyError::MissingIntermediateEntry(globals))?;
                                match entity_map {
                                    Some(map) => map.get(&gid).copied().ok_or(
                                        MeshTopologyError::MissingIndexMapEntry {
                                            index_space: entity_is,
                                            id: gid,
                                        },
                                    )?,
                                    None => gid,
                                }
                            }
                            None => counter,
                        };
                        counter += 1;
                        let id = EntityId::try_new(dim, m, local, color)?;
                        entity_vertices.push((id, group.to_vec()));
                        *e.insert(id)
                    }
                };
                cell_rows[c].push(id);
            }
        }

        if intermediate.is_some() {
            entity_vertices.sort_by_key(|(id, _)| id.entity());
            if let Some((k, (id, _))) = entity_vertices
                .iter()
                .enumerate()
                .find(|(k, (id, _))| id.entity() != *k)
            {
                return Err(MeshTopologyError::InvariantViolation(format!(
                    "intermediate ids of dimension {dim} are not dense: {id:?} at position {k}"
                )));
            }
        }

        let (ids, rows): (Vec<EntityId>, Vec<Vec<EntityId>>) = entity_vertices.into_iter().unzip();
        let entities = ids
            .iter()
            .zip(&rows)
            .map(|(&id, verts)| Box::new(self.policy.create_entity(m, dim, id, verts.len())))
            .collect();
        debug!("domain {m}: created {} entities of dimension {dim}", ids.len());
        self.append_to_index_space(m, dim, entities, ids)?;

        let mut entity_to_vertex = Connectivity::new();
        entity_to_vertex.init(&rows);
        self.commit((m, m, dim, 0), entity_to_vertex)?;
        let mut cell_to_entity = Connectivity::new();
        cell_to_entity.init(&cell_rows);
        self.commit((m, m, using, dim), cell_to_entity)?;
        self.stats.builds += 1;
        Ok(())
    }

    /// Produce `(fm, tm, fd, td)` by inverting `(tm, fm, td, fd)`.
    ///
    /// Rows are ordered by the targets' global ids when the context has an
    /// index map for `(td, tm)`, by local id otherwise.
    pub fn transpose<C: MeshContext + ?Sized>(
        &mut self,
        ctx: &C,
        fm: usize,
        tm: usize,
        fd: usize,
        td: usize,
    ) -> Result<(), MeshTopologyError> {
        self.check_tuple(fm, tm, fd, td)?;
        if !self.conn(fm, tm, fd, td).is_empty() {
            return Ok(());
        }
        let mut out = self.transposed(fm, tm, fd, td)?;
        let map = self
            .types
            .index_space(td, tm)
            .and_then(|is| ctx.index_map(is).map(|map| (is, map)));
        if let Some((is, map)) = map {
            for k in 0..out.from_size() {
                let row = out.get_entities_mut(k);
                let mut keyed = row
                    .iter()
                    .map(|id| {
                        map.get(&id.entity())
                            .map(|&g| (g, *id))
                            .ok_or(MeshTopologyError::MissingIndexMapEntry {
                                index_space: is,
                                id: id.entity(),
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                keyed.sort_by_key(|&(g, _)| g);
                for (slot, (_, id)) in row.iter_mut().zip(keyed) {
                    *slot = id;
                }
            }
        }
        self.commit((fm, tm, fd, td), out)?;
        self.stats.transposes += 1;
        Ok(())
    }

    /// Counting pass, exact resize, fill pass. Rows come out in ascending
    /// local order of the targets.
    fn transposed(
        &self,
        fm: usize,
        tm: usize,
        fd: usize,
        td: usize,
    ) -> Result<Connectivity, MeshTopologyError> {
        debug!("transpose {tm}:{fm} {td}->{fd} into {fm}:{tm} {fd}->{td}");
        let src = self.conn(tm, fm, td, fd);
        if src.is_empty() {
            return Err(MeshTopologyError::empty_connectivity(tm, fm, td, fd));
        }
        let to_ids = self.index_spaces[tm][td].ids();
        if src.from_size() != to_ids.len() {
            return Err(MeshTopologyError::LengthMismatch {
                what: "transpose source rows vs entities",
                left: src.from_size(),
                right: to_ids.len(),
            });
        }
        let n_from = self.num_entities(fd, fm);
        let mut pos = vec![0usize; n_from];
        for id in src.to_ids() {
            let slot = pos.get_mut(id.entity()).ok_or(MeshTopologyError::OutOfRange {
                what: "transpose target",
                index: id.entity(),
                limit: n_from,
            })?;
            *slot += 1;
        }
        let mut out = Connectivity::new();
        out.resize(&pos);
        pos.fill(0);
        for (row, &to_id) in src.rows().zip(to_ids) {
            for from in row {
                let k = from.entity();
                out.set(k, to_id, pos[k]);
                pos[k] += 1;
            }
        }
        Ok(out)
    }

    /// Produce `(fm, tm, fd, td)` by walking `fd -> d -> td`.
    ///
    /// With `fd == td` every other entity reached qualifies. Otherwise the
    /// target's `d` entities (sorted) are compared with the source's: going
    /// down (`d < td`) the target's set must be included in the source's,
    /// going up a non-empty intersection suffices.
    pub fn intersect(
        &mut self,
        fm: usize,
        tm: usize,
        fd: usize,
        td: usize,
        d: usize,
    ) -> Result<(), MeshTopologyError> {
        self.check_tuple(fm, tm, fd, td)?;
        self.check_dim(d)?;
        if !self.conn(fm, tm, fd, td).is_empty() {
            return Ok(());
        }
        debug!("intersect {fm}:{tm} {fd}->{td} through dimension {d}");
        let c = self.required(fm, fm, fd, d)?;
        let c_dt = self.required(fm, tm, d, td)?;
        let c2 = if fd != td {
            Some(self.required(tm, tm, td, d)?)
        } else {
            None
        };

        let from_ids = self.index_spaces[fm][fd].ids();
        let n_to = self.num_entities(td, tm);
        if c.from_size() != from_ids.len() {
            return Err(MeshTopologyError::LengthMismatch {
                what: "intersect source rows vs entities",
                left: c.from_size(),
                right: from_ids.len(),
            });
        }

        let mut visited = vec![false; n_to];
        let mut rows = Vec::with_capacity(from_ids.len());
        let mut to_key = Vec::new();
        for (k, &from_id) in from_ids.iter().enumerate() {
            let mut from_key = c.get_entities(k).to_vec();
            from_key.sort_unstable();
            for mid in c.get_entities(k) {
                for t in c_dt.try_get_entities(mid.entity())? {
                    let flag = visited.get_mut(t.entity()).ok_or(MeshTopologyError::OutOfRange {
                        what: "intersect target",
                        index: t.entity(),
                        limit: n_to,
                    })?;
                    *flag = false;
                }
            }

            let mut row = Vec::new();
            for mid in c.get_entities(k) {
                for &t in c_dt.get_entities(mid.entity()) {
                    if std::mem::replace(&mut visited[t.entity()], true) {
                        continue;
                    }
                    let keep = match &c2 {
                        None => t != from_id,
                        Some(c2) => {
                            to_key.clear();
                            to_key.extend_from_slice(c2.try_get_entities(t.entity())?);
                            to_key.sort_unstable();
                            match d.cmp(&td) {
                                Ordering::Less => includes(&from_key, &to_key),
                                _ => intersects(&from_key, &to_key),
                            }
                        }
                    };
                    if keep {
                        row.push(t);
                    }
                }
            }
            rows.push(row);
        }

        let mut out = Connectivity::new();
        out.init(&rows);
        self.commit((fm, tm, fd, td), out)?;
        self.stats.intersects += 1;
        Ok(())
    }

    fn required(
        &self,
        fm: usize,
        tm: usize,
        fd: usize,
        td: usize,
    ) -> Result<&Connectivity, MeshTopologyError> {
        let c = self.conn(fm, tm, fd, td);
        if c.is_empty() {
            Err(MeshTopologyError::empty_connectivity(fm, tm, fd, td))
        } else {
            Ok(c)
        }
    }

    /// Ensure the cross-domain table `(fm, tm, fd, td)` is computed.
    pub fn compute_bindings<C: MeshContext + ?Sized>(
        &mut self,
        ctx: &C,
        fm: usize,
        tm: usize,
        fd: usize,
        td: usize,
    ) -> Result<(), MeshTopologyError> {
        self.check_tuple(fm, tm, fd, td)?;
        if !self.conn(fm, tm, fd, td).is_empty() {
            trace!("binding {fm}:{tm} {fd}->{td} already computed");
            return Ok(());
        }
        self.bindings_step(ctx, fm, tm, fd, td)
    }

    fn bindings_step<C: MeshContext + ?Sized>(
        &mut self,
        ctx: &C,
        fm: usize,
        tm: usize,
        fd: usize,
        td: usize,
    ) -> Result<(), MeshTopologyError> {
        match fm.cmp(&tm) {
            Ordering::Less => {
                if self.conn(tm, fm, td, fd).is_empty() && self.num_entities(td, tm) == 0 {
                    self.build_bindings(fm, tm, td)?;
                }
                if !self.conn(tm, fm, td, fd).is_empty() {
                    self.transpose(ctx, fm, tm, fd, td)?;
                }
                Ok(())
            }
            Ordering::Greater => {
                self.bindings_step(ctx, tm, fm, td, fd)?;
                self.transpose(ctx, fm, tm, fd, td)
            }
            Ordering::Equal => {
                if tm == 0 {
                    return Err(MeshTopologyError::UnsupportedQuery(
                        "bindings within domain 0 are connectivities".into(),
                    ));
                }
                self.bindings_step(ctx, 0, tm, 0, fd)?;
                self.bindings_step(ctx, 0, tm, 0, td)?;
                if !self.conn(tm, fm, td, fd).is_empty() {
                    self.transpose(ctx, fm, tm, fd, td)?;
                }
                Ok(())
            }
        }
    }

    /// Create the `td` entities of domain `tm` bound to the cells of `fm`.
    ///
    /// Commits the cell table `(fm, tm, top, td)` and, for every domain and
    /// dimension the new entities reference, `(tm, dom, td, dim)` with one
    /// row per bound entity.
    pub fn build_bindings(
        &mut self,
        fm: usize,
        tm: usize,
        td: usize,
    ) -> Result<(), MeshTopologyError> {
        debug!("building bindings {fm}->{tm} of dimension {td}");
        self.check_tuple(fm, tm, td, td)?;
        let top = P::NUM_DIMENSIONS;
        if !self.conn(fm, tm, top, td).is_empty() {
            return Ok(());
        }
        let cells = &self.index_spaces[fm][top];

        let mut cell_rows: Vec<Vec<EntityId>> = Vec::with_capacity(cells.len());
        let mut to_primal: Vec<Option<Vec<Vec<EntityId>>>> = vec![None; top + 1];
        let mut to_bound: Vec<Option<Vec<Vec<EntityId>>>> = vec![None; td];
        let mut bound: Vec<(EntityId, usize)> = Vec::new();
        let mut buf = Vec::new();

        for (cell_id, cell) in cells.iter() {
            buf.clear();
            let sizes = self.policy.create_bound_entities(
                fm,
                tm,
                td,
                cell_id,
                cell,
                &self.topology[fm][fm],
                &self.topology[fm][tm],
                &mut buf,
            );
            let total: usize = sizes.iter().sum();
            if total != buf.len() {
                return Err(MeshTopologyError::LengthMismatch {
                    what: "create_bound_entities group sizes vs ids",
                    left: total,
                    right: buf.len(),
                });
            }

            let mut row = Vec::with_capacity(sizes.len());
            let mut pos = 0;
            for size in sizes {
                let k = bound.len();
                let id = EntityId::try_new(td, tm, k, cell_id.color())?;
                row.push(id);
                let mut num_vertices = 0;
                for &r in &buf[pos..pos + size] {
                    let (dom, dim) = (r.domain(), r.dimension());
                    let table = if dom == fm && dim <= top {
                        if dim == 0 {
                            num_vertices += 1;
                        }
                        &mut to_primal[dim]
                    } else if dom == tm && dim < td {
                        &mut to_bound[dim]
                    } else {
                        return Err(MeshTopologyError::InvariantViolation(format!(
                            "bound entity of domain {tm} references {r:?}"
                        )));
                    };
                    let rows = table.get_or_insert_with(Vec::new);
                    rows.resize_with(k + 1, Vec::new);
                    rows[k].push(r);
                }
                pos += size;
                bound.push((id, num_vertices));
            }
            cell_rows.push(row);
        }

        let n = bound.len();
        let entities = bound
            .iter()
            .map(|&(id, nv)| Box::new(self.policy.create_entity(tm, td, id, nv)))
            .collect();
        let ids = bound.into_iter().map(|(id, _)| id).collect();
        self.append_to_index_space(tm, td, entities, ids)?;
        debug!("created {n} bound entities of dimension {td} in domain {tm}");

        let mut cell_out = Connectivity::new();
        cell_out.init(&cell_rows);
        self.commit((fm, tm, top, td), cell_out)?;
        let routed = to_primal
            .into_iter()
            .enumerate()
            .map(|(dim, rows)| (fm, dim, rows))
            .chain(
                to_bound
                    .into_iter()
                    .enumerate()
                    .map(|(dim, rows)| (tm, dim, rows)),
            );
        for (dom, dim, rows) in routed {
            if let Some(mut rows) = rows {
                rows.resize_with(n, Vec::new);
                let mut c = Connectivity::new();
                c.init(&rows);
                self.commit((tm, dom, td, dim), c)?;
            }
        }
        self.stats.binding_builds += 1;
        Ok(())
    }
}
