//! Split the same-dimension adjacency graph of a mesh into CSR chunks.
//
// Entities of dimension `dim` are graph vertices; two of them are joined when
// they share an entity of dimension `dim - 1` (vertices: when they share an
// edge). The rows are cut into consecutive chunks whose lengths follow the
// requested partition sizes, ready to hand to a graph partitioner.
//
// * `offset[i] .. offset[i+1]` = neighbour list of row *i* of the chunk
// * `index`                    = concatenated neighbours (`EntityId::local_id`)
// * `partition`                = first row of every chunk, plus the total

use log::debug;

use crate::mesh_error::MeshTopologyError;
use crate::topology::context::MeshContext;
use crate::topology::mesh::MeshTopology;
use crate::topology::policy::MeshPolicy;

/// One chunk of the graph in CSR form.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct GraphPartition {
    pub offset: Vec<usize>,
    pub index: Vec<u64>,
    /// Shared by every chunk of one call.
    pub partition: Vec<usize>,
}

impl GraphPartition {
    /// Number of rows in this chunk.
    pub fn len(&self) -> usize {
        self.offset.len().saturating_sub(1)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Neighbours of row `i`.
    pub fn neighbours(&self, i: usize) -> &[u64] {
        &self.index[self.offset[i]..self.offset[i + 1]]
    }
}

/// Compute the graph of `dim` entities of `domain` and cut it into
/// `partition_sizes.len()` chunks.
///
/// Every chunk but the last receives `max(1, (n / Σsizes) · size)` rows
/// (fewer if the rows run out); the last one takes whatever remains.
/// A neighbour reached through several shared entities is listed once per
/// shared entity.
pub fn compute_graph_partition<P, C>(
    mesh: &mut MeshTopology<P>,
    ctx: &C,
    domain: usize,
    dim: usize,
    partition_sizes: &[usize],
) -> Result<Vec<GraphPartition>, MeshTopologyError>
where
    P: MeshPolicy,
    C: MeshContext + ?Sized,
{
    let total: usize = partition_sizes.iter().sum();
    if total == 0 {
        return Err(MeshTopologyError::UnsupportedQuery(
            "graph partition sizes sum to zero".into(),
        ));
    }
    if dim > mesh.topological_dimension() {
        return Err(MeshTopologyError::OutOfRange {
            what: "dimension",
            index: dim,
            limit: mesh.topological_dimension() + 1,
        });
    }
    let through = if dim == 0 { 1 } else { dim - 1 };
    mesh.get_connectivity(ctx, domain, domain, dim, through)?;
    mesh.get_connectivity(ctx, domain, domain, through, dim)?;
    let down = mesh.connectivity(domain, domain, dim, through)?;
    let up = mesh.connectivity(domain, domain, through, dim)?;

    let n = mesh.num_entities(dim, domain);
    let per_unit = n / total;
    debug!(
        "graph partition of {n} entities of dimension {dim} into {} chunks",
        partition_sizes.len()
    );

    let mut chunks = Vec::with_capacity(partition_sizes.len());
    let mut partition = vec![0];
    let mut row = 0;
    for (k, &size) in partition_sizes.iter().enumerate() {
        let remaining = n - row;
        let rows = if k + 1 == partition_sizes.len() {
            remaining
        } else {
            (per_unit * size).max(1).min(remaining)
        };

        let mut chunk = GraphPartition {
            offset: Vec::with_capacity(rows + 1),
            ..Default::default()
        };
        chunk.offset.push(0);
        for from in row..row + rows {
            for mid in down.try_get_entities(from)? {
                for back in up.try_get_entities(mid.entity())? {
                    if back.entity() != from {
                        chunk.index.push(back.local_id());
                    }
                }
            }
            chunk.offset.push(chunk.index.len());
        }
        row += rows;
        partition.push(row);
        chunks.push(chunk);
    }

    for chunk in &mut chunks {
        chunk.partition.clone_from(&partition);
    }
    Ok(chunks)
}
