#![allow(dead_code)]
use mesh_topology::prelude::*;

/// Payload stored for every entity of the test meshes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ent {
    pub dim: usize,
    pub num_vertices: usize,
}

impl Ent {
    pub fn vertex() -> Self {
        Ent {
            dim: 0,
            num_vertices: 1,
        }
    }

    pub fn cell(n: usize) -> Self {
        Ent {
            dim: 2,
            num_vertices: n,
        }
    }
}

/// 2-D polygonal cells in domain 0 plus one "corner" per (cell, vertex)
/// pair in domain 1.
#[derive(Debug, Default, Clone)]
pub struct QuadPolicy;

pub const CORNERS: usize = 1;

impl MeshPolicy for QuadPolicy {
    const NUM_DIMENSIONS: usize = 2;
    const NUM_DOMAINS: usize = 2;
    type Entity = Ent;

    fn entity_types(&self) -> Vec<EntityType> {
        vec![
            EntityType { dimension: 0, domain: 0, index_space: 0 },
            EntityType { dimension: 1, domain: 0, index_space: 1 },
            EntityType { dimension: 2, domain: 0, index_space: 2 },
            EntityType { dimension: 0, domain: CORNERS, index_space: 3 },
        ]
    }

    fn connectivities(&self) -> Vec<ConnectivityPair> {
        vec![
            ConnectivityPair { domain: 0, from_dim: 0, to_dim: 2 },
            ConnectivityPair { domain: 0, from_dim: 2, to_dim: 1 },
            ConnectivityPair { domain: 0, from_dim: 1, to_dim: 2 },
        ]
    }

    fn bindings(&self) -> Vec<BindingPair> {
        vec![BindingPair { from_domain: 0, to_domain: CORNERS, from_dim: 2, to_dim: 0 }]
    }

    fn create_entities(
        &self,
        cell_id: EntityId,
        _cell: &Ent,
        dim: usize,
        conn: &DomainConnectivity,
        out: &mut Vec<EntityId>,
    ) -> Vec<usize> {
        if dim != 1 {
            return Vec::new();
        }
        let v = conn.get(2, 0).get_entities(cell_id.entity());
        let n = v.len();
        for i in 0..n {
            out.push(v[i]);
            out.push(v[(i + 1) % n]);
        }
        vec![2; n]
    }

    fn create_bound_entities(
        &self,
        _from_domain: usize,
        _to_domain: usize,
        dim: usize,
        cell_id: EntityId,
        _cell: &Ent,
        primal: &DomainConnectivity,
        _binding: &DomainConnectivity,
        out: &mut Vec<EntityId>,
    ) -> Vec<usize> {
        if dim != 0 {
            return Vec::new();
        }
        let v = primal.get(2, 0).get_entities(cell_id.entity());
        for &vertex in v {
            out.push(cell_id);
            out.push(vertex);
        }
        vec![2; v.len()]
    }

    fn create_entity(&self, _domain: usize, dim: usize, _id: EntityId, num_vertices: usize) -> Ent {
        Ent { dim, num_vertices }
    }
}

/// Same mesh shape, one domain only.
#[derive(Debug, Default, Clone)]
pub struct SingleDomainPolicy;

impl MeshPolicy for SingleDomainPolicy {
    const NUM_DIMENSIONS: usize = 2;
    const NUM_DOMAINS: usize = 1;
    type Entity = Ent;

    fn entity_types(&self) -> Vec<EntityType> {
        (0..=2)
            .map(|d| EntityType { dimension: d, domain: 0, index_space: d })
            .collect()
    }

    fn create_entities(
        &self,
        cell_id: EntityId,
        cell: &Ent,
        dim: usize,
        conn: &DomainConnectivity,
        out: &mut Vec<EntityId>,
    ) -> Vec<usize> {
        QuadPolicy.create_entities(cell_id, cell, dim, conn, out)
    }

    fn create_entity(&self, _domain: usize, dim: usize, _id: EntityId, num_vertices: usize) -> Ent {
        Ent { dim, num_vertices }
    }
}

/// Segments in two domains.
#[derive(Debug, Default, Clone)]
pub struct LinePolicy;

impl MeshPolicy for LinePolicy {
    const NUM_DIMENSIONS: usize = 1;
    const NUM_DOMAINS: usize = 2;
    type Entity = Ent;

    fn entity_types(&self) -> Vec<EntityType> {
        vec![
            EntityType { dimension: 0, domain: 0, index_space: 0 },
            EntityType { dimension: 1, domain: 0, index_space: 1 },
        ]
    }

    fn create_entities(
        &self,
        _cell_id: EntityId,
        _cell: &Ent,
        _dim: usize,
        _conn: &DomainConnectivity,
        _out: &mut Vec<EntityId>,
    ) -> Vec<usize> {
        Vec::new()
    }

    fn create_entity(&self, _domain: usize, dim: usize, _id: EntityId, num_vertices: usize) -> Ent {
        Ent { dim, num_vertices }
    }
}

/// Tetrahedra in one domain. Edges can be built from cells or from faces.
#[derive(Debug, Default, Clone)]
pub struct TetPolicy;

impl MeshPolicy for TetPolicy {
    const NUM_DIMENSIONS: usize = 3;
    const NUM_DOMAINS: usize = 1;
    type Entity = Ent;

    fn entity_types(&self) -> Vec<EntityType> {
        (0..=3)
            .map(|d| EntityType { dimension: d, domain: 0, index_space: d })
            .collect()
    }

    fn create_entities(
        &self,
        cell_id: EntityId,
        _cell: &Ent,
        dim: usize,
        conn: &DomainConnectivity,
        out: &mut Vec<EntityId>,
    ) -> Vec<usize> {
        let v = conn.get(cell_id.dimension(), 0).get_entities(cell_id.entity());
        match (v.len(), dim) {
            (4, 2) => {
                for skip in 0..4 {
                    out.extend((0..4).filter(|&k| k != skip).map(|k| v[k]));
                }
                vec![3; 4]
            }
            (_, 1) => {
                let n = v.len();
                for i in 0..n {
                    for j in i + 1..n {
                        out.push(v[i]);
                        out.push(v[j]);
                    }
                }
                vec![2; n * (n - 1) / 2]
            }
            _ => Vec::new(),
        }
    }

    fn create_entity(&self, _domain: usize, dim: usize, _id: EntityId, num_vertices: usize) -> Ent {
        Ent { dim, num_vertices }
    }
}

/// Two tetrahedra `[0, 1, 2, 3]` and `[1, 2, 3, 4]` sharing face `{1, 2, 3}`.
pub fn two_tets(ctx: &SerialContext) -> MeshTopology<TetPolicy> {
    let mut mesh = MeshTopology::new(TetPolicy).unwrap();
    let v: Vec<_> = (0..5)
        .map(|_| mesh.make_entity(ctx, 0, 0, Ent::vertex()).unwrap())
        .collect();
    for cell in [[0, 1, 2, 3], [1, 2, 3, 4]] {
        let id = mesh
            .make_entity(ctx, 0, 3, Ent { dim: 3, num_vertices: 4 })
            .unwrap();
        mesh.init_cell(0, id, &cell.map(|k| v[k])).unwrap();
    }
    mesh
}

pub fn vid(e: usize) -> EntityId {
    EntityId::new(0, 0, e, 0)
}

pub fn cid(e: usize) -> EntityId {
    EntityId::new(2, 0, e, 0)
}

/// Local entity numbers of a row.
pub fn locals(ids: &[EntityId]) -> Vec<usize> {
    ids.iter().map(|id| id.entity()).collect()
}

pub fn sorted_locals(ids: &[EntityId]) -> Vec<usize> {
    let mut v = locals(ids);
    v.sort_unstable();
    v
}

/// Vertices `j * (nx + 1) + i`, cells `j * nx + i` with counter-clockwise
/// vertices. Two quads side by side:
///
/// ```text
/// 3---4---5
/// | 0 | 1 |
/// 0---1---2
/// ```
pub fn quad_grid<P>(policy: P, ctx: &SerialContext, nx: usize, ny: usize) -> MeshTopology<P>
where
    P: MeshPolicy<Entity = Ent>,
{
    let mut mesh = MeshTopology::new(policy).unwrap();
    let v = |i: usize, j: usize| j * (nx + 1) + i;
    let mut vertices = Vec::new();
    for _ in 0..(nx + 1) * (ny + 1) {
        vertices.push(mesh.make_entity(ctx, 0, 0, Ent::vertex()).unwrap());
    }
    for j in 0..ny {
        for i in 0..nx {
            let cell = mesh.make_entity(ctx, 0, 2, Ent::cell(4)).unwrap();
            let verts = [v(i, j), v(i + 1, j), v(i + 1, j + 1), v(i, j + 1)].map(|k| vertices[k]);
            mesh.init_cell(0, cell, &verts).unwrap();
        }
    }
    mesh
}

pub fn two_quads() -> (MeshTopology<QuadPolicy>, SerialContext) {
    let ctx = SerialContext::default();
    (quad_grid(QuadPolicy, &ctx, 2, 1), ctx)
}

/// Assert vec is a permutation of another vec (order-agnostic).
pub fn assert_permutation<T: Ord + Copy + std::fmt::Debug>(got: &[T], want: &[T]) {
    let mut a = got.to_vec();
    a.sort_unstable();
    let mut b = want.to_vec();
    b.sort_unstable();
    assert_eq!(a, b, "not a permutation\n got={:?}\nwant={:?}", got, want);
}
