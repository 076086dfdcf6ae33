mod util;
use mesh_topology::prelude::*;
use util::*;

#[test]
fn two_quads_share_one_edge() {
    let (mut mesh, ctx) = two_quads();
    let c2e = mesh.get_connectivity(&ctx, 0, 0, 2, 1).unwrap().clone();
    assert_eq!(mesh.num_entities(1, 0), 7);
    assert_eq!(c2e.from_size(), 2);
    assert_eq!(c2e.count(0), 4);
    assert_eq!(c2e.count(1), 4);

    let e0 = sorted_locals(c2e.get_entities(0));
    let e1 = sorted_locals(c2e.get_entities(1));
    let shared: Vec<_> = e0.iter().filter(|e| e1.contains(e)).copied().collect();
    assert_eq!(shared.len(), 1);

    let e2v = mesh.connectivity(0, 0, 1, 0).unwrap();
    assert_eq!(sorted_locals(e2v.get_entities(shared[0])), vec![1, 4]);
    for row in e2v.rows() {
        assert_eq!(row.len(), 2);
    }
}

#[test]
fn edges_keep_cell_vertex_order_of_first_discovery() {
    let (mut mesh, ctx) = two_quads();
    mesh.get_connectivity(&ctx, 0, 0, 1, 0).unwrap();
    let e2v = mesh.connectivity(0, 0, 1, 0).unwrap();
    // cell 0 is [0, 1, 4, 3]
    assert_eq!(locals(e2v.get_entities(0)), vec![0, 1]);
    assert_eq!(locals(e2v.get_entities(1)), vec![1, 4]);
    assert_eq!(locals(e2v.get_entities(2)), vec![4, 3]);
    assert_eq!(locals(e2v.get_entities(3)), vec![3, 0]);
    let ids = mesh.entity_ids(1, 0).unwrap();
    assert!(ids.iter().enumerate().all(|(k, id)| id.entity() == k && id.dimension() == 1));
    let edge = mesh.entity(ids[0]).unwrap();
    assert_eq!(edge, &Ent { dim: 1, num_vertices: 2 });
}

#[test]
fn vertex_to_vertex_through_cells() {
    let (mut mesh, ctx) = two_quads();
    let v2v = mesh.get_connectivity(&ctx, 0, 0, 0, 0).unwrap();
    assert_eq!(sorted_locals(v2v.get_entities(0)), vec![1, 3, 4]);
    assert_eq!(sorted_locals(v2v.get_entities(1)), vec![0, 2, 3, 4, 5]);
    assert_eq!(sorted_locals(v2v.get_entities(2)), vec![1, 4, 5]);
}

#[test]
fn vertex_to_cell_is_the_transpose() {
    let (mut mesh, ctx) = two_quads();
    let v2c = mesh.get_connectivity(&ctx, 0, 0, 0, 2).unwrap();
    assert_eq!(locals(v2c.get_entities(0)), vec![0]);
    assert_eq!(locals(v2c.get_entities(1)), vec![0, 1]);
    assert_eq!(locals(v2c.get_entities(4)), vec![0, 1]);
    assert_eq!(locals(v2c.get_entities(5)), vec![1]);
}

#[test]
fn edge_to_cell_and_same_dimension_neighbours() {
    let (mut mesh, ctx) = two_quads();
    let e2c = mesh.get_connectivity(&ctx, 0, 0, 1, 2).unwrap().clone();
    let counts: Vec<_> = (0..e2c.from_size()).map(|e| e2c.count(e)).collect();
    assert_eq!(counts.iter().filter(|&&c| c == 2).count(), 1);
    assert_eq!(counts.iter().filter(|&&c| c == 1).count(), 6);

    let c2c = mesh.get_connectivity(&ctx, 0, 0, 2, 2).unwrap();
    assert_eq!(locals(c2c.get_entities(0)), vec![1]);
    assert_eq!(locals(c2c.get_entities(1)), vec![0]);

    // edge 0 is (0,1); edges touching 0 or 1: (1,4) (3,0) (1,2)
    let e2e = mesh.get_connectivity(&ctx, 0, 0, 1, 1).unwrap().clone();
    assert_eq!(e2e.count(0), 3);
    let e2v = mesh.connectivity(0, 0, 1, 0).unwrap();
    for &other in e2e.get_entities(0) {
        let verts = locals(e2v.get_entities(other.entity()));
        assert!(verts.contains(&0) || verts.contains(&1));
    }
}

#[test]
fn no_self_loops_and_no_duplicates() {
    let ctx = SerialContext::default();
    let mut mesh = quad_grid(QuadPolicy, &ctx, 3, 2);
    for fd in 0..=2 {
        for td in 0..=2 {
            let c = mesh.get_connectivity(&ctx, 0, 0, fd, td).unwrap();
            for (k, row) in c.rows().enumerate() {
                let mut sorted = locals(row);
                sorted.sort_unstable();
                sorted.dedup();
                assert_eq!(sorted.len(), row.len(), "duplicate in {fd}->{td} row {k}");
                if fd == td {
                    assert!(!sorted.contains(&k), "self loop in {fd}->{td} row {k}");
                }
            }
        }
    }
    // 3x2 quads: 3*3 horizontal + 4*2 vertical edges
    assert_eq!(mesh.num_entities(1, 0), 17);
}

#[test]
fn derivations_are_memoized() {
    let (mut mesh, ctx) = two_quads();
    mesh.get_connectivity(&ctx, 0, 0, 1, 2).unwrap();
    let first = mesh.stats();
    assert_eq!(first.builds, 1);
    assert!(first.total() >= 2);
    let a = mesh.get_connectivity(&ctx, 0, 0, 1, 2).unwrap().clone();
    let b = mesh.get_connectivity(&ctx, 0, 0, 1, 2).unwrap().clone();
    assert_eq!(a, b);
    assert_eq!(mesh.stats(), first);
}

#[test]
fn cells_to_vertices_recovered_from_faces() {
    let ctx = SerialContext::default();
    let mut mesh = MeshTopology::new(SingleDomainPolicy).unwrap();
    let v: Vec<_> = (0..4)
        .map(|_| mesh.make_entity(&ctx, 0, 0, Ent::vertex()).unwrap())
        .collect();
    let edges = [(0, 1), (1, 2), (2, 3), (3, 0)];
    let mut e = Vec::new();
    for (a, b) in edges {
        let id = mesh
            .make_entity(&ctx, 0, 1, Ent { dim: 1, num_vertices: 2 })
            .unwrap();
        mesh.init_entity(0, 1, 0, id, &[v[a], v[b]]).unwrap();
        e.push(id);
    }
    let cell = mesh.make_entity(&ctx, 0, 2, Ent::cell(4)).unwrap();
    mesh.init_entity(0, 2, 1, cell, &e).unwrap();

    let c2v = mesh.get_connectivity(&ctx, 0, 0, 2, 0).unwrap();
    assert_eq!(sorted_locals(c2v.get_entities(0)), vec![0, 1, 2, 3]);
    assert!(!mesh.connectivity(0, 0, 1, 2).unwrap().is_empty());
    assert!(!mesh.connectivity(0, 0, 0, 1).unwrap().is_empty());
}

#[test]
fn init_computes_declared_connectivities_and_bindings() {
    let (mut mesh, ctx) = two_quads();
    mesh.init(&ctx, 0).unwrap();
    for (fd, td) in [(0, 2), (2, 1), (1, 2)] {
        assert!(!mesh.connectivity(0, 0, fd, td).unwrap().is_empty());
    }
    assert!(!mesh.connectivity(0, CORNERS, 2, 0).unwrap().is_empty());
    assert_eq!(mesh.num_entities(0, CORNERS), 8);
    let before = mesh.stats();
    mesh.init(&ctx, 0).unwrap();
    assert_eq!(mesh.stats(), before);
}

#[test]
fn bad_requests_are_errors() {
    let (mut mesh, ctx) = two_quads();
    assert!(matches!(
        mesh.get_connectivity(&ctx, 0, 0, 3, 0),
        Err(MeshTopologyError::OutOfRange { what: "dimension", .. })
    ));
    assert!(matches!(
        mesh.get_connectivity(&ctx, 2, 0, 0, 0),
        Err(MeshTopologyError::OutOfRange { what: "domain", .. })
    ));
    // the corner domain has no cells
    assert!(matches!(
        mesh.get_connectivity(&ctx, CORNERS, CORNERS, 0, 0),
        Err(MeshTopologyError::EmptyConnectivity { .. })
    ));
    // reading a table that was never derived
    assert!(matches!(
        mesh.adjacent_ids(0, cid(0), 1),
        Err(MeshTopologyError::EmptyConnectivity { .. })
    ));
}

#[test]
fn entity_counts_are_range_checked() {
    let (mesh, _) = two_quads();
    assert_eq!(mesh.try_num_entities(2, 0), Ok(2));
    assert!(matches!(
        mesh.try_num_entities(3, 0),
        Err(MeshTopologyError::OutOfRange { what: "dimension", .. })
    ));
    assert!(matches!(
        mesh.try_num_entities(0, 2),
        Err(MeshTopologyError::OutOfRange { what: "domain", .. })
    ));
}

#[test]
#[should_panic]
fn unchecked_entity_count_panics_out_of_range() {
    let (mesh, _) = two_quads();
    mesh.num_entities(0, 2);
}

#[test]
fn cells_must_be_initialised_in_order() {
    let ctx = SerialContext::default();
    let mut mesh = MeshTopology::new(QuadPolicy).unwrap();
    let v: Vec<_> = (0..3)
        .map(|_| mesh.make_entity(&ctx, 0, 0, Ent::vertex()).unwrap())
        .collect();
    let c0 = mesh.make_entity(&ctx, 0, 2, Ent::cell(3)).unwrap();
    let c1 = mesh.make_entity(&ctx, 0, 2, Ent::cell(3)).unwrap();
    assert_eq!(
        mesh.init_cell(0, c1, &v),
        Err(MeshTopologyError::IdMismatch { expected: 0, found: 1 })
    );
    assert!(matches!(
        mesh.init_cell(0, c0, &[v[0], EntityId::new(0, 0, 9, 0)]),
        Err(MeshTopologyError::InvariantViolation(_))
    ));
    mesh.init_cell(0, c0, &v).unwrap();
    mesh.init_cell(0, c1, &v).unwrap();
}

#[test]
fn adjacency_by_entity() {
    let (mut mesh, ctx) = two_quads();
    mesh.get_connectivity(&ctx, 0, 0, 2, 0).unwrap();
    let verts = mesh.adjacent_entities(0, cid(1), 0).unwrap();
    assert_eq!(verts.len(), 4);
    assert!(verts.iter().all(|v| **v == Ent::vertex()));

    mesh.reverse_entities(0, cid(1), 0).unwrap();
    assert_eq!(locals(mesh.adjacent_ids(0, cid(1), 0).unwrap()), vec![4, 5, 2, 1]);
    mesh.reorder_entities(0, cid(1), 0, &[3, 2, 1, 0]).unwrap();
    assert_eq!(locals(mesh.adjacent_ids(0, cid(1), 0).unwrap()), vec![1, 2, 5, 4]);
    assert!(mesh.reorder_entities(0, cid(1), 0, &[0, 0, 1, 2]).is_err());
}

#[test]
fn dump_lists_computed_tables() {
    let (mut mesh, ctx) = two_quads();
    mesh.get_connectivity(&ctx, 0, 0, 0, 2).unwrap();
    let mut out = Vec::new();
    mesh.dump(&mut out).unwrap();
    let text = String::from_utf8(out).unwrap();
    assert!(text.contains("=================== from domain: 0"));
    assert!(text.contains("----- 2 -> 0"));
    assert!(text.contains("----- 0 -> 2"));
    assert!(!text.contains("----- 1 -> 0"));
}

#[test]
fn invalid_policies_are_rejected() {
    #[derive(Debug, Default)]
    struct Duplicate;
    impl MeshPolicy for Duplicate {
        const NUM_DIMENSIONS: usize = 2;
        const NUM_DOMAINS: usize = 1;
        type Entity = Ent;
        fn entity_types(&self) -> Vec<EntityType> {
            vec![
                EntityType { dimension: 0, domain: 0, index_space: 0 },
                EntityType { dimension: 2, domain: 0, index_space: 0 },
            ]
        }
        fn connectivities(&self) -> Vec<ConnectivityPair> {
            vec![ConnectivityPair { domain: 0, from_dim: 2, to_dim: 1 }]
        }
        fn create_entities(
            &self,
            _: EntityId,
            _: &Ent,
            _: usize,
            _: &DomainConnectivity,
            _: &mut Vec<EntityId>,
        ) -> Vec<usize> {
            Vec::new()
        }
        fn create_entity(&self, _: usize, dim: usize, _: EntityId, n: usize) -> Ent {
            Ent { dim, num_vertices: n }
        }
    }
    assert!(matches!(
        MeshTopology::new(Duplicate),
        Err(MeshTopologyError::InvalidPolicy(_))
    ));
}
