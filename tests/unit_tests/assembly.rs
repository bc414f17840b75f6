use matrixcompare::assert_matrix_eq;
use nalgebra::{Point3, SMatrix};
use skoll::assembly::pattern::{
    build_coo_pattern, build_csr_pattern_parallel, build_csr_pattern_sequential,
};
use skoll::assembly::{AtomicParAssembler, RowParAssembler, SerialAssembler};
use skoll::element::{cell_corners, ElementKernel, FnKernel, LaplaceTet4, LaplaceTri3};
use skoll::error::AssemblyError;
use skoll::mesh::procedural::{two_triangle_strip, unit_cube_tetrahedra, unit_square_triangles};
use skoll::mesh::Connectivity;
use skoll::mesh::TriangleMesh;
use skoll::sparse::{CsrMatrix, DokMatrix, SparseStore};

/// A kernel that ignores geometry: 1 on the diagonal, 0.5 off-diagonal.
fn identity_like_kernel(
    _corners: &[Point3<f64>; 3],
) -> eyre::Result<SMatrix<f64, 3, 3>> {
    Ok(SMatrix::from_fn(|i, j| if i == j { 1.0 } else { 0.5 }))
}

fn csr_store(mesh: &TriangleMesh) -> SparseStore {
    SparseStore::Csr(build_csr_pattern_sequential(mesh).unwrap())
}

#[test]
fn two_triangle_accumulation_is_exact() {
    // Two cells sharing the edge (1, 2). With unit diagonal and 0.5
    // off-diagonal element matrices, shared topology must accumulate:
    // corner nodes see one cell, shared-edge nodes see two.
    let mesh = two_triangle_strip();
    let mut store = csr_store(&mesh);
    SerialAssembler
        .assemble(&mesh, &FnKernel(identity_like_kernel), &mut store)
        .unwrap();

    let dense = store.to_dense();
    assert_eq!(dense[(0, 0)], 1.0);
    assert_eq!(dense[(3, 3)], 1.0);
    assert_eq!(dense[(1, 1)], 2.0);
    assert_eq!(dense[(2, 2)], 2.0);
    // Pairs sharing a single cell accumulate one off-diagonal contribution,
    // the shared edge accumulates one from each cell
    assert_eq!(dense[(0, 1)], 0.5);
    assert_eq!(dense[(0, 2)], 0.5);
    assert_eq!(dense[(1, 3)], 0.5);
    assert_eq!(dense[(1, 2)], 1.0);
    assert_eq!(dense[(2, 1)], 1.0);
    // Nodes 0 and 3 share no cell: the coordinate is not even in the pattern
    if let SparseStore::Csr(csr) = &store {
        assert_eq!(csr.index_of(0, 3), None);
        assert_eq!(csr.index_of(3, 0), None);
    } else {
        unreachable!();
    }
}

#[test]
fn row_fill_matches_reserved_neighbor_counts() {
    let mesh = unit_square_triangles(4, 4);
    let adjacency = mesh.node_node_adjacency();
    let mut store = csr_store(&mesh);
    SerialAssembler
        .assemble(&mesh, &LaplaceTri3, &mut store)
        .unwrap();

    let SparseStore::Csr(csr) = &store else {
        unreachable!()
    };
    for node in 0..mesh.num_nodes() {
        let begin = csr.row_offsets()[node];
        let end = csr.row_offsets()[node + 1];
        let claimed = csr.column_indices()[begin..end]
            .iter()
            .filter(|&&c| c != skoll::sparse::UNCLAIMED)
            .count();
        assert_eq!(claimed, adjacency.count(node) + 1);
        assert_eq!(end - begin, claimed, "no over-reservation for this mesh");
    }
}

#[test]
fn serial_assembly_is_bit_identical_across_runs() {
    let mesh = unit_square_triangles(5, 4);
    let mut store = csr_store(&mesh);
    SerialAssembler
        .assemble(&mesh, &LaplaceTri3, &mut store)
        .unwrap();
    let SparseStore::Csr(csr) = &store else {
        unreachable!()
    };
    let first: Vec<f64> = csr.values().to_vec();

    store.clear_values();
    SerialAssembler
        .assemble(&mesh, &LaplaceTri3, &mut store)
        .unwrap();
    let SparseStore::Csr(csr) = &store else {
        unreachable!()
    };
    // Exact equality: same iteration order, same plain accumulation
    assert_eq!(csr.values(), first.as_slice());
}

#[test]
fn all_assemblers_agree_within_reduction_order_tolerance() {
    let mesh = unit_square_triangles(6, 5);

    let mut serial = csr_store(&mesh);
    SerialAssembler
        .assemble(&mesh, &LaplaceTri3, &mut serial)
        .unwrap();
    let reference = serial.to_dense();

    // Cell-parallel with atomic scatter over a parallel-built pattern
    let mut atomic = SparseStore::Csr(build_csr_pattern_parallel(&mesh).unwrap());
    AtomicParAssembler
        .assemble(&mesh, &LaplaceTri3, &mut atomic)
        .unwrap();
    assert_matrix_eq!(atomic.to_dense(), reference, comp = abs, tol = 1e-10);

    // Row-partitioned assembly over bare reserved rows (build-less fill)
    let adjacency = mesh.node_node_adjacency();
    let counts: Vec<usize> = (0..mesh.num_nodes())
        .map(|n| adjacency.count(n) + 1)
        .collect();
    let mut row_wise = CsrMatrix::from_row_counts(&counts, mesh.num_nodes());
    RowParAssembler
        .assemble(&mesh, &LaplaceTri3, &mut row_wise)
        .unwrap();
    assert_matrix_eq!(row_wise.to_dense(), reference, comp = abs, tol = 1e-10);

    // COO layouts, sorted and unsorted
    for sort in [false, true] {
        let mut coo = SparseStore::Coo(build_coo_pattern(&mesh, sort).unwrap());
        AtomicParAssembler
            .assemble(&mesh, &LaplaceTri3, &mut coo)
            .unwrap();
        assert_matrix_eq!(coo.to_dense(), reference, comp = abs, tol = 1e-10);
    }

    // The hash-based baseline
    let mut legacy = SparseStore::Dok(DokMatrix::new(mesh.num_nodes(), mesh.num_nodes()));
    SerialAssembler
        .assemble(&mesh, &LaplaceTri3, &mut legacy)
        .unwrap();
    assert_matrix_eq!(legacy.to_dense(), reference, comp = abs, tol = 1e-10);
}

#[test]
fn tet_assembly_matches_serial_reference() {
    let mesh = unit_cube_tetrahedra();
    let mut serial = SparseStore::Csr(build_csr_pattern_sequential(&mesh).unwrap());
    SerialAssembler
        .assemble(&mesh, &LaplaceTet4, &mut serial)
        .unwrap();
    let reference = serial.to_dense();

    let mut atomic = SparseStore::Csr(build_csr_pattern_parallel(&mesh).unwrap());
    AtomicParAssembler
        .assemble(&mesh, &LaplaceTet4, &mut atomic)
        .unwrap();
    assert_matrix_eq!(atomic.to_dense(), reference, comp = abs, tol = 1e-10);

    // Row sums of a pure-Neumann Laplace stiffness matrix vanish
    for i in 0..reference.nrows() {
        assert!(reference.row(i).sum().abs() < 1e-12);
    }
}

#[test]
fn scattered_diagonal_matches_independent_per_cell_sum() {
    let mesh = unit_square_triangles(3, 3);
    let mut store = csr_store(&mesh);
    SerialAssembler
        .assemble(&mesh, &LaplaceTri3, &mut store)
        .unwrap();
    let dense = store.to_dense();

    // Recompute each diagonal entry outside the assembler by iterating the
    // cells touching the node
    let node_cells = mesh.node_cell_adjacency();
    for node in 0..mesh.num_nodes() {
        let mut expected = 0.0;
        for &cell_index in node_cells.neighbors(node) {
            let cell = &mesh.connectivity()[cell_index];
            let corners = cell_corners::<_, 3>(&mesh, cell).unwrap();
            let k_e = LaplaceTri3.element_matrix(&corners).unwrap();
            let local = cell
                .vertex_indices()
                .iter()
                .position(|&n| n == node)
                .unwrap();
            expected += k_e[(local, local)];
        }
        assert!((dense[(node, node)] - expected).abs() < 1e-12);
    }
}

#[test]
fn non_owned_rows_are_never_written() {
    let mut mesh = unit_square_triangles(3, 3);
    let ghosts = [0, 5, 7];
    mesh.set_unowned_nodes(&ghosts);

    let mut store = csr_store(&mesh);
    SerialAssembler
        .assemble(&mesh, &LaplaceTri3, &mut store)
        .unwrap();
    let dense = store.to_dense();
    for &ghost in &ghosts {
        assert_eq!(dense.row(ghost).sum(), 0.0);
        assert_eq!(dense.row(ghost).amax(), 0.0);
    }
    // Owned rows are unaffected by the ownership of their column nodes
    let mut full_store = csr_store(&unit_square_triangles(3, 3));
    SerialAssembler
        .assemble(
            &unit_square_triangles(3, 3),
            &LaplaceTri3,
            &mut full_store,
        )
        .unwrap();
    let full = full_store.to_dense();
    for node in 0..mesh.num_nodes() {
        if mesh.is_owned(node) {
            assert_eq!(dense.row(node), full.row(node));
        }
    }
}

#[test]
fn mismatched_kernel_and_mesh_is_fatal() {
    let mesh = two_triangle_strip();
    let mut store = csr_store(&mesh);
    let err = SerialAssembler
        .assemble(&mesh, &LaplaceTet4, &mut store)
        .unwrap_err();
    let assembly_error = err.downcast_ref::<AssemblyError>().unwrap();
    assert_eq!(
        *assembly_error,
        AssemblyError::UnsupportedCellType {
            expected: 4,
            found: 3
        }
    );
}

#[test]
fn atomic_assembly_requires_a_claimed_pattern() {
    let mesh = two_triangle_strip();
    let adjacency = mesh.node_node_adjacency();
    let counts: Vec<usize> = (0..mesh.num_nodes())
        .map(|n| adjacency.count(n) + 1)
        .collect();
    // Reserved but unclaimed rows: every scatter target is missing
    let mut store = SparseStore::Csr(CsrMatrix::from_row_counts(&counts, mesh.num_nodes()));
    let err = AtomicParAssembler
        .assemble(&mesh, &LaplaceTri3, &mut store)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AssemblyError>(),
        Some(AssemblyError::MissingEntry { .. })
    ));
}

#[test]
fn legacy_layout_has_no_concurrent_path() {
    let mesh = two_triangle_strip();
    let mut store = SparseStore::Dok(DokMatrix::new(mesh.num_nodes(), mesh.num_nodes()));
    let err = AtomicParAssembler
        .assemble(&mesh, &LaplaceTri3, &mut store)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AssemblyError>(),
        Some(AssemblyError::UnsupportedLayout { .. })
    ));
}

#[test]
fn capacity_exhaustion_surfaces_as_an_error() {
    let mesh = two_triangle_strip();
    // Under-reserve every row on purpose
    let counts = vec![1; mesh.num_nodes()];
    let mut store = SparseStore::Csr(CsrMatrix::from_row_counts(&counts, mesh.num_nodes()));
    let err = SerialAssembler
        .assemble(&mesh, &LaplaceTri3, &mut store)
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<AssemblyError>(),
        Some(AssemblyError::CapacityExhausted { .. })
    ));
}
