use nalgebra::DVector;
use skoll::assembly::pattern::{build_coo_pattern, build_csr_pattern_sequential};
use skoll::assembly::SerialAssembler;
use skoll::bc::{
    self, DirichletValues, EnforcementMethod, FluxSpec, NeumannCondition,
};
use skoll::element::LaplaceTri3;
use skoll::error::AssemblyError;
use skoll::mesh::procedural::{two_triangle_strip, unit_square_triangles};
use skoll::mesh::{FaceConnectivity, TriangleMesh};
use skoll::sparse::{CsrMatrix, SparseStore};

fn assembled_triangle_store(mesh: &TriangleMesh) -> SparseStore {
    let mut store = SparseStore::Csr(build_csr_pattern_sequential(mesh).unwrap());
    SerialAssembler
        .assemble(mesh, &LaplaceTri3, &mut store)
        .unwrap();
    store
}

#[test]
fn penalty_overwrites_the_diagonal_exactly() {
    let mesh = two_triangle_strip();
    let mut store = assembled_triangle_store(&mesh);
    let mut rhs = DVector::zeros(mesh.num_nodes());

    let mut dirichlet = DirichletValues::new(mesh.num_nodes());
    dirichlet.set(1, 21.0);

    let penalty = 1.0e30;
    bc::enforce_dirichlet(
        EnforcementMethod::Penalty,
        penalty,
        &mesh,
        &dirichlet,
        &mut store,
        &mut rhs,
    )
    .unwrap();

    let dense = store.to_dense();
    // The assembled value at (1, 1) is destroyed, not accumulated
    assert_eq!(dense[(1, 1)], penalty);
    assert_eq!(rhs[1], penalty * 21.0);
    // Off-diagonal entries of the constrained row are untouched
    assert!(dense[(1, 0)] != 0.0);
    assert_eq!(rhs[0], 0.0);
}

#[test]
fn weak_penalty_preserves_the_assembled_diagonal() {
    let mesh = two_triangle_strip();
    let mut store = assembled_triangle_store(&mesh);
    let assembled = store.to_dense()[(1, 1)];
    let mut rhs = DVector::zeros(mesh.num_nodes());

    let mut dirichlet = DirichletValues::new(mesh.num_nodes());
    dirichlet.set(1, 2.0);

    // A small penalty keeps the difference to Penalty observable
    let penalty = 64.0;
    bc::enforce_dirichlet(
        EnforcementMethod::WeakPenalty,
        penalty,
        &mesh,
        &dirichlet,
        &mut store,
        &mut rhs,
    )
    .unwrap();

    assert_eq!(store.to_dense()[(1, 1)], assembled + penalty);
    assert_eq!(rhs[1], penalty * 2.0);
}

#[test]
fn concurrent_penalty_matches_sequential_penalty() {
    let mesh = unit_square_triangles(4, 4);
    let mut dirichlet = DirichletValues::new(mesh.num_nodes());
    let left_nodes = mesh.nodes_of_faces(&mesh.boundary_faces_where(|c| c.x < 1e-12));
    dirichlet.apply_to_nodes(&left_nodes, 5.0);

    for method in [EnforcementMethod::Penalty, EnforcementMethod::WeakPenalty] {
        let mut sequential = assembled_triangle_store(&mesh);
        let mut rhs_seq = DVector::zeros(mesh.num_nodes());
        bc::enforce_dirichlet(method, 1.0e30, &mesh, &dirichlet, &mut sequential, &mut rhs_seq)
            .unwrap();

        let mut concurrent = assembled_triangle_store(&mesh);
        let mut rhs_par = DVector::zeros(mesh.num_nodes());
        let SparseStore::Csr(csr) = &mut concurrent else {
            unreachable!()
        };
        bc::enforce_dirichlet_par(method, 1.0e30, &mesh, &dirichlet, csr, &mut rhs_par).unwrap();

        assert_eq!(sequential.to_dense(), concurrent.to_dense());
        assert_eq!(rhs_seq, rhs_par);
    }
}

#[test]
fn row_elimination_zeroes_the_row_and_keeps_others() {
    let mesh = two_triangle_strip();
    let mut store = assembled_triangle_store(&mesh);
    let before = store.to_dense();
    let mut rhs = DVector::zeros(mesh.num_nodes());

    let mut dirichlet = DirichletValues::new(mesh.num_nodes());
    dirichlet.set(0, 3.0);

    bc::enforce_dirichlet(
        EnforcementMethod::RowElimination,
        1.0e30,
        &mesh,
        &dirichlet,
        &mut store,
        &mut rhs,
    )
    .unwrap();

    let after = store.to_dense();
    for col in 0..mesh.num_nodes() {
        let expected = if col == 0 { 1.0 } else { 0.0 };
        assert_eq!(after[(0, col)], expected);
    }
    assert_eq!(rhs[0], 3.0);
    // Other rows, including their entries in column 0, are untouched
    for row in 1..mesh.num_nodes() {
        for col in 0..mesh.num_nodes() {
            assert_eq!(after[(row, col)], before[(row, col)]);
        }
    }
}

#[test]
fn row_column_elimination_is_symmetric_and_corrects_the_rhs() {
    let mesh = two_triangle_strip();
    let mut store = assembled_triangle_store(&mesh);
    let before = store.to_dense();
    let mut rhs = DVector::zeros(mesh.num_nodes());

    let prescribed = 3.5;
    let mut dirichlet = DirichletValues::new(mesh.num_nodes());
    dirichlet.set(0, prescribed);

    bc::enforce_dirichlet(
        EnforcementMethod::RowColumnElimination,
        1.0e30,
        &mesh,
        &dirichlet,
        &mut store,
        &mut rhs,
    )
    .unwrap();

    let after = store.to_dense();
    for other in 1..mesh.num_nodes() {
        assert_eq!(after[(0, other)], 0.0);
        assert_eq!(after[(other, 0)], 0.0);
        // The eliminated column contribution moved to the RHS
        assert_eq!(rhs[other], -before[(other, 0)] * prescribed);
    }
    assert_eq!(after[(0, 0)], 1.0);
    assert_eq!(rhs[0], prescribed);
}

#[test]
fn elimination_policies_are_rejected_for_coo_layouts() {
    let mesh = two_triangle_strip();
    let mut store = SparseStore::Coo(build_coo_pattern(&mesh, true).unwrap());
    let mut rhs = DVector::zeros(mesh.num_nodes());
    let mut dirichlet = DirichletValues::new(mesh.num_nodes());
    dirichlet.set(0, 1.0);

    for method in [
        EnforcementMethod::RowElimination,
        EnforcementMethod::RowColumnElimination,
    ] {
        let err = bc::enforce_dirichlet(
            method,
            1.0e30,
            &mesh,
            &dirichlet,
            &mut store,
            &mut rhs,
        )
        .unwrap_err();
        assert!(matches!(err, AssemblyError::UnsupportedPolicy { .. }));
    }
}

#[test]
fn unknown_enforcement_method_lists_the_supported_ones() {
    let err = "PenaltyMethod".parse::<EnforcementMethod>().unwrap_err();
    let message = err.to_string();
    assert!(message.contains("PenaltyMethod"));
    assert!(message.contains("WeakPenalty"));
    assert!(message.contains("RowColumnElimination"));
}

#[test]
fn missing_diagonal_is_a_hard_error_not_a_corrupting_write() {
    // Two nodes, one reserved slot per row, diagonal never claimed
    let mesh = two_triangle_strip();
    let mut csr = CsrMatrix::from_row_counts(&[1; 4], 4);
    csr.add_value(0, 1, 1.0).unwrap();
    csr.add_value(1, 0, 1.0).unwrap();
    csr.add_value(2, 3, 1.0).unwrap();
    csr.add_value(3, 2, 1.0).unwrap();

    let mut dirichlet = DirichletValues::new(4);
    dirichlet.set(0, 1.0);
    let mut rhs = DVector::zeros(4);

    let err = bc::enforce_dirichlet_par(
        EnforcementMethod::Penalty,
        1.0e30,
        &mesh,
        &dirichlet,
        &mut csr,
        &mut rhs,
    )
    .unwrap_err();
    assert_eq!(err, AssemblyError::MissingDiagonal { row: 0 });

    let mut store = SparseStore::Csr(csr);
    let err = bc::enforce_dirichlet(
        EnforcementMethod::Penalty,
        1.0e30,
        &mesh,
        &dirichlet,
        &mut store,
        &mut rhs,
    )
    .unwrap_err();
    assert_eq!(err, AssemblyError::MissingDiagonal { row: 0 });
}

#[test]
fn source_term_scales_with_touching_cell_areas() {
    let mesh = two_triangle_strip();
    let dirichlet = DirichletValues::new(mesh.num_nodes());
    let source = 3.0;

    let mut rhs = DVector::zeros(mesh.num_nodes());
    bc::assemble_source_term(&mesh, source, &dirichlet, &mut rhs);

    // Each triangle has area 1/2; corner nodes touch one cell, the shared
    // edge nodes touch two
    let per_cell = source * 0.5 / 3.0;
    assert!((rhs[0] - per_cell).abs() < 1e-14);
    assert!((rhs[3] - per_cell).abs() < 1e-14);
    assert!((rhs[1] - 2.0 * per_cell).abs() < 1e-14);
    assert!((rhs[2] - 2.0 * per_cell).abs() < 1e-14);

    // The concurrent variant agrees to reduction-order tolerance
    let mut rhs_par = DVector::zeros(mesh.num_nodes());
    bc::assemble_source_term_par(&mesh, source, &dirichlet, &mut rhs_par);
    for node in 0..mesh.num_nodes() {
        assert!((rhs[node] - rhs_par[node]).abs() < 1e-12);
    }
}

#[test]
fn source_term_skips_dirichlet_and_ghost_nodes() {
    let mut mesh = two_triangle_strip();
    mesh.set_unowned_nodes(&[3]);
    let mut dirichlet = DirichletValues::new(mesh.num_nodes());
    dirichlet.set(0, 1.0);

    let mut rhs = DVector::zeros(mesh.num_nodes());
    bc::assemble_source_term(&mesh, 1.0, &dirichlet, &mut rhs);
    assert_eq!(rhs[0], 0.0);
    assert_eq!(rhs[3], 0.0);
    assert!(rhs[1] > 0.0);
}

#[test]
fn scalar_neumann_flux_contributes_half_the_edge_length() {
    let mesh = two_triangle_strip();
    let dirichlet = DirichletValues::new(mesh.num_nodes());
    // The bottom edge (0, 1) has length 1
    let bottom = mesh.boundary_faces_where(|c| c.y < 1e-12);
    assert_eq!(bottom.len(), 1);

    let flux = 4.0;
    let condition = NeumannCondition {
        faces: bottom,
        flux: FluxSpec::Scalar(flux),
    };

    let mut rhs = DVector::zeros(mesh.num_nodes());
    bc::assemble_neumann_terms(&mesh, &[condition.clone()], &dirichlet, &mut rhs).unwrap();
    assert!((rhs[0] - flux * 0.5).abs() < 1e-14);
    assert!((rhs[1] - flux * 0.5).abs() < 1e-14);
    assert_eq!(rhs[2], 0.0);

    let mut rhs_par = DVector::zeros(mesh.num_nodes());
    bc::assemble_neumann_terms_par(&mesh, &[condition], &dirichlet, &mut rhs_par).unwrap();
    assert_eq!(rhs, rhs_par);
}

#[test]
fn component_neumann_flux_projects_onto_the_outward_normal() {
    let mesh = two_triangle_strip();
    let dirichlet = DirichletValues::new(mesh.num_nodes());
    // The right edge (1, 3) has outward normal (1, 0)
    let right = mesh.boundary_faces_where(|c| c.x > 1.0 - 1e-12);
    assert_eq!(right.len(), 1);
    assert_eq!(right[0].key(), (1, 3));

    let condition = NeumannCondition {
        faces: right,
        flux: FluxSpec::Components {
            x: Some(2.0),
            y: Some(7.0),
        },
    };

    let mut rhs = DVector::zeros(mesh.num_nodes());
    bc::assemble_neumann_terms(&mesh, &[condition], &dirichlet, &mut rhs).unwrap();
    // Only the x component survives the projection; edge length is 1
    assert!((rhs[1] - 2.0 * 0.5).abs() < 1e-12);
    assert!((rhs[3] - 2.0 * 0.5).abs() < 1e-12);
    assert_eq!(rhs[0], 0.0);
}

#[test]
fn dirichlet_reapplication_is_idempotent() {
    let mut dirichlet = DirichletValues::new(4);
    dirichlet.set(2, 9.0);

    let mut u = DVector::from_vec(vec![1.0, 2.0, 3.0, 4.0]);
    dirichlet.reapply_to_solution(&mut u);
    assert_eq!(u[2], 9.0);
    assert_eq!(u[0], 1.0);

    let once = u.clone();
    dirichlet.reapply_to_solution(&mut u);
    assert_eq!(u, once);
}
