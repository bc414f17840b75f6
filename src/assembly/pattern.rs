//! Sparsity discovery from mesh adjacency.
//!
//! Every builder reserves `|adjacent nodes| + 1` slots per row, the extra
//! slot holding the node's own diagonal entry. The reserved count is derived
//! purely from the mesh topology; it does not depend on boundary conditions
//! or element-matrix content.

use crate::error::AssemblyError;
use crate::mesh::{Connectivity, Mesh};
use rayon::prelude::*;
use skoll_sparse::{scan, CooMatrix, CsrMatrix};

fn check_dimension(dimension: usize) -> Result<(), AssemblyError> {
    if dimension == 2 || dimension == 3 {
        Ok(())
    } else {
        Err(AssemblyError::UnsupportedTopology { dimension })
    }
}

/// Builds a CSR structure by walking nodes in increasing id order, claiming
/// the self entry first and then each neighbor.
///
/// This relies on the node ids already being ordered and is the faster
/// choice on the host for typical meshes; the parallel builder below exists
/// for workloads where counting and filling dominate.
pub fn build_csr_pattern_sequential<C: Connectivity>(
    mesh: &Mesh<C>,
) -> Result<CsrMatrix, AssemblyError> {
    check_dimension(mesh.dimension())?;

    let adjacency = mesh.node_node_adjacency();
    let num_nodes = mesh.num_nodes();
    let counts: Vec<usize> = (0..num_nodes)
        .map(|node| adjacency.count(node) + 1)
        .collect();

    let mut csr = CsrMatrix::from_row_counts(&counts, num_nodes);
    for node in 0..num_nodes {
        csr.claim_column(node, node)?;
        for &neighbor in adjacency.neighbors(node) {
            csr.claim_column(node, neighbor)?;
        }
    }
    Ok(csr)
}

/// Builds a CSR structure with a parallel count kernel, an exclusive prefix
/// sum and a parallel fill kernel.
///
/// The scan has completed before the fill kernel starts; the two never run
/// concurrently. Each row is filled by exactly one task, neighbors first and
/// the diagonal appended last, so row slices come out unsorted.
pub fn build_csr_pattern_parallel<C: Connectivity>(
    mesh: &Mesh<C>,
) -> Result<CsrMatrix, AssemblyError> {
    check_dimension(mesh.dimension())?;

    let adjacency = mesh.node_node_adjacency();
    let num_nodes = mesh.num_nodes();

    let counts: Vec<usize> = (0..num_nodes)
        .into_par_iter()
        .map(|node| adjacency.count(node) + 1)
        .collect();

    let mut row_offsets = vec![0; num_nodes + 1];
    let total = scan::par_exclusive_sum(&counts, &mut row_offsets[..num_nodes]);
    row_offsets[num_nodes] = total;

    let mut csr = CsrMatrix::from_offsets(num_nodes, row_offsets);
    csr.split_rows_mut()
        .into_par_iter()
        .try_for_each(|mut row| -> Result<(), AssemblyError> {
            let node = row.row();
            for &neighbor in adjacency.neighbors(node) {
                row.add_value(neighbor, 0.0)?;
            }
            row.add_value(node, 0.0)?;
            Ok(())
        })?;
    Ok(csr)
}

/// Builds a COO structure by walking nodes in increasing id order, the self
/// entry first. With `sort`, the triplets are ordered by `(row, col)`
/// afterwards, enabling binary-search lookup during assembly.
pub fn build_coo_pattern<C: Connectivity>(
    mesh: &Mesh<C>,
    sort: bool,
) -> Result<CooMatrix, AssemblyError> {
    check_dimension(mesh.dimension())?;

    let adjacency = mesh.node_node_adjacency();
    let num_nodes = mesh.num_nodes();
    let nnz: usize = (0..num_nodes)
        .map(|node| adjacency.count(node) + 1)
        .sum();

    let mut coo = CooMatrix::with_capacity(num_nodes, num_nodes, nnz);
    for node in 0..num_nodes {
        coo.push_coordinate(node, node)?;
        for &neighbor in adjacency.neighbors(node) {
            coo.push_coordinate(node, neighbor)?;
        }
    }
    if sort {
        coo.sort();
    }
    Ok(coo)
}
