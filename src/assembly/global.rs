//! The global assemblers: scatter-add of element matrices into a shared
//! sparse store under three execution models.
//!
//! All three produce the same matrix up to floating-point reduction order.
//! Ownership is enforced identically everywhere: a contribution is written
//! only when the *row* node is locally owned, which keeps distributed runs
//! free of cross-subdomain write races and double counting.

use crate::element::{cell_corners, ElementKernel};
use crate::error::AssemblyError;
use crate::mesh::{Connectivity, Mesh};
use rayon::prelude::*;
use skoll_sparse::{AtomicF64View, CsrMatrix, SparseStore, StorageLayout};
use std::error::Error;
use std::fmt;
use std::str::FromStr;

/// Which execution model drives the scatter-add.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionModel {
    /// One host thread, cells in order ([`SerialAssembler`]).
    #[default]
    Serial,
    /// Host threads partitioned by row ([`RowParAssembler`]).
    RowParallel,
    /// Kernel-style concurrency over cells with atomic adds
    /// ([`AtomicParAssembler`]).
    CellParallel,
}

impl ExecutionModel {
    pub fn name(&self) -> &'static str {
        match self {
            ExecutionModel::Serial => "serial",
            ExecutionModel::RowParallel => "row-parallel",
            ExecutionModel::CellParallel => "cell-parallel",
        }
    }

    pub fn is_parallel(&self) -> bool {
        !matches!(self, ExecutionModel::Serial)
    }
}

impl fmt::Display for ExecutionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The execution model name was not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownExecutionModel(String);

impl fmt::Display for UnknownExecutionModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown execution model \"{}\"; supported models are: serial, row-parallel, cell-parallel",
            self.0
        )
    }
}

impl Error for UnknownExecutionModel {}

impl FromStr for ExecutionModel {
    type Err = UnknownExecutionModel;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "serial" => Ok(ExecutionModel::Serial),
            "row-parallel" => Ok(ExecutionModel::RowParallel),
            "cell-parallel" => Ok(ExecutionModel::CellParallel),
            other => Err(UnknownExecutionModel(other.to_string())),
        }
    }
}

/// Sequential cell-loop assembly with plain accumulation.
///
/// Iterating cells in order with non-atomic `+=` makes repeated runs on an
/// unmodified mesh bit-identical, which the other assemblers cannot promise.
#[derive(Debug, Clone, Default)]
pub struct SerialAssembler;

impl SerialAssembler {
    pub fn assemble<C, K, const N: usize>(
        &self,
        mesh: &Mesh<C>,
        kernel: &K,
        store: &mut SparseStore,
    ) -> eyre::Result<()>
    where
        C: Connectivity,
        K: ElementKernel<N>,
    {
        for cell in mesh.connectivity() {
            let corners = cell_corners::<C, N>(mesh, cell)?;
            let k_e = kernel.element_matrix(&corners)?;
            let indices = cell.vertex_indices();
            for (a, &node_a) in indices.iter().enumerate() {
                if !mesh.is_owned(node_a) {
                    continue;
                }
                for (b, &node_b) in indices.iter().enumerate() {
                    store
                        .add_value(node_a, node_b, k_e[(a, b)])
                        .map_err(AssemblyError::from)?;
                }
            }
        }
        Ok(())
    }
}

/// Row-partitioned parallel assembly over a CSR store.
///
/// Each row is written by exactly one task, which walks the cells touching
/// its node and recomputes their element matrices. No atomics are needed;
/// race freedom holds by construction. The CSR structure does not have to be
/// claimed beforehand: rows claim their column slots as contributions
/// arrive, so this path also serves the build-less variant.
#[derive(Debug, Clone, Default)]
pub struct RowParAssembler;

impl RowParAssembler {
    pub fn assemble<C, K, const N: usize>(
        &self,
        mesh: &Mesh<C>,
        kernel: &K,
        csr: &mut CsrMatrix,
    ) -> eyre::Result<()>
    where
        C: Connectivity,
        K: ElementKernel<N>,
    {
        let node_cells = mesh.node_cell_adjacency();
        let connectivity = mesh.connectivity();

        csr.split_rows_mut()
            .into_par_iter()
            .try_for_each(|mut row| -> eyre::Result<()> {
                let node = row.row();
                if !mesh.is_owned(node) {
                    return Ok(());
                }
                for &cell_index in node_cells.neighbors(node) {
                    let cell = &connectivity[cell_index];
                    let corners = cell_corners::<C, N>(mesh, cell)?;
                    let k_e = kernel.element_matrix(&corners)?;
                    let indices = cell.vertex_indices();
                    let local = indices
                        .iter()
                        .position(|&n| n == node)
                        .expect("node-cell adjacency guarantees the node is in the cell");
                    for (b, &node_b) in indices.iter().enumerate() {
                        row.add_value(node_b, k_e[(local, b)])
                            .map_err(AssemblyError::from)?;
                    }
                }
                Ok(())
            })
    }
}

/// Cell-parallel assembly with atomic scatter-adds.
///
/// This is the kernel-style execution model: every cell-node contribution is
/// a genuinely concurrent write, so all of them go through the atomic f64
/// add. Requires a fully claimed structure; a scatter target absent from the
/// pattern is a hard error, never an out-of-bounds write.
#[derive(Debug, Clone, Default)]
pub struct AtomicParAssembler;

impl AtomicParAssembler {
    pub fn assemble<C, K, const N: usize>(
        &self,
        mesh: &Mesh<C>,
        kernel: &K,
        store: &mut SparseStore,
    ) -> eyre::Result<()>
    where
        C: Connectivity,
        K: ElementKernel<N>,
    {
        match store {
            SparseStore::Csr(csr) => {
                let (rows, values) = csr.atomic_split();
                scatter_cells::<C, K, N>(mesh, kernel, &|r, c| rows.index_of(r, c), &values)
            }
            SparseStore::Coo(coo) => {
                let (entries, values) = coo.atomic_split();
                scatter_cells::<C, K, N>(mesh, kernel, &|r, c| entries.index_of(r, c), &values)
            }
            SparseStore::Dok(_) => Err(AssemblyError::UnsupportedLayout {
                operation: "concurrent scatter-add assembly",
                layout: StorageLayout::Legacy,
            }
            .into()),
        }
    }
}

fn scatter_cells<C, K, const N: usize>(
    mesh: &Mesh<C>,
    kernel: &K,
    locate: &(dyn Fn(usize, usize) -> Option<usize> + Sync),
    values: &AtomicF64View<'_>,
) -> eyre::Result<()>
where
    C: Connectivity,
    K: ElementKernel<N>,
{
    mesh.connectivity()
        .par_iter()
        .try_for_each(|cell| -> eyre::Result<()> {
            let corners = cell_corners::<C, N>(mesh, cell)?;
            let k_e = kernel.element_matrix(&corners)?;
            let indices = cell.vertex_indices();
            for (a, &node_a) in indices.iter().enumerate() {
                if !mesh.is_owned(node_a) {
                    continue;
                }
                for (b, &node_b) in indices.iter().enumerate() {
                    let slot = locate(node_a, node_b).ok_or(AssemblyError::MissingEntry {
                        row: node_a,
                        col: node_b,
                    })?;
                    values.add(slot, k_e[(a, b)]);
                }
            }
            Ok(())
        })
}
