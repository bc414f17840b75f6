//! The error taxonomy of the assembly engine.

use crate::bc::EnforcementMethod;
use skoll_sparse::{CapacityError, StorageLayout};
use std::error::Error;
use std::fmt;

/// Structural failures during sparsity discovery, assembly or boundary
/// condition enforcement.
///
/// All of these indicate a mismatch between mesh, configuration and solver
/// setup. None of them are transient: callers should abort with a diagnostic
/// rather than retry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AssemblyError {
    /// A builder or assembler was invoked on a mesh dimensionality it has no
    /// adjacency relation for.
    UnsupportedTopology { dimension: usize },
    /// An element kernel was applied to a cell with the wrong number of
    /// nodes, e.g. a triangle kernel over a tetrahedral mesh.
    UnsupportedCellType { expected: usize, found: usize },
    /// A row's reserved non-zero slots were exhausted; the sparsity pattern
    /// under-estimated the mesh adjacency.
    CapacityExhausted { row: usize },
    /// A scatter target was absent from the discovered sparsity pattern.
    MissingEntry { row: usize, col: usize },
    /// A Dirichlet-constrained row has no diagonal entry to bias.
    MissingDiagonal { row: usize },
    /// The selected enforcement policy is not implemented for the selected
    /// storage layout.
    UnsupportedPolicy {
        method: EnforcementMethod,
        layout: StorageLayout,
    },
    /// The requested operation is not available for the storage layout.
    UnsupportedLayout {
        operation: &'static str,
        layout: StorageLayout,
    },
}

impl fmt::Display for AssemblyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssemblyError::UnsupportedTopology { dimension } => {
                write!(f, "no adjacency relation defined for {dimension}-dimensional meshes")
            }
            AssemblyError::UnsupportedCellType { expected, found } => write!(
                f,
                "element kernel expects cells with {expected} nodes, mesh cell has {found}"
            ),
            AssemblyError::CapacityExhausted { row } => write!(
                f,
                "reserved non-zero slots of row {row} are exhausted; \
                 sparsity discovery under-estimated the mesh adjacency"
            ),
            AssemblyError::MissingEntry { row, col } => write!(
                f,
                "coordinate ({row}, {col}) is not part of the discovered sparsity pattern"
            ),
            AssemblyError::MissingDiagonal { row } => {
                write!(f, "row {row} has no diagonal entry to enforce a Dirichlet condition on")
            }
            AssemblyError::UnsupportedPolicy { method, layout } => write!(
                f,
                "enforcement method {method} is not implemented for the {layout} storage layout"
            ),
            AssemblyError::UnsupportedLayout { operation, layout } => {
                write!(f, "{operation} is not available for the {layout} storage layout")
            }
        }
    }
}

impl Error for AssemblyError {}

impl From<CapacityError> for AssemblyError {
    fn from(err: CapacityError) -> Self {
        AssemblyError::CapacityExhausted { row: err.row() }
    }
}
