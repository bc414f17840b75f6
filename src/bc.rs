//! Boundary condition enforcement and right-hand side assembly.
//!
//! Dirichlet conditions are stored as a flag plus a prescribed value per
//! node, set before assembly and re-applied to the solution after the solve.
//! Enforcement mutates the assembled matrix and the RHS according to one
//! policy chosen per run; unknown policy names are rejected when parsing the
//! configuration, and a policy a storage layout does not implement is a hard
//! error rather than a silent no-op.

use crate::element::{cell_measure, edge_outward_normal, face_measure};
use crate::error::AssemblyError;
use crate::mesh::{Connectivity, FaceConnectivity, Mesh};
use itertools::izip;
use log::info;
use nalgebra::DVector;
use rayon::prelude::*;
use skoll_sparse::{AtomicF64View, CsrMatrix, SparseStore, UNCLAIMED};
use std::error::Error;
use std::fmt;
use std::str::FromStr;

/// How Dirichlet conditions are imposed on the assembled system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnforcementMethod {
    /// Overwrite the diagonal with a large constant `P` and set
    /// `rhs[i] = P * prescribed[i]`. Destroys the assembled diagonal.
    Penalty,
    /// Add `P` to the diagonal instead of overwriting, preserving the
    /// assembled contribution alongside the penalty.
    WeakPenalty,
    /// Zero the constrained row, put 1 on the diagonal and the prescribed
    /// value on the RHS.
    RowElimination,
    /// Like `RowElimination`, and additionally zero the symmetric column
    /// entries, moving their contribution to the RHS.
    RowColumnElimination,
}

impl EnforcementMethod {
    pub fn name(&self) -> &'static str {
        match self {
            EnforcementMethod::Penalty => "Penalty",
            EnforcementMethod::WeakPenalty => "WeakPenalty",
            EnforcementMethod::RowElimination => "RowElimination",
            EnforcementMethod::RowColumnElimination => "RowColumnElimination",
        }
    }
}

impl fmt::Display for EnforcementMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The enforcement method name was not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownEnforcementMethod(String);

impl fmt::Display for UnknownEnforcementMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "enforcement method \"{}\" is not supported; supported methods are: \
             Penalty, WeakPenalty, RowElimination, RowColumnElimination",
            self.0
        )
    }
}

impl Error for UnknownEnforcementMethod {}

impl FromStr for EnforcementMethod {
    type Err = UnknownEnforcementMethod;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Penalty" => Ok(EnforcementMethod::Penalty),
            "WeakPenalty" => Ok(EnforcementMethod::WeakPenalty),
            "RowElimination" => Ok(EnforcementMethod::RowElimination),
            "RowColumnElimination" => Ok(EnforcementMethod::RowColumnElimination),
            other => Err(UnknownEnforcementMethod(other.to_string())),
        }
    }
}

/// Per-node Dirichlet state: a constrained flag plus the prescribed value.
///
/// Lives for one stationary solve. The matrix mutation happens once
/// pre-solve; [`reapply_to_solution`](DirichletValues::reapply_to_solution)
/// restores the prescribed values afterwards, since the solver may have
/// perturbed the constrained entries.
#[derive(Debug, Clone)]
pub struct DirichletValues {
    flagged: Vec<bool>,
    values: Vec<f64>,
}

impl DirichletValues {
    pub fn new(num_nodes: usize) -> Self {
        Self {
            flagged: vec![false; num_nodes],
            values: vec![0.0; num_nodes],
        }
    }

    pub fn set(&mut self, node: usize, value: f64) {
        self.flagged[node] = true;
        self.values[node] = value;
    }

    /// Flags every node of the given boundary faces with the same value.
    pub fn apply_to_faces<F: FaceConnectivity>(&mut self, faces: &[F], value: f64) {
        info!(
            "Applying Dirichlet boundary condition to {} faces, value = {}",
            faces.len(),
            value
        );
        for face in faces {
            for &node in face.vertex_indices() {
                self.set(node, value);
            }
        }
    }

    /// Flags individual nodes (point conditions).
    pub fn apply_to_nodes(&mut self, nodes: &[usize], value: f64) {
        info!(
            "Applying Dirichlet point condition to {} nodes, value = {}",
            nodes.len(),
            value
        );
        for &node in nodes {
            self.set(node, value);
        }
    }

    pub fn is_flagged(&self, node: usize) -> bool {
        self.flagged[node]
    }

    pub fn value(&self, node: usize) -> f64 {
        self.values[node]
    }

    pub fn num_nodes(&self) -> usize {
        self.flagged.len()
    }

    /// Writes the prescribed values back into the solution vector.
    /// Idempotent; called once after every solve.
    pub fn reapply_to_solution(&self, u: &mut DVector<f64>) {
        for (node, (&flagged, &value)) in self.flagged.iter().zip(&self.values).enumerate() {
            if flagged {
                u[node] = value;
            }
        }
    }
}

/// A constant flux over a set of boundary faces.
#[derive(Debug, Clone)]
pub struct NeumannCondition<F> {
    pub faces: Vec<F>,
    pub flux: FluxSpec,
}

/// Either a scalar flux, or flux components dotted with the outward normal.
#[derive(Debug, Clone, Copy)]
pub enum FluxSpec {
    Scalar(f64),
    Components { x: Option<f64>, y: Option<f64> },
}

/// Imposes the Dirichlet conditions on the assembled system.
pub fn enforce_dirichlet<C: Connectivity>(
    method: EnforcementMethod,
    penalty: f64,
    mesh: &Mesh<C>,
    dirichlet: &DirichletValues,
    store: &mut SparseStore,
    rhs: &mut DVector<f64>,
) -> Result<(), AssemblyError> {
    info!("Applying Dirichlet boundary condition via {} method", method);
    match method {
        EnforcementMethod::Penalty | EnforcementMethod::WeakPenalty => {
            penalty_bias(method, penalty, mesh, dirichlet, store, rhs)
        }
        EnforcementMethod::RowElimination => match store {
            SparseStore::Csr(csr) => eliminate_rows(csr, mesh, dirichlet, rhs),
            other => Err(AssemblyError::UnsupportedPolicy {
                method,
                layout: other.layout(),
            }),
        },
        EnforcementMethod::RowColumnElimination => match store {
            SparseStore::Csr(csr) => eliminate_rows_and_columns(csr, mesh, dirichlet, rhs),
            other => Err(AssemblyError::UnsupportedPolicy {
                method,
                layout: other.layout(),
            }),
        },
    }
}

fn penalty_bias<C: Connectivity>(
    method: EnforcementMethod,
    penalty: f64,
    mesh: &Mesh<C>,
    dirichlet: &DirichletValues,
    store: &mut SparseStore,
    rhs: &mut DVector<f64>,
) -> Result<(), AssemblyError> {
    for node in 0..dirichlet.num_nodes() {
        if !(dirichlet.is_flagged(node) && mesh.is_owned(node)) {
            continue;
        }
        let result = match method {
            EnforcementMethod::Penalty => store.set_value(node, node, penalty),
            EnforcementMethod::WeakPenalty => store.add_value(node, node, penalty),
            _ => unreachable!("penalty_bias only handles the penalty methods"),
        };
        result.map_err(|_| AssemblyError::MissingDiagonal { row: node })?;
        rhs[node] = penalty * dirichlet.value(node);
    }
    Ok(())
}

/// Concurrent penalty enforcement against a CSR store, one task per row.
///
/// The diagonal lookup must not fail: using a miss sentinel as a slot index
/// would silently corrupt an unrelated entry, so a miss is promoted to
/// [`AssemblyError::MissingDiagonal`] before any write happens.
pub fn enforce_dirichlet_par<C: Connectivity>(
    method: EnforcementMethod,
    penalty: f64,
    mesh: &Mesh<C>,
    dirichlet: &DirichletValues,
    csr: &mut CsrMatrix,
    rhs: &mut DVector<f64>,
) -> Result<(), AssemblyError> {
    match method {
        EnforcementMethod::Penalty | EnforcementMethod::WeakPenalty => {}
        other => {
            return Err(AssemblyError::UnsupportedPolicy {
                method: other,
                layout: skoll_sparse::StorageLayout::Csr,
            })
        }
    }
    info!(
        "Applying Dirichlet boundary condition via {} method (concurrent)",
        method
    );

    let (rows, values) = csr.atomic_split();
    rhs.as_mut_slice()
        .par_iter_mut()
        .enumerate()
        .try_for_each(|(node, rhs_entry)| {
            if !(dirichlet.is_flagged(node) && mesh.is_owned(node)) {
                return Ok(());
            }
            let slot = rows
                .index_of(node, node)
                .ok_or(AssemblyError::MissingDiagonal { row: node })?;
            match method {
                EnforcementMethod::Penalty => values.store(slot, penalty),
                EnforcementMethod::WeakPenalty => values.add(slot, penalty),
                _ => unreachable!(),
            }
            *rhs_entry = penalty * dirichlet.value(node);
            Ok(())
        })
}

fn eliminate_rows<C: Connectivity>(
    csr: &mut CsrMatrix,
    mesh: &Mesh<C>,
    dirichlet: &DirichletValues,
    rhs: &mut DVector<f64>,
) -> Result<(), AssemblyError> {
    for node in 0..csr.nrows() {
        if !(dirichlet.is_flagged(node) && mesh.is_owned(node)) {
            continue;
        }
        let mut row = csr.row_mut(node);
        let (columns, values) = row.columns_and_values_mut();
        let mut found_diagonal = false;
        for (&col, value) in izip!(columns, values) {
            if col == node {
                *value = 1.0;
                found_diagonal = true;
            } else if col != UNCLAIMED {
                *value = 0.0;
            }
        }
        if !found_diagonal {
            return Err(AssemblyError::MissingDiagonal { row: node });
        }
        rhs[node] = dirichlet.value(node);
    }
    Ok(())
}

fn eliminate_rows_and_columns<C: Connectivity>(
    csr: &mut CsrMatrix,
    mesh: &Mesh<C>,
    dirichlet: &DirichletValues,
    rhs: &mut DVector<f64>,
) -> Result<(), AssemblyError> {
    // Constrained rows first: unit diagonal, prescribed RHS.
    eliminate_rows(csr, mesh, dirichlet, rhs)?;

    // Then sweep all remaining rows and move every entry in a constrained
    // column over to the RHS before zeroing it. The sweep covers the whole
    // matrix rather than mirroring the constrained rows, because constrained
    // ghost nodes have no local row to mirror from.
    for row_index in 0..csr.nrows() {
        if dirichlet.is_flagged(row_index) && mesh.is_owned(row_index) {
            continue;
        }
        let mut row = csr.row_mut(row_index);
        let (columns, values) = row.columns_and_values_mut();
        let mut correction = 0.0;
        for (&col, value) in izip!(columns, values) {
            if col != UNCLAIMED && col != row_index && dirichlet.is_flagged(col) {
                correction += *value * dirichlet.value(col);
                *value = 0.0;
            }
        }
        rhs[row_index] -= correction;
    }
    Ok(())
}

/// Accumulates the constant source term `f * measure(cell) / nodes_per_cell`
/// into every non-Dirichlet, locally owned node touched by a cell.
pub fn assemble_source_term<C: Connectivity>(
    mesh: &Mesh<C>,
    source: f64,
    dirichlet: &DirichletValues,
    rhs: &mut DVector<f64>,
) {
    let nodes_per_cell = C::KIND.nodes_per_cell() as f64;
    for cell in mesh.connectivity() {
        let measure = cell_measure(mesh, cell);
        for &node in cell.vertex_indices() {
            if !dirichlet.is_flagged(node) && mesh.is_owned(node) {
                rhs[node] += source * measure / nodes_per_cell;
            }
        }
    }
}

/// Concurrent variant of [`assemble_source_term`]: cells are visited in
/// parallel and contributions to shared nodes go through atomic adds.
pub fn assemble_source_term_par<C: Connectivity>(
    mesh: &Mesh<C>,
    source: f64,
    dirichlet: &DirichletValues,
    rhs: &mut DVector<f64>,
) {
    let nodes_per_cell = C::KIND.nodes_per_cell() as f64;
    let view = AtomicF64View::new(rhs.as_mut_slice());
    mesh.connectivity().par_iter().for_each(|cell| {
        let measure = cell_measure(mesh, cell);
        for &node in cell.vertex_indices() {
            if !dirichlet.is_flagged(node) && mesh.is_owned(node) {
                view.add(node, source * measure / nodes_per_cell);
            }
        }
    });
}

fn face_contribution(
    vertices: &[nalgebra::Point3<f64>],
    face_nodes: &[usize],
    flux: FluxSpec,
) -> Result<f64, AssemblyError> {
    let per_node = face_measure(vertices, face_nodes) / face_nodes.len() as f64;
    match flux {
        FluxSpec::Scalar(value) => Ok(value * per_node),
        FluxSpec::Components { x, y } => {
            // Component fluxes are dotted with the outward edge normal,
            // which is only defined for 2D boundary edges.
            let [a, b] = match face_nodes {
                [a, b] => [*a, *b],
                _ => return Err(AssemblyError::UnsupportedTopology { dimension: 3 }),
            };
            let normal = edge_outward_normal(&vertices[a], &vertices[b]);
            Ok((normal.x * x.unwrap_or(0.0) + normal.y * y.unwrap_or(0.0)) * per_node)
        }
    }
}

/// Accumulates Neumann flux terms over the given boundary faces, with the
/// same non-Dirichlet and ownership gating as the source term.
pub fn assemble_neumann_terms<C: Connectivity>(
    mesh: &Mesh<C>,
    conditions: &[NeumannCondition<C::Face>],
    dirichlet: &DirichletValues,
    rhs: &mut DVector<f64>,
) -> Result<(), AssemblyError> {
    for condition in conditions {
        for face in &condition.faces {
            let face_nodes = face.vertex_indices();
            let contribution = face_contribution(mesh.vertices(), face_nodes, condition.flux)?;
            for &node in face_nodes {
                if !dirichlet.is_flagged(node) && mesh.is_owned(node) {
                    rhs[node] += contribution;
                }
            }
        }
    }
    Ok(())
}

/// Concurrent variant of [`assemble_neumann_terms`].
pub fn assemble_neumann_terms_par<C: Connectivity>(
    mesh: &Mesh<C>,
    conditions: &[NeumannCondition<C::Face>],
    dirichlet: &DirichletValues,
    rhs: &mut DVector<f64>,
) -> Result<(), AssemblyError> {
    let view = AtomicF64View::new(rhs.as_mut_slice());
    for condition in conditions {
        condition.faces.par_iter().try_for_each(|face| {
            let face_nodes = face.vertex_indices();
            let contribution = face_contribution(mesh.vertices(), face_nodes, condition.flux)?;
            for &node in face_nodes {
                if !dirichlet.is_flagged(node) && mesh.is_owned(node) {
                    view.add(node, contribution);
                }
            }
            Ok::<(), AssemblyError>(())
        })?;
    }
    Ok(())
}
