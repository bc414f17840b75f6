//! The stationary solve driver.
//!
//! Orchestrates the full data flow: sparsity discovery for the configured
//! layout, bilinear-operator assembly under the configured execution model,
//! RHS assembly with boundary condition enforcement, translation to the
//! external solver format, and post-solve re-application of prescribed
//! values. The external solver itself is injected as a callable.

use crate::assembly::pattern::{
    build_coo_pattern, build_csr_pattern_parallel, build_csr_pattern_sequential,
};
use crate::assembly::{
    AtomicParAssembler, ExecutionModel, RowParAssembler, SerialAssembler,
};
use crate::bc::{self, DirichletValues, EnforcementMethod, NeumannCondition};
use crate::config::Options;
use crate::element::{ElementKernel, LaplaceTet4, LaplaceTri3};
use crate::error::AssemblyError;
use crate::mesh::{Connectivity, Mesh, Tet4Connectivity, Tri3Connectivity};
use crate::system::{build_linear_system, LinearSystem};
use crate::timing::TimeStats;
use eyre::{eyre, WrapErr};
use log::{info, warn};
use nalgebra::DVector;
use skoll_sparse::{CsrMatrix, DokMatrix, SparseStore, StorageLayout};
use std::fs;
use std::path::Path;

/// Absolute tolerance for reference result files.
pub const RESULT_EPSILON: f64 = 1.0e-4;

/// A Poisson-type stationary problem on one mesh.
pub struct PoissonModel<C: Connectivity, K, const N: usize> {
    mesh: Mesh<C>,
    kernel: K,
    options: Options,
    dirichlet: DirichletValues,
    neumann: Vec<NeumannCondition<C::Face>>,
    u: DVector<f64>,
}

pub type TrianglePoisson = PoissonModel<Tri3Connectivity, LaplaceTri3, 3>;
pub type TetrahedronPoisson = PoissonModel<Tet4Connectivity, LaplaceTet4, 4>;

impl<C, K, const N: usize> PoissonModel<C, K, N>
where
    C: Connectivity,
    K: ElementKernel<N>,
{
    pub fn new(mesh: Mesh<C>, kernel: K, options: Options) -> eyre::Result<Self> {
        if options.mesh_type != C::KIND {
            return Err(AssemblyError::UnsupportedCellType {
                expected: options.mesh_type.nodes_per_cell(),
                found: C::KIND.nodes_per_cell(),
            })
            .wrap_err("configured mesh type does not match the mesh");
        }
        let num_nodes = mesh.num_nodes();
        Ok(Self {
            mesh,
            kernel,
            options,
            dirichlet: DirichletValues::new(num_nodes),
            neumann: Vec::new(),
            u: DVector::zeros(num_nodes),
        })
    }

    pub fn mesh(&self) -> &Mesh<C> {
        &self.mesh
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn dirichlet(&self) -> &DirichletValues {
        &self.dirichlet
    }

    /// The solution field on nodes; prescribed values before the solve,
    /// solver output afterwards.
    pub fn solution(&self) -> &DVector<f64> {
        &self.u
    }

    pub fn set_dirichlet_on_faces(&mut self, faces: &[C::Face], value: f64) {
        self.dirichlet.apply_to_faces(faces, value);
    }

    pub fn set_dirichlet_on_nodes(&mut self, nodes: &[usize], value: f64) {
        self.dirichlet.apply_to_nodes(nodes, value);
    }

    pub fn add_neumann(&mut self, condition: NeumannCondition<C::Face>) {
        self.neumann.push(condition);
    }

    /// Assembles the full system: matrix values and RHS, with boundary
    /// conditions enforced. With `cache_warming > 1` the bilinear assembly
    /// repeats that many times, clearing values in between, so the span
    /// totals reflect warm-cache behavior.
    pub fn assemble(&self, stats: &TimeStats) -> eyre::Result<(SparseStore, DVector<f64>)> {
        info!(
            "Assembling on {} nodes, {} cells ({} layout, {} execution)",
            self.mesh.num_nodes(),
            self.mesh.num_cells(),
            self.options.storage_layout,
            self.options.execution
        );

        let mut store = self.build_store(stats)?;

        let passes = self.options.cache_warming.max(1);
        for pass in 0..passes {
            if pass > 0 {
                store.clear_values();
            }
            let _span = stats.span("assemble-bilinear-operator");
            self.assemble_lhs(&mut store)?;
        }

        let mut rhs = DVector::zeros(self.mesh.num_nodes());
        {
            let _span = stats.span("assemble-linear-operator");
            self.assemble_rhs(&mut store, &mut rhs)?;
        }
        Ok((store, rhs))
    }

    fn build_store(&self, stats: &TimeStats) -> Result<SparseStore, AssemblyError> {
        let _span = stats.span("build-matrix");
        let store = match self.options.storage_layout {
            StorageLayout::Coo => SparseStore::Coo(build_coo_pattern(&self.mesh, false)?),
            StorageLayout::CooSorted => SparseStore::Coo(build_coo_pattern(&self.mesh, true)?),
            StorageLayout::Csr => {
                let csr = match self.options.execution {
                    // Row-partitioned assembly claims its own column slots,
                    // so reserving the row slices suffices (build-less fill).
                    ExecutionModel::RowParallel => {
                        let adjacency = self.mesh.node_node_adjacency();
                        let counts: Vec<usize> = (0..self.mesh.num_nodes())
                            .map(|node| adjacency.count(node) + 1)
                            .collect();
                        CsrMatrix::from_row_counts(&counts, self.mesh.num_nodes())
                    }
                    ExecutionModel::CellParallel => build_csr_pattern_parallel(&self.mesh)?,
                    ExecutionModel::Serial => build_csr_pattern_sequential(&self.mesh)?,
                };
                SparseStore::Csr(csr)
            }
            StorageLayout::Legacy => SparseStore::Dok(DokMatrix::new(
                self.mesh.num_nodes(),
                self.mesh.num_nodes(),
            )),
        };
        Ok(store)
    }

    fn assemble_lhs(&self, store: &mut SparseStore) -> eyre::Result<()> {
        match self.options.execution {
            ExecutionModel::Serial => SerialAssembler.assemble(&self.mesh, &self.kernel, store),
            ExecutionModel::RowParallel => match store {
                SparseStore::Csr(csr) => RowParAssembler.assemble(&self.mesh, &self.kernel, csr),
                other => Err(AssemblyError::UnsupportedLayout {
                    operation: "row-partitioned assembly",
                    layout: other.layout(),
                }
                .into()),
            },
            ExecutionModel::CellParallel => {
                AtomicParAssembler.assemble(&self.mesh, &self.kernel, store)
            }
        }
    }

    fn assemble_rhs(&self, store: &mut SparseStore, rhs: &mut DVector<f64>) -> eyre::Result<()> {
        let method = self.options.enforce_dirichlet_method;
        let parallel = self.options.execution.is_parallel();
        let penalty_family = matches!(
            method,
            EnforcementMethod::Penalty | EnforcementMethod::WeakPenalty
        );
        let enforced_concurrently = if parallel && penalty_family {
            match store {
                SparseStore::Csr(csr) => {
                    bc::enforce_dirichlet_par(
                        method,
                        self.options.penalty,
                        &self.mesh,
                        &self.dirichlet,
                        csr,
                        rhs,
                    )?;
                    true
                }
                _ => false,
            }
        } else {
            false
        };
        if !enforced_concurrently {
            bc::enforce_dirichlet(
                method,
                self.options.penalty,
                &self.mesh,
                &self.dirichlet,
                store,
                rhs,
            )?;
        }
        if parallel {
            bc::assemble_source_term_par(&self.mesh, self.options.f, &self.dirichlet, rhs);
            bc::assemble_neumann_terms_par(&self.mesh, &self.neumann, &self.dirichlet, rhs)?;
        } else {
            bc::assemble_source_term(&self.mesh, self.options.f, &self.dirichlet, rhs);
            bc::assemble_neumann_terms(&self.mesh, &self.neumann, &self.dirichlet, rhs)?;
        }
        Ok(())
    }

    /// Runs the full stationary pipeline with an injected external solver:
    /// assemble, translate, solve, write back.
    pub fn solve_with(
        &mut self,
        solver: impl FnOnce(&LinearSystem) -> DVector<f64>,
        stats: &TimeStats,
    ) -> eyre::Result<()> {
        let (store, rhs) = self.assemble(stats)?;
        let system = {
            let _span = stats.span("translate-linear-system");
            build_linear_system(&store, &rhs)
        };
        let solution = {
            let _span = stats.span("solve");
            solver(&system)
        };
        self.update_solution(&solution);
        if let Some(path) = self.options.result_file.clone() {
            self.check_result_file(Path::new(&path), RESULT_EPSILON)?;
        }
        Ok(())
    }

    /// Copies the solver output into the solution field for owned nodes and
    /// re-applies the prescribed Dirichlet values, which the solver may have
    /// perturbed. Re-application is idempotent.
    pub fn update_solution(&mut self, solution: &DVector<f64>) {
        for node in 0..self.mesh.num_nodes() {
            if self.mesh.is_owned(node) {
                self.u[node] = solution[node];
            }
        }
        self.dirichlet.reapply_to_solution(&mut self.u);
    }

    /// Compares the solution field against a plain-text reference of
    /// `node_id value` pairs.
    pub fn check_result_file(&self, path: &Path, epsilon: f64) -> eyre::Result<()> {
        info!("Checking results against {}", path.display());
        let contents = fs::read_to_string(path)
            .wrap_err_with(|| format!("could not read result file {}", path.display()))?;

        let mut checked = 0usize;
        let mut mismatches = 0usize;
        for (line_number, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            let parse_error =
                || eyre!("malformed result file line {}: \"{}\"", line_number + 1, line);
            let node: usize = parts
                .next()
                .ok_or_else(parse_error)?
                .parse()
                .map_err(|_| parse_error())?;
            let expected: f64 = parts
                .next()
                .ok_or_else(parse_error)?
                .parse()
                .map_err(|_| parse_error())?;

            let actual = self.u[node];
            if (actual - expected).abs() > epsilon {
                mismatches += 1;
                if mismatches == 1 {
                    warn!(
                        "node {}: computed {} differs from reference {}",
                        node, actual, expected
                    );
                }
            }
            checked += 1;
        }

        if mismatches > 0 {
            Err(eyre!(
                "{} of {} checked node values differ from the reference by more than {}",
                mismatches,
                checked,
                epsilon
            ))
        } else {
            info!("All {} checked node values match the reference", checked);
            Ok(())
        }
    }
}

impl PoissonModel<Tri3Connectivity, LaplaceTri3, 3> {
    /// Convenience constructor wiring in the triangle Laplace kernel.
    pub fn from_mesh(mesh: Mesh<Tri3Connectivity>, options: Options) -> eyre::Result<Self> {
        PoissonModel::new(mesh, LaplaceTri3, options)
    }
}

impl PoissonModel<Tet4Connectivity, LaplaceTet4, 4> {
    /// Convenience constructor wiring in the tetrahedral Laplace kernel.
    pub fn from_mesh(mesh: Mesh<Tet4Connectivity>, options: Options) -> eyre::Result<Self> {
        PoissonModel::new(mesh, LaplaceTet4, options)
    }
}
