//! The bridge to the external linear solver.
//!
//! This is the only place where the internally chosen storage layout is
//! translated into an opaque external representation; nothing else in the
//! crate depends on the solver side. The translation is one-way and
//! one-pass: every stored entry is pushed once, and coordinates that were
//! claimed more than once are summed by the target format.

use nalgebra::DVector;
use nalgebra_sparse::{CooMatrix, CsrMatrix};
use skoll_sparse::SparseStore;

/// The assembled system in the external solver's format.
#[derive(Debug, Clone)]
pub struct LinearSystem {
    matrix: CsrMatrix<f64>,
    rhs: DVector<f64>,
}

impl LinearSystem {
    pub fn matrix(&self) -> &CsrMatrix<f64> {
        &self.matrix
    }

    pub fn rhs(&self) -> &DVector<f64> {
        &self.rhs
    }

    pub fn nrows(&self) -> usize {
        self.matrix.nrows()
    }
}

/// Translates the internal store and RHS into the external representation.
pub fn build_linear_system(store: &SparseStore, rhs: &DVector<f64>) -> LinearSystem {
    let mut coo = CooMatrix::new(store.nrows(), store.ncols());
    store.for_each_entry(|row, col, value| coo.push(row, col, value));
    LinearSystem {
        matrix: CsrMatrix::from(&coo),
        rhs: rhs.clone(),
    }
}
