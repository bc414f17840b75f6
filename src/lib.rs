//! Skoll: sparse matrix assembly for finite element computations.
//!
//! The crate turns per-cell stiffness contributions into a globally
//! assembled sparse linear system: sparsity discovery from mesh adjacency,
//! scatter-add assembly under several execution models, Dirichlet/Neumann
//! boundary condition enforcement, and translation into an external solver
//! format. Storage layouts live in the `skoll-sparse` member crate.

pub mod assembly;
pub mod bc;
pub mod config;
pub mod element;
pub mod error;
pub mod mesh;
pub mod model;
pub mod system;
pub mod timing;

pub mod sparse {
    pub use skoll_sparse::*;
}

pub extern crate nalgebra;
pub extern crate nalgebra_sparse;

pub use error::AssemblyError;
