//! Global assembly: sparsity discovery and scatter-add of element matrices.

pub mod global;
pub mod pattern;

pub use global::{AtomicParAssembler, ExecutionModel, RowParAssembler, SerialAssembler};
