use crate::{CapacityError, CooMatrix, CsrMatrix, DokMatrix};
use nalgebra::DMatrix;
use std::error::Error;
use std::fmt;
use std::str::FromStr;

/// The physical layout of the assembled matrix.
///
/// Replaces a proliferation of per-format boolean flags with a single
/// dispatch point: every caller selects exactly one layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageLayout {
    /// Coordinate triplets in claim order, linear lookup.
    Coo,
    /// Coordinate triplets sorted by `(row, col)`, binary-search lookup.
    CooSorted,
    /// Compressed rows with reserved, claimable column slots.
    Csr,
    /// Hash-based dictionary of keys; the unbounded baseline.
    Legacy,
}

impl StorageLayout {
    pub const ALL: [StorageLayout; 4] = [
        StorageLayout::Coo,
        StorageLayout::CooSorted,
        StorageLayout::Csr,
        StorageLayout::Legacy,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            StorageLayout::Coo => "coo",
            StorageLayout::CooSorted => "coo-sorted",
            StorageLayout::Csr => "csr",
            StorageLayout::Legacy => "legacy",
        }
    }
}

impl fmt::Display for StorageLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The storage layout name was not recognized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLayout(String);

impl fmt::Display for UnknownLayout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unknown storage layout \"{}\"; supported layouts are: coo, coo-sorted, csr, legacy",
            self.0
        )
    }
}

impl Error for UnknownLayout {}

impl FromStr for StorageLayout {
    type Err = UnknownLayout;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coo" => Ok(StorageLayout::Coo),
            "coo-sorted" => Ok(StorageLayout::CooSorted),
            "csr" => Ok(StorageLayout::Csr),
            "legacy" => Ok(StorageLayout::Legacy),
            other => Err(UnknownLayout(other.to_string())),
        }
    }
}

/// A sparse matrix held in one of the supported storage layouts.
#[derive(Debug, Clone)]
pub enum SparseStore {
    Coo(CooMatrix),
    Csr(CsrMatrix),
    Dok(DokMatrix),
}

impl SparseStore {
    pub fn layout(&self) -> StorageLayout {
        match self {
            SparseStore::Coo(coo) if coo.is_sorted() => StorageLayout::CooSorted,
            SparseStore::Coo(_) => StorageLayout::Coo,
            SparseStore::Csr(_) => StorageLayout::Csr,
            SparseStore::Dok(_) => StorageLayout::Legacy,
        }
    }

    pub fn nrows(&self) -> usize {
        match self {
            SparseStore::Coo(coo) => coo.nrows(),
            SparseStore::Csr(csr) => csr.nrows(),
            SparseStore::Dok(dok) => dok.nrows(),
        }
    }

    pub fn ncols(&self) -> usize {
        match self {
            SparseStore::Coo(coo) => coo.ncols(),
            SparseStore::Csr(csr) => csr.ncols(),
            SparseStore::Dok(dok) => dok.ncols(),
        }
    }

    pub fn add_value(&mut self, row: usize, col: usize, value: f64) -> Result<(), CapacityError> {
        match self {
            SparseStore::Coo(coo) => coo.add_value(row, col, value),
            SparseStore::Csr(csr) => csr.add_value(row, col, value),
            SparseStore::Dok(dok) => {
                dok.add_value(row, col, value);
                Ok(())
            }
        }
    }

    pub fn set_value(&mut self, row: usize, col: usize, value: f64) -> Result<(), CapacityError> {
        match self {
            SparseStore::Coo(coo) => coo.set_value(row, col, value),
            SparseStore::Csr(csr) => csr.set_value(row, col, value),
            SparseStore::Dok(dok) => {
                dok.set_value(row, col, value);
                Ok(())
            }
        }
    }

    pub fn clear_values(&mut self) {
        match self {
            SparseStore::Coo(coo) => coo.clear_values(),
            SparseStore::Csr(csr) => csr.clear_values(),
            SparseStore::Dok(dok) => dok.clear_values(),
        }
    }

    /// Visits every stored entry as `(row, col, value)`.
    ///
    /// For the hash-based layout the entries are visited in sorted coordinate
    /// order so that translation downstream is deterministic.
    pub fn for_each_entry(&self, mut f: impl FnMut(usize, usize, f64)) {
        match self {
            SparseStore::Coo(coo) => {
                for (r, c, v) in coo.iter() {
                    f(r, c, v);
                }
            }
            SparseStore::Csr(csr) => {
                for (r, c, v) in csr.iter() {
                    f(r, c, v);
                }
            }
            SparseStore::Dok(dok) => {
                for (r, c, v) in dok.sorted_entries() {
                    f(r, c, v);
                }
            }
        }
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        match self {
            SparseStore::Coo(coo) => coo.to_dense(),
            SparseStore::Csr(csr) => csr.to_dense(),
            SparseStore::Dok(dok) => dok.to_dense(),
        }
    }
}
