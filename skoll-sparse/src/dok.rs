use nalgebra::DMatrix;
use rustc_hash::FxHashMap;

/// A dictionary-of-keys matrix.
///
/// This is the baseline layout: unbounded, hash-based, no reserved sparsity
/// and no concurrent path. It mirrors the behavior of hashmap-backed linear
/// system backends and is mainly useful as a cross-check for the
/// fixed-capacity layouts.
#[derive(Debug, Clone, Default)]
pub struct DokMatrix {
    nrows: usize,
    ncols: usize,
    entries: FxHashMap<(usize, usize), f64>,
}

impl DokMatrix {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            entries: FxHashMap::default(),
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.entries.len()
    }

    pub fn add_value(&mut self, row: usize, col: usize, value: f64) {
        assert!(row < self.nrows);
        assert!(col < self.ncols);
        *self.entries.entry((row, col)).or_insert(0.0) += value;
    }

    pub fn set_value(&mut self, row: usize, col: usize, value: f64) {
        assert!(row < self.nrows);
        assert!(col < self.ncols);
        self.entries.insert((row, col), value);
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        self.entries.get(&(row, col)).copied()
    }

    pub fn clear_values(&mut self) {
        for value in self.entries.values_mut() {
            *value = 0.0;
        }
    }

    /// Entries sorted by `(row, col)`, so that downstream translation does
    /// not depend on hash iteration order.
    pub fn sorted_entries(&self) -> Vec<(usize, usize, f64)> {
        let mut triplets: Vec<_> = self
            .entries
            .iter()
            .map(|(&(r, c), &v)| (r, c, v))
            .collect();
        triplets.sort_unstable_by_key(|&(r, c, _)| (r, c));
        triplets
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut result = DMatrix::zeros(self.nrows, self.ncols);
        for (r, c, v) in self.sorted_entries() {
            result[(r, c)] += v;
        }
        result
    }
}
