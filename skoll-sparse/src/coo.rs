use crate::atomic::AtomicF64View;
use crate::CapacityError;
use itertools::izip;
use nalgebra::DMatrix;
use std::cmp::Ordering;

/// A coordinate-layout matrix with a fixed entry budget.
///
/// Coordinates are claimed during sparsity discovery with
/// [`push_coordinate`](CooMatrix::push_coordinate); assembly then scatters
/// values onto the claimed coordinates. After [`sort`](CooMatrix::sort) the
/// triplets are ordered by `(row, col)` and lookups switch from a linear scan
/// to a binary search.
#[derive(Debug, Clone, PartialEq)]
pub struct CooMatrix {
    nrows: usize,
    ncols: usize,
    capacity: usize,
    rows: Vec<usize>,
    cols: Vec<usize>,
    values: Vec<f64>,
    sorted: bool,
}

impl CooMatrix {
    /// Allocates a matrix that can hold at most `capacity` entries.
    pub fn with_capacity(nrows: usize, ncols: usize, capacity: usize) -> Self {
        Self {
            nrows,
            ncols,
            capacity,
            rows: Vec::with_capacity(capacity),
            cols: Vec::with_capacity(capacity),
            values: Vec::with_capacity(capacity),
            sorted: false,
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Number of claimed coordinates.
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Claims the next free entry for `(row, col)` with a zero value.
    ///
    /// Exceeding the entry budget means the adjacency-derived non-zero count
    /// was wrong and is reported as a [`CapacityError`].
    pub fn push_coordinate(&mut self, row: usize, col: usize) -> Result<(), CapacityError> {
        assert!(row < self.nrows);
        assert!(col < self.ncols);
        if self.values.len() == self.capacity {
            return Err(CapacityError::new(row));
        }
        self.rows.push(row);
        self.cols.push(col);
        self.values.push(0.0);
        self.sorted = false;
        Ok(())
    }

    /// The entry index of `(row, col)`, or `None` if the coordinate was never
    /// claimed. Binary search once sorted, linear scan otherwise.
    pub fn index_of(&self, row: usize, col: usize) -> Option<usize> {
        self.entries().index_of(row, col)
    }

    /// Accumulates into the value at `(row, col)`.
    ///
    /// The coordinate must have been claimed during sparsity discovery; a
    /// miss is a pattern bug and surfaces as a [`CapacityError`].
    pub fn add_value(&mut self, row: usize, col: usize, value: f64) -> Result<(), CapacityError> {
        match self.index_of(row, col) {
            Some(index) => {
                self.values[index] += value;
                Ok(())
            }
            None => Err(CapacityError::new(row)),
        }
    }

    /// Overwrites the value at `(row, col)`. Same miss semantics as
    /// [`add_value`](CooMatrix::add_value).
    pub fn set_value(&mut self, row: usize, col: usize, value: f64) -> Result<(), CapacityError> {
        match self.index_of(row, col) {
            Some(index) => {
                self.values[index] = value;
                Ok(())
            }
            None => Err(CapacityError::new(row)),
        }
    }

    /// Orders the triplets by `(row, col)`, carrying each value with its
    /// coordinate through the reorder.
    pub fn sort(&mut self) {
        let mut triplets: Vec<(usize, usize, f64)> = izip!(&self.rows, &self.cols, &self.values)
            .map(|(&r, &c, &v)| (r, c, v))
            .collect();
        triplets.sort_unstable_by_key(|&(r, c, _)| (r, c));
        for (i, (r, c, v)) in triplets.into_iter().enumerate() {
            self.rows[i] = r;
            self.cols[i] = c;
            self.values[i] = v;
        }
        self.sorted = true;
    }

    /// Zeroes all values, keeping the claimed coordinates and their order.
    pub fn clear_values(&mut self) {
        for value in &mut self.values {
            *value = 0.0;
        }
    }

    /// A shared view of the coordinates, usable for lookup while values are
    /// accessed atomically.
    pub fn entries(&self) -> CooRows<'_> {
        CooRows {
            rows: &self.rows,
            cols: &self.cols,
            sorted: self.sorted,
        }
    }

    /// Splits into a coordinate view and an atomic value view for concurrent
    /// scatter-adds.
    pub fn atomic_split(&mut self) -> (CooRows<'_>, AtomicF64View<'_>) {
        let entries = CooRows {
            rows: &self.rows,
            cols: &self.cols,
            sorted: self.sorted,
        };
        let values = AtomicF64View::new(&mut self.values);
        (entries, values)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        izip!(&self.rows, &self.cols, &self.values).map(|(&r, &c, &v)| (r, c, v))
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut result = DMatrix::zeros(self.nrows, self.ncols);
        for (r, c, v) in self.iter() {
            result[(r, c)] += v;
        }
        result
    }
}

/// A shared view of COO coordinates, sufficient for entry lookup.
#[derive(Debug, Clone, Copy)]
pub struct CooRows<'a> {
    rows: &'a [usize],
    cols: &'a [usize],
    sorted: bool,
}

impl<'a> CooRows<'a> {
    pub fn index_of(&self, row: usize, col: usize) -> Option<usize> {
        if self.sorted {
            self.binary_index_of(row, col)
        } else {
            izip!(self.rows, self.cols).position(|(&r, &c)| r == row && c == col)
        }
    }

    fn binary_index_of(&self, row: usize, col: usize) -> Option<usize> {
        let mut lo = 0;
        let mut hi = self.rows.len();
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            match (self.rows[mid], self.cols[mid]).cmp(&(row, col)) {
                Ordering::Less => lo = mid + 1,
                Ordering::Greater => hi = mid,
                Ordering::Equal => return Some(mid),
            }
        }
        None
    }
}
