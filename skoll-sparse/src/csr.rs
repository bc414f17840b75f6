use crate::atomic::AtomicF64View;
use crate::{scan, CapacityError, SparsityPattern, UNCLAIMED};
use itertools::Itertools;
use nalgebra::DMatrix;
use std::mem;
use std::ops::Range;

/// A compressed-row matrix whose structure is reserved up front and claimed
/// during filling.
///
/// Row offsets are fixed at construction, from per-row capacity counts.
/// Column slots start out as [`UNCLAIMED`]; an insertion at `(r, c)` probes
/// row `r`'s reserved slice and either finds `c` or claims the first empty
/// slot. Exhausting a row's slice is a [`CapacityError`], signalling that the
/// sparsity discovery under-counted the adjacency.
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    ncols: usize,
    row_offsets: Vec<usize>,
    column_indices: Vec<usize>,
    values: Vec<f64>,
    sorted: bool,
}

impl CsrMatrix {
    /// Allocates a matrix with `counts[r]` reserved slots in row `r`.
    pub fn from_row_counts(counts: &[usize], ncols: usize) -> Self {
        let mut row_offsets = vec![0; counts.len() + 1];
        let total = scan::exclusive_sum(counts, &mut row_offsets[..counts.len()]);
        row_offsets[counts.len()] = total;
        Self::from_offsets(ncols, row_offsets)
    }

    /// Allocates a matrix from precomputed row offsets (length `nrows + 1`).
    pub fn from_offsets(ncols: usize, row_offsets: Vec<usize>) -> Self {
        assert!(!row_offsets.is_empty());
        if row_offsets
            .iter()
            .tuple_windows()
            .any(|(prev, next)| prev > next)
        {
            panic!("Row offsets must be non-decreasing.");
        }
        let nnz = *row_offsets.last().unwrap();
        Self {
            ncols,
            row_offsets,
            column_indices: vec![UNCLAIMED; nnz],
            values: vec![0.0; nnz],
            sorted: false,
        }
    }

    /// Builds a fully claimed matrix with zero values from a finalized pattern.
    pub fn from_pattern(pattern: &SparsityPattern) -> Self {
        let sorted = (0..pattern.major_dim()).all(|row| {
            pattern
                .lane(row)
                .unwrap()
                .iter()
                .tuple_windows()
                .all(|(prev, next)| prev < next)
        });
        Self {
            ncols: pattern.minor_dim(),
            row_offsets: pattern.major_offsets().to_vec(),
            column_indices: pattern.minor_indices().to_vec(),
            values: vec![0.0; pattern.nnz()],
            sorted,
        }
    }

    pub fn nrows(&self) -> usize {
        self.row_offsets.len() - 1
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    /// Total number of reserved slots, claimed or not.
    pub fn reserved_nnz(&self) -> usize {
        self.column_indices.len()
    }

    /// Number of slots holding an actual coordinate.
    pub fn claimed_nnz(&self) -> usize {
        self.column_indices
            .iter()
            .filter(|&&c| c != UNCLAIMED)
            .count()
    }

    pub fn row_offsets(&self) -> &[usize] {
        &self.row_offsets
    }

    pub fn column_indices(&self) -> &[usize] {
        &self.column_indices
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.values
    }

    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    fn row_range(&self, row: usize) -> Range<usize> {
        self.row_offsets[row]..self.row_offsets[row + 1]
    }

    /// Finds the slot of `(row, col)`, claiming the first empty slot of the
    /// row if the coordinate is not present yet.
    pub fn claim_column(&mut self, row: usize, col: usize) -> Result<usize, CapacityError> {
        debug_assert!(col < self.ncols);
        for i in self.row_range(row) {
            let current = self.column_indices[i];
            if current == col {
                return Ok(i);
            }
            if current == UNCLAIMED {
                self.column_indices[i] = col;
                self.sorted = false;
                return Ok(i);
            }
        }
        Err(CapacityError::new(row))
    }

    /// Overwrites the value at `(row, col)`, claiming the slot if needed.
    pub fn set_value(&mut self, row: usize, col: usize, value: f64) -> Result<(), CapacityError> {
        let slot = self.claim_column(row, col)?;
        self.values[slot] = value;
        Ok(())
    }

    /// Accumulates into the value at `(row, col)`, claiming the slot if needed.
    pub fn add_value(&mut self, row: usize, col: usize, value: f64) -> Result<(), CapacityError> {
        let slot = self.claim_column(row, col)?;
        self.values[slot] += value;
        Ok(())
    }

    /// The slot index of `(row, col)`, or `None` if the coordinate has not
    /// been claimed. Never panics on a miss; callers decide whether a miss is
    /// an error.
    pub fn index_of(&self, row: usize, col: usize) -> Option<usize> {
        self.rows().index_of(row, col)
    }

    /// A shared view of the structure, usable while values are accessed
    /// through other means.
    pub fn rows(&self) -> CsrRows<'_> {
        CsrRows {
            row_offsets: &self.row_offsets,
            column_indices: &self.column_indices,
            sorted: self.sorted,
        }
    }

    /// Exclusive access to one row's reserved slots.
    pub fn row_mut(&mut self, row: usize) -> CsrRowMut<'_> {
        let range = self.row_range(row);
        CsrRowMut {
            row,
            columns: &mut self.column_indices[range.clone()],
            values: &mut self.values[range],
        }
    }

    /// Splits the matrix into one exclusive row accessor per row, enabling
    /// race-free parallel iteration where each row has a single writer.
    pub fn split_rows_mut(&mut self) -> Vec<CsrRowMut<'_>> {
        // Claims may happen through the returned accessors.
        self.sorted = false;
        let mut result = Vec::with_capacity(self.nrows());
        let mut cols_rest: &mut [usize] = &mut self.column_indices;
        let mut vals_rest: &mut [f64] = &mut self.values;
        for (row, (begin, end)) in self.row_offsets.iter().tuple_windows().enumerate() {
            let len = end - begin;
            let (cols_head, cols_tail) = mem::take(&mut cols_rest).split_at_mut(len);
            let (vals_head, vals_tail) = mem::take(&mut vals_rest).split_at_mut(len);
            cols_rest = cols_tail;
            vals_rest = vals_tail;
            result.push(CsrRowMut {
                row,
                columns: cols_head,
                values: vals_head,
            });
        }
        result
    }

    /// Splits into an immutable structure view and an atomic value view, for
    /// concurrent scatter-adds against a fully claimed structure.
    pub fn atomic_split(&mut self) -> (CsrRows<'_>, AtomicF64View<'_>) {
        let rows = CsrRows {
            row_offsets: &self.row_offsets,
            column_indices: &self.column_indices,
            sorted: self.sorted,
        };
        let values = AtomicF64View::new(&mut self.values);
        (rows, values)
    }

    /// Reorders every row's slots by column index, keeping each value
    /// attached to its coordinate. Unclaimed slots end up at the back of
    /// their row. Enables binary-search lookup.
    pub fn sort_rows(&mut self) {
        let mut buffer: Vec<(usize, f64)> = Vec::new();
        for row in 0..self.nrows() {
            let range = self.row_range(row);
            buffer.clear();
            buffer.extend(
                self.column_indices[range.clone()]
                    .iter()
                    .copied()
                    .zip(self.values[range.clone()].iter().copied()),
            );
            buffer.sort_unstable_by_key(|&(col, _)| col);
            for (slot, &(col, value)) in range.zip(buffer.iter()) {
                self.column_indices[slot] = col;
                self.values[slot] = value;
            }
        }
        self.sorted = true;
    }

    /// Zeroes all values while keeping every claimed coordinate.
    pub fn clear_values(&mut self) {
        for value in &mut self.values {
            *value = 0.0;
        }
    }

    /// Iterates over claimed entries in storage order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        (0..self.nrows()).flat_map(move |row| {
            let range = self.row_range(row);
            self.column_indices[range.clone()]
                .iter()
                .zip(&self.values[range])
                .filter(|&(&col, _)| col != UNCLAIMED)
                .map(move |(&col, &value)| (row, col, value))
        })
    }

    /// Snapshots the claimed coordinates into a compact pattern.
    pub fn pattern(&self) -> SparsityPattern {
        let mut offsets = Vec::with_capacity(self.nrows() + 1);
        let mut indices = Vec::with_capacity(self.claimed_nnz());
        offsets.push(0);
        for row in 0..self.nrows() {
            indices.extend(
                self.column_indices[self.row_range(row)]
                    .iter()
                    .copied()
                    .filter(|&col| col != UNCLAIMED),
            );
            offsets.push(indices.len());
        }
        SparsityPattern::from_offsets_and_indices(self.nrows(), self.ncols, offsets, indices)
    }

    pub fn to_dense(&self) -> DMatrix<f64> {
        let mut result = DMatrix::zeros(self.nrows(), self.ncols());
        for (row, col, value) in self.iter() {
            result[(row, col)] += value;
        }
        result
    }
}

/// A shared view of a CSR structure, sufficient for slot lookup.
#[derive(Debug, Clone, Copy)]
pub struct CsrRows<'a> {
    row_offsets: &'a [usize],
    column_indices: &'a [usize],
    sorted: bool,
}

impl<'a> CsrRows<'a> {
    pub fn nrows(&self) -> usize {
        self.row_offsets.len() - 1
    }

    /// The slot of `(row, col)`: binary search when the row slices are
    /// sorted, linear probe otherwise. Returns `None` on a miss.
    pub fn index_of(&self, row: usize, col: usize) -> Option<usize> {
        let begin = self.row_offsets[row];
        let end = self.row_offsets[row + 1];
        let slice = &self.column_indices[begin..end];
        if self.sorted {
            slice.binary_search(&col).ok().map(|local| begin + local)
        } else {
            slice.iter().position(|&c| c == col).map(|local| begin + local)
        }
    }
}

/// Exclusive access to the reserved slots of one row.
pub struct CsrRowMut<'a> {
    row: usize,
    columns: &'a mut [usize],
    values: &'a mut [f64],
}

impl<'a> CsrRowMut<'a> {
    pub fn row(&self) -> usize {
        self.row
    }

    pub fn columns(&self) -> &[usize] {
        &*self.columns
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut *self.values
    }

    pub fn columns_and_values_mut(&mut self) -> (&[usize], &mut [f64]) {
        (&*self.columns, &mut *self.values)
    }

    /// Find-or-claim accumulation within this row, identical in semantics to
    /// [`CsrMatrix::add_value`] but valid under per-row parallelism.
    pub fn add_value(&mut self, col: usize, value: f64) -> Result<(), CapacityError> {
        for (slot_col, slot_value) in self.columns.iter_mut().zip(self.values.iter_mut()) {
            if *slot_col == col {
                *slot_value += value;
                return Ok(());
            }
            if *slot_col == UNCLAIMED {
                *slot_col = col;
                *slot_value += value;
                return Ok(());
            }
        }
        Err(CapacityError::new(self.row))
    }
}
