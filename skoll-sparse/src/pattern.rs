use itertools::Itertools;

/// The finalized sparsity structure of a matrix: row offsets plus column
/// indices, with no values attached.
///
/// A pattern is immutable once constructed. The assembly-oriented stores in
/// this crate discover their structure in place and can snapshot it into a
/// `SparsityPattern` once every slot is claimed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SparsityPattern {
    major_offsets: Vec<usize>,
    minor_indices: Vec<usize>,
    minor_dim: usize,
}

impl SparsityPattern {
    /// Constructs a pattern from row offsets and column indices.
    ///
    /// Panics if `major_offsets` does not have exactly one entry per row plus
    /// a final total, or if the final offset disagrees with the number of
    /// column indices.
    pub fn from_offsets_and_indices(
        major_dim: usize,
        minor_dim: usize,
        major_offsets: Vec<usize>,
        minor_indices: Vec<usize>,
    ) -> Self {
        assert_eq!(major_offsets.len(), major_dim + 1);
        assert_eq!(*major_offsets.last().unwrap(), minor_indices.len());
        if major_offsets
            .iter()
            .tuple_windows()
            .any(|(prev, next)| prev > next)
        {
            panic!("Offsets must be non-decreasing.");
        }
        Self {
            major_offsets,
            minor_indices,
            minor_dim,
        }
    }

    pub fn major_offsets(&self) -> &[usize] {
        &self.major_offsets
    }

    pub fn minor_indices(&self) -> &[usize] {
        &self.minor_indices
    }

    pub fn major_dim(&self) -> usize {
        self.major_offsets.len() - 1
    }

    pub fn minor_dim(&self) -> usize {
        self.minor_dim
    }

    pub fn nnz(&self) -> usize {
        self.minor_indices.len()
    }

    /// The column indices of the given row, in storage order.
    pub fn lane(&self, major_index: usize) -> Option<&[usize]> {
        let begin = *self.major_offsets.get(major_index)?;
        let end = *self.major_offsets.get(major_index + 1)?;
        Some(&self.minor_indices[begin..end])
    }
}
