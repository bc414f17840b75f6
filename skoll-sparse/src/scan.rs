//! Exclusive prefix sums.
//!
//! The scan turns per-row neighbor counts into row-start offsets, so every
//! builder that reserves row slices goes through one of these two functions.
//! Both return the total sum, i.e. the offset one past the final row.

use rayon::prelude::*;

/// Minimum chunk length before the parallel scan splits the input.
const PAR_CHUNK_LEN: usize = 4096;

/// Sequential exclusive prefix sum: `output[i] = input[0] + ... + input[i - 1]`.
///
/// Returns the sum of all inputs.
///
/// # Panics
///
/// Panics if `input` and `output` have different lengths.
pub fn exclusive_sum(input: &[usize], output: &mut [usize]) -> usize {
    assert_eq!(input.len(), output.len());
    let mut running = 0;
    for (out, count) in output.iter_mut().zip(input) {
        *out = running;
        running += count;
    }
    running
}

/// Parallel exclusive prefix sum with the same result as [`exclusive_sum`].
///
/// The input is split into chunks; each chunk is scanned locally, the chunk
/// totals are scanned sequentially, and the chunk offsets are then added back
/// in parallel. Since integer addition is associative the result does not
/// depend on the number of threads. The function only returns once every
/// output element is written, so callers may read `output` immediately after.
pub fn par_exclusive_sum(input: &[usize], output: &mut [usize]) -> usize {
    assert_eq!(input.len(), output.len());
    if input.len() < PAR_CHUNK_LEN {
        return exclusive_sum(input, output);
    }

    let mut chunk_totals: Vec<usize> = input
        .par_chunks(PAR_CHUNK_LEN)
        .zip(output.par_chunks_mut(PAR_CHUNK_LEN))
        .map(|(in_chunk, out_chunk)| exclusive_sum(in_chunk, out_chunk))
        .collect();

    let mut running = 0;
    for total in chunk_totals.iter_mut() {
        let count = *total;
        *total = running;
        running += count;
    }

    output
        .par_chunks_mut(PAR_CHUNK_LEN)
        .zip(chunk_totals.par_iter())
        .for_each(|(out_chunk, offset)| {
            for out in out_chunk {
                *out += offset;
            }
        });

    running
}
