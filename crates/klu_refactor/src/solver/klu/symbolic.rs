use crate::solver::{
    klu::{KluError, KluResult},
    utils::is_permutation,
};

/// Block partition produced by symbolic analysis: column order and the
/// boundaries of the diagonal blocks of the block upper triangular form.
///
/// Immutable once built; refactorization only reads it.
#[derive(Debug, Clone)]
pub struct KluSymbolic {
    pub(crate) n: usize,
    // nnz of the matrix the partition was computed for
    pub(crate) nz: usize,
    // entries that fall in the off-diagonal blocks
    pub(crate) nzoff: usize,
    pub(crate) nblocks: usize,
    pub(crate) maxblock: usize,
    // size n. column k of the permuted system is column_permutation[k] of A
    pub(crate) column_permutation: Vec<usize>,
    // size nblocks + 1. block b holds columns block_boundaries[b]..block_boundaries[b+1]
    pub(crate) block_boundaries: Vec<usize>,
}

impl KluSymbolic {
    pub fn new(
        column_permutation: Vec<usize>,
        block_boundaries: Vec<usize>,
        nz: usize,
        nzoff: usize,
    ) -> KluResult<Self> {
        let n = column_permutation.len();
        if !is_permutation(&column_permutation, n) {
            return Err(KluError::InvalidPartition {
                reason: "column permutation is not a permutation",
            });
        }
        if block_boundaries.len() < 2 && n > 0 {
            return Err(KluError::InvalidPartition {
                reason: "at least one block is required",
            });
        }
        if block_boundaries.first() != Some(&0) || block_boundaries.last() != Some(&n) {
            return Err(KluError::InvalidPartition {
                reason: "block boundaries must start at 0 and end at n",
            });
        }
        if block_boundaries.windows(2).any(|w| w[0] >= w[1]) {
            return Err(KluError::InvalidPartition {
                reason: "block boundaries must be strictly increasing",
            });
        }
        if nzoff > nz {
            return Err(KluError::InvalidPartition {
                reason: "more off-diagonal entries than entries",
            });
        }

        let nblocks = block_boundaries.len() - 1;
        let maxblock = block_boundaries
            .windows(2)
            .map(|w| w[1] - w[0])
            .max()
            .unwrap_or(0);

        Ok(Self {
            n,
            nz,
            nzoff,
            nblocks,
            maxblock,
            column_permutation,
            block_boundaries,
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn nz(&self) -> usize {
        self.nz
    }

    pub fn nzoff(&self) -> usize {
        self.nzoff
    }

    pub fn nblocks(&self) -> usize {
        self.nblocks
    }

    pub fn maxblock(&self) -> usize {
        self.maxblock
    }

    pub fn column_permutation(&self) -> &[usize] {
        &self.column_permutation
    }

    pub fn block_boundaries(&self) -> &[usize] {
        &self.block_boundaries
    }

    /// Columns `k1..k2` of block `block`.
    #[inline]
    pub fn block_range(&self, block: usize) -> (usize, usize) {
        (self.block_boundaries[block], self.block_boundaries[block + 1])
    }

    /// Block that owns permuted column `k`.
    pub fn block_of(&self, k: usize) -> usize {
        debug_assert!(k < self.n);
        // last boundary <= k
        self.block_boundaries.partition_point(|&b| b <= k) - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn computes_block_sizes() {
        let s = KluSymbolic::new(vec![1, 0, 2, 3, 4], vec![0, 2, 3, 5], 9, 2).unwrap();
        assert_eq!(s.nblocks(), 3);
        assert_eq!(s.maxblock(), 2);
        assert_eq!(s.block_range(1), (2, 3));
        assert_eq!(s.block_of(0), 0);
        assert_eq!(s.block_of(1), 0);
        assert_eq!(s.block_of(2), 1);
        assert_eq!(s.block_of(4), 2);
    }

    #[test]
    fn rejects_bad_partitions() {
        assert!(matches!(
            KluSymbolic::new(vec![0, 0], vec![0, 2], 2, 0),
            Err(KluError::InvalidPartition { .. })
        ));
        assert!(matches!(
            KluSymbolic::new(vec![0, 1], vec![0, 1, 1, 2], 2, 0),
            Err(KluError::InvalidPartition { .. })
        ));
        assert!(matches!(
            KluSymbolic::new(vec![0, 1], vec![0, 1], 2, 0),
            Err(KluError::InvalidPartition { .. })
        ));
        assert!(matches!(
            KluSymbolic::new(vec![0, 1], vec![0, 2], 2, 3),
            Err(KluError::InvalidPartition { .. })
        ));
    }
}
