use crate::solver::{
    klu::{FactorizationPath, KluError, KluResult, KluStatus, KluSymbolic},
    matrix::csc::CscMatrix,
    utils::{inverse_permutation, is_permutation},
};

/// L and U of one diagonal block, stored column by column with local row indices.
///
/// The pattern is fixed at construction; refactorization only overwrites the
/// values. L is unit lower triangular (the unit diagonal is not stored) and U
/// excludes its diagonal, which lives in [`KluNumeric::u_diag`].
#[derive(Debug, Clone)]
pub struct LuBlock {
    pub(crate) nk: usize,
    // size nk + 1
    pub(crate) l_ptr: Vec<usize>,
    pub(crate) l_rows: Vec<usize>,
    pub(crate) l_values: Vec<f64>,
    // size nk + 1
    pub(crate) u_ptr: Vec<usize>,
    pub(crate) u_rows: Vec<usize>,
    pub(crate) u_values: Vec<f64>,
}

fn compress(columns: &[Vec<usize>]) -> (Vec<usize>, Vec<usize>) {
    let mut ptr = Vec::with_capacity(columns.len() + 1);
    ptr.push(0);
    let mut rows = Vec::with_capacity(columns.iter().map(Vec::len).sum());
    for col in columns {
        rows.extend_from_slice(col);
        ptr.push(rows.len());
    }
    (ptr, rows)
}

impl LuBlock {
    /// Build a block from the row patterns of each column of L and U.
    ///
    /// `u_pattern[k]` is the order in which column k is eliminated, so it must
    /// list earlier pivots before the pivots they update.
    pub fn from_columns(l_pattern: &[Vec<usize>], u_pattern: &[Vec<usize>]) -> Self {
        debug_assert_eq!(l_pattern.len(), u_pattern.len());
        let (l_ptr, l_rows) = compress(l_pattern);
        let (u_ptr, u_rows) = compress(u_pattern);
        Self {
            nk: l_pattern.len(),
            l_values: vec![0.0; l_rows.len()],
            u_values: vec![0.0; u_rows.len()],
            l_ptr,
            l_rows,
            u_ptr,
            u_rows,
        }
    }

    pub fn nk(&self) -> usize {
        self.nk
    }

    /// Off-diagonal entries of L.
    pub fn lnz(&self) -> usize {
        self.l_rows.len()
    }

    /// Off-diagonal entries of U.
    pub fn unz(&self) -> usize {
        self.u_rows.len()
    }

    /// (rows, values) of column k of L, below the unit diagonal.
    pub fn l_column(&self, k: usize) -> (&[usize], &[f64]) {
        let (s, e) = (self.l_ptr[k], self.l_ptr[k + 1]);
        (&self.l_rows[s..e], &self.l_values[s..e])
    }

    /// (rows, values) of column k of U, above the diagonal.
    pub fn u_column(&self, k: usize) -> (&[usize], &[f64]) {
        let (s, e) = (self.u_ptr[k], self.u_ptr[k + 1]);
        (&self.u_rows[s..e], &self.u_values[s..e])
    }

    /// U rows must be earlier pivots, L rows later ones, all inside the block.
    fn check(&self) -> Result<(), &'static str> {
        for k in 0..self.nk {
            let (u_rows, _) = self.u_column(k);
            if u_rows.iter().any(|&j| j >= k) {
                return Err("U column has a row on or below the diagonal");
            }
            let (l_rows, _) = self.l_column(k);
            if l_rows.iter().any(|&i| i <= k || i >= self.nk) {
                return Err("L column has a row on or above the diagonal or outside the block");
            }
        }
        Ok(())
    }
}

/// Factor storage for one diagonal block.
#[derive(Debug, Clone)]
pub enum BlockLu {
    /// 1-by-1 block; its only value is the diagonal entry in `u_diag`
    Singleton,
    Lu(LuBlock),
}

/// Status of the most recent refactorization.
#[derive(Debug, Clone, Default)]
pub struct KluNumericMetrics {
    /// Latest condition seen by the last call.
    pub status: KluStatus,
    /// First \(k\) for which a zero pivot `U(k,k)` was encountered (0-based, in the
    /// permuted system), if detected.
    pub numerical_rank: Option<usize>,
    /// Original column index in the input matrix `A` that corresponds to `numerical_rank`, if any.
    pub singular_col: Option<usize>,
}

/// Numeric LU factors of a block upper triangular matrix.
///
/// Layout (patterns, permutations, off-diagonal structure) is fixed by the first
/// factorization; refactorization overwrites values in place.
#[derive(Clone)]
pub struct KluNumeric {
    pub(crate) n: usize,
    pub(crate) nblocks: usize,
    // number of off-diagonal entries
    pub(crate) nzoff: usize,
    // nz in L and U, including diagonal
    pub(crate) lnz: usize,
    pub(crate) unz: usize,
    // partition the layout was built for: Q and R
    pub(crate) column_permutation: Vec<usize>,
    pub(crate) block_boundaries: Vec<usize>,
    // size n. final pivot permutation: row pnum[k] of A is the kth pivot row
    pub(crate) pnum: Vec<usize>,
    // size n. inverse of pnum
    pub(crate) pinv: Vec<usize>,
    pub(crate) blocks: Vec<BlockLu>,
    // size n. diagonal of U
    pub(crate) u_diag: Vec<f64>,
    // size n when scaling is on, indexed by pivotal row between calls
    pub(crate) rs: Option<Vec<f64>>,
    // size n. only [..maxblock] is used for elimination; every entry is zero
    // between columns
    pub(crate) work: Vec<f64>,
    // size n + 1. column pointers for off-diagonal entries
    pub(crate) offp: Vec<usize>,
    // size nzoff. pivotal row indices of off-diagonal entries
    pub(crate) offi: Vec<usize>,
    // size nzoff. values of off-diagonal entries
    pub(crate) offx: Vec<f64>,
    pub(crate) path: Option<FactorizationPath>,
    pub(crate) metrics: KluNumericMetrics,
}

impl KluNumeric {
    /// Lay out numeric storage for `a` under `symbolic`, pivot order `pnum` and
    /// the given per-block L/U patterns. All values start at zero; run
    /// [`refactor`](crate::solver::klu::refactor) to fill them in.
    pub fn from_pattern(
        a: &CscMatrix,
        symbolic: &KluSymbolic,
        pnum: Vec<usize>,
        blocks: Vec<BlockLu>,
    ) -> KluResult<Self> {
        let n = symbolic.n;
        check_matrix(a, symbolic)?;
        if !is_permutation(&pnum, n) {
            return Err(KluError::InvalidNumeric {
                reason: "row permutation is not a permutation",
            });
        }
        if blocks.len() != symbolic.nblocks {
            return Err(KluError::DimensionMismatch {
                what: "block list",
                expected: symbolic.nblocks,
                actual: blocks.len(),
            });
        }

        let mut lnz = 0;
        let mut unz = 0;
        for (block, lu) in blocks.iter().enumerate() {
            let (k1, k2) = symbolic.block_range(block);
            let nk = k2 - k1;
            match lu {
                BlockLu::Singleton if nk == 1 => {}
                BlockLu::Lu(lu) if nk > 1 && lu.nk == nk => {
                    lu.check()
                        .map_err(|reason| KluError::InvalidBlockPattern { block, reason })?;
                    lnz += lu.lnz();
                    unz += lu.unz();
                }
                _ => {
                    return Err(KluError::InvalidBlockPattern {
                        block,
                        reason: "storage does not match block size",
                    });
                }
            }
            lnz += nk;
            unz += nk;
        }

        let mut pinv = vec![0; n];
        inverse_permutation(&pnum, &mut pinv);

        // off-diagonal structure in column scan order
        let mut offp = Vec::with_capacity(n + 1);
        let mut offi = Vec::with_capacity(symbolic.nzoff);
        offp.push(0);
        for block in 0..symbolic.nblocks {
            let (k1, k2) = symbolic.block_range(block);
            for k in k1..k2 {
                let oldcol = symbolic.column_permutation[k];
                for p in a.col_start(oldcol)..a.col_end(oldcol) {
                    let oldrow = a.row_index(p);
                    if oldrow >= n {
                        return Err(KluError::InvalidRowIndex {
                            col: oldcol,
                            row: oldrow,
                            n,
                        });
                    }
                    let newrow = pinv[oldrow];
                    if newrow < k1 {
                        offi.push(newrow);
                    } else if newrow >= k2 {
                        return Err(KluError::EntryOutsideBlock {
                            col: oldcol,
                            row: oldrow,
                            block,
                        });
                    }
                }
                offp.push(offi.len());
            }
        }
        if offi.len() != symbolic.nzoff {
            return Err(KluError::OffDiagonalMismatch {
                expected: symbolic.nzoff,
                actual: offi.len(),
            });
        }

        Ok(Self {
            n,
            nblocks: symbolic.nblocks,
            nzoff: symbolic.nzoff,
            lnz,
            unz,
            column_permutation: symbolic.column_permutation.clone(),
            block_boundaries: symbolic.block_boundaries.clone(),
            pnum,
            pinv,
            blocks,
            u_diag: vec![0.0; n],
            rs: None,
            work: vec![0.0; n],
            offp,
            offx: vec![0.0; offi.len()],
            offi,
            path: None,
            metrics: KluNumericMetrics::default(),
        })
    }

    pub fn n(&self) -> usize {
        self.n
    }

    pub fn nblocks(&self) -> usize {
        self.nblocks
    }

    pub fn nzoff(&self) -> usize {
        self.nzoff
    }

    pub fn lnz(&self) -> usize {
        self.lnz
    }

    pub fn unz(&self) -> usize {
        self.unz
    }

    pub fn pnum(&self) -> &[usize] {
        &self.pnum
    }

    pub fn pinv(&self) -> &[usize] {
        &self.pinv
    }

    pub fn block(&self, block: usize) -> &BlockLu {
        &self.blocks[block]
    }

    pub fn u_diag(&self) -> &[f64] {
        &self.u_diag
    }

    pub fn offp(&self) -> &[usize] {
        &self.offp
    }

    pub fn offi(&self) -> &[usize] {
        &self.offi
    }

    pub fn offx(&self) -> &[f64] {
        &self.offx
    }

    /// Row scale factors in pivotal row order, if scaling is on.
    pub fn scale_factors(&self) -> Option<&[f64]> {
        self.rs.as_deref()
    }

    pub fn metrics(&self) -> &KluNumericMetrics {
        &self.metrics
    }

    pub fn path(&self) -> Option<&FactorizationPath> {
        self.path.as_ref()
    }

    /// Attach the path used by [`refactor_along_path`](crate::solver::klu::refactor_along_path),
    /// replacing any previous one.
    pub fn attach_path(&mut self, path: FactorizationPath) -> KluResult<()> {
        path.check_fingerprint(self.n, &self.block_boundaries, self.nzoff)?;
        self.path = Some(path);
        Ok(())
    }

    pub fn detach_path(&mut self) -> Option<FactorizationPath> {
        self.path.take()
    }

    /// True if the scratch workspace holds only zeros.
    pub fn workspace_is_clear(&self) -> bool {
        self.work.iter().all(|&x| x == 0.0)
    }

    /// Checks that this numeric object was built for `symbolic` and `a`.
    pub(crate) fn check_against(&self, a: &CscMatrix, symbolic: &KluSymbolic) -> KluResult<()> {
        if self.n != symbolic.n
            || self.nblocks != symbolic.nblocks
            || self.blocks.len() != symbolic.nblocks
            || self.nzoff != symbolic.nzoff
        {
            return Err(KluError::InvalidNumeric {
                reason: "shape differs from the block partition",
            });
        }
        if self.block_boundaries != symbolic.block_boundaries {
            return Err(KluError::InvalidNumeric {
                reason: "block boundaries differ from the partition",
            });
        }
        if self.column_permutation != symbolic.column_permutation {
            return Err(KluError::InvalidNumeric {
                reason: "column order differs from the partition",
            });
        }
        if self.work.len() < symbolic.maxblock.max(self.n) {
            return Err(KluError::InvalidNumeric {
                reason: "workspace too small",
            });
        }
        check_matrix(a, symbolic)
    }

    pub(crate) fn reset_metrics(&mut self) {
        self.metrics = KluNumericMetrics::default();
    }
}

fn check_matrix(a: &CscMatrix, symbolic: &KluSymbolic) -> KluResult<()> {
    a.check_shape()?;
    if a.dim.nrows != symbolic.n || a.dim.ncols != symbolic.n {
        return Err(KluError::DimensionMismatch {
            what: "matrix",
            expected: symbolic.n,
            actual: a.dim.ncols.max(a.dim.nrows),
        });
    }
    if a.nnz() != symbolic.nz {
        return Err(KluError::DimensionMismatch {
            what: "matrix nnz",
            expected: symbolic.nz,
            actual: a.nnz(),
        });
    }
    Ok(())
}

impl std::fmt::Debug for KluNumeric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // bounded view: factor values of large systems are not useful in a dump
        struct Preview<'a, T> {
            v: &'a [T],
            max: usize,
        }
        impl<T: std::fmt::Debug> std::fmt::Debug for Preview<'_, T> {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                let n = self.v.len();
                if n <= self.max {
                    return f.debug_list().entries(self.v.iter()).finish();
                }
                let head = self.max / 2;
                let tail = self.max - head;
                let mut list = f.debug_list();
                list.entries(self.v.iter().take(head));
                list.entry(&format_args!(".. (len={n}) .."));
                list.entries(self.v.iter().skip(n - tail));
                list.finish()
            }
        }
        fn pv<T: std::fmt::Debug>(v: &[T]) -> Preview<'_, T> {
            Preview { v, max: 64 }
        }

        f.debug_struct("KluNumeric")
            .field("n", &self.n)
            .field("nblocks", &self.nblocks)
            .field("nzoff", &self.nzoff)
            .field("lnz", &self.lnz)
            .field("unz", &self.unz)
            .field("pnum", &pv(&self.pnum))
            .field("u_diag", &pv(&self.u_diag))
            .field("rs", &self.rs.as_deref().map(pv))
            .field("has_path", &self.path.is_some())
            .field("metrics", &self.metrics)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::matrix::builder::MatrixBuilder;

    // [ 4 1 . ]
    // [ 2 5 3 ]
    // [ . . 6 ]
    fn matrix() -> CscMatrix {
        let mut b = MatrixBuilder::new(3, 3);
        for (c, r, v) in [(0, 0, 4.0), (0, 1, 2.0), (1, 0, 1.0), (1, 1, 5.0), (2, 1, 3.0), (2, 2, 6.0)] {
            b.push(c, r, v).unwrap();
        }
        b.build_csc().unwrap()
    }

    fn two_by_two() -> LuBlock {
        LuBlock::from_columns(&[vec![1], vec![]], &[vec![], vec![0]])
    }

    #[test]
    fn lays_out_off_diagonal_structure() {
        let a = matrix();
        let symbolic = KluSymbolic::new(vec![0, 1, 2], vec![0, 2, 3], a.nnz(), 1).unwrap();
        let numeric = KluNumeric::from_pattern(
            &a,
            &symbolic,
            vec![0, 1, 2],
            vec![BlockLu::Lu(two_by_two()), BlockLu::Singleton],
        )
        .unwrap();

        assert_eq!(numeric.offp(), &[0, 0, 0, 1]);
        assert_eq!(numeric.offi(), &[1]);
        assert_eq!(numeric.lnz(), 4);
        assert_eq!(numeric.unz(), 4);
        assert!(numeric.workspace_is_clear());
        assert!(numeric.scale_factors().is_none());
    }

    #[test]
    fn rejects_mismatched_nzoff() {
        let a = matrix();
        let symbolic = KluSymbolic::new(vec![0, 1, 2], vec![0, 2, 3], a.nnz(), 0).unwrap();
        let err = KluNumeric::from_pattern(
            &a,
            &symbolic,
            vec![0, 1, 2],
            vec![BlockLu::Lu(two_by_two()), BlockLu::Singleton],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            KluError::OffDiagonalMismatch {
                expected: 0,
                actual: 1
            }
        ));
    }

    #[test]
    fn rejects_entry_below_block() {
        let a = matrix();
        // three singletons: (1, 0) lies below block 0
        let symbolic = KluSymbolic::new(vec![0, 1, 2], vec![0, 1, 2, 3], a.nnz(), 2).unwrap();
        let err = KluNumeric::from_pattern(
            &a,
            &symbolic,
            vec![0, 1, 2],
            vec![BlockLu::Singleton, BlockLu::Singleton, BlockLu::Singleton],
        )
        .unwrap_err();
        assert!(matches!(
            err,
            KluError::EntryOutsideBlock {
                col: 0,
                row: 1,
                block: 0
            }
        ));
    }

    #[test]
    fn rejects_non_triangular_pattern() {
        let a = matrix();
        let symbolic = KluSymbolic::new(vec![0, 1, 2], vec![0, 2, 3], a.nnz(), 1).unwrap();
        let bad = LuBlock::from_columns(&[vec![1], vec![]], &[vec![0], vec![0]]);
        let err = KluNumeric::from_pattern(
            &a,
            &symbolic,
            vec![0, 1, 2],
            vec![BlockLu::Lu(bad), BlockLu::Singleton],
        )
        .unwrap_err();
        assert!(matches!(err, KluError::InvalidBlockPattern { block: 0, .. }));

        let err = KluNumeric::from_pattern(
            &a,
            &symbolic,
            vec![0, 1, 2],
            vec![BlockLu::Singleton, BlockLu::Singleton],
        )
        .unwrap_err();
        assert!(matches!(err, KluError::InvalidBlockPattern { block: 0, .. }));
    }
}
