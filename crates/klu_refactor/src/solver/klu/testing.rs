//! Reference inputs for the refactorization: a block partition in natural
//! order, a no-pivoting LU pattern, the first factorization and dependency
//! paths for a set of changed columns.
//!
//! None of this does fill-reducing ordering or pivoting, so it is only meant
//! for matrices whose natural order is already stable to factor (diagonally
//! dominant systems, the fixtures under `src/solver/tests/klu`).

use crate::solver::{
    klu::{
        BlockLu, FactorizationPath, KluConfig, KluError, KluNumeric, KluResult, KluSymbolic,
        LuBlock, OffDiagonalReplay, ReplayEntry, refactor,
    },
    matrix::csc::CscMatrix,
    utils::inverse_permutation,
};

/// Block upper triangular partition of `a` without permuting it: a block ends
/// at `k` whenever no column before `k` has an entry in row `k` or below.
pub fn natural_partition(a: &CscMatrix) -> KluResult<KluSymbolic> {
    if !a.is_square() {
        return Err(KluError::DimensionMismatch {
            what: "matrix columns",
            expected: a.dim.nrows,
            actual: a.dim.ncols,
        });
    }
    let n = a.dim.ncols;

    let mut boundaries = vec![0];
    // largest row index seen in columns 0..k
    let mut reach = 0;
    for k in 0..n {
        if k > 0 && reach < k {
            boundaries.push(k);
        }
        if let Some(&max_row) = a.col(k).0.iter().max() {
            reach = reach.max(max_row);
        }
    }
    if n > 0 {
        boundaries.push(n);
    }

    let mut nzoff = 0;
    for w in boundaries.windows(2) {
        let k1 = w[0];
        for k in w[0]..w[1] {
            nzoff += a.col(k).0.iter().filter(|&&row| row < k1).count();
        }
    }

    KluSymbolic::new((0..n).collect(), boundaries, a.nnz(), nzoff)
}

/// L and U patterns of every block of `symbolic` for an LU without row
/// interchanges. Column k of U lists the earlier pivots it reaches in
/// increasing order, which is a valid elimination order.
pub fn lu_pattern(a: &CscMatrix, symbolic: &KluSymbolic) -> Vec<BlockLu> {
    let mut blocks = Vec::with_capacity(symbolic.nblocks());
    for block in 0..symbolic.nblocks() {
        let (k1, k2) = symbolic.block_range(block);
        let nk = k2 - k1;
        if nk == 1 {
            blocks.push(BlockLu::Singleton);
            continue;
        }

        let mut l_pattern: Vec<Vec<usize>> = Vec::with_capacity(nk);
        let mut u_pattern: Vec<Vec<usize>> = Vec::with_capacity(nk);
        let mut mark = vec![false; nk];
        for k in 0..nk {
            let oldcol = symbolic.column_permutation()[k1 + k];
            for &row in a.col(oldcol).0 {
                if (k1..k2).contains(&row) {
                    mark[row - k1] = true;
                }
            }
            // fill reaches later pivots through L, so scan in order
            let mut u = Vec::new();
            for j in 0..k {
                if mark[j] {
                    u.push(j);
                    for &i in &l_pattern[j] {
                        mark[i] = true;
                    }
                }
            }
            let l = (k + 1..nk).filter(|&i| mark[i]).collect();
            mark.fill(false);
            u_pattern.push(u);
            l_pattern.push(l);
        }
        blocks.push(BlockLu::Lu(LuBlock::from_columns(&l_pattern, &u_pattern)));
    }
    blocks
}

/// Partition, lay out and numerically factor `a` in natural order.
///
/// A zero or tiny pivot that `config` lets through still returns `Ok`; check
/// `numeric.metrics()`.
pub fn factor(a: &CscMatrix, config: &KluConfig) -> KluResult<(KluSymbolic, KluNumeric)> {
    let symbolic = natural_partition(a)?;
    let blocks = lu_pattern(a, &symbolic);
    let mut numeric = KluNumeric::from_pattern(a, &symbolic, (0..symbolic.n()).collect(), blocks)?;
    refactor(a, &symbolic, &mut numeric, config)?;
    Ok((symbolic, numeric))
}

/// Columns of `numeric` that must be re-eliminated when the values of the
/// original columns in `changed` change, and the off-diagonal entries of
/// those columns.
///
/// A column is on the path if it changed or if its U pattern reaches a column
/// on the path. Blocks never reach each other, so other blocks are not visited.
pub fn factorization_path(
    a: &CscMatrix,
    symbolic: &KluSymbolic,
    numeric: &KluNumeric,
    changed: &[usize],
) -> KluResult<FactorizationPath> {
    numeric.check_against(a, symbolic)?;
    let n = symbolic.n();

    let mut qinv = vec![0; n];
    inverse_permutation(symbolic.column_permutation(), &mut qinv);
    let mut is_changed = vec![false; n];
    for &col in changed {
        if col >= n {
            return Err(KluError::DimensionMismatch {
                what: "changed column",
                expected: n,
                actual: col,
            });
        }
        is_changed[qinv[col]] = true;
    }

    let mut on_path = vec![false; n];
    let mut columns = Vec::new();
    let mut block_offsets = vec![0];
    let mut variable_blocks = Vec::new();
    for block in 0..symbolic.nblocks() {
        let (k1, k2) = symbolic.block_range(block);
        let start = columns.len();
        match numeric.block(block) {
            BlockLu::Singleton => {
                if is_changed[k1] {
                    on_path[k1] = true;
                    columns.push(k1);
                }
            }
            BlockLu::Lu(lu) => {
                for k in k1..k2 {
                    let reached = lu.u_column(k - k1).0.iter().any(|&j| on_path[k1 + j]);
                    if is_changed[k] || reached {
                        on_path[k] = true;
                        columns.push(k);
                    }
                }
            }
        }
        if columns.len() > start {
            variable_blocks.push(block);
        }
        block_offsets.push(columns.len());
    }

    // off-diagonal entries of changed columns, in the order the full scan stores them
    let mut entries = Vec::new();
    for k in (0..n).filter(|&k| is_changed[k]) {
        let (k1, _) = symbolic.block_range(symbolic.block_of(k));
        let oldcol = symbolic.column_permutation()[k];
        let mut slot = numeric.offp()[k];
        for p in a.col_start(oldcol)..a.col_end(oldcol) {
            if numeric.pinv()[a.row_index(p)] < k1 {
                entries.push(ReplayEntry { source: p, slot });
                slot += 1;
            }
        }
    }

    Ok(FactorizationPath::new(
        symbolic,
        columns,
        block_offsets,
        variable_blocks,
        OffDiagonalReplay::new(entries),
    )?)
}
