use crate::solver::matrix::{Dim, csc::CscMatrix, error::CscError};

/// Builder from triplets (COO -> canonical CSC).
///
/// Usage:
///   let mut b = MatrixBuilder::new(nrows, ncols);
///   b.reserve(nnz_guess);
///   b.push(j, i, v); ...
///   let a = b.build_csc()?;  // sorted rows per col, duplicates summed, zeros kept
#[derive(Debug)]
pub struct MatrixBuilder {
    dim: Dim,
    /// (column, row, value) in insertion order
    entries: Vec<(usize, usize, f64)>,
}

impl MatrixBuilder {
    pub fn new(nrows: usize, ncols: usize) -> Self {
        Self {
            dim: Dim { nrows, ncols },
            entries: Vec::new(),
        }
    }

    pub fn reserve(&mut self, nnz: usize) {
        self.entries.reserve(nnz);
    }

    /// push a COO (column, row, value) tuple
    pub fn push(&mut self, column: usize, row: usize, value: f64) -> Result<(), CscError> {
        if column >= self.dim.ncols {
            return Err(CscError::OutOfBoundsIndex {
                index: column,
                max: self.dim.ncols,
            });
        }
        if row >= self.dim.nrows {
            return Err(CscError::OutOfBoundsIndex {
                index: row,
                max: self.dim.nrows,
            });
        }
        self.entries.push((column, row, value));
        Ok(())
    }

    pub fn build_csc(mut self) -> Result<CscMatrix, CscError> {
        let n = self.dim.ncols;

        // stable, so duplicates are summed in insertion order
        self.entries.sort_by_key(|&(c, r, _)| (c, r));

        let mut combined: Vec<(usize, usize, f64)> = Vec::with_capacity(self.entries.len());
        for (c, r, v) in self.entries {
            match combined.last_mut() {
                Some((lc, lr, acc)) if *lc == c && *lr == r => *acc += v,
                _ => combined.push((c, r, v)),
            }
        }

        // counting pass then placement pass
        let mut column_pointers = vec![0usize; n + 1];
        for &(c, _, _) in &combined {
            column_pointers[c + 1] += 1;
        }
        for j in 0..n {
            column_pointers[j + 1] += column_pointers[j];
        }

        let (row_indices, values) = combined.into_iter().map(|(_, r, v)| (r, v)).unzip();

        let a = CscMatrix {
            dim: self.dim,
            column_pointers,
            row_indices,
            values,
        };
        debug_assert!(a.check_invariants().is_ok());
        Ok(a)
    }
}
