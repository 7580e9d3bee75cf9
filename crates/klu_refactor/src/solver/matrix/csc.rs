use crate::solver::matrix::{Dim, error::CscError};

/// Compressed Sparse Column matrix
/// - column pointers are the indices of the start and end of each column
/// - row indices are the indices of the rows of the non zero values
/// - values are the non zero values
///
/// Explicit zeros are kept: a refactorization needs the same pattern every
/// time, even when a value happens to be zero.
#[derive(Debug, Clone, PartialEq)]
pub struct CscMatrix {
    pub dim: Dim,
    /// Column pointers, len = ncols + 1
    pub column_pointers: Vec<usize>,
    /// Row indices, len = nnz
    pub row_indices: Vec<usize>,
    /// Nonzero values, len = nnz
    pub values: Vec<f64>,
}

impl CscMatrix {
    /// Wrap raw CSC arrays, checking only the shape of the pointer array.
    ///
    /// Rows inside a column may be unsorted; use [`CscMatrix::check_invariants`]
    /// for the canonical form produced by the builder.
    pub fn new(
        nrows: usize,
        ncols: usize,
        column_pointers: Vec<usize>,
        row_indices: Vec<usize>,
        values: Vec<f64>,
    ) -> Result<Self, CscError> {
        let a = Self {
            dim: Dim { nrows, ncols },
            column_pointers,
            row_indices,
            values,
        };
        a.check_shape()?;
        Ok(a)
    }

    /// Array lengths and column pointers: everything indexing needs, without
    /// looking at the row indices themselves.
    pub fn check_shape(&self) -> Result<(), CscError> {
        let ncols = self.dim.ncols;
        let column_pointers = &self.column_pointers;
        if column_pointers.len() != ncols + 1 {
            return Err(CscError::InvalidColumnPointersLength {
                expected: ncols + 1,
                actual: column_pointers.len(),
            });
        }
        if self.row_indices.len() != self.values.len() {
            return Err(CscError::RowIndicesValuesLengthMismatch {
                values: self.values.len(),
                row_indices: self.row_indices.len(),
            });
        }
        if column_pointers[0] != 0 {
            return Err(CscError::InvalidColumnPointers {
                index: 0,
                expected: 0,
                actual: column_pointers[0],
            });
        }
        for j in 0..ncols {
            if column_pointers[j] > column_pointers[j + 1] {
                return Err(CscError::InvalidColumnPointers {
                    index: j + 1,
                    expected: column_pointers[j],
                    actual: column_pointers[j + 1],
                });
            }
        }
        if column_pointers[ncols] != self.row_indices.len() {
            return Err(CscError::InvalidColumnPointers {
                index: ncols,
                expected: self.row_indices.len(),
                actual: column_pointers[ncols],
            });
        }
        Ok(())
    }

    /// number of non zero values
    pub fn nnz(&self) -> usize {
        self.row_indices.len()
    }

    pub fn is_square(&self) -> bool {
        self.dim.nrows == self.dim.ncols
    }

    #[inline]
    pub fn col_start(&self, j: usize) -> usize {
        self.column_pointers[j]
    }

    #[inline]
    pub fn col_end(&self, j: usize) -> usize {
        self.column_pointers[j + 1]
    }

    #[inline]
    pub fn row_index(&self, p: usize) -> usize {
        self.row_indices[p]
    }

    #[inline]
    pub fn value(&self, p: usize) -> f64 {
        self.values[p]
    }

    pub fn check_invariants(&self) -> Result<(), CscError> {
        if self.column_pointers.len() != self.dim.ncols + 1 {
            return Err(CscError::InvalidColumnPointersLength {
                expected: self.dim.ncols + 1,
                actual: self.column_pointers.len(),
            });
        }
        let first = self.column_pointers[0];
        if first != 0 {
            return Err(CscError::InvalidColumnPointers {
                index: 0,
                expected: 0,
                actual: first,
            });
        }
        let last = self.column_pointers[self.dim.ncols];
        if last != self.nnz() {
            return Err(CscError::InvalidColumnPointers {
                index: self.dim.ncols,
                expected: self.nnz(),
                actual: last,
            });
        }
        if self.row_indices.len() != self.values.len() {
            return Err(CscError::RowIndicesValuesLengthMismatch {
                values: self.values.len(),
                row_indices: self.row_indices.len(),
            });
        }
        // per-column sorted & in-range
        for j in 0..self.dim.ncols {
            let (start, end) = (self.column_pointers[j], self.column_pointers[j + 1]);
            if start > end || end > self.nnz() {
                return Err(CscError::InvalidColumnPointers {
                    index: j,
                    expected: start,
                    actual: end,
                });
            }
            let mut prev = None;
            for &r in &self.row_indices[start..end] {
                if r >= self.dim.nrows {
                    return Err(CscError::OutOfBoundsIndex {
                        index: r,
                        max: self.dim.nrows,
                    });
                }
                if let Some(p) = prev
                    && r <= p
                {
                    return Err(CscError::RowsNotStrictlyIncreasing {
                        index: j,
                        expected: p,
                        actual: r,
                    });
                }
                prev = Some(r);
            }
        }
        Ok(())
    }

    /// Return (row_indices, values) slice for column j
    pub fn col(&self, j: usize) -> (&[usize], &[f64]) {
        let (s, e) = (self.column_pointers[j], self.column_pointers[j + 1]);
        (&self.row_indices[s..e], &self.values[s..e])
    }

    /// Values of column j, for in-place updates that keep the pattern.
    pub fn col_values_mut(&mut self, j: usize) -> &mut [f64] {
        let (s, e) = (self.column_pointers[j], self.column_pointers[j + 1]);
        &mut self.values[s..e]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::matrix::builder::MatrixBuilder;

    #[test]
    fn build_and_access() {
        // A = [ 10  0  3
        //       0 20  0
        //       2  0 35 ]
        let mut b = MatrixBuilder::new(3, 3);
        b.push(0, 0, 10.0).unwrap();
        b.push(2, 0, 3.0).unwrap();
        b.push(1, 1, 20.0).unwrap();
        b.push(0, 2, 2.0).unwrap();
        b.push(2, 2, 30.0).unwrap();
        // duplicate (2,2) is summed
        b.push(2, 2, 5.0).unwrap();

        let a = b.build_csc().unwrap();
        assert_eq!(a.nnz(), 5);

        let (r0, v0) = a.col(0);
        assert_eq!(r0, &[0, 2]);
        assert_eq!(v0, &[10.0, 2.0]);

        let (r2, v2) = a.col(2);
        assert_eq!(r2, &[0, 2]);
        assert_eq!(v2, &[3.0, 35.0]);

        assert!(a.check_invariants().is_ok());
    }

    #[test]
    fn new_rejects_bad_pointers() {
        let err = CscMatrix::new(2, 2, vec![0, 2, 1], vec![0, 1], vec![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, CscError::InvalidColumnPointers { index: 2, .. }));

        let err = CscMatrix::new(2, 2, vec![0, 1], vec![0], vec![1.0]).unwrap_err();
        assert!(matches!(
            err,
            CscError::InvalidColumnPointersLength {
                expected: 3,
                actual: 2
            }
        ));
    }

    #[test]
    fn check_shape_catches_edited_arrays() {
        let mut a = CscMatrix::new(2, 2, vec![0, 1, 2], vec![0, 1], vec![1.0, 2.0]).unwrap();
        assert!(a.check_shape().is_ok());

        a.values.pop();
        assert!(matches!(
            a.check_shape(),
            Err(CscError::RowIndicesValuesLengthMismatch {
                values: 1,
                row_indices: 2
            })
        ));
    }

    #[test]
    fn new_accepts_unsorted_rows() {
        let a = CscMatrix::new(2, 1, vec![0, 2], vec![1, 0], vec![1.0, 2.0]).unwrap();
        assert!(matches!(
            a.check_invariants(),
            Err(CscError::RowsNotStrictlyIncreasing { index: 0, .. })
        ));
    }
}
