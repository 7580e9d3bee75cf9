use crate::solver::klu::{KluSymbolic, PathError};

/// One off-diagonal entry to copy: `offx[slot] = A.values[source]` (scaled if on).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReplayEntry {
    /// index into the row-index / value arrays of the input matrix
    pub source: usize,
    /// index into the off-diagonal value buffer
    pub slot: usize,
}

/// Off-diagonal entries touched by a change, in replay order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OffDiagonalReplay {
    entries: Vec<ReplayEntry>,
    // largest source index, for an O(1) check against the matrix
    max_source: Option<usize>,
}

impl OffDiagonalReplay {
    pub fn new(entries: Vec<ReplayEntry>) -> Self {
        let max_source = entries.iter().map(|e| e.source).max();
        Self {
            entries,
            max_source,
        }
    }

    pub fn entries(&self) -> &[ReplayEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn check_sources(&self, nnz: usize) -> Result<(), PathError> {
        match self.max_source {
            Some(source_entry) if source_entry >= nnz => {
                Err(PathError::SourceOutOfRange { source_entry, nnz })
            }
            _ => Ok(()),
        }
    }
}

/// Columns that must be re-eliminated after a change that keeps the pattern
/// and pivot order, grouped by block, plus the off-diagonal entries to copy.
///
/// Built once by path analysis and only read by the refactorization. Whether the
/// path covers every column and entry the change affects is the caller's
/// responsibility; anything it leaves out keeps its previous value.
#[derive(Debug, Clone)]
pub struct FactorizationPath {
    // shape of the factorization the path was computed for
    n: usize,
    nblocks: usize,
    nzoff: usize,
    block_boundaries: Vec<usize>,
    // permuted column indices, grouped by block
    columns: Vec<usize>,
    // size nblocks + 1. block b owns columns[block_offsets[b]..block_offsets[b+1]]
    block_offsets: Vec<usize>,
    variable_blocks: Vec<usize>,
    replay: OffDiagonalReplay,
}

impl FactorizationPath {
    pub fn new(
        symbolic: &KluSymbolic,
        columns: Vec<usize>,
        block_offsets: Vec<usize>,
        variable_blocks: Vec<usize>,
        replay: OffDiagonalReplay,
    ) -> Result<Self, PathError> {
        let nblocks = symbolic.nblocks;
        if block_offsets.len() != nblocks + 1
            || block_offsets.first() != Some(&0)
            || block_offsets.last() != Some(&columns.len())
            || block_offsets.windows(2).any(|w| w[0] > w[1])
        {
            return Err(PathError::InvalidBlockOffsets {
                expected: nblocks + 1,
                len: columns.len(),
            });
        }
        for block in 0..nblocks {
            let (k1, k2) = symbolic.block_range(block);
            for &column in &columns[block_offsets[block]..block_offsets[block + 1]] {
                if column < k1 || column >= k2 {
                    return Err(PathError::ColumnOutsideBlock { column, block });
                }
            }
        }
        if let Some(&block) = variable_blocks.iter().find(|&&b| b >= nblocks) {
            return Err(PathError::BlockOutOfRange { block, nblocks });
        }
        if let Some(e) = replay.entries.iter().find(|e| e.slot >= symbolic.nzoff) {
            return Err(PathError::SlotOutOfRange {
                slot: e.slot,
                nzoff: symbolic.nzoff,
            });
        }
        replay.check_sources(symbolic.nz)?;

        Ok(Self {
            n: symbolic.n,
            nblocks,
            nzoff: symbolic.nzoff,
            block_boundaries: symbolic.block_boundaries.clone(),
            columns,
            block_offsets,
            variable_blocks,
            replay,
        })
    }

    pub fn columns(&self) -> &[usize] {
        &self.columns
    }

    /// Path columns of `block`, in elimination order.
    pub fn block_columns(&self, block: usize) -> &[usize] {
        &self.columns[self.block_offsets[block]..self.block_offsets[block + 1]]
    }

    pub fn block_offsets(&self) -> &[usize] {
        &self.block_offsets
    }

    pub fn variable_blocks(&self) -> &[usize] {
        &self.variable_blocks
    }

    pub fn replay(&self) -> &OffDiagonalReplay {
        &self.replay
    }

    pub(crate) fn check_fingerprint(
        &self,
        n: usize,
        block_boundaries: &[usize],
        nzoff: usize,
    ) -> Result<(), PathError> {
        if self.n != n || self.nzoff != nzoff || self.block_boundaries != block_boundaries {
            return Err(PathError::Stale {
                path_n: self.n,
                path_nblocks: self.nblocks,
                path_nzoff: self.nzoff,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn symbolic() -> KluSymbolic {
        // blocks [0,2) [2,3) [3,5), 3 off-diagonal entries
        KluSymbolic::new(vec![0, 1, 2, 3, 4], vec![0, 2, 3, 5], 12, 3).unwrap()
    }

    #[test]
    fn accepts_well_formed_path() {
        let s = symbolic();
        let path = FactorizationPath::new(
            &s,
            vec![1, 2, 3, 4],
            vec![0, 1, 2, 4],
            vec![0, 1, 2],
            OffDiagonalReplay::new(vec![ReplayEntry { source: 11, slot: 2 }]),
        )
        .unwrap();
        assert_eq!(path.block_columns(0), &[1]);
        assert_eq!(path.block_columns(2), &[3, 4]);
        assert_eq!(path.replay().len(), 1);
        assert!(path.check_fingerprint(5, &[0, 2, 3, 5], 3).is_ok());
        assert!(matches!(
            path.check_fingerprint(5, &[0, 2, 3, 5], 4),
            Err(PathError::Stale { .. })
        ));
        // same counts, different blocks
        assert!(matches!(
            path.check_fingerprint(5, &[0, 1, 3, 5], 3),
            Err(PathError::Stale { .. })
        ));
    }

    #[test]
    fn rejects_column_outside_its_block() {
        let s = symbolic();
        let err = FactorizationPath::new(
            &s,
            vec![2],
            vec![0, 1, 1, 1],
            vec![0],
            OffDiagonalReplay::default(),
        )
        .unwrap_err();
        assert_eq!(err, PathError::ColumnOutsideBlock { column: 2, block: 0 });
    }

    #[test]
    fn rejects_bad_offsets() {
        let s = symbolic();
        let err = FactorizationPath::new(
            &s,
            vec![0, 1],
            vec![0, 2, 1, 2],
            vec![0],
            OffDiagonalReplay::default(),
        )
        .unwrap_err();
        assert!(matches!(err, PathError::InvalidBlockOffsets { .. }));
    }

    #[test]
    fn rejects_replay_slot_past_buffer() {
        let s = symbolic();
        let err = FactorizationPath::new(
            &s,
            vec![],
            vec![0, 0, 0, 0],
            vec![],
            OffDiagonalReplay::new(vec![ReplayEntry { source: 0, slot: 3 }]),
        )
        .unwrap_err();
        insta::assert_snapshot!(err.to_string(), @"replay destination slot 3 out of range (nzoff=3)");
    }

    #[test]
    fn rejects_unknown_block_and_source() {
        let s = symbolic();
        let err = FactorizationPath::new(
            &s,
            vec![],
            vec![0, 0, 0, 0],
            vec![3],
            OffDiagonalReplay::default(),
        )
        .unwrap_err();
        assert_eq!(err, PathError::BlockOutOfRange { block: 3, nblocks: 3 });

        let err = FactorizationPath::new(
            &s,
            vec![],
            vec![0, 0, 0, 0],
            vec![],
            OffDiagonalReplay::new(vec![ReplayEntry { source: 12, slot: 0 }]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            PathError::SourceOutOfRange {
                source_entry: 12,
                nnz: 12
            }
        );
    }
}
