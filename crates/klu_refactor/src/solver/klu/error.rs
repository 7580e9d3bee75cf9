// SPDX-License-Identifier: LGPL-2.1-or-later
//
// Structured errors for the block-triangular LU refactorization.

use crate::solver::{klu::status::KluStatus, matrix::error::CscError};

#[derive(Debug, thiserror::Error)]
pub enum KluError {
    // --- Handles / shapes ---
    #[error("numeric factors do not belong to this partition: {reason}")]
    InvalidNumeric { reason: &'static str },

    #[error("invalid block partition: {reason}")]
    InvalidPartition { reason: &'static str },

    #[error("{what} has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("invalid matrix: {0}")]
    Csc(#[from] CscError),

    // --- Resources ---
    #[error("out of memory while allocating {context}")]
    OutOfMemory { context: &'static str },

    // --- Path ---
    #[error("invalid factorization path: {0}")]
    PathInvalid(#[from] PathError),

    // --- Pattern ---
    #[error("row index {row} out of range in column {col} (n={n})")]
    InvalidRowIndex { col: usize, row: usize, n: usize },

    #[error("entry in row {row} of column {col} lies below block {block}")]
    EntryOutsideBlock { col: usize, row: usize, block: usize },

    #[error("pattern for block {block} is invalid: {reason}")]
    InvalidBlockPattern { block: usize, reason: &'static str },

    #[error("off-diagonal entry count mismatch: expected {expected}, found {actual}")]
    OffDiagonalMismatch { expected: usize, actual: usize },

    #[error("off-diagonal slot {slot} belongs to row {expected}, column scan found row {actual}")]
    OffDiagonalRowMismatch {
        slot: usize,
        expected: usize,
        actual: usize,
    },

    // --- Numerical ---
    #[error("singular matrix: zero pivot at column {rank} (original column {col}) in block {block}")]
    Singular { block: usize, rank: usize, col: usize },

    #[error("pivot {pivot:e} at column {rank} (original column {col}) in block {block} is below tolerance")]
    PivotFault {
        block: usize,
        rank: usize,
        col: usize,
        pivot: f64,
    },
}

/// Reasons a [`FactorizationPath`](crate::solver::klu::FactorizationPath) cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("no factorization path attached")]
    Missing,

    #[error("path was built for another partition (n={path_n}, nblocks={path_nblocks}, nzoff={path_nzoff})")]
    Stale {
        path_n: usize,
        path_nblocks: usize,
        path_nzoff: usize,
    },

    #[error("block offsets must have nblocks+1 = {expected} nondecreasing entries ending at {len}")]
    InvalidBlockOffsets { expected: usize, len: usize },

    #[error("path column {column} does not belong to block {block}")]
    ColumnOutsideBlock { column: usize, block: usize },

    #[error("variable block {block} out of range (nblocks={nblocks})")]
    BlockOutOfRange { block: usize, nblocks: usize },

    #[error("replay destination slot {slot} out of range (nzoff={nzoff})")]
    SlotOutOfRange { slot: usize, nzoff: usize },

    #[error("replay source entry {source_entry} out of range (nnz={nnz})")]
    SourceOutOfRange { source_entry: usize, nnz: usize },
}

pub type KluResult<T> = Result<T, KluError>;

impl KluError {
    /// Status code recorded for this error.
    pub fn status(&self) -> KluStatus {
        match self {
            KluError::Singular { .. } => KluStatus::Singular,
            KluError::PivotFault { .. } => KluStatus::PivotFault,
            KluError::OutOfMemory { .. } => KluStatus::OutOfMemory,
            KluError::PathInvalid(_) => KluStatus::PathInvalid,
            _ => KluStatus::Invalid,
        }
    }
}
