use thiserror::Error;

#[derive(Debug, Error)]
pub enum MatrixError {
    #[error(transparent)]
    Csc(#[from] CscError),
    #[error(transparent)]
    MatrixMarket(#[from] MatrixMarketError),
}

#[derive(Debug, Error)]
pub enum CscError {
    #[error("out of bounds index: {index} (max: {max})")]
    OutOfBoundsIndex { index: usize, max: usize },

    #[error("invalid column pointers length: {expected} (actual: {actual})")]
    InvalidColumnPointersLength { expected: usize, actual: usize },

    #[error("invalid column pointers: {index} (expected: {expected}, actual: {actual})")]
    InvalidColumnPointers {
        index: usize,
        expected: usize,
        actual: usize,
    },

    #[error("row indices values length mismatch: {values} (actual: {row_indices})")]
    RowIndicesValuesLengthMismatch { values: usize, row_indices: usize },

    #[error("rows not strictly increasing: {index} (expected: {expected}, actual: {actual})")]
    RowsNotStrictlyIncreasing {
        index: usize,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug, Error)]
pub enum MatrixMarketError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid banner: {0}")]
    InvalidBanner(String),

    #[error("unsupported matrix type: {0}")]
    UnsupportedType(String),

    #[error("invalid size line: {0}")]
    InvalidSizeLine(String),

    #[error("invalid entry at line {line}: {msg}")]
    InvalidEntry { line: usize, msg: String },

    #[error("entry count mismatch: expected {expected}, read {actual}")]
    EntryCountMismatch { expected: usize, actual: usize },
}
