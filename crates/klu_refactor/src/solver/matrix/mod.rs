pub mod builder;
pub mod csc;
pub mod error;
pub mod mtx;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dim {
    pub nrows: usize,
    pub ncols: usize,
}
