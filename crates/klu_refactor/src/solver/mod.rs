pub mod klu;
pub mod matrix;
pub mod utils;
