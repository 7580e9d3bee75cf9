//! Numeric refactorization of block-triangular sparse LU factors.
//!
//! Given a factorization whose block partition, pivot order and L/U pattern are
//! fixed, [`solver::klu::refactor_from`] recomputes every column from a starting
//! column on, while [`solver::klu::refactor_along_path`] recomputes only the
//! columns and off-diagonal entries named by a precomputed
//! [`solver::klu::FactorizationPath`].

pub mod solver;
