// SPDX-License-Identifier: LGPL-2.1-or-later
//
// This module is based on the SuiteSparse KLU implementation by Timothy A. Davis
// and Ekanathan Palamadai.
//
// KLU, Copyright (c) 2004-2024, University of Florida.  All Rights Reserved.
// Authors: Timothy A. Davis and Ekanathan Palamadai.
//
// Modifications/porting for this project:
// Copyright (c) 2025 Ido Ben Amram

mod column;
mod error;
mod numeric;
mod partial;
mod path;
mod refactor;
mod scale;
mod status;
mod symbolic;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{KluError, KluResult, PathError};
pub use numeric::{BlockLu, KluNumeric, KluNumericMetrics, LuBlock};
pub use partial::refactor_along_path;
pub use path::{FactorizationPath, OffDiagonalReplay, ReplayEntry};
pub use refactor::{refactor, refactor_from};
pub use scale::{PermuteDirection, permute_scale_factors, scale};
pub use status::KluStatus;
pub use symbolic::KluSymbolic;

/// Row scaling applied while refactoring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KluScale {
    /// check row indices of the input, but do not scale
    Validate,
    /// divide each row by the sum of its absolute values
    Sum,
    /// divide each row by its largest absolute value
    Max,
}

impl KluScale {
    /// True if this mode produces scale factors.
    pub fn scales(self) -> bool {
        !matches!(self, KluScale::Validate)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct KluConfig {
    // `None` neither scales nor checks the input matrix
    pub scale: Option<KluScale>,
    // how to handle a zero pivot:
    // FALSE: keep going.  U(k,k) is stored as zero and the L column is divided
    //   by it, so the factors hold inf/nan.  Useful to find the numerical rank.
    // TRUE: stop at the first zero pivot.  The numeric object is left
    //   partially refactored and must be refactored again before a solve.
    pub halt_if_singular: bool,
    // same as above, for pivots that are nonzero but smaller than
    // `pivot_tol_fail` (only checked when rows are scaled)
    pub halt_if_pivot_fails: bool,
    pub pivot_tol_fail: f64,
}

impl Default for KluConfig {
    fn default() -> Self {
        Self {
            scale: Some(KluScale::Max),
            halt_if_singular: true,
            halt_if_pivot_fails: true,
            pivot_tol_fail: 1e-10,
        }
    }
}

impl KluConfig {
    /// Clamp out-of-range settings in place.
    pub fn validate(&mut self) -> KluResult<()> {
        // NaN compares false, so it is clamped as well
        if !(self.pivot_tol_fail >= 0.0) {
            self.pivot_tol_fail = 0.0;
        }

        Ok(())
    }

    /// True if row scale factors are computed and applied.
    pub fn scales(&self) -> bool {
        self.scale.is_some_and(KluScale::scales)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_clamps_tolerance() {
        let mut config = KluConfig {
            pivot_tol_fail: f64::NAN,
            ..Default::default()
        };
        config.validate().unwrap();
        assert_eq!(config.pivot_tol_fail, 0.0);

        config.pivot_tol_fail = -1.0;
        config.validate().unwrap();
        assert_eq!(config.pivot_tol_fail, 0.0);

        config.pivot_tol_fail = 1e-8;
        config.validate().unwrap();
        assert_eq!(config.pivot_tol_fail, 1e-8);
    }

    #[test]
    fn scaling_modes() {
        let mut config = KluConfig::default();
        assert!(config.scales());
        config.scale = Some(KluScale::Validate);
        assert!(!config.scales());
        config.scale = None;
        assert!(!config.scales());
    }
}
