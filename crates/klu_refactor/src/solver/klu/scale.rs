// SPDX-License-Identifier: LGPL-2.1-or-later
//
// This file is based on the SuiteSparse KLU implementation by Timothy A. Davis
// and Ekanathan Palamadai.
//
// KLU, Copyright (c) 2004-2024, University of Florida.  All Rights Reserved.
// Authors: Timothy A. Davis and Ekanathan Palamadai.
//
// Modifications/porting for this project:
// Copyright (c) 2025 Ido Ben Amram

use tracing::trace;

use crate::solver::{
    klu::{KluConfig, KluError, KluResult, KluScale},
    matrix::csc::CscMatrix,
};

/// Compute row scale factors of `a` into `rs` (indexed by original row), and
/// check that every row index is in range. Duplicates are not checked.
///
/// With `KluScale::Validate` only the check is done and `rs` is ignored.
pub fn scale(a: &CscMatrix, rs: Option<&mut [f64]>, scale: Option<KluScale>) -> KluResult<()> {
    let n = a.dim.nrows;
    let ncols = a.dim.ncols;

    let Some(scale) = scale else {
        return Ok(());
    };

    let mut rs = match rs {
        Some(rs) if scale.scales() => {
            debug_assert_eq!(rs.len(), n);
            rs.fill(0.0);
            Some(rs)
        }
        _ => None,
    };

    for col in 0..ncols {
        for p in a.col_start(col)..a.col_end(col) {
            let row = a.row_index(p);
            if row >= n {
                return Err(KluError::InvalidRowIndex { col, row, n });
            }
            if let Some(rs) = rs.as_deref_mut() {
                let val = a.value(p).abs();
                match scale {
                    KluScale::Sum => rs[row] += val,
                    KluScale::Max => rs[row] = val.max(rs[row]),
                    KluScale::Validate => {}
                }
            }
        }
    }

    // do not scale empty rows
    if let Some(rs) = rs {
        for r in rs.iter_mut() {
            if *r == 0.0 {
                *r = 1.0;
            }
        }
    }

    Ok(())
}

/// `value / rs[oldrow]`, or `value` when unscaled.
#[inline]
pub(crate) fn scaled(value: f64, rs: Option<&[f64]>, oldrow: usize) -> f64 {
    match rs {
        None => value,
        Some(rs) => value / rs[oldrow],
    }
}

/// Which row order the scale factors are in when [`resolve_scale_factors`] returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScaleOrder {
    /// no scale factors
    Unscaled,
    /// computed now from the matrix, indexed by original row
    Original,
    /// kept from the previous call, indexed by pivotal row
    Pivotal,
}

/// Make `rs` match the configured scaling mode.
///
/// Scaling on: allocate the vector if missing, and compute it from `a` if it was
/// missing or `recompute` is set. Scaling off: release the vector. With
/// `recompute` set, a `Validate` or scaling mode also checks the row indices of `a`.
pub(crate) fn resolve_scale_factors(
    a: &CscMatrix,
    rs: &mut Option<Vec<f64>>,
    n: usize,
    config: &KluConfig,
    recompute: bool,
) -> KluResult<ScaleOrder> {
    if !config.scales() {
        *rs = None;
        if recompute {
            scale(a, None, config.scale)?;
        }
        return Ok(ScaleOrder::Unscaled);
    }

    let fresh = rs.is_none();
    let factors = match rs {
        Some(factors) => factors,
        None => {
            let mut factors = Vec::new();
            factors
                .try_reserve_exact(n)
                .map_err(|_| KluError::OutOfMemory {
                    context: "row scale factors",
                })?;
            factors.resize(n, 0.0);
            rs.insert(factors)
        }
    };

    if fresh || recompute {
        trace!(fresh, "computing row scale factors");
        if let Err(err) = scale(a, Some(factors), config.scale) {
            // partially computed factors are of no use to a later call
            *rs = None;
            return Err(err);
        }
        Ok(ScaleOrder::Original)
    } else {
        Ok(ScaleOrder::Pivotal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermuteDirection {
    /// original row order -> pivotal row order: `rs'[k] = rs[pnum[k]]`
    Forward,
    /// pivotal row order -> original row order: `rs'[i] = rs[pinv[i]]`
    Backward,
}

/// Reorder scale factors between original and pivotal row order, using the
/// first `rs.len()` entries of `work` as scratch. `work` is left zeroed.
pub fn permute_scale_factors(
    rs: &mut [f64],
    pnum: &[usize],
    pinv: &[usize],
    work: &mut [f64],
    direction: PermuteDirection,
) {
    let n = rs.len();
    let perm = match direction {
        PermuteDirection::Forward => pnum,
        PermuteDirection::Backward => pinv,
    };
    let work = &mut work[..n];
    for (w, &p) in work.iter_mut().zip(perm) {
        *w = rs[p];
    }
    rs.copy_from_slice(work);
    work.fill(0.0);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::solver::{klu::KluScale, matrix::builder::MatrixBuilder};
    use rstest::rstest;

    // [ 2 -8  . ]
    // [ .  .  . ]
    // [ 1  3 -4 ]
    fn matrix() -> CscMatrix {
        let mut b = MatrixBuilder::new(3, 3);
        for (c, r, v) in [(0, 0, 2.0), (0, 2, 1.0), (1, 0, -8.0), (1, 2, 3.0), (2, 2, -4.0)] {
            b.push(c, r, v).unwrap();
        }
        b.build_csc().unwrap()
    }

    #[rstest]
    #[case(KluScale::Max, [8.0, 1.0, 4.0])]
    #[case(KluScale::Sum, [10.0, 1.0, 8.0])]
    fn computes_row_scale(#[case] mode: KluScale, #[case] expected: [f64; 3]) {
        let a = matrix();
        let mut rs = vec![-1.0; 3];
        scale(&a, Some(&mut rs), Some(mode)).unwrap();
        assert_eq!(rs, expected);
    }

    #[test]
    fn validate_only_checks_indices() {
        let mut a = matrix();
        let mut rs = vec![7.0; 3];
        scale(&a, Some(&mut rs), Some(KluScale::Validate)).unwrap();
        assert_eq!(rs, [7.0; 3]);

        a.row_indices[1] = 3;
        let err = scale(&a, None, Some(KluScale::Validate)).unwrap_err();
        assert!(matches!(err, KluError::InvalidRowIndex { col: 0, row: 3, n: 3 }));

        // off: nothing is checked
        assert!(scale(&a, None, None).is_ok());
    }

    #[test]
    fn resolve_allocates_and_releases() {
        let a = matrix();
        let mut rs = None;
        let config = KluConfig::default();

        let order = resolve_scale_factors(&a, &mut rs, 3, &config, false).unwrap();
        assert_eq!(order, ScaleOrder::Original);
        assert_eq!(rs.as_deref(), Some(&[8.0, 1.0, 4.0][..]));

        let order = resolve_scale_factors(&a, &mut rs, 3, &config, false).unwrap();
        assert_eq!(order, ScaleOrder::Pivotal);

        let off = KluConfig {
            scale: None,
            ..config
        };
        let order = resolve_scale_factors(&a, &mut rs, 3, &off, true).unwrap();
        assert_eq!(order, ScaleOrder::Unscaled);
        assert!(rs.is_none());
    }

    #[test]
    fn forward_then_backward_restores_order() {
        let pnum = [2, 0, 3, 1];
        let pinv = [1, 3, 0, 2];
        let original = [10.0, 20.0, 30.0, 40.0];
        let mut rs = original;
        let mut work = vec![0.0; 6];

        permute_scale_factors(&mut rs, &pnum, &pinv, &mut work, PermuteDirection::Forward);
        assert_eq!(rs, [30.0, 10.0, 40.0, 20.0]);
        assert!(work.iter().all(|&w| w == 0.0));

        permute_scale_factors(&mut rs, &pnum, &pinv, &mut work, PermuteDirection::Backward);
        assert_eq!(rs, original);
        assert!(work.iter().all(|&w| w == 0.0));
    }
}
