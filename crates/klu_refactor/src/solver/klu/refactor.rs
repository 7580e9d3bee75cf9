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

use tracing::{debug, trace};

use crate::solver::{
    klu::{
        BlockLu, KluConfig, KluError, KluNumeric, KluResult, KluStatus, KluSymbolic,
        column::{ColumnEntry, ColumnReader, OffDiagonalCursor, factor_column},
        scale::{PermuteDirection, ScaleOrder, permute_scale_factors, resolve_scale_factors},
        status::PivotSite,
    },
    matrix::csc::CscMatrix,
};

/// Refactor every column of `a` into the existing factors of `numeric`, keeping
/// the pivot order and the L/U patterns of the first factorization.
pub fn refactor(
    a: &CscMatrix,
    symbolic: &KluSymbolic,
    numeric: &mut KluNumeric,
    config: &KluConfig,
) -> KluResult<KluStatus> {
    refactor_from(a, symbolic, numeric, 0, config)
}

/// Like [`refactor`], but columns of multi-column blocks before `start_column`
/// keep their current L, U and diagonal values.
///
/// Singleton blocks and off-diagonal entries are always refreshed. A singleton
/// takes its diagonal entry as is, without the zero or tiny pivot checks. On `Ok` the
/// returned status is `Ok`, or `Singular` / `PivotFault` if such a pivot was
/// accepted because the matching halt flag is off. A halted call returns the
/// error and leaves the factors partially updated.
pub fn refactor_from(
    a: &CscMatrix,
    symbolic: &KluSymbolic,
    numeric: &mut KluNumeric,
    start_column: usize,
    config: &KluConfig,
) -> KluResult<KluStatus> {
    let mut config = *config;
    config.validate()?;

    if let Err(err) = numeric.check_against(a, symbolic) {
        numeric.metrics.status = err.status();
        return Err(err);
    }
    numeric.reset_metrics();

    debug!(
        n = symbolic.n,
        nblocks = symbolic.nblocks,
        start_column,
        "refactor"
    );

    let mut order = ScaleOrder::Unscaled;
    let result = refactor_blocks(a, symbolic, numeric, start_column, &config, &mut order);

    // leave the scale factors in pivotal row order, even on a halted call
    if order == ScaleOrder::Original
        && let Some(rs) = numeric.rs.as_mut()
    {
        permute_scale_factors(
            rs,
            &numeric.pnum,
            &numeric.pinv,
            &mut numeric.work,
            PermuteDirection::Forward,
        );
    }

    match result {
        Ok(()) => {
            debug!(status = ?numeric.metrics.status, "refactor done");
            Ok(numeric.metrics.status)
        }
        Err(err) => {
            numeric.work.fill(0.0);
            numeric.metrics.status = err.status();
            debug!(%err, "refactor stopped");
            Err(err)
        }
    }
}

fn refactor_blocks(
    a: &CscMatrix,
    symbolic: &KluSymbolic,
    numeric: &mut KluNumeric,
    start_column: usize,
    config: &KluConfig,
    order: &mut ScaleOrder,
) -> KluResult<()> {
    *order = resolve_scale_factors(a, &mut numeric.rs, symbolic.n, config, true)?;
    let scaled = *order != ScaleOrder::Unscaled;

    let KluNumeric {
        pinv,
        rs,
        work,
        blocks,
        u_diag,
        offi,
        offx,
        metrics,
        ..
    } = numeric;

    // clear workspace X
    work.fill(0.0);

    let reader = ColumnReader {
        a,
        pinv: pinv.as_slice(),
        rs: rs.as_deref(),
    };
    let mut off = OffDiagonalCursor::new(offi, offx);

    for (block, lu) in blocks.iter_mut().enumerate() {
        let (k1, k2) = symbolic.block_range(block);
        let outside = |oldcol: usize, oldrow: usize| KluError::EntryOutsideBlock {
            col: oldcol,
            row: oldrow,
            block,
        };
        trace!(block, k1, k2, "refactor block");

        match lu {
            BlockLu::Singleton => {
                let oldcol = symbolic.column_permutation[k1];
                let mut s = 0.0;
                for entry in reader.entries(oldcol) {
                    let ColumnEntry {
                        oldrow,
                        newrow,
                        value,
                    } = entry?;
                    if newrow < k1 {
                        off.push(newrow, value)?;
                    } else if newrow == k1 {
                        s = value;
                    } else {
                        return Err(outside(oldcol, oldrow));
                    }
                }
                // stored as is, without a pivot check
                u_diag[k1] = s;
            }
            BlockLu::Lu(lu) => {
                let first = start_column.clamp(k1, k2) - k1;

                // columns before the start keep their factors; only their
                // off-diagonal entries are refreshed
                for k in 0..first {
                    let oldcol = symbolic.column_permutation[k1 + k];
                    for entry in reader.entries(oldcol) {
                        let ColumnEntry {
                            oldrow,
                            newrow,
                            value,
                        } = entry?;
                        if newrow < k1 {
                            off.push(newrow, value)?;
                        } else if newrow >= k2 {
                            return Err(outside(oldcol, oldrow));
                        }
                    }
                }

                let x = &mut work[..lu.nk];
                for k in first..lu.nk {
                    // scatter kth column of the block into workspace X
                    let oldcol = symbolic.column_permutation[k1 + k];
                    for entry in reader.entries(oldcol) {
                        let ColumnEntry {
                            oldrow,
                            newrow,
                            value,
                        } = entry?;
                        if newrow < k1 {
                            off.push(newrow, value)?;
                        } else if newrow < k2 {
                            x[newrow - k1] = value;
                        } else {
                            return Err(outside(oldcol, oldrow));
                        }
                    }

                    let site = PivotSite {
                        block,
                        k: k1 + k,
                        oldcol,
                    };
                    factor_column(lu, k, x, site, scaled, &mut u_diag[k1 + k], metrics, config)?;
                }
            }
        }
    }

    off.finish()
}
