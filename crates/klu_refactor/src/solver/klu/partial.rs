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
        BlockLu, FactorizationPath, KluConfig, KluError, KluNumeric, KluResult, KluStatus,
        KluSymbolic, PathError, ReplayEntry,
        column::{ColumnEntry, ColumnReader, factor_column},
        scale::{
            PermuteDirection, ScaleOrder, permute_scale_factors, resolve_scale_factors, scaled,
        },
        status::PivotSite,
    },
    matrix::csc::CscMatrix,
};

/// Refactor only the columns named by the attached [`FactorizationPath`].
///
/// Off-diagonal entries are copied from the path's replay list instead of
/// rescanning columns. Columns, blocks and off-diagonal slots the path does not
/// name keep their previous values, so the result equals a full [`refactor`]
/// only if the path covers everything the change touched.
///
/// Returns the same statuses as the full refactorization, plus
/// [`KluError::PathInvalid`] when no usable path is attached.
///
/// [`refactor`]: crate::solver::klu::refactor
pub fn refactor_along_path(
    a: &CscMatrix,
    symbolic: &KluSymbolic,
    numeric: &mut KluNumeric,
    config: &KluConfig,
) -> KluResult<KluStatus> {
    let mut config = *config;
    config.validate()?;

    if let Err(err) = check_path(a, symbolic, numeric) {
        numeric.metrics.status = err.status();
        return Err(err);
    }
    numeric.reset_metrics();

    if let Some(path) = numeric.path.as_ref() {
        debug!(
            columns = path.columns().len(),
            variable_blocks = path.variable_blocks().len(),
            replay = path.replay().len(),
            "refactor along path"
        );
    }

    let mut order = ScaleOrder::Unscaled;
    let result = refactor_path_blocks(a, symbolic, numeric, &config, &mut order);

    // back to pivotal row order
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
            debug!(status = ?numeric.metrics.status, "refactor along path done");
            Ok(numeric.metrics.status)
        }
        Err(err) => {
            numeric.work.fill(0.0);
            numeric.metrics.status = err.status();
            debug!(%err, "refactor along path stopped");
            Err(err)
        }
    }
}

fn check_path(a: &CscMatrix, symbolic: &KluSymbolic, numeric: &KluNumeric) -> KluResult<()> {
    numeric.check_against(a, symbolic)?;
    let path = numeric.path.as_ref().ok_or(PathError::Missing)?;
    path.check_fingerprint(numeric.n, &numeric.block_boundaries, numeric.nzoff)?;
    path.replay().check_sources(a.nnz())?;
    Ok(())
}

fn refactor_path_blocks(
    a: &CscMatrix,
    symbolic: &KluSymbolic,
    numeric: &mut KluNumeric,
    config: &KluConfig,
    order: &mut ScaleOrder,
) -> KluResult<()> {
    *order = resolve_scale_factors(a, &mut numeric.rs, symbolic.n, config, false)?;

    let KluNumeric {
        pnum,
        pinv,
        rs,
        work,
        blocks,
        u_diag,
        offx,
        path,
        metrics,
        ..
    } = numeric;

    // entries are divided by the factor of their original row
    if *order == ScaleOrder::Pivotal
        && let Some(rs) = rs.as_mut()
    {
        permute_scale_factors(rs, pnum, pinv, work, PermuteDirection::Backward);
        *order = ScaleOrder::Original;
    }
    let scaled_mode = *order != ScaleOrder::Unscaled;

    // clear workspace X
    work.fill(0.0);

    let path: &FactorizationPath = path.as_ref().ok_or(PathError::Missing)?;
    let rs = rs.as_deref();

    // assemble off-diagonal blocks
    for &ReplayEntry { source, slot } in path.replay().entries() {
        let oldrow = a.row_index(source);
        if oldrow >= symbolic.n {
            return Err(KluError::InvalidRowIndex {
                col: a.column_pointers.partition_point(|&p| p <= source) - 1,
                row: oldrow,
                n: symbolic.n,
            });
        }
        offx[slot] = scaled(a.value(source), rs, oldrow);
    }

    let reader = ColumnReader {
        a,
        pinv: pinv.as_slice(),
        rs,
    };

    for &block in path.variable_blocks() {
        let (k1, k2) = symbolic.block_range(block);
        trace!(block, k1, k2, "refactor variable block");

        match &mut blocks[block] {
            BlockLu::Singleton => {
                // off-diagonal entries of the column came from the replay list
                let oldcol = symbolic.column_permutation[k1];
                let mut s = 0.0;
                for entry in reader.entries(oldcol) {
                    let ColumnEntry { newrow, value, .. } = entry?;
                    if newrow == k1 {
                        s = value;
                    }
                }
                u_diag[k1] = s;
            }
            BlockLu::Lu(lu) => {
                let x = &mut work[..lu.nk];
                for &col in path.block_columns(block) {
                    let k = col - k1;

                    // scatter the in-block part of the column into workspace X
                    let oldcol = symbolic.column_permutation[col];
                    for entry in reader.entries(oldcol) {
                        let ColumnEntry { newrow, value, .. } = entry?;
                        if (k1..k2).contains(&newrow) {
                            x[newrow - k1] = value;
                        }
                    }

                    let site = PivotSite {
                        block,
                        k: col,
                        oldcol,
                    };
                    factor_column(lu, k, x, site, scaled_mode, &mut u_diag[col], metrics, config)?;
                }
            }
        }
    }

    Ok(())
}
