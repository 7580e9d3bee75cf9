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

//! Column-level pieces shared by the full and the path refactorization.

use crate::solver::{
    klu::{
        KluConfig, KluError, KluNumericMetrics, KluResult, LuBlock,
        scale::scaled,
        status::{PivotSite, check_pivot},
    },
    matrix::csc::CscMatrix,
};

/// One entry of an input column, mapped to its pivotal row and scaled.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ColumnEntry {
    pub oldrow: usize,
    pub newrow: usize,
    pub value: f64,
}

/// Reads columns of the input matrix in pivotal row coordinates.
pub(crate) struct ColumnReader<'a> {
    pub a: &'a CscMatrix,
    pub pinv: &'a [usize],
    pub rs: Option<&'a [f64]>,
}

impl ColumnReader<'_> {
    pub fn entries(&self, oldcol: usize) -> impl Iterator<Item = KluResult<ColumnEntry>> + '_ {
        (self.a.col_start(oldcol)..self.a.col_end(oldcol)).map(move |p| {
            let oldrow = self.a.row_index(p);
            let newrow = *self
                .pinv
                .get(oldrow)
                .ok_or(KluError::InvalidRowIndex {
                    col: oldcol,
                    row: oldrow,
                    n: self.pinv.len(),
                })?;
            Ok(ColumnEntry {
                oldrow,
                newrow,
                value: scaled(self.a.value(p), self.rs, oldrow),
            })
        })
    }
}

/// Write position in the off-diagonal value buffer during a column scan.
pub(crate) struct OffDiagonalCursor<'a> {
    offi: &'a [usize],
    offx: &'a mut [f64],
    poff: usize,
}

impl<'a> OffDiagonalCursor<'a> {
    pub fn new(offi: &'a [usize], offx: &'a mut [f64]) -> Self {
        Self { offi, offx, poff: 0 }
    }

    pub fn push(&mut self, newrow: usize, value: f64) -> KluResult<()> {
        let (Some(slot), Some(&row)) = (self.offx.get_mut(self.poff), self.offi.get(self.poff))
        else {
            return Err(KluError::OffDiagonalMismatch {
                expected: self.offi.len(),
                actual: self.poff + 1,
            });
        };
        if row != newrow {
            return Err(KluError::OffDiagonalRowMismatch {
                slot: self.poff,
                expected: row,
                actual: newrow,
            });
        }
        *slot = value;
        self.poff += 1;
        Ok(())
    }

    /// Checks that every off-diagonal slot was written.
    pub fn finish(self) -> KluResult<()> {
        if self.poff != self.offx.len() {
            return Err(KluError::OffDiagonalMismatch {
                expected: self.offx.len(),
                actual: self.poff,
            });
        }
        Ok(())
    }
}

/// Left-looking update of column `k` of `lu` from the scattered values in `x`.
///
/// Stores the U entries of column k and returns the pivot. Every U row and the
/// diagonal are cleared in `x`; the L rows of column k are left for
/// [`store_l_column`] or [`clear_l_column`].
pub(crate) fn eliminate_column(lu: &mut LuBlock, k: usize, x: &mut [f64]) -> f64 {
    let LuBlock {
        l_ptr,
        l_rows,
        l_values,
        u_ptr,
        u_rows,
        u_values,
        ..
    } = lu;

    for up in u_ptr[k]..u_ptr[k + 1] {
        let j = u_rows[up];
        let ujk = x[j];
        x[j] = 0.0;
        u_values[up] = ujk;
        for lp in l_ptr[j]..l_ptr[j + 1] {
            x[l_rows[lp]] -= l_values[lp] * ujk;
        }
    }

    let ukk = x[k];
    x[k] = 0.0;
    ukk
}

/// Gather column `k` of L from `x`, dividing by the pivot.
pub(crate) fn store_l_column(lu: &mut LuBlock, k: usize, ukk: f64, x: &mut [f64]) {
    for lp in lu.l_ptr[k]..lu.l_ptr[k + 1] {
        let i = lu.l_rows[lp];
        lu.l_values[lp] = x[i] / ukk;
        x[i] = 0.0;
    }
}

pub(crate) fn clear_l_column(lu: &LuBlock, k: usize, x: &mut [f64]) {
    for &i in &lu.l_rows[lu.l_ptr[k]..lu.l_ptr[k + 1]] {
        x[i] = 0.0;
    }
}

/// Everything that happens to a column after its scatter: elimination, the
/// pivot check, then the L column. A halted column leaves `x` clear and its
/// diagonal and L values untouched.
#[allow(clippy::too_many_arguments)]
pub(crate) fn factor_column(
    lu: &mut LuBlock,
    k: usize,
    x: &mut [f64],
    site: PivotSite,
    scaled_mode: bool,
    ukk_out: &mut f64,
    metrics: &mut KluNumericMetrics,
    config: &KluConfig,
) -> KluResult<()> {
    let ukk = eliminate_column(lu, k, x);
    if let Err(err) = check_pivot(ukk, site, scaled_mode, metrics, config) {
        clear_l_column(lu, k, x);
        return Err(err);
    }
    *ukk_out = ukk;
    store_l_column(lu, k, ukk, x);
    Ok(())
}
