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

use tracing::warn;

use crate::solver::klu::{KluConfig, KluError, KluNumericMetrics, KluResult};

/// Outcome of the most recent refactorization.
///
/// `Singular` and `PivotFault` are also returned from calls that kept going
/// because the matching halt flag was off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KluStatus {
    #[default]
    Ok,
    /// an exact zero pivot was found
    Singular,
    /// a nonzero pivot under row scaling fell below `pivot_tol_fail`
    PivotFault,
    /// the numeric object, partition or matrix do not fit together
    Invalid,
    /// the path engine ran without a usable path
    PathInvalid,
    OutOfMemory,
}

/// Where the pivot being checked lives.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PivotSite {
    pub block: usize,
    /// column in the permuted system
    pub k: usize,
    /// column in the input matrix
    pub oldcol: usize,
}

/// Apply the singular / pivot-fault policy to a freshly computed pivot.
///
/// Only the first zero pivot of a call sets `numerical_rank` and
/// `singular_col`; `status` always holds the latest condition.
pub(crate) fn check_pivot(
    ukk: f64,
    site: PivotSite,
    scaled: bool,
    metrics: &mut KluNumericMetrics,
    config: &KluConfig,
) -> KluResult<()> {
    if ukk == 0.0 {
        metrics.status = KluStatus::Singular;
        if metrics.numerical_rank.is_none() {
            metrics.numerical_rank = Some(site.k);
            metrics.singular_col = Some(site.oldcol);
        }
        warn!(
            block = site.block,
            column = site.k,
            original_column = site.oldcol,
            "zero pivot"
        );
        if config.halt_if_singular {
            return Err(KluError::Singular {
                block: site.block,
                rank: site.k,
                col: site.oldcol,
            });
        }
        return Ok(());
    }

    let abs_pivot = ukk.abs();
    if scaled && abs_pivot < config.pivot_tol_fail {
        metrics.status = KluStatus::PivotFault;
        warn!(
            block = site.block,
            column = site.k,
            pivot = ukk,
            tol = config.pivot_tol_fail,
            "pivot below tolerance"
        );
        if config.halt_if_pivot_fails {
            return Err(KluError::PivotFault {
                block: site.block,
                rank: site.k,
                col: site.oldcol,
                pivot: ukk,
            });
        }
    }

    Ok(())
}
