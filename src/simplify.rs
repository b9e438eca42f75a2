//! Redundancy removal.
//!
//! Where [`crate::conversion`] maintains the double-description pair while
//! folding in new rows, `simplify` shrinks an already-consistent pair down
//! to its minimal representation: every constraint that is implied by the
//! others, and every generator that is a positive combination of the
//! others, is dropped. The saturation matrix again does the heavy lifting —
//! redundancy is read off it rather than recomputed geometrically.

#![forbid(unsafe_code)]

use tracing::debug;

use crate::matrix::LinearSystem;
use crate::row::BitRow;
use crate::saturation::SaturationMatrix;

/// Drops redundant rows from `primal` (and the matching columns/rows of
/// `sat`) given `dual`'s row count and `primal`'s own embedded dimension,
/// then Gauss-eliminates and back-substitutes `primal`'s equalities.
/// Returns the number of equalities (rank of the lineality space)
/// remaining.
///
/// `sat` is indexed `[dual_row][primal_row]`: bit set iff that dual row does
/// *not* saturate that primal row. Two rules prune `primal`:
///
/// - **saturation rule**: a non-equality row saturated by fewer than
///   `dimension - rank - 1` dual rows cannot be part of a minimal face and
///   is redundant (it is implied by the rows that *are* part of minimal
///   faces). `dimension` here is `primal`'s own row width (the embedded
///   space dimension including the inhomogeneous term and, under NNC
///   topology, the ε column) — distinct from `dual_num_rows`, which is only
///   used to turn a saturation-row popcount into a saturator count;
/// - **independence rule**: a non-equality row whose saturating dual-row set
///   is a subset of another's is implied by that other row.
///
/// Both rules read `sat` as columns (per-primal-row saturation sets), so the
/// matrix is transposed once up front.
pub fn simplify(primal: &mut LinearSystem, dual_num_rows: usize, dimension: usize, sat: &mut SaturationMatrix) -> usize {
    promote_zero_rows_to_equalities(primal, sat);

    let rank = primal.simplify_equalities();
    debug!(rank, "simplify: equalities reduced");

    let by_primal_row = sat.transpose();
    let mut keep = vec![true; primal.num_rows()];

    for i in 0..primal.num_rows() {
        if primal.row(i).is_line_or_equality() {
            continue;
        }
        let saturating = dual_num_rows - by_primal_row.row(i).count_ones();
        let threshold = dimension.saturating_sub(rank + 1);
        if saturating < threshold {
            keep[i] = false;
        }
    }

    for i in 0..primal.num_rows() {
        if !keep[i] || primal.row(i).is_line_or_equality() {
            continue;
        }
        for j in 0..primal.num_rows() {
            if i == j || !keep[j] || primal.row(j).is_line_or_equality() {
                continue;
            }
            // i is implied by j if everything i does NOT saturate is also
            // not saturated by j, i.e. i's non-saturation set is a subset of
            // j's — symmetric rows (equal sets) keep only the lower index.
            let dominated = by_primal_row.row(i).subset_or_equal(by_primal_row.row(j))
                && (by_primal_row.row(i) != by_primal_row.row(j) || i > j);
            if dominated {
                keep[i] = false;
                break;
            }
        }
    }

    drop_rows(primal, sat, &keep);
    primal.back_substitute(rank);
    debug!(remaining = primal.num_rows(), "simplify: redundant rows dropped");
    rank
}

/// Any constraint saturated by every generator (its sat-column is all-zero)
/// is implied to hold with equality; promote it so `simplify_equalities`
/// folds it into the lineality computation.
fn promote_zero_rows_to_equalities(primal: &mut LinearSystem, sat: &SaturationMatrix) {
    let by_primal_row = sat.transpose();
    for i in 0..primal.num_rows() {
        if !primal.row(i).is_line_or_equality() && by_primal_row.row(i).is_empty() {
            primal.row_mut(i).set_is_line_or_equality();
        }
    }
}

fn drop_rows(primal: &mut LinearSystem, sat: &mut SaturationMatrix, keep: &[bool]) {
    let kept_indices: Vec<usize> = (0..keep.len()).filter(|&i| keep[i]).collect();

    let mut rows = Vec::new();
    for &i in &kept_indices {
        rows.push(primal.row(i).clone());
    }
    primal.replace_rows(rows);

    let mut rebuilt = SaturationMatrix::new(kept_indices.len());
    for d in 0..sat.num_rows() {
        let mut new_row = BitRow::new();
        for (j, &i) in kept_indices.iter().enumerate() {
            if sat.row(d).contains(i) {
                new_row.set(j);
            }
        }
        rebuilt.add_row(new_row);
    }
    *sat = rebuilt;
}
