//! The Chernikova-style double-description conversion engine.
//!
//! Given a source system (say, constraints) whose rows `[0, start)` already
//! correspond to the current destination system (generators) plus a
//! saturation matrix relating them, [`convert`] folds in source rows
//! `[start, source.num_rows())` one at a time, updating the destination
//! system and saturation matrix so the invariant `{x : Cx >= 0} == {Gλ :
//! λ >= 0}` keeps holding.
//!
//! Each source row is handled by one of two rules:
//!
//! - an **equality** (or, symmetrically, a dest line) must be satisfied
//!   exactly by every destination row: any row with a nonzero scalar
//!   product against it is cancelled against a single pivot row and the
//!   pivot is then dropped, since its information has been folded into the
//!   others;
//! - an **inequality** partitions destination rows into those that
//!   saturate it, those that satisfy it strictly, and those that violate
//!   it. Rows that violate it are replaced by new rays/points formed by
//!   combining them with a saturating-or-satisfying partner, but only for
//!   combinations that touch a minimal face of the emerging polyhedron —
//!   checked via the saturation matrix rather than geometrically.

#![forbid(unsafe_code)]

use tracing::{debug, debug_span, trace};

use crate::integer::{Coefficient, Sign};
use crate::matrix::{LinearSystem, MatrixError};
use crate::row::{BitRow, LinearRow};
use crate::saturation::SaturationMatrix;
use crate::watchdog::AbandonToken;

/// Errors raised by the conversion engine.
#[derive(Debug, thiserror::Error)]
pub enum ConversionError<E: std::fmt::Debug> {
    /// An underlying matrix operation failed.
    #[error(transparent)]
    Matrix(#[from] MatrixError),
    /// The computation was abandoned via an [`AbandonToken`].
    #[error("conversion abandoned: {0:?}")]
    Abandoned(E),
}

/// `(a, b)` such that `b*a_row - a*b_row` has a zero scalar product against
/// whatever produced `sp_a`/`sp_b`; the row-level analogue of
/// [`Coefficient::normalize2`].
fn combine(a_row: &LinearRow, sp_a: &Coefficient, b_row: &LinearRow, sp_b: &Coefficient) -> LinearRow {
    let (a, b) = Coefficient::normalize2(sp_a, sp_b);
    let coeffs = (0..a_row.width())
        .map(|i| &(&b * a_row.at(i)) - &(&a * b_row.at(i)))
        .collect();
    let mut row = LinearRow::from_coefficients(coeffs, a_row.flags());
    row.set_is_ray_or_point_or_inequality();
    row.strong_normalize();
    row
}

/// As [`combine`], but preserves `a_row`'s line-or-equality flag when `b_row`
/// is also a line (combining two lines yields a line spanning their
/// intersection's quotient direction); otherwise the result is demoted to a
/// ray/point, since only a full line can cancel another line's scalar
/// product without losing a direction.
fn combine_for_equality(a_row: &LinearRow, sp_a: &Coefficient, b_row: &LinearRow, sp_b: &Coefficient) -> LinearRow {
    let (a, b) = Coefficient::normalize2(sp_a, sp_b);
    let coeffs = (0..a_row.width())
        .map(|i| &(&b * a_row.at(i)) - &(&a * b_row.at(i)))
        .collect();
    let mut row = LinearRow::from_coefficients(coeffs, a_row.flags());
    if a_row.is_line_or_equality() && !b_row.is_line_or_equality() {
        row.set_is_ray_or_point_or_inequality();
    }
    row.strong_normalize();
    row
}

/// As [`combine`], but keeps `a_row`'s own kind unconditionally. Used to
/// cancel a row's violation of `src_k` against a pivot: because the result
/// has a zero scalar product against `src_k` by construction, a violating
/// line that gets folded this way stays a genuine line (both its directions
/// still saturate `src_k`), not a ray.
fn combine_preserving_kind(a_row: &LinearRow, sp_a: &Coefficient, b_row: &LinearRow, sp_b: &Coefficient) -> LinearRow {
    let (a, b) = Coefficient::normalize2(sp_a, sp_b);
    let coeffs = (0..a_row.width())
        .map(|i| &(&b * a_row.at(i)) - &(&a * b_row.at(i)))
        .collect();
    let mut row = LinearRow::from_coefficients(coeffs, a_row.flags());
    row.strong_normalize();
    row
}

fn poll_abandon<E: Clone + std::fmt::Debug>(
    abandon: Option<&AbandonToken<E>>,
) -> Result<(), ConversionError<E>> {
    if let Some(token) = abandon {
        if let Some(reason) = token.check() {
            return Err(ConversionError::Abandoned(reason));
        }
    }
    Ok(())
}

/// Whether generator `o`'s saturation row is dominated by (a subset of) the
/// pair's joint saturation, i.e. `o` saturates everything `p` and `m` jointly
/// saturate. A dominated pair does not define a minimal face and must not be
/// combined; lines are excluded from the check since their all-zero
/// saturation row would otherwise dominate every pair.
fn pair_is_minimal(sat: &SaturationMatrix, dest: &LinearSystem, p: usize, m: usize) -> bool {
    let joint_violation = sat.row(p).union(sat.row(m));
    for o in 0..dest.num_rows() {
        if o == p || o == m || dest.row(o).is_line_or_equality() {
            continue;
        }
        if sat.row(o).subset_or_equal(&joint_violation) {
            return false;
        }
    }
    true
}

/// Folds source rows `[start, source.num_rows())` into `dest`/`sat`.
/// `dest`'s rows `[0, start)`'s worth of history is already reflected by
/// `sat`'s columns `[0, start)`. Returns the final number of lines
/// (equalities, dualized) in `dest`.
pub fn convert<E: Clone + std::fmt::Debug>(
    source: &LinearSystem,
    dest: &mut LinearSystem,
    sat: &mut SaturationMatrix,
    start: usize,
    abandon: Option<&AbandonToken<E>>,
) -> Result<usize, ConversionError<E>> {
    let span = debug_span!("convert", start, total = source.num_rows());
    let _enter = span.enter();

    for k in start..source.num_rows() {
        poll_abandon(abandon)?;
        let source_row = source.row(k);
        let mut sp: Vec<Coefficient> = (0..dest.num_rows())
            .map(|i| dest.row(i).scalar_product(source_row))
            .collect();
        trace!(k, n_dest = dest.num_rows(), "convert: scalar products computed");

        if source_row.is_line_or_equality() {
            convert_equality(dest, sat, &sp)?;
        } else {
            convert_inequality(dest, sat, &mut sp, k, abandon)?;
        }
        sat.set_num_columns(k + 1);
        debug!(k, n_dest = dest.num_rows(), "convert: source row folded in");
    }

    finalize(dest, sat);
    Ok(dest.num_lines_or_equalities())
}

fn convert_equality<E: std::fmt::Debug>(
    dest: &mut LinearSystem,
    sat: &mut SaturationMatrix,
    sp: &[Coefficient],
) -> Result<(), ConversionError<E>> {
    let nonzero: Vec<usize> = (0..dest.num_rows()).filter(|&i| !sp[i].is_zero()).collect();
    if nonzero.is_empty() {
        return Ok(());
    }
    let pivot = nonzero
        .iter()
        .copied()
        .find(|&i| dest.row(i).is_line_or_equality())
        .unwrap_or(nonzero[0]);

    for &i in &nonzero {
        if i == pivot {
            continue;
        }
        let combined = combine_for_equality(dest.row(i), &sp[i], dest.row(pivot), &sp[pivot]);
        *dest.row_mut(i) = combined;
    }
    dest.remove_row_at(pivot);
    sat.remove_row_at(pivot);
    Ok(())
}

fn convert_inequality<E: Clone + std::fmt::Debug>(
    dest: &mut LinearSystem,
    sat: &mut SaturationMatrix,
    sp: &mut Vec<Coefficient>,
    k: usize,
    abandon: Option<&AbandonToken<E>>,
) -> Result<(), ConversionError<E>> {
    // Case A: some line in the current lineality space violates src_k. Pick
    // the first such line as a pivot, orient it to a positive scalar
    // product, demote it to a ray, and fold every other violating row
    // (line or ray) against it so its scalar product becomes exactly zero.
    // A violating line folded this way keeps its line flag: the result
    // saturates src_k with equality, so both its directions remain valid,
    // unlike the pivot itself which is now one-directional.
    if let Some(pivot) = (0..dest.num_rows()).find(|&i| dest.row(i).is_line_or_equality() && !sp[i].is_zero()) {
        if sp[pivot].sign() == Sign::Negative {
            dest.row_mut(pivot).negate_mut();
            sp[pivot] = -sp[pivot].clone();
        }
        dest.row_mut(pivot).set_is_ray_or_point_or_inequality();

        for i in 0..dest.num_rows() {
            if i == pivot || sp[i].is_zero() {
                continue;
            }
            let combined = combine_preserving_kind(dest.row(i), &sp[i], dest.row(pivot), &sp[pivot]);
            *dest.row_mut(i) = combined;
        }

        sat.row_mut(pivot).set(k);
        return Ok(());
    }

    // Case B: every line already saturates src_k; partition the rays.
    let mut pos = Vec::new();
    let mut neg = Vec::new();
    for i in 0..dest.num_rows() {
        match sp[i].sign() {
            Sign::Positive => pos.push(i),
            Sign::Negative => neg.push(i),
            Sign::Zero => {}
        }
    }

    if neg.is_empty() {
        for &i in &pos {
            sat.row_mut(i).set(k);
        }
        return Ok(());
    }

    let mut new_rows: Vec<LinearRow> = Vec::new();
    let mut new_sat_rows: Vec<BitRow> = Vec::new();
    for (pair_count, &p) in pos.iter().enumerate() {
        if pair_count % 8 == 0 {
            poll_abandon(abandon)?;
        }
        for &m in &neg {
            if !pair_is_minimal(sat, dest, p, m) {
                continue;
            }
            let combined = combine(dest.row(p), &sp[p], dest.row(m), &sp[m]);
            let mut sat_row = sat.row(p).union(sat.row(m));
            sat_row.clear(k);
            new_rows.push(combined);
            new_sat_rows.push(sat_row);
        }
    }

    for &i in &pos {
        sat.row_mut(i).set(k);
    }

    for i in neg.iter().rev().copied() {
        dest.remove_row_at(i);
        sat.remove_row_at(i);
    }

    for (row, sat_row) in new_rows.into_iter().zip(new_sat_rows) {
        dest.insert_pending(row);
        sat.add_row(sat_row);
    }

    Ok(())
}

/// Stable-partitions `dest`'s rows so lines/equalities lead, keeping `sat`
/// in lockstep, and marks every row settled.
fn finalize(dest: &mut LinearSystem, sat: &mut SaturationMatrix) {
    let mut lines = Vec::new();
    let mut others = Vec::new();
    let mut lines_sat = Vec::new();
    let mut others_sat = Vec::new();
    for i in 0..dest.num_rows() {
        if dest.row(i).is_line_or_equality() {
            lines.push(dest.row(i).clone());
            lines_sat.push(sat.row(i).clone());
        } else {
            others.push(dest.row(i).clone());
            others_sat.push(sat.row(i).clone());
        }
    }
    lines.extend(others);
    lines_sat.extend(others_sat);
    dest.replace_rows(lines);
    sat.replace_rows(lines_sat);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row::{Flags, Kind, Topology};

    fn ineq(coeffs: &[i64]) -> LinearRow {
        LinearRow::from_coefficients(
            coeffs.iter().map(|&c| Coefficient::from_i64(c)).collect(),
            Flags::new(Topology::NecessarilyClosed, Kind::RayOrPointOrInequality),
        )
    }

    fn line_or_eq(coeffs: &[i64]) -> LinearRow {
        LinearRow::from_coefficients(
            coeffs.iter().map(|&c| Coefficient::from_i64(c)).collect(),
            Flags::new(Topology::NecessarilyClosed, Kind::LineOrEquality),
        )
    }

    /// The 2-dimensional universe generator system: two lines spanning the
    /// whole plane plus the origin, dualized against the empty constraint
    /// system (no columns saturated yet).
    fn universe_2d() -> (LinearSystem, SaturationMatrix) {
        let mut gens = LinearSystem::new(Topology::NecessarilyClosed);
        gens.insert(line_or_eq(&[0, 1, 0]));
        gens.insert(line_or_eq(&[0, 0, 1]));
        gens.insert(ineq(&[1, 0, 0]));
        let mut sat = SaturationMatrix::new(0);
        for _ in 0..gens.num_rows() {
            sat.add_empty_row();
        }
        (gens, sat)
    }

    #[test]
    fn single_inequality_clips_universe_into_halfplane() {
        let (mut gens, mut sat) = universe_2d();
        let mut constraints = LinearSystem::new(Topology::NecessarilyClosed);
        constraints.insert(ineq(&[0, 1, 0])); // x >= 0

        let rank: Result<usize, ConversionError<()>> =
            convert(&constraints, &mut gens, &mut sat, 0, None);
        let rank = rank.unwrap();

        // The x-axis line must have been demoted to a ray; the y-axis line
        // survives untouched, so exactly one line remains.
        assert_eq!(rank, 1);
        assert_eq!(gens.num_rows(), sat.num_rows());
    }

    #[test]
    fn two_lines_violating_an_inequality_fold_into_one_surviving_line() {
        // 2-D universe (two coordinate lines + origin) folded against
        // x + y >= 0. Both lines have a nonzero (positive) scalar product,
        // so naively demoting both to rays would wrongly clip the result to
        // the first quadrant instead of the correct half-plane, whose
        // lineality space is 1-dimensional (the diagonal x + y == 0).
        let (mut gens, mut sat) = universe_2d();
        let mut constraints = LinearSystem::new(Topology::NecessarilyClosed);
        let c = ineq(&[0, 1, 1]);
        constraints.insert(c.clone());

        let rank: Result<usize, ConversionError<()>> =
            convert(&constraints, &mut gens, &mut sat, 0, None);
        let rank = rank.unwrap();

        assert_eq!(rank, 1);
        assert_eq!(gens.num_rows(), 3);

        let mut lines = 0;
        for g in gens.rows() {
            let sp = c.scalar_product(g);
            if g.is_line_or_equality() {
                lines += 1;
                assert!(sp.is_zero(), "the surviving line must saturate x + y >= 0");
            } else {
                assert!(
                    matches!(sp.sign(), Sign::Positive | Sign::Zero),
                    "every surviving ray/point must satisfy x + y >= 0"
                );
            }
        }
        assert_eq!(lines, 1);
    }

    #[test]
    fn redundant_inequality_changes_nothing_structural() {
        let (mut gens, mut sat) = universe_2d();
        let mut constraints = LinearSystem::new(Topology::NecessarilyClosed);
        constraints.insert(ineq(&[1, 0, 0])); // always true (1 >= 0)

        let rank: Result<usize, ConversionError<()>> =
            convert(&constraints, &mut gens, &mut sat, 0, None);
        assert_eq!(rank.unwrap(), 2);
    }

    #[test]
    fn abandon_token_short_circuits_conversion() {
        let (mut gens, mut sat) = universe_2d();
        let mut constraints = LinearSystem::new(Topology::NecessarilyClosed);
        constraints.insert(ineq(&[0, 1, 0]));
        let token: AbandonToken<&'static str> = AbandonToken::new();
        token.set("deadline exceeded");

        let result = convert(&constraints, &mut gens, &mut sat, 0, Some(&token));
        assert!(matches!(result, Err(ConversionError::Abandoned("deadline exceeded"))));
    }

    #[test]
    fn equality_drops_one_line_from_the_lineality_space() {
        let (mut gens, mut sat) = universe_2d();
        let mut constraints = LinearSystem::new(Topology::NecessarilyClosed);
        constraints.insert(line_or_eq(&[0, 1, 0])); // x == 0

        let rank: Result<usize, ConversionError<()>> =
            convert(&constraints, &mut gens, &mut sat, 0, None);
        assert_eq!(rank.unwrap(), 1);
    }
}
