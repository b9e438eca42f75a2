//! Bit matrices and linear systems.
//!
//! A `BitMatrix` is a dynamic sequence of [`BitRow`]s sharing a declared
//! column count; a `LinearSystem` is the analogous sequence of
//! [`LinearRow`]s, additionally tracking the settled/pending split and a
//! sorted flag (§4.4). Both grow by simple `Vec` push/resize rather than the
//! reference implementation's manual capacity-amortized reallocation, since
//! `Vec` already gives the same amortized-growth guarantee without manual
//! bookkeeping.

#![forbid(unsafe_code)]

use std::cmp::Ordering;

use tracing::debug;

use crate::row::{BitRow, Flags, Kind, LinearRow, RowError, Topology};

/// Errors raised by matrix-level operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum MatrixError {
    /// A row-level operation failed.
    #[error(transparent)]
    Row(#[from] RowError),
    /// An operation required rows to already be sorted.
    #[error("linear system is not sorted")]
    NotSorted,
    /// An operation required no pending rows to be present.
    #[error("linear system has pending rows")]
    HasPendingRows,
    /// The two systems being merged/compared disagree on topology.
    #[error("topology mismatch between linear systems")]
    TopologyMismatch,
    /// Index out of bounds.
    #[error("row index {0} out of bounds")]
    IndexOutOfBounds(usize),
    /// The ascii dump/load textual format (§6) was malformed.
    #[error("malformed ascii dump/load input")]
    AsciiFormat,
}

// ---------------------------------------------------------------------------
// Bit matrix
// ---------------------------------------------------------------------------

/// A dynamic sequence of [`BitRow`]s sharing a declared column count.
#[derive(Clone, Debug, Default)]
pub struct BitMatrix {
    rows: Vec<BitRow>,
    num_columns: usize,
}

impl BitMatrix {
    /// An empty matrix with the given column count.
    pub fn new(num_columns: usize) -> Self {
        BitMatrix {
            rows: Vec::new(),
            num_columns,
        }
    }

    /// Number of rows.
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Declared number of columns.
    pub fn num_columns(&self) -> usize {
        self.num_columns
    }

    /// Borrows row `i`.
    pub fn row(&self, i: usize) -> &BitRow {
        &self.rows[i]
    }

    /// Mutably borrows row `i`.
    pub fn row_mut(&mut self, i: usize) -> &mut BitRow {
        &mut self.rows[i]
    }

    /// Appends a row.
    pub fn add_row(&mut self, row: BitRow) {
        self.rows.push(row);
    }

    /// Appends an empty row.
    pub fn add_empty_row(&mut self) {
        self.rows.push(BitRow::new());
    }

    /// Removes the row at `i`, shifting later rows down.
    pub fn remove_row_at(&mut self, i: usize) -> BitRow {
        self.rows.remove(i)
    }

    /// Swaps two rows.
    pub fn swap_rows(&mut self, i: usize, j: usize) {
        self.rows.swap(i, j);
    }

    /// Truncates to `new_num_rows` rows.
    pub fn rows_erase_to_end(&mut self, new_num_rows: usize) {
        self.rows.truncate(new_num_rows);
    }

    /// Drops every column index `>= new_num_columns` from every row, and
    /// lowers the declared column count.
    pub fn columns_erase_to_end(&mut self, new_num_columns: usize) {
        for row in &mut self.rows {
            row.clear_from(new_num_columns);
        }
        self.num_columns = new_num_columns;
    }

    /// Resizes to `(new_rows, new_columns)`, preserving existing contents
    /// and zero-filling new rows/columns.
    pub fn resize(&mut self, new_rows: usize, new_columns: usize) {
        if new_columns < self.num_columns {
            self.columns_erase_to_end(new_columns);
        } else {
            self.num_columns = new_columns;
        }
        self.rows.resize_with(new_rows, BitRow::new);
    }

    /// Transposes the matrix: bit (i, j) becomes (j, i).
    pub fn transpose(&self) -> BitMatrix {
        let mut out = BitMatrix::new(self.rows.len());
        out.rows.resize_with(self.num_columns, BitRow::new);
        for (i, row) in self.rows.iter().enumerate() {
            let mut j = row.first();
            while let Some(col) = j {
                out.rows[col].set(i);
                j = row.next(col);
            }
        }
        out
    }

    /// Sorts rows by [`BitRow::compare`] and removes exact duplicates.
    pub fn sort_and_dedup(&mut self) {
        self.rows.sort_by(BitRow::compare);
        self.rows.dedup();
    }

    /// Binary search for `needle` in a sorted matrix.
    pub fn sorted_contains(&self, needle: &BitRow) -> bool {
        self.rows.binary_search_by(|r| r.compare(needle)).is_ok()
    }

    /// Iterates over all rows.
    pub fn iter(&self) -> std::slice::Iter<'_, BitRow> {
        self.rows.iter()
    }

    /// Overrides the declared column count without touching row contents.
    pub fn set_num_columns(&mut self, n: usize) {
        self.num_columns = n;
    }

    /// Replaces every row wholesale.
    pub fn replace_rows(&mut self, rows: Vec<BitRow>) {
        self.rows = rows;
    }
}

// ---------------------------------------------------------------------------
// Linear system
// ---------------------------------------------------------------------------

/// An ordered sequence of [`LinearRow`]s sharing a width and topology, with
/// a settled/pending split and a sortedness claim over the settled prefix.
#[derive(Clone, Debug)]
pub struct LinearSystem {
    rows: Vec<LinearRow>,
    topology: Topology,
    row_kind_policy: Kind,
    first_pending: usize,
    sorted: bool,
}

impl LinearSystem {
    /// An empty system of the given topology.
    ///
    /// `row_kind_policy` is unused beyond documentation: unlike the
    /// reference implementation's inheritance hierarchy, constraint and
    /// generator systems here are the same `LinearSystem` type; the kind
    /// distinction lives entirely on each row's flags (§9, "Inheritance of
    /// domain classes").
    pub fn new(topology: Topology) -> Self {
        LinearSystem {
            rows: Vec::new(),
            topology,
            row_kind_policy: Kind::RayOrPointOrInequality,
            first_pending: 0,
            sorted: true,
        }
    }

    /// Number of rows (settled + pending).
    pub fn num_rows(&self) -> usize {
        self.rows.len()
    }

    /// Declared width (0 if empty).
    pub fn width(&self) -> usize {
        self.rows.first().map_or(0, LinearRow::width)
    }

    /// The system's topology.
    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Index of the first pending row.
    pub fn first_pending(&self) -> usize {
        self.first_pending
    }

    /// Whether the settled prefix is claimed sorted.
    pub fn is_sorted(&self) -> bool {
        self.sorted
    }

    /// Whether there are no pending rows.
    pub fn has_no_pending_rows(&self) -> bool {
        self.first_pending == self.rows.len()
    }

    /// Borrows row `i`.
    pub fn row(&self, i: usize) -> &LinearRow {
        &self.rows[i]
    }

    /// Mutably borrows row `i`.
    pub fn row_mut(&mut self, i: usize) -> &mut LinearRow {
        &mut self.rows[i]
    }

    /// All rows as a slice.
    pub fn rows(&self) -> &[LinearRow] {
        &self.rows
    }

    /// Number of leading rows that are lines/equalities.
    pub fn num_lines_or_equalities(&self) -> usize {
        self.rows.iter().take_while(|r| r.is_line_or_equality()).count()
    }

    fn adapt_width(&mut self, row: &mut LinearRow) {
        let current = self.width();
        if current == 0 {
            return;
        }
        match row.width().cmp(&current) {
            Ordering::Less => {
                // Grow the incoming row; new trailing coefficients are zero.
                // When not-necessarily-closed, the epsilon column must stay
                // last, so insert zeros before it rather than after.
                let deficit = current - row.width();
                match self.topology {
                    Topology::NecessarilyClosed => {
                        for _ in 0..deficit {
                            *row = widen_closed(row);
                        }
                    }
                    Topology::NotNecessarilyClosed => {
                        for _ in 0..deficit {
                            *row = widen_nnc(row);
                        }
                    }
                }
            }
            Ordering::Greater => {
                // The new row is wider than the system: widen every existing
                // row to match before inserting.
                let deficit = row.width() - current;
                for existing in &mut self.rows {
                    match self.topology {
                        Topology::NecessarilyClosed => {
                            for _ in 0..deficit {
                                *existing = widen_closed(existing);
                            }
                        }
                        Topology::NotNecessarilyClosed => {
                            for _ in 0..deficit {
                                *existing = widen_nnc(existing);
                            }
                        }
                    }
                }
            }
            Ordering::Equal => {}
        }
    }

    /// Appends `row` to the settled prefix, widening system/row as needed.
    /// Clears the sorted flag unless the insertion preserves sort order.
    pub fn insert(&mut self, mut row: LinearRow) {
        self.adapt_width(&mut row);
        let preserves_order = self.sorted
            && self.rows.last().map_or(true, |last| last.compare(&row) <= 0);
        self.rows.insert(self.first_pending, row);
        self.first_pending += 1;
        self.sorted = preserves_order;
    }

    /// Appends `row` to the pending suffix.
    pub fn insert_pending(&mut self, mut row: LinearRow) {
        self.adapt_width(&mut row);
        self.rows.push(row);
    }

    /// Marks every pending row settled without sorting them.
    pub fn unset_pending_rows(&mut self) {
        self.first_pending = self.rows.len();
    }

    /// Sorts the settled prefix (rows `[0, first_pending)`).
    pub fn sort_rows(&mut self) {
        self.rows[..self.first_pending].sort_by(|a, b| cmp_from_i32(a.compare(b)));
        self.sorted = true;
    }

    /// Sorts the pending suffix and merges it into the settled prefix,
    /// removing duplicates.
    pub fn sort_pending_and_remove_duplicates(&mut self) {
        if self.first_pending == self.rows.len() {
            return;
        }
        self.rows[self.first_pending..].sort_by(|a, b| cmp_from_i32(a.compare(b)));
        self.rows.sort_by(|a, b| cmp_from_i32(a.compare(b)));
        self.rows.dedup_by(|a, b| a.compare(b) == 0);
        self.first_pending = self.rows.len();
        self.sorted = true;
    }

    /// Merges two already-sorted, pending-free systems into their sorted
    /// union with duplicates removed.
    pub fn merge_rows_assign(&mut self, other: &LinearSystem) -> Result<(), MatrixError> {
        if !self.has_no_pending_rows() || !other.has_no_pending_rows() {
            return Err(MatrixError::HasPendingRows);
        }
        if !self.sorted || !other.sorted {
            return Err(MatrixError::NotSorted);
        }
        if self.topology != other.topology {
            return Err(MatrixError::TopologyMismatch);
        }
        let mut merged = Vec::with_capacity(self.rows.len() + other.rows.len());
        let (mut i, mut j) = (0, 0);
        while i < self.rows.len() && j < other.rows.len() {
            match self.rows[i].compare(&other.rows[j]) {
                0 => {
                    merged.push(self.rows[i].clone());
                    i += 1;
                    j += 1;
                }
                c if c < 0 => {
                    merged.push(self.rows[i].clone());
                    i += 1;
                }
                _ => {
                    merged.push(other.rows[j].clone());
                    j += 1;
                }
            }
        }
        merged.extend_from_slice(&self.rows[i..]);
        merged.extend_from_slice(&other.rows[j..]);
        self.first_pending = merged.len();
        self.rows = merged;
        self.sorted = true;
        Ok(())
    }

    /// Treats the first `k` rows as equalities/lines and reduces them to a
    /// triangular basis by right-to-left column search. Returns the rank.
    /// Any row swap invalidates the sorted flag.
    pub fn gauss(&mut self, k: usize) -> usize {
        let width = self.width();
        if width == 0 || k == 0 {
            return 0;
        }
        let mut rank = 0;
        for col in (1..width).rev() {
            if rank >= k {
                break;
            }
            let pivot = (rank..k).find(|&r| !self.rows[r].at(col).is_zero());
            if let Some(pivot_row) = pivot {
                if pivot_row != rank {
                    self.rows.swap(pivot_row, rank);
                    self.sorted = false;
                }
                for r in (rank + 1)..k {
                    if !self.rows[r].at(col).is_zero() {
                        let pivot_clone = self.rows[rank].clone();
                        if let Err(e) = self.rows[r].linear_combine(&pivot_clone, col) {
                            debug!(?e, "gauss: linear_combine failed on a zero pivot, skipping");
                        }
                        self.sorted = false;
                    }
                }
                rank += 1;
            }
        }
        debug!(k, rank, "gauss elimination complete");
        rank
    }

    /// Eliminates each of the first `k` equalities' pivot columns from every
    /// other row, inequalities included.
    pub fn back_substitute(&mut self, k: usize) {
        let width = self.width();
        if width == 0 || k == 0 {
            return;
        }
        for eq in (0..k).rev() {
            let pivot_col = (1..width).rev().find(|&c| !self.rows[eq].at(c).is_zero());
            let Some(col) = pivot_col else { continue };
            let negated = self.rows[eq].at(col).sign() == crate::integer::Sign::Negative;
            if negated {
                self.rows[eq].negate_mut();
            }
            let pivot_clone = self.rows[eq].clone();
            for r in 0..self.rows.len() {
                if r == eq {
                    continue;
                }
                if !self.rows[r].at(col).is_zero() {
                    if self.rows[r].linear_combine(&pivot_clone, col).is_ok() {
                        self.sorted = false;
                    }
                }
            }
            if negated {
                self.rows[eq].negate_mut();
            }
        }
        debug!(k, "back substitution complete");
    }

    /// Sorts lines/equalities to the top, Gauss-eliminates to find the rank
    /// `r`, drops the `num_equalities - r` redundant equalities, then
    /// back-substitutes. Returns `r`.
    pub fn simplify_equalities(&mut self) -> usize {
        self.rows.sort_by_key(|r| !r.is_line_or_equality());
        let num_equalities = self.num_lines_or_equalities();
        let r = self.gauss(num_equalities);
        if r < num_equalities {
            // Redundant equalities were left with an all-zero homogeneous
            // part after gauss; drop them by swapping to the tail.
            let mut write = r;
            for read in r..num_equalities {
                if !self.rows[read].all_homogeneous_terms_are_zero() {
                    self.rows.swap(write, read);
                    write += 1;
                }
            }
            self.rows.truncate(self.rows.len() - (num_equalities - write));
        }
        self.back_substitute(r);
        self.sorted = false;
        r
    }

    /// Sets the topology, propagating the ε-column change to every row.
    pub fn set_topology(&mut self, topology: Topology) {
        if topology == self.topology {
            return;
        }
        for row in &mut self.rows {
            row.set_topology(topology);
        }
        self.topology = topology;
    }

    /// Removes the row at `i`.
    pub fn remove_row_at(&mut self, i: usize) -> LinearRow {
        if i < self.first_pending {
            self.first_pending -= 1;
        }
        self.rows.remove(i)
    }

    /// Swaps two rows (caller responsible for any sortedness implications).
    pub fn swap_rows(&mut self, i: usize, j: usize) {
        self.rows.swap(i, j);
    }

    /// Truncates to `new_num_rows` rows.
    pub fn rows_erase_to_end(&mut self, new_num_rows: usize) {
        self.rows.truncate(new_num_rows);
        self.first_pending = self.first_pending.min(new_num_rows);
    }

    /// Strong-normalizes every row.
    pub fn strong_normalize_all(&mut self) {
        for row in &mut self.rows {
            row.strong_normalize();
        }
    }

    /// Replaces every row wholesale, e.g. after reordering lines to the
    /// front. All rows become settled and the sorted flag is cleared.
    pub fn replace_rows(&mut self, rows: Vec<LinearRow>) {
        self.first_pending = rows.len();
        self.rows = rows;
        self.sorted = false;
    }

    /// Serializes the system in the ascii dump format (§6):
    /// ```text
    /// topology {NECESSARILY_CLOSED|NOT_NECESSARILY_CLOSED}
    /// R x C (sorted)|(not_sorted)
    /// index_first_pending I
    /// <row 0>
    /// ...
    /// ```
    pub fn ascii_dump(&self) -> String {
        let mut out = String::new();
        out.push_str("topology ");
        out.push_str(match self.topology {
            Topology::NecessarilyClosed => "NECESSARILY_CLOSED",
            Topology::NotNecessarilyClosed => "NOT_NECESSARILY_CLOSED",
        });
        out.push('\n');
        out.push_str(&self.rows.len().to_string());
        out.push_str(" x ");
        out.push_str(&self.width().to_string());
        out.push(' ');
        out.push_str(if self.sorted { "(sorted)" } else { "(not_sorted)" });
        out.push('\n');
        out.push_str("index_first_pending ");
        out.push_str(&self.first_pending.to_string());
        out.push('\n');
        for row in &self.rows {
            row.ascii_dump(&mut out);
        }
        out
    }

    /// Parses a system previously produced by [`LinearSystem::ascii_dump`].
    /// `load(dump(x)) == x` for any `x` this method can dump.
    pub fn ascii_load(s: &str) -> Result<Self, MatrixError> {
        let mut tokens = s.split_whitespace();
        let mut next = || tokens.next().ok_or(MatrixError::AsciiFormat);
        if next()? != "topology" {
            return Err(MatrixError::AsciiFormat);
        }
        let topology = match next()? {
            "NECESSARILY_CLOSED" => Topology::NecessarilyClosed,
            "NOT_NECESSARILY_CLOSED" => Topology::NotNecessarilyClosed,
            _ => return Err(MatrixError::AsciiFormat),
        };
        let num_rows: usize = next()?.parse().map_err(|_| MatrixError::AsciiFormat)?;
        if next()? != "x" {
            return Err(MatrixError::AsciiFormat);
        }
        let _num_columns: usize = next()?.parse().map_err(|_| MatrixError::AsciiFormat)?;
        let sorted = match next()? {
            "(sorted)" => true,
            "(not_sorted)" => false,
            _ => return Err(MatrixError::AsciiFormat),
        };
        if next()? != "index_first_pending" {
            return Err(MatrixError::AsciiFormat);
        }
        let first_pending: usize = next()?.parse().map_err(|_| MatrixError::AsciiFormat)?;
        drop(next);
        let mut rows = Vec::with_capacity(num_rows);
        for _ in 0..num_rows {
            rows.push(LinearRow::ascii_load(&mut tokens).ok_or(MatrixError::AsciiFormat)?);
        }
        Ok(LinearSystem {
            rows,
            topology,
            row_kind_policy: Kind::RayOrPointOrInequality,
            first_pending,
            sorted,
        })
    }
}

fn widen_closed(row: &LinearRow) -> LinearRow {
    let flags = row.flags();
    let mut coeffs: Vec<_> = (0..row.width()).map(|i| row.at(i).clone()).collect();
    coeffs.push(crate::integer::Coefficient::zero());
    LinearRow::from_coefficients(coeffs, flags)
}

fn widen_nnc(row: &LinearRow) -> LinearRow {
    // Keep the epsilon column last: insert the new zero just before it.
    let flags = row.flags();
    let mut coeffs: Vec<_> = (0..row.width()).map(|i| row.at(i).clone()).collect();
    let eps = coeffs.pop().unwrap_or_else(crate::integer::Coefficient::zero);
    coeffs.push(crate::integer::Coefficient::zero());
    coeffs.push(eps);
    LinearRow::from_coefficients(coeffs, flags)
}

fn cmp_from_i32(c: i32) -> Ordering {
    c.cmp(&0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::integer::Coefficient;

    fn row(coeffs: &[i64], kind: Kind) -> LinearRow {
        LinearRow::from_coefficients(
            coeffs.iter().map(|&c| Coefficient::from_i64(c)).collect(),
            Flags::new(Topology::NecessarilyClosed, kind),
        )
    }

    #[test]
    fn bit_matrix_transpose_round_trips() {
        let mut m = BitMatrix::new(3);
        let mut r0 = BitRow::new();
        r0.set(1);
        m.add_row(r0);
        let mut r1 = BitRow::new();
        r1.set(0);
        r1.set(2);
        m.add_row(r1);
        let t = m.transpose();
        assert_eq!(t.num_rows(), 3);
        assert!(t.row(0).contains(1));
        assert!(t.row(1).contains(0));
        assert!(t.row(2).contains(1));
        let tt = t.transpose();
        assert_eq!(tt.num_rows(), m.num_rows());
        for i in 0..m.num_rows() {
            assert_eq!(tt.row(i), m.row(i));
        }
    }

    #[test]
    fn insert_tracks_pending_and_sortedness() {
        let mut sys = LinearSystem::new(Topology::NecessarilyClosed);
        sys.insert(row(&[0, 1, 0], Kind::RayOrPointOrInequality));
        sys.insert(row(&[0, 2, 0], Kind::RayOrPointOrInequality));
        assert!(sys.is_sorted());
        sys.insert_pending(row(&[0, 0, 1], Kind::RayOrPointOrInequality));
        assert_eq!(sys.first_pending(), 2);
        assert_eq!(sys.num_rows(), 3);
    }

    #[test]
    fn gauss_reduces_equalities() {
        let mut sys = LinearSystem::new(Topology::NecessarilyClosed);
        sys.insert(row(&[0, 1, 1], Kind::LineOrEquality));
        sys.insert(row(&[0, 1, -1], Kind::LineOrEquality));
        let rank = sys.gauss(2);
        assert_eq!(rank, 2);
    }

    #[test]
    fn ascii_dump_load_round_trips_a_system_with_pending_rows() {
        let mut sys = LinearSystem::new(Topology::NecessarilyClosed);
        sys.insert(row(&[0, 1, 0], Kind::RayOrPointOrInequality));
        sys.insert(row(&[0, 0, 1], Kind::LineOrEquality));
        sys.insert_pending(row(&[1, 0, 0], Kind::RayOrPointOrInequality));

        let dumped = sys.ascii_dump();
        let loaded = LinearSystem::ascii_load(&dumped).unwrap();

        assert_eq!(loaded.topology(), sys.topology());
        assert_eq!(loaded.num_rows(), sys.num_rows());
        assert_eq!(loaded.first_pending(), sys.first_pending());
        assert_eq!(loaded.is_sorted(), sys.is_sorted());
        for i in 0..sys.num_rows() {
            assert_eq!(loaded.row(i), sys.row(i));
        }
    }

    #[test]
    fn ascii_load_rejects_garbage() {
        assert!(LinearSystem::ascii_load("not a dump").is_err());
    }

    #[test]
    fn merge_rows_assign_dedups() {
        let mut a = LinearSystem::new(Topology::NecessarilyClosed);
        a.insert(row(&[0, 1, 0], Kind::RayOrPointOrInequality));
        a.sort_rows();
        let mut b = LinearSystem::new(Topology::NecessarilyClosed);
        b.insert(row(&[0, 1, 0], Kind::RayOrPointOrInequality));
        b.insert(row(&[0, 0, 1], Kind::RayOrPointOrInequality));
        b.sort_rows();
        a.merge_rows_assign(&b).unwrap();
        assert_eq!(a.num_rows(), 2);
    }
}
