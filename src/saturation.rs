//! The saturation matrix: a [`BitMatrix`] specialization whose rows are
//! indexed by one linear system's rows (generators, say) and columns by the
//! other's (constraints), with bit (i, j) set iff generator i does **not**
//! saturate constraint j.

#![forbid(unsafe_code)]

use crate::matrix::BitMatrix;
use crate::row::BitRow;

/// A bit matrix recording, for every (dual-row, primal-row) pair, whether
/// the scalar product is nonzero (i.e. the pair does *not* saturate).
#[derive(Clone, Debug, Default)]
pub struct SaturationMatrix {
    inner: BitMatrix,
}

impl SaturationMatrix {
    /// An empty saturation matrix with `num_columns` primal rows tracked.
    pub fn new(num_columns: usize) -> Self {
        SaturationMatrix {
            inner: BitMatrix::new(num_columns),
        }
    }

    /// Number of dual rows (generators, typically).
    pub fn num_rows(&self) -> usize {
        self.inner.num_rows()
    }

    /// Number of primal columns (constraints, typically).
    pub fn num_columns(&self) -> usize {
        self.inner.num_columns()
    }

    /// The sat-row for dual row `i`.
    pub fn row(&self, i: usize) -> &BitRow {
        self.inner.row(i)
    }

    /// Mutable access to the sat-row for dual row `i`.
    pub fn row_mut(&mut self, i: usize) -> &mut BitRow {
        self.inner.row_mut(i)
    }

    /// Appends a fresh, all-zero sat-row (e.g. for a newly generated ray).
    pub fn add_empty_row(&mut self) {
        self.inner.add_empty_row();
    }

    /// Appends an explicit sat-row.
    pub fn add_row(&mut self, row: BitRow) {
        self.inner.add_row(row);
    }

    /// Removes the sat-row at `i`.
    pub fn remove_row_at(&mut self, i: usize) -> BitRow {
        self.inner.remove_row_at(i)
    }

    /// Swaps two sat-rows.
    pub fn swap_rows(&mut self, i: usize, j: usize) {
        self.inner.swap_rows(i, j);
    }

    /// Truncates to `new_num_rows` sat-rows.
    pub fn rows_erase_to_end(&mut self, new_num_rows: usize) {
        self.inner.rows_erase_to_end(new_num_rows);
    }

    /// Drops every column `>= new_num_columns` from every sat-row.
    pub fn columns_erase_to_end(&mut self, new_num_columns: usize) {
        self.inner.columns_erase_to_end(new_num_columns);
    }

    /// Sets bit (i, j): dual row `i` does not saturate primal row `j`.
    pub fn set(&mut self, i: usize, j: usize) {
        self.inner.row_mut(i).set(j);
    }

    /// Whether dual row `i` does not saturate primal row `j`.
    pub fn get(&self, i: usize, j: usize) -> bool {
        self.inner.row(i).contains(j)
    }

    /// Transposes rows and columns.
    pub fn transpose(&self) -> SaturationMatrix {
        SaturationMatrix {
            inner: self.inner.transpose(),
        }
    }

    /// Overrides the declared column count (advisory; individual rows grow
    /// themselves on `set` regardless). Used by the conversion engine to
    /// keep the declared width in step with the number of source rows
    /// processed so far.
    pub fn set_num_columns(&mut self, n: usize) {
        self.inner.set_num_columns(n);
    }

    /// Replaces every row wholesale, e.g. after reordering lines to the
    /// front.
    pub fn replace_rows(&mut self, rows: Vec<BitRow>) {
        self.inner.replace_rows(rows);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn saturation_bit_semantics() {
        let mut sat = SaturationMatrix::new(3);
        sat.add_empty_row();
        sat.set(0, 1);
        assert!(sat.get(0, 1));
        assert!(!sat.get(0, 0));
    }
}
