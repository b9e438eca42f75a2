//! Bit rows and linear rows.
//!
//! `BitRow` is a dense set of non-negative integers backed by an
//! arbitrary-precision bit vector; it backs both the saturation matrix and
//! the sat-rows carried alongside destination rows during conversion.
//! `LinearRow` is a homogeneous coefficient vector with a topology/kind flag
//! pair, the row type constraints and generators are both built from.

#![forbid(unsafe_code)]

use std::cmp::Ordering;

use crate::integer::Coefficient;

/// Errors raised by row-level operations.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RowError {
    /// Two rows that must share a width disagree.
    #[error("row width mismatch: expected {expected}, found {found}")]
    WidthMismatch {
        /// The width required by context.
        expected: usize,
        /// The width actually present.
        found: usize,
    },
    /// An operation that requires a particular topology was given the other.
    #[error("topology mismatch")]
    TopologyMismatch,
    /// `linear_combine` was asked to eliminate a column that is already zero.
    #[error("cannot combine on a zero pivot at column {0}")]
    ZeroPivot(usize),
}

// ---------------------------------------------------------------------------
// Bit row
// ---------------------------------------------------------------------------

const LIMB_BITS: usize = u64::BITS as usize;

/// A dense, arbitrary-precision set of non-negative integers.
///
/// Backed by a `Vec<u64>` of limbs in canonical form: the vector never has a
/// trailing (most significant) all-zero limb, so two bit rows with the same
/// members always compare `==` regardless of history.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BitRow {
    limbs: Vec<u64>,
}

impl BitRow {
    /// An empty bit row.
    pub fn new() -> Self {
        BitRow { limbs: Vec::new() }
    }

    fn trim(&mut self) {
        while matches!(self.limbs.last(), Some(&0)) {
            self.limbs.pop();
        }
    }

    /// Whether `k` is a member.
    pub fn contains(&self, k: usize) -> bool {
        let (limb, bit) = (k / LIMB_BITS, k % LIMB_BITS);
        self.limbs.get(limb).is_some_and(|&w| (w >> bit) & 1 == 1)
    }

    /// Inserts `k`.
    pub fn set(&mut self, k: usize) {
        let (limb, bit) = (k / LIMB_BITS, k % LIMB_BITS);
        if limb >= self.limbs.len() {
            self.limbs.resize(limb + 1, 0);
        }
        self.limbs[limb] |= 1u64 << bit;
    }

    /// Removes `k`.
    pub fn clear(&mut self, k: usize) {
        let (limb, bit) = (k / LIMB_BITS, k % LIMB_BITS);
        if let Some(w) = self.limbs.get_mut(limb) {
            *w &= !(1u64 << bit);
            self.trim();
        }
    }

    /// Removes every member `>= k`.
    pub fn clear_from(&mut self, k: usize) {
        let limb = k / LIMB_BITS;
        let bit = k % LIMB_BITS;
        if limb < self.limbs.len() {
            self.limbs.truncate(limb + 1);
            if bit == 0 {
                self.limbs.truncate(limb);
            } else {
                let mask = (1u64 << bit) - 1;
                self.limbs[limb] &= mask;
            }
            self.trim();
        }
    }

    /// Inserts every non-negative integer strictly below `k`.
    pub fn set_until(&mut self, k: usize) {
        if k == 0 {
            return;
        }
        let full_limbs = k / LIMB_BITS;
        let rem = k % LIMB_BITS;
        if self.limbs.len() < full_limbs + if rem > 0 { 1 } else { 0 } {
            self.limbs.resize(full_limbs + if rem > 0 { 1 } else { 0 }, 0);
        }
        for w in self.limbs.iter_mut().take(full_limbs) {
            *w = u64::MAX;
        }
        if rem > 0 {
            self.limbs[full_limbs] |= (1u64 << rem) - 1;
        }
    }

    /// Clears every bit.
    pub fn clear_all(&mut self) {
        self.limbs.clear();
    }

    /// Whether no bit is set.
    pub fn is_empty(&self) -> bool {
        self.limbs.is_empty()
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.limbs.iter().map(|w| w.count_ones() as usize).sum()
    }

    /// The lowest set bit, if any.
    pub fn first(&self) -> Option<usize> {
        self.limbs
            .iter()
            .enumerate()
            .find(|&(_, &w)| w != 0)
            .map(|(i, &w)| i * LIMB_BITS + w.trailing_zeros() as usize)
    }

    /// The lowest set bit strictly greater than `position`, if any.
    pub fn next(&self, position: usize) -> Option<usize> {
        let start_bit = position + 1;
        let start_limb = start_bit / LIMB_BITS;
        if start_limb >= self.limbs.len() {
            return None;
        }
        let first_mask = !0u64 << (start_bit % LIMB_BITS);
        let masked = self.limbs[start_limb] & first_mask;
        if masked != 0 {
            return Some(start_limb * LIMB_BITS + masked.trailing_zeros() as usize);
        }
        for (i, &w) in self.limbs.iter().enumerate().skip(start_limb + 1) {
            if w != 0 {
                return Some(i * LIMB_BITS + w.trailing_zeros() as usize);
            }
        }
        None
    }

    /// The highest set bit, if any.
    pub fn last(&self) -> Option<usize> {
        self.limbs
            .iter()
            .enumerate()
            .rev()
            .find(|&(_, &w)| w != 0)
            .map(|(i, &w)| i * LIMB_BITS + (LIMB_BITS - 1 - w.leading_zeros() as usize))
    }

    /// The highest set bit strictly less than `position`, if any.
    pub fn prev(&self, position: usize) -> Option<usize> {
        if position == 0 {
            return None;
        }
        let last_bit = position - 1;
        let last_limb = last_bit / LIMB_BITS;
        if last_limb >= self.limbs.len() {
            return self.last();
        }
        let shift = LIMB_BITS - 1 - (last_bit % LIMB_BITS);
        let last_mask = if shift >= LIMB_BITS { 0 } else { !0u64 >> shift };
        let masked = self.limbs[last_limb] & last_mask;
        if masked != 0 {
            return Some(last_limb * LIMB_BITS + (LIMB_BITS - 1 - masked.leading_zeros() as usize));
        }
        for i in (0..last_limb).rev() {
            let w = self.limbs[i];
            if w != 0 {
                return Some(i * LIMB_BITS + (LIMB_BITS - 1 - w.leading_zeros() as usize));
            }
        }
        None
    }

    /// Bitwise union, in place.
    pub fn union_assign(&mut self, other: &BitRow) {
        if other.limbs.len() > self.limbs.len() {
            self.limbs.resize(other.limbs.len(), 0);
        }
        for (w, &o) in self.limbs.iter_mut().zip(&other.limbs) {
            *w |= o;
        }
        self.trim();
    }

    /// Bitwise union.
    pub fn union(&self, other: &BitRow) -> BitRow {
        let mut r = self.clone();
        r.union_assign(other);
        r
    }

    /// Bitwise intersection, in place.
    pub fn intersection_assign(&mut self, other: &BitRow) {
        for (i, w) in self.limbs.iter_mut().enumerate() {
            *w &= other.limbs.get(i).copied().unwrap_or(0);
        }
        self.trim();
    }

    /// Bitwise intersection.
    pub fn intersection(&self, other: &BitRow) -> BitRow {
        let mut r = self.clone();
        r.intersection_assign(other);
        r
    }

    /// `self \ other`, in place.
    pub fn difference_assign(&mut self, other: &BitRow) {
        for (i, w) in self.limbs.iter_mut().enumerate() {
            *w &= !other.limbs.get(i).copied().unwrap_or(0);
        }
        self.trim();
    }

    /// `self \ other`.
    pub fn difference(&self, other: &BitRow) -> BitRow {
        let mut r = self.clone();
        r.difference_assign(other);
        r
    }

    /// Whether `self` is a subset of (or equal to) `other`.
    pub fn subset_or_equal(&self, other: &BitRow) -> bool {
        self.limbs
            .iter()
            .enumerate()
            .all(|(i, &w)| w & !other.limbs.get(i).copied().unwrap_or(0) == 0)
    }

    /// Whether `self` is a strict subset of `other`.
    pub fn strict_subset(&self, other: &BitRow) -> bool {
        self.subset_or_equal(other) && self != other
    }

    /// Total order consistent with the subset relation on comparable sets:
    /// a proper subset compares strictly less than its superset.
    pub fn compare(&self, other: &BitRow) -> Ordering {
        match self.limbs.len().cmp(&other.limbs.len()) {
            Ordering::Equal => {
                for i in (0..self.limbs.len()).rev() {
                    match self.limbs[i].cmp(&other.limbs[i]) {
                        Ordering::Equal => continue,
                        ord => return ord,
                    }
                }
                Ordering::Equal
            }
            ord => ord,
        }
    }
}

impl PartialOrd for BitRow {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.compare(other))
    }
}

impl Ord for BitRow {
    fn cmp(&self, other: &Self) -> Ordering {
        self.compare(other)
    }
}

// ---------------------------------------------------------------------------
// Linear row
// ---------------------------------------------------------------------------

/// Whether a linear row lives in a closed or not-necessarily-closed space.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Topology {
    /// Strict inequalities are not representable; no ε column.
    NecessarilyClosed,
    /// Strict inequalities are representable via a trailing ε slack column.
    NotNecessarilyClosed,
}

/// Whether a row is a line/equality or a ray/point/inequality.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Kind {
    /// A line (in a generator system) or an equality (in a constraint system).
    LineOrEquality,
    /// A ray or point (generators) or an inequality (constraints).
    RayOrPointOrInequality,
}

/// The topology/kind flag pair carried by every [`LinearRow`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Flags {
    /// The row's topology.
    pub topology: Topology,
    /// The row's kind.
    pub kind: Kind,
}

impl Flags {
    /// Constructs a flag pair.
    pub fn new(topology: Topology, kind: Kind) -> Self {
        Flags { topology, kind }
    }
}

/// A homogeneous coefficient vector with a topology/kind flag pair.
///
/// Index 0 is the inhomogeneous term (constraints) or the divisor
/// (generators). When the topology is not-necessarily-closed, the *last*
/// coefficient is the ε slack and the effective space dimension is
/// `width - 2` rather than `width - 1`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LinearRow {
    coefficients: Vec<Coefficient>,
    flags: Flags,
}

impl LinearRow {
    /// Constructs an all-zero row of the given width.
    pub fn zero(width: usize, flags: Flags) -> Self {
        LinearRow {
            coefficients: vec![Coefficient::zero(); width],
            flags,
        }
    }

    /// Constructs a row from explicit coefficients.
    pub fn from_coefficients(coefficients: Vec<Coefficient>, flags: Flags) -> Self {
        LinearRow { coefficients, flags }
    }

    /// Row width (number of coefficients, including the inhomogeneous term
    /// and, when present, the ε column).
    pub fn width(&self) -> usize {
        self.coefficients.len()
    }

    /// The flag word.
    pub fn flags(&self) -> Flags {
        self.flags
    }

    /// The topology.
    pub fn topology(&self) -> Topology {
        self.flags.topology
    }

    /// The kind.
    pub fn kind(&self) -> Kind {
        self.flags.kind
    }

    /// Whether this row is a line or equality.
    pub fn is_line_or_equality(&self) -> bool {
        self.flags.kind == Kind::LineOrEquality
    }

    /// Whether this row is a ray, point, or inequality.
    pub fn is_ray_or_point_or_inequality(&self) -> bool {
        self.flags.kind == Kind::RayOrPointOrInequality
    }

    /// Demotes a line/equality to a ray/point/inequality.
    pub fn set_is_ray_or_point_or_inequality(&mut self) {
        self.flags.kind = Kind::RayOrPointOrInequality;
    }

    /// Promotes a ray/point/inequality to a line/equality.
    pub fn set_is_line_or_equality(&mut self) {
        self.flags.kind = Kind::LineOrEquality;
    }

    /// The inhomogeneous term (index 0).
    pub fn inhomogeneous_term(&self) -> &Coefficient {
        &self.coefficients[0]
    }

    /// Coefficient `k` of the homogeneous part (1-indexed: `coefficient(0)`
    /// is `self[1]`).
    pub fn coefficient(&self, k: usize) -> &Coefficient {
        &self.coefficients[k + 1]
    }

    /// Raw indexing into the underlying coefficient vector.
    pub fn at(&self, index: usize) -> &Coefficient {
        &self.coefficients[index]
    }

    /// Mutable raw indexing.
    pub fn at_mut(&mut self, index: usize) -> &mut Coefficient {
        &mut self.coefficients[index]
    }

    /// The vector-space dimension this row's homogeneous part covers.
    pub fn space_dimension(&self) -> usize {
        let reserved = match self.flags.topology {
            Topology::NecessarilyClosed => 1,
            Topology::NotNecessarilyClosed => 2,
        };
        self.coefficients.len().saturating_sub(reserved)
    }

    /// The ε slack coefficient, if this row is not-necessarily-closed.
    pub fn epsilon(&self) -> Option<&Coefficient> {
        match self.flags.topology {
            Topology::NecessarilyClosed => None,
            Topology::NotNecessarilyClosed => self.coefficients.last(),
        }
    }

    /// Mutable access to the ε slack coefficient.
    pub fn epsilon_mut(&mut self) -> Option<&mut Coefficient> {
        match self.flags.topology {
            Topology::NecessarilyClosed => None,
            Topology::NotNecessarilyClosed => self.coefficients.last_mut(),
        }
    }

    /// Whether every homogeneous coefficient (indices 1..w) is zero.
    pub fn all_homogeneous_terms_are_zero(&self) -> bool {
        self.coefficients[1..].iter().all(Coefficient::is_zero)
    }

    /// Divides the row by the gcd of its coefficients.
    pub fn normalize(&mut self) {
        let mut g = Coefficient::zero();
        for c in &self.coefficients {
            if !c.is_zero() {
                g = g.gcd(c);
            }
        }
        if g.is_zero() || g == Coefficient::one() {
            return;
        }
        for c in &mut self.coefficients {
            *c = c.div_exact(&g).expect("gcd of all coefficients divides each exactly");
        }
    }

    /// For lines/equalities: negates the whole row if the first non-zero
    /// homogeneous coefficient is negative. No-op for rays/points/inequalities.
    pub fn sign_normalize(&mut self) {
        if self.is_ray_or_point_or_inequality() {
            return;
        }
        if let Some(c) = self.coefficients[1..].iter().find(|c| !c.is_zero()) {
            if c.sign() == crate::integer::Sign::Negative {
                for c in &mut self.coefficients {
                    *c = -c.clone();
                }
            }
        }
    }

    /// `normalize` then `sign_normalize`.
    pub fn strong_normalize(&mut self) {
        self.normalize();
        self.sign_normalize();
    }

    /// Scalar product of the homogeneous parts of `self` and `other`
    /// (index 0 included, matching the reference's row-as-vector convention:
    /// the scalar product used by the conversion engine is taken over the
    /// full row, including the constraint's inhomogeneous term against the
    /// generator's divisor).
    pub fn scalar_product(&self, other: &LinearRow) -> Coefficient {
        let mut acc = Coefficient::zero();
        for (a, b) in self.coefficients.iter().zip(&other.coefficients) {
            acc = &acc + &(a * b);
        }
        acc
    }

    /// Eliminates coefficient `k` of `self` using `other`: computes
    /// `(a, b) = normalize2(self[k], other[k])`, replaces `self` by
    /// `b*self - a*other`, sets `self[k] = 0`, and re-normalizes.
    pub fn linear_combine(&mut self, other: &LinearRow, k: usize) -> Result<(), RowError> {
        if self.coefficients.len() != other.coefficients.len() {
            return Err(RowError::WidthMismatch {
                expected: self.coefficients.len(),
                found: other.coefficients.len(),
            });
        }
        if self.coefficients[k].is_zero() || other.coefficients[k].is_zero() {
            return Err(RowError::ZeroPivot(k));
        }
        let (a, b) = Coefficient::normalize2(&self.coefficients[k], &other.coefficients[k]);
        for i in 0..self.coefficients.len() {
            self.coefficients[i] = &(&b * &self.coefficients[i]) - &(&a * &other.coefficients[i]);
        }
        self.coefficients[k] = Coefficient::zero();
        self.strong_normalize();
        Ok(())
    }

    /// Row comparison used to keep linear systems sorted. Equalities/lines
    /// precede inequalities/rays; ties among homogeneous coefficients are
    /// compared lexicographically from index 1. Returns a signed value whose
    /// absolute value is 2 if rows differ in a homogeneous position and 1 if
    /// they differ only in the inhomogeneous term; 0 if equal.
    pub fn compare(&self, other: &LinearRow) -> i32 {
        let self_is_line = self.is_line_or_equality();
        let other_is_line = other.is_line_or_equality();
        if self_is_line != other_is_line {
            return if self_is_line { -2 } else { 2 };
        }
        let min_len = self.coefficients.len().min(other.coefficients.len());
        for i in 1..min_len {
            match self.coefficients[i].compare(&other.coefficients[i]) {
                Ordering::Less => return -2,
                Ordering::Greater => return 2,
                Ordering::Equal => {}
            }
        }
        for i in min_len..self.coefficients.len() {
            if !self.coefficients[i].is_zero() {
                return 2;
            }
        }
        for i in min_len..other.coefficients.len() {
            if !other.coefficients[i].is_zero() {
                return -2;
            }
        }
        match self.coefficients[0].compare(&other.coefficients[0]) {
            Ordering::Less => -1,
            Ordering::Greater => 1,
            Ordering::Equal => 0,
        }
    }

    /// Negates every coefficient in place.
    pub fn negate_mut(&mut self) {
        for c in &mut self.coefficients {
            *c = -c.clone();
        }
    }

    /// Appends this row's ascii dump (§6) to `out`: `size W v0 ... v{W-1} f
    /// <flags>`, where `<flags>` is the 4-token sequence `±RPI_V ±RPI
    /// ±NNC_V ±NNC`. This core's `Flags` collapsed the reference
    /// implementation's separate "is this bit meaningful" validity bits into
    /// a plain `(topology, kind)` pair, so the two `_V` tokens are always
    /// dumped `+`.
    pub fn ascii_dump(&self, out: &mut String) {
        out.push_str("size ");
        out.push_str(&self.coefficients.len().to_string());
        out.push(' ');
        for c in &self.coefficients {
            out.push_str(&c.to_string());
            out.push(' ');
        }
        out.push_str("f +RPI_V ");
        out.push_str(if self.is_ray_or_point_or_inequality() { "+RPI " } else { "-RPI " });
        out.push_str("+NNC_V ");
        out.push_str(if self.flags.topology == Topology::NotNecessarilyClosed { "+NNC" } else { "-NNC" });
        out.push('\n');
    }

    /// Parses one row from a token stream produced by
    /// [`str::split_whitespace`], the inverse of [`LinearRow::ascii_dump`].
    pub fn ascii_load<'a>(tokens: &mut impl Iterator<Item = &'a str>) -> Option<Self> {
        if tokens.next()? != "size" {
            return None;
        }
        let width: usize = tokens.next()?.parse().ok()?;
        let mut coefficients = Vec::with_capacity(width);
        for _ in 0..width {
            coefficients.push(Coefficient::parse(tokens.next()?)?);
        }
        if tokens.next()? != "f" {
            return None;
        }
        let _rpi_valid = tokens.next()?;
        let is_rpi = tokens.next()?.starts_with('+');
        let _nnc_valid = tokens.next()?;
        let is_nnc = tokens.next()?.starts_with('+');
        let topology = if is_nnc { Topology::NotNecessarilyClosed } else { Topology::NecessarilyClosed };
        let kind = if is_rpi { Kind::RayOrPointOrInequality } else { Kind::LineOrEquality };
        Some(LinearRow::from_coefficients(coefficients, Flags::new(topology, kind)))
    }

    /// Sets the row's topology, resizing to add/drop the ε column.
    pub fn set_topology(&mut self, topology: Topology) {
        match (self.flags.topology, topology) {
            (Topology::NecessarilyClosed, Topology::NotNecessarilyClosed) => {
                self.coefficients.push(Coefficient::zero());
            }
            (Topology::NotNecessarilyClosed, Topology::NecessarilyClosed) => {
                self.coefficients.pop();
            }
            _ => {}
        }
        self.flags.topology = topology;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn closed_ineq(coeffs: &[i64]) -> LinearRow {
        LinearRow::from_coefficients(
            coeffs.iter().map(|&c| Coefficient::from_i64(c)).collect(),
            Flags::new(Topology::NecessarilyClosed, Kind::RayOrPointOrInequality),
        )
    }

    #[test]
    fn bit_row_subset_order() {
        let mut a = BitRow::new();
        a.set(3);
        let mut b = BitRow::new();
        b.set(0);
        b.set(3);
        assert!(a.strict_subset(&b));
        assert_eq!(a.compare(&b), Ordering::Less);
    }

    #[test]
    fn bit_row_navigation() {
        let mut r = BitRow::new();
        r.set(2);
        r.set(70);
        assert_eq!(r.first(), Some(2));
        assert_eq!(r.next(2), Some(70));
        assert_eq!(r.last(), Some(70));
        assert_eq!(r.prev(70), Some(2));
        assert_eq!(r.count_ones(), 2);
    }

    #[test]
    fn bit_row_set_until_and_clear_from() {
        let mut r = BitRow::new();
        r.set_until(5);
        assert_eq!(r.count_ones(), 5);
        assert!(r.contains(0) && r.contains(4) && !r.contains(5));
        r.clear_from(2);
        assert_eq!(r.count_ones(), 2);
    }

    #[test]
    fn row_compare_is_antisymmetric() {
        let x = closed_ineq(&[0, 1, 2]);
        let y = closed_ineq(&[0, 1, 3]);
        assert_eq!(x.compare(&y), -2);
        assert_eq!(y.compare(&x), 2);
        assert_eq!(x.compare(&x), 0);
    }

    #[test]
    fn row_compare_inhomogeneous_only_difference_is_magnitude_one() {
        let x = closed_ineq(&[0, 1, 2]);
        let y = closed_ineq(&[5, 1, 2]);
        assert_eq!(x.compare(&y).abs(), 1);
    }

    #[test]
    fn strong_normalize_is_idempotent() {
        let mut r = LinearRow::from_coefficients(
            vec![Coefficient::zero(), Coefficient::from_i64(-4), Coefficient::from_i64(6)],
            Flags::new(Topology::NecessarilyClosed, Kind::LineOrEquality),
        );
        r.strong_normalize();
        let once = r.clone();
        r.strong_normalize();
        assert_eq!(r, once);
    }

    #[test]
    fn linear_combine_zeroes_pivot() {
        let mut x = closed_ineq(&[0, 4, 6]);
        let y = closed_ineq(&[0, 2, 3]);
        x.linear_combine(&y, 1).unwrap();
        assert!(x.at(1).is_zero());
    }

    #[test]
    fn ascii_dump_load_round_trips_a_line() {
        let row = LinearRow::from_coefficients(
            vec![Coefficient::zero(), Coefficient::from_i64(-4), Coefficient::from_i64(6)],
            Flags::new(Topology::NotNecessarilyClosed, Kind::LineOrEquality),
        );
        let mut dumped = String::new();
        row.ascii_dump(&mut dumped);
        let mut tokens = dumped.split_whitespace();
        let loaded = LinearRow::ascii_load(&mut tokens).unwrap();
        assert_eq!(loaded, row);
    }
}
