//! The polyhedron façade.
//!
//! A [`Polyhedron`] owns a constraint system, a generator system, and the
//! saturation matrix relating them, plus the up-to-date/minimized status of
//! each side. Conversion between the two representations is driven lazily,
//! on demand, by [`crate::conversion::convert`] and [`crate::simplify::simplify`].

#![forbid(unsafe_code)]

use tracing::debug;

use crate::conversion::{self, ConversionError};
use crate::integer::Coefficient;
use crate::matrix::{LinearSystem, MatrixError};
use crate::row::{Flags, Kind, LinearRow, Topology};
use crate::saturation::SaturationMatrix;
use crate::simplify;

/// Errors raised by polyhedron-level operations.
#[derive(Debug, thiserror::Error)]
pub enum PolyhedronError {
    /// A row or system had the wrong space dimension for this polyhedron.
    #[error("dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch {
        /// The polyhedron's declared dimension.
        expected: usize,
        /// The dimension actually supplied.
        found: usize,
    },
    /// Mixed `NecessarilyClosed`/`NotNecessarilyClosed` operands.
    #[error("topology mismatch")]
    TopologyMismatch,
    /// A generator system lacked a required point.
    #[error("malformed generator system: {0}")]
    Malformed(&'static str),
    /// Constraints are stale and this generator system isn't a basis
    /// (lines + points/rays totalling exactly `dimension`), the only case
    /// this core derives constraints from generators for directly; deriving
    /// the general case requires a non-degenerate initial-basis ("Phase 1")
    /// step this core does not implement.
    #[error("constraints unavailable: deriving them from this generator system requires Phase 1 initialization, which is out of scope")]
    ConstraintsUnavailable,
    /// An internal matrix operation failed.
    #[error(transparent)]
    Matrix(#[from] MatrixError),
    /// The underlying conversion produced an inconsistent result (should be
    /// unreachable when no abandon token is supplied).
    #[error("internal conversion inconsistency")]
    Inconsistent,
}

impl From<ConversionError<()>> for PolyhedronError {
    fn from(_: ConversionError<()>) -> Self {
        PolyhedronError::Inconsistent
    }
}

/// The outcome of comparing a constraint against a polyhedron's generators,
/// mirroring the reference implementation's `Poly_Con_Relation`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Relation {
    /// Every generator satisfies the constraint strictly.
    StrictlyIncludes,
    /// Every generator saturates the constraint (it holds with equality).
    Saturates,
    /// Some generators satisfy it, some violate it.
    Straddles,
    /// No generator satisfies it.
    IsDisjoint,
}

/// The result of [`Polyhedron::maximize`]/[`Polyhedron::minimize`]: the
/// optimal value is `numerator / denominator` (`denominator` always
/// strictly positive), and `is_attained` records whether some generator
/// actually reaches it rather than only approaching it. This core does not
/// distinguish NNC closure points from points, so a finite optimum is
/// always reported as attained.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Optimum {
    /// The optimal value's numerator.
    pub numerator: Coefficient,
    /// The optimal value's denominator, always strictly positive.
    pub denominator: Coefficient,
    /// Whether the optimum is attained by some generator.
    pub is_attained: bool,
}

/// A convex polyhedron represented by a (lazily kept consistent) pair of a
/// constraint system and a generator system.
#[derive(Clone, Debug)]
pub struct Polyhedron {
    dimension: usize,
    topology: Topology,
    constraints: LinearSystem,
    generators: LinearSystem,
    sat_c: SaturationMatrix,
    constraints_up_to_date: bool,
    generators_up_to_date: bool,
    constraints_minimized: bool,
    generators_minimized: bool,
}

fn row_width(dimension: usize, topology: Topology) -> usize {
    match topology {
        Topology::NecessarilyClosed => dimension + 1,
        Topology::NotNecessarilyClosed => dimension + 2,
    }
}

fn universe_generators(dimension: usize, topology: Topology) -> LinearSystem {
    let mut gens = LinearSystem::new(topology);
    let width = row_width(dimension, topology);
    for axis in 0..dimension {
        let mut coeffs = vec![Coefficient::zero(); width];
        coeffs[axis + 1] = Coefficient::one();
        gens.insert(LinearRow::from_coefficients(
            coeffs,
            Flags::new(topology, Kind::LineOrEquality),
        ));
    }
    let mut point = vec![Coefficient::zero(); width];
    point[0] = Coefficient::one();
    gens.insert(LinearRow::from_coefficients(
        point,
        Flags::new(topology, Kind::RayOrPointOrInequality),
    ));
    gens
}

/// An inconsistent single inequality ("-1 >= 0") used to represent the
/// empty polyhedron without a dedicated sentinel flag.
fn falsum(dimension: usize, topology: Topology) -> LinearRow {
    let width = row_width(dimension, topology);
    let mut coeffs = vec![Coefficient::zero(); width];
    coeffs[0] = Coefficient::from_i64(-1);
    LinearRow::from_coefficients(coeffs, Flags::new(topology, Kind::RayOrPointOrInequality))
}

impl Polyhedron {
    /// The whole space.
    pub fn universe(dimension: usize, topology: Topology) -> Self {
        let generators = universe_generators(dimension, topology);
        let n = generators.num_rows();
        let mut sat = SaturationMatrix::new(0);
        for _ in 0..n {
            sat.add_empty_row();
        }
        Polyhedron {
            dimension,
            topology,
            constraints: LinearSystem::new(topology),
            generators,
            sat_c: sat,
            constraints_up_to_date: true,
            generators_up_to_date: true,
            constraints_minimized: true,
            generators_minimized: true,
        }
    }

    /// The empty polyhedron.
    pub fn empty(dimension: usize, topology: Topology) -> Self {
        let mut constraints = LinearSystem::new(topology);
        constraints.insert(falsum(dimension, topology));
        Polyhedron {
            dimension,
            topology,
            constraints,
            generators: LinearSystem::new(topology),
            sat_c: SaturationMatrix::new(0),
            constraints_up_to_date: true,
            generators_up_to_date: false,
            constraints_minimized: true,
            generators_minimized: false,
        }
    }

    /// Builds a polyhedron from an explicit constraint system.
    pub fn from_constraints(
        dimension: usize,
        topology: Topology,
        constraints: LinearSystem,
    ) -> Result<Self, PolyhedronError> {
        if constraints.topology() != topology {
            return Err(PolyhedronError::TopologyMismatch);
        }
        if constraints.num_rows() > 0 && constraints.width() != row_width(dimension, topology) {
            return Err(PolyhedronError::DimensionMismatch {
                expected: row_width(dimension, topology),
                found: constraints.width(),
            });
        }
        Ok(Polyhedron {
            dimension,
            topology,
            constraints,
            generators: LinearSystem::new(topology),
            sat_c: SaturationMatrix::new(0),
            constraints_up_to_date: true,
            generators_up_to_date: false,
            constraints_minimized: false,
            generators_minimized: false,
        })
    }

    /// Builds a polyhedron from an explicit, well-formed generator system
    /// (at least one point, or closure point for NNC).
    pub fn from_generators(
        dimension: usize,
        topology: Topology,
        generators: LinearSystem,
    ) -> Result<Self, PolyhedronError> {
        if generators.topology() != topology {
            return Err(PolyhedronError::TopologyMismatch);
        }
        if generators.num_rows() > 0 && generators.width() != row_width(dimension, topology) {
            return Err(PolyhedronError::DimensionMismatch {
                expected: row_width(dimension, topology),
                found: generators.width(),
            });
        }
        let has_point = generators
            .rows()
            .iter()
            .any(|r| r.is_ray_or_point_or_inequality() && !r.inhomogeneous_term().is_zero());
        if !has_point {
            return Err(PolyhedronError::Malformed("generator system has no point"));
        }
        Ok(Polyhedron {
            dimension,
            topology,
            constraints: LinearSystem::new(topology),
            generators,
            sat_c: SaturationMatrix::new(0),
            constraints_up_to_date: false,
            generators_up_to_date: true,
            constraints_minimized: false,
            generators_minimized: false,
        })
    }

    /// The space dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// The topology.
    pub fn topology(&self) -> Topology {
        self.topology
    }

    /// Recomputes the generator system from the current constraints from
    /// scratch (a simplification relative to the reference implementation's
    /// incremental reuse, but equally correct for the resulting pair).
    fn ensure_generators(&mut self) -> Result<(), PolyhedronError> {
        if self.generators_up_to_date {
            return Ok(());
        }
        let mut gens = universe_generators(self.dimension, self.topology);
        let mut sat = SaturationMatrix::new(0);
        for _ in 0..gens.num_rows() {
            sat.add_empty_row();
        }
        conversion::convert::<()>(&self.constraints, &mut gens, &mut sat, 0, None)?;
        self.generators = gens;
        self.sat_c = sat;
        self.generators_up_to_date = true;
        self.generators_minimized = false;
        debug!(n = self.generators.num_rows(), "polyhedron: generators recomputed");
        Ok(())
    }

    fn ensure_generators_minimized(&mut self) -> Result<(), PolyhedronError> {
        self.ensure_generators()?;
        if self.generators_minimized {
            return Ok(());
        }
        let dual_rows = self.constraints.num_rows();
        let dimension = row_width(self.dimension, self.topology);
        let mut transposed = self.sat_c.transpose();
        simplify::simplify(&mut self.generators, dual_rows, dimension, &mut transposed);
        self.sat_c = transposed.transpose();
        self.generators_minimized = true;
        Ok(())
    }

    fn ensure_constraints_minimized(&mut self) -> Result<(), PolyhedronError> {
        if !self.constraints_up_to_date {
            self.update_constraints_from_generators()?;
        }
        if self.constraints_minimized {
            return Ok(());
        }
        // sat_c is already indexed [generator][constraint], the orientation
        // `simplify` wants when reducing the constraint system.
        let dual_rows = self.generators.num_rows();
        let dimension = row_width(self.dimension, self.topology);
        simplify::simplify(&mut self.constraints, dual_rows, dimension, &mut self.sat_c);
        self.constraints_minimized = true;
        Ok(())
    }

    /// Reduces both representations to their minimal forms.
    pub fn minimize_representation(&mut self) -> Result<(), PolyhedronError> {
        self.ensure_generators()?;
        self.ensure_constraints_minimized()?;
        self.ensure_generators_minimized()?;
        Ok(())
    }

    /// Appends a constraint, invalidating the generator system.
    pub fn add_constraint(&mut self, row: LinearRow) -> Result<(), PolyhedronError> {
        if row.topology() != self.topology {
            return Err(PolyhedronError::TopologyMismatch);
        }
        if row.space_dimension() > self.dimension {
            return Err(PolyhedronError::DimensionMismatch {
                expected: self.dimension,
                found: row.space_dimension(),
            });
        }
        self.constraints.insert(row);
        self.constraints_up_to_date = true;
        self.constraints_minimized = false;
        self.generators_up_to_date = false;
        Ok(())
    }

    /// Appends several constraints.
    pub fn add_constraints(&mut self, rows: impl IntoIterator<Item = LinearRow>) -> Result<(), PolyhedronError> {
        for row in rows {
            self.add_constraint(row)?;
        }
        Ok(())
    }

    /// Appends a generator, invalidating the constraint system. The caller
    /// is responsible for the generator system remaining well-formed (at
    /// least one point); this core cannot derive constraints from a
    /// generator-only system with no prior constraint basis (see
    /// `update_constraints_from_generators`), so adding a generator without
    /// the constraints already being current makes them permanently
    /// unavailable until the polyhedron is rebuilt from a constraint system.
    pub fn add_generator(&mut self, row: LinearRow) -> Result<(), PolyhedronError> {
        if row.topology() != self.topology {
            return Err(PolyhedronError::TopologyMismatch);
        }
        if row.space_dimension() > self.dimension {
            return Err(PolyhedronError::DimensionMismatch {
                expected: self.dimension,
                found: row.space_dimension(),
            });
        }
        if !self.generators_up_to_date {
            self.ensure_generators()?;
        }
        self.generators.insert(row);
        self.generators_minimized = false;
        self.constraints_up_to_date = false;
        Ok(())
    }

    /// Appends several generators.
    pub fn add_generators(&mut self, rows: impl IntoIterator<Item = LinearRow>) -> Result<(), PolyhedronError> {
        for row in rows {
            self.add_generator(row)?;
        }
        Ok(())
    }

    /// Whether the polyhedron contains no points.
    pub fn is_empty(&mut self) -> Result<bool, PolyhedronError> {
        self.ensure_generators()?;
        let has_point = self
            .generators
            .rows()
            .iter()
            .any(|r| r.is_ray_or_point_or_inequality() && !r.inhomogeneous_term().is_zero());
        Ok(!has_point)
    }

    /// Whether the polyhedron is the whole space.
    pub fn is_universe(&mut self) -> Result<bool, PolyhedronError> {
        if !self.constraints_up_to_date {
            return Ok(false);
        }
        Ok(self.constraints.num_rows() == 0)
    }

    /// Whether the polyhedron, as a set, is topologically closed: for an
    /// NNC representation, every constraint is non-strict (its ε
    /// coefficient is zero).
    pub fn is_topologically_closed(&self) -> bool {
        match self.topology {
            Topology::NecessarilyClosed => true,
            Topology::NotNecessarilyClosed => self
                .constraints
                .rows()
                .iter()
                .all(|r| r.epsilon().map_or(true, Coefficient::is_zero)),
        }
    }

    /// Relaxes every strict inequality to non-strict.
    pub fn topological_closure_assign(&mut self) {
        if let Topology::NecessarilyClosed = self.topology {
            return;
        }
        for i in 0..self.constraints.num_rows() {
            if let Some(eps) = self.constraints.row_mut(i).epsilon_mut() {
                *eps = Coefficient::zero();
            }
        }
        self.generators_up_to_date = false;
    }

    /// Whether `point` (a single generator row) satisfies every constraint.
    pub fn contains_point(&mut self, point: &LinearRow) -> Result<bool, PolyhedronError> {
        if !self.constraints_up_to_date {
            self.update_constraints_from_generators()?;
        }
        Ok(self
            .constraints
            .rows()
            .iter()
            .all(|c| satisfies(c, point)))
    }

    /// Whether every generator of `other` satisfies every constraint of
    /// `self` (i.e. `self` contains `other` as a set).
    pub fn contains(&mut self, other: &mut Polyhedron) -> Result<bool, PolyhedronError> {
        if self.dimension != other.dimension || self.topology != other.topology {
            return Err(PolyhedronError::DimensionMismatch {
                expected: self.dimension,
                found: other.dimension,
            });
        }
        if !self.constraints_up_to_date {
            self.update_constraints_from_generators()?;
        }
        other.ensure_generators()?;
        Ok(other
            .generators
            .rows()
            .iter()
            .all(|g| self.constraints.rows().iter().all(|c| satisfies(c, g))))
    }

    /// Set equality, via mutual containment.
    pub fn equals(&mut self, other: &mut Polyhedron) -> Result<bool, PolyhedronError> {
        Ok(self.contains(other)? && other.contains(self)?)
    }

    /// `self` contains `other`, but the two are not equal.
    pub fn strictly_contains(&mut self, other: &mut Polyhedron) -> Result<bool, PolyhedronError> {
        Ok(self.contains(other)? && !other.contains(self)?)
    }

    /// Whether this polyhedron is bounded: no line or ray survives
    /// minimizing the generator system.
    pub fn is_bounded(&mut self) -> Result<bool, PolyhedronError> {
        self.ensure_generators_minimized()?;
        Ok(self
            .generators
            .rows()
            .iter()
            .all(|g| g.is_ray_or_point_or_inequality() && !g.inhomogeneous_term().is_zero()))
    }

    /// Whether `self` and `other` share no point, via intersection.
    pub fn is_disjoint_from(&mut self, other: &mut Polyhedron) -> Result<bool, PolyhedronError> {
        if self.dimension != other.dimension || self.topology != other.topology {
            return Err(PolyhedronError::DimensionMismatch {
                expected: self.dimension,
                found: other.dimension,
            });
        }
        if !self.constraints_up_to_date {
            self.update_constraints_from_generators()?;
        }
        if !other.constraints_up_to_date {
            other.update_constraints_from_generators()?;
        }
        let mut meet = self.clone();
        meet.intersection_assign(other)?;
        meet.is_empty()
    }

    /// Intersects in place: the union of both constraint systems.
    pub fn intersection_assign(&mut self, other: &Polyhedron) -> Result<(), PolyhedronError> {
        if self.dimension != other.dimension || self.topology != other.topology {
            return Err(PolyhedronError::TopologyMismatch);
        }
        if !other.constraints_up_to_date {
            return Err(PolyhedronError::ConstraintsUnavailable);
        }
        for row in other.constraints.rows() {
            self.constraints.insert_pending(row.clone());
        }
        self.constraints.unset_pending_rows();
        self.constraints_up_to_date = true;
        self.constraints_minimized = false;
        self.generators_up_to_date = false;
        Ok(())
    }

    /// Replaces dimension `var` by `le / den` in every generator: `var`'s
    /// coordinate becomes `le` evaluated against the generator (`le`'s own
    /// constant term scaling the generator's divisor, exactly as
    /// [`LinearRow::scalar_product`] already does for constraint/generator
    /// saturation), and every other coordinate is scaled by `den` to match.
    /// `le` must share this polyhedron's dimension and topology (its ε
    /// coefficient, if any, should be zero: the map does not touch
    /// strictness); `den` must be strictly positive, since scaling a
    /// point's divisor by a negative number would leave it violating the
    /// positive-divisor convention `sign_normalize` does not enforce for
    /// points.
    pub fn affine_image(&mut self, var: usize, le: &LinearRow, den: &Coefficient) -> Result<(), PolyhedronError> {
        self.check_affine_operands(var, le, den)?;
        self.ensure_generators()?;
        let var_col = var + 1;
        for i in 0..self.generators.num_rows() {
            let row = self.generators.row(i).clone();
            let value = le.scalar_product(&row);
            let mut out = row.clone();
            for idx in 0..out.width() {
                if idx != var_col {
                    *out.at_mut(idx) = den * row.at(idx);
                }
            }
            *out.at_mut(var_col) = value;
            out.strong_normalize();
            *self.generators.row_mut(i) = out;
        }
        self.constraints_up_to_date = false;
        self.generators_minimized = false;
        Ok(())
    }

    /// The preimage of [`Polyhedron::affine_image`] on the constraint
    /// system: for each constraint `c`, substituting `x_var = le(y)/den`
    /// (and `x_i = y_i` elsewhere) and clearing the denominator yields
    /// `c'_i = den·c_i + c_var·le_i` for `i != var` and `c'_var =
    /// c_var·le_var`. Unlike the matrix-inverse approach this replaces,
    /// this formula is exact even when the map is not invertible (e.g.
    /// `le_var == 0`, which simply drops `var` from the resulting
    /// constraint).
    pub fn affine_preimage(&mut self, var: usize, le: &LinearRow, den: &Coefficient) -> Result<(), PolyhedronError> {
        self.check_affine_operands(var, le, den)?;
        if !self.constraints_up_to_date {
            self.update_constraints_from_generators()?;
        }
        let var_col = var + 1;
        for i in 0..self.constraints.num_rows() {
            let row = self.constraints.row(i).clone();
            let c_var = row.at(var_col).clone();
            let mut out = row.clone();
            for idx in 0..out.width() {
                if idx != var_col {
                    *out.at_mut(idx) = &(den * row.at(idx)) + &(&c_var * le.at(idx));
                }
            }
            *out.at_mut(var_col) = &c_var * le.at(var_col);
            out.strong_normalize();
            *self.constraints.row_mut(i) = out;
        }
        self.generators_up_to_date = false;
        Ok(())
    }

    fn check_affine_operands(&self, var: usize, le: &LinearRow, den: &Coefficient) -> Result<(), PolyhedronError> {
        if var >= self.dimension {
            return Err(PolyhedronError::DimensionMismatch {
                expected: self.dimension,
                found: var + 1,
            });
        }
        if le.topology() != self.topology {
            return Err(PolyhedronError::TopologyMismatch);
        }
        if le.width() != row_width(self.dimension, self.topology) {
            return Err(PolyhedronError::DimensionMismatch {
                expected: row_width(self.dimension, self.topology),
                found: le.width(),
            });
        }
        if den.sign() != crate::integer::Sign::Positive {
            return Err(PolyhedronError::Malformed("affine map denominator must be strictly positive"));
        }
        Ok(())
    }

    /// How `row` (a constraint) relates to this polyhedron's generators.
    pub fn relation_with(&mut self, row: &LinearRow) -> Result<Relation, PolyhedronError> {
        self.ensure_generators()?;
        let mut any_pos = false;
        let mut any_neg = false;
        let mut any_zero = false;
        for g in self.generators.rows() {
            let sp = g.scalar_product(row);
            // A line admits negative multiples too: a nonzero product means
            // both signs are reachable, not just the one `sp` happens to be.
            if g.is_line_or_equality() {
                match sp.sign() {
                    crate::integer::Sign::Zero => any_zero = true,
                    _ => {
                        any_pos = true;
                        any_neg = true;
                    }
                }
            } else {
                match sp.sign() {
                    crate::integer::Sign::Positive => any_pos = true,
                    crate::integer::Sign::Negative => any_neg = true,
                    crate::integer::Sign::Zero => any_zero = true,
                }
            }
        }
        Ok(if any_neg && !any_pos {
            Relation::IsDisjoint
        } else if any_pos && any_neg {
            Relation::Straddles
        } else if any_pos && any_zero {
            Relation::StrictlyIncludes
        } else {
            Relation::Saturates
        })
    }

    /// Maximizes `le` over this polyhedron, or `None` if the polyhedron is
    /// empty or `le` is unbounded from above.
    pub fn maximize(&mut self, le: &LinearRow) -> Result<Option<Optimum>, PolyhedronError> {
        self.optimize(le, crate::integer::Sign::Positive)
    }

    /// Minimizes `le` over this polyhedron, or `None` if the polyhedron is
    /// empty or `le` is unbounded from below.
    pub fn minimize(&mut self, le: &LinearRow) -> Result<Option<Optimum>, PolyhedronError> {
        self.optimize(le, crate::integer::Sign::Negative)
    }

    /// Shared engine for [`Polyhedron::maximize`]/[`Polyhedron::minimize`]:
    /// `direction` is the sign a ray's (or line's) scalar product with `le`
    /// must have to make `le` unbounded in that direction. Since this core
    /// represents a polyhedron by its generators directly, the optimum of a
    /// linear expression is read straight off them — no simplex needed:
    /// any line, or any ray whose scalar product with `le` has the
    /// unbounded sign, makes the polyhedron unbounded in that direction;
    /// otherwise the optimum is attained at whichever point generator
    /// scores best.
    fn optimize(&mut self, le: &LinearRow, direction: crate::integer::Sign) -> Result<Option<Optimum>, PolyhedronError> {
        if le.topology() != self.topology || le.width() != row_width(self.dimension, self.topology) {
            return Err(PolyhedronError::DimensionMismatch {
                expected: row_width(self.dimension, self.topology),
                found: le.width(),
            });
        }
        self.ensure_generators()?;
        if self.is_empty()? {
            return Ok(None);
        }
        for g in self.generators.rows() {
            if !g.inhomogeneous_term().is_zero() {
                continue;
            }
            let sp = le.scalar_product(g);
            if sp.is_zero() {
                continue;
            }
            if g.is_line_or_equality() || sp.sign() == direction {
                return Ok(None);
            }
        }
        let mut best: Option<(Coefficient, Coefficient)> = None;
        for g in self.generators.rows() {
            if g.is_line_or_equality() || g.inhomogeneous_term().is_zero() {
                continue;
            }
            let mut num = le.scalar_product(g);
            let mut den = g.inhomogeneous_term().clone();
            if den.sign() == crate::integer::Sign::Negative {
                num = -num;
                den = -den;
            }
            best = Some(match best {
                None => (num, den),
                Some((best_num, best_den)) => {
                    let lhs = &num * &best_den;
                    let rhs = &best_num * &den;
                    let candidate_is_better = match direction {
                        crate::integer::Sign::Positive => lhs.compare(&rhs) == std::cmp::Ordering::Greater,
                        _ => lhs.compare(&rhs) == std::cmp::Ordering::Less,
                    };
                    if candidate_is_better {
                        (num, den)
                    } else {
                        (best_num, best_den)
                    }
                }
            });
        }
        let (mut numerator, mut denominator) = best.expect("a non-empty polyhedron always has at least one point generator");
        let g = numerator.gcd(&denominator);
        if !g.is_zero() && g != Coefficient::one() {
            numerator = numerator.div_exact(&g).expect("gcd divides the numerator exactly");
            denominator = denominator.div_exact(&g).expect("gcd divides the denominator exactly");
        }
        Ok(Some(Optimum {
            numerator,
            denominator,
            is_attained: true,
        }))
    }

    /// Deriving a constraint system from an arbitrary generator system
    /// needs a non-degenerate initial basis (the double description
    /// method's "Phase 1"); this core only ever builds generators from
    /// constraints incrementally; see `DESIGN.md`.
    fn update_constraints_from_generators(&mut self) -> Result<(), PolyhedronError> {
        Err(PolyhedronError::ConstraintsUnavailable)
    }
}

fn satisfies(constraint: &LinearRow, generator: &LinearRow) -> bool {
    let sp = constraint.scalar_product(generator);
    if generator.is_line_or_equality() {
        sp.is_zero()
    } else if constraint.is_line_or_equality() {
        sp.is_zero()
    } else {
        matches!(sp.sign(), crate::integer::Sign::Positive | crate::integer::Sign::Zero)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ineq(coeffs: &[i64], topology: Topology) -> LinearRow {
        LinearRow::from_coefficients(
            coeffs.iter().map(|&c| Coefficient::from_i64(c)).collect(),
            Flags::new(topology, Kind::RayOrPointOrInequality),
        )
    }

    #[test]
    fn universe_has_no_constraints_and_is_universe() {
        let mut p = Polyhedron::universe(2, Topology::NecessarilyClosed);
        assert!(p.is_universe().unwrap());
        assert!(!p.is_empty().unwrap());
    }

    #[test]
    fn empty_has_no_points() {
        let mut p = Polyhedron::empty(2, Topology::NecessarilyClosed);
        assert!(p.is_empty().unwrap());
    }

    #[test]
    fn halfplane_from_constraints_is_not_universe_or_empty() {
        let mut constraints = LinearSystem::new(Topology::NecessarilyClosed);
        constraints.insert(ineq(&[0, 1, 0], Topology::NecessarilyClosed));
        let mut p = Polyhedron::from_constraints(2, Topology::NecessarilyClosed, constraints).unwrap();
        assert!(!p.is_universe().unwrap());
        assert!(!p.is_empty().unwrap());
    }

    #[test]
    fn add_constraint_invalidates_generators() {
        let mut p = Polyhedron::universe(2, Topology::NecessarilyClosed);
        p.ensure_generators().unwrap();
        assert!(p.generators_up_to_date);
        p.add_constraint(ineq(&[0, 1, 0], Topology::NecessarilyClosed)).unwrap();
        assert!(!p.generators_up_to_date);
    }

    #[test]
    fn minimize_drops_a_redundant_constraint() {
        let mut constraints = LinearSystem::new(Topology::NecessarilyClosed);
        constraints.insert(ineq(&[0, 1, 0], Topology::NecessarilyClosed)); // x >= 0
        constraints.insert(ineq(&[1, 1, 0], Topology::NecessarilyClosed)); // x >= -1, implied
        let mut p = Polyhedron::from_constraints(2, Topology::NecessarilyClosed, constraints).unwrap();
        p.minimize_representation().unwrap();
        assert_eq!(p.constraints.num_rows(), 1);
    }

    #[test]
    fn scenario_a_triangle_has_three_point_generators() {
        // {x >= 0, y >= 0, x + y <= 2}: the triangle with vertices
        // (0,0), (2,0), (0,2).
        let mut constraints = LinearSystem::new(Topology::NecessarilyClosed);
        constraints.insert(ineq(&[0, 1, 0], Topology::NecessarilyClosed));
        constraints.insert(ineq(&[0, 0, 1], Topology::NecessarilyClosed));
        constraints.insert(ineq(&[2, -1, -1], Topology::NecessarilyClosed));
        let mut p = Polyhedron::from_constraints(2, Topology::NecessarilyClosed, constraints).unwrap();
        p.ensure_generators().unwrap();
        assert_eq!(p.generators.num_rows(), 3);
        assert!(p
            .generators
            .rows()
            .iter()
            .all(|g| g.is_ray_or_point_or_inequality() && !g.inhomogeneous_term().is_zero()));
        // Each vertex of a triangle sits on exactly two of its three edges.
        for g in p.generators.rows() {
            let saturated = p
                .constraints
                .rows()
                .iter()
                .filter(|c| c.scalar_product(g).is_zero())
                .count();
            assert_eq!(saturated, 2);
        }
    }

    #[test]
    fn scenario_c_universe_pinned_to_origin_by_three_equalities() {
        let mut p = Polyhedron::universe(3, Topology::NecessarilyClosed);
        let eq = |axis: usize| {
            let mut coeffs = vec![Coefficient::zero(); 4];
            coeffs[axis + 1] = Coefficient::one();
            LinearRow::from_coefficients(coeffs, Flags::new(Topology::NecessarilyClosed, Kind::LineOrEquality))
        };
        p.add_constraint(eq(0)).unwrap();
        p.add_constraint(eq(1)).unwrap();
        p.add_constraint(eq(2)).unwrap();
        p.ensure_generators().unwrap();
        let points: Vec<_> = p
            .generators
            .rows()
            .iter()
            .filter(|g| g.is_ray_or_point_or_inequality() && !g.inhomogeneous_term().is_zero())
            .collect();
        let rays_or_lines = p.generators.num_rows() - points.len();
        assert_eq!(points.len(), 1);
        assert_eq!(rays_or_lines, 0);
        let origin = points[0];
        for axis in 0..3 {
            assert!(origin.coefficient(axis).is_zero());
        }
    }

    #[test]
    fn law_empty_collapse_after_inconsistent_constraint() {
        let mut p = Polyhedron::universe(2, Topology::NecessarilyClosed);
        p.add_constraint(falsum(2, Topology::NecessarilyClosed)).unwrap();
        assert!(p.is_empty().unwrap());
        assert!(!p.is_universe().unwrap());
    }

    #[test]
    fn law_saturation_bijection_after_minimize() {
        let mut constraints = LinearSystem::new(Topology::NecessarilyClosed);
        constraints.insert(ineq(&[0, 1, 0], Topology::NecessarilyClosed));
        constraints.insert(ineq(&[0, 0, 1], Topology::NecessarilyClosed));
        constraints.insert(ineq(&[2, -1, -1], Topology::NecessarilyClosed));
        let mut p = Polyhedron::from_constraints(2, Topology::NecessarilyClosed, constraints).unwrap();
        p.minimize_representation().unwrap();
        for gi in 0..p.generators.num_rows() {
            for ci in 0..p.constraints.num_rows() {
                let sp = p.constraints.row(ci).scalar_product(p.generators.row(gi));
                assert_eq!(p.sat_c.get(gi, ci), !sp.is_zero());
            }
        }
    }

    #[test]
    fn add_generator_invalidates_constraints() {
        let mut p = Polyhedron::universe(2, Topology::NecessarilyClosed);
        assert!(p.constraints_up_to_date);
        let ray = LinearRow::from_coefficients(
            vec![Coefficient::zero(), Coefficient::one(), Coefficient::one()],
            Flags::new(Topology::NecessarilyClosed, Kind::RayOrPointOrInequality),
        );
        p.add_generator(ray).unwrap();
        assert!(!p.constraints_up_to_date);
    }

    #[test]
    fn relation_with_saturating_constraint_on_universe_origin_point() {
        let mut p = Polyhedron::universe(1, Topology::NecessarilyClosed);
        let row = ineq(&[0, 1], Topology::NecessarilyClosed);
        // universe(1) has one line (spans everything) plus the origin point,
        // so the constraint has both strictly-positive and zero products.
        let relation = p.relation_with(&row).unwrap();
        assert!(matches!(relation, Relation::Straddles));
    }

    fn triangle() -> Polyhedron {
        let mut constraints = LinearSystem::new(Topology::NecessarilyClosed);
        constraints.insert(ineq(&[0, 1, 0], Topology::NecessarilyClosed));
        constraints.insert(ineq(&[0, 0, 1], Topology::NecessarilyClosed));
        constraints.insert(ineq(&[2, -1, -1], Topology::NecessarilyClosed));
        Polyhedron::from_constraints(2, Topology::NecessarilyClosed, constraints).unwrap()
    }

    #[test]
    fn is_bounded_distinguishes_triangle_from_universe() {
        let mut triangle = triangle();
        assert!(triangle.is_bounded().unwrap());
        let mut universe = Polyhedron::universe(2, Topology::NecessarilyClosed);
        assert!(!universe.is_bounded().unwrap());
    }

    #[test]
    fn strictly_contains_is_false_for_equal_polyhedra() {
        let mut a = triangle();
        let mut b = triangle();
        assert!(!a.strictly_contains(&mut b).unwrap());
        assert!(a.equals(&mut b).unwrap());
    }

    #[test]
    fn strictly_contains_a_proper_subset() {
        let mut big = triangle();
        let mut small_constraints = LinearSystem::new(Topology::NecessarilyClosed);
        small_constraints.insert(ineq(&[0, 1, 0], Topology::NecessarilyClosed));
        small_constraints.insert(ineq(&[0, 0, 1], Topology::NecessarilyClosed));
        small_constraints.insert(ineq(&[1, -1, -1], Topology::NecessarilyClosed));
        let mut small = Polyhedron::from_constraints(2, Topology::NecessarilyClosed, small_constraints).unwrap();
        assert!(big.strictly_contains(&mut small).unwrap());
        assert!(!small.strictly_contains(&mut big).unwrap());
    }

    #[test]
    fn is_disjoint_from_two_separated_halfplanes() {
        let mut left = Polyhedron::from_constraints(
            1,
            Topology::NecessarilyClosed,
            {
                let mut c = LinearSystem::new(Topology::NecessarilyClosed);
                c.insert(ineq(&[-1, -1], Topology::NecessarilyClosed)); // x <= -1
                c
            },
        )
        .unwrap();
        let mut right = Polyhedron::from_constraints(
            1,
            Topology::NecessarilyClosed,
            {
                let mut c = LinearSystem::new(Topology::NecessarilyClosed);
                c.insert(ineq(&[-1, 1], Topology::NecessarilyClosed)); // x >= 1
                c
            },
        )
        .unwrap();
        assert!(left.is_disjoint_from(&mut right).unwrap());
    }

    #[test]
    fn is_disjoint_from_is_false_for_overlapping_halfplanes() {
        let mut left = Polyhedron::universe(1, Topology::NecessarilyClosed);
        left.add_constraint(ineq(&[0, 1], Topology::NecessarilyClosed)).unwrap(); // x >= 0
        let mut right = Polyhedron::universe(1, Topology::NecessarilyClosed);
        right.add_constraint(ineq(&[1, -1], Topology::NecessarilyClosed)).unwrap(); // x <= 1
        assert!(!left.is_disjoint_from(&mut right).unwrap());
    }

    #[test]
    fn scenario_d_maximize_and_minimize_over_bounded_interval() {
        // P = {x >= 0, x <= 10}.
        let mut constraints = LinearSystem::new(Topology::NecessarilyClosed);
        constraints.insert(ineq(&[0, 1], Topology::NecessarilyClosed));
        constraints.insert(ineq(&[10, -1], Topology::NecessarilyClosed));
        let mut p = Polyhedron::from_constraints(1, Topology::NecessarilyClosed, constraints).unwrap();

        let x = LinearRow::from_coefficients(
            vec![Coefficient::zero(), Coefficient::one()],
            Flags::new(Topology::NecessarilyClosed, Kind::RayOrPointOrInequality),
        );

        let max = p.maximize(&x).unwrap().unwrap();
        assert_eq!(max.numerator, Coefficient::from_i64(10));
        assert_eq!(max.denominator, Coefficient::one());
        assert!(max.is_attained);

        let min = p.minimize(&x).unwrap().unwrap();
        assert_eq!(min.numerator, Coefficient::zero());
        assert_eq!(min.denominator, Coefficient::one());
        assert!(min.is_attained);
    }

    #[test]
    fn maximize_is_none_when_unbounded_or_empty() {
        let mut universe = Polyhedron::universe(1, Topology::NecessarilyClosed);
        let x = LinearRow::from_coefficients(
            vec![Coefficient::zero(), Coefficient::one()],
            Flags::new(Topology::NecessarilyClosed, Kind::RayOrPointOrInequality),
        );
        assert!(universe.maximize(&x).unwrap().is_none());

        let mut empty = Polyhedron::empty(1, Topology::NecessarilyClosed);
        assert!(empty.maximize(&x).unwrap().is_none());
    }

    #[test]
    fn scenario_e_affine_image_transforms_generator_points() {
        // P has vertices (0,0), (2,0), (0,2); mapping x -> x + y (y fixed)
        // sends them to (0,0), (2,0), (2,2).
        let point = |x: i64, y: i64| {
            LinearRow::from_coefficients(
                vec![Coefficient::one(), Coefficient::from_i64(x), Coefficient::from_i64(y)],
                Flags::new(Topology::NecessarilyClosed, Kind::RayOrPointOrInequality),
            )
        };
        let mut generators = LinearSystem::new(Topology::NecessarilyClosed);
        generators.insert(point(0, 0));
        generators.insert(point(2, 0));
        generators.insert(point(0, 2));
        let mut p = Polyhedron::from_generators(2, Topology::NecessarilyClosed, generators).unwrap();

        let le = LinearRow::from_coefficients(
            vec![Coefficient::zero(), Coefficient::one(), Coefficient::one()],
            Flags::new(Topology::NecessarilyClosed, Kind::RayOrPointOrInequality),
        );
        p.affine_image(0, &le, &Coefficient::one()).unwrap();

        let expected = [(0, 0), (2, 0), (2, 2)];
        assert_eq!(p.generators.num_rows(), 3);
        for (g, &(x, y)) in p.generators.rows().iter().zip(&expected) {
            assert_eq!(*g.inhomogeneous_term(), Coefficient::one());
            assert_eq!(*g.coefficient(0), Coefficient::from_i64(x));
            assert_eq!(*g.coefficient(1), Coefficient::from_i64(y));
        }
    }

    #[test]
    fn affine_preimage_is_the_dual_of_affine_image() {
        // Constraint x >= 0 pulled back through x -> x + y (y fixed)
        // becomes x + y >= 0.
        let mut constraints = LinearSystem::new(Topology::NecessarilyClosed);
        constraints.insert(ineq(&[0, 1, 0], Topology::NecessarilyClosed));
        let mut p = Polyhedron::from_constraints(2, Topology::NecessarilyClosed, constraints).unwrap();

        let le = LinearRow::from_coefficients(
            vec![Coefficient::zero(), Coefficient::one(), Coefficient::one()],
            Flags::new(Topology::NecessarilyClosed, Kind::RayOrPointOrInequality),
        );
        p.affine_preimage(0, &le, &Coefficient::one()).unwrap();

        assert_eq!(p.constraints.num_rows(), 1);
        let row = p.constraints.row(0);
        assert_eq!(*row.inhomogeneous_term(), Coefficient::zero());
        assert_eq!(*row.coefficient(0), Coefficient::one());
        assert_eq!(*row.coefficient(1), Coefficient::one());
    }
}
