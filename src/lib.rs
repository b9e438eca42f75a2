//! Crate root: public surface, core aliases, and the double-description
//! invariant this library maintains.
//!
//! This module is the single canonical entry-point for downstream users. It
//! declares the submodules and re-exports the types most callers need, so
//! `use ppl_core::{Polyhedron, LinearRow, Topology};` is enough to get
//! started.
//!
//! ## Invariants
//!
//! - **Double description.** A [`Polyhedron`] always keeps a constraint
//!   system and a generator system that describe the same set; at least one
//!   side is current at all times (`C = {x : Cx ≥ 0}` and
//!   `G = {Gλ : λ ≥ 0, λ_line unrestricted}` agree whenever both are marked
//!   up to date).
//! - **Exact arithmetic.** All coefficients are arbitrary-precision integers
//!   ([`Coefficient`]); nothing in this crate rounds or approximates.
//! - **No unsafe.** Every module forbids it.
//! - **Bounded computation.** Conversion can be handed an
//!   [`watchdog::AbandonToken`] so a caller can bound how long a fold runs
//!   without resorting to `unsafe` interruption.
//!
//! If an invariant is violated at runtime, the failure mode is a precise
//! error, never a panic or silent wrong answer.

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms)]

/// Vector-space dimension and row/column index newtype.
pub mod dimension;
/// Arbitrary-precision exact integer coefficients.
pub mod integer;
/// Homogeneous linear rows (constraints or generators) and bit rows.
pub mod row;
/// Linear systems (`LinearSystem`) and raw bit matrices.
pub mod matrix;
/// Saturation matrices linking a constraint system to a generator system.
pub mod saturation;
/// The Chernikova-style conversion procedure.
pub mod conversion;
/// Redundancy removal (minimization) of an already-converted pair.
pub mod simplify;
/// The polyhedron façade tying constraints, generators, and saturation
/// together with lazy conversion/minimization.
pub mod polyhedron;
/// Bounded-deadline scheduler used to abandon a long-running conversion.
pub mod watchdog;
/// The crate-wide error aggregate.
pub mod errors;

// ============================================================================
// Canonical re-exports
// ============================================================================

/// The polyhedron façade and its supporting types.
pub use crate::polyhedron::{Optimum, Polyhedron, PolyhedronError, Relation};

/// Row-level types shared by constraints and generators.
pub use crate::row::{Flags, Kind, LinearRow, RowError, Topology};

/// Exact-precision coefficients and their sign.
pub use crate::integer::{Coefficient, IntegerError, Sign};

/// Linear systems and the raw bit matrices saturation is built from.
pub use crate::matrix::{BitMatrix, LinearSystem, MatrixError};

/// The saturation matrix linking a dual pair of linear systems.
pub use crate::saturation::SaturationMatrix;

/// Dimension/index newtype.
pub use crate::dimension::Dimension;

/// Conversion entry point and its error type.
pub use crate::conversion::{convert, ConversionError};

/// Minimization entry point.
pub use crate::simplify::simplify;

/// The watchdog scheduler and abandon mechanism.
pub use crate::watchdog::{AbandonToken, Clock, EventHandle, FakeClock, Handler, SystemClock, Time, Watchdog, WatchdogError};

/// The crate-wide error aggregate.
pub use crate::errors::PplError;
