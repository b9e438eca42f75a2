//! The crate-wide error aggregate.

#![forbid(unsafe_code)]

use crate::integer::IntegerError;
use crate::matrix::MatrixError;
use crate::polyhedron::PolyhedronError;
use crate::row::RowError;
use crate::watchdog::WatchdogError;

/// Any error this crate's non-generic operations can raise.
///
/// Conversion's [`crate::conversion::ConversionError`] is intentionally
/// excluded: it is generic over a client-supplied abandon reason `E`, which
/// has no single representation to fold into a non-generic enum. Callers
/// that use the abandon mechanism match on `ConversionError` directly.
#[derive(Debug, thiserror::Error)]
pub enum PplError {
    /// An integer arithmetic error.
    #[error(transparent)]
    Integer(#[from] IntegerError),
    /// A row-level error.
    #[error(transparent)]
    Row(#[from] RowError),
    /// A matrix/linear-system-level error.
    #[error(transparent)]
    Matrix(#[from] MatrixError),
    /// A watchdog scheduling error.
    #[error(transparent)]
    Watchdog(#[from] WatchdogError),
    /// A polyhedron-level error.
    #[error(transparent)]
    Polyhedron(#[from] PolyhedronError),
}
