//! The proximal augmented-Lagrangian QP solver.
//!
//! [`QpSolver`] is the public entry point.  Problems take the form
//!
//! ```text
//! minimize   ½ xᵀHx + gᵀx
//! subject to Ax = b,  l ≤ Cx ≤ u
//! ```
//!
//! with `H` symmetric positive semidefinite.  The solver runs a BCL
//! outer loop around a primal-dual semismooth Newton method whose KKT
//! factorization is updated incrementally as the active set of
//! inequality constraints evolves.

use thiserror::Error;

mod model;
mod preconditioner;
mod qp;
mod results;
mod settings;
mod solve;
mod workspace;

pub use model::*;
pub use preconditioner::*;
pub use qp::*;
pub use results::*;
pub use settings::*;
pub use workspace::*;

/// Errors returned by solver entry points.  Inconclusive or infeasible
/// terminations are not errors; they are reported through
/// [`SolverStatus`](crate::solver::SolverStatus).
#[derive(Error, Debug)]
pub enum SolverError {
    /// Supplied shapes disagree with the solver's dimensions.
    #[error("supplied data dimensions are incompatible with the solver")]
    DimensionMismatch,
    /// A matrix supplied to `update` has a different nonzero pattern
    /// than the one given at `init`.  Re-initialize to change patterns.
    #[error("sparsity pattern differs from the pattern supplied at init")]
    StructuralMismatch,
    /// An internal column overflowed its reserved capacity.  This
    /// indicates a provisioning bug rather than a property of the
    /// problem data.
    #[error("internal capacity exceeded during factorization update")]
    CapacityExceeded,
    /// The factorization broke down and refactorizing with an
    /// increased proximal shift did not recover it.
    #[error("numerical breakdown in the KKT factorization")]
    NumericBreakdown,
}
