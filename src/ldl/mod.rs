//! Incremental sparse LDLᵀ factorization.
//!
//! The factor is held in a single uncompressed [`CscMatrix`]: column
//! `j`'s leading slot stores `D[j]` (with row index `j`), followed by
//! the strictly-below-diagonal entries of unit-lower `L` in increasing
//! row order.  Column pointers are capacities computed once from the
//! worst-case (all constraints active) pattern; per-column occupancy
//! varies as rows are added, deleted, and fill is created by rank-1
//! updates.  An elimination tree with parent pointers accompanies the
//! factor and is maintained by every structural edit.
//!
//! [`CscMatrix`]: crate::sparse::CscMatrix

use thiserror::Error;

mod factor;
mod rowmod;
mod solve;
mod symbolic;
mod update;

pub use factor::*;
pub use rowmod::*;
pub use solve::*;
pub use symbolic::*;
pub use update::*;

/// Sentinel parent index for roots of the elimination tree.
pub const NO_PARENT: usize = usize::MAX;

/// Errors reported by factorization and update kernels.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum LdlError {
    /// A pivot `D[j]` came out exactly zero.  The caller recovers by
    /// refactorizing with a larger proximal shift.
    #[error("factorization produced a zero pivot")]
    ZeroPivot,
    /// A column would grow beyond the capacity reserved at setup.
    /// Indicates an internal provisioning bug; not recoverable.
    #[error("column capacity exceeded during factor update")]
    CapacityExceeded,
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
