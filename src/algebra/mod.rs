//! Scalar and dense vector operations.
//!
//! The solver ships its own minimal implementations of the vector
//! operations it needs, expressed through the [`VectorMath`] trait on
//! slices of the scalar type [`FloatT`].  Sparse matrix types live in
//! [`crate::sparse`].

mod error_types;
mod floats;
mod math_traits;
mod vecmath;

pub use error_types::*;
pub use floats::*;
pub use math_traits::*;
