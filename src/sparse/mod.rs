//! Sparse matrix storage and kernels.
//!
//! The single matrix type [`CscMatrix`] serves both ordinary
//! compressed-column data (problem input, transposed constraint
//! blocks) and the solver's uncompressed working matrices, whose
//! columns keep reserved capacity so the active-set machinery can grow
//! and shrink them in place.

mod cscmatrix;
mod matrix_math;

pub use cscmatrix::*;
