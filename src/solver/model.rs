#![allow(non_snake_case)]

use super::SolverError;
use crate::algebra::*;
use crate::sparse::CscMatrix;

/// The problem data as supplied by the caller, unscaled.
///
/// `H` keeps only its upper triangle; `A` and `C` are stored
/// transposed so that their columns line up with the constraint
/// columns of the KKT matrix.  The unscaled copy is the reference for
/// termination measurements, infeasibility certificates, the objective
/// value, and structural checks during updates; the scaled working
/// copy lives in the workspace.
#[derive(Debug, Clone)]
pub struct Model<T> {
    pub n: usize,
    pub n_eq: usize,
    pub n_in: usize,
    pub H: CscMatrix<T>,
    pub g: Vec<T>,
    pub At: CscMatrix<T>,
    pub b: Vec<T>,
    pub Ct: CscMatrix<T>,
    pub l: Vec<T>,
    pub u: Vec<T>,
}

impl<T> Model<T>
where
    T: FloatT,
{
    pub fn new(n: usize, n_eq: usize, n_in: usize) -> Self {
        Self {
            n,
            n_eq,
            n_in,
            H: CscMatrix::spalloc((n, n), 0),
            g: vec![T::zero(); n],
            At: CscMatrix::spalloc((n, n_eq), 0),
            b: vec![T::zero(); n_eq],
            Ct: CscMatrix::spalloc((n, n_in), 0),
            l: vec![T::zero(); n_in],
            u: vec![T::zero(); n_in],
        }
    }

    /// Store a full problem, replacing any previous one.
    #[allow(clippy::too_many_arguments)]
    pub fn assign(
        &mut self,
        H: &CscMatrix<T>,
        g: &[T],
        A: &CscMatrix<T>,
        b: &[T],
        C: &CscMatrix<T>,
        u: &[T],
        l: &[T],
    ) -> Result<(), SolverError> {
        let (n, n_eq, n_in) = (self.n, self.n_eq, self.n_in);

        if H.m != n || H.n != n || g.len() != n {
            return Err(SolverError::DimensionMismatch);
        }
        if A.m != n_eq || A.n != n || b.len() != n_eq {
            return Err(SolverError::DimensionMismatch);
        }
        if C.m != n_in || C.n != n || l.len() != n_in || u.len() != n_in {
            return Err(SolverError::DimensionMismatch);
        }

        self.H = H.to_triu();
        self.g.copy_from(g);
        self.At = A.transpose();
        self.b.copy_from(b);
        self.Ct = C.transpose();
        self.l.copy_from(l);
        self.u.copy_from(u);
        self.cap_bounds();
        Ok(())
    }

    // bounds at or beyond the module infinity are capped at it, so a
    // single magnitude test identifies absent bounds everywhere
    pub(crate) fn cap_bounds(&mut self) {
        let infbound: T = crate::get_infinity().as_T();
        self.u.scalarop(|x| T::min(x, infbound));
        self.l.scalarop(|x| T::max(x, -infbound));
    }

    /// true when the bound is the infinity sentinel
    pub(crate) fn is_unbounded(v: T) -> bool {
        T::abs(v) >= crate::get_infinity().as_T()
    }

    /// infinity norm over the finite entries of a bound vector
    pub(crate) fn norm_inf_finite(v: &[T]) -> T {
        v.iter().fold(T::zero(), |acc, &x| {
            if Self::is_unbounded(x) {
                acc
            } else {
                T::max(acc, T::abs(x))
            }
        })
    }

    /// unscaled objective ½xᵀHx + gᵀx
    pub fn objective(&self, x: &[T]) -> T {
        self.H.quad_form(x, x) / (2.0).as_T() + self.g.dot(x)
    }

    /// true when `other` has the same dimensions and sparsity pattern
    pub(crate) fn same_structure(a: &CscMatrix<T>, d: &CscMatrix<T>) -> bool {
        a.m == d.m && a.n == d.n && a.colptr == d.colptr && a.rowval == d.rowval
    }
}
