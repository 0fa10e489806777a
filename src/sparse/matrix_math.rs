#![allow(non_snake_case)]

use super::CscMatrix;
use crate::algebra::{FloatT, VectorMath};

/// Matrix-vector products on the occupied pattern.  These read only
/// each column's occupied prefix, so they apply equally to compressed
/// matrices and to uncompressed ones with deactivated columns.
///
/// The solver's KKT products live beside the workspace instead: the
/// KKT matrix interleaves blocks with different row filters and
/// activity rules, which whole-matrix kernels cannot express.
impl<T> CscMatrix<T>
where
    T: FloatT,
{
    /// `y = a*Aᵀ*x + b*y`
    pub fn gemv_t(&self, y: &mut [T], x: &[T], a: T, b: T) {
        assert_eq!(x.len(), self.m);
        assert_eq!(y.len(), self.n);

        y.scale(b);
        if a == T::zero() {
            return;
        }
        for (j, yj) in y.iter_mut().enumerate() {
            let mut s = T::zero();
            for p in self.col_range(j) {
                s += self.nzval[p] * x[self.rowval[p]];
            }
            *yj += a * s;
        }
    }

    /// `y = a*S*x + b*y` where `S` is the symmetric matrix whose upper
    /// triangle is stored in `self`.
    ///
    /// # Panics
    /// Panics if an occupied entry lies below the diagonal.
    pub fn symv_triu(&self, y: &mut [T], x: &[T], a: T, b: T) {
        assert_eq!(self.m, self.n);
        assert_eq!(x.len(), self.n);
        assert_eq!(y.len(), self.n);

        y.scale(b);
        for (col, &xcol) in x.iter().enumerate() {
            for p in self.col_range(col) {
                let row = self.rowval[p];
                assert!(row <= col);
                let v = self.nzval[p];
                y[row] += a * v * xcol;
                if row != col {
                    y[col] += a * v * x[row];
                }
            }
        }
    }

    /// `yᵀ*S*x` with `S` the symmetric matrix whose upper triangle is
    /// stored in `self`.
    ///
    /// # Panics
    /// Panics if an occupied entry lies below the diagonal.
    pub fn quad_form(&self, y: &[T], x: &[T]) -> T {
        assert_eq!(self.m, self.n);
        assert_eq!(x.len(), self.n);
        assert_eq!(y.len(), self.n);

        let mut out = T::zero();
        for col in 0..self.n {
            let mut tmp1 = T::zero();
            let mut tmp2 = T::zero();
            for p in self.col_range(col) {
                let row = self.rowval[p];
                let v = self.nzval[p];
                if row < col {
                    tmp1 += v * x[row];
                    tmp2 += v * y[row];
                } else if row == col {
                    out += v * x[col] * y[col];
                } else {
                    panic!("matrix should be triu form");
                }
            }
            out += tmp1 * y[col] + tmp2 * x[col];
        }
        out
    }
}

#[test]
fn test_gemv_t() {
    // A = [1.  0.  4.]
    //     [2.  3.  0.]
    let A = CscMatrix::new(
        2,
        3,
        vec![0, 2, 3, 4],
        vec![0, 1, 1, 0],
        vec![1., 2., 3., 4.],
    );

    let mut yt = vec![0.; 3];
    A.gemv_t(&mut yt, &[1., 2.], 1., 0.);
    assert_eq!(yt, vec![5., 6., 4.]);

    let mut ys = vec![1.; 3];
    A.gemv_t(&mut ys, &[1., 2.], 2., -1.);
    assert_eq!(ys, vec![9., 11., 7.]);
}

#[test]
fn test_symv_and_quad_form() {
    // S = [2.  1.]
    //     [1.  3.]   stored triu
    let S = CscMatrix::new(2, 2, vec![0, 1, 3], vec![0, 0, 1], vec![2., 1., 3.]);

    let mut y = vec![0., 0.];
    S.symv_triu(&mut y, &[1., 2.], 1., 0.);
    assert_eq!(y, vec![4., 7.]);

    let x = vec![1., 2.];
    assert_eq!(S.quad_form(&x, &x), 18.);
}
