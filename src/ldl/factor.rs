#![allow(non_snake_case)]

use super::{LdlError, NO_PARENT};
use crate::algebra::FloatT;
use crate::sparse::CscMatrix;

/// Dense working storage for the left-looking numeric factorization,
/// allocated once at setup.
#[derive(Debug)]
pub struct FactorScratch<T> {
    y_markers: Vec<bool>,
    y_idx: Vec<usize>,
    elim_buffer: Vec<usize>,
    next_colspace: Vec<usize>,
    y_vals: Vec<T>,
}

impl<T> FactorScratch<T>
where
    T: FloatT,
{
    pub fn new(n: usize) -> Self {
        Self {
            y_markers: vec![false; n],
            y_idx: vec![0; n],
            elim_buffer: vec![0; n],
            next_colspace: vec![0; n],
            y_vals: vec![T::zero(); n],
        }
    }
}

/// Left-looking LDLᵀ of the permuted upper-triangular matrix
/// `(Ap, Ai, Ax)`, written into the uncompressed factor `ld`.
///
/// Every column of the target must contain a diagonal entry; entries
/// within a column need not be sorted.  `etree` and `lnz` come from
/// [`etree_and_counts`](super::etree_and_counts) on the same pattern,
/// and every `lnz[j] + 1` must fit the corresponding column capacity of
/// `ld`.  On success `ld` holds `D[j]` in each column's leading slot
/// and the below-diagonal entries of unit-lower `L` in increasing row
/// order.
pub fn factor_numeric<T: FloatT>(
    ld: &mut CscMatrix<T>,
    etree: &[usize],
    lnz: &[usize],
    Ap: &[usize],
    Ai: &[usize],
    Ax: &[T],
    s: &mut FactorScratch<T>,
) -> Result<(), LdlError> {
    let n = ld.n;
    debug_assert_eq!(Ap.len(), n + 1);

    for j in 0..n {
        debug_assert!(lnz[j] + 1 <= ld.col_capacity(j));
        ld.set_col_nnz(j, lnz[j] + 1);
        s.next_colspace[j] = ld.colptr[j] + 1;
        ld.rowval[ld.colptr[j]] = j;
    }
    s.y_markers.fill(false);
    s.y_vals.fill(T::zero());

    for k in 0..n {
        // Compute a solution to y = L(0:k-1, 0:k-1) \ b, where b is the
        // kth column of the target above the diagonal.  y is then the
        // kth row of L, with an implied 1 at the diagonal.
        let mut Dk = T::zero();
        let mut nnz_y = 0;

        // determine where the nonzeros go in the kth row of L
        for p in Ap[k]..Ap[k + 1] {
            let bidx = Ai[p];

            if bidx == k {
                Dk += Ax[p];
                continue;
            }

            s.y_vals[bidx] = Ax[p];

            if !s.y_markers[bidx] {
                // walk the elimination tree to find the columns this
                // entry eliminates into
                s.y_markers[bidx] = true;
                s.elim_buffer[0] = bidx;
                let mut nnz_e = 1;

                let mut next_idx = etree[bidx];
                while next_idx != NO_PARENT && next_idx < k {
                    if s.y_markers[next_idx] {
                        break;
                    }
                    s.y_markers[next_idx] = true;
                    s.elim_buffer[nnz_e] = next_idx;
                    next_idx = etree[next_idx];
                    nnz_e += 1;
                }

                // buffered path goes into the ordering in reverse
                while nnz_e != 0 {
                    nnz_e -= 1;
                    s.y_idx[nnz_y] = s.elim_buffer[nnz_e];
                    nnz_y += 1;
                }
            }
        }

        // eliminate, deepest columns first
        for i in (0..nnz_y).rev() {
            let cidx = s.y_idx[i];
            let y_vals_cidx = s.y_vals[cidx];

            let first = ld.colptr[cidx];
            let tmp_idx = s.next_colspace[cidx];
            for q in (first + 1)..tmp_idx {
                s.y_vals[ld.rowval[q]] -= ld.nzval[q] * y_vals_cidx;
            }

            // the cidx-th element of y is now final; form the
            // corresponding element of row k of L
            let d = ld.nzval[first];
            let lki = y_vals_cidx / d;
            ld.nzval[tmp_idx] = lki;
            ld.rowval[tmp_idx] = k;
            Dk -= y_vals_cidx * lki;
            s.next_colspace[cidx] += 1;

            s.y_vals[cidx] = T::zero();
            s.y_markers[cidx] = false;
        }

        if Dk == T::zero() {
            return Err(LdlError::ZeroPivot);
        }
        let first = ld.colptr[k];
        ld.nzval[first] = Dk;
    }

    Ok(())
}
