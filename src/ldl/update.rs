#![allow(non_snake_case)]

use super::{LdlError, NO_PARENT};
use crate::algebra::FloatT;
use crate::sparse::CscMatrix;

/// Dense working storage for rank-1 updates, allocated once at setup.
#[derive(Debug)]
pub struct Rank1Scratch<T> {
    wdense: Vec<T>,
    pending: Vec<usize>,
    missing: Vec<usize>,
}

impl<T> Rank1Scratch<T>
where
    T: FloatT,
{
    pub fn new(n: usize) -> Self {
        Self {
            wdense: vec![T::zero(); n],
            pending: vec![0; n],
            missing: vec![0; n],
        }
    }
}

/// Row indices of `extra` that are absent from the sorted slice
/// `col_rows`, written to `out`.  Both inputs sorted ascending.
pub(crate) fn find_missing(col_rows: &[usize], extra: &[usize], out: &mut [usize]) -> usize {
    let mut a = 0;
    let mut count = 0;
    for &e in extra {
        while a < col_rows.len() && col_rows[a] < e {
            a += 1;
        }
        if a >= col_rows.len() || col_rows[a] != e {
            out[count] = e;
            count += 1;
        }
    }
    count
}

/// Insert sorted `missing` rows into the below-diagonal pattern of
/// column `j`, with zero values, shifting existing entries in place.
pub(crate) fn insert_rows<T: FloatT>(
    ld: &mut CscMatrix<T>,
    j: usize,
    missing: &[usize],
) -> Result<(), LdlError> {
    let m = missing.len();
    if m == 0 {
        return Ok(());
    }
    let nnz = ld.col_nnz(j);
    if nnz + m > ld.col_capacity(j) {
        return Err(LdlError::CapacityExceeded);
    }

    //backward merge of the below-diagonal region with the new rows
    let start1 = ld.colptr[j] + 1;
    let nb = nnz - 1;
    let mut a = nb;
    let mut b = m;
    let mut dest = nb + m;
    while b > 0 {
        if a > 0 && ld.rowval[start1 + a - 1] > missing[b - 1] {
            ld.rowval[start1 + dest - 1] = ld.rowval[start1 + a - 1];
            ld.nzval[start1 + dest - 1] = ld.nzval[start1 + a - 1];
            a -= 1;
        } else {
            ld.rowval[start1 + dest - 1] = missing[b - 1];
            ld.nzval[start1 + dest - 1] = T::zero();
            b -= 1;
        }
        dest -= 1;
    }
    ld.set_col_nnz(j, nnz + m);
    Ok(())
}

/// Rank-1 update of the factorization: `L'D'L'ᵀ = LDLᵀ + α·w·wᵀ`.
///
/// `w` is given by sorted permuted row indices `w_rows` and values
/// `w_vals`.  Columns are visited in topological order along the
/// elimination tree starting from the first nonzero of `w`; fill
/// created by the update is inserted into `ld` in place, and the etree
/// is kept consistent.  The sign of `α` is unrestricted: the augmented
/// KKT system is indefinite by design and pivots are allowed to change
/// sign, but an exactly zero pivot is an error.
///
/// Returns `true` if some pivot shrank below `eps_pivot` in magnitude,
/// signalling the caller to schedule a fresh factorization.
pub fn rank1_update<T: FloatT>(
    ld: &mut CscMatrix<T>,
    etree: &mut [usize],
    w_rows: &[usize],
    w_vals: &[T],
    alpha: T,
    eps_pivot: T,
    s: &mut Rank1Scratch<T>,
) -> Result<bool, LdlError> {
    let mut degraded = false;
    if w_rows.is_empty() || alpha == T::zero() {
        return Ok(degraded);
    }

    for (&r, &v) in w_rows.iter().zip(w_vals) {
        s.wdense[r] = v;
    }
    let mut pcount = w_rows.len();
    s.pending[..pcount].copy_from_slice(w_rows);

    let mut alpha = alpha;
    loop {
        let j = s.pending[0];

        // the remaining pattern of w must be absorbed into column j
        // before the numeric step can propagate through it
        let nmissing = {
            let below = (ld.colptr[j] + 1)..ld.col_end(j);
            find_missing(&ld.rowval[below], &s.pending[1..pcount], &mut s.missing)
        };
        insert_rows(ld, j, &s.missing[..nmissing])?;

        let start = ld.colptr[j];
        let end = ld.col_end(j);
        etree[j] = if end > start + 1 {
            ld.rowval[start + 1]
        } else {
            NO_PARENT
        };

        let wj = s.wdense[j];
        s.wdense[j] = T::zero();

        let d = ld.nzval[start];
        let dnew = d + alpha * wj * wj;
        if dnew == T::zero() {
            return Err(LdlError::ZeroPivot);
        }
        if T::abs(dnew) < eps_pivot {
            degraded = true;
        }
        let beta = alpha * wj / dnew;
        alpha = alpha * d / dnew;
        ld.nzval[start] = dnew;

        for p in (start + 1)..end {
            let i = ld.rowval[p];
            let wi = s.wdense[i] - wj * ld.nzval[p];
            ld.nzval[p] += beta * wi;
            s.wdense[i] = wi;
        }

        // w's support is now the below-diagonal pattern of column j
        pcount = end - (start + 1);
        if pcount == 0 {
            break;
        }
        s.pending[..pcount].copy_from_slice(&ld.rowval[(start + 1)..end]);

        if alpha == T::zero() {
            for &r in &s.pending[..pcount] {
                s.wdense[r] = T::zero();
            }
            break;
        }
    }

    Ok(degraded)
}
