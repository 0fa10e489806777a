#![allow(non_snake_case)]

use super::{find_missing, insert_rows, rank1_update, LdlError, Rank1Scratch, NO_PARENT};
use crate::algebra::FloatT;
use crate::sparse::CscMatrix;

/// Dense working storage for add-row / delete-row, allocated once at
/// setup.
#[derive(Debug)]
pub struct RowModScratch<T> {
    w_rows: Vec<usize>,
    w_vals: Vec<T>,
    pattern: Vec<usize>,
    visited: Vec<bool>,
    xdense: Vec<T>,
    missing: Vec<usize>,
}

impl<T> RowModScratch<T>
where
    T: FloatT,
{
    pub fn new(n: usize) -> Self {
        Self {
            w_rows: vec![0; n],
            w_vals: vec![T::zero(); n],
            pattern: vec![0; n],
            visited: vec![false; n],
            xdense: vec![T::zero(); n],
            missing: vec![0; n],
        }
    }
}

/// Delete row and column `pos` (natural index) from the factorization,
/// leaving an empty column with `D = 1` in its place.
///
/// The factorization identity is reconstituted by a rank-1 update with
/// the deleted column and `α = D_old`.  Returns the degradation flag
/// from the embedded rank-1 update.
pub fn delete_row<T: FloatT>(
    ld: &mut CscMatrix<T>,
    etree: &mut [usize],
    perm_inv: &[usize],
    pos: usize,
    eps_pivot: T,
    rs: &mut RowModScratch<T>,
    r1: &mut Rank1Scratch<T>,
) -> Result<bool, LdlError> {
    // the row deleted in the permuted matrix
    let k = perm_inv[pos];

    // step 1: remove row k from every earlier column
    for j in 0..k {
        let start1 = ld.colptr[j] + 1;
        let end = ld.col_end(j);
        if start1 >= end {
            continue;
        }
        if let Ok(off) = ld.rowval[start1..end].binary_search(&k) {
            let idx = start1 + off;
            for q in idx..(end - 1) {
                ld.rowval[q] = ld.rowval[q + 1];
                ld.nzval[q] = ld.nzval[q + 1];
            }
            let nnz = ld.col_nnz(j) - 1;
            ld.set_col_nnz(j, nnz);

            // k can only have been the parent of j if it was the first
            // below-diagonal row
            if etree[j] == k {
                debug_assert!(off == 0);
                etree[j] = if nnz > 1 { ld.rowval[start1] } else { NO_PARENT };
            }
        }
    }

    // step 2: neutralize the diagonal
    let start = ld.colptr[k];
    let d_old = ld.nzval[start];
    ld.nzval[start] = T::one();

    // step 3: rank-1 update with the deleted column restores the
    // identity on the trailing block
    let len = ld.col_nnz(k) - 1;
    rs.w_rows[..len].copy_from_slice(&ld.rowval[(start + 1)..(start + 1 + len)]);
    rs.w_vals[..len].copy_from_slice(&ld.nzval[(start + 1)..(start + 1 + len)]);
    let degraded = rank1_update(
        ld,
        etree,
        &rs.w_rows[..len],
        &rs.w_vals[..len],
        d_old,
        eps_pivot,
        r1,
    )?;

    // step 4: empty column k
    ld.set_col_nnz(k, 1);
    etree[k] = NO_PARENT;

    Ok(degraded)
}

/// Add row and column `pos` (natural index) back into the
/// factorization.
///
/// `new_col_rows` / `new_col_vals` give the off-diagonal entries of the
/// new column of `K` in natural indices (unsorted is fine, the
/// diagonal excluded); `diag_element` is the new diagonal value.  The
/// target column of `ld` must currently be empty (`D = 1` placeholder
/// from setup or [`delete_row`]).  Returns the degradation flag from
/// the embedded rank-1 update.
pub fn add_row<T: FloatT>(
    ld: &mut CscMatrix<T>,
    etree: &mut [usize],
    perm_inv: &[usize],
    pos: usize,
    new_col_rows: &[usize],
    new_col_vals: &[T],
    diag_element: T,
    eps_pivot: T,
    rs: &mut RowModScratch<T>,
    r1: &mut Rank1Scratch<T>,
) -> Result<bool, LdlError> {
    let k = perm_inv[pos];
    debug_assert_eq!(ld.col_nnz(k), 1);

    // permute the incoming pattern and sort it, values alongside
    let nc = new_col_rows.len();
    for (p, (&r, &v)) in new_col_rows.iter().zip(new_col_vals).enumerate() {
        debug_assert!(r != pos);
        rs.w_rows[p] = perm_inv[r];
        rs.w_vals[p] = v;
    }
    sort_pairs(&mut rs.w_rows[..nc], &mut rs.w_vals[..nc]);

    // The nonzero pattern of the new k-th row is the set of columns
    // reachable from the entries above k through the graph of
    // L(0:k-1, 0:k-1); the elimination subtree gives it without a
    // graph traversal.  Ancestors arrive in topological order, sorting
    // afterwards gives the order for the triangular solve.
    let mut pcount = 0;
    for p in 0..nc {
        let mut j = rs.w_rows[p];
        if j >= k {
            break;
        }
        while !rs.visited[j] {
            rs.visited[j] = true;
            rs.pattern[pcount] = j;
            pcount += 1;

            j = etree[j];
            if j == NO_PARENT || j >= k {
                break;
            }
        }
    }
    rs.pattern[..pcount].sort_unstable();
    for p in 0..pcount {
        rs.visited[rs.pattern[p]] = false;
    }

    // scatter the right-hand side; entries below k seed the new column
    for p in 0..pcount {
        rs.xdense[rs.pattern[p]] = T::zero();
    }
    for p in 0..nc {
        let pr = rs.w_rows[p];
        rs.xdense[pr] = rs.w_vals[p];
        if pr > k {
            let nnz = ld.col_nnz(k);
            if nnz >= ld.col_capacity(k) {
                return Err(LdlError::CapacityExceeded);
            }
            ld.rowval[ld.colptr[k] + nnz] = pr;
            ld.set_col_nnz(k, nnz + 1);
        }
    }

    // triangular solve against the leading block, simultaneously
    // accumulating the below-k part of the new column and absorbing
    // each pattern column's below-k support into column k
    for p in 0..pcount {
        let j = rs.pattern[p];

        let nmissing = {
            let jbelow = (ld.colptr[j] + 1)..ld.col_end(j);
            let kbelow = (ld.colptr[k] + 1)..ld.col_end(k);
            let mut cnt = 0;
            // only rows beyond k matter for the new column's pattern
            for &r in &ld.rowval[jbelow] {
                if r > k {
                    rs.missing[cnt] = r;
                    cnt += 1;
                }
            }
            find_missing(&ld.rowval[kbelow], &rs.missing[..cnt], &mut rs.w_rows)
        };
        for q in 0..nmissing {
            rs.xdense[rs.w_rows[q]] = T::zero();
        }
        insert_rows(ld, k, &rs.w_rows[..nmissing])?;

        let xj = rs.xdense[j];
        for q in (ld.colptr[j] + 1)..ld.col_end(j) {
            rs.xdense[ld.rowval[q]] -= ld.nzval[q] * xj;
        }
    }

    // insert the new row k into each pattern column and accumulate the
    // pivot
    let mut dk = diag_element;
    for p in 0..pcount {
        let j = rs.pattern[p];
        let start = ld.colptr[j];
        let end = ld.col_end(j);

        let d = ld.nzval[start];
        let l12 = rs.xdense[j];
        dk -= l12 * l12 / d;

        if ld.col_nnz(j) >= ld.col_capacity(j) {
            return Err(LdlError::CapacityExceeded);
        }
        let off = match ld.rowval[(start + 1)..end].binary_search(&k) {
            Ok(_) => unreachable!("row being added is already present"),
            Err(off) => off,
        };
        let idx = start + 1 + off;
        for q in (idx..end).rev() {
            ld.rowval[q + 1] = ld.rowval[q];
            ld.nzval[q + 1] = ld.nzval[q];
        }
        ld.rowval[idx] = k;
        ld.nzval[idx] = l12 / d;
        ld.set_col_nnz(j, end - start + 1);

        // k becomes the new parent when it lands in front
        if off == 0 {
            etree[j] = k;
        }
    }

    if dk == T::zero() {
        return Err(LdlError::ZeroPivot);
    }

    // write the new column and its parent link
    let start = ld.colptr[k];
    let end = ld.col_end(k);
    ld.nzval[start] = dk;
    for q in (start + 1)..end {
        ld.nzval[q] = rs.xdense[ld.rowval[q]] / dk;
    }
    etree[k] = if end > start + 1 {
        ld.rowval[start + 1]
    } else {
        NO_PARENT
    };

    // release the dense scratch before the final update
    for p in 0..pcount {
        rs.xdense[rs.pattern[p]] = T::zero();
    }
    for q in (start + 1)..end {
        rs.xdense[ld.rowval[q]] = T::zero();
    }

    // trailing block correction
    let len = end - (start + 1);
    rs.w_rows[..len].copy_from_slice(&ld.rowval[(start + 1)..end]);
    rs.w_vals[..len].copy_from_slice(&ld.nzval[(start + 1)..end]);
    let degraded = rank1_update(
        ld,
        etree,
        &rs.w_rows[..len],
        &rs.w_vals[..len],
        -dk,
        eps_pivot,
        r1,
    )?;

    Ok(degraded)
}

// insertion sort of parallel row/value arrays; columns are short
fn sort_pairs<T: Copy>(rows: &mut [usize], vals: &mut [T]) {
    for i in 1..rows.len() {
        let (r, v) = (rows[i], vals[i]);
        let mut j = i;
        while j > 0 && rows[j - 1] > r {
            rows[j] = rows[j - 1];
            vals[j] = vals[j - 1];
            j -= 1;
        }
        rows[j] = r;
        vals[j] = v;
    }
}
