#![allow(non_snake_case)]

use super::NO_PARENT;

// AMD's default dense-row threshold works poorly on saddle-point
// systems; scaling it up gives consistently better orderings for KKT
// matrices.
const AMD_DENSE_SCALE: f64 = 1.5;

/// Fill-reducing ordering of a symmetric matrix given by the pattern of
/// its upper triangle.  Returns `(perm, perm_inv)` with
/// `perm[permuted] = natural` and `perm_inv[natural] = permuted`.
pub fn amd_order(n: usize, colptr: &[usize], rowval: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let mut control = amd::Control::default();
    control.dense *= AMD_DENSE_SCALE;
    // amd orders the pattern of A + Aᵀ, so the triu half suffices.
    // Failure is only possible for malformed patterns, which
    // check_format has already excluded.
    let (perm, perm_inv, _info) = amd::order(n, colptr, rowval, &control).unwrap();
    (perm, perm_inv)
}

/// Elimination tree and per-column below-diagonal counts of L for the
/// upper-triangular pattern `(Ap, Ai)`.
///
/// Entries within a column need not be sorted.  `work`, `Lnz` and
/// `etree` must have length `n`.  On return `etree[j]` is the parent of
/// column `j` or [`NO_PARENT`], and `Lnz[j]` counts the strictly
/// below-diagonal entries of column `j` of L including fill.
pub fn etree_and_counts(
    n: usize,
    Ap: &[usize],
    Ai: &[usize],
    work: &mut [usize],
    Lnz: &mut [usize],
    etree: &mut [usize],
) {
    work.fill(0);
    Lnz.fill(0);
    etree.fill(NO_PARENT);

    for j in 0..n {
        work[j] = j;
        for &istart in Ai.iter().take(Ap[j + 1]).skip(Ap[j]) {
            let mut i = istart;
            debug_assert!(i <= j);

            while work[i] != j {
                if etree[i] == NO_PARENT {
                    etree[i] = j;
                }
                Lnz[i] += 1; // nonzeros in this column
                work[i] = j;
                i = etree[i];
            }
        }
    }
}

#[test]
fn test_etree_arrow() {
    // arrow matrix: dense last row/column, diagonal elsewhere
    //   x . . x
    //   . x . x
    //   . . x x
    //   x x x x
    let Ap = vec![0, 1, 2, 3, 7];
    let Ai = vec![0, 1, 2, 0, 1, 2, 3];

    let n = 4;
    let mut work = vec![0; n];
    let mut Lnz = vec![0; n];
    let mut etree = vec![0; n];
    etree_and_counts(n, &Ap, &Ai, &mut work, &mut Lnz, &mut etree);

    assert_eq!(etree, vec![3, 3, 3, NO_PARENT]);
    assert_eq!(Lnz, vec![1, 1, 1, 0]);
}

#[test]
fn test_etree_chain_fill() {
    // tridiagonal-ish pattern produces a chain with no extra fill
    //   x x . .
    //   . x x .
    //   . . x x
    //   . . . x
    let Ap = vec![0, 1, 3, 5, 7];
    let Ai = vec![0, 0, 1, 1, 2, 2, 3];

    let n = 4;
    let mut work = vec![0; n];
    let mut Lnz = vec![0; n];
    let mut etree = vec![0; n];
    etree_and_counts(n, &Ap, &Ai, &mut work, &mut Lnz, &mut etree);

    assert_eq!(etree, vec![1, 2, 3, NO_PARENT]);
    assert_eq!(Lnz, vec![1, 1, 1, 0]);
}
