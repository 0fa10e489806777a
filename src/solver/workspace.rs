#![allow(non_snake_case)]

use super::Model;
use crate::algebra::*;
use crate::ldl::{
    amd_order, etree_and_counts, factor_numeric, FactorScratch, LdlError, Rank1Scratch,
    RowModScratch, NO_PARENT,
};
use crate::sparse::CscMatrix;

/// All working storage for a solve, allocated once at setup from the
/// worst-case (every inequality active) symbolic analysis and borrowed
/// by the solve loop.  Nothing here is visible to callers.
pub struct Workspace<T> {
    pub(crate) n: usize,
    pub(crate) n_eq: usize,
    pub(crate) n_in: usize,

    // scaled problem data.  The KKT matrix holds the scaled H, Aᵀ and
    // Cᵀ blocks as three column bands; each constraint column ends
    // with a diagonal slot.  Inequality columns have occupancy zero
    // while inactive, with values parked in the reserved capacity.
    pub(crate) kkt: CscMatrix<T>,
    pub(crate) g_scaled: Vec<T>,
    pub(crate) b_scaled: Vec<T>,
    pub(crate) l_scaled: Vec<T>,
    pub(crate) u_scaled: Vec<T>,

    // fill-reducing ordering and symbolic data
    pub(crate) perm: Vec<usize>,
    pub(crate) perm_inv: Vec<usize>,
    pub(crate) etree: Vec<usize>,
    pub(crate) lnz: Vec<usize>,
    pub(crate) etree_work: Vec<usize>,

    // the factor, D in each column's leading slot
    pub(crate) ldl: CscMatrix<T>,

    // permuted upper-triangular gather target for refactorization
    pub(crate) ktri_colptr: Vec<usize>,
    pub(crate) ktri_rowval: Vec<usize>,
    pub(crate) ktri_nzval: Vec<T>,
    pub(crate) ktri_next: Vec<usize>,

    // active set and its bijection onto the compacted active block
    pub(crate) active: Vec<bool>,
    pub(crate) active_up: Vec<bool>,
    pub(crate) active_lo: Vec<bool>,
    pub(crate) proposed: Vec<bool>,
    pub(crate) bij: Vec<usize>,
    pub(crate) active_list: Vec<usize>,
    pub(crate) n_active: usize,
    pub(crate) refactorize_pending: bool,

    // scaled iterates and their BCL snapshots
    pub(crate) x: Vec<T>,
    pub(crate) y: Vec<T>,
    pub(crate) z: Vec<T>,
    pub(crate) x_prev: Vec<T>,
    pub(crate) y_prev: Vec<T>,
    pub(crate) z_prev: Vec<T>,

    // scaled residuals maintained across the inner loop
    pub(crate) dual_residual: Vec<T>,
    pub(crate) primal_residual_eq: Vec<T>,
    pub(crate) primal_residual_in_lo: Vec<T>,
    pub(crate) primal_residual_in_up: Vec<T>,

    // Newton direction, right-hand side, refinement buffers
    pub(crate) dw: Vec<T>,
    pub(crate) rhs: Vec<T>,
    pub(crate) err: Vec<T>,
    pub(crate) sol_work: Vec<T>,

    // direction products and unscaling scratch
    pub(crate) Hdx: Vec<T>,
    pub(crate) ATdy: Vec<T>,
    pub(crate) CTdz: Vec<T>,
    pub(crate) tmp_n: Vec<T>,
    pub(crate) Adx: Vec<T>,
    pub(crate) tmp_eq: Vec<T>,
    pub(crate) Cdx: Vec<T>,
    pub(crate) tmp_in: Vec<T>,

    // line search breakpoints
    pub(crate) alphas: Vec<T>,

    // factorization scratch
    pub(crate) factor_scratch: FactorScratch<T>,
    pub(crate) r1_scratch: Rank1Scratch<T>,
    pub(crate) rowmod_scratch: RowModScratch<T>,
}

impl<T> Workspace<T>
where
    T: FloatT,
{
    pub fn new(n: usize, n_eq: usize, n_in: usize) -> Self {
        let n_tot = n + n_eq + n_in;
        Self {
            n,
            n_eq,
            n_in,
            kkt: CscMatrix::spalloc((n_tot, n_tot), 0),
            g_scaled: vec![T::zero(); n],
            b_scaled: vec![T::zero(); n_eq],
            l_scaled: vec![T::zero(); n_in],
            u_scaled: vec![T::zero(); n_in],
            perm: vec![0; n_tot],
            perm_inv: vec![0; n_tot],
            etree: vec![NO_PARENT; n_tot],
            lnz: vec![0; n_tot],
            etree_work: vec![0; n_tot],
            ldl: CscMatrix::spalloc((n_tot, n_tot), 0),
            ktri_colptr: vec![0; n_tot + 1],
            ktri_rowval: vec![],
            ktri_nzval: vec![],
            ktri_next: vec![0; n_tot],
            active: vec![false; n_in],
            active_up: vec![false; n_in],
            active_lo: vec![false; n_in],
            proposed: vec![false; n_in],
            bij: vec![0; n_in],
            active_list: vec![0; n_in],
            n_active: 0,
            refactorize_pending: false,
            x: vec![T::zero(); n],
            y: vec![T::zero(); n_eq],
            z: vec![T::zero(); n_in],
            x_prev: vec![T::zero(); n],
            y_prev: vec![T::zero(); n_eq],
            z_prev: vec![T::zero(); n_in],
            dual_residual: vec![T::zero(); n],
            primal_residual_eq: vec![T::zero(); n_eq],
            primal_residual_in_lo: vec![T::zero(); n_in],
            primal_residual_in_up: vec![T::zero(); n_in],
            dw: vec![T::zero(); n_tot],
            rhs: vec![T::zero(); n_tot],
            err: vec![T::zero(); n_tot],
            sol_work: vec![T::zero(); n_tot],
            Hdx: vec![T::zero(); n],
            ATdy: vec![T::zero(); n],
            CTdz: vec![T::zero(); n],
            tmp_n: vec![T::zero(); n],
            Adx: vec![T::zero(); n_eq],
            tmp_eq: vec![T::zero(); n_eq],
            Cdx: vec![T::zero(); n_in],
            tmp_in: vec![T::zero(); n_in],
            alphas: vec![T::zero(); 2 * n_in],
            factor_scratch: FactorScratch::new(n_tot),
            r1_scratch: Rank1Scratch::new(n_tot),
            rowmod_scratch: RowModScratch::new(n_tot),
        }
    }

    /// Assemble the KKT storage from the (unscaled) model, run the
    /// fill-reducing ordering and worst-case symbolic analysis, and
    /// allocate the factor.  Called once per `init`.
    pub fn setup(&mut self, model: &Model<T>) {
        let (n, n_eq, n_in) = (self.n, self.n_eq, self.n_in);
        let n_tot = n + n_eq + n_in;

        // column capacities: H columns as given, one extra diagonal
        // slot per constraint column
        let mut colptr = vec![0usize; n_tot + 1];
        for j in 0..n {
            colptr[j + 1] = colptr[j] + model.H.col_nnz(j);
        }
        for j in 0..n_eq {
            colptr[n + j + 1] = colptr[n + j] + model.At.col_nnz(j) + 1;
        }
        for i in 0..n_in {
            colptr[n + n_eq + i + 1] = colptr[n + n_eq + i] + model.Ct.col_nnz(i) + 1;
        }
        let cap = colptr[n_tot];

        self.kkt = CscMatrix {
            m: n_tot,
            n: n_tot,
            colptr,
            nnz_per_col: Some(vec![0; n_tot]),
            rowval: vec![0; cap],
            nzval: vec![T::zero(); cap],
        };

        // structural rows; values land in write_values
        for j in 0..n {
            let dest = self.kkt.colptr[j];
            let src = model.H.col_range(j);
            self.kkt.rowval[dest..dest + src.len()].copy_from_slice(&model.H.rowval[src]);
            let full = self.kkt.col_capacity(j);
            self.kkt.set_col_nnz(j, full);
        }
        for j in 0..n_eq {
            let col = n + j;
            let dest = self.kkt.colptr[col];
            let src = model.At.col_range(j);
            self.kkt.rowval[dest..dest + src.len()].copy_from_slice(&model.At.rowval[src]);
            self.kkt.rowval[self.kkt.colptr[col + 1] - 1] = col;
            let full = self.kkt.col_capacity(col);
            self.kkt.set_col_nnz(col, full);
        }
        for i in 0..n_in {
            let col = n + n_eq + i;
            let dest = self.kkt.colptr[col];
            let src = model.Ct.col_range(i);
            self.kkt.rowval[dest..dest + src.len()].copy_from_slice(&model.Ct.rowval[src]);
            self.kkt.rowval[self.kkt.colptr[col + 1] - 1] = col;
            // inequality columns start deactivated
            self.kkt.set_col_nnz(col, 0);
        }

        self.write_values(model);

        // ordering on the natural worst-case pattern
        let (perm, perm_inv) = amd_order(n_tot, &self.kkt.colptr, &self.kkt.rowval);
        self.perm = perm;
        self.perm_inv = perm_inv;

        // worst-case symbolic analysis fixes the factor capacities
        self.ktri_rowval = vec![0; cap + n_tot];
        self.ktri_nzval = vec![T::zero(); cap + n_tot];
        self.build_ktri(T::zero(), true);
        etree_and_counts(
            n_tot,
            &self.ktri_colptr,
            &self.ktri_rowval,
            &mut self.etree_work,
            &mut self.lnz,
            &mut self.etree,
        );

        let mut ldl_colptr = vec![0usize; n_tot + 1];
        for j in 0..n_tot {
            ldl_colptr[j + 1] = ldl_colptr[j] + self.lnz[j] + 1;
        }
        let lcap = ldl_colptr[n_tot];
        self.ldl = CscMatrix {
            m: n_tot,
            n: n_tot,
            colptr: ldl_colptr,
            nnz_per_col: Some(vec![1; n_tot]),
            rowval: vec![0; lcap],
            nzval: vec![T::zero(); lcap],
        };
        self.reset_factor();

        self.active.fill(false);
        self.n_active = 0;
        self.refactorize_pending = false;
    }

    // empty-factor state: every column holds only its D slot
    pub(crate) fn reset_factor(&mut self) {
        let n_tot = self.ldl.n;
        for j in 0..n_tot {
            let start = self.ldl.colptr[j];
            self.ldl.rowval[start] = j;
            self.ldl.nzval[start] = T::one();
            self.ldl.set_col_nnz(j, 1);
        }
        self.etree.fill(NO_PARENT);
    }

    /// Copy (unscaled) model values into the KKT blocks and the dense
    /// vectors.  The preconditioner scales them afterwards.
    pub(crate) fn write_values(&mut self, model: &Model<T>) {
        let (n, n_eq, n_in) = (self.n, self.n_eq, self.n_in);

        for j in 0..n {
            let dest = self.kkt.colptr[j];
            let src = model.H.col_range(j);
            self.kkt.nzval[dest..dest + src.len()].copy_from_slice(&model.H.nzval[src]);
        }
        for j in 0..n_eq {
            let dest = self.kkt.colptr[n + j];
            let src = model.At.col_range(j);
            self.kkt.nzval[dest..dest + src.len()].copy_from_slice(&model.At.nzval[src]);
        }
        for i in 0..n_in {
            let dest = self.kkt.colptr[n + n_eq + i];
            let src = model.Ct.col_range(i);
            self.kkt.nzval[dest..dest + src.len()].copy_from_slice(&model.Ct.nzval[src]);
        }

        self.g_scaled.copy_from(&model.g);
        self.b_scaled.copy_from(&model.b);
        self.l_scaled.copy_from(&model.l);
        self.u_scaled.copy_from(&model.u);
    }

    /// Install the proximal diagonal values: −1/μ_eq on equality
    /// columns, −1/μ_in on active inequality columns and the inert +1
    /// placeholder on inactive ones.
    pub(crate) fn set_diagonals(&mut self, mu_eq: T, mu_in: T) {
        let (n, n_eq, n_in) = (self.n, self.n_eq, self.n_in);
        for j in 0..n_eq {
            let slot = self.kkt.colptr[n + j + 1] - 1;
            self.kkt.nzval[slot] = -T::recip(mu_eq);
        }
        for i in 0..n_in {
            let slot = self.kkt.colptr[n + n_eq + i + 1] - 1;
            self.kkt.nzval[slot] = if self.active[i] {
                -T::recip(mu_in)
            } else {
                T::one()
            };
        }
    }

    /// Activate inequality `i`: restore the column's occupancy and
    /// penalty diagonal, and append it to the active-block bijection.
    pub(crate) fn set_active(&mut self, i: usize, mu_in: T) {
        debug_assert!(!self.active[i]);
        let col = self.n + self.n_eq + i;
        let cap = self.kkt.col_capacity(col);
        self.kkt.set_col_nnz(col, cap);
        self.kkt.nzval[self.kkt.colptr[col + 1] - 1] = -T::recip(mu_in);

        self.bij[i] = self.n_active;
        self.active_list[self.n_active] = i;
        self.n_active += 1;
        self.active[i] = true;
    }

    /// Deactivate inequality `i`: zero the column's occupancy, park
    /// the inert diagonal, and compact the bijection by swapping with
    /// the last active slot.
    pub(crate) fn set_inactive(&mut self, i: usize) {
        debug_assert!(self.active[i]);
        let col = self.n + self.n_eq + i;
        self.kkt.set_col_nnz(col, 0);
        self.kkt.nzval[self.kkt.colptr[col + 1] - 1] = T::one();

        let slot = self.bij[i];
        let last = self.active_list[self.n_active - 1];
        self.active_list[slot] = last;
        self.bij[last] = slot;
        self.n_active -= 1;
        self.active[i] = false;
    }

    /// Gather the permuted upper triangle of the (active) KKT matrix
    /// into the ktri buffers, adding ρ on the first n diagonal entries
    /// and synthesizing a structural diagonal wherever the data has
    /// none.  With `full` set, every inequality column is treated as
    /// active; values are then meaningless and only the pattern
    /// matters.
    pub(crate) fn build_ktri(&mut self, rho: T, full: bool) {
        gather_permuted_triu(
            &self.kkt,
            self.n,
            self.n_eq,
            &self.active,
            &self.perm_inv,
            rho,
            full,
            &mut self.ktri_colptr,
            &mut self.ktri_rowval,
            &mut self.ktri_nzval,
            &mut self.ktri_next,
        );
    }

    /// Fresh symbolic-plus-numeric factorization of the active KKT
    /// matrix.  Clears any pending-refactorize flag on success.
    pub(crate) fn refactorize(&mut self, rho: T) -> Result<(), LdlError> {
        let n_tot = self.kkt.n;

        self.build_ktri(rho, false);
        etree_and_counts(
            n_tot,
            &self.ktri_colptr,
            &self.ktri_rowval,
            &mut self.etree_work,
            &mut self.lnz,
            &mut self.etree,
        );
        // the worst-case capacities from setup must cover the active
        // pattern; anything else is a provisioning bug
        for j in 0..n_tot {
            if self.lnz[j] + 1 > self.ldl.col_capacity(j) {
                return Err(LdlError::CapacityExceeded);
            }
        }

        factor_numeric(
            &mut self.ldl,
            &self.etree,
            &self.lnz,
            &self.ktri_colptr,
            &self.ktri_rowval,
            &self.ktri_nzval,
            &mut self.factor_scratch,
        )?;
        self.refactorize_pending = false;
        Ok(())
    }
}

// a column needs a diagonal synthesized when its gathered entries
// cannot contain one: H columns without a structural diagonal, and
// deactivated inequality columns whose diagonal slot is parked
fn needs_synthetic_diag<T: FloatT>(
    kkt: &CscMatrix<T>,
    n: usize,
    n_eq: usize,
    active: &[bool],
    c: usize,
    full: bool,
) -> bool {
    if c < n {
        let rng = kkt.col_range(c);
        rng.is_empty() || kkt.rowval[rng.end - 1] != c
    } else if c < n + n_eq {
        false
    } else {
        !full && !active[c - n - n_eq]
    }
}

// permuted upper-triangular gather; inactive inequality columns
// contribute only a synthesized inert diagonal, keeping the permuted
// matrix nonsingular without coupling anything
#[allow(clippy::too_many_arguments)]
fn gather_permuted_triu<T: FloatT>(
    kkt: &CscMatrix<T>,
    n: usize,
    n_eq: usize,
    active: &[bool],
    perm_inv: &[usize],
    rho: T,
    full: bool,
    colptr: &mut [usize],
    rowval: &mut [usize],
    nzval: &mut [T],
    counts: &mut [usize],
) {
    let n_tot = kkt.n;
    counts.fill(0);

    for c in 0..n_tot {
        let rng = if full {
            kkt.col_cap_range(c)
        } else {
            kkt.col_range(c)
        };
        for p in rng {
            let r = kkt.rowval[p];
            let (pr, pc) = (perm_inv[r], perm_inv[c]);
            counts[usize::max(pr, pc)] += 1;
        }
        if needs_synthetic_diag(kkt, n, n_eq, active, c, full) {
            counts[perm_inv[c]] += 1;
        }
    }

    colptr[0] = 0;
    for j in 0..n_tot {
        colptr[j + 1] = colptr[j] + counts[j];
    }
    debug_assert!(colptr[n_tot] <= rowval.len());
    counts.copy_from_slice(&colptr[0..n_tot]);

    for c in 0..n_tot {
        let rng = if full {
            kkt.col_cap_range(c)
        } else {
            kkt.col_range(c)
        };
        for p in rng {
            let r = kkt.rowval[p];
            let mut v = kkt.nzval[p];
            if r == c && c < n {
                v += rho;
            }
            let (pr, pc) = (perm_inv[r], perm_inv[c]);
            let tcol = usize::max(pr, pc);
            let dest = counts[tcol];
            rowval[dest] = usize::min(pr, pc);
            nzval[dest] = v;
            counts[tcol] += 1;
        }
        if needs_synthetic_diag(kkt, n, n_eq, active, c, full) {
            let v = if c < n { rho } else { T::one() };
            let pc = perm_inv[c];
            let dest = counts[pc];
            rowval[dest] = pc;
            nzval[dest] = v;
            counts[pc] += 1;
        }
    }
}

// ---------------
// matrix-free products against the KKT blocks
// ---------------

/// `out += H x` with H the symmetric block in columns `0..n`.
pub(crate) fn mul_h_sym<T: FloatT>(kkt: &CscMatrix<T>, n: usize, out: &mut [T], x: &[T]) {
    for c in 0..n {
        for p in kkt.col_range(c) {
            let r = kkt.rowval[p];
            let v = kkt.nzval[p];
            out[r] += v * x[c];
            if r != c {
                out[c] += v * x[r];
            }
        }
    }
}

/// `out += B x` where `Bᵀ` occupies the `ncols` KKT columns starting
/// at `base` (diagonal slots skipped).  Reads the full capacity, so
/// deactivated inequality columns participate.
pub(crate) fn mul_b_block<T: FloatT>(
    kkt: &CscMatrix<T>,
    n: usize,
    base: usize,
    ncols: usize,
    out: &mut [T],
    x: &[T],
) {
    for j in 0..ncols {
        let mut s = T::zero();
        for p in kkt.col_cap_range(base + j) {
            let r = kkt.rowval[p];
            if r < n {
                s += kkt.nzval[p] * x[r];
            }
        }
        out[j] += s;
    }
}

/// `out += Bᵀ x` for the same block layout as [`mul_b_block`].
pub(crate) fn mul_bt_block<T: FloatT>(
    kkt: &CscMatrix<T>,
    n: usize,
    base: usize,
    ncols: usize,
    out: &mut [T],
    x: &[T],
) {
    for j in 0..ncols {
        let xj = x[j];
        if xj == T::zero() {
            continue;
        }
        for p in kkt.col_cap_range(base + j) {
            let r = kkt.rowval[p];
            if r < n {
                out[r] += kkt.nzval[p] * xj;
            }
        }
    }
}

/// `out = K_active x`: symmetric product with the currently active
/// KKT matrix, including the ρ shift on the leading block and the
/// inert unit diagonal on deactivated inequality rows.
pub(crate) fn kkt_mul_active<T: FloatT>(
    kkt: &CscMatrix<T>,
    n: usize,
    n_eq: usize,
    active: &[bool],
    rho: T,
    out: &mut [T],
    x: &[T],
) {
    out.set(T::zero());
    for c in 0..kkt.n {
        for p in kkt.col_range(c) {
            let r = kkt.rowval[p];
            let v = kkt.nzval[p];
            out[r] += v * x[c];
            if r != c {
                out[c] += v * x[r];
            }
        }
    }
    for i in 0..n {
        out[i] += rho * x[i];
    }
    for (i, &a) in active.iter().enumerate() {
        if !a {
            let idx = n + n_eq + i;
            out[idx] += x[idx];
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_model() -> Model<f64> {
        let mut m = Model::new(2, 1, 3);
        let H = CscMatrix::identity(2);
        let A = CscMatrix::new(1, 2, vec![0, 1, 2], vec![0, 0], vec![1.0, 1.0]);
        // C = [1 0; 0 1; 1 1]
        let C = CscMatrix::new(3, 2, vec![0, 2, 4], vec![0, 2, 1, 2], vec![1.0, 1.0, 1.0, 1.0]);
        m.assign(
            &H,
            &[0.0, 0.0],
            &A,
            &[1.0],
            &C,
            &[1.0, 1.0, 1.0],
            &[0.0, 0.0, 0.0],
        )
        .unwrap();
        m
    }

    #[test]
    fn active_set_bijection_and_diagonals() {
        let model = small_model();
        let mut ws = Workspace::<f64>::new(2, 1, 3);
        ws.setup(&model);
        ws.set_diagonals(1e3, 1e1);

        let (n, n_eq) = (2, 1);
        let diag =
            |ws: &Workspace<f64>, i: usize| ws.kkt.nzval[ws.kkt.colptr[n + n_eq + i + 1] - 1];
        for i in 0..3 {
            assert_eq!(diag(&ws, i), 1.0);
            assert_eq!(ws.kkt.col_nnz(n + n_eq + i), 0);
        }

        ws.set_active(0, 1e1);
        ws.set_active(2, 1e1);
        assert_eq!(ws.n_active, 2);
        assert_eq!(diag(&ws, 0), -0.1);
        assert_eq!(diag(&ws, 1), 1.0);
        assert_eq!(diag(&ws, 2), -0.1);

        // the valid prefix of the bijection recovers each active index
        for &i in &[0usize, 2] {
            assert!(ws.bij[i] < ws.n_active);
            assert_eq!(ws.active_list[ws.bij[i]], i);
        }

        // removal compacts by swapping with the last active slot
        ws.set_inactive(0);
        assert_eq!(ws.n_active, 1);
        assert_eq!(ws.active_list[0], 2);
        assert_eq!(ws.bij[2], 0);
        assert_eq!(diag(&ws, 0), 1.0);
        assert_eq!(ws.kkt.col_nnz(n + n_eq), 0);

        ws.refactorize(1e-6).unwrap();
    }

    #[test]
    fn refactorize_solve_roundtrip() {
        let model = small_model();
        let mut ws = Workspace::<f64>::new(2, 1, 3);
        ws.setup(&model);
        ws.set_diagonals(1e3, 1e1);
        ws.set_active(1, 1e1);
        ws.refactorize(1e-6).unwrap();

        let n_tot = 6;
        let mut b: Vec<f64> = (0..n_tot).map(|i| (i as f64) - 2.5).collect();
        let b0 = b.clone();
        let mut work = vec![0.0; n_tot];
        crate::ldl::solve_in_place(&ws.ldl, &ws.perm, &ws.perm_inv, &mut b, &mut work);

        // K_active · K_active⁻¹ b recovers b
        let mut back = vec![0.0; n_tot];
        kkt_mul_active(&ws.kkt, 2, 1, &ws.active, 1e-6, &mut back, &b);
        for i in 0..n_tot {
            assert!((back[i] - b0[i]).abs() < 1e-8);
        }
    }
}
