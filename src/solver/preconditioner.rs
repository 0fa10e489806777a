#![allow(non_snake_case)]

use crate::algebra::*;
use crate::sparse::CscMatrix;
use enum_dispatch::*;

// Ruiz defaults: sweep until the scaling is within epsilon of ones, or
// the iteration cap is hit
const RUIZ_EPSILON: f64 = 1e-3;
const RUIZ_MAX_ITER: usize = 10;

/// Mutable view of the scaled problem data: the KKT matrix holding the
/// H, Aᵀ and Cᵀ blocks, plus the dense vectors.  Constraint columns
/// carry a trailing diagonal slot (row index ≥ n) that no scaling
/// touches.
pub struct ScaledQpMut<'a, T> {
    pub n: usize,
    pub n_eq: usize,
    pub n_in: usize,
    pub kkt: &'a mut CscMatrix<T>,
    pub g: &'a mut [T],
    pub b: &'a mut [T],
    pub l: &'a mut [T],
    pub u: &'a mut [T],
}

/// The scaling seam between user data and the solver's internal
/// (scaled) spaces.  One method installs the scaling into the problem
/// data; the vector routines move iterates and residuals between the
/// two spaces and are the only legitimate path for doing so.
#[enum_dispatch]
pub trait Preconditioner<T>
where
    T: FloatT,
{
    /// Scale the problem data in place.  With `compute` set the
    /// scaling is recomputed from the data; otherwise the previously
    /// stored scaling is applied to (fresh, unscaled) data.
    fn scale_qp_in_place(&mut self, qp: &mut ScaledQpMut<T>, compute: bool);

    fn scale_primal(&self, v: &mut [T]);
    fn unscale_primal(&self, v: &mut [T]);
    fn scale_dual_eq(&self, v: &mut [T]);
    fn unscale_dual_eq(&self, v: &mut [T]);
    fn scale_dual_in(&self, v: &mut [T]);
    fn unscale_dual_in(&self, v: &mut [T]);
    fn scale_primal_residual_eq(&self, v: &mut [T]);
    fn unscale_primal_residual_eq(&self, v: &mut [T]);
    fn scale_primal_residual_in(&self, v: &mut [T]);
    fn unscale_primal_residual_in(&self, v: &mut [T]);
    fn scale_dual_residual(&self, v: &mut [T]);
    fn unscale_dual_residual(&self, v: &mut [T]);
}

/// The available preconditioners.
#[enum_dispatch(Preconditioner<T>)]
pub enum PreconditionerKind<T>
where
    T: FloatT,
{
    Ruiz(RuizEquilibration<T>),
    Identity(IdentityPreconditioner),
}

// ---------------
// Ruiz equilibration
// ---------------

/// Iterated row/column infinity-norm equilibration of the KKT blocks,
/// with an overall cost scaling factor.
pub struct RuizEquilibration<T> {
    n: usize,
    n_eq: usize,
    n_in: usize,
    /// cumulative diagonal scaling, length n + n_eq + n_in
    pub delta: Vec<T>,
    /// cumulative cost scaling, strictly positive
    pub c: T,
    epsilon: T,
    max_iter: usize,
    // per-sweep scratch
    delta_work: Vec<T>,
    norm_work: Vec<T>,
}

impl<T> RuizEquilibration<T>
where
    T: FloatT,
{
    pub fn new(n: usize, n_eq: usize, n_in: usize) -> Self {
        let n_tot = n + n_eq + n_in;
        Self {
            n,
            n_eq,
            n_in,
            delta: vec![T::one(); n_tot],
            c: T::one(),
            epsilon: RUIZ_EPSILON.as_T(),
            max_iter: RUIZ_MAX_ITER,
            delta_work: vec![T::one(); n_tot],
            norm_work: vec![T::zero(); n],
        }
    }

    fn equilibrate(&mut self, qp: &mut ScaledQpMut<T>) {
        let (n, n_eq, n_in) = (self.n, self.n_eq, self.n_in);
        let eps_machine = T::epsilon();

        for _ in 0..self.max_iter {
            let work = &mut self.delta_work;
            let norms = &mut self.norm_work;

            // infinity norms seen by each primal index: the symmetric
            // H column plus the matching rows of A and C
            norms.set(T::zero());
            for j in 0..n {
                for p in qp.kkt.col_cap_range(j) {
                    let v = T::abs(qp.kkt.nzval[p]);
                    let r = qp.kkt.rowval[p];
                    norms[j] = T::max(norms[j], v);
                    norms[r] = T::max(norms[r], v);
                }
            }
            for j in 0..(n_eq + n_in) {
                for p in qp.kkt.col_cap_range(n + j) {
                    let r = qp.kkt.rowval[p];
                    if r < n {
                        norms[r] = T::max(norms[r], T::abs(qp.kkt.nzval[p]));
                    }
                }
            }
            for i in 0..n {
                work[i] = scaling_from_norm(norms[i], eps_machine);
            }

            // constraint rows: infinity norm of each Aᵀ / Cᵀ column
            for j in 0..(n_eq + n_in) {
                let mut row_norm = T::zero();
                for p in qp.kkt.col_cap_range(n + j) {
                    if qp.kkt.rowval[p] < n {
                        row_norm = T::max(row_norm, T::abs(qp.kkt.nzval[p]));
                    }
                }
                work[n + j] = scaling_from_norm(row_norm, eps_machine);
            }

            // scale the blocks and vectors
            for j in 0..n {
                for p in qp.kkt.col_cap_range(j) {
                    let r = qp.kkt.rowval[p];
                    qp.kkt.nzval[p] *= work[j] * work[r];
                }
            }
            for j in 0..(n_eq + n_in) {
                for p in qp.kkt.col_cap_range(n + j) {
                    let r = qp.kkt.rowval[p];
                    if r < n {
                        qp.kkt.nzval[p] *= work[r] * work[n + j];
                    }
                }
            }
            qp.g.hadamard(&work[0..n]);
            qp.b.hadamard(&work[n..n + n_eq]);
            qp.l.hadamard(&work[n + n_eq..]);
            qp.u.hadamard(&work[n + n_eq..]);

            // cost normalization against the average H column norm
            norms.set(T::zero());
            for j in 0..n {
                for p in qp.kkt.col_cap_range(j) {
                    let v = T::abs(qp.kkt.nzval[p]);
                    let r = qp.kkt.rowval[p];
                    norms[j] = T::max(norms[j], v);
                    norms[r] = T::max(norms[r], v);
                }
            }
            let gamma = T::recip(T::max(norms.mean(), T::one()));
            for j in 0..n {
                for p in qp.kkt.col_cap_range(j) {
                    qp.kkt.nzval[p] *= gamma;
                }
            }
            qp.g.scale(gamma);
            self.c *= gamma;

            self.delta.hadamard(work);

            let drift = work
                .iter()
                .fold(T::zero(), |acc, &w| T::max(acc, T::abs(T::one() - w)));
            if drift <= self.epsilon {
                break;
            }
        }
    }

    // apply the stored scaling to freshly written unscaled data
    fn apply_stored(&self, qp: &mut ScaledQpMut<T>) {
        let (n, n_eq) = (self.n, self.n_eq);
        let delta = &self.delta;

        for j in 0..n {
            for p in qp.kkt.col_cap_range(j) {
                let r = qp.kkt.rowval[p];
                qp.kkt.nzval[p] *= self.c * delta[j] * delta[r];
            }
        }
        for j in 0..(n_eq + self.n_in) {
            for p in qp.kkt.col_cap_range(n + j) {
                let r = qp.kkt.rowval[p];
                if r < n {
                    qp.kkt.nzval[p] *= delta[r] * delta[n + j];
                }
            }
        }
        for (gi, di) in qp.g.iter_mut().zip(&delta[0..n]) {
            *gi *= self.c * *di;
        }
        qp.b.hadamard(&delta[n..n + n_eq]);
        qp.l.hadamard(&delta[n + n_eq..]);
        qp.u.hadamard(&delta[n + n_eq..]);
    }
}

// zero norms mean an empty row or column; leave those unscaled
fn scaling_from_norm<T: FloatT>(norm: T, eps_machine: T) -> T {
    if norm == T::zero() {
        T::one()
    } else {
        T::recip(eps_machine + T::sqrt(norm))
    }
}

impl<T> Preconditioner<T> for RuizEquilibration<T>
where
    T: FloatT,
{
    fn scale_qp_in_place(&mut self, qp: &mut ScaledQpMut<T>, compute: bool) {
        if compute {
            self.delta.set(T::one());
            self.c = T::one();
            self.equilibrate(qp);
        } else {
            self.apply_stored(qp);
        }
    }

    fn scale_primal(&self, v: &mut [T]) {
        for (vi, di) in v.iter_mut().zip(&self.delta[0..self.n]) {
            *vi /= *di;
        }
    }
    fn unscale_primal(&self, v: &mut [T]) {
        v.hadamard(&self.delta[0..self.n]);
    }

    fn scale_dual_eq(&self, v: &mut [T]) {
        for (vi, di) in v.iter_mut().zip(&self.delta[self.n..self.n + self.n_eq]) {
            *vi = *vi / *di * self.c;
        }
    }
    fn unscale_dual_eq(&self, v: &mut [T]) {
        for (vi, di) in v.iter_mut().zip(&self.delta[self.n..self.n + self.n_eq]) {
            *vi = *vi * *di / self.c;
        }
    }

    fn scale_dual_in(&self, v: &mut [T]) {
        for (vi, di) in v.iter_mut().zip(&self.delta[self.n + self.n_eq..]) {
            *vi = *vi / *di * self.c;
        }
    }
    fn unscale_dual_in(&self, v: &mut [T]) {
        for (vi, di) in v.iter_mut().zip(&self.delta[self.n + self.n_eq..]) {
            *vi = *vi * *di / self.c;
        }
    }

    fn scale_primal_residual_eq(&self, v: &mut [T]) {
        v.hadamard(&self.delta[self.n..self.n + self.n_eq]);
    }
    fn unscale_primal_residual_eq(&self, v: &mut [T]) {
        for (vi, di) in v.iter_mut().zip(&self.delta[self.n..self.n + self.n_eq]) {
            *vi /= *di;
        }
    }

    fn scale_primal_residual_in(&self, v: &mut [T]) {
        v.hadamard(&self.delta[self.n + self.n_eq..]);
    }
    fn unscale_primal_residual_in(&self, v: &mut [T]) {
        for (vi, di) in v.iter_mut().zip(&self.delta[self.n + self.n_eq..]) {
            *vi /= *di;
        }
    }

    fn scale_dual_residual(&self, v: &mut [T]) {
        for (vi, di) in v.iter_mut().zip(&self.delta[0..self.n]) {
            *vi = *vi * *di * self.c;
        }
    }
    fn unscale_dual_residual(&self, v: &mut [T]) {
        for (vi, di) in v.iter_mut().zip(&self.delta[0..self.n]) {
            *vi = *vi / (*di * self.c);
        }
    }
}

// ---------------
// identity preconditioner
// ---------------

/// No-op preconditioner: the scaled and unscaled spaces coincide.
#[derive(Default)]
pub struct IdentityPreconditioner;

impl<T> Preconditioner<T> for IdentityPreconditioner
where
    T: FloatT,
{
    fn scale_qp_in_place(&mut self, _qp: &mut ScaledQpMut<T>, _compute: bool) {}
    fn scale_primal(&self, _v: &mut [T]) {}
    fn unscale_primal(&self, _v: &mut [T]) {}
    fn scale_dual_eq(&self, _v: &mut [T]) {}
    fn unscale_dual_eq(&self, _v: &mut [T]) {}
    fn scale_dual_in(&self, _v: &mut [T]) {}
    fn unscale_dual_in(&self, _v: &mut [T]) {}
    fn scale_primal_residual_eq(&self, _v: &mut [T]) {}
    fn unscale_primal_residual_eq(&self, _v: &mut [T]) {}
    fn scale_primal_residual_in(&self, _v: &mut [T]) {}
    fn unscale_primal_residual_in(&self, _v: &mut [T]) {}
    fn scale_dual_residual(&self, _v: &mut [T]) {}
    fn unscale_dual_residual(&self, _v: &mut [T]) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algebra::VectorMath;

    fn ruiz_with_delta(delta: Vec<f64>, c: f64, n: usize, n_eq: usize, n_in: usize) -> RuizEquilibration<f64> {
        let mut r = RuizEquilibration::new(n, n_eq, n_in);
        r.delta = delta;
        r.c = c;
        r
    }

    #[test]
    fn scale_unscale_roundtrips() {
        let (n, n_eq, n_in) = (2, 1, 2);
        let delta = vec![0.5, 2.0, 4.0, 0.25, 8.0];
        let r = ruiz_with_delta(delta, 3.0, n, n_eq, n_in);

        let check = |scale: &dyn Fn(&mut [f64]), unscale: &dyn Fn(&mut [f64]), len: usize| {
            let v0: Vec<f64> = (1..=len).map(|i| i as f64 * 0.7 - 1.3).collect();
            let mut v = v0.clone();
            scale(&mut v);
            unscale(&mut v);
            assert!(v.norm_inf_diff(&v0) <= 16.0 * f64::EPSILON);
        };

        check(&|v| r.scale_primal(v), &|v| r.unscale_primal(v), n);
        check(&|v| r.scale_dual_eq(v), &|v| r.unscale_dual_eq(v), n_eq);
        check(&|v| r.scale_dual_in(v), &|v| r.unscale_dual_in(v), n_in);
        check(
            &|v| r.scale_primal_residual_eq(v),
            &|v| r.unscale_primal_residual_eq(v),
            n_eq,
        );
        check(
            &|v| r.scale_primal_residual_in(v),
            &|v| r.unscale_primal_residual_in(v),
            n_in,
        );
        check(
            &|v| r.scale_dual_residual(v),
            &|v| r.unscale_dual_residual(v),
            n,
        );
    }
}
