#![allow(non_snake_case)]

use super::workspace::{kkt_mul_active, mul_b_block, mul_bt_block, mul_h_sym};
use super::*;
use crate::algebra::*;
use crate::ldl::{add_row, delete_row, rank1_update, solve_in_place, LdlError};
use itertools::izip;

/// Cooperative cancellation predicate, consulted between outer
/// iterations.  Returning `true` stops the solve with the current
/// iterate.
pub type TerminationCallback<T> = Box<dyn FnMut(&Info<T>) -> bool>;

// inner step-size floor: steps this small cannot make progress
const SMALL_STEP: f64 = 1e-11;

fn pos<T: FloatT>(v: T) -> T {
    T::max(v, T::zero())
}
fn neg<T: FloatT>(v: T) -> T {
    T::min(v, T::zero())
}

// ---------------
// top level solve
// ---------------

pub(crate) fn qp_solve<T: FloatT>(
    model: &Model<T>,
    settings: &Settings<T>,
    precond: &mut PreconditionerKind<T>,
    work: &mut Workspace<T>,
    results: &mut Results<T>,
    callback: &mut Option<TerminationCallback<T>>,
    warm_start: bool,
) -> Result<(), SolverError> {
    let (n, n_eq, n_in) = (model.n, model.n_eq, model.n_in);

    let mut rho = results.info.rho;
    let mut mu_eq = results.info.mu_eq;
    let mut mu_in = results.info.mu_in;

    let eps_abs = settings.eps_abs;
    let eps_in_min = T::min(eps_abs, (1e-9).as_T());
    let bcl_eta_ext_init = T::powf((0.1).as_T(), settings.alpha_bcl);
    let mut bcl_eta_ext = T::max(bcl_eta_ext_init, eps_abs);
    let mut bcl_eta_in = T::one();

    // unscaled data norms for the relative termination bounds
    let norm_b = model.b.norm_inf();
    let norm_l = Model::norm_inf_finite(&model.l);
    let norm_u = Model::norm_inf_finite(&model.u);
    let norm_g = model.g.norm_inf();

    // starting point and active set
    if warm_start {
        work.x.copy_from(&results.x);
        work.y.copy_from(&results.y);
        work.z.copy_from(&results.z);
        precond.scale_primal(&mut work.x);
        precond.scale_dual_eq(&mut work.y);
        precond.scale_dual_in(&mut work.z);
        sync_active_set(work, &results.active_constraints, mu_in);
    } else {
        work.x.set(T::zero());
        work.y.set(T::zero());
        work.z.set(T::zero());
        let none = vec![false; n_in];
        sync_active_set(work, &none, mu_in);
    }
    work.set_diagonals(mu_eq, mu_in);
    refactorize_with_recovery(work, &mut rho)?;

    if !warm_start {
        // equality-constrained initial point: solve with g and b only
        for i in 0..n {
            work.rhs[i] = -work.g_scaled[i];
        }
        for j in 0..n_eq {
            work.rhs[n + j] = work.b_scaled[j];
        }
        for i in 0..n_in {
            work.rhs[n + n_eq + i] = T::zero();
        }
        solve_refined(work, settings, rho);
        work.x.copy_from(&work.dw[0..n]);
        work.y.copy_from(&work.dw[n..n + n_eq]);
        work.z.copy_from(&work.dw[n + n_eq..]);
    }

    print_header(settings, n, n_eq, n_in);

    let mut status = SolverStatus::MaxIterReached;
    for outer in 0..settings.max_iter {
        let (pri_lhs, eq_rhs0, in_rhs0) = compute_primal_residuals(model, precond, work);
        let (dua_lhs, dua_rhs0, dua_rhs1, dua_rhs3) = compute_dual_residuals(precond, work);
        results.info.pri_res = pri_lhs;
        results.info.dua_res = dua_lhs;

        let pri_ok = is_feasible(settings, pri_lhs, &[eq_rhs0, in_rhs0, norm_b, norm_l, norm_u]);
        let dua_ok = is_feasible(settings, dua_lhs, &[dua_rhs0, dua_rhs1, dua_rhs3, norm_g]);

        print_progress(settings, outer, rho, mu_in, pri_lhs, dua_lhs);

        if pri_ok && dua_ok {
            status = SolverStatus::Solved;
            break;
        }

        if let Some(cb) = callback.as_mut() {
            results.info.rho = rho;
            results.info.mu_eq = mu_eq;
            results.info.mu_in = mu_in;
            if cb(&results.info) {
                status = SolverStatus::MaxIterReached;
                break;
            }
        }

        // a primal-feasible but dual-infeasible iterate benefits from a
        // smaller proximal term once the dual residual is clearly the
        // obstruction
        if pri_ok
            && !dua_ok
            && dua_lhs >= settings.refactor_dual_feasibility_threshold
            && rho > settings.refactor_rho_threshold
        {
            rho = T::max(rho * (0.1).as_T(), settings.refactor_rho_threshold);
            results.info.rho_updates += 1;
            refactorize_with_recovery(work, &mut rho)?;
        }

        // BCL snapshot; the augmented bounds residuals pick up the
        // frozen multiplier term
        work.x_prev.copy_from(&work.x);
        work.y_prev.copy_from(&work.y);
        work.z_prev.copy_from(&work.z);
        for i in 0..n_in {
            let base = work.primal_residual_in_up[i] + work.z_prev[i] / mu_in;
            work.primal_residual_in_lo[i] = base - work.l_scaled[i];
            work.primal_residual_in_up[i] = base - work.u_scaled[i];
        }

        let infeasible = inner_newton(
            model, settings, precond, work, results, &mut rho, mu_eq, mu_in, bcl_eta_in, outer,
        )?;
        results.info.iter_ext += 1;
        if let Some(st) = infeasible {
            status = st;
            break;
        }

        let (pri_lhs_new, eq_rhs0, in_rhs0) = compute_primal_residuals(model, precond, work);
        let (dua_lhs_new, dua_rhs0, dua_rhs1, dua_rhs3) = compute_dual_residuals(precond, work);
        results.info.pri_res = pri_lhs_new;
        results.info.dua_res = dua_lhs_new;
        if is_feasible(settings, pri_lhs_new, &[eq_rhs0, in_rhs0, norm_b, norm_l, norm_u])
            && is_feasible(settings, dua_lhs_new, &[dua_rhs0, dua_rhs1, dua_rhs3, norm_g])
        {
            status = SolverStatus::Solved;
            break;
        }

        // BCL update: tighten on a good step, back off the multipliers
        // and raise the penalties on a bad one
        let mut new_mu_eq = mu_eq;
        let mut new_mu_in = mu_in;
        if pri_lhs_new <= bcl_eta_ext {
            bcl_eta_ext = T::max(bcl_eta_ext / T::powf(mu_in, settings.beta_bcl), eps_abs);
            bcl_eta_in = T::max(bcl_eta_in / mu_in, eps_in_min);
        } else {
            work.y.copy_from(&work.y_prev);
            work.z.copy_from(&work.z_prev);
            new_mu_in = T::min(mu_in * settings.mu_update_factor, settings.mu_max_in);
            new_mu_eq = T::min(mu_eq * settings.mu_update_factor, settings.mu_max_eq);
            bcl_eta_ext = T::max(
                bcl_eta_ext_init / T::powf(new_mu_in, settings.alpha_bcl),
                eps_abs,
            );
            bcl_eta_in = T::max(T::recip(new_mu_in), eps_in_min);
        }

        // stalled at high penalties: restart from mild ones
        let dua_lhs_after = compute_dual_residuals(precond, work).0;
        if pri_lhs_new >= pri_lhs && dua_lhs_after >= pri_lhs && mu_in >= (1e5).as_T() {
            new_mu_eq = settings.cold_reset_mu_eq;
            new_mu_in = settings.cold_reset_mu_in;
        }

        if new_mu_eq != mu_eq || new_mu_in != mu_in {
            apply_mu_update(work, settings, mu_eq, new_mu_eq, mu_in, new_mu_in, &mut rho)?;
            results.info.mu_updates += 1;
            mu_eq = new_mu_eq;
            mu_in = new_mu_in;
        }
    }

    if status == SolverStatus::Solved && n_in > 0 {
        polish(model, settings, precond, work, results, &mut rho, mu_in);
    }

    // move the iterate out to user space
    results.x.copy_from(&work.x);
    results.y.copy_from(&work.y);
    results.z.copy_from(&work.z);
    precond.unscale_primal(&mut results.x);
    precond.unscale_dual_eq(&mut results.y);
    precond.unscale_dual_in(&mut results.z);
    results.active_constraints.copy_from_slice(&work.active);

    results.info.status = status;
    results.info.rho = rho;
    results.info.mu_eq = mu_eq;
    results.info.mu_in = mu_in;
    results.info.obj_value = model.objective(&results.x);

    print_footer(settings, results);
    Ok(())
}

// ---------------
// inner semismooth Newton loop
// ---------------

#[allow(clippy::too_many_arguments)]
fn inner_newton<T: FloatT>(
    model: &Model<T>,
    settings: &Settings<T>,
    precond: &mut PreconditionerKind<T>,
    work: &mut Workspace<T>,
    results: &mut Results<T>,
    rho: &mut T,
    mu_eq: T,
    mu_in: T,
    eta_in: T,
    outer: u32,
) -> Result<Option<SolverStatus>, SolverError> {
    let (n, n_eq, n_in) = (work.n, work.n_eq, work.n_in);

    for _ in 0..settings.max_iter_in {
        results.info.iter += 1;

        // active set proposal from the signs of the augmented bound
        // residuals, strict on both sides
        let mut deltas = 0usize;
        for i in 0..n_in {
            work.active_lo[i] = work.primal_residual_in_lo[i] < T::zero();
            work.active_up[i] = work.primal_residual_in_up[i] > T::zero();
            work.proposed[i] = work.active_lo[i] || work.active_up[i];
            if work.proposed[i] != work.active[i] {
                deltas += 1;
            }
        }

        if deltas > 0 {
            if work.refactorize_pending || deltas > 1 + n_in / 4 {
                // too much churn for incremental edits
                for i in 0..n_in {
                    if work.proposed[i] && !work.active[i] {
                        work.set_active(i, mu_in);
                    } else if !work.proposed[i] && work.active[i] {
                        work.set_inactive(i);
                    }
                }
                refactorize_with_recovery(work, rho)?;
            } else {
                apply_active_set_deltas(work, settings, mu_in, rho)?;
            }
        }
        // a pivot-degradation guard may have tripped during the edits
        // above or a preceding penalty update
        if work.refactorize_pending {
            refactorize_with_recovery(work, rho)?;
        }

        assemble_newton_rhs(work, mu_in);
        solve_refined(work, settings, *rho);
        compute_direction_products(work);

        if let Some(st) = check_infeasibility(model, settings, precond, work) {
            return Ok(Some(st));
        }

        let alpha = if n_in > 0 {
            exact_line_search(work, *rho, mu_eq, mu_in)
        } else {
            T::one()
        };

        // iterate and closed-form residual updates
        for (xi, di) in work.x.iter_mut().zip(&work.dw[0..n]) {
            *xi += alpha * *di;
        }
        for (yi, di) in work.y.iter_mut().zip(&work.dw[n..n + n_eq]) {
            *yi += alpha * *di;
        }
        for (zi, di) in work.z.iter_mut().zip(&work.dw[n + n_eq..]) {
            *zi += alpha * *di;
        }
        for (ri, hdx, atdy, ctdz, dxi) in izip!(
            work.dual_residual.iter_mut(),
            &work.Hdx,
            &work.ATdy,
            &work.CTdz,
            &work.dw[0..n]
        ) {
            *ri += alpha * (*hdx + *atdy + *ctdz + *rho * *dxi);
        }
        for (rj, adx, dyj) in izip!(
            work.primal_residual_eq.iter_mut(),
            &work.Adx,
            &work.dw[n..n + n_eq]
        ) {
            *rj += alpha * (*adx - *dyj / mu_eq);
        }
        for (rlo, rup, cdx) in izip!(
            work.primal_residual_in_lo.iter_mut(),
            work.primal_residual_in_up.iter_mut(),
            &work.Cdx
        ) {
            *rlo += alpha * *cdx;
            *rup += alpha * *cdx;
        }

        if alpha * work.dw.norm_inf() < SMALL_STEP.as_T() && outer > 0 {
            return Ok(None);
        }

        let mut err_bounds = T::zero();
        for i in 0..n_in {
            let v = neg(work.primal_residual_in_lo[i]) + pos(work.primal_residual_in_up[i])
                - work.z[i] / mu_in;
            err_bounds = T::max(err_bounds, T::abs(v));
        }
        let err_in = T::max(
            err_bounds,
            T::max(
                work.primal_residual_eq.norm_inf(),
                work.dual_residual.norm_inf(),
            ),
        );
        if err_in <= eta_in {
            return Ok(None);
        }
    }
    Ok(None)
}

// incremental activation / deactivation against the factorization
fn apply_active_set_deltas<T: FloatT>(
    work: &mut Workspace<T>,
    settings: &Settings<T>,
    mu_in: T,
    rho: &mut T,
) -> Result<(), SolverError> {
    let (n, n_eq, n_in) = (work.n, work.n_eq, work.n_in);
    let eps_pivot = settings.eps_refact * T::epsilon();

    for i in 0..n_in {
        let col = n + n_eq + i;
        let outcome = if work.proposed[i] && !work.active[i] {
            work.set_active(i, mu_in);
            let rng = work.kkt.colptr[col]..(work.kkt.colptr[col + 1] - 1);
            add_row(
                &mut work.ldl,
                &mut work.etree,
                &work.perm_inv,
                col,
                &work.kkt.rowval[rng.clone()],
                &work.kkt.nzval[rng],
                -T::recip(mu_in),
                eps_pivot,
                &mut work.rowmod_scratch,
                &mut work.r1_scratch,
            )
        } else if !work.proposed[i] && work.active[i] {
            work.set_inactive(i);
            delete_row(
                &mut work.ldl,
                &mut work.etree,
                &work.perm_inv,
                col,
                eps_pivot,
                &mut work.rowmod_scratch,
                &mut work.r1_scratch,
            )
        } else {
            continue;
        };

        match outcome {
            Ok(degraded) => {
                if degraded {
                    work.refactorize_pending = true;
                }
            }
            Err(LdlError::ZeroPivot) => {
                // bookkeeping is already committed, so a fresh
                // factorization resynchronizes everything
                refactorize_with_recovery(work, rho)?;
            }
            Err(LdlError::CapacityExceeded) => {
                return Err(SolverError::CapacityExceeded);
            }
        }
    }
    Ok(())
}

fn assemble_newton_rhs<T: FloatT>(work: &mut Workspace<T>, mu_in: T) {
    let (n, n_eq, n_in) = (work.n, work.n_eq, work.n_in);

    for i in 0..n {
        work.rhs[i] = -work.dual_residual[i];
    }
    for j in 0..n_eq {
        work.rhs[n + j] = -work.primal_residual_eq[j];
    }
    for i in 0..n_in {
        let idx = n + n_eq + i;
        if work.active_up[i] {
            work.rhs[idx] = work.z[i] / mu_in - work.primal_residual_in_up[i];
        } else if work.active_lo[i] {
            work.rhs[idx] = work.z[i] / mu_in - work.primal_residual_in_lo[i];
        } else {
            work.rhs[idx] = -work.z[i];
            // releasing an inactive multiplier feeds back into the
            // stationarity rows
            let zi = work.z[i];
            let col = n + n_eq + i;
            for p in work.kkt.colptr[col]..(work.kkt.colptr[col + 1] - 1) {
                work.rhs[work.kkt.rowval[p]] += zi * work.kkt.nzval[p];
            }
        }
    }
}

// LDLᵀ solve of `rhs` into `dw` with iterative refinement against the
// matrix-free action of the active KKT matrix
fn solve_refined<T: FloatT>(work: &mut Workspace<T>, settings: &Settings<T>, rho: T) {
    let Workspace {
        n,
        n_eq,
        kkt,
        ldl,
        perm,
        perm_inv,
        active,
        dw,
        rhs,
        err,
        sol_work,
        ..
    } = work;
    let (n, n_eq) = (*n, *n_eq);

    dw.set(T::zero());
    let mut prev_err_norm = T::infinity();

    for it in 0..settings.nb_iterative_refinement.max(1) {
        err.scalarop_from(|v| -v, rhs);
        if it > 0 {
            kkt_mul_active(kkt, n, n_eq, active, rho, sol_work, dw);
            err.axpby(T::one(), sol_work, T::one());
        }

        let err_norm = err.norm_inf();
        if err_norm > prev_err_norm {
            break;
        }
        prev_err_norm = err_norm;

        solve_in_place(ldl, perm, perm_inv, err, sol_work);
        dw.axpby(-T::one(), err, T::one());
    }
}

fn compute_direction_products<T: FloatT>(work: &mut Workspace<T>) {
    let (n, n_eq, n_in) = (work.n, work.n_eq, work.n_in);
    let (dx, rest) = work.dw.split_at(n);
    let (dy, dz) = rest.split_at(n_eq);

    work.Hdx.set(T::zero());
    mul_h_sym(&work.kkt, n, &mut work.Hdx, dx);
    work.Adx.set(T::zero());
    mul_b_block(&work.kkt, n, n, n_eq, &mut work.Adx, dx);
    work.ATdy.set(T::zero());
    mul_bt_block(&work.kkt, n, n, n_eq, &mut work.ATdy, dy);
    work.Cdx.set(T::zero());
    mul_b_block(&work.kkt, n, n + n_eq, n_in, &mut work.Cdx, dx);
    work.CTdz.set(T::zero());
    mul_bt_block(&work.kkt, n, n + n_eq, n_in, &mut work.CTdz, dz);
}

// ---------------
// residual computation (unscaled norms, scaled working vectors)
// ---------------

fn compute_primal_residuals<T: FloatT>(
    model: &Model<T>,
    precond: &mut PreconditionerKind<T>,
    work: &mut Workspace<T>,
) -> (T, T, T) {
    let (n, n_eq, n_in) = (work.n, work.n_eq, work.n_in);

    work.primal_residual_eq.set(T::zero());
    mul_b_block(
        &work.kkt,
        n,
        n,
        n_eq,
        &mut work.primal_residual_eq,
        &work.x,
    );
    work.primal_residual_in_up.set(T::zero());
    mul_b_block(
        &work.kkt,
        n,
        n + n_eq,
        n_in,
        &mut work.primal_residual_in_up,
        &work.x,
    );

    precond.unscale_primal_residual_eq(&mut work.primal_residual_eq);
    let eq_rhs0 = work.primal_residual_eq.norm_inf();
    precond.unscale_primal_residual_in(&mut work.primal_residual_in_up);
    let in_rhs0 = work.primal_residual_in_up.norm_inf();

    // bound violations measured unscaled
    for i in 0..n_in {
        let v = work.primal_residual_in_up[i];
        work.primal_residual_in_lo[i] = pos(v - model.u[i]) + neg(v - model.l[i]);
    }
    for (r, bi) in work.primal_residual_eq.iter_mut().zip(&model.b) {
        *r -= *bi;
    }

    let lhs = T::max(
        work.primal_residual_eq.norm_inf(),
        work.primal_residual_in_lo.norm_inf(),
    );

    // back to scaled space: Ax - b and Cx
    precond.scale_primal_residual_eq(&mut work.primal_residual_eq);
    precond.scale_primal_residual_in(&mut work.primal_residual_in_up);

    (lhs, eq_rhs0, in_rhs0)
}

fn compute_dual_residuals<T: FloatT>(
    precond: &mut PreconditionerKind<T>,
    work: &mut Workspace<T>,
) -> (T, T, T, T) {
    let (n, n_eq, n_in) = (work.n, work.n_eq, work.n_in);

    work.dual_residual.copy_from(&work.g_scaled);

    work.tmp_n.set(T::zero());
    mul_h_sym(&work.kkt, n, &mut work.tmp_n, &work.x);
    work.dual_residual.axpby(T::one(), &work.tmp_n, T::one());
    precond.unscale_dual_residual(&mut work.tmp_n);
    let rhs0 = work.tmp_n.norm_inf();

    work.tmp_n.set(T::zero());
    mul_bt_block(&work.kkt, n, n, n_eq, &mut work.tmp_n, &work.y);
    work.dual_residual.axpby(T::one(), &work.tmp_n, T::one());
    precond.unscale_dual_residual(&mut work.tmp_n);
    let rhs1 = work.tmp_n.norm_inf();

    work.tmp_n.set(T::zero());
    mul_bt_block(&work.kkt, n, n + n_eq, n_in, &mut work.tmp_n, &work.z);
    work.dual_residual.axpby(T::one(), &work.tmp_n, T::one());
    precond.unscale_dual_residual(&mut work.tmp_n);
    let rhs3 = work.tmp_n.norm_inf();

    precond.unscale_dual_residual(&mut work.dual_residual);
    let lhs = work.dual_residual.norm_inf();
    precond.scale_dual_residual(&mut work.dual_residual);

    (lhs, rhs0, rhs1, rhs3)
}

fn is_feasible<T: FloatT>(settings: &Settings<T>, lhs: T, scales: &[T]) -> bool {
    let mut rhs = settings.eps_abs;
    if settings.eps_rel != T::zero() {
        let m = scales.iter().fold(T::zero(), |acc, &s| T::max(acc, s));
        rhs += settings.eps_rel * m;
    }
    lhs <= rhs
}

// ---------------
// infeasibility certificates on the Newton direction
// ---------------

fn check_infeasibility<T: FloatT>(
    model: &Model<T>,
    settings: &Settings<T>,
    precond: &mut PreconditionerKind<T>,
    work: &mut Workspace<T>,
) -> Option<SolverStatus> {
    let (n, n_eq, n_in) = (work.n, work.n_eq, work.n_in);

    // primal: a dual direction with vanishing Aᵀδy + Cᵀδz and
    // negative support value certifies an empty feasible set
    {
        for i in 0..n {
            work.tmp_n[i] = work.ATdy[i] + work.CTdz[i];
        }
        precond.unscale_dual_residual(&mut work.tmp_n);
        work.tmp_eq.copy_from(&work.dw[n..n + n_eq]);
        precond.unscale_dual_eq(&mut work.tmp_eq);
        work.tmp_in.copy_from(&work.dw[n + n_eq..]);
        precond.unscale_dual_in(&mut work.tmp_in);

        let bound = T::max(work.tmp_eq.norm_inf(), work.tmp_in.norm_inf());
        if bound > T::zero() {
            let eps = settings.eps_primal_inf;
            let mut support = model.b.dot(&work.tmp_eq);
            let mut certificate = work.tmp_n.norm_inf() <= eps * bound;
            for i in 0..n_in {
                let dzi = work.tmp_in[i];
                let up = pos(dzi);
                let lo = neg(dzi);
                if up > T::zero() {
                    if Model::is_unbounded(model.u[i]) {
                        certificate = false;
                    } else {
                        support += model.u[i] * up;
                    }
                }
                if lo < T::zero() {
                    if Model::is_unbounded(model.l[i]) {
                        certificate = false;
                    } else {
                        support += model.l[i] * lo;
                    }
                }
            }
            if certificate && support <= -eps * bound {
                return Some(SolverStatus::PrimalInfeasible);
            }
        }
    }

    // dual: a primal ray that keeps the objective decreasing while
    // remaining constraint-compatible certifies an unbounded objective
    {
        work.tmp_n.copy_from(&work.dw[0..n]);
        precond.unscale_primal(&mut work.tmp_n);
        let normdx = work.tmp_n.norm_inf();
        if normdx > T::zero() {
            let eps = settings.eps_dual_inf;
            let gdx = model.g.dot(&work.tmp_n);

            let hdx_u = &mut work.err[0..n];
            hdx_u.copy_from(&work.Hdx);
            precond.unscale_dual_residual(hdx_u);
            let mut certificate =
                work.err[0..n].norm_inf() <= eps * normdx && gdx <= -eps * normdx;

            if certificate {
                work.tmp_eq.copy_from(&work.Adx);
                precond.unscale_primal_residual_eq(&mut work.tmp_eq);
                certificate = work.tmp_eq.norm_inf() <= eps * normdx;
            }
            if certificate {
                work.tmp_in.copy_from(&work.Cdx);
                precond.unscale_primal_residual_in(&mut work.tmp_in);
                for i in 0..n_in {
                    let cdxi = work.tmp_in[i];
                    if !Model::is_unbounded(model.u[i]) && cdxi > eps * normdx {
                        certificate = false;
                    }
                    if !Model::is_unbounded(model.l[i]) && cdxi < -eps * normdx {
                        certificate = false;
                    }
                }
            }
            if certificate {
                return Some(SolverStatus::DualInfeasible);
            }
        }
    }

    None
}

// ---------------
// exact primal-dual line search
// ---------------

// gradient of the piecewise-quadratic merit along the direction,
// evaluated as φ'(α) = a·α + b on the segment containing `alpha`
fn merit_gradient<T: FloatT>(
    work: &Workspace<T>,
    alpha: T,
    a_const: T,
    b_const: T,
    mu_in: T,
) -> (T, T, T) {
    let (n, n_eq, n_in) = (work.n, work.n_eq, work.n_in);
    let dz = &work.dw[n + n_eq..];

    let mut a = a_const;
    let mut b = b_const;
    for i in 0..n_in {
        let lo = work.primal_residual_in_lo[i] + alpha * work.Cdx[i];
        let up = work.primal_residual_in_up[i] + alpha * work.Cdx[i];
        let is_active = lo < T::zero() || up > T::zero();
        let cdx_act = if is_active { work.Cdx[i] } else { T::zero() };
        let mut act_z = T::zero();
        if lo < T::zero() {
            act_z += work.primal_residual_in_lo[i];
        }
        if up > T::zero() {
            act_z += work.primal_residual_in_up[i];
        }

        let resid = mu_in * cdx_act - dz[i];
        a += mu_in * cdx_act * cdx_act + resid * resid / mu_in;
        b += mu_in * cdx_act * act_z + (act_z - work.z[i] / mu_in) * resid;
    }
    (a, b, a * alpha + b)
}

fn exact_line_search<T: FloatT>(work: &mut Workspace<T>, rho: T, mu_eq: T, mu_in: T) -> T {
    let (n, n_eq, n_in) = (work.n, work.n_eq, work.n_in);

    // α-independent pieces of the merit gradient
    let (a_const, b_const) = {
        let (dx, rest) = work.dw.split_at(n);
        let (dy, _dz) = rest.split_at(n_eq);

        let mut a = dx.dot(&work.Hdx) + rho * dx.sumsq() + mu_eq * work.Adx.sumsq();
        let mut b = work.x.dot(&work.Hdx);
        for i in 0..n {
            b += (rho * (work.x[i] - work.x_prev[i]) + work.g_scaled[i]) * dx[i];
        }
        for j in 0..n_eq {
            let resid = mu_eq * work.Adx[j] - dy[j];
            a += resid * resid / mu_eq;
            b += work.Adx[j] * (mu_eq * work.primal_residual_eq[j] + work.y[j])
                + work.primal_residual_eq[j] * resid;
        }
        (a, b)
    };

    // breakpoints where an inequality switches sides
    let mut count = 0usize;
    for i in 0..n_in {
        let candidates = [
            -work.primal_residual_in_lo[i] / work.Cdx[i],
            -work.primal_residual_in_up[i] / work.Cdx[i],
        ];
        for c in candidates {
            if c > T::zero() && c.is_finite() {
                work.alphas[count] = c;
                count += 1;
            }
        }
    }
    work.alphas[..count].sort_unstable_by(|p, q| p.partial_cmp(q).unwrap());
    // duplicate breakpoints collapse to one segment boundary
    let mut m = 0usize;
    for k in 0..count {
        if m == 0 || work.alphas[k] != work.alphas[m - 1] {
            work.alphas[m] = work.alphas[k];
            m += 1;
        }
    }
    count = m;

    let mut alpha = T::one();
    if count > 0 && work.alphas[0] <= T::one() {
        let mut last_neg_grad = T::zero();
        let mut alpha_last_neg = T::zero();
        let mut first_pos_grad = T::zero();
        let mut alpha_first_pos = T::infinity();

        for k in 0..count {
            let alpha_cur = work.alphas[k];
            let (_, _, gr) = merit_gradient(work, alpha_cur, a_const, b_const, mu_in);
            if gr < T::zero() {
                alpha_last_neg = alpha_cur;
                last_neg_grad = gr;
            } else {
                first_pos_grad = gr;
                alpha_first_pos = alpha_cur;
                break;
            }
        }
        if alpha_last_neg == T::zero() {
            last_neg_grad = merit_gradient(work, alpha_last_neg, a_const, b_const, mu_in).2;
        }

        if alpha_first_pos == T::infinity() {
            // gradient stays negative through every breakpoint; minimize
            // on the last segment
            let (a, b, _) = merit_gradient(
                work,
                <f64 as crate::algebra::AsFloatT<T>>::as_T(&2.0) * alpha_last_neg + T::one(),
                a_const,
                b_const,
                mu_in,
            );
            alpha = -b / a;
        } else {
            alpha = alpha_last_neg
                - last_neg_grad * (alpha_first_pos - alpha_last_neg)
                    / (first_pos_grad - last_neg_grad);
            if alpha_last_neg == T::zero() && alpha_first_pos < T::one() {
                alpha = alpha_first_pos;
            }
        }
    }
    alpha
}

// ---------------
// penalty and recovery plumbing
// ---------------

// one unit-vector rank-1 update per affected diagonal row moves the
// factorization between penalty values without refactorizing
fn apply_mu_update<T: FloatT>(
    work: &mut Workspace<T>,
    settings: &Settings<T>,
    mu_eq: T,
    new_mu_eq: T,
    mu_in: T,
    new_mu_in: T,
    rho: &mut T,
) -> Result<(), SolverError> {
    let (n, n_eq) = (work.n, work.n_eq);
    let eps_pivot = settings.eps_refact * T::epsilon();

    let mut failed = false;
    if new_mu_eq != mu_eq {
        let alpha = T::recip(mu_eq) - T::recip(new_mu_eq);
        for j in 0..n_eq {
            let pos = work.perm_inv[n + j];
            match rank1_update(
                &mut work.ldl,
                &mut work.etree,
                &[pos],
                &[T::one()],
                alpha,
                eps_pivot,
                &mut work.r1_scratch,
            ) {
                Ok(degraded) => work.refactorize_pending |= degraded,
                Err(LdlError::ZeroPivot) => failed = true,
                Err(LdlError::CapacityExceeded) => return Err(SolverError::CapacityExceeded),
            }
        }
    }
    if new_mu_in != mu_in {
        let alpha = T::recip(mu_in) - T::recip(new_mu_in);
        for idx in 0..work.n_active {
            let i = work.active_list[idx];
            let pos = work.perm_inv[n + n_eq + i];
            match rank1_update(
                &mut work.ldl,
                &mut work.etree,
                &[pos],
                &[T::one()],
                alpha,
                eps_pivot,
                &mut work.r1_scratch,
            ) {
                Ok(degraded) => work.refactorize_pending |= degraded,
                Err(LdlError::ZeroPivot) => failed = true,
                Err(LdlError::CapacityExceeded) => return Err(SolverError::CapacityExceeded),
            }
        }
    }

    work.set_diagonals(new_mu_eq, new_mu_in);
    if failed {
        refactorize_with_recovery(work, rho)?;
    }
    Ok(())
}

fn sync_active_set<T: FloatT>(work: &mut Workspace<T>, desired: &[bool], mu_in: T) {
    for i in 0..desired.len() {
        if desired[i] && !work.active[i] {
            work.set_active(i, mu_in);
        } else if !desired[i] && work.active[i] {
            work.set_inactive(i);
        }
    }
}

// a zero pivot despite the proximal shifts is recovered by boosting ρ
// once; a second failure is terminal
fn refactorize_with_recovery<T: FloatT>(
    work: &mut Workspace<T>,
    rho: &mut T,
) -> Result<(), SolverError> {
    match work.refactorize(*rho) {
        Ok(()) => Ok(()),
        Err(LdlError::CapacityExceeded) => Err(SolverError::CapacityExceeded),
        Err(LdlError::ZeroPivot) => {
            *rho = *rho * (1e3).as_T();
            match work.refactorize(*rho) {
                Ok(()) => Ok(()),
                Err(_) => Err(SolverError::NumericBreakdown),
            }
        }
    }
}

// ---------------
// polishing
// ---------------

// one extra Newton solve on the final active set; kept only when it
// does not worsen the unscaled residuals
fn polish<T: FloatT>(
    model: &Model<T>,
    settings: &Settings<T>,
    precond: &mut PreconditionerKind<T>,
    work: &mut Workspace<T>,
    results: &mut Results<T>,
    rho: &mut T,
    mu_in: T,
) {
    let (n, n_eq, n_in) = (work.n, work.n_eq, work.n_in);

    if refactorize_with_recovery(work, rho).is_err() {
        return;
    }

    let pri_before = results.info.pri_res;
    let dua_before = results.info.dua_res;

    work.x_prev.copy_from(&work.x);
    work.y_prev.copy_from(&work.y);
    work.z_prev.copy_from(&work.z);

    compute_primal_residuals(model, precond, work);
    compute_dual_residuals(precond, work);
    for i in 0..n_in {
        let base = work.primal_residual_in_up[i] + work.z[i] / mu_in;
        work.primal_residual_in_lo[i] = base - work.l_scaled[i];
        work.primal_residual_in_up[i] = base - work.u_scaled[i];
        work.active_lo[i] = work.primal_residual_in_lo[i] < T::zero();
        work.active_up[i] = work.primal_residual_in_up[i] > T::zero();
    }

    assemble_newton_rhs(work, mu_in);
    solve_refined(work, settings, *rho);

    for (xi, di) in work.x.iter_mut().zip(&work.dw[0..n]) {
        *xi += *di;
    }
    for (yi, di) in work.y.iter_mut().zip(&work.dw[n..n + n_eq]) {
        *yi += *di;
    }
    for (zi, di) in work.z.iter_mut().zip(&work.dw[n + n_eq..]) {
        *zi += *di;
    }

    let (pri_after, ..) = compute_primal_residuals(model, precond, work);
    let (dua_after, ..) = compute_dual_residuals(precond, work);

    if T::max(pri_after, dua_after) <= T::max(pri_before, dua_before) {
        results.info.pri_res = pri_after;
        results.info.dua_res = dua_after;
    } else {
        work.x.copy_from(&work.x_prev);
        work.y.copy_from(&work.y_prev);
        work.z.copy_from(&work.z_prev);
    }
}

// ---------------
// progress printing
// ---------------

fn print_header<T: FloatT>(settings: &Settings<T>, n: usize, n_eq: usize, n_in: usize) {
    if !settings.verbose {
        return;
    }
    println!("-------------------------------------------------------");
    println!(
        "proxal v{}  (n = {}, n_eq = {}, n_in = {})",
        env!("CARGO_PKG_VERSION"),
        n,
        n_eq,
        n_in
    );
    println!("eps_abs = {:e}, eps_rel = {:e}", settings.eps_abs, settings.eps_rel);
    println!("-------------------------------------------------------");
    println!("{:>5} {:>10} {:>10} {:>12} {:>12}", "iter", "rho", "mu_in", "pri_res", "dua_res");
}

fn print_progress<T: FloatT>(
    settings: &Settings<T>,
    iter: u32,
    rho: T,
    mu_in: T,
    pri: T,
    dua: T,
) {
    if !settings.verbose {
        return;
    }
    println!(
        "{:>5} {:>10.2e} {:>10.2e} {:>12.4e} {:>12.4e}",
        iter, rho, mu_in, pri, dua
    );
}

fn print_footer<T: FloatT>(settings: &Settings<T>, results: &Results<T>) {
    if !settings.verbose {
        return;
    }
    println!("-------------------------------------------------------");
    println!(
        "status: {}, outer iters: {}, inner iters: {}",
        results.info.status, results.info.iter_ext, results.info.iter
    );
    println!(
        "pri_res: {:e}, dua_res: {:e}, objective: {:e}",
        results.info.pri_res, results.info.dua_res, results.info.obj_value
    );
    println!("-------------------------------------------------------");
}
