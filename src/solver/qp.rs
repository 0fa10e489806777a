#![allow(non_snake_case)]

use super::solve::{qp_solve, TerminationCallback};
use super::*;
use crate::algebra::*;
use crate::sparse::CscMatrix;
use std::time::Instant;

/// Sparse proximal augmented-Lagrangian QP solver.
///
/// ```no_run
/// use proxal::solver::QpSolver;
/// use proxal::sparse::CscMatrix;
///
/// // minimize ½xᵀHx + gᵀx  s.t.  l ≤ x ≤ u
/// let H = CscMatrix::identity(2);
/// let g = vec![-1.0, -1.0];
/// let A = CscMatrix::spalloc((0, 2), 0);
/// let b = vec![];
/// let C = CscMatrix::identity(2);
/// let u = vec![0.5, 0.5];
/// let l = vec![f64::NEG_INFINITY, f64::NEG_INFINITY];
///
/// let mut solver = QpSolver::new(2, 0, 2);
/// solver
///     .init(&H, &g, &A, &b, &C, &u, &l, true, None, None, None)
///     .unwrap();
/// solver.solve().unwrap();
/// println!("x = {:?}", solver.results.x);
/// ```
///
/// The solver owns its problem copy, workspace, results and
/// preconditioner as plain fields; a solve call borrows them for its
/// duration and nothing is shared between solver instances.
pub struct QpSolver<T: FloatT> {
    pub settings: Settings<T>,
    pub results: Results<T>,
    pub model: Model<T>,
    work: Workspace<T>,
    precond: PreconditionerKind<T>,
    callback: Option<TerminationCallback<T>>,
    initialized: bool,
}

impl<T> QpSolver<T>
where
    T: FloatT,
{
    /// Allocate a solver for problems with `n` variables, `n_eq`
    /// equality and `n_in` inequality constraints.
    pub fn new(n: usize, n_eq: usize, n_in: usize) -> Self {
        Self {
            settings: Settings::default(),
            results: Results::new(n, n_eq, n_in),
            model: Model::new(n, n_eq, n_in),
            work: Workspace::new(n, n_eq, n_in),
            precond: PreconditionerKind::Ruiz(RuizEquilibration::new(n, n_eq, n_in)),
            callback: None,
            initialized: false,
        }
    }

    /// Store a problem, optionally equilibrate it, and perform the
    /// symbolic factorization.  `H` may be given in full or upper
    /// triangular form; `A` and `C` in their natural row-major
    /// orientation.  Optional proximal parameters override the
    /// defaults for the next solve.
    #[allow(clippy::too_many_arguments)]
    pub fn init(
        &mut self,
        H: &CscMatrix<T>,
        g: &[T],
        A: &CscMatrix<T>,
        b: &[T],
        C: &CscMatrix<T>,
        u: &[T],
        l: &[T],
        compute_preconditioner: bool,
        rho: Option<T>,
        mu_eq: Option<T>,
        mu_in: Option<T>,
    ) -> Result<(), SolverError> {
        let start = Instant::now();

        self.model.assign(H, g, A, b, C, u, l)?;
        self.results.cleanup(rho, mu_eq, mu_in);
        self.work.setup(&self.model);

        let (n, n_eq, n_in) = (self.model.n, self.model.n_eq, self.model.n_in);
        self.precond = if compute_preconditioner {
            PreconditionerKind::Ruiz(RuizEquilibration::new(n, n_eq, n_in))
        } else {
            PreconditionerKind::Identity(IdentityPreconditioner)
        };
        self.scale_problem(true);
        self.work
            .set_diagonals(self.results.info.mu_eq, self.results.info.mu_in);

        self.initialized = true;
        if self.settings.compute_timings {
            self.results.info.setup_time = start.elapsed().as_secs_f64();
            self.results.info.run_time = self.results.info.setup_time;
        }
        Ok(())
    }

    /// Update problem data in place.  Any supplied matrix must have
    /// the sparsity pattern given at `init`; otherwise
    /// [`SolverError::StructuralMismatch`] is returned and nothing is
    /// modified.  Vectors may always be replaced.  With
    /// `update_preconditioner` unset the scaling computed at `init`
    /// is reused.
    #[allow(clippy::too_many_arguments)]
    pub fn update(
        &mut self,
        H: Option<&CscMatrix<T>>,
        g: Option<&[T]>,
        A: Option<&CscMatrix<T>>,
        b: Option<&[T]>,
        C: Option<&CscMatrix<T>>,
        u: Option<&[T]>,
        l: Option<&[T]>,
        update_preconditioner: bool,
        rho: Option<T>,
        mu_eq: Option<T>,
        mu_in: Option<T>,
    ) -> Result<(), SolverError> {
        if !self.initialized {
            return Err(SolverError::DimensionMismatch);
        }
        let start = Instant::now();
        let (n, n_eq, n_in) = (self.model.n, self.model.n_eq, self.model.n_in);

        // stage and validate everything before committing
        let H_new = match H {
            Some(H) => {
                if H.m != n || H.n != n {
                    return Err(SolverError::DimensionMismatch);
                }
                let triu = H.to_triu();
                if !Model::same_structure(&self.model.H, &triu) {
                    return Err(SolverError::StructuralMismatch);
                }
                Some(triu)
            }
            None => None,
        };
        let At_new = match A {
            Some(A) => {
                if A.m != n_eq || A.n != n {
                    return Err(SolverError::DimensionMismatch);
                }
                let At = A.transpose();
                if !Model::same_structure(&self.model.At, &At) {
                    return Err(SolverError::StructuralMismatch);
                }
                Some(At)
            }
            None => None,
        };
        let Ct_new = match C {
            Some(C) => {
                if C.m != n_in || C.n != n {
                    return Err(SolverError::DimensionMismatch);
                }
                let Ct = C.transpose();
                if !Model::same_structure(&self.model.Ct, &Ct) {
                    return Err(SolverError::StructuralMismatch);
                }
                Some(Ct)
            }
            None => None,
        };
        if g.is_some_and(|g| g.len() != n)
            || b.is_some_and(|b| b.len() != n_eq)
            || u.is_some_and(|u| u.len() != n_in)
            || l.is_some_and(|l| l.len() != n_in)
        {
            return Err(SolverError::DimensionMismatch);
        }

        if let Some(Ht) = H_new {
            self.model.H = Ht;
        }
        if let Some(At) = At_new {
            self.model.At = At;
        }
        if let Some(Ct) = Ct_new {
            self.model.Ct = Ct;
        }
        if let Some(g) = g {
            self.model.g.copy_from(g);
        }
        if let Some(b) = b {
            self.model.b.copy_from(b);
        }
        if let Some(u) = u {
            self.model.u.copy_from(u);
        }
        if let Some(l) = l {
            self.model.l.copy_from(l);
        }
        self.model.cap_bounds();

        if let Some(r) = rho {
            self.results.info.rho = r;
        }
        if let Some(m) = mu_eq {
            self.results.info.mu_eq = m;
        }
        if let Some(m) = mu_in {
            self.results.info.mu_in = m;
        }

        // refresh the scaled working copy; the symbolic analysis is
        // still valid because the pattern is unchanged
        self.work.write_values(&self.model);
        self.scale_problem(update_preconditioner);
        self.work
            .set_diagonals(self.results.info.mu_eq, self.results.info.mu_in);

        if self.settings.compute_timings {
            self.results.info.setup_time = start.elapsed().as_secs_f64();
        }
        Ok(())
    }

    /// Run the solver.  Warm starts from the stored iterate when the
    /// `warm_start` setting is on.
    pub fn solve(&mut self) -> Result<(), SolverError> {
        let warm = self.settings.warm_start;
        self.solve_internal(warm)
    }

    /// Run the solver from a caller-supplied starting point.  Missing
    /// components keep their stored values.
    pub fn solve_warm_start(
        &mut self,
        x: Option<&[T]>,
        y: Option<&[T]>,
        z: Option<&[T]>,
    ) -> Result<(), SolverError> {
        if x.is_some_and(|x| x.len() != self.model.n)
            || y.is_some_and(|y| y.len() != self.model.n_eq)
            || z.is_some_and(|z| z.len() != self.model.n_in)
        {
            return Err(SolverError::DimensionMismatch);
        }
        if let Some(x) = x {
            self.results.x.copy_from(x);
        }
        if let Some(y) = y {
            self.results.y.copy_from(y);
        }
        if let Some(z) = z {
            self.results.z.copy_from(z);
        }
        self.solve_internal(true)
    }

    fn solve_internal(&mut self, warm_start: bool) -> Result<(), SolverError> {
        if !self.initialized {
            return Err(SolverError::DimensionMismatch);
        }
        let start = Instant::now();

        self.results.info.iter = 0;
        self.results.info.iter_ext = 0;
        self.results.info.mu_updates = 0;
        self.results.info.rho_updates = 0;
        self.results.info.status = SolverStatus::Unsolved;

        let out = qp_solve(
            &self.model,
            &self.settings,
            &mut self.precond,
            &mut self.work,
            &mut self.results,
            &mut self.callback,
            warm_start,
        );

        if self.settings.compute_timings {
            self.results.info.solve_time = start.elapsed().as_secs_f64();
            self.results.info.run_time = self.results.info.setup_time + self.results.info.solve_time;
        }
        out
    }

    /// Reset iterates, statistics and proximal parameters.
    pub fn cleanup(&mut self) {
        self.results.cleanup(None, None, None);
    }

    /// Install a predicate consulted between outer iterations;
    /// returning `true` stops the solve with the current iterate and
    /// status `MaxIterReached`.
    pub fn set_termination_callback(&mut self, cb: impl FnMut(&Info<T>) -> bool + 'static) {
        self.callback = Some(Box::new(cb));
    }

    /// Remove an installed termination callback.
    pub fn clear_termination_callback(&mut self) {
        self.callback = None;
    }

    fn scale_problem(&mut self, compute: bool) {
        let mut qp = ScaledQpMut {
            n: self.model.n,
            n_eq: self.model.n_eq,
            n_in: self.model.n_in,
            kkt: &mut self.work.kkt,
            g: &mut self.work.g_scaled,
            b: &mut self.work.b_scaled,
            l: &mut self.work.l_scaled,
            u: &mut self.work.u_scaled,
        };
        self.precond.scale_qp_in_place(&mut qp, compute);
    }
}
