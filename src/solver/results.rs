use crate::algebra::*;

// default proximal parameters; penalties only grow from here unless a
// cold restart resets them
pub(crate) const RHO_DEFAULT: f64 = 1e-6;
pub(crate) const MU_EQ_DEFAULT: f64 = 1e3;
pub(crate) const MU_IN_DEFAULT: f64 = 1e1;

/// Final disposition of a solve call.
#[derive(PartialEq, Eq, Clone, Copy, Debug, Default)]
pub enum SolverStatus {
    /// no solve has run since the last reset
    #[default]
    Unsolved,
    /// both feasibility tolerances met
    Solved,
    /// iteration limit (or a termination callback) stopped the solve;
    /// the best iterate is in the results
    MaxIterReached,
    /// a primal infeasibility certificate was found
    PrimalInfeasible,
    /// a dual infeasibility certificate was found
    DualInfeasible,
}

impl std::fmt::Display for SolverStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Solve statistics and final parameter values.
#[derive(Debug, Clone)]
pub struct Info<T> {
    /// primal proximal parameter at exit
    pub rho: T,
    /// equality penalty at exit
    pub mu_eq: T,
    /// inequality penalty at exit
    pub mu_in: T,
    /// total inner (semismooth Newton) iterations
    pub iter: u32,
    /// outer (BCL) iterations
    pub iter_ext: u32,
    /// number of penalty parameter updates
    pub mu_updates: u32,
    /// number of proximal parameter decreases
    pub rho_updates: u32,
    /// final status
    pub status: SolverStatus,
    /// setup time in seconds (zero unless `compute_timings` is set)
    pub setup_time: f64,
    /// solve time in seconds (zero unless `compute_timings` is set)
    pub solve_time: f64,
    /// accumulated setup plus solve time in seconds
    pub run_time: f64,
    /// unscaled objective value at the final iterate
    pub obj_value: T,
    /// unscaled primal residual infinity norm
    pub pri_res: T,
    /// unscaled dual residual infinity norm
    pub dua_res: T,
}

impl<T> Info<T>
where
    T: FloatT,
{
    fn new() -> Self {
        Self {
            rho: RHO_DEFAULT.as_T(),
            mu_eq: MU_EQ_DEFAULT.as_T(),
            mu_in: MU_IN_DEFAULT.as_T(),
            iter: 0,
            iter_ext: 0,
            mu_updates: 0,
            rho_updates: 0,
            status: SolverStatus::Unsolved,
            setup_time: 0.0,
            solve_time: 0.0,
            run_time: 0.0,
            obj_value: T::zero(),
            pri_res: T::zero(),
            dua_res: T::zero(),
        }
    }
}

/// Solution iterates and statistics, owned by the solver and populated
/// by every solve call.
#[derive(Debug, Clone)]
pub struct Results<T> {
    /// primal iterate
    pub x: Vec<T>,
    /// equality multipliers
    pub y: Vec<T>,
    /// inequality multipliers
    pub z: Vec<T>,
    /// which inequalities were in the factorized KKT at exit; reused
    /// as the starting active set of a warm-started solve
    pub active_constraints: Vec<bool>,
    /// statistics and final parameters
    pub info: Info<T>,
}

impl<T> Results<T>
where
    T: FloatT,
{
    pub fn new(n: usize, n_eq: usize, n_in: usize) -> Self {
        Self {
            x: vec![T::zero(); n],
            y: vec![T::zero(); n_eq],
            z: vec![T::zero(); n_in],
            active_constraints: vec![false; n_in],
            info: Info::new(),
        }
    }

    /// Zero the iterates and restore statistics and proximal
    /// parameters to their initial values (or the supplied overrides).
    pub fn cleanup(&mut self, rho: Option<T>, mu_eq: Option<T>, mu_in: Option<T>) {
        self.x.set(T::zero());
        self.y.set(T::zero());
        self.z.set(T::zero());
        self.active_constraints.fill(false);
        self.cold_start(rho, mu_eq, mu_in);
    }

    /// Reset proximal parameters and statistics without touching the
    /// iterates.
    pub fn cold_start(&mut self, rho: Option<T>, mu_eq: Option<T>, mu_in: Option<T>) {
        self.info.rho = rho.unwrap_or(RHO_DEFAULT.as_T());
        self.info.mu_eq = mu_eq.unwrap_or(MU_EQ_DEFAULT.as_T());
        self.info.mu_in = mu_in.unwrap_or(MU_IN_DEFAULT.as_T());
        self.cleanup_statistics();
    }

    pub fn cleanup_statistics(&mut self) {
        self.info.iter = 0;
        self.info.iter_ext = 0;
        self.info.mu_updates = 0;
        self.info.rho_updates = 0;
        self.info.status = SolverStatus::Unsolved;
        self.info.setup_time = 0.0;
        self.info.solve_time = 0.0;
        self.info.run_time = 0.0;
        self.info.obj_value = T::zero();
        self.info.pri_res = T::zero();
        self.info.dua_res = T::zero();
    }
}
