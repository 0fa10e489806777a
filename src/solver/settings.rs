use crate::algebra::*;
use derive_builder::Builder;

/// Solver settings.
///
/// Build with [`SettingsBuilder`] or start from `Settings::default()`
/// and modify fields directly:
///
/// ```no_run
/// use proxal::solver::SettingsBuilder;
/// let settings = SettingsBuilder::<f64>::default()
///     .eps_abs(1e-7)
///     .verbose(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Builder, Debug, Clone)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct Settings<T: FloatT> {
    ///absolute feasibility tolerance
    #[builder(default = "(1e-9).as_T()")]
    pub eps_abs: T,

    ///relative feasibility tolerance
    #[builder(default = "T::zero()")]
    pub eps_rel: T,

    ///maximum number of outer (BCL) iterations
    #[builder(default = "10_000")]
    pub max_iter: u32,

    ///maximum number of inner semismooth Newton iterations per outer
    ///iteration
    #[builder(default = "1500")]
    pub max_iter_in: u32,

    ///BCL outer-tolerance exponent
    #[builder(default = "(0.1).as_T()")]
    pub alpha_bcl: T,

    ///BCL tightening exponent applied after a good step
    #[builder(default = "(0.9).as_T()")]
    pub beta_bcl: T,

    ///upper limit for the equality penalty parameter
    #[builder(default = "(1e9).as_T()")]
    pub mu_max_eq: T,

    ///upper limit for the inequality penalty parameter
    #[builder(default = "(1e8).as_T()")]
    pub mu_max_in: T,

    ///multiplicative penalty increase applied after a bad step
    #[builder(default = "(10.0).as_T()")]
    pub mu_update_factor: T,

    ///equality penalty installed by a cold restart
    #[builder(default = "(1.1).as_T()")]
    pub cold_reset_mu_eq: T,

    ///inequality penalty installed by a cold restart
    #[builder(default = "(1.1).as_T()")]
    pub cold_reset_mu_in: T,

    ///dual residual level above which a primal-feasible iterate
    ///triggers a proximal-parameter decrease
    #[builder(default = "(1e-2).as_T()")]
    pub refactor_dual_feasibility_threshold: T,

    ///floor for the primal proximal parameter ρ
    #[builder(default = "(1e-7).as_T()")]
    pub refactor_rho_threshold: T,

    ///pivot degradation guard for incremental factorization updates,
    ///as a multiple of machine epsilon
    #[builder(default = "(1e-6).as_T()")]
    pub eps_refact: T,

    ///maximum number of iterative refinement passes per KKT solve
    #[builder(default = "10")]
    pub nb_iterative_refinement: u32,

    ///primal infeasibility certificate tolerance
    #[builder(default = "(1e-4).as_T()")]
    pub eps_primal_inf: T,

    ///dual infeasibility certificate tolerance
    #[builder(default = "(1e-4).as_T()")]
    pub eps_dual_inf: T,

    ///start from the iterate stored in the results instead of the
    ///equality-constrained initial solve
    #[builder(default = "false")]
    pub warm_start: bool,

    ///per-iteration progress printing
    #[builder(default = "false")]
    pub verbose: bool,

    ///measure setup and solve times into the results
    #[builder(default = "false")]
    pub compute_timings: bool,
}

impl<T> Default for Settings<T>
where
    T: FloatT,
{
    fn default() -> Settings<T> {
        SettingsBuilder::<T>::default().build().unwrap()
    }
}

/// Automatic pre-build settings validation
impl<T> SettingsBuilder<T>
where
    T: FloatT,
{
    fn validate(&self) -> Result<(), String> {
        if let Some(eps_abs) = self.eps_abs {
            if eps_abs <= T::zero() {
                return Err("eps_abs must be strictly positive".into());
            }
        }
        if let Some(factor) = self.mu_update_factor {
            if factor <= T::one() {
                return Err("mu_update_factor must exceed one".into());
            }
        }
        Ok(())
    }
}

#[test]
fn test_settings_validate() {
    // all standard settings
    SettingsBuilder::<f64>::default().build().unwrap();

    // fail on a non-positive tolerance
    assert!(SettingsBuilder::<f64>::default()
        .eps_abs(0.0)
        .build()
        .is_err());

    // fail on a shrinking penalty factor
    assert!(SettingsBuilder::<f64>::default()
        .mu_update_factor(0.5)
        .build()
        .is_err());
}
