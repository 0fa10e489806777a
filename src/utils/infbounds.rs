use crate::utils::atomic::{AtomicF64, Ordering};
use lazy_static::lazy_static;

/// Constant indicating that an inequality bound is to be treated as
/// infinite.
///
/// Bounds at or beyond this magnitude are excluded from residual norm
/// bounds and from infeasibility certificates.  A custom constant can
/// be installed with [`set_infinity`]; the setting applies at module
/// level.
pub const INFINITY_DEFAULT: f64 = 1e30;

lazy_static! {
    static ref INFINITY: AtomicF64 = AtomicF64::new(INFINITY_DEFAULT);
}

/// Revert the internal infinity bound to [`INFINITY_DEFAULT`].
pub fn default_infinity() {
    INFINITY.store(INFINITY_DEFAULT, Ordering::Relaxed);
}
/// Set the internal infinity bound to a new value.
pub fn set_infinity(v: f64) {
    INFINITY.store(v, Ordering::Relaxed);
}
/// Get the current value of the internal infinity bound.
pub fn get_infinity() -> f64 {
    INFINITY.load(Ordering::Relaxed)
}
