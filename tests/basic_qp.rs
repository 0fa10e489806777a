#![allow(non_snake_case)]

use proxal::solver::{QpSolver, SolverStatus};
use proxal::sparse::CscMatrix;

fn empty_mat(m: usize, n: usize) -> CscMatrix<f64> {
    CscMatrix::spalloc((m, n), 0)
}

fn dual_residual_norm(
    solver: &QpSolver<f64>,
    H: &CscMatrix<f64>,
    g: &[f64],
    A: &CscMatrix<f64>,
    C: &CscMatrix<f64>,
) -> f64 {
    let n = g.len();
    let mut r = g.to_vec();
    H.symv_triu(&mut r, &solver.results.x, 1.0, 1.0);
    A.gemv_t(&mut r, &solver.results.y, 1.0, 1.0);
    C.gemv_t(&mut r, &solver.results.z, 1.0, 1.0);
    (0..n).fold(0.0f64, |acc, i| acc.max(r[i].abs()))
}

#[test]
fn test_qp_unconstrained_univariate() {
    // minimize x² - 2x  →  x = 1
    let H = CscMatrix::new(1, 1, vec![0, 1], vec![0], vec![2.0]);
    let g = [-2.0];
    let A = empty_mat(0, 1);
    let C = empty_mat(0, 1);

    let mut solver = QpSolver::new(1, 0, 0);
    solver
        .init(&H, &g, &A, &[], &C, &[], &[], true, None, None, None)
        .unwrap();
    solver.solve().unwrap();

    assert_eq!(solver.results.info.status, SolverStatus::Solved);
    assert!((solver.results.x[0] - 1.0).abs() <= 1e-7);
    assert!((solver.results.info.obj_value - (-1.0)).abs() <= 1e-7);
    assert_eq!(solver.results.info.iter_ext, 1);
}

#[test]
fn test_qp_equality_constrained() {
    // minimize ½‖x‖²  s.t.  x₁ + x₂ = 1
    let H = CscMatrix::identity(2);
    let g = [0.0, 0.0];
    let A = CscMatrix::new(1, 2, vec![0, 1, 2], vec![0, 0], vec![1.0, 1.0]);
    let b = [1.0];
    let C = empty_mat(0, 2);

    let mut solver = QpSolver::new(2, 1, 0);
    solver
        .init(&H, &g, &A, &b, &C, &[], &[], true, None, None, None)
        .unwrap();
    solver.solve().unwrap();

    assert_eq!(solver.results.info.status, SolverStatus::Solved);
    assert!((solver.results.x[0] - 0.5).abs() <= 1e-7);
    assert!((solver.results.x[1] - 0.5).abs() <= 1e-7);
    assert!((solver.results.info.obj_value - 0.25).abs() <= 1e-7);

    // stationarity fixes the multiplier: x + Aᵀy = 0
    assert!(dual_residual_norm(&solver, &H.to_triu(), &g, &A, &C) <= 1e-7);
    assert!((solver.results.y[0] + 0.5).abs() <= 1e-6);
}

#[test]
fn test_qp_box_upper_active() {
    // minimize ½‖x‖² - x₁ - x₂  s.t.  x ≤ 0.5
    let H = CscMatrix::identity(2);
    let g = [-1.0, -1.0];
    let A = empty_mat(0, 2);
    let C = CscMatrix::identity(2);
    let u = [0.5, 0.5];
    let l = [f64::NEG_INFINITY, f64::NEG_INFINITY];

    let mut solver = QpSolver::new(2, 0, 2);
    solver
        .init(&H, &g, &A, &[], &C, &u, &l, true, None, None, None)
        .unwrap();
    solver.solve().unwrap();

    assert_eq!(solver.results.info.status, SolverStatus::Solved);
    assert!((solver.results.x[0] - 0.5).abs() <= 1e-7);
    assert!((solver.results.x[1] - 0.5).abs() <= 1e-7);

    // both upper bounds active with stationary multipliers
    assert!(solver.results.active_constraints.iter().all(|&a| a));
    assert!(dual_residual_norm(&solver, &H.to_triu(), &g, &A, &C) <= 1e-7);
    assert!((solver.results.z[0] - 0.5).abs() <= 1e-6);
    assert!((solver.results.z[1] - 0.5).abs() <= 1e-6);
}

#[test]
fn test_qp_equality_via_collapsed_bounds() {
    // l = u turns the inequalities into equalities; the active set
    // must settle without oscillation
    let H = CscMatrix::identity(2);
    let g = [-2.0, -2.0];
    let A = empty_mat(0, 2);
    let C = CscMatrix::identity(2);
    let u = [1.0, 1.0];
    let l = [1.0, 1.0];

    let mut solver = QpSolver::new(2, 0, 2);
    solver
        .init(&H, &g, &A, &[], &C, &u, &l, true, None, None, None)
        .unwrap();
    solver.solve().unwrap();

    assert_eq!(solver.results.info.status, SolverStatus::Solved);
    assert!((solver.results.x[0] - 1.0).abs() <= 1e-7);
    assert!((solver.results.x[1] - 1.0).abs() <= 1e-7);

    // Cᵀz balances g + Hx at the solution
    assert!(dual_residual_norm(&solver, &H.to_triu(), &g, &A, &C) <= 1e-7);
}

#[test]
fn test_qp_semidefinite_hessian() {
    // H singular in the third coordinate; the proximal term carries
    // the factorization
    let H = CscMatrix::new(3, 3, vec![0, 1, 2, 2], vec![0, 1], vec![1.0, 1.0]);
    let g = [-1.0, -1.0, 0.0];
    let A = CscMatrix::new(1, 3, vec![0, 0, 0, 1], vec![0], vec![1.0]);
    let b = [0.0];
    let C = CscMatrix::identity(3);
    let l = [0.0, 0.0, 0.0];
    let u = [f64::INFINITY, f64::INFINITY, f64::INFINITY];

    let mut solver = QpSolver::new(3, 1, 3);
    solver
        .init(&H, &g, &A, &b, &C, &u, &l, true, None, None, None)
        .unwrap();
    solver.solve().unwrap();

    assert_eq!(solver.results.info.status, SolverStatus::Solved);
    assert!((solver.results.x[0] - 1.0).abs() <= 1e-7);
    assert!((solver.results.x[1] - 1.0).abs() <= 1e-7);
    assert!(solver.results.x[2].abs() <= 1e-7);
}

#[test]
fn test_qp_primal_infeasible() {
    // x = 0 and x = 1 simultaneously
    let H = CscMatrix::identity(1);
    let g = [0.0];
    let A = CscMatrix::new(2, 1, vec![0, 2], vec![0, 1], vec![1.0, 1.0]);
    let b = [0.0, 1.0];
    let C = empty_mat(0, 1);

    let mut solver = QpSolver::new(1, 2, 0);
    solver
        .init(&H, &g, &A, &b, &C, &[], &[], true, None, None, None)
        .unwrap();
    solver.solve().unwrap();

    assert_eq!(solver.results.info.status, SolverStatus::PrimalInfeasible);
    assert!(solver.results.info.iter_ext <= 20);
}

#[test]
fn test_qp_general_inequalities() {
    // minimize ½xᵀHx + gᵀx with a non-diagonal H and skew constraints
    // reference solution computed by hand from the active set {x₁+x₂ ≤ 1}
    //
    // H = [4 1; 1 2], g = [1, 1], constraints x₁+x₂ ≤ 1, x ≥ 0
    let H = CscMatrix::new(2, 2, vec![0, 2, 4], vec![0, 1, 0, 1], vec![4.0, 1.0, 1.0, 2.0]);
    let g = [1.0, 1.0];
    let A = empty_mat(0, 2);
    let C = CscMatrix::new(
        2,
        3,
        vec![0, 2, 4],
        vec![0, 1, 0, 2],
        vec![1.0, 1.0, 1.0, 1.0],
    );
    let l = [f64::NEG_INFINITY, 0.0, 0.0];
    let u = [1.0, f64::INFINITY, f64::INFINITY];

    let mut solver = QpSolver::new(2, 0, 3);
    solver
        .init(&H, &g, &A, &[], &C, &u, &l, true, None, None, None)
        .unwrap();
    solver.solve().unwrap();

    assert_eq!(solver.results.info.status, SolverStatus::Solved);
    // unconstrained minimizer (-1/7, -3/7) is outside x ≥ 0, so the
    // origin is optimal here
    assert!(solver.results.x[0].abs() <= 1e-7);
    assert!(solver.results.x[1].abs() <= 1e-7);
    assert!(dual_residual_norm(&solver, &H.to_triu(), &g, &A, &C) <= 1e-7);
}

#[test]
fn test_qp_no_equalities_no_inequalities_multidim() {
    // pure quadratic: solution solves Hx = -g
    let H = CscMatrix::new(2, 2, vec![0, 2, 4], vec![0, 1, 0, 1], vec![4.0, 1.0, 1.0, 2.0]);
    let g = [-1.0, -1.0];
    let A = empty_mat(0, 2);
    let C = empty_mat(0, 2);

    let mut solver = QpSolver::new(2, 0, 0);
    solver
        .init(&H, &g, &A, &[], &C, &[], &[], true, None, None, None)
        .unwrap();
    solver.solve().unwrap();

    assert_eq!(solver.results.info.status, SolverStatus::Solved);
    // Hx = -g  →  x = [1/7, 3/7]
    assert!((solver.results.x[0] - 1.0 / 7.0).abs() <= 1e-7);
    assert!((solver.results.x[1] - 3.0 / 7.0).abs() <= 1e-7);
}
