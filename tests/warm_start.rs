#![allow(non_snake_case)]

use proxal::solver::{QpSolver, SolverStatus};
use proxal::sparse::CscMatrix;

#[allow(clippy::type_complexity)]
fn box_problem() -> (
    CscMatrix<f64>,
    Vec<f64>,
    CscMatrix<f64>,
    Vec<f64>,
    CscMatrix<f64>,
    Vec<f64>,
    Vec<f64>,
) {
    // minimize ½xᵀHx + gᵀx  s.t.  x₁ + x₂ = 1,  0 ≤ x ≤ 0.7
    let H = CscMatrix::new(
        2,
        2,
        vec![0, 2, 4],
        vec![0, 1, 0, 1],
        vec![4.0, 1.0, 1.0, 2.0],
    );
    let g = vec![1.0, 1.0];
    let A = CscMatrix::new(1, 2, vec![0, 1, 2], vec![0, 0], vec![1.0, 1.0]);
    let b = vec![1.0];
    let C = CscMatrix::identity(2);
    let u = vec![0.7, 0.7];
    let l = vec![0.0, 0.0];
    (H, g, A, b, C, u, l)
}

#[test]
fn test_warm_start_from_solution() {
    let (H, g, A, b, C, u, l) = box_problem();

    let mut solver = QpSolver::new(2, 1, 2);
    solver
        .init(&H, &g, &A, &b, &C, &u, &l, true, None, None, None)
        .unwrap();
    solver.solve().unwrap();
    assert_eq!(solver.results.info.status, SolverStatus::Solved);

    let x = solver.results.x.clone();
    let y = solver.results.y.clone();
    let z = solver.results.z.clone();
    let cold_iters = solver.results.info.iter;

    // restarting from the solution should need no more work than the
    // cold start did
    solver
        .solve_warm_start(Some(&x), Some(&y), Some(&z))
        .unwrap();
    assert_eq!(solver.results.info.status, SolverStatus::Solved);
    assert!(solver.results.info.iter <= cold_iters);
    assert!((solver.results.x[0] - x[0]).abs() <= 1e-7);
    assert!((solver.results.x[1] - x[1]).abs() <= 1e-7);
}

#[test]
fn test_warm_start_setting_reuses_stored_iterate() {
    let (H, g, A, b, C, u, l) = box_problem();

    let mut solver = QpSolver::new(2, 1, 2);
    solver.settings.warm_start = true;
    solver
        .init(&H, &g, &A, &b, &C, &u, &l, true, None, None, None)
        .unwrap();

    // first call starts from zero iterates stored in the results
    solver.solve().unwrap();
    assert_eq!(solver.results.info.status, SolverStatus::Solved);

    // second call resumes from the stored solution
    solver.solve().unwrap();
    assert_eq!(solver.results.info.status, SolverStatus::Solved);
    assert!(solver.results.info.iter_ext <= 2);
}

#[test]
fn test_update_then_warm_start() {
    let (H, g, A, b, C, u, l) = box_problem();

    let mut solver = QpSolver::new(2, 1, 2);
    solver
        .init(&H, &g, &A, &b, &C, &u, &l, true, None, None, None)
        .unwrap();
    solver.solve().unwrap();
    assert_eq!(solver.results.info.status, SolverStatus::Solved);

    let x = solver.results.x.clone();
    let y = solver.results.y.clone();
    let z = solver.results.z.clone();

    // nudge the linear term and restart from the previous solution
    solver
        .update(
            None,
            Some(&[1.05, 1.0]),
            None,
            None,
            None,
            None,
            None,
            false,
            None,
            None,
            None,
        )
        .unwrap();
    solver
        .solve_warm_start(Some(&x), Some(&y), Some(&z))
        .unwrap();
    assert_eq!(solver.results.info.status, SolverStatus::Solved);

    // the perturbed solution still satisfies the equality constraint
    let sum = solver.results.x[0] + solver.results.x[1];
    assert!((sum - 1.0).abs() <= 1e-7);
}

#[test]
fn test_without_preconditioner() {
    let (H, g, A, b, C, u, l) = box_problem();

    let mut solver = QpSolver::new(2, 1, 2);
    solver
        .init(&H, &g, &A, &b, &C, &u, &l, false, None, None, None)
        .unwrap();
    solver.solve().unwrap();
    assert_eq!(solver.results.info.status, SolverStatus::Solved);

    let sum = solver.results.x[0] + solver.results.x[1];
    assert!((sum - 1.0).abs() <= 1e-7);
}

#[test]
fn test_timings_populated() {
    let (H, g, A, b, C, u, l) = box_problem();

    let mut solver = QpSolver::new(2, 1, 2);
    solver.settings.compute_timings = true;
    solver
        .init(&H, &g, &A, &b, &C, &u, &l, true, None, None, None)
        .unwrap();
    solver.solve().unwrap();

    assert!(solver.results.info.setup_time > 0.0);
    assert!(solver.results.info.solve_time > 0.0);
    assert!(
        solver.results.info.run_time
            >= solver.results.info.setup_time + solver.results.info.solve_time - 1e-12
    );
}

#[test]
fn test_custom_proximal_parameters() {
    let (H, g, A, b, C, u, l) = box_problem();

    let mut solver = QpSolver::new(2, 1, 2);
    solver
        .init(
            &H,
            &g,
            &A,
            &b,
            &C,
            &u,
            &l,
            true,
            Some(1e-7),
            Some(1e4),
            Some(1e2),
        )
        .unwrap();
    solver.solve().unwrap();

    assert_eq!(solver.results.info.status, SolverStatus::Solved);
    // ρ never increases during a clean solve, penalties never shrink
    assert!(solver.results.info.rho <= 1e-7);
    assert!(solver.results.info.mu_eq >= 1e4);
    assert!(solver.results.info.mu_in >= 1e2);
}
