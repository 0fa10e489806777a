#![allow(non_snake_case)]

use proxal::solver::{QpSolver, SolverError, SolverStatus};
use proxal::sparse::CscMatrix;

fn small_problem() -> (
    CscMatrix<f64>,
    Vec<f64>,
    CscMatrix<f64>,
    Vec<f64>,
    CscMatrix<f64>,
    Vec<f64>,
    Vec<f64>,
) {
    let H = CscMatrix::identity(2);
    let g = vec![-1.0, 0.0];
    let A = CscMatrix::new(1, 2, vec![0, 1, 2], vec![0, 0], vec![1.0, 1.0]);
    let b = vec![1.0];
    let C = CscMatrix::identity(2);
    let u = vec![2.0, 2.0];
    let l = vec![-2.0, -2.0];
    (H, g, A, b, C, u, l)
}

#[test]
fn test_dimension_mismatch_on_init() {
    let (H, g, A, b, C, u, l) = small_problem();

    // solver sized for three variables, data for two
    let mut solver = QpSolver::new(3, 1, 2);
    let res = solver.init(&H, &g, &A, &b, &C, &u, &l, true, None, None, None);
    assert!(matches!(res, Err(SolverError::DimensionMismatch)));

    // wrong right-hand side length
    let mut solver = QpSolver::new(2, 1, 2);
    let res = solver.init(&H, &g, &A, &[1.0, 2.0], &C, &u, &l, true, None, None, None);
    assert!(matches!(res, Err(SolverError::DimensionMismatch)));
}

#[test]
fn test_solve_before_init_rejected() {
    let mut solver = QpSolver::<f64>::new(2, 1, 2);
    assert!(solver.solve().is_err());
}

#[test]
fn test_structural_mismatch_on_update() {
    let (H, g, A, b, C, u, l) = small_problem();

    let mut solver = QpSolver::new(2, 1, 2);
    solver
        .init(&H, &g, &A, &b, &C, &u, &l, true, None, None, None)
        .unwrap();

    // same shape, different pattern: a dense H
    let H_dense = CscMatrix::new(
        2,
        2,
        vec![0, 2, 4],
        vec![0, 1, 0, 1],
        vec![1.0, 0.5, 0.5, 1.0],
    );
    let res = solver.update(
        Some(&H_dense),
        None,
        None,
        None,
        None,
        None,
        None,
        false,
        None,
        None,
        None,
    );
    assert!(matches!(res, Err(SolverError::StructuralMismatch)));

    // the stored model must be untouched: the solve still works
    solver.solve().unwrap();
    assert_eq!(solver.results.info.status, SolverStatus::Solved);
}

#[test]
fn test_value_update_same_pattern() {
    let (H, g, A, b, C, u, l) = small_problem();

    let mut solver = QpSolver::new(2, 1, 2);
    solver
        .init(&H, &g, &A, &b, &C, &u, &l, true, None, None, None)
        .unwrap();
    solver.solve().unwrap();
    assert_eq!(solver.results.info.status, SolverStatus::Solved);
    let x_first = solver.results.x.clone();

    // shifting g moves the solution along the constraint
    solver
        .update(
            None,
            Some(&[0.0, -1.0]),
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
    solver.solve().unwrap();
    assert_eq!(solver.results.info.status, SolverStatus::Solved);

    // the two problems are mirror images of each other
    assert!((solver.results.x[0] - x_first[1]).abs() <= 1e-6);
    assert!((solver.results.x[1] - x_first[0]).abs() <= 1e-6);
}

#[test]
fn test_cleanup_resets_state() {
    let (H, g, A, b, C, u, l) = small_problem();

    let mut solver = QpSolver::new(2, 1, 2);
    solver
        .init(&H, &g, &A, &b, &C, &u, &l, true, None, None, None)
        .unwrap();
    solver.solve().unwrap();
    assert!(solver.results.info.iter_ext > 0);

    solver.cleanup();
    assert_eq!(solver.results.info.status, SolverStatus::Unsolved);
    assert_eq!(solver.results.info.iter, 0);
    assert_eq!(solver.results.info.iter_ext, 0);
    assert!(solver.results.x.iter().all(|&v| v == 0.0));
    assert!(solver.results.z.iter().all(|&v| v == 0.0));
}

#[test]
fn test_termination_callback_stops_solve() {
    let (H, g, A, b, C, u, l) = small_problem();

    let mut solver = QpSolver::new(2, 1, 2);
    // loose tolerance would solve in very few iterations; the callback
    // fires first
    solver
        .init(&H, &g, &A, &b, &C, &u, &l, true, None, None, None)
        .unwrap();
    solver.set_termination_callback(|_info| true);
    solver.solve().unwrap();
    assert_eq!(solver.results.info.status, SolverStatus::MaxIterReached);
    assert_eq!(solver.results.info.iter_ext, 0);

    solver.clear_termination_callback();
    solver.solve().unwrap();
    assert_eq!(solver.results.info.status, SolverStatus::Solved);
}
